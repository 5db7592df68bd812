//! A feature toggle engine.
//!
//! A [Feature] is switched on for a percentage of users, a list of users, or groups of users
//! defined by predicates, and is stored as a single string in a key-value [Store]. A [Rollout]
//! loads, mutates, saves and evaluates features:
//!
//! ```
//! use rollout::{MemoryStore, Rollout, User};
//!
//! let rollout = Rollout::new(MemoryStore::new());
//! rollout.define_group("staff", |user: &User| {
//!     user.value_of("staff").and_then(|v| v.as_bool()).unwrap_or(false)
//! });
//!
//! rollout.activate_group("chat", "staff").unwrap();
//! rollout.activate_user("chat", &User::from(42)).unwrap();
//!
//! let staff = User::with_id(7).attribute("staff", true).build();
//! assert!(rollout.is_active("chat", Some(&staff)).unwrap());
//! assert!(rollout.is_active("chat", Some(&User::from(42))).unwrap());
//! assert!(!rollout.is_active("chat", None).unwrap());
//! ```

mod attribute_value;
mod bucket;
mod error;
mod feature;
mod group;
mod legacy;
mod options;
mod rollout;
mod store;
mod test_common;
mod user;

pub use attribute_value::*;
pub use bucket::*;
pub use error::*;
pub use feature::*;
pub use group::*;
pub use legacy::*;
pub use options::*;
pub use rollout::*;
pub use store::*;
pub use user::*;
