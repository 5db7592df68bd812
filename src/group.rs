use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use log::{debug, warn};
use parking_lot::RwLock;

use crate::user::User;

/// Name of the group every registry starts with; its predicate matches every user.
pub const ALL_GROUP: &str = "all";

/// A group predicate decides whether a user belongs to a group.
pub type GroupPredicate = Arc<dyn Fn(&User) -> bool + Send + Sync>;

/// Trait used by [crate::Feature::is_active] to resolve group membership.
pub trait GroupMembership {
    /// Whether `user` belongs to the group named `group`. A group nobody defined has no members.
    fn active_in_group(&self, group: &str, user: &User) -> bool;
}

/// GroupRegistry maps group names to predicates.
///
/// Groups are process-local and never persisted: stored features only hold group names, and
/// every reader resolves them against its own registry. Names are shared by every feature the
/// registry evaluates, so a group means the same thing for all of them.
///
/// Lookups take a read lock and may run concurrently; [GroupRegistry::define] takes the write
/// lock. Predicates are invoked after the lock is released.
pub struct GroupRegistry {
    groups: RwLock<HashMap<String, GroupPredicate>>,
}

impl GroupRegistry {
    /// Create a registry holding only the [ALL_GROUP] group.
    pub fn new() -> Self {
        let mut groups: HashMap<String, GroupPredicate> = HashMap::new();
        groups.insert(ALL_GROUP.to_string(), Arc::new(|_: &User| true));
        Self {
            groups: RwLock::new(groups),
        }
    }

    /// Register `predicate` under `name`, replacing any predicate already registered there.
    pub fn define<F>(&self, name: impl AsRef<str>, predicate: F)
    where
        F: Fn(&User) -> bool + Send + Sync + 'static,
    {
        let name = name.as_ref();
        let previous = self
            .groups
            .write()
            .insert(name.to_string(), Arc::new(predicate));
        if previous.is_some() {
            warn!("group {} was redefined", name);
        } else {
            debug!("defined group {}", name);
        }
    }

    /// Returns the predicate registered under `name`, if any.
    pub fn get(&self, name: &str) -> Option<GroupPredicate> {
        self.groups.read().get(name).cloned()
    }

    /// Returns the names of every registered group, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.groups.read().keys().cloned().collect();
        names.sort();
        names
    }
}

impl GroupMembership for GroupRegistry {
    fn active_in_group(&self, group: &str, user: &User) -> bool {
        match self.get(group) {
            Some(predicate) => predicate(user),
            None => false,
        }
    }
}

impl Default for GroupRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for GroupRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GroupRegistry")
            .field("groups", &self.names())
            .finish()
    }
}
