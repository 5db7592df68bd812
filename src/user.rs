use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::attribute_value::AttributeValue;
use crate::error::{Error, Result};

const USER_ATTRIBUTES_STARTING_CAPACITY: usize = 4;

/// A User is whoever a feature is being evaluated for.
///
/// It comes in two shapes. A bare identifier (a string or an integer, built with `From`) is its
/// own canonical id. A record of attributes (built with [UserBuilder]) is resolved to its
/// canonical id through an accessor, the attribute named by [crate::Options::id_user_by]. Group
/// predicates see the whole user and can inspect any attribute.
///
/// In JSON a user is either a scalar (a bare identifier) or an object (a record).
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(from = "AttributeValue", into = "AttributeValue")]
pub struct User {
    identifier: Option<AttributeValue>,
    attributes: HashMap<String, AttributeValue>,
}

impl User {
    /// Create a new [UserBuilder] for a record with an `id` attribute set to `id`.
    pub fn with_id(id: impl Into<AttributeValue>) -> UserBuilder {
        let mut builder = UserBuilder::new();
        builder.attribute("id", id);
        builder
    }

    /// Returns the bare identifier, if this user was built from one.
    pub fn identifier(&self) -> Option<&AttributeValue> {
        self.identifier.as_ref()
    }

    /// Return the value of the attribute named `attr`. Bare identifiers have no attributes.
    pub fn value_of(&self, attr: &str) -> Option<&AttributeValue> {
        self.attributes.get(attr)
    }

    /// Resolve this user to its canonical identifier.
    ///
    /// A bare identifier is used directly; a record is read through the attribute named
    /// `accessor`. Only strings and integers are identifiers: strings are used as-is and integers
    /// (including integral floats) in decimal form. Booleans, non-integral numbers, nulls, arrays
    /// and objects are not stringified; they, like a missing accessor, are an
    /// [Error::UnresolvableUser].
    pub fn canonical_id(&self, accessor: &str) -> Result<String> {
        let value = match &self.identifier {
            Some(identifier) => Some(identifier),
            None => self.attributes.get(accessor),
        };

        value
            .and_then(AttributeValue::as_identifier)
            .ok_or_else(|| Error::UnresolvableUser {
                accessor: accessor.to_string(),
            })
    }
}

impl From<AttributeValue> for User {
    fn from(value: AttributeValue) -> Self {
        match value {
            AttributeValue::Object(attributes) => User {
                identifier: None,
                attributes,
            },
            other => User {
                identifier: Some(other),
                attributes: HashMap::new(),
            },
        }
    }
}

impl From<User> for AttributeValue {
    fn from(user: User) -> Self {
        match user.identifier {
            Some(identifier) => identifier,
            None => AttributeValue::Object(user.attributes),
        }
    }
}

impl From<&str> for User {
    fn from(id: &str) -> Self {
        AttributeValue::from(id).into()
    }
}

impl From<String> for User {
    fn from(id: String) -> Self {
        AttributeValue::from(id).into()
    }
}

impl From<i64> for User {
    fn from(id: i64) -> Self {
        AttributeValue::from(id).into()
    }
}

impl From<i32> for User {
    fn from(id: i32) -> Self {
        AttributeValue::from(id).into()
    }
}

impl From<u32> for User {
    fn from(id: u32) -> Self {
        AttributeValue::from(id).into()
    }
}

/// Contains methods for configuring a user record.
#[derive(Clone, Debug, Default)]
pub struct UserBuilder {
    attributes: HashMap<String, AttributeValue>,
}

impl UserBuilder {
    /// Create a new builder for a user record with no attributes.
    pub fn new() -> Self {
        Self {
            attributes: HashMap::with_capacity(USER_ATTRIBUTES_STARTING_CAPACITY),
        }
    }

    /// Set the attribute named `key` to `value`, replacing any previous value.
    pub fn attribute(&mut self, key: &str, value: impl Into<AttributeValue>) -> &mut Self {
        let _ = self.attributes.insert(key.to_string(), value.into());
        self
    }

    /// Create a new [User] from this builder's current state.
    pub fn build(&self) -> User {
        User {
            identifier: None,
            attributes: self.attributes.clone(),
        }
    }
}
