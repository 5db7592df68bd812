use std::collections::BTreeSet;
use std::fmt;

use itertools::Itertools;
use lazy_static::lazy_static;
use log::warn;
use regex::Regex;
use serde::Serialize;

use crate::bucket::{bucket, BucketKey};
use crate::error::Result;
use crate::group::GroupMembership;
use crate::options::Options;
use crate::user::User;

const SEGMENT_DELIMITER: char = '|';
pub(crate) const LIST_DELIMITER: &str = ",";
const GLOBAL_PERCENTAGE: u32 = 100;

lazy_static! {
    static ref LEADING_INTEGER_REGEX: Regex = Regex::new(r"^\s*([+-]?)(\d+)").unwrap();
}

/// Feature is one feature's activation rules: a rollout percentage, a set of user ids and a set
/// of group names.
///
/// A feature serializes to `<percentage>|<user ids>|<group names>` with comma-separated lists.
/// A feature with nothing stored is the default feature: percentage 0 and no users or groups.
#[derive(Clone, Debug, PartialEq)]
pub struct Feature {
    name: String,
    percentage: u32,
    users: BTreeSet<String>,
    groups: BTreeSet<String>,
    options: Options,
}

/// The serializable view of a [Feature]'s rules, for diagnostics and JSON output.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FeatureSummary {
    pub percentage: u32,
    pub users: Vec<String>,
    pub groups: Vec<String>,
}

impl Feature {
    /// Create a default, inactive feature.
    pub fn new(name: impl Into<String>, options: Options) -> Self {
        Self {
            name: name.into(),
            percentage: 0,
            users: BTreeSet::new(),
            groups: BTreeSet::new(),
            options,
        }
    }

    /// Build a feature from its serialized form.
    ///
    /// Parsing never fails: missing segments are empty, empty list entries are dropped and a
    /// percentage that is not a non-negative integer reads as 0.
    pub fn parse(name: impl Into<String>, value: &str, options: Options) -> Self {
        let mut feature = Feature::new(name, options);
        let mut segments = value.split(SEGMENT_DELIMITER);

        feature.percentage = segments
            .next()
            .map(|raw| parse_percentage(&feature.name, raw))
            .unwrap_or(0);
        feature.users = segments.next().map(parse_list).unwrap_or_default();
        feature.groups = segments.next().map(parse_list).unwrap_or_default();
        feature
    }

    /// Returns the serialized form of this feature.
    pub fn serialize(&self) -> String {
        self.to_string()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn percentage(&self) -> u32 {
        self.percentage
    }

    /// Set the rollout percentage. Values above 100 are kept as-is; they put every user in the
    /// rollout but do not count as global activation.
    pub fn set_percentage(&mut self, percentage: u32) {
        self.percentage = percentage;
    }

    pub fn users(&self) -> &BTreeSet<String> {
        &self.users
    }

    pub fn groups(&self) -> &BTreeSet<String> {
        &self.groups
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Add the user's canonical id to the user set.
    pub fn add_user(&mut self, user: &User) -> Result<()> {
        let id = self.user_id(user)?;
        warn_if_delimited(&self.name, "user id", &id);
        self.users.insert(id);
        Ok(())
    }

    /// Remove the user's canonical id from the user set.
    pub fn remove_user(&mut self, user: &User) -> Result<()> {
        let id = self.user_id(user)?;
        self.users.remove(&id);
        Ok(())
    }

    /// Replace the user set with the canonical ids of `users`. The set is left untouched if any
    /// user cannot be resolved.
    pub fn set_users(&mut self, users: &[User]) -> Result<()> {
        let ids = users
            .iter()
            .map(|user| self.user_id(user))
            .collect::<Result<BTreeSet<String>>>()?;
        for id in &ids {
            warn_if_delimited(&self.name, "user id", id);
        }
        self.users = ids;
        Ok(())
    }

    pub fn add_group(&mut self, group: impl AsRef<str>) {
        let group = group.as_ref();
        warn_if_delimited(&self.name, "group name", group);
        self.groups.insert(group.to_string());
    }

    pub fn remove_group(&mut self, group: impl AsRef<str>) {
        self.groups.remove(group.as_ref());
    }

    /// Reset to the default, inactive state.
    pub fn clear(&mut self) {
        self.percentage = 0;
        self.users.clear();
        self.groups.clear();
    }

    /// Whether the feature is on for `user`.
    ///
    /// Without a user the feature is on only when rolled out to exactly 100%. With a user it is
    /// on when the user falls inside the rollout percentage, is in the user set, or belongs to
    /// any of the feature's groups. Groups `groups` does not know have no members.
    pub fn is_active(&self, groups: &dyn GroupMembership, user: Option<&User>) -> Result<bool> {
        let user = match user {
            Some(user) => user,
            None => return Ok(self.percentage == GLOBAL_PERCENTAGE),
        };

        let id = self.user_id(user)?;
        Ok(self.id_in_percentage(&id)
            || self.users.contains(&id)
            || self.user_in_active_group(groups, user))
    }

    /// Whether the user's bucket is below the rollout percentage.
    pub fn user_in_percentage(&self, user: &User) -> Result<bool> {
        let id = self.user_id(user)?;
        Ok(self.id_in_percentage(&id))
    }

    /// Whether the user's canonical id is in the user set.
    pub fn user_in_active_users(&self, user: &User) -> Result<bool> {
        let id = self.user_id(user)?;
        Ok(self.users.contains(&id))
    }

    /// Whether the user belongs to any of this feature's groups.
    pub fn user_in_active_group(&self, groups: &dyn GroupMembership, user: &User) -> bool {
        self.groups
            .iter()
            .any(|group| groups.active_in_group(group, user))
    }

    pub fn to_summary(&self) -> FeatureSummary {
        FeatureSummary {
            percentage: self.percentage,
            users: self.users.iter().cloned().collect(),
            groups: self.groups.iter().cloned().collect(),
        }
    }

    fn user_id(&self, user: &User) -> Result<String> {
        user.canonical_id(&self.options.id_user_by)
    }

    fn id_in_percentage(&self, id: &str) -> bool {
        let key = if self.options.randomize_percentage {
            BucketKey::IdAndFeature(id, &self.name)
        } else {
            BucketKey::Id(id)
        };
        bucket(key) < self.percentage
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}{}{}",
            self.percentage,
            SEGMENT_DELIMITER,
            self.users.iter().join(LIST_DELIMITER),
            SEGMENT_DELIMITER,
            self.groups.iter().join(LIST_DELIMITER)
        )
    }
}

fn parse_percentage(feature: &str, raw: &str) -> u32 {
    if raw.is_empty() {
        return 0;
    }

    let parsed = LEADING_INTEGER_REGEX.captures(raw).and_then(|caps| {
        let digits = caps.get(2)?.as_str();
        match caps.get(1).map(|sign| sign.as_str()) {
            Some("-") => digits.bytes().all(|b| b == b'0').then_some(0),
            _ => digits.parse::<u32>().ok(),
        }
    });

    match parsed {
        Some(percentage) => percentage,
        None => {
            warn!(
                "feature {} has malformed percentage {:?}; treating it as 0",
                feature, raw
            );
            0
        }
    }
}

fn parse_list(raw: &str) -> BTreeSet<String> {
    raw.split(LIST_DELIMITER)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}

fn warn_if_delimited(feature: &str, what: &str, value: &str) {
    if value.contains(SEGMENT_DELIMITER) || value.contains(LIST_DELIMITER) {
        warn!(
            "{} {:?} on feature {} contains a delimiter and will not survive serialization",
            what, value, feature
        );
    }
}
