use std::collections::HashMap;

use log::debug;
use parking_lot::ReentrantMutex;

use crate::error::{Error, Result};
use crate::feature::{Feature, LIST_DELIMITER};
use crate::group::{GroupMembership, GroupRegistry};
use crate::legacy::LegacySource;
use crate::options::{Options, INDEX_NAME};
use crate::store::Store;
use crate::user::User;

const PERCENTAGE_ALL: u32 = 100;

/// Rollout decides which features are on for which users, and records those decisions in a
/// [Store].
///
/// Every mutating operation is a read-modify-write of one feature through
/// [Rollout::with_feature]. Writes made through the same instance are serialized, but the store
/// offers no compare-and-swap, so two instances (or processes) mutating the same feature at once
/// can lose an update.
///
/// Feature names are stored in a delimited index next to the features themselves, so a name must
/// be non-empty, must not contain `,` and must not be `__features__`. Any operation given such a
/// name returns [Error::InvalidFeatureName] without touching the store.
///
/// Group predicates belong to the instance: two engines over the same store can resolve the same
/// stored group name differently.
pub struct Rollout<S> {
    store: S,
    options: Options,
    groups: GroupRegistry,
    legacy: Option<Box<dyn LegacySource + Send + Sync>>,
    write_lock: ReentrantMutex<()>,
}

/// Contains methods for configuring a [Rollout].
pub struct RolloutBuilder<S> {
    store: S,
    options: Options,
    legacy: Option<Box<dyn LegacySource + Send + Sync>>,
}

impl<S: Store> RolloutBuilder<S> {
    /// Create a new builder over `store` with default [Options] and no legacy source.
    pub fn new(store: S) -> Self {
        Self {
            store,
            options: Options::default(),
            legacy: None,
        }
    }

    /// Replace every option at once, e.g. with options loaded from configuration.
    pub fn options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    pub fn randomize_percentage(mut self, randomize: bool) -> Self {
        self.options.randomize_percentage = randomize;
        self
    }

    pub fn id_user_by(mut self, accessor: impl Into<String>) -> Self {
        self.options.id_user_by = accessor.into();
        self
    }

    pub fn key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.options.key_prefix = prefix.into();
        self
    }

    /// Migrate features from `source` the first time they are read without a stored blob.
    pub fn legacy(mut self, source: impl LegacySource + Send + Sync + 'static) -> Self {
        self.legacy = Some(Box::new(source));
        self
    }

    pub fn build(self) -> Rollout<S> {
        Rollout {
            store: self.store,
            options: self.options,
            groups: GroupRegistry::new(),
            legacy: self.legacy,
            write_lock: ReentrantMutex::new(()),
        }
    }
}

impl<S: Store> Rollout<S> {
    /// Create an engine over `store` with default [Options].
    pub fn new(store: S) -> Self {
        RolloutBuilder::new(store).build()
    }

    /// Create a new [RolloutBuilder] over `store`.
    pub fn builder(store: S) -> RolloutBuilder<S> {
        RolloutBuilder::new(store)
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn groups(&self) -> &GroupRegistry {
        &self.groups
    }

    /// Turn the feature on for everyone: percentage 100.
    pub fn activate(&self, name: &str) -> Result<()> {
        self.activate_percentage(name, PERCENTAGE_ALL)
    }

    /// Turn the feature off for everyone, clearing every rule.
    pub fn deactivate(&self, name: &str) -> Result<()> {
        self.with_feature(name, |feature| {
            feature.clear();
            Ok(())
        })
        .map(drop)
    }

    /// [Rollout::activate] when `desired_state` is true, [Rollout::deactivate] otherwise.
    pub fn set(&self, name: &str, desired_state: bool) -> Result<()> {
        if desired_state {
            self.activate(name)
        } else {
            self.deactivate(name)
        }
    }

    pub fn activate_group(&self, name: &str, group: &str) -> Result<()> {
        self.with_feature(name, |feature| {
            feature.add_group(group);
            Ok(())
        })
        .map(drop)
    }

    pub fn deactivate_group(&self, name: &str, group: &str) -> Result<()> {
        self.with_feature(name, |feature| {
            feature.remove_group(group);
            Ok(())
        })
        .map(drop)
    }

    pub fn activate_user(&self, name: &str, user: &User) -> Result<()> {
        self.with_feature(name, |feature| feature.add_user(user))
            .map(drop)
    }

    pub fn deactivate_user(&self, name: &str, user: &User) -> Result<()> {
        self.with_feature(name, |feature| feature.remove_user(user))
            .map(drop)
    }

    /// Add every user in `users`. Nothing is written if any of them cannot be resolved.
    pub fn activate_users(&self, name: &str, users: &[User]) -> Result<()> {
        self.with_feature(name, |feature| {
            users.iter().try_for_each(|user| feature.add_user(user))
        })
        .map(drop)
    }

    /// Remove every user in `users`. Nothing is written if any of them cannot be resolved.
    pub fn deactivate_users(&self, name: &str, users: &[User]) -> Result<()> {
        self.with_feature(name, |feature| {
            users.iter().try_for_each(|user| feature.remove_user(user))
        })
        .map(drop)
    }

    /// Replace the feature's user set with `users`.
    pub fn set_users(&self, name: &str, users: &[User]) -> Result<()> {
        self.with_feature(name, |feature| feature.set_users(users))
            .map(drop)
    }

    pub fn activate_percentage(&self, name: &str, percentage: u32) -> Result<()> {
        self.with_feature(name, |feature| {
            feature.set_percentage(percentage);
            Ok(())
        })
        .map(drop)
    }

    pub fn deactivate_percentage(&self, name: &str) -> Result<()> {
        self.activate_percentage(name, 0)
    }

    /// Register `predicate` as the group `group`, replacing any earlier definition.
    pub fn define_group<F>(&self, group: &str, predicate: F)
    where
        F: Fn(&User) -> bool + Send + Sync + 'static,
    {
        self.groups.define(group, predicate);
    }

    /// Whether `user` belongs to `group`. Undefined groups have no members.
    pub fn active_in_group(&self, group: &str, user: &User) -> bool {
        self.groups.active_in_group(group, user)
    }

    /// Whether the feature is on for `user`, or globally when `user` is None.
    pub fn is_active(&self, name: &str, user: Option<&User>) -> Result<bool> {
        self.get(name)?.is_active(&self.groups, user)
    }

    pub fn is_inactive(&self, name: &str, user: Option<&User>) -> Result<bool> {
        self.is_active(name, user).map(|active| !active)
    }

    /// Whether `user` is in the feature's user set, ignoring percentage and groups.
    pub fn user_in_active_users(&self, name: &str, user: &User) -> Result<bool> {
        self.get(name)?.user_in_active_users(user)
    }

    /// Load a feature. A feature with nothing stored is returned in its default, inactive state,
    /// unless a legacy source is configured, in which case it is migrated first.
    pub fn get(&self, name: &str) -> Result<Feature> {
        check_name(name)?;
        match self.store.get(&self.options.feature_key(name))? {
            Some(value) => Ok(Feature::parse(name, &value, self.options.clone())),
            None if self.legacy.is_some() => self.migrate(name),
            None => Ok(self.new_feature(name)),
        }
    }

    /// Load several features with a single multi-get. Features with nothing stored come back in
    /// their default state; they are not migrated.
    pub fn multi_get<N: AsRef<str>>(&self, names: &[N]) -> Result<Vec<Feature>> {
        if names.is_empty() {
            return Ok(Vec::new());
        }
        names.iter().try_for_each(|name| check_name(name.as_ref()))?;

        let keys: Vec<String> = names
            .iter()
            .map(|name| self.options.feature_key(name.as_ref()))
            .collect();
        let values = self.store.mget(&keys)?;

        Ok(names
            .iter()
            .zip(values)
            .map(|(name, value)| match value {
                Some(value) => Feature::parse(name.as_ref(), &value, self.options.clone()),
                None => self.new_feature(name.as_ref()),
            })
            .collect())
    }

    /// Convert the legacy state of `name` into a feature and save it.
    ///
    /// [Rollout::get] calls this the first time it finds no stored blob for a feature. Calling
    /// it directly re-runs the conversion and overwrites whatever is stored. Without a legacy
    /// source this returns the default feature and writes nothing.
    pub fn migrate(&self, name: &str) -> Result<Feature> {
        check_name(name)?;
        let legacy = match &self.legacy {
            Some(legacy) => legacy,
            None => return Ok(self.new_feature(name)),
        };

        let _guard = self.write_lock.lock();
        let info = legacy.info(name)?;
        let mut feature = self.new_feature(name);
        feature.set_percentage(if info.is_global(name) {
            PERCENTAGE_ALL
        } else {
            info.percentage
        });
        for group in &info.groups {
            feature.add_group(group);
        }
        for user in &info.users {
            feature.add_user(&User::from(user.as_str()))?;
        }

        debug!("migrated feature {} from legacy storage", name);
        self.save(&feature)?;
        Ok(feature)
    }

    /// Load `name`, apply `mutator` and save the result along with the feature's entry in the
    /// index. Nothing is saved when `mutator` fails.
    ///
    /// Writes through this instance are serialized. Writes from other instances are not seen
    /// between the load and the save and may be overwritten.
    pub fn with_feature<F>(&self, name: &str, mutator: F) -> Result<Feature>
    where
        F: FnOnce(&mut Feature) -> Result<()>,
    {
        let _guard = self.write_lock.lock();
        let mut feature = self.get(name)?;
        mutator(&mut feature)?;
        self.save(&feature)?;
        Ok(feature)
    }

    /// Remove the feature's blob and its entry in the index. The index is only rewritten when it
    /// listed the feature.
    pub fn delete(&self, name: &str) -> Result<()> {
        check_name(name)?;
        let _guard = self.write_lock.lock();
        let mut features = self.features()?;
        let indexed = features.len();
        features.retain(|feature| feature != name);
        if features.len() != indexed {
            self.store
                .set(&self.options.features_key(), &features.join(LIST_DELIMITER))?;
        }
        self.store.del(&self.options.feature_key(name))?;
        debug!("deleted feature {}", name);
        Ok(())
    }

    /// Whether a blob is stored for the feature.
    pub fn exists(&self, name: &str) -> Result<bool> {
        check_name(name)?;
        Ok(self.store.exists(&self.options.feature_key(name))?)
    }

    /// Returns the name of every feature in the index.
    pub fn features(&self) -> Result<Vec<String>> {
        let index = self.store.get(&self.options.features_key())?;
        Ok(index
            .as_deref()
            .unwrap_or_default()
            .split(LIST_DELIMITER)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect())
    }

    /// Returns every known feature's state for `user`, or its global state when `user` is None.
    pub fn feature_states(&self, user: Option<&User>) -> Result<HashMap<String, bool>> {
        let features = self.multi_get(&self.features()?)?;
        features
            .into_iter()
            .map(|feature| {
                let active = feature.is_active(&self.groups, user)?;
                Ok((feature.name().to_string(), active))
            })
            .collect()
    }

    /// Returns the names of the features that are on for `user`, in index order.
    pub fn active_features(&self, user: Option<&User>) -> Result<Vec<String>> {
        let mut active = Vec::new();
        for feature in self.multi_get(&self.features()?)? {
            if feature.is_active(&self.groups, user)? {
                active.push(feature.name().to_string());
            }
        }
        Ok(active)
    }

    /// Clear and delete every known feature, then the index itself.
    pub fn clear(&self) -> Result<()> {
        let _guard = self.write_lock.lock();
        for name in self.features()? {
            let key = self.options.feature_key(&name);
            self.store.set(&key, &self.new_feature(&name).serialize())?;
            self.store.del(&key)?;
        }
        self.store.del(&self.options.features_key())?;
        debug!("cleared every feature");
        Ok(())
    }

    fn save(&self, feature: &Feature) -> Result<()> {
        self.store.set(
            &self.options.feature_key(feature.name()),
            &feature.serialize(),
        )?;

        let mut features = self.features()?;
        if !features.iter().any(|name| name == feature.name()) {
            features.push(feature.name().to_string());
            self.store
                .set(&self.options.features_key(), &features.join(LIST_DELIMITER))?;
        }
        debug!("saved feature {} as {:?}", feature.name(), feature.serialize());
        Ok(())
    }

    fn new_feature(&self, name: &str) -> Feature {
        Feature::new(name, self.options.clone())
    }
}

fn check_name(name: &str) -> Result<()> {
    let reason = if name.is_empty() {
        "names cannot be empty"
    } else if name == INDEX_NAME {
        "the name is reserved for the feature index"
    } else if name.contains(LIST_DELIMITER) {
        "names cannot contain the index delimiter"
    } else {
        return Ok(());
    };
    Err(Error::InvalidFeatureName {
        name: name.to_string(),
        reason,
    })
}
