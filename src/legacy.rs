use crate::store::StoreError;

/// LegacyInfo is everything the previous storage format knew about one feature.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LegacyInfo {
    pub percentage: u32,
    /// Names of every feature that was globally active, not only the one asked about.
    pub global: Vec<String>,
    pub groups: Vec<String>,
    pub users: Vec<String>,
}

/// LegacySource reads features stored in the previous format.
///
/// It is only consulted by [crate::Rollout::migrate], which runs the first time a feature with no
/// stored blob is read from an engine built with a legacy source.
pub trait LegacySource {
    fn info(&self, feature: &str) -> Result<LegacyInfo, StoreError>;
}

impl LegacyInfo {
    /// Whether `feature` was globally active.
    pub fn is_global(&self, feature: &str) -> bool {
        self.global.iter().any(|name| name == feature)
    }
}
