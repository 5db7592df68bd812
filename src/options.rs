use serde::{Deserialize, Serialize};

const DEFAULT_ID_ACCESSOR: &str = "id";
const DEFAULT_KEY_PREFIX: &str = "feature";

/// Name under the key prefix that holds the feature index. No feature may use it.
pub(crate) const INDEX_NAME: &str = "__features__";

/// Options configure how a [crate::Rollout] buckets users and names its storage keys.
///
/// Options deserialize from camelCase JSON and every field is optional:
///
/// ```
/// let options: rollout::Options =
///     serde_json::from_str(r#"{"randomizePercentage": true}"#).unwrap();
/// assert!(options.randomize_percentage);
/// assert_eq!(options.id_user_by, "id");
/// ```
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Options {
    /// Bucket users on their id followed by the feature name instead of on their id alone, so a
    /// user's bucket differs between features.
    pub randomize_percentage: bool,
    /// Attribute read from a user record to find its canonical id.
    pub id_user_by: String,
    /// Namespace for storage keys. Features live under `<prefix>:<name>` and the index under
    /// `<prefix>:__features__`.
    pub key_prefix: String,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            randomize_percentage: false,
            id_user_by: DEFAULT_ID_ACCESSOR.to_string(),
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
        }
    }
}

impl Options {
    pub(crate) fn feature_key(&self, name: &str) -> String {
        format!("{}:{}", self.key_prefix, name)
    }

    pub(crate) fn features_key(&self) -> String {
        format!("{}:{}", self.key_prefix, INDEX_NAME)
    }
}
