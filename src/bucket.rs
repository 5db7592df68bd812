use crc32fast::Hasher;

const BUCKET_COUNT: u32 = 100;

/// Identifies what a user is bucketed on.
///
/// With [BucketKey::Id] a user lands in the same bucket for every feature. With
/// [BucketKey::IdAndFeature] the feature name is appended to the id, so rollouts of unrelated
/// features are not correlated.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum BucketKey<'a> {
    Id(&'a str),
    IdAndFeature(&'a str, &'a str),
}

impl<'a> BucketKey<'a> {
    fn write_hash(&self, hash: &mut Hasher) {
        match self {
            BucketKey::Id(id) => hash.update(id.as_bytes()),
            BucketKey::IdAndFeature(id, feature) => {
                hash.update(id.as_bytes());
                hash.update(feature.as_bytes());
            }
        }
    }
}

/// Returns the bucket in `0..100` that `key` falls into: the IEEE CRC-32 of the key's bytes,
/// modulo 100. A user is inside a rollout of `percentage` when its bucket is strictly less than
/// `percentage`.
pub fn bucket(key: BucketKey) -> u32 {
    let mut hash = Hasher::new();
    key.write_hash(&mut hash);
    hash.finalize() % BUCKET_COUNT
}
