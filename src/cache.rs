//! A content-addressed, file-backed cache keyed by a 64-bit FNV-1a hash of
//! `(doc_type_tag, LocalCandidates JSON)`.

use crate::{prelude::*, types::DocType};

const FNV_OFFSET_BASIS: u64 = 0xcbf29ce484222325;
const FNV_PRIME: u64 = 0x100000001b3;

/// Hash `data` with 64-bit FNV-1a.
fn fnv1a_64(data: &[u8]) -> u64 {
    let mut hash = FNV_OFFSET_BASIS;
    for byte in data {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// The cache key for a given `doc_type` and local-candidates dump. A pure
/// function of its inputs, so identical inputs always yield identical keys.
pub fn cache_key(doc_type: DocType, local_candidates_dump: &str) -> u64 {
    let input = format!("{}\n{}", doc_type.tag(), local_candidates_dump);
    fnv1a_64(input.as_bytes())
}

/// A content-addressed store of model-returned JSON, rooted at a directory.
pub struct Cache {
    dir: PathBuf,
}

impl Cache {
    /// Open (and, if necessary, create) a cache rooted at `dir`.
    pub fn open(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir).map_err(|err| PipelineError::ConfigError(format!(
            "failed to create cache directory {:?}: {err}",
            dir
        )))?;
        Ok(Self {
            dir: dir.to_owned(),
        })
    }

    fn path_for(&self, key: u64) -> PathBuf {
        self.dir.join(format!("{key:016x}.json"))
    }

    /// Look up `key`. Returns `None` on a cache miss or an unreadable/
    /// unparseable entry (treated as a miss rather than an error, since the
    /// remote call can simply regenerate it).
    #[instrument(level = "debug", skip(self))]
    pub fn get(&self, key: u64) -> Option<Value> {
        let path = self.path_for(key);
        let bytes = std::fs::read(&path).ok()?;
        serde_json::from_slice(&bytes).ok()
    }

    /// Write `value` for `key`. Not required to be atomic (writes are
    /// content-addressed, so concurrent writers racing on the same key
    /// produce equivalent values); a simple write-then-close is sufficient.
    #[instrument(level = "debug", skip(self, value))]
    pub fn put(&self, key: u64, value: &Value) -> Result<()> {
        let path = self.path_for(key);
        let bytes = serde_json::to_vec(value).context("failed to serialize cache entry")?;
        std::fs::write(&path, bytes)
            .map_err(|err| PipelineError::IOError(format!("failed to write cache entry: {err}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_key_is_deterministic() {
        let a = cache_key(DocType::Medical, "{\"important_snippets\":\"x\"}");
        let b = cache_key(DocType::Medical, "{\"important_snippets\":\"x\"}");
        assert_eq!(a, b);
    }

    #[test]
    fn cache_key_differs_by_doc_type() {
        let a = cache_key(DocType::Medical, "{}");
        let b = cache_key(DocType::Pleading, "{}");
        assert_ne!(a, b);
    }

    #[test]
    fn round_trips_through_a_temp_directory() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Cache::open(dir.path()).unwrap();
        let key = cache_key(DocType::Medical, "{}");
        assert!(cache.get(key).is_none());
        cache.put(key, &json!({"confidence": 0.5})).unwrap();
        assert_eq!(cache.get(key), Some(json!({"confidence": 0.5})));
    }

    #[test]
    fn known_fnv1a_vector() {
        // FNV-1a 64-bit of the empty string is the offset basis.
        assert_eq!(fnv1a_64(b""), FNV_OFFSET_BASIS);
    }
}
