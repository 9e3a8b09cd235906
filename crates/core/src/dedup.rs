use crate::models::{Chunk, ContentHash};
use sha2::{Digest, Sha256};
use std::collections::HashSet;

pub fn content_hash(text: &str) -> ContentHash {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    ContentHash::from_hex(format!("{:x}", hasher.finalize()))
}

#[derive(Debug, Default)]
pub struct Partition<'a> {
    pub fresh: Vec<&'a Chunk>,
    pub duplicates: Vec<&'a Chunk>,
}

/// Splits `chunks` into the ones whose content is not yet stored and the rest.
///
/// A hash seen earlier in the same batch counts as stored, so identical text
/// coming from two files in one run is kept once. `fresh` preserves input order.
pub fn partition<'a>(chunks: &'a [Chunk], existing: &HashSet<ContentHash>) -> Partition<'a> {
    let mut seen = HashSet::new();
    let mut result = Partition::default();

    for chunk in chunks {
        let hash = &chunk.content_hash;
        if existing.contains(hash) || !seen.insert(hash.clone()) {
            result.duplicates.push(chunk);
        } else {
            result.fresh.push(chunk);
        }
    }

    result
}
