//! Hash-gated skip logic for the per-file indexing algorithm:
//! `sha256(content)` compared against the file table's recorded hash.

use sha2::{Digest, Sha256};

use crate::model::FileTableEntry;

pub fn hash_content(content: &str) -> String {
    let digest = Sha256::digest(content.as_bytes());
    hex::encode(digest)
}

/// Whether a file needs re-parsing: no prior entry, a changed hash, or an
/// explicit `force` request.
pub fn needs_reindex(existing: Option<&FileTableEntry>, hash: &str, force: bool) -> bool {
    if force {
        return true;
    }
    match existing {
        Some(entry) => entry.content_hash != hash,
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn same_hash_skips_unless_forced() {
        let entry = FileTableEntry {
            project: "p".into(),
            path: "a.rs".into(),
            content_hash: hash_content("fn a() {}"),
            last_indexed: Utc::now(),
            unit_count: 1,
        };
        assert!(!needs_reindex(Some(&entry), &hash_content("fn a() {}"), false));
        assert!(needs_reindex(Some(&entry), &hash_content("fn a() {}"), true));
    }

    #[test]
    fn changed_hash_always_reindexes() {
        let entry = FileTableEntry {
            project: "p".into(),
            path: "a.rs".into(),
            content_hash: hash_content("fn a() {}"),
            last_indexed: Utc::now(),
            unit_count: 1,
        };
        assert!(needs_reindex(Some(&entry), &hash_content("fn a2() {}"), false));
    }

    #[test]
    fn missing_entry_always_reindexes() {
        assert!(needs_reindex(None, &hash_content("fn a() {}"), false));
    }
}
