//! Shard index writer — serializes a counting trie to bytes.

use std::fs;
use std::path::Path;

use crate::trie::CountTrie;

use super::error::IndexError;
use super::format::{IndexHeader, VERSION};
use crate::join_tokens;

/// Serialize a trie to the versioned binary format. The record section is
/// written in sorted key order, so equal tries encode to equal bytes.
pub fn encode(trie: &CountTrie) -> Result<Vec<u8>, IndexError> {
    let header = IndexHeader {
        version: VERSION,
        flags: 0,
        distinct: trie.distinct_keys(),
        occurrences: trie.occurrences(),
    };

    let mut out = Vec::new();
    out.extend_from_slice(&header.to_bytes());

    let records_start = out.len();
    let mut oversized: Option<usize> = None;
    trie.for_each_sorted(&mut |key, count| {
        if oversized.is_some() {
            return;
        }
        let joined = join_tokens(key);
        match u16::try_from(joined.len()) {
            Ok(key_len) => {
                out.extend_from_slice(&key_len.to_le_bytes());
                out.extend_from_slice(joined.as_bytes());
                out.extend_from_slice(&count.to_le_bytes());
            }
            Err(_) => oversized = Some(joined.len()),
        }
    });
    if let Some(len) = oversized {
        return Err(IndexError::KeyTooLong {
            len,
            max: u16::MAX as usize,
        });
    }

    let crc = crc32fast::hash(&out[records_start..]);
    out.extend_from_slice(&crc.to_le_bytes());
    Ok(out)
}

/// Serialize `trie` and write it to `path`.
pub fn persist(trie: &CountTrie, path: &Path) -> Result<(), IndexError> {
    let bytes = encode(trie)?;
    fs::write(path, bytes)?;
    Ok(())
}
