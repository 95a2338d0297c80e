//! Shard index reader — validates and rebuilds a persisted trie.

use std::fs;
use std::io;
use std::path::Path;

use crate::trie::CountTrie;
use crate::SEP;

use super::error::IndexError;
use super::format::{le_u16, le_u32, le_u64, IndexHeader, HEADER_SIZE, MAGIC, VERSION};

fn corrupt(path: &Path, reason: impl Into<String>) -> IndexError {
    IndexError::Corrupt {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

/// Load a persisted shard index. Any mismatch (magic, version, either
/// checksum, record framing, header/record disagreement) fails with an
/// error naming the file, so the caller knows which shard to rebuild.
pub fn load(path: &Path) -> Result<CountTrie, IndexError> {
    let data = match fs::read(path) {
        Ok(data) => data,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(IndexError::NotFound(path.to_path_buf()))
        }
        Err(e) => return Err(e.into()),
    };
    decode(&data, path)
}

/// Decode index bytes; `path` is used only for error context.
pub fn decode(data: &[u8], path: &Path) -> Result<CountTrie, IndexError> {
    if data.len() < HEADER_SIZE + 4 {
        return Err(corrupt(path, "truncated header"));
    }
    if data[0..4] != MAGIC {
        return Err(IndexError::BadMagic {
            path: path.to_path_buf(),
        });
    }
    let version = le_u32(&data[4..8]);
    if version != VERSION {
        return Err(IndexError::BadVersion {
            path: path.to_path_buf(),
            expected: VERSION,
            found: version,
        });
    }
    let header = IndexHeader::from_bytes(&data[..HEADER_SIZE])
        .ok_or_else(|| corrupt(path, "header checksum mismatch"))?;

    let (records, crc_bytes) = data[HEADER_SIZE..].split_at(data.len() - HEADER_SIZE - 4);
    let stored_crc = le_u32(crc_bytes);
    if crc32fast::hash(records) != stored_crc {
        return Err(corrupt(path, "record checksum mismatch"));
    }

    let mut trie = CountTrie::new();
    let mut off = 0usize;
    for _ in 0..header.distinct {
        if records.len() - off < 2 {
            return Err(corrupt(path, "truncated record"));
        }
        let key_len = le_u16(&records[off..]) as usize;
        off += 2;
        if records.len() - off < key_len + 8 {
            return Err(corrupt(path, "truncated record"));
        }
        let key = std::str::from_utf8(&records[off..off + key_len])
            .map_err(|_| corrupt(path, "non-UTF-8 key"))?;
        off += key_len;
        let count = le_u64(&records[off..]);
        off += 8;
        let tokens: Vec<&str> = key.split(SEP).collect();
        trie.insert_count(&tokens, count);
    }
    if off != records.len() {
        return Err(corrupt(path, "trailing bytes after records"));
    }
    if trie.distinct_keys() != header.distinct || trie.occurrences() != header.occurrences {
        return Err(corrupt(path, "header/record totals disagree"));
    }
    Ok(trie)
}
