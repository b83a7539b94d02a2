//! Binary codec for the persisted saved-network record.
//!
//! Record layout:
//! ```text
//! [magic:2][version:1][count:1][entry × count][crc32:4]
//! entry: [ssid_len:1][ssid:32][pass_len:1][passphrase:64]
//!        [success_rank:4][slot_priority:4][valid:1]      = 107 bytes
//! ```
//! All multi-byte integers are big-endian.  The CRC-32 (IEEE) tag is computed
//! over every byte preceding it, so the tag covers the header as well as the
//! entries.
//!
//! The decoder is deliberately unforgiving: a record that is truncated, has
//! the wrong magic or version, carries an impossible count, is not an exact
//! multiple of the entry width, or fails the tag check is rejected with a
//! typed error.  The store above treats every rejection the same way – as an
//! absent record – so a damaged blob can never be half-trusted into the
//! running system.

use thiserror::Error;

use crate::domain::credential::{
    Credential, CredentialSet, MAX_SAVED_NETWORKS, PASSPHRASE_MAX_LEN, SSID_MAX_LEN,
};

/// First two bytes of every record.
pub const STORE_MAGIC: [u8; 2] = *b"WM";

/// Current record format version.
pub const STORE_VERSION: u8 = 1;

/// Fixed header size: magic (2) + version (1) + count (1).
pub const HEADER_SIZE: usize = 4;

/// Serialized width of one credential entry.
pub const ENTRY_SIZE: usize = 1 + SSID_MAX_LEN + 1 + PASSPHRASE_MAX_LEN + 4 + 4 + 1;

/// Size of the trailing CRC-32 tag.
pub const TAG_SIZE: usize = 4;

/// Errors that can occur while decoding a persisted record.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BlobError {
    /// The record is shorter than the minimum possible size.
    #[error("record too short: need at least {needed} bytes, got {available}")]
    Truncated { needed: usize, available: usize },

    /// The record does not start with the expected magic bytes.
    #[error("bad magic: {0:02X?}")]
    BadMagic([u8; 2]),

    /// The format version is not one this build understands.
    #[error("unsupported record version: {0}")]
    UnsupportedVersion(u8),

    /// The entry count exceeds the store capacity.
    #[error("entry count {0} exceeds capacity {MAX_SAVED_NETWORKS}")]
    BadEntryCount(u8),

    /// The total length does not match header + count × entry + tag; in
    /// particular the entry region is not an exact multiple of the entry width.
    #[error("record length mismatch: expected {expected} bytes, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    /// The stored CRC-32 tag does not match the serialized content.
    #[error("integrity tag mismatch: stored {stored:#010x}, computed {computed:#010x}")]
    IntegrityMismatch { stored: u32, computed: u32 },

    /// An entry's fields are out of range or not valid UTF-8.
    #[error("malformed entry {index}: {reason}")]
    MalformedEntry { index: usize, reason: String },
}

// ── Encoding ──────────────────────────────────────────────────────────────────

/// Serializes a [`CredentialSet`] into a tagged record ready for stable
/// storage.
///
/// The caller is expected to hand the returned bytes to the key-value store
/// unmodified; the trailing tag is recomputed on every call.
pub fn encode_store(set: &CredentialSet) -> Vec<u8> {
    let entries = set.entries();
    let mut buf = Vec::with_capacity(HEADER_SIZE + entries.len() * ENTRY_SIZE + TAG_SIZE);

    buf.extend_from_slice(&STORE_MAGIC);
    buf.push(STORE_VERSION);
    buf.push(entries.len() as u8);

    for entry in entries {
        encode_entry(&mut buf, entry);
    }

    let tag = crc32fast::hash(&buf);
    buf.extend_from_slice(&tag.to_be_bytes());
    buf
}

fn encode_entry(buf: &mut Vec<u8>, entry: &Credential) {
    let ssid = entry.ssid.as_bytes();
    buf.push(ssid.len() as u8);
    buf.extend_from_slice(ssid);
    buf.extend(std::iter::repeat(0u8).take(SSID_MAX_LEN - ssid.len()));

    let pass = entry.passphrase.as_bytes();
    buf.push(pass.len() as u8);
    buf.extend_from_slice(pass);
    buf.extend(std::iter::repeat(0u8).take(PASSPHRASE_MAX_LEN - pass.len()));

    buf.extend_from_slice(&entry.success_rank.to_be_bytes());
    buf.extend_from_slice(&entry.slot_priority.to_be_bytes());
    buf.push(if entry.valid { 0x01 } else { 0x00 });
}

// ── Decoding ──────────────────────────────────────────────────────────────────

/// Decodes and verifies a persisted record.
///
/// # Errors
///
/// Returns a [`BlobError`] describing the first structural or integrity
/// problem found.  Callers treat any error as "record absent".
pub fn decode_store(bytes: &[u8]) -> Result<CredentialSet, BlobError> {
    let minimum = HEADER_SIZE + TAG_SIZE;
    if bytes.len() < minimum {
        return Err(BlobError::Truncated {
            needed: minimum,
            available: bytes.len(),
        });
    }

    let magic = [bytes[0], bytes[1]];
    if magic != STORE_MAGIC {
        return Err(BlobError::BadMagic(magic));
    }

    let version = bytes[2];
    if version != STORE_VERSION {
        return Err(BlobError::UnsupportedVersion(version));
    }

    let count = bytes[3];
    if count as usize > MAX_SAVED_NETWORKS {
        return Err(BlobError::BadEntryCount(count));
    }

    // The entry region must be an exact multiple of the entry width and
    // agree with the declared count.
    let entry_region = bytes.len() - HEADER_SIZE - TAG_SIZE;
    let expected = HEADER_SIZE + count as usize * ENTRY_SIZE + TAG_SIZE;
    if bytes.len() != expected || entry_region % ENTRY_SIZE != 0 {
        return Err(BlobError::LengthMismatch {
            expected,
            actual: bytes.len(),
        });
    }

    let tag_offset = bytes.len() - TAG_SIZE;
    let stored = u32::from_be_bytes([
        bytes[tag_offset],
        bytes[tag_offset + 1],
        bytes[tag_offset + 2],
        bytes[tag_offset + 3],
    ]);
    let computed = crc32fast::hash(&bytes[..tag_offset]);
    if stored != computed {
        return Err(BlobError::IntegrityMismatch { stored, computed });
    }

    let mut entries = Vec::with_capacity(count as usize);
    for index in 0..count as usize {
        let offset = HEADER_SIZE + index * ENTRY_SIZE;
        entries.push(decode_entry(&bytes[offset..offset + ENTRY_SIZE], index)?);
    }

    Ok(CredentialSet::from_entries(entries))
}

fn decode_entry(e: &[u8], index: usize) -> Result<Credential, BlobError> {
    let ssid_len = e[0] as usize;
    if ssid_len == 0 || ssid_len > SSID_MAX_LEN {
        return Err(BlobError::MalformedEntry {
            index,
            reason: format!("ssid length {ssid_len} out of range"),
        });
    }
    let ssid = std::str::from_utf8(&e[1..1 + ssid_len])
        .map_err(|err| BlobError::MalformedEntry {
            index,
            reason: format!("ssid is not valid UTF-8: {err}"),
        })?
        .to_string();

    let pass_off = 1 + SSID_MAX_LEN;
    let pass_len = e[pass_off] as usize;
    if pass_len > PASSPHRASE_MAX_LEN {
        return Err(BlobError::MalformedEntry {
            index,
            reason: format!("passphrase length {pass_len} out of range"),
        });
    }
    let passphrase = std::str::from_utf8(&e[pass_off + 1..pass_off + 1 + pass_len])
        .map_err(|err| BlobError::MalformedEntry {
            index,
            reason: format!("passphrase is not valid UTF-8: {err}"),
        })?
        .to_string();

    let rank_off = pass_off + 1 + PASSPHRASE_MAX_LEN;
    let success_rank = u32::from_be_bytes([e[rank_off], e[rank_off + 1], e[rank_off + 2], e[rank_off + 3]]);
    let slot_priority = u32::from_be_bytes([
        e[rank_off + 4],
        e[rank_off + 5],
        e[rank_off + 6],
        e[rank_off + 7],
    ]);
    let valid = e[rank_off + 8] != 0;

    Ok(Credential {
        ssid,
        passphrase,
        success_rank,
        slot_priority,
        valid,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
