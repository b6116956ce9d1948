//! Binary envelope for entries persisted as a single blob
//!
//! Layout (little-endian):
//!
//! ```text
//! magic "TCEV" | version u8 | field* | crc32 u32
//! field = tag u8 | len u32 | value[len]
//! ```
//!
//! Tags: 1 = key (UTF-8), 2 = deadline (f64 seconds), 3 = payload.
//! Unknown tags are skipped. A missing field decodes to its default.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

use crate::entry::{Deadline, Entry};

const MAGIC: &[u8; 4] = b"TCEV";
const VERSION: u8 = 1;

const TAG_KEY: u8 = 1;
const TAG_DEADLINE: u8 = 2;
const TAG_PAYLOAD: u8 = 3;

const HEADER_LEN: usize = MAGIC.len() + 1;
const FIELD_HEADER_LEN: usize = 1 + 4;
const CHECKSUM_LEN: usize = 4;

#[derive(Error, Debug, PartialEq)]
pub enum EnvelopeError {
    #[error("Envelope too short: {0} bytes")]
    TooShort(usize),

    #[error("Bad envelope magic")]
    BadMagic,

    #[error("Unsupported envelope version: {0}")]
    UnsupportedVersion(u8),

    #[error("Checksum mismatch: expected {expected:#010x}, got {actual:#010x}")]
    ChecksumMismatch { expected: u32, actual: u32 },

    #[error("Truncated field with tag {0}")]
    Truncated(u8),

    #[error("Key is not valid UTF-8")]
    InvalidKey,

    #[error("Deadline field has length {0}, expected 8")]
    InvalidDeadline(usize),
}

/// Encode an entry into its envelope representation
pub fn encode(entry: &Entry) -> Bytes {
    let key = entry.key.as_bytes();
    let mut buf = BytesMut::with_capacity(
        HEADER_LEN + 3 * FIELD_HEADER_LEN + key.len() + 8 + entry.payload.len() + CHECKSUM_LEN,
    );

    buf.put_slice(MAGIC);
    buf.put_u8(VERSION);

    put_field(&mut buf, TAG_KEY, key);
    put_field(&mut buf, TAG_DEADLINE, &entry.deadline.as_secs().to_le_bytes());
    put_field(&mut buf, TAG_PAYLOAD, &entry.payload);

    let checksum = crc32fast::hash(&buf);
    buf.put_u32_le(checksum);

    buf.freeze()
}

fn put_field(buf: &mut BytesMut, tag: u8, value: &[u8]) {
    buf.put_u8(tag);
    buf.put_u32_le(value.len() as u32);
    buf.put_slice(value);
}

/// Decode an envelope back into an entry
pub fn decode(data: &[u8]) -> Result<Entry, EnvelopeError> {
    if data.len() < HEADER_LEN + CHECKSUM_LEN {
        return Err(EnvelopeError::TooShort(data.len()));
    }
    if &data[..MAGIC.len()] != MAGIC {
        return Err(EnvelopeError::BadMagic);
    }
    let version = data[MAGIC.len()];
    if version != VERSION {
        return Err(EnvelopeError::UnsupportedVersion(version));
    }

    let (body, mut trailer) = data.split_at(data.len() - CHECKSUM_LEN);
    let expected = trailer.get_u32_le();
    let actual = crc32fast::hash(body);
    if expected != actual {
        return Err(EnvelopeError::ChecksumMismatch { expected, actual });
    }

    let mut entry = Entry::default();
    let mut fields = &body[HEADER_LEN..];

    while fields.has_remaining() {
        if fields.remaining() < FIELD_HEADER_LEN {
            return Err(EnvelopeError::Truncated(fields[0]));
        }
        let tag = fields.get_u8();
        let len = fields.get_u32_le() as usize;
        if fields.remaining() < len {
            return Err(EnvelopeError::Truncated(tag));
        }
        let value = &fields[..len];

        match tag {
            TAG_KEY => {
                entry.key = std::str::from_utf8(value)
                    .map_err(|_| EnvelopeError::InvalidKey)?
                    .to_string();
            }
            TAG_DEADLINE => {
                let raw: [u8; 8] = value
                    .try_into()
                    .map_err(|_| EnvelopeError::InvalidDeadline(len))?;
                entry.deadline = Deadline::from_secs(f64::from_le_bytes(raw));
            }
            TAG_PAYLOAD => {
                entry.payload = Bytes::copy_from_slice(value);
            }
            // Fields written by a newer encoder
            _ => {}
        }

        fields.advance(len);
    }

    Ok(entry)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a raw envelope from arbitrary fields, with a valid checksum
    fn raw_envelope(fields: &[(u8, &[u8])]) -> Vec<u8> {
        let mut buf = BytesMut::new();
        buf.put_slice(MAGIC);
        buf.put_u8(VERSION);
        for (tag, value) in fields {
            put_field(&mut buf, *tag, value);
        }
        let checksum = crc32fast::hash(&buf);
        buf.put_u32_le(checksum);
        buf.to_vec()
    }

    #[test]
    fn test_roundtrip() {
        let deadline = Deadline::from_secs(1_700_000_000.5);
        let entry = Entry::new("avatar", vec![0u8, 1, 2, 255], deadline);
        let decoded = decode(&encode(&entry)).unwrap();
        assert_eq!(decoded, entry);
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let entry = Entry::new("k", "payload", Deadline::NEVER);
        assert_eq!(encode(&entry), encode(&entry.clone()));
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let decoded = decode(&raw_envelope(&[])).unwrap();
        assert_eq!(decoded.key, "");
        assert!(decoded.payload.is_empty());
        assert!(decoded.deadline.is_never());

        let decoded = decode(&raw_envelope(&[(TAG_PAYLOAD, b"abc")])).unwrap();
        assert_eq!(decoded.key, "");
        assert_eq!(&decoded.payload[..], b"abc");
    }

    #[test]
    fn test_unknown_tags_are_skipped() {
        let decoded = decode(&raw_envelope(&[
            (TAG_KEY, b"k"),
            (42, b"from the future"),
            (TAG_PAYLOAD, b"v"),
        ]))
        .unwrap();
        assert_eq!(decoded.key, "k");
        assert_eq!(&decoded.payload[..], b"v");
    }

    #[test]
    fn test_rejects_garbage() {
        assert_eq!(decode(b""), Err(EnvelopeError::TooShort(0)));
        assert_eq!(decode(b"not an envelope"), Err(EnvelopeError::BadMagic));

        let mut wrong_version = raw_envelope(&[]);
        wrong_version[4] = 9;
        assert_eq!(
            decode(&wrong_version),
            Err(EnvelopeError::UnsupportedVersion(9))
        );
    }

    #[test]
    fn test_detects_corruption() {
        let mut data = encode(&Entry::new("k", "value", Deadline::NEVER)).to_vec();
        let last_payload_byte = data.len() - CHECKSUM_LEN - 1;
        data[last_payload_byte] ^= 0xff;
        assert!(matches!(
            decode(&data),
            Err(EnvelopeError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_truncated_and_invalid_fields() {
        let mut buf = BytesMut::new();
        buf.put_slice(MAGIC);
        buf.put_u8(VERSION);
        buf.put_u8(TAG_PAYLOAD);
        buf.put_u32_le(100);
        buf.put_slice(b"short");
        let checksum = crc32fast::hash(&buf);
        buf.put_u32_le(checksum);
        assert_eq!(decode(&buf), Err(EnvelopeError::Truncated(TAG_PAYLOAD)));

        assert_eq!(
            decode(&raw_envelope(&[(TAG_KEY, &[0xff, 0xfe])])),
            Err(EnvelopeError::InvalidKey)
        );
        assert_eq!(
            decode(&raw_envelope(&[(TAG_DEADLINE, &[1, 2, 3])])),
            Err(EnvelopeError::InvalidDeadline(3))
        );
    }
}
