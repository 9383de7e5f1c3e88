//! Fixed-size binary record codec
//!
//! Every record occupies exactly [`RECORD_SIZE`] bytes so that record `n` of
//! a file lives at byte offset `n * RECORD_SIZE`.
//!
//! ## Layout
//!
//! All integers little-endian, text as UTF-16 code units, zero padded:
//!
//! ```text
//! offset  size  field
//!      0     4  id (0 = unassigned)
//!      4     1  kind
//!      5     1  level
//!      6     1  is_duplicate
//!      7     4  unix seconds
//!     11     4  milliseconds (signed)
//!     15    30  custom label (15 code units)
//!     45   467  message (233 code units + 1 pad byte)
//! ```

use bytes::{Buf, BufMut, BytesMut};

use crate::error::CodecError;
use crate::record::{Level, MAX_CUSTOM_LABEL_LEN, Record, RecordId, RecordKind};
use crate::timestamp::TimeStamp;

/// Size of one encoded record
pub const RECORD_SIZE: usize = 512;

const ID_SIZE: usize = 4;
const KIND_SIZE: usize = 1;
const LEVEL_SIZE: usize = 1;
const IS_DUPLICATE_SIZE: usize = 1;
const UNIX_SECONDS_SIZE: usize = 4;
const MILLISECONDS_SIZE: usize = 4;

/// Width of the custom label field in bytes
pub const LABEL_BYTES: usize = MAX_CUSTOM_LABEL_LEN * 2;

/// Bytes in front of the message field
pub const MESSAGE_OFFSET: usize = ID_SIZE
    + KIND_SIZE
    + LEVEL_SIZE
    + IS_DUPLICATE_SIZE
    + UNIX_SECONDS_SIZE
    + MILLISECONDS_SIZE
    + LABEL_BYTES;

/// Width of the message field in bytes
pub const MESSAGE_BYTES: usize = RECORD_SIZE - MESSAGE_OFFSET;

/// Number of UTF-16 code units a message can keep
pub const MESSAGE_CAPACITY: usize = MESSAGE_BYTES / 2;

/// Marker placed between the kept prefix and suffix of a long message
pub const TRUNCATION_MARKER: &str = "...";

/// Code units kept from the end of a long message
pub const TRUNCATION_SUFFIX_LEN: usize = 4;

/// Below this capacity long messages are cut without a marker
const MIN_MARKED_CAPACITY: usize = 8;

const _: () = assert!(MESSAGE_OFFSET + MESSAGE_BYTES == RECORD_SIZE);
const _: () = assert!(MESSAGE_CAPACITY * 2 <= MESSAGE_BYTES);

/// One encoded record
pub type RecordBlock = [u8; RECORD_SIZE];

/// Check that a record can be encoded, without encoding it
pub fn validate(record: &Record) -> Result<(), CodecError> {
    label_units(&record.kind).map(|_| ())
}

/// Encode a record into its fixed-size block
///
/// Messages longer than [`MESSAGE_CAPACITY`] are shortened with
/// [`truncate_units`]. A custom label longer than
/// [`MAX_CUSTOM_LABEL_LEN`] is rejected.
pub fn encode(record: &Record) -> Result<RecordBlock, CodecError> {
    let label = label_units(&record.kind)?;
    let message: Vec<u16> = record.message.encode_utf16().collect();
    let message = truncate_units(&message, MESSAGE_CAPACITY);

    let mut buf = BytesMut::with_capacity(RECORD_SIZE);
    buf.put_u32_le(record.id.as_u32());
    buf.put_u8(record.kind.as_byte());
    buf.put_u8(record.level.as_byte());
    buf.put_u8(u8::from(record.is_duplicate));
    buf.put_u32_le(record.timestamp.unix_seconds);
    buf.put_i32_le(record.timestamp.milliseconds);
    put_units(&mut buf, &label, LABEL_BYTES);
    put_units(&mut buf, &message, MESSAGE_BYTES);

    let actual = buf.len();
    RecordBlock::try_from(&buf[..]).map_err(|_| CodecError::LayoutMismatch {
        expected: RECORD_SIZE,
        actual,
    })
}

/// Decode a block produced by [`encode`]
///
/// Text fields end at their first zero code unit. The label is dropped for
/// kinds other than custom.
pub fn decode(block: &RecordBlock) -> Result<Record, CodecError> {
    let mut buf = &block[..];

    let id = RecordId::from_u32(buf.get_u32_le());
    let kind_byte = buf.get_u8();
    let level_byte = buf.get_u8();
    let is_duplicate = buf.get_u8() != 0;
    let unix_seconds = buf.get_u32_le();
    let milliseconds = buf.get_i32_le();
    let label = take_string(&mut buf, LABEL_BYTES);
    let message = take_string(&mut buf, MESSAGE_BYTES);

    let kind = RecordKind::from_byte(kind_byte, label).ok_or(CodecError::UnknownKind(kind_byte))?;
    let level = Level::from_byte(level_byte).ok_or(CodecError::UnknownLevel(level_byte))?;

    let mut record = Record::from_parts(
        id,
        kind,
        level,
        message,
        TimeStamp::new(unix_seconds, milliseconds),
    );
    record.is_duplicate = is_duplicate;
    Ok(record)
}

/// Decode from a byte slice that must be exactly one block long
pub fn decode_slice(bytes: &[u8]) -> Result<Record, CodecError> {
    let block = RecordBlock::try_from(bytes).map_err(|_| CodecError::WrongBlockSize {
        expected: RECORD_SIZE,
        actual: bytes.len(),
    })?;
    decode(&block)
}

/// Shorten a UTF-16 sequence to at most `capacity` code units
///
/// Sequences that fit are returned as is. Otherwise, for capacities of 8 and
/// more, the result is a prefix, [`TRUNCATION_MARKER`] and the last
/// [`TRUNCATION_SUFFIX_LEN`] units, exactly `capacity` long. Smaller
/// capacities keep only the first `capacity` units. Neither cut splits a
/// surrogate pair, so text outside the BMP may come out one or two units
/// shorter.
pub fn truncate_units(units: &[u16], capacity: usize) -> Vec<u16> {
    if units.len() <= capacity {
        return units.to_vec();
    }
    if capacity < MIN_MARKED_CAPACITY {
        return units[..pair_safe_end(units, capacity)].to_vec();
    }

    let marker: Vec<u16> = TRUNCATION_MARKER.encode_utf16().collect();
    let prefix_len = pair_safe_end(units, capacity - marker.len() - TRUNCATION_SUFFIX_LEN);
    let mut suffix_start = units.len() - TRUNCATION_SUFFIX_LEN;
    if is_low_surrogate(units[suffix_start]) {
        suffix_start += 1;
    }

    let mut out = Vec::with_capacity(capacity);
    out.extend_from_slice(&units[..prefix_len]);
    out.extend_from_slice(&marker);
    out.extend_from_slice(&units[suffix_start..]);
    out
}

/// Cut point at or below `end` that does not split a surrogate pair
fn pair_safe_end(units: &[u16], end: usize) -> usize {
    if end > 0 && end < units.len() && is_low_surrogate(units[end]) {
        end - 1
    } else {
        end
    }
}

fn is_low_surrogate(unit: u16) -> bool {
    (0xDC00..=0xDFFF).contains(&unit)
}

/// [`truncate_units`] for strings
pub fn truncate_message(message: &str, capacity: usize) -> String {
    let units: Vec<u16> = message.encode_utf16().collect();
    String::from_utf16_lossy(&truncate_units(&units, capacity))
}

fn label_units(kind: &RecordKind) -> Result<Vec<u16>, CodecError> {
    let Some(label) = kind.custom_label() else {
        return Ok(Vec::new());
    };
    let units: Vec<u16> = label.encode_utf16().collect();
    if units.len() > MAX_CUSTOM_LABEL_LEN {
        return Err(CodecError::LabelTooLong {
            label: label.to_string(),
            len: units.len(),
            max: MAX_CUSTOM_LABEL_LEN,
        });
    }
    Ok(units)
}

fn put_units(buf: &mut BytesMut, units: &[u16], width: usize) {
    for unit in units {
        buf.put_u16_le(*unit);
    }
    buf.put_bytes(0, width.saturating_sub(units.len() * 2));
}

fn take_string(buf: &mut &[u8], width: usize) -> String {
    let (field, rest) = buf.split_at(width);
    let units: Vec<u16> = field
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .take_while(|unit| *unit != 0)
        .collect();
    *buf = rest;
    String::from_utf16_lossy(&units)
}
