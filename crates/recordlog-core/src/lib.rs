//! # Recordlog Core
//!
//! Record types and the fixed-size binary codec shared by every recordlog
//! crate.
//!
//! ## Key Types
//!
//! - [`Record`]: One log event (id, kind, level, message, timestamp)
//! - [`RecordKind`]: Built-in kinds plus user-defined custom labels
//! - [`IdAllocator`]: Monotonic, thread-safe id source
//! - [`TimeStamp`]: Seconds plus milliseconds, as stored on disk
//!
//! ## Binary layout
//!
//! [`codec::encode`] turns a record into exactly [`RECORD_SIZE`] bytes so a
//! record file can be addressed by index. See [`codec`] for the layout.

pub mod codec;
pub mod error;
pub mod id;
pub mod record;
pub mod timestamp;

pub use codec::{
    MESSAGE_CAPACITY, RECORD_SIZE, RecordBlock, decode, decode_slice, encode, truncate_message,
};
pub use error::CodecError;
pub use id::IdAllocator;
pub use record::{
    DuplicationKey, INTERNAL_LABEL, Level, MAX_CUSTOM_LABEL_LEN, Record, RecordId,
    RecordIdentity, RecordKind,
};
pub use timestamp::TimeStamp;
