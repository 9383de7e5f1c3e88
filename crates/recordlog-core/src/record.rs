//! Log records and their identities

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::id::IdAllocator;
use crate::timestamp::TimeStamp;

/// Label of the internal category used by the store to report on itself
///
/// Internal records never receive an id.
pub const INTERNAL_LABEL: &str = "recordlog";

/// Maximum length of a custom kind label, in UTF-16 code units
pub const MAX_CUSTOM_LABEL_LEN: usize = 15;

/// Kind of a log record
///
/// The explicit discriminants are the on-disk kind bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordKind {
    Info,
    Error,
    CriticalError,
    Success,
    CodeFlow,
    /// User-defined kind with its label
    Custom(String),
    Debug,
    Warning,
}

impl RecordKind {
    /// All kinds that are not custom, in on-disk order
    pub const BUILTIN: [RecordKind; 7] = [
        RecordKind::Info,
        RecordKind::Error,
        RecordKind::CriticalError,
        RecordKind::Success,
        RecordKind::CodeFlow,
        RecordKind::Debug,
        RecordKind::Warning,
    ];

    /// Kind byte in the binary layout
    pub fn as_byte(&self) -> u8 {
        match self {
            Self::Info => 0,
            Self::Error => 1,
            Self::CriticalError => 2,
            Self::Success => 3,
            Self::CodeFlow => 4,
            Self::Custom(_) => 5,
            Self::Debug => 6,
            Self::Warning => 7,
        }
    }

    /// Build a kind from its byte; `label` is only used for custom kinds
    pub fn from_byte(byte: u8, label: String) -> Option<Self> {
        Some(match byte {
            0 => Self::Info,
            1 => Self::Error,
            2 => Self::CriticalError,
            3 => Self::Success,
            4 => Self::CodeFlow,
            5 => Self::Custom(label),
            6 => Self::Debug,
            7 => Self::Warning,
            _ => return None,
        })
    }

    /// Channel name of this kind: the upper-case kind name, or the custom label
    pub fn name(&self) -> &str {
        match self {
            Self::Info => "INFO",
            Self::Error => "ERROR",
            Self::CriticalError => "CRITICAL_ERROR",
            Self::Success => "SUCCESS",
            Self::CodeFlow => "CODE_FLOW",
            Self::Custom(label) => label,
            Self::Debug => "DEBUG",
            Self::Warning => "WARNING",
        }
    }

    /// Look up a built-in kind by name, ignoring case
    pub fn builtin_by_name(name: &str) -> Option<Self> {
        Self::BUILTIN
            .iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(name))
            .cloned()
    }

    /// Custom label, if this is a custom kind
    pub fn custom_label(&self) -> Option<&str> {
        match self {
            Self::Custom(label) => Some(label),
            _ => None,
        }
    }

    pub fn is_custom(&self) -> bool {
        matches!(self, Self::Custom(_))
    }

    /// Whether this is the store's own internal category
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::Custom(label) if label == INTERNAL_LABEL)
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Importance level of a record
///
/// Secondary records are never tracked for duplicates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Level {
    #[default]
    Primary,
    Secondary,
}

impl Level {
    pub fn as_byte(self) -> u8 {
        match self {
            Self::Primary => 0,
            Self::Secondary => 1,
        }
    }

    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::Primary),
            1 => Some(Self::Secondary),
            _ => None,
        }
    }
}

/// Record identifier
///
/// Assigned ids start at 1. Internal records stay `Unassigned` and are
/// written as 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordId {
    Assigned(u32),
    Unassigned,
}

impl RecordId {
    /// Wire value of the id
    pub fn as_u32(self) -> u32 {
        match self {
            Self::Assigned(id) => id,
            Self::Unassigned => 0,
        }
    }

    /// Inverse of [`as_u32`](Self::as_u32)
    pub fn from_u32(raw: u32) -> Self {
        if raw == 0 {
            Self::Unassigned
        } else {
            Self::Assigned(raw)
        }
    }

    pub fn assigned(self) -> Option<u32> {
        match self {
            Self::Assigned(id) => Some(id),
            Self::Unassigned => None,
        }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Assigned(id) => write!(f, "{id}"),
            Self::Unassigned => Ok(()),
        }
    }
}

/// Key grouping records with identical content
///
/// Derived from message, kind and custom label; id and timestamp are left
/// out so that repeats at different times collide.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DuplicationKey([u8; 32]);

impl DuplicationKey {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for DuplicationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DuplicationKey({})", &hex::encode(self.0)[..16])
    }
}

/// What makes two records "the same record"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordIdentity {
    /// Records with an assigned id are compared by id
    Id(u32),
    /// Id-less records are compared by a digest of their content
    Content([u8; 32]),
}

/// One log event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    pub kind: RecordKind,
    pub level: Level,
    pub message: String,
    pub timestamp: TimeStamp,
    /// Set once a later record with the same content is seen
    pub is_duplicate: bool,
}

impl Record {
    /// Create a record stamped with the current time
    ///
    /// Takes an id from `ids` unless the kind is the internal category.
    pub fn new(kind: RecordKind, message: impl Into<String>, level: Level, ids: &IdAllocator) -> Self {
        let id = if kind.is_internal() {
            RecordId::Unassigned
        } else {
            RecordId::Assigned(ids.next_id())
        };
        Self {
            id,
            kind,
            level,
            message: message.into(),
            timestamp: TimeStamp::now(),
            is_duplicate: false,
        }
    }

    /// Create a record in the internal category
    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            id: RecordId::Unassigned,
            kind: RecordKind::Custom(INTERNAL_LABEL.to_string()),
            level: Level::Primary,
            message: message.into(),
            timestamp: TimeStamp::now(),
            is_duplicate: false,
        }
    }

    /// Assemble a record from already-known parts
    pub fn from_parts(
        id: RecordId,
        kind: RecordKind,
        level: Level,
        message: impl Into<String>,
        timestamp: TimeStamp,
    ) -> Self {
        Self {
            id,
            kind,
            level,
            message: message.into(),
            timestamp,
            is_duplicate: false,
        }
    }

    pub fn is_internal(&self) -> bool {
        self.kind.is_internal()
    }

    /// Content key used to group repeats
    pub fn duplication_key(&self) -> DuplicationKey {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&[self.kind.as_byte()]);
        if let Some(label) = self.kind.custom_label() {
            hasher.update(&(label.len() as u64).to_le_bytes());
            hasher.update(label.as_bytes());
        }
        hasher.update(self.message.as_bytes());
        DuplicationKey(*hasher.finalize().as_bytes())
    }

    /// Identity used to reject the same record twice
    pub fn identity(&self) -> RecordIdentity {
        match self.id {
            RecordId::Assigned(id) => RecordIdentity::Id(id),
            RecordId::Unassigned => {
                let mut hasher = blake3::Hasher::new();
                hasher.update(self.duplication_key().as_bytes());
                hasher.update(&self.timestamp.unix_seconds.to_le_bytes());
                hasher.update(&self.timestamp.milliseconds.to_le_bytes());
                RecordIdentity::Content(*hasher.finalize().as_bytes())
            }
        }
    }

    /// Human-readable line used by the text mirror
    ///
    /// `<id>\t<KIND>` padded with tabs, the formatted time, a tab, the message.
    pub fn text_line(&self, date_time_format: &str) -> String {
        let kind = self.kind.name();
        let pad = if kind.len() <= "SUCCESS".len() {
            "\t\t\t"
        } else {
            "\t\t"
        };
        format!(
            "{}\t{}{}{}\t{}",
            self.id,
            kind,
            pad,
            self.timestamp.format(date_time_format),
            self.message
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_bytes_round_trip() {
        for kind in RecordKind::BUILTIN {
            let byte = kind.as_byte();
            assert_eq!(RecordKind::from_byte(byte, String::new()), Some(kind));
        }
        assert_eq!(
            RecordKind::from_byte(5, "CONSOLE".into()),
            Some(RecordKind::Custom("CONSOLE".into()))
        );
        assert_eq!(RecordKind::from_byte(8, String::new()), None);
    }

    #[test]
    fn test_builtin_by_name_ignores_case() {
        assert_eq!(RecordKind::builtin_by_name("warning"), Some(RecordKind::Warning));
        assert_eq!(
            RecordKind::builtin_by_name("Critical_Error"),
            Some(RecordKind::CriticalError)
        );
        assert_eq!(RecordKind::builtin_by_name("CONSOLE"), None);
    }

    #[test]
    fn test_internal_records_have_no_id() {
        let ids = IdAllocator::new();
        let internal = Record::new(
            RecordKind::Custom(INTERNAL_LABEL.into()),
            "self check",
            Level::Primary,
            &ids,
        );
        assert_eq!(internal.id, RecordId::Unassigned);
        assert_eq!(ids.current(), 0);

        let normal = Record::new(RecordKind::Info, "hello", Level::Primary, &ids);
        assert_eq!(normal.id, RecordId::Assigned(1));
        assert!(Record::internal("x").is_internal());
    }

    #[test]
    fn test_duplication_key_ignores_time_and_id() {
        let a = Record::from_parts(
            RecordId::Assigned(1),
            RecordKind::Error,
            Level::Primary,
            "disk full",
            TimeStamp::new(10, 0),
        );
        let b = Record::from_parts(
            RecordId::Assigned(2),
            RecordKind::Error,
            Level::Secondary,
            "disk full",
            TimeStamp::new(99, 500),
        );
        assert_eq!(a.duplication_key(), b.duplication_key());
    }

    #[test]
    fn test_duplication_key_separates_kind_and_label() {
        let info = Record::from_parts(
            RecordId::Assigned(1),
            RecordKind::Info,
            Level::Primary,
            "same",
            TimeStamp::default(),
        );
        let warn = Record {
            kind: RecordKind::Warning,
            ..info.clone()
        };
        let custom_a = Record {
            kind: RecordKind::Custom("A".into()),
            ..info.clone()
        };
        let custom_b = Record {
            kind: RecordKind::Custom("B".into()),
            ..info.clone()
        };

        assert_ne!(info.duplication_key(), warn.duplication_key());
        assert_ne!(custom_a.duplication_key(), custom_b.duplication_key());
    }

    #[test]
    fn test_identity() {
        let assigned = Record::from_parts(
            RecordId::Assigned(42),
            RecordKind::Info,
            Level::Primary,
            "x",
            TimeStamp::default(),
        );
        assert_eq!(assigned.identity(), RecordIdentity::Id(42));

        let a = Record::internal("same");
        let mut b = a.clone();
        assert_eq!(a.identity(), b.identity());
        b.timestamp = TimeStamp::new(a.timestamp.unix_seconds + 1, 0);
        assert_ne!(a.identity(), b.identity());
    }

    #[test]
    fn test_text_line_padding() {
        let short = Record::from_parts(
            RecordId::Assigned(3),
            RecordKind::Info,
            Level::Primary,
            "started",
            TimeStamp::new(0, 0),
        );
        let line = short.text_line("%Y");
        assert!(line.starts_with("3\tINFO\t\t\t"));
        assert!(line.ends_with("\tstarted"));

        let long = Record {
            kind: RecordKind::CriticalError,
            ..short
        };
        assert!(long.text_line("%Y").starts_with("3\tCRITICAL_ERROR\t\t"));
        assert!(!long.text_line("%Y").contains("\t\t\t"));

        let internal = Record::internal("note");
        assert!(internal.text_line("%Y").starts_with("\trecordlog\t\t"));
    }
}
