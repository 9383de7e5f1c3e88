//! Grouping of repeated records
//!
//! Records with the same duplication key (kind, custom label, message) are
//! grouped under the first one seen. A group becomes visible through
//! [`DuplicateTracker::duplications`] at its second occurrence.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use recordlog_core::{DuplicationKey, Level, Record, RecordId, RecordIdentity, TimeStamp};
use tracing::trace;

/// One sighting of a record's content
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Occurrence {
    pub timestamp: TimeStamp,
    pub id: RecordId,
}

impl Occurrence {
    fn of(record: &Record) -> Self {
        Self {
            timestamp: record.timestamp,
            id: record.id,
        }
    }
}

/// A group of records sharing a duplication key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicationEntry {
    /// First record seen with this content
    pub original: Record,
    /// Every sighting in arrival order, the original included
    pub occurrences: Vec<Occurrence>,
}

impl DuplicationEntry {
    pub fn occurrence_count(&self) -> usize {
        self.occurrences.len()
    }
}

/// Result of [`DuplicateTracker::observe`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DuplicationOutcome {
    /// Secondary records are not tracked
    Skipped,
    FirstSeen,
    RepeatOfExisting {
        /// Identity of the first record with this content
        original: RecordIdentity,
        original_id: RecordId,
        /// Sightings so far, this one included
        occurrence_count: usize,
    },
}

impl DuplicationOutcome {
    pub fn is_repeat(&self) -> bool {
        matches!(self, Self::RepeatOfExisting { .. })
    }
}

/// Hash-based tracker of repeated record content
///
/// Every distinct primary content keeps its first record for the life of
/// the tracker, so memory grows with the number of distinct messages.
/// Only [`clear`](Self::clear) releases it.
#[derive(Debug, Default)]
pub struct DuplicateTracker {
    entries: HashMap<DuplicationKey, DuplicationEntry>,
    /// Keys in the order they reached two occurrences
    promoted: Vec<DuplicationKey>,
}

impl DuplicateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a new record
    ///
    /// On a repeat both the incoming record and the stored original are
    /// flagged as duplicates; the caller is responsible for flagging any
    /// other copy of the original it holds.
    pub fn observe(&mut self, record: &mut Record) -> DuplicationOutcome {
        if record.level == Level::Secondary {
            return DuplicationOutcome::Skipped;
        }

        let key = record.duplication_key();
        let entry = match self.entries.entry(key) {
            Entry::Vacant(vacant) => {
                vacant.insert(DuplicationEntry {
                    original: record.clone(),
                    occurrences: vec![Occurrence::of(record)],
                });
                return DuplicationOutcome::FirstSeen;
            }
            Entry::Occupied(occupied) => occupied.into_mut(),
        };

        entry.original.is_duplicate = true;
        record.is_duplicate = true;
        entry.occurrences.push(Occurrence::of(record));

        let occurrence_count = entry.occurrences.len();
        if occurrence_count == 2 {
            self.promoted.push(key);
        }
        trace!(key = ?key, occurrence_count, "Repeated record");

        DuplicationOutcome::RepeatOfExisting {
            original: entry.original.identity(),
            original_id: entry.original.id,
            occurrence_count,
        }
    }

    /// Whether observing `record` would report a repeat, without tracking it
    pub fn is_known(&self, record: &Record) -> bool {
        record.level == Level::Primary && self.entries.contains_key(&record.duplication_key())
    }

    /// Groups with at least two occurrences, in promotion order
    pub fn duplications(&self) -> Vec<&DuplicationEntry> {
        self.promoted
            .iter()
            .filter_map(|key| self.entries.get(key))
            .collect()
    }

    /// Sightings of a key so far (0 if never seen)
    pub fn occurrence_count(&self, key: &DuplicationKey) -> usize {
        self.entries
            .get(key)
            .map_or(0, DuplicationEntry::occurrence_count)
    }

    pub fn get(&self, key: &DuplicationKey) -> Option<&DuplicationEntry> {
        self.entries.get(key)
    }

    /// Number of distinct contents seen
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.promoted.clear();
    }
}
