//! Bounded, id-ordered window of records
//!
//! The buffer keeps records in ascending id order whatever order they
//! arrive in, rejects a record whose identity is already present, and
//! evicts from one end once it grows past its bound. Which end is a
//! setting that window scrolling flips back and forth.

use std::collections::{HashSet, VecDeque};

use recordlog_core::{Record, RecordIdentity};
use serde::{Deserialize, Serialize};
use tracing::trace;

/// End that eviction removes records from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EvictionDirection {
    /// Drop the lowest ids first (default, used while following live records)
    #[default]
    EvictOldest,
    /// Drop the highest ids first (used while scrolling back in history)
    EvictNewest,
}

/// End at which a record is offered
///
/// Records with an id always land in id order; the end only decides where
/// the search starts and where id-less records go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertEnd {
    Front,
    Back,
}

/// Result of an insert
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    /// Stored; `evicted` holds whatever the bound pushed out, possibly the
    /// new record itself
    Inserted { evicted: Vec<Record> },
    /// A record with the same identity is already present
    Rejected,
}

impl InsertOutcome {
    pub fn is_inserted(&self) -> bool {
        matches!(self, Self::Inserted { .. })
    }
}

/// In-memory window of records, ascending by id
#[derive(Debug, Clone)]
pub struct BoundedOrderedBuffer {
    records: VecDeque<Record>,
    identities: HashSet<RecordIdentity>,
    /// 0 means unbounded
    max_size: usize,
    direction: EvictionDirection,
}

impl BoundedOrderedBuffer {
    /// Create a buffer holding at most `max_size` records (0 = unbounded)
    pub fn new(max_size: usize) -> Self {
        Self {
            records: VecDeque::new(),
            identities: HashSet::new(),
            max_size,
            direction: EvictionDirection::default(),
        }
    }

    pub fn with_direction(mut self, direction: EvictionDirection) -> Self {
        self.direction = direction;
        self
    }

    /// Offer a record at the newest end
    pub fn insert(&mut self, record: Record) -> InsertOutcome {
        self.insert_at(record, InsertEnd::Back)
    }

    /// Offer a record at the given end
    pub fn insert_at(&mut self, record: Record, end: InsertEnd) -> InsertOutcome {
        let identity = record.identity();
        if self.identities.contains(&identity) {
            trace!(?identity, "Rejected record already in buffer");
            return InsertOutcome::Rejected;
        }

        let pos = match record.id.assigned() {
            Some(id) => self.position_for(id, end),
            None => match end {
                InsertEnd::Front => 0,
                InsertEnd::Back => self.records.len(),
            },
        };
        self.identities.insert(identity);
        self.records.insert(pos, record);

        InsertOutcome::Inserted {
            evicted: self.enforce_bound(),
        }
    }

    /// Index at which an id keeps assigned ids ascending
    ///
    /// Id-less records are stepped over; they carry no order.
    fn position_for(&self, id: u32, end: InsertEnd) -> usize {
        match end {
            InsertEnd::Back => {
                let mut pos = self.records.len();
                while pos > 0 && self.records[pos - 1].id.assigned().is_none_or(|x| x > id) {
                    pos -= 1;
                }
                pos
            }
            InsertEnd::Front => {
                let mut pos = 0;
                while pos < self.records.len()
                    && self.records[pos].id.assigned().is_none_or(|x| x < id)
                {
                    pos += 1;
                }
                pos
            }
        }
    }

    fn enforce_bound(&mut self) -> Vec<Record> {
        let mut evicted = Vec::new();
        if self.max_size == 0 {
            return evicted;
        }
        while self.records.len() > self.max_size {
            let removed = match self.direction {
                EvictionDirection::EvictOldest => self.records.pop_front(),
                EvictionDirection::EvictNewest => self.records.pop_back(),
            };
            let Some(removed) = removed else { break };
            self.identities.remove(&removed.identity());
            evicted.push(removed);
        }
        evicted
    }

    /// Replace the contents with `records`
    ///
    /// Records are inserted one by one, so order, uniqueness and the bound
    /// still hold afterwards.
    pub fn replace(&mut self, records: impl IntoIterator<Item = Record>) {
        self.clear();
        for record in records {
            self.insert(record);
        }
    }

    /// Flag the record with `identity` as a duplicate; false if absent
    pub fn mark_duplicate(&mut self, identity: &RecordIdentity) -> bool {
        if !self.identities.contains(identity) {
            return false;
        }
        match self.records.iter_mut().find(|r| r.identity() == *identity) {
            Some(record) => {
                record.is_duplicate = true;
                true
            }
            None => false,
        }
    }

    /// Change the bound, evicting from the active end if needed
    pub fn set_max_size(&mut self, max_size: usize) -> Vec<Record> {
        self.max_size = max_size;
        self.enforce_bound()
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Affects future evictions only
    pub fn set_eviction_direction(&mut self, direction: EvictionDirection) {
        self.direction = direction;
    }

    pub fn eviction_direction(&self) -> EvictionDirection {
        self.direction
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Whether the bound has been reached (never true when unbounded)
    pub fn is_full(&self) -> bool {
        self.max_size > 0 && self.records.len() >= self.max_size
    }

    pub fn contains(&self, identity: &RecordIdentity) -> bool {
        self.identities.contains(identity)
    }

    pub fn first(&self) -> Option<&Record> {
        self.records.front()
    }

    pub fn last(&self) -> Option<&Record> {
        self.records.back()
    }

    /// Lowest assigned id in the buffer
    pub fn first_id(&self) -> Option<u32> {
        self.records.iter().find_map(|r| r.id.assigned())
    }

    /// Highest assigned id in the buffer
    pub fn last_id(&self) -> Option<u32> {
        self.records.iter().rev().find_map(|r| r.id.assigned())
    }

    pub fn get(&self, index: usize) -> Option<&Record> {
        self.records.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Record> {
        self.records.iter()
    }

    /// Copy of the contents, in order
    pub fn to_vec(&self) -> Vec<Record> {
        self.records.iter().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.records.clear();
        self.identities.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recordlog_core::{Level, RecordId, RecordKind, TimeStamp};

    fn record(id: u32) -> Record {
        Record::from_parts(
            RecordId::Assigned(id),
            RecordKind::Info,
            Level::Primary,
            format!("r{id}"),
            TimeStamp::new(id, 0),
        )
    }

    fn ids(buffer: &BoundedOrderedBuffer) -> Vec<u32> {
        buffer.iter().filter_map(|r| r.id.assigned()).collect()
    }

    #[test]
    fn test_in_order_inserts() {
        let mut buffer = BoundedOrderedBuffer::new(0);
        for id in 1..=5 {
            assert!(buffer.insert(record(id)).is_inserted());
        }
        assert_eq!(ids(&buffer), vec![1, 2, 3, 4, 5]);
        assert!(!buffer.is_full());
    }

    #[test]
    fn test_out_of_order_arrivals_are_sorted() {
        let mut buffer = BoundedOrderedBuffer::new(0);
        for id in [5, 2, 9, 1, 7] {
            buffer.insert(record(id));
        }
        buffer.insert_at(record(3), InsertEnd::Front);
        buffer.insert_at(record(8), InsertEnd::Front);
        assert_eq!(ids(&buffer), vec![1, 2, 3, 5, 7, 8, 9]);
    }

    #[test]
    fn test_neighbor_of_first_goes_to_front() {
        let mut buffer = BoundedOrderedBuffer::new(0);
        for id in 11..=15 {
            buffer.insert(record(id));
        }
        buffer.insert(record(10));
        assert_eq!(buffer.first_id(), Some(10));
        assert_eq!(buffer.last_id(), Some(15));
    }

    #[test]
    fn test_duplicate_identity_rejected() {
        let mut buffer = BoundedOrderedBuffer::new(0);
        buffer.insert(record(1));
        assert_eq!(buffer.insert(record(1)), InsertOutcome::Rejected);
        assert_eq!(buffer.len(), 1);

        let internal = Record::internal("note");
        assert!(buffer.insert(internal.clone()).is_inserted());
        assert_eq!(buffer.insert(internal), InsertOutcome::Rejected);
    }

    #[test]
    fn test_evict_oldest() {
        let mut buffer = BoundedOrderedBuffer::new(3);
        for id in 1..=3 {
            buffer.insert(record(id));
        }
        assert!(buffer.is_full());

        let outcome = buffer.insert(record(4));
        assert_eq!(
            outcome,
            InsertOutcome::Inserted {
                evicted: vec![record(1)]
            }
        );
        assert_eq!(ids(&buffer), vec![2, 3, 4]);

        // An evicted id can come back
        buffer.set_eviction_direction(EvictionDirection::EvictNewest);
        assert!(buffer.insert_at(record(1), InsertEnd::Front).is_inserted());
        assert_eq!(ids(&buffer), vec![1, 2, 3]);
    }

    #[test]
    fn test_evicting_the_new_record() {
        let mut buffer = BoundedOrderedBuffer::new(2);
        buffer.insert(record(5));
        buffer.insert(record(6));

        let outcome = buffer.insert_at(record(4), InsertEnd::Front);
        assert_eq!(
            outcome,
            InsertOutcome::Inserted {
                evicted: vec![record(4)]
            }
        );
        assert_eq!(ids(&buffer), vec![5, 6]);
        assert!(!buffer.contains(&RecordIdentity::Id(4)));
    }

    #[test]
    fn test_shrinking_the_bound() {
        let mut buffer = BoundedOrderedBuffer::new(0).with_direction(EvictionDirection::EvictNewest);
        for id in 1..=10 {
            buffer.insert(record(id));
        }
        let evicted = buffer.set_max_size(4);
        assert_eq!(evicted.len(), 6);
        assert_eq!(ids(&buffer), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_mark_duplicate() {
        let mut buffer = BoundedOrderedBuffer::new(0);
        buffer.insert(record(1));
        buffer.insert(record(2));

        assert!(buffer.mark_duplicate(&RecordIdentity::Id(2)));
        assert!(!buffer.mark_duplicate(&RecordIdentity::Id(3)));
        assert!(buffer.get(1).unwrap().is_duplicate);
        assert!(!buffer.get(0).unwrap().is_duplicate);
    }

    #[test]
    fn test_internal_records_follow_requested_end() {
        let mut buffer = BoundedOrderedBuffer::new(0);
        let a = Record::internal("a");
        let mut b = Record::internal("b");
        b.timestamp = TimeStamp::new(a.timestamp.unix_seconds + 1, 0);

        buffer.insert(a.clone());
        buffer.insert_at(b.clone(), InsertEnd::Front);
        assert_eq!(buffer.first().unwrap().message, "b");
        assert_eq!(buffer.last().unwrap().message, "a");
        assert_eq!(buffer.first_id(), None);
    }

    #[test]
    fn test_replace() {
        let mut buffer = BoundedOrderedBuffer::new(3);
        buffer.insert(record(100));
        buffer.replace((1..=5).map(record));
        assert_eq!(ids(&buffer), vec![3, 4, 5]);
    }
}
