//! A single log channel
//!
//! A channel routes each new record through its duplicate tracker, its
//! in-memory window and, when it has one, its record store. Browsable
//! channels can also page their window through the store's history.
//!
//! ## Modes
//!
//! - `AcceptingLive`: new records enter the window as they arrive
//! - `BrowsingHistory`: new records are still tracked and stored, but the
//!   window only changes through explicit history operations
//!
//! Any history operation switches to browsing; [`LogChannel::resume_live`]
//! switches back and reloads the newest records.

use std::sync::Arc;

use parking_lot::Mutex;
use recordlog_core::{DuplicationKey, Record, TimeStamp, codec};
use recordlog_storage::{RecordStore, StorageError, TextMirror};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, trace, warn};

use crate::buffer::{BoundedOrderedBuffer, EvictionDirection, InsertEnd, InsertOutcome};
use crate::duplicates::{DuplicateTracker, DuplicationEntry, DuplicationOutcome};
use crate::error::ChannelError;

/// Records read per request while scanning a time range
const SCAN_CHUNK: usize = 256;

/// Whether a channel can page through stored history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelCapability {
    /// Live window only
    Plain,
    /// Backed by a record store; supports scrolling, jumps and time filters
    Browsable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ChannelMode {
    #[default]
    AcceptingLive,
    BrowsingHistory,
}

/// Channel configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Window size (0 = unbounded)
    pub max_size: usize,
    /// Indexes probed on each side of a guess when locating a record
    pub probe_budget: u32,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            max_size: 2500,
            probe_budget: 500,
        }
    }
}

impl ChannelConfig {
    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    pub fn with_probe_budget(mut self, probe_budget: u32) -> Self {
        self.probe_budget = probe_budget;
        self
    }
}

/// What happened to one recorded record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordOutcome {
    pub duplication: DuplicationOutcome,
    /// Entered the window
    pub buffered: bool,
    /// Pushed out of the window by this insert
    pub evicted: Vec<Record>,
    /// Appended to the record store
    pub persisted: bool,
    /// Written to the text mirror (false when there is none)
    pub mirrored: bool,
}

/// Last known position of an id in the store, used to guess the next one
#[derive(Debug, Clone, Copy)]
struct Anchor {
    id: u32,
    index: u32,
}

#[derive(Debug)]
struct ChannelState {
    buffer: BoundedOrderedBuffer,
    tracker: DuplicateTracker,
    mode: ChannelMode,
    anchor: Option<Anchor>,
}

/// A stream of records of one category, or of all of them
///
/// State sits behind one lock that is never held across an await.
#[derive(Debug)]
pub struct LogChannel {
    name: String,
    probe_budget: u32,
    store: Option<Arc<dyn RecordStore>>,
    mirror: Option<TextMirror>,
    state: Mutex<ChannelState>,
}

impl LogChannel {
    /// Create a plain channel
    pub fn new(name: impl Into<String>, config: ChannelConfig) -> Self {
        Self {
            name: name.into(),
            probe_budget: config.probe_budget,
            store: None,
            mirror: None,
            state: Mutex::new(ChannelState {
                buffer: BoundedOrderedBuffer::new(config.max_size),
                tracker: DuplicateTracker::new(),
                mode: ChannelMode::AcceptingLive,
                anchor: None,
            }),
        }
    }

    /// Attach a record store, making the channel browsable
    pub fn with_store(mut self, store: Arc<dyn RecordStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Mirror every record to a text file
    pub fn with_mirror(mut self, mirror: TextMirror) -> Self {
        self.mirror = Some(mirror);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capability(&self) -> ChannelCapability {
        if self.store.is_some() {
            ChannelCapability::Browsable
        } else {
            ChannelCapability::Plain
        }
    }

    pub fn is_browsable(&self) -> bool {
        self.store.is_some()
    }

    pub fn mode(&self) -> ChannelMode {
        self.state.lock().mode
    }

    pub fn store(&self) -> Option<&Arc<dyn RecordStore>> {
        self.store.as_ref()
    }

    pub fn mirror(&self) -> Option<&TextMirror> {
        self.mirror.as_ref()
    }

    fn browsable_store(&self) -> Result<&Arc<dyn RecordStore>, ChannelError> {
        self.store
            .as_ref()
            .ok_or_else(|| ChannelError::NotBrowsable(self.name.clone()))
    }

    /// Record a new entry
    ///
    /// The record is appended to the store first; only once it is stored is
    /// it tracked for duplicates and, while the channel is live, put into
    /// the window. Id-less internal records are never stored. A custom label
    /// that cannot be encoded rejects the record before anything changes.
    ///
    /// # Errors
    ///
    /// Codec errors for unencodable records, storage errors when the append
    /// fails. Either way the window and the duplicate tracker are left as
    /// they were. A failing text mirror is logged and reported through
    /// [`RecordOutcome::mirrored`].
    pub async fn record(&self, mut record: Record) -> Result<RecordOutcome, ChannelError> {
        codec::validate(&record)?;

        let mut persisted = false;
        if let Some(store) = &self.store
            && !record.is_internal()
        {
            // Repeats of known content are stored with their flag set
            if self.state.lock().tracker.is_known(&record) {
                record.is_duplicate = true;
            }
            store.append_record(&record).await?;
            persisted = true;
        }

        let (duplication, buffered, evicted) = {
            let mut state = self.state.lock();
            let duplication = state.tracker.observe(&mut record);
            if let DuplicationOutcome::RepeatOfExisting { original, .. } = &duplication {
                state.buffer.mark_duplicate(original);
            }

            if state.mode == ChannelMode::AcceptingLive {
                match state.buffer.insert(record.clone()) {
                    InsertOutcome::Inserted { evicted } => (duplication, true, evicted),
                    InsertOutcome::Rejected => (duplication, false, Vec::new()),
                }
            } else {
                (duplication, false, Vec::new())
            }
        };

        let mut mirrored = false;
        if let Some(mirror) = &self.mirror {
            match mirror.write_record(&record).await {
                Ok(()) => mirrored = true,
                Err(e) => warn!(channel = %self.name, error = %e, "Text mirror write failed"),
            }
        }

        trace!(channel = %self.name, id = %record.id, buffered, persisted, "Recorded");
        Ok(RecordOutcome {
            duplication,
            buffered,
            evicted,
            persisted,
            mirrored,
        })
    }

    /// Load the record just before the window's first id
    ///
    /// Returns false when the window is empty, starts at id 1, or the
    /// record cannot be found within the probe budget. Eviction switches to
    /// the newest end.
    ///
    /// # Errors
    ///
    /// `NotBrowsable` for plain channels; corruption of the store.
    pub async fn load_older(&self) -> Result<bool, ChannelError> {
        let store = self.browsable_store()?;
        let target = {
            let mut state = self.state.lock();
            state.mode = ChannelMode::BrowsingHistory;
            match state.buffer.first_id() {
                Some(first) if first > 1 => first - 1,
                _ => return Ok(false),
            }
        };

        let Some((_, record)) = self.locate(store.as_ref(), target).await? else {
            debug!(channel = %self.name, id = target, "Older record not found");
            return Ok(false);
        };

        let mut state = self.state.lock();
        state
            .buffer
            .set_eviction_direction(EvictionDirection::EvictNewest);
        Ok(state.buffer.insert_at(record, InsertEnd::Front).is_inserted())
    }

    /// Load the record just after the window's last id
    ///
    /// Mirror image of [`load_older`](Self::load_older); eviction switches to
    /// the oldest end.
    pub async fn load_newer(&self) -> Result<bool, ChannelError> {
        let store = self.browsable_store()?;
        let target = {
            let mut state = self.state.lock();
            state.mode = ChannelMode::BrowsingHistory;
            match state.buffer.last_id().and_then(|last| last.checked_add(1)) {
                Some(next) => next,
                None => return Ok(false),
            }
        };

        let Some((_, record)) = self.locate(store.as_ref(), target).await? else {
            debug!(channel = %self.name, id = target, "Newer record not found");
            return Ok(false);
        };

        let mut state = self.state.lock();
        state
            .buffer
            .set_eviction_direction(EvictionDirection::EvictOldest);
        Ok(state.buffer.insert_at(record, InsertEnd::Back).is_inserted())
    }

    /// Replace the window with the records starting at `id`
    ///
    /// Loads up to `max_size` consecutive records from the position of `id`
    /// in the store. Returns false, leaving the window as it was, when `id`
    /// cannot be found.
    #[instrument(skip(self), fields(channel = %self.name))]
    pub async fn jump_to(&self, id: u32) -> Result<bool, ChannelError> {
        let store = self.browsable_store()?;
        self.state.lock().mode = ChannelMode::BrowsingHistory;

        let Some((index, _)) = self.locate(store.as_ref(), id).await? else {
            return Ok(false);
        };

        let records = store.read_range(index, self.window_limit()).await?;
        debug!(index, loaded = records.len(), "Jumped");

        let mut state = self.state.lock();
        state
            .buffer
            .set_eviction_direction(EvictionDirection::EvictNewest);
        state.buffer.replace(records);
        Ok(true)
    }

    /// Replace the window with stored records whose time lies in `start..=end`
    ///
    /// Binary-searches the store for the first record at or after `start`,
    /// then scans forward. At most `max_size` records are loaded. Returns the
    /// number loaded; a reversed range loads nothing and leaves the window
    /// untouched.
    #[instrument(skip(self), fields(channel = %self.name))]
    pub async fn filter_by_time(
        &self,
        start: TimeStamp,
        end: TimeStamp,
    ) -> Result<usize, ChannelError> {
        let store = self.browsable_store()?;
        if start > end {
            return Ok(0);
        }
        self.state.lock().mode = ChannelMode::BrowsingHistory;

        let count = entries_or_zero(store.as_ref()).await?;

        let mut lo = 0u32;
        let mut hi = count;
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            match store.read_record(mid).await {
                Ok(record) if record.timestamp < start => lo = mid + 1,
                Ok(_) => hi = mid,
                Err(e) if e.is_missing() => hi = mid,
                Err(e) => return Err(e.into()),
            }
        }

        let limit = self.window_limit();
        let mut matches = Vec::new();
        let mut index = lo;
        'scan: while index < count && matches.len() < limit {
            let chunk = match store.read_range(index, SCAN_CHUNK).await {
                Ok(chunk) => chunk,
                Err(e) if e.is_missing() => break,
                Err(e) => return Err(e.into()),
            };
            if chunk.is_empty() {
                break;
            }
            index = index.saturating_add(chunk.len() as u32);

            for record in chunk {
                if record.timestamp > end {
                    break 'scan;
                }
                if record.timestamp >= start {
                    matches.push(record);
                    if matches.len() >= limit {
                        break 'scan;
                    }
                }
            }
        }

        let loaded = matches.len();
        debug!(first_index = lo, loaded, "Filtered by time");

        let mut state = self.state.lock();
        state
            .buffer
            .set_eviction_direction(EvictionDirection::EvictNewest);
        state.buffer.replace(matches);
        Ok(loaded)
    }

    /// Go back to following new records
    ///
    /// Browsable channels reload their newest `max_size` stored records; a
    /// store that does not exist yet leaves an empty window. The channel is
    /// live again before the store is read, so records that arrive during
    /// the reload enter the window directly and the loaded ones are merged
    /// in around them. Eviction goes back to the oldest end. Returns the
    /// window size.
    pub async fn resume_live(&self) -> Result<usize, ChannelError> {
        {
            let mut state = self.state.lock();
            state.mode = ChannelMode::AcceptingLive;
            state
                .buffer
                .set_eviction_direction(EvictionDirection::EvictOldest);
            if self.store.is_some() {
                state.buffer.clear();
            }
        }
        let Some(store) = &self.store else {
            return Ok(self.len());
        };

        let count = entries_or_zero(store.as_ref()).await?;
        let limit = self.window_limit();
        let start = count.saturating_sub(u32::try_from(limit).unwrap_or(u32::MAX));
        let records = if count > start {
            match store.read_range(start, (count - start) as usize).await {
                Ok(records) => records,
                Err(e) if e.is_missing() => Vec::new(),
                Err(e) => return Err(e.into()),
            }
        } else {
            Vec::new()
        };

        let mut state = self.state.lock();
        // Newest first, so a full window stops taking older ones
        for record in records.into_iter().rev() {
            state.buffer.insert_at(record, InsertEnd::Front);
        }
        debug!(channel = %self.name, loaded = state.buffer.len(), "Resumed live");
        Ok(state.buffer.len())
    }

    /// Reload the newest stored records; same as [`resume_live`](Self::resume_live)
    pub async fn load_last(&self) -> Result<usize, ChannelError> {
        self.resume_live().await
    }

    /// Stop new records from entering the window
    pub fn pause_live(&self) {
        self.state.lock().mode = ChannelMode::BrowsingHistory;
    }

    /// Find the store index holding `id`
    ///
    /// Starts from a guess (the last located position shifted by the id
    /// difference, or `id - 1`) and probes outward one index at a time on
    /// both sides, up to the probe budget. A side stops at the end of the
    /// store.
    async fn locate(
        &self,
        store: &dyn RecordStore,
        id: u32,
    ) -> Result<Option<(u32, Record)>, ChannelError> {
        let anchor = self.state.lock().anchor;
        let mut guess = match anchor {
            Some(a) => (i64::from(a.index) + i64::from(id) - i64::from(a.id))
                .clamp(0, i64::from(u32::MAX)),
            None => i64::from(id.saturating_sub(1)),
        };

        match self.probe(store, guess, id).await? {
            Probe::Found(record) => return Ok(Some(self.remember(id, guess, record))),
            Probe::Missing | Probe::PastEnd(0) => return Ok(None),
            Probe::PastEnd(entries) => {
                guess = i64::from(entries - 1);
                if let Probe::Found(record) = self.probe(store, guess, id).await? {
                    return Ok(Some(self.remember(id, guess, record)));
                }
            }
            Probe::Other => {}
        }

        let mut below_open = true;
        let mut above_open = true;
        for distance in 1..=i64::from(self.probe_budget) {
            if !below_open && !above_open {
                break;
            }

            if below_open {
                let index = guess - distance;
                if index < 0 {
                    below_open = false;
                } else {
                    match self.probe(store, index, id).await? {
                        Probe::Found(record) => return Ok(Some(self.remember(id, index, record))),
                        Probe::PastEnd(_) | Probe::Missing => below_open = false,
                        Probe::Other => {}
                    }
                }
            }

            if above_open {
                let index = guess + distance;
                match self.probe(store, index, id).await? {
                    Probe::Found(record) => return Ok(Some(self.remember(id, index, record))),
                    Probe::PastEnd(_) | Probe::Missing => above_open = false,
                    Probe::Other => {}
                }
            }
        }

        trace!(channel = %self.name, id, guess, "Probe budget exhausted");
        Ok(None)
    }

    async fn probe(&self, store: &dyn RecordStore, index: i64, id: u32) -> Result<Probe, ChannelError> {
        let Ok(index) = u32::try_from(index) else {
            return Ok(Probe::PastEnd(u32::MAX));
        };
        match store.read_record(index).await {
            Ok(record) if record.id.assigned() == Some(id) => Ok(Probe::Found(record)),
            Ok(_) => Ok(Probe::Other),
            Err(StorageError::OutOfRange { entries, .. }) => Ok(Probe::PastEnd(entries)),
            Err(StorageError::NotFound(_)) => Ok(Probe::Missing),
            Err(e) => Err(e.into()),
        }
    }

    fn remember(&self, id: u32, index: i64, record: Record) -> (u32, Record) {
        let index = index as u32;
        self.state.lock().anchor = Some(Anchor { id, index });
        (index, record)
    }

    fn window_limit(&self) -> usize {
        match self.state.lock().buffer.max_size() {
            0 => usize::MAX,
            n => n,
        }
    }

    /// Copy of the window, ascending by id
    pub fn snapshot(&self) -> Vec<Record> {
        self.state.lock().buffer.to_vec()
    }

    pub fn len(&self) -> usize {
        self.state.lock().buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().buffer.is_empty()
    }

    pub fn max_size(&self) -> usize {
        self.state.lock().buffer.max_size()
    }

    /// Change the window size; returns what the new bound pushed out
    pub fn set_max_size(&self, max_size: usize) -> Vec<Record> {
        self.state.lock().buffer.set_max_size(max_size)
    }

    pub fn eviction_direction(&self) -> EvictionDirection {
        self.state.lock().buffer.eviction_direction()
    }

    pub fn set_eviction_direction(&self, direction: EvictionDirection) {
        self.state.lock().buffer.set_eviction_direction(direction);
    }

    /// Repeated contents, in the order they were first repeated
    pub fn duplications(&self) -> Vec<DuplicationEntry> {
        self.state
            .lock()
            .tracker
            .duplications()
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn occurrence_count(&self, key: &DuplicationKey) -> usize {
        self.state.lock().tracker.occurrence_count(key)
    }

    /// Empty the window and forget tracked duplicates
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.buffer.clear();
        state.tracker.clear();
        state.anchor = None;
    }
}

/// Result of reading one index while locating an id
enum Probe {
    Found(Record),
    /// A different record
    Other,
    /// Beyond the last record; carries the entry count
    PastEnd(u32),
    /// The store does not exist
    Missing,
}

async fn entries_or_zero(store: &dyn RecordStore) -> Result<u32, ChannelError> {
    match store.count_entries().await {
        Ok(count) => Ok(count),
        Err(StorageError::NotFound(_)) => Ok(0),
        Err(e) => Err(e.into()),
    }
}
