//! Multi-channel router and logging facade
//!
//! A hub owns the id allocator and every channel of one logging session:
//! the browsable all channel, one plain channel per built-in kind, channels
//! for registered custom kinds, and the internal channel the hub uses to
//! report on itself.
//!
//! Facade methods never fail loudly. They return `false` and leave a note
//! on the internal channel, so a logging failure cannot abort the caller.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use chrono::{DateTime, Local};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::Mutex;
use recordlog_core::{
    INTERNAL_LABEL, IdAllocator, Level, MAX_CUSTOM_LABEL_LEN, Record, RecordKind,
};
use recordlog_storage::{
    RECORD_FILE_EXTENSION, RecordFile, RetentionSweep, StorageError, SweepReport,
    TEXT_FILE_EXTENSION, TextMirror,
};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::channel::{ChannelConfig, LogChannel};
use crate::error::ChannelError;
use crate::settings::HubSettings;

/// Name of the channel that receives every non-internal record
pub const ALL_CHANNEL: &str = "ALL";

/// Directory of the internal channel inside a day directory
const INTERNAL_DIR: &str = ".recordlog";

/// Where one session's files live
///
/// ```text
/// <folder>/<dd_MM_yy>/<stem>.rec|.log           all channel
/// <folder>/<dd_MM_yy>/<KIND>/<stem>.log         kind channels
/// <folder>/<dd_MM_yy>/.recordlog/<stem>.log     internal channel
/// ```
///
/// The stem is the session start time, `dd_MM_yy__HH_MM_SS`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionLayout {
    day_dir: PathBuf,
    stem: String,
}

impl SessionLayout {
    pub fn new(folder: impl AsRef<Path>, started_at: &DateTime<Local>) -> Self {
        Self {
            day_dir: folder
                .as_ref()
                .join(started_at.format("%d_%m_%y").to_string()),
            stem: started_at.format("%d_%m_%y__%H_%M_%S").to_string(),
        }
    }

    pub fn day_dir(&self) -> &Path {
        &self.day_dir
    }

    pub fn stem(&self) -> &str {
        &self.stem
    }

    pub fn all_records(&self) -> PathBuf {
        self.day_dir
            .join(format!("{}.{RECORD_FILE_EXTENSION}", self.stem))
    }

    pub fn all_text(&self) -> PathBuf {
        self.day_dir
            .join(format!("{}.{TEXT_FILE_EXTENSION}", self.stem))
    }

    pub fn channel_text(&self, channel: &str) -> PathBuf {
        self.day_dir
            .join(channel)
            .join(format!("{}.{TEXT_FILE_EXTENSION}", self.stem))
    }

    pub fn internal_text(&self) -> PathBuf {
        self.channel_text(INTERNAL_DIR)
    }
}

/// Router and facade over one session's channels
#[derive(Debug)]
pub struct LogHub {
    settings: HubSettings,
    ids: Arc<IdAllocator>,
    started_at: DateTime<Local>,
    layout: SessionLayout,
    all: Arc<LogChannel>,
    internal: Arc<LogChannel>,
    /// Kind channels keyed by kind name
    kinds: DashMap<String, Arc<LogChannel>>,
    retention: Mutex<Option<JoinHandle<Result<SweepReport, StorageError>>>>,
}

impl LogHub {
    /// Start a session with its own id allocator
    ///
    /// When called inside a tokio runtime and retention is enabled, record
    /// files created before now are swept in the background.
    pub fn start(settings: HubSettings) -> Self {
        Self::with_ids(settings, Arc::new(IdAllocator::new()))
    }

    /// Start a session sharing an existing id allocator
    pub fn with_ids(settings: HubSettings, ids: Arc<IdAllocator>) -> Self {
        let started_at = Local::now();
        let layout = SessionLayout::new(&settings.folder_path, &started_at);

        let all_config = ChannelConfig {
            max_size: settings.all_max_size,
            probe_budget: settings.probe_budget,
        };
        let store = Arc::new(RecordFile::new(
            layout.all_records(),
            settings.record_file_config(),
        ));
        let mut all = LogChannel::new(ALL_CHANNEL, all_config).with_store(store);
        if settings.is_writing_to_file_enabled {
            all = all.with_mirror(TextMirror::new(
                layout.all_text(),
                &settings.date_time_format,
            ));
        }

        let internal = LogChannel::new(INTERNAL_LABEL, Self::kind_config(&settings)).with_mirror(
            TextMirror::new(layout.internal_text(), &settings.date_time_format),
        );

        let hub = Self {
            ids,
            started_at,
            all: Arc::new(all),
            internal: Arc::new(internal),
            kinds: DashMap::new(),
            retention: Mutex::new(None),
            layout,
            settings,
        };

        for kind in RecordKind::BUILTIN {
            let channel = hub.build_kind_channel(kind.name());
            hub.kinds.insert(kind.name().to_string(), Arc::new(channel));
        }

        if hub.settings.retention_enabled {
            hub.spawn_retention();
        }

        info!(
            folder = %hub.settings.folder_path.display(),
            session = %hub.layout.stem(),
            "Log hub started"
        );
        hub
    }

    /// Start a session from JSON settings
    pub fn from_json(json: &str) -> Result<Self, ChannelError> {
        Ok(Self::start(HubSettings::from_json(json)?))
    }

    fn kind_config(settings: &HubSettings) -> ChannelConfig {
        ChannelConfig {
            max_size: settings.channel_max_size,
            probe_budget: settings.probe_budget,
        }
    }

    fn build_kind_channel(&self, name: &str) -> LogChannel {
        let channel = LogChannel::new(name, Self::kind_config(&self.settings));
        if self.settings.is_writing_each_channel_enabled {
            channel.with_mirror(TextMirror::new(
                self.layout.channel_text(name),
                &self.settings.date_time_format,
            ))
        } else {
            channel
        }
    }

    fn spawn_retention(&self) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("No tokio runtime, skipping retention sweep");
            return;
        };
        let sweep = RetentionSweep::new(&self.settings.folder_path, SystemTime::from(self.started_at));
        let handle = runtime.spawn(async move { sweep.run().await });
        *self.retention.lock() = Some(handle);
    }

    /// Take the background retention task, if one was started
    pub fn take_retention_task(&self) -> Option<JoinHandle<Result<SweepReport, StorageError>>> {
        self.retention.lock().take()
    }

    pub fn settings(&self) -> &HubSettings {
        &self.settings
    }

    pub fn ids(&self) -> &Arc<IdAllocator> {
        &self.ids
    }

    pub fn started_at(&self) -> DateTime<Local> {
        self.started_at
    }

    pub fn layout(&self) -> &SessionLayout {
        &self.layout
    }

    pub fn all_channel(&self) -> &Arc<LogChannel> {
        &self.all
    }

    pub fn internal_channel(&self) -> &Arc<LogChannel> {
        &self.internal
    }

    /// Look up a channel by name
    ///
    /// Built-in kind names match case-insensitively; custom labels match
    /// exactly. `ALL` and the internal label name the special channels.
    pub fn channel(&self, name: &str) -> Option<Arc<LogChannel>> {
        if name.eq_ignore_ascii_case(ALL_CHANNEL) {
            return Some(Arc::clone(&self.all));
        }
        if name == INTERNAL_LABEL {
            return Some(Arc::clone(&self.internal));
        }
        let key = RecordKind::builtin_by_name(name)
            .map(|kind| kind.name().to_string())
            .unwrap_or_else(|| name.to_string());
        self.kinds.get(&key).map(|c| Arc::clone(c.value()))
    }

    /// Names of all kind channels, built-in and custom
    pub fn channel_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.kinds.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Change the window size of a channel
    pub fn set_max_size(&self, name: &str, max_size: usize) -> Result<(), ChannelError> {
        let channel = self
            .channel(name)
            .ok_or_else(|| ChannelError::UnknownChannel(name.to_string()))?;
        let evicted = channel.set_max_size(max_size);
        debug!(channel = name, max_size, evicted = evicted.len(), "Resized channel");
        Ok(())
    }

    /// Register a custom kind and create its channel
    ///
    /// # Errors
    ///
    /// `InvalidCustomKind` if the label is empty, longer than 15 characters,
    /// not usable as a directory name, equal (ignoring case) to a built-in
    /// kind or the internal label, or already registered.
    pub fn add_custom_kind(&self, label: &str) -> Result<Arc<LogChannel>, ChannelError> {
        validate_custom_label(label)?;
        if self
            .kinds
            .iter()
            .any(|e| e.key().eq_ignore_ascii_case(label))
        {
            return Err(ChannelError::invalid_custom_kind(label, "already registered"));
        }

        match self.kinds.entry(label.to_string()) {
            Entry::Occupied(_) => Err(ChannelError::invalid_custom_kind(label, "already registered")),
            Entry::Vacant(vacant) => {
                let channel = Arc::new(self.build_kind_channel(label));
                vacant.insert(Arc::clone(&channel));
                info!(label, "Registered custom kind");
                Ok(channel)
            }
        }
    }

    /// Record a message of any kind
    ///
    /// The record goes to the all channel first and, once stored there, to
    /// its kind channel. Returns false if the message is empty, the kind has
    /// no channel, or a channel failed to take the record; a record the all
    /// channel could not store is not passed on.
    pub async fn log(&self, kind: RecordKind, message: impl Into<String>, level: Level) -> bool {
        let message = message.into();
        if kind.is_internal() {
            return self.internal(message).await;
        }
        if message.is_empty() {
            self.report(&ChannelError::EmptyMessage(kind.name().to_string()))
                .await;
            return false;
        }
        let channel = match self.route(&kind) {
            Ok(channel) => channel,
            Err(e) => {
                self.report(&e).await;
                return false;
            }
        };

        let record = Record::new(kind, message, level, &self.ids);
        if let Err(e) = self.all.record(record.clone()).await {
            self.report(&e).await;
            return false;
        }
        if let Err(e) = channel.record(record).await {
            self.report(&e).await;
            return false;
        }
        true
    }

    /// Kind channel for a record kind
    ///
    /// Custom kinds must be registered under exactly their label; a custom
    /// label naming a built-in kind is never routed to the built-in channel.
    fn route(&self, kind: &RecordKind) -> Result<Arc<LogChannel>, ChannelError> {
        let Some(label) = kind.custom_label() else {
            return self
                .channel(kind.name())
                .ok_or_else(|| ChannelError::UnknownChannel(kind.name().to_string()));
        };
        if RecordKind::builtin_by_name(label).is_some() {
            return Err(ChannelError::invalid_custom_kind(
                label,
                "clashes with a built-in channel",
            ));
        }
        self.kinds
            .get(label)
            .map(|c| Arc::clone(c.value()))
            .ok_or_else(|| ChannelError::UnknownChannel(label.to_string()))
    }

    /// Record a message of a registered custom kind
    pub async fn log_custom(&self, label: &str, message: impl Into<String>, level: Level) -> bool {
        self.log(RecordKind::Custom(label.to_string()), message, level)
            .await
    }

    pub async fn info(&self, message: impl Into<String>) -> bool {
        self.log(RecordKind::Info, message, Level::Primary).await
    }

    pub async fn info_secondary(&self, message: impl Into<String>) -> bool {
        self.log(RecordKind::Info, message, Level::Secondary).await
    }

    pub async fn error(&self, message: impl Into<String>) -> bool {
        self.log(RecordKind::Error, message, Level::Primary).await
    }

    pub async fn error_secondary(&self, message: impl Into<String>) -> bool {
        self.log(RecordKind::Error, message, Level::Secondary).await
    }

    pub async fn critical_error(&self, message: impl Into<String>) -> bool {
        self.log(RecordKind::CriticalError, message, Level::Primary)
            .await
    }

    pub async fn critical_error_secondary(&self, message: impl Into<String>) -> bool {
        self.log(RecordKind::CriticalError, message, Level::Secondary)
            .await
    }

    pub async fn success(&self, message: impl Into<String>) -> bool {
        self.log(RecordKind::Success, message, Level::Primary).await
    }

    pub async fn success_secondary(&self, message: impl Into<String>) -> bool {
        self.log(RecordKind::Success, message, Level::Secondary).await
    }

    pub async fn code_flow(&self, message: impl Into<String>) -> bool {
        self.log(RecordKind::CodeFlow, message, Level::Primary).await
    }

    pub async fn code_flow_secondary(&self, message: impl Into<String>) -> bool {
        self.log(RecordKind::CodeFlow, message, Level::Secondary)
            .await
    }

    pub async fn debug(&self, message: impl Into<String>) -> bool {
        self.log(RecordKind::Debug, message, Level::Primary).await
    }

    pub async fn debug_secondary(&self, message: impl Into<String>) -> bool {
        self.log(RecordKind::Debug, message, Level::Secondary).await
    }

    pub async fn warning(&self, message: impl Into<String>) -> bool {
        self.log(RecordKind::Warning, message, Level::Primary).await
    }

    pub async fn warning_secondary(&self, message: impl Into<String>) -> bool {
        self.log(RecordKind::Warning, message, Level::Secondary)
            .await
    }

    /// Record a note on the internal channel; never given an id
    pub async fn internal(&self, message: impl Into<String>) -> bool {
        let message = message.into();
        if message.is_empty() {
            warn!("Rejected empty internal message");
            return false;
        }
        match self.internal.record(Record::internal(message)).await {
            Ok(_) => true,
            Err(e) => {
                warn!(error = %e, "Internal channel failed");
                false
            }
        }
    }

    async fn report(&self, err: &ChannelError) {
        warn!(error = %err, "Failed to record message");
        if let Err(e) = self
            .internal
            .record(Record::internal(format!("Failed to record message: {err}")))
            .await
        {
            warn!(error = %e, "Internal channel failed");
        }
    }
}

fn validate_custom_label(label: &str) -> Result<(), ChannelError> {
    if label.is_empty() {
        return Err(ChannelError::invalid_custom_kind(label, "empty label"));
    }
    let len = label.encode_utf16().count();
    if len > MAX_CUSTOM_LABEL_LEN {
        return Err(ChannelError::invalid_custom_kind(
            label,
            format!("{len} characters, limit is {MAX_CUSTOM_LABEL_LEN}"),
        ));
    }
    if label.starts_with('.') || label.contains(['/', '\\', ':', '\0']) {
        return Err(ChannelError::invalid_custom_kind(
            label,
            "not usable as a directory name",
        ));
    }
    if RecordKind::builtin_by_name(label).is_some() || label.eq_ignore_ascii_case(ALL_CHANNEL) {
        return Err(ChannelError::invalid_custom_kind(
            label,
            "clashes with a built-in channel",
        ));
    }
    if label.eq_ignore_ascii_case(INTERNAL_LABEL) {
        return Err(ChannelError::invalid_custom_kind(label, "reserved for internal use"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    #[test]
    fn test_session_layout() {
        let started = Local.with_ymd_and_hms(2026, 10, 19, 8, 5, 9).unwrap();
        let layout = SessionLayout::new("/logs", &started);

        assert_eq!(layout.day_dir(), Path::new("/logs/19_10_26"));
        assert_eq!(layout.stem(), "19_10_26__08_05_09");
        assert_eq!(
            layout.all_records(),
            PathBuf::from("/logs/19_10_26/19_10_26__08_05_09.rec")
        );
        assert_eq!(
            layout.channel_text("ERROR"),
            PathBuf::from("/logs/19_10_26/ERROR/19_10_26__08_05_09.log")
        );
        assert_eq!(
            layout.internal_text(),
            PathBuf::from("/logs/19_10_26/.recordlog/19_10_26__08_05_09.log")
        );
    }

    #[test]
    fn test_custom_label_validation() {
        assert!(validate_custom_label("CONSOLE").is_ok());
        assert!(validate_custom_label("FIFTEEN_CHARS_X").is_ok());
        assert!(validate_custom_label("SIXTEEN_CHARS_XX").is_err());
        assert!(validate_custom_label("").is_err());
        assert!(validate_custom_label("warning").is_err());
        assert!(validate_custom_label("RecordLog").is_err());
        assert!(validate_custom_label("all").is_err());
        assert!(validate_custom_label("../up").is_err());
    }

    #[test]
    fn test_start_outside_runtime_skips_retention() {
        let temp = TempDir::new().unwrap();
        let settings = HubSettings {
            retention_enabled: true,
            ..HubSettings::testing(temp.path())
        };
        let hub = LogHub::start(settings);
        assert!(hub.take_retention_task().is_none());
        assert_eq!(hub.channel_names().len(), RecordKind::BUILTIN.len());
    }

    #[tokio::test]
    async fn test_builtin_channels_exist() {
        let temp = TempDir::new().unwrap();
        let hub = LogHub::start(HubSettings::testing(temp.path()));

        for kind in RecordKind::BUILTIN {
            let channel = hub.channel(kind.name()).unwrap();
            assert!(!channel.is_browsable());
        }
        assert!(hub.channel("critical_error").is_some());
        assert!(hub.channel("all").unwrap().is_browsable());
        assert!(hub.channel("NOPE").is_none());
    }

    #[tokio::test]
    async fn test_failed_append_returns_false() {
        let temp = TempDir::new().unwrap();
        let blocker = temp.path().join("logs");
        std::fs::write(&blocker, b"not a directory").unwrap();
        let hub = LogHub::start(HubSettings::testing(&blocker));

        assert!(!hub.info("disk gone").await);
        assert!(hub.all_channel().is_empty());
        assert!(hub.channel("INFO").unwrap().is_empty());

        let notes = hub.internal_channel().snapshot();
        assert_eq!(notes.len(), 1);
        assert!(notes[0].message.starts_with("Failed to record message"));
    }

    #[tokio::test]
    async fn test_custom_label_never_reaches_builtin_channel() {
        let temp = TempDir::new().unwrap();
        let hub = LogHub::start(HubSettings::testing(temp.path()));

        assert!(!hub.log_custom("info", "sneaky", Level::Primary).await);
        assert!(!hub.log_custom("INFO", "sneaky", Level::Primary).await);
        assert!(hub.channel("INFO").unwrap().is_empty());
        assert!(hub.all_channel().is_empty());
        assert_eq!(hub.internal_channel().len(), 2);
        assert_eq!(hub.ids().current(), 0);
    }

    #[test]
    fn test_facade_from_sync_code() {
        let temp = TempDir::new().unwrap();
        let hub = LogHub::start(HubSettings::testing(temp.path()));

        assert!(tokio_test::block_on(hub.success("synchronous caller")));
        assert_eq!(hub.channel("SUCCESS").unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_set_max_size() {
        let temp = TempDir::new().unwrap();
        let hub = LogHub::start(HubSettings::testing(temp.path()));

        hub.set_max_size("info", 3).unwrap();
        assert_eq!(hub.channel("INFO").unwrap().max_size(), 3);
        assert!(matches!(
            hub.set_max_size("missing", 3),
            Err(ChannelError::UnknownChannel(_))
        ));
    }
}
