//! # Recordlog Channel
//!
//! Log channels and the hub that routes records between them.
//!
//! ## Key Types
//!
//! - [`LogHub`]: Owns a session's channels and the id allocator; logging facade
//! - [`LogChannel`]: One stream of records with a bounded window, duplicate
//!   tracking and (when browsable) history scrolling over a record store
//! - [`BoundedOrderedBuffer`]: The id-ordered window itself
//! - [`DuplicateTracker`]: Groups records with identical content
//! - [`HubSettings`]: Folder, mirroring and window configuration
//!
//! ## Example
//!
//! ```rust,ignore
//! use recordlog_channel::{HubSettings, LogHub};
//!
//! #[tokio::main]
//! async fn main() {
//!     let hub = LogHub::start(HubSettings::default());
//!     hub.add_custom_kind("CONSOLE").unwrap();
//!
//!     hub.info("service started").await;
//!     hub.log_custom("CONSOLE", "> help", Default::default()).await;
//!
//!     let all = hub.all_channel();
//!     all.jump_to(1).await.unwrap();
//!     all.resume_live().await.unwrap();
//! }
//! ```

pub mod buffer;
pub mod channel;
pub mod duplicates;
pub mod error;
pub mod hub;
pub mod settings;

// Re-exports
pub use buffer::{BoundedOrderedBuffer, EvictionDirection, InsertEnd, InsertOutcome};
pub use channel::{ChannelCapability, ChannelConfig, ChannelMode, LogChannel, RecordOutcome};
pub use duplicates::{DuplicateTracker, DuplicationEntry, DuplicationOutcome, Occurrence};
pub use error::ChannelError;
pub use hub::{ALL_CHANNEL, LogHub, SessionLayout};
pub use settings::HubSettings;
