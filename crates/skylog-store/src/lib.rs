//! Durable per-entity sample histories for skylog.
//!
//! This crate keeps a rolling, time-windowed history of weather samples for
//! each observed entity (typically a city) and derives statistics over it.
//!
//! # Features
//!
//! - One JSON history file per entity, replaced atomically on every change
//! - Timestamp-ordered insertion, including late (backfilled) samples
//! - Pruning of samples older than the retention window
//! - Max / min / mean and dominant category over the retained window
//! - Transparent reading of the legacy bare-array layout
//!
//! # Example
//!
//! ```no_run
//! use skylog_store::{Store, aggregate};
//! use skylog_types::{EntityKey, SampleRecord, TemperatureUnit};
//! use time::{Duration, OffsetDateTime};
//!
//! let store = Store::open_default()?;
//! let mut delhi = store.entity(&EntityKey::new("Delhi")?)?;
//!
//! let now = OffsetDateTime::now_utc();
//! delhi.append(SampleRecord::new(now, 305.2).with_category("haze"))?;
//! delhi.prune(now, Duration::hours(24))?;
//!
//! if let Some(stats) = aggregate(delhi.records(), TemperatureUnit::Celsius) {
//!     println!("24h max {:.1}{}", stats.max, stats.unit.symbol());
//! }
//! # Ok::<(), skylog_store::Error>(())
//! ```

mod aggregate;
mod error;
mod history;
mod layout;
mod store;

pub use aggregate::aggregate;
pub use error::{Error, Result};
pub use history::{EntityHistory, window_start};
pub use layout::LAYOUT_VERSION;
pub use store::{EntityStore, Store};

/// Default history directory following platform conventions.
///
/// - Linux: `~/.local/share/skylog/history`
/// - macOS: `~/Library/Application Support/skylog/history`
/// - Windows: `C:\Users\<user>\AppData\Local\skylog\history`
pub fn default_store_path() -> std::path::PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join("skylog")
        .join("history")
}
