pub mod config;
pub mod dataset;
pub mod error;
pub mod settings;
pub mod types;

pub use config::Config;
pub use dataset::{Dataset, DedupOutcome, Record};
pub use error::HarvestError;
pub use settings::{JsonFileSettings, SettingsStore, API_KEY_SETTING, HANDLES_SETTING};
pub use types::{DateRange, Handle, Platform, PostRef};
