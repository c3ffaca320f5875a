pub mod adapter;
pub mod harvest;
pub mod registry;
pub mod run_report;
pub mod scheduler;
pub mod store;

pub use adapter::{ApifyFetcher, FetchService};
pub use harvest::{
    HandleOutcome, HandleReport, Harvester, HarvestOptions, HarvestStats, PlatformHarvest,
    PostsFetch, ReconciledDataset,
};
pub use registry::PlatformSpec;
pub use run_report::RunReport;
pub use store::{RecordKind, RecordStore};
