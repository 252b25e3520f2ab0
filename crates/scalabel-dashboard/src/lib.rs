pub mod config;
pub mod fetcher;
pub mod logging;
pub mod report;
pub mod store;
pub mod sync;

pub use config::{load_bootstrap, load_config, Args, Config, ConfigError};
pub use fetcher::{
    request_url, CredentialSource, EnvCredential, FetchError, HttpMetadataFetcher,
    MetadataFetcher, NoCredential, StaticCredential,
};
pub use store::DashboardStore;
pub use sync::{FailurePolicy, SyncEngine, SyncOptions, SyncReport};
