pub mod alert;
pub mod fetcher;
pub mod file_archive;
pub mod http_job;

pub use alert::{AlertConfig, AlertDispatcher, AlertingReporter, DispatchStats, WebhookAlerter};
pub use fetcher::ReqwestFetcher;
pub use file_archive::FileArchive;
pub use http_job::HttpJob;
