//! Access log analytics: GeoIP enrichment and metrics aggregation.

pub mod geoip;
pub mod metrics;
pub mod models;
pub mod prepare;

pub use geoip::{GeoIpService, UNKNOWN_COUNTRY};
pub use metrics::{analyze, analyze_by_day, folders, is_reportable_folder};
pub use models::{DailyMetrics, EnrichedRecord, LogRecord, MetricsSnapshot};
pub use prepare::enrich;
