//! Artifact and metrics persistence.
//!
//! Two sinks exist: object storage (parquet + csv.gz + JSON snapshot per
//! period) and Postgres (one JSONB row per day). A run writes to exactly
//! one of them.

pub mod parquet;
pub mod postgres;
pub mod s3;

pub use parquet::encode_parquet;
pub use postgres::PostgresSink;
pub use s3::{delete_prefix, fetch_object, parse_s3_uri, ArtifactKeys, S3Sink, SnapshotDocument, StorageError};
