//! Object storage sink: artifact uploads, snapshot history, presigned links.

use std::io::{Read, Write};
use std::time::Duration;

use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{Delete, ObjectIdentifier};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::analytics::models::{LogRecord, MetricsSnapshot};
use crate::daterange::DateRange;
use crate::storage::parquet::encode_parquet;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The location string is not an `s3://bucket/prefix` URI.
    #[error("invalid object storage location '{uri}', expected s3://bucket/prefix")]
    InvalidUri { uri: String },

    #[error("failed to download s3://{bucket}/{key}: {source}")]
    Download {
        bucket: String,
        key: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("failed to upload s3://{bucket}/{key}: {source}")]
    Upload {
        bucket: String,
        key: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("failed to list s3://{bucket}/{prefix}: {source}")]
    List {
        bucket: String,
        prefix: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("failed to delete under s3://{bucket}/{prefix}: {source}")]
    Delete {
        bucket: String,
        prefix: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("failed to presign s3://{bucket}/{key}: {source}")]
    Presign {
        bucket: String,
        key: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Local encoding of an artifact failed before any upload started.
    #[error("failed to encode artifact {name}: {source}")]
    Encode {
        name: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Split an `s3://bucket/key` URI into bucket and key. The key part may be
/// empty (bucket root).
pub fn parse_s3_uri(uri: &str) -> Result<(String, String), StorageError> {
    let rest = uri
        .strip_prefix("s3://")
        .ok_or_else(|| StorageError::InvalidUri {
            uri: uri.to_string(),
        })?;
    let (bucket, key) = rest.split_once('/').unwrap_or((rest, ""));
    if bucket.is_empty() {
        return Err(StorageError::InvalidUri {
            uri: uri.to_string(),
        });
    }
    Ok((bucket.to_string(), key.to_string()))
}

/// The JSON snapshot persisted per period, and read back later for trend
/// history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotDocument {
    /// Period file stem this snapshot covers.
    pub period: String,
    pub overall: MetricsSnapshot,
    pub folders: Vec<MetricsSnapshot>,
}

/// Keys of the artifacts written for one period.
#[derive(Debug, Clone)]
pub struct ArtifactKeys {
    pub parquet: String,
    pub csv_gz: String,
}

/// Long-term artifact store rooted at one `s3://bucket/prefix` location.
///
/// Artifacts are partitioned by the year of the period start:
/// `<prefix><year>/<stem>.parquet`, `.csv.gz` and `.json`.
pub struct S3Sink {
    client: aws_sdk_s3::Client,
    bucket: String,
    prefix: String,
}

impl S3Sink {
    pub fn new(client: aws_sdk_s3::Client, artifact_root: &str) -> Result<Self, StorageError> {
        let (bucket, mut prefix) = parse_s3_uri(artifact_root)?;
        if !prefix.is_empty() && !prefix.ends_with('/') {
            prefix.push('/');
        }
        Ok(Self {
            client,
            bucket,
            prefix,
        })
    }

    fn key_for(&self, stem: &str, extension: &str) -> String {
        // Year partition comes from the stem's leading YYYY.
        let year = &stem[..4.min(stem.len())];
        format!("{}{year}/{stem}.{extension}", self.prefix)
    }

    /// Load the previously archived CSV batch for this period, if one
    /// exists. A missing or unreadable object is not fatal; the run simply
    /// starts from an empty batch.
    pub async fn load_existing_csv(&self, range: &DateRange) -> Option<Vec<LogRecord>> {
        let key = self.key_for(&range.file_stem(), "csv.gz");
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await;

        let body = match response {
            Ok(output) => match output.body.collect().await {
                Ok(data) => data.into_bytes(),
                Err(e) => {
                    warn!(key, error = %e, "failed to read existing batch, starting fresh");
                    return None;
                }
            },
            Err(e) => {
                debug!(key, error = %e, "no existing batch for this period");
                return None;
            }
        };

        let mut csv_bytes = Vec::new();
        if let Err(e) = GzDecoder::new(body.as_ref()).read_to_end(&mut csv_bytes) {
            warn!(key, error = %e, "existing batch is not valid gzip, starting fresh");
            return None;
        }
        match crate::athena::parse_result_csv(&csv_bytes) {
            Ok(records) => {
                info!(key, rows = records.len(), "loaded existing batch");
                Some(records)
            }
            Err(e) => {
                warn!(key, error = %e, "existing batch failed to parse, starting fresh");
                None
            }
        }
    }

    /// Write the merged batch as parquet and gzipped CSV.
    pub async fn upload_table_artifacts(
        &self,
        range: &DateRange,
        records: &[LogRecord],
    ) -> Result<ArtifactKeys, StorageError> {
        let stem = range.file_stem();

        let parquet_bytes = encode_parquet(records).map_err(|e| StorageError::Encode {
            name: format!("{stem}.parquet"),
            source: Box::new(e),
        })?;
        let csv_gz_bytes = encode_csv_gz(records).map_err(|e| StorageError::Encode {
            name: format!("{stem}.csv.gz"),
            source: e,
        })?;

        let keys = ArtifactKeys {
            parquet: self.key_for(&stem, "parquet"),
            csv_gz: self.key_for(&stem, "csv.gz"),
        };
        self.put(&keys.parquet, parquet_bytes, "application/octet-stream")
            .await?;
        self.put(&keys.csv_gz, csv_gz_bytes, "application/gzip")
            .await?;
        info!(
            rows = records.len(),
            parquet = keys.parquet,
            csv = keys.csv_gz,
            "uploaded table artifacts"
        );
        Ok(keys)
    }

    /// Persist the metrics snapshot for this period as JSON.
    pub async fn upload_snapshot(
        &self,
        range: &DateRange,
        overall: &MetricsSnapshot,
        folders: &[MetricsSnapshot],
    ) -> Result<String, StorageError> {
        let stem = range.file_stem();
        let document = SnapshotDocument {
            period: stem.clone(),
            overall: overall.clone(),
            folders: folders.to_vec(),
        };
        let bytes =
            serde_json::to_vec_pretty(&document).map_err(|e| StorageError::Encode {
                name: format!("{stem}.json"),
                source: Box::new(e),
            })?;

        let key = self.key_for(&stem, "json");
        self.put(&key, bytes, "application/json").await?;
        info!(key, "uploaded metrics snapshot");
        Ok(key)
    }

    /// Fetch the overall snapshots of up to `months` preceding calendar
    /// months, most recent first. Missing or unreadable snapshots are
    /// skipped; history is best-effort.
    pub async fn fetch_historical_snapshots(
        &self,
        range: &DateRange,
        months: usize,
    ) -> Vec<(String, MetricsSnapshot)> {
        let mut history = Vec::new();
        for stem in range.previous_month_stems(months) {
            let key = self.key_for(&stem, "json");
            let response = self
                .client
                .get_object()
                .bucket(&self.bucket)
                .key(&key)
                .send()
                .await;

            let bytes = match response {
                Ok(output) => match output.body.collect().await {
                    Ok(data) => data.into_bytes(),
                    Err(e) => {
                        warn!(key, error = %e, "failed to read historical snapshot");
                        continue;
                    }
                },
                Err(e) => {
                    debug!(key, error = %e, "no snapshot for this month");
                    continue;
                }
            };

            match serde_json::from_slice::<SnapshotDocument>(&bytes) {
                Ok(document) => history.push((month_label(&stem), document.overall)),
                Err(e) => warn!(key, error = %e, "historical snapshot failed to parse"),
            }
        }
        history
    }

    /// Presign a download link for an artifact key.
    pub async fn presign(&self, key: &str, expiry: Duration) -> Result<String, StorageError> {
        let config = PresigningConfig::expires_in(expiry).map_err(|e| StorageError::Presign {
            bucket: self.bucket.clone(),
            key: key.to_string(),
            source: Box::new(e),
        })?;
        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(config)
            .await
            .map_err(|e| StorageError::Presign {
                bucket: self.bucket.clone(),
                key: key.to_string(),
                source: Box::new(e),
            })?;
        Ok(request.uri().to_string())
    }

    async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(bytes))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| StorageError::Upload {
                bucket: self.bucket.clone(),
                key: key.to_string(),
                source: Box::new(e),
            })?;
        Ok(())
    }
}

/// Chart label for a monthly stem, e.g. `2024_01_01-2024_01_31` -> `Jan 2024`.
fn month_label(stem: &str) -> String {
    chrono::NaiveDate::parse_from_str(&stem[..10.min(stem.len())], "%Y_%m_%d")
        .map(|d| d.format("%b %Y").to_string())
        .unwrap_or_else(|_| stem.to_string())
}

fn encode_csv_gz(
    records: &[LogRecord],
) -> Result<Vec<u8>, Box<dyn std::error::Error + Send + Sync>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for record in records {
        writer.serialize(record)?;
    }
    let csv_bytes = writer.into_inner().map_err(|e| e.into_error())?;

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&csv_bytes)?;
    Ok(encoder.finish()?)
}

/// Download a whole object given its `s3://` URI. Used to materialize query
/// result files.
pub async fn fetch_object(
    client: &aws_sdk_s3::Client,
    uri: &str,
) -> Result<Vec<u8>, StorageError> {
    let (bucket, key) = parse_s3_uri(uri)?;
    let output = client
        .get_object()
        .bucket(&bucket)
        .key(&key)
        .send()
        .await
        .map_err(|e| StorageError::Download {
            bucket: bucket.clone(),
            key: key.clone(),
            source: Box::new(e),
        })?;
    let data = output
        .body
        .collect()
        .await
        .map_err(|e| StorageError::Download {
            bucket,
            key,
            source: Box::new(e),
        })?;
    Ok(data.into_bytes().to_vec())
}

/// Delete every object under an `s3://bucket/prefix` location. Returns the
/// number of objects removed. Used to clear transient query metadata and,
/// when requested, the ingested raw logs.
pub async fn delete_prefix(
    client: &aws_sdk_s3::Client,
    uri: &str,
) -> Result<usize, StorageError> {
    let (bucket, prefix) = parse_s3_uri(uri)?;
    let mut deleted = 0;
    let mut continuation_token: Option<String> = None;

    loop {
        let mut request = client.list_objects_v2().bucket(&bucket).prefix(&prefix);
        if let Some(token) = &continuation_token {
            request = request.continuation_token(token);
        }
        let output = request.send().await.map_err(|e| StorageError::List {
            bucket: bucket.clone(),
            prefix: prefix.clone(),
            source: Box::new(e),
        })?;

        let mut identifiers = Vec::new();
        for object in output.contents() {
            if let Some(key) = object.key() {
                let identifier = ObjectIdentifier::builder()
                    .key(key)
                    .build()
                    .map_err(|e| StorageError::Delete {
                        bucket: bucket.clone(),
                        prefix: prefix.clone(),
                        source: Box::new(e),
                    })?;
                identifiers.push(identifier);
            }
        }

        if !identifiers.is_empty() {
            let batch_len = identifiers.len();
            let delete = Delete::builder()
                .set_objects(Some(identifiers))
                .build()
                .map_err(|e| StorageError::Delete {
                    bucket: bucket.clone(),
                    prefix: prefix.clone(),
                    source: Box::new(e),
                })?;
            client
                .delete_objects()
                .bucket(&bucket)
                .delete(delete)
                .send()
                .await
                .map_err(|e| StorageError::Delete {
                    bucket: bucket.clone(),
                    prefix: prefix.clone(),
                    source: Box::new(e),
                })?;
            deleted += batch_len;
        }

        if output.is_truncated() == Some(true) {
            continuation_token = output.next_continuation_token().map(String::from);
        } else {
            break;
        }
    }

    info!(bucket, prefix, deleted, "cleared prefix");
    Ok(deleted)
}
