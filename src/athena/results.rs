//! Materialization of query results into log record batches.

use std::collections::HashMap;

use crate::analytics::models::LogRecord;

/// Parse an Athena CSV result object into records.
///
/// Columns are matched by header name, so both the curated projection and
/// `SELECT *` results deserialize into the same record type; unknown
/// columns are ignored.
pub fn parse_result_csv(bytes: &[u8]) -> Result<Vec<LogRecord>, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(bytes);
    reader.deserialize().collect()
}

/// Concatenate an existing batch with new rows and deduplicate by
/// `requestid`, keeping the last-seen occurrence (new rows win ties).
///
/// The output preserves first-occurrence order, which keeps downstream
/// rankings stable across reruns.
pub fn merge_dedup(existing: Vec<LogRecord>, new: Vec<LogRecord>) -> Vec<LogRecord> {
    let mut position: HashMap<String, usize> = HashMap::new();
    let mut merged: Vec<LogRecord> = Vec::with_capacity(existing.len() + new.len());

    for record in existing.into_iter().chain(new) {
        match position.get(&record.requestid) {
            Some(&index) => merged[index] = record,
            None => {
                position.insert(record.requestid.clone(), merged.len());
                merged.push(record);
            }
        }
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(requestid: &str, key: &str) -> LogRecord {
        LogRecord {
            requestid: requestid.into(),
            bucket_name: String::new(),
            requestdatetime: String::new(),
            remoteip: "1.1.1.1".into(),
            operation: "REST.GET.OBJECT".into(),
            key: key.into(),
            referrer: String::new(),
            objectsize: 0,
            bytessent: 0,
            httpstatus: "200".into(),
            partition_date: "2024/02/06".into(),
        }
    }

    #[test]
    fn parse_result_handles_quoted_headers() {
        let data = "\"requestid\",\"operation\",\"key\",\"referrer\",\"objectsize\",\"bytessent\",\"httpstatus\",\"requestdatetime\",\"timestamp\",\"remoteip\"\n\
            \"R1\",\"REST.GET.OBJECT\",\"TM/f.zip\",\"-\",\"\",\"512\",\"200\",\"06/Feb/2024:00:00:38 +0000\",\"2024/02/06\",\"1.2.3.4\"\n";
        let records = parse_result_csv(data.as_bytes()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].requestid, "R1");
        assert_eq!(records[0].bytessent, 512);
        assert_eq!(records[0].objectsize, 0);
    }

    #[test]
    fn new_rows_win_on_duplicate_request_ids() {
        let existing = vec![record("R1", "old/key"), record("R2", "keep/this")];
        let new = vec![record("R1", "new/key")];

        let merged = merge_dedup(existing, new);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].requestid, "R1");
        assert_eq!(merged[0].key, "new/key");
        assert_eq!(merged[1].requestid, "R2");
    }

    #[test]
    fn merging_the_same_batch_twice_is_idempotent() {
        let batch = vec![record("R1", "a"), record("R2", "b"), record("R3", "c")];
        let once = merge_dedup(Vec::new(), batch.clone());
        let twice = merge_dedup(once.clone(), batch);
        assert_eq!(once.len(), twice.len());
    }

    #[test]
    fn duplicate_ids_within_one_batch_collapse() {
        let batch = vec![record("R1", "a"), record("R1", "b"), record("R1", "c")];
        let merged = merge_dedup(Vec::new(), batch);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].key, "c");
    }
}
