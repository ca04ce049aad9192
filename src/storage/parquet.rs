//! Columnar encoding of log record batches.

use std::sync::Arc;

use parquet::data_type::{ByteArray, ByteArrayType, Int64Type};
use parquet::errors::ParquetError;
use parquet::file::properties::WriterProperties;
use parquet::file::writer::SerializedFileWriter;
use parquet::schema::parser::parse_message_type;

use crate::analytics::models::LogRecord;

/// Column layout of the archived batch. Numeric columns are zero-filled at
/// parse time, so every field can be REQUIRED.
const SCHEMA: &str = "
message access_log {
    required binary requestid (UTF8);
    required binary bucket_name (UTF8);
    required binary requestdatetime (UTF8);
    required binary remoteip (UTF8);
    required binary operation (UTF8);
    required binary key (UTF8);
    required binary referrer (UTF8);
    required int64 objectsize;
    required int64 bytessent;
    required binary httpstatus (UTF8);
    required binary timestamp (UTF8);
}
";

/// Encode a batch of records as an in-memory parquet file.
pub fn encode_parquet(records: &[LogRecord]) -> Result<Vec<u8>, ParquetError> {
    let schema = Arc::new(parse_message_type(SCHEMA)?);
    let props = Arc::new(WriterProperties::builder().build());

    let mut buffer = Vec::new();
    let mut writer = SerializedFileWriter::new(&mut buffer, schema, props)?;
    let mut row_group = writer.next_row_group()?;

    let mut index = 0;
    while let Some(mut column) = row_group.next_column()? {
        match index {
            0 => write_strings(&mut column, records, |r| &r.requestid)?,
            1 => write_strings(&mut column, records, |r| &r.bucket_name)?,
            2 => write_strings(&mut column, records, |r| &r.requestdatetime)?,
            3 => write_strings(&mut column, records, |r| &r.remoteip)?,
            4 => write_strings(&mut column, records, |r| &r.operation)?,
            5 => write_strings(&mut column, records, |r| &r.key)?,
            6 => write_strings(&mut column, records, |r| &r.referrer)?,
            7 => write_i64s(&mut column, records, |r| r.objectsize)?,
            8 => write_i64s(&mut column, records, |r| r.bytessent)?,
            9 => write_strings(&mut column, records, |r| &r.httpstatus)?,
            10 => write_strings(&mut column, records, |r| &r.partition_date)?,
            _ => unreachable!("schema declares 11 columns"),
        }
        column.close()?;
        index += 1;
    }

    row_group.close()?;
    writer.close()?;
    Ok(buffer)
}

fn write_strings(
    column: &mut parquet::file::writer::SerializedColumnWriter<'_>,
    records: &[LogRecord],
    field: impl Fn(&LogRecord) -> &str,
) -> Result<(), ParquetError> {
    let values: Vec<ByteArray> = records
        .iter()
        .map(|r| ByteArray::from(field(r)))
        .collect();
    column
        .typed::<ByteArrayType>()
        .write_batch(&values, None, None)?;
    Ok(())
}

fn write_i64s(
    column: &mut parquet::file::writer::SerializedColumnWriter<'_>,
    records: &[LogRecord],
    field: impl Fn(&LogRecord) -> i64,
) -> Result<(), ParquetError> {
    let values: Vec<i64> = records.iter().map(field).collect();
    column
        .typed::<Int64Type>()
        .write_batch(&values, None, None)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use parquet::file::reader::{FileReader, SerializedFileReader};
    use parquet::record::RowAccessor;

    fn record(requestid: &str, bytessent: i64) -> LogRecord {
        LogRecord {
            requestid: requestid.into(),
            bucket_name: "logs-bucket".into(),
            requestdatetime: "06/Feb/2024:00:00:38 +0000".into(),
            remoteip: "1.2.3.4".into(),
            operation: "REST.GET.OBJECT".into(),
            key: "TM/project/file.zip".into(),
            referrer: "-".into(),
            objectsize: 100,
            bytessent,
            httpstatus: "200".into(),
            partition_date: "2024/02/06".into(),
        }
    }

    #[test]
    fn encoded_batch_round_trips() {
        let records = vec![record("R1", 512), record("R2", 1024)];
        let bytes = encode_parquet(&records).unwrap();

        let reader = SerializedFileReader::new(bytes::Bytes::from(bytes)).unwrap();
        assert_eq!(reader.metadata().file_metadata().num_rows(), 2);

        let rows: Vec<_> = reader.get_row_iter(None).unwrap().collect();
        let first = rows[0].as_ref().unwrap();
        assert_eq!(first.get_string(0).unwrap(), "R1");
        assert_eq!(first.get_long(8).unwrap(), 512);
        assert_eq!(first.get_string(10).unwrap(), "2024/02/06");
    }

    #[test]
    fn empty_batch_still_encodes() {
        let bytes = encode_parquet(&[]).unwrap();
        let reader = SerializedFileReader::new(bytes::Bytes::from(bytes)).unwrap();
        assert_eq!(reader.metadata().file_metadata().num_rows(), 0);
    }
}
