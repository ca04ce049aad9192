//! Asynchronous query execution against the Athena engine.

pub mod results;
pub mod runner;

pub use results::{merge_dedup, parse_result_csv};
pub use runner::{AthenaError, AthenaRunner, QueryOutput};
