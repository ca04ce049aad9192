pub mod analytics;
pub mod athena;
pub mod config;
pub mod daterange;
pub mod mail;
pub mod query;
pub mod report;
pub mod storage;
