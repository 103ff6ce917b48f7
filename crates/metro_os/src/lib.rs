#![forbid(unsafe_code)]

pub mod classification;
pub mod ingest;
pub mod report;
