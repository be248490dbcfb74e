pub mod api;
pub mod config;
pub mod error;
pub mod estimation;
pub mod ingest;
pub mod model;
pub mod report;
pub mod store;
