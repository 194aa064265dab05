//! Ingestion engines that turn extracted rows into repository writes.

pub mod earnings;

pub use earnings::EarningsIngest;
