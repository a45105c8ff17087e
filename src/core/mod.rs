pub mod catalog;
pub mod engine;
pub mod esg_extractor;
pub mod fre_archive;
pub mod ingest;
pub mod processor;
pub mod xml_outline;

pub use crate::domain::model::{FilingRecord, FreDocument, ProcessingStatus};
pub use crate::domain::ports::{DocumentStore, Pipeline};
pub use crate::utils::error::Result;
