pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use adapters::{http::CvmClient, sqlite::SqliteStore, workspace::Workspace};
pub use config::{CliConfig, Settings};
pub use self::core::{engine::EsgEngine, ingest::CatalogSource};
pub use utils::error::{EsgError, Result};
