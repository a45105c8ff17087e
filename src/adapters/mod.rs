// Adapters layer: concrete implementations for external systems (CVM portal, SQLite, temp files).

pub mod http;
pub mod sqlite;
pub mod workspace;
