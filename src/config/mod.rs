pub mod cli;
pub mod settings;

pub use cli::{CliConfig, Command};
pub use settings::Settings;
