#[cfg(feature = "cli")]
pub mod cli;
pub mod toml_config;

#[cfg(feature = "cli")]
pub use cli::{CliConfig, Mode};
pub use toml_config::{LogFormat, SampleKind, SamplesConfig, Settings};
