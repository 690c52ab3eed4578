pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use config::Settings;
pub use core::auth::{Authorizer, ClientSecretLocator, Credential, StaticToken};
pub use core::directory::{DirectoryUserService, ListUsersRequest, ServiceSettings};
pub use utils::error::{DirectoryError, Result};
