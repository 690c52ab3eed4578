pub mod auth;
pub mod batch;
pub mod directory;

pub use crate::domain::model::{GoogleJsonError, OrderBy, User, UserName, UserPhone, Users};
pub use crate::domain::ports::{BatchCallback, TokenSource};
pub use crate::utils::error::Result;
