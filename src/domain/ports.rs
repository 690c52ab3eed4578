use crate::domain::model::GoogleJsonError;
use crate::utils::error::Result;
use async_trait::async_trait;
use reqwest::header::HeaderMap;

/// Anything able to hand out a bearer access token for the next request.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn access_token(&self) -> Result<String>;
}

/// Per-item outcome handler for a batch request. Returning `Err` from either
/// method stops dispatching the remaining items and fails the batch.
pub trait BatchCallback<T>: Send + Sync {
    fn on_success(&self, item: T, response_headers: &HeaderMap) -> Result<()>;
    fn on_failure(&self, error: GoogleJsonError, response_headers: &HeaderMap) -> Result<()>;
}
