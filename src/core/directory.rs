use crate::core::auth::Authorizer;
use crate::core::batch::BatchRequest;
use crate::domain::model::{GoogleJsonError, OrderBy, User, Users};
use crate::domain::ports::{BatchCallback, TokenSource};
use crate::utils::error::{DirectoryError, Result};
use reqwest::header::{HeaderMap, ACCEPT};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use url::Url;

/// Directory API v1 root.
pub const DIRECTORY_ENDPOINT: &str = "https://admin.googleapis.com/admin/directory/v1/";
/// Batch endpoint for the Directory API.
pub const BATCH_ENDPOINT: &str = "https://admin.googleapis.com/batch/admin/directory_v1";
/// Alias for the customer the authorized administrator belongs to.
pub const MY_CUSTOMER: &str = "my_customer";
pub const DEFAULT_APPLICATION_NAME: &str = "directory-client - Google Admin SDK";

#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub application_name: String,
    pub base_url: String,
    pub batch_url: String,
    pub customer: String,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            application_name: DEFAULT_APPLICATION_NAME.to_string(),
            base_url: DIRECTORY_ENDPOINT.to_string(),
            batch_url: BATCH_ENDPOINT.to_string(),
            customer: MY_CUSTOMER.to_string(),
        }
    }
}

/// Parameters of `users.list`. Empty query and zero `max_results` are not sent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListUsersRequest {
    pub max_results: u32,
    pub query: Option<String>,
    pub order_by: Option<OrderBy>,
    pub page_token: Option<String>,
}

impl ListUsersRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_results(mut self, max_results: u32) -> Self {
        self.max_results = max_results;
        self
    }

    pub fn query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn order_by(mut self, order_by: OrderBy) -> Self {
        self.order_by = Some(order_by);
        self
    }

    pub fn page_token(mut self, token: impl Into<String>) -> Self {
        self.page_token = Some(token.into());
        self
    }

    pub(crate) fn query_pairs(&self, customer: &str) -> Vec<(&'static str, String)> {
        let mut pairs = vec![("customer", customer.to_string())];

        if self.max_results > 0 {
            pairs.push(("maxResults", self.max_results.to_string()));
        }
        if let Some(query) = self.query.as_deref().filter(|q| !q.is_empty()) {
            pairs.push(("query", query.to_string()));
        }
        if let Some(order_by) = self.order_by {
            pairs.push(("orderBy", order_by.as_str().to_string()));
        }
        if let Some(token) = self.page_token.as_deref().filter(|t| !t.is_empty()) {
            pairs.push(("pageToken", token.to_string()));
        }

        pairs
    }
}

/// Authorized handle on the Directory API users resource.
pub struct DirectoryUserService {
    pub(crate) client: Client,
    base_url: Url,
    pub(crate) batch_url: Url,
    customer: String,
    pub(crate) token_source: Arc<dyn TokenSource>,
}

impl DirectoryUserService {
    /// Authorizes (running the browser flow if needed) and builds the handle.
    pub async fn connect(authorizer: &Authorizer, settings: &ServiceSettings) -> Result<Self> {
        let credential = authorizer.authorize().await?;

        let service = Self::with_token_source(Arc::new(credential), settings)?;
        tracing::info!("***    Directory service with scope admin.directory.user initialized    ***");
        Ok(service)
    }

    /// Builds the handle around a credential obtained elsewhere.
    pub fn with_token_source(
        token_source: Arc<dyn TokenSource>,
        settings: &ServiceSettings,
    ) -> Result<Self> {
        let mut base_url = Url::parse(&settings.base_url)
            .map_err(|e| DirectoryError::config(format!("Invalid directory base URL: {}", e)))?;
        if base_url.cannot_be_a_base() {
            return Err(DirectoryError::config(format!(
                "Directory base URL cannot be a base: {}",
                settings.base_url
            )));
        }
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let batch_url = Url::parse(&settings.batch_url)
            .map_err(|e| DirectoryError::config(format!("Invalid batch URL: {}", e)))?;

        let client = Client::builder()
            .user_agent(settings.application_name.clone())
            .build()?;

        Ok(Self {
            client,
            base_url,
            batch_url,
            customer: settings.customer.clone(),
            token_source,
        })
    }

    pub fn customer(&self) -> &str {
        &self.customer
    }

    /// Creates a user in the domain.
    pub async fn create_user(&self, user: &User) -> Result<User> {
        let url = self.users_url(None)?;
        let request = self.request(Method::POST, url).await?.json(user);
        self.execute(request).await
    }

    /// Fetches a user by primary email, alias or immutable id.
    pub async fn get_user(&self, user_key: &str) -> Result<User> {
        let url = self.users_url(Some(user_key))?;
        let request = self.request(Method::GET, url).await?;
        self.execute(request).await
    }

    /// Replaces the user's fields with the ones set in `user`.
    pub async fn update_user(&self, user_key: &str, user: &User) -> Result<User> {
        let url = self.users_url(Some(user_key))?;
        let request = self.request(Method::PUT, url).await?.json(user);
        self.execute(request).await
    }

    pub async fn delete_user(&self, user_key: &str) -> Result<()> {
        let url = self.users_url(Some(user_key))?;
        let response = self.request(Method::DELETE, url).await?.send().await?;
        error_for_status(response).await?;
        Ok(())
    }

    /// First page of users matching `params`, across all domains of the customer.
    pub async fn list_users(&self, params: &ListUsersRequest) -> Result<Vec<User>> {
        let page = self.list_users_page(params).await?;
        Ok(page.users.unwrap_or_default())
    }

    pub async fn list_users_by_email(&self) -> Result<Vec<User>> {
        self.list_users(&ListUsersRequest::new().order_by(OrderBy::Email))
            .await
    }

    pub async fn list_users_by_name(&self) -> Result<Vec<User>> {
        self.list_users(&ListUsersRequest::new().order_by(OrderBy::GivenName))
            .await
    }

    pub async fn list_users_page(&self, params: &ListUsersRequest) -> Result<Users> {
        let url = self.users_url(None)?;
        let request = self
            .request(Method::GET, url)
            .await?
            .query(&params.query_pairs(&self.customer));
        self.execute(request).await
    }

    /// Follows `nextPageToken` until the listing is exhausted.
    pub async fn list_all_users(&self, params: &ListUsersRequest) -> Result<Vec<User>> {
        let mut params = params.clone();
        let mut users = Vec::new();

        loop {
            let page = self.list_users_page(&params).await?;
            users.extend(page.users.unwrap_or_default());

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => {
                    tracing::debug!("Fetching next users page ({} so far)", users.len());
                    params.page_token = Some(token);
                }
                None => break,
            }
        }

        Ok(users)
    }

    /// Inserts all users in a single batch HTTP exchange. The first per-item
    /// failure is logged and returned.
    pub async fn create_users(&self, users: &[User]) -> Result<()> {
        let mut batch = self.batch();
        for user in users {
            batch.queue_insert(user)?;
        }

        batch.execute(&InsertUserCallback).await
    }

    pub fn batch(&self) -> BatchRequest<'_> {
        BatchRequest::new(self)
    }

    pub(crate) fn users_url(&self, user_key: Option<&str>) -> Result<Url> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| DirectoryError::config("Directory base URL cannot be a base"))?;
            segments.pop_if_empty().push("users");
            if let Some(key) = user_key {
                segments.push(key);
            }
        }
        Ok(url)
    }

    pub(crate) async fn access_token(&self) -> Result<String> {
        self.token_source.access_token().await
    }

    async fn request(&self, method: Method, url: Url) -> Result<RequestBuilder> {
        tracing::debug!("{} {}", method, url);
        let token = self.access_token().await?;
        Ok(self
            .client
            .request(method, url)
            .bearer_auth(token)
            .header(ACCEPT, "application/json"))
    }

    async fn execute<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = request.send().await?;
        let response = error_for_status(response).await?;
        Ok(response.json().await?)
    }
}

/// Turns a non-2xx response into [`DirectoryError::ApiError`].
pub(crate) async fn error_for_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    tracing::debug!("API response status: {} body: {}", status, body);
    Err(DirectoryError::api(
        status,
        GoogleJsonError::from_body(status.as_u16(), &body),
    ))
}

/// Callback used by [`DirectoryUserService::create_users`].
pub struct InsertUserCallback;

impl BatchCallback<User> for InsertUserCallback {
    fn on_success(&self, user: User, _response_headers: &HeaderMap) -> Result<()> {
        tracing::trace!(
            "User '{}' created",
            user.full_name()
                .or(user.primary_email)
                .unwrap_or_default()
        );
        Ok(())
    }

    fn on_failure(&self, error: GoogleJsonError, _response_headers: &HeaderMap) -> Result<()> {
        tracing::error!("Error Message: {}", error.message);
        let status =
            StatusCode::from_u16(error.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        Err(DirectoryError::api(status, error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::auth::{ClientSecretLocator, StaticToken};

    fn service(base_url: &str) -> DirectoryUserService {
        let settings = ServiceSettings {
            base_url: base_url.to_string(),
            ..ServiceSettings::default()
        };
        DirectoryUserService::with_token_source(Arc::new(StaticToken::new("token")), &settings)
            .unwrap()
    }

    #[test]
    fn test_list_request_skips_unset_parameters() {
        let pairs = ListUsersRequest::new().query("").query_pairs(MY_CUSTOMER);
        assert_eq!(pairs, vec![("customer", "my_customer".to_string())]);

        let pairs = ListUsersRequest::new()
            .max_results(25)
            .query("givenName:'Jane*'")
            .order_by(OrderBy::FamilyName)
            .query_pairs("C0123");
        assert_eq!(
            pairs,
            vec![
                ("customer", "C0123".to_string()),
                ("maxResults", "25".to_string()),
                ("query", "givenName:'Jane*'".to_string()),
                ("orderBy", "familyName".to_string()),
            ]
        );
    }

    #[test]
    fn test_users_url() {
        let svc = service("https://admin.googleapis.com/admin/directory/v1");
        assert_eq!(
            svc.users_url(None).unwrap().as_str(),
            "https://admin.googleapis.com/admin/directory/v1/users"
        );
        assert_eq!(
            svc.users_url(Some("jane.doe@example.com")).unwrap().as_str(),
            "https://admin.googleapis.com/admin/directory/v1/users/jane.doe@example.com"
        );
        // a key is always a single path segment
        assert_eq!(
            svc.users_url(Some("a/b")).unwrap().path(),
            "/admin/directory/v1/users/a%2Fb"
        );
    }

    #[test]
    fn test_invalid_base_url_is_rejected() {
        let settings = ServiceSettings {
            base_url: "not a url".to_string(),
            ..ServiceSettings::default()
        };
        let result =
            DirectoryUserService::with_token_source(Arc::new(StaticToken::new("t")), &settings);
        assert!(matches!(result, Err(DirectoryError::ConfigError { .. })));
    }

    #[test]
    fn test_insert_callback_fails_on_error() {
        let headers = HeaderMap::new();
        let callback = InsertUserCallback;

        assert!(callback.on_success(User::default(), &headers).is_ok());

        let err = callback
            .on_failure(GoogleJsonError::from_status(409, "Entity already exists."), &headers)
            .unwrap_err();
        assert_eq!(err.status(), Some(StatusCode::CONFLICT));
    }

    #[tokio::test]
    async fn test_connect_uses_the_authorizer_scopes_as_given() {
        let dir = tempfile::TempDir::new().unwrap();
        let authorizer = Authorizer::new(
            vec![],
            ClientSecretLocator::new(None, None, Some(dir.path().to_path_buf())),
            dir.path().join("tokens.json"),
        );

        let authorize_err = authorizer.authorize().await.unwrap_err();
        let connect_err = DirectoryUserService::connect(&authorizer, &ServiceSettings::default())
            .await
            .err()
            .unwrap();
        assert!(matches!(authorize_err, DirectoryError::EmptyScopes));
        assert!(matches!(connect_err, DirectoryError::EmptyScopes));
    }
}
