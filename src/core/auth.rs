//! OAuth 2.0 authorization for installed applications.
//!
//! The authorization-code exchange, refresh and token persistence are done by
//! `yup-oauth2`. This module only decides where the client secret and the
//! token store live, and hands out [`Credential`]s.

use crate::domain::ports::TokenSource;
use crate::utils::error::{DirectoryError, Result};
use async_trait::async_trait;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use yup_oauth2::authenticator::DefaultAuthenticator;
use yup_oauth2::authenticator_delegate::InstalledFlowDelegate;
use yup_oauth2::{ApplicationSecret, InstalledFlowAuthenticator, InstalledFlowReturnMethod};

/// View and manage the provisioning of users on your domain.
pub const ADMIN_DIRECTORY_USER: &str = "https://www.googleapis.com/auth/admin.directory.user";
/// View users on your domain.
pub const ADMIN_DIRECTORY_USER_READONLY: &str =
    "https://www.googleapis.com/auth/admin.directory.user.readonly";

pub const CLIENT_SECRET_FILE: &str = "client_secret.json";
pub const CLIENT_SECRET_ENV: &str = "CLIENT_SECRET_JSON_PATH";
pub const DEFAULT_TOKEN_STORE: &str = ".credentials/directory-client-v1.json";

const CLIENT_SECRET_HELP_URL: &str = "https://support.google.com/cloud/answer/6158849";

/// Finds `client_secret.json`.
///
/// Order: the explicitly configured file, then `$CLIENT_SECRET_JSON_PATH/client_secret.json`
/// when the variable is set, otherwise `<working dir>/client_secret.json`.
#[derive(Debug, Clone, Default)]
pub struct ClientSecretLocator {
    explicit: Option<PathBuf>,
    env_dir: Option<PathBuf>,
    working_dir: Option<PathBuf>,
}

impl ClientSecretLocator {
    /// Locator backed by the process environment and working directory.
    pub fn from_env(explicit: Option<PathBuf>) -> Self {
        Self {
            explicit,
            env_dir: std::env::var(CLIENT_SECRET_ENV)
                .ok()
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
            working_dir: std::env::current_dir().ok(),
        }
    }

    pub fn new(
        explicit: Option<PathBuf>,
        env_dir: Option<PathBuf>,
        working_dir: Option<PathBuf>,
    ) -> Self {
        Self {
            explicit,
            env_dir,
            working_dir,
        }
    }

    pub fn locate(&self) -> Result<PathBuf> {
        if let Some(path) = &self.explicit {
            if path.is_file() {
                return Ok(path.clone());
            }
            tracing::warn!(
                "Configured client secret {} does not exist, searching the file system",
                path.display()
            );
        }

        let dir = self
            .env_dir
            .clone()
            .or_else(|| self.working_dir.clone())
            .unwrap_or_else(|| PathBuf::from("."));
        let path = dir.join(CLIENT_SECRET_FILE);

        if !path.is_file() {
            tracing::info!(
                "See {} for how to create the application credentials",
                CLIENT_SECRET_HELP_URL
            );
            return Err(DirectoryError::ClientSecretNotFound { path });
        }

        Ok(path)
    }
}

/// Reads a Google Cloud Console client secret (`installed` or `web` section).
pub async fn load_client_secret(path: &Path) -> Result<ApplicationSecret> {
    let secret = yup_oauth2::read_application_secret(path).await?;
    tracing::debug!("Loaded client secret for client_id {}", secret.client_id);
    Ok(secret)
}

/// `~/.credentials/directory-client-v1.json`
pub fn default_token_store() -> Result<PathBuf> {
    dirs::home_dir()
        .map(|home| home.join(DEFAULT_TOKEN_STORE))
        .ok_or_else(|| DirectoryError::config("Could not determine the home directory"))
}

/// Authorization helper: scopes plus where to find secrets and cache tokens.
#[derive(Debug, Clone)]
pub struct Authorizer {
    scopes: Vec<String>,
    client_secret: ClientSecretLocator,
    token_store: PathBuf,
    redirect_port: Option<u16>,
}

impl Authorizer {
    pub fn new(scopes: Vec<String>, client_secret: ClientSecretLocator, token_store: PathBuf) -> Self {
        Self {
            scopes,
            client_secret,
            token_store,
            redirect_port: None,
        }
    }

    pub fn with_redirect_port(mut self, port: Option<u16>) -> Self {
        self.redirect_port = port;
        self
    }

    /// Adds `scope` unless it is already requested.
    pub fn with_scope(mut self, scope: &str) -> Self {
        if !self.scopes.iter().any(|s| s == scope) {
            self.scopes.push(scope.to_string());
        }
        self
    }

    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }

    pub fn token_store(&self) -> &Path {
        &self.token_store
    }

    /// Returns a credential for the configured scopes, running the browser
    /// flow when the token store holds nothing usable.
    ///
    /// Changing the scopes requires deleting the token store first.
    pub async fn authorize(&self) -> Result<Credential> {
        if self.scopes.is_empty() {
            return Err(DirectoryError::EmptyScopes);
        }

        let secret_path = self.client_secret.locate()?;
        let secret = load_client_secret(&secret_path).await?;

        if let Some(parent) = self.token_store.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let return_method = match self.redirect_port {
            Some(port) => InstalledFlowReturnMethod::HTTPPortRedirect(port),
            None => InstalledFlowReturnMethod::HTTPRedirect,
        };

        let authenticator = InstalledFlowAuthenticator::builder(secret, return_method)
            .persist_tokens_to_disk(self.token_store.clone())
            .flow_delegate(Box::new(ConsoleFlowDelegate))
            .build()
            .await?;

        let credential = Credential {
            authenticator: Arc::new(authenticator),
            scopes: self.scopes.clone().into(),
        };

        // 立即取得 token，讓授權流程在這裡完成並寫入 token store
        credential.access_token().await?;

        let saved_at =
            std::path::absolute(&self.token_store).unwrap_or_else(|_| self.token_store.clone());
        tracing::info!("Credentials saved at {}", saved_at.display());

        Ok(credential)
    }
}

/// An authorized credential; refreshes itself through the cached refresh token.
#[derive(Clone)]
pub struct Credential {
    authenticator: Arc<DefaultAuthenticator>,
    scopes: Arc<[String]>,
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("scopes", &self.scopes)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl TokenSource for Credential {
    async fn access_token(&self) -> Result<String> {
        let token = self.authenticator.token(&self.scopes[..]).await?;
        token
            .token()
            .map(str::to_string)
            .ok_or_else(|| DirectoryError::config("Authorization server returned no access token"))
    }
}

/// A bearer token obtained elsewhere, e.g. by a web application's own flow.
#[derive(Debug, Clone)]
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait]
impl TokenSource for StaticToken {
    async fn access_token(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}

/// Prints the consent URL instead of trying to launch a browser.
struct ConsoleFlowDelegate;

impl InstalledFlowDelegate for ConsoleFlowDelegate {
    fn present_user_url<'a>(
        &'a self,
        url: &'a str,
        need_code: bool,
    ) -> Pin<Box<dyn Future<Output = std::result::Result<String, String>> + Send + 'a>> {
        Box::pin(async move {
            tracing::info!("Waiting for OAuth 2.0 consent in the browser");
            println!("Please open the following address in your browser:\n\n  {}\n", url);

            if !need_code {
                return Ok(String::new());
            }

            use tokio::io::AsyncBufReadExt;
            println!("Enter the authorization code:");
            let mut line = String::new();
            tokio::io::BufReader::new(tokio::io::stdin())
                .read_line(&mut line)
                .await
                .map_err(|e| format!("failed to read authorization code: {}", e))?;
            Ok(line.trim().to_string())
        })
    }
}
