use crate::core::auth::{
    default_token_store, Authorizer, ClientSecretLocator, ADMIN_DIRECTORY_USER,
};
use crate::core::batch::MAX_BATCH_SIZE;
use crate::core::directory::{
    ServiceSettings, BATCH_ENDPOINT, DEFAULT_APPLICATION_NAME, DIRECTORY_ENDPOINT, MY_CUSTOMER,
};
use crate::utils::error::{DirectoryError, Result};
use crate::utils::validation::{
    validate_non_empty_list, validate_non_empty_string, validate_range, validate_url, Validate,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Looked up in the working directory when no `--config` is given.
pub const DEFAULT_CONFIG_FILE: &str = "directory-client.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub application: ApplicationConfig,
    pub auth: AuthConfig,
    pub directory: DirectoryConfig,
    pub samples: SamplesConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationConfig {
    pub name: String,
    pub log_format: LogFormat,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_APPLICATION_NAME.to_string(),
            log_format: LogFormat::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub client_secret: Option<PathBuf>,
    /// Defaults to `~/.credentials/directory-client-v1.json`.
    pub token_store: Option<PathBuf>,
    /// Local redirect listener port, any free port when unset.
    pub redirect_port: Option<u16>,
    pub scopes: Vec<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            client_secret: None,
            token_store: None,
            redirect_port: None,
            scopes: vec![ADMIN_DIRECTORY_USER.to_string()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectoryConfig {
    pub base_url: String,
    pub batch_url: String,
    pub customer: String,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            base_url: DIRECTORY_ENDPOINT.to_string(),
            batch_url: BATCH_ENDPOINT.to_string(),
            customer: MY_CUSTOMER.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleKind {
    CreateUser,
    CreateUsers,
    GetUser,
    UpdateUser,
    DeleteUser,
    ListUsers,
    QueryUsers,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplesConfig {
    /// Demos executed by `-run`, in order.
    pub enabled: Vec<SampleKind>,
    pub domain: String,
    /// Key looked up by the get-user demo.
    pub lookup_user_key: String,
    pub given_name: String,
    pub family_name: String,
    pub password: String,
    pub org_unit_path: String,
    pub work_phone: String,
    pub batch_size: usize,
}

impl Default for SamplesConfig {
    fn default() -> Self {
        Self {
            enabled: vec![SampleKind::GetUser],
            domain: "example.com".to_string(),
            lookup_user_key: "admin@example.com".to_string(),
            given_name: "Jane".to_string(),
            family_name: "Doe".to_string(),
            password: "change-me-at-first-login".to_string(),
            org_unit_path: "/".to_string(),
            work_phone: "+15555550100".to_string(),
            batch_size: 10,
        }
    }
}

impl SamplesConfig {
    /// `jane.doe@example.com`
    pub fn sample_email(&self) -> String {
        format!(
            "{}.{}@{}",
            self.given_name.to_lowercase().replace(' ', "."),
            self.family_name.to_lowercase().replace(' ', "."),
            self.domain
        )
    }
}

impl Settings {
    /// 讀取 `path`；未指定時若工作目錄有 directory-client.toml 就用它，否則使用預設值
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None if Path::new(DEFAULT_CONFIG_FILE).is_file() => {
                Self::from_file(DEFAULT_CONFIG_FILE)
            }
            None => Ok(Self::default()),
        }
    }

    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(DirectoryError::IoError)?;
        tracing::debug!("Loaded configuration from {}", path.as_ref().display());
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content)
            .map_err(|e| DirectoryError::config(format!("TOML parsing error: {}", e)))
    }

    /// 替換環境變數 (例如 ${CLIENT_SECRET_FILE})
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}")
            .map_err(|e| DirectoryError::config(format!("Invalid substitution pattern: {}", e)))?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn service_settings(&self) -> ServiceSettings {
        ServiceSettings {
            application_name: self.application.name.clone(),
            base_url: self.directory.base_url.clone(),
            batch_url: self.directory.batch_url.clone(),
            customer: self.directory.customer.clone(),
        }
    }

    /// Builds the authorizer shared by `-authenticate` and `-run`; the user
    /// management scope is always requested on top of `[auth].scopes`.
    pub fn authorizer(&self) -> Result<Authorizer> {
        let token_store = match &self.auth.token_store {
            Some(path) => path.clone(),
            None => default_token_store()?,
        };

        Ok(Authorizer::new(
            self.auth.scopes.clone(),
            ClientSecretLocator::from_env(self.auth.client_secret.clone()),
            token_store,
        )
        .with_redirect_port(self.auth.redirect_port)
        .with_scope(ADMIN_DIRECTORY_USER))
    }
}

impl Validate for Settings {
    fn validate(&self) -> Result<()> {
        validate_non_empty_string("application.name", &self.application.name)?;
        validate_non_empty_list("auth.scopes", &self.auth.scopes)?;
        validate_url("directory.base_url", &self.directory.base_url)?;
        validate_url("directory.batch_url", &self.directory.batch_url)?;
        validate_non_empty_string("directory.customer", &self.directory.customer)?;
        validate_non_empty_string("samples.domain", &self.samples.domain)?;
        validate_range("samples.batch_size", self.samples.batch_size, 1, MAX_BATCH_SIZE)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::auth::ADMIN_DIRECTORY_USER_READONLY;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_without_file() {
        let settings = Settings::from_toml_str("").unwrap();

        assert_eq!(settings.auth.scopes, vec![ADMIN_DIRECTORY_USER.to_string()]);
        assert_eq!(settings.directory.customer, "my_customer");
        assert_eq!(settings.samples.enabled, vec![SampleKind::GetUser]);
        assert_eq!(settings.application.log_format, LogFormat::Compact);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_parse_full_config() {
        let toml_content = r#"
[application]
name = "Acme - Google Admin SDK"
log_format = "json"

[auth]
client_secret = "/etc/acme/client_secret.json"
token_store = "/var/lib/acme/tokens.json"
redirect_port = 8085
scopes = ["https://www.googleapis.com/auth/admin.directory.user.readonly"]

[directory]
customer = "C01abc"

[samples]
enabled = ["list_users", "query_users"]
domain = "acme.test"
given_name = "Mary Ann"
family_name = "Smith"
batch_size = 3
"#;

        let settings = Settings::from_toml_str(toml_content).unwrap();

        assert_eq!(settings.application.log_format, LogFormat::Json);
        assert_eq!(settings.auth.redirect_port, Some(8085));
        assert_eq!(
            settings.auth.token_store.as_deref(),
            Some(Path::new("/var/lib/acme/tokens.json"))
        );
        assert_eq!(
            settings.samples.enabled,
            vec![SampleKind::ListUsers, SampleKind::QueryUsers]
        );
        assert_eq!(settings.samples.sample_email(), "mary.ann.smith@acme.test");

        let service = settings.service_settings();
        assert_eq!(service.application_name, "Acme - Google Admin SDK");
        assert_eq!(service.customer, "C01abc");
        assert_eq!(service.base_url, DIRECTORY_ENDPOINT);

        let authorizer = settings.authorizer().unwrap();
        assert_eq!(authorizer.token_store(), Path::new("/var/lib/acme/tokens.json"));
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("DIRECTORY_CLIENT_TEST_CUSTOMER", "C0substituted");

        let toml_content = r#"
[directory]
customer = "${DIRECTORY_CLIENT_TEST_CUSTOMER}"
"#;

        let settings = Settings::from_toml_str(toml_content).unwrap();
        assert_eq!(settings.directory.customer, "C0substituted");

        std::env::remove_var("DIRECTORY_CLIENT_TEST_CUSTOMER");
    }

    #[test]
    fn test_config_validation() {
        let settings = Settings::from_toml_str(
            r#"
[directory]
base_url = "invalid-url"
"#,
        )
        .unwrap();
        assert!(settings.validate().is_err());

        let settings = Settings::from_toml_str(
            r#"
[samples]
batch_size = 0
"#,
        )
        .unwrap();
        assert!(settings.validate().is_err());

        let settings = Settings::from_toml_str("[auth]\nscopes = []\n").unwrap();
        assert!(matches!(
            settings.validate(),
            Err(DirectoryError::InvalidConfigValueError { ref field, .. }) if field == "auth.scopes"
        ));
    }

    #[test]
    fn test_authorizer_always_requests_user_scope() {
        let settings = Settings::from_toml_str(
            r#"
[auth]
token_store = "/tmp/directory-client-tokens.json"
scopes = ["https://www.googleapis.com/auth/admin.directory.user.readonly"]
"#,
        )
        .unwrap();

        // -authenticate and -run both authorize through this one list
        let authorizer = settings.authorizer().unwrap();
        assert_eq!(
            authorizer.scopes(),
            [
                ADMIN_DIRECTORY_USER_READONLY.to_string(),
                ADMIN_DIRECTORY_USER.to_string()
            ]
        );
        assert_eq!(settings.authorizer().unwrap().scopes(), authorizer.scopes());

        let settings = Settings::from_toml_str(
            "[auth]\ntoken_store = \"/tmp/directory-client-tokens.json\"\n",
        )
        .unwrap();
        assert_eq!(
            settings.authorizer().unwrap().scopes(),
            [ADMIN_DIRECTORY_USER.to_string()]
        );
    }

    #[test]
    fn test_unknown_sample_is_a_parse_error() {
        let result = Settings::from_toml_str("[samples]\nenabled = [\"undelete_user\"]\n");
        assert!(matches!(result, Err(DirectoryError::ConfigError { .. })));
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(b"[application]\nname = \"file-test\"\n")
            .unwrap();

        let settings = Settings::load(Some(temp_file.path())).unwrap();
        assert_eq!(settings.application.name, "file-test");
    }
}
