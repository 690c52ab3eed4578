//! Directory API resource representations (users resource).
//!
//! Field names follow the API's camelCase JSON. Everything is optional so a
//! partially filled `User` serializes only what the caller set.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A Directory user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<UserName>,
    /// Only ever sent, the API never returns it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash_function: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change_password_at_next_login: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub org_unit_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phones: Option<Vec<UserPhone>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emails: Option<Vec<UserEmail>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suspended: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_admin: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aliases: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creation_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_login_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    /// Fields this crate does not model, kept so they survive a get/update cycle.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl User {
    /// New user with the fields the insert endpoint requires.
    pub fn new(primary_email: impl Into<String>, name: UserName, password: impl Into<String>) -> Self {
        Self {
            primary_email: Some(primary_email.into()),
            name: Some(name),
            password: Some(password.into()),
            ..Self::default()
        }
    }

    pub fn with_org_unit_path(mut self, path: impl Into<String>) -> Self {
        self.org_unit_path = Some(path.into());
        self
    }

    pub fn with_change_password_at_next_login(mut self, change: bool) -> Self {
        self.change_password_at_next_login = Some(change);
        self
    }

    pub fn with_phones(mut self, phones: Vec<UserPhone>) -> Self {
        self.phones = Some(phones);
        self
    }

    /// `name.fullName` as returned by the API, or given + family name when
    /// the server has not filled it in.
    pub fn full_name(&self) -> Option<String> {
        let name = self.name.as_ref()?;
        if let Some(full) = name.full_name.as_deref().filter(|s| !s.is_empty()) {
            return Some(full.to_string());
        }
        let parts: Vec<&str> = [name.given_name.as_deref(), name.family_name.as_deref()]
            .into_iter()
            .flatten()
            .filter(|s| !s.is_empty())
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" "))
        }
    }

    pub fn to_pretty_string(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserName {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub family_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
}

impl UserName {
    pub fn new(given_name: impl Into<String>, family_name: impl Into<String>) -> Self {
        Self {
            given_name: Some(given_name.into()),
            family_name: Some(family_name.into()),
            full_name: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPhone {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary: Option<bool>,
    /// `work`, `home`, `mobile`, ... or `custom` together with `custom_type`.
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub phone_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_type: Option<String>,
}

impl UserPhone {
    pub fn new(value: impl Into<String>, phone_type: impl Into<String>, primary: bool) -> Self {
        Self {
            value: Some(value.into()),
            primary: Some(primary),
            phone_type: Some(phone_type.into()),
            custom_type: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserEmail {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary: Option<bool>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub email_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_type: Option<String>,
}

/// One page of `users.list`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Users {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub users: Option<Vec<User>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
}

/// Sort key accepted by `users.list`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OrderBy {
    Email,
    FamilyName,
    GivenName,
}

impl OrderBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderBy::Email => "email",
            OrderBy::FamilyName => "familyName",
            OrderBy::GivenName => "givenName",
        }
    }
}

impl fmt::Display for OrderBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderBy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "email" => Ok(OrderBy::Email),
            "familyname" => Ok(OrderBy::FamilyName),
            "givenname" => Ok(OrderBy::GivenName),
            other => Err(format!(
                "unsupported orderBy '{}', expected one of: email, familyName, givenName",
                other
            )),
        }
    }
}

/// Error body returned by Google APIs, `{"error": {...}}` unwrapped.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GoogleJsonError {
    #[serde(default)]
    pub code: u16,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ErrorInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorInfo {
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: GoogleJsonError,
}

impl GoogleJsonError {
    pub fn from_status(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            ..Self::default()
        }
    }

    /// Parses an error response body. Bodies that are not the usual JSON
    /// envelope (proxies, HTML error pages) become the message verbatim.
    pub fn from_body(code: u16, body: &str) -> Self {
        match serde_json::from_str::<ErrorEnvelope>(body) {
            Ok(envelope) => {
                let mut error = envelope.error;
                if error.code == 0 {
                    error.code = code;
                }
                error
            }
            Err(_) => Self::from_status(code, body.trim()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_partial_user_serializes_only_set_fields() {
        let user = User::default().with_phones(vec![UserPhone::new("+15555550100", "work", true)]);

        let value = serde_json::to_value(&user).unwrap();
        assert_eq!(
            value,
            json!({"phones": [{"value": "+15555550100", "primary": true, "type": "work"}]})
        );
    }

    #[test]
    fn test_user_keeps_unknown_fields() {
        let body = json!({
            "kind": "admin#directory#user",
            "id": "1234",
            "primaryEmail": "jane.doe@example.com",
            "name": {"givenName": "Jane", "familyName": "Doe", "fullName": "Jane Doe"},
            "isAdmin": false,
            "creationTime": "2016-06-10T12:00:00.000Z",
            "thumbnailPhotoUrl": "https://example.com/photo.png"
        });

        let user: User = serde_json::from_value(body).unwrap();
        assert_eq!(user.primary_email.as_deref(), Some("jane.doe@example.com"));
        assert_eq!(user.full_name().as_deref(), Some("Jane Doe"));
        assert!(user.creation_time.is_some());
        assert_eq!(
            user.extra.get("thumbnailPhotoUrl"),
            Some(&json!("https://example.com/photo.png"))
        );

        let back = serde_json::to_value(&user).unwrap();
        assert_eq!(back["thumbnailPhotoUrl"], "https://example.com/photo.png");
    }

    #[test]
    fn test_full_name_falls_back_to_parts() {
        let user = User::new("jane@example.com", UserName::new("Jane", "Doe"), "secret");
        assert_eq!(user.full_name().as_deref(), Some("Jane Doe"));
        assert_eq!(User::default().full_name(), None);
    }

    #[test]
    fn test_order_by_parsing() {
        assert_eq!("givenname".parse::<OrderBy>().unwrap(), OrderBy::GivenName);
        assert_eq!("familyName".parse::<OrderBy>().unwrap(), OrderBy::FamilyName);
        assert_eq!(OrderBy::Email.as_str(), "email");
        assert!("lastLogin".parse::<OrderBy>().is_err());
    }

    #[test]
    fn test_google_json_error_from_body() {
        let body = r#"{"error":{"code":409,"message":"Entity already exists.","errors":[{"domain":"global","reason":"duplicate","message":"Entity already exists."}]}}"#;
        let error = GoogleJsonError::from_body(409, body);
        assert_eq!(error.code, 409);
        assert_eq!(error.errors[0].reason, "duplicate");

        let error = GoogleJsonError::from_body(502, "<html>Bad Gateway</html>");
        assert_eq!(error.code, 502);
        assert_eq!(error.message, "<html>Bad Gateway</html>");
    }
}
