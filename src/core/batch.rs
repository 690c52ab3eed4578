//! Google batch requests: several API calls in one `multipart/mixed` exchange.
//!
//! See <https://developers.google.com/admin-sdk/directory/v1/guides/batch>.

use crate::core::directory::{error_for_status, DirectoryUserService};
use crate::domain::model::{GoogleJsonError, User};
use crate::domain::ports::BatchCallback;
use crate::utils::error::{DirectoryError, Result};
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use url::Url;

/// The API rejects batches with more calls than this.
pub const MAX_BATCH_SIZE: usize = 1000;

#[derive(Debug, Clone)]
struct QueuedRequest {
    method: Method,
    url: Url,
    body: String,
}

/// Requests queued against one service, sent together by [`BatchRequest::execute`].
pub struct BatchRequest<'a> {
    service: &'a DirectoryUserService,
    requests: Vec<QueuedRequest>,
}

impl<'a> BatchRequest<'a> {
    pub(crate) fn new(service: &'a DirectoryUserService) -> Self {
        Self {
            service,
            requests: Vec::new(),
        }
    }

    pub fn queue_insert(&mut self, user: &User) -> Result<()> {
        let url = self.service.users_url(None)?;
        self.queue(Method::POST, url, user)
    }

    pub fn queue_update(&mut self, user_key: &str, user: &User) -> Result<()> {
        let url = self.service.users_url(Some(user_key))?;
        self.queue(Method::PUT, url, user)
    }

    fn queue(&mut self, method: Method, url: Url, user: &User) -> Result<()> {
        let body = serde_json::to_string(user)?;
        self.requests.push(QueuedRequest { method, url, body });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    /// Sends every queued request in one HTTP exchange and hands each
    /// response, in order, to `callback`.
    pub async fn execute<C: BatchCallback<User>>(self, callback: &C) -> Result<()> {
        if self.requests.is_empty() {
            tracing::debug!("Batch is empty, nothing to send");
            return Ok(());
        }
        if self.requests.len() > MAX_BATCH_SIZE {
            return Err(DirectoryError::batch(format!(
                "{} requests queued, a batch holds at most {}",
                self.requests.len(),
                MAX_BATCH_SIZE
            )));
        }

        let boundary = generate_boundary();
        let body = encode_multipart(&self.requests, &boundary);
        tracing::debug!(
            "Sending batch of {} requests ({} bytes) to {}",
            self.requests.len(),
            body.len(),
            self.service.batch_url
        );

        let token = self.service.access_token().await?;
        let response = self
            .service
            .client
            .post(self.service.batch_url.clone())
            .bearer_auth(token)
            .header(
                CONTENT_TYPE,
                format!("multipart/mixed; boundary={}", boundary),
            )
            .body(body)
            .send()
            .await?;
        let response = error_for_status(response).await?;

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let response_boundary = parse_boundary(&content_type)?;
        let text = response.text().await?;

        let parts = parse_multipart(&text, &response_boundary)?;
        if parts.len() != self.requests.len() {
            return Err(DirectoryError::batch(format!(
                "sent {} requests but received {} responses",
                self.requests.len(),
                parts.len()
            )));
        }

        for part in parts {
            tracing::trace!(
                "Batch part {} -> {}",
                part.content_id.as_deref().unwrap_or("-"),
                part.status
            );
            if part.status.is_success() {
                let user: User = serde_json::from_str(&part.body)?;
                callback.on_success(user, &part.headers)?;
            } else {
                let error = GoogleJsonError::from_body(part.status.as_u16(), &part.body);
                callback.on_failure(error, &part.headers)?;
            }
        }

        Ok(())
    }
}

/// One embedded HTTP response of a batch reply.
#[derive(Debug)]
pub(crate) struct BatchPart {
    pub content_id: Option<String>,
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

fn generate_boundary() -> String {
    let suffix: String = thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect();
    format!("batch_{}", suffix)
}

fn encode_multipart(requests: &[QueuedRequest], boundary: &str) -> String {
    let mut body = String::new();

    for (index, request) in requests.iter().enumerate() {
        let target = match request.url.query() {
            Some(query) => format!("{}?{}", request.url.path(), query),
            None => request.url.path().to_string(),
        };

        body.push_str(&format!("--{}\r\n", boundary));
        body.push_str("Content-Type: application/http\r\n");
        body.push_str(&format!("Content-ID: <item-{}>\r\n\r\n", index + 1));
        body.push_str(&format!("{} {} HTTP/1.1\r\n", request.method, target));
        body.push_str("Content-Type: application/json; charset=UTF-8\r\n");
        body.push_str(&format!("Content-Length: {}\r\n\r\n", request.body.len()));
        body.push_str(&request.body);
        body.push_str("\r\n");
    }

    body.push_str(&format!("--{}--\r\n", boundary));
    body
}

pub(crate) fn parse_boundary(content_type: &str) -> Result<String> {
    let media_type = content_type.parse::<mime::Mime>().map_err(|e| {
        DirectoryError::batch(format!(
            "unexpected batch response content type '{}': {}",
            content_type, e
        ))
    })?;

    if media_type.type_() != mime::MULTIPART || media_type.subtype() != "mixed" {
        return Err(DirectoryError::batch(format!(
            "unexpected batch response content type '{}'",
            content_type
        )));
    }

    media_type
        .get_param(mime::BOUNDARY)
        .map(|b| b.as_str().trim_matches('"').to_string())
        .filter(|b| !b.is_empty())
        .ok_or_else(|| DirectoryError::batch("batch response has no multipart boundary"))
}

/// Splits a `multipart/mixed` batch reply into its embedded responses.
pub(crate) fn parse_multipart(body: &str, boundary: &str) -> Result<Vec<BatchPart>> {
    let normalized = body.replace("\r\n", "\n");
    let delimiter = format!("--{}", boundary);
    let mut parts = Vec::new();

    // 第一段是 preamble，最後以 "--" 結尾的是結束標記
    for chunk in normalized.split(delimiter.as_str()).skip(1) {
        if chunk.starts_with("--") {
            break;
        }
        let chunk = chunk.trim_start_matches('\n');
        if chunk.trim().is_empty() {
            continue;
        }
        parts.push(parse_part(chunk)?);
    }

    Ok(parts)
}

fn parse_part(chunk: &str) -> Result<BatchPart> {
    let (outer_headers, http) = chunk
        .split_once("\n\n")
        .ok_or_else(|| DirectoryError::batch("malformed batch part: missing headers"))?;

    let content_id = outer_headers.lines().find_map(|line| {
        let (name, value) = line.split_once(':')?;
        name.trim()
            .eq_ignore_ascii_case("content-id")
            .then(|| value.trim().trim_start_matches('<').trim_end_matches('>').to_string())
    });

    let (head, body) = http.split_once("\n\n").unwrap_or((http, ""));
    let mut lines = head.lines();

    let status_line = lines
        .next()
        .ok_or_else(|| DirectoryError::batch("malformed batch part: missing status line"))?;
    let status = status_line
        .split_whitespace()
        .nth(1)
        .and_then(|code| code.parse::<u16>().ok())
        .and_then(|code| StatusCode::from_u16(code).ok())
        .ok_or_else(|| {
            DirectoryError::batch(format!("malformed batch status line '{}'", status_line))
        })?;

    let mut headers = HeaderMap::new();
    for line in lines {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.trim().as_bytes()),
            HeaderValue::from_str(value.trim()),
        ) {
            headers.append(name, value);
        }
    }

    Ok(BatchPart {
        content_id,
        status,
        headers,
        body: body.trim().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_multipart() {
        let requests = vec![QueuedRequest {
            method: Method::POST,
            url: Url::parse("https://admin.googleapis.com/admin/directory/v1/users").unwrap(),
            body: r#"{"primaryEmail":"jane@example.com"}"#.to_string(),
        }];

        let body = encode_multipart(&requests, "batch_abc");
        assert_eq!(
            body,
            "--batch_abc\r\n\
             Content-Type: application/http\r\n\
             Content-ID: <item-1>\r\n\r\n\
             POST /admin/directory/v1/users HTTP/1.1\r\n\
             Content-Type: application/json; charset=UTF-8\r\n\
             Content-Length: 35\r\n\r\n\
             {\"primaryEmail\":\"jane@example.com\"}\r\n\
             --batch_abc--\r\n"
        );
    }

    #[test]
    fn test_generate_boundary() {
        let a = generate_boundary();
        assert!(a.starts_with("batch_"));
        assert_eq!(a.len(), "batch_".len() + 32);
        assert_ne!(a, generate_boundary());
    }

    #[test]
    fn test_parse_boundary() {
        assert_eq!(
            parse_boundary("multipart/mixed; boundary=batch_xyz").unwrap(),
            "batch_xyz"
        );
        assert_eq!(
            parse_boundary("multipart/mixed; charset=UTF-8; boundary=\"batch_q\"").unwrap(),
            "batch_q"
        );
        assert!(parse_boundary("application/json").is_err());
        assert!(parse_boundary("multipart/mixed").is_err());
        assert!(parse_boundary("not a media type").is_err());
        assert!(parse_boundary("multipart/related; boundary=batch_xyz").is_err());
    }

    #[test]
    fn test_parse_multipart_response() {
        let body = "--batch_r\r\n\
                    Content-Type: application/http\r\n\
                    Content-ID: <response-item-1>\r\n\r\n\
                    HTTP/1.1 200 OK\r\n\
                    Content-Type: application/json; charset=UTF-8\r\n\
                    ETag: \"abc\"\r\n\r\n\
                    {\"primaryEmail\": \"jane@example.com\"}\r\n\
                    --batch_r\r\n\
                    Content-Type: application/http\r\n\
                    Content-ID: <response-item-2>\r\n\r\n\
                    HTTP/1.1 409 Conflict\r\n\
                    Content-Type: application/json; charset=UTF-8\r\n\r\n\
                    {\"error\": {\"code\": 409, \"message\": \"Entity already exists.\"}}\r\n\
                    --batch_r--\r\n";

        let parts = parse_multipart(body, "batch_r").unwrap();
        assert_eq!(parts.len(), 2);

        assert_eq!(parts[0].content_id.as_deref(), Some("response-item-1"));
        assert_eq!(parts[0].status, StatusCode::OK);
        assert_eq!(parts[0].headers.get("etag").unwrap(), "\"abc\"");
        assert_eq!(parts[0].body, "{\"primaryEmail\": \"jane@example.com\"}");

        assert_eq!(parts[1].status, StatusCode::CONFLICT);
        let error = GoogleJsonError::from_body(409, &parts[1].body);
        assert_eq!(error.message, "Entity already exists.");
    }

    #[test]
    fn test_parse_multipart_rejects_bad_status_line() {
        let body = "--b\r\nContent-Type: application/http\r\n\r\nnonsense\r\n\r\n{}\r\n--b--";
        assert!(parse_multipart(body, "b").is_err());
    }
}
