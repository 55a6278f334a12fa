// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! HTTP directory client.
//!
//! Talks to the Admin SDK directory endpoints:
//!
//! | Call                 | Endpoint                                                         |
//! |----------------------|------------------------------------------------------------------|
//! | `is_super_admin`     | `GET /admin/directory/v1/users/{userKey}`                        |
//! | `role_assignments`   | `GET /admin/directory/v1/customer/{customer}/roleassignments`    |
//! | `role_privileges`    | `GET /admin/directory/v1/customer/{customer}/roles/{roleId}`     |
//!
//! Non-success statuses are mapped through [`DirectoryError::from_status`].
//! A `Retry-After` header on a 429 is preserved for logging.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use reqwest::{Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

use rolegate_core::error::DirectoryError;
use rolegate_core::types::{AccessToken, Privilege};

use crate::api::{AssignmentPage, DirectoryApi, RoleAssignment};

const API_PATH: [&str; 3] = ["admin", "directory", "v1"];

// =============================================================================
// Configuration
// =============================================================================

/// Settings for [`HttpDirectoryClient`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpDirectoryConfig {
    /// API root, e.g. `https://admin.googleapis.com`.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Customer whose roles are listed. `my_customer` means the caller's own.
    #[serde(default = "default_customer_id")]
    pub customer_id: String,

    /// Per-request timeout in milliseconds.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_base_url() -> String {
    "https://admin.googleapis.com".to_string()
}

fn default_customer_id() -> String {
    "my_customer".to_string()
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

impl Default for HttpDirectoryConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            customer_id: default_customer_id(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl HttpDirectoryConfig {
    /// Config pointing at `base_url` with default customer and timeout.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Returns the request timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

// =============================================================================
// Wire Types
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserResource {
    #[serde(default)]
    is_admin: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RoleAssignmentList {
    #[serde(default)]
    items: Vec<RoleAssignmentResource>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RoleAssignmentResource {
    #[serde(deserialize_with = "string_or_number")]
    role_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RoleResource {
    #[serde(default)]
    role_privileges: Vec<RolePrivilegeResource>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RolePrivilegeResource {
    privilege_name: String,
    #[serde(default)]
    service_id: String,
}

/// Role ids are int64 values that the API sends as strings.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(i64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(text) => text,
        Raw::Number(number) => number.to_string(),
    })
}

// =============================================================================
// HttpDirectoryClient
// =============================================================================

/// `reqwest`-based [`DirectoryApi`].
#[derive(Debug, Clone)]
pub struct HttpDirectoryClient {
    client: reqwest::Client,
    base_url: Url,
    customer_id: String,
}

impl HttpDirectoryClient {
    /// Creates a client from its configuration.
    pub fn new(config: &HttpDirectoryConfig) -> Result<Self, DirectoryError> {
        let base_url = Url::parse(&config.base_url).map_err(|e| {
            DirectoryError::transport(format!("Invalid directory base URL '{}': {}", config.base_url, e))
        })?;

        if base_url.cannot_be_a_base() {
            return Err(DirectoryError::transport(format!(
                "Directory base URL '{}' cannot carry a path",
                config.base_url
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .pool_max_idle_per_host(10)
            .build()
            .map_err(|e| DirectoryError::transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            customer_id: config.customer_id.clone(),
        })
    }

    /// Returns the configured base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(API_PATH).extend(segments);
        }
        url
    }

    fn user_url(&self, user_key: &str) -> Url {
        self.endpoint(&["users", user_key])
    }

    fn assignments_url(&self, user_key: &str, page_token: Option<&str>) -> Url {
        let mut url = self.endpoint(&["customer", &self.customer_id, "roleassignments"]);
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("userKey", user_key);
            if let Some(token) = page_token.filter(|t| !t.is_empty()) {
                query.append_pair("pageToken", token);
            }
        }
        url
    }

    fn role_url(&self, role_id: &str) -> Url {
        self.endpoint(&["customer", &self.customer_id, "roles", role_id])
    }

    async fn get_json<T: DeserializeOwned>(&self, token: &AccessToken, url: Url) -> Result<T, DirectoryError> {
        tracing::trace!(url = %url, "Directory request");

        let response = self
            .client
            .get(url)
            .bearer_auth(token.expose())
            .send()
            .await
            .map_err(|e| DirectoryError::transport(format!("HTTP request failed: {}", e)))?;

        let response = check_status(response).await?;

        response
            .json::<T>()
            .await
            .map_err(|e| DirectoryError::invalid_response(e.to_string()))
    }
}

async fn check_status(response: Response) -> Result<Response, DirectoryError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let retry_after = if status == StatusCode::TOO_MANY_REQUESTS {
        parse_retry_after(&response)
    } else {
        None
    };
    let body = response.text().await.unwrap_or_default();

    Err(DirectoryError::from_status(status.as_u16(), body, retry_after))
}

fn parse_retry_after(response: &Response) -> Option<Duration> {
    response
        .headers()
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

#[async_trait]
impl DirectoryApi for HttpDirectoryClient {
    fn name(&self) -> &str {
        "http"
    }

    async fn is_super_admin(&self, token: &AccessToken, user_key: &str) -> Result<bool, DirectoryError> {
        let user: UserResource = self.get_json(token, self.user_url(user_key)).await?;
        Ok(user.is_admin)
    }

    async fn role_assignments(
        &self,
        token: &AccessToken,
        user_key: &str,
        page_token: Option<&str>,
    ) -> Result<AssignmentPage, DirectoryError> {
        let list: RoleAssignmentList = self
            .get_json(token, self.assignments_url(user_key, page_token))
            .await?;

        Ok(AssignmentPage {
            assignments: list
                .items
                .into_iter()
                .map(|item| RoleAssignment::new(item.role_id))
                .collect(),
            next_page_token: list.next_page_token.filter(|t| !t.is_empty()),
        })
    }

    async fn role_privileges(&self, token: &AccessToken, role_id: &str) -> Result<Vec<Privilege>, DirectoryError> {
        let role: RoleResource = self.get_json(token, self.role_url(role_id)).await?;

        Ok(role
            .role_privileges
            .into_iter()
            .map(|p| Privilege::new(p.privilege_name, p.service_id))
            .collect())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> HttpDirectoryClient {
        HttpDirectoryClient::new(&HttpDirectoryConfig::with_base_url(base)).unwrap()
    }

    #[test]
    fn test_user_url() {
        let client = client("https://admin.example.com");
        assert_eq!(
            client.user_url("12345").as_str(),
            "https://admin.example.com/admin/directory/v1/users/12345"
        );
    }

    #[test]
    fn test_base_url_with_trailing_slash_and_prefix() {
        let client = client("http://127.0.0.1:8080/proxy/");
        assert_eq!(
            client.role_url("77").as_str(),
            "http://127.0.0.1:8080/proxy/admin/directory/v1/customer/my_customer/roles/77"
        );
    }

    #[test]
    fn test_assignments_url_query() {
        let client = client("https://admin.example.com");
        let url = client.assignments_url("user@example.com", Some("next-1"));
        assert_eq!(url.path(), "/admin/directory/v1/customer/my_customer/roleassignments");

        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("userKey".to_string(), "user@example.com".to_string()),
                ("pageToken".to_string(), "next-1".to_string()),
            ]
        );

        let url = client.assignments_url("u", None);
        assert_eq!(url.query(), Some("userKey=u"));
    }

    #[test]
    fn test_path_segments_are_escaped() {
        let client = client("https://admin.example.com");
        assert!(client.user_url("a/b").as_str().ends_with("/users/a%2Fb"));
    }

    #[test]
    fn test_invalid_base_url() {
        let result = HttpDirectoryClient::new(&HttpDirectoryConfig::with_base_url("not a url"));
        assert!(matches!(result, Err(DirectoryError::Transport { .. })));

        let result = HttpDirectoryClient::new(&HttpDirectoryConfig::with_base_url("mailto:x@y"));
        assert!(result.is_err());
    }

    #[test]
    fn test_wire_role_assignment_list() {
        let list: RoleAssignmentList = serde_json::from_str(
            r#"{"kind":"admin#directory#roleAssignments",
                "items":[{"roleAssignmentId":"1","roleId":"9170516996784129","assignedTo":"u"},
                         {"roleId": 42}],
                "nextPageToken":"abc"}"#,
        )
        .unwrap();

        assert_eq!(list.items[0].role_id, "9170516996784129");
        assert_eq!(list.items[1].role_id, "42");
        assert_eq!(list.next_page_token.as_deref(), Some("abc"));

        let empty: RoleAssignmentList = serde_json::from_str("{}").unwrap();
        assert!(empty.items.is_empty());
    }

    #[test]
    fn test_wire_role_and_user() {
        let role: RoleResource = serde_json::from_str(
            r#"{"roleId":"1","roleName":"Helpdesk",
                "rolePrivileges":[{"privilegeName":"USERS_RETRIEVE","serviceId":"00haapch16h1ysv"}]}"#,
        )
        .unwrap();
        assert_eq!(role.role_privileges[0].privilege_name, "USERS_RETRIEVE");
        assert_eq!(role.role_privileges[0].service_id, "00haapch16h1ysv");

        let user: UserResource = serde_json::from_str(r#"{"primaryEmail":"a@b.c"}"#).unwrap();
        assert!(!user.is_admin);
    }

    #[test]
    fn test_config_defaults() {
        let config: HttpDirectoryConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, HttpDirectoryConfig::default());
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
    }
}
