//! HTTP client for the notification backend.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::models::{NotificationFilters, NotificationPage, UserId};
use super::source::{DataSourceError, NotificationDataSource};

#[derive(Deserialize)]
struct CountResponse {
    count: i64,
}

#[derive(Deserialize)]
struct UpdatedResponse<T> {
    updated: T,
}

#[derive(Deserialize)]
struct DeletedResponse {
    deleted: bool,
}

/// [`NotificationDataSource`] backed by the backend's JSON REST API.
pub struct HttpNotificationSource {
    client: reqwest::Client,
    base_url: Url,
    auth_token: Option<String>,
}

impl HttpNotificationSource {
    /// Create a new client.
    ///
    /// # Arguments
    /// * `base_url` - Base URL of the backend (e.g., "https://api.example.com")
    /// * `timeout_sec` - Request timeout in seconds
    /// * `auth_token` - Bearer token sent with every request, if any
    pub fn new(base_url: &str, timeout_sec: u64, auth_token: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_sec))
            .build()
            .context("Failed to create HTTP client")?;

        // Ensure base_url doesn't have trailing slash
        let base_url = Url::parse(base_url.trim_end_matches('/'))
            .with_context(|| format!("Invalid backend URL: {}", base_url))?;
        if base_url.cannot_be_a_base() {
            anyhow::bail!("Backend URL cannot be used as a base: {}", base_url);
        }

        Ok(Self {
            client,
            base_url,
            auth_token,
        })
    }

    /// Get the base URL of the backend.
    pub fn base_url(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        query: &[(&str, String)],
    ) -> Result<T, DataSourceError> {
        debug!("{} {}", method, url);
        let path = url.path().to_string();
        let mut request = self.client.request(method, url).query(query);
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| DataSourceError::Transport(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(DataSourceError::NotFound(path));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DataSourceError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json()
            .await
            .map_err(|e| DataSourceError::Malformed(e.to_string()))
    }
}

#[async_trait]
impl NotificationDataSource for HttpNotificationSource {
    async fn get_unread_count(&self, user_id: &UserId) -> Result<u64, DataSourceError> {
        let url = self.endpoint(&[
            "v1",
            "users",
            user_id.as_str(),
            "notifications",
            "unread-count",
        ]);
        let response: CountResponse = self.send_json(Method::GET, url, &[]).await?;

        u64::try_from(response.count).map_err(|_| {
            DataSourceError::Malformed(format!("negative unread count {}", response.count))
        })
    }

    async fn get_user_notifications(
        &self,
        user_id: &UserId,
        page: u32,
        page_size: u32,
        filters: &NotificationFilters,
    ) -> Result<NotificationPage, DataSourceError> {
        let url = self.endpoint(&["v1", "users", user_id.as_str(), "notifications"]);

        let mut query = vec![
            ("page", page.to_string()),
            ("page_size", page_size.to_string()),
        ];
        if filters.unread_only {
            query.push(("unread_only", "true".to_string()));
        }
        if let Some(notification_type) = filters.notification_type {
            query.push(("type", notification_type.as_str().to_string()));
        }

        self.send_json(Method::GET, url, &query).await
    }

    async fn mark_as_read(&self, notification_id: &str) -> Result<bool, DataSourceError> {
        let url = self.endpoint(&["v1", "notifications", notification_id, "read"]);
        let response: UpdatedResponse<bool> = self
            .send_json(Method::POST, url, &[])
            .await
            .map_err(|e| match e {
                DataSourceError::NotFound(_) => DataSourceError::NotFound(notification_id.into()),
                e => e,
            })?;
        Ok(response.updated)
    }

    async fn mark_all_as_read(&self, user_id: &UserId) -> Result<u64, DataSourceError> {
        let url = self.endpoint(&["v1", "users", user_id.as_str(), "notifications", "read-all"]);
        let response: UpdatedResponse<u64> = self.send_json(Method::POST, url, &[]).await?;
        Ok(response.updated)
    }

    async fn delete_notification(&self, notification_id: &str) -> Result<bool, DataSourceError> {
        let url = self.endpoint(&["v1", "notifications", notification_id]);
        let response: DeletedResponse = self.send_json(Method::DELETE, url, &[]).await?;
        Ok(response.deleted)
    }
}
