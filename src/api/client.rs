//! GymSense REST Client
//!
//! reqwest-based implementation of the API traits. Every authenticated
//! request carries the session token verbatim in `Authorization`, and the
//! cookie store keeps the server session for `/user/recover`.

use super::dto::{
    CreateResponse, Credentials, DataEnvelope, LoginResponse, NotifyRequest, StatusResponse,
    UpdateResponse,
};
use super::{ApiError, ApiResult, AuthApi, DeviceApi, NotificationApi, TokenHandle};
use crate::device::{Device, DevicePatch};
use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Configuration for the REST client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL, e.g. "https://gymsense-api-production.up.railway.app"
    pub base_url: String,
    /// Request timeout in milliseconds
    pub request_timeout_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "https://gymsense-api-production.up.railway.app".to_string(),
            request_timeout_ms: 30_000,
        }
    }
}

/// REST client for the GymSense API
pub struct ApiClient {
    client: Client,
    config: ClientConfig,
    token: TokenHandle,
}

impl ApiClient {
    /// Create a client that reads its credentials from `token`
    pub fn new(mut config: ClientConfig, token: TokenHandle) -> ApiResult<Self> {
        config.base_url = config.base_url.trim_end_matches('/').to_string();

        let client = Client::builder()
            .cookie_store(true)
            .build()
            .map_err(ApiError::Transport)?;

        Ok(Self {
            client,
            config,
            token,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Underlying HTTP client, shared with the live channel for cookies
    pub fn http(&self) -> &Client {
        &self.client
    }

    pub fn token(&self) -> &TokenHandle {
        &self.token
    }

    /// Absolute URL for an API path
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    fn device_url(&self, id: &str) -> String {
        self.url(&format!("/iot/{}", urlencoding::encode(id)))
    }

    /// Attach the session token, if any
    pub async fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.token.get().await {
            Some(token) => request.header(AUTHORIZATION, token),
            None => request,
        }
    }

    /// Send a request and turn non-2xx answers into [`ApiError::Rejected`]
    async fn send(&self, request: RequestBuilder) -> ApiResult<Response> {
        let request = self
            .authorize(request)
            .await
            .timeout(Duration::from_millis(self.config.request_timeout_ms));

        let response = request.send().await.map_err(ApiError::from_reqwest)?;

        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::rejected(status, &body))
        }
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> ApiResult<T> {
        let response = self.send(request).await?;
        response.json::<T>().await.map_err(ApiError::from_reqwest)
    }

    async fn authenticate(&self, path: &str, credentials: &Credentials) -> ApiResult<LoginResponse> {
        tracing::debug!(path, email = %credentials.email, "Authenticating");
        self.send_json(self.client.post(self.url(path)).json(credentials))
            .await
    }
}

#[async_trait]
impl AuthApi for ApiClient {
    async fn login(&self, credentials: &Credentials) -> ApiResult<LoginResponse> {
        self.authenticate("/user/login", credentials).await
    }

    async fn register(&self, credentials: &Credentials) -> ApiResult<LoginResponse> {
        self.authenticate("/user/register", credentials).await
    }

    async fn recover(&self) -> ApiResult<LoginResponse> {
        self.send_json(self.client.post(self.url("/user/recover")))
            .await
    }

    async fn logout(&self) -> ApiResult<()> {
        self.send(self.client.post(self.url("/user/logout"))).await?;
        Ok(())
    }
}

#[async_trait]
impl DeviceApi for ApiClient {
    async fn list_devices(&self) -> ApiResult<Vec<Device>> {
        let envelope: DataEnvelope<Vec<Device>> =
            self.send_json(self.client.get(self.url("/iot"))).await?;
        tracing::debug!(count = envelope.data.len(), "Fetched device list");
        Ok(envelope.data)
    }

    async fn get_device(&self, id: &str, with_timeline: bool) -> ApiResult<Device> {
        let request = self
            .client
            .get(self.device_url(id))
            .query(&[("getTimeline", with_timeline)]);
        let envelope: DataEnvelope<Device> = self.send_json(request).await?;
        Ok(envelope.data)
    }

    async fn update_device(&self, id: &str, patch: &DevicePatch) -> ApiResult<Device> {
        let response: UpdateResponse = self
            .send_json(self.client.put(self.device_url(id)).json(patch))
            .await?;
        Ok(response.into_device())
    }

    async fn create_device(&self) -> ApiResult<Device> {
        let response: CreateResponse = self
            .send_json(self.client.post(self.url("/iot/create")))
            .await?;
        Ok(response.iot)
    }

    async fn delete_device(&self, id: &str) -> ApiResult<()> {
        self.send(self.client.delete(self.device_url(id))).await?;
        Ok(())
    }
}

#[async_trait]
impl NotificationApi for ApiClient {
    async fn notify_when_available(
        &self,
        iot_id: &str,
        anonymous_id: &str,
    ) -> ApiResult<StatusResponse> {
        let request = self
            .client
            .post(self.url("/notifications"))
            .query(&[("anonyID", anonymous_id)])
            .json(&NotifyRequest {
                iot_id: iot_id.to_string(),
            });

        // A rejection still carries a `{status}` body the caller can inspect
        match self.send_json::<StatusResponse>(request).await {
            Err(ApiError::Rejected { status, message }) => {
                tracing::warn!(iot_id, status, %message, "Availability notification refused");
                Ok(StatusResponse {
                    status: serde_json::Value::String("error".to_string()),
                })
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::{Path, Query};
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::{json, Value};
    use std::collections::HashMap;

    const TOKEN: &str = "secret-token";

    fn authorized(headers: &HeaderMap) -> bool {
        headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(|v| v == TOKEN)
            .unwrap_or(false)
    }

    fn test_router() -> Router {
        Router::new()
            .route(
                "/user/login",
                post(|Json(body): Json<Value>| async move {
                    if body["password"] == "hunter2" {
                        (
                            StatusCode::OK,
                            Json(json!({
                                "token": TOKEN,
                                "user": {"email": body["email"], "permissions": ["iot:read:*"]}
                            })),
                        )
                    } else {
                        (
                            StatusCode::UNAUTHORIZED,
                            Json(json!({"status": false, "message": "Invalid credentials"})),
                        )
                    }
                }),
            )
            .route(
                "/iot",
                get(|headers: HeaderMap| async move {
                    if !authorized(&headers) {
                        return (StatusCode::UNAUTHORIZED, Json(json!({"message": "No token"})));
                    }
                    (
                        StatusCode::OK,
                        Json(json!({
                            "status": true,
                            "data": [
                                {"id": "d1", "occupancy": true, "isOffline": false},
                                {"id": "d2", "occupancy": false, "isOffline": true}
                            ]
                        })),
                    )
                }),
            )
            .route(
                "/iot/:id",
                get(
                    |Path(id): Path<String>, Query(q): Query<HashMap<String, String>>| async move {
                        let timeline = if q.get("getTimeline").map(String::as_str) == Some("true") {
                            json!([{"from": "2024-03-01T08:00:00Z", "to": "2024-03-01T09:00:00Z", "occupancy": true}])
                        } else {
                            Value::Null
                        };
                        Json(json!({"status": true, "data": {"id": id, "occupancy": false, "timeline": timeline}}))
                    },
                )
                .put(|Path(id): Path<String>, Json(patch): Json<Value>| async move {
                    Json(json!({"id": id, "occupancy": false, "name": patch["name"]}))
                })
                .delete(|Path(id): Path<String>| async move {
                    if id == "locked" {
                        (StatusCode::FORBIDDEN, "not allowed")
                    } else {
                        (StatusCode::NO_CONTENT, "")
                    }
                }),
            )
            .route(
                "/iot/create",
                post(|| async { Json(json!({"iot": {"id": "new-1", "occupancy": false}})) }),
            )
            .route(
                "/notifications",
                post(
                    |Query(q): Query<HashMap<String, String>>, Json(body): Json<Value>| async move {
                        if q.get("anonyID").map(String::as_str) == Some("anon-1")
                            && body["iotId"] == "d1"
                        {
                            (StatusCode::OK, Json(json!({"status": "success"})))
                        } else {
                            (StatusCode::BAD_REQUEST, Json(json!({"status": "error", "message": "bad"})))
                        }
                    },
                ),
            )
    }

    async fn spawn_server() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, test_router()).await.unwrap();
        });
        format!("http://{}", addr)
    }

    async fn client_for(base_url: String) -> ApiClient {
        let config = ClientConfig {
            base_url,
            request_timeout_ms: 5_000,
        };
        ApiClient::new(config, TokenHandle::new()).unwrap()
    }

    fn credentials(password: &str) -> Credentials {
        Credentials {
            email: "member@gym.io".to_string(),
            password: password.to_string(),
        }
    }

    #[test]
    fn test_url_building() {
        let config = ClientConfig {
            base_url: "http://localhost:3000/".to_string(),
            request_timeout_ms: 1000,
        };
        let client = ApiClient::new(config, TokenHandle::new()).unwrap();
        assert_eq!(client.url("/iot"), "http://localhost:3000/iot");
        assert_eq!(client.device_url("a b/c"), "http://localhost:3000/iot/a%20b%2Fc");
    }

    #[tokio::test]
    async fn test_login_success() {
        let client = client_for(spawn_server().await).await;
        let resp = client.login(&credentials("hunter2")).await.unwrap();
        assert_eq!(resp.token, TOKEN);
        assert_eq!(resp.user.email, "member@gym.io");
        assert_eq!(resp.user.permissions, vec!["iot:read:*"]);
    }

    #[tokio::test]
    async fn test_login_rejection_carries_message() {
        let client = client_for(spawn_server().await).await;
        let err = client.login(&credentials("wrong")).await.unwrap_err();
        assert!(matches!(err, ApiError::Rejected { status: 401, .. }));
        assert_eq!(err.user_message(), "Invalid credentials");
    }

    #[tokio::test]
    async fn test_token_sent_verbatim() {
        let client = client_for(spawn_server().await).await;

        let err = client.list_devices().await.unwrap_err();
        assert!(err.is_unauthorized());

        client.token().set(TOKEN).await;
        let devices = client.list_devices().await.unwrap();
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].id, "d1");
        assert!(devices[1].is_offline);
    }

    #[tokio::test]
    async fn test_get_device_timeline_flag() {
        let client = client_for(spawn_server().await).await;

        let plain = client.get_device("d1", false).await.unwrap();
        assert!(plain.timeline.is_none());

        let detailed = client.get_device("d1", true).await.unwrap();
        assert_eq!(detailed.timeline.map(|t| t.len()), Some(1));
    }

    #[tokio::test]
    async fn test_update_create_delete() {
        let client = client_for(spawn_server().await).await;

        let updated = client
            .update_device("d1", &DevicePatch::new().name("Rower"))
            .await
            .unwrap();
        assert_eq!(updated.name.as_deref(), Some("Rower"));

        let created = client.create_device().await.unwrap();
        assert_eq!(created.id, "new-1");

        client.delete_device("d1").await.unwrap();
        let err = client.delete_device("locked").await.unwrap_err();
        assert_eq!(err.user_message(), "not allowed");
    }

    #[tokio::test]
    async fn test_notify_when_available() {
        let client = client_for(spawn_server().await).await;

        let ok = client.notify_when_available("d1", "anon-1").await.unwrap();
        assert!(ok.is_success());

        let refused = client.notify_when_available("d9", "anon-1").await.unwrap();
        assert!(!refused.is_success());
    }

    #[tokio::test]
    async fn test_transport_error_when_unreachable() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = client_for(format!("http://{}", addr)).await;
        let err = client.list_devices().await.unwrap_err();
        assert!(matches!(err, ApiError::Transport(_)));
        assert_eq!(err.user_message(), crate::api::GENERIC_TRANSPORT_MESSAGE);
    }
}
