//! HTTP implementation of the API contract (feature `http`).
//!
//! Speaks the budget server's JSON API: a JWT pair from `auth/login/` and
//! `auth/register/`, rotation through `auth/token/refresh/`, blacklisting
//! through `auth/logout/`, and bearer-authenticated GETs for resources.

use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::endpoints::{LOGIN, LOGOUT, REFRESH, REGISTER};
use crate::{
    ApiError, AuthApi, Credentials, FieldErrors, Principal, RefreshGrant, Registration,
    ResourceApi, TokenGrant,
};

/// Client for the budget API server.
///
/// Cheap to clone: `reqwest::Client` is an `Arc` around a connection pool.
#[derive(Debug, Clone)]
pub struct HttpApi {
    client: Client,
    base_url: String,
}

#[derive(Deserialize)]
struct LoginBody {
    access: String,
    refresh: String,
    user: Principal,
}

#[derive(Deserialize)]
struct TokenPair {
    access: String,
    refresh: String,
}

#[derive(Deserialize)]
struct RegisterBody {
    user: Principal,
    tokens: TokenPair,
}

#[derive(Deserialize)]
struct RefreshBody {
    access: String,
    #[serde(default)]
    refresh: Option<String>,
}

impl HttpApi {
    /// Creates a client for the API rooted at `base_url`.
    ///
    /// # Errors
    /// Returns `ApiError::Network` if the TLS backend can't be initialized.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Returns the base address every path is joined to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn send(request: RequestBuilder) -> Result<Response, ApiError> {
        request.send().await.map_err(network_error)
    }
}

impl AuthApi for HttpApi {
    async fn login(&self, credentials: &Credentials) -> Result<TokenGrant, ApiError> {
        let response = Self::send(self.client.post(self.url(LOGIN)).json(credentials)).await?;
        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::BAD_REQUEST => {
                Err(ApiError::InvalidCredentials)
            }
            status if status.is_success() => {
                let body: LoginBody = decode(response).await?;
                Ok(TokenGrant {
                    access: body.access,
                    refresh: body.refresh,
                    expires_at: None,
                    principal: body.user,
                })
            }
            _ => Err(status_error(response).await),
        }
    }

    async fn register(&self, registration: &Registration) -> Result<TokenGrant, ApiError> {
        let response =
            Self::send(self.client.post(self.url(REGISTER)).json(registration)).await?;
        match response.status() {
            StatusCode::BAD_REQUEST => {
                let body: Value = decode(response).await?;
                Err(ApiError::Rejected(field_errors(&body)))
            }
            status if status.is_success() => {
                let body: RegisterBody = decode(response).await?;
                Ok(TokenGrant {
                    access: body.tokens.access,
                    refresh: body.tokens.refresh,
                    expires_at: None,
                    principal: body.user,
                })
            }
            _ => Err(status_error(response).await),
        }
    }

    async fn refresh(&self, refresh_token: &str) -> Result<RefreshGrant, ApiError> {
        let request = self
            .client
            .post(self.url(REFRESH))
            .json(&json!({ "refresh": refresh_token }));
        let response = Self::send(request).await?;
        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::BAD_REQUEST => Err(ApiError::Expired),
            status if status.is_success() => {
                let body: RefreshBody = decode(response).await?;
                Ok(RefreshGrant {
                    access: body.access,
                    refresh: body.refresh,
                    expires_at: None,
                })
            }
            _ => Err(status_error(response).await),
        }
    }

    async fn logout(
        &self,
        access_token: Option<&str>,
        refresh_token: &str,
    ) -> Result<(), ApiError> {
        let mut request = self
            .client
            .post(self.url(LOGOUT))
            .json(&json!({ "refresh": refresh_token }));
        if let Some(token) = access_token {
            request = request.bearer_auth(token);
        }
        let response = Self::send(request).await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(status_error(response).await)
        }
    }
}

impl ResourceApi for HttpApi {
    async fn get(&self, path: &str, access_token: &str) -> Result<Value, ApiError> {
        let request = self.client.get(self.url(path)).bearer_auth(access_token);
        let response = Self::send(request).await?;
        match response.status() {
            StatusCode::UNAUTHORIZED => Err(ApiError::Unauthorized),
            status if status.is_success() => decode(response).await,
            _ => Err(status_error(response).await),
        }
    }
}

fn network_error(error: reqwest::Error) -> ApiError {
    ApiError::Network(error.to_string())
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    response
        .json::<T>()
        .await
        .map_err(|e| ApiError::Decode(e.to_string()))
}

async fn status_error(response: Response) -> ApiError {
    let status = response.status().as_u16();
    let message = response.text().await.unwrap_or_default();
    ApiError::Status { status, message }
}

/// Flattens a DRF-style error body (`{"field": ["msg", ...]}`) into one
/// message per field.
fn field_errors(body: &Value) -> FieldErrors {
    let mut errors = FieldErrors::new();
    if let Value::Object(map) = body {
        for (field, value) in map {
            let message = match value {
                Value::Array(items) => items
                    .iter()
                    .filter_map(Value::as_str)
                    .collect::<Vec<_>>()
                    .join(" "),
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            errors.insert(field.clone(), message);
        }
    }
    errors
}
