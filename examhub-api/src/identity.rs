//! Identity gateway
//!
//! Student and staff records only carry the opaque external id handed out
//! here. Password handling never touches the entity store.

use async_trait::async_trait;
use examhub_common::{Error, Result};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

pub const MIN_PASSWORD_LEN: usize = 6;

#[async_trait]
pub trait IdentityGateway: Send + Sync {
    /// Create an account and return its external id
    async fn create_account(&self, email: &str, password: &str) -> Result<String>;

    async fn delete_account(&self, uid: &str) -> Result<()>;
}

/// In-process account table used when no provider endpoint is configured
#[derive(Default)]
pub struct LocalIdentityGateway {
    accounts: Mutex<HashMap<String, String>>,
}

impl LocalIdentityGateway {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IdentityGateway for LocalIdentityGateway {
    async fn create_account(&self, email: &str, password: &str) -> Result<String> {
        let email = email.trim().to_lowercase();
        if !email.contains('@') {
            return Err(Error::Validation("The email address is badly formatted".to_string()));
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(Error::Validation(format!(
                "Password should be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }

        let mut accounts = self.accounts.lock().await;
        if accounts.contains_key(&email) {
            return Err(Error::Conflict(
                "The email address is already in use by another account".to_string(),
            ));
        }

        let uid = Uuid::new_v4().simple().to_string();
        accounts.insert(email, uid.clone());
        debug!("Created local identity account {}", uid);
        Ok(uid)
    }

    async fn delete_account(&self, uid: &str) -> Result<()> {
        // Accounts created before a restart are gone already
        self.accounts.lock().await.retain(|_, existing| existing != uid);
        Ok(())
    }
}

#[derive(Serialize)]
struct CreateAccountRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct CreateAccountResponse {
    uid: String,
}

#[derive(Deserialize)]
struct ProviderError {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// REST identity provider
///
/// `POST <endpoint>/accounts {email, password} -> {uid}` and
/// `DELETE <endpoint>/accounts/<uid>`.
pub struct HttpIdentityGateway {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpIdentityGateway {
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>) -> Self {
        let endpoint = endpoint.into().trim_end_matches('/').to_string();
        info!("Using identity provider at {}", endpoint);
        Self {
            client: reqwest::Client::new(),
            endpoint,
            api_key,
        }
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }
}

fn unreachable_provider(err: reqwest::Error) -> Error {
    Error::Upstream(format!("Identity provider request failed: {}", err))
}

/// Map a non-success provider response onto the error taxonomy
async fn provider_failure(response: reqwest::Response) -> Error {
    let status = response.status();
    let detail = response
        .json::<ProviderError>()
        .await
        .ok()
        .and_then(|body| body.error.or(body.message))
        .unwrap_or_else(|| status.to_string());

    match status {
        StatusCode::CONFLICT => Error::Conflict(detail),
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => Error::Validation(detail),
        StatusCode::NOT_FOUND => Error::NotFound(detail),
        _ => Error::Upstream(format!("Identity provider returned {}: {}", status, detail)),
    }
}

#[async_trait]
impl IdentityGateway for HttpIdentityGateway {
    async fn create_account(&self, email: &str, password: &str) -> Result<String> {
        let request = self
            .client
            .post(format!("{}/accounts", self.endpoint))
            .json(&CreateAccountRequest { email, password });

        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(unreachable_provider)?;
        if !response.status().is_success() {
            return Err(provider_failure(response).await);
        }

        let created: CreateAccountResponse =
            response.json().await.map_err(unreachable_provider)?;
        Ok(created.uid)
    }

    async fn delete_account(&self, uid: &str) -> Result<()> {
        let request = self
            .client
            .delete(format!("{}/accounts/{}", self.endpoint, uid));

        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(unreachable_provider)?;
        if !response.status().is_success() {
            let failure = provider_failure(response).await;
            return Err(Error::Upstream(failure.message()));
        }

        Ok(())
    }
}
