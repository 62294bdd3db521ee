// Client for the remote rental API (search, deals, listing detail, management, session, accounts)

use std::time::Duration;

use anyhow::{Context, Result};
use axum::async_trait;
use reqwest::{Client, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{
    config::Settings,
    error::ApiError,
    models::{
        Credentials, DealsBody, NewProperty, PropertyUpdate, ReviewBody, SearchBody, SessionUser,
        SettingsUpdate, SignupBody,
    },
    normalizer::created_property_id,
};

/// Public listing queries. Results are raw payloads; callers normalize them.
#[async_trait]
pub trait ListingSource: Send + Sync {
    async fn search(&self, body: &SearchBody) -> Result<Vec<Value>, ApiError>;
    async fn best_deals(&self, body: &DealsBody) -> Result<Vec<Value>, ApiError>;
    async fn listing(&self, id: &str) -> Result<Value, ApiError>;
    async fn submit_review(&self, id: &str, review: &ReviewBody) -> Result<(), ApiError>;
}

/// Landlord-side property management; requires a session on the remote.
#[async_trait]
pub trait ManagementSource: Send + Sync {
    async fn managed_properties(&self) -> Result<Vec<Value>, ApiError>;
    async fn update_property(&self, id: &str, update: &PropertyUpdate) -> Result<(), ApiError>;
    async fn delete_property(&self, id: &str) -> Result<(), ApiError>;
    /// Lists a new unit and returns the id the remote assigned to it.
    async fn create_property(&self, property: &NewProperty) -> Result<String, ApiError>;
}

#[async_trait]
pub trait SessionSource: Send + Sync {
    /// `Ok(None)` when the remote reports no valid session.
    async fn current_user(&self) -> Result<Option<SessionUser>, ApiError>;
    async fn login(&self, credentials: &Credentials) -> Result<(), ApiError>;
    async fn logout(&self) -> Result<(), ApiError>;
}

/// Account creation and the signed-in user's own settings.
#[async_trait]
pub trait AccountSource: Send + Sync {
    async fn signup(&self, body: &SignupBody) -> Result<(), ApiError>;
    /// Raw settings document; see `normalizer::normalize_settings`.
    async fn settings(&self) -> Result<Value, ApiError>;
    async fn update_settings(&self, update: &SettingsUpdate) -> Result<(), ApiError>;
}

/// `reqwest`-backed implementation. The session cookie issued by the remote
/// lives in this client's cookie store, so one instance is shared process-wide.
pub struct HttpApi {
    client: Client,
    origin: Url,
}

impl HttpApi {
    pub fn new(settings: &Settings) -> Result<Self> {
        let mut builder = Client::builder()
            .user_agent(concat!("padfinder_rust/", env!("CARGO_PKG_VERSION")))
            .cookie_store(true)
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .danger_accept_invalid_certs(settings.accept_invalid_certs);

        if let Some(proxy_url) = settings.proxy_url.as_deref().filter(|p| !p.is_empty()) {
            let proxy = reqwest::Proxy::all(proxy_url)
                .with_context(|| format!("Invalid proxy URL '{}'", proxy_url))?;
            builder = builder.proxy(proxy);
            tracing::info!("Routing rental API requests through configured proxy.");
        }

        let client = builder.build().context("Failed to build shared reqwest client")?;
        let origin = Url::parse(settings.api_origin())
            .with_context(|| format!("Invalid api_base_url '{}'", settings.api_base_url))?;
        if origin.cannot_be_a_base() {
            anyhow::bail!("api_base_url '{}' cannot be used as a base URL", settings.api_base_url);
        }

        Ok(HttpApi { client, origin })
    }

    /// Appends path segments to the origin, escaping each one.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.origin.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::Transport(format!("Cannot build URL from {}", self.origin)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, ApiError> {
        request.send().await.map_err(|e| {
            tracing::warn!(error = %e, "Request to rental API did not complete");
            ApiError::Transport(e.to_string())
        })
    }

    async fn fetch_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let response = self.send(request).await?;
        let body = success_body(response).await?;
        serde_json::from_slice(&body).map_err(|e| {
            tracing::warn!(error = %e, "Rental API returned an unexpected body");
            ApiError::Decode(e.to_string())
        })
    }

    async fn fetch_unit(&self, request: RequestBuilder) -> Result<(), ApiError> {
        let response = self.send(request).await?;
        success_body(response).await.map(|_| ())
    }
}

/// Reads the body, turning non-success statuses into `ApiError::Rejected`.
async fn success_body(response: Response) -> Result<Vec<u8>, ApiError> {
    let status = response.status();
    let bytes = response
        .bytes()
        .await
        .map_err(|e| ApiError::Transport(e.to_string()))?;

    if status.is_success() {
        tracing::debug!(status = %status, len = bytes.len(), "Rental API response received");
        return Ok(bytes.to_vec());
    }

    let message = serde_json::from_slice::<Value>(&bytes)
        .ok()
        .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_owned))
        .unwrap_or_else(|| format!("Request failed with status {}", status.as_u16()));
    tracing::warn!(status = %status, message = %message, "Rental API rejected request");
    Err(ApiError::Rejected { status: status.as_u16(), message })
}

#[async_trait]
impl ListingSource for HttpApi {
    async fn search(&self, body: &SearchBody) -> Result<Vec<Value>, ApiError> {
        let url = self.endpoint(&["api", "properties"])?;
        tracing::debug!(?body, "POST /api/properties");
        self.fetch_json(self.client.post(url).json(body)).await
    }

    async fn best_deals(&self, body: &DealsBody) -> Result<Vec<Value>, ApiError> {
        let url = self.endpoint(&["api", "properties", "deals"])?;
        tracing::debug!(?body, "POST /api/properties/deals");
        self.fetch_json(self.client.post(url).json(body)).await
    }

    async fn listing(&self, id: &str) -> Result<Value, ApiError> {
        let url = self.endpoint(&["api", "listing", id])?;
        self.fetch_json(self.client.get(url)).await
    }

    async fn submit_review(&self, id: &str, review: &ReviewBody) -> Result<(), ApiError> {
        let url = self.endpoint(&["api", "listing", id, "review"])?;
        self.fetch_unit(self.client.post(url).json(review)).await
    }
}

#[async_trait]
impl ManagementSource for HttpApi {
    async fn managed_properties(&self) -> Result<Vec<Value>, ApiError> {
        let url = self.endpoint(&["api", "manage-properties"])?;
        self.fetch_json(self.client.get(url)).await
    }

    async fn update_property(&self, id: &str, update: &PropertyUpdate) -> Result<(), ApiError> {
        let url = self.endpoint(&["api", "manage-properties", id])?;
        self.fetch_unit(self.client.put(url).json(update)).await
    }

    async fn delete_property(&self, id: &str) -> Result<(), ApiError> {
        let url = self.endpoint(&["api", "manage-properties", id])?;
        self.fetch_unit(self.client.delete(url)).await
    }

    // Shares its URL with the search; the body shape tells the two apart.
    async fn create_property(&self, property: &NewProperty) -> Result<String, ApiError> {
        let url = self.endpoint(&["api", "properties"])?;
        tracing::debug!(city = %property.city, "POST /api/properties (create)");
        let raw: Value = self.fetch_json(self.client.post(url).json(property)).await?;
        created_property_id(&raw).ok_or_else(|| {
            tracing::warn!(body = %raw, "Create response carried no property id");
            ApiError::Decode("response has no propertyId".to_string())
        })
    }
}

#[async_trait]
impl SessionSource for HttpApi {
    async fn current_user(&self) -> Result<Option<SessionUser>, ApiError> {
        let url = self.endpoint(&["api", "me"])?;
        match self.fetch_json::<SessionUser>(self.client.get(url)).await {
            Ok(user) => Ok(Some(user)),
            Err(ApiError::Rejected { status: 401, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn login(&self, credentials: &Credentials) -> Result<(), ApiError> {
        let url = self.endpoint(&["api", "login"])?;
        self.fetch_unit(self.client.post(url).json(credentials)).await
    }

    async fn logout(&self) -> Result<(), ApiError> {
        let url = self.endpoint(&["api", "logout"])?;
        self.fetch_unit(self.client.post(url)).await
    }
}

#[async_trait]
impl AccountSource for HttpApi {
    async fn signup(&self, body: &SignupBody) -> Result<(), ApiError> {
        let url = self.endpoint(&["api", "signup"])?;
        tracing::debug!(username = %body.username, "POST /api/signup");
        self.fetch_unit(self.client.post(url).json(body)).await
    }

    async fn settings(&self) -> Result<Value, ApiError> {
        let url = self.endpoint(&["api", "settings"])?;
        self.fetch_json(self.client.get(url)).await
    }

    async fn update_settings(&self, update: &SettingsUpdate) -> Result<(), ApiError> {
        let url = self.endpoint(&["api", "settings"])?;
        self.fetch_unit(self.client.put(url).json(update)).await
    }
}
