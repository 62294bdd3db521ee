// In-memory stand-in for the remote rental API, shared by unit tests

use std::sync::Mutex;
use std::time::Duration;

use axum::async_trait;
use serde_json::Value;

use crate::{
    error::ApiError,
    listings_api::{AccountSource, ListingSource, ManagementSource, SessionSource},
    models::{
        Credentials, DealsBody, NewProperty, PropertyUpdate, ReviewBody, SearchBody, SessionUser,
        SettingsUpdate, SignupBody,
    },
};

/// Serves `rows` (upper-case convention) and filters them the way the SQL
/// query behind `POST /api/properties` does.
#[derive(Default)]
pub struct FakeApi {
    pub rows: Mutex<Vec<Value>>,
    pub deals: Mutex<Vec<Value>>,
    pub details: Mutex<Vec<Value>>,
    /// Served for any id not found in `details`.
    pub fallback_detail: Mutex<Option<Value>>,
    /// Returned by every call while set.
    pub failure: Mutex<Option<ApiError>>,
    /// Searches for this city sleep before answering.
    pub slow_city: Mutex<Option<(String, Duration)>>,
    pub search_bodies: Mutex<Vec<SearchBody>>,
    pub deal_bodies: Mutex<Vec<DealsBody>>,
    pub reviews: Mutex<Vec<(String, ReviewBody)>>,
    pub updates: Mutex<Vec<(String, PropertyUpdate)>>,
    pub deletes: Mutex<Vec<String>>,
    pub created: Mutex<Vec<NewProperty>>,
    pub managed_calls: Mutex<usize>,
    pub user: Mutex<Option<SessionUser>>,
    pub me_calls: Mutex<usize>,
    /// `current_user` sleeps this long before answering.
    pub me_delay: Mutex<Option<Duration>>,
    pub logout_calls: Mutex<usize>,
    pub signups: Mutex<Vec<SignupBody>>,
    /// Served by `GET /api/settings`.
    pub settings_doc: Mutex<Value>,
    pub settings_updates: Mutex<Vec<SettingsUpdate>>,
}

impl FakeApi {
    pub fn with_rows(rows: Vec<Value>) -> Self {
        let api = FakeApi::default();
        *api.rows.lock().unwrap() = rows;
        api
    }

    pub fn fail_with(&self, error: ApiError) {
        *self.failure.lock().unwrap() = Some(error);
    }

    pub fn recover(&self) {
        *self.failure.lock().unwrap() = None;
    }

    pub fn sign_in(&self, username: &str) {
        *self.user.lock().unwrap() = Some(SessionUser {
            user_id: 1,
            username: username.to_string(),
            email: Some(format!("{}@example.com", username)),
        });
    }

    fn check(&self) -> Result<(), ApiError> {
        match self.failure.lock().unwrap().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn require_user(&self) -> Result<(), ApiError> {
        if self.user.lock().unwrap().is_some() {
            Ok(())
        } else {
            Err(ApiError::Rejected { status: 401, message: "Session cookie not found.".into() })
        }
    }
}

fn server_side_match(row: &Value, body: &SearchBody) -> bool {
    let num = |key: &str| row.get(key).and_then(Value::as_f64);
    let city_ok = match &body.city {
        Some(city) => row
            .get("CITY")
            .and_then(Value::as_str)
            .is_some_and(|c| c.to_lowercase().contains(&city.to_lowercase())),
        None => true,
    };
    city_ok
        && body.min_rent.is_none_or(|m| num("RENT_COST").is_some_and(|r| r >= m))
        && body.max_rent.is_none_or(|m| num("RENT_COST").is_some_and(|r| r <= m))
        && body.min_beds.is_none_or(|m| num("BEDROOMS").is_some_and(|b| b >= m))
        && body.min_baths.is_none_or(|m| num("BATHROOMS").is_some_and(|b| b >= m))
}

#[async_trait]
impl ListingSource for FakeApi {
    async fn search(&self, body: &SearchBody) -> Result<Vec<Value>, ApiError> {
        self.search_bodies.lock().unwrap().push(body.clone());
        let delay = self
            .slow_city
            .lock()
            .unwrap()
            .clone()
            .filter(|(city, _)| body.city.as_deref() == Some(city.as_str()))
            .map(|(_, delay)| delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.check()?;
        let rows = self.rows.lock().unwrap();
        Ok(rows.iter().filter(|r| server_side_match(r, body)).cloned().collect())
    }

    async fn best_deals(&self, body: &DealsBody) -> Result<Vec<Value>, ApiError> {
        self.deal_bodies.lock().unwrap().push(body.clone());
        self.check()?;
        Ok(self.deals.lock().unwrap().clone())
    }

    async fn listing(&self, id: &str) -> Result<Value, ApiError> {
        self.check()?;
        self.details
            .lock()
            .unwrap()
            .iter()
            .find(|d| d.get("id").map(|v| v.to_string().trim_matches('"').to_string()) == Some(id.to_string()))
            .cloned()
            .or_else(|| self.fallback_detail.lock().unwrap().clone())
            .ok_or(ApiError::Rejected { status: 404, message: "Listing not found".into() })
    }

    async fn submit_review(&self, id: &str, review: &ReviewBody) -> Result<(), ApiError> {
        self.check()?;
        self.require_user()?;
        self.reviews.lock().unwrap().push((id.to_string(), review.clone()));
        Ok(())
    }
}

#[async_trait]
impl ManagementSource for FakeApi {
    async fn managed_properties(&self) -> Result<Vec<Value>, ApiError> {
        *self.managed_calls.lock().unwrap() += 1;
        self.check()?;
        self.require_user()?;
        Ok(self.rows.lock().unwrap().clone())
    }

    async fn update_property(&self, id: &str, update: &PropertyUpdate) -> Result<(), ApiError> {
        self.check()?;
        self.require_user()?;
        self.updates.lock().unwrap().push((id.to_string(), update.clone()));
        Ok(())
    }

    async fn delete_property(&self, id: &str) -> Result<(), ApiError> {
        self.check()?;
        self.require_user()?;
        self.deletes.lock().unwrap().push(id.to_string());
        Ok(())
    }

    async fn create_property(&self, property: &NewProperty) -> Result<String, ApiError> {
        self.check()?;
        self.require_user()?;
        let mut created = self.created.lock().unwrap();
        created.push(property.clone());
        Ok((100 + created.len()).to_string())
    }
}

#[async_trait]
impl AccountSource for FakeApi {
    async fn signup(&self, body: &SignupBody) -> Result<(), ApiError> {
        self.check()?;
        let mut signups = self.signups.lock().unwrap();
        if signups.iter().any(|s| s.username == body.username || s.email == body.email) {
            return Err(ApiError::Rejected { status: 401, message: "Failed to create user".into() });
        }
        signups.push(body.clone());
        Ok(())
    }

    async fn settings(&self) -> Result<Value, ApiError> {
        self.check()?;
        self.require_user()?;
        Ok(self.settings_doc.lock().unwrap().clone())
    }

    async fn update_settings(&self, update: &SettingsUpdate) -> Result<(), ApiError> {
        self.check()?;
        self.require_user()?;
        self.settings_updates.lock().unwrap().push(update.clone());
        Ok(())
    }
}

#[async_trait]
impl SessionSource for FakeApi {
    async fn current_user(&self) -> Result<Option<SessionUser>, ApiError> {
        *self.me_calls.lock().unwrap() += 1;
        // Answer reflects the session as it was when the request arrived.
        let user = self.user.lock().unwrap().clone();
        let delay = *self.me_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.check()?;
        Ok(user)
    }

    async fn login(&self, credentials: &Credentials) -> Result<(), ApiError> {
        self.check()?;
        if credentials.password != "secret" {
            return Err(ApiError::Rejected { status: 401, message: "Invalid credentials".into() });
        }
        self.sign_in(&credentials.username);
        Ok(())
    }

    async fn logout(&self) -> Result<(), ApiError> {
        *self.logout_calls.lock().unwrap() += 1;
        self.check()?;
        *self.user.lock().unwrap() = None;
        Ok(())
    }
}
