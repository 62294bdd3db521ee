// Landlord property management: list, add, toggle availability, edit, delete

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Mutex;

use crate::{
    error::ApiError,
    listings_api::ManagementSource,
    models::{ListingRecord, LoadState, NewProperty, PropertyUpdate},
    search::normalize_all,
    session::SessionContext,
};

const MANAGE_NETWORK_ERROR: &str = "Network error";

/// Why a toggle, edit or delete did not go through.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ManageError {
    /// The id is not in the loaded list; nothing was sent.
    #[error("Property {0} is not in your list")]
    NotLoaded(String),

    /// The remote refused or could not be reached. Kept as the page notice
    /// unless the session is gone.
    #[error(transparent)]
    Remote(#[from] ApiError),
}

/// What the management page renders.
#[derive(Debug, Clone)]
pub struct ManageView {
    pub state: LoadState<Vec<ListingRecord>>,
    /// Outcome of the last toggle/edit/delete when it failed.
    pub notice: Option<String>,
}

struct Inner {
    state: LoadState<Vec<ListingRecord>>,
    notice: Option<String>,
    generation: u64,
}

pub struct PropertyManager {
    source: Arc<dyn ManagementSource>,
    session: Arc<SessionContext>,
    inner: Mutex<Inner>,
}

impl PropertyManager {
    pub fn new(source: Arc<dyn ManagementSource>, session: Arc<SessionContext>) -> Self {
        PropertyManager {
            source,
            session,
            inner: Mutex::new(Inner { state: LoadState::Idle, notice: None, generation: 0 }),
        }
    }

    /// Initial load for the page; does nothing once a load has happened.
    pub async fn load_if_idle(&self) {
        let idle = matches!(self.inner.lock().await.state, LoadState::Idle);
        if idle {
            self.load().await;
        }
    }

    pub async fn load(&self) {
        let generation = {
            let mut inner = self.inner.lock().await;
            inner.generation += 1;
            inner.state = LoadState::Loading;
            inner.notice = None;
            inner.generation
        };

        let outcome = match self.ensure_session().await {
            Ok(()) => self.source.managed_properties().await.map(|raw| normalize_all(&raw)),
            Err(e) => Err(e),
        };

        let mut inner = self.inner.lock().await;
        if inner.generation != generation {
            tracing::debug!(generation, latest = inner.generation, "Discarding stale management listing");
            return;
        }
        inner.state = match outcome {
            Ok(records) => {
                tracing::info!(count = records.len(), "Loaded managed properties");
                LoadState::Ready(records)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load managed properties");
                LoadState::Error(e.user_message(MANAGE_NETWORK_ERROR))
            }
        };
    }

    /// Forgets the loaded list, e.g. after the landlord logs out.
    pub async fn reset(&self) {
        let mut inner = self.inner.lock().await;
        inner.generation += 1;
        inner.state = LoadState::Idle;
        inner.notice = None;
    }

    pub async fn toggle_availability(&self, id: &str) -> Result<ListingRecord, ManageError> {
        let current = self.loaded(id).await?;
        self.update(id, PropertyUpdate::availability(!current.available)).await
    }

    /// Sends `update` and, once accepted, replaces the record by id.
    pub async fn update(&self, id: &str, update: PropertyUpdate) -> Result<ListingRecord, ManageError> {
        let current = self.loaded(id).await?;
        let result = match self.ensure_session().await {
            Ok(()) => self.source.update_property(id, &update).await,
            Err(e) => Err(e),
        };
        let mut inner = self.inner.lock().await;
        match result {
            Ok(()) => {
                let replacement = current.with_update(&update);
                if let LoadState::Ready(records) = &mut inner.state {
                    if let Some(slot) = records.iter_mut().find(|r| r.id == id) {
                        *slot = replacement.clone();
                    }
                }
                inner.notice = None;
                tracing::info!(id, "Property updated");
                Ok(replacement)
            }
            Err(e) => {
                tracing::warn!(id, error = %e, "Property update failed");
                Err(Self::remember_failure(&mut inner, e))
            }
        }
    }

    pub async fn delete(&self, id: &str) -> Result<(), ManageError> {
        self.loaded(id).await?;
        let result = match self.ensure_session().await {
            Ok(()) => self.source.delete_property(id).await,
            Err(e) => Err(e),
        };
        let mut inner = self.inner.lock().await;
        match result {
            Ok(()) => {
                if let LoadState::Ready(records) = &mut inner.state {
                    records.retain(|r| r.id != id);
                }
                inner.notice = None;
                tracing::info!(id, "Property deleted");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(id, error = %e, "Property delete failed");
                Err(Self::remember_failure(&mut inner, e))
            }
        }
    }

    /// Lists a new unit. The loaded list is dropped on success so the next
    /// page view fetches it again with the new row.
    pub async fn create(&self, property: &NewProperty) -> Result<String, ManageError> {
        self.ensure_session().await?;
        let id = self.source.create_property(property).await.map_err(|e| {
            tracing::warn!(error = %e, "Property create failed");
            ManageError::Remote(e)
        })?;

        let mut inner = self.inner.lock().await;
        inner.generation += 1;
        inner.state = LoadState::Idle;
        inner.notice = None;
        tracing::info!(id = %id, city = %property.city, "Property created");
        Ok(id)
    }

    pub async fn find(&self, id: &str) -> Option<ListingRecord> {
        let inner = self.inner.lock().await;
        inner.state.ready()?.iter().find(|r| r.id == id).cloned()
    }

    pub async fn view(&self) -> ManageView {
        let inner = self.inner.lock().await;
        ManageView { state: inner.state.clone(), notice: inner.notice.clone() }
    }

    async fn loaded(&self, id: &str) -> Result<ListingRecord, ManageError> {
        self.find(id).await.ok_or_else(|| ManageError::NotLoaded(id.to_string()))
    }

    // A lost session sends the landlord to the login form, so it is not kept as a notice.
    fn remember_failure(inner: &mut Inner, error: ApiError) -> ManageError {
        if error != ApiError::NotAuthenticated {
            inner.notice = Some(error.user_message(MANAGE_NETWORK_ERROR));
        }
        ManageError::Remote(error)
    }

    async fn ensure_session(&self) -> Result<(), ApiError> {
        if self.session.is_authenticated().await {
            Ok(())
        } else {
            Err(ApiError::NotAuthenticated)
        }
    }
}
