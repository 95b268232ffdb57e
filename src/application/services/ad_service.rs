//! Ad catalogue reads.

use std::sync::Arc;

use serde_json::json;

use crate::domain::entities::AdRecord;
use crate::domain::repositories::AdRepository;
use crate::error::AppError;

/// Service for reading ad metadata.
pub struct AdService {
    repository: Arc<dyn AdRepository>,
}

impl AdService {
    pub fn new(repository: Arc<dyn AdRepository>) -> Self {
        Self { repository }
    }

    /// Lists all ads ordered by id.
    ///
    /// # Errors
    ///
    /// Returns the repository error on database failure.
    pub async fn list_ads(&self) -> Result<Vec<AdRecord>, AppError> {
        self.repository.list_ads().await
    }

    /// Retrieves one ad.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] if no ad has this id.
    pub async fn get_ad(&self, ad_id: i64) -> Result<AdRecord, AppError> {
        self.repository
            .find_ad(ad_id)
            .await?
            .ok_or_else(|| AppError::not_found("Ad not found", json!({ "ad_id": ad_id })))
    }

    /// Checks that the durable store answers.
    ///
    /// # Errors
    ///
    /// Returns the repository error if the store does not answer.
    pub async fn ping(&self) -> Result<(), AppError> {
        self.repository.ping().await
    }
}
