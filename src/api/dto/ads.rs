//! DTOs for the ad listing.

use serde::Serialize;

use crate::domain::entities::AdRecord;

/// One entry of `GET /ads`.
#[derive(Debug, Serialize)]
pub struct AdItem {
    pub id: i64,
    pub image_url: String,
    pub target_url: String,
}

impl From<AdRecord> for AdItem {
    fn from(ad: AdRecord) -> Self {
        Self {
            id: ad.id,
            image_url: ad.image_url,
            target_url: ad.target_url,
        }
    }
}
