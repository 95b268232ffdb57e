//! DTO for per-ad analytics.

use serde::Serialize;

use crate::domain::analytics::AdAnalytics;

#[derive(Debug, Serialize)]
pub struct AnalyticsResponse {
    pub ad_id: i64,
    pub clicks: i64,
    pub impression: f64,
    #[serde(rename = "CTR")]
    pub ctr: i64,
}

impl From<AdAnalytics> for AnalyticsResponse {
    fn from(a: AdAnalytics) -> Self {
        Self {
            ad_id: a.ad_id,
            clicks: a.clicks,
            impression: a.impression,
            ctr: a.ctr,
        }
    }
}
