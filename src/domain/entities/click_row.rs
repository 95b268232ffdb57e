//! Persisted click entity.

use chrono::{DateTime, Utc};

use crate::domain::click_event::ClickEvent;

/// One persisted click (`ads_clicks`). Append-only.
#[derive(Debug, Clone, PartialEq)]
pub struct ClickRow {
    pub ad_id: i64,
    pub ip: String,
    pub timestamp: DateTime<Utc>,
    pub timeframe: f64,
    pub playback_time: f64,
}

impl From<&ClickEvent> for ClickRow {
    fn from(event: &ClickEvent) -> Self {
        Self {
            ad_id: event.ad_id,
            ip: event.ip.to_string(),
            timestamp: event.timestamp,
            timeframe: event.timeframe,
            playback_time: event.playback_time,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_row_from_event() {
        let event = ClickEvent {
            ad_id: 42,
            timestamp: Utc::now(),
            ip: "1.2.3.4".parse().unwrap(),
            playback_time: 50.0,
            timeframe: 25.0,
        };

        let row = ClickRow::from(&event);

        assert_eq!(row.ad_id, 42);
        assert_eq!(row.ip, "1.2.3.4");
        assert_eq!(row.timestamp, event.timestamp);
        assert_eq!(row.timeframe, 25.0);
        assert_eq!(row.playback_time, 50.0);
    }
}
