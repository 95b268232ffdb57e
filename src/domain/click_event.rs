//! Click event model and the validator that produces it.
//!
//! A [`ClickSubmission`] is the raw, untrusted payload of `POST /ads/click`.
//! [`ClickSubmission::from_json`] reads it from a JSON body, reporting a
//! wrongly typed field the same way as an out-of-range one, and
//! [`ClickSubmission::into_event`] is the only way to obtain a
//! [`ClickEvent`]: it checks every field, stamps the server-side acceptance
//! time and returns a [`FieldViolation`] naming the first offending field.
//!
//! The resulting event is immutable and travels unchanged from the ingress
//! handler, through the broker (as JSON), to the click worker.

use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use validator::{Validate, ValidationErrors};

use crate::error::AppError;

/// Field order used to report the first violation deterministically.
const FIELD_ORDER: [&str; 4] = ["id", "ip", "playback_time", "timeframe"];

/// Raw click payload as submitted by clients.
///
/// Every field is optional at the serde level so that a missing field is
/// reported as a field-level violation instead of an opaque decode error.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct ClickSubmission {
    #[serde(rename = "id")]
    #[validate(required, range(min = 1))]
    pub ad_id: Option<i64>,

    #[validate(required, ip)]
    pub ip: Option<String>,

    #[validate(required, range(exclusive_min = 0.0))]
    pub playback_time: Option<f64>,

    #[validate(required, range(exclusive_min = 0.0))]
    pub timeframe: Option<f64>,
}

/// A single violated constraint.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Validation failed on field '{field}': {constraint}")]
pub struct FieldViolation {
    pub field: String,
    pub constraint: String,
}

impl FieldViolation {
    fn new(field: &str, constraint: &str) -> Self {
        Self {
            field: field.to_string(),
            constraint: constraint.to_string(),
        }
    }

    fn first_of(errors: &ValidationErrors) -> Self {
        let by_field = errors.field_errors();

        // `field_errors` is a hash map; walk it in declaration order.
        for name in FIELD_ORDER {
            let Some(errs) = by_field.get(name) else {
                continue;
            };
            if let Some(first) = errs.first() {
                return Self::new(name, &first.code);
            }
        }

        Self::new("unknown", "invalid")
    }
}

impl From<FieldViolation> for AppError {
    fn from(v: FieldViolation) -> Self {
        AppError::bad_request(
            v.to_string(),
            json!({ "field": v.field, "constraint": v.constraint }),
        )
    }
}

impl ClickSubmission {
    /// Reads a submission from a decoded JSON body.
    ///
    /// `null` and absent fields are left as `None` for [`Self::into_event`]
    /// to report as `required`. A field of the wrong JSON type yields a
    /// `type` violation, unless an earlier field in the order `id`, `ip`,
    /// `playback_time`, `timeframe` is already missing.
    ///
    /// # Errors
    ///
    /// Returns a [`FieldViolation`] with constraint `type` for the first
    /// wrongly typed field, or on field `body` if the body is not an object.
    pub fn from_json(body: Value) -> Result<Self, FieldViolation> {
        let Value::Object(fields) = body else {
            return Err(FieldViolation::new("body", "type"));
        };

        let ad_id = typed_field(&fields, "id", Value::as_i64);
        let ip = typed_field(&fields, "ip", |v| v.as_str().map(str::to_string));
        let playback_time = typed_field(&fields, "playback_time", Value::as_f64);
        let timeframe = typed_field(&fields, "timeframe", Value::as_f64);

        // The first field that is missing or mistyped decides which error wins.
        let slots = [
            ad_id.as_ref().map(Option::is_some),
            ip.as_ref().map(Option::is_some),
            playback_time.as_ref().map(Option::is_some),
            timeframe.as_ref().map(Option::is_some),
        ];
        for (name, slot) in FIELD_ORDER.into_iter().zip(slots) {
            match slot {
                Ok(true) => continue,
                Ok(false) => break,
                Err(_) => return Err(FieldViolation::new(name, "type")),
            }
        }

        Ok(Self {
            ad_id: ad_id.unwrap_or_default(),
            ip: ip.unwrap_or_default(),
            playback_time: playback_time.unwrap_or_default(),
            timeframe: timeframe.unwrap_or_default(),
        })
    }

    /// Validates the submission and builds the event stamped with `accepted_at`.
    ///
    /// # Errors
    ///
    /// Returns the first [`FieldViolation`] in field order `id`, `ip`,
    /// `playback_time`, `timeframe`.
    pub fn into_event(self, accepted_at: DateTime<Utc>) -> Result<ClickEvent, FieldViolation> {
        if let Err(errors) = self.validate() {
            return Err(FieldViolation::first_of(&errors));
        }

        let (Some(ad_id), Some(ip), Some(playback_time), Some(timeframe)) =
            (self.ad_id, self.ip, self.playback_time, self.timeframe)
        else {
            return Err(FieldViolation::new("unknown", "required"));
        };

        let ip: IpAddr = ip
            .trim()
            .parse()
            .map_err(|_| FieldViolation::new("ip", "ip"))?;

        if !playback_time.is_finite() {
            return Err(FieldViolation::new("playback_time", "range"));
        }
        if !timeframe.is_finite() {
            return Err(FieldViolation::new("timeframe", "range"));
        }

        Ok(ClickEvent {
            ad_id,
            timestamp: accepted_at,
            ip,
            playback_time,
            timeframe,
        })
    }
}

/// `Ok(None)` for an absent or `null` field, `Err(())` if `read` rejects it.
fn typed_field<T>(
    fields: &Map<String, Value>,
    name: &str,
    read: impl Fn(&Value) -> Option<T>,
) -> Result<Option<T>, ()> {
    match fields.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => read(value).map(Some).ok_or(()),
    }
}

/// A validated, server-stamped click on an ad.
///
/// The broker wire format is this struct encoded as JSON; the ad id is
/// serialized under `id` and the timestamp as RFC 3339.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClickEvent {
    #[serde(rename = "id")]
    pub ad_id: i64,
    pub timestamp: DateTime<Utc>,
    pub ip: IpAddr,
    pub playback_time: f64,
    pub timeframe: f64,
}

/// Broker payload that could not be turned back into a [`ClickEvent`].
#[derive(Debug, thiserror::Error)]
#[error("malformed click message: {0}")]
pub struct DecodeError(#[from] serde_json::Error);

impl ClickEvent {
    /// Message key used for broker partitioning.
    pub fn broker_key(&self) -> String {
        self.ad_id.to_string()
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn decode(payload: &str) -> Result<Self, DecodeError> {
        Ok(serde_json::from_str(payload)?)
    }

    /// Impression derived from this single event.
    pub fn impression(&self) -> f64 {
        self.playback_time / self.timeframe
    }
}
