//! Browser fingerprint validation
//!
//! The client sends an open JSON object. Known attributes are checked for
//! type and bounds; unknown attributes are carried through untouched.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

const MAX_VISITOR_ID_LEN: usize = 128;
const MAX_USER_AGENT_LEN: usize = 1024;
const MAX_SHORT_FIELD_LEN: usize = 128;
const MAX_GPU_FIELD_LEN: usize = 512;
const MAX_HARDWARE_CONCURRENCY: u64 = 512;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FingerprintError {
    #[error("fingerprint must be a JSON object")]
    NotAnObject,

    #[error("visitorId is required")]
    MissingVisitorId,

    #[error("{0} has the wrong type")]
    WrongType(&'static str),

    #[error("{field} exceeds {max} characters")]
    TooLong { field: &'static str, max: usize },

    #[error("hardwareConcurrency out of range")]
    HardwareConcurrencyOutOfRange,

    #[error("screen must look like <width>x<height>x<depth>")]
    ScreenFormat,

    #[error("timestamp is not a recognizable datetime")]
    TimestampFormat,
}

/// Validated fingerprint, serialized back to its stored form
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Fingerprint {
    pub visitor_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hardware_concurrency: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screen: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gpu_vendor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gpu_renderer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Fingerprint {
    pub fn to_value(&self) -> Value {
        // Serializing a struct of strings, numbers and a JSON map cannot fail.
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Validate a raw fingerprint document
pub fn validate(raw: &Value) -> Result<Fingerprint, FingerprintError> {
    let mut fields = raw.as_object().ok_or(FingerprintError::NotAnObject)?.clone();

    let visitor_id = take_string(&mut fields, "visitorId", MAX_VISITOR_ID_LEN)?
        .filter(|id| !id.trim().is_empty())
        .ok_or(FingerprintError::MissingVisitorId)?;

    let user_agent = take_string(&mut fields, "userAgent", MAX_USER_AGENT_LEN)?;
    let language = take_string(&mut fields, "language", MAX_SHORT_FIELD_LEN)?;
    let platform = take_string(&mut fields, "platform", MAX_SHORT_FIELD_LEN)?;
    let timezone = take_string(&mut fields, "timezone", MAX_SHORT_FIELD_LEN)?;
    let gpu_vendor = take_string(&mut fields, "gpuVendor", MAX_GPU_FIELD_LEN)?;
    let gpu_renderer = take_string(&mut fields, "gpuRenderer", MAX_GPU_FIELD_LEN)?;

    let hardware_concurrency = match take(&mut fields, "hardwareConcurrency") {
        None => None,
        Some(value) => {
            let cores = value
                .as_u64()
                .ok_or(FingerprintError::WrongType("hardwareConcurrency"))?;
            if !(1..=MAX_HARDWARE_CONCURRENCY).contains(&cores) {
                return Err(FingerprintError::HardwareConcurrencyOutOfRange);
            }
            Some(cores)
        }
    };

    let screen = take_string(&mut fields, "screen", MAX_SHORT_FIELD_LEN)?;
    if let Some(screen) = screen.as_deref() {
        if !is_screen_geometry(screen) {
            return Err(FingerprintError::ScreenFormat);
        }
    }

    let timestamp = take_string(&mut fields, "timestamp", MAX_SHORT_FIELD_LEN)?;
    if let Some(timestamp) = timestamp.as_deref() {
        if !is_datetime(timestamp) {
            return Err(FingerprintError::TimestampFormat);
        }
    }

    Ok(Fingerprint {
        visitor_id,
        user_agent,
        language,
        platform,
        hardware_concurrency,
        screen,
        timezone,
        gpu_vendor,
        gpu_renderer,
        timestamp,
        extra: fields,
    })
}

/// Remove a field, treating JSON null as absent
fn take(fields: &mut Map<String, Value>, field: &str) -> Option<Value> {
    fields.remove(field).filter(|value| !value.is_null())
}

fn take_string(
    fields: &mut Map<String, Value>,
    field: &'static str,
    max: usize,
) -> Result<Option<String>, FingerprintError> {
    match take(fields, field) {
        None => Ok(None),
        Some(Value::String(s)) if s.chars().count() > max => {
            Err(FingerprintError::TooLong { field, max })
        }
        Some(Value::String(s)) => Ok(Some(s)),
        Some(_) => Err(FingerprintError::WrongType(field)),
    }
}

/// `1920x1080x24`
fn is_screen_geometry(screen: &str) -> bool {
    let parts: Vec<&str> = screen.split('x').collect();
    parts.len() == 3
        && parts.iter().all(|part| {
            !part.is_empty()
                && part.bytes().all(|b| b.is_ascii_digit())
                && part.parse::<u32>().is_ok_and(|n| n > 0)
        })
}

fn is_datetime(value: &str) -> bool {
    DateTime::parse_from_rfc3339(value).is_ok()
        || NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f").is_ok()
        || NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f").is_ok()
        || NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok()
}
