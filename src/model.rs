//! Data models for LunaTrack.
//!
//! All JSON crossing the HTTP boundary or landing on disk uses camelCase field
//! names, so existing `settings.json` and entry files keep loading.

use serde::{Deserialize, Serialize};

use crate::dates::CalendarDate;
use crate::error::SettingsError;

/// Smallest `defaultCycleLength` the settings accept.
pub const MIN_DEFAULT_CYCLE_LENGTH: u32 = 15;

/// Largest `defaultCycleLength` the settings accept.
pub const MAX_DEFAULT_CYCLE_LENGTH: u32 = 120;

/// Number of predictions produced when the caller does not ask for more.
pub const DEFAULT_PREDICTION_COUNT: usize = 6;

/// Upper bound on `?count=` for the entries endpoint.
pub const MAX_PREDICTION_COUNT: usize = 24;

/// Persisted application settings.
///
/// Every field has a default so partial or older settings files still load.
/// The PIN fields are stored and served back for the client's lock screen;
/// the server itself never checks them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub pin: String,
    pub pin_enabled: bool,

    /// File name (inside the data directory) holding the entry set.
    pub data_file: String,

    /// Cycle length in days used when there is no usable history.
    pub default_cycle_length: u32,

    /// Set by the client after a backup export.
    pub file_protected: bool,

    pub http_port: u16,
    pub https_port: u16,

    /// Whether stats include ovulation day and fertile window per prediction.
    pub enable_ovulation: bool,

    /// Certificate paths for an HTTPS listener, stored for the launcher.
    #[serde(rename = "SSL", skip_serializing_if = "Option::is_none")]
    pub ssl: Option<SslConfig>,
}

/// Certificate and key file paths, relative to the data directory or absolute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SslConfig {
    pub cert_file: String,
    pub key_file: String,
}

impl SslConfig {
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.cert_file.trim().is_empty() {
            return Err(SettingsError::InvalidSsl("certFile"));
        }
        if self.key_file.trim().is_empty() {
            return Err(SettingsError::InvalidSsl("keyFile"));
        }
        Ok(())
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            pin: String::new(),
            pin_enabled: false,
            data_file: "cycles.json".to_string(),
            default_cycle_length: 28,
            file_protected: false,
            http_port: 5173,
            https_port: 7379,
            enable_ovulation: true,
            ssl: None,
        }
    }
}

impl Settings {
    /// Check the invariants the stats engine and storage layer rely on.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if !(MIN_DEFAULT_CYCLE_LENGTH..=MAX_DEFAULT_CYCLE_LENGTH)
            .contains(&self.default_cycle_length)
        {
            return Err(SettingsError::CycleLengthOutOfRange {
                value: self.default_cycle_length,
                min: MIN_DEFAULT_CYCLE_LENGTH,
                max: MAX_DEFAULT_CYCLE_LENGTH,
            });
        }

        // The entries file must stay inside the data directory
        let name = self.data_file.as_str();
        if name.is_empty()
            || name == "."
            || name == ".."
            || name.contains(['/', '\\'])
            || name == "settings.json"
        {
            return Err(SettingsError::InvalidDataFile(self.data_file.clone()));
        }

        if self.http_port == 0 {
            return Err(SettingsError::InvalidPort("httpPort"));
        }
        if self.https_port == 0 {
            return Err(SettingsError::InvalidPort("httpsPort"));
        }

        if let Some(ssl) = &self.ssl {
            ssl.validate()?;
        }

        Ok(())
    }
}

/// Fertile window attached to one predicted cycle start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FertileWindow {
    pub start: CalendarDate,
    pub end: CalendarDate,
}

/// One forecast cycle start with its optional ovulation details.
///
/// `ovulation_date` and `fertile_window` are both `None` when ovulation
/// tracking is disabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictedCycle {
    pub start: CalendarDate,
    pub ovulation_date: Option<CalendarDate>,
    pub fertile_window: Option<FertileWindow>,
}

/// Output of [`crate::stats::compute_stats`], returned by `GET /api/entries`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionResult {
    /// Recorded cycle starts, ascending.
    pub entries: Vec<CalendarDate>,

    pub average_cycle_length: u32,

    /// Predicted cycle starts, soonest first.
    pub predictions: Vec<CalendarDate>,

    /// Same predictions with ovulation details, in the same order.
    pub forecast: Vec<PredictedCycle>,

    pub last: Option<CalendarDate>,

    /// Negative when `last` lies after today.
    pub days_since_last: Option<i64>,

    pub next_date: Option<CalendarDate>,

    /// Negative when the predicted date has already passed.
    pub days_until_next: Option<i64>,
}

/// Request body for `POST /api/entries`.
///
/// The date stays a raw string so a malformed value becomes a 400 with a
/// readable message rather than a body rejection.
#[derive(Debug, Clone, Deserialize)]
pub struct EntryRequest {
    pub date: String,
}

/// Response body for entry mutations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntriesResponse {
    pub entries: Vec<CalendarDate>,
}

/// Query parameters for `GET /api/entries`.
#[derive(Debug, Deserialize)]
pub struct EntriesQuery {
    #[serde(default = "default_prediction_count")]
    pub count: usize,
}

fn default_prediction_count() -> usize {
    DEFAULT_PREDICTION_COUNT
}

/// Body for `GET`/`PUT /api/enable-ovulation`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OvulationToggle {
    pub enable_ovulation: bool,
}

/// Body for `GET`/`PUT /api/ports`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ports {
    pub http_port: u16,
    pub https_port: u16,
}

/// Body for `GET`/`PUT /api/file-protected`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileProtection {
    pub file_protected: bool,
}

/// Response for `GET`/`PUT /api/ssl`; `SSL` is `null` when unset.
#[derive(Debug, Clone, Serialize)]
pub struct SslResponse {
    #[serde(rename = "SSL")]
    pub ssl: Option<SslConfig>,
}

/// One record of `inspiration.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InspirationRecord {
    pub id: u32,
    pub text: String,
}

/// Response for `GET /api/inspiration/:id`.
#[derive(Debug, Clone, Serialize)]
pub struct InspirationResponse {
    pub id: u32,
    pub message: String,
}
