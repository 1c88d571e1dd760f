//! JSON file storage for LunaTrack.
//!
//! Two files live in the data directory:
//!
//! - `settings.json`: the [`Settings`] record, created with defaults on first read
//! - the entries file named by `Settings::data_file` (default `cycles.json`),
//!   shaped as `{ "entries": ["YYYY-MM-DD", ...] }`
//!
//! Entries are always written sorted and deduplicated. Read-modify-write
//! sequences are serialized through one async mutex per [`Storage`], so two
//! requests in the same process cannot lose each other's updates. Nothing
//! guards against other processes writing the same files.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::dates::CalendarDate;
use crate::error::StorageError;
use crate::model::{InspirationRecord, Settings};

const SETTINGS_FILE: &str = "settings.json";
const INSPIRATION_FILE: &str = "inspiration.json";

/// On-disk shape of the entries file.
///
/// Kept as raw strings so one bad value does not make the whole file unreadable.
#[derive(Debug, Default, Serialize, Deserialize)]
struct EntriesFile {
    #[serde(default)]
    entries: Vec<String>,
}

/// Handle to the data directory.
#[derive(Clone)]
pub struct Storage {
    data_dir: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl Storage {
    /// Open (and create if needed) the data directory.
    pub async fn new(data_dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let data_dir = data_dir.into();
        tokio::fs::create_dir_all(&data_dir)
            .await
            .map_err(|source| io_error(&data_dir, source))?;

        Ok(Self {
            data_dir,
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    /// Read settings, writing the defaults first if the file does not exist.
    ///
    /// A stored record that fails [`Settings::validate`] is an error, so the
    /// stats engine never sees a non-positive fallback and the entries path
    /// never leaves the data directory.
    pub async fn read_settings(&self) -> Result<Settings, StorageError> {
        let path = self.data_dir.join(SETTINGS_FILE);
        match read_stored_settings(&path).await? {
            Some(settings) => Ok(settings),
            None => {
                let _guard = self.write_lock.lock().await;
                // Another request may have created it while we waited
                if let Some(settings) = read_stored_settings(&path).await? {
                    return Ok(settings);
                }
                let defaults = Settings::default();
                write_json(&path, &defaults).await?;
                info!(path = %path.display(), "Created default settings");
                Ok(defaults)
            }
        }
    }

    /// Validate and persist a complete settings record.
    pub async fn write_settings(&self, settings: &Settings) -> Result<(), StorageError> {
        settings.validate()?;
        let _guard = self.write_lock.lock().await;
        write_json(&self.data_dir.join(SETTINGS_FILE), settings).await
    }

    /// Apply `change` to the stored settings and persist the result.
    ///
    /// The read and write happen under the write lock.
    pub async fn update_settings<F>(&self, change: F) -> Result<Settings, StorageError>
    where
        F: FnOnce(&mut Settings),
    {
        let path = self.data_dir.join(SETTINGS_FILE);
        let _guard = self.write_lock.lock().await;
        let mut settings = read_stored_settings(&path).await?.unwrap_or_default();
        change(&mut settings);
        settings.validate()?;
        write_json(&path, &settings).await?;
        Ok(settings)
    }

    /// Read the entry set named by the current settings, ascending.
    pub async fn read_entries(&self) -> Result<Vec<CalendarDate>, StorageError> {
        let settings = self.read_settings().await?;
        let path = self.entries_path(&settings);

        match read_json::<EntriesFile>(&path).await? {
            Some(file) => Ok(parse_entries(file.entries, &path)),
            None => {
                let _guard = self.write_lock.lock().await;
                if let Some(file) = read_json::<EntriesFile>(&path).await? {
                    return Ok(parse_entries(file.entries, &path));
                }
                write_json(&path, &EntriesFile::default()).await?;
                info!(path = %path.display(), "Created empty entries file");
                Ok(Vec::new())
            }
        }
    }

    /// Insert a date (no-op if already present) and return the new entry set.
    pub async fn add_entry(&self, date: CalendarDate) -> Result<Vec<CalendarDate>, StorageError> {
        self.modify_entries(|set| {
            set.insert(date);
        })
        .await
    }

    /// Remove a date (no-op if absent) and return the new entry set.
    pub async fn remove_entry(
        &self,
        date: CalendarDate,
    ) -> Result<Vec<CalendarDate>, StorageError> {
        self.modify_entries(|set| {
            set.remove(&date);
        })
        .await
    }

    async fn modify_entries<F>(&self, change: F) -> Result<Vec<CalendarDate>, StorageError>
    where
        F: FnOnce(&mut BTreeSet<CalendarDate>),
    {
        let settings = self.read_settings().await?;
        let path = self.entries_path(&settings);

        let _guard = self.write_lock.lock().await;
        let current = read_json::<EntriesFile>(&path)
            .await?
            .map(|file| parse_entries(file.entries, &path))
            .unwrap_or_default();

        let mut set: BTreeSet<CalendarDate> = current.into_iter().collect();
        change(&mut set);

        let dates: Vec<CalendarDate> = set.into_iter().collect();
        let file = EntriesFile {
            entries: dates.iter().map(ToString::to_string).collect(),
        };
        write_json(&path, &file).await?;
        debug!(count = dates.len(), "Entries written");

        Ok(dates)
    }

    /// Look up one message in `inspiration.json`.
    ///
    /// Returns `Ok(None)` when the file exists but has no record with `id`.
    /// A missing file is an error.
    pub async fn find_inspiration(
        &self,
        id: u32,
    ) -> Result<Option<InspirationRecord>, StorageError> {
        let path = self.data_dir.join(INSPIRATION_FILE);
        let contents = tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| io_error(&path, source))?;
        let records: Vec<InspirationRecord> =
            serde_json::from_str(&contents).map_err(|source| json_error(&path, source))?;

        Ok(records.into_iter().find(|r| r.id == id))
    }

    fn entries_path(&self, settings: &Settings) -> PathBuf {
        self.data_dir.join(&settings.data_file)
    }
}

/// Parse stored strings, dropping invalid ones, sorted and deduplicated.
fn parse_entries(raw: Vec<String>, path: &Path) -> Vec<CalendarDate> {
    let mut set = BTreeSet::new();
    for value in raw {
        match CalendarDate::parse(&value) {
            Ok(date) => {
                set.insert(date);
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Skipping invalid stored entry");
            }
        }
    }
    set.into_iter().collect()
}

/// Read `settings.json` and check it; `Ok(None)` when it does not exist.
async fn read_stored_settings(path: &Path) -> Result<Option<Settings>, StorageError> {
    let Some(settings) = read_json::<Settings>(path).await? else {
        return Ok(None);
    };

    settings
        .validate()
        .map_err(|source| StorageError::InvalidStoredSettings {
            path: path.display().to_string(),
            source,
        })?;
    Ok(Some(settings))
}

/// Read and parse a JSON file; `Ok(None)` when it does not exist.
async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StorageError> {
    let contents = match tokio::fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => return Err(io_error(path, source)),
    };

    serde_json::from_str(&contents)
        .map(Some)
        .map_err(|source| json_error(path, source))
}

async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StorageError> {
    let contents = serde_json::to_string_pretty(value).map_err(|source| json_error(path, source))?;
    tokio::fs::write(path, contents)
        .await
        .map_err(|source| io_error(path, source))
}

fn io_error(path: &Path, source: std::io::Error) -> StorageError {
    StorageError::Io {
        path: path.display().to_string(),
        source,
    }
}

fn json_error(path: &Path, source: serde_json::Error) -> StorageError {
    StorageError::Json {
        path: path.display().to_string(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SettingsError;
    use tempfile::TempDir;
    use tokio_test::{assert_err, assert_ok};

    async fn setup_test_storage() -> (TempDir, Storage) {
        let dir = TempDir::new().unwrap();
        let storage = Storage::new(dir.path()).await.unwrap();
        (dir, storage)
    }

    fn date(s: &str) -> CalendarDate {
        CalendarDate::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_settings_created_with_defaults() {
        let (dir, storage) = setup_test_storage().await;

        let settings = storage.read_settings().await.unwrap();
        assert_eq!(settings, Settings::default());
        assert!(dir.path().join(SETTINGS_FILE).exists());
    }

    #[tokio::test]
    async fn test_partial_settings_file_is_filled_in() {
        let (dir, storage) = setup_test_storage().await;
        std::fs::write(
            dir.path().join(SETTINGS_FILE),
            r#"{ "defaultCycleLength": 32, "pinEnabled": true }"#,
        )
        .unwrap();

        let settings = storage.read_settings().await.unwrap();
        assert_eq!(settings.default_cycle_length, 32);
        assert!(settings.pin_enabled);
        assert!(settings.enable_ovulation);
    }

    #[tokio::test]
    async fn test_write_settings_rejects_invalid() {
        let (_dir, storage) = setup_test_storage().await;
        let settings = Settings {
            default_cycle_length: 200,
            ..Settings::default()
        };

        let result = storage.write_settings(&settings).await;
        assert!(matches!(result, Err(StorageError::Settings(_))));
        // Nothing was persisted
        assert_eq!(storage.read_settings().await.unwrap().default_cycle_length, 28);
    }

    #[tokio::test]
    async fn test_out_of_range_stored_settings_are_rejected() {
        let (dir, storage) = setup_test_storage().await;
        std::fs::write(dir.path().join(SETTINGS_FILE), r#"{ "defaultCycleLength": 0 }"#).unwrap();

        let result = storage.read_settings().await;
        assert!(matches!(
            result,
            Err(StorageError::InvalidStoredSettings {
                source: SettingsError::CycleLengthOutOfRange { value: 0, .. },
                ..
            })
        ));

        // Entry reads and updates go through the same check
        assert_err!(storage.read_entries().await);
        assert_err!(storage.add_entry(date("2024-01-01")).await);
        assert_err!(storage.update_settings(|s| s.enable_ovulation = false).await);
    }

    #[tokio::test]
    async fn test_stored_data_file_outside_data_dir_is_rejected() {
        let (dir, storage) = setup_test_storage().await;
        std::fs::write(dir.path().join(SETTINGS_FILE), r#"{ "dataFile": "../x" }"#).unwrap();

        let result = storage.read_entries().await;
        assert!(matches!(
            result,
            Err(StorageError::InvalidStoredSettings {
                source: SettingsError::InvalidDataFile(_),
                ..
            })
        ));
        assert!(!dir.path().join("..").join("x").exists());
    }

    #[tokio::test]
    async fn test_write_settings_repairs_invalid_stored_settings() {
        let (dir, storage) = setup_test_storage().await;
        std::fs::write(dir.path().join(SETTINGS_FILE), r#"{ "defaultCycleLength": 0 }"#).unwrap();

        assert_ok!(storage.write_settings(&Settings::default()).await);
        assert_eq!(storage.read_settings().await.unwrap(), Settings::default());
    }

    #[tokio::test]
    async fn test_ssl_settings_survive_updates() {
        let (dir, storage) = setup_test_storage().await;
        std::fs::write(
            dir.path().join(SETTINGS_FILE),
            r#"{ "SSL": { "certFile": "c.pem", "keyFile": "k.pem" } }"#,
        )
        .unwrap();

        storage
            .update_settings(|s| s.enable_ovulation = false)
            .await
            .unwrap();

        let raw = std::fs::read_to_string(dir.path().join(SETTINGS_FILE)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(
            value["SSL"],
            serde_json::json!({ "certFile": "c.pem", "keyFile": "k.pem" })
        );
        assert_eq!(value["enableOvulation"], false);
    }

    #[tokio::test]
    async fn test_update_settings() {
        let (_dir, storage) = setup_test_storage().await;

        let updated = assert_ok!(
            storage
                .update_settings(|s| s.enable_ovulation = false)
                .await
        );
        assert!(!updated.enable_ovulation);
        assert!(!storage.read_settings().await.unwrap().enable_ovulation);
    }

    #[tokio::test]
    async fn test_add_and_remove_entries() {
        let (_dir, storage) = setup_test_storage().await;

        assert!(storage.read_entries().await.unwrap().is_empty());

        storage.add_entry(date("2024-02-01")).await.unwrap();
        storage.add_entry(date("2024-01-01")).await.unwrap();
        let entries = storage.add_entry(date("2024-02-01")).await.unwrap();
        assert_eq!(entries, vec![date("2024-01-01"), date("2024-02-01")]);

        let entries = storage.remove_entry(date("2024-01-01")).await.unwrap();
        assert_eq!(entries, vec![date("2024-02-01")]);

        // Removing an absent date is fine
        let entries = storage.remove_entry(date("2023-05-05")).await.unwrap();
        assert_eq!(entries, vec![date("2024-02-01")]);

        assert_eq!(storage.read_entries().await.unwrap(), entries);
    }

    #[tokio::test]
    async fn test_entries_file_is_sorted_on_disk() {
        let (dir, storage) = setup_test_storage().await;
        storage.add_entry(date("2024-03-01")).await.unwrap();
        storage.add_entry(date("2023-12-01")).await.unwrap();

        let raw = std::fs::read_to_string(dir.path().join("cycles.json")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["entries"], serde_json::json!(["2023-12-01", "2024-03-01"]));
    }

    #[tokio::test]
    async fn test_invalid_stored_entries_are_skipped() {
        let (dir, storage) = setup_test_storage().await;
        std::fs::write(
            dir.path().join("cycles.json"),
            r#"{ "entries": ["2024-01-01", "garbage", "2024-02-30", "2023-12-04", "2024-01-01"] }"#,
        )
        .unwrap();

        let entries = storage.read_entries().await.unwrap();
        assert_eq!(entries, vec![date("2023-12-04"), date("2024-01-01")]);
    }

    #[tokio::test]
    async fn test_entries_follow_data_file_setting() {
        let (dir, storage) = setup_test_storage().await;
        storage
            .update_settings(|s| s.data_file = "other.json".to_string())
            .await
            .unwrap();

        storage.add_entry(date("2024-01-01")).await.unwrap();
        assert!(dir.path().join("other.json").exists());
        assert!(!dir.path().join("cycles.json").exists());
    }

    #[tokio::test]
    async fn test_malformed_entries_file_is_an_error() {
        let (dir, storage) = setup_test_storage().await;
        std::fs::write(dir.path().join("cycles.json"), "not json").unwrap();

        let result = storage.read_entries().await;
        assert!(matches!(result, Err(StorageError::Json { .. })));
    }

    #[tokio::test]
    async fn test_concurrent_adds_are_not_lost() {
        let (_dir, storage) = setup_test_storage().await;
        let start = date("2024-01-01");

        let mut handles = Vec::new();
        for i in 0..20 {
            let storage = storage.clone();
            let day = start.add_days(i * 28).unwrap();
            handles.push(tokio::spawn(async move { storage.add_entry(day).await }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(storage.read_entries().await.unwrap().len(), 20);
    }

    #[tokio::test]
    async fn test_find_inspiration() {
        let (dir, storage) = setup_test_storage().await;

        assert_err!(storage.find_inspiration(1).await);

        std::fs::write(
            dir.path().join(INSPIRATION_FILE),
            r#"[{ "id": 1, "text": "Be kind to yourself." }, { "id": 2, "text": "Rest." }]"#,
        )
        .unwrap();

        let found = storage.find_inspiration(2).await.unwrap().unwrap();
        assert_eq!(found.text, "Rest.");
        assert!(storage.find_inspiration(9).await.unwrap().is_none());
    }
}
