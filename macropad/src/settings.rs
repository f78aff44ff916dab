//! User settings, persisted as a flat json object and editable from the host.
use alloc::string::String;
use alloc::vec::Vec;

use embassy_time::Duration;
use serde::Serialize;
use serde_json::{Map, Value};

pub use macropad_types::layout::KeyboardLayout;

use crate::storage::{FileStorage, StorageError};

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Settings {
    /// Seconds without input until the display sleeps, `<= 0` keeps it on
    pub sleeptime: f64,
    pub keyboardlayout: KeyboardLayout,
    pub useunicodefont: bool,
    /// Rotate the device by 180 degrees
    pub fliprotation: bool,
    /// Display and LED brightness, `0.0..=1.0`
    pub brightness: f64,
    pub invertcolors: bool,
    /// Keys this firmware doesn't know, written back unchanged
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            sleeptime: 2.0,
            keyboardlayout: KeyboardLayout::Us,
            useunicodefont: false,
            fliprotation: false,
            brightness: 0.1,
            invertcolors: false,
            extra: Map::new(),
        }
    }
}

impl Settings {
    /// Build settings from a json object, missing or malformed keys fall back to defaults
    pub fn from_json(value: &Value) -> Self {
        let mut settings = Self::default();
        settings.merge(value);
        settings
    }

    /// Apply every key of `value` on top of the current settings.
    ///
    /// Known keys with a wrong type are ignored, unknown keys are kept in [`Settings::extra`].
    pub fn merge(&mut self, value: &Value) {
        let Some(object) = value.as_object() else {
            warn!("Settings are not a json object, ignored");
            return;
        };
        for (key, v) in object {
            let applied = match key.as_str() {
                "sleeptime" => v.as_f64().map(|s| self.sleeptime = s).is_some(),
                "keyboardlayout" => v
                    .as_str()
                    .and_then(KeyboardLayout::from_code)
                    .map(|l| self.keyboardlayout = l)
                    .is_some(),
                "useunicodefont" => v.as_bool().map(|b| self.useunicodefont = b).is_some(),
                "fliprotation" => v.as_bool().map(|b| self.fliprotation = b).is_some(),
                "brightness" => v
                    .as_f64()
                    .map(|b| self.brightness = b.clamp(0.0, 1.0))
                    .is_some(),
                "invertcolors" => v.as_bool().map(|b| self.invertcolors = b).is_some(),
                _ => {
                    self.extra.insert(key.clone(), v.clone());
                    true
                }
            };
            if !applied {
                warn!("Invalid value for setting {}, ignored", key.as_str());
            }
        }
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        serde_json::to_vec(self).unwrap_or_default()
    }

    /// Idle time until the display sleeps, `None` if it never sleeps.
    ///
    /// Times too long to represent never elapse either.
    pub fn sleep_timeout(&self) -> Option<Duration> {
        if self.sleeptime <= 0.0 {
            return None;
        }
        let micros = self.sleeptime * 1_000_000.0;
        if micros >= u64::MAX as f64 {
            return None;
        }
        Duration::try_from_micros(micros as u64)
    }

    /// Read settings from storage. A missing or corrupted file yields the defaults.
    pub fn load<S: FileStorage>(storage: &mut S, path: &str) -> Self {
        match storage.read(path) {
            Ok(bytes) => match serde_json::from_slice::<Value>(&bytes) {
                Ok(value) => Self::from_json(&value),
                Err(_) => {
                    error!("Settings file {} is corrupted, using defaults", path);
                    Self::default()
                }
            },
            Err(StorageError::NotFound) => Self::default(),
            Err(e) => {
                error!("Failed to read settings {}: {:?}", path, e);
                Self::default()
            }
        }
    }

    pub fn save<S: FileStorage>(&self, storage: &mut S, path: &str) -> Result<(), StorageError> {
        if storage.is_read_only() {
            return Err(StorageError::ReadOnly);
        }
        storage.write(path, &self.to_bytes())
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;
    use crate::storage::RamStorage;

    #[test]
    fn test_missing_keys_use_defaults() {
        let settings = Settings::from_json(&json!({"brightness": 0.5, "keyboardlayout": "de"}));
        assert_eq!(settings.brightness, 0.5);
        assert_eq!(settings.keyboardlayout, KeyboardLayout::De);
        assert_eq!(settings.sleeptime, 2.0);
        assert!(!settings.useunicodefont);
        assert!(!settings.fliprotation);
        assert!(!settings.invertcolors);
    }

    #[test]
    fn test_invalid_values_are_ignored() {
        let settings = Settings::from_json(&json!({"brightness": "bright", "keyboardlayout": "xx", "fliprotation": 1}));
        assert_eq!(settings, Settings::default());

        let settings = Settings::from_json(&json!({"brightness": 3}));
        assert_eq!(settings.brightness, 1.0);
    }

    #[test]
    fn test_unknown_keys_round_trip() {
        let settings = Settings::from_json(&json!({"sleeptime": 5, "theme": "dark"}));
        let value = settings.to_json();
        assert_eq!(value["theme"], json!("dark"));
        assert_eq!(value["sleeptime"], json!(5.0));
        assert_eq!(value["keyboardlayout"], json!("us"));
        assert_eq!(Settings::from_json(&value), settings);
    }

    #[test]
    fn test_load_and_save() {
        let mut storage = RamStorage::new().with_file("settings.json", "not json");
        assert_eq!(Settings::load(&mut storage, "settings.json"), Settings::default());
        assert_eq!(Settings::load(&mut storage, "missing.json"), Settings::default());

        let mut settings = Settings::default();
        settings.invertcolors = true;
        settings.save(&mut storage, "settings.json").unwrap();
        assert_eq!(Settings::load(&mut storage, "settings.json"), settings);

        storage.set_read_only(true);
        assert_eq!(settings.save(&mut storage, "settings.json"), Err(StorageError::ReadOnly));
    }

    #[test]
    fn test_sleep_timeout() {
        assert_eq!(Settings::default().sleep_timeout(), Some(Duration::from_secs(2)));
        let settings = Settings::from_json(&json!({"sleeptime": 0}));
        assert_eq!(settings.sleep_timeout(), None);
        let settings = Settings::from_json(&json!({"sleeptime": 0.25}));
        assert_eq!(settings.sleep_timeout(), Some(Duration::from_millis(250)));
        let settings = Settings::from_json(&json!({"sleeptime": 1e14}));
        assert_eq!(settings.sleep_timeout(), None);
        let settings = Settings::from_json(&json!({"sleeptime": 1e300}));
        assert_eq!(settings.sleep_timeout(), None);
    }
}
