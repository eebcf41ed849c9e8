use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, warn};

use crate::error::{BrainMapError, Result};
use crate::theme::ThemeMode;
use crate::view_state::{ViewLibrary, ViewState};

pub const THEME_KEY: &str = "brain-map-theme";
pub const SAVED_VIEWS_KEY: &str = "brain-map-saved-views";

/// Narrow string key/value persistence for client-local state.
pub trait SettingsStore {
    fn load(&self, key: &str) -> Result<Option<String>>;
    fn save(&mut self, key: &str, value: &str) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
}

impl SettingsStore for MemoryStore {
    fn load(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn save(&mut self, key: &str, value: &str) -> Result<()> {
        self.entries.insert(key.to_owned(), value.to_owned());
        Ok(())
    }
}

/// Every key lives in one JSON object on disk.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl JsonFileStore {
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("brain-map").join("settings.json"))
    }

    /// Open the store. A missing file starts empty; an unreadable one is
    /// reported and also starts empty so the viewer still comes up.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match Self::read(&path) {
            Ok(entries) => entries,
            Err(error) => {
                warn!("starting with empty settings: {error}");
                BTreeMap::new()
            }
        };
        Self { path, entries }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(path: &Path) -> Result<BTreeMap<String, String>> {
        if !path.exists() {
            return Ok(BTreeMap::new());
        }
        let content = fs::read_to_string(path)
            .map_err(|error| BrainMapError::Storage(format!("{}: {error}", path.display())))?;
        serde_json::from_str(&content)
            .map_err(|error| BrainMapError::Storage(format!("{}: {error}", path.display())))
    }

    fn flush(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|error| BrainMapError::Storage(format!("{}: {error}", parent.display())))?;
        }
        let content = serde_json::to_string_pretty(&self.entries)
            .map_err(|error| BrainMapError::Storage(error.to_string()))?;
        fs::write(&self.path, content)
            .map_err(|error| BrainMapError::Storage(format!("{}: {error}", self.path.display())))
    }
}

impl SettingsStore for JsonFileStore {
    fn load(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn save(&mut self, key: &str, value: &str) -> Result<()> {
        self.entries.insert(key.to_owned(), value.to_owned());
        self.flush()?;
        debug!("saved setting {key} to {}", self.path.display());
        Ok(())
    }
}

/// Typed access to the theme and saved views over any store.
pub struct Settings {
    store: Box<dyn SettingsStore + Send>,
}

impl Settings {
    pub fn new(store: impl SettingsStore + Send + 'static) -> Self {
        Self {
            store: Box::new(store),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(MemoryStore::default())
    }

    pub fn theme(&self) -> ThemeMode {
        match self.store.load(THEME_KEY) {
            Ok(Some(value)) => ThemeMode::parse(&value),
            Ok(None) => ThemeMode::default(),
            Err(error) => {
                warn!("could not read theme: {error}");
                ThemeMode::default()
            }
        }
    }

    pub fn set_theme(&mut self, mode: ThemeMode) -> Result<()> {
        self.store.save(THEME_KEY, mode.as_str())
    }

    /// Saved views merged with the built-in defaults. Corrupt entries are
    /// dropped with a warning.
    pub fn view_library(&self) -> ViewLibrary {
        let raw = match self.store.load(SAVED_VIEWS_KEY) {
            Ok(raw) => raw,
            Err(error) => {
                warn!("could not read saved views: {error}");
                None
            }
        };
        let persisted = raw
            .map(|raw| {
                serde_json::from_str::<Vec<ViewState>>(&raw).unwrap_or_else(|error| {
                    warn!("discarding unreadable saved views: {error}");
                    Vec::new()
                })
            })
            .unwrap_or_default();
        ViewLibrary::new(persisted)
    }

    pub fn save_views(&mut self, library: &ViewLibrary) -> Result<()> {
        let raw = serde_json::to_string(library.user_views())
            .map_err(|error| BrainMapError::Storage(error.to_string()))?;
        self.store.save(SAVED_VIEWS_KEY, &raw)
    }
}
