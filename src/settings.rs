use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::PathBuf,
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use crate::progress::{MasteryCriterion, ProgressConfig};

pub const DEFAULT_PROMPT_OPTIONS: [&str; 6] = [
    "Independent",
    "Verbal",
    "Gestural",
    "Model",
    "Physical",
    "No Response",
];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct CaptureSettings {
    /// Used for goals whose metadata carries no prompt levels.
    pub default_prompt_options: Vec<String>,
    pub trial_block_size: usize,
    pub default_mastery: MasteryCriterion,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            default_prompt_options: DEFAULT_PROMPT_OPTIONS.iter().map(|s| s.to_string()).collect(),
            trial_block_size: ProgressConfig::default().trial_block_size,
            default_mastery: MasteryCriterion::default(),
        }
    }
}

impl CaptureSettings {
    pub fn progress_config(&self) -> ProgressConfig {
        ProgressConfig {
            trial_block_size: self.trial_block_size.max(1),
        }
    }
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<CaptureSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                warn!(
                    "Ignoring unreadable settings at {}: {err}",
                    path.display()
                );
                CaptureSettings::default()
            })
        } else {
            CaptureSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn capture(&self) -> CaptureSettings {
        self.read().clone()
    }

    pub fn update_capture(&self, settings: CaptureSettings) -> Result<()> {
        let mut guard = self.write();
        self.persist(&settings)?;
        *guard = settings;
        Ok(())
    }

    pub fn reload(&self) -> Result<()> {
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read settings from {}", self.path.display()))?;
        let data: CaptureSettings = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse settings at {}", self.path.display()))?;
        *self.write() = data;
        Ok(())
    }

    fn persist(&self, data: &CaptureSettings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create settings directory {}", parent.display())
            })?;
        }
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }

    fn read(&self) -> RwLockReadGuard<'_, CaptureSettings> {
        match self.data.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, CaptureSettings> {
        match self.data.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
