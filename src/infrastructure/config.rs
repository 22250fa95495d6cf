use crate::domain::models::{DEFAULT_ACTIVE_HOURS, DEFAULT_BLOCK_COLOR, DEFAULT_NOTE_TITLE};
use crate::infrastructure::error::InfraError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

const APP_JSON: &str = "app.json";
const SCHEMA_VERSION: u64 = 1;

const DEFAULT_PALETTE: [u32; 10] = [
    0xFFF4_4336,
    0xFFE9_1E63,
    0xFF9C_27B0,
    0xFF67_3AB7,
    0xFF3F_51B5,
    0xFF21_96F3,
    0xFF03_A9F4,
    0xFF00_BCD4,
    0xFF00_9688,
    0xFF4C_AF50,
];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ActiveHoursConfig {
    pub start: i32,
    pub end: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    pub schema: u8,
    pub default_active_hours: ActiveHoursConfig,
    pub default_block_color: u32,
    pub default_note_title: String,
    pub palette: Vec<u32>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            schema: 1,
            default_active_hours: ActiveHoursConfig {
                start: DEFAULT_ACTIVE_HOURS.0,
                end: DEFAULT_ACTIVE_HOURS.1,
            },
            default_block_color: DEFAULT_BLOCK_COLOR,
            default_note_title: DEFAULT_NOTE_TITLE.to_string(),
            palette: DEFAULT_PALETTE.to_vec(),
        }
    }
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), InfraError> {
        let ActiveHoursConfig { start, end } = self.default_active_hours;
        if start < 0 || end > 24 || start >= end {
            return Err(InfraError::InvalidConfig(format!(
                "defaultActiveHours must satisfy 0 <= start < end <= 24, got {start}..{end}"
            )));
        }
        if self.default_note_title.trim().is_empty() {
            return Err(InfraError::InvalidConfig(
                "defaultNoteTitle must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

pub fn ensure_default_configs(config_dir: &Path) -> Result<(), InfraError> {
    let path = config_dir.join(APP_JSON);
    if !path.exists() {
        write_config(&path, &AppConfig::default())?;
    }
    Ok(())
}

fn read_config(path: &Path) -> Result<serde_json::Value, InfraError> {
    let raw = fs::read_to_string(path)?;
    let parsed: serde_json::Value = serde_json::from_str(&raw)?;
    let schema = parsed
        .get("schema")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| InfraError::InvalidConfig(format!("missing schema in {}", path.display())))?;
    if schema != SCHEMA_VERSION {
        return Err(InfraError::InvalidConfig(format!(
            "unsupported schema {} in {}",
            schema,
            path.display()
        )));
    }
    Ok(parsed)
}

fn write_config(path: &Path, config: &AppConfig) -> Result<(), InfraError> {
    let formatted = serde_json::to_string_pretty(config)?;
    fs::write(path, format!("{formatted}\n"))?;
    Ok(())
}

pub fn load_app_config(config_dir: &Path) -> Result<AppConfig, InfraError> {
    let path = config_dir.join(APP_JSON);
    let config: AppConfig = serde_json::from_value(read_config(&path)?)?;
    config.validate()?;
    Ok(config)
}

/// Replaces the saved colour palette; an empty list restores the defaults.
pub fn save_palette(config_dir: &Path, colors: &[u32]) -> Result<AppConfig, InfraError> {
    let mut config = load_app_config(config_dir)?;
    config.palette = if colors.is_empty() {
        DEFAULT_PALETTE.to_vec()
    } else {
        colors.to_vec()
    };
    write_config(&config_dir.join(APP_JSON), &config)?;
    Ok(config)
}
