use crate::behavior::{BehaviorSettings, DwellAccounting, STRUGGLE_THRESHOLD, TIME_THRESHOLD_MS};
use crate::error::{HelpError, Result};
use crate::matcher::STATIC_CONFIDENCE_THRESHOLD;
use crate::proactive::{Workflows, DEFAULT_COMPLEX_SECTIONS};
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

pub const HELP_DIR: &str = ".helpdesk";

// -----------------------------------------------------------------------------
// Global config
// -----------------------------------------------------------------------------

fn global_config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("helpdesk")
}

fn global_config_file() -> PathBuf {
    global_config_dir().join("config.yaml")
}

/// Get global config
pub fn get_global_config() -> HashMap<String, String> {
    let path = global_config_file();
    if path.exists() {
        if let Ok(content) = fs::read_to_string(&path) {
            if let Ok(config) = serde_yaml::from_str::<HashMap<String, String>>(&content) {
                return config;
            }
        }
    }
    HashMap::new()
}

/// Set a global config value
pub fn set_global_config(key: &str, value: &str) -> Result<()> {
    let dir = global_config_dir();
    fs::create_dir_all(&dir)?;

    let mut config = get_global_config();
    config.insert(key.to_string(), value.to_string());

    let content = serde_yaml::to_string(&config)?;
    fs::write(global_config_file(), content)?;
    Ok(())
}

// -----------------------------------------------------------------------------
// Per-store config
// -----------------------------------------------------------------------------

fn default_threshold() -> f64 {
    STATIC_CONFIDENCE_THRESHOLD
}

fn default_struggle_visits() -> u32 {
    STRUGGLE_THRESHOLD
}

fn default_struggle_time_ms() -> i64 {
    TIME_THRESHOLD_MS
}

fn default_complex_sections() -> Vec<String> {
    DEFAULT_COMPLEX_SECTIONS.iter().map(|s| s.to_string()).collect()
}

/// Contents of `_config.yaml`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub knowledge_path: Option<String>,
    #[serde(default = "default_threshold")]
    pub confidence_threshold: f64,
    #[serde(default = "default_struggle_visits")]
    pub struggle_visits: u32,
    #[serde(default = "default_struggle_time_ms")]
    pub struggle_time_ms: i64,
    #[serde(default)]
    pub dwell_accounting: DwellAccounting,
    #[serde(default = "default_complex_sections")]
    pub complex_sections: Vec<String>,
    #[serde(default)]
    pub workflows: Workflows,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            knowledge_path: None,
            confidence_threshold: default_threshold(),
            struggle_visits: default_struggle_visits(),
            struggle_time_ms: default_struggle_time_ms(),
            dwell_accounting: DwellAccounting::default(),
            complex_sections: default_complex_sections(),
            workflows: Workflows::default(),
        }
    }
}

pub const CONFIG_KEYS: &[&str] = &[
    "knowledge_path",
    "confidence_threshold",
    "struggle_visits",
    "struggle_time_ms",
    "dwell_accounting",
    "complex_sections",
];

fn parse<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| HelpError::InvalidConfig(format!("{}: cannot parse '{}'", key, value)))
}

/// Configuration manager for a .helpdesk directory
pub struct HelpConfig {
    help_path: PathBuf,
    config_file: PathBuf,
    settings: Settings,
}

impl HelpConfig {
    pub fn new(help_path: PathBuf) -> Self {
        let config_file = help_path.join("_config.yaml");
        let mut instance = Self {
            help_path,
            config_file,
            settings: Settings::default(),
        };
        instance.load();
        instance
    }

    fn load(&mut self) {
        if !self.config_file.exists() {
            return;
        }
        match fs::read_to_string(&self.config_file) {
            Ok(content) => match serde_yaml::from_str::<Settings>(&content) {
                Ok(settings) => self.settings = settings,
                Err(e) => warn!("Ignoring malformed {}: {}", self.config_file.display(), e),
            },
            Err(e) => warn!("Could not read {}: {}", self.config_file.display(), e),
        }
    }

    fn save(&self) -> Result<()> {
        fs::create_dir_all(&self.help_path)?;
        let content = serde_yaml::to_string(&self.settings)?;
        fs::write(&self.config_file, content)?;
        Ok(())
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn get(&self, key: &str) -> Option<String> {
        let s = &self.settings;
        match key {
            "knowledge_path" => s.knowledge_path.clone(),
            "confidence_threshold" => Some(s.confidence_threshold.to_string()),
            "struggle_visits" => Some(s.struggle_visits.to_string()),
            "struggle_time_ms" => Some(s.struggle_time_ms.to_string()),
            "dwell_accounting" => Some(
                match s.dwell_accounting {
                    DwellAccounting::Previous => "previous",
                    DwellAccounting::All => "all",
                }
                .to_string(),
            ),
            "complex_sections" => Some(s.complex_sections.join(",")),
            _ => None,
        }
    }

    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let s = &mut self.settings;
        match key {
            "knowledge_path" => s.knowledge_path = Some(value.to_string()),
            "confidence_threshold" => {
                let threshold: f64 = parse(key, value)?;
                if !(0.0..=1.0).contains(&threshold) {
                    return Err(HelpError::InvalidConfig(format!(
                        "{}: must be between 0 and 1",
                        key
                    )));
                }
                s.confidence_threshold = threshold;
            }
            "struggle_visits" => s.struggle_visits = parse(key, value)?,
            "struggle_time_ms" => s.struggle_time_ms = parse(key, value)?,
            "dwell_accounting" => {
                s.dwell_accounting = match value.trim() {
                    "previous" => DwellAccounting::Previous,
                    "all" => DwellAccounting::All,
                    other => {
                        return Err(HelpError::InvalidConfig(format!(
                            "{}: expected 'previous' or 'all', got '{}'",
                            key, other
                        )))
                    }
                }
            }
            "complex_sections" => {
                s.complex_sections = value
                    .split(',')
                    .map(|v| v.trim().to_string())
                    .filter(|v| !v.is_empty())
                    .collect()
            }
            _ => return Err(HelpError::InvalidConfig(format!("unknown key '{}'", key))),
        }
        self.save()
    }

    pub fn behavior_settings(&self) -> BehaviorSettings {
        BehaviorSettings {
            struggle_visits: self.settings.struggle_visits,
            struggle_time_ms: self.settings.struggle_time_ms,
            dwell_accounting: self.settings.dwell_accounting,
        }
    }

    /// Knowledge location: the store's own setting, else the global one.
    /// Relative paths resolve against the directory holding `.helpdesk`.
    pub fn knowledge_path(&self) -> Option<PathBuf> {
        let raw = self
            .settings
            .knowledge_path
            .clone()
            .or_else(|| get_global_config().get("knowledge_path").cloned())?;

        let path = PathBuf::from(raw);
        if path.is_absolute() {
            return Some(path);
        }
        let base = self.help_path.parent().map(PathBuf::from).unwrap_or_default();
        Some(base.join(path))
    }
}

/// Find the .helpdesk directory, searching upward from current directory
pub fn find_help_path() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let help = current.join(HELP_DIR);
        if help.is_dir() {
            return Some(help);
        }

        if !current.pop() {
            break;
        }
    }

    // Check HELPDESK_PATH environment variable
    if let Ok(path) = std::env::var("HELPDESK_PATH") {
        let help = PathBuf::from(path);
        if help.is_dir() {
            return Some(help);
        }
    }

    None
}
