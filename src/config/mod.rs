use crate::models::Settings;
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use std::collections::HashMap;
use std::fs;

/// File name of the user settings inside the config directory.
pub const SETTINGS_FILE: &str = "soundscape.yaml";

/// File name of the persisted active pack list inside the config directory.
pub const ACTIVATION_FILE: &str = "active_packs.json";

/// Prefix of environment variables overriding settings (`SOUNDSCAPE_PACK_ROOT`,
/// `SOUNDSCAPE_HEURISTICS__COMBAT_RADIUS`, ...).
pub const ENV_PREFIX: &str = "SOUNDSCAPE";

/// Configuration manager for the settings file and the activation file location.
///
/// Settings are layered: defaults, then `soundscape.yaml`, then `SOUNDSCAPE_*`
/// environment variables (`__` separates nested keys).
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_dir: Utf8PathBuf,
    settings_path: Utf8PathBuf,
    activation_path: Utf8PathBuf,
}

impl ConfigManager {
    /// Create a new ConfigManager, creating `config_dir` if it does not exist.
    pub fn new<P: AsRef<Utf8Path>>(config_dir: P) -> Result<Self> {
        let config_dir = config_dir.as_ref().to_path_buf();

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)
                .with_context(|| format!("Failed to create config directory: {}", config_dir))?;
        }

        Ok(Self {
            settings_path: config_dir.join(SETTINGS_FILE),
            activation_path: config_dir.join(ACTIVATION_FILE),
            config_dir,
        })
    }

    /// Load settings from the file and the process environment.
    ///
    /// Writes a default settings file first when none exists.
    pub fn load_settings(&self) -> Result<Settings> {
        self.load_settings_with_env(None)
    }

    /// Load settings with an explicit environment map instead of the process
    /// environment (`None` reads the process environment).
    pub fn load_settings_with_env(&self, env: Option<HashMap<String, String>>) -> Result<Settings> {
        if !self.settings_path.exists() {
            tracing::warn!(
                "Settings file not found at {}, writing defaults",
                self.settings_path
            );
            self.save_settings(&Settings::default())?;
        }

        let environment = config::Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
            .source(env);

        let settings: Settings = config::Config::builder()
            .add_source(
                config::File::from(self.settings_path.as_std_path())
                    .format(config::FileFormat::Yaml)
                    .required(false),
            )
            .add_source(environment)
            .build()
            .with_context(|| format!("Failed to read settings: {}", self.settings_path))?
            .try_deserialize()
            .with_context(|| format!("Failed to parse settings: {}", self.settings_path))?;

        tracing::info!("Loaded settings from {}", self.settings_path);
        Ok(settings)
    }

    pub fn save_settings(&self, settings: &Settings) -> Result<()> {
        let yaml_string =
            serde_yaml_ng::to_string(settings).context("Failed to serialize settings to YAML")?;

        fs::write(&self.settings_path, yaml_string)
            .with_context(|| format!("Failed to write settings: {}", self.settings_path))?;

        tracing::info!("Saved settings to {}", self.settings_path);
        Ok(())
    }

    /// `settings.pack_root`, resolved against the config directory when relative.
    pub fn pack_root(&self, settings: &Settings) -> Utf8PathBuf {
        let configured = Utf8Path::new(&settings.pack_root);
        if configured.is_absolute() {
            configured.to_path_buf()
        } else {
            self.config_dir.join(configured)
        }
    }

    pub fn config_dir(&self) -> &Utf8Path {
        &self.config_dir
    }

    pub fn settings_path(&self) -> &Utf8Path {
        &self.settings_path
    }

    pub fn activation_path(&self) -> &Utf8Path {
        &self.activation_path
    }

    /// Directory for rolling log files.
    pub fn log_dir(&self) -> Utf8PathBuf {
        self.config_dir.join("logs")
    }
}
