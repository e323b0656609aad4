//! Configuration management for qmadapt.
//!
//! Program executables, output extensions and logging are configured through
//! INI files. Files are loaded with the following precedence:
//!
//! 1. Local configuration (`./qmadapt_config.cfg`)
//! 2. User configuration (`~/.config/qmadapt/qmadapt_config.cfg`)
//! 3. System configuration (`/etc/qmadapt/qmadapt_config.cfg`)
//! 4. Built-in defaults
//!
//! # Configuration File Format
//!
//! ```ini
//! [programs]
//! adf = adf
//! cp2k = cp2k.popt
//! orca = /opt/orca/orca
//! launcher = srun
//!
//! [extensions]
//! adf = out
//! cp2k = out
//! orca = out
//!
//! [general]
//! nprocs = 0
//!
//! [logging]
//! level = info
//! ```

use crate::config::QMProgram;
use configparser::ini::Ini;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the configuration file searched for in each location.
pub const CONFIG_FILE_NAME: &str = "qmadapt_config.cfg";

/// Errors that can occur during configuration loading and processing.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// I/O error when reading configuration files
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// INI parsing error
    #[error("INI parsing error: {0}")]
    IniParse(String),
    /// Invalid configuration value
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

/// Main configuration structure containing all program settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    /// Executables for each program and the optional cluster launcher
    pub programs: ProgramSettings,
    /// Output file extensions
    pub extensions: ExtensionSettings,
    /// General settings
    pub general: GeneralSettings,
    /// Logging configuration
    pub logging: LoggingSettings,
}

/// Executable names used when building run scripts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProgramSettings {
    /// ADF executable (default: "adf")
    pub adf: String,
    /// CP2K executable (default: "cp2k.popt")
    pub cp2k: String,
    /// ORCA executable (default: "orca")
    pub orca: String,
    /// Cluster job launcher probed for CP2K runs (default: "srun")
    pub launcher: String,
}

impl Default for ProgramSettings {
    fn default() -> Self {
        Self {
            adf: QMProgram::Adf.default_command().to_string(),
            cp2k: QMProgram::Cp2k.default_command().to_string(),
            orca: QMProgram::Orca.default_command().to_string(),
            launcher: "srun".to_string(),
        }
    }
}

impl ProgramSettings {
    /// Executable configured for `program`.
    pub fn command(&self, program: QMProgram) -> &str {
        match program {
            QMProgram::Adf => &self.adf,
            QMProgram::Cp2k => &self.cp2k,
            QMProgram::Orca => &self.orca,
        }
    }
}

/// Output file extensions for the supported programs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExtensionSettings {
    /// ADF output extension (default: "out")
    pub adf: String,
    /// CP2K output extension (default: "out")
    pub cp2k: String,
    /// ORCA output extension (default: "out")
    pub orca: String,
}

impl Default for ExtensionSettings {
    fn default() -> Self {
        Self {
            adf: QMProgram::Adf.output_extension().to_string(),
            cp2k: QMProgram::Cp2k.output_extension().to_string(),
            orca: QMProgram::Orca.output_extension().to_string(),
        }
    }
}

impl ExtensionSettings {
    /// Output extension configured for `program`.
    pub fn for_program(&self, program: QMProgram) -> &str {
        match program {
            QMProgram::Adf => &self.adf,
            QMProgram::Cp2k => &self.cp2k,
            QMProgram::Orca => &self.orca,
        }
    }
}

/// General program settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct GeneralSettings {
    /// Number of processes passed to ADF (`-n`); 0 leaves it to the program
    pub nprocs: u32,
}

/// Logging configuration settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingSettings {
    /// Log level (default: "info")
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl LoggingSettings {
    /// Parses the configured level, falling back to `Info`.
    pub fn level_filter(&self) -> log::LevelFilter {
        self.level.parse().unwrap_or_else(|_| {
            warn!("Unknown log level '{}', using info", self.level);
            log::LevelFilter::Info
        })
    }
}

/// Configuration manager that handles loading and accessing program settings.
pub struct SettingsManager {
    config: Config,
    config_source: String,
}

impl SettingsManager {
    /// Loads configuration from available configuration files.
    ///
    /// Later locations in the search order override earlier ones; missing
    /// files are skipped and unreadable ones are reported with a warning.
    pub fn load() -> Result<Self, ConfigError> {
        let (config, source) = Self::load_from_files()?;
        info!("Configuration loaded from: {}", source);
        Ok(Self {
            config,
            config_source: source,
        })
    }

    /// Wraps an explicit configuration, bypassing the file search.
    pub fn from_config(config: Config) -> Self {
        Self {
            config,
            config_source: "explicit configuration".to_string(),
        }
    }

    /// Returns the source of the loaded configuration.
    pub fn config_source(&self) -> &str {
        &self.config_source
    }

    /// The merged configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Gets the output file extension for the specified program.
    pub fn get_output_extension(&self, program: QMProgram) -> &str {
        self.config.extensions.for_program(program)
    }

    /// `[programs]` section.
    pub fn programs(&self) -> &ProgramSettings {
        &self.config.programs
    }

    /// `[general]` section.
    pub fn general(&self) -> &GeneralSettings {
        &self.config.general
    }

    /// `[logging]` section.
    pub fn logging(&self) -> &LoggingSettings {
        &self.config.logging
    }

    /// Loads configuration from files with hierarchical precedence.
    fn load_from_files() -> Result<(Config, String), ConfigError> {
        let mut config = Config::default();
        let mut config_source = "built-in defaults".to_string();

        let candidates = [
            ("system", Self::get_system_config_path()),
            ("user", Self::get_user_config_path()),
            ("local", Some(PathBuf::from(CONFIG_FILE_NAME))),
        ];

        for (label, path) in candidates {
            let Some(path) = path else { continue };
            if !path.exists() {
                continue;
            }
            match Self::load_config(&path) {
                Ok(loaded) => {
                    config.merge(loaded);
                    config_source = format!("{} config ({})", label, path.display());
                    debug!("Loaded {} configuration from: {}", label, path.display());
                }
                Err(e) => {
                    warn!(
                        "Failed to load {} config from {}: {}",
                        label,
                        path.display(),
                        e
                    );
                }
            }
        }

        Ok((config, config_source))
    }

    /// Loads configuration from a single INI file.
    pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::parse_config(&content)
    }

    /// Parses INI text. Sections and keys that are absent keep their defaults.
    pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
        let mut ini = Ini::new();
        ini.read(content.to_string())
            .map_err(|e| ConfigError::IniParse(format!("Failed to parse INI: {}", e)))?;

        let mut config = Config::default();
        let map = ini.get_map_ref();

        if let Some(section) = map.get("programs") {
            config.programs = Self::parse_programs(section);
        }
        if let Some(section) = map.get("extensions") {
            config.extensions = Self::parse_extensions(section);
        }
        if let Some(section) = map.get("general") {
            config.general = Self::parse_general(section)?;
        }
        if let Some(section) = map.get("logging") {
            config.logging = Self::parse_logging(section);
        }

        Ok(config)
    }

    fn parse_programs(section: &HashMap<String, Option<String>>) -> ProgramSettings {
        let mut programs = ProgramSettings::default();
        if let Some(Some(adf)) = section.get("adf") {
            programs.adf = adf.clone();
        }
        if let Some(Some(cp2k)) = section.get("cp2k") {
            programs.cp2k = cp2k.clone();
        }
        if let Some(Some(orca)) = section.get("orca") {
            programs.orca = orca.clone();
        }
        if let Some(Some(launcher)) = section.get("launcher") {
            programs.launcher = launcher.clone();
        }
        programs
    }

    fn parse_extensions(section: &HashMap<String, Option<String>>) -> ExtensionSettings {
        let mut extensions = ExtensionSettings::default();
        if let Some(Some(adf)) = section.get("adf") {
            extensions.adf = adf.clone();
        }
        if let Some(Some(cp2k)) = section.get("cp2k") {
            extensions.cp2k = cp2k.clone();
        }
        if let Some(Some(orca)) = section.get("orca") {
            extensions.orca = orca.clone();
        }
        extensions
    }

    fn parse_general(
        section: &HashMap<String, Option<String>>,
    ) -> Result<GeneralSettings, ConfigError> {
        let mut general = GeneralSettings::default();
        if let Some(Some(nprocs)) = section.get("nprocs") {
            general.nprocs = nprocs
                .parse()
                .map_err(|_| ConfigError::InvalidValue(format!("Invalid nprocs: {}", nprocs)))?;
        }
        Ok(general)
    }

    fn parse_logging(section: &HashMap<String, Option<String>>) -> LoggingSettings {
        let mut logging = LoggingSettings::default();
        if let Some(Some(level)) = section.get("level") {
            logging.level = level.clone();
        }
        logging
    }

    /// Gets the system configuration file path.
    fn get_system_config_path() -> Option<PathBuf> {
        #[cfg(unix)]
        {
            Some(PathBuf::from("/etc/qmadapt").join(CONFIG_FILE_NAME))
        }
        #[cfg(windows)]
        {
            std::env::var("PROGRAMDATA")
                .ok()
                .map(|pd| PathBuf::from(pd).join("qmadapt").join(CONFIG_FILE_NAME))
        }
    }

    /// Gets the user configuration file path.
    fn get_user_config_path() -> Option<PathBuf> {
        #[cfg(unix)]
        {
            std::env::var("HOME").ok().map(|home| {
                PathBuf::from(home)
                    .join(".config")
                    .join("qmadapt")
                    .join(CONFIG_FILE_NAME)
            })
        }
        #[cfg(windows)]
        {
            std::env::var("APPDATA")
                .ok()
                .map(|appdata| PathBuf::from(appdata).join("qmadapt").join(CONFIG_FILE_NAME))
        }
    }

    /// Writes a commented configuration template with all defaults.
    pub fn create_template(path: &Path) -> Result<(), ConfigError> {
        fs::write(path, Self::generate_template_content())?;
        info!("Created settings template at: {}", path.display());
        Ok(())
    }

    fn generate_template_content() -> String {
        let defaults = Config::default();
        format!(
            r#"# qmadapt configuration file
#
# Files are loaded in this order, later files overriding earlier ones:
#
# 1. System config (/etc/qmadapt/{name})
# 2. User config (~/.config/qmadapt/{name})
# 3. Current working directory (./{name})
#
# Missing sections or values use the defaults shown below.

[programs]
# Executables written into run scripts
adf = {adf}
cp2k = {cp2k}
orca = {orca}

# Cluster launcher prefixed to CP2K runs when it can be started
launcher = {launcher}

[extensions]
# Extension of the main text output of each program
adf = {adf_ext}
cp2k = {cp2k_ext}
orca = {orca_ext}

[general]
# Processes passed to ADF with -n (0 = let ADF decide)
nprocs = {nprocs}

[logging]
# Log level: error, warn, info, debug, trace
level = {level}
"#,
            name = CONFIG_FILE_NAME,
            adf = defaults.programs.adf,
            cp2k = defaults.programs.cp2k,
            orca = defaults.programs.orca,
            launcher = defaults.programs.launcher,
            adf_ext = defaults.extensions.adf,
            cp2k_ext = defaults.extensions.cp2k,
            orca_ext = defaults.extensions.orca,
            nprocs = defaults.general.nprocs,
            level = defaults.logging.level,
        )
    }
}

impl Config {
    /// Merges another configuration into this one, overriding existing values.
    fn merge(&mut self, other: Config) {
        let defaults = Config::default();

        if other.programs.adf != defaults.programs.adf {
            self.programs.adf = other.programs.adf;
        }
        if other.programs.cp2k != defaults.programs.cp2k {
            self.programs.cp2k = other.programs.cp2k;
        }
        if other.programs.orca != defaults.programs.orca {
            self.programs.orca = other.programs.orca;
        }
        if other.programs.launcher != defaults.programs.launcher {
            self.programs.launcher = other.programs.launcher;
        }

        if other.extensions.adf != defaults.extensions.adf {
            self.extensions.adf = other.extensions.adf;
        }
        if other.extensions.cp2k != defaults.extensions.cp2k {
            self.extensions.cp2k = other.extensions.cp2k;
        }
        if other.extensions.orca != defaults.extensions.orca {
            self.extensions.orca = other.extensions.orca;
        }

        if other.general.nprocs > 0 {
            self.general.nprocs = other.general.nprocs;
        }
        if other.logging.level != defaults.logging.level {
            self.logging.level = other.logging.level;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_partial_config_keeps_defaults() {
        let config = SettingsManager::parse_config("[programs]\norca = /opt/orca/orca\n").unwrap();
        assert_eq!(config.programs.orca, "/opt/orca/orca");
        assert_eq!(config.programs.cp2k, "cp2k.popt");
        assert_eq!(config.extensions, ExtensionSettings::default());
    }

    #[test]
    fn test_parse_invalid_nprocs() {
        let result = SettingsManager::parse_config("[general]\nnprocs = many\n");
        assert!(matches!(result, Err(ConfigError::InvalidValue(_))));
    }

    #[test]
    fn test_merge_overrides_only_changed_values() {
        let mut base = Config::default();
        base.programs.orca = "/usr/bin/orca".to_string();
        let mut local = Config::default();
        local.programs.launcher = "mpirun".to_string();
        base.merge(local);
        assert_eq!(base.programs.orca, "/usr/bin/orca");
        assert_eq!(base.programs.launcher, "mpirun");
    }

    #[test]
    fn test_template_parses_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        SettingsManager::create_template(&path).unwrap();
        let config = SettingsManager::load_config(&path).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_output_extension_per_program() {
        let config = SettingsManager::parse_config("[extensions]\ncp2k = log\n").unwrap();
        let settings = SettingsManager::from_config(config);
        assert_eq!(settings.get_output_extension(QMProgram::Cp2k), "log");
        assert_eq!(settings.get_output_extension(QMProgram::Orca), "out");
    }

    #[test]
    fn test_level_filter_fallback() {
        let logging = LoggingSettings {
            level: "chatty".to_string(),
        };
        assert_eq!(logging.level_filter(), log::LevelFilter::Info);
        let logging = LoggingSettings {
            level: "debug".to_string(),
        };
        assert_eq!(logging.level_filter(), log::LevelFilter::Debug);
    }
}
