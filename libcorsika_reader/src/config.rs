use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::error::ConfigError;

/// Structure representing the application configuration: which CORSIKA files to read,
/// where to write summaries and how to filter the events.
/// Configs are seralizable and deserializable to YAML using serde and serde_yaml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub input_paths: Vec<PathBuf>,
    pub output_path: Option<PathBuf>,
    pub array_idx: Option<u32>,
    pub telescope_idx: Option<u32>,
    pub force_mode: bool,
    pub verify_run_number: bool,
    pub print_events: bool,
    pub n_threads: i32,
}

impl Default for Config {
    /// Generate a new Config object with no input files
    fn default() -> Self {
        Self {
            input_paths: Vec::new(),
            output_path: None,
            array_idx: None,
            telescope_idx: None,
            force_mode: false,
            verify_run_number: true,
            print_events: false,
            n_threads: 1,
        }
    }
}

impl Config {
    /// Read the configuration in a YAML file
    /// Returns a Config if successful
    pub fn read_config_file(config_path: &Path) -> Result<Self, ConfigError> {
        if !config_path.exists() {
            return Err(ConfigError::BadFilePath(config_path.to_path_buf()));
        }

        let yaml_str = std::fs::read_to_string(config_path)?;

        Ok(serde_yaml::from_str::<Self>(&yaml_str)?)
    }

    /// Get the path of the YAML summary for an input file, if summaries are requested.
    ///
    /// The summary is named after the input file stem (`DAT000001.gz` -> `DAT000001.yml`).
    pub fn get_summary_file_name(&self, input_path: &Path) -> Result<Option<PathBuf>, ConfigError> {
        let Some(output_path) = self.output_path.as_ref() else {
            return Ok(None);
        };
        if !output_path.exists() {
            return Err(ConfigError::BadFilePath(output_path.clone()));
        }
        let stem = input_path
            .file_stem()
            .ok_or_else(|| ConfigError::BadFilePath(input_path.to_path_buf()))?;
        let mut summary = output_path.join(stem);
        summary.set_extension("yml");
        Ok(Some(summary))
    }

    pub fn is_n_threads_valid(&self) -> bool {
        self.n_threads >= 1
    }

    pub fn has_output_path(&self) -> bool {
        self.output_path.is_some()
    }
}
