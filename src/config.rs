// Pipeline configuration
// Every section is optional in JSON; omitted fields take their defaults

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::audio::WavEncoding;
use crate::catalog::SelectionConfig;
use crate::mastering::MasteringConfig;
use crate::momentum::MomentumConfig;
use crate::render::RenderSettings;
use crate::sections::SectionConfig;
use crate::transform::TransformOptions;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub sections: SectionConfig,
    pub momentum: MomentumConfig,
    pub selection: SelectionConfig,
    pub transform: TransformOptions,
    pub render: RenderSettings,
    pub mastering: MasteringConfig,

    /// Sample format of the mastered WAV
    pub output_encoding: WavEncoding,

    /// Catalog JSON loaded into the shared slot on first use
    pub catalog_path: Option<PathBuf>,

    /// Rule table JSON loaded into the shared slot on first use
    pub rules_path: Option<PathBuf>,

    /// JSONL file each job's trace is appended to
    pub trace_path: Option<PathBuf>,
}

impl PipelineConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: PipelineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json_str(&json)?;
        log::info!("Loaded pipeline config from {}", path.display());
        Ok(config)
    }

    /// Reject values no stage can work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |message: String| Err(ConfigError::Invalid(message));

        if self.sections.bars_per_section == 0 {
            return invalid("sections.bars_per_section must be at least 1".to_string());
        }
        if self.selection.motif_count == 0 {
            return invalid("selection.motif_count must be at least 1".to_string());
        }
        if !(self.transform.arrangement_duration_sec > 0.0) {
            return invalid(format!(
                "transform.arrangement_duration_sec must be positive, got {}",
                self.transform.arrangement_duration_sec
            ));
        }
        if !(0.0..1.0).contains(&self.transform.tempo_change_threshold) {
            return invalid(format!(
                "transform.tempo_change_threshold must be in [0, 1), got {}",
                self.transform.tempo_change_threshold
            ));
        }
        if self.transform.ppq == 0 || self.transform.ppq > 0x7FFF {
            return invalid(format!("transform.ppq must be 1-32767, got {}", self.transform.ppq));
        }
        if self.render.sample_rate < 8000 {
            return invalid(format!("render.sample_rate must be at least 8000, got {}", self.render.sample_rate));
        }
        if self.render.channels == 0 {
            return invalid("render.channels must be at least 1".to_string());
        }
        if !(self.mastering.ceiling_dbfs <= 0.0) {
            return invalid(format!(
                "mastering.ceiling_dbfs must be at most 0, got {}",
                self.mastering.ceiling_dbfs
            ));
        }
        if !self.mastering.target_lufs.is_finite() || self.mastering.target_lufs >= 0.0 {
            return invalid(format!(
                "mastering.target_lufs must be negative, got {}",
                self.mastering.target_lufs
            ));
        }
        if self.mastering.multiband.low_crossover_hz >= self.mastering.multiband.high_crossover_hz {
            return invalid("mastering.multiband crossovers must be ascending".to_string());
        }

        let compressors = [
            ("compressor", &self.mastering.compressor),
            ("multiband.low", &self.mastering.multiband.low),
            ("multiband.mid", &self.mastering.multiband.mid),
            ("multiband.high", &self.mastering.multiband.high),
        ];
        for (name, settings) in compressors {
            settings
                .validate()
                .map_err(|e| ConfigError::Invalid(format!("mastering.{}: {}", name, e)))?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_match_documented_constants() {
        let config = PipelineConfig::default();
        assert_eq!(config.sections.bars_per_section, 4);
        assert_eq!(config.transform.tempo_change_threshold, 0.05);
        assert_eq!(config.mastering.target_lufs, -14.0);
        assert_eq!(config.mastering.ceiling_dbfs, -1.0);
        assert_eq!(config.mastering.multiband.low_crossover_hz, 200.0);
        assert_eq!(config.mastering.multiband.high_crossover_hz, 4000.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config = PipelineConfig::from_json_str(
            r#"{ "sections": { "bars_per_section": 8 }, "mastering": { "target_lufs": -16.0 } }"#,
        )
        .unwrap();

        assert_eq!(config.sections.bars_per_section, 8);
        assert_eq!(config.mastering.target_lufs, -16.0);
        assert_eq!(config.mastering.ceiling_dbfs, -1.0);
        assert_eq!(config.selection.motif_count, 4);
        assert!(config.catalog_path.is_none());
    }

    #[test]
    fn test_rejects_zero_window() {
        let result = PipelineConfig::from_json_str(r#"{ "sections": { "bars_per_section": 0 } }"#);
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_rejects_ceiling_above_full_scale() {
        let result = PipelineConfig::from_json_str(r#"{ "mastering": { "ceiling_dbfs": 0.5 } }"#);
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_rejects_bad_compressor() {
        let result = PipelineConfig::from_json_str(r#"{ "mastering": { "compressor": { "ratio": 0.2 } } }"#);
        match result {
            Err(ConfigError::Invalid(message)) => assert!(message.contains("mastering.compressor")),
            other => panic!("expected invalid config, got {:?}", other),
        }
    }

    #[test]
    fn test_from_json_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{ "render": {{ "sample_rate": 48000 }} }}"#).unwrap();

        let config = PipelineConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.render.sample_rate, 48000);
    }

    #[test]
    fn test_missing_file_reports_path() {
        let err = PipelineConfig::from_json_file(Path::new("/nonexistent/motifforge.json")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/motifforge.json"));
    }
}
