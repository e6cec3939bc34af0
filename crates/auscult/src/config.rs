//! Service configuration (`service.json`).
//!
//! Every field is optional; missing values fall back to the librosa-style
//! analysis defaults and to `models/<domain>` model directories.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::audio::AnalysisWindow;
use crate::labels::Domain;
use crate::mfcc::MfccConfig;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub window: AnalysisWindow,
    pub mfcc: MfccConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DomainConfig {
    /// Directory with `model.json` and `model.safetensors`.
    pub model_dir: Option<PathBuf>,
    /// JSON label registry replacing the built-in one.
    pub labels: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub analysis: AnalysisConfig,
    pub cardiac: DomainConfig,
    pub respiratory: DomainConfig,
}

impl ServiceConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(json).context("parse service config")?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load a config file; relative paths inside it resolve against its directory.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path_ref = path.as_ref();
        let json = std::fs::read_to_string(path_ref)
            .with_context(|| format!("read {}", path_ref.display()))?;
        let mut cfg =
            Self::from_json_str(&json).with_context(|| format!("load {}", path_ref.display()))?;
        if let Some(base) = path_ref.parent() {
            cfg.resolve_relative_to(base);
        }
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        let w = &self.analysis.window;
        anyhow::ensure!(
            w.offset_secs.is_finite() && w.offset_secs >= 0.0,
            "window offset_secs must be >= 0"
        );
        anyhow::ensure!(
            w.duration_secs.is_finite() && w.duration_secs > 0.0,
            "window duration_secs must be > 0"
        );
        self.analysis.mfcc.validate().context("invalid mfcc config")?;
        Ok(())
    }

    #[must_use]
    pub fn domain(&self, domain: Domain) -> &DomainConfig {
        match domain {
            Domain::Cardiac => &self.cardiac,
            Domain::Respiratory => &self.respiratory,
        }
    }

    pub fn domain_mut(&mut self, domain: Domain) -> &mut DomainConfig {
        match domain {
            Domain::Cardiac => &mut self.cardiac,
            Domain::Respiratory => &mut self.respiratory,
        }
    }

    /// Model directory for `domain`, defaulting to `models/<domain>`.
    #[must_use]
    pub fn model_dir(&self, domain: Domain) -> PathBuf {
        self.domain(domain)
            .model_dir
            .clone()
            .unwrap_or_else(|| Path::new("models").join(domain.as_str()))
    }

    fn resolve_relative_to(&mut self, base: &Path) {
        for domain in Domain::ALL {
            let d = self.domain_mut(domain);
            for p in [&mut d.model_dir, &mut d.labels].into_iter().flatten() {
                if p.is_relative() {
                    *p = base.join(&*p);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};
    use std::time::{SystemTime, UNIX_EPOCH};

    use super::ServiceConfig;
    use crate::labels::Domain;

    #[test]
    fn empty_config_uses_defaults() {
        let cfg = ServiceConfig::from_json_str("{}").expect("config");
        assert_eq!(cfg, ServiceConfig::default());
        assert_eq!(cfg.analysis.mfcc.n_mfcc, 40);
        assert_eq!(cfg.analysis.mfcc.sample_rate_hz, 22_050);
        assert!((cfg.analysis.window.offset_secs - 0.5).abs() < 1e-6);
        assert!((cfg.analysis.window.duration_secs - 3.0).abs() < 1e-6);
        assert_eq!(cfg.model_dir(Domain::Cardiac), Path::new("models/cardiac"));
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let cfg = ServiceConfig::from_json_str(
            r#"{ "analysis": { "mfcc": { "n_mfcc": 20 } }, "respiratory": { "model_dir": "/srv/lung" } }"#,
        )
        .expect("config");
        assert_eq!(cfg.analysis.mfcc.n_mfcc, 20);
        assert_eq!(cfg.analysis.mfcc.n_fft, 2048);
        assert_eq!(cfg.model_dir(Domain::Respiratory), Path::new("/srv/lung"));
        assert_eq!(cfg.model_dir(Domain::Cardiac), Path::new("models/cardiac"));
    }

    #[test]
    fn rejects_invalid_window() {
        let err = ServiceConfig::from_json_str(
            r#"{ "analysis": { "window": { "offset_secs": 0.5, "duration_secs": 0.0 } } }"#,
        )
        .unwrap_err();
        assert!(format!("{err:#}").contains("duration_secs"));
    }

    #[test]
    fn relative_paths_resolve_against_config_file() {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos();
        let dir: PathBuf = std::env::temp_dir().join(format!("auscult-config-test-{nanos}"));
        std::fs::create_dir_all(&dir).expect("mkdir");
        let path = dir.join("service.json");
        std::fs::write(
            &path,
            r#"{ "cardiac": { "model_dir": "heart", "labels": "/abs/labels.json" } }"#,
        )
        .expect("write");

        let cfg = ServiceConfig::from_path(&path).expect("config");
        assert_eq!(cfg.model_dir(Domain::Cardiac), dir.join("heart"));
        assert_eq!(
            cfg.cardiac.labels.as_deref(),
            Some(Path::new("/abs/labels.json"))
        );

        std::fs::remove_dir_all(dir).expect("cleanup");
    }
}
