//! Per-domain screening pipeline and the process-wide service.
//!
//! decode -> MFCC -> classifier -> report, strictly in sequence. The only
//! shared state is the lazily loaded model, which is read-only once loaded.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{debug, info, info_span};

use crate::audio::{AnalysisWindow, AudioClip, AudioFormat, load_clip};
use crate::classifier::LazyClassifier;
use crate::config::ServiceConfig;
use crate::error::{DecodeError, InferenceError, ModelLoadError, PipelineError};
use crate::labels::{Domain, LabelRegistry};
use crate::mfcc::{FeatureVector, MfccExtractor};
use crate::report::{ClassificationReport, interpret};

/// A named byte stream handed over by the hosting layer.
#[derive(Debug, Clone)]
pub struct AudioUpload {
    pub name: String,
    pub declared: Option<AudioFormat>,
    pub bytes: Vec<u8>,
}

impl AudioUpload {
    #[must_use]
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            declared: None,
            bytes,
        }
    }

    /// Attach a declared type (`"wav"`, `"audio/mpeg"`, ...).
    pub fn with_declared_type(mut self, declared: &str) -> Result<Self, DecodeError> {
        self.declared = Some(AudioFormat::from_declared(declared)?);
        Ok(self)
    }

    /// Read a file, declaring its type from the extension when it is a supported one.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).with_context(|| format!("read {}", path.display()))?;
        let name = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
        let declared = path
            .extension()
            .and_then(|e| e.to_str())
            .and_then(|e| AudioFormat::from_declared(e).ok());
        Ok(Self {
            name,
            declared,
            bytes,
        })
    }

    /// Declared format if any, otherwise sniffed from the bytes.
    pub fn format(&self) -> Result<AudioFormat, DecodeError> {
        if self.bytes.is_empty() {
            return Err(DecodeError::Empty);
        }
        self.declared
            .or_else(|| AudioFormat::sniff(&self.bytes))
            .ok_or_else(|| DecodeError::UnsupportedFormat(format!("cannot detect type of {}", self.name)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadSummary {
    pub name: String,
    pub size_bytes: usize,
    pub format: AudioFormat,
}

/// Everything shown to the user for one analysed upload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisOutcome {
    pub domain: Domain,
    pub upload: UploadSummary,
    pub clip_secs: f32,
    pub feature_count: usize,
    pub report: ClassificationReport,
}

/// One classification domain: window, features, model and labels.
#[derive(Debug)]
pub struct DomainPipeline {
    domain: Domain,
    window: AnalysisWindow,
    extractor: Arc<MfccExtractor>,
    classifier: LazyClassifier,
    labels: LabelRegistry,
}

impl DomainPipeline {
    #[must_use]
    pub fn new(
        domain: Domain,
        window: AnalysisWindow,
        extractor: Arc<MfccExtractor>,
        classifier: LazyClassifier,
        labels: LabelRegistry,
    ) -> Self {
        Self {
            domain,
            window,
            extractor,
            classifier,
            labels,
        }
    }

    #[must_use]
    pub fn domain(&self) -> Domain {
        self.domain
    }

    #[must_use]
    pub fn labels(&self) -> &LabelRegistry {
        &self.labels
    }

    #[must_use]
    pub fn classifier(&self) -> &LazyClassifier {
        &self.classifier
    }

    /// Load the model now instead of on the first request.
    pub fn preload(&self) -> Result<(), ModelLoadError> {
        self.classifier.get().map(|_| ())
    }

    /// Decode the upload and cut the analysis window.
    pub fn load(&self, upload: &AudioUpload) -> Result<(AudioFormat, AudioClip), PipelineError> {
        let format = upload.format()?;
        let clip = load_clip(
            &upload.bytes,
            format,
            self.window,
            self.extractor.config().sample_rate_hz,
        )?;
        Ok((format, clip))
    }

    /// Classify an already extracted feature vector.
    pub fn classify(&self, features: &FeatureVector) -> Result<ClassificationReport, PipelineError> {
        let model = self.classifier.get()?;
        if model.num_classes() != self.labels.len() {
            return Err(InferenceError::ClassCount {
                model: model.num_classes(),
                labels: self.labels.len(),
            }
            .into());
        }
        let probs = model.predict(features)?;
        debug!(domain = %self.domain, probabilities = ?probs.as_slice(), "prediction");
        Ok(interpret(&probs, &self.labels)?)
    }

    pub fn analyze(&self, upload: &AudioUpload) -> Result<AnalysisOutcome, PipelineError> {
        let _span = info_span!("analyze", domain = %self.domain, upload = %upload.name).entered();

        let (format, clip) = self.load(upload)?;
        let features = self.extractor.extract(&clip)?;
        let report = self.classify(&features)?;

        info!(
            top_label = %report.top_label,
            confidence = %report.confidence_text,
            "analysis complete"
        );

        Ok(AnalysisOutcome {
            domain: self.domain,
            upload: UploadSummary {
                name: upload.name.clone(),
                size_bytes: upload.bytes.len(),
                format,
            },
            clip_secs: clip.duration_secs(),
            feature_count: features.len(),
            report,
        })
    }
}

/// Built once at startup and shared by reference with every request handler.
#[derive(Debug)]
pub struct ScreeningService {
    cardiac: DomainPipeline,
    respiratory: DomainPipeline,
}

impl ScreeningService {
    pub fn from_config(cfg: &ServiceConfig) -> Result<Self> {
        cfg.validate()?;
        let extractor = Arc::new(MfccExtractor::new(cfg.analysis.mfcc));

        let build = |domain: Domain| -> Result<DomainPipeline> {
            let labels = match &cfg.domain(domain).labels {
                Some(path) => LabelRegistry::from_path(path)
                    .with_context(|| format!("{domain} label registry"))?,
                None => LabelRegistry::builtin(domain),
            };
            let model_dir = cfg.model_dir(domain);
            debug!(%domain, model_dir = %model_dir.display(), classes = labels.len(), "configured domain");
            Ok(DomainPipeline::new(
                domain,
                cfg.analysis.window,
                Arc::clone(&extractor),
                LazyClassifier::from_dir(model_dir),
                labels,
            ))
        };

        Ok(Self {
            cardiac: build(Domain::Cardiac)?,
            respiratory: build(Domain::Respiratory)?,
        })
    }

    /// Assemble a service from ready-made pipelines.
    #[must_use]
    pub fn from_pipelines(cardiac: DomainPipeline, respiratory: DomainPipeline) -> Self {
        Self {
            cardiac,
            respiratory,
        }
    }

    #[must_use]
    pub fn pipeline(&self, domain: Domain) -> &DomainPipeline {
        match domain {
            Domain::Cardiac => &self.cardiac,
            Domain::Respiratory => &self.respiratory,
        }
    }

    pub fn analyze(
        &self,
        domain: Domain,
        upload: &AudioUpload,
    ) -> Result<AnalysisOutcome, PipelineError> {
        self.pipeline(domain).analyze(upload)
    }
}
