//! Label registries: per-class names, descriptions and recommendations.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// The two screening domains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    Cardiac,
    Respiratory,
}

impl Domain {
    pub const ALL: [Domain; 2] = [Domain::Cardiac, Domain::Respiratory];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cardiac => "cardiac",
            Self::Respiratory => "respiratory",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Domain {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cardiac" | "heart" | "heartbeat" => Ok(Self::Cardiac),
            "respiratory" | "lung" | "breath" => Ok(Self::Respiratory),
            other => anyhow::bail!("unknown domain {other:?} (expected cardiac or respiratory)"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelDescriptor {
    pub index: usize,
    pub name: String,
    pub description: String,
    pub recommendation: String,
    /// Display category key, e.g. for styling (`"murmur"`, `"healthy"`).
    pub category: String,
    #[serde(default)]
    pub emoji: String,
    /// Marks the "normal / healthy" outcome of the domain.
    #[serde(default)]
    pub healthy: bool,
}

/// Immutable, densely indexed label table for one classifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelRegistry {
    pub title: String,
    labels: Vec<LabelDescriptor>,
    /// Closing message when the top label is healthy.
    pub positive_message: String,
    /// Closing message for every other outcome.
    pub cautionary_message: String,
    #[serde(default)]
    pub disclaimer: String,
}

impl LabelRegistry {
    pub fn new(
        title: impl Into<String>,
        labels: Vec<LabelDescriptor>,
        positive_message: impl Into<String>,
        cautionary_message: impl Into<String>,
        disclaimer: impl Into<String>,
    ) -> Result<Self> {
        let registry = Self {
            title: title.into(),
            labels,
            positive_message: positive_message.into(),
            cautionary_message: cautionary_message.into(),
            disclaimer: disclaimer.into(),
        };
        registry.validate()?;
        Ok(registry)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let registry: Self = serde_json::from_str(json).context("parse label registry")?;
        registry.validate()?;
        Ok(registry)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path_ref = path.as_ref();
        let json = std::fs::read_to_string(path_ref)
            .with_context(|| format!("read {}", path_ref.display()))?;
        Self::from_json_str(&json).with_context(|| format!("load {}", path_ref.display()))
    }

    /// The registry shipped for `domain`.
    #[must_use]
    pub fn builtin(domain: Domain) -> Self {
        match domain {
            Domain::Cardiac => from_static(
                "Cardiac Sound Analysis",
                CARDIAC_LABELS,
                "Great news! Your heartbeat patterns appear normal. Continue maintaining good cardiovascular health!",
                "This cardiac screening suggests you should consult with a cardiologist for proper medical evaluation and personalized treatment advice.",
                "This AI cardiac screening tool is designed to assist in early detection and should not replace professional medical diagnosis. Please consult with qualified cardiologists for comprehensive evaluation and treatment.",
            ),
            Domain::Respiratory => from_static(
                "Respiratory Sound Analysis",
                RESPIRATORY_LABELS,
                "Great news! Your breathing patterns appear healthy. Continue maintaining good respiratory health!",
                "This screening suggests you should consult with a healthcare professional for proper medical evaluation and personalized treatment advice.",
                "This AI screening tool is designed to assist in early detection and should not replace professional medical diagnosis. Please consult with qualified healthcare professionals for comprehensive evaluation and treatment.",
            ),
        }
    }

    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(!self.labels.is_empty(), "label registry is empty");
        for (pos, label) in self.labels.iter().enumerate() {
            anyhow::ensure!(
                label.index == pos,
                "label {:?} has index {} at position {pos}; indices must be dense 0..N-1",
                label.name,
                label.index
            );
            anyhow::ensure!(!label.name.trim().is_empty(), "label {pos} has an empty name");
        }
        Ok(())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&LabelDescriptor> {
        self.labels.get(index)
    }

    #[must_use]
    pub fn labels(&self) -> &[LabelDescriptor] {
        &self.labels
    }

    #[must_use]
    pub fn is_healthy(&self, index: usize) -> bool {
        self.get(index).is_some_and(|l| l.healthy)
    }
}

struct StaticLabel {
    name: &'static str,
    category: &'static str,
    emoji: &'static str,
    healthy: bool,
    description: &'static str,
    recommendation: &'static str,
}

fn from_static(
    title: &str,
    table: &[StaticLabel],
    positive: &str,
    cautionary: &str,
    disclaimer: &str,
) -> LabelRegistry {
    let labels = table
        .iter()
        .enumerate()
        .map(|(index, l)| LabelDescriptor {
            index,
            name: l.name.to_string(),
            description: l.description.to_string(),
            recommendation: l.recommendation.to_string(),
            category: l.category.to_string(),
            emoji: l.emoji.to_string(),
            healthy: l.healthy,
        })
        .collect();
    LabelRegistry {
        title: title.to_string(),
        labels,
        positive_message: positive.to_string(),
        cautionary_message: cautionary.to_string(),
        disclaimer: disclaimer.to_string(),
    }
}

const CARDIAC_LABELS: &[StaticLabel] = &[
    StaticLabel {
        name: "Artifact",
        category: "artifact",
        emoji: "⚡",
        healthy: false,
        description: "Audio artifacts detected - this may be due to noise, poor recording quality, or technical interference in the heartbeat recording.",
        recommendation: "Please try recording again in a quieter environment with better audio quality. Ensure proper placement of recording device.",
    },
    StaticLabel {
        name: "A-Unlabelled Test",
        category: "aunlabelledtest",
        emoji: "🔍",
        healthy: false,
        description: "An unlabelled cardiac pattern (Type A) has been detected. This requires further medical evaluation for proper classification.",
        recommendation: "Consult with a cardiologist for comprehensive cardiac evaluation and proper diagnosis of this heart pattern.",
    },
    StaticLabel {
        name: "B-Unlabelled Test",
        category: "bunlabelledtest",
        emoji: "🔬",
        healthy: false,
        description: "An unlabelled cardiac pattern (Type B) has been identified. Professional medical assessment is needed for accurate classification.",
        recommendation: "Schedule an appointment with a cardiac specialist for detailed heart examination and proper diagnosis.",
    },
    StaticLabel {
        name: "Extrahls",
        category: "extrahls",
        emoji: "🎵",
        healthy: false,
        description: "Extra heart sounds (gallops) detected - these are additional sounds that may indicate cardiac conditions like heart failure or ventricular dysfunction.",
        recommendation: "Medical evaluation recommended. Extra heart sounds can be significant and may require cardiac assessment and treatment.",
    },
    StaticLabel {
        name: "Extrasystole",
        category: "extrastole",
        emoji: "💓",
        healthy: false,
        description: "Extrasystoles (premature heartbeats) detected. These are early heartbeats that can be benign or indicate underlying cardiac issues.",
        recommendation: "Consult with a cardiologist to determine if these irregular beats require treatment or monitoring.",
    },
    StaticLabel {
        name: "Murmur",
        category: "murmur",
        emoji: "🌊",
        healthy: false,
        description: "A heart murmur has been detected. This is an extra sound during heartbeat cycle, which can be innocent or indicate heart valve problems.",
        recommendation: "Cardiac evaluation recommended to determine if the murmur is benign or requires treatment. Further tests like echocardiogram may be needed.",
    },
    StaticLabel {
        name: "Normal",
        category: "normal",
        emoji: "✅",
        healthy: true,
        description: "Excellent news! Normal heart sounds detected. Your cardiac rhythm appears healthy with regular heart beats and normal sound patterns.",
        recommendation: "Continue maintaining good cardiovascular health with regular exercise, healthy diet, and routine check-ups.",
    },
    StaticLabel {
        name: "Unlabelled Test",
        category: "unlabelledtest",
        emoji: "❓",
        healthy: false,
        description: "An unclassified cardiac pattern has been detected. This pattern doesn't match standard categories and needs professional evaluation.",
        recommendation: "Medical consultation strongly recommended for proper cardiac assessment and diagnosis of this unusual heart pattern.",
    },
];

const RESPIRATORY_LABELS: &[StaticLabel] = &[
    StaticLabel {
        name: "Asthma",
        category: "asthma",
        emoji: "🫁",
        healthy: false,
        description: "The AI has detected respiratory patterns consistent with asthma. This includes characteristic wheeze patterns and airway obstruction indicators in the audio analysis.",
        recommendation: "Please consult with a pulmonologist or your primary care physician for proper diagnosis and treatment planning. Early intervention can significantly improve quality of life.",
    },
    StaticLabel {
        name: "Bronchial",
        category: "bronchial",
        emoji: "🌬️",
        healthy: false,
        description: "Bronchial has been detected in the breath patterns. The audio shows signs of bronchial tube irritation and inflammation.",
        recommendation: "Seek medical advice for appropriate bronchial treatment and management. Your doctor may recommend anti-inflammatory treatments or further testing.",
    },
    StaticLabel {
        name: "Chronic Obstructive Pulmonary Disease",
        category: "copd",
        emoji: "⚠️",
        healthy: false,
        description: "The analysis suggests possible Chronic Obstructive Pulmonary Disease. Audio indicates airflow limitation and breathing difficulties.",
        recommendation: "Medical evaluation is strongly recommended for COPD assessment and management. Early diagnosis and treatment can help slow disease progression.",
    },
    StaticLabel {
        name: "Healthy",
        category: "healthy",
        emoji: "✅",
        healthy: true,
        description: "Excellent news! Normal breathing patterns have been detected. Your respiratory health appears to be in good condition based on the audio analysis.",
        recommendation: "Continue maintaining good respiratory health with regular exercise, clean air exposure, and avoiding smoking. Keep up the good work!",
    },
    StaticLabel {
        name: "Pneumonia",
        category: "pneumonia",
        emoji: "🚨",
        healthy: false,
        description: "The respiratory patterns may indicate pneumonia. The audio analysis shows signs consistent with lung infection and possible fluid accumulation.",
        recommendation: "Immediate medical consultation is strongly recommended for proper diagnosis and treatment. Pneumonia requires prompt medical attention.",
    },
];
