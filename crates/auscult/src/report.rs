//! Turning a probability vector into a labeled, ranked report.

use serde::Serialize;

use crate::classifier::ProbabilityVector;
use crate::error::InferenceError;
use crate::labels::LabelRegistry;

/// Percentage with one decimal place, e.g. `"81.0%"`.
#[must_use]
pub fn format_percent(percent: f32) -> String {
    format!("{percent:.1}%")
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabelScore {
    pub index: usize,
    pub name: String,
    pub category: String,
    pub emoji: String,
    pub probability: f32,
}

impl LabelScore {
    #[must_use]
    pub fn percent(&self) -> f32 {
        self.probability * 100.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ClosingKind {
    Positive,
    Cautionary,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationReport {
    pub title: String,
    pub top_index: usize,
    pub top_label: String,
    /// Probability of the top label, times 100.
    pub confidence: f32,
    pub confidence_text: String,
    pub description: String,
    pub recommendation: String,
    pub category: String,
    pub emoji: String,
    pub healthy: bool,
    pub closing_kind: ClosingKind,
    pub closing_message: String,
    pub disclaimer: String,
    /// Every label, highest probability first; ties keep index order.
    pub breakdown: Vec<LabelScore>,
}

impl ClassificationReport {
    /// The breakdown in registry (index) order.
    #[must_use]
    pub fn in_index_order(&self) -> Vec<&LabelScore> {
        let mut rows: Vec<&LabelScore> = self.breakdown.iter().collect();
        rows.sort_by_key(|r| r.index);
        rows
    }
}

/// Build the report for `probs` over `registry`. Pure; inputs are untouched.
pub fn interpret(
    probs: &ProbabilityVector,
    registry: &LabelRegistry,
) -> Result<ClassificationReport, InferenceError> {
    if probs.len() != registry.len() {
        return Err(InferenceError::ClassCount {
            model: probs.len(),
            labels: registry.len(),
        });
    }

    let (top_index, top_p) = probs.top();
    let top = &registry.labels()[top_index];
    let confidence = top_p * 100.0;

    let mut breakdown: Vec<LabelScore> = registry
        .labels()
        .iter()
        .zip(probs.as_slice())
        .map(|(label, &p)| LabelScore {
            index: label.index,
            name: label.name.clone(),
            category: label.category.clone(),
            emoji: label.emoji.clone(),
            probability: p,
        })
        .collect();
    breakdown.sort_by(|a, b| {
        b.probability
            .total_cmp(&a.probability)
            .then_with(|| a.index.cmp(&b.index))
    });

    let (closing_kind, closing_message) = if top.healthy {
        (ClosingKind::Positive, registry.positive_message.clone())
    } else {
        (ClosingKind::Cautionary, registry.cautionary_message.clone())
    };

    Ok(ClassificationReport {
        title: registry.title.clone(),
        top_index,
        top_label: top.name.clone(),
        confidence,
        confidence_text: format_percent(confidence),
        description: top.description.clone(),
        recommendation: top.recommendation.clone(),
        category: top.category.clone(),
        emoji: top.emoji.clone(),
        healthy: top.healthy,
        closing_kind,
        closing_message,
        disclaimer: registry.disclaimer.clone(),
        breakdown,
    })
}

#[cfg(test)]
mod tests {
    use super::{ClosingKind, format_percent, interpret};
    use crate::classifier::ProbabilityVector;
    use crate::error::InferenceError;
    use crate::labels::{Domain, LabelRegistry};

    fn probs(v: &[f32]) -> ProbabilityVector {
        ProbabilityVector::new(v.to_vec()).expect("valid probabilities")
    }

    #[test]
    fn cardiac_normal_scenario() {
        let registry = LabelRegistry::builtin(Domain::Cardiac);
        let p = probs(&[0.01, 0.02, 0.01, 0.02, 0.03, 0.05, 0.81, 0.05]);
        let report = interpret(&p, &registry).expect("report");

        assert_eq!(report.top_index, 6);
        assert_eq!(report.top_label, "Normal");
        assert_eq!(report.confidence_text, "81.0%");
        assert!(report.healthy);
        assert_eq!(report.closing_kind, ClosingKind::Positive);
        assert_eq!(report.closing_message, registry.positive_message);

        assert_eq!(report.breakdown.len(), 8);
        assert_eq!(report.breakdown[0].name, "Normal");
        // 0.05 ties between Murmur (5) and Unlabelled Test (7): index order.
        assert_eq!(report.breakdown[1].index, 5);
        assert_eq!(report.breakdown[2].index, 7);
        assert_eq!(format_percent(report.breakdown[1].percent()), "5.0%");

        let by_index: Vec<usize> = report.in_index_order().iter().map(|r| r.index).collect();
        assert_eq!(by_index, (0..8).collect::<Vec<_>>());
    }

    #[test]
    fn respiratory_healthy_scenario() {
        let registry = LabelRegistry::builtin(Domain::Respiratory);
        let p = probs(&[0.10, 0.05, 0.15, 0.60, 0.10]);
        let report = interpret(&p, &registry).expect("report");
        assert_eq!(report.top_label, "Healthy");
        assert_eq!(report.confidence_text, "60.0%");
        assert_eq!(report.closing_kind, ClosingKind::Positive);
    }

    #[test]
    fn abnormal_result_selects_cautionary_message() {
        let registry = LabelRegistry::builtin(Domain::Respiratory);
        let p = probs(&[0.05, 0.05, 0.10, 0.10, 0.70]);
        let report = interpret(&p, &registry).expect("report");
        assert_eq!(report.top_label, "Pneumonia");
        assert!(!report.healthy);
        assert_eq!(report.closing_kind, ClosingKind::Cautionary);
        assert_eq!(report.closing_message, registry.cautionary_message);
    }

    #[test]
    fn equal_maxima_resolve_to_lower_index() {
        let registry = LabelRegistry::builtin(Domain::Cardiac);
        let p = probs(&[0.5, 0.5, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        let report = interpret(&p, &registry).expect("report");
        assert_eq!(report.top_index, 0);
        assert_eq!(report.top_label, "Artifact");
        assert_eq!(report.confidence_text, "50.0%");
    }

    #[test]
    fn top_label_always_matches_argmax() {
        let registry = LabelRegistry::builtin(Domain::Respiratory);
        for hot in 0..5 {
            let mut v = vec![0.1f32; 5];
            v[hot] = 0.6;
            let p = probs(&v);
            let report = interpret(&p, &registry).expect("report");
            assert_eq!(report.top_index, hot);
            assert!((report.confidence - 60.0).abs() < 1e-3);
        }
    }

    #[test]
    fn class_count_mismatch_is_an_error() {
        let registry = LabelRegistry::builtin(Domain::Respiratory);
        let p = probs(&[0.5, 0.5]);
        assert_eq!(
            interpret(&p, &registry),
            Err(InferenceError::ClassCount {
                model: 2,
                labels: 5
            })
        );
    }
}
