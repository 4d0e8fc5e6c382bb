//! Pre-trained grade and tier models.
//!
//! Models are plain JSON artifacts produced by the offline training job and
//! loaded once at startup. Inputs are always ordered as
//! `[asistencia, participaciones, evaluaciones]`.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{ModelLoadError, ScoringError};
use crate::models::{PerformanceTier, StudentFeatureVector};

pub const REGRESSION_FILE: &str = "regression.json";
pub const CLASSIFIER_FILE: &str = "classifier.json";

const FEATURE_COUNT: usize = 3;

/// Inference over a student's features. Implementations must be
/// side-effect free so they can be shared across requests.
pub trait ModelProvider: Send + Sync {
    fn predict_grade(&self, features: &StudentFeatureVector) -> f64;
    fn predict_tier(&self, features: &StudentFeatureVector) -> PerformanceTier;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearRegression {
    pub intercept: f64,
    pub coefficients: [f64; FEATURE_COUNT],
}

impl LinearRegression {
    pub fn predict(&self, inputs: &[f64; FEATURE_COUNT]) -> f64 {
        self.intercept
            + self
                .coefficients
                .iter()
                .zip(inputs.iter())
                .map(|(weight, value)| weight * value)
                .sum::<f64>()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum TreeNode {
    /// Inputs with `value <= threshold` follow `left`.
    Split {
        feature: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
    Leaf {
        tier: PerformanceTier,
    },
}

impl TreeNode {
    /// Walks the tree for `inputs`. A split on a feature outside the input
    /// vector follows `right`; validated trees never contain one.
    pub fn classify(&self, inputs: &[f64; FEATURE_COUNT]) -> PerformanceTier {
        let mut node = self;
        loop {
            match node {
                TreeNode::Leaf { tier } => return *tier,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    let goes_left = inputs
                        .get(*feature)
                        .is_some_and(|value| value <= threshold);
                    node = if goes_left {
                        left
                    } else {
                        right
                    };
                }
            }
        }
    }

    fn validate(&self) -> Result<(), String> {
        match self {
            TreeNode::Leaf { .. } => Ok(()),
            TreeNode::Split {
                feature,
                threshold,
                left,
                right,
            } => {
                if *feature >= FEATURE_COUNT {
                    return Err(format!("split on unknown feature index {feature}"));
                }
                if !threshold.is_finite() {
                    return Err("split threshold must be finite".to_string());
                }
                left.validate()?;
                right.validate()
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TierClassifier {
    /// Ensemble of decision trees, majority vote.
    Forest { trees: Vec<TreeNode> },
    /// Linear score interpreted through the grade-to-tier rule.
    LinearRule {
        intercept: f64,
        coefficients: [f64; FEATURE_COUNT],
    },
}

impl TierClassifier {
    pub fn classify(&self, inputs: &[f64; FEATURE_COUNT]) -> PerformanceTier {
        match self {
            TierClassifier::Forest { trees } => {
                majority_vote(trees.iter().map(|tree| tree.classify(inputs)))
            }
            TierClassifier::LinearRule {
                intercept,
                coefficients,
            } => {
                let score = LinearRegression {
                    intercept: *intercept,
                    coefficients: *coefficients,
                }
                .predict(inputs);
                PerformanceTier::from_grade(score)
            }
        }
    }

    fn validate(&self) -> Result<(), String> {
        match self {
            TierClassifier::Forest { trees } => {
                if trees.is_empty() {
                    return Err("forest has no trees".to_string());
                }
                trees.iter().try_for_each(TreeNode::validate)
            }
            TierClassifier::LinearRule { .. } => Ok(()),
        }
    }
}

/// Most frequent tier; ties go to the tier voted first.
fn majority_vote(votes: impl Iterator<Item = PerformanceTier>) -> PerformanceTier {
    let mut tally: Vec<(PerformanceTier, usize)> = Vec::with_capacity(3);
    for vote in votes {
        match tally.iter_mut().find(|(tier, _)| *tier == vote) {
            Some((_, count)) => *count += 1,
            None => tally.push((vote, 1)),
        }
    }

    let mut winner: Option<(PerformanceTier, usize)> = None;
    for (tier, count) in tally {
        if winner.map_or(true, |(_, best)| count > best) {
            winner = Some((tier, count));
        }
    }
    // validate() rejects empty forests, so there is always a vote.
    winner.map_or(PerformanceTier::Average, |(tier, _)| tier)
}

impl LinearRegression {
    fn validate(&self) -> Result<(), String> {
        let finite =
            self.intercept.is_finite() && self.coefficients.iter().all(|c| c.is_finite());
        if finite {
            Ok(())
        } else {
            Err("coefficients must be finite".to_string())
        }
    }
}

/// Regression and classification models, validated on construction.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedModels {
    regression: LinearRegression,
    classifier: TierClassifier,
}

impl PersistedModels {
    pub fn new(
        regression: LinearRegression,
        classifier: TierClassifier,
    ) -> Result<Self, ModelLoadError> {
        regression.validate().map_err(ModelLoadError::Invalid)?;
        classifier.validate().map_err(ModelLoadError::Invalid)?;
        Ok(Self {
            regression,
            classifier,
        })
    }

    pub fn load(dir: &Path) -> Result<Self, ModelLoadError> {
        let regression_path = dir.join(REGRESSION_FILE);
        let regression: LinearRegression = read_artifact(&regression_path)?;
        regression
            .validate()
            .map_err(|reason| ModelLoadError::Shape {
                path: regression_path,
                reason,
            })?;

        let classifier_path = dir.join(CLASSIFIER_FILE);
        let classifier: TierClassifier = read_artifact(&classifier_path)?;
        classifier
            .validate()
            .map_err(|reason| ModelLoadError::Shape {
                path: classifier_path,
                reason,
            })?;

        Ok(Self {
            regression,
            classifier,
        })
    }
}

impl ModelProvider for PersistedModels {
    fn predict_grade(&self, features: &StudentFeatureVector) -> f64 {
        self.regression.predict(&features.as_array())
    }

    fn predict_tier(&self, features: &StudentFeatureVector) -> PerformanceTier {
        self.classifier.classify(&features.as_array())
    }
}

fn read_artifact<T: DeserializeOwned>(path: &Path) -> Result<T, ModelLoadError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ModelLoadError::Io {
        path: PathBuf::from(path),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| ModelLoadError::Parse {
        path: PathBuf::from(path),
        source,
    })
}

/// Models as seen by request handlers: loaded, or the reason they are not.
#[derive(Clone)]
pub enum ModelSlot {
    Ready(Arc<dyn ModelProvider>),
    Unavailable(String),
}

impl ModelSlot {
    /// Loads artifacts from `dir`. A failed load leaves the slot degraded
    /// instead of aborting the process.
    pub fn load(dir: &Path) -> Self {
        match PersistedModels::load(dir) {
            Ok(models) => {
                info!(model_dir = %dir.display(), "prediction models loaded");
                ModelSlot::Ready(Arc::new(models))
            }
            Err(err) => {
                warn!(model_dir = %dir.display(), error = %err, "prediction models unavailable");
                ModelSlot::Unavailable(err.to_string())
            }
        }
    }

    pub fn ready(models: PersistedModels) -> Self {
        ModelSlot::Ready(Arc::new(models))
    }

    pub fn provider(&self) -> Result<&dyn ModelProvider, ScoringError> {
        match self {
            ModelSlot::Ready(provider) => Ok(provider.as_ref()),
            ModelSlot::Unavailable(reason) => Err(ScoringError::ModelUnavailable(reason.clone())),
        }
    }
}

impl fmt::Debug for ModelSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelSlot::Ready(_) => f.write_str("ModelSlot::Ready"),
            ModelSlot::Unavailable(reason) => {
                f.debug_tuple("ModelSlot::Unavailable").field(reason).finish()
            }
        }
    }
}
