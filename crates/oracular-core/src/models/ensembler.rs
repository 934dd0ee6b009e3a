//! Ensemblers: one per teacher label, combining the teacher's opinion with
//! the label's students into a final verdict.
//!
//! The majority-vote ensembler is purely rule based and needs no training
//! data. The learned ensembler is a meta-classifier fit on stacked teacher
//! and student outputs against ground-truth labels.

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::error::{OracleError, Result};
use crate::frame::Frame;
use crate::models::learners::{MlpClassifier, MlpParams};
use crate::models::Model;
use crate::namespace::Namespace;
use crate::preprocessing::Scaler;
use crate::record::{Record, PREDICTIONS, X, X_TRAIN, Y_TRAIN};

/// Hard-vote combiner over the stacked prediction columns. The first column
/// is the teacher's vote and breaks ties.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MajorityVoteEnsembler {
    pub label: String,
}

impl MajorityVoteEnsembler {
    pub fn new(label: &str) -> Self {
        MajorityVoteEnsembler {
            label: label.to_string(),
        }
    }
}

impl Model for MajorityVoteEnsembler {
    fn predict(&self, input: &Record) -> Result<Record> {
        let x = input.frame(X)?;
        if x.ncols() == 0 {
            return Err(OracleError::UnsupportedInput(
                "majority vote needs at least one prediction column".to_string(),
            ));
        }
        let matrix = x.to_matrix();
        let mut verdicts = Vec::with_capacity(x.nrows());
        for r in 0..x.nrows() {
            let yes = (0..x.ncols()).filter(|&c| matrix[(r, c)] >= 0.5).count();
            let no = x.ncols() - yes;
            let verdict = if yes != no {
                if yes > no {
                    1.0
                } else {
                    0.0
                }
            } else if matrix[(r, 0)] >= 0.5 {
                // Tie: side with the teacher.
                1.0
            } else {
                0.0
            };
            verdicts.push(verdict);
        }
        let frame = Frame::from_columns(vec![(self.label.clone(), verdicts)])?
            .with_index(x.index().to_vec())?;
        Ok(Record::new().with_frame(PREDICTIONS, frame))
    }

    fn name(&self) -> &str {
        "majority_vote_ensembler"
    }
}

/// Meta-classifier over stacked teacher and student outputs, optionally
/// with the raw features appended.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LearnedEnsembler {
    pub base_model: MlpClassifier,
    pub stats: Namespace,
    pub metrics: Namespace,
    pub version: Option<String>,
}

impl LearnedEnsembler {
    pub fn decision_threshold(&self) -> f32 {
        self.stats
            .get_f64("decision_threshold")
            .map(|v| v as f32)
            .unwrap_or(0.5)
    }

    pub fn output_label(&self) -> Result<String> {
        self.stats
            .get_str("output_label")
            .map(str::to_string)
            .ok_or_else(|| {
                OracleError::Config("ensembler stats missing 'output_label'".to_string())
            })
    }

    pub fn input_features(&self) -> Result<Vec<String>> {
        self.stats.get_str_list("input_features").ok_or_else(|| {
            OracleError::Config("ensembler stats missing 'input_features'".to_string())
        })
    }

    /// Whether the raw feature matrix was stacked into training inputs, and
    /// so must be stacked into prediction inputs too.
    pub fn injects_x(&self) -> bool {
        self.stats.get_bool("inject_x").unwrap_or(false)
    }

    fn scaled_matrix(&self, x: &Frame) -> Result<Array2<f32>> {
        let features = self.input_features()?;
        let selected = x.select(&features)?;
        let scaler = Scaler::from_stats(&self.stats, "scaler")?;
        scaler.transform(&selected.to_matrix())
    }

    pub fn scores(&self, x: &Frame) -> Result<Vec<f32>> {
        Ok(self.base_model.decision_function(&self.scaled_matrix(x)?))
    }
}

impl Model for LearnedEnsembler {
    fn predict(&self, input: &Record) -> Result<Record> {
        let x = input.frame(X)?;
        let cutoff = self.decision_threshold();
        let hard: Vec<f32> = self
            .scores(x)?
            .into_iter()
            .map(|p| if p >= cutoff { 1.0 } else { 0.0 })
            .collect();
        let frame = Frame::from_columns(vec![(self.output_label()?, hard)])?
            .with_index(x.index().to_vec())?;
        Ok(Record::new().with_frame(PREDICTIONS, frame))
    }

    fn predict_proba(&self, input: &Record) -> Result<Record> {
        let x = input.frame(X)?;
        let scores = self.scores(x)?;
        let negative: Vec<f32> = scores.iter().map(|p| 1.0 - p).collect();
        let frame = Frame::from_columns(vec![
            ("class_0".to_string(), negative),
            ("class_1".to_string(), scores),
        ])?
        .with_index(x.index().to_vec())?;
        Ok(Record::new().with_frame(PREDICTIONS, frame))
    }

    fn supports_proba(&self) -> bool {
        true
    }

    fn name(&self) -> &str {
        "learned_ensembler"
    }
}

/// The ensembler kinds an oracle carries, one per label.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Ensembler {
    MajorityVote(MajorityVoteEnsembler),
    Learned(LearnedEnsembler),
}

impl Ensembler {
    pub fn is_learned(&self) -> bool {
        matches!(self, Ensembler::Learned(_))
    }

    pub fn injects_x(&self) -> bool {
        match self {
            Ensembler::MajorityVote(_) => false,
            Ensembler::Learned(e) => e.injects_x(),
        }
    }

    pub fn output_label(&self) -> Result<String> {
        match self {
            Ensembler::MajorityVote(e) => Ok(e.label.clone()),
            Ensembler::Learned(e) => e.output_label(),
        }
    }
}

impl Model for Ensembler {
    fn predict(&self, input: &Record) -> Result<Record> {
        match self {
            Ensembler::MajorityVote(e) => e.predict(input),
            Ensembler::Learned(e) => e.predict(input),
        }
    }

    fn predict_proba(&self, input: &Record) -> Result<Record> {
        match self {
            Ensembler::MajorityVote(e) => e.predict_proba(input),
            Ensembler::Learned(e) => e.predict_proba(input),
        }
    }

    fn supports_proba(&self) -> bool {
        match self {
            Ensembler::MajorityVote(e) => e.supports_proba(),
            Ensembler::Learned(e) => e.supports_proba(),
        }
    }

    fn name(&self) -> &str {
        match self {
            Ensembler::MajorityVote(e) => e.name(),
            Ensembler::Learned(e) => e.name(),
        }
    }
}

/// Builds one ensembler per label. Rule-based combiners build from nothing
/// but the label name; learned combiners require a labeled training record.
#[derive(Clone, Debug)]
pub enum EnsemblerModeler {
    MajorityVote,
    Learned(MlpParams),
}

impl EnsemblerModeler {
    pub fn majority_vote() -> Self {
        EnsemblerModeler::MajorityVote
    }

    pub fn learned() -> Self {
        EnsemblerModeler::Learned(MlpParams::default())
    }

    /// Whether `build_model` needs a labeled training record at all.
    pub fn requires_labeled_data(&self) -> bool {
        matches!(self, EnsemblerModeler::Learned(_))
    }

    /// Build the ensembler for `label`.
    ///
    /// # Arguments
    ///
    /// * `label` - the teacher label this ensembler arbitrates
    /// * `data` - for learned ensemblers, a record with `X_train` (stacked
    ///   prediction columns) and `y_train` (ground truth); ignored otherwise
    pub fn build_model(&self, label: &str, data: Option<&Record>) -> Result<Ensembler> {
        match self {
            EnsemblerModeler::MajorityVote => {
                Ok(Ensembler::MajorityVote(MajorityVoteEnsembler::new(label)))
            }
            EnsemblerModeler::Learned(params) => {
                let data = data.ok_or_else(|| {
                    OracleError::Config(format!(
                        "learned ensembler for '{}' requires labeled training data",
                        label
                    ))
                })?;
                let x = data.frame(X_TRAIN)?;
                let y_frame = data.frame(Y_TRAIN)?;
                if y_frame.ncols() != 1 {
                    return Err(OracleError::UnsupportedInput(format!(
                        "y_train must hold exactly one label column, got {}",
                        y_frame.ncols()
                    )));
                }
                let y: Vec<f32> = y_frame.column(&y_frame.columns()[0])?.to_vec();
                if x.nrows() != y.len() {
                    return Err(OracleError::DimensionMismatch(format!(
                        "{} stacked rows for {} labels",
                        x.nrows(),
                        y.len()
                    )));
                }

                let matrix = x.to_matrix();
                let scaler = Scaler::fit(&matrix)?;
                let scaled = scaler.transform(&matrix)?;
                let base_model = MlpClassifier::fit(&scaled, &y, params);

                let mut stats = Namespace::new();
                scaler.store(&mut stats, "scaler");
                stats.set(
                    "input_features",
                    crate::namespace::NsValue::str_list(x.columns().iter().cloned()),
                );
                stats.set_str("output_label", label);

                log::debug!(
                    "built learned ensembler for '{}' over columns {:?}",
                    label,
                    x.columns()
                );

                Ok(Ensembler::Learned(LearnedEnsembler {
                    base_model,
                    stats,
                    metrics: Namespace::new(),
                    version: None,
                }))
            }
        }
    }
}
