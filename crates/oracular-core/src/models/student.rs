//! Students: statistical models trained to reproduce one teacher label.
//!
//! A `StudentModeler` wraps one learner class; `build_model` fits the
//! learner on `(features, teacher pseudo-label)` pairs and wraps the result
//! in a `Student` carrying the fitted scaler, input feature list, and
//! output label.

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::error::{OracleError, Result};
use crate::frame::Frame;
use crate::models::learners::{
    ForestParams, LogisticParams, LogisticRegression, RandomForest,
};
use crate::models::Model;
use crate::namespace::Namespace;
use crate::preprocessing::Scaler;
use crate::record::{Record, PREDICTIONS, X, X_TRAIN, Y_TRAIN};

/// The learner kinds available to student modelers. Both expose calibrated
/// probabilities, which the learned ensembler requires.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum StudentLearner {
    Logistic(LogisticRegression),
    Forest(RandomForest),
}

impl StudentLearner {
    pub fn decision_function(&self, x: &Array2<f32>) -> Vec<f32> {
        match self {
            StudentLearner::Logistic(m) => m.decision_function(x),
            StudentLearner::Forest(m) => m.decision_function(x),
        }
    }
}

/// A student fit to reproduce one teacher label from raw features.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Student {
    pub base_model: StudentLearner,
    pub stats: Namespace,
    pub metrics: Namespace,
    pub version: Option<String>,
}

impl Student {
    /// Probability cutoff applied by `predict`; tunable after the fact.
    pub fn decision_threshold(&self) -> f32 {
        self.stats
            .get_f64("decision_threshold")
            .map(|v| v as f32)
            .unwrap_or(0.5)
    }

    pub fn set_decision_threshold(&mut self, cutoff: f32) {
        self.stats.set_f64("decision_threshold", cutoff as f64);
    }

    pub fn output_label(&self) -> Result<String> {
        self.stats
            .get_str("output_label")
            .map(str::to_string)
            .ok_or_else(|| OracleError::Config("student stats missing 'output_label'".to_string()))
    }

    pub fn input_features(&self) -> Result<Vec<String>> {
        self.stats
            .get_str_list("input_features")
            .ok_or_else(|| {
                OracleError::Config("student stats missing 'input_features'".to_string())
            })
    }

    /// Project `x` onto the fitted feature set and apply the stored scaler.
    fn scaled_matrix(&self, x: &Frame) -> Result<Array2<f32>> {
        let features = self.input_features()?;
        let selected = x.select(&features)?;
        let scaler = Scaler::from_stats(&self.stats, "scaler")?;
        scaler.transform(&selected.to_matrix())
    }

    /// Positive-class probability per row.
    pub fn scores(&self, x: &Frame) -> Result<Vec<f32>> {
        Ok(self.base_model.decision_function(&self.scaled_matrix(x)?))
    }
}

impl Model for Student {
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
        // Rows by classes, negative class first.
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
        match self.base_model {
            StudentLearner::Logistic(_) => "logistic_student",
            StudentLearner::Forest(_) => "forest_student",
        }
    }
}

/// Hyper-parameters for the two reference student learners.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum StudentParams {
    Logistic(LogisticParams),
    Forest(ForestParams),
}

/// Wraps one learner class; fitting records preprocessing state under
/// `stats.scaler`.
#[derive(Clone, Debug)]
pub struct StudentModeler {
    pub params: StudentParams,
    pub stats: Namespace,
}

impl StudentModeler {
    pub fn new(params: StudentParams) -> Self {
        StudentModeler {
            params,
            stats: Namespace::new(),
        }
    }

    pub fn logistic() -> Self {
        StudentModeler::new(StudentParams::Logistic(LogisticParams::default()))
    }

    pub fn forest() -> Self {
        StudentModeler::new(StudentParams::Forest(ForestParams::default()))
    }

    /// Fit the underlying learner, storing the scaler in `self.stats`.
    pub fn train_base_model(&mut self, x: &Frame, y: &[f32]) -> Result<StudentLearner> {
        if x.nrows() != y.len() {
            return Err(OracleError::DimensionMismatch(format!(
                "{} feature rows for {} labels",
                x.nrows(),
                y.len()
            )));
        }
        let matrix = x.to_matrix();
        let scaler = Scaler::fit(&matrix)?;
        let scaled = scaler.transform(&matrix)?;
        scaler.store(&mut self.stats, "scaler");

        Ok(match &self.params {
            StudentParams::Logistic(params) => {
                StudentLearner::Logistic(LogisticRegression::fit(&scaled, y, params))
            }
            StudentParams::Forest(params) => {
                StudentLearner::Forest(RandomForest::fit(&scaled, y, params))
            }
        })
    }

    /// Fit and wrap into a `Student`, recording fitted input features and
    /// the output label.
    ///
    /// # Arguments
    ///
    /// * `data` - record with `X_train` (features) and `y_train` (a
    ///   single-column frame holding the teacher pseudo-label)
    pub fn build_model(&mut self, data: &Record) -> Result<Student> {
        let x = data.frame(X_TRAIN)?;
        let y_frame = data.frame(Y_TRAIN)?;
        if y_frame.ncols() != 1 {
            return Err(OracleError::UnsupportedInput(format!(
                "y_train must hold exactly one label column, got {}",
                y_frame.ncols()
            )));
        }
        let label = y_frame.columns()[0].clone();
        let y: Vec<f32> = y_frame.column(&label)?.to_vec();

        let base_model = self.train_base_model(x, &y)?;

        let mut stats = self.stats.clone();
        stats.set(
            "input_features",
            crate::namespace::NsValue::str_list(x.columns().iter().cloned()),
        );
        stats.set_str("output_label", &label);

        log::debug!(
            "built student for label '{}' on {} rows x {} features",
            label,
            x.nrows(),
            x.ncols()
        );

        Ok(Student {
            base_model,
            stats,
            metrics: Namespace::new(),
            version: None,
        })
    }
}

/// Binarize one soft teacher column at `cutoff` (strictly greater wins).
pub fn binarize(scores: &Array1<f32>, cutoff: f32) -> Vec<f32> {
    scores
        .iter()
        .map(|&v| if v > cutoff { 1.0 } else { 0.0 })
        .collect()
}
