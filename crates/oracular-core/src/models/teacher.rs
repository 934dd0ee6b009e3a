//! Teacher models: hand-authored rules or a fuzzy controller, providing
//! pseudo-labels for student distillation. Teachers are authored, never
//! trained.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::error::{OracleError, Result};
use crate::frame::Frame;
use crate::fuzzy::{FuzzyController, FuzzyRule, FuzzyVariable};
use crate::models::Model;
use crate::record::{Record, PREDICTIONS, X};

/// Row predicate of a rule-based teacher: one value per teacher label for
/// the given row of `X`.
pub type RulePredicate = Arc<dyn Fn(&Frame, usize) -> Vec<f32> + Send + Sync>;

/// A teacher whose predictions come from a user-supplied per-row predicate.
///
/// The predicate is opaque; persisting a rule teacher stores no model blob,
/// and loading one requires a constructor registered under the teacher's
/// class FQN.
#[derive(Clone)]
pub struct RuleTeacher {
    labels: Vec<String>,
    predicate: RulePredicate,
    class_fqn: String,
}

impl RuleTeacher {
    pub fn new<F>(labels: Vec<String>, predicate: F) -> Self
    where
        F: Fn(&Frame, usize) -> Vec<f32> + Send + Sync + 'static,
    {
        RuleTeacher {
            labels,
            predicate: Arc::new(predicate),
            class_fqn: "oracular.teacher.RuleTeacher".to_string(),
        }
    }

    /// Override the class FQN recorded at persist time; load resolves it
    /// through the model registry.
    pub fn with_class_fqn(mut self, fqn: &str) -> Self {
        self.class_fqn = fqn.to_string();
        self
    }

    pub fn class_fqn(&self) -> &str {
        &self.class_fqn
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }
}

impl fmt::Debug for RuleTeacher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleTeacher")
            .field("labels", &self.labels)
            .field("class_fqn", &self.class_fqn)
            .finish()
    }
}

impl Model for RuleTeacher {
    fn predict(&self, input: &Record) -> Result<Record> {
        let x = input.frame(X)?;
        let nrows = x.nrows();
        let ncols = self.labels.len();
        let mut data = Vec::with_capacity(nrows * ncols);
        for row in 0..nrows {
            let values = (self.predicate)(x, row);
            if values.len() != ncols {
                return Err(OracleError::DimensionMismatch(format!(
                    "rule predicate returned {} values for {} labels",
                    values.len(),
                    ncols
                )));
            }
            data.extend_from_slice(&values);
        }
        let matrix = Array2::from_shape_vec((nrows, ncols), data)
            .map_err(|e| OracleError::DimensionMismatch(e.to_string()))?;
        let frame = Frame::new(self.labels.clone(), matrix)?.with_index(x.index().to_vec())?;
        Ok(Record::new().with_frame(PREDICTIONS, frame))
    }

    fn name(&self) -> &str {
        "rule_teacher"
    }
}

/// A teacher backed by a fuzzy controller; one output column per consequent
/// variable, defuzzified values within each consequent's universe.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FuzzyTeacher {
    pub controller: FuzzyController,
}

impl FuzzyTeacher {
    pub fn labels(&self) -> Vec<String> {
        self.controller.consequent_names()
    }
}

impl Model for FuzzyTeacher {
    fn predict(&self, input: &Record) -> Result<Record> {
        let x = input.frame(X)?;
        let antecedents = self.controller.antecedent_names();
        // Pull each required input column once.
        let mut columns: Vec<(String, Array1<f32>)> = Vec::with_capacity(antecedents.len());
        for name in &antecedents {
            columns.push((name.clone(), x.column(name)?));
        }

        let labels = self.controller.consequent_names();
        let mut data = Vec::with_capacity(x.nrows() * labels.len());
        for row in 0..x.nrows() {
            let inputs: BTreeMap<String, f32> = columns
                .iter()
                .map(|(name, col)| (name.clone(), col[row]))
                .collect();
            let scores = self.controller.infer(&inputs)?;
            for label in &labels {
                data.push(scores[label]);
            }
        }
        let matrix = Array2::from_shape_vec((x.nrows(), labels.len()), data)
            .map_err(|e| OracleError::DimensionMismatch(e.to_string()))?;
        let frame = Frame::new(labels, matrix)?.with_index(x.index().to_vec())?;
        Ok(Record::new().with_frame(PREDICTIONS, frame))
    }

    fn name(&self) -> &str {
        "fuzzy_teacher"
    }
}

/// The teacher kinds the oracle modeler accepts.
#[derive(Clone, Debug)]
pub enum TeacherModel {
    Rule(RuleTeacher),
    Fuzzy(FuzzyTeacher),
}

impl TeacherModel {
    pub fn is_fuzzy(&self) -> bool {
        matches!(self, TeacherModel::Fuzzy(_))
    }

    pub fn labels(&self) -> Vec<String> {
        match self {
            TeacherModel::Rule(t) => t.labels().to_vec(),
            TeacherModel::Fuzzy(t) => t.labels(),
        }
    }
}

impl Model for TeacherModel {
    fn predict(&self, input: &Record) -> Result<Record> {
        match self {
            TeacherModel::Rule(t) => t.predict(input),
            TeacherModel::Fuzzy(t) => t.predict(input),
        }
    }

    fn name(&self) -> &str {
        match self {
            TeacherModel::Rule(t) => t.name(),
            TeacherModel::Fuzzy(t) => t.name(),
        }
    }
}

/// Assembles fuzzy variables and rules into a validated fuzzy teacher.
#[derive(Clone, Debug, Default)]
pub struct FuzzyModeler {
    variables: Vec<FuzzyVariable>,
    rules: Vec<FuzzyRule>,
}

impl FuzzyModeler {
    pub fn new() -> Self {
        FuzzyModeler::default()
    }

    pub fn add_variable(mut self, variable: FuzzyVariable) -> Self {
        self.variables.push(variable);
        self
    }

    pub fn add_rule(mut self, rule: FuzzyRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn build_model(self) -> Result<FuzzyTeacher> {
        let controller = FuzzyController::new(self.variables, self.rules)?;
        log::debug!(
            "built fuzzy teacher with consequents {:?}",
            controller.consequent_names()
        );
        Ok(FuzzyTeacher { controller })
    }
}
