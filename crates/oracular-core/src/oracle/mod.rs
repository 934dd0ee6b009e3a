//! The assembled oracle: a teacher, per-label student committees, and
//! per-label ensemblers, predicting as one model.

pub mod modeler;

use std::collections::BTreeMap;

use crate::error::{OracleError, Result};
use crate::frame::Frame;
use crate::models::ensembler::Ensembler;
use crate::models::student::{binarize, Student};
use crate::models::teacher::TeacherModel;
use crate::models::Model;
use crate::namespace::Namespace;
use crate::record::{Record, PREDICTIONS, X};

pub use modeler::{LabeledData, OracleData, OracleModeler};

/// Column name of the teacher's vote in stacked ensembler inputs.
pub(crate) const TEACHER_COLUMN: &str = "teacher";

/// A fully built knowledge-first model. Prediction runs the teacher, each
/// label's students, and the label's ensembler; the final frame has one 0/1
/// column per teacher label.
#[derive(Clone, Debug)]
pub struct Oracle {
    pub teacher: TeacherModel,
    pub students: BTreeMap<String, Vec<Student>>,
    pub ensemblers: BTreeMap<String, Ensembler>,
    pub stats: Namespace,
    pub metrics: Namespace,
    pub version: Option<String>,
}

impl Oracle {
    /// Label order of the prediction frame, recorded at build time.
    pub fn labels(&self) -> Vec<String> {
        self.stats
            .get_str_list("labels")
            .unwrap_or_else(|| self.teacher.labels())
    }

    /// Feature columns the oracle was built on.
    pub fn input_features(&self) -> Option<Vec<String>> {
        self.stats.get_str_list("input_features")
    }

    /// Restricted column set the teacher sees, when one was configured.
    pub fn teacher_features(&self) -> Option<Vec<String>> {
        self.stats.get_str_list("features")
    }

    /// Binarization cutoff for one fuzzy teacher label, when recorded.
    pub fn fuzzy_threshold(&self, label: &str) -> Option<f32> {
        self.stats
            .get_f64(&format!("fuzzy_thresholds.{}", label))
            .map(|v| v as f32)
    }

    /// Teacher output for `x`, with fuzzy consequents binarized at their
    /// recorded thresholds. Columns follow teacher label order. The teacher
    /// only sees the restricted column set recorded in `stats.features`.
    pub fn teach(&self, x: &Frame) -> Result<Frame> {
        let teacher_x = match self.teacher_features() {
            Some(features) => x.select(&features)?,
            None => x.clone(),
        };
        let raw = self
            .teacher
            .predict(&Record::new().with_frame(X, teacher_x))?;
        let raw = raw.frame(PREDICTIONS)?;

        let mut out = raw.clone();
        for label in raw.columns().to_vec() {
            if let Some(cutoff) = self.fuzzy_threshold(&label) {
                let hard = binarize(&raw.column(&label)?, cutoff);
                out = replace_column(&out, &label, hard)?;
            }
        }
        Ok(out)
    }

    fn label_students(&self, label: &str) -> Result<&[Student]> {
        match self.students.get(label) {
            Some(students) if !students.is_empty() => Ok(students),
            _ => Err(OracleError::NoStudentsBuilt),
        }
    }

    fn label_ensembler(&self, label: &str) -> Result<&Ensembler> {
        self.ensemblers
            .get(label)
            .ok_or(OracleError::NoEnsemblersBuilt)
    }
}

impl Model for Oracle {
    fn predict(&self, input: &Record) -> Result<Record> {
        let raw_x = input.frame(X)?;
        let x = match self.input_features() {
            Some(features) => raw_x.select(&features)?,
            None => raw_x.clone(),
        };

        if self.students.is_empty() {
            return Err(OracleError::NoStudentsBuilt);
        }
        if self.ensemblers.is_empty() {
            return Err(OracleError::NoEnsemblersBuilt);
        }

        let teacher_out = self.teach(&x)?;
        let labels = self.labels();

        let mut verdict_columns = Vec::with_capacity(labels.len());
        for label in &labels {
            if !teacher_out.has_column(label) {
                return Err(OracleError::TeacherColumnMismatch(format!(
                    "teacher output has no column for label '{}'",
                    label
                )));
            }
            let teacher_col = teacher_out.column(label)?.to_vec();
            let students = self.label_students(label)?;
            let ensembler = self.label_ensembler(label)?;

            let stacked = stacked_inputs(
                teacher_col,
                students,
                &x,
                ensembler.is_learned(),
                ensembler.injects_x(),
            )?;
            let verdict = ensembler.predict(&Record::new().with_frame(X, stacked))?;
            let verdict = verdict.frame(PREDICTIONS)?.column(label)?;
            verdict_columns.push((label.clone(), verdict.to_vec()));
        }

        let frame = Frame::from_columns(verdict_columns)?.with_index(x.index().to_vec())?;
        Ok(Record::new().with_frame(PREDICTIONS, frame))
    }

    fn name(&self) -> &str {
        "oracle"
    }
}

/// Assemble the ensembler input for one label: the teacher's vote first,
/// then one column per student, then the raw features when the ensembler
/// was trained with them. Learned ensemblers see soft student scores;
/// rule-based ones see hard verdicts at each student's decision threshold.
pub(crate) fn stacked_inputs(
    teacher_col: Vec<f32>,
    students: &[Student],
    x: &Frame,
    soft_scores: bool,
    inject_x: bool,
) -> Result<Frame> {
    let mut columns = vec![(TEACHER_COLUMN.to_string(), teacher_col)];
    for (i, student) in students.iter().enumerate() {
        let column = if soft_scores {
            student.scores(x)?
        } else {
            let out = student.predict(&Record::new().with_frame(X, x.clone()))?;
            out.frame(PREDICTIONS)?
                .column(&student.output_label()?)?
                .to_vec()
        };
        columns.push((format!("student_{}", i), column));
    }
    let stacked = Frame::from_columns(columns)?.with_index(x.index().to_vec())?;
    if inject_x {
        Frame::hstack(&[&stacked, x])
    } else {
        Ok(stacked)
    }
}

fn replace_column(frame: &Frame, name: &str, values: Vec<f32>) -> Result<Frame> {
    let mut columns = Vec::with_capacity(frame.ncols());
    for col in frame.columns().to_vec() {
        let data = if col == name {
            values.clone()
        } else {
            frame.column(&col)?.to_vec()
        };
        columns.push((col, data));
    }
    Frame::from_columns(columns)?.with_index(frame.index().to_vec())
}
