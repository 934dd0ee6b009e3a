//! Builds oracles: runs the teacher over unlabeled data, fans student
//! training out per label, trains or constructs the per-label ensemblers,
//! and assembles the result.

use std::collections::BTreeMap;

use rayon::prelude::*;

use crate::error::{OracleError, Result};
use crate::frame::Frame;
use crate::metrics::{accuracy, binary_scores, tune_threshold};
use crate::models::ensembler::{Ensembler, EnsemblerModeler};
use crate::models::student::{binarize, Student, StudentModeler};
use crate::models::teacher::TeacherModel;
use crate::models::Model;
use crate::namespace::{Namespace, NsValue};
use crate::oracle::{stacked_inputs, Oracle};
use crate::record::{Record, PREDICTIONS, X, X_TRAIN, Y_TRAIN};

/// Ground-truth split used to train learned ensemblers and to evaluate.
/// `y_train` and `y_test` carry one 0/1 column per teacher label.
#[derive(Clone, Debug)]
pub struct LabeledData {
    pub x_train: Frame,
    pub y_train: Frame,
    pub x_test: Frame,
    pub y_test: Frame,
}

/// Everything `OracleModeler::build_model` consumes: the unlabeled feature
/// table students distill from, and optionally a labeled split.
#[derive(Clone, Debug)]
pub struct OracleData {
    pub unlabeled: Frame,
    pub labeled: Option<LabeledData>,
}

impl OracleData {
    pub fn unlabeled(frame: Frame) -> Self {
        OracleData {
            unlabeled: frame,
            labeled: None,
        }
    }

    pub fn with_labeled(mut self, labeled: LabeledData) -> Self {
        self.labeled = Some(labeled);
        self
    }
}

/// Orchestrates oracle construction. Configure a teacher, one or more
/// student modelers, and an ensembler modeler, then call `build_model`.
#[derive(Clone, Debug)]
pub struct OracleModeler {
    teacher: TeacherModel,
    student_modelers: Vec<StudentModeler>,
    ensembler_modeler: EnsemblerModeler,
    fuzzy_thresholds: BTreeMap<String, f32>,
    teacher_features: Option<Vec<String>>,
    inject_x: bool,
}

impl OracleModeler {
    pub fn new(teacher: TeacherModel) -> Self {
        OracleModeler {
            teacher,
            student_modelers: Vec::new(),
            ensembler_modeler: EnsemblerModeler::majority_vote(),
            fuzzy_thresholds: BTreeMap::new(),
            teacher_features: None,
            inject_x: false,
        }
    }

    /// Add one student modeler; every teacher label gets a student from
    /// each.
    pub fn add_student(mut self, modeler: StudentModeler) -> Self {
        self.student_modelers.push(modeler);
        self
    }

    pub fn with_ensembler(mut self, modeler: EnsemblerModeler) -> Self {
        self.ensembler_modeler = modeler;
        self
    }

    /// Binarization cutoff for one fuzzy teacher label. Required for every
    /// consequent label when the teacher is fuzzy.
    pub fn with_fuzzy_threshold(mut self, label: &str, cutoff: f32) -> Self {
        self.fuzzy_thresholds.insert(label.to_string(), cutoff);
        self
    }

    /// Restrict the columns the teacher sees. Students and ensemblers still
    /// train on the full feature set.
    pub fn with_teacher_features<I, S>(mut self, features: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.teacher_features = Some(features.into_iter().map(Into::into).collect());
        self
    }

    /// Stack the raw feature columns into learned ensembler inputs.
    pub fn inject_features(mut self, inject: bool) -> Self {
        self.inject_x = inject;
        self
    }

    fn fuzzy_threshold(&self, label: &str) -> Result<f32> {
        self.fuzzy_thresholds.get(label).copied().ok_or_else(|| {
            OracleError::Config(format!(
                "fuzzy teacher label '{}' has no binarization threshold",
                label
            ))
        })
    }

    /// Teacher output over `x`, binarized per label when the teacher is
    /// fuzzy. Only the configured teacher feature columns are passed in.
    fn teach(&self, x: &Frame) -> Result<Frame> {
        let teacher_x = match &self.teacher_features {
            Some(features) => x.select(features)?,
            None => x.clone(),
        };
        let out = self
            .teacher
            .predict(&Record::new().with_frame(X, teacher_x))?;
        let out = out.frame(PREDICTIONS)?;
        if !self.teacher.is_fuzzy() {
            return Ok(out.clone());
        }
        let mut columns = Vec::with_capacity(out.ncols());
        for label in out.columns().to_vec() {
            let cutoff = self.fuzzy_threshold(&label)?;
            let hard = binarize(&out.column(&label)?, cutoff);
            columns.push((label, hard));
        }
        Frame::from_columns(columns)?.with_index(x.index().to_vec())
    }

    /// Build a complete oracle from `data`.
    ///
    /// Fails before any fitting when the configuration cannot succeed: no
    /// student modelers, a fuzzy teacher label without a binarization
    /// threshold, or a learned ensembler without labeled data.
    pub fn build_model(&self, data: &OracleData) -> Result<Oracle> {
        if self.student_modelers.is_empty() {
            return Err(OracleError::Config(
                "at least one student modeler is required".to_string(),
            ));
        }
        if self.teacher.is_fuzzy() {
            for label in self.teacher.labels() {
                self.fuzzy_threshold(&label)?;
            }
        }
        if self.ensembler_modeler.requires_labeled_data() && data.labeled.is_none() {
            return Err(OracleError::Config(
                "learned ensembler requires labeled data".to_string(),
            ));
        }

        let x = &data.unlabeled;
        let teacher_out = self.teach(x)?;
        let labels: Vec<String> = teacher_out.columns().to_vec();
        log::info!(
            "building oracle: {} labels, {} student modelers, {} rows",
            labels.len(),
            self.student_modelers.len(),
            x.nrows()
        );

        // Per-label fan-out; labels train independently.
        let trained: Vec<(String, Vec<Student>)> = labels
            .par_iter()
            .map(|label| -> Result<(String, Vec<Student>)> {
                let y = Frame::from_columns(vec![(
                    label.clone(),
                    teacher_out.column(label)?.to_vec(),
                )])?
                .with_index(x.index().to_vec())?;
                let record = Record::new()
                    .with_frame(X_TRAIN, x.clone())
                    .with_frame(Y_TRAIN, y);
                let mut students = Vec::with_capacity(self.student_modelers.len());
                for modeler in &self.student_modelers {
                    students.push(modeler.clone().build_model(&record)?);
                }
                Ok((label.clone(), students))
            })
            .collect::<Result<Vec<_>>>()?;
        let students: BTreeMap<String, Vec<Student>> = trained.into_iter().collect();

        let mut ensemblers = BTreeMap::new();
        for label in &labels {
            let ensembler = self.build_ensembler(label, &students[label], data)?;
            ensemblers.insert(label.clone(), ensembler);
        }

        let mut stats = Namespace::new();
        stats.set("labels", NsValue::str_list(labels.iter().cloned()));
        stats.set(
            "input_features",
            NsValue::str_list(x.columns().iter().cloned()),
        );
        stats.set_bool("inject_x", self.inject_x);
        if let Some(features) = &self.teacher_features {
            stats.set("features", NsValue::str_list(features.iter().cloned()));
        }
        if self.teacher.is_fuzzy() {
            for label in &labels {
                stats.set_f64(
                    &format!("fuzzy_thresholds.{}", label),
                    self.fuzzy_threshold(label)? as f64,
                );
            }
        }

        Ok(Oracle {
            teacher: self.teacher.clone(),
            students,
            ensemblers,
            stats,
            metrics: Namespace::new(),
            version: None,
        })
    }

    fn build_ensembler(
        &self,
        label: &str,
        students: &[Student],
        data: &OracleData,
    ) -> Result<Ensembler> {
        if !self.ensembler_modeler.requires_labeled_data() {
            return self.ensembler_modeler.build_model(label, None);
        }

        // Checked in build_model.
        let labeled = data.labeled.as_ref().ok_or_else(|| {
            OracleError::Config("learned ensembler requires labeled data".to_string())
        })?;
        let teacher_out = self.teach(&labeled.x_train)?;
        let stacked = stacked_inputs(
            teacher_out.column(label)?.to_vec(),
            students,
            &labeled.x_train,
            true,
            self.inject_x,
        )?;
        let truth = Frame::from_columns(vec![(
            label.to_string(),
            labeled.y_train.column(label)?.to_vec(),
        )])?
        .with_index(stacked.index().to_vec())?;
        let record = Record::new()
            .with_frame(X_TRAIN, stacked)
            .with_frame(Y_TRAIN, truth);
        let mut ensembler = self.ensembler_modeler.build_model(label, Some(&record))?;
        if let Ensembler::Learned(ref mut learned) = ensembler {
            learned.stats.set_bool("inject_x", self.inject_x);
        }
        Ok(ensembler)
    }

    /// Score the oracle's components on the held-out split, filling
    /// `oracle.metrics` under `<metric>.<label>.<component>`. Students are
    /// additionally scored against the binarized teacher output, under
    /// `<metric>.<label>.student_<i>_vs_teacher`. A component that fails to
    /// predict is logged and skipped.
    pub fn evaluate(&self, oracle: &mut Oracle, labeled: &LabeledData) -> Result<()> {
        let x = &labeled.x_test;
        let labels = oracle.labels();

        let teacher_out = oracle.teach(x)?;
        for label in &labels {
            let truth = labeled.y_test.column(label)?.to_vec();
            let teacher_ref = teacher_out.column(label).ok().map(|c| c.to_vec());

            match &teacher_ref {
                Some(col) => record_scores(&mut oracle.metrics, label, "teacher", col, &truth),
                None => log::warn!("teacher evaluation skipped for '{}'", label),
            }

            if let Some(students) = oracle.students.get(label) {
                for (i, student) in students.iter().enumerate() {
                    let component = format!("student_{}", i);
                    match student.predict(&Record::new().with_frame(X, x.clone())) {
                        Ok(out) => {
                            let col = out.frame(PREDICTIONS)?.column(label)?.to_vec();
                            record_scores(&mut oracle.metrics, label, &component, &col, &truth);
                            if let Some(teacher_col) = &teacher_ref {
                                record_scores(
                                    &mut oracle.metrics,
                                    label,
                                    &format!("{}_vs_teacher", component),
                                    &col,
                                    teacher_col,
                                );
                            }
                        }
                        Err(e) => {
                            log::warn!(
                                "student {} evaluation skipped for '{}': {}",
                                i,
                                label,
                                e
                            )
                        }
                    }
                }
            }
        }

        match oracle.predict(&Record::new().with_frame(X, x.clone())) {
            Ok(out) => {
                let frame = out.frame(PREDICTIONS)?;
                for label in &labels {
                    let truth = labeled.y_test.column(label)?.to_vec();
                    let col = frame.column(label)?;
                    record_scores(
                        &mut oracle.metrics,
                        label,
                        "ensembler",
                        &col.to_vec(),
                        &truth,
                    );
                }
            }
            Err(e) => log::warn!("ensemble evaluation skipped: {}", e),
        }
        Ok(())
    }
}

fn record_scores(
    metrics: &mut Namespace,
    label: &str,
    component: &str,
    predicted: &[f32],
    truth: &[f32],
) {
    let scores = binary_scores(predicted, truth);
    metrics.set_f64(&format!("f1.{}.{}", label, component), scores.f1);
    metrics.set_f64(
        &format!("precision.{}.{}", label, component),
        scores.precision,
    );
    metrics.set_f64(&format!("recall.{}.{}", label, component), scores.recall);
    metrics.set_f64(
        &format!("accuracy.{}.{}", label, component),
        accuracy(predicted, truth),
    );
}

impl Oracle {
    /// Retune every student's decision threshold against ground truth,
    /// recording the chosen cutoff and its f1 in each student's stats.
    pub fn tune_student_thresholds(&mut self, x: &Frame, y: &Frame) -> Result<()> {
        for (label, students) in self.students.iter_mut() {
            let truth = y.column(label)?.to_vec();
            for student in students.iter_mut() {
                let scores = student.scores(x)?;
                let (cutoff, f1) = tune_threshold(&scores, &truth);
                student.set_decision_threshold(cutoff);
                student.stats.set_f64("tuned_f1", f1);
                log::debug!(
                    "tuned '{}' student threshold to {:.2} (f1 {:.3})",
                    label,
                    cutoff,
                    f1
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fuzzy::{Antecedent, FuzzyRule, FuzzyVariable, Membership};
    use crate::models::teacher::{FuzzyModeler, RuleTeacher};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    /// Two blobs on feature `a`, separable at zero.
    fn blob_frame(n_per_class: usize, seed: u64) -> Frame {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut a = Vec::new();
        let mut b = Vec::new();
        for class in 0..2 {
            let center = if class == 0 { -1.0 } else { 1.0 };
            for _ in 0..n_per_class {
                a.push(center + rng.gen_range(-0.4..0.4));
                b.push(rng.gen_range(-0.4..0.4));
            }
        }
        Frame::from_columns(vec![("a".to_string(), a), ("b".to_string(), b)]).unwrap()
    }

    fn truth_for(x: &Frame) -> Frame {
        let labels: Vec<f32> = x
            .column("a")
            .unwrap()
            .iter()
            .map(|&v| if v > 0.0 { 1.0 } else { 0.0 })
            .collect();
        Frame::from_columns(vec![("positive".to_string(), labels)])
            .unwrap()
            .with_index(x.index().to_vec())
            .unwrap()
    }

    fn sign_teacher() -> TeacherModel {
        TeacherModel::Rule(RuleTeacher::new(vec!["positive".to_string()], |x, row| {
            let a = x.column("a").unwrap()[row];
            vec![if a > 0.0 { 1.0 } else { 0.0 }]
        }))
    }

    fn labeled_split() -> LabeledData {
        let x_train = blob_frame(20, 3);
        let y_train = truth_for(&x_train);
        let x_test = blob_frame(10, 4);
        let y_test = truth_for(&x_test);
        LabeledData {
            x_train,
            y_train,
            x_test,
            y_test,
        }
    }

    #[test]
    fn build_fans_out_per_label_and_modeler() {
        let modeler = OracleModeler::new(sign_teacher())
            .add_student(StudentModeler::logistic())
            .add_student(StudentModeler::forest());
        let oracle = modeler
            .build_model(&OracleData::unlabeled(blob_frame(20, 1)))
            .unwrap();
        assert_eq!(oracle.labels(), vec!["positive".to_string()]);
        assert_eq!(oracle.students["positive"].len(), 2);
        assert!(oracle.ensemblers.contains_key("positive"));
    }

    #[test]
    fn no_students_fails_fast() {
        let modeler = OracleModeler::new(sign_teacher());
        assert!(matches!(
            modeler.build_model(&OracleData::unlabeled(blob_frame(10, 1))),
            Err(OracleError::Config(_))
        ));
    }

    #[test]
    fn learned_ensembler_without_labels_fails_before_fitting() {
        let modeler = OracleModeler::new(sign_teacher())
            .add_student(StudentModeler::logistic())
            .with_ensembler(EnsemblerModeler::learned());
        assert!(matches!(
            modeler.build_model(&OracleData::unlabeled(blob_frame(10, 1))),
            Err(OracleError::Config(_))
        ));
    }

    #[test]
    fn learned_ensembler_builds_and_predicts() {
        let modeler = OracleModeler::new(sign_teacher())
            .add_student(StudentModeler::logistic())
            .with_ensembler(EnsemblerModeler::learned());
        let data =
            OracleData::unlabeled(blob_frame(20, 1)).with_labeled(labeled_split());
        let oracle = modeler.build_model(&data).unwrap();
        assert!(oracle.ensemblers["positive"].is_learned());

        let x = blob_frame(5, 9);
        let truth = truth_for(&x);
        let out = oracle.predict(&Record::new().with_frame(X, x)).unwrap();
        let predicted = out.frame(PREDICTIONS).unwrap().column("positive").unwrap();
        assert_eq!(predicted.to_vec(), truth.column("positive").unwrap().to_vec());
    }

    #[test]
    fn injected_features_flow_to_ensembler() {
        let modeler = OracleModeler::new(sign_teacher())
            .add_student(StudentModeler::logistic())
            .with_ensembler(EnsemblerModeler::learned())
            .inject_features(true);
        let data =
            OracleData::unlabeled(blob_frame(20, 1)).with_labeled(labeled_split());
        let oracle = modeler.build_model(&data).unwrap();
        let Ensembler::Learned(ref learned) = oracle.ensemblers["positive"] else {
            panic!("expected a learned ensembler");
        };
        // teacher + one student + two raw features.
        assert_eq!(learned.input_features().unwrap().len(), 4);
        assert!(learned.injects_x());

        // Prediction rebuilds the same stacked layout.
        let x = blob_frame(5, 9);
        assert!(oracle.predict(&Record::new().with_frame(X, x)).is_ok());
    }

    fn fuzzy_sign_teacher() -> TeacherModel {
        let teacher = FuzzyModeler::new()
            .add_variable(
                FuzzyVariable::antecedent("a", -2.0, 2.0)
                    .with_term(
                        "neg",
                        Membership::Trapezoid {
                            a: -2.0,
                            b: -2.0,
                            c: -0.5,
                            d: 0.0,
                        },
                    )
                    .with_term(
                        "pos",
                        Membership::Trapezoid {
                            a: 0.0,
                            b: 0.5,
                            c: 2.0,
                            d: 2.0,
                        },
                    ),
            )
            .add_variable(
                FuzzyVariable::consequent("positive", 0.0, 1.0)
                    .with_term(
                        "no",
                        Membership::Gaussian {
                            mean: 0.0,
                            sigma: 0.3,
                        },
                    )
                    .with_term(
                        "yes",
                        Membership::Gaussian {
                            mean: 1.0,
                            sigma: 0.3,
                        },
                    ),
            )
            .add_rule(
                FuzzyRule::new("pos", Antecedent::term("a", "pos")).then("positive", "yes"),
            )
            .add_rule(
                FuzzyRule::new("neg", Antecedent::term("a", "neg")).then("positive", "no"),
            )
            .build_model()
            .unwrap();
        TeacherModel::Fuzzy(teacher)
    }

    #[test]
    fn fuzzy_teacher_output_is_binarized_for_students() {
        let modeler = OracleModeler::new(fuzzy_sign_teacher())
            .add_student(StudentModeler::logistic())
            .with_fuzzy_threshold("positive", 0.6);
        let oracle = modeler
            .build_model(&OracleData::unlabeled(blob_frame(20, 2)))
            .unwrap();
        assert_eq!(oracle.fuzzy_threshold("positive"), Some(0.6));

        let x = blob_frame(6, 8);
        let out = oracle.predict(&Record::new().with_frame(X, x)).unwrap();
        let col = out.frame(PREDICTIONS).unwrap().column("positive").unwrap();
        assert!(col.iter().all(|&v| v == 0.0 || v == 1.0));
    }

    #[test]
    fn fuzzy_teacher_without_thresholds_fails_before_fitting() {
        let modeler =
            OracleModeler::new(fuzzy_sign_teacher()).add_student(StudentModeler::logistic());
        let result = modeler.build_model(&OracleData::unlabeled(blob_frame(10, 2)));
        match result {
            Err(OracleError::Config(msg)) => assert!(msg.contains("positive")),
            other => panic!("expected a config error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn teacher_feature_restriction_applies_to_the_teacher_only() {
        // This teacher votes yes only when handed exactly one column.
        let teacher =
            TeacherModel::Rule(RuleTeacher::new(vec!["positive".to_string()], |x, _| {
                vec![if x.ncols() == 1 { 1.0 } else { 0.0 }]
            }));
        let modeler = OracleModeler::new(teacher)
            .add_student(StudentModeler::logistic())
            .with_teacher_features(["a"]);
        let oracle = modeler
            .build_model(&OracleData::unlabeled(blob_frame(20, 5)))
            .unwrap();

        assert_eq!(oracle.teacher_features(), Some(vec!["a".to_string()]));
        // Students still trained on the full feature set.
        assert_eq!(
            oracle.students["positive"][0].input_features().unwrap(),
            vec!["a".to_string(), "b".to_string()]
        );

        // Predict-time teaching sees the same restricted view, so the
        // teacher keeps voting yes even with both columns supplied.
        let x = blob_frame(5, 6);
        let taught = oracle.teach(&x).unwrap();
        assert!(taught.column("positive").unwrap().iter().all(|&v| v == 1.0));
    }

    #[test]
    fn evaluate_fills_metrics_tree() {
        let modeler =
            OracleModeler::new(sign_teacher()).add_student(StudentModeler::logistic());
        let mut oracle = modeler
            .build_model(&OracleData::unlabeled(blob_frame(20, 1)))
            .unwrap();
        let labeled = labeled_split();
        modeler.evaluate(&mut oracle, &labeled).unwrap();

        assert!(oracle.metrics.get_f64("f1.positive.teacher").is_some());
        assert!(oracle.metrics.get_f64("f1.positive.student_0").is_some());
        assert!(oracle
            .metrics
            .get_f64("f1.positive.student_0_vs_teacher")
            .is_some());
        assert!(oracle.metrics.get_f64("f1.positive.ensembler").is_some());
        assert!(oracle
            .metrics
            .get_f64("accuracy.positive.ensembler")
            .is_some());
        // The rule teacher is exact on this data.
        assert!(oracle.metrics.get_f64("f1.positive.teacher").unwrap() > 0.99);
    }

    #[test]
    fn tuning_updates_student_thresholds() {
        let modeler =
            OracleModeler::new(sign_teacher()).add_student(StudentModeler::logistic());
        let mut oracle = modeler
            .build_model(&OracleData::unlabeled(blob_frame(20, 1)))
            .unwrap();
        let labeled = labeled_split();
        oracle
            .tune_student_thresholds(&labeled.x_test, &labeled.y_test)
            .unwrap();
        let student = &oracle.students["positive"][0];
        assert!(student.stats.get_f64("tuned_f1").is_some());
        assert!(student.decision_threshold() > 0.0);
    }
}
