//! End-to-end oracle construction tests on synthetic iris-like data.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use oracular_core::error::OracleError;
use oracular_core::frame::Frame;
use oracular_core::models::ensembler::{Ensembler, EnsemblerModeler, MajorityVoteEnsembler};
use oracular_core::models::student::StudentModeler;
use oracular_core::models::teacher::{RuleTeacher, TeacherModel};
use oracular_core::models::Model;
use oracular_core::oracle::{LabeledData, OracleData, OracleModeler};
use oracular_core::record::{Record, PREDICTIONS, X};
use oracular_core::store::{MemoryArtifactStore, ModelRegistry, ModelStore};

// ---------------------------------------------------------------------------
// Synthetic iris
// ---------------------------------------------------------------------------

/// Two species: setosa sits around (5.0, 3.4), the rest around (6.3, 2.8).
/// Returns the feature frame and the 0/1 setosa ground truth.
fn synthetic_iris(n_per_class: usize, seed: u64) -> (Frame, Vec<f32>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut length = Vec::new();
    let mut width = Vec::new();
    let mut truth = Vec::new();
    for _ in 0..n_per_class {
        length.push(5.0 + rng.gen_range(-0.35..0.35));
        width.push(3.4 + rng.gen_range(-0.35..0.35));
        truth.push(1.0);
    }
    for _ in 0..n_per_class {
        length.push(6.3 + rng.gen_range(-0.5..0.5));
        width.push(2.8 + rng.gen_range(-0.3..0.3));
        truth.push(0.0);
    }
    let frame = Frame::from_columns(vec![
        ("sepal_length".to_string(), length),
        ("sepal_width".to_string(), width),
    ])
    .unwrap();
    (frame, truth)
}

fn band_teacher() -> TeacherModel {
    TeacherModel::Rule(RuleTeacher::new(vec!["setosa".to_string()], |x, row| {
        let length = x.column("sepal_length").unwrap()[row];
        let width = x.column("sepal_width").unwrap()[row];
        let hit = (4.0..=6.0).contains(&length) && (2.8..=4.6).contains(&width);
        vec![if hit { 1.0 } else { 0.0 }]
    }))
}

fn truth_frame(truth: &[f32], index: &[u64]) -> Frame {
    Frame::from_columns(vec![("setosa".to_string(), truth.to_vec())])
        .unwrap()
        .with_index(index.to_vec())
        .unwrap()
}

fn labeled_split(seed: u64) -> LabeledData {
    let (x_train, y_train) = synthetic_iris(30, seed);
    let (x_test, y_test) = synthetic_iris(20, seed + 1);
    let y_train = truth_frame(&y_train, x_train.index());
    let y_test = truth_frame(&y_test, x_test.index());
    LabeledData {
        x_train,
        y_train,
        x_test,
        y_test,
    }
}

// ---------------------------------------------------------------------------
// Scenario A: rule teacher, two students, majority vote
// ---------------------------------------------------------------------------

#[test]
fn iris_distillation_with_majority_vote() {
    let (train, _) = synthetic_iris(30, 100);
    let (test, truth) = synthetic_iris(20, 200);

    let modeler = OracleModeler::new(band_teacher())
        .add_student(StudentModeler::logistic())
        .add_student(StudentModeler::forest());
    let mut oracle = modeler.build_model(&OracleData::unlabeled(train)).unwrap();

    let before = oracle
        .predict(&Record::new().with_frame(X, test.clone()))
        .unwrap();
    let before = before.frame(PREDICTIONS).unwrap().clone();
    assert_eq!(before.columns(), &["setosa".to_string()]);
    assert_eq!(before.nrows(), test.nrows());

    // At least half of the verdicts match ground truth.
    let verdicts = before.column("setosa").unwrap();
    let agree = verdicts
        .iter()
        .zip(truth.iter())
        .filter(|(&p, &t)| (p >= 0.5) == (t >= 0.5))
        .count();
    assert!(agree * 2 >= truth.len(), "only {}/{} agree", agree, truth.len());

    // Persisted oracle reloads and predicts identically.
    let mut registry = ModelRegistry::new();
    registry.register("oracular.teacher.RuleTeacher", || {
        let TeacherModel::Rule(t) = band_teacher() else {
            unreachable!()
        };
        t
    });
    let store =
        ModelStore::new(Box::new(MemoryArtifactStore::new())).with_registry(registry);
    let version = store.persist_oracle(&mut oracle, None).unwrap();
    let loaded = store.load_oracle(Some(&version)).unwrap();
    assert_eq!(loaded.version.as_deref(), Some(version.as_str()));

    let after = loaded
        .predict(&Record::new().with_frame(X, test))
        .unwrap();
    assert_eq!(after.frame(PREDICTIONS).unwrap(), &before);
}

// ---------------------------------------------------------------------------
// Invariants
// ---------------------------------------------------------------------------

#[test]
fn teacher_columns_are_input_independent() {
    let teacher = band_teacher();
    let (x1, _) = synthetic_iris(5, 1);
    let (x2, _) = synthetic_iris(9, 2);
    let c1 = teacher.predict(&Record::new().with_frame(X, x1)).unwrap();
    let c2 = teacher.predict(&Record::new().with_frame(X, x2)).unwrap();
    assert_eq!(
        c1.frame(PREDICTIONS).unwrap().columns(),
        c2.frame(PREDICTIONS).unwrap().columns()
    );
}

#[test]
fn student_fan_out_matches_modeler_count() {
    let (train, _) = synthetic_iris(20, 3);
    let modeler = OracleModeler::new(band_teacher())
        .add_student(StudentModeler::logistic())
        .add_student(StudentModeler::forest());
    let oracle = modeler.build_model(&OracleData::unlabeled(train)).unwrap();
    for label in oracle.labels() {
        assert_eq!(oracle.students[&label].len(), 2);
    }
}

#[test]
fn learned_ensembler_input_width_is_teacher_plus_students() {
    let (train, _) = synthetic_iris(20, 4);
    let modeler = OracleModeler::new(band_teacher())
        .add_student(StudentModeler::logistic())
        .add_student(StudentModeler::forest())
        .with_ensembler(EnsemblerModeler::learned());
    let data = OracleData::unlabeled(train).with_labeled(labeled_split(40));
    let oracle = modeler.build_model(&data).unwrap();

    let Ensembler::Learned(ref learned) = oracle.ensemblers["setosa"] else {
        panic!("expected a learned ensembler");
    };
    // One teacher column plus one per student; no raw features.
    assert_eq!(learned.input_features().unwrap().len(), 3);
}

#[test]
fn injected_features_widen_the_stacked_input() {
    let (train, _) = synthetic_iris(20, 5);
    let modeler = OracleModeler::new(band_teacher())
        .add_student(StudentModeler::logistic())
        .with_ensembler(EnsemblerModeler::learned())
        .inject_features(true);
    let data = OracleData::unlabeled(train).with_labeled(labeled_split(50));
    let oracle = modeler.build_model(&data).unwrap();
    let Ensembler::Learned(ref learned) = oracle.ensemblers["setosa"] else {
        panic!("expected a learned ensembler");
    };
    // teacher + student + sepal_length + sepal_width.
    assert_eq!(learned.input_features().unwrap().len(), 4);
}

#[test]
fn majority_vote_respects_student_decision_thresholds() {
    let (train, _) = synthetic_iris(30, 60);
    let modeler = OracleModeler::new(band_teacher())
        .add_student(StudentModeler::logistic())
        .add_student(StudentModeler::forest());
    let mut oracle = modeler.build_model(&OracleData::unlabeled(train)).unwrap();

    // Thresholds no probability can clear: both students hard-vote
    // all-zero, so the teacher is outvoted two to one on every row.
    for student in oracle.students.get_mut("setosa").unwrap() {
        student.set_decision_threshold(1.5);
    }
    let (test, _) = synthetic_iris(10, 61);
    for student in &oracle.students["setosa"] {
        let out = student
            .predict(&Record::new().with_frame(X, test.clone()))
            .unwrap();
        assert!(out
            .frame(PREDICTIONS)
            .unwrap()
            .column("setosa")
            .unwrap()
            .iter()
            .all(|&v| v == 0.0));
    }

    let out = oracle.predict(&Record::new().with_frame(X, test)).unwrap();
    assert!(out
        .frame(PREDICTIONS)
        .unwrap()
        .column("setosa")
        .unwrap()
        .iter()
        .all(|&v| v == 0.0));
}

#[test]
fn prediction_preserves_the_row_index() {
    let (train, _) = synthetic_iris(20, 6);
    let modeler =
        OracleModeler::new(band_teacher()).add_student(StudentModeler::logistic());
    let oracle = modeler.build_model(&OracleData::unlabeled(train)).unwrap();

    let (test, _) = synthetic_iris(5, 7);
    let index: Vec<u64> = (0..10).map(|i| 1000 + i).collect();
    let test = test.with_index(index.clone()).unwrap();
    let out = oracle.predict(&Record::new().with_frame(X, test)).unwrap();
    assert_eq!(out.frame(PREDICTIONS).unwrap().index(), index.as_slice());
}

// ---------------------------------------------------------------------------
// Scenario C: learned ensembler with labeled data populates metrics
// ---------------------------------------------------------------------------

#[test]
fn learned_ensembler_build_populates_metrics() {
    let (train, _) = synthetic_iris(30, 8);
    let modeler = OracleModeler::new(band_teacher())
        .add_student(StudentModeler::logistic())
        .add_student(StudentModeler::forest())
        .with_ensembler(EnsemblerModeler::learned());
    let labeled = labeled_split(80);
    let data = OracleData::unlabeled(train).with_labeled(labeled.clone());
    let mut oracle = modeler.build_model(&data).unwrap();
    modeler.evaluate(&mut oracle, &labeled).unwrap();

    for component in [
        "teacher",
        "student_0",
        "student_1",
        "student_0_vs_teacher",
        "student_1_vs_teacher",
        "ensembler",
    ] {
        for metric in ["f1", "precision", "recall"] {
            let path = format!("{}.setosa.{}", metric, component);
            assert!(
                oracle.metrics.get_f64(&path).is_some(),
                "missing metric {}",
                path
            );
        }
    }
}

// ---------------------------------------------------------------------------
// Scenario D: learned ensembler without labeled data fails fast
// ---------------------------------------------------------------------------

#[test]
fn learned_ensembler_without_labels_is_a_config_error() {
    let (train, _) = synthetic_iris(20, 9);
    let modeler = OracleModeler::new(band_teacher())
        .add_student(StudentModeler::logistic())
        .with_ensembler(EnsemblerModeler::learned());
    assert!(matches!(
        modeler.build_model(&OracleData::unlabeled(train)),
        Err(OracleError::Config(_))
    ));
}

// ---------------------------------------------------------------------------
// Scenario E: majority vote on unanimous input
// ---------------------------------------------------------------------------

#[test]
fn unanimous_majority_vote_reproduces_the_value() {
    let ensembler = MajorityVoteEnsembler::new("setosa");
    let ones = vec![1.0f32; 10];
    let stacked = Frame::from_columns(vec![
        ("teacher".to_string(), ones.clone()),
        ("student_0".to_string(), ones.clone()),
        ("student_1".to_string(), ones.clone()),
    ])
    .unwrap();
    let out = ensembler
        .predict(&Record::new().with_frame(X, stacked))
        .unwrap();
    assert_eq!(
        out.frame(PREDICTIONS).unwrap().column("setosa").unwrap().to_vec(),
        ones
    );
}
