//! CLI binary smoke tests using assert_cmd.
//!
//! These exercise the compiled `oracular` binary end-to-end: argument
//! parsing, help text, error handling, and a full oraclize/predict/tune
//! round trip against a local artifact store.

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;

use oracular_core::fuzzy::{Antecedent, FuzzyRule, FuzzyVariable, Membership};
use oracular_core::models::teacher::{FuzzyModeler, TeacherModel};
use oracular_core::store::serialize::STUDENT_FQN;
use oracular_core::store::{store_for, ModelStore};

fn cmd() -> Command {
    Command::cargo_bin("oracular").unwrap()
}

// ---------------------------------------------------------------------------
// Top-level
// ---------------------------------------------------------------------------

#[test]
fn no_args_shows_help() {
    cmd()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn help_flag() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("oraclize"))
        .stdout(predicate::str::contains("predict"))
        .stdout(predicate::str::contains("tune-threshold"));
}

#[test]
fn version_flag() {
    cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("oracular"));
}

// ---------------------------------------------------------------------------
// Argument validation
// ---------------------------------------------------------------------------

#[test]
fn predict_requires_input_and_output() {
    cmd()
        .args(["predict", "oracular.oracle.Oracle", "latest"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--input"));
}

#[test]
fn oraclize_rejects_unknown_ensembler() {
    cmd()
        .args([
            "oraclize",
            "some.Teacher",
            "latest",
            "--input",
            "x.csv",
            "--ensembler",
            "psychic",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("psychic"));
}

#[test]
fn missing_input_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    cmd()
        .args([
            "oraclize",
            "some.Teacher",
            "latest",
            "--input",
            "/definitely/not/here.csv",
            "--store",
        ])
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not exist"));
}

// ---------------------------------------------------------------------------
// End-to-end round trip
// ---------------------------------------------------------------------------

fn seed_fuzzy_teacher(store_root: &Path) -> (String, String) {
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
        .add_rule(FuzzyRule::new("pos", Antecedent::term("a", "pos")).then("positive", "yes"))
        .add_rule(FuzzyRule::new("neg", Antecedent::term("a", "neg")).then("positive", "no"))
        .build_model()
        .unwrap();

    let store = ModelStore::new(store_for(store_root.to_str().unwrap()).unwrap());
    store
        .persist_teacher(&TeacherModel::Fuzzy(teacher), None)
        .unwrap()
}

fn write_feature_csv(path: &Path, labeled: bool) {
    let mut rows = String::from(if labeled { "a,b,positive\n" } else { "a,b\n" });
    for i in 0..20 {
        let a = if i % 2 == 0 { -1.2 + 0.02 * i as f32 } else { 1.2 - 0.02 * i as f32 };
        let b = 0.1 * (i % 5) as f32;
        if labeled {
            let truth = if a > 0.0 { 1 } else { 0 };
            rows.push_str(&format!("{},{},{}\n", a, b, truth));
        } else {
            rows.push_str(&format!("{},{}\n", a, b));
        }
    }
    fs::write(path, rows).unwrap();
}

#[test]
fn oraclize_predict_tune_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let store_root = dir.path().join("store");
    let (teacher_class, teacher_version) = seed_fuzzy_teacher(&store_root);

    let input = dir.path().join("unlabeled.csv");
    let labeled = dir.path().join("labeled.csv");
    write_feature_csv(&input, false);
    write_feature_csv(&labeled, true);

    // Build and persist an oracle.
    let assert = cmd()
        .args(["oraclize", &teacher_class, &teacher_version])
        .args(["--input", input.to_str().unwrap()])
        .args(["--labeled-input", labeled.to_str().unwrap()])
        .args(["--students", "logistic,forest"])
        .args(["--threshold", "positive=0.5"])
        .args(["--store", store_root.to_str().unwrap()])
        .assert()
        .success();
    let oracle_version = String::from_utf8(assert.get_output().stdout.clone())
        .unwrap()
        .trim()
        .to_string();
    assert!(!oracle_version.is_empty());

    // Predict with the persisted oracle.
    let output = dir.path().join("predictions.csv");
    cmd()
        .args(["predict", "oracular.oracle.Oracle", &oracle_version])
        .args(["--input", input.to_str().unwrap()])
        .args(["--output", output.to_str().unwrap()])
        .args(["--store", store_root.to_str().unwrap()])
        .assert()
        .success();
    let written = fs::read_to_string(&output).unwrap();
    assert!(written.starts_with("row,positive"));
    assert_eq!(written.lines().count(), 21);

    // Tune one of the persisted students.
    let store = ModelStore::new(store_for(store_root.to_str().unwrap()).unwrap());
    let student_version = store.latest(STUDENT_FQN).unwrap();
    cmd()
        .args(["tune-threshold", &student_version])
        .args(["--input", labeled.to_str().unwrap()])
        .args(["--label", "positive"])
        .args(["--store", store_root.to_str().unwrap()])
        .assert()
        .success();
}

#[test]
fn oraclize_fuzzy_teacher_without_thresholds_fails() {
    let dir = tempfile::tempdir().unwrap();
    let store_root = dir.path().join("store");
    let (teacher_class, teacher_version) = seed_fuzzy_teacher(&store_root);

    let input = dir.path().join("unlabeled.csv");
    write_feature_csv(&input, false);

    cmd()
        .args(["oraclize", &teacher_class, &teacher_version])
        .args(["--input", input.to_str().unwrap()])
        .args(["--store", store_root.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("threshold"));
}

#[test]
fn predict_with_missing_version_fails() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("x.csv");
    write_feature_csv(&input, false);
    cmd()
        .args(["predict", "oracular.oracle.Oracle", "latest"])
        .args(["--input", input.to_str().unwrap()])
        .args(["--output", dir.path().join("out.csv").to_str().unwrap()])
        .args(["--store", dir.path().join("empty-store").to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error"));
}
