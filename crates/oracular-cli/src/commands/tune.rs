//! `oracular tune-threshold`: retune a persisted student's decision cutoff
//! against labeled data and persist the result.

use anyhow::{Context, Result};
use clap::ArgMatches;

use oracular_core::metrics::tune_threshold;

use crate::commands::open_store;
use crate::io::{read_frame, split_labels, validate_csv_file};

pub fn run(matches: &ArgMatches) -> Result<()> {
    let version: &String = matches.get_one("student_version").unwrap();
    let input: &String = matches.get_one("input").unwrap();
    let label: &String = matches.get_one("label").unwrap();
    validate_csv_file(input)?;

    let store = open_store(matches.get_one("store"))?;
    let mut student = store
        .load_student(version)
        .with_context(|| format!("failed to load student {}", version))?;

    let table = read_frame(input)?;
    let (x, y) = split_labels(&table, std::slice::from_ref(label))?;
    let truth = y.column(label)?.to_vec();
    let scores = student.scores(&x)?;

    let (cutoff, f1) = tune_threshold(&scores, &truth);
    student.set_decision_threshold(cutoff);
    student.stats.set_f64("tuned_f1", f1);
    log::info!(
        "[Oracular::Tune] threshold {:.2} (f1 {:.3}) on {} rows",
        cutoff,
        f1,
        x.nrows()
    );

    let minted = store.persist_student(&mut student, None)?;
    println!("{}", minted);
    Ok(())
}
