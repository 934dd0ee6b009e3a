//! `oracular predict`: run a persisted model over a CSV feature table.

use anyhow::{bail, Context, Result};
use clap::ArgMatches;

use oracular_core::models::Model;
use oracular_core::record::{Record, PREDICTIONS, X};
use oracular_core::store::serialize::{ORACLE_FQN, STUDENT_FQN};

use crate::commands::open_store;
use crate::io::{read_frame, validate_csv_file, write_frame};

pub fn run(matches: &ArgMatches) -> Result<()> {
    let class: &String = matches.get_one("model_class").unwrap();
    let version: &String = matches.get_one("model_version").unwrap();
    let input: &String = matches.get_one("input").unwrap();
    let output: &String = matches.get_one("output").unwrap();
    validate_csv_file(input)?;

    let store = open_store(matches.get_one("store"))?;
    let x = read_frame(input)?;
    let record = Record::new().with_frame(X, x);

    let predictions = match class.as_str() {
        ORACLE_FQN => {
            let resolved = if version == "latest" {
                None
            } else {
                Some(version.as_str())
            };
            let oracle = store
                .load_oracle(resolved)
                .with_context(|| format!("failed to load {}::{}", class, version))?;
            log::info!(
                "[Oracular::Predict] oracle {} over {} rows",
                oracle.version.as_deref().unwrap_or("?"),
                record.frame(X)?.nrows()
            );
            oracle.predict(&record)?
        }
        STUDENT_FQN => {
            let resolved = if version == "latest" {
                store.latest(STUDENT_FQN)?
            } else {
                version.clone()
            };
            let student = store
                .load_student(&resolved)
                .with_context(|| format!("failed to load {}::{}", class, resolved))?;
            student.predict(&record)?
        }
        other => bail!(
            "unknown model class '{}'; use {} or {}",
            other,
            ORACLE_FQN,
            STUDENT_FQN
        ),
    };

    let frame = predictions.frame(PREDICTIONS)?;
    write_frame(output, frame)?;
    log::info!(
        "[Oracular::Predict] wrote {} rows x {} labels to {}",
        frame.nrows(),
        frame.ncols(),
        output
    );
    Ok(())
}
