//! `oracular oraclize`: build an oracle from a stored teacher and a CSV
//! feature table, then persist it.

use anyhow::{bail, Context, Result};
use clap::ArgMatches;

use oracular_core::models::ensembler::EnsemblerModeler;
use oracular_core::models::student::StudentModeler;
use oracular_core::oracle::{LabeledData, OracleData, OracleModeler};

use crate::commands::open_store;
use crate::io::{alternating_split, read_frame, split_labels, validate_csv_file};

pub fn run(matches: &ArgMatches) -> Result<()> {
    let class: &String = matches.get_one("teacher_class").unwrap();
    let version: &String = matches.get_one("teacher_version").unwrap();
    let input: &String = matches.get_one("input").unwrap();
    validate_csv_file(input)?;

    let store = open_store(matches.get_one("store"))?;
    let teacher_version = if version == "latest" {
        store.latest(class)?
    } else {
        version.clone()
    };
    let teacher = store
        .load_teacher(class, &teacher_version)
        .with_context(|| format!("failed to load teacher {}::{}", class, teacher_version))?;
    let labels = teacher.labels();
    log::info!(
        "[Oracular::Oraclize] teacher {}::{} with labels {:?}",
        class,
        teacher_version,
        labels
    );

    let unlabeled = read_frame(input)?;
    log::info!(
        "[Oracular::Oraclize] {} rows x {} features from {}",
        unlabeled.nrows(),
        unlabeled.ncols(),
        input
    );

    let mut modeler = OracleModeler::new(teacher);
    if let Some(features) = matches.get_one::<String>("features") {
        let names: Vec<String> = features.split(',').map(|s| s.trim().to_string()).collect();
        modeler = modeler.with_teacher_features(names);
    }
    let students: &String = matches.get_one("students").unwrap();
    for kind in students.split(',') {
        modeler = match kind.trim() {
            "logistic" => modeler.add_student(StudentModeler::logistic()),
            "forest" => modeler.add_student(StudentModeler::forest()),
            other => bail!("unknown student kind '{}'; use logistic or forest", other),
        };
    }

    let ensembler: &String = matches.get_one("ensembler").unwrap();
    modeler = match ensembler.as_str() {
        "majority" => modeler.with_ensembler(EnsemblerModeler::majority_vote()),
        "learned" => modeler.with_ensembler(EnsemblerModeler::learned()),
        other => bail!("unknown ensembler '{}'; use majority or learned", other),
    };
    modeler = modeler.inject_features(matches.get_flag("inject_x"));

    if let Some(thresholds) = matches.get_many::<String>("threshold") {
        for spec in thresholds {
            let (label, cutoff) = spec
                .split_once('=')
                .with_context(|| format!("threshold '{}' is not label=cutoff", spec))?;
            let cutoff: f32 = cutoff
                .parse()
                .with_context(|| format!("threshold cutoff '{}' is not numeric", cutoff))?;
            modeler = modeler.with_fuzzy_threshold(label.trim(), cutoff);
        }
    }

    let mut data = OracleData::unlabeled(unlabeled);
    if let Some(labeled_input) = matches.get_one::<String>("labeled_input") {
        validate_csv_file(labeled_input)?;
        let table = read_frame(labeled_input)?;
        let (train, test) = alternating_split(&table);
        let (x_train, y_train) = split_labels(&train, &labels)?;
        let (x_test, y_test) = split_labels(&test, &labels)?;
        log::info!(
            "[Oracular::Oraclize] labeled split: {} train / {} test rows",
            x_train.nrows(),
            x_test.nrows()
        );
        data = data.with_labeled(LabeledData {
            x_train,
            y_train,
            x_test,
            y_test,
        });
    }

    let mut oracle = modeler.build_model(&data)?;
    if let Some(labeled) = data.labeled.as_ref() {
        // A failed evaluation never discards a successful build.
        match modeler.evaluate(&mut oracle, labeled) {
            Ok(()) => log::info!("[Oracular::Oraclize] metrics:\n{}", oracle.metrics),
            Err(e) => log::warn!("[Oracular::Oraclize] evaluation failed: {}", e),
        }
    }

    let minted = store.persist_oracle(&mut oracle, None)?;
    println!("{}", minted);
    Ok(())
}
