use anyhow::Result;
use clap::{Arg, ArgAction, Command, ValueHint};
use log::LevelFilter;

use oracular_cli::commands;

fn store_arg() -> Arg {
    Arg::new("store")
        .long("store")
        .help("Artifact store root (overrides ORACULAR_STORE_ROOT)")
        .value_parser(clap::builder::NonEmptyStringValueParser::new())
        .value_hint(ValueHint::DirPath)
}

fn main() -> Result<()> {
    let default_level = if std::env::var("DEBUG").is_ok() {
        "debug"
    } else {
        "error,oracular=info"
    };
    env_logger::Builder::default()
        .filter_level(LevelFilter::Error)
        .parse_env(env_logger::Env::default().filter_or("ORACULAR_LOG", default_level))
        .init();

    let matches = Command::new("oracular")
        .version(clap::crate_version!())
        .about("Oracular CLI - build, run, and tune knowledge-first oracle models")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("oraclize")
                .about("Build an oracle from a stored teacher and a CSV feature table")
                .arg(
                    Arg::new("teacher_class")
                        .help("Class FQN of the persisted teacher")
                        .required(true),
                )
                .arg(
                    Arg::new("teacher_version")
                        .help("Teacher version, or 'latest'")
                        .required(true),
                )
                .arg(
                    Arg::new("input")
                        .short('i')
                        .long("input")
                        .help("CSV feature table the students distill from")
                        .required(true)
                        .value_parser(clap::builder::NonEmptyStringValueParser::new())
                        .value_hint(ValueHint::FilePath),
                )
                .arg(
                    Arg::new("labeled_input")
                        .long("labeled-input")
                        .help(
                            "CSV with feature columns plus one ground-truth column per \
                             teacher label; required for the learned ensembler",
                        )
                        .value_parser(clap::builder::NonEmptyStringValueParser::new())
                        .value_hint(ValueHint::FilePath),
                )
                .arg(
                    Arg::new("students")
                        .long("students")
                        .help("Comma-separated student kinds (logistic, forest)")
                        .default_value("logistic"),
                )
                .arg(
                    Arg::new("ensembler")
                        .long("ensembler")
                        .help("Ensembler kind")
                        .value_parser(["majority", "learned"])
                        .default_value("majority"),
                )
                .arg(
                    Arg::new("threshold")
                        .long("threshold")
                        .help(
                            "Fuzzy binarization cutoff as label=cutoff; repeatable, \
                             required per label for fuzzy teachers",
                        )
                        .action(ArgAction::Append),
                )
                .arg(
                    Arg::new("features")
                        .long("features")
                        .help(
                            "Comma-separated feature columns the teacher sees; students \
                             still train on all columns",
                        ),
                )
                .arg(
                    Arg::new("inject_x")
                        .long("inject-x")
                        .help("Stack raw features into the learned ensembler's input")
                        .action(ArgAction::SetTrue),
                )
                .arg(store_arg()),
        )
        .subcommand(
            Command::new("predict")
                .about("Run a persisted model over a CSV feature table")
                .arg(
                    Arg::new("model_class")
                        .help("Class FQN of the persisted model")
                        .required(true),
                )
                .arg(
                    Arg::new("model_version")
                        .help("Model version, or 'latest'")
                        .required(true),
                )
                .arg(
                    Arg::new("input")
                        .short('i')
                        .long("input")
                        .help("CSV feature table to predict on")
                        .required(true)
                        .value_parser(clap::builder::NonEmptyStringValueParser::new())
                        .value_hint(ValueHint::FilePath),
                )
                .arg(
                    Arg::new("output")
                        .short('o')
                        .long("output")
                        .help("CSV file the prediction table is written to")
                        .required(true)
                        .value_parser(clap::builder::NonEmptyStringValueParser::new())
                        .value_hint(ValueHint::FilePath),
                )
                .arg(store_arg()),
        )
        .subcommand(
            Command::new("tune-threshold")
                .about("Retune a persisted student's decision threshold on labeled data")
                .arg(
                    Arg::new("student_version")
                        .help("Version of the persisted student")
                        .required(true),
                )
                .arg(
                    Arg::new("input")
                        .short('i')
                        .long("input")
                        .help("CSV with feature columns plus the ground-truth label column")
                        .required(true)
                        .value_parser(clap::builder::NonEmptyStringValueParser::new())
                        .value_hint(ValueHint::FilePath),
                )
                .arg(
                    Arg::new("label")
                        .short('l')
                        .long("label")
                        .help("Name of the ground-truth column")
                        .required(true)
                        .value_parser(clap::builder::NonEmptyStringValueParser::new()),
                )
                .arg(store_arg()),
        )
        .get_matches();

    let result = match matches.subcommand() {
        Some(("oraclize", sub_m)) => commands::oraclize::run(sub_m),
        Some(("predict", sub_m)) => commands::predict::run(sub_m),
        Some(("tune-threshold", sub_m)) => commands::tune::run(sub_m),
        _ => unreachable!("Subcommand is required by CLI configuration"),
    };

    if let Err(e) = result {
        log::error!("{:#}", e);
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
    Ok(())
}
