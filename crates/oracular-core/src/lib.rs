//! oracular-core: knowledge-first predictive models.
//!
//! This crate builds "oracle" models by distillation: a hand-authored
//! teacher (a rule predicate or a Mamdani fuzzy controller) pseudo-labels
//! unlabeled data, statistical students learn to reproduce each teacher
//! label, and a per-label ensembler arbitrates between teacher and
//! students at prediction time. Built oracles persist recursively through
//! a pluggable artifact store with versioned, manifest-carrying artifacts.
//!
//! The design favors small, testable modules: dense labeled frames for all
//! inter-component I/O, plain serde structs for every learned model, and
//! trait seams at prediction (`models::Model`) and storage
//! (`store::ArtifactStore`).
pub mod error;
pub mod frame;
pub mod fuzzy;
pub mod metrics;
pub mod models;
pub mod namespace;
pub mod oracle;
pub mod preprocessing;
pub mod record;
pub mod store;
