//! oracular-cli: command-line tools for building, running, and tuning
//! oracular models over CSV data and a local or in-memory artifact store.
pub mod commands;
pub mod io;
