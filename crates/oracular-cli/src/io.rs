//! CSV access for feature tables.
//!
//! All columns are numeric. A column named `row`, when present, becomes the
//! frame's row index and is written back out on output.

use std::path::Path;

use anyhow::{bail, Context, Result};

use oracular_core::frame::Frame;

/// Reserved column name carrying the row index.
pub const INDEX_COLUMN: &str = "row";

pub fn validate_csv_file(path: &str) -> Result<()> {
    let pb = Path::new(path);
    let ext = pb
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_lowercase());
    if ext.as_deref() != Some("csv") {
        bail!("File must have a .csv extension: {}", path);
    }
    if !pb.exists() {
        bail!("File does not exist: {}", path);
    }
    Ok(())
}

/// Read a CSV file with a header row into a frame.
pub fn read_frame(path: &str) -> Result<Frame> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("failed to open {}", path))?;
    let headers: Vec<String> = reader
        .headers()
        .context("missing CSV header row")?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut columns: Vec<Vec<f32>> = vec![Vec::new(); headers.len()];
    let mut index: Vec<u64> = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("bad CSV record in {}", path))?;
        if record.len() != headers.len() {
            bail!(
                "{}: row {} has {} fields, expected {}",
                path,
                line + 2,
                record.len(),
                headers.len()
            );
        }
        for (c, field) in record.iter().enumerate() {
            let field = field.trim();
            if headers[c] == INDEX_COLUMN {
                index.push(field.parse::<u64>().with_context(|| {
                    format!("{}: row {} has non-integer index '{}'", path, line + 2, field)
                })?);
            } else {
                columns[c].push(field.parse::<f32>().with_context(|| {
                    format!(
                        "{}: row {} column '{}' is not numeric ('{}')",
                        path,
                        line + 2,
                        headers[c],
                        field
                    )
                })?);
            }
        }
    }

    let named: Vec<(String, Vec<f32>)> = headers
        .into_iter()
        .zip(columns)
        .filter(|(name, _)| name != INDEX_COLUMN)
        .collect();
    let frame = Frame::from_columns(named)?;
    if index.is_empty() {
        Ok(frame)
    } else {
        Ok(frame.with_index(index)?)
    }
}

/// Write a frame as CSV, index first.
pub fn write_frame(path: &str, frame: &Frame) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("failed to create {}", path))?;

    let mut header = vec![INDEX_COLUMN.to_string()];
    header.extend(frame.columns().iter().cloned());
    writer.write_record(&header)?;

    for (r, id) in frame.index().iter().enumerate() {
        let mut record = vec![id.to_string()];
        record.extend(frame.row(r).iter().map(|v| v.to_string()));
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

/// Split a labeled table into the feature frame and the ground-truth frame
/// given the label column names.
pub fn split_labels(frame: &Frame, labels: &[String]) -> Result<(Frame, Frame)> {
    let features: Vec<String> = frame
        .columns()
        .iter()
        .filter(|c| !labels.contains(c))
        .cloned()
        .collect();
    if features.is_empty() {
        bail!("labeled table has no feature columns besides the labels");
    }
    let x = frame.select(&features)?;
    let y = frame.select(&labels.to_vec())?;
    Ok((x, y))
}

/// Deterministic alternating train/test split by row position.
pub fn alternating_split(frame: &Frame) -> (Frame, Frame) {
    let train: Vec<usize> = (0..frame.nrows()).step_by(2).collect();
    let test: Vec<usize> = (1..frame.nrows()).step_by(2).collect();
    (frame.take_rows(&train), frame.take_rows(&test))
}
