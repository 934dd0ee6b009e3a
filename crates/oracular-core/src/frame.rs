//! Columnar feature table used for all inter-component I/O.
//!
//! A `Frame` is two-dimensional labeled data: named `f32` columns over a
//! dense matrix, plus a row index that every operation preserves. It
//! supports column projection, row masking, column-wise concatenation, and
//! conversion to the dense matrix consumed by the learners.

use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{OracleError, Result};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    columns: Vec<String>,
    index: Vec<u64>,
    data: Array2<f32>,
}

impl Frame {
    /// Build a frame from named columns over a dense matrix. The row index
    /// defaults to `0..nrows`.
    pub fn new(columns: Vec<String>, data: Array2<f32>) -> Result<Self> {
        if columns.len() != data.ncols() {
            return Err(OracleError::DimensionMismatch(format!(
                "{} column names for a matrix with {} columns",
                columns.len(),
                data.ncols()
            )));
        }
        let index = (0..data.nrows() as u64).collect();
        Ok(Frame {
            columns,
            index,
            data,
        })
    }

    /// Build a frame from `(name, values)` pairs. All columns must share a
    /// length.
    pub fn from_columns(named: Vec<(String, Vec<f32>)>) -> Result<Self> {
        let nrows = named.first().map(|(_, v)| v.len()).unwrap_or(0);
        let mut columns = Vec::with_capacity(named.len());
        let mut data = Vec::with_capacity(nrows * named.len());
        for (name, values) in &named {
            if values.len() != nrows {
                return Err(OracleError::DimensionMismatch(format!(
                    "column '{}' has {} rows, expected {}",
                    name,
                    values.len(),
                    nrows
                )));
            }
            columns.push(name.clone());
        }
        // Row-major assembly.
        for row in 0..nrows {
            for (_, values) in &named {
                data.push(values[row]);
            }
        }
        let data = Array2::from_shape_vec((nrows, named.len()), data)
            .map_err(|e| OracleError::DimensionMismatch(e.to_string()))?;
        Frame::new(columns, data)
    }

    /// Replace the row index. The length must match the number of rows.
    pub fn with_index(mut self, index: Vec<u64>) -> Result<Self> {
        if index.len() != self.data.nrows() {
            return Err(OracleError::DimensionMismatch(format!(
                "index of length {} for {} rows",
                index.len(),
                self.data.nrows()
            )));
        }
        self.index = index;
        Ok(self)
    }

    pub fn nrows(&self) -> usize {
        self.data.nrows()
    }

    pub fn ncols(&self) -> usize {
        self.data.ncols()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn index(&self) -> &[u64] {
        &self.index
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    /// Extract one column by name.
    pub fn column(&self, name: &str) -> Result<Array1<f32>> {
        let idx = self
            .columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| {
                OracleError::DimensionMismatch(format!("missing column '{}'", name))
            })?;
        Ok(self.data.column(idx).to_owned())
    }

    pub fn row(&self, i: usize) -> ArrayView1<'_, f32> {
        self.data.row(i)
    }

    /// Project onto the named columns, in the given order.
    pub fn select(&self, names: &[String]) -> Result<Frame> {
        let mut indices = Vec::with_capacity(names.len());
        for name in names {
            let idx = self
                .columns
                .iter()
                .position(|c| c == name)
                .ok_or_else(|| {
                    OracleError::DimensionMismatch(format!("missing column '{}'", name))
                })?;
            indices.push(idx);
        }
        let data = self.data.select(Axis(1), &indices);
        Ok(Frame {
            columns: names.to_vec(),
            index: self.index.clone(),
            data,
        })
    }

    /// Keep rows where `mask[i]` is true.
    pub fn filter(&self, mask: &[bool]) -> Result<Frame> {
        if mask.len() != self.nrows() {
            return Err(OracleError::DimensionMismatch(format!(
                "mask of length {} for {} rows",
                mask.len(),
                self.nrows()
            )));
        }
        let keep: Vec<usize> = mask
            .iter()
            .enumerate()
            .filter_map(|(i, &m)| if m { Some(i) } else { None })
            .collect();
        Ok(self.take_rows(&keep))
    }

    /// Select rows by position.
    pub fn take_rows(&self, indices: &[usize]) -> Frame {
        let data = self.data.select(Axis(0), indices);
        let index = indices.iter().map(|&i| self.index[i]).collect();
        Frame {
            columns: self.columns.clone(),
            index,
            data,
        }
    }

    /// Append a single column in place.
    pub fn push_column(&mut self, name: &str, values: Array1<f32>) -> Result<()> {
        if values.len() != self.nrows() {
            return Err(OracleError::DimensionMismatch(format!(
                "column '{}' has {} rows, expected {}",
                name,
                values.len(),
                self.nrows()
            )));
        }
        self.data
            .push_column(values.view())
            .map_err(|e| OracleError::DimensionMismatch(e.to_string()))?;
        self.columns.push(name.to_string());
        Ok(())
    }

    /// Concatenate frames column-wise. Row indexes must agree.
    pub fn hstack(frames: &[&Frame]) -> Result<Frame> {
        let first = frames.first().ok_or_else(|| {
            OracleError::UnsupportedInput("hstack requires at least one frame".to_string())
        })?;
        let mut out = (*first).clone();
        for frame in &frames[1..] {
            if frame.index != out.index {
                return Err(OracleError::DimensionMismatch(
                    "hstack row indexes differ".to_string(),
                ));
            }
            for (pos, name) in frame.columns.iter().enumerate() {
                out.data
                    .push_column(frame.data.column(pos))
                    .map_err(|e| OracleError::DimensionMismatch(e.to_string()))?;
                out.columns.push(name.clone());
            }
        }
        Ok(out)
    }

    /// Dense matrix view of the frame, rows by columns.
    pub fn to_matrix(&self) -> Array2<f32> {
        self.data.clone()
    }
}
