//! KOI dataset loading and feature derivation
//!
//! The raw table is a polars DataFrame read from CSV. Before anything else
//! the table is filtered to the two dispositions the binary classifier is
//! trained on. Feature derivation drops the fixed identifier/label/provenance
//! columns, keeps the remaining numeric columns in frame order, and imputes
//! missing cells with the column mean computed over the full derived matrix.
//! The imputation runs before the train/test split, so test rows contribute
//! to the means; the reference pipeline behaves this way and the evaluation
//! numbers are only comparable if it is preserved.

use crate::error::{ExoError, Result};
use ndarray::{Array1, Array2};
use polars::prelude::*;
use std::collections::HashSet;
use std::fs::File;
use std::path::Path;

/// Target column holding the disposition label
pub const LABEL_COLUMN: &str = "koi_disposition";

/// The two classes that participate in training and lookup
pub const PERMITTED_LABELS: [&str; 2] = ["CONFIRMED", "FALSE POSITIVE"];

/// Identifier, label, and provenance columns excluded from the feature
/// matrix. Absence of any of these is not an error.
pub const COLUMNS_TO_DROP: [&str; 18] = [
    "kepid",
    "kepoi_name",
    "kepler_name",
    "koi_disposition",
    "koi_pdisposition",
    "koi_score",
    "koi_comment",
    "koi_vet_stat",
    "koi_vet_date",
    "koi_disp_prov",
    "koi_fittype",
    "koi_parm_prov",
    "koi_limbdark_mod",
    "koi_trans_mod",
    "koi_datalink_dvr",
    "koi_datalink_dvs",
    "koi_tce_delivname",
    "koi_sparprov",
];

/// Numeric features, encoded target, and the imputation statistics that
/// produced them. `columns` is ordered; scaler and classifier are fit against
/// exactly this order and inference must reproduce it.
#[derive(Debug, Clone)]
pub struct FeatureSet {
    pub x: Array2<f64>,
    pub y: Array1<f64>,
    pub columns: Vec<String>,
    pub labels: Vec<String>,
    pub impute_means: Vec<f64>,
}

/// Load the CSV at `path` and keep only rows with a permitted disposition.
pub fn load_and_filter(path: &Path) -> Result<DataFrame> {
    if !path.exists() {
        return Err(ExoError::DatasetNotFound(path.display().to_string()));
    }

    let file = File::open(path)?;
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(1000))
        .into_reader_with_file_handle(file)
        .finish()
        .map_err(|e| ExoError::DatasetParse(e.to_string()))?;

    let disposition = df
        .column(LABEL_COLUMN)
        .map_err(|_| ExoError::DatasetParse(format!("missing '{}' column", LABEL_COLUMN)))?
        .as_materialized_series()
        .clone();
    let disposition = disposition
        .str()
        .map_err(|e| ExoError::DatasetParse(e.to_string()))?;

    let mask: BooleanChunked = disposition
        .into_iter()
        .map(|opt| Some(opt.map(|s| PERMITTED_LABELS.contains(&s)).unwrap_or(false)))
        .collect();

    let filtered = df
        .filter(&mask)
        .map_err(|e| ExoError::DatasetParse(e.to_string()))?;

    if filtered.height() == 0 {
        return Err(ExoError::DatasetEmpty(
            "no rows with a permitted disposition".to_string(),
        ));
    }

    let distinct = distinct_labels(&filtered)?;
    if distinct.len() < 2 {
        return Err(ExoError::DatasetEmpty(format!(
            "only {} distinct label(s) after filtering; stratified split needs two",
            distinct.len()
        )));
    }

    Ok(filtered)
}

fn distinct_labels(df: &DataFrame) -> Result<HashSet<String>> {
    let series = df
        .column(LABEL_COLUMN)
        .map_err(|_| ExoError::FeatureNotFound(LABEL_COLUMN.to_string()))?
        .as_materialized_series()
        .clone();
    let ca = series
        .str()
        .map_err(|e| ExoError::DatasetParse(e.to_string()))?;
    Ok(ca.into_iter().flatten().map(|s| s.to_string()).collect())
}

fn is_numeric(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Float64
            | DataType::Float32
            | DataType::Int64
            | DataType::Int32
            | DataType::Int16
            | DataType::Int8
            | DataType::UInt64
            | DataType::UInt32
            | DataType::UInt16
            | DataType::UInt8
    )
}

/// Derive the numeric feature matrix and encoded target from a filtered
/// table. Labels are sorted, and the target encodes each row as the index of
/// its label in that order.
pub fn derive_features(df: &DataFrame) -> Result<FeatureSet> {
    let columns: Vec<String> = df
        .get_columns()
        .iter()
        .filter(|col| {
            let name = col.name().as_str();
            !COLUMNS_TO_DROP.contains(&name) && is_numeric(col.dtype())
        })
        .map(|col| col.name().to_string())
        .collect();

    if columns.is_empty() {
        return Err(ExoError::DatasetEmpty(
            "no numeric feature columns after dropping excluded columns".to_string(),
        ));
    }

    let n_rows = df.height();
    let n_cols = columns.len();

    // Column values plus the full-matrix mean used for imputation
    let mut col_values: Vec<Vec<Option<f64>>> = Vec::with_capacity(n_cols);
    let mut impute_means: Vec<f64> = Vec::with_capacity(n_cols);
    for name in &columns {
        let series = df
            .column(name)
            .map_err(|_| ExoError::FeatureNotFound(name.clone()))?
            .as_materialized_series()
            .cast(&DataType::Float64)
            .map_err(|e| ExoError::DatasetParse(e.to_string()))?;
        let ca = series
            .f64()
            .map_err(|e| ExoError::DatasetParse(e.to_string()))?;
        impute_means.push(ca.mean().unwrap_or(0.0));
        col_values.push(ca.into_iter().collect());
    }

    let x = Array2::from_shape_fn((n_rows, n_cols), |(r, c)| {
        col_values[c][r].unwrap_or(impute_means[c])
    });

    let label_series = df
        .column(LABEL_COLUMN)
        .map_err(|_| ExoError::FeatureNotFound(LABEL_COLUMN.to_string()))?
        .as_materialized_series()
        .clone();
    let label_ca = label_series
        .str()
        .map_err(|e| ExoError::DatasetParse(e.to_string()))?;
    let row_labels: Vec<String> = label_ca
        .into_iter()
        .map(|opt| opt.unwrap_or("").to_string())
        .collect();

    let mut labels: Vec<String> = row_labels.iter().cloned().collect::<HashSet<_>>().into_iter().collect();
    labels.sort();

    let y = Array1::from_vec(
        row_labels
            .iter()
            .map(|l| labels.iter().position(|c| c == l).unwrap_or(0) as f64)
            .collect(),
    );

    Ok(FeatureSet {
        x,
        y,
        columns,
        labels,
        impute_means,
    })
}

/// Extract the feature values of specific rows, reindexed to `columns` order.
/// Missing cells are filled with the training-time imputation means.
pub fn extract_rows(
    df: &DataFrame,
    columns: &[String],
    impute_means: &[f64],
    indices: &[usize],
) -> Result<Array2<f64>> {
    if columns.len() != impute_means.len() {
        return Err(ExoError::ShapeError {
            expected: format!("{} imputation means", columns.len()),
            actual: format!("{}", impute_means.len()),
        });
    }

    let mut col_values: Vec<Vec<Option<f64>>> = Vec::with_capacity(columns.len());
    for name in columns {
        let series = df
            .column(name)
            .map_err(|_| ExoError::FeatureNotFound(name.clone()))?
            .as_materialized_series()
            .cast(&DataType::Float64)
            .map_err(|e| ExoError::DatasetParse(e.to_string()))?;
        let ca = series
            .f64()
            .map_err(|e| ExoError::DatasetParse(e.to_string()))?;
        col_values.push(ca.into_iter().collect());
    }

    Ok(Array2::from_shape_fn(
        (indices.len(), columns.len()),
        |(r, c)| col_values[c][indices[r]].unwrap_or(impute_means[c]),
    ))
}
