//! Read-side queries over the current model generation
//!
//! Every query here runs against the snapshot of the filtered table carried
//! inside a generation, so lookups and predictions always agree with the data
//! the live classifier was trained on.

use crate::dataset;
use crate::error::{ExoError, Result};
use crate::registry::ModelRegistry;
use polars::prelude::*;
use serde::Serialize;
use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;

/// Reduced per-row record used by listings and the explanation prompts.
#[derive(Debug, Clone, Serialize)]
pub struct GeneralEntry {
    pub kepid: Option<i64>,
    pub kepler_name: Option<String>,
    pub kepoi_name: Option<String>,
    /// Display name: kepler_name when present, kepoi_name otherwise
    pub name: Option<String>,
    pub koi_disposition: Option<String>,
    pub koi_period: Option<f64>,
    pub koi_duration: Option<f64>,
    pub koi_depth: Option<f64>,
    pub koi_model_snr: Option<f64>,
    pub koi_steff: Option<f64>,
    pub koi_srad: Option<f64>,
    pub koi_slogg: Option<f64>,
}

/// A classification of one known KOI row.
#[derive(Debug, Clone, Serialize)]
pub struct PredictionResult {
    #[serde(flatten)]
    pub entry: GeneralEntry,
    /// Predicted class label
    pub prediction: String,
    /// Vote fraction per class label
    pub probabilities: BTreeMap<String, f64>,
}

fn cell(df: &DataFrame, name: &str, row: usize) -> Option<AnyValue<'static>> {
    let series = df.column(name).ok()?.as_materialized_series();
    series.get(row).ok().map(|v| v.into_static())
}

fn cell_f64(df: &DataFrame, name: &str, row: usize) -> Option<f64> {
    match cell(df, name, row)? {
        AnyValue::Float64(v) => Some(v),
        AnyValue::Float32(v) => Some(v as f64),
        AnyValue::Int64(v) => Some(v as f64),
        AnyValue::Int32(v) => Some(v as f64),
        AnyValue::Int16(v) => Some(v as f64),
        AnyValue::Int8(v) => Some(v as f64),
        AnyValue::UInt64(v) => Some(v as f64),
        AnyValue::UInt32(v) => Some(v as f64),
        AnyValue::UInt16(v) => Some(v as f64),
        AnyValue::UInt8(v) => Some(v as f64),
        _ => None,
    }
    .filter(|v| v.is_finite())
}

fn cell_i64(df: &DataFrame, name: &str, row: usize) -> Option<i64> {
    match cell(df, name, row)? {
        AnyValue::Int64(v) => Some(v),
        AnyValue::Int32(v) => Some(v as i64),
        AnyValue::Int16(v) => Some(v as i64),
        AnyValue::Int8(v) => Some(v as i64),
        AnyValue::UInt64(v) => i64::try_from(v).ok(),
        AnyValue::UInt32(v) => Some(v as i64),
        AnyValue::Float64(v) if v.is_finite() => Some(v as i64),
        _ => None,
    }
}

fn cell_str(df: &DataFrame, name: &str, row: usize) -> Option<String> {
    match cell(df, name, row)? {
        AnyValue::String(s) => Some(s.to_string()),
        AnyValue::StringOwned(s) => Some(s.to_string()),
        _ => None,
    }
    .filter(|s| !s.is_empty())
}

fn any_value_to_json(value: AnyValue) -> Value {
    match value {
        AnyValue::Null => Value::Null,
        AnyValue::Boolean(b) => Value::Bool(b),
        AnyValue::String(s) => Value::String(s.to_string()),
        AnyValue::StringOwned(s) => Value::String(s.to_string()),
        AnyValue::Int8(v) => Value::Number(v.into()),
        AnyValue::Int16(v) => Value::Number(v.into()),
        AnyValue::Int32(v) => Value::Number(v.into()),
        AnyValue::Int64(v) => Value::Number(v.into()),
        AnyValue::UInt8(v) => Value::Number(v.into()),
        AnyValue::UInt16(v) => Value::Number(v.into()),
        AnyValue::UInt32(v) => Value::Number(v.into()),
        AnyValue::UInt64(v) => Value::Number(v.into()),
        AnyValue::Float32(v) => Number::from_f64(v as f64)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        AnyValue::Float64(v) => Number::from_f64(v).map(Value::Number).unwrap_or(Value::Null),
        other => Value::String(other.to_string()),
    }
}

/// Build the reduced record for one row.
pub fn general_entry_at(df: &DataFrame, row: usize) -> GeneralEntry {
    let kepler_name = cell_str(df, "kepler_name", row);
    let kepoi_name = cell_str(df, "kepoi_name", row);
    let name = kepler_name.clone().or_else(|| kepoi_name.clone());

    GeneralEntry {
        kepid: cell_i64(df, "kepid", row),
        kepler_name,
        kepoi_name,
        name,
        koi_disposition: cell_str(df, "koi_disposition", row),
        koi_period: cell_f64(df, "koi_period", row),
        koi_duration: cell_f64(df, "koi_duration", row),
        koi_depth: cell_f64(df, "koi_depth", row),
        koi_model_snr: cell_f64(df, "koi_model_snr", row),
        koi_steff: cell_f64(df, "koi_steff", row),
        koi_srad: cell_f64(df, "koi_srad", row),
        koi_slogg: cell_f64(df, "koi_slogg", row),
    }
}

/// Reduced records for every row of the table.
pub fn general_entries(df: &DataFrame) -> Vec<GeneralEntry> {
    (0..df.height()).map(|row| general_entry_at(df, row)).collect()
}

/// One row with every column, as a JSON object keyed by column name.
pub fn record_at(df: &DataFrame, row: usize) -> Result<Value> {
    let mut record = Map::new();
    for col in df.get_columns() {
        let value = col
            .as_materialized_series()
            .get(row)
            .map_err(|e| ExoError::DatasetParse(e.to_string()))?;
        record.insert(col.name().to_string(), any_value_to_json(value));
    }
    Ok(Value::Object(record))
}

/// Every row of the table with every column.
pub fn raw_records(df: &DataFrame) -> Result<Vec<Value>> {
    (0..df.height()).map(|row| record_at(df, row)).collect()
}

/// Row indices of every row whose kepid matches. A star can host several
/// KOIs, so one kepid may map to multiple rows.
pub fn find_rows_by_kepid(df: &DataFrame, kepid: i64) -> Result<Vec<usize>> {
    let series = df
        .column("kepid")
        .map_err(|_| ExoError::FeatureNotFound("kepid".to_string()))?
        .as_materialized_series()
        .cast(&DataType::Int64)
        .map_err(|e| ExoError::DatasetParse(e.to_string()))?;
    let ca = series
        .i64()
        .map_err(|e| ExoError::DatasetParse(e.to_string()))?;
    Ok(ca
        .into_iter()
        .enumerate()
        .filter_map(|(i, v)| (v == Some(kepid)).then_some(i))
        .collect())
}

/// Row indices of every row whose kepoi_name matches, ignoring case and
/// surrounding whitespace.
pub fn find_rows_by_kepoi(df: &DataFrame, name: &str) -> Result<Vec<usize>> {
    let wanted = name.trim().to_uppercase();
    let series = df
        .column("kepoi_name")
        .map_err(|_| ExoError::FeatureNotFound("kepoi_name".to_string()))?
        .as_materialized_series()
        .clone();
    let ca = series
        .str()
        .map_err(|e| ExoError::DatasetParse(e.to_string()))?;
    Ok(ca
        .into_iter()
        .enumerate()
        .filter_map(|(i, v)| {
            v.map(|s| s.trim().to_uppercase() == wanted)
                .unwrap_or(false)
                .then_some(i)
        })
        .collect())
}

/// First row whose kepoi_name matches.
pub fn find_row_by_kepoi(df: &DataFrame, name: &str) -> Result<Option<usize>> {
    Ok(find_rows_by_kepoi(df, name)?.into_iter().next())
}

/// Classify the KOI rows carrying a Kepler ID using the current generation.
///
/// Each matching row is reindexed to the generation's feature order, imputed
/// with the training-time means, scaled, and voted on by the live forest.
pub fn predict_by_kepid(registry: &ModelRegistry, kepid: i64) -> Result<Vec<PredictionResult>> {
    let generation = registry.current().ok_or(ExoError::ModelNotTrained)?;
    let df = &generation.dataset;

    let rows = find_rows_by_kepid(df, kepid)?;
    if rows.is_empty() {
        return Err(ExoError::NotFound(format!("no KOI with kepid {}", kepid)));
    }

    let features = dataset::extract_rows(
        df,
        &generation.feature_columns,
        &generation.impute_means,
        &rows,
    )?;
    let scaled = generation.scaler.transform(&features)?;

    let predicted = generation.forest.predict(&scaled)?;
    let proba = generation.forest.predict_proba(&scaled)?;

    rows.iter()
        .enumerate()
        .map(|(i, &row)| {
            let class = predicted[i].round() as usize;
            let prediction = generation.labels.get(class).cloned().ok_or_else(|| {
                ExoError::Training(format!("predicted unknown class index {}", class))
            })?;
            let probabilities: BTreeMap<String, f64> = generation
                .labels
                .iter()
                .enumerate()
                .map(|(j, label)| (label.clone(), proba[[i, j]]))
                .collect();
            Ok(PredictionResult {
                entry: general_entry_at(df, row),
                prediction,
                probabilities,
            })
        })
        .collect()
}

/// Classify one specific row with the current generation. Used by the
/// explanation and image endpoints once they have located a row by name.
pub fn predict_row(registry: &ModelRegistry, row: usize) -> Result<PredictionResult> {
    let generation = registry.current().ok_or(ExoError::ModelNotTrained)?;
    let df = &generation.dataset;

    let features = dataset::extract_rows(
        df,
        &generation.feature_columns,
        &generation.impute_means,
        &[row],
    )?;
    let scaled = generation.scaler.transform(&features)?;

    let predicted = generation.forest.predict(&scaled)?;
    let proba = generation.forest.predict_proba(&scaled)?;

    let class = predicted[0].round() as usize;
    let prediction = generation
        .labels
        .get(class)
        .cloned()
        .ok_or_else(|| ExoError::Training(format!("predicted unknown class index {}", class)))?;

    let probabilities: BTreeMap<String, f64> = generation
        .labels
        .iter()
        .enumerate()
        .map(|(j, label)| (label.clone(), proba[[0, j]]))
        .collect();

    Ok(PredictionResult {
        entry: general_entry_at(df, row),
        prediction,
        probabilities,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::training;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn koi_csv() -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(
            file,
            "kepid,kepoi_name,kepler_name,koi_disposition,koi_period,koi_depth,koi_steff"
        )
        .unwrap();
        writeln!(file, "10797460,K00752.01,Kepler-227 b,CONFIRMED,9.49,615.8,5455").unwrap();
        writeln!(file, "10797461,K00752.02,Kepler-227 c,CONFIRMED,54.42,874.8,5455").unwrap();
        writeln!(file, "10797462,K00753.01,Kepler-228 b,CONFIRMED,2.57,640.0,5500").unwrap();
        writeln!(file, "10811496,K00754.01,,FALSE POSITIVE,1.73,8079.2,6031").unwrap();
        writeln!(file, "10811497,K00755.01,,FALSE POSITIVE,2.20,9100.0,6100").unwrap();
        writeln!(file, "10811498,K00756.01,,FALSE POSITIVE,0.92,7800.0,6000").unwrap();
        file
    }

    fn trained_registry(file: &NamedTempFile) -> ModelRegistry {
        let config = AppConfig {
            dataset_path: file.path().to_path_buf(),
            tree_count: 10,
            max_depth: Some(0),
            random_seed: 42,
            upload_dir: std::env::temp_dir(),
        };
        let registry = ModelRegistry::new();
        let report = training::train_and_publish(&config, &registry);
        assert!(report.success, "{:?}", report.error);
        registry
    }

    #[test]
    fn test_predict_requires_model() {
        let registry = ModelRegistry::new();
        assert!(matches!(
            predict_by_kepid(&registry, 10797460).unwrap_err(),
            ExoError::ModelNotTrained
        ));
    }

    #[test]
    fn test_predict_by_kepid() {
        let file = koi_csv();
        let registry = trained_registry(&file);

        let results = predict_by_kepid(&registry, 10797460).unwrap();
        assert_eq!(results.len(), 1);
        let result = &results[0];
        assert_eq!(result.entry.kepid, Some(10797460));
        assert_eq!(result.entry.name.as_deref(), Some("Kepler-227 b"));
        assert!(result.probabilities.contains_key("CONFIRMED"));
        assert!(result.probabilities.contains_key("FALSE POSITIVE"));
        let total: f64 = result.probabilities.values().sum();
        assert!((total - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_shared_kepid_returns_all_rows() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(
            file,
            "kepid,kepoi_name,kepler_name,koi_disposition,koi_period,koi_depth"
        )
        .unwrap();
        writeln!(file, "7,K00752.01,Kepler-227 b,CONFIRMED,9.49,615.8").unwrap();
        writeln!(file, "7,K00752.02,Kepler-227 c,CONFIRMED,54.42,874.8").unwrap();
        writeln!(file, "8,K00753.01,Kepler-228 b,CONFIRMED,2.57,640.0").unwrap();
        writeln!(file, "9,K00754.01,,FALSE POSITIVE,1.73,8079.2").unwrap();
        writeln!(file, "10,K00755.01,,FALSE POSITIVE,2.20,9100.0").unwrap();
        writeln!(file, "11,K00756.01,,FALSE POSITIVE,0.92,7800.0").unwrap();
        let registry = trained_registry(&file);

        let results = predict_by_kepid(&registry, 7).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].entry.kepoi_name.as_deref(), Some("K00752.01"));
        assert_eq!(results[1].entry.kepoi_name.as_deref(), Some("K00752.02"));
    }

    #[test]
    fn test_unknown_kepid_is_not_found() {
        let file = koi_csv();
        let registry = trained_registry(&file);
        assert!(matches!(
            predict_by_kepid(&registry, 999).unwrap_err(),
            ExoError::NotFound(_)
        ));
    }

    #[test]
    fn test_name_falls_back_to_kepoi() {
        let file = koi_csv();
        let registry = trained_registry(&file);
        let generation = registry.current().unwrap();

        let entries = general_entries(&generation.dataset);
        assert_eq!(entries.len(), 6);
        let fp = entries.iter().find(|e| e.kepid == Some(10811496)).unwrap();
        assert!(fp.kepler_name.is_none());
        assert_eq!(fp.name.as_deref(), Some("K00754.01"));
    }

    #[test]
    fn test_name_null_when_both_names_missing() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "kepid,kepoi_name,kepler_name,koi_disposition,koi_period").unwrap();
        writeln!(file, "1,,,CONFIRMED,2.47").unwrap();
        writeln!(file, "2,K00002.01,,FALSE POSITIVE,1.76").unwrap();
        let df = dataset::load_and_filter(file.path()).unwrap();

        let entry = general_entry_at(&df, 0);
        assert!(entry.kepler_name.is_none());
        assert!(entry.kepoi_name.is_none());
        assert!(entry.name.is_none());

        // The display name serializes as null, not as a missing key
        let json = serde_json::to_value(&entry).unwrap();
        assert!(json.as_object().unwrap().contains_key("name"));
        assert!(json["name"].is_null());
    }

    #[test]
    fn test_kepoi_lookup_is_case_insensitive() {
        let file = koi_csv();
        let registry = trained_registry(&file);
        let generation = registry.current().unwrap();

        let row = find_row_by_kepoi(&generation.dataset, "  k00753.01 ").unwrap();
        assert_eq!(row, Some(2));
        assert_eq!(find_row_by_kepoi(&generation.dataset, "K99999.99").unwrap(), None);
    }

    #[test]
    fn test_raw_records_keep_all_columns() {
        let file = koi_csv();
        let registry = trained_registry(&file);
        let generation = registry.current().unwrap();

        let records = raw_records(&generation.dataset).unwrap();
        assert_eq!(records.len(), 6);
        let first = records[0].as_object().unwrap();
        assert_eq!(first["kepid"], serde_json::json!(10797460));
        assert_eq!(first["koi_disposition"], serde_json::json!("CONFIRMED"));
        assert!(first.contains_key("koi_steff"));
    }
}
