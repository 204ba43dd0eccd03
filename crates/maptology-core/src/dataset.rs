//! Uploaded tabular data.
//!
//! Cells are kept as trimmed text; each column carries a declared
//! [`DataType`] that is inferred on load and may be changed explicitly.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::io::Read;
use std::path::Path;

use crate::error::{MappingError, Result};
use crate::model::DataType;

/// Value picker shows at most this many distinct values.
pub const VALUE_CHOICE_LIMIT: usize = 5;

const SUMMARY_PREVIEW: usize = 5;

const MISSING_MARKERS: &[&str] = &[
    "", "NA", "N/A", "NaN", "nan", "null", "NULL", "None", "<NA>",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d.%m.%Y"];
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y/%m/%d %H:%M:%S"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub data_type: DataType,
    /// `None` marks a missing cell.
    pub cells: Vec<Option<String>>,
}

impl Column {
    fn present(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().filter_map(|c| c.as_deref())
    }
}

/// Short description of a column for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ColumnSummary {
    Distinct { preview: Vec<String>, total: usize },
    Numeric { min: f64, max: f64, mean: f64 },
    Dates { min: String, max: String },
    Sample(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    columns: Vec<Column>,
    row_count: usize,
}

impl Dataset {
    pub fn from_path(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    /// Parse delimited text with a header row. Leading spaces of every field
    /// are dropped.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(reader);

        let names: Vec<String> = rdr
            .headers()?
            .iter()
            .map(|h| h.trim_start().to_string())
            .collect();
        if names.is_empty() || names.iter().all(|n| n.is_empty()) {
            return Err(MappingError::EmptyDataset);
        }

        let mut cells: Vec<Vec<Option<String>>> = vec![Vec::new(); names.len()];
        let mut row_count = 0;
        for record in rdr.records() {
            let record = record?;
            for (idx, field) in record.iter().enumerate() {
                if let Some(col) = cells.get_mut(idx) {
                    col.push(normalize_cell(field));
                }
            }
            row_count += 1;
        }

        let columns = names
            .into_iter()
            .zip(cells)
            .map(|(name, cells)| {
                let data_type = infer_type(&cells);
                Column {
                    name,
                    data_type,
                    cells,
                }
            })
            .collect();

        let dataset = Self { columns, row_count };
        tracing::debug!(
            rows = dataset.row_count,
            columns = dataset.columns.len(),
            "dataset loaded"
        );
        Ok(dataset)
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    pub fn column(&self, name: &str) -> Result<&Column> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| MappingError::UnknownColumn(name.to_string()))
    }

    fn column_mut(&mut self, name: &str) -> Result<&mut Column> {
        self.columns
            .iter_mut()
            .find(|c| c.name == name)
            .ok_or_else(|| MappingError::UnknownColumn(name.to_string()))
    }

    /// Row by 1-based index.
    pub fn row(&self, index: usize) -> Option<Vec<Option<&str>>> {
        if index == 0 || index > self.row_count {
            return None;
        }
        Some(
            self.columns
                .iter()
                .map(|c| c.cells[index - 1].as_deref())
                .collect(),
        )
    }

    pub fn data_type(&self, column: &str) -> Result<DataType> {
        Ok(self.column(column)?.data_type)
    }

    /// Sorted distinct non-missing values.
    pub fn unique_values(&self, column: &str) -> Result<Vec<String>> {
        let col = self.column(column)?;
        let set: BTreeSet<&str> = col.present().collect();
        Ok(set.into_iter().map(str::to_string).collect())
    }

    /// Values offered by the value picker.
    pub fn value_choices(&self, column: &str) -> Result<Vec<String>> {
        let mut values = self.unique_values(column)?;
        values.truncate(VALUE_CHOICE_LIMIT);
        Ok(values)
    }

    /// Convert a column to `target`. On failure the column is left untouched.
    pub fn change_column_type(&mut self, column: &str, target: DataType) -> Result<()> {
        let col = self.column_mut(column)?;
        let converted = convert_cells(&col.name, &col.cells, target)?;
        col.cells = converted;
        col.data_type = target;
        tracing::debug!(column = %column, data_type = %target, "column type changed");
        Ok(())
    }

    pub fn summary(&self, column: &str) -> Result<ColumnSummary> {
        let col = self.column(column)?;
        let summary = match col.data_type {
            DataType::String | DataType::Categorical => {
                let mut seen = BTreeSet::new();
                let mut ordered = Vec::new();
                for v in col.present() {
                    if seen.insert(v) {
                        ordered.push(v.to_string());
                    }
                }
                let total = ordered.len();
                ordered.truncate(SUMMARY_PREVIEW);
                ColumnSummary::Distinct {
                    preview: ordered,
                    total,
                }
            }
            DataType::Integer | DataType::Float => {
                let nums: Vec<f64> = col.present().filter_map(|v| v.parse().ok()).collect();
                if nums.is_empty() {
                    ColumnSummary::Sample(Vec::new())
                } else {
                    let min = nums.iter().copied().fold(f64::INFINITY, f64::min);
                    let max = nums.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                    let mean = nums.iter().sum::<f64>() / nums.len() as f64;
                    ColumnSummary::Numeric { min, max, mean }
                }
            }
            DataType::Date => {
                // Normalized ISO strings order chronologically.
                let min = col.present().min().unwrap_or_default().to_string();
                let max = col.present().max().unwrap_or_default().to_string();
                ColumnSummary::Dates { min, max }
            }
            DataType::Boolean => ColumnSummary::Sample(
                col.cells
                    .iter()
                    .take(SUMMARY_PREVIEW)
                    .map(|c| c.clone().unwrap_or_else(|| "NA".to_string()))
                    .collect(),
            ),
        };
        Ok(summary)
    }
}

fn normalize_cell(raw: &str) -> Option<String> {
    let v = raw.trim_start();
    if MISSING_MARKERS.contains(&v.trim_end()) {
        None
    } else {
        Some(v.to_string())
    }
}

fn infer_type(cells: &[Option<String>]) -> DataType {
    let mut present = cells.iter().filter_map(|c| c.as_deref()).peekable();
    if present.peek().is_none() {
        // An all-missing column loads as floating point.
        return DataType::Float;
    }
    let values: Vec<&str> = present.collect();
    if values.iter().all(|v| v.trim().parse::<i64>().is_ok()) {
        DataType::Integer
    } else if values.iter().all(|v| v.trim().parse::<f64>().is_ok()) {
        DataType::Float
    } else if values.iter().all(|v| parse_strict_bool(v).is_some()) {
        DataType::Boolean
    } else {
        DataType::String
    }
}

fn parse_strict_bool(v: &str) -> Option<bool> {
    match v.trim().to_ascii_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

fn parse_loose_bool(v: &str) -> Option<bool> {
    match v.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "y" | "t" => Some(true),
        "false" | "0" | "no" | "n" | "f" => Some(false),
        _ => None,
    }
}

fn parse_date(v: &str) -> Option<String> {
    let v = v.trim();
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(v, fmt) {
            return Some(dt.format("%Y-%m-%d %H:%M:%S").to_string());
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(v, fmt) {
            return Some(d.format("%Y-%m-%d").to_string());
        }
    }
    None
}

fn convert_cells(
    column: &str,
    cells: &[Option<String>],
    target: DataType,
) -> Result<Vec<Option<String>>> {
    let fail = |row: usize, value: &str| MappingError::TypeConversion {
        column: column.to_string(),
        target,
        value: value.to_string(),
        row,
    };

    let mut out = Vec::with_capacity(cells.len());
    for (idx, cell) in cells.iter().enumerate() {
        let row = idx + 1;
        let converted = match (target, cell.as_deref()) {
            (DataType::String | DataType::Categorical, c) => c.map(str::to_string),
            (DataType::Date, None) => None,
            (DataType::Date, Some(v)) => parse_date(v),
            (DataType::Integer, None) => return Err(fail(row, "NA")),
            (DataType::Integer, Some(v)) => {
                let t = v.trim();
                if let Ok(i) = t.parse::<i64>() {
                    Some(i.to_string())
                } else {
                    match t.parse::<f64>() {
                        Ok(f) if f.is_finite() && f.fract() == 0.0 => Some(format!("{}", f as i64)),
                        _ => return Err(fail(row, v)),
                    }
                }
            }
            (DataType::Float, None) => None,
            (DataType::Float, Some(v)) => match v.trim().parse::<f64>() {
                Ok(_) => Some(v.trim().to_string()),
                Err(_) => return Err(fail(row, v)),
            },
            (DataType::Boolean, None) => None,
            (DataType::Boolean, Some(v)) => match parse_loose_bool(v) {
                Some(b) => Some(if b { "True" } else { "False" }.to_string()),
                None => return Err(fail(row, v)),
            },
        };
        out.push(converted);
    }
    Ok(out)
}
