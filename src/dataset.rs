//! Dataset Store - immutable energy table loaded once at startup
//!
//! Rows are read from a CSV export of the energy spreadsheet. Each row is one
//! (entity, year) observation carrying the two aggregate energy-type totals and
//! one value per configured sector.

use crate::config::Config;
use std::collections::{BTreeSet, HashSet};
use std::io::Read;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("Failed to read dataset '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Workbook error: {0}")]
    Workbook(#[from] calamine::Error),
    #[error("Workbook has no worksheets")]
    NoSheet,
    #[error("Unsupported dataset format '{0}' (expected csv, xlsx, xlsm, xls or ods)")]
    UnsupportedFormat(String),
    #[error("Missing expected column '{0}'")]
    MissingColumn(String),
    #[error("Row {row}: invalid year '{value}'")]
    InvalidYear { row: usize, value: String },
    #[error("Row {row}: column '{column}' has invalid value '{value}'")]
    InvalidValue { row: usize, column: String, value: String },
    #[error("Duplicate observation for '{entity}' in {year}")]
    Duplicate { entity: String, year: i32 },
    #[error("Dataset contains no rows")]
    Empty,
}

/// Which aggregate total a chart reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnergyType {
    Renewable,
    NonRenewable,
}

impl EnergyType {
    pub const ALL: [EnergyType; 2] = [EnergyType::Renewable, EnergyType::NonRenewable];
}

/// One (entity, year) row
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub entity: String,
    pub year: i32,
    pub renewable: Option<f64>,
    pub non_renewable: Option<f64>,
    /// Indexed like `Dataset::sectors`
    pub sectors: Vec<Option<f64>>,
}

impl Observation {
    pub fn energy(&self, kind: EnergyType) -> Option<f64> {
        match kind {
            EnergyType::Renewable => self.renewable,
            EnergyType::NonRenewable => self.non_renewable,
        }
    }
}

/// Read-only table shared by every render
#[derive(Debug, Clone)]
pub struct Dataset {
    sectors: Vec<String>,
    energy_columns: [String; 2],
    rows: Vec<Observation>,
    entities: Vec<String>,
    years: BTreeSet<i32>,
}

/// Summary returned by `GET /api/dataset`
#[derive(Debug, Clone, serde::Serialize)]
pub struct DatasetSummary {
    pub rows: usize,
    pub entities: usize,
    pub first_year: i32,
    pub last_year: i32,
    pub energy_types: Vec<String>,
    pub sectors: Vec<String>,
}

impl Dataset {
    /// Load the spreadsheet named by the config, picking the reader by extension
    pub fn load(config: &Config) -> Result<Self, DatasetError> {
        let path: &Path = &config.dataset;
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase());
        tracing::info!("Loading dataset from {:?} (format {:?})", path, extension);

        let dataset = match extension.as_deref() {
            Some("csv") => {
                let file = std::fs::File::open(path).map_err(|source| DatasetError::Io {
                    path: path.display().to_string(),
                    source,
                })?;
                Self::from_reader(file, config)?
            }
            Some("xlsx") | Some("xlsm") | Some("xls") | Some("ods") => Self::from_workbook(path, config)?,
            Some(ext) => return Err(DatasetError::UnsupportedFormat(ext.to_string())),
            None => return Err(DatasetError::UnsupportedFormat(String::new())),
        };

        tracing::info!(
            "Dataset loaded: {} rows, {} entities, years {}..={}",
            dataset.rows.len(),
            dataset.entities.len(),
            dataset.first_year(),
            dataset.last_year()
        );
        Ok(dataset)
    }

    /// Parse CSV from any reader; header names are matched against the config
    pub fn from_reader<R: Read>(reader: R, config: &Config) -> Result<Self, DatasetError> {
        let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        let headers: Vec<String> = rdr.headers()?.iter().map(String::from).collect();
        let records = rdr
            .into_records()
            .map(|record| -> Result<Vec<String>, DatasetError> {
                Ok(record?.iter().map(String::from).collect())
            });
        Self::from_table(&headers, records, config)
    }

    /// Read the first worksheet of an Excel/ODS workbook
    pub fn from_workbook(path: &Path, config: &Config) -> Result<Self, DatasetError> {
        use calamine::{open_workbook_auto, Reader};

        let mut workbook = open_workbook_auto(path)?;
        let sheet_name = workbook.sheet_names().first().cloned().ok_or(DatasetError::NoSheet)?;
        tracing::debug!("Reading worksheet '{}'", sheet_name);
        let range = workbook.worksheet_range(&sheet_name)?;

        let mut rows = range.rows();
        let headers: Vec<String> = match rows.next() {
            Some(header) => header.iter().map(cell_text).collect(),
            None => return Err(DatasetError::Empty),
        };
        let records = rows.map(|row| -> Result<Vec<String>, DatasetError> {
            Ok(row.iter().map(cell_text).collect())
        });
        Self::from_table(&headers, records, config)
    }

    /// Shared row parser for every input format. Row numbers count the header as 1.
    fn from_table<I>(headers: &[String], records: I, config: &Config) -> Result<Self, DatasetError>
    where
        I: Iterator<Item = Result<Vec<String>, DatasetError>>,
    {
        let column = |name: &str| -> Result<usize, DatasetError> {
            headers
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| DatasetError::MissingColumn(name.to_string()))
        };

        let entity_idx = column(&config.entity_column)?;
        let year_idx = column(&config.year_column)?;
        let renewable_idx = column(&config.energy_types.renewable)?;
        let non_renewable_idx = column(&config.energy_types.non_renewable)?;
        let sector_idx = config
            .sectors
            .iter()
            .map(|s| column(s))
            .collect::<Result<Vec<_>, _>>()?;
        tracing::debug!("Dataset header resolved: {} columns", headers.len());

        let mut rows = Vec::new();
        let mut seen: HashSet<(String, i32)> = HashSet::new();

        for (i, record) in records.enumerate() {
            let record = record?;
            let row = i + 2;
            let cell = |idx: usize| record.get(idx).map(String::as_str).unwrap_or_default();

            let entity = cell(entity_idx).to_string();
            let year_raw = cell(year_idx);
            let year: i32 = year_raw.parse().map_err(|_| DatasetError::InvalidYear {
                row,
                value: year_raw.to_string(),
            })?;

            if !seen.insert((entity.clone(), year)) {
                return Err(DatasetError::Duplicate { entity, year });
            }

            let value = |idx: usize, name: &str| parse_value(cell(idx), row, name);

            let observation = Observation {
                renewable: value(renewable_idx, &config.energy_types.renewable)?,
                non_renewable: value(non_renewable_idx, &config.energy_types.non_renewable)?,
                sectors: sector_idx
                    .iter()
                    .zip(&config.sectors)
                    .map(|(&idx, name)| value(idx, name))
                    .collect::<Result<Vec<_>, _>>()?,
                entity,
                year,
            };
            rows.push(observation);
        }

        Self::from_rows(
            config.sectors.clone(),
            [config.energy_types.renewable.clone(), config.energy_types.non_renewable.clone()],
            rows,
        )
    }

    /// Build from already-parsed rows. Rows keep their given order.
    pub fn from_rows(
        sectors: Vec<String>,
        energy_columns: [String; 2],
        rows: Vec<Observation>,
    ) -> Result<Self, DatasetError> {
        if rows.is_empty() {
            return Err(DatasetError::Empty);
        }

        let mut entities = Vec::new();
        let mut known = HashSet::new();
        let mut years = BTreeSet::new();
        for row in &rows {
            if known.insert(row.entity.as_str()) {
                entities.push(row.entity.clone());
            }
            years.insert(row.year);
        }

        Ok(Dataset { sectors, energy_columns, rows, entities, years })
    }

    pub fn rows(&self) -> &[Observation] {
        &self.rows
    }

    /// Entity names in first-seen order
    pub fn entities(&self) -> &[String] {
        &self.entities
    }

    pub fn years(&self) -> &BTreeSet<i32> {
        &self.years
    }

    pub fn sectors(&self) -> &[String] {
        &self.sectors
    }

    pub fn has_entity(&self, entity: &str) -> bool {
        self.entities.iter().any(|e| e == entity)
    }

    pub fn sector_index(&self, sector: &str) -> Option<usize> {
        self.sectors.iter().position(|s| s == sector)
    }

    /// Column name of an energy type
    pub fn energy_column(&self, kind: EnergyType) -> &str {
        match kind {
            EnergyType::Renewable => &self.energy_columns[0],
            EnergyType::NonRenewable => &self.energy_columns[1],
        }
    }

    pub fn first_year(&self) -> i32 {
        self.years.iter().next().copied().unwrap_or_default()
    }

    pub fn last_year(&self) -> i32 {
        self.years.iter().next_back().copied().unwrap_or_default()
    }

    pub fn summary(&self) -> DatasetSummary {
        DatasetSummary {
            rows: self.rows.len(),
            entities: self.entities.len(),
            first_year: self.first_year(),
            last_year: self.last_year(),
            energy_types: self.energy_columns.to_vec(),
            sectors: self.sectors.clone(),
        }
    }
}

/// Workbook cell as the text a CSV export would hold
fn cell_text(cell: &calamine::Data) -> String {
    use calamine::Data;
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        // Whole-number floats print without a fraction, so years parse as integers
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        other => other.to_string(),
    }
}

/// Empty cells are absent; anything else must be a finite, non-negative number
fn parse_value(raw: &str, row: usize, column: &str) -> Result<Option<f64>, DatasetError> {
    if raw.is_empty() || raw.eq_ignore_ascii_case("nan") {
        return Ok(None);
    }
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() && v >= 0.0 => Ok(Some(v)),
        _ => Err(DatasetError::InvalidValue {
            row,
            column: column.to_string(),
            value: raw.to_string(),
        }),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::{Defaults, EnergyColumns};
    use std::io::Write;

    pub(crate) fn test_config() -> Config {
        Config {
            sectors: vec!["Hydro".to_string(), "Coal".to_string()],
            energy_types: EnergyColumns {
                renewable: "Total Renewable".to_string(),
                non_renewable: "Total Not Renewable".to_string(),
            },
            defaults: Defaults {
                countries: vec!["Portugal".to_string()],
                sectors: vec!["Hydro".to_string()],
                year: None,
            },
            ..Config::default()
        }
    }

    pub(crate) const CSV: &str = "\
Entity,Year,Total Renewable,Total Not Renewable,Hydro,Coal,Extra
Portugal,2000,10.5,100,4,20,x
Portugal,2001,12.345,90.125,5,18,x
Spain,2000,20,200,6,50,x
Spain,2001,25,180,7,,x
World,2001,0,1000,100,500,x
";

    pub(crate) fn fixture() -> Dataset {
        Dataset::from_reader(CSV.as_bytes(), &test_config()).unwrap()
    }

    #[test]
    fn test_loads_rows_and_domains() {
        let ds = fixture();
        assert_eq!(ds.rows().len(), 5);
        assert_eq!(ds.entities(), &["Portugal", "Spain", "World"]);
        assert_eq!(ds.years().iter().copied().collect::<Vec<_>>(), vec![2000, 2001]);
        assert_eq!(ds.first_year(), 2000);
        assert_eq!(ds.last_year(), 2001);
        assert_eq!(ds.rows()[3].sectors, vec![Some(7.0), None]);
        assert_eq!(ds.rows()[1].energy(EnergyType::Renewable), Some(12.345));
    }

    #[test]
    fn test_missing_column_is_reported() {
        let csv = "Entity,Year,Total Renewable,Total Not Renewable,Hydro\nPortugal,2000,1,2,3\n";
        let err = Dataset::from_reader(csv.as_bytes(), &test_config()).unwrap_err();
        assert!(matches!(err, DatasetError::MissingColumn(ref c) if c == "Coal"));
    }

    #[test]
    fn test_negative_value_rejected() {
        let csv = "Entity,Year,Total Renewable,Total Not Renewable,Hydro,Coal\nPortugal,2000,-1,2,3,4\n";
        let err = Dataset::from_reader(csv.as_bytes(), &test_config()).unwrap_err();
        assert!(matches!(err, DatasetError::InvalidValue { row: 2, .. }));
    }

    #[test]
    fn test_duplicate_entity_year_rejected() {
        let csv = "Entity,Year,Total Renewable,Total Not Renewable,Hydro,Coal\nA,2000,1,2,3,4\nA,2000,1,2,3,4\n";
        let err = Dataset::from_reader(csv.as_bytes(), &test_config()).unwrap_err();
        assert!(matches!(err, DatasetError::Duplicate { year: 2000, .. }));
    }

    #[test]
    fn test_bad_year_rejected() {
        let csv = "Entity,Year,Total Renewable,Total Not Renewable,Hydro,Coal\nA,20x0,1,2,3,4\n";
        let err = Dataset::from_reader(csv.as_bytes(), &test_config()).unwrap_err();
        assert!(matches!(err, DatasetError::InvalidYear { .. }));
    }

    #[test]
    fn test_empty_dataset_rejected() {
        let csv = "Entity,Year,Total Renewable,Total Not Renewable,Hydro,Coal\n";
        let err = Dataset::from_reader(csv.as_bytes(), &test_config()).unwrap_err();
        assert!(matches!(err, DatasetError::Empty));
    }

    #[test]
    fn test_load_csv_file() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        file.write_all(CSV.as_bytes()).unwrap();
        let config = Config { dataset: file.path().to_path_buf(), ..test_config() };
        let ds = Dataset::load(&config).unwrap();
        assert_eq!(ds.summary().entities, 3);
        assert_eq!(ds.summary().rows, 5);
    }

    #[test]
    fn test_load_xlsx_workbook() {
        use rust_xlsxwriter::Workbook;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Data.xlsx");

        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        let header = ["Entity", "Year", "Total Renewable", "Total Not Renewable", "Hydro", "Coal"];
        for (col, name) in header.iter().enumerate() {
            sheet.write_string(0, col as u16, *name).unwrap();
        }
        let rows = [("Portugal", 2000.0, 10.5, 100.0, 4.0), ("Spain", 2001.0, 12.345, 90.0, 6.0)];
        for (i, (entity, year, renewable, non_renewable, hydro)) in rows.iter().enumerate() {
            let r = i as u32 + 1;
            sheet.write_string(r, 0, *entity).unwrap();
            sheet.write_number(r, 1, *year).unwrap();
            sheet.write_number(r, 2, *renewable).unwrap();
            sheet.write_number(r, 3, *non_renewable).unwrap();
            sheet.write_number(r, 4, *hydro).unwrap();
            // Coal left blank
        }
        workbook.save(&path).unwrap();

        let config = Config { dataset: path, ..test_config() };
        let ds = Dataset::load(&config).unwrap();
        assert_eq!(ds.entities(), &["Portugal", "Spain"]);
        assert_eq!(ds.years().iter().copied().collect::<Vec<_>>(), vec![2000, 2001]);
        assert_eq!(ds.rows()[1].energy(EnergyType::Renewable), Some(12.345));
        assert_eq!(ds.rows()[0].sectors, vec![Some(4.0), None]);
    }

    #[test]
    fn test_unknown_extension_rejected() {
        let config = Config { dataset: "energy.json".into(), ..test_config() };
        assert!(matches!(Dataset::load(&config), Err(DatasetError::UnsupportedFormat(ref e)) if e == "json"));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let config = Config { dataset: "/nonexistent/energy.csv".into(), ..test_config() };
        assert!(matches!(Dataset::load(&config), Err(DatasetError::Io { .. })));
    }
}
