//! Control Registry - the six page controls and the snapshot they produce
//!
//! Every control change on the page posts a full `ControlSnapshot`. Domains
//! are derived once from the dataset and config.

use crate::config::{label, Config};
use crate::dataset::{Dataset, EnergyType};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Y-axis scale for the bar and scatter charts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScaleMode {
    #[default]
    Linear,
    Log,
}

/// Map projection for the choropleth
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Projection {
    #[default]
    Equirectangular,
    Orthographic,
}

impl Projection {
    pub fn as_str(self) -> &'static str {
        match self {
            Projection::Equirectangular => "equirectangular",
            Projection::Orthographic => "orthographic",
        }
    }
}

/// All control values at the moment a render is triggered
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlSnapshot {
    pub countries: Vec<String>,
    pub energy_type: EnergyType,
    pub sectors: Vec<String>,
    pub year: i32,
    #[serde(default)]
    pub scale: ScaleMode,
    #[serde(default)]
    pub projection: Projection,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SnapshotError {
    #[error("Year {0} is not in the dataset")]
    UnknownYear(i32),
    #[error("No country selected")]
    NoCountries,
    #[error("Unknown country '{0}'")]
    UnknownCountry(String),
    #[error("No sector selected")]
    NoSectors,
    #[error("Unknown sector '{0}'")]
    UnknownSector(String),
    #[error("Selected countries have no data for {0}")]
    YearNotCovered(i32),
}

impl ControlSnapshot {
    /// Check every selection against the dataset domains.
    /// Returns a copy with duplicate selections removed, first-seen order kept.
    pub fn validate(&self, dataset: &Dataset) -> Result<ControlSnapshot, SnapshotError> {
        if !dataset.years().contains(&self.year) {
            return Err(SnapshotError::UnknownYear(self.year));
        }

        let countries = dedup(&self.countries);
        if countries.is_empty() {
            return Err(SnapshotError::NoCountries);
        }
        if let Some(c) = countries.iter().find(|c| !dataset.has_entity(c)) {
            return Err(SnapshotError::UnknownCountry(c.clone()));
        }

        let sectors = dedup(&self.sectors);
        if sectors.is_empty() {
            return Err(SnapshotError::NoSectors);
        }
        if let Some(s) = sectors.iter().find(|s| dataset.sector_index(s).is_none()) {
            return Err(SnapshotError::UnknownSector(s.clone()));
        }

        Ok(ControlSnapshot { countries, sectors, ..self.clone() })
    }
}

fn dedup(values: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(values.len());
    for v in values {
        if !out.contains(v) {
            out.push(v.clone());
        }
    }
    out
}

/// A selectable value with its display label
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ControlOption<T> {
    pub label: String,
    pub value: T,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ControlKind {
    MultiSelect { options: Vec<ControlOption<String>> },
    EnergySelect { options: Vec<ControlOption<EnergyType>> },
    Slider { min: i32, max: i32, step: i32, marks: Vec<i32> },
    ScaleRadio { options: Vec<ControlOption<ScaleMode>> },
    ProjectionRadio { options: Vec<ControlOption<Projection>> },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Control {
    pub id: &'static str,
    pub label: &'static str,
    #[serde(flatten)]
    pub kind: ControlKind,
}

/// The page's controls plus the initial snapshot
#[derive(Debug, Clone, Serialize)]
pub struct ControlRegistry {
    pub title: String,
    pub controls: Vec<Control>,
    pub defaults: ControlSnapshot,
}

impl ControlRegistry {
    pub fn from_dataset(dataset: &Dataset, config: &Config) -> Self {
        let country_options = dataset
            .entities()
            .iter()
            .map(|e| ControlOption { label: e.clone(), value: e.clone() })
            .collect();

        let energy_options = EnergyType::ALL
            .iter()
            .map(|&kind| ControlOption { label: label(dataset.energy_column(kind)), value: kind })
            .collect();

        let sector_options = dataset
            .sectors()
            .iter()
            .map(|s| ControlOption { label: label(s), value: s.clone() })
            .collect();

        let (min, max) = (dataset.first_year(), dataset.last_year());
        let marks = (min..=max).filter(|y| y % 5 == 0).collect();

        let controls = vec![
            Control {
                id: "country_drop",
                label: "Country Choice",
                kind: ControlKind::MultiSelect { options: country_options },
            },
            Control {
                id: "energy_options",
                label: "Energy Choice",
                kind: ControlKind::EnergySelect { options: energy_options },
            },
            Control {
                id: "sector_option",
                label: "Sector Choice",
                kind: ControlKind::MultiSelect { options: sector_options },
            },
            Control {
                id: "year_slider",
                label: "Year Slider",
                kind: ControlKind::Slider { min, max, step: 1, marks },
            },
            Control {
                id: "lin_log",
                label: "Linear Log",
                kind: ControlKind::ScaleRadio {
                    options: vec![
                        ControlOption { label: "Linear".into(), value: ScaleMode::Linear },
                        ControlOption { label: "log".into(), value: ScaleMode::Log },
                    ],
                },
            },
            Control {
                id: "projection",
                label: "Projection",
                kind: ControlKind::ProjectionRadio {
                    options: vec![
                        ControlOption { label: "Equirectangular".into(), value: Projection::Equirectangular },
                        ControlOption { label: "Orthographic".into(), value: Projection::Orthographic },
                    ],
                },
            },
        ];

        let defaults = default_snapshot(dataset, config);
        tracing::debug!(
            "Control registry built: {} countries, {} sectors, years {}..={}",
            dataset.entities().len(),
            dataset.sectors().len(),
            min,
            max
        );

        ControlRegistry { title: config.title.clone(), controls, defaults }
    }

    pub fn default_snapshot(&self) -> ControlSnapshot {
        self.defaults.clone()
    }
}

/// Config defaults narrowed to what the dataset actually contains
fn default_snapshot(dataset: &Dataset, config: &Config) -> ControlSnapshot {
    let mut countries: Vec<String> = config
        .defaults
        .countries
        .iter()
        .filter(|c| dataset.has_entity(c))
        .cloned()
        .collect();
    if countries.is_empty() {
        if let Some(first) = dataset.entities().first() {
            tracing::warn!("Default countries not in dataset, falling back to '{}'", first);
            countries.push(first.clone());
        }
    }

    let mut sectors: Vec<String> = config
        .defaults
        .sectors
        .iter()
        .filter(|s| dataset.sector_index(s).is_some())
        .cloned()
        .collect();
    if sectors.is_empty() {
        sectors.extend(dataset.sectors().first().cloned());
    }

    let year = config
        .defaults
        .year
        .filter(|y| dataset.years().contains(y))
        .unwrap_or_else(|| dataset.first_year());

    ControlSnapshot {
        countries,
        energy_type: EnergyType::Renewable,
        sectors,
        year,
        scale: ScaleMode::Linear,
        projection: Projection::Equirectangular,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::tests::{fixture, test_config};

    fn snapshot() -> ControlSnapshot {
        ControlSnapshot {
            countries: vec!["Portugal".into()],
            energy_type: EnergyType::Renewable,
            sectors: vec!["Hydro".into()],
            year: 2000,
            scale: ScaleMode::Linear,
            projection: Projection::Equirectangular,
        }
    }

    #[test]
    fn test_valid_snapshot_passes() {
        let ds = fixture();
        assert_eq!(snapshot().validate(&ds).unwrap(), snapshot());
    }

    #[test]
    fn test_validation_errors() {
        let ds = fixture();
        let cases = [
            (ControlSnapshot { year: 1999, ..snapshot() }, SnapshotError::UnknownYear(1999)),
            (ControlSnapshot { countries: vec![], ..snapshot() }, SnapshotError::NoCountries),
            (
                ControlSnapshot { countries: vec!["Atlantis".into()], ..snapshot() },
                SnapshotError::UnknownCountry("Atlantis".into()),
            ),
            (ControlSnapshot { sectors: vec![], ..snapshot() }, SnapshotError::NoSectors),
            (
                ControlSnapshot { sectors: vec!["Solar".into()], ..snapshot() },
                SnapshotError::UnknownSector("Solar".into()),
            ),
        ];
        for (snap, expected) in cases {
            assert_eq!(snap.validate(&ds).unwrap_err(), expected);
        }
    }

    #[test]
    fn test_duplicates_collapsed() {
        let ds = fixture();
        let snap = ControlSnapshot {
            countries: vec!["Spain".into(), "Portugal".into(), "Spain".into()],
            ..snapshot()
        };
        assert_eq!(snap.validate(&ds).unwrap().countries, vec!["Spain", "Portugal"]);
    }

    #[test]
    fn test_snapshot_json_uses_named_enums() {
        let json = r#"{"countries":["Portugal"],"energy_type":"non_renewable","sectors":["Hydro"],"year":2001,"scale":"log","projection":"orthographic"}"#;
        let snap: ControlSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(snap.energy_type, EnergyType::NonRenewable);
        assert_eq!(snap.scale, ScaleMode::Log);
        assert_eq!(snap.projection, Projection::Orthographic);

        let bad = r#"{"countries":["Portugal"],"energy_type":"renewable","sectors":["Hydro"],"year":2001,"scale":1}"#;
        assert!(serde_json::from_str::<ControlSnapshot>(bad).is_err());
    }

    #[test]
    fn test_registry_lists_six_controls() {
        let registry = ControlRegistry::from_dataset(&fixture(), &test_config());
        let ids: Vec<_> = registry.controls.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec!["country_drop", "energy_options", "sector_option", "year_slider", "lin_log", "projection"]);

        match &registry.controls[3].kind {
            ControlKind::Slider { min, max, marks, .. } => {
                assert_eq!((*min, *max), (2000, 2001));
                assert_eq!(marks, &vec![2000]);
            }
            other => panic!("unexpected kind {:?}", other),
        }
        match &registry.controls[1].kind {
            ControlKind::EnergySelect { options } => assert_eq!(options[1].label, "Total Not Renewable"),
            other => panic!("unexpected kind {:?}", other),
        }
    }

    #[test]
    fn test_default_snapshot() {
        let registry = ControlRegistry::from_dataset(&fixture(), &test_config());
        let defaults = registry.default_snapshot();
        assert_eq!(defaults, snapshot());
        assert!(defaults.validate(&fixture()).is_ok());
    }

    #[test]
    fn test_default_falls_back_to_first_entity() {
        let mut config = test_config();
        config.defaults.countries = vec!["Atlantis".into()];
        config.defaults.year = Some(2001);
        let registry = ControlRegistry::from_dataset(&fixture(), &config);
        assert_eq!(registry.defaults.countries, vec!["Portugal"]);
        assert_eq!(registry.defaults.year, 2001);
    }
}
