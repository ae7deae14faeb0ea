//! Transform Pipeline - snapshot in, chart specs out
//!
//! Pure function of the snapshot and the read-only dataset:
//! - bar chart: one series per selected country over all its years
//! - choropleth: every entity for the selected year, log-scaled colour
//! - aggregate scatter: selected countries summed per year, one series per sector
//! - two summary strings read from the same per-year sums

use crate::chart::{
    Axis, AxisType, ChoroplethLayer, ColorBar, Figure, Font, Geo, GeoProjection, Layout,
    ScatterSeries, Series, Title, Trace, TRANSPARENT,
};
use crate::config::label;
use crate::controls::{ControlSnapshot, ScaleMode, SnapshotError};
use crate::dataset::{Dataset, EnergyType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Everything one control change produces
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Render {
    pub bar_graph: Figure,
    pub choropleth: Figure,
    pub aggregate_graph: Figure,
    pub energy_1: String,
    pub energy_2: String,
    /// Values that could not be drawn as-is (log of zero, gaps on log axes)
    pub warnings: Vec<String>,
}

/// Per-year sums over the selected countries
#[derive(Debug, Clone, Default, PartialEq)]
struct YearTotals {
    renewable: f64,
    non_renewable: f64,
    sectors: Vec<f64>,
}

impl YearTotals {
    fn energy(&self, kind: EnergyType) -> f64 {
        match kind {
            EnergyType::Renewable => self.renewable,
            EnergyType::NonRenewable => self.non_renewable,
        }
    }
}

/// Run the full pipeline for one snapshot
pub fn render(dataset: &Dataset, snapshot: &ControlSnapshot) -> Result<Render, SnapshotError> {
    let snapshot = snapshot.validate(dataset)?;
    tracing::debug!(
        "Rendering year={} energy={:?} countries={} sectors={}",
        snapshot.year,
        snapshot.energy_type,
        snapshot.countries.len(),
        snapshot.sectors.len()
    );

    let grouped = aggregate_by_year(dataset, &snapshot.countries);
    let totals = grouped
        .get(&snapshot.year)
        .ok_or(SnapshotError::YearNotCovered(snapshot.year))?;
    let (energy_1, energy_2) = summaries(dataset, totals);

    let mut warnings = Vec::new();
    let bar_graph = bar_chart(dataset, &snapshot, &mut warnings);
    let choropleth = choropleth(dataset, &snapshot, &mut warnings);
    let aggregate_graph = aggregate_scatter(dataset, &snapshot, &grouped, &mut warnings);

    Ok(Render { bar_graph, choropleth, aggregate_graph, energy_1, energy_2, warnings })
}

fn axis_type(scale: ScaleMode) -> AxisType {
    match scale {
        ScaleMode::Linear => AxisType::Linear,
        ScaleMode::Log => AxisType::Log,
    }
}

/// Note values a log axis cannot show
fn flag_log_gaps(chart: &str, series: &Series, scale: ScaleMode, warnings: &mut Vec<String>) {
    if scale != ScaleMode::Log {
        return;
    }
    let hidden = series.y.iter().filter(|v| !matches!(v, Some(v) if *v > 0.0)).count();
    if hidden > 0 {
        warnings.push(format!(
            "{}: {} value(s) of '{}' are zero or missing and hidden on the log axis",
            chart, hidden, series.name
        ));
    }
}

fn bar_chart(dataset: &Dataset, snapshot: &ControlSnapshot, warnings: &mut Vec<String>) -> Figure {
    let energy = snapshot.energy_type;
    let mut data = Vec::with_capacity(snapshot.countries.len());

    for country in &snapshot.countries {
        let mut rows: Vec<_> = dataset.rows().iter().filter(|r| &r.entity == country).collect();
        rows.sort_by_key(|r| r.year);

        let series = Series {
            x: rows.iter().map(|r| r.year).collect(),
            y: rows.iter().map(|r| r.energy(energy)).collect(),
            name: country.clone(),
        };
        flag_log_gaps("bar_graph", &series, snapshot.scale, warnings);
        data.push(Trace::Bar(series));
    }

    let layout = Layout {
        title: Title::new(format!(
            "{} energy production from {} until {}",
            label(dataset.energy_column(energy)),
            dataset.first_year(),
            dataset.last_year()
        )),
        yaxis: Some(Axis { title: "Energy production".into(), kind: Some(axis_type(snapshot.scale)) }),
        paper_bgcolor: TRANSPARENT.into(),
        font: Some(Font::light()),
        ..Default::default()
    };

    Figure { data, layout }
}

// Colour is log-scaled whatever the lin/log toggle says.
fn choropleth(dataset: &Dataset, snapshot: &ControlSnapshot, warnings: &mut Vec<String>) -> Figure {
    let energy_label = label(dataset.energy_column(snapshot.energy_type));
    let rows: Vec<_> = dataset.rows().iter().filter(|r| r.year == snapshot.year).collect();

    let mut z = Vec::with_capacity(rows.len());
    for row in &rows {
        match row.energy(snapshot.energy_type) {
            Some(v) if v > 0.0 => z.push(Some(v.ln())),
            other => {
                warnings.push(format!(
                    "choropleth: {} has {} {} in {}, left uncoloured",
                    row.entity,
                    if other.is_some() { "zero" } else { "no" },
                    energy_label,
                    snapshot.year
                ));
                z.push(None);
            }
        }
    }

    let entities: Vec<String> = rows.iter().map(|r| r.entity.clone()).collect();
    let layer = ChoroplethLayer {
        locations: entities.clone(),
        locationmode: "country names".into(),
        z,
        text: entities,
        colorscale: "mint".into(),
        colorbar: ColorBar { title: format!("{} (log scaled)", energy_label) },
        hovertemplate: format!("Country: %{{text}} <br>{}: %{{z}}", energy_label),
        name: String::new(),
    };

    let layout = Layout {
        geo: Some(Geo {
            scope: "world".into(),
            projection: GeoProjection { kind: snapshot.projection.as_str().into() },
            landcolor: "white".into(),
            lakecolor: "white".into(),
            showocean: true,
            oceancolor: "azure".into(),
            bgcolor: "#f9f9f9".into(),
        }),
        title: Title {
            text: format!("World {} Choropleth Map on the year {}", energy_label, snapshot.year),
            x: Some(0.5),
            font: Some(Font::light()),
        },
        paper_bgcolor: TRANSPARENT.into(),
        ..Default::default()
    };

    Figure { data: vec![Trace::Choropleth(layer)], layout }
}

/// Sum every numeric column over `countries`, keyed by year.
/// Absent cells count as zero.
fn aggregate_by_year(dataset: &Dataset, countries: &[String]) -> BTreeMap<i32, YearTotals> {
    let width = dataset.sectors().len();
    let mut grouped: BTreeMap<i32, YearTotals> = BTreeMap::new();

    for row in dataset.rows().iter().filter(|r| countries.contains(&r.entity)) {
        let totals = grouped.entry(row.year).or_insert_with(|| YearTotals {
            sectors: vec![0.0; width],
            ..Default::default()
        });
        totals.renewable += row.renewable.unwrap_or(0.0);
        totals.non_renewable += row.non_renewable.unwrap_or(0.0);
        for (sum, value) in totals.sectors.iter_mut().zip(&row.sectors) {
            *sum += value.unwrap_or(0.0);
        }
    }

    grouped
}

fn aggregate_scatter(
    dataset: &Dataset,
    snapshot: &ControlSnapshot,
    grouped: &BTreeMap<i32, YearTotals>,
    warnings: &mut Vec<String>,
) -> Figure {
    let years: Vec<i32> = grouped.keys().copied().collect();
    let mut data = Vec::with_capacity(snapshot.sectors.len());

    for sector in &snapshot.sectors {
        // Validated against the dataset already
        let Some(idx) = dataset.sector_index(sector) else { continue };
        let series = Series {
            x: years.clone(),
            y: grouped.values().map(|t| Some(t.sectors[idx])).collect(),
            name: label(sector),
        };
        flag_log_gaps("aggregate_graph", &series, snapshot.scale, warnings);
        data.push(Trace::Scatter(ScatterSeries { series, mode: "markers".into() }));
    }

    let y_title = match snapshot.scale {
        ScaleMode::Linear => "Total energy",
        ScaleMode::Log => "Total energy(log scaled)",
    };
    let layout = Layout {
        title: Title::new("Aggregate energy production by Sector"),
        yaxis: Some(Axis { title: y_title.into(), kind: Some(axis_type(snapshot.scale)) }),
        xaxis: Some(Axis { title: "Year".into(), kind: None }),
        paper_bgcolor: TRANSPARENT.into(),
        font: Some(Font::light()),
        ..Default::default()
    };

    Figure { data, layout }
}

fn summaries(dataset: &Dataset, totals: &YearTotals) -> (String, String) {
    let line = |kind: EnergyType| {
        format!("{}: {:.2}", label(dataset.energy_column(kind)), round2(totals.energy(kind)))
    };
    (line(EnergyType::Renewable), line(EnergyType::NonRenewable))
}

/// Round half away from zero to two decimals
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
