//! Declarative chart configurations.
//!
//! The browser-side charting library is treated as an opaque renderer: this
//! module only produces the `{type, data, options}` documents it consumes.
//! Labels and values are passed through as given, so a length mismatch is
//! left to the renderer rather than rejected here.

use serde::Serialize;
use serde_json::{json, Value};

use crate::types::{MetricPoint, MetricSeries};

pub mod palette {
    pub const PRIMARY: &str = "#0b74d1";
    pub const PRIMARY_LIGHT: &str = "rgba(11,116,209,0.12)";
    pub const ACCENT1: &str = "#1e90ff";
    pub const ACCENT2: &str = "#66b2ff";
    pub const CORAL: &str = "#ff7f50";
    pub const YELLOW: &str = "#ffcc00";

    pub fn doughnut() -> Vec<String> {
        [PRIMARY, ACCENT1, CORAL, YELLOW, ACCENT2]
            .iter()
            .map(|c| c.to_string())
            .collect()
    }
}

const DEFAULT_TENSION: f64 = 0.25;
const DEFAULT_POINT_RADIUS: f64 = 3.0;
const DEFAULT_BORDER_RADIUS: f64 = 6.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Line,
    Bar,
    Doughnut,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LegendPosition {
    Top,
    Left,
    #[default]
    Bottom,
    Right,
}

/// One colour for the whole dataset, or one per data point.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Colors {
    Single(String),
    PerPoint(Vec<String>),
}

impl From<&str> for Colors {
    fn from(c: &str) -> Self {
        Colors::Single(c.to_string())
    }
}

/// Every option the chart constructors understand. `None` means "use the
/// constructor's default".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChartOptions {
    pub label: Option<String>,
    pub border_color: Option<String>,
    pub background_color: Option<Colors>,
    pub tension: Option<f64>,
    pub point_radius: Option<f64>,
    pub fill: Option<bool>,
    pub x_title: Option<String>,
    pub y_title: Option<String>,
    pub show_legend: Option<bool>,
    pub legend_position: Option<LegendPosition>,
    pub border_radius: Option<f64>,
}

impl ChartOptions {
    /// Fill every unset option from `defaults`.
    pub fn or(self, defaults: ChartOptions) -> ChartOptions {
        ChartOptions {
            label: self.label.or(defaults.label),
            border_color: self.border_color.or(defaults.border_color),
            background_color: self.background_color.or(defaults.background_color),
            tension: self.tension.or(defaults.tension),
            point_radius: self.point_radius.or(defaults.point_radius),
            fill: self.fill.or(defaults.fill),
            x_title: self.x_title.or(defaults.x_title),
            y_title: self.y_title.or(defaults.y_title),
            show_legend: self.show_legend.or(defaults.show_legend),
            legend_position: self.legend_position.or(defaults.legend_position),
            border_radius: self.border_radius.or(defaults.border_radius),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
    pub label: String,
    pub data: Vec<Option<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub border_color: Option<String>,
    pub background_color: Colors,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tension: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub point_radius: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fill: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub border_radius: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartData {
    pub labels: Vec<String>,
    pub datasets: Vec<Dataset>,
}

/// A chart bound to a canvas element id.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartConfig {
    #[serde(skip)]
    pub target: String,
    #[serde(rename = "type")]
    pub kind: ChartKind,
    pub data: ChartData,
    pub options: Value,
}

impl ChartConfig {
    pub fn labels(&self) -> &[String] {
        &self.data.labels
    }

    pub fn values(&self) -> &[Option<f64>] {
        self.data.datasets.first().map(|d| d.data.as_slice()).unwrap_or(&[])
    }
}

fn collect<L, V>(labels: L, values: V) -> (Vec<String>, Vec<Option<f64>>)
where
    L: IntoIterator,
    L::Item: Into<String>,
    V: IntoIterator,
    V::Item: Into<Option<f64>>,
{
    (
        labels.into_iter().map(Into::into).collect(),
        values.into_iter().map(Into::into).collect(),
    )
}

pub fn line_chart<L, V>(target: &str, labels: L, values: V, opts: &ChartOptions) -> ChartConfig
where
    L: IntoIterator,
    L::Item: Into<String>,
    V: IntoIterator,
    V::Item: Into<Option<f64>>,
{
    let (labels, data) = collect(labels, values);
    let x_title = opts.x_title.clone().unwrap_or_default();
    let y_title = opts.y_title.clone().unwrap_or_default();

    ChartConfig {
        target: target.to_string(),
        kind: ChartKind::Line,
        data: ChartData {
            labels,
            datasets: vec![Dataset {
                label: opts.label.clone().unwrap_or_default(),
                data,
                border_color: Some(opts.border_color.clone().unwrap_or_else(|| palette::PRIMARY.to_string())),
                background_color: opts
                    .background_color
                    .clone()
                    .unwrap_or_else(|| palette::PRIMARY_LIGHT.into()),
                tension: Some(opts.tension.unwrap_or(DEFAULT_TENSION)),
                // A zero radius counts as unset.
                point_radius: Some(
                    opts.point_radius
                        .filter(|r| *r != 0.0)
                        .unwrap_or(DEFAULT_POINT_RADIUS),
                ),
                fill: Some(opts.fill.unwrap_or(true)),
                border_radius: None,
            }],
        },
        options: json!({
            "responsive": true,
            "maintainAspectRatio": false,
            "scales": {
                "x": { "title": { "display": !x_title.is_empty(), "text": x_title } },
                "y": { "title": { "display": !y_title.is_empty(), "text": y_title } }
            },
            "plugins": { "legend": { "display": opts.show_legend.unwrap_or(false) } }
        }),
    }
}

pub fn bar_chart<L, V>(target: &str, labels: L, values: V, opts: &ChartOptions) -> ChartConfig
where
    L: IntoIterator,
    L::Item: Into<String>,
    V: IntoIterator,
    V::Item: Into<Option<f64>>,
{
    let (labels, data) = collect(labels, values);
    let background_color = opts
        .background_color
        .clone()
        .unwrap_or_else(|| Colors::PerPoint(vec![palette::PRIMARY.to_string(); labels.len()]));

    ChartConfig {
        target: target.to_string(),
        kind: ChartKind::Bar,
        data: ChartData {
            labels,
            datasets: vec![Dataset {
                label: opts.label.clone().unwrap_or_default(),
                data,
                border_color: None,
                background_color,
                tension: None,
                point_radius: None,
                fill: None,
                border_radius: Some(opts.border_radius.unwrap_or(DEFAULT_BORDER_RADIUS)),
            }],
        },
        options: json!({
            "responsive": true,
            "maintainAspectRatio": false,
            "scales": {
                "x": { "ticks": { "autoSkip": false } },
                "y": { "beginAtZero": true }
            },
            "plugins": { "legend": { "display": false } }
        }),
    }
}

pub fn doughnut_chart<L, V>(target: &str, labels: L, values: V, opts: &ChartOptions) -> ChartConfig
where
    L: IntoIterator,
    L::Item: Into<String>,
    V: IntoIterator,
    V::Item: Into<Option<f64>>,
{
    let (labels, data) = collect(labels, values);

    ChartConfig {
        target: target.to_string(),
        kind: ChartKind::Doughnut,
        data: ChartData {
            labels,
            datasets: vec![Dataset {
                label: opts.label.clone().unwrap_or_default(),
                data,
                border_color: None,
                background_color: opts
                    .background_color
                    .clone()
                    .unwrap_or_else(|| Colors::PerPoint(palette::doughnut())),
                tension: None,
                point_radius: None,
                fill: None,
                border_radius: None,
            }],
        },
        options: json!({
            "responsive": true,
            "maintainAspectRatio": false,
            "plugins": { "legend": { "position": opts.legend_position.unwrap_or_default() } }
        }),
    }
}

/// The statistic series the site charts, each read from one key of the
/// sample-data document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesChart {
    Temperature,
    Plastic,
    Fishing,
    Bleaching,
    PlasticTypes,
}

impl SeriesChart {
    pub const ALL: [SeriesChart; 5] = [
        SeriesChart::Temperature,
        SeriesChart::Plastic,
        SeriesChart::Fishing,
        SeriesChart::Bleaching,
        SeriesChart::PlasticTypes,
    ];

    pub fn canvas_id(self) -> &'static str {
        match self {
            SeriesChart::Temperature => "tempChart",
            SeriesChart::Plastic => "plasticChart",
            SeriesChart::Fishing => "fishingChart",
            SeriesChart::Bleaching => "bleachChart",
            SeriesChart::PlasticTypes => "plasticTypesChart",
        }
    }

    pub fn from_canvas_id(id: &str) -> Option<SeriesChart> {
        Self::ALL.into_iter().find(|c| c.canvas_id() == id)
    }

    pub fn data_key(self) -> &'static str {
        match self {
            SeriesChart::Temperature => "sea_temperature",
            SeriesChart::Plastic => "plastic_by_region",
            SeriesChart::Fishing => "fishing_pressure",
            SeriesChart::Bleaching => "coral_bleaching_by_year",
            SeriesChart::PlasticTypes => "plastic_types",
        }
    }

    fn default_options(self) -> ChartOptions {
        match self {
            SeriesChart::Temperature => ChartOptions {
                label: Some("Sea surface temperature (°C)".into()),
                x_title: Some("Year".into()),
                y_title: Some("°C".into()),
                border_color: Some(palette::PRIMARY.into()),
                background_color: Some(palette::PRIMARY_LIGHT.into()),
                ..Default::default()
            },
            SeriesChart::Plastic => ChartOptions {
                label: Some("Plastic (sample tonnes)".into()),
                ..Default::default()
            },
            SeriesChart::Fishing => ChartOptions {
                label: Some("Fishing pressure".into()),
                background_color: Some(Colors::PerPoint(palette::doughnut())),
                ..Default::default()
            },
            SeriesChart::Bleaching => ChartOptions {
                label: Some("Coral bleaching events (sample)".into()),
                x_title: Some("Year".into()),
                y_title: Some("Events".into()),
                ..Default::default()
            },
            SeriesChart::PlasticTypes => ChartOptions {
                label: Some("Plastic debris by type (%)".into()),
                ..Default::default()
            },
        }
    }

    /// Extract this chart's series from `data`, or from `fallback` when the
    /// key is absent.
    pub fn series(self, data: &Value, fallback: &Value) -> MetricSeries {
        let rows = data
            .get(self.data_key())
            .and_then(Value::as_array)
            .or_else(|| fallback.get(self.data_key()).and_then(Value::as_array));

        let Some(rows) = rows else {
            return MetricSeries::default();
        };

        rows.iter()
            .map(|row| match self {
                SeriesChart::Temperature => MetricPoint {
                    label: year_label(row.get("date")),
                    value: to_number(row.get("value")),
                },
                SeriesChart::Plastic | SeriesChart::Fishing => MetricPoint {
                    label: text(row.get("region")),
                    value: to_number(row.get("value")),
                },
                SeriesChart::Bleaching => MetricPoint {
                    label: text(first_truthy(row, &["year", "date"])),
                    value: first_truthy(row, &["count", "value"]).map_or(Some(0.0), |v| to_number(Some(v))),
                },
                SeriesChart::PlasticTypes => MetricPoint {
                    label: text(row.get("type")),
                    value: to_number(row.get("value")),
                },
            })
            .collect()
    }

    pub fn build(self, data: &Value, fallback: &Value, overrides: &ChartOptions) -> ChartConfig {
        let series = self.series(data, fallback);
        let opts = overrides.clone().or(self.default_options());
        let target = self.canvas_id();

        match self {
            SeriesChart::Temperature | SeriesChart::Bleaching => {
                line_chart(target, series.labels(), series.values(), &opts)
            }
            SeriesChart::Plastic => bar_chart(target, series.labels(), series.values(), &opts),
            SeriesChart::Fishing | SeriesChart::PlasticTypes => {
                doughnut_chart(target, series.labels(), series.values(), &opts)
            }
        }
    }
}

fn is_truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn first_truthy<'a>(row: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().filter_map(|k| row.get(*k)).find(|v| is_truthy(v))
}

/// Numeric coercion: numbers pass, numeric strings parse, blanks, null
/// and false are zero, everything else is missing.
fn to_number(v: Option<&Value>) -> Option<f64> {
    match v? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) if s.trim().is_empty() => Some(0.0),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Null => Some(0.0),
        Value::Array(_) | Value::Object(_) => None,
    }
}

fn text(v: Option<&Value>) -> String {
    match v {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

/// `"2015-01-01"` -> `"2015"`; anything not shaped like an ISO date is
/// returned as-is.
fn year_label(date: Option<&Value>) -> String {
    let raw = text(date);
    let year = raw.split(['-', 'T']).next().unwrap_or_default();
    if year.len() == 4 && year.chars().all(|c| c.is_ascii_digit()) {
        year.to_string()
    } else {
        raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fallback;

    #[test]
    fn fallback_temperature_has_ten_points() {
        let fb = fallback::sample_data();
        let chart = SeriesChart::Temperature.build(&json!({}), &fb, &ChartOptions::default());

        assert_eq!(chart.kind, ChartKind::Line);
        assert_eq!(chart.target, "tempChart");
        assert_eq!(chart.labels().len(), 10);
        assert_eq!(chart.values().len(), 10);
        assert_eq!(chart.labels()[0], "2015");
        assert_eq!(chart.values()[9], Some(18.3));
    }

    #[test]
    fn mismatched_lengths_pass_through() {
        let chart = line_chart("c", ["a", "b"], [1.0, 2.0, 3.0], &ChartOptions::default());
        assert_eq!(chart.labels().len(), 2);
        assert_eq!(chart.values().len(), 3);

        let bar = bar_chart("c", ["a", "b"], [1.0, 2.0, 3.0], &ChartOptions::default());
        assert_eq!(bar.values().len(), 3);
        let doughnut = doughnut_chart("c", ["a"], Vec::<f64>::new(), &ChartOptions::default());
        assert!(doughnut.values().is_empty());
    }

    #[test]
    fn line_defaults() {
        let chart = line_chart("c", ["2020"], [1.5], &ChartOptions::default());
        let json = serde_json::to_value(&chart).unwrap();

        assert_eq!(json["type"], "line");
        let ds = &json["data"]["datasets"][0];
        assert_eq!(ds["borderColor"], palette::PRIMARY);
        assert_eq!(ds["backgroundColor"], palette::PRIMARY_LIGHT);
        assert_eq!(ds["tension"], 0.25);
        assert_eq!(ds["pointRadius"], 3.0);
        assert_eq!(ds["fill"], true);
        assert_eq!(json["options"]["scales"]["x"]["title"]["display"], false);
        assert_eq!(json["options"]["plugins"]["legend"]["display"], false);
        assert!(json.get("target").is_none());
    }

    #[test]
    fn line_options_override_defaults() {
        let opts = ChartOptions {
            label: Some("Temp".into()),
            tension: Some(0.0),
            fill: Some(false),
            x_title: Some("Year".into()),
            show_legend: Some(true),
            ..Default::default()
        };
        let json = serde_json::to_value(line_chart("c", ["a"], [1.0], &opts)).unwrap();

        let ds = &json["data"]["datasets"][0];
        assert_eq!(ds["label"], "Temp");
        assert_eq!(ds["tension"], 0.0);
        assert_eq!(ds["fill"], false);
        assert_eq!(json["options"]["scales"]["x"]["title"]["text"], "Year");
        assert_eq!(json["options"]["scales"]["x"]["title"]["display"], true);
        assert_eq!(json["options"]["plugins"]["legend"]["display"], true);
    }

    #[test]
    fn zero_point_radius_keeps_default() {
        let zero = ChartOptions {
            point_radius: Some(0.0),
            ..Default::default()
        };
        let json = serde_json::to_value(line_chart("c", ["a"], [1.0], &zero)).unwrap();
        assert_eq!(json["data"]["datasets"][0]["pointRadius"], 3.0);

        let large = ChartOptions {
            point_radius: Some(5.0),
            ..Default::default()
        };
        let json = serde_json::to_value(line_chart("c", ["a"], [1.0], &large)).unwrap();
        assert_eq!(json["data"]["datasets"][0]["pointRadius"], 5.0);
    }

    #[test]
    fn bar_colours_one_per_label() {
        let json =
            serde_json::to_value(bar_chart("c", ["a", "b", "c"], [1.0, 2.0, 3.0], &ChartOptions::default()))
                .unwrap();
        let ds = &json["data"]["datasets"][0];
        assert_eq!(ds["backgroundColor"], json!(vec![palette::PRIMARY; 3]));
        assert_eq!(ds["borderRadius"], 6.0);
        assert_eq!(json["options"]["scales"]["y"]["beginAtZero"], true);
        assert!(ds.get("tension").is_none());
    }

    #[test]
    fn doughnut_legend_position() {
        let default = serde_json::to_value(doughnut_chart("c", ["a"], [1.0], &ChartOptions::default())).unwrap();
        assert_eq!(default["options"]["plugins"]["legend"]["position"], "bottom");

        let opts = ChartOptions {
            legend_position: Some(LegendPosition::Right),
            ..Default::default()
        };
        let right = serde_json::to_value(doughnut_chart("c", ["a"], [1.0], &opts)).unwrap();
        assert_eq!(right["options"]["plugins"]["legend"]["position"], "right");
        assert_eq!(right["data"]["datasets"][0]["backgroundColor"].as_array().unwrap().len(), 5);
    }

    #[test]
    fn live_series_takes_precedence() {
        let live = json!({ "plastic_by_region": [{ "region": "Arctic", "value": "12.5" }] });
        let chart = SeriesChart::Plastic.build(&live, &fallback::sample_data(), &ChartOptions::default());
        assert_eq!(chart.labels(), ["Arctic"]);
        assert_eq!(chart.values(), [Some(12.5)]);
    }

    #[test]
    fn bleaching_reads_year_or_date_and_count_or_value() {
        let data = json!({ "coral_bleaching_by_year": [
            { "year": 2015, "count": 40 },
            { "date": "2016", "value": 12 },
            { "year": 2017, "count": 0, "value": 3 },
            { "year": 2018 }
        ]});
        let series = SeriesChart::Bleaching.series(&data, &json!({}));
        assert_eq!(series.labels(), ["2015", "2016", "2017", "2018"]);
        assert_eq!(series.values(), [Some(40.0), Some(12.0), Some(3.0), Some(0.0)]);
    }

    #[test]
    fn odd_values_do_not_panic() {
        let data = json!({ "sea_temperature": [
            { "date": "not a date", "value": "warm" },
            { "value": { "nested": true } },
            { "date": "2019-06-30T00:00:00Z", "value": null }
        ]});
        let series = SeriesChart::Temperature.series(&data, &json!({}));
        assert_eq!(series.labels(), ["not a date", "", "2019"]);
        assert_eq!(series.values(), [None, None, Some(0.0)]);
    }

    #[test]
    fn missing_everywhere_is_empty() {
        let series = SeriesChart::Fishing.series(&json!({}), &json!({}));
        assert!(series.is_empty());
    }

    #[test]
    fn canvas_ids_round_trip() {
        for chart in SeriesChart::ALL {
            assert_eq!(SeriesChart::from_canvas_id(chart.canvas_id()), Some(chart));
        }
        assert_eq!(SeriesChart::from_canvas_id("map"), None);
    }
}
