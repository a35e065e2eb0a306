//! Hotspot map: GeoJSON point features grouped into one toggleable marker
//! layer per category, with popups, a legend and a fitted viewport.
//!
//! The output is a `MapView` document for the browser tile/map library.

use geo::{BoundingRect, MultiPoint, Point};
use geojson::{Feature, FeatureCollection, Value as GeometryValue};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, error, warn};

use crate::config::MapConfig;
use crate::html::{capitalize, escape};

const UNKNOWN_CATEGORY: &str = "unknown";
const BOUNDS_PADDING: f64 = 0.25;
const OSM_ATTRIBUTION: &str = "&copy; OpenStreetMap contributors";

/// Something that can answer whether an element id exists on the page.
pub trait ElementLookup {
    fn has_element(&self, id: &str) -> bool;
}

pub fn hotspot_color(category: &str) -> &'static str {
    match category.to_lowercase().as_str() {
        "plastic" => "#ff7f50",
        "bleaching" => "#ffcc00",
        "fishing" => "#1e90ff",
        "pollution" => "#8a2be2",
        _ => "#3388ff",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TileLayer {
    pub url: String,
    pub max_zoom: u8,
    pub attribution: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IconSpec {
    pub icon_url: String,
    pub icon_size: [u32; 2],
    pub icon_anchor: [f64; 2],
    pub popup_anchor: [f64; 2],
    pub class_name: String,
}

impl IconSpec {
    fn new(url: &str, size: [u32; 2]) -> Self {
        let (w, h) = (size[0] as f64, size[1] as f64);
        IconSpec {
            icon_url: url.to_string(),
            icon_size: size,
            icon_anchor: [w / 2.0, h],
            popup_anchor: [0.0, -h / 2.0],
            class_name: "sdg-marker-icon".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CircleStyle {
    pub radius: f64,
    pub fill_color: String,
    pub color: String,
    pub weight: u32,
    pub opacity: f64,
    pub fill_opacity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum MarkerStyle {
    Icon(IconSpec),
    Circle(CircleStyle),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Marker {
    /// `[lat, lon]`
    pub lat_lng: [f64; 2],
    pub style: MarkerStyle,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub popup: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayerGroup {
    pub category: String,
    pub markers: Vec<Marker>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayerToggle {
    pub label: String,
    pub category: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayerControl {
    pub collapsed: bool,
    pub overlays: Vec<LayerToggle>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LegendEntry {
    pub label: String,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Legend {
    pub position: String,
    pub entries: Vec<LegendEntry>,
}

impl Legend {
    fn new(categories: &[String]) -> Self {
        Legend {
            position: "bottomright".to_string(),
            entries: categories
                .iter()
                .map(|c| LegendEntry {
                    label: capitalize(c),
                    color: hotspot_color(c).to_string(),
                })
                .collect(),
        }
    }

    pub fn to_html(&self) -> String {
        let mut html = String::from(
            r#"<div class="sdg-legend p-2"><strong style="display:block;margin-bottom:6px;">Legend</strong>"#,
        );
        for entry in &self.entries {
            html.push_str(&format!(
                r#"<div style="display:flex;align-items:center;gap:8px;margin-bottom:6px;"><span style="display:inline-block;width:14px;height:14px;border-radius:3px;background:{};border:1px solid #fff;"></span><span>{}</span></div>"#,
                entry.color,
                escape(&entry.label)
            ));
        }
        html.push_str("</div>");
        html
    }
}

/// `[lat, lon]` corners.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Bounds {
    pub south_west: [f64; 2],
    pub north_east: [f64; 2],
}

impl Bounds {
    /// Grow each side by `ratio` of the box's extent.
    pub fn pad(self, ratio: f64) -> Bounds {
        let lat_buf = (self.north_east[0] - self.south_west[0]).abs() * ratio;
        let lon_buf = (self.north_east[1] - self.south_west[1]).abs() * ratio;
        Bounds {
            south_west: [self.south_west[0] - lat_buf, self.south_west[1] - lon_buf],
            north_east: [self.north_east[0] + lat_buf, self.north_east[1] + lon_buf],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapView {
    pub container_id: String,
    pub center: [f64; 2],
    pub zoom: u8,
    pub scroll_wheel_zoom: bool,
    pub tile_layer: TileLayer,
    pub layers: Vec<LayerGroup>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub layer_control: Option<LayerControl>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub legend: Option<Legend>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fit_bounds: Option<Bounds>,
}

/// Set up the base map. Returns `None` if the page has no container for
/// it or the tile source is unusable.
pub fn init_map(page: &impl ElementLookup, opts: &MapConfig) -> Option<MapView> {
    if !page.has_element(&opts.map_id) {
        warn!(map_id = %opts.map_id, "map element not found");
        return None;
    }

    if !["{z}", "{x}", "{y}"].iter().all(|p| opts.tile_url.contains(p)) {
        error!(tile_url = %opts.tile_url, "map init failed: tile source is not a {{z}}/{{x}}/{{y}} template");
        return None;
    }

    Some(MapView {
        container_id: opts.map_id.clone(),
        center: opts.initial_view,
        zoom: opts.initial_zoom,
        scroll_wheel_zoom: true,
        tile_layer: TileLayer {
            url: opts.tile_url.clone(),
            max_zoom: opts.tile_max_zoom,
            attribution: OSM_ATTRIBUTION.to_string(),
        },
        layers: Vec::new(),
        layer_control: None,
        legend: None,
        fit_bounds: None,
    })
}

impl MapView {
    /// Group `collection` into category layers and attach the control,
    /// legend and viewport fit. Replaces any hotspots added earlier.
    pub fn add_hotspots(&mut self, collection: &FeatureCollection, opts: &MapConfig) {
        let groups = group_by_category(&collection.features);

        self.layers = groups
            .iter()
            .map(|(category, features)| LayerGroup {
                category: category.clone(),
                markers: features
                    .iter()
                    .filter_map(|f| marker_for_feature(f, opts))
                    .collect(),
            })
            .collect();

        let categories: Vec<String> = groups.into_iter().map(|(c, _)| c).collect();

        self.layer_control = (categories.len() > 1).then(|| LayerControl {
            collapsed: false,
            overlays: categories
                .iter()
                .map(|c| LayerToggle {
                    // The layers control renders labels as markup.
                    label: escape(&capitalize(c)),
                    category: c.clone(),
                })
                .collect(),
        });
        self.legend = Some(Legend::new(&categories));
        self.fit_bounds = marker_bounds(&self.layers).map(|b| b.pad(BOUNDS_PADDING));

        debug!(
            categories = categories.len(),
            markers = self.layers.iter().map(|l| l.markers.len()).sum::<usize>(),
            "hotspot layers built"
        );
    }
}

/// Partition features by lowercase `type` property, keeping first-seen
/// category order. Features without a type land in `"unknown"`.
pub fn group_by_category(features: &[Feature]) -> Vec<(String, Vec<&Feature>)> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<(String, Vec<&Feature>)> = Vec::new();

    for feature in features {
        let category = property_text(feature, "type")
            .map(|t| t.to_lowercase())
            .unwrap_or_else(|| UNKNOWN_CATEGORY.to_string());

        let slot = *index.entry(category.clone()).or_insert_with(|| {
            groups.push((category, Vec::new()));
            groups.len() - 1
        });
        groups[slot].1.push(feature);
    }

    groups
}

fn marker_for_feature(feature: &Feature, opts: &MapConfig) -> Option<Marker> {
    let coords = match feature.geometry.as_ref().map(|g| &g.value) {
        Some(GeometryValue::Point(position)) if position.len() >= 2 => position,
        _ => return None,
    };
    let lat_lng = [coords[1], coords[0]];

    let kind = property_text(feature, "type")
        .map(|t| t.to_lowercase())
        .unwrap_or_else(|| "default".to_string());

    let style = match opts.icon_map.get(&kind) {
        Some(url) if opts.use_custom_icons => MarkerStyle::Icon(IconSpec::new(url, opts.icon_size)),
        _ => MarkerStyle::Circle(CircleStyle {
            radius: marker_radius(feature),
            fill_color: hotspot_color(&kind).to_string(),
            color: "#ffffff".to_string(),
            weight: 1,
            opacity: 1.0,
            fill_opacity: 0.9,
        }),
    };

    let popup = popup_html(feature.properties.as_ref());
    Some(Marker {
        lat_lng,
        style,
        popup: (!popup.is_empty()).then_some(popup),
    })
}

fn marker_radius(feature: &Feature) -> f64 {
    let requested = match feature.property("_markerRadius") {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    }
    .filter(|r| *r != 0.0)
    .unwrap_or(7.0);
    requested.max(6.0)
}

/// Popup markup from the allow-listed properties, every value escaped.
pub fn popup_html(props: Option<&serde_json::Map<String, Value>>) -> String {
    let Some(props) = props else {
        return String::new();
    };
    let field = |key: &str| props.get(key).and_then(display_value).map(|v| escape(&v));

    let mut lines = Vec::new();
    if let Some(v) = field("type") {
        lines.push(format!("<strong>Type:</strong> {v}"));
    }
    if let Some(v) = field("severity") {
        lines.push(format!("<strong>Severity:</strong> {v}"));
    }
    if let Some(v) = field("date") {
        lines.push(format!("<strong>Date:</strong> {v}"));
    }
    if let Some(v) = field("notes") {
        lines.push(format!(r#"<div style="margin-top:6px;">{v}</div>"#));
    }
    if let Some(v) = field("id") {
        lines.push(format!(r#"<div class="text-muted small mt-1">ID: {v}</div>"#));
    }
    lines.join("<br/>")
}

/// Text for a property value; empty, zero, false and null count as absent.
fn display_value(v: &Value) -> Option<String> {
    match v {
        Value::Null | Value::Bool(false) => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) if n.as_f64() == Some(0.0) => None,
        other => Some(other.to_string()),
    }
}

fn property_text(feature: &Feature, key: &str) -> Option<String> {
    feature.property(key).and_then(display_value)
}

fn marker_bounds(layers: &[LayerGroup]) -> Option<Bounds> {
    let points: MultiPoint<f64> = layers
        .iter()
        .flat_map(|l| &l.markers)
        .map(|m| Point::new(m.lat_lng[1], m.lat_lng[0]))
        .collect();

    let rect = points.bounding_rect()?;
    let (min, max) = (rect.min(), rect.max());
    if ![min.x, min.y, max.x, max.y].iter().all(|v| v.is_finite()) {
        return None;
    }

    Some(Bounds {
        south_west: [min.y, min.x],
        north_east: [max.y, max.x],
    })
}
