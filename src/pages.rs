use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::charts::{ChartConfig, ChartOptions, SeriesChart};
use crate::config::AppConfig;
use crate::data;
use crate::fallback;
use crate::map::{self, ElementLookup, MapView};

pub const DOWNLOAD_BUTTON_ID: &str = "downloadData";

/// A site page and the widget elements it carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub slug: &'static str,
    pub title: &'static str,
    pub elements: &'static [&'static str],
}

pub const PAGES: &[Page] = &[
    Page {
        slug: "index",
        title: "Life Below Water",
        elements: &["tempChart", "map"],
    },
    Page {
        slug: "plastic-pollution",
        title: "Plastic Pollution",
        elements: &["plasticChart", "plasticTypesChart"],
    },
    Page {
        slug: "coral-bleaching",
        title: "Coral Bleaching",
        elements: &["bleachChart", "map"],
    },
    Page {
        slug: "overfishing",
        title: "Overfishing",
        elements: &["fishingChart"],
    },
    Page {
        slug: "ocean-temperature",
        title: "Ocean Temperature",
        elements: &["tempChart"],
    },
    Page {
        slug: "dashboard",
        title: "Dashboard",
        elements: &[
            "tempChart",
            "plasticChart",
            "fishingChart",
            "bleachChart",
            "plasticTypesChart",
            "map",
            DOWNLOAD_BUTTON_ID,
        ],
    },
    Page {
        slug: "about",
        title: "About",
        elements: &[],
    },
];

impl Page {
    pub fn find(slug: &str) -> Option<&'static Page> {
        PAGES.iter().find(|p| p.slug == slug)
    }

    /// `"overfishing.html"` -> the overfishing page.
    pub fn from_legacy(file_name: &str) -> Option<&'static Page> {
        Self::find(file_name.strip_suffix(".html")?)
    }

    pub fn path(&self) -> String {
        match self.slug {
            "index" => "/".to_string(),
            slug => format!("/{slug}"),
        }
    }

    /// File written for this page by the static build.
    pub fn file_name(&self) -> String {
        format!("{}.html", self.slug)
    }

    pub fn charts(&self) -> impl Iterator<Item = SeriesChart> + '_ {
        self.elements.iter().filter_map(|id| SeriesChart::from_canvas_id(id))
    }

    fn needs_sample_data(&self) -> bool {
        self.charts().next().is_some() || self.has_element(DOWNLOAD_BUTTON_ID)
    }
}

impl ElementLookup for Page {
    fn has_element(&self, id: &str) -> bool {
        self.elements.iter().any(|e| *e == id)
    }
}

/// Everything the browser needs to draw a page's widgets.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageModel {
    pub slug: String,
    pub title: String,
    /// Keyed by canvas element id.
    pub charts: BTreeMap<String, ChartConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub map: Option<MapView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub legend_html: Option<String>,
    /// Dataset offered by the download button.
    #[serde(skip)]
    pub dataset: Option<Value>,
}

/// Build one chart into its canvas; `None` when the page has no such canvas.
pub fn init_chart(
    page: &impl ElementLookup,
    chart: SeriesChart,
    data: &Value,
    fallback: &Value,
    overrides: &ChartOptions,
) -> Option<ChartConfig> {
    if !page.has_element(chart.canvas_id()) {
        warn!(canvas = chart.canvas_id(), "canvas not found");
        return None;
    }
    Some(chart.build(data, fallback, overrides))
}

/// Page-ready wiring: load the page's data (live or fallback) and build
/// each chart and the map it declares.
pub async fn bootstrap(page: &Page, config: &AppConfig) -> PageModel {
    let sample_fallback = fallback::sample_data();
    let sample = if page.needs_sample_data() {
        Some(data::load_or(&config.data.sample_data_path(), sample_fallback.clone()).await)
    } else {
        None
    };

    let mut charts = BTreeMap::new();
    if let Some(sample) = &sample {
        for chart in page.charts() {
            if let Some(built) = init_chart(page, chart, sample, &sample_fallback, &ChartOptions::default()) {
                charts.insert(chart.canvas_id().to_string(), built);
            }
        }
    }

    let mut map_view = None;
    if page.has_element(&config.map.map_id) {
        if let Some(mut view) = map::init_map(page, &config.map) {
            let hotspots = data::load_feature_collection_or(
                &config.data.geojson_path(),
                fallback::empty_feature_collection(),
            )
            .await;
            view.add_hotspots(&hotspots, &config.map);
            map_view = Some(view);
        }
    }

    debug!(page = page.slug, charts = charts.len(), map = map_view.is_some(), "page bootstrapped");

    PageModel {
        slug: page.slug.to_string(),
        title: page.title.to_string(),
        charts,
        legend_html: map_view.as_ref().and_then(|m| m.legend.as_ref()).map(|l| l.to_html()),
        map: map_view,
        dataset: sample.filter(|_| page.has_element(DOWNLOAD_BUTTON_ID)),
    }
}
