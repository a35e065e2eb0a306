use anyhow::{Context, Result};
use maud::{html, Markup, PreEscaped, DOCTYPE};
use rayon::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tracing::{error, info, warn};
use walkdir::WalkDir;

use crate::config::AppConfig;
use crate::data;
use crate::fallback;
use crate::map::ElementLookup;
use crate::members::SignupForm;
use crate::pages::{self, Page, PageModel, DOWNLOAD_BUTTON_ID, PAGES};
use crate::types::Member;

pub const DOWNLOAD_FILE_NAME: &str = "sample-data.json";

const LEAFLET_CSS: &str = "https://unpkg.com/leaflet@1.9.4/dist/leaflet.css";
const LEAFLET_JS: &str = "https://unpkg.com/leaflet@1.9.4/dist/leaflet.js";
const CHART_JS: &str = "https://cdn.jsdelivr.net/npm/chart.js@4";

/// How pages link to each other and to their assets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStyle {
    /// Absolute routes answered by the server.
    Served,
    /// Relative file names inside the built site directory.
    Static,
}

impl LinkStyle {
    fn page(self, page: &Page) -> String {
        match self {
            LinkStyle::Served => page.path(),
            LinkStyle::Static => page.file_name(),
        }
    }

    fn asset(self, path: &str) -> String {
        match self {
            LinkStyle::Served => format!("/assets/{path}"),
            LinkStyle::Static => format!("assets/{path}"),
        }
    }

    fn download(self) -> String {
        match self {
            LinkStyle::Served => format!("/download/{DOWNLOAD_FILE_NAME}"),
            LinkStyle::Static => format!("data/{DOWNLOAD_FILE_NAME}"),
        }
    }
}

fn layout(heading: &str, links: LinkStyle, body: Markup) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="utf-8";
                meta name="viewport" content="width=device-width, initial-scale=1";
                title { (heading) " | Ocean Watch" }
                link rel="stylesheet" href=(LEAFLET_CSS);
                link rel="stylesheet" href=(links.asset("css/style.css"));
                script src=(CHART_JS) {}
                script src=(LEAFLET_JS) {}
            }
            body {
                nav class="navbar" {
                    @for page in PAGES {
                        a class="nav-link" href=(links.page(page)) { (page.title) }
                    }
                    // Sign-up needs the server.
                    @if links == LinkStyle::Served {
                        a class="nav-link" href="/join" { "Join" }
                    }
                }
                main class="container" {
                    h1 { (heading) }
                    (body)
                }
            }
        }
    }
}

/// Embed JSON in a `<script>` block. Every `<` becomes `\u003c`, which is
/// still valid JSON but can neither close the tag nor open a comment.
fn script_json(value: &impl serde::Serialize) -> Result<String> {
    let json = serde_json::to_string(value).context("Failed to serialize page model")?;
    Ok(json.replace('<', "\\u003c"))
}

pub fn page_html(page: &Page, model: &PageModel, links: LinkStyle) -> Result<Markup> {
    let model_json = script_json(model)?;
    let body = html! {
        @for id in page.elements {
            @if model.charts.contains_key(*id) {
                div class="chart-wrap" { canvas id=(id) {} }
            } @else if model.map.as_ref().is_some_and(|m| m.container_id == *id) {
                div id=(id) class="hotspot-map" {}
            }
        }
        @if page.has_element(DOWNLOAD_BUTTON_ID) {
            a id=(DOWNLOAD_BUTTON_ID) class="btn" href=(links.download()) download=(DOWNLOAD_FILE_NAME) {
                "Download data (JSON)"
            }
        }
        script type="application/json" id="page-model" { (PreEscaped(model_json)) }
        script src=(links.asset("js/site.js")) defer {}
    };

    Ok(layout(page.title, links, body))
}

pub fn join_html(form: &SignupForm, messages: &[String]) -> Markup {
    let fields = [
        ("name", "Name", &form.name),
        ("email", "Email", &form.email),
        ("city", "City", &form.city),
        ("country", "Country", &form.country),
        ("interest", "Interest", &form.interest),
    ];
    let body = html! {
        @for message in messages {
            div class="alert alert-danger" { (message) }
        }
        form method="post" action="/join" {
            @for (name, caption, value) in fields {
                label { (caption) " " input name=(name) value=(value); }
            }
            button type="submit" { "Join" }
        }
    };
    layout("Join", LinkStyle::Served, body)
}

pub fn join_success_html() -> Markup {
    let body = html! {
        p {
            "Thanks for joining. "
            a href="/members" { "See who else has signed up." }
        }
    };
    layout("Welcome aboard", LinkStyle::Served, body)
}

pub fn members_html(members: &[Member]) -> Markup {
    let body = html! {
        table class="table" {
            thead {
                tr {
                    th { "Name" } th { "Email" } th { "City" }
                    th { "Country" } th { "Interest" } th { "Joined" }
                }
            }
            tbody {
                @for m in members {
                    tr {
                        td { (m.name) }
                        td { (m.email) }
                        td { (m.city.as_deref().unwrap_or_default()) }
                        td { (m.country.as_deref().unwrap_or_default()) }
                        td { (m.interest.as_deref().unwrap_or_default()) }
                        td { (m.created_at) }
                    }
                }
            }
        }
    };
    layout("Members", LinkStyle::Served, body)
}

/// Pretty JSON offered by the download button.
pub fn dataset_download(dataset: &Value) -> Result<String> {
    serde_json::to_string_pretty(dataset).context("Failed to serialize dataset")
}

/// Render every page and its data files into the configured site directory.
pub async fn build_site(config: &AppConfig) -> Result<()> {
    let out = &config.output.site_dir;
    info!(?out, "building site");

    let mut models = Vec::with_capacity(PAGES.len());
    for page in PAGES {
        models.push((page, pages::bootstrap(page, config).await));
    }

    let sample = data::load_or(&config.data.sample_data_path(), fallback::sample_data()).await;
    let hotspots = data::load_feature_collection_or(
        &config.data.geojson_path(),
        fallback::empty_feature_collection(),
    )
    .await;

    fs::create_dir_all(out.join("data")).context("Failed to create site data directory")?;
    let assets = config.data.assets_path();
    if assets.is_dir() {
        let copied = copy_dir(&assets, &out.join("assets"))?;
        info!(?assets, copied, "assets copied");
    } else {
        warn!(?assets, "assets directory not found, pages will render unstyled");
    }
    fs::write(out.join("data").join(DOWNLOAD_FILE_NAME), dataset_download(&sample)?)
        .context("Failed to write sample data")?;
    fs::write(
        out.join("data").join("geojson.json"),
        serde_json::to_string_pretty(&hotspots).context("Failed to serialize hotspots")?,
    )
    .context("Failed to write hotspots")?;

    let failures: Vec<String> = models
        .par_iter()
        .filter_map(|(page, model)| {
            write_page(out, page, model)
                .map_err(|e| {
                    error!(page = page.slug, "failed to write page: {e:#}");
                    page.slug.to_string()
                })
                .err()
        })
        .collect();

    if !failures.is_empty() {
        anyhow::bail!("Failed to write pages: {}", failures.join(", "));
    }

    info!(pages = models.len(), "site build complete");
    Ok(())
}

fn write_page(out: &Path, page: &Page, model: &PageModel) -> Result<()> {
    let html = page_html(page, model, LinkStyle::Static)?;
    let path = out.join(page.file_name());
    fs::write(&path, html.into_string()).with_context(|| format!("Failed to write {:?}", path))?;
    Ok(())
}

/// Copy every file below `from` into `to`, keeping relative paths.
fn copy_dir(from: &Path, to: &Path) -> Result<usize> {
    let mut copied = 0;
    for entry in WalkDir::new(from) {
        let entry = entry.with_context(|| format!("Failed to walk {:?}", from))?;
        let rel = entry.path().strip_prefix(from).context("Asset outside its directory")?;
        let target = to.join(rel);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).with_context(|| format!("Failed to create {:?}", target))?;
        } else {
            fs::copy(entry.path(), &target).with_context(|| format!("Failed to copy {:?}", entry.path()))?;
            copied += 1;
        }
    }
    Ok(copied)
}

/// Standalone download of the dataset, as the download button offers it.
pub async fn export_dataset(config: &AppConfig, dest: &Path) -> Result<()> {
    let sample = data::load_or(&config.data.sample_data_path(), fallback::sample_data()).await;
    if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| format!("Failed to create {:?}", parent))?;
    }
    fs::write(dest, dataset_download(&sample)?).with_context(|| format!("Failed to write {:?}", dest))?;
    info!(?dest, "dataset exported");
    Ok(())
}
