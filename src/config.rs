use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

pub const OSM_TILE_URL: &str = "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png";

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub data: DataConfig,
    pub map: MapConfig,
    pub server: ServerConfig,
    pub output: OutputConfig,
    pub database: DatabaseConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DataConfig {
    // Relative resource paths below are resolved against this root
    pub root: PathBuf,
    pub sample_data: PathBuf,
    pub geojson: PathBuf,
    /// Stylesheets and browser scripts, served and copied as-is.
    pub assets: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        DataConfig {
            root: PathBuf::from("."),
            sample_data: PathBuf::from("data/sample-data.json"),
            geojson: PathBuf::from("data/geojson.json"),
            assets: PathBuf::from("assets"),
        }
    }
}

impl DataConfig {
    pub fn sample_data_path(&self) -> PathBuf {
        self.root.join(&self.sample_data)
    }

    pub fn geojson_path(&self) -> PathBuf {
        self.root.join(&self.geojson)
    }

    pub fn assets_path(&self) -> PathBuf {
        self.root.join(&self.assets)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MapConfig {
    pub map_id: String,
    /// `[lat, lon]` shown before the hotspots are loaded.
    pub initial_view: [f64; 2],
    pub initial_zoom: u8,
    pub use_custom_icons: bool,
    /// Lowercase hotspot type -> icon url or data uri.
    pub icon_map: HashMap<String, String>,
    pub icon_size: [u32; 2],
    pub tile_url: String,
    pub tile_max_zoom: u8,
}

impl Default for MapConfig {
    fn default() -> Self {
        MapConfig {
            map_id: "map".to_string(),
            initial_view: [0.0, 20.0],
            initial_zoom: 2,
            use_custom_icons: false,
            icon_map: HashMap::new(),
            icon_size: [32, 32],
            tile_url: OSM_TILE_URL.to_string(),
            tile_max_zoom: 19,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: [u8; 4],
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: [127, 0, 0, 1],
            port: 5000,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct OutputConfig {
    pub site_dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            site_dir: PathBuf::from("site"),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        DatabaseConfig {
            url: "sqlite://data/app.db?mode=rwc".to_string(),
        }
    }
}

impl AppConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config: AppConfig = toml::from_str(&content)
            .with_context(|| "Failed to parse TOML configuration")?;
        Ok(config)
    }

    /// Like `load_from_file`, but a missing file yields the defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!(?path, "config file not found, using defaults");
            return Ok(AppConfig::default());
        }
        Self::load_from_file(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[map]
use_custom_icons = true
icon_map = {{ plastic = "icons/plastic.png" }}

[server]
port = 8080
"#
        )
        .unwrap();

        let config = AppConfig::load_from_file(file.path()).unwrap();
        assert!(config.map.use_custom_icons);
        assert_eq!(config.map.icon_map["plastic"], "icons/plastic.png");
        assert_eq!(config.map.map_id, "map");
        assert_eq!(config.map.icon_size, [32, 32]);
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.data.sample_data, PathBuf::from("data/sample-data.json"));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load_or_default(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.map.tile_url, OSM_TILE_URL);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server\nport = ").unwrap();
        assert!(AppConfig::load_from_file(file.path()).is_err());
    }
}
