use geojson::{Feature, FeatureCollection};
use serde_json::Value;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("resource not found: {0:?}")]
    NotFound(PathBuf),
    #[error("failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed JSON in {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("{path:?} is not a GeoJSON FeatureCollection: {reason}")]
    NotFeatureCollection { path: PathBuf, reason: String },
}

/// Read and parse a local JSON resource.
pub async fn fetch_json(path: &Path) -> Result<Value, FetchError> {
    let bytes = tokio::fs::read(path).await.map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            FetchError::NotFound(path.to_path_buf())
        } else {
            FetchError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;

    serde_json::from_slice(&bytes).map_err(|source| FetchError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Load a FeatureCollection, keeping every feature that parses. Features
/// without a `geometry` member are read as having a null geometry; any other
/// malformed feature is dropped on its own.
pub async fn fetch_feature_collection(path: &Path) -> Result<FeatureCollection, FetchError> {
    let value = fetch_json(path).await?;
    let not_fc = |reason: String| FetchError::NotFeatureCollection {
        path: path.to_path_buf(),
        reason,
    };

    let Value::Object(mut object) = value else {
        return Err(not_fc("expected a JSON object".to_string()));
    };
    match object.get("type").and_then(Value::as_str) {
        Some("FeatureCollection") => {}
        Some(other) => return Err(not_fc(format!("found a {other}"))),
        None => return Err(not_fc("missing \"type\" member".to_string())),
    }
    let raw = match object.remove("features") {
        Some(Value::Array(raw)) => raw,
        _ => return Err(not_fc("\"features\" must be an array".to_string())),
    };

    let total = raw.len();
    let features: Vec<Feature> = raw
        .into_iter()
        .enumerate()
        .filter_map(|(index, feature)| match parse_feature(feature) {
            Ok(feature) => Some(feature),
            Err(err) => {
                debug!(?path, index, %err, "skipping malformed feature");
                None
            }
        })
        .collect();
    if features.len() < total {
        debug!(?path, kept = features.len(), total, "some features were skipped");
    }

    Ok(FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    })
}

fn parse_feature(mut value: Value) -> Result<Feature, geojson::Error> {
    if let Value::Object(object) = &mut value {
        object.entry("geometry").or_insert(Value::Null);
    }
    Feature::try_from(value)
}

/// Best-effort load: any failure resolves to `fallback`.
pub async fn load_or(path: &Path, fallback: Value) -> Value {
    fetch_json(path).await.unwrap_or_else(|err| {
        debug!(%err, "using fallback data");
        fallback
    })
}

pub async fn load_feature_collection_or(path: &Path, fallback: FeatureCollection) -> FeatureCollection {
    fetch_feature_collection(path).await.unwrap_or_else(|err| {
        debug!(%err, "using fallback feature collection");
        fallback
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn missing_file_resolves_to_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data/sample-data.json");
        let fallback = json!({ "sea_temperature": [{ "date": "2015-01-01", "value": 16.8 }] });

        assert!(matches!(fetch_json(&path).await, Err(FetchError::NotFound(_))));
        assert_eq!(load_or(&path, fallback.clone()).await, fallback);
    }

    #[tokio::test]
    async fn malformed_json_resolves_to_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert!(matches!(fetch_json(&path).await, Err(FetchError::Parse { .. })));
        assert_eq!(load_or(&path, json!([])).await, json!([]));
    }

    #[tokio::test]
    async fn directory_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = fetch_json(dir.path()).await.unwrap_err();
        assert!(!matches!(err, FetchError::NotFound(_)));
        assert_eq!(load_or(dir.path(), json!({ "ok": false })).await, json!({ "ok": false }));
    }

    #[tokio::test]
    async fn live_data_wins_over_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("live.json");
        std::fs::write(&path, r#"{ "plastic_by_region": [] }"#).unwrap();

        let loaded = load_or(&path, json!({ "fallback": true })).await;
        assert_eq!(loaded, json!({ "plastic_by_region": [] }));
    }

    #[tokio::test]
    async fn non_collection_geojson_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("point.json");
        std::fs::write(&path, r#"{ "type": "Point", "coordinates": [1.0, 2.0] }"#).unwrap();

        assert!(matches!(
            fetch_feature_collection(&path).await,
            Err(FetchError::NotFeatureCollection { .. })
        ));

        let fallback = crate::fallback::empty_feature_collection();
        let fc = load_feature_collection_or(&path, fallback.clone()).await;
        assert_eq!(fc, fallback);
    }

    #[tokio::test]
    async fn reads_feature_collection() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("geojson.json");
        std::fs::write(
            &path,
            r#"{ "type": "FeatureCollection", "features": [
                { "type": "Feature",
                  "geometry": { "type": "Point", "coordinates": [120.5, -8.2] },
                  "properties": { "type": "Plastic", "severity": "high" } }
            ] }"#,
        )
        .unwrap();

        let fc = fetch_feature_collection(&path).await.unwrap();
        assert_eq!(fc.features.len(), 1);
    }

    #[tokio::test]
    async fn malformed_features_are_skipped_individually() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("geojson.json");
        std::fs::write(
            &path,
            r#"{ "type": "FeatureCollection", "features": [
                { "type": "Feature",
                  "geometry": { "type": "Point", "coordinates": [120.5, -8.2] },
                  "properties": { "type": "Plastic" } },
                { "type": "Feature", "properties": { "type": "fishing" } },
                { "type": "Feature", "geometry": { "type": "Point", "coordinates": "nowhere" } },
                "garbage"
            ] }"#,
        )
        .unwrap();

        let fc = fetch_feature_collection(&path).await.unwrap();
        assert_eq!(fc.features.len(), 2);
        assert!(fc.features[0].geometry.is_some());
        assert!(fc.features[1].geometry.is_none());
        assert_eq!(fc.features[1].property("type"), Some(&json!("fishing")));
    }

    #[tokio::test]
    async fn features_must_be_an_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("geojson.json");
        std::fs::write(&path, r#"{ "type": "FeatureCollection", "features": {} }"#).unwrap();

        assert!(matches!(
            fetch_feature_collection(&path).await,
            Err(FetchError::NotFeatureCollection { .. })
        ));
    }
}
