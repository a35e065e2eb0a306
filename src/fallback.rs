use geojson::FeatureCollection;
use serde_json::{json, Value};

/// Snapshot substituted when `data/sample-data.json` cannot be loaded.
/// Keys and row shapes mirror the live file.
pub fn sample_data() -> Value {
    json!({
        "sea_temperature": [
            { "date": "2015-01-01", "value": 16.8 },
            { "date": "2016-01-01", "value": 17.1 },
            { "date": "2017-01-01", "value": 17.4 },
            { "date": "2018-01-01", "value": 17.6 },
            { "date": "2019-01-01", "value": 17.7 },
            { "date": "2020-01-01", "value": 17.9 },
            { "date": "2021-01-01", "value": 18.0 },
            { "date": "2022-01-01", "value": 18.1 },
            { "date": "2023-01-01", "value": 18.2 },
            { "date": "2024-01-01", "value": 18.3 }
        ],
        "plastic_by_region": [
            { "region": "Asia", "value": 4100 },
            { "region": "Africa", "value": 900 },
            { "region": "Europe", "value": 650 },
            { "region": "Americas", "value": 1300 },
            { "region": "Oceania", "value": 170 }
        ],
        "fishing_pressure": [
            { "region": "North Atlantic", "value": 78 },
            { "region": "Indian Ocean", "value": 62 },
            { "region": "Pacific", "value": 92 },
            { "region": "Mediterranean", "value": 55 }
        ],
        "coral_bleaching_by_year": [
            { "year": 2015, "count": 40 },
            { "year": 2016, "count": 65 },
            { "year": 2017, "count": 72 },
            { "year": 2018, "count": 58 },
            { "year": 2019, "count": 62 },
            { "year": 2020, "count": 70 },
            { "year": 2021, "count": 68 }
        ],
        "plastic_types": [
            { "type": "Bottles & containers", "value": 34 },
            { "type": "Food packaging", "value": 22 },
            { "type": "Fishing gear", "value": 15 },
            { "type": "Plastic bags", "value": 12 },
            { "type": "Microplastics (fragments)", "value": 10 },
            { "type": "Other", "value": 7 }
        ]
    })
}

pub fn empty_feature_collection() -> FeatureCollection {
    FeatureCollection {
        bbox: None,
        features: Vec::new(),
        foreign_members: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_series_is_an_array_of_objects() {
        let data = sample_data();
        let expected = [
            ("sea_temperature", 10),
            ("plastic_by_region", 5),
            ("fishing_pressure", 4),
            ("coral_bleaching_by_year", 7),
            ("plastic_types", 6),
        ];
        for (key, len) in expected {
            let rows = data[key].as_array().unwrap();
            assert_eq!(rows.len(), len, "{key}");
            assert!(rows.iter().all(Value::is_object), "{key}");
        }
    }
}
