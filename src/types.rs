use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricPoint {
    pub label: String,
    // None when the source value was not a number
    pub value: Option<f64>,
}

/// Ordered `(label, value)` pairs feeding one chart.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricSeries {
    pub points: Vec<MetricPoint>,
}

impl MetricSeries {
    pub fn labels(&self) -> Vec<String> {
        self.points.iter().map(|p| p.label.clone()).collect()
    }

    pub fn values(&self) -> Vec<Option<f64>> {
        self.points.iter().map(|p| p.value).collect()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

impl FromIterator<MetricPoint> for MetricSeries {
    fn from_iter<I: IntoIterator<Item = MetricPoint>>(iter: I) -> Self {
        MetricSeries {
            points: iter.into_iter().collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct Member {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub city: Option<String>,
    pub country: Option<String>,
    pub interest: Option<String>,
    pub created_at: String,
}
