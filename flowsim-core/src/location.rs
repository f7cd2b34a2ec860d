//! Two-dimensional points shared by resources, sources, sinks, and the
//! [`crate::time_model::TimeModel::Distance`] variant.

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Location {
    pub x: f64,
    pub y: f64,
}

impl Location {
    pub fn new(x: f64, y: f64) -> Self {
        Location { x, y }
    }

    pub fn manhattan(self, other: Location) -> f64 {
        (self.x - other.x).abs() + (self.y - other.y).abs()
    }

    pub fn euclidean(self, other: Location) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    Manhattan,
    Euclidean,
}

impl DistanceMetric {
    pub fn distance(self, a: Location, b: Location) -> f64 {
        match self {
            DistanceMetric::Manhattan => a.manhattan(b),
            DistanceMetric::Euclidean => a.euclidean(b),
        }
    }
}
