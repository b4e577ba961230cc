//! Running geographic bounding box

use serde::{Deserialize, Serialize};

/// Minimal latitude/longitude rectangle covering every observed coordinate.
///
/// Starts out inverted (`min > max`) so that the first coordinate always
/// widens it; an inverted box means nothing was observed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Smallest latitude seen
    pub min_lat: f64,
    /// Smallest longitude seen
    pub min_lon: f64,
    /// Largest latitude seen
    pub max_lat: f64,
    /// Largest longitude seen
    pub max_lon: f64,
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::new()
    }
}

impl BoundingBox {
    /// Empty (inverted) box
    #[must_use]
    pub const fn new() -> Self {
        Self {
            min_lat: 90.0,
            min_lon: 180.0,
            max_lat: -90.0,
            max_lon: -180.0,
        }
    }

    /// Widen the box to include a coordinate
    pub fn extend(&mut self, lon: f64, lat: f64) {
        if lon < self.min_lon {
            self.min_lon = lon;
        }
        if lat < self.min_lat {
            self.min_lat = lat;
        }
        if lon > self.max_lon {
            self.max_lon = lon;
        }
        if lat > self.max_lat {
            self.max_lat = lat;
        }
    }

    /// Whether no coordinate has been observed yet
    #[must_use]
    pub fn is_empty(&self) -> bool {
        // Any observed coordinate makes min_lon <= max_lon.
        self.min_lon > self.max_lon
    }

    /// The `<bounds/>` element, or `None` for an empty box
    #[must_use]
    pub fn to_element(&self) -> Option<String> {
        if self.is_empty() {
            return None;
        }
        Some(format!(
            r#"<bounds minlat="{:.15}" minlon="{:.15}" maxlat="{:.15}" maxlon="{:.15}"/>"#,
            self.min_lat, self.min_lon, self.max_lat, self.max_lon
        ))
    }
}
