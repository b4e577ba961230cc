//! GPX records handed to the writer
//!
//! Waypoints, routes and tracks with the optional fields GPX 1.1 defines for
//! them. Records are plain data: serde (de)serializable so that a batch can
//! be loaded from JSON.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// GPS point with coordinates and optional metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GpxPoint {
    /// Latitude in degrees
    pub latitude: f64,
    /// Longitude in degrees
    pub longitude: f64,
    /// Elevation in meters (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elevation: Option<f64>,
    /// Timestamp, written verbatim (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    /// Point name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// GPS comment
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// Description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Symbol name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    /// Point classification
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub point_type: Option<String>,
    /// Extra fields written under `<extensions>`
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub extensions: BTreeMap<String, String>,
}

impl GpxPoint {
    /// Point at the given coordinates with no other fields
    #[must_use]
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            ..Self::default()
        }
    }
}

/// GPS waypoint (point of interest)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GpxWaypoint {
    /// Point data
    #[serde(flatten)]
    pub point: GpxPoint,
}

/// GPS route containing a sequence of route points
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GpxRoute {
    /// Route name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// GPS comment
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// Route description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Route number
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number: Option<u32>,
    /// Route type (e.g., "hiking", "cycling")
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub route_type: Option<String>,
    /// Route points
    pub points: Vec<GpxPoint>,
}

/// GPS track containing a sequence of track segments
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GpxTrack {
    /// Track name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// GPS comment
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// Track description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Track number
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number: Option<u32>,
    /// Track type (e.g., "hiking", "running")
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub track_type: Option<String>,
    /// Track segments
    pub segments: Vec<GpxTrackSegment>,
}

impl GpxTrack {
    /// Number of points in all segments
    #[must_use]
    pub fn total_points(&self) -> usize {
        self.segments.iter().map(|s| s.points.len()).sum()
    }
}

/// GPS track segment containing a sequence of track points
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GpxTrackSegment {
    /// Track points in this segment
    pub points: Vec<GpxPoint>,
}

/// A batch of records, in the order a GPX document lists them
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GpxRecords {
    /// Waypoints
    pub waypoints: Vec<GpxWaypoint>,
    /// Routes
    pub routes: Vec<GpxRoute>,
    /// Tracks
    pub tracks: Vec<GpxTrack>,
}

impl GpxRecords {
    /// Load records from JSON
    ///
    /// # Errors
    ///
    /// Returns `GpxError::Json` if the input is not a valid records document.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        Ok(serde_json::from_reader(reader)?)
    }

    /// Load records from a JSON file
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file cannot be opened (`GpxError::Io`)
    /// - The file is not a valid records document (`GpxError::Json`)
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }

    /// Whether the batch holds no records at all
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty() && self.routes.is_empty() && self.tracks.is_empty()
    }
}
