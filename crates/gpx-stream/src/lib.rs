//! # gpx-stream
//!
//! Streaming GPX (GPS Exchange Format) detection and writing.
//!
//! This crate decides from a bounded prefix whether a byte stream is GPX,
//! harvests its document-level metadata on the way, and writes GPX documents
//! record by record with a bounding box patched in at the end.
//!
//! ## Components
//!
//! | Module | Role |
//! |--------|------|
//! | [`detect`] | Chunked sniffer and `<metadata>` extractor |
//! | [`writer`] | Streaming writer with a deferred `<bounds>` patch |
//! | [`sink`] | Seekable and forward-only output targets |
//! | [`options`] | Writer options, from serde or `KEY=VALUE` pairs |
//! | [`metadata`] | Flattened metadata keys and map |
//! | [`record`] | Waypoints, routes and tracks |
//! | [`sax`] | Push-style XML events over `quick-xml` |
//!
//! ## Quick Start
//!
//! ### Detect a GPX File
//!
//! ```no_run
//! use gpx_stream::{detect_path, MetadataKey};
//!
//! let detection = detect_path("hiking_trail.gpx")?;
//! if detection.is_valid() {
//!     println!("GPX {}", detection.version.as_deref().unwrap_or("1.1"));
//!     println!("Extensions: {}", detection.uses_extensions);
//!     println!("Name: {:?}", detection.metadata.get(MetadataKey::Name));
//! }
//! # Ok::<(), gpx_stream::GpxError>(())
//! ```
//!
//! ### Write a GPX File
//!
//! ```no_run
//! use gpx_stream::{GpxPoint, GpxWaypoint, GpxWriter, WriterOptions};
//!
//! let options = WriterOptions::from_pairs([("METADATA_NAME", "Paris")])?;
//! let mut writer = GpxWriter::create("paris.gpx", &options)?;
//! writer.write_waypoint(&GpxWaypoint {
//!     point: GpxPoint::new(48.8584, 2.2945),
//! })?;
//! writer.finish()?;
//! # Ok::<(), gpx_stream::GpxError>(())
//! ```
//!
//! ## Detection Limits
//!
//! | Limit | Default | Effect |
//! |-------|---------|--------|
//! | `chunk_size` | 8192 | Bytes per read and guard threshold per chunk |
//! | `max_inconclusive_chunks` | 50 | Chunks without any element before giving up |
//! | `extension_scan_limit` | 1 MiB | Bytes scanned for `<extensions>` once valid |
//!
//! A chunk producing as many character data events and entity expansions as
//! it has bytes is taken as an entity expansion attack and rejected with
//! [`GpxError::EntityAmplification`].
//!
//! ## Error Handling
//!
//! ```no_run
//! use gpx_stream::{detect_path, GpxError};
//!
//! match detect_path("track.gpx") {
//!     Ok(detection) if detection.is_valid() => println!("GPX"),
//!     Ok(_) => println!("Not GPX"),
//!     Err(GpxError::Io(e)) => println!("File error: {}", e),
//!     Err(GpxError::Xml { message, line, .. }) => println!("Broken GPX at line {}: {}", line, message),
//!     Err(e) => println!("Error: {}", e),
//! }
//! ```

pub mod bounds;
pub mod detect;
pub mod error;
pub mod metadata;
pub mod options;
pub mod record;
pub mod sax;
pub mod sink;
pub mod writer;
mod xml;

pub use bounds::BoundingBox;
pub use detect::{detect_path, Detection, Detector, DetectorConfig, GpxVersion, Validity};
pub use error::{GpxError, Result};
pub use metadata::{MetadataKey, MetadataMap, UnknownMetadataKey};
pub use options::{LineEnding, WriterOptions};
pub use record::{GpxPoint, GpxRecords, GpxRoute, GpxTrack, GpxTrackSegment, GpxWaypoint};
pub use sink::{FileSink, Seekable, Sink, Streaming};
pub use writer::{GpxWriter, ReservedRegion};
