//! Streaming GPX writer
//!
//! Records are written as they arrive. The `<bounds>` element of the metadata
//! block can only be known once every coordinate has been seen, so on a
//! seekable sink the writer leaves a blank region inside `<metadata>` and
//! overwrites it on [`GpxWriter::finish`]. On a forward-only sink the region
//! is never reserved and the document has no bounds.

use crate::bounds::BoundingBox;
use crate::error::{GpxError, Result};
use crate::metadata::MetadataKey;
use crate::options::WriterOptions;
use crate::record::{GpxPoint, GpxRoute, GpxTrack, GpxWaypoint};
use crate::sink::{FileSink, Sink};
use crate::xml::{element_name, escape, is_ncname};
use std::fs::OpenOptions;
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// Width in bytes of the blank region reserved for `<bounds>`
pub const RESERVED_WIDTH: usize = 160;

const GPX_NAMESPACE: &str = "http://www.topografix.com/GPX/1/1";
const XSI_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema-instance";
const SCHEMA_LOCATION: &str =
    "http://www.topografix.com/GPX/1/1 http://www.topografix.com/GPX/1/1/gpx.xsd";

/// Blank bytes set aside for the bounding box
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReservedRegion {
    /// Absolute offset of the first blank byte
    pub offset: u64,
    /// Number of blank bytes, excluding the line terminator
    pub width: usize,
}

/// Structure whose closing tags are still owed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OpenStructure {
    None,
    Route { id: u64 },
    Track { id: u64, segment: u64 },
}

/// Writes one GPX 1.1 document into a [`Sink`]
#[derive(Debug)]
pub struct GpxWriter<S: Sink> {
    sink: Option<S>,
    eol: &'static str,
    extensions_prefix: Option<String>,
    bounds: BoundingBox,
    reserved: Option<ReservedRegion>,
    open: OpenStructure,
    finished: bool,
}

fn is_stdout(path: &Path) -> bool {
    path == Path::new("/dev/stdout") || path == Path::new("-")
}

impl GpxWriter<FileSink> {
    /// Create a GPX file at `path`.
    ///
    /// `/dev/stdout` and `-` write to standard output, which is treated as
    /// non-seekable: the document then has no `<bounds>`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `path` already exists (`GpxError::AlreadyExists`)
    /// - The file cannot be created or written (`GpxError::Io`)
    /// - The options are invalid (`GpxError::InvalidOption`)
    pub fn create<P: AsRef<Path>>(path: P, options: &WriterOptions) -> Result<Self> {
        let path = path.as_ref();
        let sink = if is_stdout(path) {
            FileSink::Stdout(io::stdout())
        } else {
            let file = OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(path)
                .map_err(|e| match e.kind() {
                    io::ErrorKind::AlreadyExists => GpxError::AlreadyExists(path.to_path_buf()),
                    _ => GpxError::Io(e),
                })?;
            FileSink::File(BufWriter::new(file))
        };
        Self::new(sink, options)
    }
}

impl<S: Sink> GpxWriter<S> {
    /// Start a document on `sink`, writing everything up to `</metadata>`
    ///
    /// # Errors
    ///
    /// Returns `GpxError::InvalidOption` for an extension prefix that is not a
    /// valid XML name, or `GpxError::Io` when the sink fails.
    pub fn new(sink: S, options: &WriterOptions) -> Result<Self> {
        if options.use_extensions && !is_ncname(&options.extensions_prefix) {
            return Err(GpxError::InvalidOption(format!(
                "extension prefix '{}' is not a valid namespace prefix",
                options.extensions_prefix
            )));
        }

        let mut writer = Self {
            sink: Some(sink),
            eol: options.resolved_line_ending().as_str(),
            extensions_prefix: options
                .use_extensions
                .then(|| options.extensions_prefix.clone()),
            bounds: BoundingBox::new(),
            reserved: None,
            open: OpenStructure::None,
            finished: false,
        };

        if let Err(err) = writer.write_header(options) {
            writer.finished = true;
            return Err(err);
        }
        Ok(writer)
    }

    /// Bounding box of the coordinates written so far
    #[must_use]
    pub fn bounds(&self) -> &BoundingBox {
        &self.bounds
    }

    /// Region reserved for `<bounds>`, if the sink is seekable
    #[must_use]
    pub fn reserved_region(&self) -> Option<ReservedRegion> {
        self.reserved
    }

    /// Include a coordinate in the bounding box
    pub fn add_coord(&mut self, lon: f64, lat: f64) {
        self.bounds.extend(lon, lat);
    }

    /// Write a `<wpt>`
    ///
    /// # Errors
    ///
    /// Returns `GpxError::InvalidCoordinate` for a non-finite coordinate or
    /// elevation, or `GpxError::Io` when the sink fails.
    pub fn write_waypoint(&mut self, waypoint: &GpxWaypoint) -> Result<()> {
        check_point(&waypoint.point)?;
        self.close_open()?;
        self.write_point("wpt", &waypoint.point, "")
    }

    /// Write a complete `<rte>`
    ///
    /// Points are checked before anything is written.
    ///
    /// # Errors
    ///
    /// Returns `GpxError::InvalidCoordinate` for a non-finite coordinate or
    /// elevation, or `GpxError::Io` when the sink fails.
    pub fn write_route(&mut self, route: &GpxRoute) -> Result<()> {
        route.points.iter().try_for_each(check_point)?;
        self.close_open()?;
        self.line("<rte>")?;
        self.write_fields(
            "  ",
            route.name.as_deref(),
            route.comment.as_deref(),
            route.description.as_deref(),
            route.number,
            route.route_type.as_deref(),
        )?;
        for point in &route.points {
            self.write_point("rtept", point, "  ")?;
        }
        self.line("</rte>")
    }

    /// Write a complete `<trk>`
    ///
    /// Points are checked before anything is written.
    ///
    /// # Errors
    ///
    /// Returns `GpxError::InvalidCoordinate` for a non-finite coordinate or
    /// elevation, or `GpxError::Io` when the sink fails.
    pub fn write_track(&mut self, track: &GpxTrack) -> Result<()> {
        track
            .segments
            .iter()
            .flat_map(|segment| &segment.points)
            .try_for_each(check_point)?;
        self.close_open()?;
        self.line("<trk>")?;
        self.write_fields(
            "  ",
            track.name.as_deref(),
            track.comment.as_deref(),
            track.description.as_deref(),
            track.number,
            track.track_type.as_deref(),
        )?;
        for segment in &track.segments {
            self.line("  <trkseg>")?;
            for point in &segment.points {
                self.write_point("trkpt", point, "    ")?;
            }
            self.line("  </trkseg>")?;
        }
        self.line("</trk>")
    }

    /// Write a `<rtept>` of route `route_id`, opening the route if needed
    ///
    /// # Errors
    ///
    /// Returns `GpxError::InvalidCoordinate` for a non-finite coordinate or
    /// elevation, or `GpxError::Io` when the sink fails.
    pub fn write_route_point(&mut self, route_id: u64, point: &GpxPoint) -> Result<()> {
        check_point(point)?;
        if self.open != (OpenStructure::Route { id: route_id }) {
            self.close_open()?;
            self.line("<rte>")?;
            self.open = OpenStructure::Route { id: route_id };
        }
        self.write_point("rtept", point, "  ")
    }

    /// Write a `<trkpt>` of segment `segment_id` of track `track_id`,
    /// opening the track or segment if needed
    ///
    /// # Errors
    ///
    /// Returns `GpxError::InvalidCoordinate` for a non-finite coordinate or
    /// elevation, or `GpxError::Io` when the sink fails.
    pub fn write_track_point(
        &mut self,
        track_id: u64,
        segment_id: u64,
        point: &GpxPoint,
    ) -> Result<()> {
        check_point(point)?;
        match self.open {
            OpenStructure::Track { id, segment } if id == track_id && segment == segment_id => {}
            OpenStructure::Track { id, .. } if id == track_id => {
                self.line("  </trkseg>")?;
                self.line("  <trkseg>")?;
            }
            _ => {
                self.close_open()?;
                self.line("<trk>")?;
                self.line("  <trkseg>")?;
            }
        }
        self.open = OpenStructure::Track {
            id: track_id,
            segment: segment_id,
        };
        self.write_point("trkpt", point, "    ")
    }

    /// Close the document, patch the bounds in and hand the sink back.
    ///
    /// The returned sink is positioned at the end of the document. On error
    /// the sink is dropped before the error is returned.
    ///
    /// # Errors
    ///
    /// Returns `GpxError::Io` when the sink fails.
    pub fn finish(mut self) -> Result<S> {
        let result = self.finish_document();
        self.finished = true;
        let sink = self.sink.take();
        result?;
        sink.ok_or_else(|| GpxError::Io(finished_error()))
    }

    fn finish_document(&mut self) -> Result<()> {
        self.close_open()?;
        self.line("</gpx>")?;

        if let Some(region) = self.reserved.take() {
            if let Some(element) = self.bounds.to_element() {
                if element.len() <= region.width {
                    let sink = self.sink_mut()?;
                    let end = sink.position()?;
                    sink.seek_to(region.offset)?;
                    sink.write_all(element.as_bytes())?;
                    sink.seek_to(end)?;
                } else {
                    log::warn!("Bounds do not fit in the reserved region; leaving it blank");
                }
            }
        }

        self.sink_mut()?.flush()?;
        Ok(())
    }

    fn write_header(&mut self, options: &WriterOptions) -> Result<()> {
        self.line(r#"<?xml version="1.0"?>"#)?;

        let mut root = format!(
            r#"<gpx version="1.1" creator="{}" xmlns:xsi="{XSI_NAMESPACE}" "#,
            escape(&options.creator)
        );
        if options.use_extensions {
            root.push_str(&format!(
                r#"xmlns:{}="{}" "#,
                options.extensions_prefix,
                escape(&options.extensions_url)
            ));
        }
        root.push_str(&format!(
            r#"xmlns="{GPX_NAMESPACE}" xsi:schemaLocation="{SCHEMA_LOCATION}">"#
        ));
        self.line(&root)?;

        self.line("<metadata>")?;
        self.write_metadata(options)?;

        if self.sink_mut()?.is_back_seekable() {
            let offset = self.sink_mut()?.position()?;
            self.line(&" ".repeat(RESERVED_WIDTH))?;
            self.reserved = Some(ReservedRegion {
                offset,
                width: RESERVED_WIDTH,
            });
        }

        self.line("</metadata>")
    }

    fn write_metadata(&mut self, options: &WriterOptions) -> Result<()> {
        let metadata = &options.metadata;

        self.text_element("  ", "name", metadata.get(MetadataKey::Name))?;
        self.text_element("  ", "desc", metadata.get(MetadataKey::Description))?;

        let author_name = metadata.get(MetadataKey::AuthorName);
        let author_email = metadata.get(MetadataKey::AuthorEmail);
        let author_href = metadata.get(MetadataKey::AuthorLinkHref);
        let email_parts = author_email.and_then(|email| email.split_once('@'));
        if author_name.is_some() || email_parts.is_some() || author_href.is_some() {
            self.line("  <author>")?;
            self.text_element("    ", "name", author_name)?;
            if let Some((id, domain)) = email_parts {
                self.line(&format!(
                    r#"    <email id="{}" domain="{}"/>"#,
                    escape(id),
                    escape(domain)
                ))?;
            }
            if let Some(href) = author_href {
                self.line(&format!(r#"    <link href="{}">"#, escape(href)))?;
                self.text_element("      ", "text", metadata.get(MetadataKey::AuthorLinkText))?;
                self.text_element("      ", "type", metadata.get(MetadataKey::AuthorLinkType))?;
                self.line("    </link>")?;
            }
            self.line("  </author>")?;
        }

        if let Some(author) = metadata.get(MetadataKey::CopyrightAuthor) {
            self.line(&format!(r#"  <copyright author="{}">"#, escape(author)))?;
            self.text_element("    ", "year", metadata.get(MetadataKey::CopyrightYear))?;
            self.text_element("    ", "license", metadata.get(MetadataKey::CopyrightLicense))?;
            self.line("  </copyright>")?;
        }

        for n in metadata.link_numbers() {
            let Some(href) = metadata.get(MetadataKey::LinkHref(n)) else {
                continue;
            };
            self.line(&format!(r#"  <link href="{}">"#, escape(href)))?;
            self.text_element("    ", "text", metadata.get(MetadataKey::LinkText(n)))?;
            self.text_element("    ", "type", metadata.get(MetadataKey::LinkType(n)))?;
            self.line("  </link>")?;
        }

        self.text_element("  ", "time", metadata.get(MetadataKey::Time))?;
        self.text_element("  ", "keywords", metadata.get(MetadataKey::Keywords))
    }

    fn write_fields(
        &mut self,
        indent: &str,
        name: Option<&str>,
        comment: Option<&str>,
        description: Option<&str>,
        number: Option<u32>,
        kind: Option<&str>,
    ) -> Result<()> {
        self.text_element(indent, "name", name)?;
        self.text_element(indent, "cmt", comment)?;
        self.text_element(indent, "desc", description)?;
        if let Some(number) = number {
            self.line(&format!("{indent}<number>{number}</number>"))?;
        }
        self.text_element(indent, "type", kind)
    }

    fn write_point(&mut self, tag: &str, point: &GpxPoint, indent: &str) -> Result<()> {
        self.add_coord(point.longitude, point.latitude);

        self.line(&format!(
            r#"{indent}<{tag} lat="{}" lon="{}">"#,
            point.latitude, point.longitude
        ))?;

        let inner = format!("{indent}  ");
        if let Some(elevation) = point.elevation {
            self.line(&format!("{inner}<ele>{elevation}</ele>"))?;
        }
        self.text_element(&inner, "time", point.time.as_deref())?;
        self.text_element(&inner, "name", point.name.as_deref())?;
        self.text_element(&inner, "cmt", point.comment.as_deref())?;
        self.text_element(&inner, "desc", point.description.as_deref())?;
        self.text_element(&inner, "sym", point.symbol.as_deref())?;
        self.text_element(&inner, "type", point.point_type.as_deref())?;

        if let Some(prefix) = self.extensions_prefix.clone() {
            if !point.extensions.is_empty() {
                self.line(&format!("{inner}<extensions>"))?;
                for (key, value) in &point.extensions {
                    let name = element_name(key);
                    self.line(&format!(
                        "{inner}  <{prefix}:{name}>{}</{prefix}:{name}>",
                        escape(value)
                    ))?;
                }
                self.line(&format!("{inner}</extensions>"))?;
            }
        }

        self.line(&format!("{indent}</{tag}>"))
    }

    fn close_open(&mut self) -> Result<()> {
        match std::mem::replace(&mut self.open, OpenStructure::None) {
            OpenStructure::None => Ok(()),
            OpenStructure::Route { .. } => self.line("</rte>"),
            OpenStructure::Track { .. } => {
                self.line("  </trkseg>")?;
                self.line("</trk>")
            }
        }
    }

    fn text_element(&mut self, indent: &str, tag: &str, value: Option<&str>) -> Result<()> {
        match value {
            Some(value) => self.line(&format!("{indent}<{tag}>{}</{tag}>", escape(value))),
            None => Ok(()),
        }
    }

    fn line(&mut self, text: &str) -> Result<()> {
        let eol = self.eol;
        let sink = self.sink_mut()?;
        sink.write_all(text.as_bytes())?;
        sink.write_all(eol.as_bytes())?;
        Ok(())
    }

    fn sink_mut(&mut self) -> Result<&mut S> {
        self.sink.as_mut().ok_or_else(|| GpxError::Io(finished_error()))
    }
}

fn check_point(point: &GpxPoint) -> Result<()> {
    if !point.latitude.is_finite() || !point.longitude.is_finite() {
        return Err(GpxError::InvalidCoordinate(format!(
            "lat={} lon={}",
            point.latitude, point.longitude
        )));
    }
    match point.elevation {
        Some(elevation) if !elevation.is_finite() => Err(GpxError::InvalidCoordinate(format!(
            "elevation {elevation} at lat={} lon={}",
            point.latitude, point.longitude
        ))),
        _ => Ok(()),
    }
}

fn finished_error() -> io::Error {
    io::Error::other("GPX writer is already finished")
}

impl<S: Sink> Drop for GpxWriter<S> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;
        if let Err(err) = self.finish_document() {
            log::warn!("Failed to finish GPX document: {err}");
        }
    }
}
