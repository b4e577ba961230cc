//! GPX format detection and metadata extraction
//!
//! [`Detector`] reads an input in fixed-size chunks and stops as soon as it
//! knows whether the input is GPX. On the way it flattens the `<metadata>`
//! block into a [`MetadataMap`]. Detection is meant to run next to detectors
//! for other formats, so "not GPX" is an ordinary result and not an error.

use crate::error::{GpxError, Result};
use crate::metadata::{MetadataKey, MetadataMap};
use crate::options::DEFAULT_EXTENSIONS_PREFIX;
use crate::sax::{Attribute, ChunkParser, XmlHandler};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, Read};
use std::ops::ControlFlow;
use std::path::Path;

/// Name of the GPX root element
pub const ROOT_TAG: &str = "gpx";

/// Version assumed when the root element does not declare one
pub const DEFAULT_VERSION: &str = "1.1";

/// Classification state of the input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Validity {
    /// No element seen yet
    Unknown,
    /// The first element is `<gpx>`
    Valid,
    /// Not GPX, malformed, or undecidable within the read limits
    Invalid,
}

/// GPX schema version the rest of a pipeline should follow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GpxVersion {
    /// GPX 1.0
    V1_0,
    /// GPX 1.1
    V1_1,
}

impl GpxVersion {
    /// Version string as written in the `version` attribute
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::V1_0 => "1.0",
            Self::V1_1 => "1.1",
        }
    }
}

/// Read limits of the detector
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Bytes per read; also the number of character data events and entity
    /// expansions tolerated per chunk before the input is rejected
    pub chunk_size: usize,

    /// Chunks to read without finding any element before giving up
    pub max_inconclusive_chunks: usize,

    /// Bytes to scan for `<extensions>` once the input is known to be GPX
    pub extension_scan_limit: u64,

    /// Namespace prefix whose declaration on `<gpx>` marks extension use
    pub extensions_prefix: String,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            chunk_size: 8192,
            max_inconclusive_chunks: 50,
            extension_scan_limit: 1024 * 1024,
            extensions_prefix: DEFAULT_EXTENSIONS_PREFIX.to_string(),
        }
    }
}

/// Outcome of a detection pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Detection {
    /// `Valid` or `Invalid`; never `Unknown`
    pub validity: Validity,

    /// Declared version (defaulted to 1.1 when missing); `None` unless valid
    pub version: Option<String>,

    /// Whether the document declares or uses `<extensions>`
    pub uses_extensions: bool,

    /// Flattened `<metadata>` block
    pub metadata: MetadataMap,

    /// Number of chunks read
    pub chunks_read: usize,

    /// Number of bytes read
    pub bytes_read: u64,
}

impl Detection {
    /// Whether the input was recognized as GPX
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.validity == Validity::Valid
    }

    /// Version the document should be handled as.
    ///
    /// Unrecognized versions are handled as GPX 1.1.
    #[must_use]
    pub fn gpx_version(&self) -> Option<GpxVersion> {
        match self.version.as_deref()? {
            "1.0" => Some(GpxVersion::V1_0),
            _ => Some(GpxVersion::V1_1),
        }
    }
}

/// Chunked GPX sniffer
#[derive(Debug, Clone, Default)]
pub struct Detector {
    config: DetectorConfig,
}

impl Detector {
    /// Create a detector with the given limits
    #[must_use]
    pub fn new(config: DetectorConfig) -> Self {
        Self { config }
    }

    /// Limits in use
    #[must_use]
    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Detect GPX in the file at `path`
    ///
    /// # Errors
    ///
    /// Same as [`Detector::detect`], plus `GpxError::Io` when the file cannot
    /// be opened.
    pub fn detect_path<P: AsRef<Path>>(&self, path: P) -> Result<Detection> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let detection = self.detect(file)?;
        if detection.is_valid() {
            log::debug!("{} seems to be a GPX file.", path.display());
        }
        Ok(detection)
    }

    /// Classify `reader` and harvest its metadata.
    ///
    /// Returns `Ok` with [`Validity::Invalid`] for anything that is simply not
    /// GPX, including malformed XML without strong signs of being GPX.
    ///
    /// # Errors
    ///
    /// - `GpxError::Io` when reading fails
    /// - `GpxError::Xml` when XML that looks like GPX (an XML declaration and
    ///   a `<gpx` tag in the failing chunk) is malformed before the root
    ///   element was recognized
    /// - `GpxError::EntityAmplification` when a single chunk produces too
    ///   many character data events and entity expansions
    pub fn detect<R: Read>(&self, mut reader: R) -> Result<Detection> {
        let chunk_size = self.config.chunk_size.max(1);
        let mut state = DetectState::new(&self.config, chunk_size);
        let mut parser = ChunkParser::new();
        let mut buf = vec![0u8; chunk_size];
        let mut chunks_read = 0usize;
        let mut bytes_read = 0u64;
        let mut inconclusive = 0usize;

        loop {
            state.guard_count = 0;
            let (len, eof) = read_chunk(&mut reader, &mut buf)?;
            chunks_read += 1;
            bytes_read += len as u64;
            let chunk = &buf[..len];

            if let Err(err) = parser.feed(&mut state, chunk, eof) {
                if state.guard_tripped {
                    return Err(GpxError::EntityAmplification { chunk: chunks_read });
                }
                if state.validity == Validity::Unknown && looks_like_gpx(chunk) {
                    return Err(GpxError::Xml {
                        message: err.kind.to_string(),
                        line: err.line,
                        column: err.column,
                    });
                }
                if !err.is_aborted() {
                    log::debug!("Not a GPX file: {err}");
                }
                state.validity = Validity::Invalid;
                break;
            }

            match state.validity {
                Validity::Invalid => break,
                Validity::Valid => {
                    if state.uses_extensions || bytes_read > self.config.extension_scan_limit {
                        break;
                    }
                }
                Validity::Unknown => {
                    inconclusive += 1;
                    if inconclusive >= self.config.max_inconclusive_chunks {
                        break;
                    }
                }
            }

            if eof || len == 0 {
                break;
            }
        }

        Ok(state.into_detection(chunks_read, bytes_read))
    }
}

/// Detect GPX in the file at `path` with the default limits
///
/// # Errors
///
/// See [`Detector::detect_path`].
pub fn detect_path<P: AsRef<Path>>(path: P) -> Result<Detection> {
    Detector::default().detect_path(path)
}

/// Fill `buf` as far as the reader allows; the flag reports end of input.
fn read_chunk<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<(usize, bool)> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => return Ok((filled, true)),
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok((filled, false))
}

fn looks_like_gpx(chunk: &[u8]) -> bool {
    contains(chunk, b"<?xml") && contains(chunk, b"<gpx")
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

/// Metadata substructure the parser is currently inside
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Context {
    Document,
    Metadata,
    Author,
    AuthorLink,
    Copyright,
    Link(u32),
}

/// Metadata value being accumulated from character data
#[derive(Debug)]
struct OpenValue {
    key: MetadataKey,
    depth: usize,
    value: String,
}

/// Event handler holding all detection state
struct DetectState {
    extensions_attr: String,
    guard_limit: usize,

    validity: Validity,
    version: Option<String>,
    uses_extensions: bool,

    depth: usize,
    // Each context is paired with the depth of the element that opened it.
    contexts: Vec<(Context, usize)>,
    open_value: Option<OpenValue>,
    link_counter: u32,
    metadata: MetadataMap,

    guard_count: usize,
    guard_tripped: bool,
}

impl DetectState {
    fn new(config: &DetectorConfig, guard_limit: usize) -> Self {
        Self {
            extensions_attr: format!("xmlns:{}", config.extensions_prefix),
            guard_limit,
            validity: Validity::Unknown,
            version: None,
            uses_extensions: false,
            depth: 0,
            contexts: Vec::new(),
            open_value: None,
            link_counter: 0,
            metadata: MetadataMap::new(),
            guard_count: 0,
            guard_tripped: false,
        }
    }

    /// Count one callback against the per-chunk threshold
    fn charge_guard(&mut self) -> ControlFlow<()> {
        self.guard_count += 1;
        if self.guard_count >= self.guard_limit {
            if !self.guard_tripped {
                log::error!("File probably corrupted (million laugh pattern)");
            }
            self.guard_tripped = true;
            return ControlFlow::Break(());
        }
        ControlFlow::Continue(())
    }

    fn classify(&mut self, name: &str, attributes: &[Attribute]) -> ControlFlow<()> {
        if name != ROOT_TAG {
            self.validity = Validity::Invalid;
            return ControlFlow::Break(());
        }

        self.validity = Validity::Valid;
        self.contexts.push((Context::Document, 0));
        for (key, value) in attributes {
            if key == "version" {
                self.version = Some(value.clone());
            } else if *key == self.extensions_attr {
                self.uses_extensions = true;
            }
        }
        ControlFlow::Continue(())
    }

    fn enter(&mut self, name: &str, attributes: &[Attribute], depth: usize) {
        let Some(&(context, context_depth)) = self.contexts.last() else {
            return;
        };

        if context == Context::Document && depth == 2 && name == "extensions" {
            self.uses_extensions = true;
            return;
        }
        if depth != context_depth + 1 {
            return;
        }

        match (context, name) {
            (Context::Document, "metadata") => {
                self.link_counter = 0;
                self.contexts.push((Context::Metadata, depth));
            }
            (Context::Metadata, "name") => self.open(MetadataKey::Name, depth),
            (Context::Metadata, "desc") => self.open(MetadataKey::Description, depth),
            (Context::Metadata, "time") => self.open(MetadataKey::Time, depth),
            (Context::Metadata, "keywords") => self.open(MetadataKey::Keywords, depth),
            (Context::Metadata, "author") => self.contexts.push((Context::Author, depth)),
            (Context::Metadata, "copyright") => {
                self.commit_attribute(MetadataKey::CopyrightAuthor, attribute(attributes, "author"));
                self.contexts.push((Context::Copyright, depth));
            }
            (Context::Metadata, "link") => {
                self.link_counter += 1;
                let n = self.link_counter;
                self.commit_attribute(MetadataKey::LinkHref(n), attribute(attributes, "href"));
                self.contexts.push((Context::Link(n), depth));
            }
            (Context::Author, "name") => self.open(MetadataKey::AuthorName, depth),
            (Context::Author, "email") => {
                let id = attribute(attributes, "id").unwrap_or_default();
                let domain = attribute(attributes, "domain").unwrap_or_default();
                if !id.is_empty() && !domain.is_empty() {
                    self.metadata
                        .insert(MetadataKey::AuthorEmail, format!("{id}@{domain}"));
                }
            }
            (Context::Author, "link") => {
                self.commit_attribute(MetadataKey::AuthorLinkHref, attribute(attributes, "href"));
                self.contexts.push((Context::AuthorLink, depth));
            }
            (Context::Copyright, "year") => self.open(MetadataKey::CopyrightYear, depth),
            (Context::Copyright, "license") => self.open(MetadataKey::CopyrightLicense, depth),
            (Context::Link(n), "text") => self.open(MetadataKey::LinkText(n), depth),
            (Context::Link(n), "type") => self.open(MetadataKey::LinkType(n), depth),
            (Context::AuthorLink, "text") => self.open(MetadataKey::AuthorLinkText, depth),
            (Context::AuthorLink, "type") => self.open(MetadataKey::AuthorLinkType, depth),
            _ => {}
        }
    }

    fn open(&mut self, key: MetadataKey, depth: usize) {
        self.open_value = Some(OpenValue {
            key,
            depth,
            value: String::new(),
        });
    }

    fn commit_attribute(&mut self, key: MetadataKey, value: Option<&str>) {
        if let Some(value) = value.filter(|v| !v.is_empty()) {
            self.metadata.insert(key, value);
        }
    }

    fn into_detection(self, chunks_read: usize, bytes_read: u64) -> Detection {
        if self.validity != Validity::Valid {
            return Detection {
                validity: Validity::Invalid,
                version: None,
                uses_extensions: false,
                metadata: MetadataMap::new(),
                chunks_read,
                bytes_read,
            };
        }

        if self.uses_extensions {
            log::debug!("It uses <extensions>");
        }

        let version = match self.version {
            None => {
                log::warn!(
                    "GPX schema version is unknown. The document may not be handled \
                     correctly and will be treated as GPX {DEFAULT_VERSION}."
                );
                DEFAULT_VERSION.to_string()
            }
            Some(version) if version == "1.0" || version == "1.1" => version,
            Some(version) => {
                log::warn!(
                    "GPX schema version '{version}' is not supported. The document may \
                     not be handled correctly and will be treated as GPX {DEFAULT_VERSION}."
                );
                version
            }
        };

        Detection {
            validity: Validity::Valid,
            version: Some(version),
            uses_extensions: self.uses_extensions,
            metadata: self.metadata,
            chunks_read,
            bytes_read,
        }
    }
}

fn attribute<'a>(attributes: &'a [Attribute], name: &str) -> Option<&'a str> {
    attributes
        .iter()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.as_str())
}

impl XmlHandler for DetectState {
    fn start_element(&mut self, name: &str, attributes: &[Attribute]) -> ControlFlow<()> {
        let depth = self.depth;
        self.depth += 1;

        match self.validity {
            Validity::Unknown => self.classify(name, attributes),
            Validity::Valid => {
                self.enter(name, attributes, depth);
                ControlFlow::Continue(())
            }
            Validity::Invalid => ControlFlow::Break(()),
        }
    }

    fn end_element(&mut self, _name: &str) -> ControlFlow<()> {
        self.depth = self.depth.saturating_sub(1);
        let depth = self.depth;

        if self.open_value.as_ref().is_some_and(|v| v.depth == depth) {
            if let Some(open) = self.open_value.take() {
                self.metadata.insert(open.key, open.value);
            }
        }
        if matches!(self.contexts.last(), Some(&(context, d)) if d == depth && context != Context::Document)
        {
            self.contexts.pop();
        }
        ControlFlow::Continue(())
    }

    fn character_data(&mut self, data: &str) -> ControlFlow<()> {
        if self.charge_guard().is_break() {
            return ControlFlow::Break(());
        }

        if let Some(open) = &mut self.open_value {
            open.value.push_str(data);
        }
        ControlFlow::Continue(())
    }

    // Entities expanding to nothing produce no character data, so each
    // expansion is charged as well.
    fn entity_reference(&mut self, _name: &str) -> ControlFlow<()> {
        self.charge_guard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use tempfile::NamedTempFile;

    /// Helper to create a temp file with given content
    fn create_temp_file(content: &[u8]) -> NamedTempFile {
        let mut file = NamedTempFile::with_suffix(".gpx").unwrap();
        file.write_all(content).unwrap();
        file.flush().unwrap();
        file
    }

    fn detect_str(content: &str) -> Result<Detection> {
        Detector::default().detect(Cursor::new(content.as_bytes()))
    }

    fn small_chunks(chunk_size: usize) -> Detector {
        Detector::new(DetectorConfig {
            chunk_size,
            ..DetectorConfig::default()
        })
    }

    #[test]
    fn test_short_non_xml_file_is_invalid() {
        let file = create_temp_file(b"not xml!!!");
        let detection = detect_path(file.path()).unwrap();
        assert_eq!(detection.validity, Validity::Invalid);
        assert_eq!(detection.chunks_read, 1);
        assert_eq!(detection.bytes_read, 10);
    }

    #[test]
    fn test_nonexistent_file_is_io_error() {
        let result = detect_path("nonexistent.gpx");
        assert!(matches!(result, Err(GpxError::Io(_))));
    }

    #[test]
    fn test_other_root_reads_one_chunk() {
        let mut content = String::from(r#"<?xml version="1.0"?><kml><Document>"#);
        while content.len() < 100_000 {
            content.push_str("<Placemark><name>x</name></Placemark>\n");
        }
        content.push_str("</Document></kml>");

        let detection = detect_str(&content).unwrap();
        assert_eq!(detection.validity, Validity::Invalid);
        assert_eq!(detection.chunks_read, 1);
        assert!(detection.metadata.is_empty());
    }

    #[test]
    fn test_gpx_1_0_without_extensions() {
        let detection =
            detect_str(r#"<?xml version="1.0"?><gpx version="1.0"><wpt lat="1" lon="2"/></gpx>"#)
                .unwrap();
        assert!(detection.is_valid());
        assert_eq!(detection.version.as_deref(), Some("1.0"));
        assert_eq!(detection.gpx_version(), Some(GpxVersion::V1_0));
        assert!(!detection.uses_extensions);
    }

    #[test]
    fn test_missing_version_defaults_to_1_1() {
        let detection = detect_str("<gpx><wpt lat=\"1\" lon=\"2\"/></gpx>").unwrap();
        assert!(detection.is_valid());
        assert_eq!(detection.version.as_deref(), Some("1.1"));
        assert_eq!(detection.gpx_version(), Some(GpxVersion::V1_1));
    }

    #[test]
    fn test_unknown_version_is_kept() {
        let detection = detect_str(r#"<gpx version="2.0"></gpx>"#).unwrap();
        assert!(detection.is_valid());
        assert_eq!(detection.version.as_deref(), Some("2.0"));
        assert_eq!(detection.gpx_version(), Some(GpxVersion::V1_1));
    }

    #[test]
    fn test_full_metadata_block() {
        let content = r#"<?xml version="1.0" encoding="UTF-8"?>
<gpx version="1.1" creator="TestApp" xmlns="http://www.topografix.com/GPX/1/1">
  <metadata>
    <name>Summer &amp; Bike Ride</name>
    <desc>100km cycling event</desc>
    <author>
      <name>John Doe</name>
      <email id="john" domain="example.com"/>
      <link href="https://example.com/john"><text>Homepage</text><type>text/html</type></link>
    </author>
    <copyright author="ACME"><year>2023</year><license>CC-BY</license></copyright>
    <link href="https://example.com/a"><text>First</text></link>
    <link href="https://example.com/b"><type>image/png</type></link>
    <time>2023-06-01T08:00:00Z</time>
    <keywords>bike, summer</keywords>
    <bounds minlat="1" minlon="2" maxlat="3" maxlon="4"/>
  </metadata>
  <wpt lat="1" lon="2"><name>Not metadata</name></wpt>
</gpx>"#;

        let detection = detect_str(content).unwrap();
        assert!(detection.is_valid());
        assert!(!detection.uses_extensions);

        let m = &detection.metadata;
        assert_eq!(m.get(MetadataKey::Name), Some("Summer & Bike Ride"));
        assert_eq!(m.get(MetadataKey::Description), Some("100km cycling event"));
        assert_eq!(m.get(MetadataKey::AuthorName), Some("John Doe"));
        assert_eq!(m.get(MetadataKey::AuthorEmail), Some("john@example.com"));
        assert_eq!(m.get(MetadataKey::AuthorLinkHref), Some("https://example.com/john"));
        assert_eq!(m.get(MetadataKey::AuthorLinkText), Some("Homepage"));
        assert_eq!(m.get(MetadataKey::AuthorLinkType), Some("text/html"));
        assert_eq!(m.get(MetadataKey::CopyrightAuthor), Some("ACME"));
        assert_eq!(m.get(MetadataKey::CopyrightYear), Some("2023"));
        assert_eq!(m.get(MetadataKey::CopyrightLicense), Some("CC-BY"));
        assert_eq!(m.get(MetadataKey::LinkHref(1)), Some("https://example.com/a"));
        assert_eq!(m.get(MetadataKey::LinkText(1)), Some("First"));
        assert_eq!(m.get(MetadataKey::LinkHref(2)), Some("https://example.com/b"));
        assert_eq!(m.get(MetadataKey::LinkType(2)), Some("image/png"));
        assert_eq!(m.get(MetadataKey::Time), Some("2023-06-01T08:00:00Z"));
        assert_eq!(m.get(MetadataKey::Keywords), Some("bike, summer"));
        assert_eq!(m.len(), 16);
    }

    #[test]
    fn test_unexpected_nesting_is_ignored() {
        let content = r#"<gpx version="1.1">
  <metadata>
    <author><foo><name>Hidden</name></foo><name>Shown</name></author>
    <extra><name>Also hidden</name></extra>
    <email id="a" domain="b"/>
  </metadata>
  <name>Outside metadata</name>
</gpx>"#;
        let detection = detect_str(content).unwrap();
        let m = &detection.metadata;
        assert_eq!(m.get(MetadataKey::AuthorName), Some("Shown"));
        assert_eq!(m.get(MetadataKey::Name), None);
        assert_eq!(m.get(MetadataKey::AuthorEmail), None);
        assert_eq!(m.len(), 1);
    }

    #[test]
    fn test_incomplete_email_is_skipped() {
        let content = r#"<gpx version="1.1"><metadata><author><email id="john"/></author></metadata></gpx>"#;
        let detection = detect_str(content).unwrap();
        assert!(detection.metadata.is_empty());
    }

    #[test]
    fn test_empty_element_commits_empty_value() {
        let detection = detect_str(r#"<gpx><metadata><name></name><desc/></metadata></gpx>"#).unwrap();
        assert_eq!(detection.metadata.get(MetadataKey::Name), Some(""));
        assert_eq!(detection.metadata.get(MetadataKey::Description), Some(""));
    }

    #[test]
    fn test_metadata_across_small_chunks() {
        let content = r#"<?xml version="1.0"?><gpx version="1.1"><metadata><name>A long name split over several chunks &amp; more</name><link href="h"><text>t</text></link></metadata><wpt lat="1" lon="2"/></gpx>"#;
        let whole = detect_str(content).unwrap();
        let chunked = small_chunks(32).detect(Cursor::new(content)).unwrap();
        assert!(chunked.chunks_read > 1);
        assert_eq!(whole.metadata, chunked.metadata);
        assert_eq!(
            chunked.metadata.get(MetadataKey::Name),
            Some("A long name split over several chunks & more")
        );
    }

    #[test]
    fn test_extensions_namespace_stops_early() {
        let mut content = String::from(
            r#"<?xml version="1.0"?><gpx version="1.1" xmlns:ogr="http://osgeo.org/gdal">"#,
        );
        for _ in 0..200 {
            content.push_str(r#"<wpt lat="1" lon="2"><name>p</name></wpt>"#);
        }
        content.push_str("</gpx>");

        let detection = small_chunks(256).detect(Cursor::new(&content)).unwrap();
        assert!(detection.is_valid());
        assert!(detection.uses_extensions);
        assert_eq!(detection.chunks_read, 1);
    }

    #[test]
    fn test_custom_extensions_prefix() {
        let content = r#"<gpx version="1.1" xmlns:my="urn:x"></gpx>"#;
        assert!(!detect_str(content).unwrap().uses_extensions);

        let detector = Detector::new(DetectorConfig {
            extensions_prefix: "my".to_string(),
            ..DetectorConfig::default()
        });
        assert!(detector.detect(Cursor::new(content)).unwrap().uses_extensions);
    }

    #[test]
    fn test_extensions_element_in_body() {
        let content = r#"<gpx version="1.1">
  <metadata><extensions><x>1</x></extensions></metadata>
  <wpt lat="1" lon="2"><extensions><speed>3</speed></extensions></wpt>
</gpx>"#;
        assert!(detect_str(content).unwrap().uses_extensions);

        let metadata_only = r#"<gpx version="1.1"><metadata><extensions/></metadata></gpx>"#;
        assert!(!detect_str(metadata_only).unwrap().uses_extensions);
    }

    #[test]
    fn test_scan_limit_stops_valid_document() {
        let mut content = String::from(r#"<gpx version="1.1">"#);
        while content.len() < 20_000 {
            content.push_str(r#"<wpt lat="1" lon="2"/>"#);
        }
        content.push_str("</gpx>");

        let detector = Detector::new(DetectorConfig {
            chunk_size: 256,
            extension_scan_limit: 1024,
            ..DetectorConfig::default()
        });
        let detection = detector.detect(Cursor::new(&content)).unwrap();
        assert!(detection.is_valid());
        assert!(!detection.uses_extensions);
        assert_eq!(detection.chunks_read, 5);
        assert!(detection.bytes_read < content.len() as u64);
    }

    #[test]
    fn test_gives_up_after_inconclusive_chunks() {
        let mut content = String::from("<?xml version=\"1.0\"?>\n<!--");
        content.push_str(&"x".repeat(10_000));
        content.push_str("-->\n<gpx version=\"1.1\"/>");

        let impatient = Detector::new(DetectorConfig {
            chunk_size: 256,
            max_inconclusive_chunks: 4,
            ..DetectorConfig::default()
        });
        let detection = impatient.detect(Cursor::new(&content)).unwrap();
        assert_eq!(detection.validity, Validity::Invalid);
        assert_eq!(detection.chunks_read, 4);

        let patient = small_chunks(256).detect(Cursor::new(&content)).unwrap();
        assert!(patient.is_valid());
    }

    #[test]
    fn test_entity_amplification_is_rejected() {
        let content = r#"<?xml version="1.0"?>
<!DOCTYPE gpx [
  <!ENTITY lol "lol">
  <!ENTITY lol1 "&lol;&lol;&lol;&lol;&lol;&lol;&lol;&lol;&lol;&lol;">
  <!ENTITY lol2 "&lol1;&lol1;&lol1;&lol1;&lol1;&lol1;&lol1;&lol1;&lol1;&lol1;">
  <!ENTITY lol3 "&lol2;&lol2;&lol2;&lol2;&lol2;&lol2;&lol2;&lol2;&lol2;&lol2;">
  <!ENTITY lol4 "&lol3;&lol3;&lol3;&lol3;&lol3;&lol3;&lol3;&lol3;&lol3;&lol3;">
  <!ENTITY lol9 "&lol4;&lol4;&lol4;&lol4;&lol4;&lol4;&lol4;&lol4;&lol4;&lol4;">
]>
<gpx version="1.1"><metadata><name>&lol9;</name></metadata></gpx>"#;
        assert!(content.len() < 8192);

        let result = detect_str(content);
        assert!(matches!(
            result,
            Err(GpxError::EntityAmplification { chunk: 1 })
        ));
    }

    /// DOCTYPE declaring `e0` as an empty entity and each `eN` as ten `e(N-1)`
    fn empty_entity_chain(levels: usize) -> String {
        let mut doctype = String::from("<?xml version=\"1.0\"?>\n<!DOCTYPE gpx [\n  <!ENTITY e0 \"\">\n");
        for level in 1..=levels {
            let refs = format!("&e{};", level - 1).repeat(10);
            doctype.push_str(&format!("  <!ENTITY e{level} \"{refs}\">\n"));
        }
        doctype.push_str("]>\n");
        doctype
    }

    #[test]
    fn test_empty_entity_amplification_in_text_is_rejected() {
        let mut content = empty_entity_chain(9);
        content.push_str("<gpx version=\"1.1\"><metadata><name>&e9;</name></metadata></gpx>");
        assert!(content.len() < 8192);

        let started = std::time::Instant::now();
        assert!(matches!(
            detect_str(&content),
            Err(GpxError::EntityAmplification { chunk: 1 })
        ));
        assert!(started.elapsed() < std::time::Duration::from_secs(5));
    }

    #[test]
    fn test_empty_entity_amplification_in_attribute_is_rejected() {
        let mut content = empty_entity_chain(9);
        content.push_str("<gpx version=\"1.1\" creator=\"&e9;\"></gpx>");

        let started = std::time::Instant::now();
        assert!(matches!(
            detect_str(&content),
            Err(GpxError::EntityAmplification { chunk: 1 })
        ));
        assert!(started.elapsed() < std::time::Duration::from_secs(5));
    }

    #[test]
    fn test_few_entity_references_are_accepted() {
        let mut content = empty_entity_chain(1);
        content.push_str("<gpx version=\"1.1\" creator=\"&e1;\"><metadata><name>A&e1;B</name></metadata></gpx>");

        let detection = detect_str(&content).unwrap();
        assert!(detection.is_valid());
        assert_eq!(detection.metadata.get(MetadataKey::Name), Some("AB"));
    }

    #[test]
    fn test_amplification_wins_over_later_errors() {
        let content = r#"<!DOCTYPE gpx [
  <!ENTITY a "x&#10;x&#10;x&#10;x&#10;x&#10;x&#10;x&#10;x&#10;x&#10;x&#10;">
  <!ENTITY b "&a;&a;&a;&a;&a;&a;&a;&a;&a;&a;">
  <!ENTITY c "&b;&b;&b;&b;&b;&b;&b;&b;&b;&b;">
  <!ENTITY d "&c;&c;&c;&c;&c;&c;&c;&c;&c;&c;">
]>
<gpx><wpt><name>&d;</name></wpt></oops>"#;
        assert!(matches!(
            detect_str(content),
            Err(GpxError::EntityAmplification { .. })
        ));
    }

    #[test]
    fn test_malformed_gpx_with_prolog_is_reported() {
        let content = "<?xml version=\"1.0\"?>\n<gpx version=\"1.1\" version=\"1.0\"></gpx>";
        match detect_str(content) {
            Err(GpxError::Xml { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected XML error, got {other:?}"),
        }
    }

    #[test]
    fn test_malformed_without_prolog_is_silent() {
        let detection = detect_str(r#"<gpx version="1.1" version="1.0"></gpx>"#).unwrap();
        assert_eq!(detection.validity, Validity::Invalid);
    }

    #[test]
    fn test_malformed_after_recognition_is_silent() {
        let content = "<?xml version=\"1.0\"?>\n<gpx version=\"1.1\"><wpt></trk></gpx>";
        let detection = detect_str(content).unwrap();
        assert_eq!(detection.validity, Validity::Invalid);
        assert!(detection.metadata.is_empty());
    }

    #[test]
    fn test_empty_input() {
        let detection = detect_str("").unwrap();
        assert_eq!(detection.validity, Validity::Invalid);
        assert_eq!(detection.chunks_read, 1);
        assert_eq!(detection.bytes_read, 0);
    }
}
