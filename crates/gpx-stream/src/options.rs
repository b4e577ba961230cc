//! Writer options
//!
//! Options can be built directly, loaded with serde (the CLI reads them from
//! TOML), or set from `KEY=VALUE` creation options as a GIS tool would pass
//! them.

use crate::error::{GpxError, Result};
use crate::metadata::{MetadataKey, MetadataMap};
use crate::xml::is_ncname;
use serde::{Deserialize, Serialize};

/// Namespace prefix used for extension elements unless overridden
pub const DEFAULT_EXTENSIONS_PREFIX: &str = "ogr";

/// Namespace URL bound to the default extension prefix
pub const DEFAULT_EXTENSIONS_URL: &str = "http://osgeo.org/gdal";

/// Line terminator written after each line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LineEnding {
    /// `\n`
    #[serde(rename = "LF", alias = "lf")]
    Lf,
    /// `\r\n`
    #[serde(rename = "CRLF", alias = "crlf")]
    CrLf,
}

impl LineEnding {
    /// CRLF on Windows, LF elsewhere
    #[must_use]
    pub const fn platform_default() -> Self {
        if cfg!(windows) {
            Self::CrLf
        } else {
            Self::Lf
        }
    }

    /// The terminator itself
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Lf => "\n",
            Self::CrLf => "\r\n",
        }
    }
}

/// Options controlling how a [`GpxWriter`](crate::GpxWriter) lays out its
/// document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriterOptions {
    /// Line terminator; `None` means the platform default
    pub line_ending: Option<LineEnding>,

    /// Write point extension fields under `<extensions>`
    pub use_extensions: bool,

    /// Namespace prefix of extension elements
    pub extensions_prefix: String,

    /// Namespace URL bound to `extensions_prefix`
    pub extensions_url: String,

    /// Value of the `creator` attribute
    pub creator: String,

    /// Content of the `<metadata>` block
    pub metadata: MetadataMap,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            line_ending: None,
            use_extensions: false,
            extensions_prefix: DEFAULT_EXTENSIONS_PREFIX.to_string(),
            extensions_url: DEFAULT_EXTENSIONS_URL.to_string(),
            creator: default_creator(),
            metadata: MetadataMap::new(),
        }
    }
}

/// `creator` attribute written when none is configured
#[must_use]
pub fn default_creator() -> String {
    format!("gpx-stream {}", env!("CARGO_PKG_VERSION"))
}

impl WriterOptions {
    /// Build options from `KEY=VALUE` style pairs on top of the defaults
    ///
    /// # Errors
    ///
    /// See [`WriterOptions::apply`].
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut options = Self::default();
        options.apply(pairs)?;
        Ok(options)
    }

    /// Apply `KEY=VALUE` style pairs.
    ///
    /// The extension namespace is only overridden when both
    /// `GPX_EXTENSIONS_NS` and `GPX_EXTENSIONS_NS_URL` are given.
    ///
    /// # Errors
    ///
    /// Returns `GpxError::InvalidOption` for a boolean that cannot be parsed
    /// or a namespace prefix that is not a valid XML name.
    pub fn apply<I, K, V>(&mut self, pairs: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut ns_prefix = None;
        let mut ns_url = None;

        for (key, value) in pairs {
            let (key, value) = (key.as_ref(), value.as_ref());
            match key.to_ascii_uppercase().as_str() {
                "GPX_EXTENSIONS_NS" => ns_prefix = Some(value.to_string()),
                "GPX_EXTENSIONS_NS_URL" => ns_url = Some(value.to_string()),
                _ => self.set(key, value)?,
            }
        }

        match (ns_prefix, ns_url) {
            (Some(prefix), Some(url)) => {
                if !is_ncname(&prefix) {
                    return Err(GpxError::InvalidOption(format!(
                        "GPX_EXTENSIONS_NS={prefix} is not a valid namespace prefix"
                    )));
                }
                self.extensions_prefix = prefix;
                self.extensions_url = url;
            }
            (None, None) => {}
            _ => log::warn!(
                "GPX_EXTENSIONS_NS and GPX_EXTENSIONS_NS_URL must be set together; \
                 using {DEFAULT_EXTENSIONS_PREFIX}={DEFAULT_EXTENSIONS_URL}"
            ),
        }
        Ok(())
    }

    /// Set a single option.
    ///
    /// Unknown keys and unrecognized `LINEFORMAT` values are ignored with a
    /// warning.
    ///
    /// # Errors
    ///
    /// Returns `GpxError::InvalidOption` for a `GPX_USE_EXTENSIONS` value that
    /// is not a boolean.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let upper = key.to_ascii_uppercase();
        match upper.as_str() {
            "LINEFORMAT" => {
                self.line_ending = match value.to_ascii_uppercase().as_str() {
                    "CRLF" => Some(LineEnding::CrLf),
                    "LF" => Some(LineEnding::Lf),
                    _ => {
                        log::warn!("LINEFORMAT={value} not understood, use one of CRLF or LF.");
                        None
                    }
                };
            }
            "GPX_USE_EXTENSIONS" => {
                self.use_extensions = parse_bool(value).ok_or_else(|| {
                    GpxError::InvalidOption(format!("GPX_USE_EXTENSIONS={value} is not a boolean"))
                })?;
            }
            "GPX_EXTENSIONS_NS" | "GPX_EXTENSIONS_NS_URL" => {
                log::warn!("{upper} is only honored through WriterOptions::apply");
            }
            "CREATOR" => self.creator = value.to_string(),
            _ => match upper
                .strip_prefix("METADATA_")
                .and_then(|name| name.parse::<MetadataKey>().ok())
            {
                Some(metadata_key) => self.metadata.insert(metadata_key, value),
                None => log::warn!("Unknown creation option {key} ignored"),
            },
        }
        Ok(())
    }

    /// Line terminator with the platform default resolved
    #[must_use]
    pub fn resolved_line_ending(&self) -> LineEnding {
        self.line_ending.unwrap_or_else(LineEnding::platform_default)
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_uppercase().as_str() {
        "YES" | "TRUE" | "ON" | "1" => Some(true),
        "NO" | "FALSE" | "OFF" | "0" => Some(false),
        _ => None,
    }
}
