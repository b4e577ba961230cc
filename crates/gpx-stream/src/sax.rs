//! Push-style XML event parsing
//!
//! `quick-xml` pulls events out of a complete buffer. [`ChunkParser`] turns it
//! into a push parser: input arrives in arbitrary chunks, events are delivered
//! to an [`XmlHandler`], and incomplete markup at the end of a non-final chunk
//! is carried over to the next one.
//!
//! Character data is reported in segments the way expat-style parsers do it:
//! literal runs are split at line ends and every entity or character reference
//! produces its own callback. Internal entities declared in the DOCTYPE are
//! expanded lazily, so the number of callbacks can be far larger than the
//! input. Handlers that care about that must bound their own work; every
//! expansion of a declared entity is reported through
//! [`XmlHandler::entity_reference`] first, even when it yields no text.

use once_cell::sync::Lazy;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use regex::Regex;
use std::collections::HashMap;
use std::ops::ControlFlow;
use thiserror::Error;

/// Attribute as an unescaped `(name, value)` pair, in document order
pub type Attribute = (String, String);

const MAX_ENTITY_DEPTH: usize = 64;
const MAX_ATTRIBUTE_LEN: usize = 1 << 20;

static ENTITY_DECL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<!ENTITY\s+([A-Za-z_][\w.:-]*)\s+(?:"([^"]*)"|'([^']*)')\s*>"#)
        .expect("Invalid entity declaration regex")
});

/// Receiver of parse events.
///
/// Returning [`ControlFlow::Break`] from any callback stops the parser; the
/// current and every later [`ChunkParser::feed`] then fail with
/// [`ParseErrorKind::Aborted`].
pub trait XmlHandler {
    /// Called for every start tag (and for the start half of an empty element)
    fn start_element(&mut self, name: &str, attributes: &[Attribute]) -> ControlFlow<()>;

    /// Called for every end tag (and for the end half of an empty element)
    fn end_element(&mut self, name: &str) -> ControlFlow<()>;

    /// Called for each segment of character data inside the root element
    fn character_data(&mut self, data: &str) -> ControlFlow<()>;

    /// Called before a declared entity is expanded, in text and in attribute
    /// values alike. Predefined and character references are not reported.
    fn entity_reference(&mut self, _name: &str) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }
}

/// Piece of expanded content handed to an expansion callback
enum Piece<'a> {
    Text(&'a str),
    Entity(&'a str),
}

/// What went wrong while parsing
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseErrorKind {
    /// Syntax error reported by the tokenizer
    #[error("syntax error: {0}")]
    Syntax(String),

    /// Bytes that are not UTF-8
    #[error("not well-formed (invalid token)")]
    Encoding,

    /// Non-whitespace content before the root element
    #[error("syntax error: text outside of the root element")]
    TextOutsideRoot,

    /// Content after the root element was closed
    #[error("junk after document element")]
    JunkAfterRoot,

    /// End tag not matching the innermost open element
    #[error("mismatched tag: expected </{expected}>, found </{found}>")]
    MismatchedTag {
        /// Innermost open element
        expected: String,
        /// End tag actually found
        found: String,
    },

    /// End tag with no open element
    #[error("unexpected end tag </{0}>")]
    UnexpectedEndTag(String),

    /// Input ended without any element
    #[error("no element found")]
    NoRootElement,

    /// Input ended with an element still open
    #[error("unclosed token: <{0}>")]
    UnclosedElement(String),

    /// Reference to an entity that was never declared
    #[error("undefined entity &{0};")]
    UndefinedEntity(String),

    /// Entity whose expansion refers back to itself
    #[error("recursive entity reference &{0};")]
    RecursiveEntity(String),

    /// Malformed `&...;` reference
    #[error("invalid reference: &{0}")]
    InvalidReference(String),

    /// An attribute value expanded beyond the allowed size
    #[error("entity expansion limit exceeded in attribute value")]
    ExpansionLimit,

    /// A handler asked the parser to stop
    #[error("parsing aborted")]
    Aborted,
}

/// Parse error with its location in the input
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} at line {line}, column {column}")]
pub struct ParseError {
    /// What went wrong
    pub kind: ParseErrorKind,
    /// 1-based line number
    pub line: u64,
    /// 0-based byte column within the line
    pub column: u64,
}

impl ParseError {
    /// Whether the parser stopped because a handler asked it to
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        self.kind == ParseErrorKind::Aborted
    }
}

type Failure = (usize, ParseErrorKind);

/// Incremental XML parser fed with chunks of bytes
#[derive(Debug)]
pub struct ChunkParser {
    pending: Vec<u8>,
    open: Vec<String>,
    entities: HashMap<String, String>,
    line: u64,
    column: u64,
    seen_root: bool,
    failed: Option<ParseError>,
}

impl Default for ChunkParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ChunkParser {
    /// Create a parser positioned at the start of a document
    #[must_use]
    pub fn new() -> Self {
        Self {
            pending: Vec::new(),
            open: Vec::new(),
            entities: HashMap::new(),
            line: 1,
            column: 0,
            seen_root: false,
            failed: None,
        }
    }

    /// Current element nesting, outermost first
    #[must_use]
    pub fn open_elements(&self) -> &[String] {
        &self.open
    }

    /// Feed the next chunk of input.
    ///
    /// `is_final` marks the end of input: nothing is carried over and the
    /// document must be complete.
    ///
    /// # Errors
    ///
    /// Returns the first well-formedness error, or [`ParseErrorKind::Aborted`]
    /// when a handler stopped parsing. Once an error was returned, every later
    /// call returns it again.
    pub fn feed<H: XmlHandler>(
        &mut self,
        handler: &mut H,
        chunk: &[u8],
        is_final: bool,
    ) -> Result<(), ParseError> {
        if let Some(err) = &self.failed {
            return Err(err.clone());
        }

        let mut data = std::mem::take(&mut self.pending);
        data.extend_from_slice(chunk);

        let outcome = self
            .parse(handler, &data, is_final)
            .and_then(|consumed| {
                if is_final {
                    self.check_complete(&data, consumed).map(|()| consumed)
                } else {
                    Ok(consumed)
                }
            });

        match outcome {
            Ok(consumed) => {
                (self.line, self.column) = self.locate(&data[..consumed]);
                data.drain(..consumed);
                self.pending = data;
                Ok(())
            }
            Err((offset, kind)) => {
                let (line, column) = self.locate(&data[..offset.min(data.len())]);
                let err = ParseError { kind, line, column };
                self.failed = Some(err.clone());
                Err(err)
            }
        }
    }

    /// Parse as many complete events as `data` holds, returning the number of
    /// bytes consumed.
    fn parse<H: XmlHandler>(
        &mut self,
        handler: &mut H,
        data: &[u8],
        is_final: bool,
    ) -> Result<usize, Failure> {
        let mut reader = Reader::from_reader(data);
        reader
            .check_end_names(false)
            .expand_empty_elements(false)
            .trim_text(false);

        // A text event also consumes the `<` that ends it, so resuming after
        // one has to step back over that byte.
        let mut after_text = false;
        loop {
            let position = reader.buffer_position();
            let start = if after_text && position > 0 && data[position - 1] == b'<' {
                position - 1
            } else {
                position
            };
            after_text = false;

            let event = match reader.read_event() {
                Ok(event) => event,
                Err(quick_xml::Error::UnexpectedEof(_)) if !is_final => return Ok(start),
                Err(err) => {
                    return Err((
                        reader.buffer_position(),
                        ParseErrorKind::Syntax(err.to_string()),
                    ))
                }
            };

            let flow = match event {
                Event::Start(e) => self.on_start(handler, &e).map_err(|kind| (start, kind))?,
                Event::Empty(e) => match self.on_start(handler, &e).map_err(|kind| (start, kind))? {
                    ControlFlow::Continue(()) => self
                        .on_end(handler, e.name().as_ref())
                        .map_err(|kind| (start, kind))?,
                    flow => flow,
                },
                Event::End(e) => self
                    .on_end(handler, e.name().as_ref())
                    .map_err(|kind| (start, kind))?,
                Event::Text(e) => {
                    after_text = true;
                    let raw = e.into_inner();
                    if self.open.is_empty() {
                        if raw.iter().all(u8::is_ascii_whitespace) {
                            continue;
                        }
                        let kind = if self.seen_root {
                            ParseErrorKind::JunkAfterRoot
                        } else {
                            ParseErrorKind::TextOutsideRoot
                        };
                        return Err((start, kind));
                    }
                    // Text running into the end of a non-final chunk may be
                    // cut inside a reference or a UTF-8 sequence.
                    if !is_final && reader.buffer_position() >= data.len() {
                        return Ok(start);
                    }
                    let text = utf8(&raw).map_err(|kind| (start, kind))?;
                    expand_text(text, &self.entities, handler).map_err(|kind| (start, kind))?
                }
                Event::CData(e) => {
                    if self.open.is_empty() {
                        return Err((start, ParseErrorKind::TextOutsideRoot));
                    }
                    let raw = e.into_inner();
                    let text = utf8(&raw).map_err(|kind| (start, kind))?;
                    emit_literal(text, &mut |piece: Piece<'_>| match piece {
                        Piece::Text(segment) => handler.character_data(segment),
                        Piece::Entity(name) => handler.entity_reference(name),
                    })
                }
                Event::DocType(e) => {
                    let raw = e.into_inner();
                    let text = utf8(&raw).map_err(|kind| (start, kind))?;
                    self.declare_entities(text);
                    ControlFlow::Continue(())
                }
                Event::Eof => return Ok(start),
                Event::Decl(_) | Event::PI(_) | Event::Comment(_) => ControlFlow::Continue(()),
            };

            if flow.is_break() {
                return Err((reader.buffer_position(), ParseErrorKind::Aborted));
            }
        }
    }

    fn on_start<H: XmlHandler>(
        &mut self,
        handler: &mut H,
        element: &BytesStart<'_>,
    ) -> Result<ControlFlow<()>, ParseErrorKind> {
        if self.open.is_empty() && self.seen_root {
            return Err(ParseErrorKind::JunkAfterRoot);
        }

        let name = utf8(element.name().as_ref())?.to_owned();
        let mut attributes = Vec::new();
        for attr in element.attributes() {
            let attr = attr.map_err(|err| ParseErrorKind::Syntax(err.to_string()))?;
            let key = utf8(attr.key.as_ref())?.to_owned();
            let value = expand_attribute(utf8(&attr.value)?, &self.entities, handler)?;
            attributes.push((key, value));
        }

        self.seen_root = true;
        let flow = handler.start_element(&name, &attributes);
        self.open.push(name);
        Ok(flow)
    }

    fn on_end<H: XmlHandler>(
        &mut self,
        handler: &mut H,
        name: &[u8],
    ) -> Result<ControlFlow<()>, ParseErrorKind> {
        let name = utf8(name)?;
        match self.open.pop() {
            Some(open) if open == name => Ok(handler.end_element(name)),
            Some(open) => Err(ParseErrorKind::MismatchedTag {
                expected: open,
                found: name.to_owned(),
            }),
            None => Err(ParseErrorKind::UnexpectedEndTag(name.to_owned())),
        }
    }

    fn declare_entities(&mut self, doctype: &str) {
        for caps in ENTITY_DECL.captures_iter(doctype) {
            let value = caps.get(2).or_else(|| caps.get(3)).map_or("", |m| m.as_str());
            self.entities
                .entry(caps[1].to_owned())
                .or_insert_with(|| value.to_owned());
        }
    }

    fn check_complete(&self, data: &[u8], consumed: usize) -> Result<(), Failure> {
        if consumed < data.len() {
            return Err((
                consumed,
                ParseErrorKind::Syntax("unexpected end of input".to_owned()),
            ));
        }
        if !self.seen_root {
            return Err((data.len(), ParseErrorKind::NoRootElement));
        }
        if let Some(open) = self.open.last() {
            return Err((data.len(), ParseErrorKind::UnclosedElement(open.clone())));
        }
        Ok(())
    }

    fn locate(&self, consumed: &[u8]) -> (u64, u64) {
        let mut line = self.line;
        let mut column = self.column;
        for &byte in consumed {
            if byte == b'\n' {
                line += 1;
                column = 0;
            } else {
                column += 1;
            }
        }
        (line, column)
    }
}

fn utf8(bytes: &[u8]) -> Result<&str, ParseErrorKind> {
    std::str::from_utf8(bytes).map_err(|_| ParseErrorKind::Encoding)
}

fn expand_text<H: XmlHandler>(
    text: &str,
    entities: &HashMap<String, String>,
    handler: &mut H,
) -> Result<ControlFlow<()>, ParseErrorKind> {
    let mut emit = |piece: Piece<'_>| match piece {
        Piece::Text(segment) => handler.character_data(segment),
        Piece::Entity(name) => handler.entity_reference(name),
    };
    expand(text, entities, &mut Vec::new(), &mut emit)
}

/// Expand references in an attribute value. A handler stopping on an entity
/// reference surfaces as [`ParseErrorKind::Aborted`].
fn expand_attribute<H: XmlHandler>(
    raw: &str,
    entities: &HashMap<String, String>,
    handler: &mut H,
) -> Result<String, ParseErrorKind> {
    if !raw.contains(|c| matches!(c, '&' | '\r' | '\n')) {
        return Ok(raw.to_owned());
    }

    let mut value = String::new();
    let mut aborted = false;
    let mut emit = |piece: Piece<'_>| match piece {
        Piece::Text(segment) => {
            value.push_str(if segment == "\n" { " " } else { segment });
            if value.len() > MAX_ATTRIBUTE_LEN {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        }
        Piece::Entity(name) => {
            let flow = handler.entity_reference(name);
            aborted = flow.is_break();
            flow
        }
    };
    if expand(raw, entities, &mut Vec::new(), &mut emit)?.is_break() {
        return Err(if aborted {
            ParseErrorKind::Aborted
        } else {
            ParseErrorKind::ExpansionLimit
        });
    }
    Ok(value)
}

fn expand<'e>(
    text: &str,
    entities: &'e HashMap<String, String>,
    stack: &mut Vec<&'e str>,
    emit: &mut dyn FnMut(Piece<'_>) -> ControlFlow<()>,
) -> Result<ControlFlow<()>, ParseErrorKind> {
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        if emit_literal(&rest[..amp], emit).is_break() {
            return Ok(ControlFlow::Break(()));
        }

        let after = &rest[amp + 1..];
        let Some(semi) = after.find(';') else {
            let shown: String = after.chars().take(16).collect();
            return Err(ParseErrorKind::InvalidReference(shown));
        };
        let name = &after[..semi];
        rest = &after[semi + 1..];

        let flow = if let Some(c) = resolve_reference(name)? {
            let mut buf = [0u8; 4];
            emit(Piece::Text(c.encode_utf8(&mut buf)))
        } else {
            let (key, value) = entities
                .get_key_value(name)
                .ok_or_else(|| ParseErrorKind::UndefinedEntity(name.to_owned()))?;
            if stack.len() >= MAX_ENTITY_DEPTH || stack.contains(&key.as_str()) {
                return Err(ParseErrorKind::RecursiveEntity(name.to_owned()));
            }
            if emit(Piece::Entity(key.as_str())).is_break() {
                return Ok(ControlFlow::Break(()));
            }
            stack.push(key.as_str());
            let flow = expand(value, entities, stack, emit)?;
            stack.pop();
            flow
        };

        if flow.is_break() {
            return Ok(flow);
        }
    }
    Ok(emit_literal(rest, emit))
}

/// Resolve predefined and character references; `None` means a named entity.
fn resolve_reference(name: &str) -> Result<Option<char>, ParseErrorKind> {
    let c = match name {
        "lt" => '<',
        "gt" => '>',
        "amp" => '&',
        "apos" => '\'',
        "quot" => '"',
        _ => {
            let code = if let Some(hex) = name.strip_prefix("#x") {
                u32::from_str_radix(hex, 16).ok()
            } else if let Some(dec) = name.strip_prefix('#') {
                dec.parse::<u32>().ok()
            } else {
                return Ok(None);
            };
            return code
                .and_then(char::from_u32)
                .filter(|&c| c != '\0')
                .map(Some)
                .ok_or_else(|| ParseErrorKind::InvalidReference(format!("{name};")));
        }
    };
    Ok(Some(c))
}

/// Emit literal text, one segment per line with `\r\n` and `\r` folded to `\n`.
fn emit_literal(text: &str, emit: &mut dyn FnMut(Piece<'_>) -> ControlFlow<()>) -> ControlFlow<()> {
    let mut rest = text;
    while let Some(pos) = rest.find(|c| c == '\r' || c == '\n') {
        if pos > 0 && emit(Piece::Text(&rest[..pos])).is_break() {
            return ControlFlow::Break(());
        }
        if emit(Piece::Text("\n")).is_break() {
            return ControlFlow::Break(());
        }
        let skip = if rest[pos..].starts_with("\r\n") { 2 } else { 1 };
        rest = &rest[pos + skip..];
    }
    if rest.is_empty() {
        ControlFlow::Continue(())
    } else {
        emit(Piece::Text(rest))
    }
}
