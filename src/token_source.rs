//! TokenSource: process-wide unique token generation and registry.
//!
//! Tokens are random 128-bit [`Uuid`]s. The registry of every token ever
//! generated or imported is a single process-wide set shared by all
//! `TokenSource` values, so two tokens minted anywhere in the process are
//! guaranteed distinct. Check-and-insert is atomic under the registry lock.

use std::collections::HashMap;
use std::io::BufRead;

use hashbrown::HashSet;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use quick_xml::events::Event;
use quick_xml::Reader;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

// Shared across all TokenSource values; init on first use.
static REGISTRY: Lazy<Mutex<HashSet<Uuid>>> = Lazy::new(|| Mutex::new(HashSet::new()));

/// Which markup node kind [`TokenSource::import_xml`] matches against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XmlNodeKind {
    /// Match elements by name and import their text content.
    Element,
    /// Match attributes by name on any element and import their values.
    Attribute,
}

/// Failure scanning a markup stream.
#[derive(Debug, Error)]
pub enum XmlImportError {
    #[error("malformed markup: {0}")]
    Parse(#[from] quick_xml::Error),
}

/// Handle to the process-wide token registry.
///
/// `TokenSource` is zero-sized and `Copy`; every value operates on the same
/// registry. [`TokenSource::clear`] therefore wipes the uniqueness history
/// for the whole process, not just for tokens minted through one handle.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenSource;

impl TokenSource {
    pub fn new() -> Self {
        TokenSource
    }

    /// Generates a fresh token, distinct from every token the registry has
    /// ever seen, registers it, and returns it.
    ///
    /// Candidates are drawn until one is absent from the registry; with
    /// random 128-bit candidates this terminates in O(1) expected
    /// iterations.
    pub fn new_token(&self) -> Uuid {
        let mut registry = REGISTRY.lock();
        loop {
            let candidate = Uuid::new_v4();
            if registry.insert(candidate) {
                return candidate;
            }
        }
    }

    /// Registers an externally-sourced token. Returns `false` if it was
    /// already present.
    pub fn add(&self, token: Uuid) -> bool {
        REGISTRY.lock().insert(token)
    }

    /// Parses `text` as a token and registers it. Returns `false` on parse
    /// failure or duplicate.
    pub fn add_text(&self, text: &str) -> bool {
        match Uuid::try_parse(text) {
            Ok(token) => self.add(token),
            Err(_) => false,
        }
    }

    /// Deregisters a token; returns whether it was present.
    pub fn remove(&self, token: Uuid) -> bool {
        REGISTRY.lock().remove(&token)
    }

    pub fn contains(&self, token: Uuid) -> bool {
        REGISTRY.lock().contains(&token)
    }

    pub fn len(&self) -> usize {
        REGISTRY.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        REGISTRY.lock().is_empty()
    }

    /// Wipes the entire shared registry. Every container in the process
    /// loses its uniqueness history.
    pub fn clear(&self) {
        let mut registry = REGISTRY.lock();
        debug!(discarded = registry.len(), "clearing token registry");
        registry.clear();
    }

    /// Registers every token found in `text`, which holds token texts joined
    /// by `delimiter`. Empty segments are skipped. Returns how many tokens
    /// were newly added.
    pub fn import_delimited(&self, text: &str, delimiter: &str) -> usize {
        let added = text
            .split(delimiter)
            .filter(|segment| !segment.is_empty())
            .filter(|segment| self.add_text(segment))
            .count();
        debug!(added, "imported delimited tokens");
        added
    }

    /// Registers the value of `column` in every row as token text. Rows
    /// missing the column are skipped. Returns how many tokens were newly
    /// added.
    pub fn import_rows<'a, I>(&self, rows: I, column: &str) -> usize
    where
        I: IntoIterator<Item = &'a HashMap<String, String>>,
    {
        let added = rows
            .into_iter()
            .filter_map(|row| row.get(column))
            .filter(|text| self.add_text(text))
            .count();
        debug!(added, column, "imported tabular tokens");
        added
    }

    /// Scans a markup stream and registers every matching value as token
    /// text.
    ///
    /// With [`XmlNodeKind::Element`] a match is an element named `name` with
    /// non-empty text content; with [`XmlNodeKind::Attribute`] it is the
    /// value of an attribute named `name` on any element. The element depth
    /// of the first match is latched, and from then on only nodes at that
    /// same depth (siblings) are considered.
    ///
    /// Returns how many tokens were newly added; fails only on malformed
    /// markup.
    pub fn import_xml<R: BufRead>(
        &self,
        reader: R,
        name: &str,
        kind: XmlNodeKind,
    ) -> Result<usize, XmlImportError> {
        let mut xml = Reader::from_reader(reader);
        let mut buf = Vec::new();
        let mut depth = 0usize;
        let mut target_depth: Option<usize> = None;
        // Depth of a matched element whose text content is still pending.
        let mut pending_text: Option<usize> = None;
        let mut added = 0usize;

        loop {
            match xml.read_event_into(&mut buf)? {
                Event::Start(start) => {
                    depth += 1;
                    if target_depth.map_or(true, |d| d == depth) {
                        match kind {
                            XmlNodeKind::Element => {
                                if start.local_name().as_ref() == name.as_bytes() {
                                    pending_text = Some(depth);
                                }
                            }
                            XmlNodeKind::Attribute => {
                                if self.scan_attributes(&start, name, &mut added) {
                                    target_depth.get_or_insert(depth);
                                }
                            }
                        }
                    }
                }
                Event::Empty(start) => {
                    // Self-closing element: lives at depth + 1, no text.
                    if kind == XmlNodeKind::Attribute {
                        let elem_depth = depth + 1;
                        if target_depth.map_or(true, |d| d == elem_depth)
                            && self.scan_attributes(&start, name, &mut added)
                        {
                            target_depth.get_or_insert(elem_depth);
                        }
                    }
                }
                Event::Text(text) => {
                    if pending_text == Some(depth) {
                        let raw = String::from_utf8_lossy(&text);
                        let value = raw.trim();
                        if !value.is_empty() {
                            if self.add_text(value) {
                                added += 1;
                            }
                            target_depth.get_or_insert(depth);
                            pending_text = None;
                        }
                    }
                }
                Event::End(_) => {
                    if pending_text == Some(depth) {
                        pending_text = None;
                    }
                    depth = depth.saturating_sub(1);
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        debug!(added, name, "imported markup tokens");
        Ok(added)
    }

    // Returns true when an attribute named `name` with a non-empty value was
    // found (a "hit" for depth latching), whether or not the value was new.
    fn scan_attributes(
        &self,
        start: &quick_xml::events::BytesStart<'_>,
        name: &str,
        added: &mut usize,
    ) -> bool {
        for attr in start.attributes().flatten() {
            if attr.key.local_name().as_ref() == name.as_bytes() {
                let raw = String::from_utf8_lossy(&attr.value);
                let value = raw.trim();
                if value.is_empty() {
                    return false;
                }
                if self.add_text(value) {
                    *added += 1;
                }
                return true;
            }
        }
        false
    }

    /// Snapshot of every registered token, in arbitrary order.
    pub fn export(&self) -> Vec<Uuid> {
        REGISTRY.lock().iter().copied().collect()
    }

    /// Joins every registered token's canonical text with `delimiter`,
    /// trailing delimiter included. Round-trips with
    /// [`TokenSource::import_delimited`] as a set (the registry is
    /// unordered).
    pub fn to_delimited_string(&self, delimiter: &str) -> String {
        let registry = REGISTRY.lock();
        let mut out = String::with_capacity(registry.len() * (36 + delimiter.len()));
        for token in registry.iter() {
            out.push_str(&token.to_string());
            out.push_str(delimiter);
        }
        out
    }
}

// The registry is process-global and unit tests run concurrently, so tests
// here only assert membership of tokens they created and never call clear();
// registry-wide behavior is covered by the `registry_clear` integration
// binary.
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_tokens_are_registered_and_distinct() {
        let source = TokenSource::new();
        let a = source.new_token();
        let b = source.new_token();
        assert_ne!(a, b);
        assert!(source.contains(a));
        assert!(source.contains(b));
    }

    #[test]
    fn add_rejects_duplicates() {
        let source = TokenSource::new();
        let token = Uuid::new_v4();
        assert!(source.add(token));
        assert!(!source.add(token));
        assert!(source.remove(token));
        assert!(!source.remove(token));
        assert!(source.add(token), "removed tokens can be re-added");
    }

    #[test]
    fn add_text_rejects_unparsable() {
        let source = TokenSource::new();
        assert!(!source.add_text("not-a-token"));
        assert!(!source.add_text(""));
        let token = Uuid::new_v4();
        assert!(source.add_text(&token.to_string()));
        assert!(source.contains(token));
    }

    #[test]
    fn shared_registry_across_instances() {
        let a = TokenSource::new();
        let b = TokenSource::new();
        let token = a.new_token();
        assert!(b.contains(token));
        assert!(b.remove(token));
        assert!(!a.contains(token));
    }

    #[test]
    fn import_delimited_skips_empty_and_bad_segments() {
        let source = TokenSource::new();
        let t1 = Uuid::new_v4();
        let t2 = Uuid::new_v4();
        let text = format!(",{},junk,,{},", t1, t2);
        assert_eq!(source.import_delimited(&text, ","), 2);
        assert!(source.contains(t1));
        assert!(source.contains(t2));
        // Re-import adds nothing new.
        assert_eq!(source.import_delimited(&text, ","), 0);
    }

    #[test]
    fn import_rows_selects_column() {
        let source = TokenSource::new();
        let t1 = Uuid::new_v4();
        let t2 = Uuid::new_v4();
        let mut row1 = HashMap::new();
        row1.insert("id".to_owned(), t1.to_string());
        row1.insert("other".to_owned(), Uuid::new_v4().to_string());
        let mut row2 = HashMap::new();
        row2.insert("id".to_owned(), t2.to_string());
        let row3 = HashMap::new(); // missing column, skipped

        assert_eq!(source.import_rows([&row1, &row2, &row3], "id"), 2);
        assert!(source.contains(t1));
        assert!(source.contains(t2));
        let other = Uuid::try_parse(&row1["other"]).unwrap();
        assert!(!source.contains(other), "only the named column is scanned");
    }

    #[test]
    fn import_xml_elements_latch_first_match_depth() {
        let source = TokenSource::new();
        let deep = Uuid::new_v4();
        let shallow = Uuid::new_v4();
        let sibling = Uuid::new_v4();
        // First <id> match is at depth 3; the depth-2 <id> after the latch
        // must be skipped, the depth-3 sibling must not.
        let doc = format!(
            "<root>\
               <item><id>{deep}</id><id>{sibling}</id></item>\
               <id>{shallow}</id>\
             </root>"
        );
        let added = source
            .import_xml(doc.as_bytes(), "id", XmlNodeKind::Element)
            .unwrap();
        assert_eq!(added, 2);
        assert!(source.contains(deep));
        assert!(source.contains(sibling));
        assert!(!source.contains(shallow));
    }

    #[test]
    fn import_xml_attributes() {
        let source = TokenSource::new();
        let t1 = Uuid::new_v4();
        let t2 = Uuid::new_v4();
        let nested = Uuid::new_v4();
        let doc = format!(
            "<root>\
               <item guid=\"{t1}\"/>\
               <item guid=\"{t2}\"><sub guid=\"{nested}\"/></item>\
             </root>"
        );
        let added = source
            .import_xml(doc.as_bytes(), "guid", XmlNodeKind::Attribute)
            .unwrap();
        assert_eq!(added, 2);
        assert!(source.contains(t1));
        assert!(source.contains(t2));
        assert!(!source.contains(nested), "nested depth skipped after latch");
    }

    #[test]
    fn import_xml_rejects_malformed_markup() {
        let source = TokenSource::new();
        let err = source.import_xml(
            "<root><id>abc</wrong></root>".as_bytes(),
            "id",
            XmlNodeKind::Element,
        );
        assert!(matches!(err, Err(XmlImportError::Parse(_))));
    }

    #[test]
    fn delimited_export_has_trailing_delimiter_and_round_trips() {
        let source = TokenSource::new();
        let mine = source.new_token();
        let text = source.to_delimited_string(";");
        assert!(text.ends_with(';'));
        assert!(text.contains(&mine.to_string()));

        // Round-trip the textual form through a parse of our own token.
        assert!(source.remove(mine));
        assert_eq!(source.import_delimited(&mine.to_string(), ";"), 1);
        assert!(source.contains(mine));
    }

    #[test]
    fn export_contains_registered_tokens() {
        let source = TokenSource::new();
        let token = source.new_token();
        assert!(source.export().contains(&token));
        assert!(source.len() >= 1);
        assert!(!source.is_empty());
    }
}
