use std::io::Write;

use quick_xml::Writer;
use quick_xml::events::{BytesStart, BytesText, Event};

use crate::err::{NfcomxError, Result};

/// A fully-captured element subtree.
///
/// This is the unit the streaming walker hands out: one context/record
/// element with everything below it, detached from the rest of the document.
/// Names are local names (any namespace prefix already stripped), so all
/// queries are namespace-agnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    /// Concatenated direct text content (text and CDATA nodes).
    pub text: String,
    pub children: Vec<Element>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Element {
            name: name.into(),
            attributes: Vec::new(),
            text: String::new(),
            children: Vec::new(),
        }
    }

    pub fn trimmed_text(&self) -> &str {
        self.text.trim()
    }

    /// All elements reached by following `segments` as strict child steps
    /// from this element (the `./a/b` query shape).
    pub fn find_child_path<'a>(&'a self, segments: &[String]) -> Vec<&'a Element> {
        let mut frontier = vec![self];

        for segment in segments {
            let mut next = Vec::new();
            for elem in frontier {
                next.extend(elem.children.iter().filter(|c| &c.name == segment));
            }
            if next.is_empty() {
                return next;
            }
            frontier = next;
        }

        frontier
    }

    /// First strict descendant named `name`, in document order (the `.//tag`
    /// query shape).
    pub fn find_descendant(&self, name: &str) -> Option<&Element> {
        for child in &self.children {
            if child.name == name {
                return Some(child);
            }
            if let Some(found) = child.find_descendant(name) {
                return Some(found);
            }
        }
        None
    }

    /// All strict descendants named `name`, in document order.
    pub fn descendants_named<'a>(&'a self, name: &str, out: &mut Vec<&'a Element>) {
        for child in &self.children {
            if child.name == name {
                out.push(child);
            }
            child.descendants_named(name, out);
        }
    }

    /// First element reached by anchoring `segments` at any strict descendant
    /// and following the remaining segments as child steps (the `.//a/b/c`
    /// query shape).
    pub fn find_descendant_path(&self, segments: &[String]) -> Option<&Element> {
        let (first, rest) = segments.split_first()?;

        for child in &self.children {
            if child.name == *first {
                let matches = child.find_child_path(rest);
                if let Some(found) = matches.first() {
                    return Some(found);
                }
            }
            if let Some(found) = child.find_descendant_path(segments) {
                return Some(found);
            }
        }
        None
    }

    /// Re-serializes the subtree into `writer`, preserving attributes,
    /// nesting and text content. Whitespace-only text nodes are dropped so
    /// the writer's indentation stays consistent.
    pub fn write_into<W: Write>(&self, writer: &mut Writer<W>) -> Result<()> {
        let mut start = BytesStart::new(self.name.as_str());
        for (key, value) in &self.attributes {
            start.push_attribute((key.as_str(), value.as_str()));
        }

        if self.children.is_empty() && self.trimmed_text().is_empty() {
            writer
                .write_event(Event::Empty(start))
                .map_err(|e| NfcomxError::XmlOutput {
                    message: format!("{e}"),
                })?;
            return Ok(());
        }

        writer
            .write_event(Event::Start(start))
            .map_err(|e| NfcomxError::XmlOutput {
                message: format!("{e}"),
            })?;

        if !self.trimmed_text().is_empty() {
            writer
                .write_event(Event::Text(BytesText::new(self.trimmed_text())))
                .map_err(|e| NfcomxError::XmlOutput {
                    message: format!("{e}"),
                })?;
        }

        for child in &self.children {
            child.write_into(writer)?;
        }

        writer
            .write_event(Event::End(BytesStart::new(self.name.as_str()).to_end()))
            .map_err(|e| NfcomxError::XmlOutput {
                message: format!("{e}"),
            })?;

        Ok(())
    }
}
