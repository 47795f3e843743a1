use std::fmt::Display;

use super::decoders::read_tl;
use super::elements::{self, ElementType};
use super::errors::DecodeError;
use crate::terminal::Terminal;

/// One expectation in a Data Object List: a tag and the length the card
/// wants its value delivered in. No value bytes are encoded in a DOL.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TagAndLength {
    pub tag: u32,
    pub length: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dol {
    entries: Vec<TagAndLength>,
    size: usize,
}

impl Dol {
    pub fn new_from_entries(entries: Vec<TagAndLength>) -> Self {
        let size = entries.iter().map(|entry| entry.length).sum();
        Dol { entries, size }
    }

    /// Total size of the concatenated values the card expects.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn entries(&self) -> &[TagAndLength] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Concatenate the terminal's value for every entry, each fitted to its
    /// declared length. Numeric elements are right-justified: pad or cut on
    /// the left. Everything else is left-justified: pad or cut on the right.
    pub fn construct(&self, terminal: &dyn Terminal) -> Vec<u8> {
        let mut encoded = Vec::with_capacity(self.size);
        for entry in &self.entries {
            let value = terminal.construct_value(entry.tag, entry.length);
            let numeric = matches!(
                elements::element_type(entry.tag),
                Some(ElementType::Numeric)
            );
            fit_value(&value, entry.length, numeric, &mut encoded);
        }
        encoded
    }
}

fn fit_value(value: &[u8], length: usize, numeric: bool, out: &mut Vec<u8>) {
    if value.len() >= length {
        if numeric {
            out.extend_from_slice(&value[value.len() - length..]);
        } else {
            out.extend_from_slice(&value[..length]);
        }
    } else if numeric {
        out.resize(out.len() + length - value.len(), 0);
        out.extend_from_slice(value);
    } else {
        out.extend_from_slice(value);
        out.resize(out.len() + length - value.len(), 0);
    }
}

/// Parse DOL encoding: tag, then length, repeated. This is shared by the
/// PDOL (tag 9f38) and the Log Format (tag 9f4f).
pub fn parse_tag_and_length(mut raw: &[u8]) -> Result<Vec<TagAndLength>, DecodeError> {
    let mut entries = Vec::new();
    while !raw.is_empty() {
        let (tag, length, header) = read_tl(raw)?;
        entries.push(TagAndLength { tag, length });
        raw = &raw[header..];
    }
    Ok(entries)
}

impl TryFrom<&[u8]> for Dol {
    type Error = DecodeError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        Ok(Dol::new_from_entries(parse_tag_and_length(value)?))
    }
}

impl Display for TagAndLength {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tag_name = elements::tag_name(self.tag).unwrap_or("");
        write!(
            f,
            "0x{:04x} (\"{}\") 0x{:x} bytes",
            self.tag, tag_name, self.length
        )
    }
}
