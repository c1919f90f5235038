//! Ordered key/value metadata attached to catalog outputs.
//!
//! A header is persisted as the leading `#` lines of a catalog file, one card
//! per line: `# KEY = value / comment`. Keys may repeat only for `COMMENT`.

use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use crate::error::{MonteBrickError, Result};

pub const COMMENT_KEY: &str = "COMMENT";

const COMMENT_SEPARATOR: &str = " / ";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HeaderCard {
    pub key: String,
    pub value: String,
    pub comment: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Header {
    cards: Vec<HeaderCard>,
}

impl Header {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn cards(&self) -> &[HeaderCard] {
        &self.cards
    }

    pub fn keys(&self) -> impl DoubleEndedIterator<Item = &str> {
        self.cards.iter().map(|c| c.key.as_str())
    }

    /// Append a card without checking for an existing key.
    pub fn push(&mut self, key: &str, value: &str, comment: Option<&str>) {
        self.cards.push(HeaderCard {
            key: key.to_string(),
            value: value.to_string(),
            comment: comment.map(str::to_string),
        });
    }

    /// Replace the value of `key` in place, or append a new card.
    pub fn set(&mut self, key: &str, value: &str) {
        match self.cards.iter_mut().find(|c| c.key == key) {
            Some(card) => card.value = value.to_string(),
            None => self.push(key, value, None),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.cards
            .iter()
            .find(|c| c.key == key)
            .map(|c| c.value.as_str())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn require(&self, key: &str) -> Result<&str> {
        self.get(key).ok_or_else(|| MonteBrickError::MissingHeaderKey {
            key: key.to_string(),
        })
    }

    pub fn require_f64(&self, key: &str) -> Result<f64> {
        let value = self.require(key)?;
        value
            .trim()
            .parse()
            .map_err(|_| MonteBrickError::InvalidHeaderValue {
                key: key.to_string(),
                value: value.to_string(),
            })
    }

    /// Write the cards as `#` comment lines.
    pub fn write_to<W: Write>(&self, out: &mut W) -> Result<()> {
        for card in &self.cards {
            match &card.comment {
                Some(comment) => writeln!(
                    out,
                    "# {} = {}{}{}",
                    card.key, card.value, COMMENT_SEPARATOR, comment
                )?,
                None => writeln!(out, "# {} = {}", card.key, card.value)?,
            }
        }
        Ok(())
    }

    /// Parse the leading `#` lines of a reader. Stops at the first other line.
    pub fn read_from<R: BufRead>(reader: R) -> Result<Self> {
        let mut header = Header::new();
        for line in reader.lines() {
            let line = line?;
            let Some(body) = line.strip_prefix('#') else {
                break;
            };
            let body = body.trim();
            if body.is_empty() {
                continue;
            }
            let Some((key, rest)) = body.split_once('=') else {
                return Err(MonteBrickError::Catalog(format!(
                    "malformed header line: {line}"
                )));
            };
            let (value, comment) = match rest.split_once(COMMENT_SEPARATOR) {
                Some((v, c)) => (v, Some(c)),
                None => (rest, None),
            };
            header.push(key.trim(), value.trim(), comment.map(str::trim));
        }
        Ok(header)
    }
}

/// Read the header block of a catalog file.
pub fn read_header(path: &Path) -> Result<Header> {
    let file = File::open(path)?;
    Header::read_from(BufReader::new(file))
}
