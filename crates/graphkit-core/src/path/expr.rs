//! Path expression syntax
//!
//! ```text
//! path     := segment ("." segment)*
//! segment  := name selector?
//! selector := "[" literal ("{" tag "}")? "]"
//! ```
//!
//! Dots inside a selector belong to the key, so `labels[a.b]` is one segment.

use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

use crate::errors::{GraphError, Result};
use crate::value::MapKey;

/// Scalar type of a map-key literal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyType {
    Text,
    Integer,
}

impl KeyType {
    /// Case-insensitive type tag, e.g. `{String}`, `{long}`
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.to_ascii_lowercase().as_str() {
            "string" | "str" | "text" => Some(KeyType::Text),
            "integer" | "int" | "long" | "short" | "i32" | "i64" => Some(KeyType::Integer),
            _ => None,
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            KeyType::Text => "string",
            KeyType::Integer => "integer",
        }
    }
}

/// Bracketed part of a segment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    literal: String,
    key_type: Option<KeyType>,
}

impl Selector {
    pub fn literal(&self) -> &str {
        &self.literal
    }

    pub fn key_type(&self) -> Option<KeyType> {
        self.key_type
    }

    /// List index, when the literal is untagged and numeric
    ///
    /// Negative literals are kept so callers can report them as out of
    /// range; literals beyond `i64` saturate.
    pub fn index(&self) -> Option<i64> {
        if self.key_type.is_some() {
            return None;
        }
        let digits = self.literal.strip_prefix('-').unwrap_or(&self.literal);
        let negative = digits.len() < self.literal.len();
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        Some(
            self.literal
                .parse()
                .unwrap_or(if negative { i64::MIN } else { i64::MAX }),
        )
    }

    /// The literal coerced to its key type; untagged literals are text keys
    pub fn map_key(&self) -> MapKey {
        match self.key_type {
            // Validated at parse time
            Some(KeyType::Integer) => self
                .literal
                .parse::<i64>()
                .map(MapKey::Int)
                .unwrap_or_else(|_| MapKey::Text(Rc::from(self.literal.as_str()))),
            Some(KeyType::Text) | None => MapKey::Text(Rc::from(self.literal.as_str())),
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.key_type {
            Some(ty) => write!(f, "[{}{{{}}}]", self.literal, ty.tag()),
            None => write!(f, "[{}]", self.literal),
        }
    }
}

/// One `name[selector]` step of a path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    attribute: String,
    selector: Option<Selector>,
}

impl Segment {
    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    pub fn selector(&self) -> Option<&Selector> {
        self.selector.as_ref()
    }

    fn parse(raw: &str, path: &str) -> Result<Self> {
        let invalid = |reason: &str| GraphError::InvalidPathSegment {
            path: path.to_string(),
            segment: raw.to_string(),
            reason: reason.to_string(),
        };

        let (attribute, selector) = match raw.find('[') {
            None => (raw, None),
            Some(open) => {
                let inner = raw[open + 1..]
                    .strip_suffix(']')
                    .ok_or_else(|| invalid("unterminated selector"))?;
                (&raw[..open], Some(Self::parse_selector(inner, &invalid)?))
            }
        };

        if attribute.is_empty() {
            return Err(invalid("empty attribute name"));
        }
        if !attribute
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_')
        {
            return Err(invalid("attribute name must be alphanumeric"));
        }

        Ok(Self {
            attribute: attribute.to_string(),
            selector,
        })
    }

    fn parse_selector(inner: &str, invalid: &dyn Fn(&str) -> GraphError) -> Result<Selector> {
        if inner.contains('[') || inner.contains(']') {
            return Err(invalid("nested brackets in selector"));
        }

        let (literal, key_type) = match inner.find('{') {
            None => (inner, None),
            Some(open) => {
                let tag = inner[open + 1..]
                    .strip_suffix('}')
                    .ok_or_else(|| invalid("unterminated key type tag"))?;
                let ty = KeyType::from_tag(tag).ok_or_else(|| invalid("unsupported key type"))?;
                (&inner[..open], Some(ty))
            }
        };

        if literal.is_empty() {
            return Err(invalid("empty selector"));
        }
        if key_type == Some(KeyType::Integer) && literal.parse::<i64>().is_err() {
            return Err(invalid("key is not an integer"));
        }

        Ok(Selector {
            literal: literal.to_string(),
            key_type,
        })
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.attribute)?;
        if let Some(selector) = &self.selector {
            write!(f, "{selector}")?;
        }
        Ok(())
    }
}

/// Parsed path expression; stateless, parsed once per call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathExpr {
    segments: Vec<Segment>,
}

impl PathExpr {
    /// Parse `path`
    ///
    /// # Errors
    ///
    /// Returns `InvalidPathSegment` for an empty path or a malformed segment.
    pub fn parse(path: &str) -> Result<Self> {
        let mut segments = Vec::new();
        let mut depth = 0usize;
        let mut start = 0usize;

        for (i, c) in path.char_indices() {
            match c {
                '[' => depth += 1,
                ']' => depth = depth.saturating_sub(1),
                '.' if depth == 0 => {
                    segments.push(Self::segment(&path[start..i], path)?);
                    start = i + 1;
                }
                _ => {}
            }
        }
        segments.push(Self::segment(&path[start..], path)?);

        Ok(Self { segments })
    }

    fn segment(raw: &str, path: &str) -> Result<Segment> {
        if raw.is_empty() {
            return Err(GraphError::InvalidPathSegment {
                path: path.to_string(),
                segment: String::new(),
                reason: "empty segment".to_string(),
            });
        }
        Segment::parse(raw, path)
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Always at least one
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

impl FromStr for PathExpr {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for PathExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}
