use std::fmt;
use std::hash::{Hash, Hasher};

/// The marker that introduces a tag in document text
pub const TAG_MARKER: char = '#';

/// Separator between hierarchical tag segments
pub const SEGMENT_SEPARATOR: char = '/';

/// Error type for tag syntax problems
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TagError {
    #[error("tag name cannot be empty")]
    Empty,
    #[error("tag \"{0}\" has an empty path segment")]
    EmptySegment(String),
    #[error("tag \"{tag}\" contains a character that is not allowed: {ch:?}")]
    InvalidChar { tag: String, ch: char },
}

/// A hierarchical tag such as `project/alpha/beta`.
///
/// Identity is case-insensitive: two tags are equal iff their canonical
/// forms are equal. The original spelling is kept for display.
#[derive(Debug, Clone)]
pub struct Tag {
    /// Name as entered, without the leading marker
    raw: String,
    /// Path components of `raw`, original case
    segments: Vec<String>,
    /// Lowercased path, the identity key
    canonical: String,
}

impl Tag {
    /// Parse a tag from its name, with or without leading markers.
    pub fn parse(raw: &str) -> Result<Tag, TagError> {
        let name = to_bare_name(raw.trim());
        if name.is_empty() {
            return Err(TagError::Empty);
        }
        let segments: Vec<String> = name
            .split(SEGMENT_SEPARATOR)
            .map(|s| s.to_string())
            .collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(TagError::EmptySegment(name.to_string()));
        }
        Ok(Tag {
            canonical: canonical_of(name),
            raw: name.to_string(),
            segments,
        })
    }

    /// Parse and also enforce the tag character rules.
    pub fn parse_valid(raw: &str) -> Result<Tag, TagError> {
        let tag = Tag::parse(raw)?;
        validate_name(&tag.raw)?;
        Ok(tag)
    }

    /// The name without marker, original case
    pub fn name(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn canonical(&self) -> &str {
        &self.canonical
    }

    /// Marker-prefixed form used in document text, e.g. `#Project/Alpha`
    pub fn display(&self) -> String {
        to_display(&self.raw)
    }

    /// True if `candidate` is this tag or one of its descendants.
    ///
    /// Comparison is per segment, so `project` never matches `projection`.
    /// The candidate may carry a leading marker.
    pub fn matches(&self, candidate: &str) -> bool {
        self.matched_suffix(candidate).is_some()
    }

    /// For a matching candidate, the segments beyond this tag's own path,
    /// in the candidate's original case. Empty for an exact match.
    pub(crate) fn matched_suffix<'a>(&self, candidate: &'a str) -> Option<Vec<&'a str>> {
        let name = to_bare_name(candidate);
        if name.is_empty() {
            return None;
        }
        let parts: Vec<&str> = name.split(SEGMENT_SEPARATOR).collect();
        if parts.len() < self.segments.len() {
            return None;
        }
        let prefix_matches = self
            .segments
            .iter()
            .zip(&parts)
            .all(|(own, theirs)| own.to_lowercase() == theirs.to_lowercase());
        if !prefix_matches {
            return None;
        }
        Some(parts[self.segments.len()..].to_vec())
    }
}

impl PartialEq for Tag {
    fn eq(&self, other: &Self) -> bool {
        self.canonical == other.canonical
    }
}

impl Eq for Tag {}

impl Hash for Tag {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical.hash(state);
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", TAG_MARKER, self.raw)
    }
}

/// Lowercased, marker-free form of a tag name. The only valid map key for
/// tag identity.
pub fn canonical_of(raw: &str) -> String {
    to_bare_name(raw)
        .split(SEGMENT_SEPARATOR)
        .map(|s| s.to_lowercase())
        .collect::<Vec<_>>()
        .join("/")
}

/// True iff `text` is a marker followed by a valid, non-empty tag.
pub fn is_tag_token(text: &str) -> bool {
    match text.strip_prefix(TAG_MARKER) {
        Some(rest) if !rest.starts_with(TAG_MARKER) => {
            Tag::parse(rest).is_ok() && validate_name(rest).is_ok()
        }
        _ => false,
    }
}

/// Marker-prefixed representation of a tag name.
pub fn to_display(raw: &str) -> String {
    format!("{}{}", TAG_MARKER, to_bare_name(raw))
}

/// Strip every leading marker: `##a` and `#a` both become `a`.
pub fn to_bare_name(display: &str) -> &str {
    display.trim_start_matches(TAG_MARKER)
}

/// Characters that can never appear inside a tag name
pub fn is_disallowed_char(c: char) -> bool {
    c.is_whitespace()
        || ('\u{2000}'..='\u{206F}').contains(&c)
        || ('\u{2E00}'..='\u{2E7F}').contains(&c)
        || matches!(
            c,
            '\'' | '!'
                | '"'
                | '#'
                | '$'
                | '%'
                | '&'
                | '('
                | ')'
                | '*'
                | '+'
                | ','
                | '.'
                | ':'
                | ';'
                | '<'
                | '='
                | '>'
                | '?'
                | '@'
                | '^'
                | '`'
                | '{'
                | '|'
                | '}'
                | '~'
                | '['
                | ']'
                | '\\'
        )
}

/// Check a bare tag name against the tag character rules.
pub fn validate_name(name: &str) -> Result<(), TagError> {
    if name.is_empty() {
        return Err(TagError::Empty);
    }
    if let Some(ch) = name.chars().find(|&c| is_disallowed_char(c)) {
        return Err(TagError::InvalidChar {
            tag: name.to_string(),
            ch,
        });
    }
    Ok(())
}
