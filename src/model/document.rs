use serde::Serialize;

use crate::parse::frontmatter::{split_front_matter, FieldValue, FrontMatter};
use crate::parse::span::Span;
use crate::parse::tag_scanner::scan_tags;

/// An inline tag token found in a document body
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagOccurrence {
    /// Byte span in the body the token was found in
    #[serde(skip)]
    pub span: Span,
    /// The literal token, marker included
    pub text: String,
}

/// A document read fresh from the store.
///
/// Inline occurrences are offsets into `body`, which excludes the front
/// matter block.
#[derive(Debug, Clone)]
pub struct Document {
    /// Vault-relative path with `/` separators
    pub path: String,
    pub front_matter: Option<FrontMatter>,
    pub body: String,
    pub inline: Vec<TagOccurrence>,
}

impl Document {
    /// Parse a document from its full text.
    pub fn from_text(path: impl Into<String>, text: &str) -> Self {
        let (front_matter, body) = split_front_matter(text);
        Document {
            path: path.into(),
            inline: scan_tags(body),
            body: body.to_string(),
            front_matter,
        }
    }

    /// Structured tag list from front matter
    pub fn tags(&self) -> Option<FieldValue> {
        self.front_matter.as_ref().and_then(|fm| fm.tags())
    }

    /// Structured alias list from front matter
    pub fn aliases(&self) -> Option<FieldValue> {
        self.front_matter.as_ref().and_then(|fm| fm.aliases())
    }

    /// Full text as it was read
    pub fn text(&self) -> String {
        match &self.front_matter {
            Some(fm) => format!("{}{}", fm.as_str(), self.body),
            None => self.body.clone(),
        }
    }

    /// Full text after applying a rewrite outcome.
    pub fn render(&self, outcome: &RewriteOutcome) -> String {
        match &self.front_matter {
            Some(fm) => {
                let block = fm.render_with(outcome.tags.as_ref(), outcome.aliases.as_ref());
                format!("{}{}", block, outcome.body)
            }
            None => outcome.body.clone(),
        }
    }
}

/// Result of rewriting one document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteOutcome {
    pub body: String,
    pub tags: Option<FieldValue>,
    pub aliases: Option<FieldValue>,
    /// Number of inline tokens replaced
    pub inline_replaced: usize,
    pub changed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_from_text_scans_body_only() {
        let doc = Document::from_text("a.md", "---\ntags: [x]\n---\nsee #y\n");
        assert_eq!(doc.body, "see #y\n");
        assert_eq!(doc.inline.len(), 1);
        assert_eq!(doc.inline[0].span, Span::new(4, 6));
        assert_eq!(doc.tags(), Some(FieldValue::List(vec!["x".to_string()])));
    }

    #[test]
    fn test_text_round_trips() {
        let text = "---\ntitle: t\n---\nbody #tag\n";
        assert_eq!(Document::from_text("a.md", text).text(), text);
        assert_eq!(Document::from_text("b.md", "plain").text(), "plain");
    }

    #[test]
    fn test_render_unchanged_outcome_is_identity() {
        let text = "---\ntags:  [a]\n---\nbody\n";
        let doc = Document::from_text("a.md", text);
        let outcome = RewriteOutcome {
            body: doc.body.clone(),
            tags: doc.tags(),
            aliases: doc.aliases(),
            inline_replaced: 0,
            changed: false,
        };
        assert_eq!(doc.render(&outcome), text);
    }
}
