use std::sync::OnceLock;

use regex::Regex;

use crate::model::document::{Document, RewriteOutcome, TagOccurrence};
use crate::model::replacement::Replacement;
use crate::model::tag::is_tag_token;
use crate::ops::store::StoreError;
use crate::parse::frontmatter::FieldValue;
use crate::parse::span::Span;

/// Error type for rewriting a single document
#[derive(Debug, thiserror::Error)]
pub enum RewriteError {
    #[error("{path} has changed since it was indexed: expected {expected:?} at {offset}, found {found:?}")]
    StaleOccurrence {
        path: String,
        offset: usize,
        expected: String,
        found: String,
    },
    #[error("{path}: tag offset {start}..{end} is outside the document")]
    OutOfBounds {
        path: String,
        start: usize,
        end: usize,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Separators Obsidian accepts between tags inside one tag-field entry
pub(crate) fn separator_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[,\s]+").expect("static regex"))
}

/// Rewrite one document for a rename.
///
/// `occurrences` are the inline positions recorded by the index; each is
/// verified against the fresh body before it is touched. Splicing runs from
/// the highest offset down, so offsets not yet processed stay valid.
pub fn rewrite_document(
    doc: &Document,
    occurrences: &[TagOccurrence],
    replacement: &Replacement,
) -> Result<RewriteOutcome, RewriteError> {
    let old = replacement.old_tag();
    let mut targets: Vec<&TagOccurrence> =
        occurrences.iter().filter(|o| old.matches(&o.text)).collect();
    targets.sort_by(|a, b| b.span.start.cmp(&a.span.start));

    let mut body = doc.body.clone();
    let mut inline_replaced = 0;
    for occurrence in targets {
        verify_occurrence(doc, &body, occurrence.span, &occurrence.text)?;
        if let Some(renamed) = replacement.apply(&occurrence.text) {
            body.replace_range(occurrence.span.range(), &renamed);
            inline_replaced += 1;
        }
    }

    let original_tags = doc.tags();
    let tags = original_tags.as_ref().map(|v| rename_tag_field(v, replacement));
    let original_aliases = doc.aliases();
    let aliases = original_aliases
        .as_ref()
        .map(|v| rename_alias_field(v, replacement));

    let changed = body != doc.body || tags != original_tags || aliases != original_aliases;
    Ok(RewriteOutcome {
        body,
        tags,
        aliases,
        inline_replaced,
        changed,
    })
}

fn verify_occurrence(
    doc: &Document,
    body: &str,
    span: Span,
    expected: &str,
) -> Result<(), RewriteError> {
    match span.slice(body) {
        Some(found) if found == expected => Ok(()),
        Some(found) => Err(RewriteError::StaleOccurrence {
            path: doc.path.clone(),
            offset: span.start,
            expected: expected.to_string(),
            found: found.to_string(),
        }),
        None => Err(RewriteError::OutOfBounds {
            path: doc.path.clone(),
            start: span.start,
            end: span.end,
        }),
    }
}

/// Rename every tag in a front-matter tag field. Entries may hold several
/// tags separated by commas or whitespace; separators are kept.
pub fn rename_tag_field(value: &FieldValue, replacement: &Replacement) -> FieldValue {
    match value {
        FieldValue::List(items) => FieldValue::List(
            items
                .iter()
                .map(|item| rename_delimited(item, replacement))
                .collect(),
        ),
        FieldValue::Text(text) => FieldValue::Text(rename_delimited(text, replacement)),
    }
}

/// Rename tag-shaped aliases; other aliases pass through untouched.
pub fn rename_alias_field(value: &FieldValue, replacement: &Replacement) -> FieldValue {
    let rename = |alias: &String| {
        if is_tag_token(alias) {
            replacement.apply_or_keep(alias)
        } else {
            alias.clone()
        }
    };
    match value {
        FieldValue::List(items) => FieldValue::List(items.iter().map(rename).collect()),
        FieldValue::Text(text) => FieldValue::Text(rename(text)),
    }
}

fn rename_delimited(entry: &str, replacement: &Replacement) -> String {
    let mut out = String::with_capacity(entry.len());
    let mut last = 0;
    for sep in separator_re().find_iter(entry) {
        out.push_str(&replacement.apply_or_keep(&entry[last..sep.start()]));
        out.push_str(sep.as_str());
        last = sep.end();
    }
    out.push_str(&replacement.apply_or_keep(&entry[last..]));
    out
}
