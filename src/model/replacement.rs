use std::collections::HashMap;

use serde::Serialize;

use crate::model::tag::{canonical_of, Tag, TAG_MARKER};

/// Which of the two merge situations a clash describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ClashKind {
    /// The renamed tag itself lands on an existing tag
    Direct,
    /// A descendant of the renamed tag lands on an existing tag
    Descendant,
}

/// Two distinct existing tags that a rename would collapse into one
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Clash {
    /// Most specific existing tag whose renamed form already exists
    pub origin: String,
    /// The pre-existing tag it would merge with
    pub collides_with: String,
    pub kind: ClashKind,
}

/// A rename from one tag to another, applied to tag strings.
#[derive(Debug, Clone)]
pub struct Replacement {
    old: Tag,
    new: Tag,
}

impl Replacement {
    pub fn new(old: Tag, new: Tag) -> Self {
        Replacement { old, new }
    }

    pub fn old_tag(&self) -> &Tag {
        &self.old
    }

    pub fn new_tag(&self) -> &Tag {
        &self.new
    }

    /// True when old and new are the same tag (case-insensitively)
    pub fn is_noop(&self) -> bool {
        self.old.canonical() == self.new.canonical()
    }

    /// Rename a single tag string. Returns `None` when the candidate does
    /// not match the old tag or would come out identical.
    ///
    /// The matched leading segments become the new tag's segments; trailing
    /// sub-segments keep their original case. A candidate written with the
    /// marker gets the marker back, a bare one stays bare.
    pub fn apply(&self, candidate: &str) -> Option<String> {
        let suffix = self.old.matched_suffix(candidate)?;
        let mut out = String::with_capacity(candidate.len() + self.new.name().len());
        if candidate.starts_with(TAG_MARKER) {
            out.push(TAG_MARKER);
        }
        out.push_str(self.new.name());
        for segment in suffix {
            out.push('/');
            out.push_str(segment);
        }
        if out == candidate { None } else { Some(out) }
    }

    /// Like `apply`, but hands back the input when nothing changes.
    pub fn apply_or_keep(&self, candidate: &str) -> String {
        self.apply(candidate)
            .unwrap_or_else(|| candidate.to_string())
    }

    /// Detect whether this rename would merge two distinct existing tags.
    ///
    /// Known tags are visited most specific first, so when several clashes
    /// would occur the deepest one is reported.
    pub fn will_merge_tags<S: AsRef<str>>(&self, known_tags: &[S]) -> Option<Clash> {
        if self.is_noop() {
            return None;
        }

        let mut existing: HashMap<String, &str> = HashMap::new();
        for tag in known_tags {
            let tag = tag.as_ref();
            existing.entry(canonical_of(tag)).or_insert(tag);
        }

        let mut ordered: Vec<&str> = known_tags.iter().map(|t| t.as_ref()).collect();
        ordered.sort_by(|a, b| {
            segment_count(b)
                .cmp(&segment_count(a))
                .then_with(|| b.len().cmp(&a.len()))
        });

        for tag in ordered {
            if !self.old.matches(tag) {
                continue;
            }
            let renamed = self.apply_or_keep(tag);
            let renamed_canonical = canonical_of(&renamed);
            if renamed_canonical == canonical_of(tag) {
                continue;
            }
            if let Some(other) = existing.get(&renamed_canonical) {
                let kind = if canonical_of(tag) == self.old.canonical() {
                    ClashKind::Direct
                } else {
                    ClashKind::Descendant
                };
                return Some(Clash {
                    origin: tag.trim_start_matches(TAG_MARKER).to_string(),
                    collides_with: other.trim_start_matches(TAG_MARKER).to_string(),
                    kind,
                });
            }
        }
        None
    }
}

fn segment_count(tag: &str) -> usize {
    tag.split('/').count()
}
