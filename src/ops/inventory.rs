use std::collections::{BTreeMap, BTreeSet, HashMap};

use indexmap::IndexMap;
use serde::Serialize;

use crate::model::document::{Document, TagOccurrence};
use crate::model::tag::{canonical_of, is_tag_token, to_bare_name, Tag};
use crate::ops::rewrite::separator_re;
use crate::ops::store::{DocumentStore, StoreError};
use crate::parse::frontmatter::FieldValue;

/// Tag metadata for one document, as the index records it
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentTags {
    pub path: String,
    pub inline: Vec<TagOccurrence>,
    /// Front-matter tag entries, split on separators, as written
    pub tags: Vec<String>,
    /// Tag-shaped aliases, marker included
    pub aliases: Vec<String>,
}

impl DocumentTags {
    pub fn from_document(doc: &Document) -> Self {
        let tags = doc
            .tags()
            .map(|value| split_tag_field(&value))
            .unwrap_or_default();
        let aliases = doc
            .aliases()
            .map(|value| {
                value
                    .entries()
                    .into_iter()
                    .filter(|a| is_tag_token(a))
                    .map(|a| a.to_string())
                    .collect()
            })
            .unwrap_or_default();
        DocumentTags {
            path: doc.path.clone(),
            inline: doc.inline.clone(),
            tags,
            aliases,
        }
    }

    /// Tags used by the document (inline and front matter), without markers
    pub fn used_tags(&self) -> impl Iterator<Item = &str> {
        self.inline
            .iter()
            .map(|o| to_bare_name(&o.text))
            .chain(self.tags.iter().map(|t| to_bare_name(t)))
    }

    /// True if any inline, front-matter, or alias occurrence matches `tag`
    pub fn mentions(&self, tag: &Tag) -> bool {
        self.used_tags().any(|t| tag.matches(t)) || self.aliases.iter().any(|a| tag.matches(a))
    }
}

fn split_tag_field(value: &FieldValue) -> Vec<String> {
    value
        .entries()
        .into_iter()
        .flat_map(|entry| separator_re().split(entry))
        .filter(|piece| !piece.is_empty() && Tag::parse(piece).is_ok())
        .map(|piece| piece.to_string())
        .collect()
}

/// The host tag inventory the rename flow queries
pub trait TagInventory {
    /// Every known tag once (live tags plus tag-page-only tags), most
    /// specific first
    fn all_known_tags(&self) -> Vec<String>;

    /// Indexed documents, in path order
    fn document_paths(&self) -> Vec<String>;

    fn document_tags(&self, path: &str) -> Option<&DocumentTags>;
}

/// Tags one document started or stopped declaring as a page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageDelta {
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

impl PageDelta {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Canonical tag → documents that declare it as an alias (tag pages).
#[derive(Debug, Clone, Default)]
pub struct TagPageIndex {
    by_tag: BTreeMap<String, BTreeSet<String>>,
    by_doc: HashMap<String, BTreeSet<String>>,
    spelling: HashMap<String, String>,
}

impl TagPageIndex {
    /// Replace one document's contribution with the tags in `aliases`.
    pub fn document_changed(&mut self, path: &str, aliases: &[String]) -> PageDelta {
        let mut next = BTreeSet::new();
        for alias in aliases {
            let name = to_bare_name(alias);
            let canonical = canonical_of(name);
            self.spelling
                .entry(canonical.clone())
                .or_insert_with(|| name.to_string());
            next.insert(canonical);
        }

        let previous = self.by_doc.remove(path).unwrap_or_default();
        let mut delta = PageDelta::default();
        for gone in previous.difference(&next) {
            self.detach(gone, path);
            delta.removed.push(gone.clone());
        }
        for added in next.difference(&previous) {
            let paths = self.by_tag.entry(added.clone()).or_default();
            paths.insert(path.to_string());
            delta.added.push(added.clone());
        }
        if !next.is_empty() {
            self.by_doc.insert(path.to_string(), next);
        }
        delta
    }

    /// Drop a deleted document's contribution.
    pub fn document_removed(&mut self, path: &str) -> PageDelta {
        let mut delta = PageDelta::default();
        if let Some(previous) = self.by_doc.remove(path) {
            for gone in previous {
                self.detach(&gone, path);
                delta.removed.push(gone);
            }
        }
        delta
    }

    fn detach(&mut self, canonical: &str, path: &str) {
        if let Some(paths) = self.by_tag.get_mut(canonical) {
            paths.remove(path);
            if paths.is_empty() {
                self.by_tag.remove(canonical);
                self.spelling.remove(canonical);
            }
        }
    }

    /// Documents declaring `tag` as a page, in path order
    pub fn pages_for(&self, tag: &Tag) -> Vec<String> {
        self.by_tag
            .get(tag.canonical())
            .map(|paths| paths.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// (tag as first spelled, pages) for every tag with a page, by canonical order
    pub fn entries(&self) -> Vec<(String, Vec<String>)> {
        self.by_tag
            .iter()
            .map(|(canonical, paths)| {
                let name = self
                    .spelling
                    .get(canonical)
                    .cloned()
                    .unwrap_or_else(|| canonical.clone());
                (name, paths.iter().cloned().collect())
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.by_tag.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_tag.is_empty()
    }
}

/// A known tag with its usage
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagCount {
    pub tag: String,
    pub uses: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub pages: Vec<String>,
}

/// In-memory tag metadata for a whole vault.
#[derive(Debug, Clone, Default)]
pub struct VaultIndex {
    docs: BTreeMap<String, DocumentTags>,
    pages: TagPageIndex,
}

impl VaultIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index every document in the store. Unreadable documents are logged
    /// and left out.
    pub fn build<S: DocumentStore + ?Sized>(store: &S) -> Result<Self, StoreError> {
        let mut index = VaultIndex::new();
        for path in store.list_documents()? {
            match store.read_document(&path) {
                Ok(doc) => {
                    index.on_created(&doc);
                }
                Err(e) => tracing::warn!("skipping {}: {}", path, e),
            }
        }
        tracing::debug!(
            documents = index.docs.len(),
            pages = index.pages.len(),
            "vault indexed"
        );
        Ok(index)
    }

    pub fn on_created(&mut self, doc: &Document) -> PageDelta {
        self.on_changed(doc)
    }

    /// Recompute one document's contribution.
    pub fn on_changed(&mut self, doc: &Document) -> PageDelta {
        let entry = DocumentTags::from_document(doc);
        let delta = self.pages.document_changed(&entry.path, &entry.aliases);
        self.docs.insert(entry.path.clone(), entry);
        delta
    }

    pub fn on_deleted(&mut self, path: &str) -> PageDelta {
        self.docs.remove(path);
        self.pages.document_removed(path)
    }

    pub fn pages(&self) -> &TagPageIndex {
        &self.pages
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// Tags currently used in documents, first spelling wins
    fn live_tags(&self) -> IndexMap<String, String> {
        let mut live = IndexMap::new();
        for doc in self.docs.values() {
            for tag in doc.used_tags() {
                live.entry(canonical_of(tag))
                    .or_insert_with(|| tag.to_string());
            }
        }
        live
    }

    /// Every known tag with its use count and pages, sorted by canonical name
    pub fn tag_counts(&self) -> Vec<TagCount> {
        let mut counts: IndexMap<String, TagCount> = IndexMap::new();
        for doc in self.docs.values() {
            for tag in doc.used_tags() {
                counts
                    .entry(canonical_of(tag))
                    .or_insert_with(|| TagCount {
                        tag: tag.to_string(),
                        uses: 0,
                        pages: Vec::new(),
                    })
                    .uses += 1;
            }
        }
        for (name, pages) in self.pages.entries() {
            counts
                .entry(canonical_of(&name))
                .or_insert_with(|| TagCount {
                    tag: name.clone(),
                    uses: 0,
                    pages: Vec::new(),
                })
                .pages = pages;
        }
        counts.sort_keys();
        counts.into_values().collect()
    }
}

impl TagInventory for VaultIndex {
    fn all_known_tags(&self) -> Vec<String> {
        let mut known = self.live_tags();
        for (name, _) in self.pages.entries() {
            known.entry(canonical_of(&name)).or_insert(name);
        }
        let mut tags: Vec<(String, String)> = known.into_iter().collect();
        tags.sort_by(|(ca, _), (cb, _)| {
            cb.split('/')
                .count()
                .cmp(&ca.split('/').count())
                .then_with(|| ca.cmp(cb))
        });
        tags.into_iter().map(|(_, name)| name).collect()
    }

    fn document_paths(&self) -> Vec<String> {
        self.docs.keys().cloned().collect()
    }

    fn document_tags(&self, path: &str) -> Option<&DocumentTags> {
        self.docs.get(path)
    }
}
