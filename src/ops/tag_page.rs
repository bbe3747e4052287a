use crate::model::tag::{Tag, TagError};
use crate::ops::inventory::VaultIndex;
use crate::ops::store::{DocumentStore, StoreError};

/// Error type for tag page creation
#[derive(Debug, thiserror::Error)]
pub enum TagPageError {
    #[error(transparent)]
    InvalidTag(#[from] TagError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("no free file name for a tag page for #{0}")]
    NoFreeName(String),
}

const MAX_SUFFIX: usize = 1000;

/// Documents that declare `tag` as their tag page, in path order.
pub fn find_tag_pages(index: &VaultIndex, tag: &Tag) -> Vec<String> {
    index.pages().pages_for(tag)
}

/// Front matter and heading for a fresh tag page
pub fn tag_page_text(tag: &Tag) -> String {
    format!("---\naliases: [\"{}\"]\n---\n\n# {}\n", tag.display(), tag.name())
}

/// Where a new page for `tag` would go: `<base>/<segments joined by space>.md`,
/// with ` 1`, ` 2`, ... appended until the name is free.
pub fn tag_page_path<S: DocumentStore + ?Sized>(
    store: &S,
    base_folder: &str,
    tag: &Tag,
) -> Result<String, TagPageError> {
    let folder = base_folder.trim_matches('/');
    let stem = tag.segments().join(" ");
    let candidate = |suffix: usize| {
        let name = if suffix == 0 {
            format!("{stem}.md")
        } else {
            format!("{stem} {suffix}.md")
        };
        if folder.is_empty() {
            name
        } else {
            format!("{folder}/{name}")
        }
    };
    (0..MAX_SUFFIX)
        .map(candidate)
        .find(|path| !store.exists(path))
        .ok_or_else(|| TagPageError::NoFreeName(tag.name().to_string()))
}

/// Create a tag page for `tag` under `base_folder` and return its path.
pub fn create_tag_page<S: DocumentStore + ?Sized>(
    store: &S,
    base_folder: &str,
    tag: &str,
) -> Result<String, TagPageError> {
    let tag = Tag::parse_valid(tag)?;
    let path = tag_page_path(store, base_folder, &tag)?;
    store.create_document(&path, &tag_page_text(&tag))?;
    tracing::info!(path = %path, "created tag page for {}", tag);
    Ok(path)
}
