pub mod batch;
pub mod inventory;
pub mod rename;
pub mod rewrite;
pub mod store;
pub mod tag_page;

pub use batch::{BatchReport, BatchRunner, BatchState, Progress};
pub use inventory::{DocumentTags, TagInventory, TagPageIndex, VaultIndex};
pub use rename::{RenameOutcome, RenameSummary, RenameUi, Renamer};
pub use rewrite::{RewriteError, rewrite_document};
pub use store::{DocumentStore, StoreError};
