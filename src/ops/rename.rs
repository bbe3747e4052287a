use std::fmt;

use serde::Serialize;

use crate::model::replacement::{Clash, ClashKind, Replacement};
use crate::model::tag::{Tag, TagError};
use crate::ops::batch::{BatchRunner, Progress};
use crate::ops::inventory::{DocumentTags, TagInventory};
use crate::ops::rewrite::{rewrite_document, RewriteError};
use crate::ops::store::DocumentStore;

pub const SEARCH_TITLE: &str = "Searching for tags";
pub const SEARCH_MESSAGE: &str = "Scanning files...";
pub const REWRITE_MESSAGE: &str = "Processing files...";

/// The operator-facing side of a rename.
pub trait RenameUi {
    type Progress: Progress;

    /// Ask for the new tag name, seeded with `current`. `rejected` carries
    /// the reason the previous answer was refused. `None` means the operator
    /// cancelled.
    fn prompt_new_name(&mut self, current: &str, rejected: Option<&TagError>) -> Option<String>;

    /// Ask whether to go ahead with a merge that cannot be undone.
    fn confirm_irreversible_merge(&mut self, warning: &MergeWarning) -> bool;

    fn show_progress(&mut self, title: &str, message: &str) -> Self::Progress;

    /// Show a one-line summary notice.
    fn notice(&mut self, text: &str);
}

/// Confirmation details for a rename that merges tags
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergeWarning {
    pub old: String,
    pub new: String,
    pub clash: Clash,
}

impl fmt::Display for MergeWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.clash.kind {
            ClashKind::Direct => write!(
                f,
                "Renaming #{} to #{} will merge these tags. This cannot be undone.",
                self.old, self.new
            ),
            ClashKind::Descendant => write!(
                f,
                "Renaming #{} to #{} will merge multiple tags into existing tags \
                 (such as #{} merging with #{}). This cannot be undone.",
                self.old, self.new, self.clash.origin, self.clash.collides_with
            ),
        }
    }
}

/// A document the rewrite batch could not update
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedDocument {
    pub path: String,
    pub reason: String,
}

/// Counts reported at the end of a rewrite batch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RenameSummary {
    pub old: String,
    pub new: String,
    /// Documents found to mention the old tag
    pub targets: usize,
    pub updated: usize,
    /// Targets that were read but needed no change
    pub unchanged: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failed: Vec<FailedDocument>,
    /// The operator cancelled partway through
    pub aborted: bool,
}

/// What a dry run found
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenamePlan {
    pub old: String,
    pub new: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clash: Option<Clash>,
    pub targets: Vec<String>,
}

/// Terminal outcome of one rename.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RenameOutcome {
    /// The operator cancelled the name prompt
    Cancelled,
    /// The new name was empty or identical to the old one
    NoChange,
    /// The operator declined a merge
    MergeDeclined,
    /// Target enumeration was cancelled before any write
    EnumerationCancelled,
    NoTargets { old: String },
    DryRun(RenamePlan),
    Completed(RenameSummary),
}

impl RenameOutcome {
    /// The summary notice for this outcome. A cancelled prompt is silent.
    pub fn notice(&self) -> Option<String> {
        match self {
            RenameOutcome::Cancelled => None,
            RenameOutcome::NoChange => Some("Unchanged or empty tag: No changes made.".to_string()),
            RenameOutcome::MergeDeclined | RenameOutcome::EnumerationCancelled => {
                Some("Operation cancelled: No changes made.".to_string())
            }
            RenameOutcome::NoTargets { old } => {
                Some(format!("No documents use #{old}: No changes made."))
            }
            RenameOutcome::DryRun(plan) => Some(format!(
                "Dry run: {} file(s) would be updated",
                plan.targets.len()
            )),
            RenameOutcome::Completed(summary) if summary.aborted => Some(format!(
                "Operation cancelled: {} file(s) updated",
                summary.updated
            )),
            RenameOutcome::Completed(summary) => {
                let mut text = format!("Operation complete: {} file(s) updated", summary.updated);
                if !summary.failed.is_empty() {
                    text.push_str(&format!(", {} failed", summary.failed.len()));
                }
                Some(text)
            }
        }
    }
}

/// Drives one rename from the name prompt to the summary notice.
///
/// The name is settled before the inventory is consulted, so callers can
/// skip indexing and locking for renames that stop at the prompt.
pub struct Renamer<'a, S, U>
where
    S: DocumentStore + ?Sized,
    U: RenameUi,
{
    store: &'a S,
    ui: &'a mut U,
    dry_run: bool,
}

impl<'a, S, U> Renamer<'a, S, U>
where
    S: DocumentStore + ?Sized,
    U: RenameUi,
{
    pub fn new(store: &'a S, ui: &'a mut U) -> Self {
        Renamer {
            store,
            ui,
            dry_run: false,
        }
    }

    /// Stop after clash detection and target enumeration.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Rename `old` end to end, showing the outcome's notice before
    /// returning it.
    pub fn rename<I: TagInventory + ?Sized>(&mut self, inventory: &I, old: &Tag) -> RenameOutcome {
        let outcome = match self.choose_new_name(old) {
            Ok(new) => self.rename_to(inventory, old, &new),
            Err(stop) => stop,
        };
        self.finish(outcome)
    }

    /// Prompt for the new name. `Err` carries the outcome when the rename
    /// ends here (cancelled, or nothing to change); no document is touched.
    pub fn choose_new_name(&mut self, old: &Tag) -> Result<Tag, RenameOutcome> {
        let new = match self.prompt(old) {
            Prompted::Tag(tag) => tag,
            Prompted::Empty => return Err(RenameOutcome::NoChange),
            Prompted::Cancelled => return Err(RenameOutcome::Cancelled),
        };
        if new.canonical() == old.canonical() {
            tracing::debug!(old = %old, new = %new, "rename is a no-op");
            return Err(RenameOutcome::NoChange);
        }
        Ok(new)
    }

    /// Everything after the prompt: clash check, target search, rewrite.
    /// No notice is shown; pass the result to [`Renamer::finish`].
    pub fn rename_to<I: TagInventory + ?Sized>(
        &mut self,
        inventory: &I,
        old: &Tag,
        new: &Tag,
    ) -> RenameOutcome {
        let replacement = Replacement::new(old.clone(), new.clone());
        let known = inventory.all_known_tags();
        let clash = replacement.will_merge_tags(&known);
        if let Some(clash) = &clash {
            tracing::debug!(origin = %clash.origin, collides_with = %clash.collides_with, "merge detected");
            if !self.dry_run {
                let warning = MergeWarning {
                    old: old.name().to_string(),
                    new: new.name().to_string(),
                    clash: clash.clone(),
                };
                if !self.ui.confirm_irreversible_merge(&warning) {
                    return RenameOutcome::MergeDeclined;
                }
            }
        }

        let Some(targets) = self.find_targets(inventory, old) else {
            return RenameOutcome::EnumerationCancelled;
        };
        if targets.is_empty() {
            return RenameOutcome::NoTargets {
                old: old.name().to_string(),
            };
        }

        if self.dry_run {
            return RenameOutcome::DryRun(RenamePlan {
                old: old.name().to_string(),
                new: new.name().to_string(),
                clash,
                targets: targets.into_iter().map(|t| t.path).collect(),
            });
        }

        let summary = self.rewrite_all(&replacement, targets);
        tracing::info!(
            updated = summary.updated,
            failed = summary.failed.len(),
            aborted = summary.aborted,
            "rename {} -> {} finished",
            old,
            new
        );
        RenameOutcome::Completed(summary)
    }

    /// Show the outcome's notice and hand it back.
    pub fn finish(&mut self, outcome: RenameOutcome) -> RenameOutcome {
        if let Some(text) = outcome.notice() {
            self.ui.notice(&text);
        }
        outcome
    }

    /// Prompt until the answer is a valid tag, empty, or cancelled.
    fn prompt(&mut self, old: &Tag) -> Prompted {
        let mut rejected: Option<TagError> = None;
        loop {
            let Some(answer) = self.ui.prompt_new_name(old.name(), rejected.as_ref()) else {
                return Prompted::Cancelled;
            };
            match Tag::parse_valid(&answer) {
                Ok(tag) => return Prompted::Tag(tag),
                Err(TagError::Empty) => return Prompted::Empty,
                Err(e) => {
                    tracing::debug!("rejected tag name {:?}: {}", answer, e);
                    rejected = Some(e);
                }
            }
        }
    }

    /// Documents mentioning `old`, or `None` if the operator cancelled.
    fn find_targets<I: TagInventory + ?Sized>(
        &mut self,
        inventory: &I,
        old: &Tag,
    ) -> Option<Vec<DocumentTags>> {
        let progress = self.ui.show_progress(SEARCH_TITLE, SEARCH_MESSAGE);
        let mut runner = BatchRunner::new(progress);
        let mut targets = Vec::new();
        let report = runner.run(
            inventory.document_paths(),
            |path| path.clone(),
            |path| {
                if let Some(doc) = inventory.document_tags(&path)
                    && doc.mentions(old)
                {
                    targets.push(doc.clone());
                }
            },
        );
        if report.aborted {
            tracing::debug!(scanned = report.processed, "target search cancelled");
            return None;
        }
        Some(targets)
    }

    fn rewrite_all(&mut self, replacement: &Replacement, targets: Vec<DocumentTags>) -> RenameSummary {
        let title = format!("Renaming to {}/*", replacement.new_tag().display());
        let progress = self.ui.show_progress(&title, REWRITE_MESSAGE);
        let mut runner = BatchRunner::new(progress);
        let store = self.store;
        let mut summary = RenameSummary {
            old: replacement.old_tag().name().to_string(),
            new: replacement.new_tag().name().to_string(),
            targets: targets.len(),
            ..RenameSummary::default()
        };

        let report = runner.run(
            targets,
            |target| target.path.clone(),
            |target| match rewrite_one(store, &target, replacement) {
                Ok(true) => {
                    tracing::debug!(path = %target.path, "updated");
                    summary.updated += 1;
                }
                Ok(false) => {
                    tracing::debug!(path = %target.path, "no change needed");
                    summary.unchanged += 1;
                }
                Err(e) => {
                    tracing::warn!("{}", e);
                    summary.failed.push(FailedDocument {
                        path: target.path.clone(),
                        reason: e.to_string(),
                    });
                }
            },
        );
        summary.aborted = report.aborted;
        summary
    }
}

enum Prompted {
    Tag(Tag),
    Empty,
    Cancelled,
}

/// Read one target fresh, rewrite it, and write it back if anything changed.
fn rewrite_one<S: DocumentStore + ?Sized>(
    store: &S,
    target: &DocumentTags,
    replacement: &Replacement,
) -> Result<bool, RewriteError> {
    let doc = store.read_document(&target.path)?;
    let outcome = rewrite_document(&doc, &target.inline, replacement)?;
    if !outcome.changed {
        return Ok(false);
    }
    store.write_document(&doc, &outcome)?;
    Ok(true)
}
