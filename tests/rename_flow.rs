//! Drives the rename flow end to end against an in-memory store and a
//! scripted UI.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::rc::Rc;

use pretty_assertions::assert_eq;
use retag::model::document::{Document, RewriteOutcome};
use retag::model::replacement::ClashKind;
use retag::model::tag::{Tag, TagError};
use retag::ops::batch::Progress;
use retag::ops::inventory::VaultIndex;
use retag::ops::rename::{MergeWarning, RenameOutcome, RenameUi, Renamer, SEARCH_TITLE};
use retag::ops::store::{DocumentStore, StoreError};

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

#[derive(Default)]
struct MemStore {
    docs: RefCell<BTreeMap<String, String>>,
    listings: Cell<usize>,
    reads: Cell<usize>,
    writes: RefCell<Vec<String>>,
    failing: BTreeSet<String>,
    /// Raise this flag once this many documents have been written
    cancel_after: Option<(usize, Rc<Cell<bool>>)>,
}

impl MemStore {
    fn with(docs: &[(&str, &str)]) -> Self {
        let store = MemStore::default();
        for (path, text) in docs {
            store.docs.borrow_mut().insert(path.to_string(), text.to_string());
        }
        store
    }

    fn text(&self, path: &str) -> String {
        self.docs.borrow()[path].clone()
    }
}

impl DocumentStore for MemStore {
    fn list_documents(&self) -> Result<Vec<String>, StoreError> {
        self.listings.set(self.listings.get() + 1);
        Ok(self.docs.borrow().keys().cloned().collect())
    }

    fn read_document(&self, path: &str) -> Result<Document, StoreError> {
        self.reads.set(self.reads.get() + 1);
        self.docs
            .borrow()
            .get(path)
            .map(|text| Document::from_text(path, text))
            .ok_or_else(|| StoreError::NotFound(path.to_string()))
    }

    fn write_document(&self, original: &Document, outcome: &RewriteOutcome) -> Result<(), StoreError> {
        if self.failing.contains(&original.path) {
            return Err(StoreError::WriteError {
                path: original.path.clone(),
                source: std::io::Error::other("disk full"),
            });
        }
        self.docs
            .borrow_mut()
            .insert(original.path.clone(), original.render(outcome));
        self.writes.borrow_mut().push(original.path.clone());
        if let Some((limit, flag)) = &self.cancel_after
            && self.writes.borrow().len() == *limit
        {
            flag.set(true);
        }
        Ok(())
    }

    fn create_document(&self, path: &str, text: &str) -> Result<(), StoreError> {
        self.docs.borrow_mut().insert(path.to_string(), text.to_string());
        Ok(())
    }

    fn exists(&self, path: &str) -> bool {
        self.docs.borrow().contains_key(path)
    }
}

struct FakeProgress {
    cancelled: Rc<Cell<bool>>,
}

impl Progress for FakeProgress {
    fn update_message(&mut self, _text: &str) {}

    fn is_cancelled(&self) -> bool {
        self.cancelled.get()
    }

    fn close(&mut self) {}
}

#[derive(Default)]
struct ScriptedUi {
    answers: VecDeque<Option<String>>,
    rejections: Vec<String>,
    confirm: bool,
    warnings: Vec<String>,
    clash_kinds: Vec<ClashKind>,
    progress_titles: Vec<String>,
    notices: Vec<String>,
    cancel_search: bool,
    cancel: Rc<Cell<bool>>,
}

impl ScriptedUi {
    fn answering(answers: &[&str]) -> Self {
        ScriptedUi {
            answers: answers.iter().map(|a| Some(a.to_string())).collect(),
            ..ScriptedUi::default()
        }
    }
}

impl RenameUi for ScriptedUi {
    type Progress = FakeProgress;

    fn prompt_new_name(&mut self, _current: &str, rejected: Option<&TagError>) -> Option<String> {
        if let Some(reason) = rejected {
            self.rejections.push(reason.to_string());
        }
        self.answers.pop_front().flatten()
    }

    fn confirm_irreversible_merge(&mut self, warning: &MergeWarning) -> bool {
        self.warnings.push(warning.to_string());
        self.clash_kinds.push(warning.clash.kind);
        self.confirm
    }

    fn show_progress(&mut self, title: &str, _message: &str) -> FakeProgress {
        self.progress_titles.push(title.to_string());
        if title == SEARCH_TITLE && self.cancel_search {
            return FakeProgress {
                cancelled: Rc::new(Cell::new(true)),
            };
        }
        FakeProgress {
            cancelled: self.cancel.clone(),
        }
    }

    fn notice(&mut self, text: &str) {
        self.notices.push(text.to_string());
    }
}

/// Index the store; afterwards `reads` counts only the rewrite's own reads.
fn indexed(store: &MemStore) -> VaultIndex {
    let index = VaultIndex::build(store).unwrap();
    store.reads.set(0);
    index
}

/// Rename the way the CLI does: settle the name, then index.
fn rename(store: &MemStore, ui: &mut ScriptedUi, old: &str) -> RenameOutcome {
    let old = Tag::parse(old).unwrap();
    let mut renamer = Renamer::new(store, ui);
    let outcome = match renamer.choose_new_name(&old) {
        Ok(new) => renamer.rename_to(&indexed(store), &old, &new),
        Err(stop) => stop,
    };
    renamer.finish(outcome)
}

fn sample_vault() -> MemStore {
    MemStore::with(&[
        ("index.md", "---\ntitle: Index\ntags: [proj, other]\n---\nSee #proj and #proj/a.\n"),
        ("notes/alpha.md", "Working on #proj/a today.\n\n```\n#proj in code\n```\n"),
        ("notes/beta.md", "#projection is not #Proj/B\n"),
        ("archive.md", "#archive/a old stuff\n"),
        ("Tags/proj.md", "---\naliases: [\"#proj\", Project]\n---\n"),
    ])
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[test]
fn test_rename_rewrites_every_source() {
    let store = sample_vault();
    let mut ui = ScriptedUi::answering(&["work"]);

    let outcome = rename(&store, &mut ui, "proj");

    let RenameOutcome::Completed(summary) = outcome else {
        panic!("expected completion, got {outcome:?}");
    };
    assert_eq!(summary.targets, 4);
    assert_eq!(summary.updated, 4);
    assert!(!summary.aborted);
    assert_eq!(ui.notices, vec!["Operation complete: 4 file(s) updated"]);
    assert_eq!(ui.progress_titles, vec!["Searching for tags", "Renaming to #work/*"]);

    insta::assert_snapshot!(store.text("index.md"), @r"
    ---
    title: Index
    tags:
    - work
    - other
    ---
    See #work and #work/a.
    ");
    assert_eq!(
        store.text("notes/alpha.md"),
        "Working on #work/a today.\n\n```\n#proj in code\n```\n"
    );
    assert_eq!(store.text("notes/beta.md"), "#projection is not #work/B\n");
    assert_eq!(store.text("archive.md"), "#archive/a old stuff\n");
    assert!(store.text("Tags/proj.md").contains("'#work'"));
    assert!(store.text("Tags/proj.md").contains("Project"));
}

#[test]
fn test_cancel_after_third_document() {
    let cancel = Rc::new(Cell::new(false));
    let docs: Vec<(String, String)> = (0..10)
        .map(|i| (format!("note{i:02}.md"), format!("item {i} #proj\n")))
        .collect();
    let mut store = MemStore::default();
    for (path, text) in &docs {
        store.docs.borrow_mut().insert(path.clone(), text.clone());
    }
    store.cancel_after = Some((3, cancel.clone()));
    let mut ui = ScriptedUi {
        cancel,
        ..ScriptedUi::answering(&["archive"])
    };

    let outcome = rename(&store, &mut ui, "proj");

    let RenameOutcome::Completed(summary) = outcome else {
        panic!("expected a partial run, got {outcome:?}");
    };
    assert_eq!(store.writes.borrow().len(), 3);
    assert_eq!(summary.updated, 3);
    assert!(summary.aborted);
    assert_eq!(ui.notices, vec!["Operation cancelled: 3 file(s) updated"]);
    assert_eq!(store.text("note02.md"), "item 2 #archive\n");
    assert_eq!(store.text("note03.md"), "item 3 #proj\n");
}

#[test]
fn test_case_only_rename_is_a_noop() {
    let store = sample_vault();
    let mut ui = ScriptedUi::answering(&["PROJ"]);

    let outcome = rename(&store, &mut ui, "proj");

    assert_eq!(outcome, RenameOutcome::NoChange);
    assert_eq!(store.listings.get(), 0);
    assert_eq!(store.reads.get(), 0);
    assert!(store.writes.borrow().is_empty());
    assert!(ui.progress_titles.is_empty());
    assert_eq!(ui.notices, vec!["Unchanged or empty tag: No changes made."]);
}

#[test]
fn test_empty_answer_is_a_noop() {
    let store = sample_vault();
    let mut ui = ScriptedUi::answering(&["  "]);
    assert_eq!(rename(&store, &mut ui, "proj"), RenameOutcome::NoChange);
    assert_eq!(store.listings.get(), 0);
    assert_eq!(store.reads.get(), 0);
    assert!(store.writes.borrow().is_empty());
}

#[test]
fn test_cancelled_prompt_is_silent() {
    let store = sample_vault();
    let mut ui = ScriptedUi::default();
    assert_eq!(rename(&store, &mut ui, "proj"), RenameOutcome::Cancelled);
    assert!(ui.notices.is_empty());
    assert!(store.writes.borrow().is_empty());
}

#[test]
fn test_invalid_name_reprompts() {
    let store = sample_vault();
    let mut ui = ScriptedUi::answering(&["bad name", "a//b", "good"]);

    let outcome = rename(&store, &mut ui, "proj");

    assert!(matches!(outcome, RenameOutcome::Completed(_)));
    assert_eq!(ui.rejections.len(), 2);
    assert!(ui.rejections[0].contains("not allowed"));
    assert!(ui.rejections[1].contains("empty path segment"));
    assert_eq!(store.text("notes/beta.md"), "#projection is not #good/B\n");
}

#[test]
fn test_declined_merge_changes_nothing() {
    let store = sample_vault();
    let mut ui = ScriptedUi::answering(&["archive"]);

    let outcome = rename(&store, &mut ui, "proj");

    assert_eq!(outcome, RenameOutcome::MergeDeclined);
    assert_eq!(ui.clash_kinds, vec![ClashKind::Descendant]);
    assert_eq!(
        ui.warnings,
        vec![
            "Renaming #proj to #archive will merge multiple tags into existing tags \
             (such as #proj/a merging with #archive/a). This cannot be undone."
        ]
    );
    assert_eq!(ui.notices, vec!["Operation cancelled: No changes made."]);
    assert_eq!(store.reads.get(), 0);
    assert!(store.writes.borrow().is_empty());
}

#[test]
fn test_confirmed_merge_proceeds() {
    let store = sample_vault();
    let mut ui = ScriptedUi {
        confirm: true,
        ..ScriptedUi::answering(&["archive"])
    };

    let outcome = rename(&store, &mut ui, "proj");

    assert!(matches!(outcome, RenameOutcome::Completed(ref s) if s.updated == 4));
    assert_eq!(store.text("notes/alpha.md").lines().next(), Some("Working on #archive/a today."));
}

#[test]
fn test_direct_merge_wording() {
    let store = MemStore::with(&[("a.md", "#draft and #wip\n")]);
    let mut ui = ScriptedUi::answering(&["wip"]);

    assert_eq!(rename(&store, &mut ui, "draft"), RenameOutcome::MergeDeclined);
    assert_eq!(ui.clash_kinds, vec![ClashKind::Direct]);
    assert_eq!(
        ui.warnings,
        vec!["Renaming #draft to #wip will merge these tags. This cannot be undone."]
    );
}

#[test]
fn test_merge_with_tag_page_only_tag() {
    let store = MemStore::with(&[
        ("a.md", "#draft\n"),
        ("Tags/wip.md", "---\naliases: [\"#wip\"]\n---\n"),
    ]);
    let mut ui = ScriptedUi::answering(&["wip"]);
    assert_eq!(rename(&store, &mut ui, "draft"), RenameOutcome::MergeDeclined);
}

#[test]
fn test_cancelled_search_changes_nothing() {
    let store = sample_vault();
    let mut ui = ScriptedUi {
        cancel_search: true,
        ..ScriptedUi::answering(&["work"])
    };

    let outcome = rename(&store, &mut ui, "proj");

    assert_eq!(outcome, RenameOutcome::EnumerationCancelled);
    assert_eq!(ui.notices, vec!["Operation cancelled: No changes made."]);
    assert_eq!(store.reads.get(), 0);
    assert!(store.writes.borrow().is_empty());
}

#[test]
fn test_unused_tag_reports_no_documents() {
    let store = sample_vault();
    let mut ui = ScriptedUi::answering(&["other2"]);
    let outcome = rename(&store, &mut ui, "missing");
    assert_eq!(outcome, RenameOutcome::NoTargets { old: "missing".to_string() });
    assert_eq!(ui.notices, vec!["No documents use #missing: No changes made."]);
}

#[test]
fn test_failures_do_not_stop_the_batch() {
    let mut store = sample_vault();
    store.failing.insert("notes/alpha.md".to_string());
    let index = indexed(&store);
    // changed on disk after indexing: offsets are stale
    store
        .docs
        .borrow_mut()
        .insert("notes/beta.md".to_string(), "moved: #projection is not #Proj/B\n".to_string());
    let mut ui = ScriptedUi::answering(&["work"]);

    let outcome = Renamer::new(&store, &mut ui).rename(&index, &Tag::parse("proj").unwrap());

    let RenameOutcome::Completed(summary) = outcome else {
        panic!("expected completion, got {outcome:?}");
    };
    assert_eq!(summary.updated, 2);
    let failed: Vec<&str> = summary.failed.iter().map(|f| f.path.as_str()).collect();
    assert_eq!(failed, vec!["notes/alpha.md", "notes/beta.md"]);
    assert!(!summary.aborted);
    assert_eq!(ui.notices, vec!["Operation complete: 2 file(s) updated, 2 failed"]);
    assert_eq!(store.text("notes/beta.md"), "moved: #projection is not #Proj/B\n");
}

#[test]
fn test_dry_run_writes_nothing() {
    let store = sample_vault();
    let index = indexed(&store);
    let mut ui = ScriptedUi::answering(&["archive"]);

    let outcome = Renamer::new(&store, &mut ui)
        .dry_run(true)
        .rename(&index, &Tag::parse("proj").unwrap());

    let RenameOutcome::DryRun(plan) = outcome else {
        panic!("expected a dry run, got {outcome:?}");
    };
    assert_eq!(
        plan.targets,
        vec!["Tags/proj.md", "index.md", "notes/alpha.md", "notes/beta.md"]
    );
    assert_eq!(plan.clash.map(|c| c.origin), Some("proj/a".to_string()));
    assert!(ui.warnings.is_empty());
    assert!(store.writes.borrow().is_empty());
}

#[test]
fn test_second_rename_finds_nothing() {
    let store = sample_vault();
    let mut ui = ScriptedUi::answering(&["work"]);
    rename(&store, &mut ui, "proj");

    let writes = store.writes.borrow().len();
    let mut again = ScriptedUi::answering(&["work"]);
    let outcome = rename(&store, &mut again, "proj");
    assert_eq!(outcome, RenameOutcome::NoTargets { old: "proj".to_string() });
    assert_eq!(store.writes.borrow().len(), writes);
}
