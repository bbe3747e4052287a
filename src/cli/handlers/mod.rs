mod init;
pub use init::cmd_init;

use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Duration;

use crate::cli::commands::*;
use crate::cli::output::*;
use crate::cli::terminal::TerminalUi;
use crate::io::config_io;
use crate::io::lock::VaultLock;
use crate::io::recovery;
use crate::io::vault_io::{self, FileStore, Vault, VaultError};
use crate::io::watcher::{FileEvent, VaultWatcher};
use crate::model::tag::Tag;
use crate::ops::inventory::{PageDelta, VaultIndex};
use crate::ops::rename::{RenameOutcome, Renamer};
use crate::ops::store::{DocumentStore, StoreError};
use crate::ops::tag_page::{create_tag_page, find_tag_pages};

/// Override for the vault directory (set by -C flag)
static VAULT_DIR_OVERRIDE: OnceLock<PathBuf> = OnceLock::new();

const DEFAULT_RECOVERY_LIMIT: usize = 10;

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

pub fn dispatch(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let json = cli.json;

    if let Some(ref dir) = cli.vault_dir {
        let abs = std::fs::canonicalize(dir)
            .map_err(|e| format!("cannot resolve -C path '{}': {}", dir, e))?;
        let _ = VAULT_DIR_OVERRIDE.set(abs);
    }

    match cli.command {
        Commands::Init(args) => cmd_init(args, &start_dir()?),
        Commands::Tags(args) => cmd_tags(args, json),
        Commands::Rename(args) => cmd_rename(args, json),
        Commands::Page(args) => cmd_page(args, json),
        Commands::Pages(args) => {
            if args.watch {
                cmd_pages_watch(json)
            } else {
                cmd_pages(json)
            }
        }
        Commands::Config(cmd) => match cmd.action {
            ConfigAction::BaseFolder(args) => cmd_base_folder(args, json),
        },
        Commands::Recovery(args) => cmd_recovery(args, json),
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn start_dir() -> Result<PathBuf, VaultError> {
    match VAULT_DIR_OVERRIDE.get() {
        Some(dir) => Ok(dir.clone()),
        None => std::env::current_dir().map_err(VaultError::IoError),
    }
}

fn vault_root_cwd() -> Result<PathBuf, VaultError> {
    vault_io::discover_vault(&start_dir()?)
}

fn load_vault_cwd() -> Result<Vault, VaultError> {
    let vault = vault_io::load_vault(&vault_root_cwd()?)?;
    tracing::debug!(root = %vault.root.display(), "vault loaded");
    Ok(vault)
}

fn build_index(store: &FileStore) -> Result<VaultIndex, StoreError> {
    VaultIndex::build(store)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// ---------------------------------------------------------------------------
// Read commands
// ---------------------------------------------------------------------------

fn cmd_tags(args: TagsArgs, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let vault = load_vault_cwd()?;
    let index = build_index(&vault.store())?;

    let mut counts = index.tag_counts();
    if let Some(under) = &args.under {
        let root = Tag::parse(under)?;
        counts.retain(|c| root.matches(&c.tag));
    }

    if json {
        return print_json(&counts);
    }
    if counts.is_empty() {
        println!("No tags found");
    }
    for line in format_tag_counts(&counts) {
        println!("{}", line);
    }
    Ok(())
}

fn cmd_pages(json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let vault = load_vault_cwd()?;
    let index = build_index(&vault.store())?;
    print_page_index(&index, json)
}

fn print_page_index(index: &VaultIndex, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let entries: Vec<PageEntryJson> = index
        .pages()
        .entries()
        .into_iter()
        .map(|(tag, pages)| PageEntryJson { tag, pages })
        .collect();

    if json {
        return print_json(&entries);
    }
    if entries.is_empty() {
        println!("No tag pages");
    }
    for entry in &entries {
        println!("#{}  {}", entry.tag, entry.pages.join(", "));
    }
    Ok(())
}

fn cmd_recovery(args: RecoveryArgs, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let root = vault_root_cwd()?;
    let limit = args.limit.unwrap_or(DEFAULT_RECOVERY_LIMIT);
    let entries = recovery::read_recovery_entries(&root, Some(limit));

    if json {
        return print_json(&recovery_to_json(&entries));
    }
    if entries.is_empty() {
        println!("No recovery entries");
    }
    for entry in &entries {
        print!("{}", entry.to_markdown());
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Write commands
// ---------------------------------------------------------------------------

fn cmd_rename(args: RenameArgs, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let vault = load_vault_cwd()?;
    let old = Tag::parse(&args.old)?;
    let store = vault.store();
    let mut ui = TerminalUi::new(args.new, args.yes, json);
    let mut renamer = Renamer::new(&store, &mut ui).dry_run(args.dry_run);

    // The vault is only locked and indexed once there is something to rename
    let outcome = match renamer.choose_new_name(&old) {
        Ok(new) => {
            let _lock = if args.dry_run {
                None
            } else {
                let operation = format!("rename {} -> {}", old, new);
                Some(VaultLock::acquire_default(&vault.root, &operation)?)
            };
            let index = build_index(&store)?;
            renamer.rename_to(&index, &old, &new)
        }
        Err(stop) => stop,
    };
    let outcome = renamer.finish(outcome);

    if json {
        return print_json(&outcome);
    }
    match &outcome {
        RenameOutcome::DryRun(plan) => {
            for line in format_plan(plan) {
                println!("{}", line);
            }
        }
        RenameOutcome::Completed(summary) => {
            for failed in &summary.failed {
                eprintln!("  failed: {}: {}", failed.path, failed.reason);
            }
        }
        _ => {}
    }
    Ok(())
}

fn cmd_page(args: PageArgs, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let vault = load_vault_cwd()?;
    let tag = Tag::parse_valid(&args.tag)?;
    let store = vault.store();
    let index = build_index(&store)?;

    let mut pages = find_tag_pages(&index, &tag);
    let mut created = None;
    if pages.is_empty() && args.create {
        let _lock = VaultLock::acquire_default(&vault.root, &format!("create tag page {}", tag))?;
        let path = create_tag_page(&store, &vault.config.pages.base_folder, tag.name())?;
        pages.push(path.clone());
        created = Some(path);
    }

    if json {
        return print_json(&PageJson {
            tag: tag.name().to_string(),
            pages,
            created,
        });
    }
    match (&created, pages.is_empty()) {
        (Some(path), _) => println!("Created tag page for {}: {}", tag, path),
        (None, true) => println!("No tag page for {} (use --create to make one)", tag),
        (None, false) => {
            for page in &pages {
                println!("{}", page);
            }
        }
    }
    Ok(())
}

fn cmd_base_folder(args: BaseFolderArgs, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let root = vault_root_cwd()?;
    let (config, mut doc) = config_io::read_config(&root)?;

    let folder = match args.dir {
        None => config.pages.base_folder,
        Some(dir) => {
            let _lock = VaultLock::acquire_default(&root, "set base folder")?;
            config_io::set_base_folder(&mut doc, &dir);
            config_io::write_config(&root, &doc)?;
            dir.trim_matches('/').to_string()
        }
    };

    if json {
        return print_json(&serde_json::json!({ "base_folder": folder }));
    }
    if folder.is_empty() {
        println!("base_folder = \"\" (vault root)");
    } else {
        println!("base_folder = \"{}\"", folder);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Watch mode
// ---------------------------------------------------------------------------

const WATCH_POLL: Duration = Duration::from_millis(500);

fn cmd_pages_watch(json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let vault = load_vault_cwd()?;
    let store = vault.store();
    let mut index = build_index(&store)?;
    print_page_index(&index, json)?;

    let watcher = VaultWatcher::start(&vault.root, &vault.config.vault.extensions)?;
    eprintln!("Watching {} for tag page changes (Ctrl-C to stop)", vault.root.display());

    loop {
        for event in watcher.wait(WATCH_POLL) {
            let (paths, removed) = match event {
                FileEvent::Changed(paths) => (paths, false),
                FileEvent::Removed(paths) => (paths, true),
            };
            for path in paths {
                let Some(handle) = store.handle_for(&path) else {
                    continue;
                };
                if let Some(delta) = apply_file_event(&store, &mut index, &handle, removed) {
                    report_page_delta(&handle, &delta, json)?;
                }
            }
        }
    }
}

/// Run the index hook for one changed file
fn apply_file_event(
    store: &FileStore,
    index: &mut VaultIndex,
    handle: &str,
    removed: bool,
) -> Option<PageDelta> {
    let delta = if removed {
        index.on_deleted(handle)
    } else {
        match store.read_document(handle) {
            Ok(doc) => index.on_changed(&doc),
            Err(StoreError::NotFound(_)) => index.on_deleted(handle),
            Err(e) => {
                tracing::warn!("{}", e);
                return None;
            }
        }
    };
    tracing::info!(path = handle, "index updated");
    (!delta.is_empty()).then_some(delta)
}

fn report_page_delta(path: &str, delta: &PageDelta, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    if json {
        let change = PageChangeJson {
            path,
            added: delta.added.clone(),
            removed: delta.removed.clone(),
        };
        println!("{}", serde_json::to_string(&change)?);
    } else {
        println!("{}", format_page_delta(path, delta));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::config::VaultSettings;
    use crate::ops::inventory::TagInventory;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    fn watched_vault() -> (TempDir, FileStore, VaultIndex) {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("p.md"), "---\naliases: [\"#topic\"]\n---\n").unwrap();
        let store = FileStore::new(tmp.path(), &VaultSettings::default());
        let index = VaultIndex::build(&store).unwrap();
        (tmp, store, index)
    }

    #[test]
    fn test_file_event_change_and_remove() {
        let (tmp, store, mut index) = watched_vault();
        fs::write(tmp.path().join("p.md"), "---\naliases: [\"#other\"]\n---\n").unwrap();
        let delta = apply_file_event(&store, &mut index, "p.md", false).unwrap();
        assert_eq!(delta.added, vec!["other"]);
        assert_eq!(delta.removed, vec!["topic"]);

        fs::remove_file(tmp.path().join("p.md")).unwrap();
        // a modify event can arrive after the file is gone
        let delta = apply_file_event(&store, &mut index, "p.md", false).unwrap();
        assert_eq!(delta.removed, vec!["other"]);
        assert!(index.pages().is_empty());
    }

    #[test]
    fn test_file_event_without_page_change() {
        let (tmp, store, mut index) = watched_vault();
        fs::write(tmp.path().join("n.md"), "#topic in a note").unwrap();
        assert_eq!(apply_file_event(&store, &mut index, "n.md", false), None);
        assert!(index.document_tags("n.md").is_some());
    }
}
