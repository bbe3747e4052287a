use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "retag", about = concat!("retag v", env!("CARGO_PKG_VERSION"), " - rename hierarchical tags across a markdown vault"), version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Run against a different vault directory
    #[arg(short = 'C', long = "vault-dir", global = true)]
    pub vault_dir: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a .retag.toml in the current directory
    Init(InitArgs),
    /// List known tags with use counts
    Tags(TagsArgs),
    /// Rename a tag and all of its sub-tags
    Rename(RenameArgs),
    /// Show or create the tag page for a tag
    Page(PageArgs),
    /// List the tag-page index
    Pages(PagesArgs),
    /// Show or change configuration
    Config(ConfigCmd),
    /// View the recovery log
    Recovery(RecoveryArgs),
}

#[derive(Args)]
pub struct InitArgs {
    /// Folder for new tag pages (default: vault root)
    #[arg(long)]
    pub base_folder: Option<String>,
    /// Overwrite an existing .retag.toml
    #[arg(long)]
    pub force: bool,
}

#[derive(Args)]
pub struct TagsArgs {
    /// Only show this tag and its sub-tags
    #[arg(long)]
    pub under: Option<String>,
}

#[derive(Args)]
pub struct RenameArgs {
    /// Tag to rename, with or without the leading #
    pub old: String,
    /// New name (prompted for when omitted)
    pub new: Option<String>,
    /// Confirm tag merges without asking
    #[arg(long, short = 'y')]
    pub yes: bool,
    /// Show what would change without writing anything
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Args)]
pub struct PageArgs {
    pub tag: String,
    /// Create a tag page if none exists
    #[arg(long)]
    pub create: bool,
}

#[derive(Args)]
pub struct PagesArgs {
    /// Keep running and report tag-page changes as files change
    #[arg(long)]
    pub watch: bool,
}

#[derive(Args)]
pub struct ConfigCmd {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show or set the folder new tag pages are created in
    BaseFolder(BaseFolderArgs),
}

#[derive(Args)]
pub struct BaseFolderArgs {
    /// New folder, vault-relative; "" for the vault root
    pub dir: Option<String>,
}

#[derive(Args)]
pub struct RecoveryArgs {
    /// Maximum number of entries to show (default: 10)
    #[arg(long)]
    pub limit: Option<usize>,
}
