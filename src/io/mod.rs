pub mod config_io;
pub mod lock;
pub mod recovery;
pub mod vault_io;
pub mod watcher;
