use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use fieldbook_core::Collection;

#[derive(Parser)]
#[command(name = "fieldbook")]
#[command(about = "Offline-first inspection records with remote sync")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// CLI profile name for remote and sync configuration
    #[arg(long, global = true, value_name = "NAME")]
    pub profile: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a record from a JSON payload
    #[command(alias = "new")]
    Add {
        #[arg(value_enum)]
        collection: CollectionArg,
        /// Record payload as JSON (read from stdin when omitted)
        json: Option<String>,
    },
    /// Replace the payload of an existing record
    Update {
        #[arg(value_enum)]
        collection: CollectionArg,
        id: String,
        /// New payload as JSON (read from stdin when omitted)
        json: Option<String>,
    },
    /// Delete a record
    Delete {
        #[arg(value_enum)]
        collection: CollectionArg,
        id: String,
    },
    /// Print one record envelope
    Show {
        #[arg(value_enum)]
        collection: CollectionArg,
        id: String,
    },
    /// List records in a collection
    List {
        #[arg(value_enum)]
        collection: CollectionArg,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Synchronize with the remote store
    Sync {
        #[command(subcommand)]
        command: Option<SyncCommands>,
        /// Keep syncing on an interval until interrupted
        #[arg(long)]
        watch: bool,
        /// Seconds between passes in watch mode
        #[arg(long, value_name = "SECS", requires = "watch")]
        interval: Option<u64>,
    },
    /// Inspect the outgoing mutation queue
    Queue {
        #[command(subcommand)]
        command: QueueCommands,
    },
    /// Connect the CLI profile to the remote disk
    Auth {
        #[command(subcommand)]
        command: AuthCommands,
    },
    /// Configure CLI profiles
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CollectionArg {
    Objects,
    Equipment,
    Inspections,
    Violations,
}

impl From<CollectionArg> for Collection {
    fn from(value: CollectionArg) -> Self {
        match value {
            CollectionArg::Objects => Self::Objects,
            CollectionArg::Equipment => Self::Equipment,
            CollectionArg::Inspections => Self::Inspections,
            CollectionArg::Violations => Self::Violations,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, ValueEnum)]
pub enum RemoteKindArg {
    #[default]
    Yandex,
    LocalDir,
}

#[derive(Subcommand)]
pub enum SyncCommands {
    /// Show the last pass and queue depths
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
pub enum QueueCommands {
    /// List queued mutations (pending and failed by default)
    List {
        /// Include delivered entries
        #[arg(long)]
        all: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove delivered entries
    Purge,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Initialize or update profile config
    Init {
        /// Profile name to initialize
        #[arg(long, value_name = "NAME")]
        profile: Option<String>,
        /// Remote store kind
        #[arg(long, value_enum)]
        remote: Option<RemoteKindArg>,
        /// OAuth application client id
        #[arg(long, value_name = "ID")]
        client_id: Option<String>,
        /// OAuth application client secret
        #[arg(long, value_name = "SECRET")]
        client_secret: Option<String>,
        /// OAuth redirect URI registered for the application
        #[arg(long, value_name = "URL")]
        redirect_uri: Option<String>,
        /// Folder on the remote disk holding all collections
        #[arg(long, value_name = "NAME")]
        root_folder: Option<String>,
        /// Directory used as the remote store for `--remote local-dir`
        #[arg(long, value_name = "PATH")]
        local_dir: Option<PathBuf>,
        /// Seconds between passes for `sync --watch`
        #[arg(long, value_name = "SECS")]
        sync_interval: Option<u64>,
        /// Refuse to overwrite remote records carrying a newer version
        #[arg(long)]
        check_remote_version: bool,
        /// Keep current active profile instead of activating this one
        #[arg(long)]
        no_activate: bool,
    },
}

#[derive(Subcommand)]
pub enum AuthCommands {
    /// Print the authorization URL to open in a browser
    Url {
        /// Optional profile override
        #[arg(long, value_name = "NAME")]
        profile: Option<String>,
    },
    /// Finish authorization with the redirect URL, fragment, or code
    Callback {
        /// Optional profile override
        #[arg(long, value_name = "NAME")]
        profile: Option<String>,
        /// Callback URL, `#access_token=...` fragment, or bare authorization code
        raw: String,
    },
    /// Show auth status for profile
    Status {
        /// Optional profile override
        #[arg(long, value_name = "NAME")]
        profile: Option<String>,
    },
    /// Forget the stored token for profile
    Logout {
        /// Optional profile override
        #[arg(long, value_name = "NAME")]
        profile: Option<String>,
    },
}
