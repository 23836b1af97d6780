//! Command-line arguments.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use scry_search::{ResolvePolicy, SearchType, Source};

/// Find files and objects by name or content, and act on approximate keys.
#[derive(Debug, Parser)]
#[command(name = "scry")]
#[command(about = "Search a local tree and an object store by name or content")]
#[command(version)]
pub struct Cli {
    /// Configuration file (TOML with [search] and [store] tables)
    #[arg(short, long, global = true, env = "SCRY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Sandbox root for local search
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    /// Directory served as the object store bucket
    #[arg(long, global = true)]
    pub bucket_dir: Option<PathBuf>,

    /// Log level
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,

    /// Enable JSON logging
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Search both sources
    Search(SearchArgs),

    /// List existing keys an approximate key could refer to
    Resolve {
        /// Approximate key
        key: String,
    },

    /// Download an object
    Get {
        key: String,

        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        resolve: ResolveArgs,
    },

    /// Upload a local file into a folder of the store
    Put {
        /// File to upload
        file: PathBuf,

        /// Destination folder
        #[arg(long, default_value = "/")]
        to: String,

        /// Object name (defaults to the file name)
        #[arg(long)]
        name: Option<String>,

        /// Replace an existing object
        #[arg(long)]
        overwrite: bool,
    },

    /// Rename an object within its folder
    Mv {
        key: String,

        /// New file name (no separators)
        new_name: String,

        #[command(flatten)]
        resolve: ResolveArgs,
    },

    /// Delete an object
    Rm {
        key: String,

        #[command(flatten)]
        resolve: ResolveArgs,
    },
}

#[derive(Debug, Args)]
pub struct ResolveArgs {
    /// Act on the best resolved guess when the key does not exist as given
    #[arg(long)]
    pub guess: bool,
}

impl ResolveArgs {
    pub fn policy(&self) -> ResolvePolicy {
        if self.guess {
            ResolvePolicy::FirstCandidate
        } else {
            ResolvePolicy::ExactOnly
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum TypeArg {
    Name,
    Content,
    Both,
}

impl From<TypeArg> for SearchType {
    fn from(arg: TypeArg) -> Self {
        match arg {
            TypeArg::Name => Self::Name,
            TypeArg::Content => Self::Content,
            TypeArg::Both => Self::Both,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum SourceArg {
    Local,
    Remote,
}

impl From<SourceArg> for Source {
    fn from(arg: SourceArg) -> Self {
        match arg {
            SourceArg::Local => Self::Local,
            SourceArg::Remote => Self::Remote,
        }
    }
}

#[derive(Debug, Args)]
pub struct SearchArgs {
    /// Search text; `*` matches everything
    #[arg(default_value = "*")]
    pub text: String,

    /// What to match against
    #[arg(short = 't', long = "type", value_enum, default_value = "name")]
    pub search_type: TypeArg,

    /// Restrict to a source (repeatable)
    #[arg(short, long, value_enum)]
    pub source: Vec<SourceArg>,

    #[arg(long)]
    pub case_sensitive: bool,

    /// Treat the text as a regular expression
    #[arg(short = 'E', long)]
    pub regex: bool,

    /// Leave folders out of the results
    #[arg(long)]
    pub no_folders: bool,

    /// Include dot-prefixed local entries
    #[arg(long)]
    pub hidden: bool,

    /// Only these extensions (repeatable or comma separated)
    #[arg(short = 'x', long = "ext", value_delimiter = ',')]
    pub extensions: Vec<String>,

    /// Minimum size in bytes
    #[arg(long)]
    pub min_size: Option<u64>,

    /// Maximum size in bytes
    #[arg(long)]
    pub max_size: Option<u64>,

    /// Modified at or after (YYYY-MM-DD, YYYY-MM-DD HH:MM:SS or RFC 3339)
    #[arg(long)]
    pub after: Option<String>,

    /// Modified at or before
    #[arg(long)]
    pub before: Option<String>,

    /// Attach a short preview to name matches
    #[arg(long)]
    pub preview: bool,

    /// Local sub-path to search
    #[arg(long, default_value = "/")]
    pub path: String,

    /// Keep at most this many results
    #[arg(short = 'n', long)]
    pub limit: Option<usize>,

    /// Stop after this many seconds and print what was found
    #[arg(long)]
    pub timeout: Option<u64>,
}
