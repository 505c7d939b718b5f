use clap::{Parser, Subcommand};
use std::path::PathBuf;

use imgref_core::{NamingPolicy, SyntaxKind};

#[derive(Debug, Parser)]
#[command(name = "imgref")]
#[command(about = "Keep image references in a Markdown vault consistent")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Vault root directory
    #[arg(short, long, global = true, default_value = ".")]
    pub root: PathBuf,

    /// Config file (defaults to <root>/.imgref.yaml)
    #[arg(short = 'C', long, global = true)]
    pub config: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Scan every note and summarise its image references
    Scan,

    /// List references whose target does not exist
    Broken,

    /// List images that no note references
    Orphans,

    /// Rewrite link targets under a naming policy
    Convert {
        /// shortest-unique, relative or absolute (defaults to the config value)
        #[arg(short, long)]
        policy: Option<NamingPolicy>,

        /// Also rewrite every link into this syntax (wiki, markdown, html)
        #[arg(short, long)]
        syntax: Option<SyntaxKind>,

        /// Show the edits without writing anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Repair broken references using the operation log
    Recover {
        /// Show what would be recovered without writing anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Move or rename an image and update every reference to it
    Mv {
        /// Current path, relative to the vault root
        from: String,
        /// New path, relative to the vault root
        to: String,
    },

    /// Record a move done outside imgref and update references to it
    Renamed {
        from: String,
        to: String,

        /// Record the move but only show the edits
        #[arg(long)]
        dry_run: bool,
    },

    /// Print the effective configuration
    Config,
}
