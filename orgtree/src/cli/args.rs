//! CLI argument definitions using clap

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueHint};

use crate::application::services::SyncPolicy;
use crate::domain::{NodeId, NodeType};

/// Edit an organizational tree (institute, school, department, teacher) stored behind a REST service
#[derive(Parser, Debug)]
#[command(name = "orgtree")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Debug verbosity, repeat for more (-d info, -dd debug, -ddd trace)
    #[arg(short = 'd', long = "debug", action = clap::ArgAction::Count, global = true)]
    pub debug: u8,

    /// Base URL of the tree service (overrides config)
    #[arg(long, global = true, value_hint = ValueHint::Url)]
    pub url: Option<String>,

    /// Sync policy: optimistic-no-rollback, optimistic-with-rollback, pessimistic
    #[arg(long, global = true)]
    pub policy: Option<SyncPolicy>,

    /// Config file layered over the global one
    #[arg(long, global = true, env = "ORGTREE_CONFIG", value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Render the hierarchy
    Tree {
        /// Expand every node
        #[arg(short, long)]
        all: bool,
        /// Expand these nodes
        #[arg(short, long, value_name = "ID")]
        expand: Vec<NodeId>,
    },

    /// Add a node
    Add {
        /// Parent node (omit for a new root)
        #[arg(short, long)]
        parent: Option<NodeId>,
        #[arg(short, long)]
        name: String,
        #[arg(short = 'D', long)]
        description: String,
        /// institute, school, department or teacher (default: level below the parent)
        #[arg(short = 't', long = "type")]
        node_type: Option<NodeType>,
    },

    /// Change the fields of a node
    Edit {
        id: NodeId,
        #[arg(short, long)]
        name: Option<String>,
        #[arg(short = 'D', long)]
        description: Option<String>,
        #[arg(short = 't', long = "type")]
        node_type: Option<NodeType>,
    },

    /// Delete a single node; its children become orphans
    Delete { id: NodeId },

    /// Report orphans, cycles and duplicate ids
    Check,

    /// Interactive editor
    Shell,

    /// Manage settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Generate shell completions
    Completion {
        /// Shell type
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show merged config
    Show,

    /// Print a config template
    Template,

    /// Show config paths
    Path,
}
