//! jcrsync command line tool

mod edit;
mod import;
mod show;
mod tree;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "jcrsync")]
#[command(author = "jcrsync Contributors")]
#[command(version = "0.1.0")]
#[command(about = "Push file trees of content into a content repository")]
struct Cli {
    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Destructively import directories into a repository
    Import {
        /// Source directories, each replacing the children of its destination
        #[arg(required = true)]
        dirs: Vec<PathBuf>,
        /// Repository directory
        #[arg(short, long)]
        repo: PathBuf,
        /// Destination path (single directory only; otherwise derived
        /// from the jcr_root layout)
        #[arg(short, long)]
        dest: Option<String>,
        /// Import configuration file (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Print the node described by a directory or descriptor file
    Show {
        path: PathBuf,
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Edit a descriptor document in place
    Edit {
        path: PathBuf,
        /// Set a property, `name=value` (value in descriptor attribute form)
        #[arg(long = "set", value_name = "NAME=VALUE")]
        set: Vec<String>,
        /// Remove a property
        #[arg(long = "remove", value_name = "NAME")]
        remove: Vec<String>,
        /// Replace the primary type
        #[arg(long)]
        primary_type: Option<String>,
        /// Add a mixin type
        #[arg(long = "add-mixin", value_name = "MIXIN")]
        add_mixin: Vec<String>,
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Print a repository subtree
    Tree {
        #[arg(short, long)]
        repo: PathBuf,
        /// Subtree root
        #[arg(default_value = "/")]
        path: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.debug { "jcrsync=debug" } else { "jcrsync=info" };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.parse()?))
        .init();

    match cli.command {
        Commands::Import {
            dirs,
            repo,
            dest,
            config,
        } => import::run(dirs, repo, dest, config).await,

        Commands::Show { path, config } => show::run(&path, config.as_deref()),

        Commands::Edit {
            path,
            set,
            remove,
            primary_type,
            add_mixin,
            config,
        } => {
            let changes = edit::NodeChanges {
                set,
                remove,
                primary_type,
                add_mixins: add_mixin,
            };
            edit::run(&path, &changes, config.as_deref())
        }

        Commands::Tree { repo, path } => tree::run(&repo, &path),
    }
}
