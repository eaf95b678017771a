use anyhow::{Result, anyhow};
use clap::{Parser, Subcommand};
use patchflow_core::AppConfig;
use patchflow_pipeline::Observer;
use patchflow_store::Store;
use std::path::PathBuf;

mod commands;
mod output;

use commands::host::{CommitArgs, run_cat, run_commit, run_tree};
use commands::repo::run_repo;
use commands::session::{run_log, run_session, run_spec};
use commands::task::{CompileArgs, RunArgs, run_classify, run_compile, run_run, run_validate};

#[derive(Parser)]
#[command(name = "patchflow")]
#[command(about = "Session-bound AI patch pipeline", long_about = None)]
struct Cli {
    /// Emit machine-readable JSON on stdout.
    #[arg(long, global = true)]
    json: bool,

    /// Workspace directory holding `.patchflow` state (defaults to cwd).
    #[arg(long, global = true)]
    workspace: Option<PathBuf>,

    /// Verbose operational logging to stderr.
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage attached repositories.
    Repo {
        #[command(subcommand)]
        cmd: RepoCmd,
    },
    /// Manage the editing session.
    Session {
        #[command(subcommand)]
        cmd: SessionCmd,
    },
    /// Classify a free-text request into an intent.
    Classify { text: String },
    /// Compile a request plus file selection into a pending task.
    Compile(CompileArgs),
    /// Classify, compile, and execute a request end to end.
    Run(RunArgs),
    /// Validate a unified diff against the security policy.
    Validate {
        /// Path to the patch file, or `-` for stdin.
        patch: String,
        #[arg(long = "allowed-file")]
        allowed_file: Vec<String>,
        #[arg(long)]
        base_path: Option<String>,
    },
    /// List files in a repository tree.
    Tree {
        /// owner/name
        repo: String,
        #[arg(long)]
        git_ref: Option<String>,
        #[arg(long)]
        prefix: Option<String>,
    },
    /// Print one remote file.
    Cat {
        /// owner/name
        repo: String,
        path: String,
        #[arg(long)]
        git_ref: Option<String>,
    },
    /// Commit one file to the source host (rate limited per session).
    Commit(CommitArgs),
    /// Show the audit trail for a session.
    Log { session: Option<String> },
    /// Manage the autonomous session spec.
    Spec {
        #[command(subcommand)]
        cmd: SpecCmd,
    },
}

#[derive(Subcommand)]
pub(crate) enum RepoCmd {
    /// Attach a repository (the count is capped).
    Attach {
        /// owner/name
        repo: String,
        #[arg(long)]
        branch: Option<String>,
        #[arg(long)]
        base_path: Option<String>,
    },
    /// List attached repositories.
    List,
}

#[derive(Subcommand)]
pub(crate) enum SessionCmd {
    /// Create a session (refused while another is still active).
    Create {
        /// owner/name of an attached repository
        repo: String,
        /// chat, action, or autonomous
        #[arg(long, default_value = "action")]
        mode: String,
    },
    /// Show a session (latest when no id is given).
    Show { session: Option<String> },
    /// Move a session to a target state.
    Transition {
        target: String,
        #[arg(long)]
        session: Option<String>,
    },
}

#[derive(Subcommand)]
pub(crate) enum SpecCmd {
    /// Save (or replace the unlocked) spec for a session.
    Save {
        /// Inline JSON document.
        spec: String,
        #[arg(long)]
        session: Option<String>,
    },
    /// Freeze the session's spec.
    Lock {
        #[arg(long)]
        session: Option<String>,
    },
    /// Show the session's spec.
    Show {
        #[arg(long)]
        session: Option<String>,
    },
}

pub(crate) struct CliContext {
    pub(crate) cfg: AppConfig,
    pub(crate) store: Store,
    pub(crate) observer: Observer,
    pub(crate) json: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let workspace = match cli.workspace {
        Some(path) => path,
        None => std::env::current_dir()?,
    };
    let cfg = AppConfig::ensure(&workspace)?;
    let store = Store::new(&workspace)?;
    let mut observer = Observer::new(&workspace)?;
    observer.set_verbose(cli.verbose);
    let ctx = CliContext {
        cfg,
        store,
        observer,
        json: cli.json,
    };

    match cli.command {
        Commands::Repo { cmd } => run_repo(&ctx, cmd),
        Commands::Session { cmd } => run_session(&ctx, cmd),
        Commands::Classify { text } => run_classify(&ctx, &text),
        Commands::Compile(args) => run_compile(&ctx, args),
        Commands::Run(args) => run_run(&ctx, args),
        Commands::Validate {
            patch,
            allowed_file,
            base_path,
        } => run_validate(&ctx, &patch, &allowed_file, base_path.as_deref()),
        Commands::Tree {
            repo,
            git_ref,
            prefix,
        } => run_tree(&ctx, &repo, git_ref.as_deref(), prefix.as_deref()),
        Commands::Cat {
            repo,
            path,
            git_ref,
        } => run_cat(&ctx, &repo, &path, git_ref.as_deref()),
        Commands::Commit(args) => run_commit(&ctx, args),
        Commands::Log { session } => run_log(&ctx, session.as_deref()),
        Commands::Spec { cmd } => run_spec(&ctx, cmd),
    }
}

pub(crate) fn split_owner_repo(raw: &str) -> Result<(String, String)> {
    raw.split_once('/')
        .map(|(owner, name)| (owner.to_string(), name.to_string()))
        .filter(|(owner, name)| !owner.is_empty() && !name.is_empty())
        .ok_or_else(|| anyhow!("expected owner/name, got `{raw}`"))
}
