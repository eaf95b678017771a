use anyhow::Result;
use chrono::Utc;
use clap::Args;
use patchflow_core::{ActivityLogEntry, COMMIT_TAG, PipelineError};
use patchflow_github::{HostClient, HostError};
use patchflow_pipeline::rate_limit;
use serde_json::json;
use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use crate::commands::session::resolve_session;
use crate::output::print_json;
use crate::{CliContext, split_owner_repo};

pub(crate) fn host_error(err: HostError) -> PipelineError {
    PipelineError::UpstreamHost {
        kind: err.kind().to_string(),
        message: err.to_string(),
    }
}

fn client(ctx: &CliContext) -> Result<HostClient> {
    Ok(HostClient::new(ctx.cfg.host.clone()).map_err(host_error)?)
}

fn resolve_branch(ctx: &CliContext, owner: &str, name: &str, explicit: Option<&str>) -> Result<String> {
    if let Some(branch) = explicit {
        return Ok(branch.to_string());
    }
    Ok(ctx
        .store
        .find_repository(owner, name)?
        .map(|repo| repo.default_branch)
        .unwrap_or_else(|| ctx.cfg.host.default_branch.clone()))
}

pub(crate) fn run_tree(
    ctx: &CliContext,
    repo: &str,
    git_ref: Option<&str>,
    prefix: Option<&str>,
) -> Result<()> {
    let (owner, name) = split_owner_repo(repo)?;
    let git_ref = resolve_branch(ctx, &owner, &name, git_ref)?;
    let entries = client(ctx)?
        .list_tree(&owner, &name, &git_ref, prefix)
        .map_err(host_error)?;
    if ctx.json {
        print_json(&entries)?;
    } else if entries.is_empty() {
        println!("no matching files");
    } else {
        for entry in entries {
            println!("{}  ({} bytes)", entry.path, entry.size);
        }
    }
    Ok(())
}

pub(crate) fn run_cat(
    ctx: &CliContext,
    repo: &str,
    path: &str,
    git_ref: Option<&str>,
) -> Result<()> {
    let (owner, name) = split_owner_repo(repo)?;
    let git_ref = resolve_branch(ctx, &owner, &name, git_ref)?;
    let file = client(ctx)?
        .read_file(&owner, &name, path, &git_ref)
        .map_err(host_error)?;
    if ctx.json {
        print_json(&json!({
            "path": file.path,
            "sha": file.sha,
            "size": file.size,
            "content": file.content,
        }))?;
    } else {
        print!("{}", file.content);
    }
    Ok(())
}

#[derive(Args)]
pub(crate) struct CommitArgs {
    /// owner/name
    pub(crate) repo: String,
    /// Repository path of the file to write.
    pub(crate) path: String,
    /// Local file whose contents are committed.
    #[arg(long)]
    pub(crate) content: PathBuf,
    #[arg(long)]
    pub(crate) message: String,
    #[arg(long)]
    pub(crate) branch: Option<String>,
    /// Current blob sha; omit when creating a new file.
    #[arg(long)]
    pub(crate) sha: Option<String>,
    #[arg(long)]
    pub(crate) session: Option<String>,
}

/// Session-scoped commit: the sliding-window limit is checked against the
/// activity log first, and the successful write appends its own entry so
/// later checks observe it.
pub(crate) fn run_commit(ctx: &CliContext, args: CommitArgs) -> Result<()> {
    let (owner, name) = split_owner_repo(&args.repo)?;
    let session = resolve_session(ctx, args.session.as_deref())?;
    rate_limit::check(
        &ctx.store,
        session.session_id,
        "github.commitFile",
        ctx.cfg.limits.commit_max_per_minute,
        ctx.cfg.limits.rate_window_seconds,
    )?;

    let content = fs::read_to_string(&args.content)?;
    let message = if args.message.starts_with(COMMIT_TAG) {
        args.message.clone()
    } else {
        format!("{COMMIT_TAG} {}", args.message)
    };
    let branch = resolve_branch(ctx, &owner, &name, args.branch.as_deref())?;

    let started = Instant::now();
    let commit = client(ctx)?
        .write_file(
            &owner,
            &name,
            &args.path,
            &content,
            &message,
            args.sha.as_deref(),
            &branch,
        )
        .map_err(host_error)?;

    ctx.store.append_activity(&ActivityLogEntry {
        session_id: session.session_id,
        action: "github.commitFile".to_string(),
        duration_ms: started.elapsed().as_millis() as u64,
        retry_count: 0,
        error_type: None,
        at: Utc::now(),
    })?;
    ctx.observer
        .record("github.commitFile", &format!("{owner}/{name}:{}", args.path))?;

    if ctx.json {
        print_json(&json!({ "commit_sha": commit.sha, "message": message }))?;
    } else {
        println!("committed {} ({})", args.path, commit.sha);
    }
    Ok(())
}
