use anyhow::{Result, anyhow};
use clap::Args;
use patchflow_core::{ContextFile, IntentType, SessionState};
use patchflow_github::HostClient;
use patchflow_llm::HttpGenerator;
use patchflow_pipeline::{Orchestrator, SessionService, classify, compile};
use patchflow_policy::validate_patch;
use serde_json::json;
use std::fs;
use std::io::Read;

use crate::CliContext;
use crate::commands::host::host_error;
use crate::commands::session::resolve_session;
use crate::output::print_json;

#[derive(Args)]
pub(crate) struct CompileArgs {
    /// Free-text request; its classification picks the intent.
    pub(crate) prompt: String,
    /// Repository file path to include (repeatable; at most 8 are kept).
    #[arg(long = "file")]
    pub(crate) files: Vec<String>,
    #[arg(long, default_value = "/")]
    pub(crate) base_path: String,
    #[arg(long)]
    pub(crate) session: Option<String>,
    /// Override the classified intent.
    #[arg(long)]
    pub(crate) intent: Option<String>,
}

#[derive(Args)]
pub(crate) struct RunArgs {
    /// Free-text request.
    pub(crate) prompt: String,
    /// Repository file path fetched as generator context (repeatable; at
    /// most 8 are kept).
    #[arg(long = "file")]
    pub(crate) files: Vec<String>,
    #[arg(long)]
    pub(crate) session: Option<String>,
    #[arg(long)]
    pub(crate) git_ref: Option<String>,
}

pub(crate) fn run_classify(ctx: &CliContext, text: &str) -> Result<()> {
    let result = classify(text);
    if ctx.json {
        print_json(&result)?;
    } else {
        println!(
            "intent={}  confidence={:.2}  risk={}",
            result.intent, result.confidence, result.risk
        );
    }
    Ok(())
}

pub(crate) fn run_compile(ctx: &CliContext, args: CompileArgs) -> Result<()> {
    let session = resolve_session(ctx, args.session.as_deref())?;
    let intent = match args.intent {
        Some(raw) => raw.parse::<IntentType>()?,
        None => classify(&args.prompt).intent,
    };
    let task = compile(
        &ctx.store,
        session.session_id,
        intent,
        &args.files,
        &args.base_path,
    )?;
    ctx.observer
        .record("task.compile", &task.compiled_prompt_hash)?;
    if ctx.json {
        print_json(&task)?;
    } else {
        println!(
            "task {}  intent={}  files={}  status={}",
            task.task_id,
            task.intent,
            task.allowed_files.len(),
            task.status.as_str()
        );
    }
    Ok(())
}

/// End-to-end run: classify, compile, fetch context from the host, then
/// drive the session through EXECUTING and settle it from the outcome.
pub(crate) fn run_run(ctx: &CliContext, args: RunArgs) -> Result<()> {
    let session = resolve_session(ctx, args.session.as_deref())?;
    let repo = ctx
        .store
        .load_repository(session.repo_id)?
        .ok_or_else(|| anyhow!("session points at an unknown repository"))?;

    let intent = classify(&args.prompt);
    let base_path = repo.base_path.clone().unwrap_or_else(|| "/".to_string());
    let task = compile(
        &ctx.store,
        session.session_id,
        intent.intent,
        &args.files,
        &base_path,
    )?;

    let host = HostClient::new(ctx.cfg.host.clone()).map_err(host_error)?;
    let git_ref = args
        .git_ref
        .clone()
        .unwrap_or_else(|| repo.default_branch.clone());
    let mut files = Vec::new();
    for path in &task.allowed_files {
        let remote = host
            .read_file(&repo.owner, &repo.name, path, &git_ref)
            .map_err(host_error)?;
        ctx.observer
            .verbose_log(&format!("fetched {} ({} bytes)", remote.path, remote.size));
        files.push(ContextFile {
            path: remote.path,
            content: remote.content,
        });
    }

    let service = SessionService::new(&ctx.store);
    service.transition(session.session_id, SessionState::Planning)?;
    service.transition(session.session_id, SessionState::Executing)?;

    let generator = HttpGenerator::new(ctx.cfg.generator.clone())?;
    let orchestrator = Orchestrator::new(&ctx.store, &generator, ctx.cfg.limits.clone());
    match orchestrator.execute(
        &session,
        intent.intent,
        &files,
        &args.prompt,
        Some(task.task_id),
    ) {
        Ok(outcome) => {
            service.transition(session.session_id, SessionState::Validating)?;
            service.transition(session.session_id, SessionState::Done)?;
            ctx.observer
                .record("ai.execute", &format!("retries={}", outcome.retries))?;
            if ctx.json {
                print_json(&json!({
                    "task_id": task.task_id,
                    "intent": intent,
                    "commit_message": outcome.commit_message,
                    "retries": outcome.retries,
                    "patches": outcome.patches,
                }))?;
            } else {
                println!("{}", outcome.commit_message);
                println!("(retries: {})", outcome.retries);
                for patch in &outcome.patches {
                    println!("{patch}");
                }
            }
            Ok(())
        }
        Err(err) => {
            if let Err(settle) = service.transition(session.session_id, SessionState::Failed) {
                ctx.observer
                    .warn_log(&format!("could not mark session failed: {settle}"));
            }
            Err(err.into())
        }
    }
}

pub(crate) fn run_validate(
    ctx: &CliContext,
    patch: &str,
    allowed_files: &[String],
    base_path: Option<&str>,
) -> Result<()> {
    let text = if patch == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        fs::read_to_string(patch)?
    };
    let allowed = (!allowed_files.is_empty()).then_some(allowed_files);
    let result = validate_patch(&text, allowed, base_path);
    if ctx.json {
        print_json(&result)?;
    } else if result.valid {
        println!("valid");
    } else {
        for error in &result.errors {
            println!("error: {error}");
        }
    }
    if result.valid {
        Ok(())
    } else {
        Err(anyhow!(
            "patch failed validation with {} error(s)",
            result.errors.len()
        ))
    }
}
