use anyhow::{Result, anyhow};
use patchflow_core::{Session, SessionMode, SessionState};
use patchflow_pipeline::SessionService;
use uuid::Uuid;

use crate::output::print_json;
use crate::{CliContext, SessionCmd, SpecCmd, split_owner_repo};

/// Resolves an explicit session id, falling back to the latest session.
pub(crate) fn resolve_session(ctx: &CliContext, id: Option<&str>) -> Result<Session> {
    match id {
        Some(raw) => {
            let session_id = Uuid::parse_str(raw)?;
            ctx.store
                .load_session(session_id)?
                .ok_or_else(|| anyhow!("unknown session `{raw}`"))
        }
        None => ctx
            .store
            .load_latest_session()?
            .ok_or_else(|| anyhow!("no session yet; run `patchflow session create` first")),
    }
}

pub(crate) fn run_session(ctx: &CliContext, cmd: SessionCmd) -> Result<()> {
    match cmd {
        SessionCmd::Create { repo, mode } => {
            let (owner, name) = split_owner_repo(&repo)?;
            let attached = ctx
                .store
                .find_repository(&owner, &name)?
                .ok_or_else(|| anyhow!("repository {owner}/{name} is not attached"))?;
            let mode = mode.parse::<SessionMode>()?;
            let session = SessionService::new(&ctx.store).create(attached.repo_id, mode)?;
            ctx.observer.record(
                "session.create",
                &format!("{} mode={mode}", session.session_id),
            )?;
            print_session(ctx, &session)
        }
        SessionCmd::Show { session } => {
            let session = resolve_session(ctx, session.as_deref())?;
            print_session(ctx, &session)
        }
        SessionCmd::Transition { target, session } => {
            let target = target.parse::<SessionState>()?;
            let session = resolve_session(ctx, session.as_deref())?;
            let moved = SessionService::new(&ctx.store).transition(session.session_id, target)?;
            ctx.observer.record(
                "session.transition",
                &format!("{} -> {target}", session.state),
            )?;
            print_session(ctx, &moved)
        }
    }
}

fn print_session(ctx: &CliContext, session: &Session) -> Result<()> {
    if ctx.json {
        print_json(session)?;
    } else {
        println!(
            "session {}  state={}  mode={}  repo={}",
            session.session_id, session.state, session.mode, session.repo_id
        );
    }
    Ok(())
}

pub(crate) fn run_log(ctx: &CliContext, session: Option<&str>) -> Result<()> {
    let session = resolve_session(ctx, session)?;
    let entries = ctx.store.list_activity(session.session_id)?;
    if ctx.json {
        print_json(&entries)?;
    } else if entries.is_empty() {
        println!("no activity for session {}", session.session_id);
    } else {
        for entry in entries {
            let error = entry.error_type.as_deref().unwrap_or("-");
            println!(
                "{}  {}  duration_ms={}  retries={}  error={error}",
                entry.at.to_rfc3339(),
                entry.action,
                entry.duration_ms,
                entry.retry_count
            );
        }
    }
    Ok(())
}

pub(crate) fn run_spec(ctx: &CliContext, cmd: SpecCmd) -> Result<()> {
    match cmd {
        SpecCmd::Save { spec, session } => {
            let session = resolve_session(ctx, session.as_deref())?;
            let value: serde_json::Value = serde_json::from_str(&spec)?;
            let saved = ctx
                .store
                .save_spec(session.session_id, value)?
                .ok_or_else(|| anyhow!("spec is locked and cannot be replaced"))?;
            ctx.observer
                .record("spec.save", &saved.spec_id.to_string())?;
            if ctx.json {
                print_json(&saved)?;
            } else {
                println!("saved spec {} (unlocked)", saved.spec_id);
            }
            Ok(())
        }
        SpecCmd::Lock { session } => {
            let session = resolve_session(ctx, session.as_deref())?;
            let spec = ctx
                .store
                .load_spec_for_session(session.session_id)?
                .ok_or_else(|| anyhow!("no spec saved for session {}", session.session_id))?;
            let locked = ctx
                .store
                .lock_spec(spec.spec_id)?
                .ok_or_else(|| anyhow!("spec vanished while locking"))?;
            ctx.observer
                .record("spec.lock", &locked.spec_id.to_string())?;
            if ctx.json {
                print_json(&locked)?;
            } else {
                println!("locked spec {}", locked.spec_id);
            }
            Ok(())
        }
        SpecCmd::Show { session } => {
            let session = resolve_session(ctx, session.as_deref())?;
            let spec = ctx
                .store
                .load_spec_for_session(session.session_id)?
                .ok_or_else(|| anyhow!("no spec saved for session {}", session.session_id))?;
            if ctx.json {
                print_json(&spec)?;
            } else {
                let state = if spec.is_locked() { "locked" } else { "unlocked" };
                println!("spec {} ({state})", spec.spec_id);
                println!("{}", serde_json::to_string_pretty(&spec.spec_json)?);
            }
            Ok(())
        }
    }
}
