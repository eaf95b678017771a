use anyhow::Result;
use chrono::{Duration, Utc};
use patchflow_core::PipelineError;
use patchflow_store::Store;
use uuid::Uuid;

/// Sliding-window check over the activity log: entries for (session, action)
/// newer than the window. There is no separate counter state; whoever
/// performs a limited operation appends its own audit entry, which later
/// calls observe.
pub fn allow(
    store: &Store,
    session_id: Uuid,
    action: &str,
    max_per_window: u32,
    window_seconds: u64,
) -> Result<bool> {
    let since = Utc::now() - Duration::seconds(window_seconds as i64);
    let used = store.count_activity_since(session_id, action, since)?;
    Ok(used < max_per_window as u64)
}

pub fn check(
    store: &Store,
    session_id: Uuid,
    action: &str,
    max_per_window: u32,
    window_seconds: u64,
) -> Result<(), PipelineError> {
    if allow(store, session_id, action, max_per_window, window_seconds)? {
        Ok(())
    } else {
        Err(PipelineError::RateLimitExceeded {
            action: action.to_string(),
            max_per_window,
        })
    }
}
