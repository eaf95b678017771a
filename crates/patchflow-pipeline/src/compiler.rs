use anyhow::anyhow;
use chrono::Utc;
use patchflow_core::{
    IntentType, MAX_TASK_FILES, PipelineError, Task, TaskStatus, TaskStep, correlation_hash,
};
use patchflow_store::Store;
use uuid::Uuid;

/// Compiles a classified intent into an immutable task and persists it in
/// `pending` status. Paths beyond the file cap are dropped silently, keeping
/// the original order.
pub fn compile(
    store: &Store,
    session_id: Uuid,
    intent: IntentType,
    file_paths: &[String],
    base_path: &str,
) -> Result<Task, PipelineError> {
    store
        .load_session(session_id)?
        .ok_or_else(|| anyhow!("unknown session `{session_id}`"))?;

    let allowed_files: Vec<String> = file_paths.iter().take(MAX_TASK_FILES).cloned().collect();
    let now = Utc::now();
    let task = Task {
        task_id: Uuid::now_v7(),
        session_id,
        intent,
        compiled_prompt_hash: correlation_hash(intent, session_id, now),
        allowed_files,
        base_path: base_path.to_string(),
        steps: vec![
            TaskStep::Analyze {
                target: "selected_files".to_string(),
            },
            TaskStep::GeneratePatch {
                format: "unified_diff".to_string(),
            },
            TaskStep::ValidateOutput {
                checks: vec![
                    "syntax".to_string(),
                    "format".to_string(),
                    "security".to_string(),
                ],
            },
        ],
        status: TaskStatus::Pending,
        retry_count: 0,
        created_at: now,
    };
    store.insert_task(&task)?;
    Ok(task)
}
