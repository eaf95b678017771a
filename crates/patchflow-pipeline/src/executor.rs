use anyhow::anyhow;
use chrono::Utc;
use patchflow_core::{
    ActivityLogEntry, COMMIT_TAG, ContextFile, IntentType, LimitsConfig, PipelineError, Session,
    TaskStatus,
};
use patchflow_llm::{GenerateRequest, Generator, GeneratorError};
use patchflow_policy::validate_patch;
use patchflow_store::Store;
use std::time::Instant;
use uuid::Uuid;

const SYSTEM_INSTRUCTION: &str = "You are a code patch generator. Modify only the files \
provided in the context. Respond with a one-line commit message prefixed with [patchflow], \
followed by a unified diff. No commentary, no markdown fences.";

/// Result of one execution run. `retries` counts attempts beyond the first.
#[derive(Debug, Clone)]
pub struct ExecutionOutcome {
    pub patches: Vec<String>,
    pub commit_message: String,
    pub retries: u32,
}

pub struct Orchestrator<'a, G: Generator> {
    store: &'a Store,
    generator: &'a G,
    limits: LimitsConfig,
}

impl<'a, G: Generator> Orchestrator<'a, G> {
    pub fn new(store: &'a Store, generator: &'a G, limits: LimitsConfig) -> Self {
        Self {
            store,
            generator,
            limits,
        }
    }

    /// Bounded generate-validate loop: up to `max_patch_retries` extra
    /// attempts after the first. Upstream rate limiting or transport failure
    /// aborts immediately without consuming the retry budget and without an
    /// audit entry; terminal outcomes append exactly one.
    pub fn execute(
        &self,
        session: &Session,
        intent: IntentType,
        files: &[ContextFile],
        user_prompt: &str,
        task_id: Option<Uuid>,
    ) -> Result<ExecutionOutcome, PipelineError> {
        let started = Instant::now();
        if let Some(task_id) = task_id {
            self.store.update_task_status(task_id, TaskStatus::Running, 0)?;
        }

        let request = GenerateRequest {
            system: SYSTEM_INSTRUCTION.to_string(),
            prompt: build_prompt(intent, files, user_prompt),
        };

        let mut retries = 0_u32;
        loop {
            // Aborts settle the task but append no ai.execute audit entry;
            // only terminal validate outcomes do.
            let text = match self.generator.generate(&request) {
                Ok(resp) => resp.text,
                Err(err) if err.is_unavailable() => {
                    self.settle_task(task_id, TaskStatus::Failed, retries)?;
                    return Err(PipelineError::GeneratorUnavailable(err.to_string()));
                }
                Err(GeneratorError::MissingApiKey(env)) => {
                    self.settle_task(task_id, TaskStatus::Failed, retries)?;
                    return Err(PipelineError::ConfigurationMissing(env));
                }
                Err(err) => {
                    self.settle_task(task_id, TaskStatus::Failed, retries)?;
                    return Err(anyhow!(err).into());
                }
            };

            let (commit_message, patch) = split_completion(&text);
            let validation = validate_patch(&patch, None, None);
            if validation.valid {
                self.finish(session, task_id, TaskStatus::Completed, retries, None, started)?;
                return Ok(ExecutionOutcome {
                    patches: vec![patch],
                    commit_message,
                    retries,
                });
            }

            if retries >= self.limits.max_patch_retries {
                let joined = validation.errors.join("; ");
                self.finish(
                    session,
                    task_id,
                    TaskStatus::Failed,
                    retries,
                    Some(joined),
                    started,
                )?;
                return Err(PipelineError::PatchValidationFailed {
                    retries,
                    errors: validation.errors,
                    raw_preview: preview(&text, self.limits.raw_output_preview_bytes),
                });
            }
            retries += 1;
        }
    }

    fn settle_task(
        &self,
        task_id: Option<Uuid>,
        status: TaskStatus,
        retries: u32,
    ) -> Result<(), PipelineError> {
        if let Some(task_id) = task_id {
            self.store.update_task_status(task_id, status, retries)?;
        }
        Ok(())
    }

    fn finish(
        &self,
        session: &Session,
        task_id: Option<Uuid>,
        status: TaskStatus,
        retries: u32,
        error_type: Option<String>,
        started: Instant,
    ) -> Result<(), PipelineError> {
        self.settle_task(task_id, status, retries)?;
        let action = if status == TaskStatus::Completed {
            "ai.execute.success"
        } else {
            "ai.execute.failed"
        };
        self.store.append_activity(&ActivityLogEntry {
            session_id: session.session_id,
            action: action.to_string(),
            duration_ms: started.elapsed().as_millis() as u64,
            retry_count: retries,
            error_type,
            at: Utc::now(),
        })?;
        Ok(())
    }
}

fn build_prompt(intent: IntentType, files: &[ContextFile], user_prompt: &str) -> String {
    let context = files
        .iter()
        .map(|f| format!("--- {} ---\n{}", f.path, f.content))
        .collect::<Vec<_>>()
        .join("\n\n");
    if context.is_empty() {
        format!("Intent: {intent}\n\nRequest: {user_prompt}")
    } else {
        format!("Intent: {intent}\n\nFiles:\n{context}\n\nRequest: {user_prompt}")
    }
}

/// First line is the commit message (tag forced on when missing); the
/// remainder, trimmed, is the candidate patch.
fn split_completion(text: &str) -> (String, String) {
    let trimmed = text.trim();
    let (first, rest) = trimmed.split_once('\n').unwrap_or((trimmed, ""));
    let first = first.trim();
    let commit_message = if first.starts_with(COMMIT_TAG) {
        first.to_string()
    } else {
        format!("{COMMIT_TAG} {first}")
    };
    (commit_message, rest.trim().to_string())
}

fn preview(raw: &str, max_bytes: usize) -> String {
    if raw.len() <= max_bytes {
        return raw.to_string();
    }
    let mut end = max_bytes;
    while !raw.is_char_boundary(end) {
        end -= 1;
    }
    raw[..end].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commit_tag_is_forced_onto_untagged_first_lines() {
        let (message, patch) = split_completion("tidy imports\n--- a/x\n+++ b/x\n@@ -1 +1 @@\n");
        assert_eq!(message, "[patchflow] tidy imports");
        assert!(patch.starts_with("--- a/x"));

        let (message, _) = split_completion("[patchflow] already tagged\nbody");
        assert_eq!(message, "[patchflow] already tagged");
    }

    #[test]
    fn completion_without_body_yields_empty_patch() {
        let (message, patch) = split_completion("just a message");
        assert_eq!(message, "[patchflow] just a message");
        assert!(patch.is_empty());
    }

    #[test]
    fn prompt_carries_file_context_blocks() {
        let files = vec![
            ContextFile {
                path: "src/a.rs".into(),
                content: "fn a() {}".into(),
            },
            ContextFile {
                path: "src/b.rs".into(),
                content: "fn b() {}".into(),
            },
        ];
        let prompt = build_prompt(IntentType::Refactor, &files, "rename a to alpha");
        assert!(prompt.contains("Intent: refactor"));
        assert!(prompt.contains("--- src/a.rs ---\nfn a() {}\n\n--- src/b.rs ---\nfn b() {}"));
        assert!(prompt.ends_with("Request: rename a to alpha"));
    }

    #[test]
    fn preview_respects_char_boundaries() {
        let raw = "héllo wörld, this overruns the preview budget";
        let cut = preview(raw, 7);
        assert!(cut.len() <= 7);
        assert!(raw.starts_with(&cut));
    }
}
