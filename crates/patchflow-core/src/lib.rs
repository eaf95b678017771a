use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

pub type Result<T> = anyhow::Result<T>;

/// Tag forced onto the first line of every generated commit message.
pub const COMMIT_TAG: &str = "[patchflow]";

/// Upper bound on the files a compiled task may touch.
pub const MAX_TASK_FILES: usize = 8;

pub fn runtime_dir(workspace: &Path) -> PathBuf {
    workspace.join(".patchflow")
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionState {
    Idle,
    Planning,
    SpecLocked,
    Executing,
    Validating,
    Done,
    Failed,
}

impl SessionState {
    pub const ALL: [SessionState; 7] = [
        SessionState::Idle,
        SessionState::Planning,
        SessionState::SpecLocked,
        SessionState::Executing,
        SessionState::Validating,
        SessionState::Done,
        SessionState::Failed,
    ];

    /// States in which a session holds no claim on the pipeline. A new
    /// session may only be created while every existing session is settled.
    pub fn is_settled(&self) -> bool {
        matches!(
            self,
            SessionState::Idle | SessionState::Done | SessionState::Failed
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Idle => "IDLE",
            SessionState::Planning => "PLANNING",
            SessionState::SpecLocked => "SPEC_LOCKED",
            SessionState::Executing => "EXECUTING",
            SessionState::Validating => "VALIDATING",
            SessionState::Done => "DONE",
            SessionState::Failed => "FAILED",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SessionState {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "IDLE" => Ok(SessionState::Idle),
            "PLANNING" => Ok(SessionState::Planning),
            "SPEC_LOCKED" => Ok(SessionState::SpecLocked),
            "EXECUTING" => Ok(SessionState::Executing),
            "VALIDATING" => Ok(SessionState::Validating),
            "DONE" => Ok(SessionState::Done),
            "FAILED" => Ok(SessionState::Failed),
            other => Err(anyhow::anyhow!("unknown session state `{other}`")),
        }
    }
}

/// The transition table is strict: pairs outside it (including identical
/// source and target) are violations.
pub fn is_valid_session_state_transition(from: &SessionState, to: &SessionState) -> bool {
    match from {
        SessionState::Idle => matches!(to, SessionState::Planning),
        SessionState::Planning => matches!(
            to,
            SessionState::SpecLocked | SessionState::Executing | SessionState::Failed
        ),
        SessionState::SpecLocked => {
            matches!(to, SessionState::Executing | SessionState::Failed)
        }
        SessionState::Executing => matches!(
            to,
            SessionState::Validating | SessionState::Done | SessionState::Failed
        ),
        SessionState::Validating => matches!(
            to,
            SessionState::Executing | SessionState::Done | SessionState::Failed
        ),
        SessionState::Done => matches!(to, SessionState::Idle),
        SessionState::Failed => matches!(to, SessionState::Idle),
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SessionMode {
    Chat,
    Action,
    Autonomous,
}

impl fmt::Display for SessionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionMode::Chat => "chat",
            SessionMode::Action => "action",
            SessionMode::Autonomous => "autonomous",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for SessionMode {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "chat" => Ok(SessionMode::Chat),
            "action" => Ok(SessionMode::Action),
            "autonomous" => Ok(SessionMode::Autonomous),
            other => Err(anyhow::anyhow!("unknown session mode `{other}`")),
        }
    }
}

/// One editing conversation bound to exactly one repository.
/// Sessions are never deleted; terminal states loop back through IDLE.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub session_id: Uuid,
    pub repo_id: Uuid,
    pub mode: SessionMode,
    pub state: SessionState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Repository {
    pub repo_id: Uuid,
    pub owner: String,
    pub name: String,
    pub default_branch: String,
    pub base_path: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Repository {
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl TaskStatus {
    /// Completed and failed tasks are immutable.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum TaskStep {
    Analyze { target: String },
    GeneratePatch { format: String },
    ValidateOutput { checks: Vec<String> },
}

/// A compiled, immutable unit of work derived from one classified intent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub task_id: Uuid,
    pub session_id: Uuid,
    pub intent: IntentType,
    /// Correlation id only — a truncated base64 of intent/session/time,
    /// never an integrity digest.
    pub compiled_prompt_hash: String,
    pub allowed_files: Vec<String>,
    pub base_path: String,
    pub steps: Vec<TaskStep>,
    pub status: TaskStatus,
    pub retry_count: u32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum IntentType {
    Refactor,
    Bugfix,
    FeatureAddition,
    RemoveCode,
    AddTests,
    UiUpdate,
    ConfigChange,
    GeneralEdit,
}

impl IntentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntentType::Refactor => "refactor",
            IntentType::Bugfix => "bugfix",
            IntentType::FeatureAddition => "feature_addition",
            IntentType::RemoveCode => "remove_code",
            IntentType::AddTests => "add_tests",
            IntentType::UiUpdate => "ui_update",
            IntentType::ConfigChange => "config_change",
            IntentType::GeneralEdit => "general_edit",
        }
    }
}

impl fmt::Display for IntentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for IntentType {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "refactor" => Ok(IntentType::Refactor),
            "bugfix" => Ok(IntentType::Bugfix),
            "feature_addition" => Ok(IntentType::FeatureAddition),
            "remove_code" => Ok(IntentType::RemoveCode),
            "add_tests" => Ok(IntentType::AddTests),
            "ui_update" => Ok(IntentType::UiUpdate),
            "config_change" => Ok(IntentType::ConfigChange),
            "general_edit" => Ok(IntentType::GeneralEdit),
            other => Err(anyhow::anyhow!("unknown intent type `{other}`")),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RiskTier {
    Low,
    Medium,
    High,
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RiskTier::Low => "low",
            RiskTier::Medium => "medium",
            RiskTier::High => "high",
        };
        f.write_str(name)
    }
}

/// Outcome of intent classification. Transient — never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IntentResult {
    pub intent: IntentType,
    pub confidence: f32,
    pub risk: RiskTier,
}

/// Append-only audit record. The activity log is the sole source of truth
/// for both audit trails and rate-limit accounting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityLogEntry {
    pub session_id: Uuid,
    pub action: String,
    pub duration_ms: u64,
    pub retry_count: u32,
    pub error_type: Option<String>,
    pub at: DateTime<Utc>,
}

/// A file handed to the execution orchestrator: path plus full content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextFile {
    pub path: String,
    pub content: String,
}

/// Structured specification frozen before an autonomous session may execute.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutonomousSpec {
    pub spec_id: Uuid,
    pub session_id: Uuid,
    pub spec_json: serde_json::Value,
    pub locked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl AutonomousSpec {
    pub fn is_locked(&self) -> bool {
        self.locked_at.is_some()
    }
}

/// Correlation id for a compiled task: truncated base64 of
/// `intent:session:millis`. Deterministic-looking, not a digest.
pub fn correlation_hash(intent: IntentType, session_id: Uuid, at: DateTime<Utc>) -> String {
    let raw = format!("{intent}:{session_id}:{}", at.timestamp_millis());
    BASE64.encode(raw).chars().take(16).collect()
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Illegal transition or session-creation conflict. Never retried,
    /// always recorded in the activity log.
    #[error("state violation: {0}")]
    StateViolation(String),
    /// Caller must back off; the activity-log window is saturated.
    #[error("rate limit exceeded for `{action}` ({max_per_window} per window)")]
    RateLimitExceeded { action: String, max_per_window: u32 },
    /// Upstream generator quota/outage/timeout. Surfaced immediately,
    /// never retried by the orchestrator.
    #[error("generator unavailable: {0}")]
    GeneratorUnavailable(String),
    /// Candidate patches failed validation on every attempt in the budget.
    #[error("patch validation failed after {retries} retries: {errors:?}")]
    PatchValidationFailed {
        retries: u32,
        errors: Vec<String>,
        raw_preview: String,
    },
    /// Source-host conflict, validation, or permission failure.
    #[error("upstream host error ({kind}): {message}")]
    UpstreamHost { kind: String, message: String },
    /// Required collaborator credential absent. Fails fast, never retried.
    #[error("configuration missing: {0}")]
    ConfigurationMissing(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub generator: GeneratorConfig,
    pub host: HostConfig,
    pub limits: LimitsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub model: String,
    pub endpoint: String,
    pub api_key: Option<String>,
    pub api_key_env: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_seconds: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            model: "deepseek-chat".to_string(),
            endpoint: "https://api.deepseek.com/chat/completions".to_string(),
            api_key: None,
            api_key_env: "PATCHFLOW_API_KEY".to_string(),
            max_tokens: 4096,
            temperature: 0.2,
            timeout_seconds: 30,
        }
    }
}

impl GeneratorConfig {
    pub fn resolve_api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|v| !v.is_empty())
            .or_else(|| self.api_key.clone())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    pub api_base: String,
    pub token: Option<String>,
    pub token_env: String,
    pub user_agent: String,
    pub default_branch: String,
    pub max_file_bytes: u64,
    pub timeout_seconds: u64,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.github.com".to_string(),
            token: None,
            token_env: "GITHUB_TOKEN".to_string(),
            user_agent: "patchflow".to_string(),
            default_branch: "main".to_string(),
            max_file_bytes: 200_000,
            timeout_seconds: 30,
        }
    }
}

impl HostConfig {
    pub fn resolve_token(&self) -> Option<String> {
        std::env::var(&self.token_env)
            .ok()
            .filter(|v| !v.is_empty())
            .or_else(|| self.token.clone())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_patch_retries: u32,
    pub commit_max_per_minute: u32,
    pub rate_window_seconds: u64,
    pub max_repositories: u32,
    pub raw_output_preview_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_patch_retries: 2,
            commit_max_per_minute: 5,
            rate_window_seconds: 60,
            max_repositories: 5,
            raw_output_preview_bytes: 200,
        }
    }
}

impl AppConfig {
    pub fn project_settings_path(workspace: &Path) -> PathBuf {
        runtime_dir(workspace).join("settings.json")
    }

    pub fn project_local_settings_path(workspace: &Path) -> PathBuf {
        runtime_dir(workspace).join("settings.local.json")
    }

    pub fn legacy_toml_path(workspace: &Path) -> PathBuf {
        runtime_dir(workspace).join("config.toml")
    }

    /// Defaults, overlaid by the legacy TOML file (when present), then the
    /// project settings, then the local settings. Later layers win per key.
    pub fn load(workspace: &Path) -> Result<Self> {
        let mut merged = serde_json::to_value(Self::default())?;

        let legacy = Self::legacy_toml_path(workspace);
        if legacy.exists() {
            let raw = fs::read_to_string(legacy)?;
            let legacy_cfg: AppConfig = toml::from_str(&raw)?;
            merge_json_value(&mut merged, &serde_json::to_value(legacy_cfg)?);
        }

        for path in [
            Self::project_settings_path(workspace),
            Self::project_local_settings_path(workspace),
        ] {
            if !path.exists() {
                continue;
            }
            let raw = fs::read_to_string(path)?;
            let value: serde_json::Value = serde_json::from_str(&raw)?;
            merge_json_value(&mut merged, &value);
        }

        Ok(serde_json::from_value(merged)?)
    }

    pub fn ensure(workspace: &Path) -> Result<Self> {
        let path = Self::project_settings_path(workspace);
        if path.exists()
            || Self::project_local_settings_path(workspace).exists()
            || Self::legacy_toml_path(workspace).exists()
        {
            return Self::load(workspace);
        }
        fs::create_dir_all(
            path.parent()
                .ok_or_else(|| anyhow::anyhow!("invalid config path"))?,
        )?;
        let cfg = Self::default();
        cfg.save(workspace)?;
        Ok(cfg)
    }

    pub fn save(&self, workspace: &Path) -> Result<()> {
        let path = Self::project_settings_path(workspace);
        fs::create_dir_all(
            path.parent()
                .ok_or_else(|| anyhow::anyhow!("invalid config path"))?,
        )?;
        fs::write(path, serde_json::to_vec_pretty(self)?)?;
        Ok(())
    }
}

fn merge_json_value(base: &mut serde_json::Value, overlay: &serde_json::Value) {
    match (base, overlay) {
        (serde_json::Value::Object(base_obj), serde_json::Value::Object(overlay_obj)) => {
            for (key, overlay_value) in overlay_obj {
                if let Some(base_value) = base_obj.get_mut(key) {
                    merge_json_value(base_value, overlay_value);
                } else {
                    base_obj.insert(key.clone(), overlay_value.clone());
                }
            }
        }
        (base_slot, overlay_value) => {
            *base_slot = overlay_value.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transition_table_matches_spec_exactly() {
        use SessionState::*;
        let allowed: &[(SessionState, SessionState)] = &[
            (Idle, Planning),
            (Planning, SpecLocked),
            (Planning, Executing),
            (Planning, Failed),
            (SpecLocked, Executing),
            (SpecLocked, Failed),
            (Executing, Validating),
            (Executing, Done),
            (Executing, Failed),
            (Validating, Executing),
            (Validating, Done),
            (Validating, Failed),
            (Done, Idle),
            (Failed, Idle),
        ];
        for from in SessionState::ALL {
            for to in SessionState::ALL {
                let expected = allowed.contains(&(from, to));
                assert_eq!(
                    is_valid_session_state_transition(&from, &to),
                    expected,
                    "{from} -> {to}"
                );
            }
        }
    }

    #[test]
    fn self_transitions_are_rejected() {
        for state in SessionState::ALL {
            assert!(!is_valid_session_state_transition(&state, &state));
        }
    }

    #[test]
    fn session_state_round_trips_wire_strings() {
        for state in SessionState::ALL {
            let wire = serde_json::to_string(&state).expect("serialize");
            assert_eq!(wire, format!("\"{state}\""));
            let parsed: SessionState = serde_json::from_str(&wire).expect("deserialize");
            assert_eq!(parsed, state);
            assert_eq!(state.as_str().parse::<SessionState>().expect("parse"), state);
        }
    }

    #[test]
    fn correlation_hash_is_sixteen_chars_and_deterministic() {
        // 16 base64 chars cover only the leading input bytes, so only the
        // intent prefix is guaranteed to influence the output.
        let session = Uuid::now_v7();
        let at = Utc::now();
        let h0 = correlation_hash(IntentType::Refactor, session, at);
        assert_eq!(h0.len(), 16);
        assert_eq!(h0, correlation_hash(IntentType::Refactor, session, at));
        assert_ne!(h0, correlation_hash(IntentType::Bugfix, session, at));
    }

    #[test]
    fn task_step_serializes_with_action_tag() {
        let step = TaskStep::ValidateOutput {
            checks: vec!["syntax".into(), "format".into(), "security".into()],
        };
        let value = serde_json::to_value(&step).expect("serialize");
        assert_eq!(value["action"], "validate_output");
        assert_eq!(value["checks"][2], "security");
    }

    #[test]
    fn config_layers_merge_with_local_override() {
        let workspace =
            std::env::temp_dir().join(format!("patchflow-core-test-{}", Uuid::now_v7()));
        fs::create_dir_all(runtime_dir(&workspace)).expect("runtime dir");
        fs::write(
            AppConfig::project_settings_path(&workspace),
            r#"{"limits": {"max_patch_retries": 4}}"#,
        )
        .expect("project settings");
        fs::write(
            AppConfig::project_local_settings_path(&workspace),
            r#"{"limits": {"commit_max_per_minute": 1}}"#,
        )
        .expect("local settings");

        let cfg = AppConfig::load(&workspace).expect("load");
        assert_eq!(cfg.limits.max_patch_retries, 4);
        assert_eq!(cfg.limits.commit_max_per_minute, 1);
        // Untouched keys keep their defaults.
        assert_eq!(cfg.limits.max_repositories, 5);
    }
}
