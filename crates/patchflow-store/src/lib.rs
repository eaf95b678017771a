use anyhow::Result;
use chrono::{DateTime, Utc};
use patchflow_core::{
    ActivityLogEntry, AutonomousSpec, Repository, Session, SessionMode, SessionState, Task,
    TaskStatus, runtime_dir,
};
use rusqlite::{Connection, TransactionBehavior, params};
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

const MIGRATIONS: &[(i64, &str)] = &[(
    1,
    "CREATE TABLE IF NOT EXISTS repositories (
        repo_id TEXT PRIMARY KEY,
        owner TEXT NOT NULL,
        name TEXT NOT NULL,
        default_branch TEXT NOT NULL,
        base_path TEXT,
        created_at TEXT NOT NULL
     );
     CREATE TABLE IF NOT EXISTS sessions (
        session_id TEXT PRIMARY KEY,
        repo_id TEXT NOT NULL,
        mode TEXT NOT NULL,
        state TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
     );
     CREATE TABLE IF NOT EXISTS tasks (
        task_id TEXT PRIMARY KEY,
        session_id TEXT NOT NULL,
        intent_type TEXT NOT NULL,
        compiled_prompt_hash TEXT NOT NULL,
        allowed_files TEXT NOT NULL,
        base_path TEXT NOT NULL,
        steps TEXT NOT NULL,
        status TEXT NOT NULL,
        retry_count INTEGER NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
     );
     CREATE TABLE IF NOT EXISTS activity_logs (
        id INTEGER PRIMARY KEY,
        session_id TEXT NOT NULL,
        action TEXT NOT NULL,
        duration_ms INTEGER NOT NULL,
        retry_count INTEGER NOT NULL,
        error_type TEXT,
        at TEXT NOT NULL
     );
     CREATE INDEX IF NOT EXISTS idx_activity_session_action_at
        ON activity_logs(session_id, action, at);
     CREATE TABLE IF NOT EXISTS autonomous_specs (
        spec_id TEXT PRIMARY KEY,
        session_id TEXT NOT NULL,
        spec_json TEXT NOT NULL,
        locked_at TEXT,
        created_at TEXT NOT NULL
     );",
)];

pub struct Store {
    pub root: PathBuf,
    db_path: PathBuf,
}

impl Store {
    pub fn new(workspace: &Path) -> Result<Self> {
        let root = runtime_dir(workspace);
        fs::create_dir_all(&root)?;
        let db_path = root.join("store.sqlite");
        let store = Self { root, db_path };
        store.init_db()?;
        Ok(store)
    }

    pub fn db(&self) -> Result<Connection> {
        Ok(Connection::open(&self.db_path)?)
    }

    fn init_db(&self) -> Result<()> {
        let conn = self.db()?;
        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
             );",
        )?;

        for (version, sql) in MIGRATIONS {
            let already: i64 = conn.query_row(
                "SELECT COUNT(1) FROM schema_migrations WHERE version = ?1",
                [*version],
                |r| r.get(0),
            )?;
            if already == 0 {
                conn.execute_batch(sql)?;
                conn.execute(
                    "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                    params![version, Utc::now().to_rfc3339()],
                )?;
            }
        }
        Ok(())
    }

    // -- repositories --------------------------------------------------

    /// Atomic count-and-insert: returns `None` without inserting when the
    /// repository cap is already reached.
    pub fn attach_repository(
        &self,
        owner: &str,
        name: &str,
        default_branch: &str,
        base_path: Option<&str>,
        max_repositories: u32,
    ) -> Result<Option<Repository>> {
        let mut conn = self.db()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let count: i64 = tx.query_row("SELECT COUNT(1) FROM repositories", [], |r| r.get(0))?;
        if count >= max_repositories as i64 {
            return Ok(None);
        }
        let repo = Repository {
            repo_id: Uuid::now_v7(),
            owner: owner.to_string(),
            name: name.to_string(),
            default_branch: default_branch.to_string(),
            base_path: base_path.map(ToString::to_string),
            created_at: Utc::now(),
        };
        tx.execute(
            "INSERT INTO repositories (repo_id, owner, name, default_branch, base_path, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                repo.repo_id.to_string(),
                repo.owner,
                repo.name,
                repo.default_branch,
                repo.base_path,
                repo.created_at.to_rfc3339(),
            ],
        )?;
        tx.commit()?;
        Ok(Some(repo))
    }

    pub fn find_repository(&self, owner: &str, name: &str) -> Result<Option<Repository>> {
        let conn = self.db()?;
        let mut stmt = conn.prepare(
            "SELECT repo_id, owner, name, default_branch, base_path, created_at
             FROM repositories WHERE owner = ?1 AND name = ?2 LIMIT 1",
        )?;
        let mut rows = stmt.query(params![owner, name])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(repository_from_row(row)?));
        }
        Ok(None)
    }

    pub fn load_repository(&self, repo_id: Uuid) -> Result<Option<Repository>> {
        let conn = self.db()?;
        let mut stmt = conn.prepare(
            "SELECT repo_id, owner, name, default_branch, base_path, created_at
             FROM repositories WHERE repo_id = ?1",
        )?;
        let mut rows = stmt.query([repo_id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(repository_from_row(row)?));
        }
        Ok(None)
    }

    pub fn list_repositories(&self) -> Result<Vec<Repository>> {
        let conn = self.db()?;
        let mut stmt = conn.prepare(
            "SELECT repo_id, owner, name, default_branch, base_path, created_at
             FROM repositories ORDER BY created_at ASC",
        )?;
        let mut rows = stmt.query([])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push(repository_from_row(row)?);
        }
        Ok(out)
    }

    // -- sessions -------------------------------------------------------

    /// Atomic single-active-session check plus insert. Returns `None`
    /// without inserting when any session is still unsettled.
    pub fn create_session(&self, repo_id: Uuid, mode: SessionMode) -> Result<Option<Session>> {
        let mut conn = self.db()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let active: i64 = tx.query_row(
            "SELECT COUNT(1) FROM sessions WHERE state NOT IN ('IDLE', 'DONE', 'FAILED')",
            [],
            |r| r.get(0),
        )?;
        if active > 0 {
            return Ok(None);
        }
        let now = Utc::now();
        let session = Session {
            session_id: Uuid::now_v7(),
            repo_id,
            mode,
            state: SessionState::Idle,
            created_at: now,
            updated_at: now,
        };
        tx.execute(
            "INSERT INTO sessions (session_id, repo_id, mode, state, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                session.session_id.to_string(),
                session.repo_id.to_string(),
                session.mode.to_string(),
                session.state.as_str(),
                session.created_at.to_rfc3339(),
                session.updated_at.to_rfc3339(),
            ],
        )?;
        tx.commit()?;
        Ok(Some(session))
    }

    pub fn load_session(&self, session_id: Uuid) -> Result<Option<Session>> {
        let conn = self.db()?;
        let mut stmt = conn.prepare(
            "SELECT session_id, repo_id, mode, state, created_at, updated_at
             FROM sessions WHERE session_id = ?1",
        )?;
        let mut rows = stmt.query([session_id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(session_from_row(row)?));
        }
        Ok(None)
    }

    pub fn load_latest_session(&self) -> Result<Option<Session>> {
        let conn = self.db()?;
        let mut stmt = conn.prepare(
            "SELECT session_id, repo_id, mode, state, created_at, updated_at
             FROM sessions ORDER BY created_at DESC LIMIT 1",
        )?;
        let mut rows = stmt.query([])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(session_from_row(row)?));
        }
        Ok(None)
    }

    /// Sessions outside {IDLE, DONE, FAILED}.
    pub fn find_active_sessions(&self) -> Result<Vec<Session>> {
        let conn = self.db()?;
        let mut stmt = conn.prepare(
            "SELECT session_id, repo_id, mode, state, created_at, updated_at
             FROM sessions WHERE state NOT IN ('IDLE', 'DONE', 'FAILED')
             ORDER BY updated_at DESC",
        )?;
        let mut rows = stmt.query([])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push(session_from_row(row)?);
        }
        Ok(out)
    }

    /// Compare-and-swap state update keyed on the expected current state.
    /// Returns false when another caller moved the session first.
    pub fn update_session_state(
        &self,
        session_id: Uuid,
        expected: &SessionState,
        target: &SessionState,
    ) -> Result<bool> {
        let conn = self.db()?;
        let changed = conn.execute(
            "UPDATE sessions SET state = ?1, updated_at = ?2
             WHERE session_id = ?3 AND state = ?4",
            params![
                target.as_str(),
                Utc::now().to_rfc3339(),
                session_id.to_string(),
                expected.as_str(),
            ],
        )?;
        Ok(changed == 1)
    }

    // -- tasks ----------------------------------------------------------

    pub fn insert_task(&self, task: &Task) -> Result<()> {
        let conn = self.db()?;
        conn.execute(
            "INSERT INTO tasks (task_id, session_id, intent_type, compiled_prompt_hash,
                                allowed_files, base_path, steps, status, retry_count,
                                created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                task.task_id.to_string(),
                task.session_id.to_string(),
                task.intent.as_str(),
                task.compiled_prompt_hash,
                serde_json::to_string(&task.allowed_files)?,
                task.base_path,
                serde_json::to_string(&task.steps)?,
                task.status.as_str(),
                task.retry_count,
                task.created_at.to_rfc3339(),
                task.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn load_task(&self, task_id: Uuid) -> Result<Option<Task>> {
        let conn = self.db()?;
        let mut stmt = conn.prepare(
            "SELECT task_id, session_id, intent_type, compiled_prompt_hash, allowed_files,
                    base_path, steps, status, retry_count, created_at
             FROM tasks WHERE task_id = ?1",
        )?;
        let mut rows = stmt.query([task_id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(task_from_row(row)?));
        }
        Ok(None)
    }

    /// Advances a task's status. Terminal tasks are immutable: the update
    /// is keyed on non-terminal status and returns false when refused.
    pub fn update_task_status(
        &self,
        task_id: Uuid,
        status: TaskStatus,
        retry_count: u32,
    ) -> Result<bool> {
        let conn = self.db()?;
        let changed = conn.execute(
            "UPDATE tasks SET status = ?1, retry_count = ?2, updated_at = ?3
             WHERE task_id = ?4 AND status NOT IN ('completed', 'failed')",
            params![
                status.as_str(),
                retry_count,
                Utc::now().to_rfc3339(),
                task_id.to_string(),
            ],
        )?;
        Ok(changed == 1)
    }

    // -- activity log -----------------------------------------------------

    pub fn append_activity(&self, entry: &ActivityLogEntry) -> Result<()> {
        let conn = self.db()?;
        conn.execute(
            "INSERT INTO activity_logs (session_id, action, duration_ms, retry_count, error_type, at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                entry.session_id.to_string(),
                entry.action,
                entry.duration_ms as i64,
                entry.retry_count,
                entry.error_type,
                entry.at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Rate-limit accounting: entries for (session, action) at or after `since`.
    pub fn count_activity_since(
        &self,
        session_id: Uuid,
        action: &str,
        since: DateTime<Utc>,
    ) -> Result<u64> {
        let conn = self.db()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(1) FROM activity_logs
             WHERE session_id = ?1 AND action = ?2 AND at >= ?3",
            params![session_id.to_string(), action, since.to_rfc3339()],
            |r| r.get(0),
        )?;
        Ok(count.max(0) as u64)
    }

    pub fn list_activity(&self, session_id: Uuid) -> Result<Vec<ActivityLogEntry>> {
        let conn = self.db()?;
        let mut stmt = conn.prepare(
            "SELECT session_id, action, duration_ms, retry_count, error_type, at
             FROM activity_logs WHERE session_id = ?1 ORDER BY id ASC",
        )?;
        let mut rows = stmt.query([session_id.to_string()])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push(ActivityLogEntry {
                session_id: Uuid::parse_str(row.get::<_, String>(0)?.as_str())?,
                action: row.get(1)?,
                duration_ms: row.get::<_, i64>(2)?.max(0) as u64,
                retry_count: row.get(3)?,
                error_type: row.get(4)?,
                at: parse_timestamp(&row.get::<_, String>(5)?)?,
            });
        }
        Ok(out)
    }

    // -- autonomous specs ---------------------------------------------------

    /// Saves (or replaces the unlocked) spec for a session. A locked spec is
    /// frozen and cannot be replaced.
    pub fn save_spec(
        &self,
        session_id: Uuid,
        spec_json: serde_json::Value,
    ) -> Result<Option<AutonomousSpec>> {
        if let Some(existing) = self.load_spec_for_session(session_id)? {
            if existing.is_locked() {
                return Ok(None);
            }
            let conn = self.db()?;
            conn.execute(
                "DELETE FROM autonomous_specs WHERE spec_id = ?1",
                [existing.spec_id.to_string()],
            )?;
        }
        let spec = AutonomousSpec {
            spec_id: Uuid::now_v7(),
            session_id,
            spec_json,
            locked_at: None,
            created_at: Utc::now(),
        };
        let conn = self.db()?;
        conn.execute(
            "INSERT INTO autonomous_specs (spec_id, session_id, spec_json, locked_at, created_at)
             VALUES (?1, ?2, ?3, NULL, ?4)",
            params![
                spec.spec_id.to_string(),
                spec.session_id.to_string(),
                serde_json::to_string(&spec.spec_json)?,
                spec.created_at.to_rfc3339(),
            ],
        )?;
        Ok(Some(spec))
    }

    pub fn lock_spec(&self, spec_id: Uuid) -> Result<Option<AutonomousSpec>> {
        let conn = self.db()?;
        conn.execute(
            "UPDATE autonomous_specs SET locked_at = ?1 WHERE spec_id = ?2 AND locked_at IS NULL",
            params![Utc::now().to_rfc3339(), spec_id.to_string()],
        )?;
        drop(conn);
        self.load_spec(spec_id)
    }

    pub fn load_spec(&self, spec_id: Uuid) -> Result<Option<AutonomousSpec>> {
        let conn = self.db()?;
        let mut stmt = conn.prepare(
            "SELECT spec_id, session_id, spec_json, locked_at, created_at
             FROM autonomous_specs WHERE spec_id = ?1",
        )?;
        let mut rows = stmt.query([spec_id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(spec_from_row(row)?));
        }
        Ok(None)
    }

    pub fn load_spec_for_session(&self, session_id: Uuid) -> Result<Option<AutonomousSpec>> {
        let conn = self.db()?;
        let mut stmt = conn.prepare(
            "SELECT spec_id, session_id, spec_json, locked_at, created_at
             FROM autonomous_specs WHERE session_id = ?1
             ORDER BY created_at DESC LIMIT 1",
        )?;
        let mut rows = stmt.query([session_id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(spec_from_row(row)?));
        }
        Ok(None)
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(raw)?.with_timezone(&Utc))
}

fn repository_from_row(row: &rusqlite::Row<'_>) -> Result<Repository> {
    Ok(Repository {
        repo_id: Uuid::parse_str(row.get::<_, String>(0)?.as_str())?,
        owner: row.get(1)?,
        name: row.get(2)?,
        default_branch: row.get(3)?,
        base_path: row.get(4)?,
        created_at: parse_timestamp(&row.get::<_, String>(5)?)?,
    })
}

fn session_from_row(row: &rusqlite::Row<'_>) -> Result<Session> {
    Ok(Session {
        session_id: Uuid::parse_str(row.get::<_, String>(0)?.as_str())?,
        repo_id: Uuid::parse_str(row.get::<_, String>(1)?.as_str())?,
        mode: row.get::<_, String>(2)?.parse()?,
        state: row.get::<_, String>(3)?.parse()?,
        created_at: parse_timestamp(&row.get::<_, String>(4)?)?,
        updated_at: parse_timestamp(&row.get::<_, String>(5)?)?,
    })
}

fn task_from_row(row: &rusqlite::Row<'_>) -> Result<Task> {
    Ok(Task {
        task_id: Uuid::parse_str(row.get::<_, String>(0)?.as_str())?,
        session_id: Uuid::parse_str(row.get::<_, String>(1)?.as_str())?,
        intent: row.get::<_, String>(2)?.parse()?,
        compiled_prompt_hash: row.get(3)?,
        allowed_files: serde_json::from_str(&row.get::<_, String>(4)?)?,
        base_path: row.get(5)?,
        steps: serde_json::from_str(&row.get::<_, String>(6)?)?,
        status: match row.get::<_, String>(7)?.as_str() {
            "pending" => TaskStatus::Pending,
            "running" => TaskStatus::Running,
            "completed" => TaskStatus::Completed,
            "failed" => TaskStatus::Failed,
            other => anyhow::bail!("unknown task status `{other}`"),
        },
        retry_count: row.get(8)?,
        created_at: parse_timestamp(&row.get::<_, String>(9)?)?,
    })
}

fn spec_from_row(row: &rusqlite::Row<'_>) -> Result<AutonomousSpec> {
    Ok(AutonomousSpec {
        spec_id: Uuid::parse_str(row.get::<_, String>(0)?.as_str())?,
        session_id: Uuid::parse_str(row.get::<_, String>(1)?.as_str())?,
        spec_json: serde_json::from_str(&row.get::<_, String>(2)?)?,
        locked_at: row
            .get::<_, Option<String>>(3)?
            .map(|v| parse_timestamp(&v))
            .transpose()?,
        created_at: parse_timestamp(&row.get::<_, String>(4)?)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use patchflow_core::IntentType;

    fn temp_store() -> Store {
        let workspace =
            std::env::temp_dir().join(format!("patchflow-store-test-{}", Uuid::now_v7()));
        fs::create_dir_all(&workspace).expect("temp workspace");
        Store::new(&workspace).expect("store")
    }

    fn attach(store: &Store) -> Repository {
        store
            .attach_repository("octocat", "hello-world", "main", None, 5)
            .expect("attach")
            .expect("repo slot")
    }

    #[test]
    fn second_active_session_is_refused_until_settled() {
        let store = temp_store();
        let repo = attach(&store);
        let first = store
            .create_session(repo.repo_id, SessionMode::Action)
            .expect("create")
            .expect("first session");

        // IDLE counts as settled, so a second create is still allowed.
        assert!(
            store
                .create_session(repo.repo_id, SessionMode::Chat)
                .expect("create")
                .is_some()
        );

        assert!(
            store
                .update_session_state(first.session_id, &SessionState::Idle, &SessionState::Planning)
                .expect("cas")
        );
        assert!(
            store
                .create_session(repo.repo_id, SessionMode::Chat)
                .expect("create")
                .is_none()
        );

        assert!(
            store
                .update_session_state(
                    first.session_id,
                    &SessionState::Planning,
                    &SessionState::Failed
                )
                .expect("cas")
        );
        assert!(
            store
                .create_session(repo.repo_id, SessionMode::Chat)
                .expect("create")
                .is_some()
        );
    }

    #[test]
    fn cas_refuses_stale_expected_state() {
        let store = temp_store();
        let repo = attach(&store);
        let session = store
            .create_session(repo.repo_id, SessionMode::Action)
            .expect("create")
            .expect("session");

        assert!(
            store
                .update_session_state(
                    session.session_id,
                    &SessionState::Idle,
                    &SessionState::Planning
                )
                .expect("cas")
        );
        // Second caller still believes the session is IDLE.
        assert!(
            !store
                .update_session_state(
                    session.session_id,
                    &SessionState::Idle,
                    &SessionState::Planning
                )
                .expect("cas")
        );
        let reloaded = store
            .load_session(session.session_id)
            .expect("load")
            .expect("exists");
        assert_eq!(reloaded.state, SessionState::Planning);
    }

    #[test]
    fn repository_cap_is_enforced() {
        let store = temp_store();
        for i in 0..5 {
            assert!(
                store
                    .attach_repository("octocat", &format!("repo-{i}"), "main", None, 5)
                    .expect("attach")
                    .is_some()
            );
        }
        assert!(
            store
                .attach_repository("octocat", "one-too-many", "main", None, 5)
                .expect("attach")
                .is_none()
        );
    }

    #[test]
    fn terminal_tasks_are_immutable() {
        let store = temp_store();
        let repo = attach(&store);
        let session = store
            .create_session(repo.repo_id, SessionMode::Action)
            .expect("create")
            .expect("session");
        let task = Task {
            task_id: Uuid::now_v7(),
            session_id: session.session_id,
            intent: IntentType::Refactor,
            compiled_prompt_hash: "abc123".into(),
            allowed_files: vec!["src/lib.rs".into()],
            base_path: "/".into(),
            steps: Vec::new(),
            status: TaskStatus::Pending,
            retry_count: 0,
            created_at: Utc::now(),
        };
        store.insert_task(&task).expect("insert");

        assert!(
            store
                .update_task_status(task.task_id, TaskStatus::Running, 0)
                .expect("running")
        );
        assert!(
            store
                .update_task_status(task.task_id, TaskStatus::Completed, 1)
                .expect("completed")
        );
        assert!(
            !store
                .update_task_status(task.task_id, TaskStatus::Failed, 2)
                .expect("refused")
        );
        let reloaded = store.load_task(task.task_id).expect("load").expect("task");
        assert_eq!(reloaded.status, TaskStatus::Completed);
        assert_eq!(reloaded.retry_count, 1);
        assert_eq!(reloaded.allowed_files, vec!["src/lib.rs".to_string()]);
    }

    #[test]
    fn activity_count_respects_window_boundary() {
        let store = temp_store();
        let session_id = Uuid::now_v7();
        let now = Utc::now();
        for age_seconds in [10_i64, 30, 90] {
            store
                .append_activity(&ActivityLogEntry {
                    session_id,
                    action: "github.commitFile".into(),
                    duration_ms: 5,
                    retry_count: 0,
                    error_type: None,
                    at: now - chrono::Duration::seconds(age_seconds),
                })
                .expect("append");
        }
        let window_start = now - chrono::Duration::seconds(60);
        let counted = store
            .count_activity_since(session_id, "github.commitFile", window_start)
            .expect("count");
        assert_eq!(counted, 2);
        // Other actions never share the counter.
        assert_eq!(
            store
                .count_activity_since(session_id, "ai.execute.success", window_start)
                .expect("count"),
            0
        );
    }

    #[test]
    fn locked_spec_cannot_be_replaced() {
        let store = temp_store();
        let session_id = Uuid::now_v7();
        let spec = store
            .save_spec(session_id, serde_json::json!({"goal": "migrate"}))
            .expect("save")
            .expect("spec");
        assert!(!spec.is_locked());

        let locked = store
            .lock_spec(spec.spec_id)
            .expect("lock")
            .expect("spec");
        assert!(locked.is_locked());

        assert!(
            store
                .save_spec(session_id, serde_json::json!({"goal": "changed"}))
                .expect("save")
                .is_none()
        );
    }
}
