use anyhow::anyhow;
use chrono::Utc;
use patchflow_core::{
    ActivityLogEntry, PipelineError, Session, SessionMode, SessionState,
    is_valid_session_state_transition,
};
use patchflow_store::Store;
use uuid::Uuid;

/// Retries for the compare-and-swap transition when a concurrent caller
/// moves the session first.
const CAS_ATTEMPTS: u32 = 3;

pub struct SessionService<'a> {
    store: &'a Store,
}

impl<'a> SessionService<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    /// Creates a session in IDLE. Refused while any other session is still
    /// unsettled; the check-and-insert is one sqlite transaction.
    pub fn create(&self, repo_id: Uuid, mode: SessionMode) -> Result<Session, PipelineError> {
        match self.store.create_session(repo_id, mode)? {
            Some(session) => Ok(session),
            None => Err(PipelineError::StateViolation(
                "another session is still active; settle it first".to_string(),
            )),
        }
    }

    /// Moves a session to `target`. Illegal pairs are refused, audited, and
    /// leave the persisted state untouched. The update itself is a
    /// compare-and-swap keyed on the state that was just read; on conflict
    /// the session is re-read and re-checked a bounded number of times.
    pub fn transition(
        &self,
        session_id: Uuid,
        target: SessionState,
    ) -> Result<Session, PipelineError> {
        for _ in 0..CAS_ATTEMPTS {
            let session = self.load(session_id)?;
            let current = session.state;

            if !is_valid_session_state_transition(&current, &target) {
                self.audit(
                    session_id,
                    "session.transition.rejected",
                    Some(format!("{current}->{target}")),
                )?;
                return Err(PipelineError::StateViolation(format!(
                    "transition {current} -> {target} is not allowed"
                )));
            }

            if target == SessionState::SpecLocked {
                self.require_locked_spec(&session)?;
            }

            if self.store.update_session_state(session_id, &current, &target)? {
                self.audit(session_id, "session.transition", None)?;
                return self.load(session_id);
            }
            // Lost the race; loop re-reads the fresh state.
        }
        Err(PipelineError::StateViolation(format!(
            "session `{session_id}` kept changing during the transition"
        )))
    }

    fn load(&self, session_id: Uuid) -> Result<Session, PipelineError> {
        self.store
            .load_session(session_id)?
            .ok_or_else(|| anyhow!("unknown session `{session_id}`").into())
    }

    /// SPEC_LOCKED is reserved for autonomous sessions whose structured spec
    /// has been frozen.
    fn require_locked_spec(&self, session: &Session) -> Result<(), PipelineError> {
        if session.mode != SessionMode::Autonomous {
            return Err(PipelineError::StateViolation(format!(
                "only autonomous sessions may lock a spec (mode is {})",
                session.mode
            )));
        }
        let locked = self
            .store
            .load_spec_for_session(session.session_id)?
            .is_some_and(|spec| spec.is_locked());
        if !locked {
            return Err(PipelineError::StateViolation(
                "session has no locked spec".to_string(),
            ));
        }
        Ok(())
    }

    fn audit(
        &self,
        session_id: Uuid,
        action: &str,
        error_type: Option<String>,
    ) -> Result<(), PipelineError> {
        self.store.append_activity(&ActivityLogEntry {
            session_id,
            action: action.to_string(),
            duration_ms: 0,
            retry_count: 0,
            error_type,
            at: Utc::now(),
        })?;
        Ok(())
    }
}
