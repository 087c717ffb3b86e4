use std::fmt;

/// Lifecycle of one interpreter session.
///
/// ```text
/// Created → Spawning → Communicating → {ExitSignaled, ErrorSignaled} → Terminating → Terminated
///              └──────────────────────→ ErrorSignaled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Created,
    Spawning,
    Communicating,
    ExitSignaled,
    ErrorSignaled,
    Terminating,
    Terminated,
}

impl SessionState {
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Created, Spawning)
                | (Spawning, Communicating)
                | (Spawning, ErrorSignaled)
                | (Communicating, ExitSignaled)
                | (Communicating, ErrorSignaled)
                | (ExitSignaled, Terminating)
                | (ErrorSignaled, Terminating)
                | (Terminating, Terminated)
        )
    }

    pub fn is_terminal(self) -> bool {
        self == SessionState::Terminated
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::Created => "created",
            SessionState::Spawning => "spawning",
            SessionState::Communicating => "communicating",
            SessionState::ExitSignaled => "exit_signaled",
            SessionState::ErrorSignaled => "error_signaled",
            SessionState::Terminating => "terminating",
            SessionState::Terminated => "terminated",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidTransition {
    pub from: SessionState,
    pub to: SessionState,
}

/// Guarded state holder; every transition is checked and logged.
#[derive(Debug)]
pub struct SessionMachine {
    run_id: String,
    state: SessionState,
    trail: Vec<SessionState>,
}

impl SessionMachine {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            state: SessionState::Created,
            trail: vec![SessionState::Created],
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// States visited so far, in order.
    pub fn trail(&self) -> &[SessionState] {
        &self.trail
    }

    pub fn advance(&mut self, next: SessionState) -> Result<(), InvalidTransition> {
        if !self.state.can_transition_to(next) {
            tracing::error!(
                target: "scriptbridge.communicator",
                run_id = %self.run_id,
                from = %self.state,
                to = %next,
                "invalid session transition"
            );
            return Err(InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        tracing::debug!(
            target: "scriptbridge.communicator",
            run_id = %self.run_id,
            from = %self.state,
            to = %next,
            "session transition"
        );
        self.state = next;
        self.trail.push(next);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use SessionState::*;

    #[test]
    fn happy_path_is_allowed() {
        let mut m = SessionMachine::new("t");
        for s in [Spawning, Communicating, ExitSignaled, Terminating, Terminated] {
            m.advance(s).unwrap();
        }
        assert!(m.state().is_terminal());
        assert_eq!(m.trail().len(), 6);
    }

    #[test]
    fn spawn_failure_path_is_allowed() {
        let mut m = SessionMachine::new("t");
        for s in [Spawning, ErrorSignaled, Terminating, Terminated] {
            m.advance(s).unwrap();
        }
    }

    #[test]
    fn terminating_never_returns_to_error_signaled() {
        let mut m = SessionMachine::new("t");
        for s in [Spawning, Communicating, ExitSignaled, Terminating] {
            m.advance(s).unwrap();
        }
        let err = m.advance(ErrorSignaled).unwrap_err();
        assert_eq!(err.from, Terminating);
        assert_eq!(m.state(), Terminating);
    }

    #[test]
    fn no_second_signal_after_exit() {
        assert!(!ExitSignaled.can_transition_to(ErrorSignaled));
        assert!(!ErrorSignaled.can_transition_to(ExitSignaled));
        assert!(!Terminated.can_transition_to(Spawning));
    }
}
