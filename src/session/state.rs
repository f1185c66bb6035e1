//! Session lifecycle state machine.

/// Represents the lifecycle state of a test session, as seen by the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LifecycleState {
    /// Waiting for the initialization (or clear) call to complete.
    #[default]
    Loading,
    /// An in-progress session exists; the user picks resume or restart.
    Landing,
    /// The user is answering steps.
    Active,
    /// The session is completed.
    Finished,
    /// Initialization failed; only a retry is possible.
    Error,
}

impl LifecycleState {
    /// Check if transition to target state is valid.
    ///
    /// Valid transitions:
    /// - any state -> Loading (initialize, restart, retry)
    /// - Loading -> Landing | Active | Finished | Error
    /// - Landing -> Active
    /// - Active -> Active | Finished
    pub fn can_transition_to(&self, target: LifecycleState) -> bool {
        use LifecycleState::*;
        matches!(
            (*self, target),
            (_, Loading)
                | (Loading, Landing)
                | (Loading, Active)
                | (Loading, Finished)
                | (Loading, Error)
                | (Landing, Active)
                | (Active, Active)
                | (Active, Finished)
        )
    }

    /// Attempt to transition to a new state.
    ///
    /// Returns `Ok(())` if the transition is valid, or an error otherwise.
    pub fn transition_to(&mut self, target: LifecycleState) -> crate::Result<()> {
        if self.can_transition_to(target) {
            *self = target;
            Ok(())
        } else {
            Err(crate::error::GuidanceError::InvalidStateTransition {
                from: *self,
                to: target,
            })
        }
    }

    /// Check if the user is answering steps.
    pub fn is_active(&self) -> bool {
        matches!(self, LifecycleState::Active)
    }

    /// Check if the session can be restarted from this state.
    pub fn can_restart(&self) -> bool {
        matches!(
            self,
            LifecycleState::Landing | LifecycleState::Active | LifecycleState::Finished
        )
    }
}
