//! Login session state machine.

use serde::{Deserialize, Serialize};

/// Authentication progress for one app profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoginState {
    NotStarted,
    Navigated,
    CredentialsSubmitted,
    AwaitingSecondFactor,
    Authenticated,
    Failed,
}

impl LoginState {
    pub fn is_terminal(self) -> bool {
        matches!(self, LoginState::Authenticated | LoginState::Failed)
    }

    /// Legal forward transitions.
    ///
    /// `Navigated -> AwaitingSecondFactor` is the persisted-profile fast path that
    /// skips credential entry. Any non-terminal state may fail.
    pub fn can_transition_to(self, next: LoginState) -> bool {
        use LoginState::{
            Authenticated, AwaitingSecondFactor, CredentialsSubmitted, Failed, Navigated,
            NotStarted,
        };
        if self.is_terminal() {
            return false;
        }
        match (self, next) {
            (_, Failed) => true,
            (NotStarted, Navigated) => true,
            (Navigated, CredentialsSubmitted) => true,
            (Navigated, AwaitingSecondFactor) => true,
            (CredentialsSubmitted, AwaitingSecondFactor) => true,
            (AwaitingSecondFactor, Authenticated) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_path_is_legal() {
        let path = [
            LoginState::NotStarted,
            LoginState::Navigated,
            LoginState::CredentialsSubmitted,
            LoginState::AwaitingSecondFactor,
            LoginState::Authenticated,
        ];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{:?}", pair);
        }
    }

    #[test]
    fn fast_path_skips_credentials() {
        assert!(LoginState::Navigated.can_transition_to(LoginState::AwaitingSecondFactor));
    }

    #[test]
    fn terminal_states_never_advance() {
        for next in [
            LoginState::Authenticated,
            LoginState::Failed,
            LoginState::Navigated,
        ] {
            assert!(!LoginState::Authenticated.can_transition_to(next));
            assert!(!LoginState::Failed.can_transition_to(next));
        }
    }

    #[test]
    fn cannot_authenticate_without_waiting() {
        assert!(!LoginState::CredentialsSubmitted.can_transition_to(LoginState::Authenticated));
        assert!(!LoginState::NotStarted.can_transition_to(LoginState::AwaitingSecondFactor));
    }
}
