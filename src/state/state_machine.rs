use thiserror::Error;

/// High-level status of a game record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GameStatus {
    /// Players gather; no roles have been dealt yet.
    Lobby,
    /// Roles are dealt and guesses are being collected.
    InRound,
    /// Every participant guessed; the killer is revealed and points are awarded.
    RoundOver,
}

/// Intents that may move a game from one status to another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundEvent {
    /// Deal roles for the first round of the lobby.
    AssignRoles,
    /// Record a guess for the running round.
    SubmitGuess,
    /// The last outstanding guess arrived.
    RoundDecided,
    /// Deal fresh roles while keeping accumulated points.
    NextRound,
    /// Deal fresh roles and zero every score.
    NewGame,
}

/// Error returned when an intent cannot be applied from the current status.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while in {from:?}")]
pub struct InvalidTransition {
    /// The status the game was in when the intent was received.
    pub from: GameStatus,
    /// The intent that cannot be applied from this status.
    pub event: RoundEvent,
}

impl GameStatus {
    /// Compute the status reached by applying `event`, if the transition is valid.
    pub fn transition(self, event: RoundEvent) -> Result<GameStatus, InvalidTransition> {
        let next = match (self, event) {
            (GameStatus::Lobby, RoundEvent::AssignRoles) => GameStatus::InRound,
            (GameStatus::InRound, RoundEvent::SubmitGuess) => GameStatus::InRound,
            (GameStatus::InRound, RoundEvent::RoundDecided) => GameStatus::RoundOver,
            (GameStatus::RoundOver, RoundEvent::NextRound) => GameStatus::InRound,
            (GameStatus::RoundOver, RoundEvent::NewGame) => GameStatus::InRound,
            (from, event) => return Err(InvalidTransition { from, event }),
        };

        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_happy_path_through_rounds() {
        let status = GameStatus::Lobby;
        let status = status.transition(RoundEvent::AssignRoles).unwrap();
        assert_eq!(status, GameStatus::InRound);
        let status = status.transition(RoundEvent::SubmitGuess).unwrap();
        assert_eq!(status, GameStatus::InRound);
        let status = status.transition(RoundEvent::RoundDecided).unwrap();
        assert_eq!(status, GameStatus::RoundOver);
        let status = status.transition(RoundEvent::NextRound).unwrap();
        assert_eq!(status, GameStatus::InRound);
        let status = status
            .transition(RoundEvent::RoundDecided)
            .and_then(|s| s.transition(RoundEvent::NewGame))
            .unwrap();
        assert_eq!(status, GameStatus::InRound);
    }

    #[test]
    fn guesses_are_rejected_outside_a_round() {
        for from in [GameStatus::Lobby, GameStatus::RoundOver] {
            let err = from.transition(RoundEvent::SubmitGuess).unwrap_err();
            assert_eq!(err.from, from);
            assert_eq!(err.event, RoundEvent::SubmitGuess);
        }
    }

    #[test]
    fn resets_require_a_finished_round() {
        for event in [RoundEvent::NextRound, RoundEvent::NewGame] {
            assert!(GameStatus::Lobby.transition(event).is_err());
            assert!(GameStatus::InRound.transition(event).is_err());
        }
    }

    #[test]
    fn roles_are_dealt_only_once_from_the_lobby() {
        assert!(GameStatus::InRound.transition(RoundEvent::AssignRoles).is_err());
        assert!(GameStatus::RoundOver.transition(RoundEvent::AssignRoles).is_err());
    }
}
