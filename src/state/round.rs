//! Round engine: pure transitions over a [`Game`] record.
//!
//! Every operation either applies its whole change to the game or returns an
//! error and leaves the game untouched, so callers can run them inside a
//! read-modify-write loop against the store.

use indexmap::IndexMap;
use rand::Rng;
use thiserror::Error;

use crate::state::{
    game::{Game, Player, PlayerId, Role, RoleAssignment},
    state_machine::{GameStatus, InvalidTransition, RoundEvent},
};

/// Failures raised by the round engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoundError {
    /// The intent is not legal for the current status.
    #[error(transparent)]
    InvalidState(#[from] InvalidTransition),
    /// The player already locked in a guess this round.
    #[error("player `{player_id}` already submitted a guess this round")]
    DuplicateGuess {
        /// Player who tried to guess twice.
        player_id: PlayerId,
    },
    /// The identifier is not part of the roster or of the dealt roles.
    #[error("unknown player `{player_id}`")]
    UnknownPlayer {
        /// Identifier that could not be resolved.
        player_id: PlayerId,
    },
    /// Roles cannot be dealt without players.
    #[error("cannot assign roles to an empty roster")]
    EmptyRoster,
    /// A game invariant is broken; only a forced re-assignment recovers.
    #[error("corrupt game state: {0}")]
    CorruptState(String),
}

impl RoundError {
    /// Stable machine-readable code exposed to clients.
    pub fn code(&self) -> &'static str {
        match self {
            RoundError::InvalidState(_) => "invalid_state",
            RoundError::DuplicateGuess { .. } => "duplicate_guess",
            RoundError::UnknownPlayer { .. } => "unknown_player",
            RoundError::EmptyRoster => "empty_roster",
            RoundError::CorruptState(_) => "corrupt_state",
        }
    }
}

/// Result of an operation that may close the running round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoundOutcome {
    /// Guesses are still outstanding.
    Pending,
    /// Every guess is in; points were awarded.
    Decided {
        /// The killer revealed by the decision.
        killer_id: PlayerId,
    },
    /// The change was applied but the running round no longer has exactly
    /// one killer; roles must be dealt again before anyone can win.
    Corrupt {
        /// What is wrong with the dealt roles.
        reason: String,
    },
}

/// Deal roles for the lobby, or re-deal a round whose killer left.
///
/// Exactly one roster member, picked uniformly with `rng`, becomes the killer.
/// Points of players already holding a role are kept.
pub fn assign_roles<R: Rng>(game: &mut Game, rng: &mut R) -> Result<(), RoundError> {
    let next = if game.status == GameStatus::InRound && find_killer(&game.roles).is_err() {
        GameStatus::InRound
    } else {
        game.status.transition(RoundEvent::AssignRoles)?
    };

    game.roles = deal_roles(game, rng, true)?;
    game.status = next;
    game.round += 1;
    Ok(())
}

/// Record `target_id` as the guess of `player_id`, deciding the round when it
/// completes the set.
pub fn submit_guess(
    game: &mut Game,
    player_id: &str,
    target_id: &str,
) -> Result<RoundOutcome, RoundError> {
    game.status.transition(RoundEvent::SubmitGuess)?;

    let mut roles = game.roles.clone();
    let assignment = roles
        .get_mut(player_id)
        .ok_or_else(|| RoundError::UnknownPlayer {
            player_id: player_id.to_owned(),
        })?;

    if assignment.guess.is_some() {
        return Err(RoundError::DuplicateGuess {
            player_id: player_id.to_owned(),
        });
    }

    if !game.is_on_roster(target_id) {
        return Err(RoundError::UnknownPlayer {
            player_id: target_id.to_owned(),
        });
    }

    assignment.guess = Some(target_id.to_owned());

    let outcome = settle_round(&mut game.status, &mut roles)?;
    game.roles = roles;
    Ok(outcome)
}

/// Decide the running round once the win condition holds.
///
/// `status` only moves once scoring succeeded.
fn settle_round(
    status: &mut GameStatus,
    roles: &mut IndexMap<PlayerId, RoleAssignment>,
) -> Result<RoundOutcome, RoundError> {
    if !check_win_condition(roles)? {
        return Ok(RoundOutcome::Pending);
    }
    let killer_id = score_round(roles)?;
    *status = status.transition(RoundEvent::RoundDecided)?;
    Ok(RoundOutcome::Decided { killer_id })
}

/// Whether every dealt role holds a guess.
///
/// Fails with [`RoundError::CorruptState`] when the roles do not contain
/// exactly one killer, rather than deciding a round nobody can win.
pub fn check_win_condition(roles: &IndexMap<PlayerId, RoleAssignment>) -> Result<bool, RoundError> {
    find_killer(roles)?;
    Ok(roles.values().all(|assignment| assignment.guess.is_some()))
}

/// Award one point to every participant who named the killer, killer included.
///
/// Returns the killer identifier.
pub fn score_round(roles: &mut IndexMap<PlayerId, RoleAssignment>) -> Result<PlayerId, RoundError> {
    let killer_id = find_killer(roles)?.clone();
    award_points(roles, &killer_id);
    Ok(killer_id)
}

/// Re-deal roles over the current roster, keeping points.
pub fn start_new_round<R: Rng>(game: &mut Game, rng: &mut R) -> Result<(), RoundError> {
    let next = game.status.transition(RoundEvent::NextRound)?;
    game.roles = deal_roles(game, rng, true)?;
    game.status = next;
    game.round += 1;
    Ok(())
}

/// Re-deal roles over the current roster and zero every score.
pub fn start_new_game<R: Rng>(game: &mut Game, rng: &mut R) -> Result<(), RoundError> {
    let next = game.status.transition(RoundEvent::NewGame)?;
    game.roles = deal_roles(game, rng, false)?;
    game.status = next;
    game.round = 1;
    Ok(())
}

/// Append `player` to the roster unless the identifier is already present.
///
/// Returns whether the roster changed. Roles are left untouched: a mid-round
/// joiner waits for the next deal.
pub fn join_roster(game: &mut Game, player: Player) -> bool {
    if game.is_on_roster(&player.id) {
        return false;
    }
    game.players.push(player);
    true
}

/// Remove a player from the roster and drop their role.
///
/// The departure always goes through. During a round the win condition is
/// checked again: the round is decided on the spot when no guess is
/// outstanding, and a departing killer yields [`RoundOutcome::Corrupt`] so the
/// caller can ask for a fresh deal.
pub fn leave_roster(game: &mut Game, player_id: &str) -> RoundOutcome {
    game.players.retain(|player| player.id != player_id);
    let had_role = game.roles.shift_remove(player_id).is_some();

    if !had_role || game.status != GameStatus::InRound {
        return RoundOutcome::Pending;
    }

    let mut roles = game.roles.clone();
    match settle_round(&mut game.status, &mut roles) {
        Ok(outcome) => {
            game.roles = roles;
            outcome
        }
        Err(err) => RoundOutcome::Corrupt {
            reason: err.to_string(),
        },
    }
}

fn find_killer(roles: &IndexMap<PlayerId, RoleAssignment>) -> Result<&PlayerId, RoundError> {
    let mut killers = roles
        .iter()
        .filter(|(_, assignment)| assignment.is_killer())
        .map(|(id, _)| id);

    match (killers.next(), killers.next()) {
        (Some(id), None) => Ok(id),
        (None, _) => Err(RoundError::CorruptState(
            "no killer among the dealt roles".into(),
        )),
        (Some(_), Some(_)) => Err(RoundError::CorruptState(
            "more than one killer among the dealt roles".into(),
        )),
    }
}

fn award_points(roles: &mut IndexMap<PlayerId, RoleAssignment>, killer_id: &str) {
    for assignment in roles.values_mut() {
        if assignment.guess.as_deref() == Some(killer_id) {
            assignment.points = assignment.points.saturating_add(1);
        }
    }
}

fn deal_roles<R: Rng>(
    game: &Game,
    rng: &mut R,
    keep_points: bool,
) -> Result<IndexMap<PlayerId, RoleAssignment>, RoundError> {
    if game.players.is_empty() {
        return Err(RoundError::EmptyRoster);
    }

    let killer_index = rng.random_range(0..game.players.len());

    Ok(game
        .players
        .iter()
        .enumerate()
        .map(|(index, player)| {
            let role = if index == killer_index {
                Role::Killer
            } else {
                Role::Player
            };
            let points = if keep_points {
                game.points_of(&player.id)
            } else {
                0
            };
            (player.id.clone(), RoleAssignment::new(role, points))
        })
        .collect())
}
