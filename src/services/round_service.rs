use std::{sync::Arc, time::SystemTime};

use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
    dao::storage::{StorageError, Versioned},
    dto::game::{GameView, GuessRequest, JoinRequest},
    error::ServiceError,
    state::{
        SharedState,
        game::{Game, Player},
        round::{self, RoundError, RoundOutcome},
    },
};

/// Run `op` against the latest stored version of a game and commit the result.
///
/// The game is re-read and `op` re-applied whenever another writer committed
/// first, up to `engine.max_commit_attempts` times. Subscribers are notified
/// only after a successful commit. When `op` leaves the game unchanged nothing
/// is written.
pub async fn apply<T, F>(
    state: &SharedState,
    game_id: Uuid,
    intent: &'static str,
    mut op: F,
) -> Result<(T, Arc<Game>), ServiceError>
where
    F: FnMut(&mut Game) -> Result<T, RoundError>,
{
    let store = state.require_game_store().await?;
    let max_attempts = state.config().engine.max_commit_attempts;

    for attempt in 1..=max_attempts {
        let Versioned { revision, value } = store
            .find_game(game_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("game `{game_id}`")))?;

        let current = Game::from(value);
        let mut next = current.clone();
        let outcome = op(&mut next).inspect_err(|err| log_rejection(game_id, intent, err))?;

        if next == current {
            debug!(%game_id, intent, "intent left the game unchanged; nothing to commit");
            return Ok((outcome, Arc::new(current)));
        }

        next.updated_at = SystemTime::now();
        match store.compare_and_swap(revision, next.clone().into()).await {
            Ok(committed_revision) => {
                let committed = Arc::new(next);
                state
                    .game_hubs()
                    .publish(committed.clone(), committed_revision.generation());
                debug!(%game_id, intent, attempt, "committed game change");
                return Ok((outcome, committed));
            }
            Err(StorageError::Conflict { .. }) => {
                debug!(%game_id, intent, attempt, "lost commit race; re-reading game");
            }
            Err(err) => return Err(err.into()),
        }
    }

    warn!(%game_id, intent, max_attempts, "giving up after repeated commit conflicts");
    Err(ServiceError::Contention(game_id))
}

fn log_rejection(game_id: Uuid, intent: &'static str, err: &RoundError) {
    match err {
        RoundError::CorruptState(reason) => error!(
            %game_id,
            intent,
            corrupt_state = true,
            reason = reason.as_str(),
            "game invariant broken; a forced role assignment is required"
        ),
        other => info!(%game_id, intent, code = other.code(), error = %other, "intent rejected"),
    }
}

fn log_decision(game_id: Uuid, game: &Game, outcome: &RoundOutcome) {
    if let RoundOutcome::Decided { killer_id } = outcome {
        info!(%game_id, round = game.round, killer_id = killer_id.as_str(), "round decided");
    }
}

/// Deal roles for the lobby, or re-deal a round whose killer is gone.
pub async fn assign_roles(state: &SharedState, game_id: Uuid) -> Result<GameView, ServiceError> {
    let ((), game) = apply(state, game_id, "assign_roles", |game| {
        round::assign_roles(game, &mut rand::rng())
    })
    .await?;

    info!(%game_id, round = game.round, players = game.players.len(), "roles assigned");
    Ok(GameView::for_viewer(&game, None))
}

/// Lock in a guess and decide the round when it was the last one missing.
pub async fn submit_guess(
    state: &SharedState,
    game_id: Uuid,
    request: GuessRequest,
) -> Result<GameView, ServiceError> {
    let GuessRequest {
        player_id,
        target_id,
    } = request;

    let (outcome, game) = apply(state, game_id, "submit_guess", |game| {
        round::submit_guess(game, &player_id, &target_id)
    })
    .await?;

    debug!(%game_id, player_id = player_id.as_str(), "guess recorded");
    log_decision(game_id, &game, &outcome);
    Ok(GameView::for_viewer(&game, Some(player_id.as_str())))
}

/// Re-deal roles after a finished round, keeping the scores.
pub async fn start_new_round(
    state: &SharedState,
    game_id: Uuid,
) -> Result<GameView, ServiceError> {
    let ((), game) = apply(state, game_id, "start_new_round", |game| {
        round::start_new_round(game, &mut rand::rng())
    })
    .await?;

    info!(%game_id, round = game.round, "new round started");
    Ok(GameView::for_viewer(&game, None))
}

/// Re-deal roles after a finished round and reset every score.
pub async fn start_new_game(state: &SharedState, game_id: Uuid) -> Result<GameView, ServiceError> {
    let ((), game) = apply(state, game_id, "start_new_game", |game| {
        round::start_new_game(game, &mut rand::rng())
    })
    .await?;

    info!(%game_id, "new game started");
    Ok(GameView::for_viewer(&game, None))
}

/// Add a participant to the roster; joining twice changes nothing.
pub async fn join_roster(
    state: &SharedState,
    game_id: Uuid,
    request: JoinRequest,
) -> Result<GameView, ServiceError> {
    let player = Player {
        id: request.player_id,
        display_name: request.display_name,
    };

    let (joined, game) = apply(state, game_id, "join_roster", |game| {
        Ok(round::join_roster(game, player.clone()))
    })
    .await?;

    if joined {
        info!(%game_id, player_id = player.id.as_str(), "player joined");
    }
    Ok(GameView::for_viewer(&game, Some(player.id.as_str())))
}

/// Remove a participant, deciding the running round if they were the last
/// one it waited for.
///
/// When the killer leaves mid-round the removal is still committed, and the
/// call fails with [`RoundError::CorruptState`] until roles are dealt again.
pub async fn leave_roster(
    state: &SharedState,
    game_id: Uuid,
    player_id: &str,
) -> Result<GameView, ServiceError> {
    let (outcome, game) = apply(state, game_id, "leave_roster", |game| {
        Ok(round::leave_roster(game, player_id))
    })
    .await?;

    info!(%game_id, player_id, "player left");
    if let RoundOutcome::Corrupt { reason } = outcome {
        // The departure is committed; the round cannot finish without a new deal.
        let err = RoundError::CorruptState(reason);
        log_rejection(game_id, "leave_roster", &err);
        return Err(err.into());
    }
    log_decision(game_id, &game, &outcome);
    Ok(GameView::for_viewer(&game, None))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use futures::future::{BoxFuture, join_all};

    use super::*;
    use crate::{
        config::AppConfig,
        dao::{
            game_store::{GameStore, memory::MemoryGameStore},
            models::{GameEntity, GameListItemEntity},
            storage::{Revision, StorageResult},
        },
        dto::game::VisibleGameStatus,
        state::{
            AppState, GameNotification,
            game::{Role, RoleAssignment},
            state_machine::GameStatus,
        },
    };

    /// Store that lets a hidden writer bump the revision right before the
    /// first `conflicts` compare-and-swaps.
    struct RacingStore {
        inner: MemoryGameStore,
        conflicts: AtomicUsize,
    }

    impl GameStore for RacingStore {
        fn create_game(&self, game: GameEntity) -> BoxFuture<'static, StorageResult<Revision>> {
            self.inner.create_game(game)
        }

        fn find_game(
            &self,
            id: Uuid,
        ) -> BoxFuture<'static, StorageResult<Option<Versioned<GameEntity>>>> {
            self.inner.find_game(id)
        }

        fn compare_and_swap(
            &self,
            expected: Revision,
            game: GameEntity,
        ) -> BoxFuture<'static, StorageResult<Revision>> {
            let inner = self.inner.clone();
            let race = self
                .conflicts
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
                .is_ok();
            Box::pin(async move {
                if race {
                    let current = inner.find_game(game.id).await?.expect("game exists");
                    inner
                        .compare_and_swap(current.revision, current.value)
                        .await?;
                }
                inner.compare_and_swap(expected, game).await
            })
        }

        fn list_games(&self) -> BoxFuture<'static, StorageResult<Vec<GameListItemEntity>>> {
            self.inner.list_games()
        }

        fn delete_game(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
            self.inner.delete_game(id)
        }

        fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.health_check()
        }

        fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.try_reconnect()
        }
    }

    async fn state_with(store: Arc<dyn GameStore>, max_commit_attempts: u32) -> SharedState {
        let mut config = AppConfig::default();
        config.engine.max_commit_attempts = max_commit_attempts;
        let state = AppState::new(config);
        state.set_game_store(store).await;
        state
    }

    async fn seed(store: &dyn GameStore, players: &[&str]) -> Uuid {
        let mut game = Game::new("room".into(), "host".into());
        for id in players {
            game.players.push(Player {
                id: id.to_string(),
                display_name: id.to_uppercase(),
            });
        }
        let id = game.id;
        store.create_game(game.into()).await.unwrap();
        id
    }

    async fn stored(store: &dyn GameStore, id: Uuid) -> Game {
        store.find_game(id).await.unwrap().unwrap().value.into()
    }

    fn guess(player_id: &str, target_id: &str) -> GuessRequest {
        GuessRequest {
            player_id: player_id.into(),
            target_id: target_id.into(),
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_guesses_all_land_and_decide_the_round_once() {
        let store = MemoryGameStore::new();
        let players = ["a", "b", "c", "d", "e", "f"];
        let id = seed(&store, &players).await;
        let state = state_with(Arc::new(store.clone()), 64).await;
        assign_roles(&state, id).await.unwrap();

        let killer = stored(&store, id).await.killer_id().cloned().unwrap();
        let handles = players.iter().map(|player| {
            let state = state.clone();
            let request = guess(player, &killer);
            tokio::spawn(async move { submit_guess(&state, id, request).await })
        });
        for result in join_all(handles).await {
            assert!(result.unwrap().is_ok());
        }

        let game = stored(&store, id).await;
        assert_eq!(game.status, GameStatus::RoundOver);
        assert!(game.roles.values().all(|assignment| assignment.points == 1));
    }

    #[tokio::test]
    async fn lost_race_is_retried_on_the_fresh_record() {
        let inner = MemoryGameStore::new();
        let id = seed(&inner, &["a", "b"]).await;
        let racing = Arc::new(RacingStore {
            inner: inner.clone(),
            conflicts: AtomicUsize::new(2),
        });
        let state = state_with(racing, 8).await;

        let view = assign_roles(&state, id).await.unwrap();
        assert_eq!(view.status, VisibleGameStatus::InRound);
        assert_eq!(stored(&inner, id).await.round, 1);
    }

    #[tokio::test]
    async fn exhausted_retries_report_contention_and_commit_nothing() {
        let inner = MemoryGameStore::new();
        let id = seed(&inner, &["a", "b"]).await;
        let racing = Arc::new(RacingStore {
            inner: inner.clone(),
            conflicts: AtomicUsize::new(usize::MAX),
        });
        let state = state_with(racing, 3).await;

        let err = assign_roles(&state, id).await.unwrap_err();
        assert!(matches!(err, ServiceError::Contention(game_id) if game_id == id));
        assert_eq!(stored(&inner, id).await.status, GameStatus::Lobby);
    }

    #[tokio::test]
    async fn duplicate_guess_is_rejected_and_state_is_unchanged() {
        let store = MemoryGameStore::new();
        let id = seed(&store, &["a", "b", "c"]).await;
        let state = state_with(Arc::new(store.clone()), 8).await;
        assign_roles(&state, id).await.unwrap();

        submit_guess(&state, id, guess("a", "b")).await.unwrap();
        let before = store.find_game(id).await.unwrap().unwrap();

        let err = submit_guess(&state, id, guess("a", "c")).await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Round(RoundError::DuplicateGuess { .. })
        ));
        assert_eq!(store.find_game(id).await.unwrap().unwrap(), before);
    }

    #[tokio::test]
    async fn missing_killer_surfaces_corrupt_state_until_reassigned() {
        let store = MemoryGameStore::new();
        let id = seed(&store, &["a", "b", "c"]).await;
        let state = state_with(Arc::new(store.clone()), 8).await;
        assign_roles(&state, id).await.unwrap();

        let killer = stored(&store, id).await.killer_id().cloned().unwrap();
        let err = leave_roster(&state, id, &killer).await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Round(RoundError::CorruptState(_))
        ));
        assert!(!stored(&store, id).await.is_on_roster(&killer));

        let remaining = stored(&store, id).await;
        let (first, second) = (&remaining.players[0].id, &remaining.players[1].id);
        let err = submit_guess(&state, id, guess(first, second))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Round(RoundError::CorruptState(_))
        ));
        assert!(stored(&store, id).await.roles[first.as_str()].guess.is_none());

        assign_roles(&state, id).await.unwrap();
        let recovered = stored(&store, id).await;
        assert_eq!(recovered.status, GameStatus::InRound);
        assert!(recovered.killer_id().is_some());
    }

    #[tokio::test]
    async fn killer_leaving_after_every_other_guess_is_reported_and_recoverable() {
        let store = MemoryGameStore::new();
        let id = seed(&store, &["a", "b", "c"]).await;
        let state = state_with(Arc::new(store.clone()), 8).await;
        assign_roles(&state, id).await.unwrap();

        let game = stored(&store, id).await;
        let killer = game.killer_id().cloned().unwrap();
        for player in game.players.iter().filter(|p| p.id != killer) {
            submit_guess(&state, id, guess(&player.id, &killer))
                .await
                .unwrap();
        }

        let mut rx = state.game_hubs().subscribe(id);
        let err = leave_roster(&state, id, &killer).await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Round(RoundError::CorruptState(_))
        ));
        match rx.recv().await.unwrap() {
            GameNotification::Updated(seen) => assert!(!seen.is_on_roster(&killer)),
            GameNotification::Deleted => panic!("unexpected deletion"),
        }

        let stuck = stored(&store, id).await;
        assert_eq!(stuck.status, GameStatus::InRound);
        assert!(stuck.roles.values().all(|r| r.guess.is_some()));

        assign_roles(&state, id).await.unwrap();
        let recovered = stored(&store, id).await;
        assert!(recovered.killer_id().is_some());
        assert!(recovered.roles.values().all(|r| r.guess.is_none()));
    }

    #[tokio::test]
    async fn commits_are_broadcast_but_no_ops_are_not() {
        let store = MemoryGameStore::new();
        let id = seed(&store, &["a"]).await;
        let state = state_with(Arc::new(store.clone()), 8).await;
        let mut rx = state.game_hubs().subscribe(id);

        let join = || JoinRequest {
            player_id: "b".into(),
            display_name: "B".into(),
        };
        join_roster(&state, id, join()).await.unwrap();
        match rx.recv().await.unwrap() {
            GameNotification::Updated(game) => assert_eq!(game.players.len(), 2),
            GameNotification::Deleted => panic!("unexpected deletion"),
        }

        join_roster(&state, id, join()).await.unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn unknown_game_is_not_found() {
        let store = MemoryGameStore::new();
        let state = state_with(Arc::new(store), 8).await;
        assert!(matches!(
            assign_roles(&state, Uuid::new_v4()).await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn degraded_state_rejects_intents() {
        let state = AppState::new(AppConfig::default());
        assert!(matches!(
            start_new_round(&state, Uuid::new_v4()).await,
            Err(ServiceError::Degraded)
        ));
    }

    #[tokio::test]
    async fn new_game_after_decided_round_zeroes_points() {
        let store = MemoryGameStore::new();
        let id = seed(&store, &["a", "b"]).await;
        let state = state_with(Arc::new(store.clone()), 8).await;

        let mut game = stored(&store, id).await;
        game.status = GameStatus::RoundOver;
        game.round = 3;
        game.roles
            .insert("a".into(), RoleAssignment::new(Role::Killer, 4));
        game.roles
            .insert("b".into(), RoleAssignment::new(Role::Player, 2));
        let revision = store.find_game(id).await.unwrap().unwrap().revision;
        store.compare_and_swap(revision, game.into()).await.unwrap();

        let view = start_new_game(&state, id).await.unwrap();
        assert_eq!(view.round, 1);
        assert!(view.players.iter().all(|player| player.points == 0));
    }
}
