use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::sync::{
    broadcast::{self, error::RecvError},
    mpsc,
};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dto::{
        game::GameView,
        sse::{GAME_DELETED_EVENT, GAME_STATE_EVENT, ServerEvent},
    },
    error::ServiceError,
    services::room_service,
    state::{GameNotification, SharedState, game::Game},
};

/// Subscribe to a game's changes and capture its current state.
///
/// The subscription is taken before the read so that no commit can slip in
/// between the snapshot and the first notification.
pub async fn subscribe_game(
    state: &SharedState,
    game_id: Uuid,
) -> Result<(broadcast::Receiver<GameNotification>, Game), ServiceError> {
    let receiver = state.game_hubs().subscribe(game_id);
    let game = room_service::load_game(state, game_id).await?;
    Ok((receiver, game))
}

fn game_state_event(game: &Game, viewer: Option<&str>) -> Option<ServerEvent> {
    match ServerEvent::json(
        GAME_STATE_EVENT.to_string(),
        &GameView::for_viewer(game, viewer),
    ) {
        Ok(event) => Some(event),
        Err(err) => {
            warn!(game_id = %game.id, error = %err, "failed to serialise game state");
            None
        }
    }
}

fn to_event(payload: ServerEvent) -> Event {
    let event = Event::default().data(payload.data);
    match payload.event {
        Some(name) => event.event(name),
        None => event,
    }
}

/// Turn a game subscription into an SSE response: the current state first,
/// then the full state after every commit, masked for `viewer`.
pub fn to_sse_stream(
    mut receiver: broadcast::Receiver<GameNotification>,
    initial: Game,
    viewer: Option<String>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // small bounded channel between forwarder and response
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);
    let game_id = initial.id;

    // forwarder task: reads from broadcast and pushes into mpsc
    tokio::spawn(async move {
        if let Some(event) = game_state_event(&initial, viewer.as_deref()) {
            if tx.send(Ok(to_event(event))).await.is_err() {
                return;
            }
        }
        drop(initial);

        loop {
            tokio::select! {
                _ = tx.closed() => break,
                recv_result = receiver.recv() => {
                    let payload = match recv_result {
                        Ok(GameNotification::Updated(game)) => {
                            match game_state_event(&game, viewer.as_deref()) {
                                Some(event) => event,
                                None => continue,
                            }
                        }
                        Ok(GameNotification::Deleted) => {
                            let _ = tx
                                .send(Ok(Event::default().event(GAME_DELETED_EVENT).data(game_id.to_string())))
                                .await;
                            break;
                        }
                        Err(RecvError::Closed) => break,
                        Err(RecvError::Lagged(skipped)) => {
                            // The next notification carries the whole state anyway.
                            debug!(%game_id, skipped, "SSE subscriber lagged");
                            continue;
                        }
                    };

                    if tx.send(Ok(to_event(payload))).await.is_err() {
                        break;
                    }
                }
            }
        }

        info!(%game_id, "game SSE stream disconnected");
    });

    // response stream reads from mpsc; when client disconnects axum drops this stream
    let stream = ReceiverStream::new(rx);
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}
