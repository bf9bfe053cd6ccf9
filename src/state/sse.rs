use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::state::game::Game;

/// Message fanned out to the subscribers of one game.
#[derive(Debug, Clone)]
pub enum GameNotification {
    /// A change was committed; carries the whole game as stored.
    Updated(Arc<Game>),
    /// The game record was removed from the directory.
    Deleted,
}

/// Per-game broadcast channels, created on first subscription.
pub struct GameHubs {
    capacity: usize,
    channels: DashMap<Uuid, Channel>,
}

struct Channel {
    sender: broadcast::Sender<GameNotification>,
    /// Store generation of the newest state sent so far.
    latest: Option<u64>,
}

impl GameHubs {
    /// Channels created by this registry buffer `capacity` notifications per subscriber.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            channels: DashMap::new(),
        }
    }

    /// Register a subscriber for `game_id`, creating its channel if needed.
    pub fn subscribe(&self, game_id: Uuid) -> broadcast::Receiver<GameNotification> {
        self.channels
            .entry(game_id)
            .or_insert_with(|| Channel {
                sender: broadcast::channel(self.capacity).0,
                latest: None,
            })
            .sender
            .subscribe()
    }

    /// Deliver a committed state to the current subscribers of its game.
    ///
    /// `generation` is the store revision number of the commit. A state whose
    /// generation is below one already delivered is dropped, so subscribers
    /// never go back in time when two commits publish out of order. States
    /// without a generation are always sent. Channels nobody listens to
    /// anymore are dropped too.
    pub fn publish(&self, game: Arc<Game>, generation: Option<u64>) {
        let game_id = game.id;
        let delivered = match self.channels.get_mut(&game_id) {
            Some(mut channel) => {
                if let Some(generation) = generation {
                    if channel.latest.is_some_and(|latest| latest > generation) {
                        return;
                    }
                    channel.latest = Some(generation);
                }
                channel.sender.send(GameNotification::Updated(game)).is_ok()
            }
            None => return,
        };

        if !delivered {
            self.channels
                .remove_if(&game_id, |_, channel| channel.sender.receiver_count() == 0);
        }
    }

    /// Announce the deletion of `game_id` and forget its channel.
    pub fn close(&self, game_id: Uuid) {
        if let Some((_, channel)) = self.channels.remove(&game_id) {
            let _ = channel.sender.send(GameNotification::Deleted);
        }
    }

    #[cfg(test)]
    fn has_channel(&self, game_id: Uuid) -> bool {
        self.channels.contains_key(&game_id)
    }
}
