//! Asynchronous events delivered to sessions.
//!
//! Every session runs an event producer that merges the server-wide broadcast bus with its own
//! ambient tick, and forwards into a bounded per-session queue. Forwarding never waits: when the
//! queue is full the event is dropped and counted.

use std::time::Duration;

use log::{debug, warn};
use rand::seq::SliceRandom;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

use crate::metrics;
use crate::world::{Direction, Id};

const BUS_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorldEvent {
    Arrived {
        character: Id,
        name: String,
        room: Id,
        /// Direction the character came from, seen from the new room.
        from: Option<Direction>,
    },
    Departed {
        character: Id,
        name: String,
        room: Id,
        toward: Option<Direction>,
    },
    Said {
        character: Id,
        name: String,
        room: Id,
        text: String,
    },
    /// Shown to everyone.
    Announcement { text: String },
    /// Session-local ambient text.
    Tick { text: String },
}

impl WorldEvent {
    /// Text shown to `viewer` standing in `room`, or `None` when the event is not theirs to see.
    /// Characters never see their own comings and goings.
    pub fn render_for(&self, viewer: Id, room: Id) -> Option<String> {
        match self {
            WorldEvent::Arrived {
                character,
                name,
                room: at,
                from,
            } if *at == room && *character != viewer => Some(match from {
                Some(direction) => format!("{} arrives from the {}.", name, direction.name()),
                None => format!("{} has arrived.", name),
            }),
            WorldEvent::Departed {
                character,
                name,
                room: at,
                toward,
            } if *at == room && *character != viewer => Some(match toward {
                Some(direction) => format!("{} leaves {}.", name, direction.name()),
                None => format!("{} has left.", name),
            }),
            WorldEvent::Said {
                character,
                name,
                room: at,
                text,
            } if *at == room && *character != viewer => Some(format!("{} says, \"{}\"", name, text)),
            WorldEvent::Announcement { text } | WorldEvent::Tick { text } => Some(text.clone()),
            _ => None,
        }
    }
}

/// Server-wide fan-out of [`WorldEvent`]s.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<WorldEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(BUS_CAPACITY);
        Self { sender }
    }

    /// Publish to every subscribed session. Having no subscribers is not an error.
    pub fn publish(&self, event: WorldEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WorldEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Ambient tick configuration for one session.
#[derive(Debug, Clone)]
pub struct TickSource {
    pub period: Duration,
    pub messages: Vec<String>,
}

fn pick_tick_message(messages: &[String]) -> Option<String> {
    messages.choose(&mut rand::thread_rng()).cloned()
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}

/// Returns false once the session side has gone away.
fn forward(queue: &mpsc::Sender<WorldEvent>, event: WorldEvent) -> bool {
    match queue.try_send(event) {
        Ok(()) => {
            metrics::inc_events_delivered();
            true
        }
        Err(TrySendError::Full(event)) => {
            debug!("session event queue full; dropping {:?}", event);
            metrics::add_events_dropped(1);
            true
        }
        Err(TrySendError::Closed(_)) => false,
    }
}

/// Merge the world bus and the optional tick into `queue` until the session ends.
pub async fn run_event_producer(
    mut world: broadcast::Receiver<WorldEvent>,
    queue: mpsc::Sender<WorldEvent>,
    tick: Option<TickSource>,
) {
    let messages = tick
        .as_ref()
        .map(|t| t.messages.clone())
        .unwrap_or_default();
    let mut ticker = tick.map(|t| {
        let mut ticker = interval_at(Instant::now() + t.period, t.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        ticker
    });

    loop {
        tokio::select! {
            _ = queue.closed() => break,
            _ = next_tick(&mut ticker) => {
                if let Some(text) = pick_tick_message(&messages) {
                    if !forward(&queue, WorldEvent::Tick { text }) {
                        break;
                    }
                }
            }
            received = world.recv() => match received {
                Ok(event) => {
                    if !forward(&queue, event) {
                        break;
                    }
                }
                Err(RecvError::Lagged(missed)) => {
                    warn!("session lagged behind the world bus; {} events dropped", missed);
                    metrics::add_events_dropped(missed);
                }
                Err(RecvError::Closed) => break,
            },
        }
    }
}
