//! Per-player outbound channels and the fan-out of bundles after each
//! world operation.

use crossbeam_channel::{Receiver, Sender};
use spooky_common::ObjectId;
use spooky_kernel::{Bundle, World, WorldEvent};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

struct Outbox {
    sender: Sender<Bundle>,
    /// Index of the first shared-log line this player has not been sent.
    log_cursor: usize,
}

#[derive(Default)]
pub(crate) struct SessionHub {
    outboxes: BTreeMap<ObjectId, Outbox>,
}

impl SessionHub {
    /// Open a channel for `name`. Log lines written before now are not
    /// replayed.
    pub fn open(&mut self, name: ObjectId, log_len: usize) -> Receiver<Bundle> {
        let (sender, receiver) = crossbeam_channel::unbounded();
        self.outboxes.insert(
            name,
            Outbox {
                sender,
                log_cursor: log_len,
            },
        );
        receiver
    }

    pub fn close(&mut self, name: &str) {
        self.outboxes.remove(name);
    }

    pub fn len(&self) -> usize {
        self.outboxes.len()
    }

    /// Send fresh bundles to every player affected by `events`. `actor`, the
    /// player whose request produced them, always gets one.
    pub fn publish(&mut self, world: &World, events: &[WorldEvent], actor: Option<&str>) {
        let mut messages: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        let mut named: BTreeSet<&str> = BTreeSet::new();
        let mut areas: BTreeSet<&str> = BTreeSet::new();
        let mut log_grew = false;

        for event in events {
            areas.extend(event.areas());
            match event {
                WorldEvent::Notice { player, text } => {
                    messages.entry(player.as_str()).or_default().push(text.as_str());
                }
                WorldEvent::Logged { .. } => log_grew = true,
                WorldEvent::PlayerJoined { player, .. }
                | WorldEvent::ItemPickedUp { player, .. }
                | WorldEvent::ItemDropped { player, .. }
                | WorldEvent::Caught { player, .. } => {
                    named.insert(player.as_str());
                }
                WorldEvent::Turned { mover, .. }
                | WorldEvent::Stepped { mover, .. }
                | WorldEvent::Pushed { mover, .. }
                | WorldEvent::RoomChanged { mover, .. } => {
                    named.insert(mover.as_str());
                }
                WorldEvent::PlayerLeft { .. }
                | WorldEvent::DoorChanged { .. }
                | WorldEvent::Ticked { .. } => {}
            }
        }
        named.extend(actor);

        let log_len = world.log().len();
        let mut closed = Vec::new();
        for (name, outbox) in &mut self.outboxes {
            let Some(player) = world.player(name.as_str()) else {
                continue;
            };
            let message = messages.get(name.as_str()).map(|m| m.join("\n"));
            let dirty = log_grew
                || message.is_some()
                || named.contains(name.as_str())
                || areas.contains(player.location.area.as_str());
            if !dirty {
                continue;
            }
            let Some(bundle) = world.bundle_for(name.as_str(), message, outbox.log_cursor) else {
                continue;
            };
            if outbox.sender.send(bundle).is_err() {
                debug!(player = %name, "session receiver dropped");
                closed.push(name.clone());
                continue;
            }
            outbox.log_cursor = log_len;
        }
        for name in closed {
            self.outboxes.remove(&name);
        }
    }
}
