//! The concurrency gate. Every operation that touches the world takes one
//! lock for its whole duration, bundle fan-out included.

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use spooky_common::{Direction, ObjectId};
use spooky_kernel::{
    ActionOutcome, Bundle, Catch, DropOutcome, Player, World, WorldError, WorldSummary,
};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info};

use crate::command::Command;
use crate::config::ServerConfig;
use crate::hub::SessionHub;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("world invariant violated: {0}")]
    World(#[from] WorldError),
    #[error("failed to start the NPC ticker: {0}")]
    Spawn(#[source] std::io::Error),
}

struct Shared {
    world: World,
    hub: SessionHub,
}

/// A joined player's handle: their name and the bundles sent to them.
#[derive(Debug)]
pub struct Session {
    name: ObjectId,
    bundles: Receiver<Bundle>,
}

impl Session {
    pub fn name(&self) -> &ObjectId {
        &self.name
    }

    pub fn bundles(&self) -> &Receiver<Bundle> {
        &self.bundles
    }

    /// Everything delivered so far, without blocking.
    pub fn drain(&self) -> Vec<Bundle> {
        self.bundles.try_iter().collect()
    }
}

/// Shared handle to one running world. Cheap to clone; every clone talks to
/// the same world.
#[derive(Clone)]
pub struct GameServer {
    shared: Arc<Mutex<Shared>>,
    config: ServerConfig,
}

impl GameServer {
    pub fn new(world: World, config: ServerConfig) -> Self {
        Self {
            shared: Arc::new(Mutex::new(Shared {
                world,
                hub: SessionHub::default(),
            })),
            config,
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Run `op` under the lock, then publish whatever it changed. Errors are
    /// logged here and handed back; partial changes are still published.
    fn run<T>(
        &self,
        op: &'static str,
        actor: Option<&str>,
        f: impl FnOnce(&mut World) -> Result<T, WorldError>,
    ) -> Result<T, ServerError> {
        let mut guard = self.shared.lock();
        let Shared { world, hub } = &mut *guard;
        let result = f(world);
        let events = world.drain_events();
        hub.publish(world, &events, actor);
        result.map_err(|err| {
            error!(op, player = actor.unwrap_or("-"), %err, "operation aborted");
            ServerError::World(err)
        })
    }

    /// Join `name` and open their bundle channel. `None` when the game is
    /// full or the name is taken.
    pub fn connect(&self, name: &str) -> Result<Option<Session>, ServerError> {
        let mut guard = self.shared.lock();
        let Shared { world, hub } = &mut *guard;
        let log_before = world.log().len();
        let joined = match world.add_player(name) {
            Ok(joined) => joined,
            Err(err) => {
                world.drain_events();
                error!(op = "connect", player = name, %err, "operation aborted");
                return Err(err.into());
            }
        };
        if !joined {
            debug!(player = name, "connect refused");
            return Ok(None);
        }
        let id = ObjectId::from(name);
        let bundles = hub.open(id.clone(), log_before);
        let events = world.drain_events();
        hub.publish(world, &events, Some(name));
        Ok(Some(Session { name: id, bundles }))
    }

    /// Leave the game. Unknown names are ignored.
    pub fn disconnect(&self, name: &str) -> Result<(), ServerError> {
        let mut guard = self.shared.lock();
        let Shared { world, hub } = &mut *guard;
        hub.close(name);
        let result = world.remove_player(name);
        let events = world.drain_events();
        hub.publish(world, &events, None);
        result.map_err(|err| {
            error!(op = "disconnect", player = name, %err, "operation aborted");
            err.into()
        })
    }

    /// Returns whether the player turned or moved.
    pub fn move_player(&self, name: &str, direction: Direction) -> Result<bool, ServerError> {
        self.run("move", Some(name), |w| {
            Ok(w.move_player(name, direction)?.changed())
        })
    }

    pub fn process_action(&self, name: &str) -> Result<ActionOutcome, ServerError> {
        self.run("action", Some(name), |w| w.process_action(name))
    }

    pub fn process_drop(&self, name: &str, item: &str) -> Result<DropOutcome, ServerError> {
        self.run("drop", Some(name), |w| w.process_drop(name, item))
    }

    pub fn chat(&self, name: &str, text: &str) -> Result<(), ServerError> {
        self.run("chat", Some(name), |w| w.chat(name, text))
    }

    /// Dispatch a decoded client command.
    pub fn handle(&self, name: &str, command: Command) -> Result<(), ServerError> {
        match command {
            Command::Move(direction) => self.move_player(name, direction).map(drop),
            Command::Action => self.process_action(name).map(drop),
            Command::Drop(item) => self.process_drop(name, item.as_str()).map(drop),
            Command::Chat(text) => self.chat(name, &text),
            Command::Leave => self.disconnect(name),
        }
    }

    /// One NPC tick: patrol, then the detection sweep.
    pub fn tick(&self) -> Result<Vec<Catch>, ServerError> {
        self.run("tick", None, World::tick_npcs)
    }

    /// A copy of the player's current state. Stale as soon as the lock is
    /// released.
    pub fn player_snapshot(&self, name: &str) -> Option<Player> {
        self.shared.lock().world.player(name).cloned()
    }

    pub fn summary(&self) -> WorldSummary {
        self.shared.lock().world.summary()
    }

    pub fn session_count(&self) -> usize {
        self.shared.lock().hub.len()
    }

    /// Run `f` against a consistent view of the world.
    pub fn with_world<T>(&self, f: impl FnOnce(&World) -> T) -> T {
        f(&self.shared.lock().world)
    }

    /// Start the background NPC ticker at the configured interval.
    pub fn start_ticker(&self) -> Result<Ticker, ServerError> {
        let server = self.clone();
        let interval = self.config.tick_interval();
        let (shutdown, stop) = crossbeam_channel::bounded::<()>(1);
        let handle = thread::Builder::new()
            .name("npc-ticker".into())
            .spawn(move || {
                let ticks = crossbeam_channel::tick(interval);
                info!(interval_ms = interval.as_millis() as u64, "npc ticker started");
                loop {
                    crossbeam_channel::select! {
                        recv(ticks) -> _ => {
                            // Already logged by the gate; the next tick retries.
                            let _ = server.tick();
                        }
                        recv(stop) -> _ => break,
                    }
                }
                info!("npc ticker stopped");
            })
            .map_err(ServerError::Spawn)?;
        Ok(Ticker {
            shutdown: Some(shutdown),
            handle: Some(handle),
        })
    }
}

/// Handle to the background NPC ticker. Stops the thread when dropped.
pub struct Ticker {
    shutdown: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Ticker {
    /// Stop ticking and wait for the thread to finish its current tick.
    pub fn stop(mut self) {
        self.shutdown_and_join();
    }

    fn shutdown_and_join(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.try_send(());
        }
        match self.handle.take().map(JoinHandle::join) {
            Some(Err(_)) => error!("npc ticker panicked"),
            Some(Ok(())) | None => {}
        }
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.shutdown_and_join();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spooky_common::Position;
    use spooky_kernel::{Grid, Item, Location, Npc, Rules};

    fn server() -> GameServer {
        let mut w = World::new(Rules {
            max_players: 2,
            ..Rules::default()
        });
        for name in ["Spawn_1", "Spawn_2", "Hall"] {
            w.add_area(name, Grid::floor(10, 10).unwrap()).unwrap();
        }
        w.add_item(Item {
            id: "lamp".into(),
            name: "Lamp".into(),
            size: 1,
            token: "item".into(),
            description: String::new(),
            location: None,
            home: Location::new("Spawn_1", Position::new(5, 9)),
        })
        .unwrap();
        w.drain_events();
        GameServer::new(w, ServerConfig::default())
    }

    #[test]
    fn connect_opens_a_session_until_full() {
        let s = server();
        let ann = s.connect("ann").unwrap().unwrap();
        assert_eq!(ann.name().as_str(), "ann");
        let first = ann.drain();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].log, ["ann entered the game."]);

        assert!(s.connect("ann").unwrap().is_none());
        let _bob = s.connect("bob").unwrap().unwrap();
        assert!(s.connect("cat").unwrap().is_none());
        assert_eq!(s.session_count(), 2);
        assert_eq!(ann.drain()[0].log, ["bob entered the game."]);
    }

    #[test]
    fn unknown_player_is_an_error() {
        let s = server();
        let err = s.move_player("ghost", Direction::North).unwrap_err();
        assert!(matches!(err, ServerError::World(WorldError::UnknownPlayer(_))));
        assert!(s.process_action("ghost").is_err());
    }

    #[test]
    fn move_turns_then_steps() {
        let s = server();
        let ann = s.connect("ann").unwrap().unwrap();
        ann.drain();
        assert!(s.move_player("ann", Direction::North).unwrap());
        assert!(s.move_player("ann", Direction::North).unwrap());
        let snap = s.player_snapshot("ann").unwrap();
        assert_eq!(snap.location.position, Position::new(5, 7));
        assert_eq!(ann.drain().len(), 2);
    }

    #[test]
    fn commands_dispatch_through_the_gate() {
        let s = server();
        let ann = s.connect("ann").unwrap().unwrap();
        s.handle("ann", Command::Action).unwrap();
        assert!(s.player_snapshot("ann").unwrap().holds("lamp"));
        s.handle("ann", Command::Chat("boo".into())).unwrap();
        s.handle("ann", Command::Drop("lamp".into())).unwrap();
        assert!(!s.player_snapshot("ann").unwrap().holds("lamp"));

        let bundles = ann.drain();
        let messages: Vec<_> = bundles.iter().filter_map(|b| b.message.as_deref()).collect();
        assert!(messages.contains(&"You picked up Lamp."));
        assert!(messages.contains(&"You dropped Lamp."));
        assert!(bundles.iter().any(|b| b.log == ["ann: boo"]));

        s.handle("ann", Command::Leave).unwrap();
        assert!(s.player_snapshot("ann").is_none());
        assert_eq!(s.session_count(), 0);
    }

    #[test]
    fn leave_is_broadcast_and_frees_the_slot() {
        let s = server();
        let ann = s.connect("ann").unwrap().unwrap();
        let _bob = s.connect("bob").unwrap().unwrap();
        ann.drain();
        s.disconnect("bob").unwrap();
        assert_eq!(ann.drain()[0].log, ["bob left the game."]);
        assert!(s.connect("cat").unwrap().is_some());
        s.disconnect("nobody").unwrap();
    }

    #[test]
    fn tick_reaches_players_who_are_caught() {
        let s = server();
        let ann = s.connect("ann").unwrap().unwrap();
        s.with_world(|w| assert_eq!(w.tick(), 0));
        {
            let mut guard = s.shared.lock();
            guard
                .world
                .add_npc(Npc::new(
                    "ghost".into(),
                    Location::new("Spawn_1", Position::new(5, 5)),
                    vec![Direction::South],
                ))
                .unwrap();
        }
        ann.drain();
        let catches = s.tick().unwrap();
        assert_eq!(catches.len(), 1);
        let bundle = ann.drain().pop().unwrap();
        assert_eq!(
            bundle.message.as_deref(),
            Some("You were caught by ghost! Back to your room.")
        );
        assert_eq!(s.summary().tick, 1);
    }

    #[test]
    fn ticker_runs_until_stopped() {
        let s = GameServer::new(
            server().with_world(World::clone),
            ServerConfig {
                tick_interval_ms: 5,
                ..ServerConfig::default()
            },
        );
        let ticker = s.start_ticker().unwrap();
        while s.summary().tick < 3 {
            thread::yield_now();
        }
        ticker.stop();
        let stopped_at = s.summary().tick;
        thread::sleep(std::time::Duration::from_millis(30));
        assert_eq!(s.summary().tick, stopped_at);
    }
}
