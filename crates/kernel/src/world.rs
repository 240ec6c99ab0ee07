use serde::{Deserialize, Serialize};
use spooky_common::{Direction, ObjectId, Position};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::area::{Area, Areas};
use crate::grid::{Grid, GridError, TileKind};
use crate::object::{Door, Fixture, Item, Location, Movable, Npc, Occupant, Player};
use crate::rules::Rules;

/// An event record produced by every mutation to the world.
///
/// The server drains these after each operation to decide which players need
/// a fresh bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WorldEvent {
    PlayerJoined {
        player: ObjectId,
        area: String,
    },
    PlayerLeft {
        player: ObjectId,
        area: String,
    },
    Turned {
        mover: ObjectId,
        area: String,
        facing: Direction,
    },
    Stepped {
        mover: ObjectId,
        area: String,
        from: Position,
        to: Position,
    },
    Pushed {
        mover: ObjectId,
        movable: ObjectId,
        area: String,
        to: Position,
    },
    /// A mover went through a door into another area.
    RoomChanged {
        mover: ObjectId,
        from: String,
        to: String,
    },
    ItemPickedUp {
        player: ObjectId,
        item: ObjectId,
        area: String,
    },
    ItemDropped {
        player: ObjectId,
        item: ObjectId,
        area: String,
        position: Position,
    },
    DoorChanged {
        door: ObjectId,
        open: bool,
        locked: bool,
        areas: [String; 2],
    },
    /// An NPC spotted a player and sent them home.
    Caught {
        player: ObjectId,
        npc: ObjectId,
        from: String,
        to: String,
    },
    /// One-shot informational message for a single player.
    Notice {
        player: ObjectId,
        text: String,
    },
    /// A line was appended to the shared log.
    Logged {
        line: String,
    },
    Ticked {
        tick: u64,
    },
}

impl WorldEvent {
    /// Areas whose visible contents changed.
    pub fn areas(&self) -> Vec<&str> {
        match self {
            WorldEvent::PlayerJoined { area, .. }
            | WorldEvent::PlayerLeft { area, .. }
            | WorldEvent::Turned { area, .. }
            | WorldEvent::Stepped { area, .. }
            | WorldEvent::Pushed { area, .. }
            | WorldEvent::ItemPickedUp { area, .. }
            | WorldEvent::ItemDropped { area, .. } => vec![area.as_str()],
            WorldEvent::RoomChanged { from, to, .. } | WorldEvent::Caught { from, to, .. } => {
                vec![from.as_str(), to.as_str()]
            }
            WorldEvent::DoorChanged { areas, .. } => areas.iter().map(String::as_str).collect(),
            WorldEvent::Notice { .. } | WorldEvent::Logged { .. } | WorldEvent::Ticked { .. } => {
                Vec::new()
            }
        }
    }
}

/// Invariant violations and world-construction errors.
///
/// Expected gameplay refusals (walking into a wall, a locked door) are never
/// errors; they come back as outcome values.
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    #[error("no unowned spawn area is available")]
    NoSpawnAvailable,
    #[error("player {0:?} is not in the game")]
    UnknownPlayer(String),
    #[error("area {0:?} does not exist")]
    UnknownArea(String),
    #[error("area {0:?} already exists")]
    DuplicateArea(String),
    #[error("object id {0} is already in use")]
    DuplicateObject(ObjectId),
    #[error("area {0:?} is not a spawn area and cannot be owned")]
    NotSpawnArea(String),
    #[error("{0} is not a floor tile")]
    NotFloor(Location),
    #[error("{0} is not a wall tile")]
    NotWall(Location),
    #[error("{0} is already occupied")]
    Occupied(Location),
    #[error("grid refused change in area {area:?}: {source}")]
    Grid {
        area: String,
        #[source]
        source: GridError,
    },
    #[error("world state is inconsistent: {0}")]
    Inconsistent(String),
}

/// The authoritative world state.
///
/// All mutations go through explicit operations and are recorded in the event
/// log. Callers serialize access; nothing in here locks.
#[derive(Debug, Clone, Default)]
pub struct World {
    pub(crate) rules: Rules,
    pub(crate) areas: Areas,
    pub(crate) players: Vec<Player>,
    pub(crate) npcs: Vec<Npc>,
    pub(crate) doors: BTreeMap<ObjectId, Door>,
    pub(crate) movables: BTreeMap<ObjectId, Movable>,
    pub(crate) items: BTreeMap<ObjectId, Item>,
    pub(crate) fixtures: BTreeMap<ObjectId, Fixture>,
    /// Shared, append-only log of game announcements and chat.
    log: Vec<String>,
    tick: u64,
    event_log: Vec<WorldEvent>,
}

impl World {
    pub fn new(rules: Rules) -> Self {
        Self {
            rules,
            ..Default::default()
        }
    }

    pub fn rules(&self) -> &Rules {
        &self.rules
    }

    /// Number of NPC ticks run so far.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub(crate) fn advance_tick(&mut self) {
        self.tick += 1;
        self.event_log.push(WorldEvent::Ticked { tick: self.tick });
    }

    pub fn areas(&self) -> &Areas {
        &self.areas
    }

    pub fn area(&self, name: &str) -> Option<&Area> {
        self.areas.get(name)
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    /// Linear lookup by name. `None` is normal for names not (or no longer)
    /// joined.
    pub fn player(&self, name: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.name.as_str() == name)
    }

    pub(crate) fn player_mut(&mut self, name: &str) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.name.as_str() == name)
    }

    pub(crate) fn require_player(&self, name: &str) -> Result<&Player, WorldError> {
        self.player(name)
            .ok_or_else(|| WorldError::UnknownPlayer(name.to_string()))
    }

    pub fn npcs(&self) -> &[Npc] {
        &self.npcs
    }

    pub fn npc(&self, id: &str) -> Option<&Npc> {
        self.npcs.iter().find(|n| n.id.as_str() == id)
    }

    pub fn doors(&self) -> impl Iterator<Item = &Door> {
        self.doors.values()
    }

    pub fn movables(&self) -> impl Iterator<Item = &Movable> {
        self.movables.values()
    }

    pub fn items(&self) -> impl Iterator<Item = &Item> {
        self.items.values()
    }

    pub fn fixtures(&self) -> impl Iterator<Item = &Fixture> {
        self.fixtures.values()
    }

    pub fn door(&self, id: &str) -> Option<&Door> {
        self.doors.get(id)
    }

    pub fn movable(&self, id: &str) -> Option<&Movable> {
        self.movables.get(id)
    }

    pub fn item(&self, id: &str) -> Option<&Item> {
        self.items.get(id)
    }

    pub fn fixture(&self, id: &str) -> Option<&Fixture> {
        self.fixtures.get(id)
    }

    pub fn log(&self) -> &[String] {
        &self.log
    }

    /// Drain and return the event log.
    pub fn drain_events(&mut self) -> Vec<WorldEvent> {
        std::mem::take(&mut self.event_log)
    }

    /// Read-only access to the event log.
    pub fn events(&self) -> &[WorldEvent] {
        &self.event_log
    }

    pub(crate) fn record(&mut self, event: WorldEvent) {
        self.event_log.push(event);
    }

    pub(crate) fn push_log(&mut self, line: String) {
        self.log.push(line.clone());
        self.event_log.push(WorldEvent::Logged { line });
    }

    pub(crate) fn notify(&mut self, player: &ObjectId, text: impl Into<String>) {
        self.event_log.push(WorldEvent::Notice {
            player: player.clone(),
            text: text.into(),
        });
    }

    // --- Construction (used by the world loader) ---

    pub fn add_area(&mut self, name: impl Into<String>, grid: Grid) -> Result<(), WorldError> {
        self.areas.insert(Area::new(name, grid))
    }

    fn id_in_use(&self, id: &ObjectId) -> bool {
        self.doors.contains_key(id)
            || self.movables.contains_key(id)
            || self.items.contains_key(id)
            || self.fixtures.contains_key(id)
            || self.npcs.iter().any(|n| &n.id == id)
    }

    fn claim_id(&self, id: &ObjectId) -> Result<(), WorldError> {
        if self.id_in_use(id) {
            return Err(WorldError::DuplicateObject(id.clone()));
        }
        Ok(())
    }

    /// Put a freshly loaded object on a free floor tile.
    fn place_new(&mut self, location: &Location, occupant: Occupant) -> Result<(), WorldError> {
        let grid = self.grid_mut(&location.area)?;
        let state = grid
            .get(location.position)
            .map(|t| (t.is_floor(), t.is_occupied()));
        match state {
            None => Err(WorldError::Grid {
                area: location.area.clone(),
                source: GridError::OutOfBounds(location.position),
            }),
            Some((false, _)) => Err(WorldError::NotFloor(location.clone())),
            Some((true, true)) => Err(WorldError::Occupied(location.clone())),
            Some((true, false)) => set_occupant(grid, location, occupant),
        }
    }

    pub fn add_door(&mut self, door: Door) -> Result<(), WorldError> {
        self.claim_id(&door.id)?;
        for side in [&door.side_a, &door.side_b] {
            let area = self
                .areas
                .get(&side.area)
                .ok_or_else(|| WorldError::UnknownArea(side.area.clone()))?;
            let door_loc = Location::new(side.area.clone(), side.door);
            match area.grid().get(side.door) {
                Some(tile) if tile.kind() == TileKind::Wall => {
                    if tile.is_occupied() {
                        return Err(WorldError::Occupied(door_loc));
                    }
                }
                _ => return Err(WorldError::NotWall(door_loc)),
            }
            let entry_loc = Location::new(side.area.clone(), side.entry);
            if !area.grid().get(side.entry).is_some_and(|t| t.is_floor()) {
                return Err(WorldError::NotFloor(entry_loc));
            }
        }
        if door.side_a.area == door.side_b.area && door.side_a.door == door.side_b.door {
            return Err(WorldError::Inconsistent(format!(
                "door {} uses the same tile for both sides",
                door.id
            )));
        }
        for side in [&door.side_a, &door.side_b] {
            let loc = Location::new(side.area.clone(), side.door);
            let grid = self.grid_mut(&side.area)?;
            set_occupant(grid, &loc, Occupant::Door(door.id.clone()))?;
        }
        self.doors.insert(door.id.clone(), door);
        Ok(())
    }

    pub fn add_movable(&mut self, movable: Movable) -> Result<(), WorldError> {
        self.claim_id(&movable.id)?;
        self.place_new(&movable.location, Occupant::Movable(movable.id.clone()))?;
        self.movables.insert(movable.id.clone(), movable);
        Ok(())
    }

    pub fn add_npc(&mut self, npc: Npc) -> Result<(), WorldError> {
        self.claim_id(&npc.id)?;
        self.place_new(&npc.location, Occupant::Npc(npc.id.clone()))?;
        self.npcs.push(npc);
        Ok(())
    }

    /// Register an item. It is placed at its home location.
    pub fn add_item(&mut self, mut item: Item) -> Result<(), WorldError> {
        self.claim_id(&item.id)?;
        self.place_new(&item.home, Occupant::Item(item.id.clone()))?;
        item.location = Some(item.home.clone());
        self.items.insert(item.id.clone(), item);
        Ok(())
    }

    pub fn add_fixture(&mut self, fixture: Fixture) -> Result<(), WorldError> {
        self.claim_id(&fixture.id)?;
        self.place_new(&fixture.location, Occupant::Fixture(fixture.id.clone()))?;
        self.fixtures.insert(fixture.id.clone(), fixture);
        Ok(())
    }

    // --- Player registry ---

    /// Join a player. Returns `Ok(false)` when the game is full, the name is
    /// taken, or the name is blank.
    pub fn add_player(&mut self, name: &str) -> Result<bool, WorldError> {
        if name.trim().is_empty() {
            return Ok(false);
        }
        if self.players.len() >= self.rules.max_players {
            debug!(player = name, "join refused: game full");
            return Ok(false);
        }
        if self.player(name).is_some() {
            debug!(player = name, "join refused: name taken");
            return Ok(false);
        }

        let marker = self.rules.spawn_marker.clone();
        let location = self.pick_spawn(&marker)?;
        let spawn = location.area.clone();
        let id = ObjectId::from(name);

        let grid = self.grid_mut(&spawn)?;
        set_occupant(grid, &location, Occupant::Player(id.clone()))?;
        self.areas
            .get_mut(&spawn)
            .ok_or_else(|| WorldError::UnknownArea(spawn.clone()))?
            .set_owner(Some(id.clone()), &marker)?;
        self.players
            .push(Player::new(id.clone(), spawn.clone(), location.position));

        info!(player = name, area = %spawn, "player joined");
        self.push_log(format!("{name} entered the game."));
        self.record(WorldEvent::PlayerJoined {
            player: id,
            area: spawn,
        });
        Ok(true)
    }

    /// Unowned spawn room for a new player. The default spawn tile is
    /// preferred; when every unowned room has it blocked, the first such room
    /// takes the player on its nearest free floor instead.
    fn pick_spawn(&self, marker: &str) -> Result<Location, WorldError> {
        let default = self.rules.default_spawn;
        if let Ok(area) = self.areas.find_unowned_spawn(marker, default) {
            return Ok(Location::new(area.name(), default));
        }
        self.areas
            .iter()
            .filter(|a| a.is_spawn(marker) && a.owner().is_none())
            .find_map(|a| {
                a.grid()
                    .nearest_free_floor(default)
                    .map(|pos| Location::new(a.name(), pos))
            })
            .ok_or(WorldError::NoSpawnAvailable)
    }

    /// Remove a player. Unknown names are ignored.
    ///
    /// Held items go back to their home tile, or onto the nearest free floor
    /// to where the player stood when home is taken.
    pub fn remove_player(&mut self, name: &str) -> Result<(), WorldError> {
        let Some(index) = self.players.iter().position(|p| p.name.as_str() == name) else {
            return Ok(());
        };
        let (id, location) = {
            let p = &self.players[index];
            (p.name.clone(), p.location.clone())
        };
        self.vacate(&Occupant::Player(id), &location)?;
        let player = self.players.remove(index);
        let marker = self.rules.spawn_marker.clone();

        let owned: Vec<String> = self
            .areas
            .iter()
            .filter(|a| a.owner() == Some(&player.name))
            .map(|a| a.name().to_string())
            .collect();
        for area in owned {
            if let Some(a) = self.areas.get_mut(&area) {
                a.set_owner(None, &marker)?;
            }
        }

        for item in &player.inventory {
            self.return_home(item, &player.location)?;
        }

        info!(player = name, "player left");
        self.push_log(format!("{name} left the game."));
        self.record(WorldEvent::PlayerLeft {
            player: player.name,
            area: player.location.area,
        });
        Ok(())
    }

    /// Put a dropped-out item back in the world: its home tile when free,
    /// otherwise the free floor nearest `fallback`, otherwise the free floor
    /// nearest home.
    fn return_home(&mut self, item_id: &ObjectId, fallback: &Location) -> Result<(), WorldError> {
        let home = self
            .items
            .get(item_id)
            .map(|i| i.home.clone())
            .ok_or_else(|| WorldError::Inconsistent(format!("unknown held item {item_id}")))?;
        let nearest = |world: &Self, at: &Location| {
            world
                .area(&at.area)
                .and_then(|a| a.grid().nearest_free_floor(at.position))
                .map(|pos| Location::new(at.area.clone(), pos))
        };
        let target = match nearest(self, &home) {
            Some(spot) if spot == home => spot,
            near_home => match nearest(self, fallback).or(near_home) {
                Some(spot) => {
                    debug!(item = %item_id, home = %home, to = %spot, "home tile taken");
                    spot
                }
                None => {
                    warn!(item = %item_id, home = %home, "no free floor, item leaves the world");
                    return Ok(());
                }
            },
        };
        self.occupy(&Occupant::Item(item_id.clone()), &target)
    }

    /// Append a chat line from `name` to the shared log.
    pub fn chat(&mut self, name: &str, text: &str) -> Result<(), WorldError> {
        self.require_player(name)?;
        let text = text.trim();
        if text.is_empty() {
            return Ok(());
        }
        self.push_log(format!("{name}: {text}"));
        Ok(())
    }

    // --- Occupancy helpers shared by movement, interaction and NPCs ---

    pub(crate) fn grid_mut(&mut self, area: &str) -> Result<&mut Grid, WorldError> {
        self.areas
            .get_mut(area)
            .map(Area::grid_mut)
            .ok_or_else(|| WorldError::UnknownArea(area.to_string()))
    }

    /// Current location of a single-tile object.
    pub(crate) fn location_of(&self, occupant: &Occupant) -> Option<Location> {
        let id = occupant.id().as_str();
        match occupant {
            Occupant::Player(_) => self.player(id).map(|p| p.location.clone()),
            Occupant::Npc(_) => self.npc(id).map(|n| n.location.clone()),
            Occupant::Movable(_) => self.movables.get(id).map(|m| m.location.clone()),
            Occupant::Item(_) => self.items.get(id).and_then(|i| i.location.clone()),
            Occupant::Fixture(_) => self.fixtures.get(id).map(|f| f.location.clone()),
            Occupant::Door(_) => None,
        }
    }

    fn set_location_of(&mut self, occupant: &Occupant, to: Location) -> Result<(), WorldError> {
        let id = occupant.id().as_str();
        let updated = match occupant {
            Occupant::Player(_) => self.player_mut(id).map(|p| p.location = to).is_some(),
            Occupant::Npc(_) => self
                .npcs
                .iter_mut()
                .find(|n| n.id.as_str() == id)
                .map(|n| n.location = to)
                .is_some(),
            Occupant::Movable(_) => self.movables.get_mut(id).map(|m| m.location = to).is_some(),
            Occupant::Item(_) => self.items.get_mut(id).map(|i| i.location = Some(to)).is_some(),
            Occupant::Fixture(_) | Occupant::Door(_) => false,
        };
        if !updated {
            return Err(WorldError::Inconsistent(format!(
                "{occupant} cannot be relocated"
            )));
        }
        Ok(())
    }

    /// Vacate `occupant`'s tile without placing it anywhere.
    pub(crate) fn vacate(&mut self, occupant: &Occupant, at: &Location) -> Result<(), WorldError> {
        let grid = self.grid_mut(&at.area)?;
        let found = grid.get(at.position).and_then(|t| t.occupant().cloned());
        if found.as_ref() != Some(occupant) {
            return Err(WorldError::Inconsistent(format!(
                "expected {occupant} at {at}, found {found:?}"
            )));
        }
        grid.remove_occupant(at.position);
        Ok(())
    }

    /// Place an already vacated `occupant` at `to` and record its new location.
    pub(crate) fn occupy(&mut self, occupant: &Occupant, to: &Location) -> Result<(), WorldError> {
        let grid = self.grid_mut(&to.area)?;
        set_occupant(grid, to, occupant.clone())?;
        self.set_location_of(occupant, to.clone())
    }
}

fn set_occupant(grid: &mut Grid, at: &Location, occupant: Occupant) -> Result<(), WorldError> {
    grid.set_occupant(at.position, occupant)
        .map_err(|source| WorldError::Grid {
            area: at.area.clone(),
            source,
        })
}
