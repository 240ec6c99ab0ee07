//! World definitions: the YAML schema a school is authored in, and the
//! loader that turns one into a validated [`World`].
//!
//! # Layout
//! Areas are drawn as rows of characters, `#` for wall and `.` for floor.
//! Every other object names the area it lives in and its tile position.
//! Construction goes through the kernel's `add_*` operations, so a world
//! that builds satisfies every occupancy invariant from the first tick.

use serde::{Deserialize, Serialize};
use spooky_common::{Direction, ObjectId, Position};
use spooky_kernel::{
    Door, DoorSide, Fixture, Grid, GridError, Item, Location, Movable, Npc, Rules, TileKind, World,
    WorldError,
};
use std::path::Path;
use tracing::{info, warn};

/// Errors from loading or building a world definition.
#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("area {area:?}: unknown tile {ch:?} at ({col}, {row})")]
    BadTile {
        area: String,
        row: usize,
        col: usize,
        ch: char,
    },
    #[error("area {area:?}: row {row} is {actual} tiles wide, expected {expected}")]
    RaggedRow {
        area: String,
        row: usize,
        expected: usize,
        actual: usize,
    },
    #[error("area {area:?}: {source}")]
    Grid {
        area: String,
        #[source]
        source: GridError,
    },
    #[error("spawn area {area:?} has no free floor at its spawn tile {position}")]
    SpawnTile { area: String, position: Position },
    #[error(transparent)]
    World(#[from] WorldError),
}

fn door_token() -> String {
    "door".into()
}

fn movable_token() -> String {
    "movable".into()
}

fn npc_token() -> String {
    "npc".into()
}

fn item_token() -> String {
    "item".into()
}

fn fixture_token() -> String {
    "fixture".into()
}

fn one() -> u32 {
    1
}

/// A complete world as authored on disk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldDef {
    pub areas: Vec<AreaDef>,
    pub doors: Vec<DoorDef>,
    pub movables: Vec<MovableDef>,
    pub npcs: Vec<NpcDef>,
    pub items: Vec<ItemDef>,
    pub fixtures: Vec<FixtureDef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AreaDef {
    pub name: String,
    pub rows: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoorDef {
    pub id: ObjectId,
    #[serde(default = "door_token")]
    pub token: String,
    #[serde(default)]
    pub description: String,
    pub side_a: DoorSide,
    pub side_b: DoorSide,
    #[serde(default)]
    pub open: bool,
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub key: Option<ObjectId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovableDef {
    pub id: ObjectId,
    #[serde(default = "movable_token")]
    pub token: String,
    #[serde(default)]
    pub description: String,
    pub area: String,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NpcDef {
    pub id: ObjectId,
    #[serde(default = "npc_token")]
    pub token: String,
    #[serde(default)]
    pub description: Option<String>,
    pub area: String,
    pub position: Position,
    /// Directions walked in order, cyclically. Empty for a stationary NPC.
    #[serde(default)]
    pub route: Vec<Direction>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemDef {
    pub id: ObjectId,
    pub name: String,
    #[serde(default = "one")]
    pub size: u32,
    #[serde(default = "item_token")]
    pub token: String,
    #[serde(default)]
    pub description: String,
    pub area: String,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixtureDef {
    pub id: ObjectId,
    #[serde(default = "fixture_token")]
    pub token: String,
    /// Shown on inspection. A description equal to a spawn area's name
    /// reads as that room's nameplate.
    #[serde(default)]
    pub description: String,
    pub area: String,
    pub position: Position,
}

impl AreaDef {
    /// Parse the character rows into a grid.
    pub fn grid(&self) -> Result<Grid, AssetError> {
        let width = self.rows.first().map_or(0, |r| r.chars().count());
        let mut kinds = Vec::with_capacity(width * self.rows.len());
        for (row, line) in self.rows.iter().enumerate() {
            let actual = line.chars().count();
            if actual != width {
                return Err(AssetError::RaggedRow {
                    area: self.name.clone(),
                    row,
                    expected: width,
                    actual,
                });
            }
            for (col, ch) in line.chars().enumerate() {
                kinds.push(match ch {
                    '#' => TileKind::Wall,
                    '.' => TileKind::Floor,
                    _ => {
                        return Err(AssetError::BadTile {
                            area: self.name.clone(),
                            row,
                            col,
                            ch,
                        });
                    }
                });
            }
        }
        Grid::from_kinds(width as u32, self.rows.len() as u32, kinds).map_err(|source| {
            AssetError::Grid {
                area: self.name.clone(),
                source,
            }
        })
    }
}

impl WorldDef {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, AssetError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, AssetError> {
        let data = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&data)
    }

    pub fn to_yaml(&self) -> Result<String, AssetError> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Build a fresh world under `rules`.
    ///
    /// Doors go in before anything else so that a door tile can never be
    /// claimed by another object first.
    pub fn build(&self, rules: Rules) -> Result<World, AssetError> {
        let mut world = World::new(rules);

        for area in &self.areas {
            world.add_area(area.name.clone(), area.grid()?)?;
        }
        for door in &self.doors {
            world.add_door(Door {
                id: door.id.clone(),
                token: door.token.clone(),
                description: door.description.clone(),
                side_a: door.side_a.clone(),
                side_b: door.side_b.clone(),
                open: door.open,
                locked: door.locked,
                key: door.key.clone(),
            })?;
        }
        for movable in &self.movables {
            world.add_movable(Movable {
                id: movable.id.clone(),
                token: movable.token.clone(),
                description: movable.description.clone(),
                location: Location::new(movable.area.clone(), movable.position),
            })?;
        }
        for def in &self.npcs {
            let mut npc = Npc::new(
                def.id.clone(),
                Location::new(def.area.clone(), def.position),
                def.route.clone(),
            );
            npc.token = def.token.clone();
            if let Some(description) = &def.description {
                npc.description = description.clone();
            }
            world.add_npc(npc)?;
        }
        for item in &self.items {
            world.add_item(Item {
                id: item.id.clone(),
                name: item.name.clone(),
                size: item.size,
                token: item.token.clone(),
                description: item.description.clone(),
                location: None,
                home: Location::new(item.area.clone(), item.position),
            })?;
        }
        for fixture in &self.fixtures {
            world.add_fixture(Fixture {
                id: fixture.id.clone(),
                token: fixture.token.clone(),
                description: fixture.description.clone(),
                location: Location::new(fixture.area.clone(), fixture.position),
            })?;
        }

        check_spawns(&world)?;
        world.drain_events();
        info!(areas = world.areas().len(), "world built");
        Ok(world)
    }
}

/// Every spawn area must offer its spawn tile as free floor. Fewer spawn
/// areas than player slots only caps the game, so that is a warning.
fn check_spawns(world: &World) -> Result<(), AssetError> {
    let rules = world.rules();
    let spawn = rules.default_spawn;
    let mut count = 0;
    for area in world.areas().iter().filter(|a| a.is_spawn(&rules.spawn_marker)) {
        count += 1;
        if !area.grid().get(spawn).is_some_and(|t| t.is_free_floor()) {
            return Err(AssetError::SpawnTile {
                area: area.name().to_string(),
                position: spawn,
            });
        }
    }
    if count < rules.max_players {
        warn!(
            spawn_areas = count,
            max_players = rules.max_players,
            "fewer spawn areas than player slots"
        );
    }
    Ok(())
}

/// Read and build a world file in one step.
pub fn load_world(path: impl AsRef<Path>, rules: Rules) -> Result<World, AssetError> {
    WorldDef::load(path)?.build(rules)
}

pub fn crate_info() -> &'static str {
    concat!("spooky-assets v", env!("CARGO_PKG_VERSION"))
}
