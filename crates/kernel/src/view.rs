//! Read-only projections of the world: per-player bundles and summaries.

use serde::{Deserialize, Serialize};
use spooky_common::{Direction, ObjectId, Position};

use crate::object::{ObjectKind, Occupant};
use crate::world::World;

/// Everything one client needs to redraw after a change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bundle {
    pub player: PlayerView,
    pub area: AreaView,
    /// One-shot informational message.
    pub message: Option<String>,
    /// Shared log lines appended since the client's previous bundle.
    pub log: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerView {
    pub name: ObjectId,
    pub area: String,
    pub position: Position,
    pub facing: Direction,
    pub inventory: Vec<ItemView>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemView {
    pub id: ObjectId,
    pub name: String,
    pub size: u32,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AreaView {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub owner: Option<ObjectId>,
    pub objects: Vec<ObjectView>,
}

/// A visible occupant of one tile. Doors appear once per door tile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectView {
    pub id: ObjectId,
    pub kind: ObjectKind,
    pub token: String,
    pub position: Position,
    pub description: String,
    pub facing: Option<Direction>,
    /// Doors only.
    pub open: Option<bool>,
}

impl World {
    /// Build the bundle for `name`, carrying log lines from index `log_from`.
    pub fn bundle_for(&self, name: &str, message: Option<String>, log_from: usize) -> Option<Bundle> {
        let player = self.player(name)?;
        let area = self.area(&player.location.area)?;

        let inventory = player
            .inventory
            .iter()
            .filter_map(|id| self.items.get(id))
            .map(|item| ItemView {
                id: item.id.clone(),
                name: item.name.clone(),
                size: item.size,
                description: item.description.clone(),
            })
            .collect();

        let objects = area
            .grid()
            .tiles()
            .filter_map(|tile| {
                let occupant = tile.occupant()?;
                Some(self.object_view(occupant, tile.position()))
            })
            .collect();

        let log = self.log().get(log_from..).unwrap_or_default().to_vec();

        Some(Bundle {
            player: PlayerView {
                name: player.name.clone(),
                area: player.location.area.clone(),
                position: player.location.position,
                facing: player.facing,
                inventory,
            },
            area: AreaView {
                name: area.name().to_string(),
                width: area.grid().width(),
                height: area.grid().height(),
                owner: area.owner().cloned(),
                objects,
            },
            message,
            log,
        })
    }

    fn object_view(&self, occupant: &Occupant, position: Position) -> ObjectView {
        let id = occupant.id().as_str();
        let (token, facing, open) = match occupant {
            Occupant::Player(_) => {
                let p = self.player(id);
                (p.map(|p| p.token.clone()), p.map(|p| p.facing), None)
            }
            Occupant::Npc(_) => {
                let n = self.npc(id);
                (n.map(|n| n.token.clone()), n.map(|n| n.facing), None)
            }
            Occupant::Door(_) => {
                let d = self.doors.get(id);
                (d.map(|d| d.token.clone()), None, d.map(|d| d.open))
            }
            Occupant::Movable(_) => (self.movables.get(id).map(|m| m.token.clone()), None, None),
            Occupant::Item(_) => (self.items.get(id).map(|i| i.token.clone()), None, None),
            Occupant::Fixture(_) => (self.fixtures.get(id).map(|f| f.token.clone()), None, None),
        };
        ObjectView {
            id: occupant.id().clone(),
            kind: occupant.kind(),
            token: token.unwrap_or_default(),
            position,
            description: self.describe(occupant),
            facing,
            open,
        }
    }

    /// Counts for operator tooling.
    pub fn summary(&self) -> WorldSummary {
        WorldSummary {
            tick: self.tick(),
            areas: self.areas.len(),
            spawn_areas: self.areas.spawn_count(&self.rules.spawn_marker),
            players: self.players.len(),
            npcs: self.npcs.len(),
            doors: self.doors.len(),
            movables: self.movables.len(),
            items: self.items.len(),
            fixtures: self.fixtures.len(),
        }
    }
}

/// Summary of world state for the inspector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorldSummary {
    pub tick: u64,
    pub areas: usize,
    pub spawn_areas: usize,
    pub players: usize,
    pub npcs: usize,
    pub doors: usize,
    pub movables: usize,
    pub items: usize,
    pub fixtures: usize,
}

impl std::fmt::Display for WorldSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "World: tick={} areas={} (spawn {}) players={} npcs={} doors={} movables={} items={} fixtures={}",
            self.tick,
            self.areas,
            self.spawn_areas,
            self.players,
            self.npcs,
            self.doors,
            self.movables,
            self.items,
            self.fixtures
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::tests::{door_between, small_world};

    #[test]
    fn bundle_reflects_player_and_room() {
        let mut w = small_world();
        w.add_player("ann").unwrap();
        w.add_player("bob").unwrap();
        let b = w.bundle_for("ann", Some("hi".into()), 0).unwrap();
        assert_eq!(b.player.area, "Spawn_1");
        assert_eq!(b.player.facing, Direction::South);
        assert_eq!(b.area.owner, Some("ann".into()));
        assert_eq!(b.area.objects.len(), 1);
        assert_eq!(b.area.objects[0].kind, ObjectKind::Player);
        assert_eq!(b.message.as_deref(), Some("hi"));
        assert_eq!(b.log, ["ann entered the game.", "bob entered the game."]);

        let later = w.bundle_for("ann", None, 1).unwrap();
        assert_eq!(later.log, ["bob entered the game."]);
        assert!(w.bundle_for("ann", None, 99).unwrap().log.is_empty());
    }

    #[test]
    fn unknown_player_has_no_bundle() {
        assert!(small_world().bundle_for("nobody", None, 0).is_none());
    }

    #[test]
    fn doors_are_visible_with_state() {
        let mut w = small_world();
        door_between(&mut w, "vault_door", true, false);
        w.add_player("ann").unwrap();
        let b = w.bundle_for("ann", None, 0).unwrap();
        assert!(b.area.objects.iter().all(|o| o.kind != ObjectKind::Door));

        crate::movement::tests::put(
            &mut w,
            "ann",
            "Hall",
            Position::new(5, 1),
            Direction::North,
        );
        let b = w.bundle_for("ann", None, 0).unwrap();
        let door = b.area.objects.iter().find(|o| o.kind == ObjectKind::Door).unwrap();
        assert_eq!(door.open, Some(true));
        assert_eq!(door.description, "A heavy door.");
        assert_eq!(door.position, Position::new(5, 0));
    }

    #[test]
    fn bundle_serializes_to_json() {
        let mut w = small_world();
        w.add_player("ann").unwrap();
        let json = serde_json::to_string(&w.bundle_for("ann", None, 0).unwrap()).unwrap();
        assert!(json.contains("\"facing\":\"SOUTH\""));
        assert!(json.contains("\"kind\":\"player\""));
    }

    #[test]
    fn summary_counts() {
        let mut w = small_world();
        w.add_player("ann").unwrap();
        let s = w.summary();
        assert_eq!(s.areas, 3);
        assert_eq!(s.spawn_areas, 2);
        assert_eq!(s.players, 1);
        assert!(s.to_string().starts_with("World: tick=0"));
    }
}
