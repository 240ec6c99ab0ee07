//! Game objects. Each kind lives in its own registry inside the world; tiles
//! refer to them through [`Occupant`].

use serde::{Deserialize, Serialize};
use spooky_common::{Direction, ObjectId, Position};
use std::fmt;

/// Kind tag for a game object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    Player,
    Npc,
    Door,
    Movable,
    Item,
    Fixture,
}

/// Reference from a tile to the object standing on it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Occupant {
    Player(ObjectId),
    Npc(ObjectId),
    Door(ObjectId),
    Movable(ObjectId),
    Item(ObjectId),
    Fixture(ObjectId),
}

impl Occupant {
    pub fn id(&self) -> &ObjectId {
        match self {
            Occupant::Player(id)
            | Occupant::Npc(id)
            | Occupant::Door(id)
            | Occupant::Movable(id)
            | Occupant::Item(id)
            | Occupant::Fixture(id) => id,
        }
    }

    pub fn kind(&self) -> ObjectKind {
        match self {
            Occupant::Player(_) => ObjectKind::Player,
            Occupant::Npc(_) => ObjectKind::Npc,
            Occupant::Door(_) => ObjectKind::Door,
            Occupant::Movable(_) => ObjectKind::Movable,
            Occupant::Item(_) => ObjectKind::Item,
            Occupant::Fixture(_) => ObjectKind::Fixture,
        }
    }
}

impl fmt::Display for Occupant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} {}", self.kind(), self.id())
    }
}

/// An area name plus a tile in it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub area: String,
    pub position: Position,
}

impl Location {
    pub fn new(area: impl Into<String>, position: Position) -> Self {
        Self {
            area: area.into(),
            position,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.area, self.position)
    }
}

/// A connected client's avatar.
#[derive(Debug, Clone, Serialize)]
pub struct Player {
    pub name: ObjectId,
    pub spawn_area: String,
    pub location: Location,
    pub facing: Direction,
    pub inventory: Vec<ObjectId>,
    pub token: String,
}

impl Player {
    pub fn new(name: ObjectId, spawn_area: String, position: Position) -> Self {
        Self {
            location: Location::new(spawn_area.clone(), position),
            name,
            spawn_area,
            facing: Direction::South,
            inventory: Vec::new(),
            token: "player".to_string(),
        }
    }

    pub fn holds(&self, item: &str) -> bool {
        self.inventory.iter().any(|id| id.as_str() == item)
    }

    pub fn description(&self) -> String {
        format!("This is {}.", self.name)
    }
}

/// A non-player character patrolling a fixed route.
#[derive(Debug, Clone, Serialize)]
pub struct Npc {
    pub id: ObjectId,
    pub token: String,
    pub description: String,
    pub location: Location,
    pub route: Vec<Direction>,
    /// Index into `route` of the next direction to attempt.
    pub cursor: usize,
    pub facing: Direction,
}

impl Npc {
    pub fn new(id: ObjectId, location: Location, route: Vec<Direction>) -> Self {
        let facing = route.first().copied().unwrap_or(Direction::South);
        Self {
            description: format!("{id} is patrolling the halls."),
            token: "npc".to_string(),
            id,
            location,
            route,
            cursor: 0,
            facing,
        }
    }

    pub fn next_direction(&self) -> Option<Direction> {
        self.route.get(self.cursor).copied()
    }

    pub fn advance(&mut self) {
        if !self.route.is_empty() {
            self.cursor = (self.cursor + 1) % self.route.len();
        }
    }
}

/// One side of a door: the wall tile bearing the door and the floor tile a
/// mover lands on when arriving through it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoorSide {
    pub area: String,
    pub door: Position,
    pub entry: Position,
}

/// A door bridging two areas.
#[derive(Debug, Clone, Serialize)]
pub struct Door {
    pub id: ObjectId,
    pub token: String,
    pub description: String,
    pub side_a: DoorSide,
    pub side_b: DoorSide,
    pub open: bool,
    pub locked: bool,
    pub key: Option<ObjectId>,
}

impl Door {
    /// The side opposite the one whose door tile is at `area`/`door_pos`.
    pub fn far_side(&self, area: &str, door_pos: Position) -> Option<&DoorSide> {
        if self.side_a.area == area && self.side_a.door == door_pos {
            Some(&self.side_b)
        } else if self.side_b.area == area && self.side_b.door == door_pos {
            Some(&self.side_a)
        } else {
            None
        }
    }

    /// Whether `item` unlocks this door: its id contains the door id, or it
    /// is the declared key.
    pub fn is_unlocked_by(&self, item: &ObjectId) -> bool {
        item.as_str().contains(self.id.as_str()) || self.key.as_ref() == Some(item)
    }
}

/// A pushable obstruction.
#[derive(Debug, Clone, Serialize)]
pub struct Movable {
    pub id: ObjectId,
    pub token: String,
    pub description: String,
    pub location: Location,
}

/// A pickable object. `location` is `None` while a player holds it.
#[derive(Debug, Clone, Serialize)]
pub struct Item {
    pub id: ObjectId,
    pub name: String,
    pub size: u32,
    pub token: String,
    pub description: String,
    pub location: Option<Location>,
    /// Where the item was placed at load time.
    pub home: Location,
}

/// A fixed decoration: signs, spawn markers and the like.
#[derive(Debug, Clone, Serialize)]
pub struct Fixture {
    pub id: ObjectId,
    pub token: String,
    pub description: String,
    pub location: Location,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn door() -> Door {
        Door {
            id: "hall_door".into(),
            token: "door".into(),
            description: "A creaky door.".into(),
            side_a: DoorSide {
                area: "Hall".into(),
                door: Position::new(3, 0),
                entry: Position::new(3, 1),
            },
            side_b: DoorSide {
                area: "Library".into(),
                door: Position::new(3, 4),
                entry: Position::new(3, 3),
            },
            open: false,
            locked: true,
            key: Some("brass_key".into()),
        }
    }

    #[test]
    fn far_side_depends_on_which_door_tile() {
        let d = door();
        assert_eq!(d.far_side("Hall", Position::new(3, 0)).unwrap().area, "Library");
        assert_eq!(d.far_side("Library", Position::new(3, 4)).unwrap().area, "Hall");
        assert!(d.far_side("Hall", Position::new(0, 0)).is_none());
    }

    #[test]
    fn key_matching() {
        let d = door();
        assert!(d.is_unlocked_by(&"hall_door_key".into()));
        assert!(d.is_unlocked_by(&"brass_key".into()));
        assert!(!d.is_unlocked_by(&"iron_key".into()));
    }

    #[test]
    fn npc_cursor_wraps() {
        let mut npc = Npc::new(
            "ghost".into(),
            Location::new("Hall", Position::new(1, 1)),
            vec![Direction::East, Direction::West],
        );
        assert_eq!(npc.facing, Direction::East);
        npc.advance();
        assert_eq!(npc.next_direction(), Some(Direction::West));
        npc.advance();
        assert_eq!(npc.next_direction(), Some(Direction::East));
    }

    #[test]
    fn stationary_npc_has_no_next_direction() {
        let mut npc = Npc::new("statue".into(), Location::new("Hall", Position::new(0, 0)), vec![]);
        npc.advance();
        assert_eq!(npc.next_direction(), None);
        assert_eq!(npc.facing, Direction::South);
    }
}
