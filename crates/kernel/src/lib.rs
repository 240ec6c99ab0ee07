//! World kernel: authoritative state of the haunted school.
//!
//! # Invariants
//! - A floor tile holds at most one occupant; a wall tile holds nothing but a door.
//! - Every object sits on exactly the tile its location names (held items on none).
//! - A spawn area has at most one owner, and only spawn areas are owned.
//! - All state mutations flow through explicit operations and produce events.
//!
//! The kernel does no locking. Callers serialize every mutating call.

pub mod area;
pub mod grid;
pub mod interaction;
pub mod movement;
pub mod npc;
pub mod object;
pub mod rules;
pub mod view;
pub mod world;

pub use area::{Area, Areas};
pub use grid::{Grid, GridError, Tile, TileKind};
pub use interaction::{ActionOutcome, DropOutcome};
pub use movement::MoveOutcome;
pub use npc::Catch;
pub use object::{Door, DoorSide, Fixture, Item, Location, Movable, Npc, ObjectKind, Occupant, Player};
pub use rules::Rules;
pub use view::{AreaView, Bundle, ItemView, ObjectView, PlayerView, WorldSummary};
pub use world::{World, WorldError, WorldEvent};
