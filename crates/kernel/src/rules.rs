use serde::{Deserialize, Serialize};
use spooky_common::Position;

/// Tunable constants of the simulation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Rules {
    /// Maximum number of players joined at once.
    pub max_players: usize,
    /// Substring that marks an area as a spawn room.
    pub spawn_marker: String,
    /// Tile a player lands on in their spawn room.
    pub default_spawn: Position,
    /// How many tiles ahead an NPC can see.
    pub npc_lookahead: u32,
}

impl Default for Rules {
    fn default() -> Self {
        Self {
            max_players: 8,
            spawn_marker: "Spawn".to_string(),
            default_spawn: Position::new(5, 8),
            npc_lookahead: 3,
        }
    }
}
