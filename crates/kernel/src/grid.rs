use serde::{Deserialize, Serialize};
use spooky_common::Position;

use crate::object::Occupant;

/// Whether a tile can be walked on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TileKind {
    Floor,
    Wall,
}

/// One cell of an area's grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tile {
    kind: TileKind,
    position: Position,
    occupant: Option<Occupant>,
}

impl Tile {
    pub fn kind(&self) -> TileKind {
        self.kind
    }

    pub fn is_floor(&self) -> bool {
        self.kind == TileKind::Floor
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn occupant(&self) -> Option<&Occupant> {
        self.occupant.as_ref()
    }

    pub fn is_occupied(&self) -> bool {
        self.occupant.is_some()
    }

    /// A floor tile with nobody on it.
    pub fn is_free_floor(&self) -> bool {
        self.is_floor() && !self.is_occupied()
    }
}

/// Refusals from occupancy changes. These indicate a caller bug; the world
/// layer checks before mutating and treats any of these as fatal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GridError {
    #[error("position {0} is outside the grid")]
    OutOfBounds(Position),
    #[error("tile {position} already holds {existing}")]
    Occupied {
        position: Position,
        existing: Occupant,
    },
    #[error("wall tile {0} can only hold a door")]
    WallOccupant(Position),
    #[error("grid of {width}x{height} needs {expected} tiles, got {actual}")]
    SizeMismatch {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
    #[error("grid must have at least one tile")]
    Empty,
}

/// Fixed-size row-major occupancy grid for one area.
#[derive(Debug, Clone)]
pub struct Grid {
    width: u32,
    height: u32,
    tiles: Vec<Tile>,
}

impl Grid {
    /// Build a grid from row-major tile kinds.
    pub fn from_kinds(width: u32, height: u32, kinds: Vec<TileKind>) -> Result<Self, GridError> {
        if width == 0 || height == 0 {
            return Err(GridError::Empty);
        }
        let expected = width as usize * height as usize;
        if kinds.len() != expected {
            return Err(GridError::SizeMismatch {
                width,
                height,
                expected,
                actual: kinds.len(),
            });
        }
        let tiles = kinds
            .into_iter()
            .enumerate()
            .map(|(i, kind)| Tile {
                kind,
                position: Position::new((i % width as usize) as i32, (i / width as usize) as i32),
                occupant: None,
            })
            .collect();
        Ok(Self {
            width,
            height,
            tiles,
        })
    }

    /// An all-floor grid.
    pub fn floor(width: u32, height: u32) -> Result<Self, GridError> {
        Self::from_kinds(
            width,
            height,
            vec![TileKind::Floor; width as usize * height as usize],
        )
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn in_bounds(&self, pos: Position) -> bool {
        pos.x >= 0 && pos.y >= 0 && (pos.x as u32) < self.width && (pos.y as u32) < self.height
    }

    fn index(&self, pos: Position) -> Option<usize> {
        self.in_bounds(pos)
            .then(|| pos.y as usize * self.width as usize + pos.x as usize)
    }

    pub fn get(&self, pos: Position) -> Option<&Tile> {
        self.index(pos).map(|i| &self.tiles[i])
    }

    pub fn tiles(&self) -> impl Iterator<Item = &Tile> {
        self.tiles.iter()
    }

    pub fn is_occupied(&self, pos: Position) -> bool {
        self.get(pos).is_some_and(Tile::is_occupied)
    }

    /// Place `occupant` on the tile at `pos`. Never overwrites.
    pub fn set_occupant(&mut self, pos: Position, occupant: Occupant) -> Result<(), GridError> {
        let i = self.index(pos).ok_or(GridError::OutOfBounds(pos))?;
        let tile = &mut self.tiles[i];
        if let Some(existing) = &tile.occupant {
            return Err(GridError::Occupied {
                position: pos,
                existing: existing.clone(),
            });
        }
        if tile.kind == TileKind::Wall && !matches!(occupant, Occupant::Door(_)) {
            return Err(GridError::WallOccupant(pos));
        }
        tile.occupant = Some(occupant);
        Ok(())
    }

    /// Closest free floor tile to `from` by Manhattan distance, ties broken in
    /// row-major order. `from` itself counts when it is free.
    pub fn nearest_free_floor(&self, from: Position) -> Option<Position> {
        self.tiles
            .iter()
            .filter(|t| t.is_free_floor())
            .map(Tile::position)
            .min_by_key(|p| (p.x - from.x).abs() + (p.y - from.y).abs())
    }

    /// Clear the tile at `pos`, returning whatever was there.
    pub fn remove_occupant(&mut self, pos: Position) -> Option<Occupant> {
        let i = self.index(pos)?;
        self.tiles[i].occupant.take()
    }
}
