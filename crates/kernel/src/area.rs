use spooky_common::{ObjectId, Position};
use std::collections::BTreeMap;

use crate::grid::Grid;
use crate::world::WorldError;

/// A named room: one grid plus, for spawn rooms, the player who owns it.
#[derive(Debug, Clone)]
pub struct Area {
    name: String,
    grid: Grid,
    owner: Option<ObjectId>,
}

impl Area {
    pub fn new(name: impl Into<String>, grid: Grid) -> Self {
        Self {
            name: name.into(),
            grid,
            owner: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn grid_mut(&mut self) -> &mut Grid {
        &mut self.grid
    }

    pub fn owner(&self) -> Option<&ObjectId> {
        self.owner.as_ref()
    }

    pub fn is_spawn(&self, marker: &str) -> bool {
        self.name.contains(marker)
    }

    /// Assign or clear the owner. Only spawn areas can be owned.
    pub fn set_owner(&mut self, owner: Option<ObjectId>, marker: &str) -> Result<(), WorldError> {
        if owner.is_some() && !self.is_spawn(marker) {
            return Err(WorldError::NotSpawnArea(self.name.clone()));
        }
        self.owner = owner;
        Ok(())
    }
}

/// All areas of the world keyed by name. Iteration is in name order.
#[derive(Debug, Clone, Default)]
pub struct Areas {
    areas: BTreeMap<String, Area>,
}

impl Areas {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, area: Area) -> Result<(), WorldError> {
        if self.areas.contains_key(area.name()) {
            return Err(WorldError::DuplicateArea(area.name().to_string()));
        }
        self.areas.insert(area.name().to_string(), area);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Area> {
        self.areas.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Area> {
        self.areas.get_mut(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Area> {
        self.areas.values()
    }

    pub fn len(&self) -> usize {
        self.areas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.areas.is_empty()
    }

    pub fn spawn_count(&self, marker: &str) -> usize {
        self.iter().filter(|a| a.is_spawn(marker)).count()
    }

    /// First spawn area, in name order, without an owner and with free floor
    /// at `spawn`. Rooms whose spawn tile is blocked are passed over.
    ///
    /// Running out is a world-definition error: spawn capacity is supposed to
    /// cover the player cap.
    pub fn find_unowned_spawn(&self, marker: &str, spawn: Position) -> Result<&Area, WorldError> {
        self.iter()
            .find(|a| {
                a.is_spawn(marker)
                    && a.owner().is_none()
                    && a.grid().get(spawn).is_some_and(|t| t.is_free_floor())
            })
            .ok_or(WorldError::NoSpawnAvailable)
    }

    /// The spawn area owned by `player`, if any.
    pub fn owned_by(&self, player: &ObjectId) -> Option<&Area> {
        self.iter().find(|a| a.owner() == Some(player))
    }
}
