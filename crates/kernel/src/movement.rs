//! Directional intents: turn, step, push, door crossing.

use serde::{Deserialize, Serialize};
use spooky_common::{Direction, ObjectId, Position};
use tracing::{debug, info};

use crate::grid::TileKind;
use crate::object::{Location, Occupant};
use crate::world::{World, WorldError, WorldEvent};

/// What a directional intent did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MoveOutcome {
    /// Facing changed; position did not.
    Turned,
    Stepped,
    /// Mover shoved a movable one tile and took its place.
    Pushed,
    /// Mover went through a door into another area.
    Crossed,
    Blocked,
}

impl MoveOutcome {
    /// True unless the intent was refused.
    pub fn changed(self) -> bool {
        self != MoveOutcome::Blocked
    }
}

impl World {
    /// Resolve a player's directional intent.
    ///
    /// A player not facing `direction` only turns. Facing it, they attempt
    /// one step. A single intent never both turns and moves.
    pub fn move_player(
        &mut self,
        name: &str,
        direction: Direction,
    ) -> Result<MoveOutcome, WorldError> {
        let player = self.require_player(name)?;
        if player.facing != direction {
            let event = WorldEvent::Turned {
                mover: player.name.clone(),
                area: player.location.area.clone(),
                facing: direction,
            };
            if let Some(p) = self.player_mut(name) {
                p.facing = direction;
            }
            self.record(event);
            return Ok(MoveOutcome::Turned);
        }
        self.step_mover(&Occupant::Player(ObjectId::from(name)), direction)
    }

    /// Try to move `mover` one tile in `direction` without turning first.
    /// Shared by players and patrolling NPCs.
    pub(crate) fn step_mover(
        &mut self,
        mover: &Occupant,
        direction: Direction,
    ) -> Result<MoveOutcome, WorldError> {
        let from = self
            .location_of(mover)
            .ok_or_else(|| WorldError::Inconsistent(format!("{mover} is not placed")))?;
        let target = from.position.step(direction);
        let area = self
            .area(&from.area)
            .ok_or_else(|| WorldError::UnknownArea(from.area.clone()))?;
        let Some(tile) = area.grid().get(target) else {
            return Ok(MoveOutcome::Blocked);
        };
        let kind = tile.kind();
        let occupant = tile.occupant().cloned();

        let outcome = match (kind, occupant) {
            (TileKind::Floor, None) => {
                let to = Location::new(from.area.clone(), target);
                self.vacate(mover, &from)?;
                self.occupy(mover, &to)?;
                self.record(WorldEvent::Stepped {
                    mover: mover.id().clone(),
                    area: from.area.clone(),
                    from: from.position,
                    to: target,
                });
                MoveOutcome::Stepped
            }
            (TileKind::Floor, Some(Occupant::Movable(id))) => {
                self.push(mover, &from, Occupant::Movable(id), direction)?
            }
            (TileKind::Wall, Some(Occupant::Door(id))) => {
                self.cross_door(mover, &from, &id, target)?
            }
            (
                TileKind::Floor,
                Some(
                    Occupant::Player(_)
                    | Occupant::Npc(_)
                    | Occupant::Item(_)
                    | Occupant::Fixture(_)
                    | Occupant::Door(_),
                ),
            )
            | (TileKind::Wall, _) => MoveOutcome::Blocked,
        };
        debug!(%mover, %direction, ?outcome, "move resolved");
        Ok(outcome)
    }

    fn push(
        &mut self,
        mover: &Occupant,
        from: &Location,
        movable: Occupant,
        direction: Direction,
    ) -> Result<MoveOutcome, WorldError> {
        let movable_from = Location::new(from.area.clone(), from.position.step(direction));
        let beyond = movable_from.position.step(direction);
        let free = self
            .area(&from.area)
            .and_then(|a| a.grid().get(beyond))
            .is_some_and(|t| t.is_free_floor());
        if !free {
            return Ok(MoveOutcome::Blocked);
        }

        // Both tiles were checked above, so these cannot fail half way.
        self.vacate(mover, from)?;
        self.vacate(&movable, &movable_from)?;
        self.occupy(&movable, &Location::new(from.area.clone(), beyond))?;
        self.occupy(mover, &movable_from)?;

        self.record(WorldEvent::Pushed {
            mover: mover.id().clone(),
            movable: movable.id().clone(),
            area: from.area.clone(),
            to: beyond,
        });
        Ok(MoveOutcome::Pushed)
    }

    fn cross_door(
        &mut self,
        mover: &Occupant,
        from: &Location,
        door_id: &ObjectId,
        door_pos: Position,
    ) -> Result<MoveOutcome, WorldError> {
        let door = self
            .doors
            .get(door_id)
            .ok_or_else(|| WorldError::Inconsistent(format!("unknown door {door_id}")))?;
        if !door.open || door.locked {
            return Ok(MoveOutcome::Blocked);
        }
        let far = door.far_side(&from.area, door_pos).ok_or_else(|| {
            WorldError::Inconsistent(format!("door {door_id} has no side at {from}"))
        })?;
        let dest = Location::new(far.area.clone(), far.entry);
        let free = self
            .area(&dest.area)
            .and_then(|a| a.grid().get(dest.position))
            .is_some_and(|t| t.is_free_floor());
        if !free {
            return Ok(MoveOutcome::Blocked);
        }

        self.vacate(mover, from)?;
        self.occupy(mover, &dest)?;

        info!(%mover, from = %from.area, to = %dest.area, "room changed");
        self.record(WorldEvent::RoomChanged {
            mover: mover.id().clone(),
            from: from.area.clone(),
            to: dest.area.clone(),
        });
        if let Occupant::Player(name) = mover {
            let room = dest.area.replace('_', " ");
            self.notify(name, format!("You entered {room}."));
        }
        Ok(MoveOutcome::Crossed)
    }
}
