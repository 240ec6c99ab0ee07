//! Tick-driven NPC behaviour: patrol routes and the detection sweep.

use spooky_common::ObjectId;
use tracing::{debug, info, info_span, warn};

use crate::grid::TileKind;
use crate::movement::MoveOutcome;
use crate::object::{Location, Occupant};
use crate::world::{World, WorldError, WorldEvent};

/// A player spotted by an NPC during one sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catch {
    pub npc: ObjectId,
    pub player: ObjectId,
}

impl World {
    /// One NPC tick: every NPC patrols one step, then every NPC looks ahead.
    pub fn tick_npcs(&mut self) -> Result<Vec<Catch>, WorldError> {
        let _span = info_span!("npc_tick", tick = self.tick() + 1).entered();
        self.patrol()?;
        let catches = self.sweep()?;
        self.advance_tick();
        Ok(catches)
    }

    /// Move each NPC along its route. A blocked NPC retries the same
    /// direction next tick.
    pub fn patrol(&mut self) -> Result<(), WorldError> {
        for index in 0..self.npcs.len() {
            let npc = &mut self.npcs[index];
            let Some(direction) = npc.next_direction() else {
                continue;
            };
            npc.facing = direction;
            let mover = Occupant::Npc(npc.id.clone());

            let outcome = self.step_mover(&mover, direction)?;
            if outcome != MoveOutcome::Blocked {
                self.npcs[index].advance();
            } else {
                debug!(npc = %mover.id(), %direction, "patrol blocked");
            }
        }
        Ok(())
    }

    /// Look up to `npc_lookahead` tiles along each NPC's facing and send the
    /// first player seen back to their spawn. Walls and other occupants block
    /// the line of sight.
    pub fn sweep(&mut self) -> Result<Vec<Catch>, WorldError> {
        let lookahead = self.rules.npc_lookahead;
        let mut catches = Vec::new();
        for index in 0..self.npcs.len() {
            let npc = &self.npcs[index];
            let npc_id = npc.id.clone();
            let facing = npc.facing;
            let Some(area) = self.area(&npc.location.area) else {
                return Err(WorldError::UnknownArea(npc.location.area.clone()));
            };

            let mut pos = npc.location.position;
            let mut spotted = None;
            for _ in 0..lookahead {
                pos = pos.step(facing);
                let Some(tile) = area.grid().get(pos) else {
                    break;
                };
                match tile.occupant() {
                    Some(Occupant::Player(player)) => {
                        spotted = Some(player.clone());
                        break;
                    }
                    Some(
                        Occupant::Npc(_)
                        | Occupant::Door(_)
                        | Occupant::Movable(_)
                        | Occupant::Item(_)
                        | Occupant::Fixture(_),
                    ) => break,
                    None if tile.kind() == TileKind::Wall => break,
                    None => {}
                }
            }

            if let Some(player) = spotted {
                if self.send_home(&player, &npc_id)? {
                    catches.push(Catch {
                        npc: npc_id,
                        player,
                    });
                }
            }
        }
        Ok(catches)
    }

    /// Teleport a caught player to their spawn tile. Returns false when that
    /// tile is held by something else.
    fn send_home(&mut self, player: &ObjectId, npc: &ObjectId) -> Result<bool, WorldError> {
        let from = self.require_player(player.as_str())?.location.clone();
        let spawn_area = self.require_player(player.as_str())?.spawn_area.clone();
        let home = Location::new(spawn_area, self.rules.default_spawn);
        let mover = Occupant::Player(player.clone());

        if from != home {
            let home_tile = self
                .area(&home.area)
                .and_then(|a| a.grid().get(home.position))
                .ok_or_else(|| WorldError::UnknownArea(home.area.clone()))?;
            if !home_tile.is_free_floor() {
                warn!(%player, %npc, home = %home, "spawn tile taken, catch skipped");
                return Ok(false);
            }
            self.vacate(&mover, &from)?;
            self.occupy(&mover, &home)?;
        }

        info!(%player, %npc, from = %from, "player caught");
        self.notify(player, format!("You were caught by {npc}! Back to your room."));
        self.record(WorldEvent::Caught {
            player: player.clone(),
            npc: npc.clone(),
            from: from.area,
            to: home.area,
        });
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::movement::tests::{crate_at, put};
    use crate::object::Npc;
    use crate::world::tests::small_world;
    use spooky_common::{Direction, Position};

    fn ghost(w: &mut World, id: &str, pos: Position, route: Vec<Direction>) {
        w.add_npc(Npc::new(id.into(), Location::new("Hall", pos), route))
            .unwrap();
    }

    fn npc_at(w: &World, id: &str) -> Position {
        w.npc(id).unwrap().location.position
    }

    #[test]
    fn patrol_follows_route_cyclically() {
        let mut w = small_world();
        ghost(&mut w, "g", Position::new(4, 4), vec![Direction::East, Direction::West]);
        w.tick_npcs().unwrap();
        assert_eq!(npc_at(&w, "g"), Position::new(5, 4));
        w.tick_npcs().unwrap();
        assert_eq!(npc_at(&w, "g"), Position::new(4, 4));
        w.tick_npcs().unwrap();
        assert_eq!(npc_at(&w, "g"), Position::new(5, 4));
        assert_eq!(w.tick(), 3);
    }

    #[test]
    fn npcs_step_without_turning_first() {
        let mut w = small_world();
        ghost(&mut w, "g", Position::new(4, 4), vec![Direction::North, Direction::East]);
        w.tick_npcs().unwrap();
        w.tick_npcs().unwrap();
        // The second tick changes direction and moves in the same tick.
        assert_eq!(npc_at(&w, "g"), Position::new(5, 3));
        assert_eq!(w.npc("g").unwrap().facing, Direction::East);
    }

    #[test]
    fn blocked_patrol_retries_same_direction() {
        let mut w = small_world();
        ghost(&mut w, "g", Position::new(4, 1), vec![Direction::North, Direction::South]);
        w.tick_npcs().unwrap();
        w.tick_npcs().unwrap();
        assert_eq!(npc_at(&w, "g"), Position::new(4, 1));
        assert_eq!(w.npc("g").unwrap().next_direction(), Some(Direction::North));
    }

    #[test]
    fn npcs_push_movables() {
        let mut w = small_world();
        ghost(&mut w, "g", Position::new(2, 5), vec![Direction::East]);
        crate_at(&mut w, "crate", "Hall", Position::new(3, 5));
        w.patrol().unwrap();
        assert_eq!(npc_at(&w, "g"), Position::new(3, 5));
        assert_eq!(w.movable("crate").unwrap().location.position, Position::new(4, 5));
    }

    #[test]
    fn player_within_three_tiles_is_sent_home() {
        let mut w = small_world();
        w.add_player("ann").unwrap();
        ghost(&mut w, "g", Position::new(1, 5), vec![]);
        w.npcs[0].facing = Direction::East;
        put(&mut w, "ann", "Hall", Position::new(4, 5), Direction::North);
        w.drain_events();

        let catches = w.sweep().unwrap();
        assert_eq!(catches, [Catch { npc: "g".into(), player: "ann".into() }]);
        let ann = w.player("ann").unwrap();
        assert_eq!(ann.location, Location::new("Spawn_1", Position::new(5, 8)));
        assert!(!w.area("Hall").unwrap().grid().is_occupied(Position::new(4, 5)));
        let events = w.drain_events();
        assert!(events.iter().any(|e| matches!(
            e,
            WorldEvent::Notice { text, .. } if text == "You were caught by g! Back to your room."
        )));
    }

    #[test]
    fn player_beyond_range_or_off_line_is_safe() {
        let mut w = small_world();
        w.add_player("ann").unwrap();
        w.add_player("bob").unwrap();
        ghost(&mut w, "g", Position::new(1, 5), vec![]);
        w.npcs[0].facing = Direction::East;
        put(&mut w, "ann", "Hall", Position::new(5, 5), Direction::North);
        put(&mut w, "bob", "Hall", Position::new(2, 6), Direction::North);
        assert!(w.sweep().unwrap().is_empty());
        assert_eq!(w.player("ann").unwrap().location.area, "Hall");
        assert_eq!(w.player("bob").unwrap().location.area, "Hall");
    }

    #[test]
    fn obstacles_block_line_of_sight() {
        let mut w = small_world();
        w.add_player("ann").unwrap();
        ghost(&mut w, "g", Position::new(1, 5), vec![]);
        w.npcs[0].facing = Direction::East;
        crate_at(&mut w, "crate", "Hall", Position::new(2, 5));
        put(&mut w, "ann", "Hall", Position::new(3, 5), Direction::North);
        assert!(w.sweep().unwrap().is_empty());
    }

    #[test]
    fn one_catch_per_npc_per_sweep() {
        let mut w = small_world();
        w.add_player("ann").unwrap();
        w.add_player("bob").unwrap();
        ghost(&mut w, "g", Position::new(1, 5), vec![]);
        w.npcs[0].facing = Direction::East;
        put(&mut w, "ann", "Hall", Position::new(2, 5), Direction::North);
        put(&mut w, "bob", "Hall", Position::new(4, 5), Direction::North);
        let catches = w.sweep().unwrap();
        assert_eq!(catches.len(), 1);
        assert_eq!(catches[0].player, ObjectId::from("ann"));
        assert_eq!(w.player("bob").unwrap().location.area, "Hall");
    }

    #[test]
    fn patrol_then_sweep_in_one_tick() {
        let mut w = small_world();
        w.add_player("ann").unwrap();
        ghost(&mut w, "g", Position::new(0, 5), vec![Direction::East]);
        put(&mut w, "ann", "Hall", Position::new(4, 5), Direction::North);
        // After stepping to (1, 5) the ghost sees (2..=4, 5).
        let catches = w.tick_npcs().unwrap();
        assert_eq!(catches.len(), 1);
        assert_eq!(w.player("ann").unwrap().location.area, "Spawn_1");
    }

    #[test]
    fn catch_is_skipped_while_the_spawn_tile_is_taken() {
        let mut w = small_world();
        w.add_player("ann").unwrap();
        ghost(&mut w, "g", Position::new(1, 5), vec![]);
        w.npcs[0].facing = Direction::East;
        put(&mut w, "ann", "Hall", Position::new(4, 5), Direction::North);
        crate_at(&mut w, "crate", "Spawn_1", Position::new(5, 8));
        w.drain_events();

        assert!(w.sweep().unwrap().is_empty());
        assert_eq!(
            w.player("ann").unwrap().location,
            Location::new("Hall", Position::new(4, 5))
        );
        assert!(!w
            .drain_events()
            .iter()
            .any(|e| matches!(e, WorldEvent::Caught { .. } | WorldEvent::Notice { .. })));
    }
}
