//! The "action" and "drop" intents, resolved against the tile a player faces.

use serde::{Deserialize, Serialize};
use spooky_common::ObjectId;
use tracing::debug;

use crate::object::{Location, Occupant};
use crate::world::{World, WorldError, WorldEvent};

/// What an action intent did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionOutcome {
    /// Nothing to act on ahead.
    Nothing,
    PickedUp(ObjectId),
    Unlocked(ObjectId),
    /// Door is locked and no held item fits it.
    NoKey(ObjectId),
    Toggled { door: ObjectId, open: bool },
    /// The facing object's description was shown.
    Described(String),
}

/// What a drop intent did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DropOutcome {
    Dropped,
    NotHeld,
    /// Tile ahead is missing, a wall, or occupied.
    Blocked,
}

impl World {
    /// The tile directly in front of `name`.
    fn ahead_of(&self, name: &str) -> Result<(ObjectId, Location), WorldError> {
        let player = self.require_player(name)?;
        let ahead = Location::new(
            player.location.area.clone(),
            player.location.position.step(player.facing),
        );
        Ok((player.name.clone(), ahead))
    }

    /// Act on whatever the player is facing.
    pub fn process_action(&mut self, name: &str) -> Result<ActionOutcome, WorldError> {
        let (player, ahead) = self.ahead_of(name)?;
        let occupant = self
            .area(&ahead.area)
            .and_then(|a| a.grid().get(ahead.position))
            .and_then(|t| t.occupant().cloned());
        let Some(occupant) = occupant else {
            return Ok(ActionOutcome::Nothing);
        };

        let outcome = match &occupant {
            Occupant::Item(item) => self.pick_up(&player, item, &ahead)?,
            Occupant::Door(door) => self.use_door(&player, door)?,
            Occupant::Fixture(_) | Occupant::Movable(_) | Occupant::Player(_) | Occupant::Npc(_) => {
                let text = self.describe(&occupant);
                self.notify(&player, text.clone());
                ActionOutcome::Described(text)
            }
        };
        debug!(player = %player, ?outcome, "action resolved");
        Ok(outcome)
    }

    fn pick_up(
        &mut self,
        player: &ObjectId,
        item_id: &ObjectId,
        at: &Location,
    ) -> Result<ActionOutcome, WorldError> {
        self.vacate(&Occupant::Item(item_id.clone()), at)?;
        let item = self
            .items
            .get_mut(item_id)
            .ok_or_else(|| WorldError::Inconsistent(format!("unknown item {item_id}")))?;
        item.location = None;
        let text = format!("You picked up {}.", item.name);

        self.player_mut(player.as_str())
            .ok_or_else(|| WorldError::UnknownPlayer(player.to_string()))?
            .inventory
            .push(item_id.clone());
        self.notify(player, text);
        self.record(WorldEvent::ItemPickedUp {
            player: player.clone(),
            item: item_id.clone(),
            area: at.area.clone(),
        });
        Ok(ActionOutcome::PickedUp(item_id.clone()))
    }

    fn use_door(&mut self, player: &ObjectId, door_id: &ObjectId) -> Result<ActionOutcome, WorldError> {
        let inventory = &self
            .players
            .iter()
            .find(|p| &p.name == player)
            .ok_or_else(|| WorldError::UnknownPlayer(player.to_string()))?
            .inventory;
        let door = self
            .doors
            .get_mut(door_id)
            .ok_or_else(|| WorldError::Inconsistent(format!("unknown door {door_id}")))?;

        let (outcome, text) = if door.locked {
            match inventory.iter().find(|item| door.is_unlocked_by(item)) {
                Some(key) => {
                    door.locked = false;
                    let text = format!("You unlocked the door with {key}.");
                    (ActionOutcome::Unlocked(door_id.clone()), text)
                }
                None => {
                    let text = "You do not have the key to this door.".to_string();
                    (ActionOutcome::NoKey(door_id.clone()), text)
                }
            }
        } else {
            door.open = !door.open;
            let text = if door.open { "Door opened." } else { "Door closed." };
            let outcome = ActionOutcome::Toggled {
                door: door_id.clone(),
                open: door.open,
            };
            (outcome, text.to_string())
        };

        let changed = WorldEvent::DoorChanged {
            door: door_id.clone(),
            open: door.open,
            locked: door.locked,
            areas: [door.side_a.area.clone(), door.side_b.area.clone()],
        };
        if !matches!(outcome, ActionOutcome::NoKey(_)) {
            self.record(changed);
        }
        self.notify(player, text);
        Ok(outcome)
    }

    /// Human-readable description of a non-interactive occupant. A description
    /// naming a spawn area reads as that room's current owner.
    pub(crate) fn describe(&self, occupant: &Occupant) -> String {
        let id = occupant.id().as_str();
        let description = match occupant {
            Occupant::Player(_) => self.player(id).map(|p| p.description()),
            Occupant::Npc(_) => self.npc(id).map(|n| n.description.clone()),
            Occupant::Door(_) => self.doors.get(id).map(|d| d.description.clone()),
            Occupant::Movable(_) => self.movables.get(id).map(|m| m.description.clone()),
            Occupant::Item(_) => self.items.get(id).map(|i| i.description.clone()),
            Occupant::Fixture(_) => self.fixtures.get(id).map(|f| f.description.clone()),
        }
        .unwrap_or_default();

        match self.area(description.trim()) {
            Some(area) if area.is_spawn(&self.rules.spawn_marker) => match area.owner() {
                Some(owner) => format!("{owner}'s Room"),
                None => "No Occupant".to_string(),
            },
            _ => description,
        }
    }

    /// Put a held item on the free floor tile in front of the player.
    pub fn process_drop(&mut self, name: &str, item: &str) -> Result<DropOutcome, WorldError> {
        let (player, ahead) = self.ahead_of(name)?;
        let held = self.player(name).is_some_and(|p| p.holds(item));
        if !held {
            self.notify(&player, "You are not holding that.");
            return Ok(DropOutcome::NotHeld);
        }
        let free = self
            .area(&ahead.area)
            .and_then(|a| a.grid().get(ahead.position))
            .is_some_and(|t| t.is_free_floor());
        if !free {
            self.notify(&player, "You cannot drop that here.");
            return Ok(DropOutcome::Blocked);
        }

        let item_id = ObjectId::from(item);
        self.occupy(&Occupant::Item(item_id.clone()), &ahead)?;
        if let Some(p) = self.player_mut(name) {
            p.inventory.retain(|held| held != &item_id);
        }
        let item_name = self
            .items
            .get(item)
            .map(|i| i.name.clone())
            .unwrap_or_else(|| item.to_string());
        self.notify(&player, format!("You dropped {item_name}."));
        self.record(WorldEvent::ItemDropped {
            player,
            item: item_id,
            area: ahead.area,
            position: ahead.position,
        });
        Ok(DropOutcome::Dropped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::movement::tests::{crate_at, put};
    use crate::object::{Fixture, Item};
    use crate::world::tests::{door_between, small_world};
    use spooky_common::{Direction, Position};

    fn item_at(w: &mut World, id: &str, area: &str, pos: Position) {
        w.add_item(Item {
            id: id.into(),
            name: id.replace('_', " "),
            size: 1,
            token: "item".into(),
            description: format!("A {id}."),
            location: None,
            home: Location::new(area, pos),
        })
        .unwrap();
    }

    fn notices(w: &mut World) -> Vec<String> {
        w.drain_events()
            .into_iter()
            .filter_map(|e| match e {
                WorldEvent::Notice { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn nothing_ahead_is_a_noop() {
        let mut w = small_world();
        w.add_player("ann").unwrap();
        w.drain_events();
        assert_eq!(w.process_action("ann").unwrap(), ActionOutcome::Nothing);
        assert!(w.events().is_empty());
    }

    #[test]
    fn facing_off_the_grid_is_a_noop() {
        let mut w = small_world();
        w.add_player("ann").unwrap();
        put(&mut w, "ann", "Spawn_1", Position::new(0, 0), Direction::West);
        assert_eq!(w.process_action("ann").unwrap(), ActionOutcome::Nothing);
    }

    #[test]
    fn pick_up_then_drop_preserves_identity() {
        let mut w = small_world();
        w.add_player("ann").unwrap();
        item_at(&mut w, "torch", "Spawn_1", Position::new(5, 9));

        assert_eq!(
            w.process_action("ann").unwrap(),
            ActionOutcome::PickedUp("torch".into())
        );
        assert!(w.item("torch").unwrap().location.is_none());
        assert!(!w.area("Spawn_1").unwrap().grid().is_occupied(Position::new(5, 9)));
        assert_eq!(w.player("ann").unwrap().inventory, vec![ObjectId::from("torch")]);
        assert_eq!(notices(&mut w), ["You picked up torch."]);

        w.move_player("ann", Direction::East).unwrap();
        assert_eq!(w.process_drop("ann", "torch").unwrap(), DropOutcome::Dropped);
        let dropped = Location::new("Spawn_1", Position::new(6, 8));
        assert_eq!(w.item("torch").unwrap().location, Some(dropped));
        assert_eq!(
            w.area("Spawn_1").unwrap().grid().get(Position::new(6, 8)).unwrap().occupant(),
            Some(&Occupant::Item("torch".into()))
        );
        assert!(w.player("ann").unwrap().inventory.is_empty());
    }

    #[test]
    fn drop_requires_held_item_and_free_floor() {
        let mut w = small_world();
        w.add_player("ann").unwrap();
        item_at(&mut w, "torch", "Spawn_1", Position::new(5, 9));
        w.drain_events();
        assert_eq!(w.process_drop("ann", "torch").unwrap(), DropOutcome::NotHeld);
        assert_eq!(notices(&mut w), ["You are not holding that."]);

        w.process_action("ann").unwrap();
        crate_at(&mut w, "crate", "Spawn_1", Position::new(5, 9));
        w.drain_events();
        assert_eq!(w.process_drop("ann", "torch").unwrap(), DropOutcome::Blocked);
        assert_eq!(notices(&mut w), ["You cannot drop that here."]);
        assert!(w.player("ann").unwrap().holds("torch"));
    }

    #[test]
    fn locked_door_needs_matching_key() {
        let mut w = small_world();
        w.add_player("ann").unwrap();
        door_between(&mut w, "vault_door", false, true);
        item_at(&mut w, "vault_door_key", "Hall", Position::new(5, 3));
        put(&mut w, "ann", "Hall", Position::new(5, 1), Direction::North);

        assert_eq!(
            w.process_action("ann").unwrap(),
            ActionOutcome::NoKey("vault_door".into())
        );
        assert!(w.door("vault_door").unwrap().locked);

        put(&mut w, "ann", "Hall", Position::new(5, 2), Direction::South);
        w.process_action("ann").unwrap();
        put(&mut w, "ann", "Hall", Position::new(5, 1), Direction::North);

        assert_eq!(
            w.process_action("ann").unwrap(),
            ActionOutcome::Unlocked("vault_door".into())
        );
        let door = w.door("vault_door").unwrap();
        assert!(!door.locked);
        assert!(!door.open);
    }

    #[test]
    fn unlocked_door_toggles() {
        let mut w = small_world();
        w.add_player("ann").unwrap();
        door_between(&mut w, "vault_door", false, false);
        put(&mut w, "ann", "Hall", Position::new(5, 1), Direction::North);
        w.drain_events();

        assert_eq!(
            w.process_action("ann").unwrap(),
            ActionOutcome::Toggled {
                door: "vault_door".into(),
                open: true
            }
        );
        assert!(w.events().iter().any(|e| matches!(e, WorldEvent::DoorChanged { open: true, .. })));
        assert_eq!(
            w.process_action("ann").unwrap(),
            ActionOutcome::Toggled {
                door: "vault_door".into(),
                open: false
            }
        );
    }

    #[test]
    fn fixtures_describe_themselves() {
        let mut w = small_world();
        w.add_player("ann").unwrap();
        w.add_fixture(Fixture {
            id: "sign".into(),
            token: "sign".into(),
            description: "Beware of ghosts.".into(),
            location: Location::new("Spawn_1", Position::new(5, 9)),
        })
        .unwrap();
        assert_eq!(
            w.process_action("ann").unwrap(),
            ActionOutcome::Described("Beware of ghosts.".into())
        );
    }

    #[test]
    fn spawn_markers_name_the_owner() {
        let mut w = small_world();
        for (id, pos, room) in [
            ("marker_1", Position::new(2, 2), "Spawn_1"),
            ("marker_2", Position::new(3, 2), "Spawn_2"),
        ] {
            w.add_fixture(Fixture {
                id: id.into(),
                token: "marker".into(),
                description: room.into(),
                location: Location::new("Hall", pos),
            })
            .unwrap();
        }
        w.add_player("ann").unwrap();
        put(&mut w, "ann", "Hall", Position::new(2, 3), Direction::North);
        assert_eq!(
            w.process_action("ann").unwrap(),
            ActionOutcome::Described("ann's Room".into())
        );
        put(&mut w, "ann", "Hall", Position::new(3, 3), Direction::North);
        assert_eq!(
            w.process_action("ann").unwrap(),
            ActionOutcome::Described("No Occupant".into())
        );
    }

    #[test]
    fn leaving_returns_held_items_home() {
        let mut w = small_world();
        w.add_player("ann").unwrap();
        item_at(&mut w, "torch", "Spawn_1", Position::new(5, 9));
        w.process_action("ann").unwrap();
        w.remove_player("ann").unwrap();
        assert_eq!(
            w.item("torch").unwrap().location,
            Some(Location::new("Spawn_1", Position::new(5, 9)))
        );
    }

    #[test]
    fn dropped_item_on_a_spawn_tile_sends_the_next_joiner_elsewhere() {
        let mut w = small_world();
        w.add_player("ann").unwrap();
        item_at(&mut w, "lamp", "Spawn_1", Position::new(5, 9));
        w.process_action("ann").unwrap();
        w.move_player("ann", Direction::North).unwrap();
        w.move_player("ann", Direction::North).unwrap();
        w.move_player("ann", Direction::South).unwrap();
        assert_eq!(w.process_drop("ann", "lamp").unwrap(), DropOutcome::Dropped);
        w.remove_player("ann").unwrap();

        assert!(w.add_player("bob").unwrap());
        assert_eq!(w.player("bob").unwrap().spawn_area, "Spawn_2");
        assert_eq!(
            w.item("lamp").unwrap().location,
            Some(Location::new("Spawn_1", Position::new(5, 8)))
        );
    }

    #[test]
    fn held_item_lands_where_its_holder_stood_when_home_is_taken() {
        let mut w = small_world();
        w.add_player("ann").unwrap();
        item_at(&mut w, "lamp", "Spawn_1", Position::new(5, 9));
        w.process_action("ann").unwrap();
        crate_at(&mut w, "crate", "Spawn_1", Position::new(5, 9));
        w.remove_player("ann").unwrap();

        let spot = Location::new("Spawn_1", Position::new(5, 8));
        assert_eq!(w.item("lamp").unwrap().location, Some(spot.clone()));
        let tile = w.area("Spawn_1").unwrap().grid().get(spot.position).unwrap();
        assert_eq!(tile.occupant(), Some(&Occupant::Item("lamp".into())));
    }
}
