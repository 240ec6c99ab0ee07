//! Shared value types: positions, directions and object identifiers.

mod types;

pub use types::{Direction, ObjectId, ParseDirectionError, Position};
