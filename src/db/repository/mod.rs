//! Repository layer: entity-scoped database operations.
//!
//! Every function takes a borrowed `Connection` so callers decide the
//! transaction boundary. All public functions are re-exported here.

mod adherence;
mod family;
mod medication;
mod notification;
mod patient;

pub use adherence::*;
pub use family::*;
pub use medication::*;
pub use notification::*;
pub use patient::*;
