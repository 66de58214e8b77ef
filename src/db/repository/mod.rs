//! Repository layer: entity-scoped database operations.
//!
//! One sub-module per table family; all public functions are re-exported here.

mod account;
mod appointment;
mod notification;
mod outbox;

pub use account::*;
pub use appointment::*;
pub use notification::*;
pub use outbox::*;
