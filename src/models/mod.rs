pub mod account;
pub mod appointment;
pub mod enums;
pub mod notification;

pub use account::*;
pub use appointment::*;
pub use enums::{AppointmentStatus, NotificationType, OutboxStatus, Role};
pub use notification::*;
