pub mod enums;

mod appointment;
mod chat_message;
mod order;
mod user;

pub use appointment::Appointment;
pub use chat_message::ChatMessage;
pub use enums::{AppointmentStatus, OrderStatus, Role};
pub use order::{MedicineOrder, TimelineEntry};
pub use user::{Identity, User};
