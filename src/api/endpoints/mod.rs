pub mod appointments;
pub mod chat;
pub mod health;
pub mod orders;
