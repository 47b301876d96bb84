//! Repository layer — entity-scoped database operations.
//!
//! Each function takes a borrowed `Connection`; callers compose
//! multi-statement transitions with `unchecked_transaction`. Conditional
//! `UPDATE … WHERE` guards are the per-row atomic update primitive.

mod appointment;
mod chat_message;
mod order;
pub(crate) mod user;

pub use appointment::*;
pub use chat_message::*;
pub use order::*;
pub use user::{get_display_name, get_user, get_user_with_role, insert_user};
