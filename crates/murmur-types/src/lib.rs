pub mod api;
pub mod code;
pub mod events;
pub mod models;
pub mod thread;

pub use code::{CodeError, RoomCode};
