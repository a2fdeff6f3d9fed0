pub mod admission;
pub mod comments;
pub mod error;
pub mod extract;
pub mod live;
pub mod moderation;
pub mod posts;
pub mod rooms;
pub mod router;
pub mod session;
pub mod state;
pub mod tokens;
pub mod uploads;
pub mod validate;

pub use error::ApiError;
pub use router::router;
pub use state::{AppState, AppStateInner};
