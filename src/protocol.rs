// author: kodeholic (powered by Claude)

pub mod message;
pub mod op;
pub mod session;

pub use session::{ws_handler, AppState};
