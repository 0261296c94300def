/*
[INPUT]:  Storage backends
[OUTPUT]: Session persistence and validation
[POS]:    Session layer - module wiring
[UPDATE]: When session components change
*/

mod manager;
mod store;

pub use manager::SessionManager;
pub use store::{FileSessionStore, MemorySessionStore, SessionStore};
