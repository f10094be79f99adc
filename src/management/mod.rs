mod session;

pub use session::InMemorySessionStore;
pub use session::MIN_SWEEP_INTERVAL;
pub use session::SESSION_ID_BYTES;
pub use session::SessionGuard;
pub use session::SessionStore;
pub use session::spawn_sweeper;
