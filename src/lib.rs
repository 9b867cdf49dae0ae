// Library root for the auction server.
//
// The binary wires these together; everything below is unit-testable on its
// own. `room::engine` holds the state machine, `app` the event loop that
// drives it, and the rest is IO at the edges.

pub mod app;
pub mod catalog;
pub mod config;
pub mod pool;
pub mod protocol;
pub mod room;
pub mod session;
pub mod store;
pub mod timer;
pub mod ws_server;
