//! JSON-lines boundary adapter over stdin/stdout.
//!
//! Binds a channel tree to a line-oriented transport so any process that can
//! write JSON can drive it.
//!
//! Architecture:
//! - Reader thread: parses stdin lines into commands for the session loop
//! - Session loop: handles commands and runs queued deliveries, one thread
//! - Writer thread: serializes events to stdout in order
//!
//! Protocol:
//! - Each line is a JSON object
//! - Events (Rust → client): {"event": "...", ...}
//! - Commands (client → Rust): {"cmd": "...", ...}

mod protocol;
mod router;
mod session;


pub use protocol::{IpcCommand, IpcEvent};
pub use router::{Router, UNKNOWN_CHANNEL};
pub use session::{run_session, run_stdio_session};
