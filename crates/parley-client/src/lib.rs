//! parley-client
//!
//! - `session`  : join a broker, chat, answer pings, leave cleanly
//! - `commands` : `%last N` / `%who` answered from the activity log
//! - `showlog`  : dump a broker's activity log

pub mod commands;
pub mod session;
pub mod showlog;

pub use session::{ClientOptions, Ending, Session};
