//! Socket channel for live commands and events
//!
//! - `queue`: fan-out of inbound messages to concurrent waiters
//! - `correlator`: filtered, timeout-bound waits on a subscription
//! - `messages`: outbound command envelopes and inbound messages
//! - `session`: session state machine
//! - `connection`: socket ownership, receive loop and writer task
//! - `client`: lifecycle, dispatcher and operation sequences

pub mod queue;
pub mod correlator;
pub mod messages;
pub mod session;
pub mod connection;
pub mod client;

pub use queue::{FanoutQueue, Subscription};
pub use correlator::await_message;
pub use messages::{Command, InboundMessage, ERROR_KIND, KIND_KEY};
pub use session::{Session, SessionEvent, SessionState};
pub use connection::{Connection, ConnectionHandle};
pub use client::{BlueCurrentClient, Credentials, Payload};
