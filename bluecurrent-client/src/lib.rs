//! # Blue Current client
//!
//! Client for the Blue Current EV charging cloud.
//!
//! Two channels reach the backend:
//! - a **socket session** for live commands and queries (account, charge
//!   points, status, unlock, reset, ...)
//! - **REST endpoints** for historical data (transactions, contracts, grids)
//!
//! The socket session logs in with the encrypted password, caches the bearer
//! token and uses it for both channels.
//!
//! ## Architecture
//!
//! ```text
//!  caller tasks ──► BlueCurrentClient ──► writer task ──► WebSocket
//!       ▲             │ subscribe                            │
//!       │             ▼                                      ▼
//!   Subscription ◄── FanoutQueue ◄──────────────── receive loop
//!   (correlator:
//!    kind filter,
//!    ERROR, timeout)
//!
//!  BlueCurrentClient ──► RestClient ──► HTTPS (bearer token)
//! ```
//!
//! Every operation subscribes to the fan-out queue before sending its
//! command, so any number of operations can be in flight at once without
//! stealing each other's replies.
//!
//! ## Operation sequences
//!
//! | Operation | Command | Awaited kinds |
//! |-----------|---------|---------------|
//! | login | `VALIDATE_PASSWORD` | `STATUS_PASSWORD` |
//! | handshake | `HELLO` | `HELLO` |
//! | `get_account` | `GET_ACCOUNT` | `ACCOUNT` |
//! | `get_charge_cards` | `GET_CHARGE_CARDS` | `CHARGE_CARDS` |
//! | `get_charge_points` | `GET_CHARGE_POINTS` | `CHARGE_POINTS` |
//! | `get_charge_point_settings` | `GET_CH_SETTINGS` | `CH_SETTINGS` |
//! | `get_grid_status` | `GET_GRID_STATUS` | `GRID_STATUS` |
//! | `get_sessions` | `GET_SESSIONS` | `SESSIONS` |
//! | `get_status` | `GET_STATUS` | `STATUS` |
//! | `get_sustainability_status` | `GET_SUSTAINABILITY_STATUS` | `SUSTAINABILITY_STATUS` |
//! | `set_status` | `SET_OPERATIVE` / `SET_INOPERATIVE` | `RECEIVED_*`, `STATUS_*` |
//! | `unlock_connector` | `UNLOCK_CONNECTOR` | `RECEIVED_*`, `STATUS_*` |
//! | `soft_reset` | `SOFT_RESET` | `RECEIVED_*`, `STATUS_*` |
//!
//! ## Usage
//!
//! ```no_run
//! use bluecurrent_client::BlueCurrentClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = BlueCurrentClient::new("user@example.com", "secret");
//!
//!     client.connect().await?;
//!     let points = client.get_charge_points().await?;
//!     println!("{}", points);
//!     client.disconnect().await;
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod crypto;
pub mod dates;
pub mod error;
pub mod rest;
pub mod socket;

#[cfg(feature = "blocking")]
pub mod blocking;

pub use config::ClientConfig;
pub use error::{ClientError, Result};

// Re-export key types
pub use crypto::{CredentialEncryptor, SjclEncryptor};
pub use rest::{Page, PageIter, RestClient, TransactionPage};
pub use socket::{BlueCurrentClient, Command, InboundMessage, Payload, SessionState};
