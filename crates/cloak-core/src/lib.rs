//! cloak-core — disguise gateway for the Cloak calculator
//!
//! The app looks like a plain calculator. Every keypad press is read twice:
//! once as arithmetic and once as a probe for the 4-digit unlock code. A
//! match opens the private messaging space held by [`Session`].
//!
//! # Module layout
//! - `calculator` — expression buffer and evaluator
//! - `keypad`     — key decoding, probe buffer, the dual-consumer keypad
//! - `session`    — lock/unlock/setup/pairing/message state machine
//! - `gateway`    — glue that routes probe tickets into the session
//! - `pairing`    — pairing code generation and validation
//! - `storage`    — secret store and bulk store contracts and backends
//! - `models`     — persisted and observable records
//! - `config`     — tunables loaded from `settings.json`
//! - `paths`      — data directory resolution
//! - `error`      — unified error type

pub mod calculator;
pub mod config;
pub mod error;
pub mod gateway;
pub mod keypad;
pub mod models;
pub mod pairing;
pub mod paths;
pub mod session;
pub mod storage;

pub use config::{GatewayConfig, Precedence};
pub use error::{CloakError, Result};
pub use gateway::{Gateway, GatewayOutcome};
pub use keypad::{Key, Keypad};
pub use models::{Lifecycle, Message, MessageStatus, Phase, SessionState};
pub use session::Session;
