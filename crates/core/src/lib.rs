//! Login session lifecycle and health-validation engine.
//!
//! Decides, for a stored login (encrypted credentials plus an optional captured
//! browser session), whether automation may proceed, whether the session needs
//! an interactive reconnect, and how the persisted status changes after a live
//! probe against the real site.
//!
//! * [`session::SessionManager`] encrypts, replays and probes captured sessions
//! * [`health::LoginHealthChecker`] runs one authoritative check per login
//! * [`gate::AgentRunner`] refuses agent runs whose logins are not usable
//!
//! Browser access goes through an injected [`warden_runtime::BrowserPool`];
//! persistence goes through the [`store::LoginStore`] trait.

pub mod catalog;
pub mod classify;
pub mod config;
pub mod crypto;
pub mod error;
pub mod executor;
pub mod gate;
pub mod health;
pub mod script;
pub mod session;
pub mod store;

pub use catalog::{Catalog, CredentialUpdate, NewAgent, NewLogin};
pub use config::WardenConfig;
pub use crypto::{Cipher, DecryptionError};
pub use error::{Error, Result};
pub use executor::{AgentExecutor, ScriptedAgentExecutor};
pub use gate::AgentRunner;
pub use health::{CheckOptions, LoginHealthChecker};
pub use session::{RestoreError, SessionManager, compute_session_expiry, is_expired};
pub use store::{FileStore, LoginStore, MemoryStore};
pub use warden_protocol as protocol;
pub use warden_runtime as runtime;
