//! Browser effector boundary for the warden policy layer.
//!
//! The health validator and the agent gate never talk to a browser engine
//! directly. They depend on the [`Browser`], [`BrowserContext`] and [`Page`]
//! traits, and acquire isolated contexts from a [`BrowserPool`] that owns the
//! single lazily-launched browser of the process.
//!
//! Two drivers are provided:
//! * [`cdp::CdpLauncher`] attaches to a Chromium instance over the DevTools protocol
//! * [`fake::FakeBrowser`] is a scripted in-memory driver for tests

pub mod cdp;
pub mod driver;
pub mod error;
pub mod fake;
pub mod pool;

/// Default navigation timeout in milliseconds.
pub const DEFAULT_NAVIGATION_TIMEOUT_MS: u64 = 30_000;

/// Default selector wait timeout in milliseconds.
pub const DEFAULT_SELECTOR_TIMEOUT_MS: u64 = 10_000;

pub use driver::{Browser, BrowserContext, BrowserLauncher, Page};
pub use error::{Error, Result};
pub use pool::{BrowserPool, ContextLease};
