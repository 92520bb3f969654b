//! Process-local browser ownership.
//!
//! A [`BrowserPool`] launches its browser on the first [`acquire`](BrowserPool::acquire)
//! and reuses it for every later lease. Each lease is a fresh context with one
//! page; callers release it on every path so contexts never accumulate.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::driver::{Browser, BrowserContext, BrowserLauncher, Page};
use crate::error::Result;

/// Owns the lazily-launched browser shared by health checks and agent runs.
pub struct BrowserPool {
	launcher: Arc<dyn BrowserLauncher>,
	browser: Mutex<Option<Arc<dyn Browser>>>,
	leases: AtomicU64,
}

impl BrowserPool {
	pub fn new(launcher: Arc<dyn BrowserLauncher>) -> Self {
		Self {
			launcher,
			browser: Mutex::new(None),
			leases: AtomicU64::new(0),
		}
	}

	/// Returns `true` once the browser has been launched and not yet shut down.
	pub async fn is_launched(&self) -> bool {
		self.browser.lock().await.is_some()
	}

	/// Number of leases handed out since creation.
	pub fn leases_issued(&self) -> u64 {
		self.leases.load(Ordering::Relaxed)
	}

	async fn browser(&self) -> Result<Arc<dyn Browser>> {
		let mut guard = self.browser.lock().await;
		if let Some(browser) = guard.as_ref() {
			return Ok(Arc::clone(browser));
		}

		debug!(target = "warden.browser", "launching browser");
		let browser = self.launcher.launch().await?;
		*guard = Some(Arc::clone(&browser));
		Ok(browser)
	}

	/// Opens a fresh isolated context with a single page.
	pub async fn acquire(&self) -> Result<ContextLease> {
		let browser = self.browser().await?;
		let context = browser.new_context().await?;
		let page = match context.new_page().await {
			Ok(page) => page,
			Err(err) => {
				if let Err(close_err) = context.close().await {
					warn!(target = "warden.browser", error = %close_err, "failed to close context after page creation error");
				}
				return Err(err);
			}
		};

		let id = self.leases.fetch_add(1, Ordering::Relaxed) + 1;
		debug!(target = "warden.browser", lease = id, "context acquired");
		Ok(ContextLease {
			id,
			context,
			page,
			released: false,
		})
	}

	/// Closes the browser if it was launched. A later `acquire` launches a new one.
	pub async fn shutdown(&self) -> Result<()> {
		let browser = self.browser.lock().await.take();
		if let Some(browser) = browser {
			debug!(target = "warden.browser", "closing browser");
			browser.close().await?;
		}
		Ok(())
	}
}

/// A fresh browser context and page borrowed from a [`BrowserPool`].
pub struct ContextLease {
	id: u64,
	context: Box<dyn BrowserContext>,
	page: Box<dyn Page>,
	released: bool,
}

impl ContextLease {
	pub fn id(&self) -> u64 {
		self.id
	}

	pub fn context(&self) -> &dyn BrowserContext {
		self.context.as_ref()
	}

	pub fn page(&self) -> &dyn Page {
		self.page.as_ref()
	}

	/// Closes the page and the context. Close failures are logged, not returned.
	pub async fn release(mut self) {
		if let Err(err) = self.page.close().await {
			debug!(target = "warden.browser", lease = self.id, error = %err, "page close failed");
		}
		if let Err(err) = self.context.close().await {
			warn!(target = "warden.browser", lease = self.id, error = %err, "context close failed");
		}
		self.released = true;
		debug!(target = "warden.browser", lease = self.id, "context released");
	}
}

impl Drop for ContextLease {
	fn drop(&mut self) {
		if !self.released {
			warn!(target = "warden.browser", lease = self.id, "context lease dropped without release");
		}
	}
}
