//! Progress-callback trait for rewrite pipeline events.
//!
//! Inject an [`Arc<dyn RewriteProgressCallback>`] via
//! [`crate::config::RewriteConfigBuilder::progress_callback`] to receive
//! events as the pipeline extracts, waits on the rewriting service, and
//! applies each mapped fragment.
//!
//! # Example
//!
//! ```rust
//! use edgequake_docpatch::{RewriteConfig, RewriteProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     applied: AtomicUsize,
//! }
//!
//! impl RewriteProgressCallback for CountingCallback {
//!     fn on_fragment_applied(&self, index: usize) {
//!         self.applied.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("fragment {index} rewritten");
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { applied: AtomicUsize::new(0) });
//!
//! let config = RewriteConfig::builder()
//!     .progress_callback(counter as Arc<dyn RewriteProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the pipeline at each step of a rewrite.
///
/// Implementations must be `Send + Sync`: PDF work runs on a blocking
/// thread. All methods have default no-op implementations so callers only
/// override what they care about.
pub trait RewriteProgressCallback: Send + Sync {
    /// Called once the document has been cut into fragments.
    fn on_extraction_complete(&self, fragment_count: usize) {
        let _ = fragment_count;
    }

    /// Called just before the rewriting service request is sent.
    ///
    /// # Arguments
    /// * `sent` — number of fragments included in the request
    fn on_service_request(&self, sent: usize) {
        let _ = sent;
    }

    /// Called when the service answer has been parsed.
    ///
    /// # Arguments
    /// * `returned` — number of `{index, text}` entries in the answer
    fn on_service_response(&self, returned: usize) {
        let _ = returned;
    }

    /// Called for each fragment whose replacement was written into the document.
    fn on_fragment_applied(&self, index: usize) {
        let _ = index;
    }

    /// Called for each fragment that could not be resolved and was skipped.
    fn on_fragment_skipped(&self, index: usize, reason: &str) {
        let _ = (index, reason);
    }

    /// Called once after every mapping entry has been attempted.
    ///
    /// # Arguments
    /// * `applied`   — fragments rewritten
    /// * `unapplied` — fragments skipped with an error
    fn on_rewrite_complete(&self, applied: usize, unapplied: usize) {
        let _ = (applied, unapplied);
    }
}

/// A no-op implementation for callers that don't need progress events.
///
/// This is the default when no callback is configured.
pub struct NoopProgressCallback;

impl RewriteProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::RewriteConfig`].
pub type ProgressCallback = Arc<dyn RewriteProgressCallback>;
