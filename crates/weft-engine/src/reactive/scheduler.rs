//! Background drain of the re-render queue.

use std::rc::{Rc, Weak};
use std::time::Duration;

use tokio::sync::Notify;

use crate::Renderer;
use crate::renderer::Inner;

/// Wait for queued work, let it go quiet for `debounce`, wait `settle`, then
/// flush. Exits once the renderer is dropped.
pub(super) async fn run(inner: Weak<Inner>, notify: Rc<Notify>, debounce: Duration, settle: Duration) {
    loop {
        notify.notified().await;

        // Trailing edge: every enqueue restarts the window
        loop {
            if inner.strong_count() == 0 {
                return;
            }
            tokio::select! {
                () = notify.notified() => {}
                () = tokio::time::sleep(debounce) => break,
            }
        }

        let Some(epoch) = inner.upgrade().map(|strong| strong.reactive.epoch.get()) else {
            return;
        };
        tokio::time::sleep(settle).await;

        let Some(strong) = inner.upgrade() else {
            return;
        };
        let renderer = Renderer { inner: strong };
        if renderer.inner.reactive.epoch.get() != epoch {
            tracing::trace!("Batch already drained by an explicit flush");
            continue;
        }
        match renderer.flush().await {
            Ok(report) if !report.failures.is_empty() => {
                tracing::debug!(
                    rendered = report.rendered.len(),
                    failures = report.failures.len(),
                    "Background re-render finished with failures"
                );
            }
            Ok(report) => {
                tracing::trace!(rendered = report.rendered.len(), "Background re-render finished");
            }
            Err(error) => {
                tracing::warn!(error = %error, "Background re-render failed");
            }
        }
    }
}
