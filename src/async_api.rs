use crate::config::PosterConfig;
use crate::orchestrator::{RenderOutcome, Renderer};
use crate::{BrowserLauncher, CancelToken, Error, RenderFailure, RenderOptions};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use tokio::sync::oneshot;

/// An async-friendly front for [`Renderer`].
///
/// Each render runs on its own dedicated worker thread, which owns the
/// blocking browser session for the whole job, and reports back through a
/// oneshot channel. Renders never share a browser.
pub struct AsyncRenderer<L> {
    renderer: Arc<Renderer<L>>,
}

impl<L> Clone for AsyncRenderer<L> {
    fn clone(&self) -> Self {
        Self {
            renderer: Arc::clone(&self.renderer),
        }
    }
}

/// Cancels the render's completion wait if the awaiting future goes away
struct CancelOnDrop {
    token: CancelToken,
    armed: bool,
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        if self.armed {
            self.token.cancel();
        }
    }
}

impl<L> AsyncRenderer<L>
where
    L: BrowserLauncher + Send + Sync + 'static,
{
    pub fn new(launcher: L) -> Self {
        Self {
            renderer: Arc::new(Renderer::new(launcher)),
        }
    }

    pub fn renderer(&self) -> &Renderer<L> {
        &self.renderer
    }

    /// Render on a worker thread and await the result.
    ///
    /// Dropping the returned future cancels the completion wait; the worker
    /// then tears the browser down and exits.
    pub async fn render(
        &self,
        config: PosterConfig,
        output_path: PathBuf,
        options: RenderOptions,
    ) -> Result<RenderOutcome, RenderFailure> {
        let (tx, rx) = oneshot::channel();
        let job_id = options.job_id.clone();
        let mut guard = CancelOnDrop {
            token: options.cancel.clone(),
            armed: true,
        };

        let renderer = Arc::clone(&self.renderer);
        let spawned = thread::Builder::new()
            .name(format!("render-{}", job_id))
            .spawn(move || {
                let res = renderer.render(&config, &output_path, &options);
                let _ = tx.send(res);
            });
        if let Err(e) = spawned {
            guard.armed = false;
            return Err(RenderFailure {
                job_id,
                elapsed_ms: 0,
                viewport: None,
                source: Error::Other(format!("Failed to spawn render worker: {}", e)),
            });
        }

        let res = rx.await.map_err(|e| RenderFailure {
            job_id: job_id.clone(),
            elapsed_ms: 0,
            viewport: None,
            source: Error::Other(format!("Render worker canceled: {}", e)),
        });
        guard.armed = false;
        res?
    }
}
