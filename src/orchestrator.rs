//! Render orchestration
//!
//! One call to [`Renderer::render`] owns one browser process for one job and
//! walks a fixed sequence: geometry, launch, viewport, navigate, inject,
//! wait for the completion flag, settle, capture. Any failure aborts the
//! job. The browser is closed on every exit path.

use crate::completion::CompletionWatch;
use crate::config::PosterConfig;
use crate::dimensions::{dimensions_for_config, viewport_for_layout, RenderDimensions};
use crate::launch::{LaunchPlan, DEFAULT_COMMAND_TIMEOUT};
use crate::template::{completion_probe, PagePayload, PreparedTemplate, ENTRY_POINT};
use crate::{BrowserLauncher, BrowserSession, Error, RenderFailure, RenderOptions, Result, Viewport};
use log::{debug, error, info, warn};
use serde::Serialize;
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Facts about a finished render
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderMetadata {
    /// Rasterized width (viewport width x device scale factor)
    pub width: u64,
    pub height: u64,
    pub pixel_ratio: f64,
    pub dpi: u32,
    #[serde(rename = "sizeInMB")]
    pub size_in_mb: f64,
    pub render_time_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderOutcome {
    pub output_path: PathBuf,
    pub metadata: RenderMetadata,
    pub viewport: Viewport,
    pub dimensions: Vec<RenderDimensions>,
}

/// Drives a [`BrowserLauncher`] through the render sequence
pub struct Renderer<L> {
    launcher: L,
}

impl<L: BrowserLauncher> Renderer<L> {
    pub fn new(launcher: L) -> Self {
        Self { launcher }
    }

    pub fn launcher(&self) -> &L {
        &self.launcher
    }

    /// Render `config` to a PNG at `output_path`.
    ///
    /// On failure any file at `output_path` is removed and the error is
    /// returned with the job id, elapsed time and viewport (when known).
    pub fn render(
        &self,
        config: &PosterConfig,
        output_path: &Path,
        options: &RenderOptions,
    ) -> std::result::Result<RenderOutcome, RenderFailure> {
        let job = options.job_id.as_str();
        let start = Instant::now();
        let mut viewport = None;

        info!("[{}] Starting render...", job);
        match self.run(config, output_path, options, start, &mut viewport) {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                let elapsed_ms = start.elapsed().as_millis() as u64;
                error!("[{}] Render error after {}ms: {}", job, elapsed_ms, err);
                discard_output(job, output_path);
                Err(RenderFailure {
                    job_id: job.to_string(),
                    elapsed_ms,
                    viewport,
                    source: err,
                })
            }
        }
    }

    fn run(
        &self,
        config: &PosterConfig,
        output_path: &Path,
        options: &RenderOptions,
        start: Instant,
        viewport_slot: &mut Option<Viewport>,
    ) -> Result<RenderOutcome> {
        let job = options.job_id.as_str();

        let dimensions = dimensions_for_config(config);
        let first = dimensions
            .first()
            .ok_or_else(|| Error::ConfigError("poster has no maps".into()))?;
        let viewport = viewport_for_layout(config.layout.kind, first);
        *viewport_slot = Some(viewport);
        info!(
            "[{}] Viewport: {}x{} @ {}x",
            job, viewport.width, viewport.height, viewport.device_scale_factor
        );

        let payload = PagePayload::build(config, &dimensions, &options.style_url_template)?;
        let script = payload.injection_script()?;
        let template = PreparedTemplate::prepare(options.template_path.as_deref())?;

        let plan = LaunchPlan::new(&options.launch, (viewport.width, viewport.height), options.debug)
            .with_command_timeout(Duration::from_millis(options.timeout_ms).max(DEFAULT_COMMAND_TIMEOUT));
        debug!("[{}] Launch plan: {:?}", job, plan);
        let session = self.launcher.launch(&plan).map_err(|e| match e {
            Error::Launch(_) => e,
            other => Error::Launch(other.to_string()),
        })?;

        let mut session = SessionGuard::new(session, job);
        let captured = capture(&mut *session, &viewport, &template, &script, options);
        session.close();
        let png = captured?;

        std::fs::write(output_path, &png)
            .map_err(|e| Error::Capture(format!("Failed to write {}: {}", output_path.display(), e)))?;
        let size_bytes = std::fs::metadata(output_path)
            .map_err(|e| Error::Capture(format!("Failed to stat {}: {}", output_path.display(), e)))?
            .len();

        let render_time_ms = start.elapsed().as_millis() as u64;
        let size_in_mb = (size_bytes as f64 / (1024.0 * 1024.0) * 100.0).round() / 100.0;
        info!(
            "[{}] Screenshot saved to {} ({}ms)",
            job,
            output_path.display(),
            render_time_ms
        );
        info!("[{}] File size: {:.2} MB", job, size_in_mb);

        let (width, height) = viewport.raster_size();
        Ok(RenderOutcome {
            output_path: output_path.to_path_buf(),
            metadata: RenderMetadata {
                width,
                height,
                pixel_ratio: viewport.device_scale_factor,
                dpi: config.print.dpi,
                size_in_mb,
                render_time_ms,
            },
            viewport,
            dimensions,
        })
    }
}

/// Page-side steps: viewport through screenshot
fn capture<S: BrowserSession>(
    session: &mut S,
    viewport: &Viewport,
    template: &PreparedTemplate,
    script: &str,
    options: &RenderOptions,
) -> Result<Vec<u8>> {
    let job = options.job_id.as_str();

    session.set_viewport(viewport)?;

    let url = template.url();
    info!("[{}] Loading template: {}", job, url);
    session.navigate(&url, Duration::from_millis(options.navigation_timeout_ms))?;

    info!("[{}] Template loaded, initializing map...", job);
    let injected = session.evaluate(script)?;
    if injected != serde_json::Value::Bool(true) {
        return Err(Error::Script(format!("Template does not expose {}()", ENTRY_POINT)));
    }

    info!(
        "[{}] Waiting for map rendering (timeout: {}s)...",
        job,
        options.timeout_ms / 1000
    );
    let probe = completion_probe();
    let watch = CompletionWatch::new(
        Duration::from_millis(options.poll_interval_ms),
        Duration::from_millis(options.timeout_ms),
        options.cancel.clone(),
    );
    let waited = watch.wait(|| Ok(session.evaluate(&probe)? == serde_json::Value::Bool(true)))?;
    info!("[{}] Map rendered successfully after {}ms", job, waited.as_millis());

    if options.stabilization_ms > 0 {
        info!(
            "[{}] Waiting {}ms for tile loading to stabilize...",
            job, options.stabilization_ms
        );
        watch.settle(Duration::from_millis(options.stabilization_ms))?;
    }

    info!("[{}] Capturing screenshot...", job);
    session.screenshot_png().map_err(|e| match e {
        Error::Capture(_) => e,
        other => Error::Capture(other.to_string()),
    })
}

fn discard_output(job: &str, output_path: &Path) {
    if output_path.exists() {
        if let Err(e) = std::fs::remove_file(output_path) {
            warn!("[{}] Failed to remove partial output {}: {}", job, output_path.display(), e);
        }
    }
}

/// Closes the wrapped session exactly once, on drop at the latest
struct SessionGuard<'a, S: BrowserSession> {
    session: S,
    job_id: &'a str,
    closed: bool,
}

impl<'a, S: BrowserSession> SessionGuard<'a, S> {
    fn new(session: S, job_id: &'a str) -> Self {
        Self {
            session,
            job_id,
            closed: false,
        }
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        match self.session.close() {
            Ok(()) => info!("[{}] Browser closed", self.job_id),
            Err(e) => warn!("[{}] Browser close failed: {}", self.job_id, e),
        }
    }
}

impl<S: BrowserSession> Deref for SessionGuard<'_, S> {
    type Target = S;

    fn deref(&self) -> &S {
        &self.session
    }
}

impl<S: BrowserSession> DerefMut for SessionGuard<'_, S> {
    fn deref_mut(&mut self) -> &mut S {
        &mut self.session
    }
}

impl<S: BrowserSession> Drop for SessionGuard<'_, S> {
    fn drop(&mut self) {
        self.close();
    }
}
