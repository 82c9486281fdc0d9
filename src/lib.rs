//! Map Poster Renderer
//!
//! Turns a poster configuration (one to three maps, markers, titles and a
//! physical print size) into a print-resolution PNG by driving a headless
//! browser over a templated page.
//!
//! # Pipeline
//!
//! - **Validation**: [`validate::normalize`] checks the raw JSON, collecting
//!   every error, then fills defaults.
//! - **Geometry**: [`dimensions::compute_render_dimensions`] converts cm + DPI
//!   into render pixels and a device pixel ratio capped by a pixel budget.
//! - **Render**: [`orchestrator::Renderer`] launches the browser, loads the
//!   print template, injects the config, waits for the page's completion
//!   flag and captures the viewport. The browser is closed on every path.
//!
//! # Example
//!
//! ```no_run
//! # #[cfg(feature = "cdp")]
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use mapposter::{cdp::CdpLauncher, orchestrator::Renderer, RenderOptions};
//!
//! let raw = serde_json::json!({
//!     "layout": {"type": "single", "shape": "circle"},
//!     "maps": [{"center": [-80.1918, 25.7617], "zoom": 13, "style": "positron"}],
//!     "print": {"widthCm": 30, "heightCm": 40, "dpi": 150}
//! });
//! let config = mapposter::validate::normalize(&raw)?;
//!
//! let renderer = Renderer::new(CdpLauncher);
//! let outcome = renderer.render(&config, "poster.png".as_ref(), &RenderOptions::default())?;
//! println!("{}x{} in {}ms", outcome.metadata.width, outcome.metadata.height, outcome.metadata.render_time_ms);
//! # Ok(())
//! # }
//! # #[cfg(not(feature = "cdp"))]
//! # fn main() {}
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub mod error;
pub use error::{Error, RenderFailure, Result};

pub mod completion;
pub mod config;
pub mod dimensions;
pub mod launch;
pub mod orchestrator;
pub mod template;
pub mod validate;

#[cfg(feature = "cdp")]
pub mod cdp;

// Async-friendly wrapper that runs a blocking render on a worker thread
pub mod async_api;

// Job bookkeeping for callers that front the renderer (HTTP, CLI)
pub mod jobs;

pub use completion::CancelToken;
pub use config::PosterConfig;
pub use dimensions::{compute_render_dimensions, RenderDimensions};
pub use launch::{GraphicsCapability, LaunchPlan, LaunchSettings};
pub use orchestrator::{RenderMetadata, RenderOutcome, Renderer};

/// Capture surface: CSS pixel size plus device scale factor
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
    pub device_scale_factor: f64,
}

impl Viewport {
    /// Final raster size (`css px x device scale factor`)
    pub fn raster_size(&self) -> (u64, u64) {
        (
            (f64::from(self.width) * self.device_scale_factor).round() as u64,
            (f64::from(self.height) * self.device_scale_factor).round() as u64,
        )
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            device_scale_factor: 1.0,
        }
    }
}

/// Per-render options
///
/// The defaults match production use: two minutes for the page to finish
/// rendering, thirty seconds for the local template to load and a three
/// second settle delay before capture.
///
/// ```
/// let opts = mapposter::RenderOptions::default();
/// assert_eq!(opts.timeout_ms, 120_000);
/// ```
#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Identifier used in logs and failure reports
    pub job_id: String,
    /// Overall bound on waiting for the completion flag
    pub timeout_ms: u64,
    /// Bound on loading the local template
    pub navigation_timeout_ms: u64,
    pub poll_interval_ms: u64,
    /// Delay between the completion flag and the screenshot
    pub stabilization_ms: u64,
    /// Forward every page console message to the log
    pub debug: bool,
    /// Template to load instead of the embedded one
    pub template_path: Option<PathBuf>,
    /// Expansion for style identifiers; `{style}` is replaced
    pub style_url_template: String,
    pub launch: LaunchSettings,
    pub cancel: CancelToken,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            job_id: "render".to_string(),
            timeout_ms: 120_000,
            navigation_timeout_ms: 30_000,
            poll_interval_ms: 250,
            stabilization_ms: 3_000,
            debug: false,
            template_path: None,
            style_url_template: template::DEFAULT_STYLE_URL_TEMPLATE.to_string(),
            launch: LaunchSettings::default(),
            cancel: CancelToken::new(),
        }
    }
}

/// Starts browser processes. One launch serves exactly one render.
pub trait BrowserLauncher {
    type Session: BrowserSession;

    fn launch(&self, plan: &LaunchPlan) -> Result<Self::Session>;
}

/// A single page in a launched browser
pub trait BrowserSession {
    /// Apply the capture viewport; this fixes the final image resolution
    fn set_viewport(&mut self, viewport: &Viewport) -> Result<()>;

    /// Load `url` and wait for it within `timeout`
    fn navigate(&mut self, url: &str, timeout: Duration) -> Result<()>;

    /// Evaluate a script in the page's global context and return its value
    fn evaluate(&mut self, script: &str) -> Result<serde_json::Value>;

    /// Capture the viewport as PNG bytes
    fn screenshot_png(&mut self) -> Result<Vec<u8>>;

    /// Terminate the browser process
    fn close(&mut self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let opts = RenderOptions::default();
        assert_eq!(opts.timeout_ms, 120_000);
        assert_eq!(opts.navigation_timeout_ms, 30_000);
        assert!(!opts.debug);
        assert!(opts.style_url_template.contains("{style}"));
    }

    #[test]
    fn test_raster_size() {
        let viewport = Viewport {
            width: 1772,
            height: 2362,
            device_scale_factor: 1.5,
        };
        assert_eq!(viewport.raster_size(), (2658, 3543));
    }
}
