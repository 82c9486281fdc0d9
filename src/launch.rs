//! Browser launch strategy
//!
//! The argument set is a declarative table keyed by the graphics capability
//! of the host, so it can be inspected and tested without spawning Chrome.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming a pre-installed browser executable.
/// Setting it marks the deployment as containerized.
pub const CHROME_EXECUTABLE_ENV: &str = "MAPPOSTER_CHROME_EXECUTABLE";

/// Whether the host can give the page a hardware GL context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GraphicsCapability {
    HardwareGpu,
    SoftwareOnly,
}

impl std::str::FromStr for GraphicsCapability {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hardware" | "hardware-gpu" | "gpu" => Ok(GraphicsCapability::HardwareGpu),
            "software" | "software-only" => Ok(GraphicsCapability::SoftwareOnly),
            other => Err(format!("unknown graphics capability: {}", other)),
        }
    }
}

const COMMON_ARGS: &[&str] = &[
    "--no-sandbox",
    "--disable-setuid-sandbox",
    "--disable-dev-shm-usage",
    "--enable-webgl",
    "--enable-accelerated-2d-canvas",
    "--ignore-gpu-blocklist",
    "--disable-gpu-sandbox",
    "--disable-background-timer-throttling",
    "--disable-backgrounding-occluded-windows",
    "--disable-renderer-backgrounding",
    "--disable-features=VizDisplayCompositor",
];

// SwiftShader through ANGLE gives a working WebGL context without a GPU.
const SOFTWARE_GL_ARGS: &[&str] = &[
    "--use-gl=angle",
    "--use-angle=swiftshader",
    "--enable-unsafe-swiftshader",
];

/// Bound on a single browser command (evaluate, screenshot) outside navigation
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(120);

const HARDWARE_GL_ARGS: &[&str] = &["--use-gl=angle", "--enable-gpu-rasterization"];

fn strategy_args(capability: GraphicsCapability) -> &'static [&'static str] {
    match capability {
        GraphicsCapability::HardwareGpu => HARDWARE_GL_ARGS,
        GraphicsCapability::SoftwareOnly => SOFTWARE_GL_ARGS,
    }
}

/// Operator-facing launch configuration
#[derive(Debug, Clone, Default)]
pub struct LaunchSettings {
    /// Pre-installed browser; `None` lets the backend discover one
    pub executable: Option<PathBuf>,
    /// Overrides capability detection
    pub capability: Option<GraphicsCapability>,
    pub extra_args: Vec<String>,
}

impl LaunchSettings {
    /// Settings seeded from [`CHROME_EXECUTABLE_ENV`]
    pub fn from_env() -> Self {
        Self {
            executable: std::env::var_os(CHROME_EXECUTABLE_ENV).map(PathBuf::from),
            ..Default::default()
        }
    }

    pub fn is_containerized(&self) -> bool {
        self.executable.is_some()
    }
}

/// Concrete launch request handed to a [`crate::BrowserLauncher`]
#[derive(Debug, Clone, PartialEq)]
pub struct LaunchPlan {
    pub executable: Option<PathBuf>,
    pub capability: GraphicsCapability,
    pub args: Vec<String>,
    /// Window size in CSS pixels (the capture viewport)
    pub window: (u32, u32),
    /// Forward all page console output, not just warnings and errors
    pub debug: bool,
    /// Bound on every browser command except navigation, which carries its
    /// own timeout
    pub command_timeout: Duration,
}

impl LaunchPlan {
    pub fn new(settings: &LaunchSettings, window: (u32, u32), debug: bool) -> Self {
        let capability = settings.capability.unwrap_or_else(|| detect_capability(settings));
        let args = COMMON_ARGS
            .iter()
            .chain(strategy_args(capability))
            .map(|a| a.to_string())
            .chain(settings.extra_args.iter().cloned())
            .collect();

        Self {
            executable: settings.executable.clone(),
            capability,
            args,
            window,
            debug,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }
}

/// Containerized deployments are always treated as GPU-less. Elsewhere a
/// DRM render node (Linux) or the platform compositor (macOS) counts as a GPU.
pub fn detect_capability(settings: &LaunchSettings) -> GraphicsCapability {
    if settings.is_containerized() {
        return GraphicsCapability::SoftwareOnly;
    }
    if cfg!(target_os = "macos") || Path::new("/dev/dri/renderD128").exists() {
        GraphicsCapability::HardwareGpu
    } else {
        GraphicsCapability::SoftwareOnly
    }
}
