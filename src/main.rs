use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use mapposter::compute_render_dimensions;
use mapposter::launch::{GraphicsCapability, CHROME_EXECUTABLE_ENV};
use mapposter::validate::{validate_config, validate_dimensions};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "mapposter", version, about = "Render map posters to print-resolution PNG", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check a poster config and list every problem found
    Validate {
        #[arg(long)]
        config: PathBuf,
    },
    /// Print the render geometry for a print size
    Dimensions {
        #[arg(long)]
        width_cm: f64,
        #[arg(long)]
        height_cm: f64,
        #[arg(long, default_value_t = 200)]
        dpi: u32,
        #[arg(long, default_value_t = 640.0)]
        preview_width: f64,
        #[arg(long, default_value_t = 640.0)]
        preview_height: f64,
    },
    /// Render a poster config to PNG
    Render(RenderArgs),
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Poster config, bare or wrapped as `{"config": ..., "options": ...}`
    #[arg(long)]
    config: PathBuf,
    #[arg(long, default_value = "output", env = "MAPPOSTER_OUTPUT_DIR")]
    output_dir: PathBuf,
    /// Bound on waiting for the page to finish rendering
    #[arg(long)]
    timeout_ms: Option<u64>,
    #[arg(long)]
    navigation_timeout_ms: Option<u64>,
    /// Settle delay before the screenshot
    #[arg(long)]
    stabilization_ms: Option<u64>,
    /// Forward every page console message
    #[arg(long)]
    debug: bool,
    /// Print template to use instead of the embedded one
    #[arg(long)]
    template: Option<PathBuf>,
    /// Style URL template; `{style}` is replaced with the map's style id
    #[arg(long, env = "MAPPOSTER_STYLE_URL")]
    style_url: Option<String>,
    /// Chrome executable (marks the deployment as containerized)
    #[arg(long, env = CHROME_EXECUTABLE_ENV)]
    chrome: Option<PathBuf>,
    /// Force the GL strategy instead of probing the host
    #[arg(long, env = "MAPPOSTER_GRAPHICS")]
    graphics: Option<GraphicsCapability>,
    /// Include the PNG as a base64 data URL in the report
    #[arg(long)]
    data_url: bool,
}

/// Per-request options carried alongside a wrapped config
#[derive(Debug, Default, Deserialize)]
struct RequestOptions {
    timeout: Option<u64>,
    debug: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct Wrapped {
    config: serde_json::Value,
    #[serde(default)]
    options: RequestOptions,
}

fn read_request(path: &Path) -> anyhow::Result<(serde_json::Value, RequestOptions)> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let value: serde_json::Value =
        serde_json::from_str(&text).with_context(|| format!("{} is not valid JSON", path.display()))?;
    if value.get("config").is_some() {
        let wrapped: Wrapped = serde_json::from_value(value).context("Malformed request body")?;
        Ok((wrapped.config, wrapped.options))
    } else {
        Ok((value, RequestOptions::default()))
    }
}

fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();
}

fn main() -> anyhow::Result<ExitCode> {
    init_logging();
    let cli = Cli::parse();

    match cli.command {
        Command::Validate { config } => {
            let (raw, _) = read_request(&config)?;
            let validation = validate_config(&raw);
            println!("{}", serde_json::to_string_pretty(&validation)?);
            Ok(if validation.valid {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(2)
            })
        }
        Command::Dimensions {
            width_cm,
            height_cm,
            dpi,
            preview_width,
            preview_height,
        } => {
            let validation = validate_dimensions(width_cm, height_cm, dpi, preview_width, preview_height);
            if !validation.valid {
                bail!("Invalid dimensions: {}", validation.errors.join("; "));
            }
            let dims = compute_render_dimensions(width_cm, height_cm, dpi, preview_width, preview_height);
            println!("{}", serde_json::to_string_pretty(&dims)?);
            Ok(ExitCode::SUCCESS)
        }
        Command::Render(args) => render(args),
    }
}

#[cfg(feature = "cdp")]
fn render(args: RenderArgs) -> anyhow::Result<ExitCode> {
    use mapposter::cdp::CdpLauncher;
    use mapposter::jobs::{png_data_url, JobRegistry, PosterService, SubmitError, DEFAULT_RETENTION};
    use mapposter::{LaunchSettings, RenderOptions};

    let (raw, request) = read_request(&args.config)?;

    let mut defaults = RenderOptions {
        debug: args.debug || request.debug.unwrap_or(false),
        template_path: args.template.clone(),
        launch: LaunchSettings {
            executable: args.chrome.clone(),
            capability: args.graphics,
            extra_args: Vec::new(),
        },
        ..RenderOptions::default()
    };
    if let Some(ms) = args.timeout_ms.or(request.timeout) {
        defaults.timeout_ms = ms;
    }
    if let Some(ms) = args.navigation_timeout_ms {
        defaults.navigation_timeout_ms = ms;
    }
    if let Some(ms) = args.stabilization_ms {
        defaults.stabilization_ms = ms;
    }
    if let Some(tpl) = args.style_url.clone() {
        defaults.style_url_template = tpl;
    }

    let registry = JobRegistry::new(&args.output_dir, DEFAULT_RETENTION)?;
    let service = PosterService::new(CdpLauncher, registry, defaults);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    match runtime.block_on(service.submit(&raw, |_| {})) {
        Ok(report) => {
            let mut out = serde_json::json!({
                "success": true,
                "jobId": report.job_id,
                "filename": report.output_path.file_name().map(|n| n.to_string_lossy().into_owned()),
                "path": report.output_path,
                "metadata": report.metadata,
            });
            if args.data_url {
                out["dataUrl"] = serde_json::Value::String(png_data_url(&report.output_path)?);
            }
            println!("{}", serde_json::to_string_pretty(&out)?);
            Ok(ExitCode::SUCCESS)
        }
        Err(SubmitError::Invalid { errors }) => {
            let out = serde_json::json!({
                "success": false,
                "error": "Invalid configuration",
                "details": errors,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
            Ok(ExitCode::from(2))
        }
        Err(SubmitError::Failed { job_id, message }) => {
            let out = serde_json::json!({
                "success": false,
                "jobId": job_id,
                "error": "Failed to generate poster",
                "message": message,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
            Ok(ExitCode::FAILURE)
        }
    }
}

#[cfg(not(feature = "cdp"))]
fn render(_args: RenderArgs) -> anyhow::Result<ExitCode> {
    bail!("mapposter was built without the `cdp` feature; rendering is unavailable")
}
