//! Print template and the page-side contract
//!
//! The template page exposes [`ENTRY_POINT`]. The host injects a
//! [`PagePayload`] through it, and the page sets [`COMPLETION_FLAG`] to `true`
//! exactly once, after every map surface has gone idle. Marker icons and
//! scaled sizes are computed here so the page only has to place them.

use crate::config::{Layout, MarkerIcon, PosterConfig, PrintSpec};
use crate::dimensions::{scale_font_size, scale_marker_size, RenderDimensions};
use crate::{Error, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Global the page sets once rendering is visually complete
pub const COMPLETION_FLAG: &str = "mapRenderComplete";
/// Function the page exposes to receive its configuration
pub const ENTRY_POINT: &str = "initializeMapForPrint";

pub const TEMPLATE_FILE_NAME: &str = "print.html";
pub const PRINT_TEMPLATE: &str = include_str!("../templates/print.html");

pub const DEFAULT_STYLE_URL_TEMPLATE: &str = "https://tiles.openfreemap.org/styles/{style}";

pub const MARKER_BASE_PX: f64 = 35.0;
pub const TITLE_LARGE_BASE_PX: f64 = 72.0;
pub const TITLE_SMALL_BASE_PX: f64 = 36.0;
pub const TITLE_BOTTOM_BASE_PX: f64 = 80.0;
pub const DEFAULT_TITLE_FONT: &str = "Montserrat";

/// JavaScript expression the host polls
pub fn completion_probe() -> String {
    format!("window.{} === true", COMPLETION_FLAG)
}

/// Configuration object handed to the page
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PagePayload<'a> {
    pub layout: &'a Layout,
    pub maps: Vec<PageMap>,
    pub print: &'a PrintSpec,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMap {
    pub center: [f64; 2],
    pub zoom: f64,
    pub bearing: f64,
    pub pitch: f64,
    /// Resolved style URL
    pub style: String,
    pub frame: MapFrame,
    pub dimensions: RenderDimensions,
    pub markers: Vec<PageMarker>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<PageTitle>,
}

/// Pixel box of one map inside the viewport (CSS pixels)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MapFrame {
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMarker {
    pub coordinates: [f64; 2],
    pub icon: MarkerIcon,
    pub color: String,
    pub size_px: u32,
    pub svg: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageTitle {
    pub large_text: String,
    pub small_text: String,
    pub font: String,
    pub large_font_px: u32,
    pub small_font_px: u32,
    pub bottom_px: u32,
}

impl<'a> PagePayload<'a> {
    /// Build the payload for `config`. `dimensions` holds one entry per map.
    pub fn build(config: &'a PosterConfig, dimensions: &[RenderDimensions], style_url_template: &str) -> Result<Self> {
        let first = dimensions
            .first()
            .ok_or_else(|| Error::ConfigError("poster has no maps".into()))?;
        if dimensions.len() != config.maps.len() {
            return Err(Error::ConfigError(format!(
                "expected geometry for {} maps, got {}",
                config.maps.len(),
                dimensions.len()
            )));
        }

        let maps = config
            .maps
            .iter()
            .zip(dimensions)
            .enumerate()
            .map(|(index, (map, dims))| {
                let scale = dims.render.scale;
                let markers = map
                    .markers
                    .iter()
                    .map(|m| {
                        let size_px = scale_marker_size(MARKER_BASE_PX, scale);
                        PageMarker {
                            coordinates: m.coordinates,
                            icon: m.icon,
                            color: m.color.clone(),
                            size_px,
                            svg: marker_svg(m.icon, &m.color, size_px),
                        }
                    })
                    .collect();

                let title = map.title.as_ref().filter(|t| t.enabled).map(|t| PageTitle {
                    large_text: t.large_text.clone(),
                    small_text: t.small_text.clone(),
                    font: t.font.clone().unwrap_or_else(|| DEFAULT_TITLE_FONT.to_string()),
                    large_font_px: scale_font_size(TITLE_LARGE_BASE_PX, scale),
                    small_font_px: scale_font_size(TITLE_SMALL_BASE_PX, scale),
                    bottom_px: scale_font_size(TITLE_BOTTOM_BASE_PX, scale),
                });

                PageMap {
                    center: map.center,
                    zoom: map.zoom,
                    bearing: map.bearing,
                    pitch: map.pitch,
                    style: resolve_style(&map.style, style_url_template),
                    frame: MapFrame {
                        left: first.render.width_px * index as u32,
                        top: 0,
                        width: first.render.width_px,
                        height: first.render.height_px,
                    },
                    dimensions: *dims,
                    markers,
                    title,
                }
            })
            .collect();

        Ok(Self {
            layout: &config.layout,
            maps,
            print: &config.print,
        })
    }

    /// Script that stores the payload on `window` and calls the entry point.
    /// Evaluates to `false` when the page does not expose the entry point.
    pub fn injection_script(&self) -> Result<String> {
        let json = serde_json::to_string(self).map_err(|e| Error::Script(format!("Failed to serialize payload: {}", e)))?;
        Ok(format!(
            "(function(cfg){{window.renderConfig=cfg;if(typeof window.{entry}!=='function'){{return false;}}window.{entry}(cfg);return true;}})({json})",
            entry = ENTRY_POINT,
            json = json
        ))
    }
}

/// Style identifiers are expanded through `template`; URLs pass through.
pub fn resolve_style(style: &str, template: &str) -> String {
    if style.contains("://") {
        style.to_string()
    } else {
        template.replace("{style}", style)
    }
}

/// Inline SVG for a marker icon, `size_px` wide
pub fn marker_svg(icon: MarkerIcon, color: &str, size_px: u32) -> String {
    let (view_w, view_h, path, transform) = match icon {
        MarkerIcon::Heart => (
            35.908,
            32.946,
            "M19.954,35.946l-2.6-2.37C8.1,25.191,2,19.661,2,12.875A9.779,9.779,0,0,1,11.875,3a10.752,10.752,0,0,1,8.079,3.752A10.752,10.752,0,0,1,28.033,3a9.779,9.779,0,0,1,9.875,9.875c0,6.787-6.1,12.316-15.351,20.719Z",
            Some("translate(-2 -3)"),
        ),
        MarkerIcon::Star => (
            35.908,
            34.253,
            "M20,30.776,8.783,36.65l2.146-12.515L1.858,15.277l12.568-1.826L20,2.4l5.576,11.05,12.568,1.826L29.07,24.135,31.217,36.65Z",
            Some("translate(-1.858 -2.396)"),
        ),
        MarkerIcon::House => (
            35.908,
            30.522,
            "M30.5,18.1v13.1h-8.9v-9.3h-7.4v9.3H5.4V18.1L18,6.1L30.5,18.1z M18,3.9l-15,14.3c-1.6,1.6-4-0.9-2.4-2.5L16.8,0.5c0.7-0.6,1.7-0.6,2.4,0l7.6,7.2V4.3c0-0.4,0.4-0.8,0.8-0.8h2.2c0.4,0,0.8,0.4,0.8,0.8v6.9l4.8,4.5c1.7,1.6-0.7,4.1-2.4,2.5C28,13.4,23,8.7,18,3.9L18,3.9z",
            None,
        ),
    };
    let height_px = (f64::from(size_px) * view_h / view_w).round() as u32;
    let transform = transform.map(|t| format!(" transform=\"{}\"", t)).unwrap_or_default();
    format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{}\" height=\"{}\" viewBox=\"0 0 {} {}\"><path fill=\"{}\" d=\"{}\"{}/></svg>",
        size_px,
        height_px,
        view_w,
        view_h,
        escape_attr(color),
        path,
        transform
    )
}

fn escape_attr(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// A template file on disk, plus the scratch directory that owns it when it
/// was materialized from the embedded copy.
#[derive(Debug)]
pub struct PreparedTemplate {
    path: PathBuf,
    _scratch: Option<TempDir>,
}

impl PreparedTemplate {
    /// Use `custom` when given, otherwise write the embedded template into a
    /// fresh temporary directory.
    pub fn prepare(custom: Option<&Path>) -> Result<Self> {
        if let Some(path) = custom {
            let path = path.canonicalize().map_err(|e| Error::NavigationTimeout {
                timeout_ms: 0,
                message: format!("Template {} is not readable: {}", path.display(), e),
            })?;
            return Ok(Self { path, _scratch: None });
        }

        let dir = tempfile::Builder::new().prefix("mapposter-").tempdir()?;
        let path = dir.path().join(TEMPLATE_FILE_NAME);
        std::fs::write(&path, PRINT_TEMPLATE)?;
        Ok(Self {
            path,
            _scratch: Some(dir),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn url(&self) -> String {
        let raw = self.path.to_string_lossy().replace('\\', "/");
        if raw.starts_with('/') {
            format!("file://{}", raw)
        } else {
            format!("file:///{}", raw)
        }
    }
}
