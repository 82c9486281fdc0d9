//! Print geometry: physical size + DPI to render pixels
//!
//! The print pixel size is the authoritative render target. The editor
//! preview size only feeds the scale factor used to grow markers and text so
//! they keep their on-screen proportions at print resolution.

use crate::config::{LayoutType, PosterConfig};
use crate::Viewport;
use log::info;
use serde::Serialize;

pub const CM_PER_INCH: f64 = 2.54;
/// CSS reference density
pub const CSS_DPI: f64 = 96.0;
pub const PIXEL_RATIO_BOOST: f64 = 1.5;
pub const MAX_PIXEL_RATIO: f64 = 3.0;
/// Rasterized surface ceiling (~4472x4472 at 1x)
pub const MAX_SAFE_PIXELS: f64 = 20_000_000.0;
pub const BYTES_PER_PIXEL: f64 = 4.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrintPixels {
    pub width_px: u32,
    pub height_px: u32,
    pub width_cm: f64,
    pub height_cm: f64,
    pub dpi: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewPixels {
    pub width_px: f64,
    pub height_px: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderBox {
    pub width_px: u32,
    pub height_px: u32,
    pub scale: f64,
    pub scale_x: f64,
    pub scale_y: f64,
}

/// Derived per-map geometry. Recomputed for every render, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderDimensions {
    pub print: PrintPixels,
    pub preview: PreviewPixels,
    pub render: RenderBox,
    pub pixel_ratio: f64,
    #[serde(rename = "estimatedSizeMB")]
    pub estimated_size_mb: f64,
}

impl RenderDimensions {
    /// Pixel count of the rasterized surface (`width x height x ratio^2`)
    pub fn total_pixels(&self) -> f64 {
        f64::from(self.render.width_px) * f64::from(self.render.height_px) * self.pixel_ratio * self.pixel_ratio
    }

    pub fn viewport(&self) -> Viewport {
        Viewport {
            width: self.render.width_px,
            height: self.render.height_px,
            device_scale_factor: self.pixel_ratio,
        }
    }
}

/// Device pixel ratio for a DPI before the memory ceiling is applied
pub fn base_pixel_ratio(dpi: u32) -> f64 {
    (f64::from(dpi) / CSS_DPI * PIXEL_RATIO_BOOST).min(MAX_PIXEL_RATIO)
}

/// Physical length to pixels at `dpi`, rounded to the nearest pixel
pub fn cm_to_px(cm: f64, dpi: u32) -> u32 {
    (cm / CM_PER_INCH * f64::from(dpi)).round() as u32
}

/// Compute render geometry for one map.
///
/// `preview_width_px`/`preview_height_px` must be positive; the validator
/// guarantees this for every normalized config.
pub fn compute_render_dimensions(
    width_cm: f64,
    height_cm: f64,
    dpi: u32,
    preview_width_px: f64,
    preview_height_px: f64,
) -> RenderDimensions {
    let print_width_px = cm_to_px(width_cm, dpi);
    let print_height_px = cm_to_px(height_cm, dpi);

    let scale_x = f64::from(print_width_px) / preview_width_px;
    let scale_y = f64::from(print_height_px) / preview_height_px;
    let scale = scale_x.max(scale_y);

    let base_ratio = base_pixel_ratio(dpi);
    let area = f64::from(print_width_px) * f64::from(print_height_px);
    let mut pixel_ratio = base_ratio;
    if area * pixel_ratio * pixel_ratio > MAX_SAFE_PIXELS {
        let reduction = (MAX_SAFE_PIXELS / area).sqrt();
        pixel_ratio = pixel_ratio.min(reduction).max(1.0);
        info!(
            "Large poster detected ({}x{}px). Reducing pixel ratio from {:.2} to {:.2}",
            print_width_px, print_height_px, base_ratio, pixel_ratio
        );
    }

    RenderDimensions {
        print: PrintPixels {
            width_px: print_width_px,
            height_px: print_height_px,
            width_cm,
            height_cm,
            dpi,
        },
        preview: PreviewPixels {
            width_px: preview_width_px,
            height_px: preview_height_px,
        },
        render: RenderBox {
            width_px: print_width_px,
            height_px: print_height_px,
            scale,
            scale_x,
            scale_y,
        },
        pixel_ratio,
        estimated_size_mb: area * pixel_ratio * pixel_ratio * BYTES_PER_PIXEL / (1024.0 * 1024.0),
    }
}

/// Geometry for every map of a poster, in map order
pub fn dimensions_for_config(config: &PosterConfig) -> Vec<RenderDimensions> {
    config
        .maps
        .iter()
        .map(|map| {
            compute_render_dimensions(
                config.print.width_cm,
                config.print.height_cm,
                config.print.dpi,
                map.container_width,
                map.container_height,
            )
        })
        .collect()
}

/// Capture viewport for a layout.
///
/// Map boxes are tiled horizontally. Only the first map's geometry governs
/// the shared viewport since all maps of one poster share a print size.
pub fn viewport_for_layout(layout: LayoutType, first: &RenderDimensions) -> Viewport {
    let count = layout.map_count() as u32;
    Viewport {
        width: first.render.width_px * count,
        height: first.render.height_px,
        device_scale_factor: first.pixel_ratio,
    }
}

pub fn scale_marker_size(base_px: f64, scale: f64) -> u32 {
    (base_px * scale).round() as u32
}

pub fn scale_font_size(base_px: f64, scale: f64) -> u32 {
    (base_px * scale).round() as u32
}
