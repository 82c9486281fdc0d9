//! Typed poster configuration
//!
//! These types are the normalized form of a poster request: they are only
//! built after [`crate::validate::normalize`] has checked the raw JSON and
//! filled in defaults, so every value here is already in range.

use serde::{Deserialize, Serialize};

/// Root poster configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PosterConfig {
    pub layout: Layout,
    pub maps: Vec<MapSpec>,
    pub print: PrintSpec,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Layout {
    #[serde(rename = "type")]
    pub kind: LayoutType,
    pub shape: LayoutShape,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutType {
    Single,
    Double,
    Triple,
}

impl LayoutType {
    pub const NAMES: [&'static str; 3] = ["single", "double", "triple"];

    /// Number of map slots this layout tiles horizontally
    pub fn map_count(self) -> usize {
        match self {
            LayoutType::Single => 1,
            LayoutType::Double => 2,
            LayoutType::Triple => 3,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "single" => Some(LayoutType::Single),
            "double" => Some(LayoutType::Double),
            "triple" => Some(LayoutType::Triple),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutShape {
    Circle,
    Square,
    Heart,
}

impl LayoutShape {
    pub const NAMES: [&'static str; 3] = ["circle", "square", "heart"];
}

/// One map surface of the poster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapSpec {
    /// `[longitude, latitude]`
    pub center: [f64; 2],
    pub zoom: f64,
    pub bearing: f64,
    pub pitch: f64,
    pub style: String,
    /// Preview size the map was composed at in the editor
    pub container_width: f64,
    pub container_height: f64,
    pub markers: Vec<Marker>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<Title>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    pub coordinates: [f64; 2],
    pub icon: MarkerIcon,
    pub color: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkerIcon {
    Heart,
    House,
    Star,
}

impl MarkerIcon {
    pub const NAMES: [&'static str; 3] = ["heart", "house", "star"];
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Title {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub large_text: String,
    #[serde(default)]
    pub small_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font: Option<String>,
}

/// Physical print target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrintSpec {
    pub width_cm: f64,
    pub height_cm: f64,
    pub dpi: u32,
    pub orientation: Orientation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Landscape,
    Portrait,
}

impl Orientation {
    pub const NAMES: [&'static str; 2] = ["landscape", "portrait"];
}
