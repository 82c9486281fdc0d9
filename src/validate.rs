//! Poster configuration validation and normalization
//!
//! Validation runs on the raw JSON so that a request with missing or
//! mistyped fields still yields the complete list of problems in one pass.
//! [`sanitize_config`] only fills in absent optional fields and never touches
//! a value that is present, so it must run after [`validate_config`].

use crate::config::{LayoutShape, LayoutType, MarkerIcon, Orientation, PosterConfig};
use crate::{Error, Result};
use serde::Serialize;
use serde_json::{Map, Value};

pub const MAX_PRINT_CM: f64 = 200.0;
pub const VALID_DPIS: [u64; 3] = [150, 200, 300];

pub const DEFAULT_CONTAINER_PX: f64 = 640.0;
pub const DEFAULT_WIDTH_CM: f64 = 80.0;
pub const DEFAULT_HEIGHT_CM: f64 = 60.0;
pub const DEFAULT_DPI: u64 = 200;
pub const DEFAULT_ORIENTATION: &str = "landscape";

/// Outcome of [`validate_config`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Validation {
    pub valid: bool,
    pub errors: Vec<String>,
}

impl Validation {
    fn from_errors(errors: Vec<String>) -> Self {
        Self { valid: errors.is_empty(), errors }
    }

    pub fn into_result(self) -> Result<()> {
        if self.valid {
            Ok(())
        } else {
            Err(Error::Validation(self.errors))
        }
    }
}

/// Validate a raw poster configuration, accumulating every violation.
pub fn validate_config(config: &Value) -> Validation {
    let mut errors = Vec::new();

    let Some(root) = config.as_object() else {
        errors.push("Configuration is required".to_string());
        return Validation::from_errors(errors);
    };

    let layout_type = match present(root, "layout") {
        None => {
            errors.push("Layout configuration is required".to_string());
            None
        }
        Some(layout) => validate_layout(layout, &mut errors),
    };

    match present(root, "maps") {
        Some(Value::Array(maps)) if maps.is_empty() => {
            errors.push("At least one map is required".to_string());
        }
        Some(Value::Array(maps)) => {
            for (index, map) in maps.iter().enumerate() {
                validate_map(map, index, &mut errors);
            }
            if let Some(kind) = layout_type {
                if maps.len() != kind.map_count() {
                    errors.push(format!(
                        "Layout {} requires {} map(s), got {}",
                        LayoutType::NAMES[kind.map_count() - 1],
                        kind.map_count(),
                        maps.len()
                    ));
                }
            }
        }
        _ => errors.push("Maps array is required".to_string()),
    }

    match present(root, "print") {
        None => errors.push("Print settings are required".to_string()),
        Some(print) => validate_print(print, &mut errors),
    }

    Validation::from_errors(errors)
}

fn validate_layout(layout: &Value, errors: &mut Vec<String>) -> Option<LayoutType> {
    let Some(layout) = layout.as_object() else {
        errors.push("Layout configuration must be an object".to_string());
        return None;
    };

    let mut kind = None;
    match present(layout, "type") {
        None => errors.push("Layout type is required".to_string()),
        Some(value) => match value.as_str().and_then(LayoutType::from_name) {
            Some(k) => kind = Some(k),
            None => errors.push(format!(
                "Invalid layout type: {}. Must be one of: {}",
                shown(value),
                LayoutType::NAMES.join(", ")
            )),
        },
    }

    match present(layout, "shape") {
        None => errors.push("Layout shape is required".to_string()),
        Some(value) => {
            if !one_of(value, &LayoutShape::NAMES) {
                errors.push(format!(
                    "Invalid layout shape: {}. Must be one of: {}",
                    shown(value),
                    LayoutShape::NAMES.join(", ")
                ));
            }
        }
    }

    kind
}

fn validate_map(map: &Value, index: usize, errors: &mut Vec<String>) {
    let prefix = format!("Map {}:", index);
    let Some(map) = map.as_object() else {
        errors.push(format!("{} Map configuration must be an object", prefix));
        return;
    };

    match lng_lat(present(map, "center")) {
        None => errors.push(format!("{} Center must be an array of [longitude, latitude]", prefix)),
        Some((lng, lat)) => {
            if !in_range(lng, -180.0, 180.0) {
                errors.push(format!("{} Invalid longitude: {}. Must be between -180 and 180", prefix, shown(lng)));
            }
            if !in_range(lat, -90.0, 90.0) {
                errors.push(format!("{} Invalid latitude: {}. Must be between -90 and 90", prefix, shown(lat)));
            }
        }
    }

    match present(map, "zoom") {
        None => errors.push(format!("{} Zoom level is required", prefix)),
        Some(zoom) if !in_range(zoom, 0.0, 22.0) => {
            errors.push(format!("{} Invalid zoom: {}. Must be between 0 and 22", prefix, shown(zoom)));
        }
        Some(_) => {}
    }

    match present(map, "style") {
        None => errors.push(format!("{} Style is required", prefix)),
        Some(Value::String(s)) if s.trim().is_empty() => errors.push(format!("{} Style is required", prefix)),
        Some(Value::String(_)) => {}
        Some(_) => errors.push(format!("{} Style must be a string", prefix)),
    }

    for key in ["containerWidth", "containerHeight"] {
        if let Some(value) = present(map, key) {
            if !value.as_f64().is_some_and(|n| n.is_finite() && n > 0.0) {
                errors.push(format!("{} Invalid {}: {}", prefix, key, shown(value)));
            }
        }
    }

    if let Some(bearing) = present(map, "bearing") {
        if !in_range(bearing, 0.0, 360.0) {
            errors.push(format!("{} Invalid bearing: {}. Must be between 0 and 360", prefix, shown(bearing)));
        }
    }
    if let Some(pitch) = present(map, "pitch") {
        if !in_range(pitch, 0.0, 60.0) {
            errors.push(format!("{} Invalid pitch: {}. Must be between 0 and 60", prefix, shown(pitch)));
        }
    }

    match present(map, "markers") {
        None => {}
        Some(Value::Array(markers)) => {
            for (marker_index, marker) in markers.iter().enumerate() {
                validate_marker(marker, index, marker_index, errors);
            }
        }
        Some(_) => errors.push(format!("{} Markers must be an array", prefix)),
    }

    if let Some(title) = present(map, "title") {
        validate_title(title, &prefix, errors);
    }
}

fn validate_marker(marker: &Value, map_index: usize, marker_index: usize, errors: &mut Vec<String>) {
    let prefix = format!("Map {}, Marker {}:", map_index, marker_index);
    let Some(marker) = marker.as_object() else {
        errors.push(format!("{} Marker must be an object", prefix));
        return;
    };

    match lng_lat(present(marker, "coordinates")) {
        None => errors.push(format!("{} Coordinates must be an array of [longitude, latitude]", prefix)),
        Some((lng, lat)) => {
            if !in_range(lng, -180.0, 180.0) {
                errors.push(format!("{} Invalid longitude: {}", prefix, shown(lng)));
            }
            if !in_range(lat, -90.0, 90.0) {
                errors.push(format!("{} Invalid latitude: {}", prefix, shown(lat)));
            }
        }
    }

    match present(marker, "icon") {
        None => errors.push(format!("{} Icon is required", prefix)),
        Some(icon) if !one_of(icon, &MarkerIcon::NAMES) => errors.push(format!(
            "{} Invalid icon: {}. Must be one of: {}",
            prefix,
            shown(icon),
            MarkerIcon::NAMES.join(", ")
        )),
        Some(_) => {}
    }

    match present(marker, "color") {
        None => errors.push(format!("{} Color is required", prefix)),
        Some(Value::String(s)) if s.trim().is_empty() => errors.push(format!("{} Color is required", prefix)),
        Some(Value::String(_)) => {}
        Some(_) => errors.push(format!("{} Color must be a string", prefix)),
    }
}

fn validate_title(title: &Value, prefix: &str, errors: &mut Vec<String>) {
    let Some(title) = title.as_object() else {
        errors.push(format!("{} Title must be an object", prefix));
        return;
    };
    if present(title, "enabled").is_some_and(|v| !v.is_boolean()) {
        errors.push(format!("{} Title enabled flag must be a boolean", prefix));
    }
    for key in ["largeText", "smallText", "font"] {
        if present(title, key).is_some_and(|v| !v.is_string()) {
            errors.push(format!("{} Title {} must be a string", prefix, key));
        }
    }
}

fn validate_print(print: &Value, errors: &mut Vec<String>) {
    let Some(print) = print.as_object() else {
        errors.push("Print settings must be an object".to_string());
        return;
    };

    for (key, label) in [("widthCm", "width"), ("heightCm", "height")] {
        match present(print, key).and_then(Value::as_f64) {
            Some(cm) if cm.is_finite() && cm > 0.0 => {
                if cm > MAX_PRINT_CM {
                    errors.push(format!("Print {} exceeds maximum ({}cm)", label, MAX_PRINT_CM));
                }
            }
            _ => errors.push(format!("Invalid print {} (cm)", label)),
        }
    }

    if let Some(dpi) = present(print, "dpi") {
        if !dpi.as_u64().is_some_and(|d| VALID_DPIS.contains(&d)) {
            let valid: Vec<String> = VALID_DPIS.iter().map(u64::to_string).collect();
            errors.push(format!("Invalid DPI: {}. Must be one of: {}", shown(dpi), valid.join(", ")));
        }
    }

    if let Some(orientation) = present(print, "orientation") {
        if !one_of(orientation, &Orientation::NAMES) {
            errors.push(format!(
                "Invalid orientation: {}. Must be one of: {}",
                shown(orientation),
                Orientation::NAMES.join(", ")
            ));
        }
    }
}

/// Check a bare print size and preview size, as accepted by
/// [`crate::dimensions::compute_render_dimensions`].
pub fn validate_dimensions(
    width_cm: f64,
    height_cm: f64,
    dpi: u32,
    preview_width_px: f64,
    preview_height_px: f64,
) -> Validation {
    let mut errors = Vec::new();
    validate_print(
        &serde_json::json!({"widthCm": width_cm, "heightCm": height_cm, "dpi": dpi}),
        &mut errors,
    );
    for (px, label) in [(preview_width_px, "width"), (preview_height_px, "height")] {
        if !(px.is_finite() && px > 0.0) {
            errors.push(format!("Invalid preview {}: {}. Must be a positive number", label, px));
        }
    }
    Validation::from_errors(errors)
}

/// Fill defaults for absent optional fields. Present values are kept as-is.
pub fn sanitize_config(config: &Value) -> Value {
    let mut sanitized = config.clone();
    let Some(root) = sanitized.as_object_mut() else {
        return sanitized;
    };

    if let Some(Value::Array(maps)) = root.get_mut("maps") {
        for map in maps.iter_mut().filter_map(Value::as_object_mut) {
            fill(map, "bearing", Value::from(0.0));
            fill(map, "pitch", Value::from(0.0));
            fill(map, "markers", Value::Array(Vec::new()));
            fill(map, "containerWidth", Value::from(DEFAULT_CONTAINER_PX));
            fill(map, "containerHeight", Value::from(DEFAULT_CONTAINER_PX));
        }
    }

    if let Some(print) = root.get_mut("print").and_then(Value::as_object_mut) {
        fill(print, "widthCm", Value::from(DEFAULT_WIDTH_CM));
        fill(print, "heightCm", Value::from(DEFAULT_HEIGHT_CM));
        fill(print, "dpi", Value::from(DEFAULT_DPI));
        fill(print, "orientation", Value::from(DEFAULT_ORIENTATION));
    }

    sanitized
}

/// Validate, fill defaults and convert into the typed model.
pub fn normalize(config: &Value) -> Result<PosterConfig> {
    validate_config(config).into_result()?;
    let sanitized = sanitize_config(config);
    serde_json::from_value(sanitized).map_err(|e| Error::ConfigError(e.to_string()))
}

fn present<'a>(obj: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    obj.get(key).filter(|v| !v.is_null())
}

fn fill(obj: &mut Map<String, Value>, key: &str, default: Value) {
    if present(obj, key).is_none() {
        obj.insert(key.to_string(), default);
    }
}

fn lng_lat(value: Option<&Value>) -> Option<(&Value, &Value)> {
    match value? {
        Value::Array(pair) if pair.len() == 2 => Some((&pair[0], &pair[1])),
        _ => None,
    }
}

fn in_range(value: &Value, min: f64, max: f64) -> bool {
    value.as_f64().is_some_and(|n| n >= min && n <= max)
}

fn one_of(value: &Value, names: &[&str]) -> bool {
    value.as_str().is_some_and(|s| names.contains(&s))
}

fn shown(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid_config() -> Value {
        json!({
            "layout": {"type": "single", "shape": "circle"},
            "maps": [{
                "center": [-80.1918, 25.7617],
                "zoom": 13,
                "style": "minimal",
                "containerWidth": 640,
                "containerHeight": 640
            }],
            "print": {"widthCm": 80, "heightCm": 60, "dpi": 200}
        })
    }

    #[test]
    fn accepts_minimal_single_layout() {
        let v = validate_config(&valid_config());
        assert!(v.valid, "unexpected errors: {:?}", v.errors);
        assert!(v.errors.is_empty());
    }

    #[test]
    fn accumulates_errors_across_sections() {
        let config = json!({
            "maps": [],
            "print": {"widthCm": 250, "heightCm": 60}
        });
        let v = validate_config(&config);
        assert!(!v.valid);
        assert!(v.errors.contains(&"Layout configuration is required".to_string()));
        assert!(v.errors.contains(&"At least one map is required".to_string()));
        assert!(v.errors.contains(&"Print width exceeds maximum (200cm)".to_string()));
        assert!(v.errors.len() >= 3);
    }

    #[test]
    fn non_object_config_is_rejected() {
        let v = validate_config(&Value::Null);
        assert_eq!(v.errors, vec!["Configuration is required".to_string()]);
    }

    #[test]
    fn reports_map_errors_by_index() {
        let mut config = valid_config();
        config["layout"]["type"] = json!("double");
        config["maps"] = json!([
            {"center": [-80.0, 25.0], "zoom": 13, "style": "minimal"},
            {"center": [200.0, 95.0], "zoom": 30, "style": "", "bearing": 400, "pitch": 70}
        ]);
        let v = validate_config(&config);
        let errors = v.errors.join("\n");
        assert!(!errors.contains("Map 0:"), "{}", errors);
        assert!(errors.contains("Map 1: Invalid longitude: 200.0"));
        assert!(errors.contains("Map 1: Invalid latitude: 95.0"));
        assert!(errors.contains("Map 1: Invalid zoom: 30"));
        assert!(errors.contains("Map 1: Style is required"));
        assert!(errors.contains("Map 1: Invalid bearing: 400"));
        assert!(errors.contains("Map 1: Invalid pitch: 70"));
    }

    #[test]
    fn rejects_bad_layout_values() {
        let mut config = valid_config();
        config["layout"] = json!({"type": "quad", "shape": "hexagon"});
        let v = validate_config(&config);
        assert!(v.errors.iter().any(|e| e.starts_with("Invalid layout type: quad")));
        assert!(v.errors.iter().any(|e| e.starts_with("Invalid layout shape: hexagon")));
    }

    #[test]
    fn layout_cardinality_must_match_map_count() {
        let mut config = valid_config();
        config["layout"]["type"] = json!("triple");
        let v = validate_config(&config);
        assert_eq!(v.errors, vec!["Layout triple requires 3 map(s), got 1".to_string()]);
    }

    #[test]
    fn validates_markers() {
        let mut config = valid_config();
        config["maps"][0]["markers"] = json!([
            {"coordinates": [-80.19, 25.76], "icon": "heart", "color": "#E63946"},
            {"coordinates": [-80.19], "icon": "pin", "color": ""},
            {"coordinates": [-190, 25.0], "color": 7}
        ]);
        let v = validate_config(&config);
        let errors = v.errors.join("\n");
        assert!(!errors.contains("Marker 0:"));
        assert!(errors.contains("Map 0, Marker 1: Coordinates must be an array"));
        assert!(errors.contains("Map 0, Marker 1: Invalid icon: pin"));
        assert!(errors.contains("Map 0, Marker 1: Color is required"));
        assert!(errors.contains("Map 0, Marker 2: Invalid longitude: -190"));
        assert!(errors.contains("Map 0, Marker 2: Icon is required"));
        assert!(errors.contains("Map 0, Marker 2: Color must be a string"));
    }

    #[test]
    fn rejects_unsupported_dpi_and_orientation() {
        let mut config = valid_config();
        config["print"]["dpi"] = json!(600);
        config["print"]["orientation"] = json!("diagonal");
        let v = validate_config(&config);
        assert!(v.errors.contains(&"Invalid DPI: 600. Must be one of: 150, 200, 300".to_string()));
        assert!(v.errors.iter().any(|e| e.starts_with("Invalid orientation: diagonal")));
    }

    #[test]
    fn rejects_non_positive_container() {
        let mut config = valid_config();
        config["maps"][0]["containerWidth"] = json!(0);
        config["maps"][0]["containerHeight"] = json!("wide");
        let v = validate_config(&config);
        assert!(v.errors.contains(&"Map 0: Invalid containerWidth: 0".to_string()));
        assert!(v.errors.contains(&"Map 0: Invalid containerHeight: wide".to_string()));
    }

    #[test]
    fn checks_bare_dimensions() {
        assert!(validate_dimensions(80.0, 60.0, 200, 640.0, 640.0).valid);

        let v = validate_dimensions(80.0, 60.0, 600, 0.0, 640.0);
        assert!(!v.valid);
        assert!(v.errors.contains(&"Invalid DPI: 600. Must be one of: 150, 200, 300".to_string()));
        assert!(v.errors.iter().any(|e| e.starts_with("Invalid preview width")));

        let v = validate_dimensions(250.0, -1.0, 150, 640.0, f64::NAN);
        assert_eq!(
            v.errors,
            vec![
                "Print width exceeds maximum (200cm)".to_string(),
                "Invalid print height (cm)".to_string(),
                "Invalid preview height: NaN. Must be a positive number".to_string(),
            ]
        );
    }

    #[test]
    fn sanitize_fills_only_absent_fields() {
        let mut config = valid_config();
        config["maps"][0]["bearing"] = json!(45);
        config["maps"][0]["containerWidth"] = Value::Null;
        let sanitized = sanitize_config(&config);
        let map = &sanitized["maps"][0];
        assert_eq!(map["bearing"], json!(45));
        assert_eq!(map["pitch"], json!(0.0));
        assert_eq!(map["markers"], json!([]));
        assert_eq!(map["containerWidth"], json!(640.0));
        assert_eq!(sanitized["print"]["dpi"], json!(200));
        assert_eq!(sanitized["print"]["orientation"], json!("landscape"));
    }

    #[test]
    fn sanitized_config_stays_valid() {
        let config = valid_config();
        assert!(validate_config(&config).valid);
        let sanitized = sanitize_config(&config);
        let v = validate_config(&sanitized);
        assert!(v.valid, "sanitize introduced errors: {:?}", v.errors);
    }

    #[test]
    fn normalize_produces_typed_config() {
        let config = normalize(&valid_config()).unwrap();
        assert_eq!(config.maps.len(), 1);
        assert_eq!(config.maps[0].container_width, 640.0);
        assert_eq!(config.print.dpi, 200);
        assert_eq!(config.print.orientation, Orientation::Landscape);
    }

    #[test]
    fn normalize_rejects_invalid_config() {
        let mut config = valid_config();
        config["print"]["widthCm"] = json!(250);
        match normalize(&config) {
            Err(Error::Validation(errors)) => {
                assert_eq!(errors, vec!["Print width exceeds maximum (200cm)".to_string()]);
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }
}
