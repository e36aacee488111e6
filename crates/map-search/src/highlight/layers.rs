use serde::Serialize;
use serde_json::{Map, Value, json};

use super::FilterExpr;
use crate::config::LayerConfig;

const OUTLINE_WIDTH: u32 = 5;

/// Render type of a highlight overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OverlayKind {
    Line,
    Circle,
}

/// Overlay drawn on top of a searchable layer to show the current selection.
///
/// Serializes to the style-layer object a map host expects:
/// `{"id", "type", "source", "paint", "filter"}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HighlightLayerSpec {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: OverlayKind,
    pub source: String,
    pub paint: Map<String, Value>,
    pub filter: FilterExpr,
}

impl HighlightLayerSpec {
    /// Outlined line overlay for polygons and lines, a hollow ring for everything else.
    /// Starts out matching nothing.
    #[must_use]
    pub fn for_layer(layer: &LayerConfig) -> Self {
        let color = &layer.highlight_color;
        let (kind, paint) = if layer.geometry_type.is_outlined() {
            (
                OverlayKind::Line,
                json!({
                    "line-color": color,
                    "line-width": OUTLINE_WIDTH,
                }),
            )
        } else {
            (
                OverlayKind::Circle,
                json!({
                    "circle-opacity": 0,
                    "circle-stroke-color": color,
                    "circle-stroke-width": OUTLINE_WIDTH,
                }),
            )
        };
        let paint = match paint {
            Value::Object(paint) => paint,
            _ => Map::new(),
        };

        Self {
            id: layer.highlight_layer_id(),
            kind,
            source: layer.source.clone(),
            paint,
            filter: FilterExpr::empty_match(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GeometryType;

    #[test]
    fn test_polygon_overlay_is_outlined() {
        let layer = LayerConfig::builder("parks", "Parks")
            .geometry_type(GeometryType::Polygon)
            .highlight_color("#f00")
            .build();
        let spec = HighlightLayerSpec::for_layer(&layer);

        assert_eq!(
            serde_json::to_value(&spec).unwrap(),
            json!({
                "id": "parks_highlighted_search__",
                "type": "line",
                "source": "parks",
                "paint": {"line-color": "#f00", "line-width": 5},
                "filter": ["in", "_highlighted_search__", ""]
            })
        );
    }

    #[test]
    fn test_point_overlay_is_a_ring() {
        let layer = LayerConfig::builder("wells", "Wells").build();
        let spec = HighlightLayerSpec::for_layer(&layer);

        assert_eq!(spec.kind, OverlayKind::Circle);
        assert_eq!(spec.paint["circle-opacity"], json!(0));
        assert_eq!(spec.paint["circle-stroke-color"], json!("#ff0"));
        assert_eq!(spec.paint["circle-stroke-width"], json!(5));
        assert_eq!(spec.filter, FilterExpr::empty_match());
    }

    #[test]
    fn test_line_types_share_the_outline() {
        for geometry_type in [GeometryType::LineString, GeometryType::Line] {
            let layer = LayerConfig::builder("trails", "Trails")
                .geometry_type(geometry_type)
                .build();
            assert_eq!(HighlightLayerSpec::for_layer(&layer).kind, OverlayKind::Line);
        }
    }
}
