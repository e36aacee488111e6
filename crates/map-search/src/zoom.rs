//! Viewport fitting over the features of a selection.

use map_search_data::Feature;
use serde::Serialize;
use tracing::{debug, instrument};

pub use error::ZoomError;

use crate::highlight::{MapMutation, Selection};

/// Padding, in pixels, around the fitted bounds.
pub const ZOOM_PADDING: f64 = 100.0;

/// Axis-aligned bounds `[min_x, min_y, max_x, max_y]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(into = "[f64; 4]")]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    fn point(x: f64, y: f64) -> Self {
        Self {
            min_x: x,
            min_y: y,
            max_x: x,
            max_y: y,
        }
    }

    fn extend(&mut self, x: f64, y: f64) {
        self.min_x = self.min_x.min(x);
        self.min_y = self.min_y.min(y);
        self.max_x = self.max_x.max(x);
        self.max_y = self.max_y.max(y);
    }

    /// Bounds over every coordinate of `features`; `None` when there are none.
    pub fn of_features<'a>(features: impl IntoIterator<Item = &'a Feature>) -> Option<Self> {
        let mut bounds: Option<Self> = None;
        for geometry in features.into_iter().filter_map(|f| f.geometry.as_ref()) {
            geometry.visit_positions(&mut |x, y| {
                bounds = Some(match bounds {
                    Some(mut b) => {
                        b.extend(x, y);
                        b
                    }
                    None => Self::point(x, y),
                });
            });
        }
        bounds
    }

    #[must_use]
    pub const fn to_array(self) -> [f64; 4] {
        [self.min_x, self.min_y, self.max_x, self.max_y]
    }
}

impl From<BoundingBox> for [f64; 4] {
    fn from(bounds: BoundingBox) -> Self {
        bounds.to_array()
    }
}

/// Current camera orientation, carried through a fit.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ViewHints {
    pub pitch: f64,
    pub bearing: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FitBoundsOptions {
    pub pitch: f64,
    pub bearing: f64,
    pub padding: f64,
}

impl FitBoundsOptions {
    #[must_use]
    pub const fn keeping(view: ViewHints) -> Self {
        Self {
            pitch: view.pitch,
            bearing: view.bearing,
            padding: ZOOM_PADDING,
        }
    }
}

pub struct ViewportZoomer;

impl ViewportZoomer {
    /// Fit the viewport to every feature whose `selection.key` property equals
    /// `selection.value`, keeping the current pitch and bearing.
    #[instrument(name = "Zoom to selection", level = "debug", skip_all, fields(key = %selection.key))]
    pub fn zoom_to(
        features: &[Feature],
        selection: &Selection,
        view: ViewHints,
    ) -> Result<MapMutation, ZoomError> {
        let matched = features.iter().filter(|f| selection.matches(f));
        let bounds = BoundingBox::of_features(matched).ok_or(ZoomError::NoFeatures)?;
        debug!(bounds = ?bounds.to_array(), "Fitting viewport");
        Ok(MapMutation::FitBounds {
            bounds,
            options: FitBoundsOptions::keeping(view),
        })
    }
}

mod error {
    use thiserror::Error;

    #[derive(Error, Debug, Clone, PartialEq, Eq)]
    pub enum ZoomError {
        #[error("No features with coordinates match the selection")]
        NoFeatures,
    }
}
