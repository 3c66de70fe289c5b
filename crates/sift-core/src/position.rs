use serde::{Deserialize, Serialize};
use tracing::debug;

/// Horizontal extent of the element that opens a flyout, in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub left: f64,
    pub right: f64,
}

impl Rect {
    pub fn new(left: f64, right: f64) -> Self {
        Self { left, right }
    }

    pub fn width(&self) -> f64 {
        self.right - self.left
    }
}

/// Which edge of the trigger the flyout is anchored to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Placement {
    Left,
    #[default]
    Right,
}

impl Placement {
    pub fn as_key(self) -> &'static str {
        match self {
            Placement::Left => "left",
            Placement::Right => "right",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FlyoutMetrics {
    pub width: f64,
    pub padding: f64,
}

impl Default for FlyoutMetrics {
    fn default() -> Self {
        Self {
            width: 296.0,
            padding: 16.0,
        }
    }
}

/// Resolved layout for one open event.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FlyoutPosition {
    pub placement: Placement,
    pub width: f64,
}

/// Trigger geometry captured when the flyout is opened.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TriggerGeometry {
    pub trigger: Rect,
    pub viewport_width: f64,
}

impl TriggerGeometry {
    pub fn new(trigger: Rect, viewport_width: f64) -> Self {
        Self {
            trigger,
            viewport_width,
        }
    }
}

pub fn resolve_position(trigger: &Rect, viewport_width: f64, metrics: FlyoutMetrics) -> Placement {
    let overflows_right = trigger.right + metrics.width > viewport_width - metrics.padding;
    let overflows_left = trigger.left - metrics.width < metrics.padding;

    if overflows_right && !overflows_left {
        Placement::Left
    } else {
        Placement::Right
    }
}

/// Width the flyout may occupy inside the padded viewport.
pub fn clamped_flyout_width(viewport_width: f64, metrics: FlyoutMetrics) -> f64 {
    metrics
        .width
        .min(viewport_width - 2.0 * metrics.padding)
        .max(0.0)
}

/// Computes placement and width for a single open. Never cached: the
/// trigger may have moved since the previous open.
pub fn resolve_flyout(geometry: TriggerGeometry, metrics: FlyoutMetrics) -> FlyoutPosition {
    let placement = resolve_position(&geometry.trigger, geometry.viewport_width, metrics);
    let width = clamped_flyout_width(geometry.viewport_width, metrics);
    debug!(
        left = geometry.trigger.left,
        right = geometry.trigger.right,
        viewport = geometry.viewport_width,
        placement = placement.as_key(),
        width,
        "resolved flyout position"
    );
    FlyoutPosition { placement, width }
}
