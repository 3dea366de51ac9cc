//! Seal placement on the first page.
//!
//! The [`ExclusionZone`] returned by [`SealPlacement::calculate`] is the only
//! rectangle that should be handed both to the fingerprint engine and to the
//! renderer that draws the seal.

use serde::{Deserialize, Serialize};

use crate::color::FillColor;
use crate::error::{Result, SealError};
use crate::package::ExclusionZone;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealPlacement {
    pub exclusion_zone: ExclusionZone,
    /// Side length of the square seal in pixels
    pub size_px: u32,
}

impl SealPlacement {
    /// Place a square seal.
    ///
    /// `x_percent`/`y_percent` position the seal's top-left corner as a
    /// percentage of the page; `size_percent` is the side length as a
    /// percentage of the shorter page side. The seal is shifted back inside
    /// the page when the requested position would push it over an edge.
    pub fn calculate(
        x_percent: f64,
        y_percent: f64,
        size_percent: f64,
        page_width: u32,
        page_height: u32,
        fill_color: FillColor,
    ) -> Result<Self> {
        if page_width == 0 || page_height == 0 {
            return Err(SealError::GeometryOutOfBounds(format!(
                "page has zero area ({}x{})",
                page_width, page_height
            )));
        }
        for (name, value) in [("x", x_percent), ("y", y_percent)] {
            if !value.is_finite() || !(0.0..=100.0).contains(&value) {
                return Err(SealError::GeometryOutOfBounds(format!(
                    "{} position {} is outside 0..=100%",
                    name, value
                )));
            }
        }
        if !size_percent.is_finite() || size_percent <= 0.0 || size_percent > 100.0 {
            return Err(SealError::GeometryOutOfBounds(format!(
                "seal size {} is outside (0, 100]%",
                size_percent
            )));
        }

        let shorter = page_width.min(page_height);
        let size_px = ((shorter as f64 * size_percent / 100.0).round() as u32).clamp(1, shorter);

        let max_x = page_width - size_px;
        let max_y = page_height - size_px;
        let x = ((page_width as f64 * x_percent / 100.0).round() as u32).min(max_x);
        let y = ((page_height as f64 * y_percent / 100.0).round() as u32).min(max_y);

        Ok(Self {
            exclusion_zone: ExclusionZone::new(x, y, size_px, size_px, fill_color),
            size_px,
        })
    }

    /// Whether `zone` is exactly the rectangle this placement draws into.
    pub fn covers(&self, zone: &ExclusionZone) -> bool {
        self.exclusion_zone.x == zone.x
            && self.exclusion_zone.y == zone.y
            && self.exclusion_zone.width == zone.width
            && self.exclusion_zone.height == zone.height
    }

    /// Y coordinate of the seal's bottom-left corner in a bottom-up (PDF)
    /// coordinate system.
    pub fn pdf_origin_y(&self, page_height: u32) -> u32 {
        page_height.saturating_sub(self.exclusion_zone.bottom())
    }
}
