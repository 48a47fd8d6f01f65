use crate::error::TrimlineError;
use tiny_skia::Pixmap;

/// Vertical extent of content that must not be split across a page boundary
/// (tables, metric cards, chart containers). Source pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AvoidRegion {
    pub top: f32,
    pub bottom: f32,
}

/// Start of a logical section; a preferred place for a new page to begin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TitleMarker {
    pub top: f32,
}

/// Measured geometry of the document being exported, in the same coordinate
/// space as the capture at scale 1. The exporter maps these into raster space
/// with [`LayoutMeasurements::scaled`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayoutMeasurements {
    pub avoid_regions: Vec<AvoidRegion>,
    pub title_markers: Vec<TitleMarker>,
}

impl LayoutMeasurements {
    pub fn scaled(&self, scale: f32) -> LayoutMeasurements {
        LayoutMeasurements {
            avoid_regions: self
                .avoid_regions
                .iter()
                .map(|r| AvoidRegion {
                    top: r.top * scale,
                    bottom: r.bottom * scale,
                })
                .collect(),
            title_markers: self
                .title_markers
                .iter()
                .map(|t| TitleMarker { top: t.top * scale })
                .collect(),
        }
    }
}

/// The capture side of an export: something that can render itself into one
/// tall raster and report where its break-sensitive content sits. Pixels and
/// measurements must share a coordinate space; the layout must not change
/// between `measure` and `capture` within one export.
pub trait DocumentSource {
    /// Rendered content width in unscaled pixels.
    fn content_width(&self) -> u32;

    /// Render the entire document into a single bitmap at the given
    /// supersampling scale. Width = `content_width() * scale`.
    fn capture(&self, scale: f32) -> Result<Pixmap, TrimlineError>;

    /// Avoid-break regions and section-title markers, unscaled.
    fn measure(&self) -> LayoutMeasurements;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scaling_maps_both_kinds_of_marks() {
        let m = LayoutMeasurements {
            avoid_regions: vec![AvoidRegion {
                top: 10.0,
                bottom: 40.0,
            }],
            title_markers: vec![TitleMarker { top: 25.0 }],
        };
        let s = m.scaled(2.0);
        assert_eq!(s.avoid_regions[0].top, 20.0);
        assert_eq!(s.avoid_regions[0].bottom, 80.0);
        assert_eq!(s.title_markers[0].top, 50.0);
    }
}
