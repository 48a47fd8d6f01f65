use crate::error::TrimlineError;

/// Export configuration. Defaults reproduce the page geometry and break
/// heuristics of the original report exporter; the threshold values are
/// deliberately kept, not re-tuned.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExportConfig {
    pub page_width_mm: f32,
    pub page_height_mm: f32,
    /// Uniform page margin. The first page is drawn flush to the top edge;
    /// every later page is offset by this margin.
    pub margin_mm: f32,
    /// Supersampling factor applied to the capture raster.
    pub capture_scale: f32,
    /// A title closer than this to a naive cut pulls the cut up to sit just
    /// before the title, so a new page starts at the section boundary.
    pub title_proximity_threshold_px: f32,
    /// Fraction of the page height that must remain on the current page for
    /// an avoidance move to be taken. Prevents runaway tiny pages.
    pub min_page_content_fraction: f32,
    /// How far above a title or region the moved cut lands.
    pub break_backoff_px: f32,
    /// Quality for the per-page JPEG payloads embedded in the PDF.
    pub jpeg_quality: u8,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            page_width_mm: 210.0,
            page_height_mm: 297.0,
            margin_mm: 10.0,
            capture_scale: 2.0,
            title_proximity_threshold_px: 150.0,
            min_page_content_fraction: 0.25,
            break_backoff_px: 5.0,
            jpeg_quality: 90,
        }
    }
}

impl ExportConfig {
    /// Printable content height of one page, in millimeters.
    pub fn printable_height_mm(&self) -> f32 {
        self.page_height_mm - 2.0 * self.margin_mm
    }

    pub(crate) fn validate(&self) -> Result<(), TrimlineError> {
        fn positive(name: &str, value: f32) -> Result<(), TrimlineError> {
            if !value.is_finite() || value <= 0.0 {
                return Err(TrimlineError::InvalidConfiguration(format!(
                    "{} must be positive (got {})",
                    name, value
                )));
            }
            Ok(())
        }

        positive("page_width_mm", self.page_width_mm)?;
        positive("page_height_mm", self.page_height_mm)?;
        positive("capture_scale", self.capture_scale)?;
        positive("title_proximity_threshold_px", self.title_proximity_threshold_px)?;
        if !self.margin_mm.is_finite() || self.margin_mm < 0.0 {
            return Err(TrimlineError::InvalidConfiguration(format!(
                "margin_mm must be non-negative (got {})",
                self.margin_mm
            )));
        }
        if self.printable_height_mm() <= 0.0 {
            return Err(TrimlineError::InvalidConfiguration(format!(
                "margin_mm {} leaves no printable height on a {}mm page",
                self.margin_mm, self.page_height_mm
            )));
        }
        if !self.min_page_content_fraction.is_finite()
            || self.min_page_content_fraction <= 0.0
            || self.min_page_content_fraction >= 1.0
        {
            return Err(TrimlineError::InvalidConfiguration(format!(
                "min_page_content_fraction must be in (0, 1) (got {})",
                self.min_page_content_fraction
            )));
        }
        if !self.break_backoff_px.is_finite() || self.break_backoff_px < 0.0 {
            return Err(TrimlineError::InvalidConfiguration(format!(
                "break_backoff_px must be non-negative (got {})",
                self.break_backoff_px
            )));
        }
        if self.jpeg_quality == 0 || self.jpeg_quality > 100 {
            return Err(TrimlineError::InvalidConfiguration(format!(
                "jpeg_quality must be in 1..=100 (got {})",
                self.jpeg_quality
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TrimlineError;

    #[test]
    fn default_config_is_valid() {
        ExportConfig::default().validate().expect("defaults validate");
    }

    #[test]
    fn default_config_matches_source_constants() {
        let cfg = ExportConfig::default();
        assert_eq!(cfg.page_width_mm, 210.0);
        assert_eq!(cfg.page_height_mm, 297.0);
        assert_eq!(cfg.margin_mm, 10.0);
        assert_eq!(cfg.capture_scale, 2.0);
        assert_eq!(cfg.title_proximity_threshold_px, 150.0);
        assert_eq!(cfg.min_page_content_fraction, 0.25);
        assert_eq!(cfg.break_backoff_px, 5.0);
    }

    #[test]
    fn validation_names_the_offending_field() {
        let mut cfg = ExportConfig::default();
        cfg.capture_scale = 0.0;
        let err = cfg.validate().unwrap_err();
        assert!(matches!(err, TrimlineError::InvalidConfiguration(_)));
        assert!(err.to_string().contains("capture_scale"));

        let mut cfg = ExportConfig::default();
        cfg.min_page_content_fraction = 1.0;
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("min_page_content_fraction"));

        let mut cfg = ExportConfig::default();
        cfg.margin_mm = 150.0;
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("printable height"));

        let mut cfg = ExportConfig::default();
        cfg.jpeg_quality = 0;
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("jpeg_quality"));
    }
}
