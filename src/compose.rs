use crate::config::ExportConfig;
use crate::error::TrimlineError;
use tiny_skia::{Pixmap, PixmapPaint, Transform};

/// One finished output page: a slice of the capture raster, encoded for
/// embedding. `height_px` is the slice height, at most the printable page
/// height; the final page is usually shorter.
#[derive(Debug, Clone)]
pub struct PageSlice {
    pub index: usize,
    pub width_px: u32,
    pub height_px: u32,
    pub jpeg: Vec<u8>,
}

/// Crop the raster into per-page canvases along the break sequence and
/// encode each as a JPEG payload. Slices are produced in order and the
/// first failure aborts the remainder; no partial output escapes.
pub fn compose_pages(
    raster: &Pixmap,
    breaks: &[f32],
    page_height_px: f32,
    config: &ExportConfig,
) -> Result<Vec<PageSlice>, TrimlineError> {
    if !page_height_px.is_finite() || page_height_px <= 0.0 {
        return Err(TrimlineError::InvalidConfiguration(format!(
            "compositor page_height_px must be positive (got {})",
            page_height_px
        )));
    }

    // Round each break once so adjacent slices share the same cut row.
    let rows: Vec<i64> = breaks.iter().map(|b| b.round() as i64).collect();
    let page_rows = (page_height_px.round() as i64).max(1);

    let mut pages = Vec::new();
    for (index, pair) in rows.windows(2).enumerate() {
        let (top, bottom) = (pair[0], pair[1]);
        let source_height = bottom - top;
        if source_height <= 0 {
            // Degenerate interval from a planner edge case: emit nothing.
            continue;
        }
        let height = source_height.min(page_rows) as u32;
        let canvas = slice_page(raster, top, height)?;
        let jpeg = encode_page_jpeg(&canvas, config.jpeg_quality)?;
        pages.push(PageSlice {
            index,
            width_px: canvas.width(),
            height_px: canvas.height(),
            jpeg,
        });
    }
    Ok(pages)
}

/// White-filled page canvas holding the raster rows `top..top + height`.
pub(crate) fn slice_page(
    raster: &Pixmap,
    top: i64,
    height: u32,
) -> Result<Pixmap, TrimlineError> {
    let mut canvas = Pixmap::new(raster.width(), height).ok_or_else(|| {
        TrimlineError::Compositing(format!(
            "invalid page canvas size {}x{}",
            raster.width(),
            height
        ))
    })?;
    // White background: partial captures must not leave transparent gaps.
    canvas.fill(tiny_skia::Color::from_rgba8(255, 255, 255, 255));
    let offset = (-top).clamp(i32::MIN as i64, i32::MAX as i64) as i32;
    canvas.draw_pixmap(
        0,
        offset,
        raster.as_ref(),
        &PixmapPaint::default(),
        Transform::identity(),
        None,
    );
    Ok(canvas)
}

fn encode_page_jpeg(canvas: &Pixmap, quality: u8) -> Result<Vec<u8>, TrimlineError> {
    let mut rgb = Vec::with_capacity(canvas.width() as usize * canvas.height() as usize * 3);
    for px in canvas.pixels() {
        let c = px.demultiply();
        rgb.extend_from_slice(&[c.red(), c.green(), c.blue()]);
    }
    let mut jpeg = Vec::new();
    let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut jpeg, quality);
    encoder
        .encode(
            &rgb,
            canvas.width(),
            canvas.height(),
            image::ExtendedColorType::Rgb8,
        )
        .map_err(|e| TrimlineError::Compositing(format!("jpeg encode failed: {e}")))?;
    Ok(jpeg)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Raster whose every row r is the solid color (r, r, r).
    fn banded_raster(width: u32, height: u32) -> Pixmap {
        let mut pixmap = Pixmap::new(width, height).expect("raster");
        let data = pixmap.data_mut();
        for row in 0..height {
            let v = row as u8;
            for col in 0..width {
                let at = ((row * width + col) * 4) as usize;
                data[at] = v;
                data[at + 1] = v;
                data[at + 2] = v;
                data[at + 3] = 255;
            }
        }
        pixmap
    }

    fn row_value(canvas: &Pixmap, row: u32) -> u8 {
        let px = canvas.pixel(0, row).expect("pixel in bounds");
        px.demultiply().red()
    }

    #[test]
    fn slices_carry_the_rows_between_their_breaks() {
        let raster = banded_raster(4, 20);
        let first = slice_page(&raster, 0, 8).expect("first slice");
        let second = slice_page(&raster, 8, 12).expect("second slice");
        assert_eq!(row_value(&first, 0), 0);
        assert_eq!(row_value(&first, 7), 7);
        assert_eq!(row_value(&second, 0), 8);
        assert_eq!(row_value(&second, 11), 19);
    }

    #[test]
    fn rows_past_the_raster_stay_white() {
        let raster = banded_raster(4, 10);
        let canvas = slice_page(&raster, 6, 8).expect("slice");
        assert_eq!(row_value(&canvas, 0), 6);
        assert_eq!(row_value(&canvas, 3), 9);
        // Raster ends at row 10; the canvas below it is white fill.
        assert_eq!(row_value(&canvas, 4), 255);
        assert_eq!(row_value(&canvas, 7), 255);
    }

    #[test]
    fn degenerate_intervals_emit_no_page() {
        let raster = banded_raster(4, 20);
        let pages = compose_pages(
            &raster,
            &[0.0, 8.0, 8.0, 20.0],
            8.0,
            &ExportConfig::default(),
        )
        .expect("compose");
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].height_px, 8);
        assert_eq!(pages[1].height_px, 8);
    }

    #[test]
    fn page_payloads_are_jpeg() {
        let raster = banded_raster(16, 32);
        let pages = compose_pages(&raster, &[0.0, 20.0, 32.0], 20.0, &ExportConfig::default())
            .expect("compose");
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].height_px, 20);
        assert_eq!(pages[1].height_px, 12);
        for page in &pages {
            assert_eq!(&page.jpeg[..2], &[0xFF, 0xD8], "missing JPEG SOI marker");
        }
    }

    #[test]
    fn slice_height_is_capped_at_the_page_height() {
        // An over-tall interval (compositor contract: min(source, page)).
        let raster = banded_raster(4, 30);
        let pages = compose_pages(&raster, &[0.0, 30.0], 12.0, &ExportConfig::default())
            .expect("compose");
        assert_eq!(pages[0].height_px, 12);
    }

    #[test]
    fn non_positive_page_height_is_rejected() {
        let raster = banded_raster(4, 10);
        let err =
            compose_pages(&raster, &[0.0, 10.0], 0.0, &ExportConfig::default()).unwrap_err();
        assert!(matches!(err, TrimlineError::InvalidConfiguration(_)));
    }
}
