use crate::error::TrimlineError;
use crate::measure::{AvoidRegion, DocumentSource, LayoutMeasurements, TitleMarker};
use crate::types::Color;
use base64::Engine;
use tiny_skia::{
    FillRule, FilterQuality, Paint, PathBuilder, Pixmap, PixmapPaint, Rect, Stroke, Transform,
};

/// A4 width at 96 DPI; the content width the original reports rendered at.
pub const DEFAULT_CONTENT_WIDTH: u32 = 794;

const PADDING_X: f32 = 24.0;
const BLOCK_GAP: f32 = 16.0;
const TITLE_HEIGHT: f32 = 44.0;
const LINE_HEIGHT: f32 = 18.0;
const TABLE_HEADER_HEIGHT: f32 = 28.0;
const TABLE_ROW_HEIGHT: f32 = 24.0;

/// One vertical slab of report content. Tables, chart panels and images are
/// keep-together content; titles are preferred page-start locations.
#[derive(Debug)]
enum Block {
    Title { text: String },
    Paragraph { lines: u32 },
    Table { rows: u32 },
    ChartPanel { height: f32 },
    Image { pixmap: Pixmap },
    Spacer { height: f32 },
}

impl Block {
    fn avoids_breaks(&self) -> bool {
        matches!(
            self,
            Block::Table { .. } | Block::ChartPanel { .. } | Block::Image { .. }
        )
    }

    fn height(&self, inner_width: f32) -> f32 {
        match self {
            Block::Title { .. } => TITLE_HEIGHT,
            Block::Paragraph { lines } => *lines as f32 * LINE_HEIGHT + 8.0,
            Block::Table { rows } => TABLE_HEADER_HEIGHT + *rows as f32 * TABLE_ROW_HEIGHT,
            Block::ChartPanel { height } => *height,
            Block::Image { pixmap } => {
                inner_width * pixmap.height() as f32 / pixmap.width() as f32
            }
            Block::Spacer { height } => *height,
        }
    }
}

/// A report document assembled from stacked blocks. Layout is deterministic,
/// so the captured pixels and the measured geometry always agree.
#[derive(Debug)]
pub struct Story {
    width: u32,
    blocks: Vec<Block>,
}

impl Default for Story {
    fn default() -> Self {
        Self::new()
    }
}

impl Story {
    pub fn new() -> Self {
        Self::with_width(DEFAULT_CONTENT_WIDTH)
    }

    pub fn with_width(width: u32) -> Self {
        Self {
            width: width.max(1),
            blocks: Vec::new(),
        }
    }

    pub fn title(mut self, text: impl Into<String>) -> Self {
        self.blocks.push(Block::Title { text: text.into() });
        self
    }

    pub fn paragraph(mut self, lines: u32) -> Self {
        self.blocks.push(Block::Paragraph { lines });
        self
    }

    pub fn table(mut self, rows: u32) -> Self {
        self.blocks.push(Block::Table { rows });
        self
    }

    pub fn chart(mut self, height: f32) -> Self {
        self.blocks.push(Block::ChartPanel { height });
        self
    }

    pub fn spacer(mut self, height: f32) -> Self {
        self.blocks.push(Block::Spacer { height });
        self
    }

    /// Embed a bitmap from a file path or a `data:` URI. Decoded eagerly so
    /// layout heights are known before capture.
    pub fn image(mut self, source: &str) -> Result<Self, TrimlineError> {
        let pixmap = load_image_pixmap(source)?;
        self.blocks.push(Block::Image { pixmap });
        Ok(self)
    }

    fn inner_width(&self) -> f32 {
        (self.width as f32 - 2.0 * PADDING_X).max(1.0)
    }

    /// Walk the block stack, yielding each block with its top coordinate.
    fn layout(&self) -> Vec<(f32, f32, &Block)> {
        let inner = self.inner_width();
        let mut out = Vec::with_capacity(self.blocks.len());
        let mut y = BLOCK_GAP;
        for block in &self.blocks {
            let height = block.height(inner);
            out.push((y, height, block));
            y += height + BLOCK_GAP;
        }
        out
    }

    /// Natural (unscaled) pixel height of the whole document.
    pub fn total_height(&self) -> f32 {
        let inner = self.inner_width();
        let mut y = BLOCK_GAP;
        for block in &self.blocks {
            y += block.height(inner) + BLOCK_GAP;
        }
        y
    }
}

impl DocumentSource for Story {
    fn content_width(&self) -> u32 {
        self.width
    }

    fn capture(&self, scale: f32) -> Result<Pixmap, TrimlineError> {
        if !scale.is_finite() || scale <= 0.0 {
            return Err(TrimlineError::Capture(format!(
                "capture scale must be positive (got {scale})"
            )));
        }
        let width_px = (self.width as f32 * scale).round() as u32;
        let height_px = (self.total_height() * scale).ceil() as u32;
        if width_px == 0 || height_px == 0 {
            return Err(TrimlineError::Capture(format!(
                "document has zero raster dimensions ({width_px}x{height_px})"
            )));
        }
        let mut pixmap = Pixmap::new(width_px, height_px).ok_or_else(|| {
            TrimlineError::Capture(format!(
                "raster allocation failed for {width_px}x{height_px}"
            ))
        })?;
        pixmap.fill(tiny_skia::Color::from_rgba8(255, 255, 255, 255));

        let ts = Transform::from_scale(scale, scale);
        let inner = self.inner_width();
        for (y, height, block) in self.layout() {
            draw_block(&mut pixmap, block, PADDING_X, y, inner, height, scale, ts);
        }
        Ok(pixmap)
    }

    fn measure(&self) -> LayoutMeasurements {
        let mut measurements = LayoutMeasurements::default();
        for (y, height, block) in self.layout() {
            match block {
                Block::Title { .. } => {
                    measurements.title_markers.push(TitleMarker { top: y });
                }
                _ if block.avoids_breaks() => {
                    measurements.avoid_regions.push(AvoidRegion {
                        top: y,
                        bottom: y + height,
                    });
                }
                _ => {}
            }
        }
        measurements
    }
}

#[allow(clippy::too_many_arguments)]
fn draw_block(
    pixmap: &mut Pixmap,
    block: &Block,
    x: f32,
    y: f32,
    width: f32,
    height: f32,
    scale: f32,
    ts: Transform,
) {
    match block {
        Block::Title { text } => {
            // Accent bar plus a heading stripe sized by the title length.
            fill_rect(pixmap, x, y, 4.0, height, Color::rgb(0.2, 0.35, 0.65), ts);
            let stripe_w = (text.chars().count() as f32 * 11.0)
                .clamp(60.0, (width - 16.0).max(60.0));
            fill_rect(
                pixmap,
                x + 12.0,
                y + (height - 16.0) / 2.0,
                stripe_w,
                16.0,
                Color::gray(0.15),
                ts,
            );
        }
        Block::Paragraph { lines } => {
            for line in 0..*lines {
                let line_w = if line + 1 == *lines { width * 0.6 } else { width * 0.95 };
                fill_rect(
                    pixmap,
                    x,
                    y + line as f32 * LINE_HEIGHT + 5.0,
                    line_w,
                    8.0,
                    Color::gray(0.78),
                    ts,
                );
            }
        }
        Block::Table { rows } => {
            fill_rect(pixmap, x, y, width, TABLE_HEADER_HEIGHT, Color::gray(0.9), ts);
            for row in 0..=*rows {
                let line_y = y + TABLE_HEADER_HEIGHT + row as f32 * TABLE_ROW_HEIGHT;
                fill_rect(pixmap, x, line_y - 1.0, width, 1.0, Color::gray(0.6), ts);
            }
            for col in 1..3 {
                fill_rect(
                    pixmap,
                    x + width * col as f32 / 3.0,
                    y,
                    1.0,
                    height,
                    Color::gray(0.6),
                    ts,
                );
            }
            stroke_rect(pixmap, x, y, width, height, Color::gray(0.4), ts);
        }
        Block::ChartPanel { .. } => {
            stroke_rect(pixmap, x, y, width, height, Color::gray(0.4), ts);
            let base = y + height - 12.0;
            fill_rect(pixmap, x + 8.0, base, width - 16.0, 1.5, Color::gray(0.3), ts);
            let bars = 8u32;
            let slot = (width - 16.0) / bars as f32;
            for bar in 0..bars {
                // Deterministic pseudo-heights; no randomness so captures repeat.
                let fraction = ((bar * 37 + 13) % 83) as f32 / 100.0 + 0.1;
                let bar_h = (height - 24.0) * fraction;
                fill_rect(
                    pixmap,
                    x + 8.0 + bar as f32 * slot + slot * 0.2,
                    base - bar_h,
                    slot * 0.6,
                    bar_h,
                    Color::rgb(0.33, 0.47, 0.71),
                    ts,
                );
            }
        }
        Block::Image { pixmap: source } => {
            let fit = width / source.width() as f32;
            let device = Transform::from_row(
                fit * scale,
                0.0,
                0.0,
                fit * scale,
                x * scale,
                y * scale,
            );
            let mut paint = PixmapPaint::default();
            paint.quality = FilterQuality::Bilinear;
            pixmap.draw_pixmap(0, 0, source.as_ref(), &paint, device, None);
        }
        Block::Spacer { .. } => {}
    }
}

fn fill_paint(color: Color) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color_rgba8(
        (color.r.clamp(0.0, 1.0) * 255.0 + 0.5) as u8,
        (color.g.clamp(0.0, 1.0) * 255.0 + 0.5) as u8,
        (color.b.clamp(0.0, 1.0) * 255.0 + 0.5) as u8,
        255,
    );
    paint.anti_alias = false;
    paint
}

fn fill_rect(pixmap: &mut Pixmap, x: f32, y: f32, w: f32, h: f32, color: Color, ts: Transform) {
    if let Some(rect) = Rect::from_xywh(x, y, w, h) {
        let path = PathBuilder::from_rect(rect);
        pixmap.fill_path(&path, &fill_paint(color), FillRule::Winding, ts, None);
    }
}

fn stroke_rect(pixmap: &mut Pixmap, x: f32, y: f32, w: f32, h: f32, color: Color, ts: Transform) {
    if let Some(rect) = Rect::from_xywh(x, y, w, h) {
        let path = PathBuilder::from_rect(rect);
        let stroke = Stroke {
            width: 1.5,
            ..Stroke::default()
        };
        pixmap.stroke_path(&path, &fill_paint(color), &stroke, ts, None);
    }
}

fn load_image_pixmap(source: &str) -> Result<Pixmap, TrimlineError> {
    if let Some((mime, data)) = parse_data_uri(source) {
        return decode_image_to_pixmap(&data, Some(&mime));
    }
    let bytes = std::fs::read(source)
        .map_err(|e| TrimlineError::Capture(format!("image read failed for {source}: {e}")))?;
    decode_image_to_pixmap(&bytes, None)
}

fn decode_image_to_pixmap(data: &[u8], mime: Option<&str>) -> Result<Pixmap, TrimlineError> {
    let format = if let Some(mime) = mime {
        if mime.contains("png") {
            Some(image::ImageFormat::Png)
        } else if mime.contains("jpeg") || mime.contains("jpg") {
            Some(image::ImageFormat::Jpeg)
        } else {
            None
        }
    } else {
        image::guess_format(data).ok()
    };

    let decoded = match format {
        Some(fmt) => image::load_from_memory_with_format(data, fmt),
        None => image::load_from_memory(data),
    }
    .map_err(|e| TrimlineError::Capture(format!("image decode failed: {e}")))?;

    let rgba = decoded.to_rgba8();
    let (width, height) = rgba.dimensions();
    let mut pixmap = Pixmap::new(width, height).ok_or_else(|| {
        TrimlineError::Capture(format!("invalid image dimensions {width}x{height}"))
    })?;
    let src = rgba.as_raw();
    let dst = pixmap.data_mut();
    for (src_px, dst_px) in src.chunks_exact(4).zip(dst.chunks_exact_mut(4)) {
        let a = src_px[3];
        dst_px[0] = premul_u8(src_px[0], a);
        dst_px[1] = premul_u8(src_px[1], a);
        dst_px[2] = premul_u8(src_px[2], a);
        dst_px[3] = a;
    }
    Ok(pixmap)
}

fn parse_data_uri(uri: &str) -> Option<(String, Vec<u8>)> {
    if !uri.starts_with("data:") {
        return None;
    }
    let (header, data_part) = uri.split_once(',')?;
    let mime = header
        .trim_start_matches("data:")
        .split(';')
        .next()
        .unwrap_or("application/octet-stream")
        .to_string();
    let data = if header.contains("base64") {
        base64::engine::general_purpose::STANDARD
            .decode(data_part)
            .ok()?
    } else {
        data_part.as_bytes().to_vec()
    };
    Some((mime, data))
}

fn premul_u8(channel: u8, alpha: u8) -> u8 {
    ((channel as u16 * alpha as u16 + 127) / 255) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::ImageEncoder;

    fn sample_story() -> Story {
        Story::new()
            .title("Retention Overview")
            .paragraph(4)
            .table(5)
            .title("Acquisition")
            .chart(180.0)
    }

    #[test]
    fn measurements_mark_titles_and_keep_together_blocks() {
        let story = sample_story();
        let m = story.measure();
        assert_eq!(m.title_markers.len(), 2);
        assert_eq!(m.avoid_regions.len(), 2);

        // First block starts one gap down.
        assert_eq!(m.title_markers[0].top, BLOCK_GAP);
        // Table sits below title + paragraph with gaps between.
        let para_h = 4.0 * LINE_HEIGHT + 8.0;
        let table_top = BLOCK_GAP + TITLE_HEIGHT + BLOCK_GAP + para_h + BLOCK_GAP;
        assert_eq!(m.avoid_regions[0].top, table_top);
        assert_eq!(
            m.avoid_regions[0].bottom,
            table_top + TABLE_HEADER_HEIGHT + 5.0 * TABLE_ROW_HEIGHT
        );
    }

    #[test]
    fn capture_dimensions_follow_the_scale() {
        let story = sample_story();
        let raster = story.capture(2.0).expect("capture");
        assert_eq!(raster.width(), DEFAULT_CONTENT_WIDTH * 2);
        assert_eq!(raster.height(), (story.total_height() * 2.0).ceil() as u32);
    }

    #[test]
    fn capture_paints_content_on_a_white_background() {
        let story = sample_story();
        let raster = story.capture(1.0).expect("capture");
        // Top-left corner is background.
        let corner = raster.pixel(0, 0).unwrap().demultiply();
        assert_eq!((corner.red(), corner.green(), corner.blue()), (255, 255, 255));
        // The title accent bar is not white.
        let accent = raster
            .pixel(PADDING_X as u32 + 1, BLOCK_GAP as u32 + 4)
            .unwrap()
            .demultiply();
        assert_ne!((accent.red(), accent.green(), accent.blue()), (255, 255, 255));
    }

    #[test]
    fn zero_or_negative_scale_is_a_capture_error() {
        let story = sample_story();
        let err = story.capture(0.0).unwrap_err();
        assert!(matches!(err, TrimlineError::Capture(_)));
        let err = story.capture(-1.0).unwrap_err();
        assert!(matches!(err, TrimlineError::Capture(_)));
    }

    #[test]
    fn data_uri_images_decode_and_scale_to_content_width() {
        // 2x1 opaque PNG via the image crate, wrapped as a data URI.
        let rgba: Vec<u8> = vec![255, 0, 0, 255, 0, 0, 255, 255];
        let mut png = Vec::new();
        image::codecs::png::PngEncoder::new(&mut png)
            .write_image(&rgba, 2, 1, image::ExtendedColorType::Rgba8)
            .expect("encode png");
        let uri = format!(
            "data:image/png;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(&png)
        );

        let story = Story::new().image(&uri).expect("image block");
        let m = story.measure();
        assert_eq!(m.avoid_regions.len(), 1);
        let region = m.avoid_regions[0];
        // 2:1 aspect scaled to the inner width.
        let inner = DEFAULT_CONTENT_WIDTH as f32 - 2.0 * PADDING_X;
        assert!((region.bottom - region.top - inner / 2.0).abs() < 0.01);
    }

    #[test]
    fn bad_image_source_is_a_capture_error() {
        let err = Story::new().image("data:image/png;base64,!!!").unwrap_err();
        assert!(matches!(err, TrimlineError::Capture(_)));
        let err = Story::new()
            .image("/definitely/not/a/real/image.png")
            .unwrap_err();
        assert!(matches!(err, TrimlineError::Capture(_)));
    }
}
