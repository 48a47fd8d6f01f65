mod compose;
mod config;
mod debug;
mod emit;
mod error;
mod measure;
mod pdf;
mod plan;
mod story;
mod types;

pub use compose::{PageSlice, compose_pages};
pub use config::ExportConfig;
pub use emit::{sanitize_file_name, save_pdf};
pub use error::TrimlineError;
pub use measure::{AvoidRegion, DocumentSource, LayoutMeasurements, TitleMarker};
pub use pdf::assemble_pdf;
pub use plan::find_page_breaks;
pub use story::{DEFAULT_CONTENT_WIDTH, Story};
pub use types::{Color, Pt, Size};

use debug::DebugLogger;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::time::Instant;

/// Observable stage of an export operation. Transitions are strictly
/// forward within one export; every exit path lands back on `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExportPhase {
    Idle = 0,
    Capturing = 1,
    Paginating = 2,
    Compositing = 3,
    Saving = 4,
    Failed = 5,
}

impl ExportPhase {
    fn from_u8(value: u8) -> ExportPhase {
        match value {
            1 => ExportPhase::Capturing,
            2 => ExportPhase::Paginating,
            3 => ExportPhase::Compositing,
            4 => ExportPhase::Saving,
            5 => ExportPhase::Failed,
            _ => ExportPhase::Idle,
        }
    }

    fn name(self) -> &'static str {
        match self {
            ExportPhase::Idle => "idle",
            ExportPhase::Capturing => "capturing",
            ExportPhase::Paginating => "paginating",
            ExportPhase::Compositing => "compositing",
            ExportPhase::Saving => "saving",
            ExportPhase::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportOutcome {
    Saved { path: PathBuf },
    /// Another export was already in flight on this engine; nothing ran.
    Skipped,
}

/// Paginated document exporter. One engine instance runs one export at a
/// time; a second call while one is in flight is a no-op, never queued.
#[derive(Debug)]
pub struct Trimline {
    config: ExportConfig,
    debug: Option<DebugLogger>,
    in_flight: AtomicBool,
    phase: AtomicU8,
}

#[derive(Clone, Default)]
pub struct TrimlineBuilder {
    config: ExportConfig,
    debug_path: Option<PathBuf>,
}

impl TrimlineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: ExportConfig) -> Self {
        self.config = config;
        self
    }

    pub fn page_size_mm(mut self, width_mm: f32, height_mm: f32) -> Self {
        self.config.page_width_mm = width_mm;
        self.config.page_height_mm = height_mm;
        self
    }

    pub fn margin_mm(mut self, margin_mm: f32) -> Self {
        self.config.margin_mm = margin_mm;
        self
    }

    pub fn capture_scale(mut self, scale: f32) -> Self {
        self.config.capture_scale = scale;
        self
    }

    pub fn jpeg_quality(mut self, quality: u8) -> Self {
        self.config.jpeg_quality = quality;
        self
    }

    /// Tune the break heuristics. Defaults reproduce the original exporter.
    pub fn break_heuristics(
        mut self,
        title_proximity_threshold_px: f32,
        min_page_content_fraction: f32,
        break_backoff_px: f32,
    ) -> Self {
        self.config.title_proximity_threshold_px = title_proximity_threshold_px;
        self.config.min_page_content_fraction = min_page_content_fraction;
        self.config.break_backoff_px = break_backoff_px;
        self
    }

    /// Write JSONL diagnostics (phase transitions, spans, counters) to `path`.
    pub fn debug_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.debug_path = Some(path.into());
        self
    }

    pub fn build(self) -> Result<Trimline, TrimlineError> {
        self.config.validate()?;
        let debug = match self.debug_path {
            Some(path) => Some(DebugLogger::new(path)?),
            None => None,
        };
        Ok(Trimline {
            config: self.config,
            debug,
            in_flight: AtomicBool::new(false),
            phase: AtomicU8::new(ExportPhase::Idle as u8),
        })
    }
}

/// Scoped release of the single-flight state: the flag is cleared and the
/// phase returns to `Idle` on every exit path, success or error.
struct FlightGuard<'a> {
    engine: &'a Trimline,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.engine
            .phase
            .store(ExportPhase::Idle as u8, Ordering::SeqCst);
        self.engine.in_flight.store(false, Ordering::SeqCst);
    }
}

impl Trimline {
    pub fn builder() -> TrimlineBuilder {
        TrimlineBuilder::new()
    }

    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    /// Current stage of the in-flight export, `Idle` when none is running.
    pub fn phase(&self) -> ExportPhase {
        ExportPhase::from_u8(self.phase.load(Ordering::SeqCst))
    }

    /// Run the full pipeline and save `<sanitized-title>.pdf` into `out_dir`.
    pub fn export(
        &self,
        source: &dyn DocumentSource,
        title: &str,
        out_dir: &Path,
    ) -> Result<ExportOutcome, TrimlineError> {
        let Some(_guard) = self.begin() else {
            return Ok(ExportOutcome::Skipped);
        };
        let result = self.run_pipeline(source, title).and_then(|bytes| {
            self.set_phase(ExportPhase::Saving);
            let t_save = Instant::now();
            let path = emit::save_pdf(&bytes, title, out_dir)?;
            self.log_span("save", t_save);
            Ok(path)
        });
        match result {
            Ok(path) => {
                self.finish_ok();
                Ok(ExportOutcome::Saved { path })
            }
            Err(err) => Err(self.finish_err(err)),
        }
    }

    /// Run the pipeline without the save step and hand back the document
    /// bytes. `None` means another export was already in flight.
    pub fn export_to_bytes(
        &self,
        source: &dyn DocumentSource,
        title: &str,
    ) -> Result<Option<Vec<u8>>, TrimlineError> {
        let Some(_guard) = self.begin() else {
            return Ok(None);
        };
        match self.run_pipeline(source, title) {
            Ok(bytes) => {
                self.finish_ok();
                Ok(Some(bytes))
            }
            Err(err) => Err(self.finish_err(err)),
        }
    }

    fn begin(&self) -> Option<FlightGuard<'_>> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            Some(FlightGuard { engine: self })
        } else {
            if let Some(logger) = &self.debug {
                logger.increment("export.skipped_in_flight", 1);
            }
            None
        }
    }

    fn run_pipeline(
        &self,
        source: &dyn DocumentSource,
        title: &str,
    ) -> Result<Vec<u8>, TrimlineError> {
        let config = &self.config;

        self.set_phase(ExportPhase::Capturing);
        let t_capture = Instant::now();
        let raster = source.capture(config.capture_scale)?;
        self.log_span("capture", t_capture);
        if let Some(logger) = &self.debug {
            logger.log_json(&format!(
                "{{\"type\":\"export.capture\",\"content_width\":{},\"raster\":{{\"w\":{},\"h\":{}}},\"scale\":{}}}",
                source.content_width(),
                raster.width(),
                raster.height(),
                config.capture_scale
            ));
        }

        self.set_phase(ExportPhase::Paginating);
        let t_plan = Instant::now();
        let measurements = source.measure().scaled(config.capture_scale);
        let px_per_mm = raster.width() as f32 / config.page_width_mm;
        let page_height_px = config.printable_height_mm() * px_per_mm;
        let breaks = plan::find_page_breaks(
            raster.height() as f32,
            page_height_px,
            &measurements,
            config,
        )?;
        self.log_span("plan", t_plan);

        self.set_phase(ExportPhase::Compositing);
        let t_compose = Instant::now();
        let pages = compose::compose_pages(&raster, &breaks, page_height_px, config)?;
        let bytes = pdf::assemble_pdf(&pages, title, config)?;
        self.log_span("compose", t_compose);

        if let Some(logger) = &self.debug {
            logger.increment("export.pages", pages.len() as u64);
            logger.increment("export.raster_rows", raster.height() as u64);
            logger.increment("export.bytes", bytes.len() as u64);
        }
        Ok(bytes)
    }

    fn set_phase(&self, phase: ExportPhase) {
        self.phase.store(phase as u8, Ordering::SeqCst);
        if let Some(logger) = &self.debug {
            logger.log_json(&format!(
                "{{\"type\":\"export.phase\",\"phase\":\"{}\"}}",
                phase.name()
            ));
        }
    }

    fn log_span(&self, stage: &str, started: Instant) {
        if let Some(logger) = &self.debug {
            logger.log_span_ms(stage, started.elapsed().as_secs_f64() * 1000.0);
        }
    }

    fn finish_ok(&self) {
        if let Some(logger) = &self.debug {
            logger.increment("export.completed", 1);
            logger.emit_summary("export");
            logger.flush();
        }
    }

    fn finish_err(&self, err: TrimlineError) -> TrimlineError {
        self.set_phase(ExportPhase::Failed);
        if let Some(logger) = &self.debug {
            logger.log_json(&format!(
                "{{\"type\":\"export.error\",\"message\":\"{}\"}}",
                debug::json_escape(&err.to_string())
            ));
            logger.increment("export.failed", 1);
            logger.emit_summary("export");
            logger.flush();
        }
        err
    }
}
