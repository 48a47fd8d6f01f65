use crate::config::ExportConfig;
use crate::error::TrimlineError;
use crate::measure::LayoutMeasurements;

/// Compute the cut positions for a raster of `total_height`, paged at
/// `page_height`, both in scaled pixel space. Returns the full break
/// sequence `[0, b1, .., total_height]`: strictly increasing, every
/// interval at most `page_height`.
///
/// Greedy single pass. Each page starts from the naive candidate one page
/// below the last cut, then two avoidance passes may pull it up:
/// titles first (a page should not end just above a section heading),
/// then the first avoid-region straddling the candidate. Both moves are
/// gated on leaving at least `min_page_content_fraction` of a page behind;
/// when the gate fails the naive cut stands and the content is sliced.
pub fn find_page_breaks(
    total_height: f32,
    page_height: f32,
    measurements: &LayoutMeasurements,
    config: &ExportConfig,
) -> Result<Vec<f32>, TrimlineError> {
    if !total_height.is_finite() || total_height <= 0.0 {
        return Err(TrimlineError::InvalidConfiguration(format!(
            "planner total_height must be positive (got {})",
            total_height
        )));
    }
    if !page_height.is_finite() || page_height <= 0.0 {
        return Err(TrimlineError::InvalidConfiguration(format!(
            "planner page_height must be positive (got {})",
            page_height
        )));
    }

    let mut titles: Vec<f32> = measurements.title_markers.iter().map(|t| t.top).collect();
    titles.sort_by(|a, b| a.total_cmp(b));
    let mut regions: Vec<(f32, f32)> = measurements
        .avoid_regions
        .iter()
        .map(|r| (r.top, r.bottom))
        .collect();
    regions.sort_by(|a, b| a.0.total_cmp(&b.0));

    let min_content = config.min_page_content_fraction * page_height;
    let backoff = config.break_backoff_px;

    let mut breaks = vec![0.0f32];
    let mut last = 0.0f32;

    while last + page_height < total_height {
        let candidate = last + page_height;
        let mut chosen = candidate;

        // Title pass: first qualifying marker wins, in ascending order.
        let mut moved_for_title = false;
        for &top in titles.iter() {
            if top <= last {
                continue;
            }
            if top >= candidate {
                break;
            }
            if candidate - top < config.title_proximity_threshold_px && top - last >= min_content {
                chosen = top - backoff;
                moved_for_title = true;
                break;
            }
        }

        // Region pass: only the first region straddling the candidate is
        // considered; a failed guard keeps the naive cut and slices it.
        if !moved_for_title {
            for &(top, bottom) in regions.iter() {
                if top >= candidate {
                    break;
                }
                if bottom > candidate {
                    if top - last >= min_content {
                        chosen = top - backoff;
                    }
                    break;
                }
            }
        }

        // The backoff must move forward; a cut at or behind the previous one
        // would break the strictly-increasing invariant.
        if chosen <= last {
            chosen = candidate;
        }

        breaks.push(chosen);
        last = chosen;
    }

    breaks.push(total_height);
    Ok(breaks)
}
