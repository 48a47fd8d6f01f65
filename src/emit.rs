use crate::error::TrimlineError;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Filesystem-safe name derived from a user-supplied document title:
/// lowercased, every run of non-alphanumeric characters collapsed to a
/// single `_`, edges trimmed. A title with nothing usable in it falls back
/// to `"report"`. Idempotent: sanitizing twice changes nothing.
pub fn sanitize_file_name(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    let mut pending_sep = false;
    for ch in title.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_sep && !out.is_empty() {
                out.push('_');
            }
            pending_sep = false;
            out.push(ch.to_ascii_lowercase());
        } else {
            pending_sep = true;
        }
    }
    if out.is_empty() {
        return "report".to_string();
    }
    out
}

/// Write the assembled document to `<dir>/<sanitized-title>.pdf`.
pub fn save_pdf(bytes: &[u8], title: &str, dir: &Path) -> Result<PathBuf, TrimlineError> {
    let path = dir.join(format!("{}.pdf", sanitize_file_name(title)));
    let mut file = std::fs::File::create(&path)?;
    file.write_all(bytes)?;
    file.flush()?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_dir(tag: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        let dir = std::env::temp_dir().join(format!(
            "trimline_{tag}_{}_{}",
            std::process::id(),
            nanos
        ));
        std::fs::create_dir_all(&dir).expect("create temp dir");
        dir
    }

    #[test]
    fn sanitization_replaces_and_collapses() {
        assert_eq!(sanitize_file_name("Weekly Report: May / 2024"), "weekly_report_may_2024");
        assert_eq!(sanitize_file_name("UA Intelligence — Q3"), "ua_intelligence_q3");
        assert_eq!(sanitize_file_name("  spaced  out  "), "spaced_out");
    }

    #[test]
    fn empty_or_unusable_titles_fall_back_to_report() {
        assert_eq!(sanitize_file_name(""), "report");
        assert_eq!(sanitize_file_name("   "), "report");
        assert_eq!(sanitize_file_name("///***"), "report");
    }

    #[test]
    fn sanitization_is_idempotent() {
        for title in ["Weekly Report: May / 2024", "", "a--b__c", "Δοκιμή 42"] {
            let once = sanitize_file_name(title);
            assert_eq!(sanitize_file_name(&once), once, "not idempotent for {title:?}");
        }
    }

    #[test]
    fn save_writes_the_sanitized_file() {
        let dir = temp_dir("emit");
        let path = save_pdf(b"%PDF-1.7 test", "Bug Report #7", &dir).expect("save");
        assert!(path.ends_with("bug_report_7.pdf"));
        let contents = std::fs::read(&path).expect("read back");
        assert_eq!(contents, b"%PDF-1.7 test");
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn save_into_a_missing_directory_surfaces_io() {
        let dir = std::env::temp_dir().join("trimline_definitely_missing_dir_x1");
        let err = save_pdf(b"x", "t", &dir).unwrap_err();
        assert!(matches!(err, TrimlineError::Io(_)));
    }
}
