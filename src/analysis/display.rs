//! Plain-text rendering of an analysis record for terminals and logs

use std::fmt::Write;

use super::AnalysisRecord;

/// Render the "AI Code Analysis" panel for a record
pub fn render_panel(record: &AnalysisRecord, live: bool) -> String {
    let overview = &record.screen_overview;
    let mut out = String::new();

    let status = if live { "LIVE ANALYSIS" } else { "IDLE" };
    let _ = writeln!(out, "AI Code Analysis [{}]", status);
    let _ = writeln!(
        out,
        "{} - {} @ {} ({} fps)",
        record.window, record.content_type, record.resolution, record.frame_rate
    );

    let languages = if record.languages.is_empty() {
        "-".to_string()
    } else {
        record
            .languages
            .iter()
            .map(|l| l.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    };
    let _ = writeln!(out, "Languages: {}", languages);
    let _ = writeln!(
        out,
        "Complexity: {:?} | Issues: {} | Performance: {} | Best practices: {} ({} issues)",
        record.code_complexity,
        record.potential_issues,
        record.performance_score,
        record.best_practices.score,
        record.best_practices.issues
    );
    let _ = writeln!(
        out,
        "Screen Content: {} | Lines: {} | Last Update: {}",
        overview.visible_range,
        overview.line_count,
        format_time_of_day(overview.timestamp)
    );

    if !overview.text.is_empty() {
        let _ = writeln!(out, "----");
        for line in overview.text.lines() {
            let _ = writeln!(out, "| {}", line);
        }
        let _ = writeln!(out, "----");
    }

    out
}

/// `HH:MM:SS UTC` for an epoch-millisecond timestamp
pub fn format_time_of_day(timestamp_ms: u64) -> String {
    let secs = (timestamp_ms / 1000) % 86_400;
    format!(
        "{:02}:{:02}:{:02} UTC",
        secs / 3600,
        (secs % 3600) / 60,
        secs % 60
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{RecordLabels, WAITING_FOR_CONTENT};

    #[test]
    fn test_time_of_day() {
        assert_eq!(format_time_of_day(0), "00:00:00 UTC");
        // 1970-01-02 01:02:03
        assert_eq!(format_time_of_day(90_123_000), "01:02:03 UTC");
    }

    #[test]
    fn test_panel_for_fallback() {
        let record = AnalysisRecord::fallback(&RecordLabels::default(), "640x480".into(), 0);
        let panel = render_panel(&record, true);

        assert!(panel.starts_with("AI Code Analysis [LIVE ANALYSIS]"));
        assert!(panel.contains("VS Code - Code Editor @ 640x480"));
        assert!(panel.contains("Languages: -"));
        assert!(panel.contains("Screen Content: No content | Lines: 0"));
        for line in WAITING_FOR_CONTENT.lines() {
            assert!(panel.contains(&format!("| {}", line)));
        }
    }

    #[test]
    fn test_idle_panel() {
        let record = AnalysisRecord::fallback(&RecordLabels::default(), "1x1".into(), 0);
        assert!(render_panel(&record, false).contains("[IDLE]"));
    }
}
