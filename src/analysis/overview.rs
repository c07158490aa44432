//! Screen overview formatting

use super::ScreenOverview;
use crate::config::OverviewSettings;

/// Build a bounded preview of recognized text.
///
/// Blank lines are dropped and the remaining lines trimmed; the preview holds
/// the first `max_lines` of them, cut to `max_chars` characters.
pub fn screen_overview(text: &str, settings: &OverviewSettings, timestamp: u64) -> ScreenOverview {
    let lines: Vec<&str> = text
        .split('\n')
        .filter(|line| !line.trim().is_empty())
        .collect();
    let line_count = lines.len();

    let visible = lines
        .iter()
        .take(settings.max_lines)
        .map(|line| line.trim())
        .collect::<Vec<_>>()
        .join("\n");
    let text: String = visible.chars().take(settings.max_chars).collect();

    ScreenOverview {
        text,
        line_count,
        visible_range: format!("Lines 1-{}", line_count.min(settings.max_lines)),
        timestamp,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn overview(text: &str) -> ScreenOverview {
        screen_overview(text, &OverviewSettings::default(), 1_700_000_000_000)
    }

    #[test]
    fn test_short_text() {
        let o = overview("  fn main() {\n\n    println!(\"hi\");\n  }\n");
        assert_eq!(o.text, "fn main() {\nprintln!(\"hi\");\n}");
        assert_eq!(o.line_count, 3);
        assert_eq!(o.visible_range, "Lines 1-3");
        assert_eq!(o.timestamp, 1_700_000_000_000);
    }

    #[test]
    fn test_line_window() {
        let text: String = (1..=40).map(|i| format!("line {i}\n")).collect();
        let o = overview(&text);

        assert_eq!(o.line_count, 40);
        assert_eq!(o.visible_range, "Lines 1-15");
        assert_eq!(o.text.lines().count(), 15);
        assert!(o.text.ends_with("line 15"));
    }

    #[test]
    fn test_char_bound() {
        let text = format!("{}\n", "x".repeat(300)).repeat(10);
        let o = overview(&text);

        assert_eq!(o.text.chars().count(), 1000);
        assert!(text.replace('\n', "").starts_with(&o.text.replace('\n', "")));
        assert!(o.text.lines().count() <= 15);
    }

    #[test]
    fn test_char_bound_is_char_safe() {
        let text = "é".repeat(2000);
        let o = overview(&text);
        assert_eq!(o.text.chars().count(), 1000);
    }

    #[test]
    fn test_empty_text() {
        let o = overview(" \n\t\n");
        assert_eq!(o.text, "");
        assert_eq!(o.line_count, 0);
        assert_eq!(o.visible_range, "Lines 1-0");
    }

    #[test]
    fn test_bounds_hold_for_varied_inputs() {
        for lines in [0usize, 1, 14, 15, 16, 100] {
            for width in [0usize, 10, 80, 500] {
                let text = format!("{}\n", "a".repeat(width)).repeat(lines);
                let o = overview(&text);
                assert!(o.text.chars().count() <= 1000);
                assert!(o.text.lines().count() <= 15);
            }
        }
    }
}
