//! SVG rendering of the risk history timeline.

use chrono::NaiveDate;

use crate::dates::format_date;
use crate::risk::{RiskStatus, MAX_SCORE};
use crate::timeline::Timeline;

/// Plot height in user units.
pub const HEIGHT: f64 = 300.0;

/// Minimum plot width in user units.
pub const MIN_WIDTH: f64 = 600.0;

/// Width allotted to each sample date.
pub const WIDTH_PER_SAMPLE: f64 = 80.0;

// Room for axis labels, titles and the legend around the plot area.
const MARGIN_LEFT: f64 = 60.0;
const MARGIN_TOP: f64 = 10.0;
const MARGIN_RIGHT: f64 = 20.0;
const MARGIN_BOTTOM: f64 = 70.0;

/// Series colour for a status.
#[must_use]
pub fn status_color(status: RiskStatus) -> &'static str {
    match status {
        RiskStatus::Open => "#ef4444",
        RiskStatus::InProgress => "#f59e0b",
        RiskStatus::Mitigated => "#10b981",
        RiskStatus::Accepted => "#3b82f6",
    }
}

/// Escape text for inclusion in XML content or attributes.
#[must_use]
pub fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

/// Linear scales mapping dates and scores to plot coordinates.
#[derive(Debug, Clone, Copy)]
struct Scale {
    start: NaiveDate,
    span_days: f64,
    width: f64,
}

impl Scale {
    #[allow(clippy::cast_precision_loss)]
    fn new(timeline: &Timeline) -> Self {
        let samples = timeline.dates.len() as f64;
        Self {
            start: timeline.start,
            span_days: (timeline.end - timeline.start).num_days().max(1) as f64,
            width: MIN_WIDTH.max(samples * WIDTH_PER_SAMPLE),
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn x(&self, date: NaiveDate) -> f64 {
        (date - self.start).num_days() as f64 / self.span_days * self.width
    }

    fn y(score: f64) -> f64 {
        HEIGHT - score / f64::from(MAX_SCORE) * HEIGHT
    }
}

/// Render the timeline as a standalone SVG document.
#[must_use]
pub fn render_svg(timeline: &Timeline) -> String {
    let scale = Scale::new(timeline);
    let width = scale.width;

    let mut elements = vec![
        format!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="{} {} {} {}" preserveAspectRatio="xMidYMid meet">"#,
            -MARGIN_LEFT,
            -MARGIN_TOP,
            width + MARGIN_LEFT + MARGIN_RIGHT,
            HEIGHT + MARGIN_TOP + MARGIN_BOTTOM,
        ),
        // axes
        format!(r##"<line x1="0" y1="0" x2="0" y2="{HEIGHT}" stroke="#000"/>"##),
        format!(r##"<line x1="0" y1="{HEIGHT}" x2="{width}" y2="{HEIGHT}" stroke="#000"/>"##),
    ];

    // grid
    for date in timeline.dates.iter().skip(1) {
        let x = scale.x(*date);
        elements.push(format!(
            r##"<line x1="{x:.2}" y1="0" x2="{x:.2}" y2="{HEIGHT}" stroke="#ddd"/>"##
        ));
    }
    for score in [5.0, 10.0, 15.0, 20.0, 25.0] {
        let y = Scale::y(score);
        elements.push(format!(
            r##"<line x1="0" y1="{y:.2}" x2="{width}" y2="{y:.2}" stroke="#ddd"/>"##
        ));
    }

    // y-axis ticks and labels
    for score in [0u8, 5, 10, 15, 20, 25] {
        let y = Scale::y(f64::from(score));
        elements.push(format!(
            r##"<line x1="0" y1="{y:.2}" x2="-5" y2="{y:.2}" stroke="#000"/><text x="-8" y="{:.2}" text-anchor="end" font-size="10">{score}</text>"##,
            y + 4.0
        ));
    }

    // x-axis ticks and labels
    for date in &timeline.dates {
        let x = scale.x(*date);
        elements.push(format!(
            r##"<line x1="{x:.2}" y1="{HEIGHT}" x2="{x:.2}" y2="{}" stroke="#000"/><text x="{x:.2}" y="{}" text-anchor="middle" font-size="10">{}</text>"##,
            HEIGHT + 5.0,
            HEIGHT + 15.0,
            format_date(*date)
        ));
    }

    // axis titles
    elements.push(format!(
        r#"<text x="{:.2}" y="{}" text-anchor="middle" font-size="12" font-weight="bold">Date</text>"#,
        width / 2.0,
        HEIGHT + 35.0
    ));
    elements.push(format!(
        r#"<text x="-40" y="{mid}" text-anchor="middle" font-size="12" font-weight="bold" transform="rotate(-90 -40 {mid})">Risk Score</text>"#,
        mid = HEIGHT / 2.0
    ));

    // series
    for series in &timeline.series {
        let points: Vec<String> = series
            .points
            .iter()
            .map(|p| format!("{:.2},{:.2}", scale.x(p.date), Scale::y(p.value)))
            .collect();
        elements.push(format!(
            r#"<polyline fill="none" stroke="{}" stroke-width="2" points="{}"><title>{}</title></polyline>"#,
            status_color(series.status),
            points.join(" "),
            escape_xml(series.status.as_str())
        ));
    }

    // legend
    let mut legend_x = 0.0;
    let legend_y = HEIGHT + 50.0;
    for status in RiskStatus::ALL {
        elements.push(format!(
            r#"<rect x="{legend_x}" y="{}" width="10" height="10" fill="{}"/><text x="{}" y="{legend_y}" font-size="11">{}</text>"#,
            legend_y - 9.0,
            status_color(*status),
            legend_x + 14.0,
            escape_xml(status.as_str())
        ));
        legend_x += 100.0;
    }

    elements.push("</svg>\n".to_string());
    elements.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::ProjectMeta;
    use crate::risk::{Risk, RiskInput};
    use crate::timeline::TimelineSettings;
    use chrono::Utc;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn timeline(risks: &[Risk]) -> Timeline {
        let meta = ProjectMeta {
            start_date: Some(date(2024, 1, 1)),
            end_date: Some(date(2024, 1, 29)),
            ..ProjectMeta::default()
        };
        Timeline::build(&meta, risks, &TimelineSettings::default()).unwrap()
    }

    #[test]
    fn test_escape_xml() {
        assert_eq!(escape_xml("a < b & \"c\""), "a &lt; b &amp; &quot;c&quot;");
        assert_eq!(escape_xml("plain"), "plain");
    }

    #[test]
    fn test_status_colors_are_distinct() {
        let mut colors: Vec<&str> = RiskStatus::ALL.iter().map(|s| status_color(*s)).collect();
        colors.dedup();
        assert_eq!(colors.len(), 4);
    }

    #[test]
    fn test_render_structure() {
        let svg = render_svg(&timeline(&[]));
        assert!(svg.starts_with("<svg"));
        assert!(svg.trim_end().ends_with("</svg>"));
        assert_eq!(svg.matches("<polyline").count(), 4);
        assert!(svg.contains(">Risk Score</text>"));
        assert!(svg.contains(">Date</text>"));
        assert!(svg.contains(">2024-01-29</text>"));
        assert!(svg.contains(">In-Progress</text>"));
    }

    #[test]
    fn test_render_one_element_per_line() {
        let svg = render_svg(&timeline(&[]));
        assert!(svg.ends_with("</svg>\n"));
        for line in svg.lines() {
            assert!(line.starts_with('<'), "unexpected line {line:?}");
            assert!(line.ends_with('>'), "unexpected line {line:?}");
        }
        assert!(svg.lines().count() >= 18);
    }

    #[test]
    fn test_render_minimum_width() {
        let svg = render_svg(&timeline(&[]));
        // five samples: width stays at the 600 minimum
        assert!(svg.contains(r#"x2="600" y2="300""#));
    }

    #[test]
    fn test_render_scales_points() {
        let input = RiskInput {
            probability: 5,
            impact: 5,
            date_identified: date(2024, 1, 1),
            ..RiskInput::default()
        };
        let risk = Risk::create("1".to_string(), input, "", Utc::now());
        let svg = render_svg(&timeline(&[risk]));

        // score 25 on day 0 plots at the top-left corner
        assert!(svg.contains("0.00,0.00"));
        // the last sample sits at the right edge
        assert!(svg.contains("600.00,0.00"));
    }
}
