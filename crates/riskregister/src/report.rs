//! Plain-text views of projects, risks and the risk matrix.

use crate::dates::{format_date, format_opt_date};
use crate::matrix::RiskMatrix;
use crate::project::{display_name, Project};
use crate::risk::{Risk, Severity, SeverityThresholds, StatusChange};
use crate::storage::ProjectSummary;
use crate::timeline::Timeline;

/// Longest title shown in tables before truncation.
const TITLE_WIDTH: usize = 40;

/// Lay out rows under a header with columns padded to the widest cell.
fn table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    let mut out = render_line(headers, &widths);
    out.push_str(&render_line(&rule, &widths));
    for row in rows {
        out.push_str(&render_line(row, &widths));
    }
    out
}

fn render_line<S: AsRef<str>>(cells: &[S], widths: &[usize]) -> String {
    let padded: Vec<String> = cells
        .iter()
        .zip(widths)
        .map(|(cell, &width)| format!("{:<width$}", cell.as_ref()))
        .collect();
    let mut line = padded.join("  ").trim_end().to_string();
    line.push('\n');
    line
}

/// Join lines into a block of text with a trailing newline.
fn block(lines: &[String]) -> String {
    let mut out = lines.join("\n");
    out.push('\n');
    out
}

fn truncate(text: &str, max: usize) -> String {
    let single_line = text.lines().next().unwrap_or_default();
    if single_line.chars().count() <= max && single_line.len() == text.len() {
        return text.to_string();
    }
    let kept: String = single_line.chars().take(max.saturating_sub(3)).collect();
    format!("{kept}...")
}

/// Aggregated score with one decimal and its severity band.
#[must_use]
pub fn score_line(score: f64, thresholds: &SeverityThresholds) -> String {
    format!(
        "Aggregated risk score: {score:.1} ({})",
        Severity::classify(score, thresholds)
    )
}

/// One history entry as `YYYY-MM-DD - Status[ - note]`.
#[must_use]
pub fn history_line(change: &StatusChange) -> String {
    let line = format!("{} - {}", format_date(change.date.date_naive()), change.status);
    if change.note.trim().is_empty() {
        line
    } else {
        format!("{line} - {}", change.note)
    }
}

/// The table of projects.
#[must_use]
pub fn project_list(projects: &[ProjectSummary], thresholds: &SeverityThresholds) -> String {
    if projects.is_empty() {
        return "No projects.\n".to_string();
    }
    let rows: Vec<Vec<String>> = projects
        .iter()
        .map(|p| {
            vec![
                p.id.clone(),
                truncate(display_name(&p.meta), TITLE_WIDTH),
                p.risk_count.to_string(),
                format!("{:.1}", p.aggregated_score),
                Severity::classify(p.aggregated_score, thresholds).to_string(),
                format_opt_date(p.meta.start_date),
                format_opt_date(p.meta.end_date),
            ]
        })
        .collect();
    table(
        &["ID", "Name", "Risks", "Score", "Severity", "Start", "End"],
        &rows,
    )
}

/// Project metadata, categories and headline numbers.
#[must_use]
pub fn project_detail(project: &Project, thresholds: &SeverityThresholds) -> String {
    let meta = &project.meta;
    let name = project.display_name();
    let mut lines = vec![
        name.to_string(),
        "=".repeat(name.chars().count()),
        format!("ID:              {}", project.id),
        format!("Project manager: {}", meta.project_manager),
        format!("Sponsor:         {}", meta.sponsor),
        format!("Start date:      {}", format_opt_date(meta.start_date)),
        format!("End date:        {}", format_opt_date(meta.end_date)),
        format!("Categories:      {}", project.categories.join(", ")),
        format!("Risks:           {}", project.risks.len()),
        score_line(project.aggregated_score(), thresholds),
    ];
    if !meta.risk_plan.trim().is_empty() {
        lines.push(String::new());
        lines.push("Risk management plan:".to_string());
        lines.extend(meta.risk_plan.lines().map(|line| format!("  {line}")));
    }
    block(&lines)
}

/// The risk table in the given order.
#[must_use]
pub fn risk_table(risks: &[&Risk], thresholds: &SeverityThresholds) -> String {
    if risks.is_empty() {
        return "No risks.\n".to_string();
    }
    let rows: Vec<Vec<String>> = risks
        .iter()
        .map(|r| {
            vec![
                format!("{} {}", r.score(), severity_mark(r.severity(thresholds))),
                r.id.clone(),
                truncate(&r.title, TITLE_WIDTH),
                r.category.clone(),
                r.probability.to_string(),
                r.impact.to_string(),
                r.status.to_string(),
                format_date(r.date_identified),
                format_opt_date(r.date_resolved),
            ]
        })
        .collect();
    table(
        &[
            "Score",
            "ID",
            "Title",
            "Category",
            "P",
            "I",
            "Status",
            "Identified",
            "Resolved",
        ],
        &rows,
    )
}

fn severity_mark(severity: Severity) -> char {
    match severity {
        Severity::Low => 'L',
        Severity::Moderate => 'M',
        Severity::High => 'H',
    }
}

/// Every field of a risk, its last note and its full history.
#[must_use]
pub fn risk_detail(risk: &Risk, thresholds: &SeverityThresholds) -> String {
    let mut lines = vec![
        risk.title.clone(),
        "=".repeat(risk.title.chars().count().max(1)),
        format!("ID:              {}", risk.id),
        format!("Category:        {}", risk.category),
        format!("Owner:           {}", risk.owner),
        format!(
            "Score:           {} = {} x {} ({})",
            risk.score(),
            risk.probability,
            risk.impact,
            risk.severity(thresholds)
        ),
        format!("Priority:        {}", risk.priority),
        format!("Response:        {}", risk.response),
        format!("Status:          {}", risk.status),
        format!("Date identified: {}", format_date(risk.date_identified)),
        format!("Date resolved:   {}", format_opt_date(risk.date_resolved)),
        format!(
            "Last reviewed:   {}",
            risk.last_reviewed.format("%Y-%m-%d %H:%M UTC")
        ),
        format!("Last note:       {}", risk.last_note()),
        String::new(),
        "Description:".to_string(),
    ];
    lines.extend(risk.description.lines().map(|line| format!("  {line}")));
    lines.push("Mitigation:".to_string());
    lines.extend(risk.mitigation.lines().map(|line| format!("  {line}")));
    lines.push(String::new());

    let mut out = block(&lines);
    out.push_str(&history(risk));
    out
}

/// The status history, one line per entry.
#[must_use]
pub fn history(risk: &Risk) -> String {
    let mut lines = vec!["Status history:".to_string()];
    if risk.status_history.is_empty() {
        lines.push("  (none)".to_string());
    }
    lines.extend(
        risk.status_history
            .iter()
            .map(|change| format!("  {}", history_line(change))),
    );
    block(&lines)
}

/// The 5×5 grid of risk counts, impact rows from 5 down to 1.
///
/// Each cell shows its count and the severity band of the cell score.
#[must_use]
pub fn matrix_grid(matrix: &RiskMatrix, thresholds: &SeverityThresholds) -> String {
    let mut lines = vec!["Impact".to_string()];
    for row in matrix.rows() {
        let Some(first) = row.first() else { continue };
        let cells: String = row
            .iter()
            .map(|cell| {
                format!(
                    " {:>3}{}",
                    matrix.count(*cell),
                    severity_mark(cell.severity(thresholds))
                )
            })
            .collect();
        lines.push(format!("  {} |{cells}", first.impact));
    }
    lines.push(format!("    +{}", "-".repeat(25)));
    let axis: String = (1..=5).map(|probability| format!(" {probability:>3} ")).collect();
    lines.push(format!("     {axis}"));
    lines.push("      Probability".to_string());
    lines.push(String::new());
    lines.push(format!(
        "{} risks; L = low, M = moderate, H = high",
        matrix.total()
    ));
    block(&lines)
}

/// Timeline samples, one row per date and one column per status.
#[must_use]
pub fn timeline_table(timeline: &Timeline) -> String {
    let mut headers = vec!["Date"];
    headers.extend(timeline.series.iter().map(|s| s.status.as_str()));

    let rows: Vec<Vec<String>> = timeline
        .dates
        .iter()
        .enumerate()
        .map(|(index, date)| {
            let mut row = vec![format_date(*date)];
            row.extend(timeline.series.iter().map(|s| {
                s.points
                    .get(index)
                    .map(|p| format!("{:.1}", p.value))
                    .unwrap_or_default()
            }));
            row
        })
        .collect();
    table(&headers, &rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::ProjectMeta;
    use crate::risk::{RiskInput, RiskStatus};
    use crate::timeline::TimelineSettings;
    use chrono::{NaiveDate, TimeZone, Utc};

    fn thresholds() -> SeverityThresholds {
        SeverityThresholds::default()
    }

    fn risk(id: &str, p: u8, i: u8) -> Risk {
        let input = RiskInput {
            title: format!("Risk {id}"),
            category: "Technical".to_string(),
            probability: p,
            impact: i,
            date_identified: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            ..RiskInput::default()
        };
        Risk::create(
            id.to_string(),
            input,
            "",
            Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap(),
        )
    }

    #[test]
    fn test_score_line() {
        assert_eq!(
            score_line(7.25, &thresholds()),
            "Aggregated risk score: 7.2 (Moderate)"
        );
        assert_eq!(score_line(0.0, &thresholds()), "Aggregated risk score: 0.0 (Low)");
        assert!(score_line(15.0, &thresholds()).ends_with("(High)"));
    }

    #[test]
    fn test_history_line() {
        let mut r = risk("1", 2, 2);
        r.apply(
            RiskInput {
                status: RiskStatus::Mitigated,
                ..r.to_input()
            },
            "vendor confirmed",
            Utc.with_ymd_and_hms(2024, 4, 2, 10, 0, 0).unwrap(),
        );

        assert_eq!(history_line(&r.status_history[0]), "2024-03-01 - Open");
        assert_eq!(
            history_line(&r.status_history[1]),
            "2024-04-02 - Mitigated - vendor confirmed"
        );
    }

    #[test]
    fn test_risk_table() {
        let a = risk("a", 5, 4);
        let b = risk("b", 1, 2);
        let out = risk_table(&[&a, &b], &thresholds());
        let lines: Vec<&str> = out.lines().collect();

        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("Score"));
        assert!(lines[1].starts_with("-----"));
        assert!(lines[2].starts_with("20 H"));
        assert!(lines[3].starts_with("2 L"));
        assert!(lines[2].contains("Risk a"));
        assert!(lines[2].contains("2024-03-01"));
    }

    #[test]
    fn test_empty_tables() {
        assert_eq!(risk_table(&[], &thresholds()), "No risks.\n");
        assert_eq!(project_list(&[], &thresholds()), "No projects.\n");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefghijkl", 8), "abcde...");
        assert_eq!(truncate("first\nsecond", 40), "first...");
    }

    #[test]
    fn test_project_list() {
        let summary = ProjectSummary {
            id: "42".to_string(),
            meta: ProjectMeta::default(),
            risk_count: 3,
            aggregated_score: 16.0,
        };
        let out = project_list(&[summary], &thresholds());
        assert!(out.contains("Untitled Project"));
        assert!(out.contains("16.0"));
        assert!(out.contains("High"));
    }

    #[test]
    fn test_project_detail() {
        let mut project = Project::new(
            "7",
            ProjectMeta {
                project_name: "Orbit".to_string(),
                risk_plan: "Weekly review\nEscalate highs".to_string(),
                ..ProjectMeta::default()
            },
        );
        project.add_category("Legal");
        project.risks.push(risk("a", 2, 3));
        let out = project_detail(&project, &thresholds());

        assert!(out.starts_with("Orbit\n=====\n"));
        assert!(out.contains("Categories:      Legal"));
        assert!(out.contains("Aggregated risk score: 6.0 (Moderate)"));
        assert!(out.contains("  Escalate highs"));
    }

    #[test]
    fn test_risk_detail() {
        let mut r = risk("a", 3, 5);
        r.description = "Line one\nLine two".to_string();
        let out = risk_detail(&r, &thresholds());

        assert!(out.contains("Score:           15 = 3 x 5 (High)"));
        assert!(out.contains("  Line two"));
        assert!(out.contains("Status history:\n  2024-03-01 - Open\n"));
    }

    #[test]
    fn test_matrix_grid() {
        let risks = vec![risk("a", 5, 1), risk("b", 5, 1), risk("c", 1, 5)];
        let matrix = RiskMatrix::build(&risks);
        let out = matrix_grid(&matrix, &thresholds());
        let lines: Vec<&str> = out.lines().collect();

        // first grid row is impact 5; probability 1 holds risk c
        assert!(lines[1].starts_with("  5 |   1M"));
        // last grid row is impact 1; probability 5 holds a and b
        assert!(lines[5].starts_with("  1 |   0L"));
        assert!(lines[5].ends_with("  2M"));
        assert!(out.contains("3 risks"));
    }

    #[test]
    fn test_matrix_grid_footer() {
        let out = matrix_grid(&RiskMatrix::build(&Vec::<Risk>::new()), &thresholds());
        let lines: Vec<&str> = out.lines().collect();

        assert_eq!(lines.len(), 11);
        assert_eq!(lines[0], "Impact");
        assert_eq!(lines[6], format!("    +{}", "-".repeat(25)));
        assert_eq!(lines[7].trim_end(), "        1    2    3    4    5");
        assert_eq!(lines[8], "      Probability");
        assert_eq!(lines[9], "");
        assert_eq!(lines[10], "0 risks; L = low, M = moderate, H = high");
        assert!(out.ends_with("high\n"));
    }

    #[test]
    fn test_history_without_entries() {
        let mut r = risk("1", 1, 1);
        r.status_history.clear();
        assert_eq!(history(&r), "Status history:\n  (none)\n");
    }

    #[test]
    fn test_timeline_table() {
        let meta = ProjectMeta {
            start_date: NaiveDate::from_ymd_opt(2024, 3, 1),
            end_date: NaiveDate::from_ymd_opt(2024, 3, 20),
            ..ProjectMeta::default()
        };
        let risks = vec![risk("a", 2, 3)];
        let timeline = Timeline::build(&meta, &risks, &TimelineSettings::default()).unwrap();
        let out = timeline_table(&timeline);
        let lines: Vec<&str> = out.lines().collect();

        assert!(lines[0].starts_with("Date"));
        assert!(lines[0].contains("In-Progress"));
        // weekly samples on 1, 8 and 15 March
        assert_eq!(lines.len(), 5);
        assert!(lines[2].starts_with("2024-03-01  6.0"));
        assert!(lines[4].starts_with("2024-03-15"));
    }
}
