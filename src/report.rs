/// Plain-text rendering of run results for the CLI.
use chrono::NaiveDate;

use crate::agents::master::LogKind;
use crate::agents::memory::Event;
use crate::agents::orchestrator::{DashboardSnapshot, RunSummary};
use crate::calendar::display_long;

const PREVIEW_CHARS: usize = 160;

pub fn render_today(as_of: NaiveDate, events: &[Event]) -> String {
    let mut lines = vec![format!("Birthdays for {}:", display_long(as_of))];
    if events.is_empty() {
        lines.push("  none".to_string());
    }
    lines.extend(events.iter().map(|event| {
        format!(
            "- {} ({}) [{}] id={}",
            event.subject_name, event.relationship_label, event.occurs_on, event.id
        )
    }));
    finish(lines)
}

pub fn render_run_report(summary: &RunSummary, snapshot: &DashboardSnapshot) -> String {
    let mut lines = vec![
        format!("Family Connect run for {}", display_long(summary.as_of)),
        format!(
            "Events matched: {}  Alerts routed: {}",
            summary.events_matched, summary.alerts_routed
        ),
    ];
    if let Some(warning) = &summary.data_warning {
        lines.push(format!("Data warning: {warning}"));
    }

    if snapshot.matched_events.is_empty() {
        lines.push(String::new());
        lines.push("No birthdays today.".to_string());
        return finish(lines);
    }

    section(&mut lines, "Matched events:");
    for record in &snapshot.matched_events {
        lines.push(format!(
            "- {} ({}) on {}",
            record.event.subject_name, record.event.relationship_label, record.as_of
        ));
        if let Some(analysis) = &record.analysis {
            lines.push(format!("  analysis: {}", preview(analysis)));
        }
    }

    section(&mut lines, "Conversation log:");
    for entry in &snapshot.conversation_log {
        let kind = match entry.kind {
            LogKind::AlertReceived => "alert_received",
            LogKind::ReplyReceived => "reply_received",
        };
        lines.push(format!(
            "- [{}] {kind}: {}",
            entry.timestamp.format("%H:%M:%S"),
            preview(&entry.derived_text)
        ));
    }

    section(&mut lines, "Elderly interactions:");
    for record in &snapshot.interactions {
        lines.push(format!("- {}", record.event.subject_name));
        lines.push(format!("  reminder: {}", preview(&record.message)));
        lines.push(format!("  suggestions: {}", preview(&record.suggested_actions)));
        lines.push(format!("  reply: {}", preview(&record.reply)));
    }

    section(&mut lines, "Relative notifications:");
    for record in &snapshot.notifications {
        let suggestions = record.suggestions.as_deref().map(preview).unwrap_or_default();
        lines.push(format!("- {}", record.context.event.subject_name));
        lines.push(format!("  insights: {}", preview(&record.insights)));
        lines.push(format!("  suggestions: {suggestions}"));
    }

    finish(lines)
}

fn section(lines: &mut Vec<String>, title: &str) {
    lines.push(String::new());
    lines.push(title.to_string());
}

fn finish(lines: Vec<String>) -> String {
    let mut out = lines.join("\n");
    out.push('\n');
    out
}

fn preview(text: &str) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= PREVIEW_CHARS {
        return flat;
    }
    let cut = flat.chars().take(PREVIEW_CHARS).collect::<String>();
    format!("{cut}...")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::MonthDay;

    fn alice() -> Event {
        Event {
            id: "bday-1".to_string(),
            subject_name: "Alice".to_string(),
            relationship_label: "daughter".to_string(),
            occurs_on: MonthDay::new(3, 15).unwrap(),
            attributes: Default::default(),
        }
    }

    #[test]
    fn today_listing_shows_each_match() {
        let as_of = NaiveDate::from_ymd_opt(2025, 3, 15).unwrap();
        let text = render_today(as_of, &[alice()]);
        assert!(text.starts_with("Birthdays for March 15, 2025:"));
        assert!(text.contains("- Alice (daughter) [03-15] id=bday-1"));

        assert!(render_today(as_of, &[]).contains("none"));
    }

    #[test]
    fn empty_run_reports_no_birthdays_and_warning() {
        let summary = RunSummary {
            as_of: NaiveDate::from_ymd_opt(2025, 1, 2).unwrap(),
            events_matched: 0,
            alerts_routed: 0,
            data_warning: Some("birthday file not found at 'x.json'".to_string()),
        };
        let text = render_run_report(&summary, &DashboardSnapshot::default());
        assert!(text.contains("Data warning: birthday file not found"));
        assert!(text.contains("No birthdays today."));
    }

    #[test]
    fn run_report_lists_matches_under_blank_line_sections() {
        let as_of = NaiveDate::from_ymd_opt(2025, 3, 15).unwrap();
        let summary = RunSummary {
            as_of,
            events_matched: 1,
            alerts_routed: 1,
            data_warning: None,
        };
        let snapshot = DashboardSnapshot {
            matched_events: vec![crate::agents::memory::MatchRecord {
                timestamp: chrono::Utc::now(),
                as_of,
                event: alice(),
                analysis: Some("Plan\n a   call".to_string()),
            }],
            ..Default::default()
        };
        let text = render_run_report(&summary, &snapshot);
        assert!(text.contains("Events matched: 1  Alerts routed: 1\n\nMatched events:\n"));
        assert!(text.contains("- Alice (daughter) on 2025-03-15\n  analysis: Plan a call\n"));
        assert!(text.contains("\n\nRelative notifications:\n"));
        assert!(text.ends_with('\n'));
        assert!(!text.contains("Data warning"));
    }

    #[test]
    fn preview_flattens_and_truncates() {
        assert_eq!(preview("a\n  b"), "a b");
        let long = "x".repeat(PREVIEW_CHARS + 10);
        assert!(preview(&long).ends_with("..."));
        assert_eq!(preview(&long).chars().count(), PREVIEW_CHARS + 3);
    }
}
