//! Turns a filtered batch of responses into the counts and headline metrics
//! the dashboard charts.

use crate::config::Question;
use crate::types::SurveyResponse;
use chrono::{DateTime, Utc};
use chrono_tz::Europe::Helsinki;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Count of one answer value for one question.
#[derive(Debug, Clone, Serialize)]
pub struct AnswerCount {
    pub answer: String,
    pub count: usize,
}

/// Chart-ready counts for one configured question.
#[derive(Debug, Clone, Serialize)]
pub struct QuestionCounts {
    pub code: String,
    /// Display label, wrapped to the configured title width.
    pub label: String,
    pub counts: Vec<AnswerCount>,
}

/// Headline metrics over the filtered response set.
#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub total: usize,
    pub unique_tokens: usize,
    pub completed: usize,
    pub partial: usize,
    /// When the snapshot behind these numbers was fetched, Finnish local time.
    pub data_updated: String,
    /// Cutoff applied to the data, Finnish local time.
    pub showing_after: String,
}

/// Wraps text into `<br>`-separated lines without splitting words.
/// Words longer than the width get a line of their own.
pub fn wrap_text(text: &str, width: usize) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        if current.is_empty() {
            current = word.to_string();
        } else if current.len() + 1 + word.len() <= width {
            current.push(' ');
            current.push_str(word);
        } else {
            lines.push(std::mem::take(&mut current));
            current = word.to_string();
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines.join("<br>")
}

/// The answer value a response carries for a question code, as display text.
/// Returns None for null/empty values so they stay out of the counts.
fn answer_value(response: &SurveyResponse, code: &str) -> Option<String> {
    match code {
        "lastpage" => Some(response.lastpage.to_string()),
        "is_completed" => Some(if response.is_completed { "yes" } else { "no" }.to_string()),
        _ => match response.answers.get(code)? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(if *b { "yes" } else { "no" }.to_string()),
            _ => None,
        },
    }
}

/// Sorts numerically when both answers parse as numbers, by text otherwise.
fn compare_answers(a: &str, b: &str) -> std::cmp::Ordering {
    match (a.parse::<f64>(), b.parse::<f64>()) {
        (Ok(x), Ok(y)) => x.partial_cmp(&y).unwrap_or(std::cmp::Ordering::Equal),
        _ => a.cmp(b),
    }
}

/// Per-question answer counts for every configured question present in the
/// data, in configuration order. Questions with no countable answers are
/// dropped, mirroring how an absent column is skipped.
pub fn question_counts(
    responses: &[SurveyResponse],
    questions: &[Question],
    title_wrap: usize,
    tick_wrap: usize,
) -> Vec<QuestionCounts> {
    let mut result = Vec::new();
    for question in questions {
        if question.code == "token" || question.code == "startdate" {
            continue;
        }
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for response in responses {
            if let Some(answer) = answer_value(response, &question.code) {
                *counts.entry(answer).or_insert(0) += 1;
            }
        }
        if counts.is_empty() {
            continue;
        }
        let mut ordered: Vec<(String, usize)> = counts.into_iter().collect();
        ordered.sort_by(|a, b| compare_answers(&a.0, &b.0));
        let counts = ordered
            .into_iter()
            .map(|(answer, count)| AnswerCount {
                answer: wrap_text(&answer, tick_wrap),
                count,
            })
            .collect();
        result.push(QuestionCounts {
            code: question.code.clone(),
            label: wrap_text(&question.label, title_wrap),
            counts,
        });
    }
    result
}

/// Formats a timestamp the way the dashboard header expects:
/// `21.5.2025 at 10:00:00 (Finnish time)`.
pub fn format_finnish_time(at: DateTime<Utc>) -> String {
    let local = at.with_timezone(&Helsinki);
    format!(
        "{}.{}.{} at {}",
        local.format("%-d"),
        local.format("%-m"),
        local.format("%Y"),
        local.format("%H:%M:%S (Finnish time)")
    )
}

pub fn summarize(
    responses: &[SurveyResponse],
    fetched_at: DateTime<Utc>,
    cutoff: DateTime<Utc>,
) -> Summary {
    let total = responses.len();
    let completed = responses.iter().filter(|r| r.is_completed).count();
    let mut tokens: Vec<&str> = responses
        .iter()
        .filter_map(|r| r.token.as_deref())
        .collect();
    tokens.sort_unstable();
    tokens.dedup();

    Summary {
        total,
        unique_tokens: tokens.len(),
        completed,
        partial: total - completed,
        data_updated: format_finnish_time(fetched_at),
        showing_after: cutoff
            .with_timezone(&Helsinki)
            .format("%d.%m.%Y %H:%M")
            .to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn response(id: &str, token: Option<&str>, lastpage: i64, age: &str) -> SurveyResponse {
        let raw = json!({
            "id": id,
            "token": token,
            "lastpage": lastpage,
            "startdate": "2025-05-21 10:00:00",
            "q1age": age,
        });
        SurveyResponse::from_raw(&raw, 3).unwrap()
    }

    fn questions() -> Vec<Question> {
        vec![
            Question { code: "q1age".into(), label: "Age".into() },
            Question { code: "is_completed".into(), label: "Completed Survey".into() },
            Question { code: "missing".into(), label: "Not In Data".into() },
        ]
    }

    #[test]
    fn wrap_keeps_words_whole() {
        assert_eq!(wrap_text("Frequency of Reading", 12), "Frequency of<br>Reading");
        assert_eq!(wrap_text("short", 20), "short");
        assert_eq!(wrap_text("supercalifragilistic", 5), "supercalifragilistic");
    }

    #[test]
    fn counts_are_sorted_by_answer() {
        let rs = vec![
            response("1", Some("a"), 4, "35-44"),
            response("2", Some("b"), 1, "25-34"),
            response("3", Some("c"), 4, "25-34"),
        ];
        let counts = question_counts(&rs, &questions(), 60, 20);
        let age = counts.iter().find(|c| c.code == "q1age").unwrap();
        assert_eq!(age.counts[0].answer, "25-34");
        assert_eq!(age.counts[0].count, 2);
        assert_eq!(age.counts[1].answer, "35-44");
        assert_eq!(age.counts[1].count, 1);
    }

    #[test]
    fn numeric_answers_sort_numerically() {
        assert_eq!(compare_answers("9", "10"), std::cmp::Ordering::Less);
        assert_eq!(compare_answers("b", "a"), std::cmp::Ordering::Greater);
    }

    #[test]
    fn absent_questions_are_dropped() {
        let rs = vec![response("1", None, 4, "25-34")];
        let counts = question_counts(&rs, &questions(), 60, 20);
        assert!(counts.iter().all(|c| c.code != "missing"));
    }

    #[test]
    fn derived_completion_column_is_countable() {
        let rs = vec![
            response("1", None, 4, "25-34"),
            response("2", None, 1, "25-34"),
        ];
        let counts = question_counts(&rs, &questions(), 60, 20);
        let completed = counts.iter().find(|c| c.code == "is_completed").unwrap();
        let yes = completed.counts.iter().find(|c| c.answer == "yes").unwrap();
        assert_eq!(yes.count, 1);
    }

    #[test]
    fn summary_counts_tokens_and_completion() {
        let rs = vec![
            response("1", Some("tok-a"), 4, "25-34"),
            response("2", Some("tok-a"), 1, "25-34"),
            response("3", None, 4, "25-34"),
        ];
        let fetched = Utc.with_ymd_and_hms(2025, 5, 21, 7, 30, 0).unwrap();
        let cutoff = Utc.with_ymd_and_hms(2025, 5, 20, 15, 0, 0).unwrap();
        let summary = summarize(&rs, fetched, cutoff);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.unique_tokens, 1);
        assert_eq!(summary.completed, 2);
        assert_eq!(summary.partial, 1);
        assert_eq!(summary.data_updated, "21.5.2025 at 10:30:00 (Finnish time)");
        assert_eq!(summary.showing_after, "20.05.2025 18:00");
    }

    #[test]
    fn empty_input_yields_empty_output() {
        let counts = question_counts(&[], &questions(), 60, 20);
        assert!(counts.is_empty());
        let summary = summarize(&[], Utc::now(), Utc::now());
        assert_eq!(summary.total, 0);
        assert_eq!(summary.partial, 0);
    }
}
