//! JSON output and plain-text summary tables.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;

use anyhow::{Context, Result};

use crate::result::BenchResult;

/// Write all results to a pretty-printed JSON file.
pub fn save_results(results: &[BenchResult], path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(results)?;
    std::fs::write(path, json)
        .with_context(|| format!("writing results to {}", path.display()))?;
    Ok(())
}

/// min/median/max/mean over a sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stats {
    pub min: f64,
    pub median: f64,
    pub max: f64,
    pub mean: f64,
}

pub fn stats(values: &[f64]) -> Stats {
    if values.is_empty() {
        return Stats {
            min: 0.0,
            median: 0.0,
            max: 0.0,
            mean: 0.0,
        };
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let n = sorted.len();
    let median = if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    };
    Stats {
        min: sorted[0],
        median,
        max: sorted[n - 1],
        mean: sorted.iter().sum::<f64>() / n as f64,
    }
}

fn render_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if cell.len() > widths[i] {
                widths[i] = cell.len();
            }
        }
    }

    let mut out = String::new();
    let mut line = String::new();
    for (header, &width) in headers.iter().zip(&widths) {
        let _ = write!(line, "{header:<width$}  ");
    }
    out.push_str(line.trim_end());
    out.push('\n');
    for width in &widths {
        out.push_str(&"-".repeat(*width));
        out.push_str("  ");
    }
    while out.ends_with(' ') {
        out.pop();
    }
    out.push('\n');
    for row in rows {
        let mut line = String::new();
        for (cell, &width) in row.iter().zip(&widths) {
            let _ = write!(line, "{cell:<width$}  ");
        }
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out
}

fn score_cell(score: Option<f64>) -> String {
    match score {
        Some(s) => format!("{s:.2}"),
        None => "unscored".to_string(),
    }
}

/// Per-combination detail table.
pub fn detail_table(results: &[BenchResult]) -> String {
    let headers = [
        "Approach", "Model", "Task", "In Tok", "Out Tok", "Total", "Time(s)", "Cost($)", "Score",
        "Error",
    ];
    let rows: Vec<Vec<String>> = results
        .iter()
        .map(|r| {
            vec![
                r.approach.clone(),
                r.model.clone(),
                r.task_id.clone(),
                r.input_tokens.to_string(),
                r.output_tokens.to_string(),
                r.total_tokens.to_string(),
                format!("{:.2}", r.wall_clock_seconds),
                format!("{:.4}", r.estimated_cost_usd),
                score_cell(r.judge_score),
                r.error
                    .as_deref()
                    .map(|e| e.chars().take(30).collect())
                    .unwrap_or_default(),
            ]
        })
        .collect();
    render_table(&headers, &rows)
}

/// Per-(approach, model) aggregate table: token, time, and score spreads
/// plus total cost.
pub fn aggregate_table(results: &[BenchResult]) -> String {
    let mut groups: BTreeMap<(String, String), Vec<&BenchResult>> = BTreeMap::new();
    for r in results {
        groups
            .entry((r.approach.clone(), r.model.clone()))
            .or_default()
            .push(r);
    }

    let headers = [
        "Approach",
        "Model",
        "Tasks",
        "Tok med",
        "Tok min",
        "Tok max",
        "Time med",
        "Time min",
        "Time max",
        "Cost($)",
        "Score med",
        "Score min",
        "Score max",
    ];
    let rows: Vec<Vec<String>> = groups
        .iter()
        .map(|((approach, model), group)| {
            let tokens = stats(&group.iter().map(|r| r.total_tokens as f64).collect::<Vec<_>>());
            let time = stats(&group.iter().map(|r| r.wall_clock_seconds).collect::<Vec<_>>());
            let total_cost: f64 = group.iter().map(|r| r.estimated_cost_usd).sum();
            let scores: Vec<f64> = group.iter().filter_map(|r| r.judge_score).collect();

            let (score_med, score_min, score_max) = if scores.is_empty() {
                ("unscored".into(), "unscored".into(), "unscored".into())
            } else {
                let s = stats(&scores);
                (
                    format!("{:.2}", s.median),
                    format!("{:.2}", s.min),
                    format!("{:.2}", s.max),
                )
            };

            vec![
                approach.clone(),
                model.clone(),
                group.len().to_string(),
                format!("{:.0}", tokens.median),
                format!("{:.0}", tokens.min),
                format!("{:.0}", tokens.max),
                format!("{:.1}", time.median),
                format!("{:.1}", time.min),
                format!("{:.1}", time.max),
                format!("{total_cost:.4}"),
                score_med,
                score_min,
                score_max,
            ]
        })
        .collect();
    render_table(&headers, &rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(approach: &str, model: &str, task: &str, tokens: u64, score: Option<f64>) -> BenchResult {
        let mut r = BenchResult::empty(approach, model, task);
        r.total_tokens = tokens;
        r.wall_clock_seconds = tokens as f64 / 100.0;
        r.estimated_cost_usd = tokens as f64 / 10_000.0;
        r.judge_score = score;
        r
    }

    #[test]
    fn test_stats_odd_and_even() {
        let s = stats(&[3.0, 1.0, 2.0]);
        assert_eq!(s.min, 1.0);
        assert_eq!(s.median, 2.0);
        assert_eq!(s.max, 3.0);
        assert_eq!(s.mean, 2.0);

        let s = stats(&[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(s.median, 2.5);
    }

    #[test]
    fn test_stats_empty_is_zeroed() {
        assert_eq!(
            stats(&[]),
            Stats {
                min: 0.0,
                median: 0.0,
                max: 0.0,
                mean: 0.0
            }
        );
    }

    #[test]
    fn test_detail_table_marks_unscored() {
        let table = detail_table(&[
            result("skill", "opus", "t1", 500, Some(0.75)),
            result("skill", "opus", "t2", 700, None),
        ]);
        assert!(table.contains("0.75"));
        assert!(table.contains("unscored"));
    }

    #[test]
    fn test_aggregate_groups_by_approach_and_model() {
        let table = aggregate_table(&[
            result("mcp_direct", "haiku", "t1", 100, Some(1.0)),
            result("mcp_direct", "haiku", "t2", 300, Some(0.5)),
            result("skill", "opus", "t1", 900, Some(0.25)),
        ]);
        let lines: Vec<&str> = table.lines().collect();
        // Header, separator, two group rows.
        assert_eq!(lines.len(), 4);
        assert!(lines[2].starts_with("mcp_direct"));
        assert!(lines[2].contains("200"));
        assert!(lines[3].starts_with("skill"));
    }

    #[test]
    fn test_save_results_writes_json_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.json");
        save_results(&[result("skill", "opus", "t1", 10, None)], &path).unwrap();
        let raw = std::fs::read_to_string(&path).unwrap();
        let parsed: Vec<BenchResult> = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].judge_score, None);
    }
}
