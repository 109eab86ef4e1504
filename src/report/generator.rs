//! Report generation.
//!
//! Renders an [`AggregateSummary`] as an ordered list of text lines, or as a
//! JSON document for downstream tooling.

use crate::config::ReportConfig;
use crate::models::AggregateSummary;
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Knobs for the text report.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportOptions {
    /// Agreement rates below this trigger the coordination insight.
    pub agreement_threshold: f64,
    /// Maximum number of globally failed ids listed.
    pub max_failed_ids: usize,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            agreement_threshold: 0.9,
            max_failed_ids: 10,
        }
    }
}

impl From<&ReportConfig> for ReportOptions {
    fn from(config: &ReportConfig) -> Self {
        Self {
            agreement_threshold: config.agreement_threshold,
            max_failed_ids: config.max_failed_ids,
        }
    }
}

/// Metadata attached to the JSON report.
#[derive(Debug, Clone, Serialize)]
pub struct ReportMetadata {
    /// When the report was generated.
    pub generated_at: DateTime<Utc>,
    /// Directory the result files were read from.
    pub results_dir: String,
    /// Number of result files loaded.
    pub files_loaded: usize,
}

#[derive(Serialize)]
struct JsonReport<'a> {
    metadata: &'a ReportMetadata,
    summary: &'a AggregateSummary,
}

/// Format a ratio as a percentage with two decimals, e.g. `0.7` -> `70.00%`.
fn percent(value: f64) -> String {
    format!("{:.2}%", value * 100.0)
}

/// Generate the text report, one entry per output line.
pub fn generate_text_report(summary: &AggregateSummary, options: &ReportOptions) -> Vec<String> {
    let mut lines = Vec::new();

    lines.push("### Aggregated Experiment Analysis ###".to_string());
    lines.push(String::new());
    lines.push(format!(
        "Total questions across experiments: {}",
        summary.total_questions
    ));
    lines.push(format!(
        "Overall final accuracy: {}",
        percent(summary.overall_accuracy)
    ));
    lines.push(String::new());

    lines.extend(generate_accuracy_section(summary));
    lines.extend(generate_rounds_section(summary));
    lines.extend(generate_changes_section(summary));
    lines.extend(generate_retrieval_section(summary));
    lines.extend(generate_problem_questions_section(summary, options));
    lines.extend(generate_insights_section(summary, options));

    lines
}

/// Per-experiment and per-agent accuracy with their leaders.
fn generate_accuracy_section(summary: &AggregateSummary) -> Vec<String> {
    let mut lines = vec!["#### Accuracy per Experiment:".to_string()];
    for (name, accuracy) in summary.per_experiment_accuracy.iter() {
        lines.push(format!(" - {}: {}", name, percent(*accuracy)));
    }

    lines.push(String::new());
    lines.push(format!(
        "Best performing experiment: **{}** with accuracy {}",
        summary.best_experiment.name,
        percent(summary.best_experiment.accuracy)
    ));
    lines.push(String::new());

    lines.push("#### Per-agent accuracy:".to_string());
    for (agent, accuracy) in summary.per_agent_accuracy.iter() {
        lines.push(format!(" - {}: {}", agent, percent(*accuracy)));
    }

    lines.push(String::new());
    lines.push(format!(
        "Best performing agent: **{}** with accuracy {}",
        summary.best_agent.name,
        percent(summary.best_agent.accuracy)
    ));
    lines.push(String::new());

    lines
}

fn generate_rounds_section(summary: &AggregateSummary) -> Vec<String> {
    let mut lines = vec![
        format!(
            "Agreement rate across agents: {}",
            percent(summary.agreement_rate)
        ),
        format!(
            "Average reasoning rounds: {:.2}",
            summary.average_round_count
        ),
        "Round count distribution:".to_string(),
    ];

    for (rounds, questions) in &summary.round_count_histogram {
        lines.push(format!(" - {} rounds: {} questions", rounds, questions));
    }

    lines
}

fn generate_changes_section(summary: &AggregateSummary) -> Vec<String> {
    let mut lines = vec![String::new(), "#### Per-agent changes:".to_string()];

    for (agent, changes) in summary.per_agent_changes.iter() {
        lines.push(format!(
            " - {}: Changed {} times (→ correct: {}, → wrong: {})",
            agent, changes.changed_total, changes.changed_to_correct, changes.changed_to_wrong
        ));
    }

    lines
}

fn generate_retrieval_section(summary: &AggregateSummary) -> Vec<String> {
    vec![
        String::new(),
        "#### Retrieval stats:".to_string(),
        format!(
            " - Avg calls per question: {:.2}",
            summary.retrieval.average_calls_per_question
        ),
        format!(
            " - Total questions with retrieval: {}",
            summary.retrieval.total_questions_with_retrieval
        ),
    ]
}

fn generate_problem_questions_section(
    summary: &AggregateSummary,
    options: &ReportOptions,
) -> Vec<String> {
    let listed: Vec<&str> = summary
        .globally_failed_questions
        .iter()
        .take(options.max_failed_ids)
        .map(String::as_str)
        .collect();

    vec![
        String::new(),
        "#### Problematic questions:".to_string(),
        format!(
            " - All agents failed (combined): {}",
            summary.questions_all_agents_failed.len()
        ),
        format!(
            " - Globally failed questions (all agents wrong in all experiments): {} → IDs: [{}]",
            summary.globally_failed_questions.len(),
            listed.join(", ")
        ),
        format!(
            " - All agents agreed: {}",
            summary.questions_all_agents_agreed.len()
        ),
        String::new(),
    ]
}

/// Heuristic observations. Each condition is checked independently.
fn generate_insights_section(summary: &AggregateSummary, options: &ReportOptions) -> Vec<String> {
    let mut lines = vec!["**Insights:**".to_string()];

    if summary.agreement_rate < options.agreement_threshold {
        lines.push("- Agents often disagree; consider stronger coordination.".to_string());
    }
    if !summary.globally_failed_questions.is_empty() {
        lines.push(
            "- Some questions were consistently challenging across all experiments.".to_string(),
        );
    }
    if summary.revisions_helped() {
        lines.push(
            "- Agent changes usually improved answers, indicating beneficial revision cycles."
                .to_string(),
        );
    }

    lines
}

/// Generate a JSON report.
pub fn generate_json_report(summary: &AggregateSummary, metadata: &ReportMetadata) -> Result<String> {
    let report = JsonReport { metadata, summary };
    serde_json::to_string_pretty(&report).map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AgentChanges, Leader, RetrievalSummary};
    use std::collections::{BTreeMap, BTreeSet};

    fn create_test_summary() -> AggregateSummary {
        AggregateSummary {
            experiments_count: 2,
            total_questions: 30,
            overall_accuracy: 0.7,
            per_agent_accuracy: [("solver", 0.75), ("critic", 0.6)].into_iter().collect(),
            best_agent: Leader {
                name: "solver".to_string(),
                accuracy: 0.75,
            },
            agreement_rate: 0.95,
            average_round_count: 2.3333,
            round_count_histogram: [(1, 12), (2, 10), (3, 8)].into_iter().collect(),
            per_agent_changes: [(
                "solver",
                AgentChanges {
                    changed_total: 5,
                    changed_to_correct: 2,
                    changed_to_wrong: 3,
                },
            )]
            .into_iter()
            .collect(),
            retrieval: RetrievalSummary {
                average_calls_per_question: 1.25,
                total_questions_with_retrieval: 17,
            },
            questions_all_agents_failed: ["q1", "q2"].iter().map(|s| s.to_string()).collect(),
            questions_all_agents_agreed: BTreeSet::new(),
            per_experiment_accuracy: [("a.json", 0.5), ("b.json", 0.8)].into_iter().collect(),
            best_experiment: Leader {
                name: "b.json".to_string(),
                accuracy: 0.8,
            },
            globally_failed_questions: Vec::new(),
        }
    }

    fn render(summary: &AggregateSummary) -> Vec<String> {
        generate_text_report(summary, &ReportOptions::default())
    }

    fn insights(lines: &[String]) -> &[String] {
        let start = lines
            .iter()
            .position(|l| l == "**Insights:**")
            .expect("insights header");
        &lines[start + 1..]
    }

    #[test]
    fn test_percent_formatting() {
        assert_eq!(percent(0.7), "70.00%");
        assert_eq!(percent(0.12345), "12.35%");
        assert_eq!(percent(1.0), "100.00%");
    }

    #[test]
    fn test_report_line_order() {
        let lines = render(&create_test_summary());

        assert_eq!(lines[0], "### Aggregated Experiment Analysis ###");
        assert_eq!(lines[1], "");
        assert_eq!(lines[2], "Total questions across experiments: 30");
        assert_eq!(lines[3], "Overall final accuracy: 70.00%");
        assert_eq!(lines[5], "#### Accuracy per Experiment:");
        assert_eq!(lines[6], " - a.json: 50.00%");
        assert_eq!(lines[7], " - b.json: 80.00%");
        assert_eq!(
            lines[9],
            "Best performing experiment: **b.json** with accuracy 80.00%"
        );

        let position = |needle: &str| lines.iter().position(|l| l.starts_with(needle)).unwrap();
        assert!(position("#### Per-agent accuracy:") < position("Best performing agent:"));
        assert!(position("Agreement rate across agents:") < position("Round count distribution:"));
        assert!(position("#### Per-agent changes:") < position("#### Retrieval stats:"));
        assert!(position("#### Retrieval stats:") < position("#### Problematic questions:"));
        assert!(position("#### Problematic questions:") < position("**Insights:**"));
    }

    #[test]
    fn test_report_details() {
        let report = render(&create_test_summary()).join("\n");

        assert!(report.contains(" - solver: 75.00%\n - critic: 60.00%"));
        assert!(report.contains("Best performing agent: **solver** with accuracy 75.00%"));
        assert!(report.contains("Average reasoning rounds: 2.33"));
        assert!(report.contains(" - 1 rounds: 12 questions\n - 2 rounds: 10 questions"));
        assert!(report.contains(" - solver: Changed 5 times (→ correct: 2, → wrong: 3)"));
        assert!(report.contains(" - Avg calls per question: 1.25"));
        assert!(report.contains(" - Total questions with retrieval: 17"));
        assert!(report.contains(" - All agents failed (combined): 2"));
        assert!(report.contains(" - All agents agreed: 0"));
    }

    #[test]
    fn test_no_insights_when_nothing_stands_out() {
        let lines = render(&create_test_summary());
        assert!(insights(&lines).is_empty());
    }

    #[test]
    fn test_all_insights() {
        let mut summary = create_test_summary();
        summary.agreement_rate = 0.85;
        summary.globally_failed_questions = vec!["q1".to_string()];
        summary.per_agent_changes.insert(
            "critic",
            AgentChanges {
                changed_total: 4,
                changed_to_correct: 3,
                changed_to_wrong: 1,
            },
        );

        let lines = render(&summary);
        assert_eq!(
            insights(&lines),
            [
                "- Agents often disagree; consider stronger coordination.",
                "- Some questions were consistently challenging across all experiments.",
                "- Agent changes usually improved answers, indicating beneficial revision cycles.",
            ]
        );
    }

    #[test]
    fn test_agreement_at_threshold_has_no_coordination_insight() {
        let mut summary = create_test_summary();
        summary.agreement_rate = 0.9;
        let lines = render(&summary);
        assert!(insights(&lines).is_empty());

        summary.agreement_rate = 0.8999;
        let lines = render(&summary);
        assert_eq!(
            insights(&lines),
            ["- Agents often disagree; consider stronger coordination."]
        );
    }

    #[test]
    fn test_balanced_changes_have_no_revision_insight() {
        let mut summary = create_test_summary();
        summary.per_agent_changes.insert(
            "solver",
            AgentChanges {
                changed_total: 6,
                changed_to_correct: 3,
                changed_to_wrong: 3,
            },
        );
        let lines = render(&summary);
        assert!(insights(&lines).is_empty());
    }

    #[test]
    fn test_agreement_threshold_is_configurable() {
        let summary = create_test_summary();
        let options = ReportOptions {
            agreement_threshold: 0.99,
            ..ReportOptions::default()
        };
        let lines = generate_text_report(&summary, &options);
        assert_eq!(
            insights(&lines),
            ["- Agents often disagree; consider stronger coordination."]
        );
    }

    #[test]
    fn test_failed_ids_are_truncated() {
        let mut summary = create_test_summary();
        summary.globally_failed_questions = (1..=12).map(|i| format!("q{}", i)).collect();

        let report = render(&summary).join("\n");
        assert!(report.contains(
            "all experiments): 12 → IDs: [q1, q2, q3, q4, q5, q6, q7, q8, q9, q10]"
        ));
        assert!(!report.contains("q11"));
    }

    #[test]
    fn test_generate_json_report() {
        let summary = create_test_summary();
        let metadata = ReportMetadata {
            generated_at: Utc::now(),
            results_dir: "./results".to_string(),
            files_loaded: 2,
        };

        let json = generate_json_report(&summary, &metadata).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["metadata"]["files_loaded"], 2);
        assert_eq!(value["summary"]["total_questions"], 30);
        assert_eq!(value["summary"]["best_agent"]["name"], "solver");
        assert_eq!(value["summary"]["round_count_histogram"]["3"], 8);
        assert!(json.find("\"solver\"").unwrap() < json.find("\"critic\"").unwrap());
    }

    #[test]
    fn test_options_from_config() {
        let config = ReportConfig {
            agreement_threshold: 0.6,
            max_failed_ids: 4,
            ..ReportConfig::default()
        };
        let options = ReportOptions::from(&config);
        assert_eq!(options.agreement_threshold, 0.6);
        assert_eq!(options.max_failed_ids, 4);
    }

    #[test]
    fn test_empty_histogram_keeps_header() {
        let mut summary = create_test_summary();
        summary.round_count_histogram = BTreeMap::new();
        let lines = render(&summary);
        let header = lines
            .iter()
            .position(|l| l == "Round count distribution:")
            .unwrap();
        assert_eq!(lines[header + 1], "");
        assert_eq!(lines[header + 2], "#### Per-agent changes:");
    }
}
