//! Cross-experiment aggregation.
//!
//! Rates and averages are weighted by each experiment's question count;
//! counters and histograms are summed; question-id sets are unioned.

use crate::error::{AnalysisError, Result};
use crate::models::{
    AgentChanges, AggregateSummary, ExperimentResult, Leader, OrderedMap, RetrievalSummary,
};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use tracing::{debug, warn};

/// Running `sum(value * weight)` and `sum(weight)`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WeightedMean {
    sum: f64,
    weight: u64,
}

impl WeightedMean {
    pub fn add(&mut self, value: f64, weight: u64) {
        self.sum += value * weight as f64;
        self.weight += weight;
    }

    pub fn merge(&mut self, other: &WeightedMean) {
        self.sum += other.sum;
        self.weight += other.weight;
    }

    /// `None` when nothing with a positive weight was added.
    pub fn mean(&self) -> Option<f64> {
        (self.weight > 0).then(|| self.sum / self.weight as f64)
    }
}

/// Incremental aggregation state.
///
/// Feed experiments with [`add`](Self::add), combine partial states with
/// [`merge`](Self::merge), and produce the summary with
/// [`finish`](Self::finish).
#[derive(Debug, Clone, Default)]
pub struct SummaryAccumulator {
    experiments: usize,
    total_questions: u64,
    accuracy: WeightedMean,
    agreement: WeightedMean,
    rounds: WeightedMean,
    retrieval_calls: WeightedMean,
    retrieval_used: u64,
    round_histogram: BTreeMap<u32, u64>,
    agent_accuracy: OrderedMap<WeightedMean>,
    agent_changes: OrderedMap<AgentChanges>,
    failed: BTreeSet<String>,
    agreed: BTreeSet<String>,
    /// Number of experiments in which each question was failed by all agents.
    failure_tally: OrderedMap<usize>,
    experiment_accuracy: OrderedMap<f64>,
}

impl SummaryAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one experiment into the running totals.
    pub fn add(&mut self, exp: &ExperimentResult) {
        let n = exp.total_questions;
        debug!("Aggregating '{}' ({} questions)", exp.exp_name, n);

        self.experiments += 1;
        self.total_questions += n;
        self.accuracy.add(exp.overall_final_accuracy, n);
        self.agreement.add(exp.agreement_rate, n);
        self.rounds.add(exp.average_round_count, n);
        self.retrieval_calls
            .add(exp.retrieval.average_calls_per_question, n);
        self.retrieval_used += exp.retrieval.questions_with_retrieval_used;

        self.experiment_accuracy
            .insert(exp.exp_name.clone(), exp.overall_final_accuracy);

        for (&round, &count) in &exp.round_count_histogram {
            *self.round_histogram.entry(round).or_default() += count;
        }

        for (agent, &accuracy) in exp.per_agent_accuracy.iter() {
            self.agent_accuracy
                .get_or_insert_with(agent, WeightedMean::default)
                .add(accuracy, n);
        }

        for (agent, changes) in exp.per_agent_changes.iter() {
            self.agent_changes
                .get_or_insert_with(agent, AgentChanges::default)
                .absorb(changes);
        }

        // A question listed twice in one experiment still counts once.
        let mut seen = HashSet::new();
        for qid in &exp.questions_all_agents_failed {
            if seen.insert(qid.as_str()) {
                *self.failure_tally.get_or_insert_with(qid, || 0) += 1;
            }
            self.failed.insert(qid.clone());
        }
        self.agreed
            .extend(exp.questions_all_agents_agreed.iter().cloned());
    }

    /// Combine with a state built from a disjoint set of experiments.
    pub fn merge(mut self, other: SummaryAccumulator) -> Self {
        self.experiments += other.experiments;
        self.total_questions += other.total_questions;
        self.accuracy.merge(&other.accuracy);
        self.agreement.merge(&other.agreement);
        self.rounds.merge(&other.rounds);
        self.retrieval_calls.merge(&other.retrieval_calls);
        self.retrieval_used += other.retrieval_used;

        for (round, count) in other.round_histogram {
            *self.round_histogram.entry(round).or_default() += count;
        }
        for (agent, mean) in other.agent_accuracy {
            self.agent_accuracy
                .get_or_insert_with(&agent, WeightedMean::default)
                .merge(&mean);
        }
        for (agent, changes) in other.agent_changes {
            self.agent_changes
                .get_or_insert_with(&agent, AgentChanges::default)
                .absorb(&changes);
        }
        for (qid, count) in other.failure_tally {
            *self.failure_tally.get_or_insert_with(&qid, || 0) += count;
        }
        for (name, accuracy) in other.experiment_accuracy {
            self.experiment_accuracy.insert(name, accuracy);
        }
        self.failed.extend(other.failed);
        self.agreed.extend(other.agreed);

        self
    }

    /// Produce the summary, checking the preconditions for every division.
    pub fn finish(self) -> Result<AggregateSummary> {
        if self.experiments == 0 {
            return Err(AnalysisError::NoExperiments);
        }
        if self.total_questions == 0 {
            return Err(AnalysisError::ZeroQuestions {
                experiments: self.experiments,
            });
        }

        let ratio = |mean: &WeightedMean| mean.mean().unwrap_or_default();

        let mut per_agent_accuracy = OrderedMap::new();
        for (agent, mean) in self.agent_accuracy {
            match mean.mean() {
                Some(accuracy) => per_agent_accuracy.insert(agent, accuracy),
                None => warn!(
                    "Agent '{}' only appears in experiments with no questions; skipping",
                    agent
                ),
            }
        }

        let best_agent = leader(&per_agent_accuracy).ok_or(AnalysisError::NoAgents)?;
        let best_experiment =
            leader(&self.experiment_accuracy).ok_or(AnalysisError::NoExperiments)?;

        let experiments = self.experiments;
        let globally_failed_questions = self
            .failure_tally
            .into_iter()
            .filter(|(_, count)| *count == experiments)
            .map(|(qid, _)| qid)
            .collect();

        Ok(AggregateSummary {
            experiments_count: self.experiments,
            total_questions: self.total_questions,
            overall_accuracy: ratio(&self.accuracy),
            per_agent_accuracy,
            best_agent,
            agreement_rate: ratio(&self.agreement),
            average_round_count: ratio(&self.rounds),
            round_count_histogram: self.round_histogram,
            per_agent_changes: self.agent_changes,
            retrieval: RetrievalSummary {
                average_calls_per_question: ratio(&self.retrieval_calls),
                total_questions_with_retrieval: self.retrieval_used,
            },
            questions_all_agents_failed: self.failed,
            questions_all_agents_agreed: self.agreed,
            per_experiment_accuracy: self.experiment_accuracy,
            best_experiment,
            globally_failed_questions,
        })
    }
}

impl From<&ExperimentResult> for SummaryAccumulator {
    fn from(exp: &ExperimentResult) -> Self {
        let mut acc = Self::new();
        acc.add(exp);
        acc
    }
}

/// Aggregate a full set of experiments into one summary.
pub fn aggregate(experiments: &[ExperimentResult]) -> Result<AggregateSummary> {
    experiments
        .iter()
        .map(SummaryAccumulator::from)
        .fold(SummaryAccumulator::new(), SummaryAccumulator::merge)
        .finish()
}

/// Highest accuracy; the earliest entry wins a tie.
fn leader(accuracies: &OrderedMap<f64>) -> Option<Leader> {
    accuracies
        .iter()
        .fold(None::<(&str, f64)>, |best, (name, &accuracy)| match best {
            Some((_, top)) if accuracy <= top => best,
            _ => Some((name, accuracy)),
        })
        .map(|(name, accuracy)| Leader {
            name: name.to_string(),
            accuracy,
        })
}
