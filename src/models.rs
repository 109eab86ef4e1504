//! Data models for experiment results and their aggregate summary.
//!
//! `ExperimentResult` mirrors one per-experiment JSON file. `AggregateSummary`
//! is the single cross-experiment record produced by the aggregator.

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::marker::PhantomData;

/// A string-keyed map that keeps keys in first-insertion order.
///
/// Agent and experiment listings are reported in the order they were first
/// seen, and "best" ties resolve to the earliest entry. Lookups go through a
/// hash index into `entries`.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderedMap<V> {
    entries: Vec<(String, V)>,
    index: HashMap<String, usize>,
}

impl<V> Default for OrderedMap<V> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<V> OrderedMap<V> {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn get(&self, key: &str) -> Option<&V> {
        self.index.get(key).map(|&i| &self.entries[i].1)
    }

    /// Insert or overwrite. An overwritten key keeps its original position.
    pub fn insert(&mut self, key: impl Into<String>, value: V) {
        let key = key.into();
        match self.index.get(&key) {
            Some(&i) => self.entries[i].1 = value,
            None => {
                self.index.insert(key.clone(), self.entries.len());
                self.entries.push((key, value));
            }
        }
    }

    /// Mutable access to `key`, inserting `default()` at the end if absent.
    pub fn get_or_insert_with(&mut self, key: &str, default: impl FnOnce() -> V) -> &mut V {
        let i = match self.index.get(key) {
            Some(&i) => i,
            None => {
                let i = self.entries.len();
                self.index.insert(key.to_string(), i);
                self.entries.push((key.to_string(), default()));
                i
            }
        };
        &mut self.entries[i].1
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.entries.iter().map(|(_, v)| v)
    }
}

impl<V> IntoIterator for OrderedMap<V> {
    type Item = (String, V);
    type IntoIter = std::vec::IntoIter<(String, V)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<K: Into<String>, V> FromIterator<(K, V)> for OrderedMap<V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

impl<V: Serialize> Serialize for OrderedMap<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de, V: Deserialize<'de>> Deserialize<'de> for OrderedMap<V> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct OrderedMapVisitor<V>(PhantomData<V>);

        impl<'de, V: Deserialize<'de>> Visitor<'de> for OrderedMapVisitor<V> {
            type Value = OrderedMap<V>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map with string keys")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut map = OrderedMap::new();
                while let Some((key, value)) = access.next_entry::<String, V>()? {
                    map.insert(key, value);
                }
                Ok(map)
            }
        }

        deserializer.deserialize_map(OrderedMapVisitor(PhantomData))
    }
}

/// How often an agent revised its answer, and in which direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentChanges {
    pub changed_total: u64,
    pub changed_to_correct: u64,
    pub changed_to_wrong: u64,
}

impl AgentChanges {
    /// Add another set of counters field by field.
    pub fn absorb(&mut self, other: &AgentChanges) {
        self.changed_total += other.changed_total;
        self.changed_to_correct += other.changed_to_correct;
        self.changed_to_wrong += other.changed_to_wrong;
    }

    /// True when revisions fixed more answers than they broke.
    pub fn is_net_improvement(&self) -> bool {
        self.changed_to_correct > self.changed_to_wrong
    }
}

/// Retrieval usage within a single experiment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetrievalStats {
    pub average_calls_per_question: f64,
    pub questions_with_retrieval_used: u64,
}

/// Parsed contents of one per-experiment result file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentResult {
    /// Experiment label; the loader fills in the file name when absent.
    pub exp_name: String,
    pub total_questions: u64,
    pub overall_final_accuracy: f64,
    pub agreement_rate: f64,
    pub average_round_count: f64,
    /// Round number -> number of questions settled in that many rounds.
    pub round_count_histogram: BTreeMap<u32, u64>,
    pub per_agent_accuracy: OrderedMap<f64>,
    pub per_agent_changes: OrderedMap<AgentChanges>,
    pub retrieval: RetrievalStats,
    #[serde(default, deserialize_with = "question_ids")]
    pub questions_all_agents_failed: Vec<String>,
    #[serde(default, deserialize_with = "question_ids")]
    pub questions_all_agents_agreed: Vec<String>,
}

/// A field whose value is outside its allowed range.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldViolation {
    pub field: String,
    pub reason: String,
}

impl ExperimentResult {
    /// Range-check the numeric fields.
    pub fn validate(&self) -> Result<(), FieldViolation> {
        check_rate("overall_final_accuracy", self.overall_final_accuracy)?;
        check_rate("agreement_rate", self.agreement_rate)?;
        check_non_negative("average_round_count", self.average_round_count)?;
        check_non_negative(
            "retrieval.average_calls_per_question",
            self.retrieval.average_calls_per_question,
        )?;

        for (agent, accuracy) in self.per_agent_accuracy.iter() {
            check_rate(&format!("per_agent_accuracy.{}", agent), *accuracy)?;
        }

        Ok(())
    }
}

fn check_rate(field: &str, value: f64) -> Result<(), FieldViolation> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(FieldViolation {
            field: field.to_string(),
            reason: format!("expected a value between 0 and 1, got {}", value),
        })
    }
}

fn check_non_negative(field: &str, value: f64) -> Result<(), FieldViolation> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(FieldViolation {
            field: field.to_string(),
            reason: format!("expected a non-negative number, got {}", value),
        })
    }
}

/// Question ids appear as strings or bare integers depending on the dataset.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawQuestionId {
    Text(String),
    Integer(i64),
}

fn question_ids<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    let raw = Vec::<RawQuestionId>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|id| match id {
            RawQuestionId::Text(s) => s,
            RawQuestionId::Integer(n) => n.to_string(),
        })
        .collect())
}

/// A named winner, e.g. best agent or best experiment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Leader {
    pub name: String,
    pub accuracy: f64,
}

/// Retrieval usage across all experiments.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetrievalSummary {
    pub average_calls_per_question: f64,
    pub total_questions_with_retrieval: u64,
}

/// Cross-experiment summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateSummary {
    pub experiments_count: usize,
    pub total_questions: u64,
    pub overall_accuracy: f64,
    pub per_agent_accuracy: OrderedMap<f64>,
    pub best_agent: Leader,
    pub agreement_rate: f64,
    pub average_round_count: f64,
    pub round_count_histogram: BTreeMap<u32, u64>,
    pub per_agent_changes: OrderedMap<AgentChanges>,
    pub retrieval: RetrievalSummary,
    pub questions_all_agents_failed: BTreeSet<String>,
    pub questions_all_agents_agreed: BTreeSet<String>,
    pub per_experiment_accuracy: OrderedMap<f64>,
    pub best_experiment: Leader,
    /// Ids that every experiment recorded as failed by all agents.
    pub globally_failed_questions: Vec<String>,
}

impl AggregateSummary {
    /// True if any agent's revisions fixed more answers than they broke.
    pub fn revisions_helped(&self) -> bool {
        self.per_agent_changes
            .values()
            .any(AgentChanges::is_net_improvement)
    }
}
