//! Attempt accumulation
//!
//! One [`EntityLedger`] per entity (a student or a problem — structurally
//! identical), collected in a [`LedgerRegistry`] keyed by entity name. The
//! registry is owned by the ingestion routine and passed explicitly to the
//! metric and clustering stages; there is no module-level state.

use std::collections::{btree_map, hash_map, BTreeMap, HashMap};

use crate::event::{AttemptEvent, AttemptOutcome};

/// Per-(entity, target) attempt record: attempt-number → duration, split by
/// outcome. Attempt numbers are disjoint across the three maps and may be
/// sparse.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttemptHistory {
    pub correct: BTreeMap<u32, u64>,
    pub wrong: BTreeMap<u32, u64>,
    pub skip: BTreeMap<u32, u64>,
}

impl AttemptHistory {
    /// Number of completed (correct or wrong) attempts against this target
    pub fn completed_count(&self) -> usize {
        self.correct.len() + self.wrong.len()
    }

    /// Earliest attempt number among completed attempts, if any
    pub fn first_completed_attempt(&self) -> Option<u32> {
        match (
            self.correct.keys().next().copied(),
            self.wrong.keys().next().copied(),
        ) {
            (Some(c), Some(w)) => Some(c.min(w)),
            (Some(c), None) => Some(c),
            (None, Some(w)) => Some(w),
            (None, None) => None,
        }
    }

    /// Earliest correct attempt number, if the target was ever solved
    pub fn first_correct_attempt(&self) -> Option<u32> {
        self.correct.keys().next().copied()
    }

    /// Sum of durations, across all three outcome buckets, for attempts with
    /// number `<= limit`
    pub fn duration_through_attempt(&self, limit: u32) -> u64 {
        self.correct
            .range(..=limit)
            .chain(self.wrong.range(..=limit))
            .chain(self.skip.range(..=limit))
            .map(|(_, d)| d)
            .sum()
    }
}

/// Running attempt totals for one entity
#[derive(Debug, Clone, Default)]
pub struct EntityLedger {
    name: String,
    topic: Option<String>,
    histories: BTreeMap<String, AttemptHistory>,
    total_targets: usize,
    total_completed: u64,
    total_skipped: u64,
    total_completed_duration: u64,
    total_skipped_duration: u64,
}

impl EntityLedger {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Topic this entity belongs to (problems perspective only)
    pub fn topic(&self) -> Option<&str> {
        self.topic.as_deref()
    }

    pub fn histories(&self) -> &BTreeMap<String, AttemptHistory> {
        &self.histories
    }

    pub fn total_targets(&self) -> usize {
        self.total_targets
    }

    pub fn total_completed(&self) -> u64 {
        self.total_completed
    }

    pub fn total_skipped(&self) -> u64 {
        self.total_skipped
    }

    pub fn total_completed_duration(&self) -> u64 {
        self.total_completed_duration
    }

    pub fn total_skipped_duration(&self) -> u64 {
        self.total_skipped_duration
    }

    /// Register one attempt against `target`.
    ///
    /// A repeated (target, attempt-number) pair within the same outcome bucket
    /// overwrites the stored duration; the running totals still count every
    /// processed event. Last-write-wins is the source log's semantics, not a
    /// validation gap to close.
    pub fn record(&mut self, target: &str, outcome: AttemptOutcome) {
        let history = match self.histories.entry(target.to_string()) {
            btree_map::Entry::Occupied(entry) => entry.into_mut(),
            btree_map::Entry::Vacant(entry) => {
                self.total_targets += 1;
                entry.insert(AttemptHistory::default())
            }
        };

        match outcome {
            AttemptOutcome::Correct { attempt, duration } => {
                self.total_completed += 1;
                self.total_completed_duration += duration;
                history.correct.insert(attempt, duration);
            }
            AttemptOutcome::Wrong { attempt, duration } => {
                self.total_completed += 1;
                self.total_completed_duration += duration;
                history.wrong.insert(attempt, duration);
            }
            AttemptOutcome::Skipped { attempt, duration } => {
                self.total_skipped += 1;
                self.total_skipped_duration += duration;
                history.skip.insert(attempt, duration);
            }
        }
    }
}

/// Which side of an attempt event is the entity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Perspective {
    /// Entity = actor (student), target = object (problem)
    Students,
    /// Entity = object (problem), target = actor (student); topic attached
    Problems,
}

impl Perspective {
    pub fn as_str(&self) -> &'static str {
        match self {
            Perspective::Students => "students",
            Perspective::Problems => "problems",
        }
    }
}

/// Name-keyed ledger registry, preserving first-seen entity order.
///
/// The first-seen order defines the metric matrix row order and therefore the
/// index→name mapping consumed by the tree builder.
#[derive(Debug, Clone)]
pub struct LedgerRegistry {
    perspective: Perspective,
    order: Vec<String>,
    entities: HashMap<String, EntityLedger>,
}

impl LedgerRegistry {
    pub fn new(perspective: Perspective) -> Self {
        Self {
            perspective,
            order: Vec::new(),
            entities: HashMap::new(),
        }
    }

    pub fn perspective(&self) -> Perspective {
        self.perspective
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Entity names in first-seen order
    pub fn names(&self) -> &[String] {
        &self.order
    }

    pub fn get(&self, name: &str) -> Option<&EntityLedger> {
        self.entities.get(name)
    }

    /// Ledgers in first-seen order
    pub fn iter(&self) -> impl Iterator<Item = &EntityLedger> {
        self.order.iter().map(|name| &self.entities[name])
    }

    /// Route one classified event into the ledger for its entity, creating
    /// the ledger on first sight.
    pub fn observe(&mut self, event: &AttemptEvent) {
        let (entity, target) = match self.perspective {
            Perspective::Students => (&event.actor, &event.object),
            Perspective::Problems => (&event.object, &event.actor),
        };

        let ledger = match self.entities.entry(entity.clone()) {
            hash_map::Entry::Occupied(entry) => entry.into_mut(),
            hash_map::Entry::Vacant(entry) => {
                self.order.push(entity.clone());
                entry.insert(EntityLedger::new(entity.clone()))
            }
        };

        if self.perspective == Perspective::Problems && ledger.topic.is_none() {
            ledger.topic = event.topic.clone();
        }

        ledger.record(target, event.outcome);
    }

    /// Populate a registry from a batch of events
    pub fn from_events(perspective: Perspective, events: &[AttemptEvent]) -> Self {
        let mut registry = Self::new(perspective);
        for event in events {
            registry.observe(event);
        }
        registry
    }
}
