//! Learning-event parsing and classification
//!
//! Parses Caliper-style event records (one JSON object per log line) and maps
//! them to attempt events the ledger can consume. Only `Completed` and
//! `Skipped` actions are kept; every other action kind is dropped.

use serde::Deserialize;

use crate::error::AnalyticsError;

/// One attempt, classified by outcome.
///
/// The attempt number is 1-based and scoped to a single (entity, target)
/// pair; the duration is in the time units of the source log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    Correct { attempt: u32, duration: u64 },
    Wrong { attempt: u32, duration: u64 },
    Skipped { attempt: u32, duration: u64 },
}

impl AttemptOutcome {
    pub fn attempt(&self) -> u32 {
        match self {
            AttemptOutcome::Correct { attempt, .. }
            | AttemptOutcome::Wrong { attempt, .. }
            | AttemptOutcome::Skipped { attempt, .. } => *attempt,
        }
    }

    pub fn duration(&self) -> u64 {
        match self {
            AttemptOutcome::Correct { duration, .. }
            | AttemptOutcome::Wrong { duration, .. }
            | AttemptOutcome::Skipped { duration, .. } => *duration,
        }
    }
}

/// A fully classified attempt event, ready for ledger ingestion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptEvent {
    /// Actor (student) name
    pub actor: String,
    /// Object (problem) name
    pub object: String,
    /// Topic the problem belongs to, when the log carries one
    pub topic: Option<String>,
    pub outcome: AttemptOutcome,
}

// Raw Caliper-style record structures. Every field is optional so that a
// single malformed event never aborts the batch; classification decides
// what is usable.

#[derive(Debug, Deserialize)]
struct RawRecord {
    action: Option<String>,
    actor: Option<RawNamed>,
    object: Option<RawObject>,
    generated: Option<RawGenerated>,
}

#[derive(Debug, Deserialize)]
struct RawNamed {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawObject {
    name: Option<String>,
    #[serde(rename = "isPartOf")]
    is_part_of: Option<RawNamed>,
}

#[derive(Debug, Deserialize)]
struct RawGenerated {
    attempt: Option<RawAttempt>,
    extensions: Option<RawExtensions>,
}

#[derive(Debug, Deserialize)]
struct RawAttempt {
    count: Option<serde_json::Value>,
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawExtensions {
    #[serde(rename = "isStudentAnswerCorrect")]
    is_student_answer_correct: Option<String>,
}

/// Parse one log line into a classified attempt event.
///
/// Returns `Ok(None)` for well-formed JSON that is not a usable attempt
/// (unclassifiable action, missing fields, unparsable attempt count or
/// duration) — those events are skipped, not fatal. A line that is not valid
/// JSON at all is a hard error: it means the log format itself is broken.
pub fn parse_line(line: &str) -> Result<Option<AttemptEvent>, AnalyticsError> {
    let record: RawRecord = serde_json::from_str(line)?;
    Ok(classify(record))
}

fn classify(record: RawRecord) -> Option<AttemptEvent> {
    let action = record.action.as_deref().unwrap_or("");

    // Action kinds are full Caliper IRIs; classification is by substring,
    // matching how the logs are actually written.
    let completed = if action.contains("Completed") {
        true
    } else if action.contains("Skipped") {
        false
    } else {
        tracing::debug!(action, "dropping event with unclassifiable action");
        return None;
    };

    let actor = record.actor.and_then(|a| a.name)?;
    let object = record.object?;
    let object_name = object.name?;
    let topic = object.is_part_of.and_then(|p| p.name);

    let generated = record.generated?;
    let attempt_rec = generated.attempt?;
    let attempt = parse_attempt_count(attempt_rec.count.as_ref()?)?;
    let duration = parse_duration(attempt_rec.duration.as_deref()?)?;

    let outcome = if completed {
        let correct = generated
            .extensions
            .and_then(|e| e.is_student_answer_correct)
            .map(|v| v == "true")
            .unwrap_or(false);
        if correct {
            AttemptOutcome::Correct { attempt, duration }
        } else {
            AttemptOutcome::Wrong { attempt, duration }
        }
    } else {
        AttemptOutcome::Skipped { attempt, duration }
    };

    Some(AttemptEvent {
        actor,
        object: object_name,
        topic,
        outcome,
    })
}

/// Attempt counts appear both as JSON numbers and as numeric strings.
/// Anything that is not a positive integer makes the event malformed.
fn parse_attempt_count(value: &serde_json::Value) -> Option<u32> {
    let count = match value {
        serde_json::Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        serde_json::Value::String(s) => s.trim().parse::<u32>().ok(),
        _ => None,
    }?;
    if count >= 1 {
        Some(count)
    } else {
        None
    }
}

/// Durations are strings mixing digits with unit text (`"12 sec"`). Only the
/// digit characters are kept, concatenated, and parsed as an integer.
fn parse_duration(raw: &str) -> Option<u64> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    digits.parse::<u64>().ok()
}

/// Parse a full NDJSON log into attempt events, dropping unusable records.
///
/// Returns the classified events plus the count of dropped (malformed or
/// out-of-scope) records. An unparsable line fails the whole batch.
pub fn parse_log(input: &str) -> Result<(Vec<AttemptEvent>, usize), AnalyticsError> {
    let mut events = Vec::new();
    let mut dropped = 0usize;

    for line in input.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match parse_line(trimmed)? {
            Some(event) => events.push(event),
            None => dropped += 1,
        }
    }

    if dropped > 0 {
        tracing::debug!(dropped, kept = events.len(), "finished log scan");
    }

    Ok((events, dropped))
}
