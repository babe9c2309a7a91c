//! Topic and subject naming.
//!
//! Every name in this module is a pure function of the record type name (and
//! the consumer group id for consumer-side failure topics), so producers and
//! consumers that never talk to each other still agree on where records live.

use crate::error::{KafkaTypesError, Result};

/// Prefix shared by producer-side and consumer-side failure topics.
pub const FAILURE_TOPIC_PREFIX: &str = "fail-";

/// Suffix of the schema registry subject holding record value schemas.
pub const VALUE_SUBJECT_SUFFIX: &str = "-value";

/// Suffix of the schema registry subject holding record key schemas.
pub const KEY_SUBJECT_SUFFIX: &str = "-key";

/// Convert an identifier to kebab-case.
///
/// Whitespace separated words are joined, and a `-` is inserted before every
/// ASCII uppercase letter that is not the first character. Consecutive
/// capitals are split individually, so `HTTPServer` becomes `h-t-t-p-server`.
/// Input that is already lowercase comes back unchanged.
pub fn kebab_case(value: &str) -> String {
    if value.chars().all(|c| c.is_lowercase()) {
        return value.to_string();
    }

    let joined: String = value
        .split_whitespace()
        .map(capitalize_first)
        .collect::<Vec<_>>()
        .concat();

    let mut out = String::with_capacity(joined.len() + 8);
    for (i, c) in joined.chars().enumerate() {
        if i > 0 && c.is_ascii_uppercase() {
            out.push('-');
        }
        out.extend(c.to_lowercase());
    }
    out
}

fn capitalize_first(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn require_non_empty(what: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(KafkaTypesError::InvalidArgument(format!(
            "{what} must not be empty"
        )));
    }
    Ok(())
}

/// Canonical topic for a record type, e.g. `UserCreatedEvent` -> `user-created-event`.
pub fn topic_for(type_name: &str) -> Result<String> {
    require_non_empty("record type name", type_name)?;
    Ok(kebab_case(type_name))
}

/// Topic receiving records the producer failed to send to `original_topic`.
pub fn producer_failure_topic(original_topic: &str) -> Result<String> {
    require_non_empty("topic", original_topic)?;
    Ok(format!("{FAILURE_TOPIC_PREFIX}{original_topic}"))
}

/// Topic receiving records a consumer group failed to handle.
///
/// `fail-<group_id>-<kebab-case type name>`
pub fn consumer_failure_topic(type_name: &str, group_id: &str) -> Result<String> {
    require_non_empty("record type name", type_name)?;
    require_non_empty("group id", group_id)?;
    Ok(format!(
        "{FAILURE_TOPIC_PREFIX}{group_id}-{}",
        kebab_case(type_name)
    ))
}

/// Schema registry subject for record values, e.g. `user-created-event-value`.
pub fn value_subject(type_name: &str) -> Result<String> {
    Ok(format!("{}{VALUE_SUBJECT_SUFFIX}", topic_for(type_name)?))
}

/// Schema registry subject for record keys, e.g. `user-created-event-key`.
pub fn key_subject(type_name: &str) -> Result<String> {
    Ok(format!("{}{KEY_SUBJECT_SUFFIX}", topic_for(type_name)?))
}
