//! Requirement identifier allocation

use normaudit_domain::format_requirement_id;
use regex::Regex;
use std::sync::OnceLock;

fn suffix_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"-(\d+)$").ok()).as_ref()
}

/// Highest numeric suffix among the ids under `prefix`
///
/// Only ids starting with `<prefix>-` are considered; ids without a numeric
/// suffix are ignored.
pub fn max_suffix(existing: &[String], prefix: &str) -> u32 {
    let head = format!("{}-", prefix);
    existing
        .iter()
        .filter(|id| id.starts_with(&head))
        .filter_map(|id| suffix_pattern()?.captures(id))
        .filter_map(|caps| caps[1].parse::<u32>().ok())
        .max()
        .unwrap_or(0)
}

/// Hands out consecutive ids after the highest existing suffix
#[derive(Debug, Clone)]
pub struct IdAllocator {
    prefix: String,
    next: u32,
}

impl IdAllocator {
    /// Continue after every id already stored under `prefix`
    pub fn new(prefix: impl Into<String>, existing: &[String]) -> Self {
        let prefix = prefix.into();
        let next = max_suffix(existing, &prefix) + 1;
        Self { prefix, next }
    }

    /// The next identifier
    pub fn allocate(&mut self) -> String {
        let id = format_requirement_id(&self.prefix, self.next);
        self.next += 1;
        id
    }
}
