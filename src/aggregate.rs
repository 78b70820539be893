use std::collections::BTreeSet;

use crate::Identifier;
use crate::error::TaskFailure;
use crate::pipeline::TaskOutcome;

/// Merged result of every task spawned by one query.
#[derive(Debug, Default)]
pub struct Aggregate {
    /// Sorted, de-duplicated model files of all completed tasks.
    pub primary: Vec<String>,
    /// Sorted, de-duplicated texture files of all completed tasks.
    pub side: Vec<String>,
    /// First resolved root paired with the query text.
    pub representative: Option<Representative>,
    pub failures: Vec<TaskFailure>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Representative {
    pub root: Identifier,
    pub query: String,
}

impl Representative {
    /// wowhead link for the representative spell.
    pub fn link(&self) -> String {
        spell_link(self.root, &self.query)
    }
}

impl Aggregate {
    /// Unions the artifacts of the completed tasks. `results` must be in root
    /// order, the first successful one becomes the representative.
    pub fn collect<I>(query: &str, results: I) -> Self
    where
        I: IntoIterator<Item = Result<TaskOutcome, TaskFailure>>,
    {
        let mut primary = BTreeSet::new();
        let mut side = BTreeSet::new();
        let mut representative = None;
        let mut failures = Vec::new();

        for result in results {
            match result {
                Ok(outcome) => {
                    representative.get_or_insert_with(|| Representative {
                        root: outcome.root,
                        query: query.to_string(),
                    });
                    primary.extend(outcome.primary);
                    side.extend(outcome.side);
                }
                Err(failure) => failures.push(failure),
            }
        }

        Self {
            primary: primary.into_iter().collect(),
            side: side.into_iter().collect(),
            representative,
            failures,
        }
    }
}

pub fn spell_link(root: Identifier, name: &str) -> String {
    format!("https://www.wowhead.com/spell={root}/{}", slug(name))
}

/// Lowercase, `[a-z0-9 ]` only, whitespace runs collapsed into `-`.
fn slug(name: &str) -> String {
    let kept: String = name
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c.is_whitespace())
        .collect();

    kept.split_whitespace().collect::<Vec<_>>().join("-")
}
