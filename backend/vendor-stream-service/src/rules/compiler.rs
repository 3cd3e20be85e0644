use crate::error::RuleError;
use crate::models::Rule;
use std::collections::HashSet;
use tracing::debug;

pub const DEFAULT_RULE_TAG: &str = "vendors-geo";

/// Character limit of a single filtered-stream rule value
pub const DEFAULT_MAX_RULE_LENGTH: usize = 512;

const PREFIX: &str = "has:geo (";
const SUFFIX: &str = ")";
const OPERATOR: &str = "from:";
const SEPARATOR: &str = " OR ";

/// Shortest budget that still admits a one-character id
pub const MIN_RULE_LENGTH: usize = PREFIX.len() + OPERATOR.len() + 1 + SUFFIX.len();

/// Builds geo-filtered `from:` rules for a set of account ids.
///
/// Ids are packed greedily, in input order, into as few rules as the
/// character budget allows. The first rule carries the base tag, later ones
/// `<tag>-2`, `<tag>-3` and so on.
#[derive(Debug, Clone)]
pub struct RuleCompiler {
    tag: String,
    max_length: usize,
    max_rules: Option<usize>,
}

impl Default for RuleCompiler {
    fn default() -> Self {
        Self::new(DEFAULT_RULE_TAG, DEFAULT_MAX_RULE_LENGTH)
    }
}

impl RuleCompiler {
    pub fn new(tag: impl Into<String>, max_length: usize) -> Self {
        Self {
            tag: tag.into(),
            max_length,
            max_rules: None,
        }
    }

    pub fn with_max_rules(mut self, max_rules: usize) -> Self {
        self.max_rules = Some(max_rules);
        self
    }

    /// An empty (or all-blank) id list compiles to no rules at all.
    pub fn compile<S: AsRef<str>>(&self, ids: &[S]) -> Result<Vec<Rule>, RuleError> {
        let ids = self.unique_ids(ids)?;

        let mut groups: Vec<Vec<&str>> = Vec::new();
        let mut current: Vec<&str> = Vec::new();
        let mut current_len = 0;

        for id in ids {
            let term_len = OPERATOR.len() + id.chars().count();
            let alone = PREFIX.len() + term_len + SUFFIX.len();
            if alone > self.max_length {
                return Err(RuleError::IdTooLong {
                    id: id.to_string(),
                    budget: self.max_length,
                });
            }

            let extended = current_len + SEPARATOR.len() + term_len;
            if current.is_empty() {
                current.push(id);
                current_len = alone;
            } else if extended <= self.max_length {
                current.push(id);
                current_len = extended;
            } else {
                groups.push(std::mem::take(&mut current));
                current.push(id);
                current_len = alone;
            }
        }
        if !current.is_empty() {
            groups.push(current);
        }

        if let Some(max) = self.max_rules {
            if groups.len() > max {
                return Err(RuleError::TooManyRules {
                    needed: groups.len(),
                    max,
                });
            }
        }

        let rules: Vec<Rule> = groups
            .iter()
            .enumerate()
            .map(|(index, group)| Rule {
                value: expression(group),
                tag: self.tag_for(index),
            })
            .collect();

        debug!(rules = rules.len(), "Compiled stream rules");
        Ok(rules)
    }

    fn unique_ids<'a, S: AsRef<str>>(&self, ids: &'a [S]) -> Result<Vec<&'a str>, RuleError> {
        let mut seen = HashSet::new();
        let mut unique = Vec::with_capacity(ids.len());

        for id in ids.iter().map(|id| id.as_ref().trim()) {
            if id.is_empty() {
                continue;
            }
            if id.chars().any(|c| c.is_whitespace() || c == '(' || c == ')') {
                return Err(RuleError::InvalidId(id.to_string()));
            }
            if seen.insert(id) {
                unique.push(id);
            }
        }

        Ok(unique)
    }

    fn tag_for(&self, index: usize) -> String {
        if index == 0 {
            self.tag.clone()
        } else {
            format!("{}-{}", self.tag, index + 1)
        }
    }
}

fn expression(ids: &[&str]) -> String {
    let terms: Vec<String> = ids.iter().map(|id| format!("{OPERATOR}{id}")).collect();
    format!("{PREFIX}{}{SUFFIX}", terms.join(SEPARATOR))
}
