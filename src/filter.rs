//! Derives a reduced view of a snapshot from the filter buffer.
//!
//! Queries starting with `-l ` are label selectors, `-f ` starts a fuzzy
//! match on the NAME column, anything else is a case-insensitive regex
//! matched against every field.

use std::collections::{BTreeMap, BTreeSet};

use fuzzy_matcher::FuzzyMatcher;
use fuzzy_matcher::skim::SkimMatcherV2;
use regex::{Regex, RegexBuilder};
use thiserror::Error;

use crate::table::{RowEvent, TableData};

pub const LABEL_PREFIX: &str = "-l ";
pub const FUZZY_PREFIX: &str = "-f ";

#[derive(Debug, Error)]
pub enum FilterError {
    #[error("invalid filter `{pattern}`: {source}")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("invalid label selector `{selector}`: {reason}")]
    InvalidSelector { selector: String, reason: String },
}

#[derive(Debug, Clone)]
pub enum FilterQuery {
    Labels(LabelSelector),
    Fuzzy(String),
    Plain(Regex),
}

impl FilterQuery {
    /// Returns `None` for a blank query.
    pub fn parse(query: &str) -> Result<Option<Self>, FilterError> {
        if query.trim().is_empty() {
            return Ok(None);
        }

        if let Some(selector) = query.strip_prefix(LABEL_PREFIX) {
            return LabelSelector::parse(selector).map(|selector| Some(Self::Labels(selector)));
        }

        if let Some(pattern) = query.strip_prefix(FUZZY_PREFIX) {
            let pattern = pattern.trim();
            if pattern.is_empty() {
                return Ok(None);
            }
            return Ok(Some(Self::Fuzzy(pattern.to_string())));
        }

        RegexBuilder::new(query)
            .case_insensitive(true)
            .build()
            .map(|regex| Some(Self::Plain(regex)))
            .map_err(|source| FilterError::InvalidRegex {
                pattern: query.to_string(),
                source,
            })
    }

    pub fn apply(&self, data: &TableData) -> TableData {
        let mut out = data.empty_like();
        out.rows = match self {
            Self::Labels(selector) => data
                .rows
                .iter()
                .filter(|event| selector.matches(&event.row.labels))
                .cloned()
                .collect(),
            Self::Plain(regex) => data
                .rows
                .iter()
                .filter(|event| event.row.fields.iter().any(|field| regex.is_match(field)))
                .cloned()
                .collect(),
            Self::Fuzzy(pattern) => fuzzy_rank(pattern, data),
        };
        out
    }
}

/// Filters `data` with `query`. A blank query returns the data unchanged.
pub fn filter(query: &str, data: &TableData) -> Result<TableData, FilterError> {
    Ok(match FilterQuery::parse(query)? {
        Some(parsed) => parsed.apply(data),
        None => data.clone(),
    })
}

fn fuzzy_rank(pattern: &str, data: &TableData) -> Vec<RowEvent> {
    let matcher = SkimMatcherV2::default();
    let name_col = data.header.name_col();
    let name = |event: &RowEvent| event.row.fields.get(name_col).cloned().unwrap_or_default();

    let mut scored = data
        .rows
        .iter()
        .filter_map(|event| {
            matcher
                .fuzzy_match(&name(event), pattern)
                .map(|score| (score, name(event), event))
        })
        .collect::<Vec<_>>();
    scored.sort_by(|(ls, ln, _), (rs, rn, _)| rs.cmp(ls).then_with(|| ln.cmp(rn)));
    scored
        .into_iter()
        .map(|(_, _, event)| event.clone())
        .collect()
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Requirement {
    Equals(String, String),
    NotEquals(String, String),
    In(String, BTreeSet<String>),
    NotIn(String, BTreeSet<String>),
    Exists(String),
    DoesNotExist(String),
}

impl Requirement {
    fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        match self {
            Self::Equals(key, value) => labels.get(key) == Some(value),
            Self::NotEquals(key, value) => labels.get(key) != Some(value),
            Self::In(key, values) => labels.get(key).is_some_and(|value| values.contains(value)),
            Self::NotIn(key, values) => !labels.get(key).is_some_and(|value| values.contains(value)),
            Self::Exists(key) => labels.contains_key(key),
            Self::DoesNotExist(key) => !labels.contains_key(key),
        }
    }
}

/// Conjunction of label requirements, e.g. `app=web,tier!=db,env in (a,b)`.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct LabelSelector(pub Vec<Requirement>);

impl LabelSelector {
    pub fn parse(selector: &str) -> Result<Self, FilterError> {
        let invalid = |reason: &str| FilterError::InvalidSelector {
            selector: selector.to_string(),
            reason: reason.to_string(),
        };

        let clauses = split_clauses(selector).ok_or_else(|| invalid("unbalanced parentheses"))?;
        if clauses.is_empty() {
            return Err(invalid("empty selector"));
        }

        clauses
            .into_iter()
            .map(|clause| parse_requirement(&clause).ok_or_else(|| invalid(&clause)))
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }

    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.0.iter().all(|requirement| requirement.matches(labels))
    }
}

fn split_clauses(selector: &str) -> Option<Vec<String>> {
    let mut clauses = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    for c in selector.chars() {
        match c {
            '(' => {
                depth += 1;
                current.push(c);
            }
            ')' => {
                depth = depth.checked_sub(1)?;
                current.push(c);
            }
            ',' if depth == 0 => clauses.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    if depth != 0 {
        return None;
    }
    clauses.push(current);
    Some(
        clauses
            .into_iter()
            .map(|clause| clause.trim().to_string())
            .filter(|clause| !clause.is_empty())
            .collect(),
    )
}

fn valid_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/'))
}

fn parse_set(values: &str) -> Option<BTreeSet<String>> {
    let inner = values.trim().strip_prefix('(')?.strip_suffix(')')?;
    let set = inner
        .split(',')
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .collect::<BTreeSet<_>>();
    (!set.is_empty()).then_some(set)
}

fn parse_requirement(clause: &str) -> Option<Requirement> {
    if let Some(key) = clause.strip_prefix('!') {
        let key = key.trim();
        return valid_key(key).then(|| Requirement::DoesNotExist(key.to_string()));
    }

    if let Some((key, value)) = clause.split_once("!=") {
        let key = key.trim();
        return valid_key(key).then(|| Requirement::NotEquals(key.to_string(), value.trim().to_string()));
    }

    if let Some((key, value)) = clause.split_once('=') {
        let key = key.trim();
        let value = value.strip_prefix('=').unwrap_or(value).trim();
        return valid_key(key).then(|| Requirement::Equals(key.to_string(), value.to_string()));
    }

    let mut parts = clause.splitn(2, char::is_whitespace);
    let key = parts.next()?.trim();
    let rest = parts.next().map(str::trim).unwrap_or("");
    if !valid_key(key) {
        return None;
    }
    if rest.is_empty() {
        return Some(Requirement::Exists(key.to_string()));
    }
    if let Some(values) = rest.strip_prefix("notin") {
        return parse_set(values).map(|set| Requirement::NotIn(key.to_string(), set));
    }
    if let Some(values) = rest.strip_prefix("in") {
        return parse_set(values).map(|set| Requirement::In(key.to_string(), set));
    }
    None
}
