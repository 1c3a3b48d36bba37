// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Label selector builder.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Requirement {
    Eq(String, String),
    NotEq(String, String),
    In(String, Vec<String>),
    NotIn(String, Vec<String>),
    Exists(String),
    NotExists(String),
}

/// Builds the textual selector accepted by the `labelSelector` query parameter.
///
/// ```
/// use kubewire_client::LabelSelector;
///
/// let selector = LabelSelector::new()
///     .eq("app", "web")
///     .in_set("tier", ["frontend", "edge"])
///     .not_exists("canary");
/// assert_eq!(selector.to_string(), "app=web,tier in (frontend,edge),!canary");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelSelector {
    requirements: Vec<Requirement>,
}

impl LabelSelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.requirements
            .push(Requirement::Eq(key.into(), value.into()));
        self
    }

    pub fn not_eq(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.requirements
            .push(Requirement::NotEq(key.into(), value.into()));
        self
    }

    pub fn in_set<I, V>(mut self, key: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.requirements.push(Requirement::In(key.into(), values));
        self
    }

    pub fn not_in<I, V>(mut self, key: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.requirements
            .push(Requirement::NotIn(key.into(), values));
        self
    }

    pub fn exists(mut self, key: impl Into<String>) -> Self {
        self.requirements.push(Requirement::Exists(key.into()));
        self
    }

    pub fn not_exists(mut self, key: impl Into<String>) -> Self {
        self.requirements.push(Requirement::NotExists(key.into()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Requirement::Eq(key, value) => write!(f, "{key}={value}"),
            Requirement::NotEq(key, value) => write!(f, "{key}!={value}"),
            Requirement::In(key, values) => write!(f, "{key} in ({})", values.join(",")),
            Requirement::NotIn(key, values) => write!(f, "{key} notin ({})", values.join(",")),
            Requirement::Exists(key) => f.write_str(key),
            Requirement::NotExists(key) => write!(f, "!{key}"),
        }
    }
}

impl fmt::Display for LabelSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, requirement) in self.requirements.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{requirement}")?;
        }
        Ok(())
    }
}

impl From<LabelSelector> for String {
    fn from(selector: LabelSelector) -> Self {
        selector.to_string()
    }
}

impl From<&LabelSelector> for String {
    fn from(selector: &LabelSelector) -> Self {
        selector.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_operators() {
        let selector = LabelSelector::new()
            .eq("a", "b")
            .not_eq("c", "d")
            .in_set("e", ["x", "y"])
            .not_in("f", ["z"])
            .exists("g")
            .not_exists("h");
        assert_eq!(
            selector.to_string(),
            "a=b,c!=d,e in (x,y),f notin (z),g,!h"
        );
    }

    #[test]
    fn test_empty_selector() {
        let selector = LabelSelector::new();
        assert!(selector.is_empty());
        assert_eq!(selector.to_string(), "");
    }
}
