//! Fuzzy rules: antecedent term expressions and consequent assignments.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{OracleError, Result};

/// Antecedent expression composing membership terms with AND/OR/NOT.
///
/// Evaluation semantics: AND is min, OR is max, NOT is `1 - x`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Antecedent {
    Term { variable: String, term: String },
    And(Box<Antecedent>, Box<Antecedent>),
    Or(Box<Antecedent>, Box<Antecedent>),
    Not(Box<Antecedent>),
}

impl Antecedent {
    pub fn term(variable: &str, term: &str) -> Self {
        Antecedent::Term {
            variable: variable.to_string(),
            term: term.to_string(),
        }
    }

    pub fn and(self, other: Antecedent) -> Self {
        Antecedent::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: Antecedent) -> Self {
        Antecedent::Or(Box::new(self), Box::new(other))
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        Antecedent::Not(Box::new(self))
    }

    /// Evaluate against fuzzified inputs: `memberships[variable][term]`.
    pub fn truth(&self, memberships: &BTreeMap<String, BTreeMap<String, f32>>) -> Result<f32> {
        match self {
            Antecedent::Term { variable, term } => memberships
                .get(variable)
                .and_then(|terms| terms.get(term))
                .copied()
                .ok_or_else(|| {
                    OracleError::Config(format!(
                        "rule references unknown term '{}.{}'",
                        variable, term
                    ))
                }),
            Antecedent::And(lhs, rhs) => {
                Ok(lhs.truth(memberships)?.min(rhs.truth(memberships)?))
            }
            Antecedent::Or(lhs, rhs) => {
                Ok(lhs.truth(memberships)?.max(rhs.truth(memberships)?))
            }
            Antecedent::Not(inner) => Ok(1.0 - inner.truth(memberships)?),
        }
    }

    /// All `(variable, term)` pairs referenced by this expression.
    pub fn referenced_terms(&self) -> Vec<(&str, &str)> {
        match self {
            Antecedent::Term { variable, term } => vec![(variable.as_str(), term.as_str())],
            Antecedent::And(lhs, rhs) | Antecedent::Or(lhs, rhs) => {
                let mut out = lhs.referenced_terms();
                out.extend(rhs.referenced_terms());
                out
            }
            Antecedent::Not(inner) => inner.referenced_terms(),
        }
    }
}

/// A named rule: when the antecedent holds, each consequent term is asserted
/// at the antecedent's truth value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FuzzyRule {
    pub name: String,
    pub antecedent: Antecedent,
    /// `(consequent variable, term)` pairs; one rule may drive several
    /// output variables.
    pub consequents: Vec<(String, String)>,
}

impl FuzzyRule {
    pub fn new(name: &str, antecedent: Antecedent) -> Self {
        FuzzyRule {
            name: name.to_string(),
            antecedent,
            consequents: Vec::new(),
        }
    }

    pub fn then(mut self, variable: &str, term: &str) -> Self {
        self.consequents
            .push((variable.to_string(), term.to_string()));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memberships() -> BTreeMap<String, BTreeMap<String, f32>> {
        let mut out = BTreeMap::new();
        let mut length = BTreeMap::new();
        length.insert("small".to_string(), 0.8);
        length.insert("large".to_string(), 0.1);
        let mut width = BTreeMap::new();
        width.insert("small".to_string(), 0.3);
        width.insert("large".to_string(), 0.6);
        out.insert("sepal_length".to_string(), length);
        out.insert("sepal_width".to_string(), width);
        out
    }

    #[test]
    fn and_is_min() {
        let expr = Antecedent::term("sepal_length", "small")
            .and(Antecedent::term("sepal_width", "large"));
        assert!((expr.truth(&memberships()).unwrap() - 0.6).abs() < 1e-6);
    }

    #[test]
    fn or_is_max() {
        let expr = Antecedent::term("sepal_length", "small")
            .or(Antecedent::term("sepal_width", "small"));
        assert!((expr.truth(&memberships()).unwrap() - 0.8).abs() < 1e-6);
    }

    #[test]
    fn not_is_complement() {
        let expr = Antecedent::term("sepal_length", "large").not();
        assert!((expr.truth(&memberships()).unwrap() - 0.9).abs() < 1e-6);
    }

    #[test]
    fn unknown_term_is_config_error() {
        let expr = Antecedent::term("sepal_length", "gigantic");
        assert!(matches!(
            expr.truth(&memberships()),
            Err(OracleError::Config(_))
        ));
    }
}
