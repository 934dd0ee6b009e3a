//! Fuzzy variables: a bounded universe of discourse plus named membership
//! terms, tagged as model input (antecedent) or output (consequent).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::fuzzy::membership::Membership;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariableRole {
    Antecedent,
    Consequent,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FuzzyVariable {
    pub name: String,
    pub role: VariableRole,
    pub min: f32,
    pub max: f32,
    terms: BTreeMap<String, Membership>,
}

impl FuzzyVariable {
    pub fn new(name: &str, role: VariableRole, min: f32, max: f32) -> Self {
        FuzzyVariable {
            name: name.to_string(),
            role,
            min,
            max,
            terms: BTreeMap::new(),
        }
    }

    pub fn antecedent(name: &str, min: f32, max: f32) -> Self {
        FuzzyVariable::new(name, VariableRole::Antecedent, min, max)
    }

    pub fn consequent(name: &str, min: f32, max: f32) -> Self {
        FuzzyVariable::new(name, VariableRole::Consequent, min, max)
    }

    pub fn with_term(mut self, term: &str, shape: Membership) -> Self {
        self.terms.insert(term.to_string(), shape);
        self
    }

    pub fn term(&self, name: &str) -> Option<&Membership> {
        self.terms.get(name)
    }

    pub fn terms(&self) -> impl Iterator<Item = (&str, &Membership)> {
        self.terms.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Evaluate every term at `x`, yielding per-term truth values.
    pub fn fuzzify(&self, x: f32) -> BTreeMap<String, f32> {
        self.terms
            .iter()
            .map(|(name, shape)| (name.clone(), shape.degree(x)))
            .collect()
    }

    /// Evenly spaced sample points over the universe of discourse.
    pub fn universe(&self, resolution: usize) -> Vec<f32> {
        debug_assert!(resolution >= 2);
        let step = (self.max - self.min) / (resolution - 1) as f32;
        (0..resolution).map(|i| self.min + step * i as f32).collect()
    }
}
