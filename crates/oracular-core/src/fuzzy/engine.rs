//! Mamdani inference over a set of fuzzy variables and rules.
//!
//! For each input row the engine fuzzifies every antecedent variable,
//! evaluates each rule's antecedent expression, clips the rule's consequent
//! membership terms to the rule truth, aggregates clipped sets per output
//! variable by elementwise max, and defuzzifies by centroid.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{OracleError, Result};
use crate::fuzzy::rules::FuzzyRule;
use crate::fuzzy::variable::{FuzzyVariable, VariableRole};

/// Sample points per consequent universe when computing the centroid.
const DEFAULT_RESOLUTION: usize = 101;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FuzzyController {
    antecedents: Vec<FuzzyVariable>,
    consequents: Vec<FuzzyVariable>,
    rules: Vec<FuzzyRule>,
    resolution: usize,
}

impl FuzzyController {
    /// Assemble a controller, validating that every rule only references
    /// declared variables and terms.
    pub fn new(variables: Vec<FuzzyVariable>, rules: Vec<FuzzyRule>) -> Result<Self> {
        let (antecedents, consequents): (Vec<_>, Vec<_>) = variables
            .into_iter()
            .partition(|v| v.role == VariableRole::Antecedent);

        if antecedents.is_empty() {
            return Err(OracleError::Config(
                "fuzzy controller needs at least one antecedent variable".to_string(),
            ));
        }
        if consequents.is_empty() {
            return Err(OracleError::Config(
                "fuzzy controller needs at least one consequent variable".to_string(),
            ));
        }

        let controller = FuzzyController {
            antecedents,
            consequents,
            rules,
            resolution: DEFAULT_RESOLUTION,
        };
        controller.validate_rules()?;
        Ok(controller)
    }

    fn validate_rules(&self) -> Result<()> {
        for rule in &self.rules {
            for (variable, term) in rule.antecedent.referenced_terms() {
                let var = self
                    .antecedents
                    .iter()
                    .find(|v| v.name == variable)
                    .ok_or_else(|| {
                        OracleError::Config(format!(
                            "rule '{}' references unknown antecedent '{}'",
                            rule.name, variable
                        ))
                    })?;
                if var.term(term).is_none() {
                    return Err(OracleError::Config(format!(
                        "rule '{}' references unknown term '{}.{}'",
                        rule.name, variable, term
                    )));
                }
            }
            if rule.consequents.is_empty() {
                return Err(OracleError::Config(format!(
                    "rule '{}' has no consequent",
                    rule.name
                )));
            }
            for (variable, term) in &rule.consequents {
                let var = self
                    .consequents
                    .iter()
                    .find(|v| &v.name == variable)
                    .ok_or_else(|| {
                        OracleError::Config(format!(
                            "rule '{}' references unknown consequent '{}'",
                            rule.name, variable
                        ))
                    })?;
                if var.term(term).is_none() {
                    return Err(OracleError::Config(format!(
                        "rule '{}' references unknown term '{}.{}'",
                        rule.name, variable, term
                    )));
                }
            }
        }
        Ok(())
    }

    /// Input variable names, in declaration order.
    pub fn antecedent_names(&self) -> Vec<String> {
        self.antecedents.iter().map(|v| v.name.clone()).collect()
    }

    /// Output variable names, in declaration order. This is the column order
    /// of the fuzzy teacher's prediction frame.
    pub fn consequent_names(&self) -> Vec<String> {
        self.consequents.iter().map(|v| v.name.clone()).collect()
    }

    pub fn consequent(&self, name: &str) -> Option<&FuzzyVariable> {
        self.consequents.iter().find(|v| v.name == name)
    }

    /// Run inference for one row of inputs, keyed by antecedent name.
    ///
    /// # Returns
    ///
    /// One defuzzified scalar per consequent variable, each within the
    /// variable's universe of discourse.
    pub fn infer(&self, inputs: &BTreeMap<String, f32>) -> Result<BTreeMap<String, f32>> {
        // 1. Fuzzify every antecedent.
        let mut memberships = BTreeMap::new();
        for var in &self.antecedents {
            let x = inputs.get(&var.name).copied().ok_or_else(|| {
                OracleError::DimensionMismatch(format!(
                    "missing input for fuzzy variable '{}'",
                    var.name
                ))
            })?;
            memberships.insert(var.name.clone(), var.fuzzify(x));
        }

        // 2. Rule strengths.
        let mut strengths = Vec::with_capacity(self.rules.len());
        for rule in &self.rules {
            strengths.push(rule.antecedent.truth(&memberships)?);
        }

        // 3-6. Clip, aggregate, and defuzzify per consequent.
        let mut out = BTreeMap::new();
        for var in &self.consequents {
            let universe = var.universe(self.resolution);
            let mut aggregate = vec![0.0f32; universe.len()];

            for (rule, &strength) in self.rules.iter().zip(strengths.iter()) {
                for (cons_var, cons_term) in &rule.consequents {
                    if cons_var != &var.name {
                        continue;
                    }
                    // Validated at construction time.
                    let shape = var.term(cons_term).ok_or_else(|| {
                        OracleError::Config(format!(
                            "unknown consequent term '{}.{}'",
                            cons_var, cons_term
                        ))
                    })?;
                    for (i, &x) in universe.iter().enumerate() {
                        let clipped = shape.degree(x).min(strength);
                        if clipped > aggregate[i] {
                            aggregate[i] = clipped;
                        }
                    }
                }
            }

            out.insert(var.name.clone(), centroid(&universe, &aggregate, var.min));
        }
        Ok(out)
    }
}

/// Center-of-area defuzzification. An empty output set (no rule fired) maps
/// to the universe minimum so inactive consequents score as low as possible.
fn centroid(universe: &[f32], membership: &[f32], fallback: f32) -> f32 {
    let area: f32 = membership.iter().sum();
    if area <= f32::EPSILON {
        return fallback;
    }
    let moment: f32 = universe
        .iter()
        .zip(membership.iter())
        .map(|(&x, &mu)| x * mu)
        .sum();
    moment / area
}
