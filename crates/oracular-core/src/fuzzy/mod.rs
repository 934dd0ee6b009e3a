//! Fuzzy-logic primitives: membership functions, variables, rules, and the
//! Mamdani inference engine backing the fuzzy teacher.

pub mod engine;
pub mod membership;
pub mod rules;
pub mod variable;

pub use engine::FuzzyController;
pub use membership::Membership;
pub use rules::{Antecedent, FuzzyRule};
pub use variable::{FuzzyVariable, VariableRole};
