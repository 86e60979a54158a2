//! Constraint/optimization oracle interface.
//!
//! The pricing engine formulates its problem against [`ConstraintSolver`] and
//! only interprets the verdict. Any backend implementing the trait can be
//! plugged in; the workspace ships [`LpOracle`], a MILP lowering on `good_lp`.

mod expr;
pub mod lp;
mod stack;

pub use expr::{Comparison, Constraint, LinExpr, QuadExpr, Relation, VarId};
pub use lp::{LpOracle, LpOracleConfig, LpSolverKind};
pub use stack::AssertionStack;

use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

/// Declaration of a real-valued unknown.
#[derive(Debug, Clone, PartialEq)]
pub struct VarDecl {
    pub name: String,
    /// Lower bound, `f64::NEG_INFINITY` when unbounded
    pub lower: f64,
    /// Upper bound, `f64::INFINITY` when unbounded
    pub upper: f64,
}

impl VarDecl {
    /// Unbounded unknown.
    pub fn free(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            lower: f64::NEG_INFINITY,
            upper: f64::INFINITY,
        }
    }

    pub fn non_negative(name: impl Into<String>) -> Self {
        Self::free(name).with_lower(0.0)
    }

    pub fn bounded(name: impl Into<String>, lower: f64, upper: f64) -> Self {
        Self::free(name).with_lower(lower).with_upper(upper)
    }

    pub fn with_lower(mut self, lower: f64) -> Self {
        self.lower = lower;
        self
    }

    pub fn with_upper(mut self, upper: f64) -> Self {
        self.upper = upper;
        self
    }
}

/// Verdict of a satisfiability check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Sat,
    Unsat,
    /// Budget exhausted before a verdict; callers treat it like `Unsat`
    Timeout,
}

impl Outcome {
    pub fn is_sat(&self) -> bool {
        matches!(self, Outcome::Sat)
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Sat => write!(f, "sat"),
            Outcome::Unsat => write!(f, "unsat"),
            Outcome::Timeout => write!(f, "timeout"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectiveSense {
    Minimise,
    Maximise,
}

/// Satisfying assignment produced by the last successful check.
///
/// Only unknowns that took part in the checked problem have a value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Model {
    values: BTreeMap<VarId, f64>,
    objective: Option<f64>,
    bound: Option<f64>,
}

impl Model {
    pub fn new(values: BTreeMap<VarId, f64>, objective: Option<f64>) -> Self {
        Self {
            values,
            objective,
            bound: None,
        }
    }

    /// Attach the optimum of the relaxation the backend actually solved.
    pub fn with_bound(mut self, bound: f64) -> Self {
        self.bound = Some(bound);
        self
    }

    pub fn value(&self, var: VarId) -> Option<f64> {
        self.values.get(&var).copied()
    }

    pub fn contains(&self, var: VarId) -> bool {
        self.values.contains_key(&var)
    }

    /// Objective value at this assignment, if an objective was set
    pub fn objective(&self) -> Option<f64> {
        self.objective
    }

    /// Best objective the backend could prove, when it optimised a
    /// relaxation rather than the objective itself
    pub fn bound(&self) -> Option<f64> {
        self.bound
    }

    /// Distance between the objective at this assignment and the proven
    /// bound; `None` when the backend optimised the objective exactly.
    pub fn gap(&self) -> Option<f64> {
        Some((self.objective? - self.bound?).abs())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum OracleError {
    #[error("pop_scope called without a matching push_scope")]
    ScopeUnderflow,

    #[error("unsupported constraint: {0}")]
    Unsupported(String),

    #[error("oracle backend failed: {0}")]
    Backend(String),
}

/// An arithmetic constraint-satisfaction and optimization backend.
///
/// State is scoped: everything declared, asserted or set as objective after
/// [`push_scope`](Self::push_scope) is discarded by the matching
/// [`pop_scope`](Self::pop_scope). Any change invalidates the current model.
pub trait ConstraintSolver {
    /// Backend identifier for logs
    fn name(&self) -> &str;

    fn declare(&mut self, decl: VarDecl) -> VarId;

    fn declaration(&self, var: VarId) -> Option<&VarDecl>;

    fn push_scope(&mut self);

    fn pop_scope(&mut self) -> Result<(), OracleError>;

    fn add_constraint(&mut self, constraint: Constraint);

    fn set_objective(&mut self, sense: ObjectiveSense, objective: QuadExpr);

    /// Decide the asserted constraints, optimizing the objective if one is set.
    fn check_sat(&mut self, timeout: Option<Duration>) -> Result<Outcome, OracleError>;

    /// Assignment from the last `Sat` verdict.
    fn current_model(&self) -> Option<&Model>;

    /// Declared bounds of `var`, unbounded for unknown ids.
    fn bounds(&self, var: VarId) -> (f64, f64) {
        self.declaration(var)
            .map(|d| (d.lower, d.upper))
            .unwrap_or((f64::NEG_INFINITY, f64::INFINITY))
    }
}
