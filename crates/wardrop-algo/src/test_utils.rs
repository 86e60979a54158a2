//! Helpers shared by unit and integration tests: sample networks and a
//! scripted oracle that replays canned verdicts.

use std::collections::{BTreeSet, VecDeque};
use std::time::Duration;
use wardrop_core::{Network, TransitEdge};

use crate::oracle::{
    AssertionStack, ConstraintSolver, Constraint, Model, ObjectiveSense, OracleError, Outcome,
    QuadExpr, VarDecl, VarId,
};

/// Canned verdict of one [`ScriptedOracle::check_sat`] call.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    /// Sat with the named values; other referenced unknowns take the value in
    /// their declared bounds closest to zero
    Sat(Vec<(String, f64)>),
    Unsat,
    Timeout,
    /// Backend failure with this message
    Error(String),
}

/// What the oracle looked like when it was checked.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckRecord {
    pub depth: usize,
    pub constraints: usize,
    pub has_objective: bool,
    pub timeout: Option<Duration>,
}

/// In-memory [`ConstraintSolver`] answering from a script.
#[derive(Debug, Clone)]
pub struct ScriptedOracle {
    stack: AssertionStack,
    script: VecDeque<Response>,
    exhausted: Response,
    checks: Vec<CheckRecord>,
    model: Option<Model>,
}

impl ScriptedOracle {
    /// Replays `script`, then answers `Unsat`.
    pub fn new(script: Vec<Response>) -> Self {
        Self {
            stack: AssertionStack::new(),
            script: script.into(),
            exhausted: Response::Unsat,
            checks: Vec::new(),
            model: None,
        }
    }

    /// Answers `response` to every check.
    pub fn always(response: Response) -> Self {
        let mut oracle = Self::new(Vec::new());
        oracle.exhausted = response;
        oracle
    }

    pub fn checks(&self) -> &[CheckRecord] {
        &self.checks
    }

    pub fn depth(&self) -> usize {
        self.stack.depth()
    }

    pub fn num_constraints(&self) -> usize {
        self.stack.constraints().len()
    }

    pub fn num_vars(&self) -> usize {
        self.stack.num_vars()
    }

    pub fn constraints(&self) -> &[Constraint] {
        self.stack.constraints()
    }

    fn satisfy(&self, named: &[(String, f64)]) -> Model {
        let mut referenced: BTreeSet<VarId> = BTreeSet::new();
        for constraint in self.stack.constraints() {
            referenced.extend(constraint.vars());
        }
        if let Some((_, quad)) = self.stack.objective() {
            referenced.extend(quad.vars());
        }

        let values = referenced
            .into_iter()
            .map(|var| {
                let decl = self.stack.declaration(var);
                let value = decl
                    .and_then(|d| named.iter().find(|(name, _)| *name == d.name))
                    .map(|(_, value)| *value)
                    .unwrap_or_else(|| {
                        decl.map(|d| d.lower.max(d.upper.min(0.0))).unwrap_or(0.0)
                    });
                (var, value)
            })
            .collect::<std::collections::BTreeMap<_, _>>();
        let objective = self
            .stack
            .objective()
            .and_then(|(_, quad)| quad.evaluate(|v| values.get(&v).copied()));
        Model::new(values, objective)
    }
}

impl ConstraintSolver for ScriptedOracle {
    fn name(&self) -> &str {
        "scripted"
    }

    fn declare(&mut self, decl: VarDecl) -> VarId {
        self.stack.declare(decl)
    }

    fn declaration(&self, var: VarId) -> Option<&VarDecl> {
        self.stack.declaration(var)
    }

    fn push_scope(&mut self) {
        self.model = None;
        self.stack.push();
    }

    fn pop_scope(&mut self) -> Result<(), OracleError> {
        self.model = None;
        self.stack.pop()
    }

    fn add_constraint(&mut self, constraint: Constraint) {
        self.model = None;
        self.stack.add(constraint);
    }

    fn set_objective(&mut self, sense: ObjectiveSense, objective: QuadExpr) {
        self.model = None;
        self.stack.set_objective(sense, objective);
    }

    fn check_sat(&mut self, timeout: Option<Duration>) -> Result<Outcome, OracleError> {
        self.checks.push(CheckRecord {
            depth: self.stack.depth(),
            constraints: self.stack.constraints().len(),
            has_objective: self.stack.objective().is_some(),
            timeout,
        });
        let response = self
            .script
            .pop_front()
            .unwrap_or_else(|| self.exhausted.clone());
        self.model = None;
        match response {
            Response::Sat(named) => {
                self.model = Some(self.satisfy(&named));
                Ok(Outcome::Sat)
            }
            Response::Unsat => Ok(Outcome::Unsat),
            Response::Timeout => Ok(Outcome::Timeout),
            Response::Error(message) => Err(OracleError::Backend(message)),
        }
    }

    fn current_model(&self) -> Option<&Model> {
        self.model.as_ref()
    }
}

/// A-B-C-D-E chain of priced bus edges; A to E takes four hops.
pub fn line_network() -> Network {
    let mut network = Network::new();
    for (u, v) in [("A", "B"), ("B", "C"), ("C", "D"), ("D", "E")] {
        network
            .add_edge(u, v, TransitEdge::new("Bus", 2.0).with_price(5.0))
            .expect("valid edge");
    }
    network
}

/// Two parallel lines on A-B-D and A-C-D plus a direct A-D bus: nine A to D
/// routes within three hops.
pub fn grid_network() -> Network {
    let mut network = Network::new();
    for (u, v) in [("A", "B"), ("B", "D"), ("A", "C"), ("C", "D")] {
        network
            .add_edge(u, v, TransitEdge::new("Bus", 2.0).with_price(5.0))
            .expect("valid edge");
        network
            .add_edge(u, v, TransitEdge::new("red", 1.0))
            .expect("valid edge");
    }
    network
        .add_edge("A", "D", TransitEdge::new("Bus", 2.0).with_price(5.0))
        .expect("valid edge");
    network
}

/// A-B served by a priced bus (k 2, price 5) and an unpriced metro line (k 1).
pub fn two_mode_network() -> Network {
    let mut network = Network::new();
    network
        .add_edge("A", "B", TransitEdge::new("Bus", 2.0).with_price(5.0))
        .expect("valid edge");
    network
        .add_edge("A", "B", TransitEdge::new("blue", 1.0))
        .expect("valid edge");
    network
}
