//! MILP oracle backend on top of `good_lp`.
//!
//! The asserted problem is lowered to a mixed-integer linear program:
//!
//! - comparisons become rows as they are
//! - an implication `premise ⇒ conclusions` gets a binary indicator `y` with
//!   big-M rows `a <= hi(a)·y - ε·(1 - y)` (premise normalised to `a >= 0`) and
//!   `c <= hi(c)·(1 - y)` per conclusion (normalised to `c <= 0`)
//! - a convex square `c·x²` in the objective becomes an epigraph column `w`
//!   under tangent cuts `w >= 2t·x - t²`; after each solve a cut is added at
//!   the returned `x` until `w` matches `x²` (outer approximation)
//! - every other bilinear objective term `a·b` is replaced by an auxiliary `w`
//!   bound by its McCormick envelope, which is exact once either factor is
//!   pinned to a single value
//!
//! Big-M constants come from variable intervals: declared bounds tightened by
//! single-variable constraints, with `big_m` standing in for infinite ends.
//! Constraints are enforced exactly. The value reported on the model is the
//! exact quadratic evaluated at the returned assignment, and the optimum of
//! the lowered problem is attached as [`Model::bound`].
//!
//! Only variables that appear in a constraint or the objective are handed to
//! the solver, so the model carries no value for anything else.

use super::{
    AssertionStack, Comparison, ConstraintSolver, Constraint, LinExpr, Model, ObjectiveSense,
    OracleError, Outcome, QuadExpr, Relation, VarDecl, VarId,
};
use anyhow::anyhow;
use good_lp::{
    constraint, variable, Expression, ProblemVariables, ResolutionError, Solution, SolverModel,
    Variable,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LpSolverKind {
    /// Pure-Rust MILP solver
    #[default]
    MicroLp,
    #[cfg(feature = "solver-highs")]
    Highs,
}

impl LpSolverKind {
    pub fn available() -> &'static [&'static str] {
        AVAILABLE_LP_SOLVERS
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LpSolverKind::MicroLp => "microlp",
            #[cfg(feature = "solver-highs")]
            LpSolverKind::Highs => "highs",
        }
    }
}

const AVAILABLE_LP_SOLVERS: &[&str] = &[
    "microlp",
    #[cfg(feature = "solver-highs")]
    "highs",
];

fn unknown_solver_error(label: &str) -> anyhow::Error {
    anyhow!(
        "unknown lp solver '{}'; supported values: {}",
        label,
        LpSolverKind::available().join(", ")
    )
}

impl FromStr for LpSolverKind {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.to_ascii_lowercase();
        match normalized.as_str() {
            "microlp" => Ok(LpSolverKind::MicroLp),
            "highs" => {
                #[cfg(feature = "solver-highs")]
                {
                    Ok(LpSolverKind::Highs)
                }
                #[cfg(not(feature = "solver-highs"))]
                {
                    Err(unknown_solver_error(&normalized))
                }
            }
            other => Err(unknown_solver_error(other)),
        }
    }
}

fn default_implication_epsilon() -> f64 {
    1e-6
}

fn default_feasibility_tolerance() -> f64 {
    1e-7
}

fn default_big_m() -> f64 {
    1e6
}

fn default_max_cut_rounds() -> usize {
    60
}

fn default_cut_tolerance() -> f64 {
    1e-7
}

/// Tuning of the MILP lowering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LpOracleConfig {
    #[serde(default)]
    pub solver: LpSolverKind,
    /// Margin by which a premise must fail for its indicator to switch off
    #[serde(default = "default_implication_epsilon")]
    pub implication_epsilon: f64,
    /// Slack allowed when evaluating constant constraints and bound conflicts
    #[serde(default = "default_feasibility_tolerance")]
    pub feasibility_tolerance: f64,
    /// Stand-in for infinite variable bounds in big-M and envelope constants
    #[serde(default = "default_big_m")]
    pub big_m: f64,
    /// Solves spent refining the tangent cuts of convex squares
    #[serde(default = "default_max_cut_rounds")]
    pub max_cut_rounds: usize,
    /// Relative shortfall of an epigraph column below `x²` that earns a new cut
    #[serde(default = "default_cut_tolerance")]
    pub cut_tolerance: f64,
}

impl Default for LpOracleConfig {
    fn default() -> Self {
        Self {
            solver: LpSolverKind::default(),
            implication_epsilon: default_implication_epsilon(),
            feasibility_tolerance: default_feasibility_tolerance(),
            big_m: default_big_m(),
            max_cut_rounds: default_max_cut_rounds(),
            cut_tolerance: default_cut_tolerance(),
        }
    }
}

/// [`ConstraintSolver`] that lowers the asserted problem to a MILP.
///
/// Each check runs on a worker thread. When the budget expires the check
/// returns [`Outcome::Timeout`] at once and the worker is told to stop, but a
/// MILP solve already in progress is not interrupted: the worker exits after
/// that solve finishes and its result is dropped.
#[derive(Debug, Default)]
pub struct LpOracle {
    config: LpOracleConfig,
    stack: AssertionStack,
    model: Option<Model>,
}

impl LpOracle {
    pub fn new(config: LpOracleConfig) -> Self {
        Self {
            config,
            stack: AssertionStack::new(),
            model: None,
        }
    }

    pub fn config(&self) -> &LpOracleConfig {
        &self.config
    }
}

impl ConstraintSolver for LpOracle {
    fn name(&self) -> &str {
        self.config.solver.as_str()
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
        self.model = None;
        let start = Instant::now();

        let lowered = match lower(&self.stack, &self.config)? {
            Lowering::Problem(problem) => problem,
            Lowering::Infeasible(reason) => {
                debug!(reason = %reason, "presolve proved infeasibility");
                return Ok(Outcome::Unsat);
            }
        };
        debug!(
            solver = self.config.solver.as_str(),
            columns = lowered.columns.len(),
            rows = lowered.rows.len(),
            "lowered problem"
        );

        let vars = lowered.vars.clone();
        let settings = RoundSettings {
            kind: self.config.solver,
            max_rounds: self.config.max_cut_rounds.max(1),
            tolerance: self.config.cut_tolerance,
        };
        let cancel = Arc::new(AtomicBool::new(false));
        let worker_cancel = Arc::clone(&cancel);
        let (tx, rx) = mpsc::channel();
        std::thread::Builder::new()
            .name("wardrop-oracle".to_string())
            .spawn(move || {
                let _ = tx.send(solve_lowered(lowered, settings, &worker_cancel));
            })
            .map_err(|e| OracleError::Backend(format!("failed to spawn solver thread: {e}")))?;

        let received = match timeout {
            Some(budget) => match rx.recv_timeout(budget) {
                Ok(result) => result,
                Err(RecvTimeoutError::Timeout) => {
                    cancel.store(true, Ordering::Relaxed);
                    warn!(budget_ms = budget.as_millis() as u64, "solver timed out");
                    return Ok(Outcome::Timeout);
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(OracleError::Backend(
                        "solver thread exited without a result".to_string(),
                    ))
                }
            },
            None => rx.recv().map_err(|_| {
                OracleError::Backend("solver thread exited without a result".to_string())
            })?,
        };

        let (values, bound) = match received {
            WorkerResult::Solved { values, bound } => (values, bound),
            WorkerResult::Infeasible => {
                debug!(elapsed_ms = start.elapsed().as_millis() as u64, "unsat");
                return Ok(Outcome::Unsat);
            }
            WorkerResult::Failed(message) => return Err(OracleError::Backend(message)),
            WorkerResult::Cancelled => return Ok(Outcome::Timeout),
        };

        let assignment: BTreeMap<VarId, f64> = vars
            .iter()
            .zip(values)
            .filter_map(|(var, value)| var.map(|v| (v, value)))
            .collect();
        let objective = self
            .stack
            .objective()
            .and_then(|(_, quad)| quad.evaluate(|v| assignment.get(&v).copied()));
        debug!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            objective = ?objective,
            bound,
            "sat"
        );
        let mut model = Model::new(assignment, objective);
        if objective.is_some() {
            model = model.with_bound(bound);
        }
        self.model = Some(model);
        Ok(Outcome::Sat)
    }

    fn current_model(&self) -> Option<&Model> {
        self.model.as_ref()
    }
}

#[derive(Debug, Clone)]
struct Column {
    name: String,
    lower: f64,
    upper: f64,
    binary: bool,
}

/// `Σ coef·column + constant REL 0`
#[derive(Debug, Clone)]
struct Row {
    terms: Vec<(usize, f64)>,
    constant: f64,
    relation: Relation,
}

#[derive(Debug, Clone)]
struct LoweredProblem {
    columns: Vec<Column>,
    /// Source unknown of each column; `None` for indicators and auxiliaries
    vars: Vec<Option<VarId>>,
    rows: Vec<Row>,
    objective: Vec<(usize, f64)>,
    objective_constant: f64,
    sense: ObjectiveSense,
    squares: Vec<Square>,
}

/// Epigraph column `w` standing in for `x²`.
#[derive(Debug, Clone, Copy)]
struct Square {
    x: usize,
    w: usize,
}

impl Square {
    /// `w >= 2t·x - t²`
    fn tangent(&self, t: f64) -> Row {
        Row {
            terms: vec![(self.x, 2.0 * t), (self.w, -1.0)],
            constant: -t * t,
            relation: Relation::Le,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct RoundSettings {
    kind: LpSolverKind,
    max_rounds: usize,
    tolerance: f64,
}

enum Lowering {
    Problem(LoweredProblem),
    Infeasible(String),
}

enum WorkerResult {
    Solved { values: Vec<f64>, bound: f64 },
    Infeasible,
    Failed(String),
    Cancelled,
}

struct Lowerer<'a> {
    config: &'a LpOracleConfig,
    problem: LoweredProblem,
    columns: BTreeMap<VarId, usize>,
    intervals: BTreeMap<VarId, (f64, f64)>,
}

impl<'a> Lowerer<'a> {
    fn span(&self, var: VarId) -> (f64, f64) {
        let (lo, hi) = self
            .intervals
            .get(&var)
            .copied()
            .unwrap_or((f64::NEG_INFINITY, f64::INFINITY));
        let lo = if lo.is_finite() { lo } else { -self.config.big_m };
        let hi = if hi.is_finite() { hi } else { self.config.big_m };
        (lo, hi)
    }

    fn range(&self, expr: &LinExpr) -> (f64, f64) {
        let mut lo = expr.constant_part();
        let mut hi = expr.constant_part();
        for (var, coef) in expr.terms() {
            let (vlo, vhi) = self.span(var);
            if coef >= 0.0 {
                lo += coef * vlo;
                hi += coef * vhi;
            } else {
                lo += coef * vhi;
                hi += coef * vlo;
            }
        }
        (lo, hi)
    }

    fn add_column(&mut self, column: Column, var: Option<VarId>) -> usize {
        self.problem.columns.push(column);
        self.problem.vars.push(var);
        self.problem.columns.len() - 1
    }

    fn terms(&self, expr: &LinExpr) -> Vec<(usize, f64)> {
        expr.terms()
            .filter_map(|(var, coef)| self.columns.get(&var).map(|&col| (col, coef)))
            .collect()
    }

    fn push_row(&mut self, expr: &LinExpr, relation: Relation) {
        let terms = self.terms(expr);
        self.problem.rows.push(Row {
            terms,
            constant: expr.constant_part(),
            relation,
        });
    }

    /// Returns false when a constant comparison is violated.
    fn compare(&mut self, comparison: &Comparison) -> bool {
        if comparison.expr.is_constant() {
            return comparison.holds_for(
                comparison.expr.constant_part(),
                self.config.feasibility_tolerance,
            );
        }
        self.push_row(&comparison.expr, comparison.relation);
        true
    }

    fn implication(
        &mut self,
        index: usize,
        premise: &Comparison,
        conclusions: &[Comparison],
    ) -> Result<bool, OracleError> {
        let activation = match premise.relation {
            Relation::Ge => premise.expr.clone(),
            Relation::Le => -premise.expr.clone(),
            Relation::Eq => {
                return Err(OracleError::Unsupported(format!(
                    "equality premise in implication ({premise})"
                )))
            }
        };

        let (alo, ahi) = self.range(&activation);
        if alo >= 0.0 {
            for conclusion in conclusions {
                if !self.compare(conclusion) {
                    return Ok(false);
                }
            }
            return Ok(true);
        }
        if ahi < 0.0 {
            return Ok(true);
        }

        let eps = self.config.implication_epsilon;
        let y = self.add_column(
            Column {
                name: format!("ind_{index}"),
                lower: 0.0,
                upper: 1.0,
                binary: true,
            },
            None,
        );

        // a - (hi + eps)·y + eps <= 0
        let mut row = Row {
            terms: self.terms(&activation),
            constant: activation.constant_part() + eps,
            relation: Relation::Le,
        };
        row.terms.push((y, -(ahi + eps)));
        self.problem.rows.push(row);

        for conclusion in conclusions {
            let sides = match conclusion.relation {
                Relation::Le => vec![conclusion.expr.clone()],
                Relation::Ge => vec![-conclusion.expr.clone()],
                Relation::Eq => vec![conclusion.expr.clone(), -conclusion.expr.clone()],
            };
            for side in sides {
                let (_, chi) = self.range(&side);
                if chi <= 0.0 {
                    continue;
                }
                // c + hi·y - hi <= 0
                let mut row = Row {
                    terms: self.terms(&side),
                    constant: side.constant_part() - chi,
                    relation: Relation::Le,
                };
                row.terms.push((y, chi));
                self.problem.rows.push(row);
            }
        }
        Ok(true)
    }

    /// Tangent points of the first cuts: spread over the interval of `var`.
    fn initial_tangents(&self, var: VarId) -> Vec<f64> {
        let (lo, hi) = self
            .intervals
            .get(&var)
            .copied()
            .unwrap_or((f64::NEG_INFINITY, f64::INFINITY));
        match (lo.is_finite(), hi.is_finite()) {
            (true, true) if hi > lo => (0..5).map(|i| lo + (hi - lo) * f64::from(i) / 4.0).collect(),
            (true, _) => vec![lo],
            (false, true) => vec![hi],
            (false, false) => vec![0.0],
        }
    }

    fn objective(&mut self, quad: &QuadExpr) {
        let mut objective = self.terms(quad.linear());
        self.problem.objective_constant = quad.linear().constant_part();
        for (a, b, coef) in quad.products() {
            let (Some(&ca), Some(&cb)) = (self.columns.get(&a), self.columns.get(&b)) else {
                continue;
            };
            let convex = match self.problem.sense {
                ObjectiveSense::Minimise => coef > 0.0,
                ObjectiveSense::Maximise => coef < 0.0,
            };
            if a == b && convex {
                let w = self.add_column(
                    Column {
                        name: format!("sq_{}", a.value()),
                        lower: f64::NEG_INFINITY,
                        upper: f64::INFINITY,
                        binary: false,
                    },
                    None,
                );
                let square = Square { x: ca, w };
                for t in self.initial_tangents(a) {
                    self.problem.rows.push(square.tangent(t));
                }
                self.problem.squares.push(square);
                objective.push((w, coef));
                continue;
            }
            let (al, au) = self.span(a);
            let (bl, bu) = self.span(b);
            let w = self.add_column(
                Column {
                    name: format!("w_{}_{}", a.value(), b.value()),
                    lower: f64::NEG_INFINITY,
                    upper: f64::INFINITY,
                    binary: false,
                },
                None,
            );
            // w >= al·b + bl·a - al·bl, w >= au·b + bu·a - au·bu
            // w <= au·b + bl·a - au·bl, w <= al·b + bu·a - al·bu
            let envelope = [
                (al, bl, Relation::Ge),
                (au, bu, Relation::Ge),
                (au, bl, Relation::Le),
                (al, bu, Relation::Le),
            ];
            for (x, z, relation) in envelope {
                self.problem.rows.push(Row {
                    terms: vec![(w, 1.0), (cb, -x), (ca, -z)],
                    constant: x * z,
                    relation,
                });
            }
            objective.push((w, coef));
        }
        self.problem.objective = objective;
    }
}

fn lower(stack: &AssertionStack, config: &LpOracleConfig) -> Result<Lowering, OracleError> {
    let mut referenced: BTreeSet<VarId> = BTreeSet::new();
    for constraint in stack.constraints() {
        referenced.extend(constraint.vars());
    }
    if let Some((_, quad)) = stack.objective() {
        referenced.extend(quad.vars());
    }

    let mut intervals: BTreeMap<VarId, (f64, f64)> = referenced
        .iter()
        .map(|&var| {
            let bounds = stack
                .declaration(var)
                .map(|d| (d.lower, d.upper))
                .unwrap_or((f64::NEG_INFINITY, f64::INFINITY));
            (var, bounds)
        })
        .collect();

    for constraint in stack.constraints() {
        if let Constraint::Compare(cmp) = constraint {
            tighten(&mut intervals, cmp);
        }
    }
    for (var, (lo, hi)) in &intervals {
        if *lo > *hi + config.feasibility_tolerance {
            let name = stack
                .declaration(*var)
                .map(|d| d.name.clone())
                .unwrap_or_else(|| var.to_string());
            return Ok(Lowering::Infeasible(format!(
                "empty interval [{lo}, {hi}] for {name}"
            )));
        }
    }

    let mut lowerer = Lowerer {
        config,
        problem: LoweredProblem {
            columns: Vec::new(),
            vars: Vec::new(),
            rows: Vec::new(),
            objective: Vec::new(),
            objective_constant: 0.0,
            sense: ObjectiveSense::Minimise,
            squares: Vec::new(),
        },
        columns: BTreeMap::new(),
        intervals,
    };

    for &var in &referenced {
        let (name, lower, upper) = match stack.declaration(var) {
            Some(decl) => (decl.name.clone(), decl.lower, decl.upper),
            None => (var.to_string(), f64::NEG_INFINITY, f64::INFINITY),
        };
        let col = lowerer.add_column(
            Column {
                name,
                lower,
                upper,
                binary: false,
            },
            Some(var),
        );
        lowerer.columns.insert(var, col);
    }

    for (index, constraint) in stack.constraints().iter().enumerate() {
        let satisfiable = match constraint {
            Constraint::Compare(cmp) => lowerer.compare(cmp),
            Constraint::Implies {
                premise,
                conclusions,
            } => lowerer.implication(index, premise, conclusions)?,
        };
        if !satisfiable {
            return Ok(Lowering::Infeasible(format!(
                "constant constraint violated: {constraint}"
            )));
        }
    }

    if let Some((sense, quad)) = stack.objective() {
        lowerer.problem.sense = *sense;
        lowerer.objective(quad);
    }

    Ok(Lowering::Problem(lowerer.problem))
}

/// Narrow intervals using a single-variable comparison.
fn tighten(intervals: &mut BTreeMap<VarId, (f64, f64)>, cmp: &Comparison) {
    let mut terms = cmp.expr.terms();
    let (Some((var, coef)), None) = (terms.next(), terms.next()) else {
        return;
    };
    let Some(interval) = intervals.get_mut(&var) else {
        return;
    };
    let bound = -cmp.expr.constant_part() / coef;
    let (upper, lower) = match (cmp.relation, coef > 0.0) {
        (Relation::Eq, _) => (true, true),
        (Relation::Le, true) | (Relation::Ge, false) => (true, false),
        (Relation::Le, false) | (Relation::Ge, true) => (false, true),
    };
    if upper {
        interval.1 = interval.1.min(bound);
    }
    if lower {
        interval.0 = interval.0.max(bound);
    }
}

/// Solve, then add a tangent cut under every square whose epigraph column
/// falls short of `x²`, until none does or the round limit is reached.
fn solve_lowered(
    mut problem: LoweredProblem,
    settings: RoundSettings,
    cancel: &AtomicBool,
) -> WorkerResult {
    let mut round = 0;
    loop {
        if cancel.load(Ordering::Relaxed) {
            return WorkerResult::Cancelled;
        }
        let values = match solve_round(&problem, settings.kind) {
            RoundResult::Solved(values) => values,
            RoundResult::Infeasible => return WorkerResult::Infeasible,
            RoundResult::Failed(message) => return WorkerResult::Failed(message),
        };
        round += 1;

        let cuts: Vec<Row> = problem
            .squares
            .iter()
            .filter_map(|square| {
                let x = values[square.x];
                let shortfall = x * x - values[square.w];
                (shortfall > settings.tolerance * (1.0 + x * x)).then(|| square.tangent(x))
            })
            .collect();
        if cuts.is_empty() || round >= settings.max_rounds {
            if !cuts.is_empty() {
                debug!(rounds = round, open = cuts.len(), "cut round limit reached");
            }
            let bound = problem.objective_constant
                + problem
                    .objective
                    .iter()
                    .map(|&(col, coef)| coef * values[col])
                    .sum::<f64>();
            return WorkerResult::Solved { values, bound };
        }
        problem.rows.extend(cuts);
    }
}

enum RoundResult {
    Solved(Vec<f64>),
    Infeasible,
    Failed(String),
}

fn solve_round(problem: &LoweredProblem, kind: LpSolverKind) -> RoundResult {
    let mut vars = ProblemVariables::new();
    let handles: Vec<Variable> = problem
        .columns
        .iter()
        .map(|column| {
            let mut definition = variable().name(column.name.clone());
            if column.binary {
                definition = definition.binary();
            } else {
                if column.lower.is_finite() {
                    definition = definition.min(column.lower);
                }
                if column.upper.is_finite() {
                    definition = definition.max(column.upper);
                }
            }
            vars.add(definition)
        })
        .collect();

    let mut objective = Expression::from(0.0);
    for &(col, coef) in &problem.objective {
        objective += coef * handles[col];
    }
    let unsolved = match problem.sense {
        ObjectiveSense::Minimise => vars.minimise(objective),
        ObjectiveSense::Maximise => vars.maximise(objective),
    };

    match kind {
        LpSolverKind::MicroLp => solve_with(
            unsolved.using(good_lp::solvers::microlp::microlp),
            &problem.rows,
            &handles,
        ),
        #[cfg(feature = "solver-highs")]
        LpSolverKind::Highs => solve_with(
            unsolved.using(good_lp::solvers::highs::highs),
            &problem.rows,
            &handles,
        ),
    }
}

fn solve_with<M: SolverModel<Error = ResolutionError>>(
    mut model: M,
    rows: &[Row],
    handles: &[Variable],
) -> RoundResult {
    for row in rows {
        let mut lhs = Expression::from(row.constant);
        for &(col, coef) in &row.terms {
            lhs += coef * handles[col];
        }
        model = model.with(match row.relation {
            Relation::Le => constraint!(lhs <= 0.0),
            Relation::Ge => constraint!(lhs >= 0.0),
            Relation::Eq => constraint!(lhs == 0.0),
        });
    }
    match model.solve() {
        Ok(solution) => RoundResult::Solved(handles.iter().map(|v| solution.value(*v)).collect()),
        Err(ResolutionError::Infeasible) => RoundResult::Infeasible,
        Err(e) => RoundResult::Failed(format!("{:?}", e)),
    }
}
