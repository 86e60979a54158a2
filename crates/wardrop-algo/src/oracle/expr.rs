//! Arithmetic expressions and constraints handed to a [`ConstraintSolver`].
//!
//! Expressions are backend-neutral: a [`LinExpr`] is an affine combination of
//! solver unknowns, a [`QuadExpr`] adds bilinear products (the total-cost
//! objective multiplies route flows by route costs). Constraints compare an
//! expression against zero, optionally guarded by a premise.
//!
//! [`ConstraintSolver`]: super::ConstraintSolver

use std::collections::BTreeMap;
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Neg, Sub};

/// Handle to an unknown declared on a solver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(usize);

impl VarId {
    #[inline]
    pub fn new(value: usize) -> Self {
        VarId(value)
    }
    #[inline]
    pub fn value(&self) -> usize {
        self.0
    }
}

impl fmt::Display for VarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "x{}", self.0)
    }
}

/// Affine expression `Σ coef·var + constant`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LinExpr {
    terms: BTreeMap<VarId, f64>,
    constant: f64,
}

impl LinExpr {
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn constant(value: f64) -> Self {
        Self {
            terms: BTreeMap::new(),
            constant: value,
        }
    }

    pub fn var(var: VarId) -> Self {
        Self::term(1.0, var)
    }

    pub fn term(coef: f64, var: VarId) -> Self {
        let mut expr = Self::zero();
        expr.add_term(coef, var);
        expr
    }

    /// Add `coef·var`, merging with an existing term. Cancelled terms are dropped.
    pub fn add_term(&mut self, coef: f64, var: VarId) {
        let entry = self.terms.entry(var).or_insert(0.0);
        *entry += coef;
        if *entry == 0.0 {
            self.terms.remove(&var);
        }
    }

    pub fn add_constant(&mut self, value: f64) {
        self.constant += value;
    }

    pub fn terms(&self) -> impl Iterator<Item = (VarId, f64)> + '_ {
        self.terms.iter().map(|(v, c)| (*v, *c))
    }

    pub fn constant_part(&self) -> f64 {
        self.constant
    }

    pub fn is_constant(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn vars(&self) -> impl Iterator<Item = VarId> + '_ {
        self.terms.keys().copied()
    }

    /// Evaluate with a variable lookup; `None` if any variable has no value.
    pub fn evaluate(&self, value_of: impl Fn(VarId) -> Option<f64>) -> Option<f64> {
        let mut total = self.constant;
        for (var, coef) in self.terms() {
            total += coef * value_of(var)?;
        }
        Some(total)
    }

    /// `self <= rhs`
    pub fn leq(self, rhs: impl Into<LinExpr>) -> Comparison {
        Comparison::new(self - rhs.into(), Relation::Le)
    }

    /// `self >= rhs`
    pub fn geq(self, rhs: impl Into<LinExpr>) -> Comparison {
        Comparison::new(self - rhs.into(), Relation::Ge)
    }

    /// `self == rhs`
    pub fn equals(self, rhs: impl Into<LinExpr>) -> Comparison {
        Comparison::new(self - rhs.into(), Relation::Eq)
    }
}

impl From<VarId> for LinExpr {
    fn from(var: VarId) -> Self {
        LinExpr::var(var)
    }
}

impl From<f64> for LinExpr {
    fn from(value: f64) -> Self {
        LinExpr::constant(value)
    }
}

impl AddAssign<LinExpr> for LinExpr {
    fn add_assign(&mut self, rhs: LinExpr) {
        for (var, coef) in rhs.terms() {
            self.add_term(coef, var);
        }
        self.constant += rhs.constant;
    }
}

impl Add<LinExpr> for LinExpr {
    type Output = LinExpr;

    fn add(mut self, rhs: LinExpr) -> LinExpr {
        self += rhs;
        self
    }
}

impl Neg for LinExpr {
    type Output = LinExpr;

    fn neg(self) -> LinExpr {
        self * -1.0
    }
}

impl Sub<LinExpr> for LinExpr {
    type Output = LinExpr;

    fn sub(self, rhs: LinExpr) -> LinExpr {
        self + (-rhs)
    }
}

impl Mul<f64> for LinExpr {
    type Output = LinExpr;

    fn mul(mut self, rhs: f64) -> LinExpr {
        if rhs == 0.0 {
            return LinExpr::zero();
        }
        for coef in self.terms.values_mut() {
            *coef *= rhs;
        }
        self.constant *= rhs;
        self
    }
}

impl Sum for LinExpr {
    fn sum<I: Iterator<Item = LinExpr>>(iter: I) -> Self {
        iter.fold(LinExpr::zero(), |acc, e| acc + e)
    }
}

impl fmt::Display for LinExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (var, coef) in self.terms() {
            write!(f, "{coef:+}*{var} ")?;
        }
        write!(f, "{:+}", self.constant)
    }
}

/// Linear part plus bilinear products `Σ coef·a·b`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QuadExpr {
    linear: LinExpr,
    products: BTreeMap<(VarId, VarId), f64>,
}

impl QuadExpr {
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn add_linear(&mut self, expr: LinExpr) {
        self.linear += expr;
    }

    /// Add `coef·a·b`; the pair is stored unordered.
    pub fn add_product(&mut self, coef: f64, a: VarId, b: VarId) {
        let key = if a <= b { (a, b) } else { (b, a) };
        let entry = self.products.entry(key).or_insert(0.0);
        *entry += coef;
        if *entry == 0.0 {
            self.products.remove(&key);
        }
    }

    /// Add `var · expr`.
    pub fn add_scaled_by_var(&mut self, var: VarId, expr: &LinExpr) {
        for (other, coef) in expr.terms() {
            self.add_product(coef, var, other);
        }
        if expr.constant_part() != 0.0 {
            self.linear.add_term(expr.constant_part(), var);
        }
    }

    pub fn linear(&self) -> &LinExpr {
        &self.linear
    }

    pub fn products(&self) -> impl Iterator<Item = (VarId, VarId, f64)> + '_ {
        self.products.iter().map(|((a, b), c)| (*a, *b, *c))
    }

    pub fn is_linear(&self) -> bool {
        self.products.is_empty()
    }

    pub fn vars(&self) -> impl Iterator<Item = VarId> + '_ {
        self.linear
            .vars()
            .chain(self.products.keys().flat_map(|(a, b)| [*a, *b]))
    }

    pub fn evaluate(&self, value_of: impl Fn(VarId) -> Option<f64>) -> Option<f64> {
        let mut total = self.linear.evaluate(&value_of)?;
        for (a, b, coef) in self.products() {
            total += coef * value_of(a)? * value_of(b)?;
        }
        Some(total)
    }
}

impl From<LinExpr> for QuadExpr {
    fn from(linear: LinExpr) -> Self {
        Self {
            linear,
            products: BTreeMap::new(),
        }
    }
}

/// How an expression compares against zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    Le,
    Ge,
    Eq,
}

impl Relation {
    fn symbol(&self) -> &'static str {
        match self {
            Relation::Le => "<=",
            Relation::Ge => ">=",
            Relation::Eq => "==",
        }
    }
}

/// `expr REL 0`
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub expr: LinExpr,
    pub relation: Relation,
}

impl Comparison {
    pub fn new(expr: LinExpr, relation: Relation) -> Self {
        Self { expr, relation }
    }

    /// Whether `value REL 0` holds within `tolerance`.
    pub fn holds_for(&self, value: f64, tolerance: f64) -> bool {
        match self.relation {
            Relation::Le => value <= tolerance,
            Relation::Ge => value >= -tolerance,
            Relation::Eq => value.abs() <= tolerance,
        }
    }

    pub fn is_satisfied(&self, value_of: impl Fn(VarId) -> Option<f64>, tolerance: f64) -> Option<bool> {
        self.expr
            .evaluate(value_of)
            .map(|value| self.holds_for(value, tolerance))
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} 0", self.expr, self.relation.symbol())
    }
}

/// A constraint asserted on a solver.
#[derive(Debug, Clone, PartialEq)]
pub enum Constraint {
    /// Unconditional comparison
    Compare(Comparison),
    /// Every conclusion must hold whenever the premise holds
    Implies {
        premise: Comparison,
        conclusions: Vec<Comparison>,
    },
}

impl Constraint {
    pub fn implies(premise: Comparison, conclusions: Vec<Comparison>) -> Self {
        Constraint::Implies {
            premise,
            conclusions,
        }
    }

    /// Every variable mentioned by the constraint.
    pub fn vars(&self) -> Vec<VarId> {
        match self {
            Constraint::Compare(c) => c.expr.vars().collect(),
            Constraint::Implies {
                premise,
                conclusions,
            } => premise
                .expr
                .vars()
                .chain(conclusions.iter().flat_map(|c| c.expr.vars()))
                .collect(),
        }
    }
}

impl From<Comparison> for Constraint {
    fn from(comparison: Comparison) -> Self {
        Constraint::Compare(comparison)
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constraint::Compare(c) => write!(f, "({c})"),
            Constraint::Implies {
                premise,
                conclusions,
            } => {
                write!(f, "(=> ({premise})")?;
                for c in conclusions {
                    write!(f, " ({c})")?;
                }
                write!(f, ")")
            }
        }
    }
}
