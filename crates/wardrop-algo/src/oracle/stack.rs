use super::{Constraint, ObjectiveSense, OracleError, QuadExpr, VarDecl, VarId};

#[derive(Debug, Clone)]
struct Mark {
    decls: usize,
    constraints: usize,
    objective: Option<(ObjectiveSense, QuadExpr)>,
}

/// Scoped store of declarations, assertions and the objective.
///
/// Backends keep their problem state here and only lower it when asked to
/// check. Popping a scope forgets everything declared or asserted since the
/// matching push, including the objective.
#[derive(Debug, Clone, Default)]
pub struct AssertionStack {
    decls: Vec<VarDecl>,
    constraints: Vec<Constraint>,
    objective: Option<(ObjectiveSense, QuadExpr)>,
    marks: Vec<Mark>,
}

impl AssertionStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn declare(&mut self, decl: VarDecl) -> VarId {
        self.decls.push(decl);
        VarId::new(self.decls.len() - 1)
    }

    pub fn declaration(&self, var: VarId) -> Option<&VarDecl> {
        self.decls.get(var.value())
    }

    pub fn push(&mut self) {
        self.marks.push(Mark {
            decls: self.decls.len(),
            constraints: self.constraints.len(),
            objective: self.objective.clone(),
        });
    }

    pub fn pop(&mut self) -> Result<(), OracleError> {
        let mark = self.marks.pop().ok_or(OracleError::ScopeUnderflow)?;
        self.decls.truncate(mark.decls);
        self.constraints.truncate(mark.constraints);
        self.objective = mark.objective;
        Ok(())
    }

    pub fn add(&mut self, constraint: Constraint) {
        self.constraints.push(constraint);
    }

    pub fn set_objective(&mut self, sense: ObjectiveSense, objective: QuadExpr) {
        self.objective = Some((sense, objective));
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn objective(&self) -> Option<&(ObjectiveSense, QuadExpr)> {
        self.objective.as_ref()
    }

    pub fn num_vars(&self) -> usize {
        self.decls.len()
    }

    pub fn depth(&self) -> usize {
        self.marks.len()
    }
}
