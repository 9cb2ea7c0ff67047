//! Initial-state enumeration.
//!
//! An initial-state predicate is first attacked directly: `false` yields no
//! states, `true` the cross product of the variable domains, and every
//! conjunct of the form `var == literal` fixes that variable and is
//! substituted into the rest. Whatever remains goes to the configured
//! [`EnumeratorKind`].

use crate::config::EnumeratorKind;
use crate::error::{resolution_error, ExploreError, ExploreResult};
use crate::registry::{admit, domain};
use pmc_eval::{
    compile, decompose_conjuncts, eval_bool, eval_partial, simplify, CompiledExpr, Constants,
    Value,
};
use pmc_model::{BinOp, Expr, VarType, Variable};
use tracing::debug;

/// A variable ranged over by the enumerator.
#[derive(Debug, Clone)]
pub struct EnumVariable {
    pub name: String,
    pub ty: VarType,
}

impl From<&Variable> for EnumVariable {
    fn from(v: &Variable) -> Self {
        Self {
            name: v.name.clone(),
            ty: v.ty,
        }
    }
}

/// Conjunction of `restrict` and `var == initial` for every variable with
/// an initial value, compiled against the positions of `variables`.
pub(crate) fn initial_predicate(
    restrict: Option<&Expr>,
    variables: &[&Variable],
    constants: &Constants,
) -> ExploreResult<CompiledExpr> {
    let resolve = |name: &str| variables.iter().position(|v| v.name == name);
    let mut predicate = match restrict {
        Some(r) => compile(r, constants, &resolve).map_err(resolution_error)?,
        None => CompiledExpr::TRUE,
    };
    for (i, variable) in variables.iter().enumerate() {
        if let Some(initial) = &variable.initial {
            let value = compile(initial, constants, &resolve).map_err(resolution_error)?;
            predicate = CompiledExpr::binary(
                BinOp::And,
                predicate,
                CompiledExpr::binary(BinOp::Eq, CompiledExpr::Var(i), value),
            );
        }
    }
    Ok(predicate)
}

/// All assignments to `variables` satisfying `predicate`, each in variable
/// order. `predicate` reads variable `i` as slot `i`.
pub fn enumerate(
    predicate: &CompiledExpr,
    variables: &[EnumVariable],
    kind: EnumeratorKind,
) -> ExploreResult<Vec<Vec<Value>>> {
    let mut fixed: Vec<Option<Value>> = vec![None; variables.len()];
    let mut predicate = predicate.clone();
    loop {
        let simplified = simplify(predicate)?;
        if simplified.is_false() {
            return Ok(Vec::new());
        }
        let equality = decompose_conjuncts(&simplified)
            .into_iter()
            .find_map(|c| match c.as_var_equality() {
                Some((slot, CompiledExpr::Lit(v))) => Some((slot, *v)),
                _ => None,
            });
        match equality {
            Some((slot, value)) => {
                let Some(admitted) = admit(&variables[slot].ty, value) else {
                    debug!(variable = %variables[slot].name, %value, "initial value out of range");
                    return Ok(Vec::new());
                };
                fixed[slot] = Some(admitted);
                predicate = simplified.substitute(slot, admitted);
            }
            None => {
                predicate = simplified;
                break;
            }
        }
    }

    if predicate.is_true() {
        let domains = domains(variables, &fixed, kind)?;
        let mut out = Vec::new();
        for_each_combination(&domains, |values| {
            out.push(values.to_vec());
            Ok(())
        })?;
        return Ok(out);
    }

    debug!(?kind, "enumerating initial-state predicate");
    match kind {
        EnumeratorKind::BruteForce => brute_force(&predicate, variables, &fixed),
        EnumeratorKind::Propagating => {
            let conjuncts = decompose_conjuncts(&predicate);
            let mut search = Propagation {
                predicate: &predicate,
                conjuncts: &conjuncts,
                variables,
                assignment: fixed,
                out: Vec::new(),
            };
            search.run()?;
            Ok(search.out)
        }
    }
}

fn unbounded(variable: &EnumVariable, kind: EnumeratorKind) -> ExploreError {
    match kind {
        EnumeratorKind::BruteForce => ExploreError::UnboundedInitialVariable {
            variable: variable.name.clone(),
        },
        EnumeratorKind::Propagating => ExploreError::InfinitelyManyInitialStates,
    }
}

/// Candidate values per variable: the fixed value, or the whole domain.
fn domains(
    variables: &[EnumVariable],
    fixed: &[Option<Value>],
    kind: EnumeratorKind,
) -> ExploreResult<Vec<Vec<Value>>> {
    variables
        .iter()
        .zip(fixed)
        .map(|(variable, fixed)| match fixed {
            Some(v) => Ok(vec![*v]),
            None => domain(&variable.ty).ok_or_else(|| unbounded(variable, kind)),
        })
        .collect()
}

/// Call `f` for every element of the cross product of `domains`.
fn for_each_combination(
    domains: &[Vec<Value>],
    mut f: impl FnMut(&[Value]) -> ExploreResult<()>,
) -> ExploreResult<()> {
    if domains.iter().any(|d| d.is_empty()) {
        return Ok(());
    }
    let mut idx = vec![0usize; domains.len()];
    let mut values: Vec<Value> = domains.iter().map(|d| d[0]).collect();
    loop {
        f(&values)?;
        // Odometer increment, last position fastest
        let mut pos = domains.len();
        loop {
            if pos == 0 {
                return Ok(());
            }
            pos -= 1;
            idx[pos] += 1;
            if idx[pos] < domains[pos].len() {
                values[pos] = domains[pos][idx[pos]];
                break;
            }
            idx[pos] = 0;
            values[pos] = domains[pos][0];
        }
    }
}

fn brute_force(
    predicate: &CompiledExpr,
    variables: &[EnumVariable],
    fixed: &[Option<Value>],
) -> ExploreResult<Vec<Vec<Value>>> {
    let domains = domains(variables, fixed, EnumeratorKind::BruteForce)?;
    let mut out = Vec::new();
    for_each_combination(&domains, |values| {
        if eval_bool(predicate, values)? {
            out.push(values.to_vec());
        }
        Ok(())
    })?;
    Ok(out)
}

/// Depth-first search over partial assignments.
struct Propagation<'a> {
    predicate: &'a CompiledExpr,
    conjuncts: &'a [&'a CompiledExpr],
    variables: &'a [EnumVariable],
    assignment: Vec<Option<Value>>,
    out: Vec<Vec<Value>>,
}

impl Propagation<'_> {
    fn run(&mut self) -> ExploreResult<()> {
        if eval_partial(self.predicate, &self.assignment)? == Some(Value::bool(false)) {
            return Ok(());
        }

        if self.assignment.iter().all(Option::is_some) {
            let values: Vec<Value> = self.assignment.iter().flatten().copied().collect();
            if eval_bool(self.predicate, &values)? {
                self.out.push(values);
            }
            return Ok(());
        }

        // An equality whose other side is already known determines a variable.
        for conjunct in self.conjuncts {
            let Some((slot, other)) = conjunct.as_var_equality() else {
                continue;
            };
            if self.assignment[slot].is_some() {
                continue;
            }
            if let Some(value) = eval_partial(other, &self.assignment)? {
                let Some(admitted) = admit(&self.variables[slot].ty, value) else {
                    return Ok(());
                };
                return self.branch(slot, admitted);
            }
        }

        let next = self
            .assignment
            .iter()
            .zip(self.variables)
            .position(|(a, v)| a.is_none() && v.ty.is_bounded());
        match next {
            Some(slot) => {
                let candidates = domain(&self.variables[slot].ty).unwrap_or_default();
                for value in candidates {
                    self.branch(slot, value)?;
                }
                Ok(())
            }
            None => Err(ExploreError::InfinitelyManyInitialStates),
        }
    }

    fn branch(&mut self, slot: usize, value: Value) -> ExploreResult<()> {
        self.assignment[slot] = Some(value);
        let result = self.run();
        self.assignment[slot] = None;
        result
    }
}
