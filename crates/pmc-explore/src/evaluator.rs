//! Assignment, destination and edge evaluators.
//!
//! Model expressions are compiled once, when the composition tree is built,
//! against the slot layout of the registry. Automaton-local identifiers
//! resolve to the slots of the querying automaton instance before globals.

use crate::actions::{ActionId, ActionIndex};
use crate::error::{resolution_error, ExploreError, ExploreResult};
use crate::registry::{Slot, SlotName, SlotRegistry};
use crate::state::StateVector;
use pmc_eval::{CompiledExpr, Constants, Evaluator, Value, Weight};
use pmc_model::{Assignment, Automaton, Destination, Edge, Expr, Variable};
use smallvec::SmallVec;

/// Name resolution for one automaton instance, or for the global scope.
pub(crate) struct VariableScope<'a> {
    registry: &'a SlotRegistry,
    constants: &'a Constants,
    local: Option<(usize, &'a str)>,
}

impl<'a> VariableScope<'a> {
    pub(crate) fn global(registry: &'a SlotRegistry, constants: &'a Constants) -> Self {
        Self {
            registry,
            constants,
            local: None,
        }
    }

    pub(crate) fn automaton(
        registry: &'a SlotRegistry,
        constants: &'a Constants,
        instance: usize,
        automaton: &'a str,
    ) -> Self {
        Self {
            registry,
            constants,
            local: Some((instance, automaton)),
        }
    }

    pub(crate) fn resolve(&self, name: &str) -> Option<usize> {
        if let Some((instance, automaton)) = self.local {
            let local = SlotName::Local {
                instance,
                automaton: automaton.to_string(),
                variable: name.to_string(),
            };
            if let Some(idx) = self.registry.lookup(&local) {
                return Some(idx);
            }
        }
        self.registry.global(name)
    }

    pub(crate) fn compile(&self, expr: &Expr) -> ExploreResult<CompiledExpr> {
        pmc_eval::compile(expr, self.constants, &|name: &str| self.resolve(name))
            .map_err(resolution_error)
    }

    pub(crate) fn evaluator(&self, expr: &Expr) -> ExploreResult<Evaluator> {
        self.compile(expr).map(Evaluator::new)
    }

    fn target(&self, name: &str) -> ExploreResult<usize> {
        self.resolve(name)
            .ok_or_else(|| ExploreError::UnknownVariable(name.to_string()))
    }
}

/// Evaluate a closed expression (constants only).
pub(crate) fn constant_value(expr: &Expr, constants: &Constants) -> ExploreResult<Value> {
    let compiled = pmc_eval::compile(expr, constants, &|_: &str| None::<usize>).map_err(resolution_error)?;
    match compiled {
        CompiledExpr::Lit(v) => Ok(v),
        _ => Err(ExploreError::InvalidModel(format!(
            "expression '{}' is not constant",
            expr
        ))),
    }
}

/// Slot descriptor of a declared variable.
pub(crate) fn variable_slot(
    name: SlotName,
    variable: &Variable,
    constants: &Constants,
) -> ExploreResult<Slot> {
    if !variable.transient {
        return Ok(Slot::stored(name, variable.ty));
    }
    let mut slot = Slot::transient(name, variable.ty);
    if let Some(initial) = &variable.initial {
        let value = constant_value(initial, constants)?;
        let admitted = slot.admit(value).ok_or_else(|| ExploreError::OutOfRange {
            slot: slot.name.to_string(),
            value,
        })?;
        slot = slot.with_initial(admitted);
    }
    Ok(slot)
}

/// Range-check `value` and write it into `target`.
///
/// Rewriting a slot with the value it already holds this step is accepted;
/// any other second write is a conflict.
pub(crate) fn write_slot(target: &mut StateVector, slot: usize, value: Value) -> ExploreResult<()> {
    let admitted = {
        let desc = target.registry().slot(slot);
        desc.admit(value).ok_or_else(|| ExploreError::OutOfRange {
            slot: desc.name.to_string(),
            value,
        })?
    };
    if !target.set(slot, admitted) && target.get(slot) != admitted {
        return Err(ExploreError::MultipleWrite {
            slot: target.registry().name(slot),
        });
    }
    Ok(())
}

/// Convert a probability or rate, rejecting negative values.
pub(crate) fn checked_weight<W: Weight>(value: Value) -> ExploreResult<W> {
    let weight = W::from_value(value)?;
    if !weight.is_ge_zero() {
        return Err(ExploreError::NegativeWeight {
            value: weight.to_f64(),
        });
    }
    Ok(weight)
}

/// One assignment, resolved to its evaluation strategy at build time.
#[derive(Debug, Clone)]
pub enum AssignmentEvaluator {
    /// `slot := value`.
    Simple { slot: usize, value: Evaluator },
}

impl AssignmentEvaluator {
    pub(crate) fn build(assignment: &Assignment, scope: &VariableScope<'_>) -> ExploreResult<Self> {
        Ok(AssignmentEvaluator::Simple {
            slot: scope.target(&assignment.target)?,
            value: scope.evaluator(&assignment.value)?,
        })
    }

    pub fn slot(&self) -> usize {
        match self {
            AssignmentEvaluator::Simple { slot, .. } => *slot,
        }
    }

    #[inline]
    pub fn evaluate(&self, values: &[Value]) -> ExploreResult<Value> {
        match self {
            AssignmentEvaluator::Simple { value, .. } => Ok(value.evaluate(values)?),
        }
    }
}

/// A set of assignments executed simultaneously.
#[derive(Debug, Clone, Default)]
pub struct AssignmentsEvaluator {
    assignments: Vec<AssignmentEvaluator>,
}

impl AssignmentsEvaluator {
    pub(crate) fn build(
        assignments: &[Assignment],
        scope: &VariableScope<'_>,
    ) -> ExploreResult<Self> {
        let assignments = assignments
            .iter()
            .map(|a| AssignmentEvaluator::build(a, scope))
            .collect::<ExploreResult<Vec<_>>>()?;
        Ok(Self { assignments })
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    /// Evaluate against `source` and write into `target`.
    pub fn apply(&self, source: &[Value], target: &mut StateVector) -> ExploreResult<()> {
        for assignment in &self.assignments {
            let value = assignment.evaluate(source)?;
            write_slot(target, assignment.slot(), value)?;
        }
        Ok(())
    }

    /// Write the values `source` holds in this set's target slots.
    pub fn copy_targets(&self, source: &StateVector, target: &mut StateVector) -> ExploreResult<()> {
        for assignment in &self.assignments {
            let slot = assignment.slot();
            write_slot(target, slot, source.get(slot))?;
        }
        Ok(())
    }

    /// Evaluate every right-hand side against `node`, then write them all
    /// into `node`.
    pub fn apply_in_place(&self, node: &mut StateVector) -> ExploreResult<()> {
        if self.assignments.is_empty() {
            return Ok(());
        }
        let values = self
            .assignments
            .iter()
            .map(|a| a.evaluate(node.values()))
            .collect::<ExploreResult<SmallVec<[Value; 8]>>>()?;
        for (assignment, value) in self.assignments.iter().zip(values) {
            write_slot(node, assignment.slot(), value)?;
        }
        Ok(())
    }
}

/// One destination of an edge.
#[derive(Debug, Clone)]
pub struct DestinationEvaluator {
    location_slot: Option<usize>,
    location: i64,
    probability: Option<Evaluator>,
    assignments: AssignmentsEvaluator,
}

impl DestinationEvaluator {
    pub(crate) fn build(
        destination: &Destination,
        automaton: &Automaton,
        location_slot: Option<usize>,
        scope: &VariableScope<'_>,
    ) -> ExploreResult<Self> {
        let location = automaton
            .location_index(&destination.location)
            .ok_or_else(|| ExploreError::UnknownLocation {
                automaton: automaton.name.clone(),
                location: destination.location.clone(),
            })?;
        let probability = destination
            .probability
            .as_ref()
            .map(|p| scope.evaluator(p))
            .transpose()?;
        Ok(Self {
            location_slot,
            location: location as i64,
            probability,
            assignments: AssignmentsEvaluator::build(&destination.assignments, scope)?,
        })
    }

    /// Probability of this destination; one if none is given.
    pub fn probability<W: Weight>(&self, values: &[Value]) -> ExploreResult<W> {
        match &self.probability {
            None => Ok(W::one()),
            Some(p) => checked_weight(p.evaluate(values)?),
        }
    }

    /// Move to the target location and apply the assignments, evaluated in
    /// `source`.
    pub fn assign_to(&self, source: &StateVector, target: &mut StateVector) -> ExploreResult<()> {
        if let Some(slot) = self.location_slot {
            write_slot(target, slot, Value::int(self.location))?;
        }
        self.assignments.apply(source.values(), target)
    }

    pub fn target_location(&self) -> usize {
        self.location as usize
    }
}

/// A guarded edge with its destinations.
#[derive(Debug, Clone)]
pub struct EdgeEvaluator {
    action: ActionId,
    guard: Evaluator,
    rate: Option<Evaluator>,
    destinations: Vec<DestinationEvaluator>,
}

impl EdgeEvaluator {
    pub(crate) fn build(
        edge: &Edge,
        automaton: &Automaton,
        actions: &ActionIndex,
        location_slot: Option<usize>,
        scope: &VariableScope<'_>,
    ) -> ExploreResult<Self> {
        if edge.destinations.is_empty() {
            return Err(ExploreError::InvalidModel(format!(
                "edge of automaton '{}' in location '{}' has no destinations",
                automaton.name, edge.location
            )));
        }
        let guard = match &edge.guard {
            Some(g) => scope.evaluator(g)?,
            None => Evaluator::new(CompiledExpr::TRUE),
        };
        let rate = edge.rate.as_ref().map(|r| scope.evaluator(r)).transpose()?;
        let destinations = edge
            .destinations
            .iter()
            .map(|d| DestinationEvaluator::build(d, automaton, location_slot, scope))
            .collect::<ExploreResult<Vec<_>>>()?;
        Ok(Self {
            action: actions.id(edge.action.as_deref())?,
            guard,
            rate,
            destinations,
        })
    }

    #[inline]
    pub fn action(&self) -> ActionId {
        self.action
    }

    #[inline]
    pub fn evaluate_guard(&self, values: &[Value]) -> ExploreResult<bool> {
        Ok(self.guard.evaluate_boolean(values)?)
    }

    pub fn has_rate(&self) -> bool {
        self.rate.is_some()
    }

    pub fn evaluate_rate<W: Weight>(&self, values: &[Value]) -> ExploreResult<Option<W>> {
        self.rate
            .as_ref()
            .map(|r| checked_weight(r.evaluate(values)?))
            .transpose()
    }

    pub fn destinations(&self) -> &[DestinationEvaluator] {
        &self.destinations
    }
}
