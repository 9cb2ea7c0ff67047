//! Leaf operator: the edges of one automaton instance.

use super::{BuildContext, Component};
use crate::actions::{ActionId, SILENT};
use crate::enumerate::{enumerate, initial_predicate, EnumVariable};
use crate::error::{ExploreError, ExploreResult};
use crate::evaluator::{variable_slot, AssignmentsEvaluator, EdgeEvaluator, VariableScope};
use crate::extension::ExplorerExtension;
use crate::registry::{Slot, SlotName, SlotRegistry};
use crate::state::StateVector;
use crate::successors::Successors;
use pmc_eval::{Constants, Value, Weight};
use pmc_model::{Automaton, ModelType, VarType, Variable};
use std::ops::Range;
use tracing::trace;

/// How a leaf turns satisfied edges into successors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// One successor per destination, weighted by rate × probability.
    Stochastic,
    /// One successor per satisfied edge.
    Lts,
    /// Alternate between choosing an edge and resolving its distribution.
    TwoLayer,
}

impl Mode {
    fn of(model_type: ModelType) -> Self {
        if model_type.is_two_layer() {
            Mode::TwoLayer
        } else if model_type.is_nondet() {
            Mode::Lts
        } else {
            Mode::Stochastic
        }
    }
}

/// Destination-probability sum of one fired edge.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeProbabilitySum<W> {
    pub location: usize,
    /// Index of the edge among its location's edges, after sorting by action.
    pub edge: usize,
    pub action: ActionId,
    pub sum: W,
}

fn location_slot_name(automaton: &Automaton, instance: usize) -> SlotName {
    SlotName::Location {
        instance,
        automaton: automaton.name.clone(),
    }
}

fn edge_slot_name(automaton: &Automaton, instance: usize) -> SlotName {
    SlotName::EdgeSelector {
        instance,
        automaton: automaton.name.clone(),
    }
}

fn local_slot_name(automaton: &Automaton, instance: usize, variable: &Variable) -> SlotName {
    SlotName::Local {
        instance,
        automaton: automaton.name.clone(),
        variable: variable.name.clone(),
    }
}

/// Edge indices per location.
fn edges_by_location(automaton: &Automaton) -> ExploreResult<Vec<Vec<usize>>> {
    let mut by_location = vec![Vec::new(); automaton.locations.len()];
    for (i, edge) in automaton.edges.iter().enumerate() {
        let location = automaton.location_index(&edge.location).ok_or_else(|| {
            ExploreError::UnknownLocation {
                automaton: automaton.name.clone(),
                location: edge.location.clone(),
            }
        })?;
        by_location[location].push(i);
    }
    Ok(by_location)
}

/// Register the local variables and control slots of one instance.
pub(super) fn register_slots(
    automaton: &Automaton,
    instance: usize,
    model_type: ModelType,
    constants: &Constants,
    registry: &mut SlotRegistry,
) -> ExploreResult<()> {
    if automaton.locations.is_empty() {
        return Err(ExploreError::InvalidModel(format!(
            "automaton '{}' has no locations",
            automaton.name
        )));
    }
    for variable in &automaton.variables {
        let name = local_slot_name(automaton, instance, variable);
        registry.add(variable_slot(name, variable, constants)?)?;
    }
    let num_locations = automaton.locations.len() as i64;
    if num_locations > 1 {
        registry.add(Slot::stored(
            location_slot_name(automaton, instance),
            VarType::BoundedInt {
                lo: 0,
                hi: num_locations - 1,
            },
        ))?;
    }
    if model_type.is_two_layer() {
        let max_edges = edges_by_location(automaton)?
            .iter()
            .map(Vec::len)
            .max()
            .unwrap_or(0) as i64;
        registry.add(
            Slot::transient(
                edge_slot_name(automaton, instance),
                VarType::BoundedInt {
                    lo: -1,
                    hi: max_edges - 1,
                },
            )
            .decision(),
        )?;
    }
    Ok(())
}

/// Successor generator for one automaton instance.
///
/// Edges are grouped by source location and sorted by action, so the
/// successors of one action form a contiguous range after every query.
#[derive(Debug)]
pub struct AutomatonExplorer<W: Weight> {
    name: String,
    instance: usize,
    mode: Mode,
    location_slot: Option<usize>,
    edge_slot: Option<usize>,
    /// Transient values set in each location.
    location_values: Vec<AssignmentsEvaluator>,
    edges: Vec<Vec<EdgeEvaluator>>,
    initial_nodes: Vec<StateVector>,
    successors: Successors<W>,
    /// `[from, to)` of each action in the last query.
    action_from_to: Vec<(usize, usize)>,
    probability_sums: Vec<EdgeProbabilitySum<W>>,
    state_query: bool,
}

impl<W: Weight> AutomatonExplorer<W> {
    pub(crate) fn build(
        automaton: &Automaton,
        instance: usize,
        ctx: &BuildContext<'_>,
    ) -> ExploreResult<Self> {
        let registry = ctx.registry;
        let scope = VariableScope::automaton(registry, ctx.constants, instance, &automaton.name);
        let location_slot = registry.lookup(&location_slot_name(automaton, instance));
        let edge_slot = registry.lookup(&edge_slot_name(automaton, instance));
        let mode = Mode::of(ctx.model.model_type);
        if mode == Mode::TwoLayer && edge_slot.is_none() {
            return Err(ExploreError::InvalidModel(format!(
                "edge selector of '{}' not registered",
                automaton.name
            )));
        }

        let location_values = automaton
            .locations
            .iter()
            .map(|l| AssignmentsEvaluator::build(&l.transient_values, &scope))
            .collect::<ExploreResult<Vec<_>>>()?;

        let mut edges = Vec::with_capacity(automaton.locations.len());
        for indices in edges_by_location(automaton)? {
            let mut location_edges = indices
                .into_iter()
                .map(|i| {
                    EdgeEvaluator::build(
                        &automaton.edges[i],
                        automaton,
                        ctx.actions,
                        location_slot,
                        &scope,
                    )
                })
                .collect::<ExploreResult<Vec<_>>>()?;
            location_edges.sort_by_key(EdgeEvaluator::action);
            edges.push(location_edges);
        }

        let initial_nodes = Self::initial_nodes_of(
            automaton,
            instance,
            ctx,
            location_slot,
            edge_slot,
        )?;
        trace!(
            automaton = %automaton.name,
            instance,
            initial = initial_nodes.len(),
            "built automaton explorer"
        );

        Ok(Self {
            name: automaton.name.clone(),
            instance,
            mode,
            location_slot,
            edge_slot,
            location_values,
            edges,
            initial_nodes,
            successors: Successors::new(registry),
            action_from_to: vec![(0, 0); ctx.actions.len()],
            probability_sums: Vec::new(),
            state_query: true,
        })
    }

    /// Initial locations crossed with the local initial valuations.
    fn initial_nodes_of(
        automaton: &Automaton,
        instance: usize,
        ctx: &BuildContext<'_>,
        location_slot: Option<usize>,
        edge_slot: Option<usize>,
    ) -> ExploreResult<Vec<StateVector>> {
        if automaton.initial_locations.is_empty() {
            return Err(ExploreError::InvalidModel(format!(
                "automaton '{}' has no initial location",
                automaton.name
            )));
        }
        let locals: Vec<&Variable> = automaton.variables.iter().filter(|v| !v.transient).collect();
        let predicate =
            initial_predicate(automaton.restrict_initial.as_ref(), &locals, ctx.constants)?;
        let enum_vars: Vec<EnumVariable> = locals.iter().map(|v| EnumVariable::from(*v)).collect();
        let valuations = enumerate(&predicate, &enum_vars, ctx.enumerator)?;
        let local_slots = locals
            .iter()
            .map(|v| {
                ctx.registry
                    .lookup(&local_slot_name(automaton, instance, v))
                    .ok_or_else(|| ExploreError::UnknownVariable(v.name.clone()))
            })
            .collect::<ExploreResult<Vec<_>>>()?;

        let mut nodes = Vec::with_capacity(automaton.initial_locations.len() * valuations.len());
        for location_name in &automaton.initial_locations {
            let location = automaton.location_index(location_name).ok_or_else(|| {
                ExploreError::UnknownLocation {
                    automaton: automaton.name.clone(),
                    location: location_name.clone(),
                }
            })?;
            for values in &valuations {
                let mut node = StateVector::new(ctx.registry);
                if let Some(slot) = location_slot {
                    node.set(slot, Value::int(location as i64));
                }
                if let Some(slot) = edge_slot {
                    node.set(slot, Value::int(-1));
                }
                for (slot, value) in local_slots.iter().zip(values) {
                    node.set(*slot, *value);
                }
                nodes.push(node);
            }
        }
        Ok(nodes)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn instance(&self) -> usize {
        self.instance
    }

    pub fn is_two_layer(&self) -> bool {
        self.mode == Mode::TwoLayer
    }

    /// Successors of `action` in the last query.
    #[inline]
    pub fn action_range(&self, action: ActionId) -> Range<usize> {
        let (from, to) = self.action_from_to[action];
        from..to
    }

    /// Destination-probability sums of the edges fired by the last query.
    /// Empty for edge choices of the two-layer encoding.
    pub fn last_edge_probability_sums(&self) -> &[EdgeProbabilitySum<W>] {
        &self.probability_sums
    }

    fn location(&self, node: &StateVector) -> ExploreResult<usize> {
        let Some(slot) = self.location_slot else {
            return Ok(0);
        };
        node.get(slot)
            .as_int()
            .and_then(|l| usize::try_from(l).ok())
            .filter(|l| *l < self.edges.len())
            .ok_or_else(|| ExploreError::OutOfRange {
                slot: node.registry().name(slot),
                value: node.get(slot),
            })
    }

    fn chosen_edge(&self, node: &StateVector) -> Option<usize> {
        let slot = self.edge_slot?;
        node.get(slot).as_int().and_then(|e| usize::try_from(e).ok())
    }

    /// One successor per destination of every satisfied edge. With `lts`,
    /// one successor per satisfied edge at weight one.
    fn query_edges(&mut self, node: &StateVector, location: usize, lts: bool) -> ExploreResult<()> {
        let Self {
            edges,
            location_values,
            successors,
            action_from_to,
            probability_sums,
            ..
        } = self;
        let location_values = &location_values[location];
        for (edge_nr, edge) in edges[location].iter().enumerate() {
            if !edge.evaluate_guard(node.values())? {
                continue;
            }
            let before = successors.len();
            if lts {
                let destination = &edge.destinations()[0];
                let succ = successors.begin();
                location_values.copy_targets(node, succ)?;
                destination.assign_to(node, succ)?;
                succ.fill_unwritten(node);
                successors.commit(W::one(), edge.action());
            } else {
                let rate: Option<W> = edge.evaluate_rate(node.values())?;
                let mut sum = W::zero();
                for destination in edge.destinations() {
                    let probability: W = destination.probability(node.values())?;
                    sum = sum.add(&probability);
                    if probability.is_zero() {
                        continue;
                    }
                    let weight = match &rate {
                        Some(rate) => rate.multiply(&probability),
                        None => probability,
                    };
                    let succ = successors.begin();
                    location_values.copy_targets(node, succ)?;
                    destination.assign_to(node, succ)?;
                    succ.fill_unwritten(node);
                    successors.commit(weight, edge.action());
                }
                probability_sums.push(EdgeProbabilitySum {
                    location,
                    edge: edge_nr,
                    action: edge.action(),
                    sum,
                });
            }
            record_range(action_from_to, edge.action(), before, successors.len());
        }
        Ok(())
    }

    /// State sublayer: one zero-weight successor per satisfied edge,
    /// recording the chosen edge.
    fn query_edge_choices(
        &mut self,
        node: &StateVector,
        location: usize,
        edge_slot: usize,
    ) -> ExploreResult<()> {
        let Self {
            edges,
            location_values,
            successors,
            action_from_to,
            ..
        } = self;
        let location_values = &location_values[location];
        for (edge_nr, edge) in edges[location].iter().enumerate() {
            if !edge.evaluate_guard(node.values())? {
                continue;
            }
            let before = successors.len();
            let succ = successors.begin();
            succ.copy_from(node);
            location_values.copy_targets(node, succ)?;
            succ.set(edge_slot, Value::int(edge_nr as i64));
            successors.commit(W::zero(), edge.action());
            record_range(action_from_to, edge.action(), before, successors.len());
        }
        Ok(())
    }

    /// Distribution sublayer: the destinations of the chosen edge.
    fn query_distribution(
        &mut self,
        node: &StateVector,
        location: usize,
        edge_slot: usize,
        edge_nr: usize,
    ) -> ExploreResult<()> {
        let Self {
            name,
            edges,
            successors,
            action_from_to,
            probability_sums,
            ..
        } = self;
        let edge = edges[location].get(edge_nr).ok_or_else(|| {
            ExploreError::InvalidModel(format!(
                "edge {} chosen in location {} of '{}' does not exist",
                edge_nr, location, name
            ))
        })?;
        let rate: Option<W> = edge.evaluate_rate(node.values())?;
        let mut sum = W::zero();
        for destination in edge.destinations() {
            let probability: W = destination.probability(node.values())?;
            sum = sum.add(&probability);
            if probability.is_zero() {
                continue;
            }
            let weight = match &rate {
                Some(rate) => rate.multiply(&probability),
                None => probability,
            };
            let succ = successors.begin();
            succ.set(edge_slot, Value::int(-1));
            destination.assign_to(node, succ)?;
            succ.fill_unwritten(node);
            successors.commit(weight, SILENT);
        }
        probability_sums.push(EdgeProbabilitySum {
            location,
            edge: edge_nr,
            action: edge.action(),
            sum,
        });
        record_range(action_from_to, SILENT, 0, successors.len());
        Ok(())
    }
}

fn record_range(ranges: &mut [(usize, usize)], action: ActionId, before: usize, after: usize) {
    if after == before {
        return;
    }
    let range = &mut ranges[action];
    if range.0 == range.1 {
        range.0 = before;
    }
    range.1 = after;
}

impl<W: Weight> Component<W> for AutomatonExplorer<W> {
    fn initial_nodes(&self) -> &[StateVector] {
        &self.initial_nodes
    }

    /// Location transient values are set while choosing an edge, not while
    /// resolving its distribution.
    fn apply_location_values(&self, node: &mut StateVector) -> ExploreResult<()> {
        if self.mode == Mode::TwoLayer && self.chosen_edge(node).is_some() {
            return Ok(());
        }
        let location = self.location(node)?;
        self.location_values[location].apply_in_place(node)
    }

    fn query(
        &mut self,
        node: &StateVector,
        extensions: &mut [Box<dyn ExplorerExtension<W>>],
    ) -> ExploreResult<()> {
        self.successors.clear();
        self.probability_sums.clear();
        self.action_from_to.fill((0, 0));

        let location = self.location(node)?;
        match (self.mode, self.edge_slot) {
            (Mode::TwoLayer, Some(edge_slot)) => match self.chosen_edge(node) {
                None => {
                    self.state_query = true;
                    self.query_edge_choices(node, location, edge_slot)?;
                }
                Some(edge_nr) => {
                    self.state_query = false;
                    self.query_distribution(node, location, edge_slot, edge_nr)?;
                }
            },
            (mode, _) => {
                self.state_query = true;
                self.query_edges(node, location, mode == Mode::Lts)?;
            }
        }
        trace!(
            automaton = %self.name,
            instance = self.instance,
            location,
            successors = self.successors.len(),
            "automaton query"
        );

        for extension in extensions.iter_mut() {
            extension.after_query_automaton(self);
        }
        Ok(())
    }

    #[inline]
    fn num_successors(&self) -> usize {
        self.successors.len()
    }

    #[inline]
    fn successor(&self, i: usize) -> &StateVector {
        self.successors.node(i)
    }

    #[inline]
    fn weight(&self, i: usize) -> &W {
        self.successors.weight(i)
    }

    #[inline]
    fn label(&self, i: usize) -> ActionId {
        self.successors.label(i)
    }

    fn is_state(&self, node: &StateVector) -> bool {
        self.edge_slot
            .map_or(true, |slot| node.get(slot) == Value::int(-1))
    }

    fn is_state_query(&self) -> bool {
        self.state_query
    }
}
