//! Root explorer: the successor function of a whole model.

use crate::actions::{ActionId, ActionIndex, SILENT};
use crate::component::{register_slots, BuildContext, Component, ComponentExplorer};
use crate::config::ExplorerConfig;
use crate::enumerate::{enumerate, initial_predicate, EnumVariable};
use crate::error::{resolution_error, ExploreError, ExploreResult};
use crate::evaluator::{variable_slot, VariableScope};
use crate::extension::{ExplorerExtension, ProbabilitySumCheck, ProbabilitySumReport};
use crate::property::{EdgeProperty, GraphProperty, NodeProperty, PropertyValue};
use crate::registry::{Slot, SlotName, SlotRegistry};
use crate::state::{Fingerprint, StateVector};
use crate::successors::Successors;
use ahash::AHashSet;
use pmc_eval::{Constants, Evaluator, Value, Weight};
use pmc_model::{Expr, Model, ModelType, VarType, Variable};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, trace};

/// Where the successors of the last query live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    System,
    /// Synthesized by the explorer itself (self-loops).
    Root,
}

/// Explicit-state successor generator for a model.
///
/// Typical use: take the [`initial_nodes`](Explorer::initial_nodes), then
/// for every node call [`query`](Explorer::query) and read the successors
/// with [`successor`](Explorer::successor), [`weight`](Explorer::weight) and
/// [`label`](Explorer::label). Successors are only valid until the next
/// query; clone the ones to keep.
pub struct Explorer<W: Weight = f64> {
    model_type: ModelType,
    config: ExplorerConfig,
    constants: Constants,
    registry: Arc<SlotRegistry>,
    actions: ActionIndex,
    system: ComponentExplorer<W>,
    /// Pending self-loop marker, for nondeterministic models.
    self_loop_slot: Option<usize>,
    initial_nodes: Vec<StateVector>,
    initial_fingerprints: AHashSet<Fingerprint>,
    /// Node property expressions compiled so far.
    expressions: Vec<(Expr, Evaluator)>,
    extensions: Vec<Box<dyn ExplorerExtension<W>>>,
    queried: StateVector,
    successors: Successors<W>,
    source: Source,
    state: bool,
    deadlock: bool,
}

impl<W: Weight> fmt::Debug for Explorer<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Explorer")
            .field("model_type", &self.model_type)
            .field("slots", &self.registry.len())
            .field("initial_nodes", &self.initial_nodes.len())
            .field("extensions", &self.extensions.len())
            .finish_non_exhaustive()
    }
}

impl<W: Weight> Explorer<W> {
    /// Build the explorer and compute the initial states.
    pub fn new(model: &Model, config: ExplorerConfig) -> ExploreResult<Self> {
        info!(model = %model.name, semantics = ?model.model_type, "building explorer");
        let undefined = model.undefined_constants();
        if !undefined.is_empty() {
            return Err(ExploreError::UndefinedConstant(undefined.join(", ")));
        }
        let constants = Constants::evaluate(&model.constants).map_err(resolution_error)?;
        let actions = ActionIndex::new(&model.actions)?;

        let mut registry = SlotRegistry::new();
        let self_loop_slot = if model.model_type.is_nondet() {
            Some(registry.add(Slot::transient(SlotName::SelfLoop, VarType::Bool).decision())?)
        } else {
            None
        };
        for variable in &model.variables {
            let name = SlotName::Global(variable.name.clone());
            registry.add(variable_slot(name, variable, &constants)?)?;
        }
        let mut instances = 0;
        register_slots(&model.system, model, &constants, &mut registry, &mut instances)?;
        let registry = Arc::new(registry);
        debug!(slots = registry.len(), instances, "slot registry frozen");

        let mut ctx = BuildContext {
            model,
            registry: &registry,
            actions: &actions,
            constants: &constants,
            enumerator: config.initial_enumerator,
            next_instance: 0,
        };
        let system = ComponentExplorer::build(&model.system, &mut ctx)?;
        let initial_nodes =
            Self::compute_initial_nodes(model, &constants, &config, &registry, &system, self_loop_slot)?;
        info!(
            count = initial_nodes.len(),
            enumerator = ?config.initial_enumerator,
            "generated initial states"
        );

        let initial_fingerprints = initial_nodes.iter().map(StateVector::fingerprint).collect();

        Ok(Self {
            model_type: model.model_type,
            config,
            constants,
            queried: StateVector::new(&registry),
            successors: Successors::new(&registry),
            registry,
            actions,
            system,
            self_loop_slot,
            initial_nodes,
            initial_fingerprints,
            expressions: Vec::new(),
            extensions: Vec::new(),
            source: Source::System,
            state: true,
            deadlock: false,
        })
    }

    /// System initial nodes crossed with the global initial valuations.
    fn compute_initial_nodes(
        model: &Model,
        constants: &Constants,
        config: &ExplorerConfig,
        registry: &Arc<SlotRegistry>,
        system: &ComponentExplorer<W>,
        self_loop_slot: Option<usize>,
    ) -> ExploreResult<Vec<StateVector>> {
        let globals: Vec<&Variable> = model.variables.iter().filter(|v| !v.transient).collect();
        let predicate = initial_predicate(model.restrict_initial.as_ref(), &globals, constants)?;
        let enum_vars: Vec<EnumVariable> = globals.iter().map(|v| EnumVariable::from(*v)).collect();
        let valuations = enumerate(&predicate, &enum_vars, config.initial_enumerator)?;
        let global_slots = globals
            .iter()
            .map(|v| {
                registry
                    .global(&v.name)
                    .ok_or_else(|| ExploreError::UnknownVariable(v.name.clone()))
            })
            .collect::<ExploreResult<Vec<_>>>()?;

        let mut nodes = Vec::with_capacity(system.initial_nodes().len() * valuations.len());
        for system_node in system.initial_nodes() {
            for values in &valuations {
                let mut node = system_node.clone();
                for (slot, value) in global_slots.iter().zip(values) {
                    node.set(*slot, *value);
                }
                if let Some(slot) = self_loop_slot {
                    node.set(slot, Value::bool(false));
                }
                node.unmark();
                nodes.push(node);
            }
        }
        Ok(nodes)
    }

    pub fn add_extension(&mut self, extension: impl ExplorerExtension<W> + 'static) {
        self.extensions.push(Box::new(extension));
    }

    /// Install a [`ProbabilitySumCheck`] with the configured tolerance.
    pub fn check_probability_sums(&mut self) -> Arc<ProbabilitySumReport> {
        let check = ProbabilitySumCheck::new(self.config.probability_tolerance);
        let report = check.report();
        self.add_extension(check);
        report
    }

    pub fn registry(&self) -> &Arc<SlotRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &ExplorerConfig {
        &self.config
    }

    pub fn initial_nodes(&self) -> &[StateVector] {
        &self.initial_nodes
    }

    /// Compute the successors of `node`.
    pub fn query(&mut self, node: &StateVector) -> ExploreResult<()> {
        self.queried.copy_from(node);
        self.queried.unmark();
        self.successors.clear();
        self.deadlock = false;

        if let Some(slot) = self.self_loop_slot {
            if self.queried.get(slot) == Value::bool(true) {
                let succ = self.successors.begin();
                succ.copy_from(&self.queried);
                succ.set(slot, Value::bool(false));
                self.successors.commit(W::one(), SILENT);
                self.source = Source::Root;
                self.state = false;
                for extension in &mut self.extensions {
                    extension.handle_self_loop(&self.queried);
                }
                trace!(state = %self.queried, "resolved pending self-loop");
                return Ok(());
            }
        }

        for extension in &mut self.extensions {
            extension.before_query(&self.queried);
        }
        self.system.apply_location_values(&mut self.queried)?;
        self.system.query(&self.queried, &mut self.extensions)?;
        for extension in &mut self.extensions {
            extension.after_query(&self.queried);
        }

        let nondet = self.model_type.is_nondet();
        self.state = !nondet || self.system.is_state_query();
        self.source = Source::System;
        let count = self.system.num_successors();
        trace!(successors = count, state = self.state, "queried node");
        if count > 0 {
            return Ok(());
        }

        self.deadlock = true;
        if !self.config.fix_deadlocks {
            return Err(ExploreError::Deadlock {
                state: self.queried.clone(),
            });
        }
        debug!(state = %self.queried, "fixing deadlock with a self-loop");
        let succ = self.successors.begin();
        succ.copy_from(&self.queried);
        match self.self_loop_slot {
            Some(slot) => {
                succ.set(slot, Value::bool(true));
                let weight = if self.model_type.is_two_layer() {
                    W::zero()
                } else {
                    W::one()
                };
                self.successors.commit(weight, SILENT);
                for extension in &mut self.extensions {
                    extension.handle_no_successors(&self.queried);
                }
            }
            None => self.successors.commit(W::one(), SILENT),
        }
        self.source = Source::Root;
        Ok(())
    }

    #[inline]
    pub fn num_successors(&self) -> usize {
        match self.source {
            Source::System => self.system.num_successors(),
            Source::Root => self.successors.len(),
        }
    }

    #[inline]
    pub fn successor(&self, i: usize) -> &StateVector {
        match self.source {
            Source::System => self.system.successor(i),
            Source::Root => self.successors.node(i),
        }
    }

    #[inline]
    pub fn weight(&self, i: usize) -> &W {
        match self.source {
            Source::System => self.system.weight(i),
            Source::Root => self.successors.weight(i),
        }
    }

    #[inline]
    pub fn label(&self, i: usize) -> ActionId {
        match self.source {
            Source::System => self.system.label(i),
            Source::Root => self.successors.label(i),
        }
    }

    /// Whether the last queried node was a state.
    pub fn is_state_query(&self) -> bool {
        self.state
    }

    /// Whether `node` is a state rather than a pending choice or self-loop.
    pub fn is_state(&self, node: &StateVector) -> bool {
        if let Some(slot) = self.self_loop_slot {
            if node.get(slot) == Value::bool(true) {
                return false;
            }
        }
        !self.model_type.is_nondet() || self.system.is_state(node)
    }

    /// Name of an action, `None` for silent.
    pub fn action_name(&self, action: ActionId) -> Option<&str> {
        self.actions.name(action)
    }

    pub fn action_id(&self, name: Option<&str>) -> ExploreResult<ActionId> {
        self.actions.id(name)
    }

    fn find_slot(&self, name: &str) -> ExploreResult<usize> {
        self.registry
            .global(name)
            .or_else(|| {
                self.registry
                    .slots()
                    .iter()
                    .position(|s| s.name.to_string() == name)
            })
            .ok_or_else(|| ExploreError::UnknownVariable(name.to_string()))
    }

    pub fn graph_property(&self, property: GraphProperty) -> PropertyValue<W> {
        match property {
            GraphProperty::Semantics => PropertyValue::Semantics(self.model_type),
        }
    }

    /// Index of the compiled evaluator for `expr`, compiling it on first use.
    fn expression_index(&mut self, expr: &Expr) -> ExploreResult<usize> {
        Ok(match self.expressions.iter().position(|(e, _)| e == expr) {
            Some(idx) => idx,
            None => {
                let evaluator =
                    VariableScope::global(&self.registry, &self.constants).evaluator(expr)?;
                debug!(expression = %expr, "compiled node property");
                self.expressions.push((expr.clone(), evaluator));
                self.expressions.len() - 1
            }
        })
    }

    /// Property of the last queried node.
    pub fn node_property(&mut self, property: &NodeProperty) -> ExploreResult<PropertyValue<W>> {
        Ok(match property {
            NodeProperty::State => PropertyValue::Bool(self.state),
            NodeProperty::Initial => PropertyValue::Bool(
                self.initial_fingerprints
                    .contains(&self.queried.fingerprint()),
            ),
            NodeProperty::Variable(name) => {
                PropertyValue::Value(self.queried.get(self.find_slot(name)?))
            }
            NodeProperty::Deadlock => PropertyValue::Bool(self.deadlock),
            NodeProperty::Expression(expr) => {
                let idx = self.expression_index(expr)?;
                PropertyValue::Value(self.expressions[idx].1.evaluate(self.queried.values())?)
            }
        })
    }

    /// Property of successor `i` of the last query.
    pub fn edge_property(&self, i: usize, property: &EdgeProperty) -> ExploreResult<PropertyValue<W>> {
        Ok(match property {
            EdgeProperty::Weight => PropertyValue::Weight(self.weight(i).clone()),
            EdgeProperty::Label => PropertyValue::Label(self.label(i)),
            EdgeProperty::Transient(name) => {
                let slot = self.find_slot(name)?;
                if self.registry.slot(slot).is_stored() {
                    return Err(ExploreError::InvalidModel(format!(
                        "'{}' is not a transient variable",
                        name
                    )));
                }
                PropertyValue::Value(self.successor(i).get(slot))
            }
        })
    }
}
