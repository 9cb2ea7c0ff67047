//! Model graph: automata, variables, actions and the system composition.
//!
//! The explorer consumes these structures as-is. They are assumed to be
//! parsed and type-checked already; name resolution errors surface when the
//! explorer is built.

use crate::expr::Expr;

/// Semantic type of a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelType {
    /// Labelled transition system.
    Lts,
    /// Discrete-time Markov chain.
    Dtmc,
    /// Continuous-time Markov chain.
    Ctmc,
    /// Markov decision process.
    Mdp,
    /// Continuous-time Markov decision process.
    Ctmdp,
    /// Markov automaton.
    Ma,
}

impl ModelType {
    /// Whether edges denote nondeterministic alternatives.
    pub fn is_nondet(self) -> bool {
        matches!(
            self,
            ModelType::Lts | ModelType::Mdp | ModelType::Ctmdp | ModelType::Ma
        )
    }

    /// Whether destinations carry probabilities or rates.
    pub fn is_stochastic(self) -> bool {
        !matches!(self, ModelType::Lts)
    }

    /// Whether a transition is split into an edge choice and a distribution.
    pub fn is_two_layer(self) -> bool {
        self.is_nondet() && self.is_stochastic()
    }
}

/// A complete model.
#[derive(Debug, Clone)]
pub struct Model {
    pub name: String,
    pub model_type: ModelType,
    /// Declared actions. The silent action is implicit and never listed.
    pub actions: Vec<String>,
    pub constants: Vec<Constant>,
    /// Global variables.
    pub variables: Vec<Variable>,
    /// Additional restriction on initial global valuations.
    pub restrict_initial: Option<Expr>,
    pub automata: Vec<Automaton>,
    pub system: Composition,
}

/// A named constant; `value` is `None` while the constant is undefined.
#[derive(Debug, Clone)]
pub struct Constant {
    pub name: String,
    pub value: Option<Expr>,
}

/// Declared type of a variable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VarType {
    Bool,
    BoundedInt { lo: i64, hi: i64 },
    Int,
    Real,
}

impl VarType {
    /// Whether the domain is finite.
    pub fn is_bounded(&self) -> bool {
        matches!(self, VarType::Bool | VarType::BoundedInt { .. })
    }
}

/// A global or automaton-local variable.
#[derive(Debug, Clone)]
pub struct Variable {
    pub name: String,
    pub ty: VarType,
    /// Transient variables are reset every step and not part of state identity.
    pub transient: bool,
    pub initial: Option<Expr>,
}

impl Variable {
    pub fn new(name: impl Into<String>, ty: VarType) -> Self {
        Self {
            name: name.into(),
            ty,
            transient: false,
            initial: None,
        }
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, VarType::Bool)
    }

    pub fn bounded(name: impl Into<String>, lo: i64, hi: i64) -> Self {
        Self::new(name, VarType::BoundedInt { lo, hi })
    }

    pub fn with_initial(mut self, initial: Expr) -> Self {
        self.initial = Some(initial);
        self
    }

    pub fn transient(mut self) -> Self {
        self.transient = true;
        self
    }
}

/// An automaton template.
#[derive(Debug, Clone)]
pub struct Automaton {
    pub name: String,
    pub variables: Vec<Variable>,
    pub locations: Vec<Location>,
    pub initial_locations: Vec<String>,
    pub restrict_initial: Option<Expr>,
    pub edges: Vec<Edge>,
}

impl Automaton {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            variables: Vec::new(),
            locations: Vec::new(),
            initial_locations: Vec::new(),
            restrict_initial: None,
            edges: Vec::new(),
        }
    }

    pub fn with_variable(mut self, variable: Variable) -> Self {
        self.variables.push(variable);
        self
    }

    pub fn with_location(mut self, location: Location) -> Self {
        self.locations.push(location);
        self
    }

    pub fn with_initial_location(mut self, name: impl Into<String>) -> Self {
        self.initial_locations.push(name.into());
        self
    }

    pub fn with_restrict_initial(mut self, restriction: Expr) -> Self {
        self.restrict_initial = Some(restriction);
        self
    }

    pub fn with_edge(mut self, edge: Edge) -> Self {
        self.edges.push(edge);
        self
    }

    /// Index of the location with the given name.
    pub fn location_index(&self, name: &str) -> Option<usize> {
        self.locations.iter().position(|l| l.name == name)
    }
}

/// A location together with the transient values it sets.
#[derive(Debug, Clone)]
pub struct Location {
    pub name: String,
    pub transient_values: Vec<Assignment>,
}

impl Location {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transient_values: Vec::new(),
        }
    }

    pub fn with_transient_value(mut self, target: impl Into<String>, value: Expr) -> Self {
        self.transient_values.push(Assignment::new(target, value));
        self
    }
}

/// A guarded edge leaving one location.
#[derive(Debug, Clone)]
pub struct Edge {
    pub location: String,
    /// `None` is the silent action.
    pub action: Option<String>,
    pub rate: Option<Expr>,
    pub guard: Option<Expr>,
    pub destinations: Vec<Destination>,
}

impl Edge {
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            action: None,
            rate: None,
            guard: None,
            destinations: Vec::new(),
        }
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    pub fn with_rate(mut self, rate: Expr) -> Self {
        self.rate = Some(rate);
        self
    }

    pub fn with_guard(mut self, guard: Expr) -> Self {
        self.guard = Some(guard);
        self
    }

    pub fn with_destination(mut self, destination: Destination) -> Self {
        self.destinations.push(destination);
        self
    }
}

/// One probabilistic branch of an edge.
#[derive(Debug, Clone)]
pub struct Destination {
    pub location: String,
    /// `None` means probability one.
    pub probability: Option<Expr>,
    pub assignments: Vec<Assignment>,
}

impl Destination {
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            probability: None,
            assignments: Vec::new(),
        }
    }

    pub fn with_probability(mut self, probability: Expr) -> Self {
        self.probability = Some(probability);
        self
    }

    pub fn with_assignment(mut self, target: impl Into<String>, value: Expr) -> Self {
        self.assignments.push(Assignment::new(target, value));
        self
    }
}

/// `target := value`, evaluated in the source state.
#[derive(Debug, Clone)]
pub struct Assignment {
    pub target: String,
    pub value: Expr,
}

impl Assignment {
    pub fn new(target: impl Into<String>, value: Expr) -> Self {
        Self {
            target: target.into(),
            value,
        }
    }
}

/// System composition expression.
#[derive(Debug, Clone)]
pub enum Composition {
    /// A single automaton instance, by automaton name.
    Automaton(String),
    /// Binary parallel composition synchronising on the listed actions.
    Parallel {
        left: Box<Composition>,
        right: Box<Composition>,
        synchronise: Vec<String>,
    },
    /// Action renaming; unmapped actions keep their name, `None` hides.
    Rename {
        inner: Box<Composition>,
        renaming: Vec<(String, Option<String>)>,
    },
    /// N-ary synchronisation vectors over automaton instances.
    SyncVectors {
        elements: Vec<String>,
        syncs: Vec<SyncVector>,
    },
}

impl Composition {
    pub fn automaton(name: impl Into<String>) -> Self {
        Composition::Automaton(name.into())
    }

    pub fn parallel(left: Composition, right: Composition, synchronise: &[&str]) -> Self {
        Composition::Parallel {
            left: Box::new(left),
            right: Box::new(right),
            synchronise: synchronise.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn rename(inner: Composition, renaming: Vec<(String, Option<String>)>) -> Self {
        Composition::Rename {
            inner: Box::new(inner),
            renaming,
        }
    }
}

/// One synchronisation rule: per element the required action (or don't care)
/// and the resulting action (`None` is silent).
#[derive(Debug, Clone)]
pub struct SyncVector {
    pub synchronise: Vec<Option<String>>,
    pub result: Option<String>,
}

impl Model {
    pub fn new(name: impl Into<String>, model_type: ModelType, system: Composition) -> Self {
        Self {
            name: name.into(),
            model_type,
            actions: Vec::new(),
            constants: Vec::new(),
            variables: Vec::new(),
            restrict_initial: None,
            automata: Vec::new(),
            system,
        }
    }

    pub fn with_action(mut self, name: impl Into<String>) -> Self {
        self.actions.push(name.into());
        self
    }

    pub fn with_constant(mut self, name: impl Into<String>, value: Option<Expr>) -> Self {
        self.constants.push(Constant {
            name: name.into(),
            value,
        });
        self
    }

    pub fn with_variable(mut self, variable: Variable) -> Self {
        self.variables.push(variable);
        self
    }

    pub fn with_restrict_initial(mut self, restriction: Expr) -> Self {
        self.restrict_initial = Some(restriction);
        self
    }

    pub fn with_automaton(mut self, automaton: Automaton) -> Self {
        self.automata.push(automaton);
        self
    }

    pub fn automaton(&self, name: &str) -> Option<&Automaton> {
        self.automata.iter().find(|a| a.name == name)
    }

    /// Names of constants without a value.
    pub fn undefined_constants(&self) -> Vec<&str> {
        self.constants
            .iter()
            .filter(|c| c.value.is_none())
            .map(|c| c.name.as_str())
            .collect()
    }
}
