//! Two-layer encoding, deadlock policy, initial states, properties and
//! extensions.

mod common;

use common::{branch, edge, increment, init_tracing, looping, reachable};
use pmc_eval::Value;
use pmc_explore::{
    AutomatonExplorer, EdgeProperty, EnumeratorKind, ExploreError, Explorer, ExplorerConfig,
    ExplorerExtension, NodeProperty, PropertyValue, StateVector, SILENT,
};
use pmc_model::{
    Automaton, Composition, Destination, Edge, Expr, Location, Model, ModelType, VarType, Variable,
};
use std::sync::{Arc, Mutex};

fn fixing() -> ExplorerConfig {
    ExplorerConfig {
        fix_deadlocks: true,
        ..Default::default()
    }
}

/// Two coins flipped in parallel, each counting its heads up to two.
fn coins(model_type: ModelType) -> Model {
    let coin = |name: &str, var: &str| {
        looping(name).with_edge(
            edge(
                Some("flip"),
                vec![increment(var).with_probability(Expr::real(0.5)), branch(0.5)],
            )
            .with_guard(Expr::lt(Expr::ident(var), Expr::int(2))),
        )
    };
    Model::new(
        "coins",
        model_type,
        Composition::parallel(Composition::automaton("A"), Composition::automaton("B"), &[]),
    )
    .with_action("flip")
    .with_variable(Variable::bounded("x", 0, 2).with_initial(Expr::int(0)))
    .with_variable(Variable::bounded("y", 0, 2).with_initial(Expr::int(0)))
    .with_automaton(coin("A", "x"))
    .with_automaton(coin("B", "y"))
}

#[test]
fn two_layer_alternates_between_states_and_choices() {
    init_tracing();
    for model_type in [ModelType::Mdp, ModelType::Ma] {
        let mut explorer: Explorer = Explorer::new(&coins(model_type), fixing()).unwrap();
        let graph = reachable(&mut explorer).unwrap();
        assert!(graph.is_state.iter().any(|s| *s));
        assert!(graph.is_state.iter().any(|s| !*s));
        for (node, is_state) in graph.is_state.iter().enumerate() {
            for t in graph.outgoing(node) {
                if *is_state {
                    assert_eq!(t.weight, 0.0);
                    assert!(!graph.is_state[t.target]);
                } else {
                    assert!(t.weight > 0.0);
                    assert_eq!(t.label, SILENT);
                    assert!(graph.is_state[t.target]);
                }
            }
        }
    }
}

#[test]
fn single_layer_reaches_all_counts() {
    let mut explorer: Explorer = Explorer::new(&coins(ModelType::Dtmc), fixing()).unwrap();
    let graph = reachable(&mut explorer).unwrap();
    // (x, y) over {0, 1, 2}^2
    assert_eq!(graph.nodes.len(), 9);
    assert!(graph.is_state.iter().all(|s| *s));
    for node in 0..graph.nodes.len() {
        let total: f64 = graph.outgoing(node).map(|t| t.weight).sum();
        assert!(total > 0.0);
    }
}

fn stuck(model_type: ModelType) -> Model {
    Model::new("stuck", model_type, Composition::automaton("A"))
        .with_variable(Variable::bounded("x", 0, 1).with_initial(Expr::int(1)))
        .with_automaton(looping("A"))
}

#[test]
fn deadlock_is_an_error_by_default() {
    let mut explorer: Explorer = Explorer::new(&stuck(ModelType::Dtmc), ExplorerConfig::default()).unwrap();
    let init = explorer.initial_nodes()[0].clone();
    let err = explorer.query(&init).unwrap_err();
    match err {
        ExploreError::Deadlock { state } => assert_eq!(state, init),
        other => panic!("expected deadlock, got {other:?}"),
    }
}

#[test]
fn fixed_deadlock_loops_on_itself() {
    let mut explorer: Explorer = Explorer::new(&stuck(ModelType::Dtmc), fixing()).unwrap();
    let init = explorer.initial_nodes()[0].clone();
    explorer.query(&init).unwrap();
    assert_eq!(explorer.num_successors(), 1);
    assert_eq!(explorer.successor(0), &init);
    assert_eq!(*explorer.weight(0), 1.0);
    assert_eq!(explorer.label(0), SILENT);
    assert_eq!(
        explorer.node_property(&NodeProperty::Deadlock).unwrap(),
        PropertyValue::Bool(true)
    );
}

#[derive(Clone, Default)]
struct Journal(Arc<Mutex<Vec<&'static str>>>);

impl Journal {
    fn take(&self) -> Vec<&'static str> {
        std::mem::take(&mut *self.0.lock().unwrap())
    }
}

impl ExplorerExtension<f64> for Journal {
    fn before_query(&mut self, _node: &StateVector) {
        self.0.lock().unwrap().push("before");
    }

    fn after_query(&mut self, _node: &StateVector) {
        self.0.lock().unwrap().push("after");
    }

    fn handle_no_successors(&mut self, _node: &StateVector) {
        self.0.lock().unwrap().push("no-successors");
    }

    fn handle_self_loop(&mut self, _node: &StateVector) {
        self.0.lock().unwrap().push("self-loop");
    }
}

#[test]
fn nondeterministic_deadlock_takes_two_steps() {
    for (model_type, weight) in [(ModelType::Mdp, 0.0), (ModelType::Lts, 1.0)] {
        let mut explorer: Explorer = Explorer::new(&stuck(model_type), fixing()).unwrap();
        let journal = Journal::default();
        explorer.add_extension(journal.clone());
        let init = explorer.initial_nodes()[0].clone();

        explorer.query(&init).unwrap();
        assert_eq!(journal.take(), vec!["before", "after", "no-successors"]);
        assert_eq!(explorer.num_successors(), 1);
        assert_eq!(*explorer.weight(0), weight);
        let pending = explorer.successor(0).clone();
        assert_ne!(pending, init);
        assert_ne!(pending.fingerprint(), init.fingerprint());
        assert!(!explorer.is_state(&pending));

        explorer.query(&pending).unwrap();
        assert_eq!(journal.take(), vec!["self-loop"]);
        assert!(!explorer.is_state_query());
        assert_eq!(explorer.num_successors(), 1);
        assert_eq!(explorer.successor(0), &init);
        assert_eq!(*explorer.weight(0), 1.0);
    }
}

#[test]
fn initial_states_respect_restriction() {
    let model = Model::new("init", ModelType::Dtmc, Composition::automaton("A"))
        .with_variable(Variable::bounded("x", 0, 3))
        .with_restrict_initial(Expr::ge(Expr::ident("x"), Expr::int(2)))
        .with_automaton(looping("A"));
    for kind in [EnumeratorKind::BruteForce, EnumeratorKind::Propagating] {
        let config = ExplorerConfig {
            initial_enumerator: kind,
            ..Default::default()
        };
        let explorer: Explorer = Explorer::new(&model, config).unwrap();
        let x = explorer.registry().global("x").unwrap();
        let mut values: Vec<Value> = explorer.initial_nodes().iter().map(|n| n.get(x)).collect();
        values.sort_by_key(|v| v.as_int());
        assert_eq!(values, vec![Value::int(2), Value::int(3)]);
    }
}

#[test]
fn unbounded_initial_variable_needs_an_equation() {
    let model = Model::new("init", ModelType::Dtmc, Composition::automaton("A"))
        .with_variable(Variable::bounded("x", 0, 3))
        .with_variable(Variable::new("y", VarType::Int))
        .with_restrict_initial(Expr::and(
            Expr::eq(Expr::ident("y"), Expr::add(Expr::ident("x"), Expr::int(10))),
            Expr::le(Expr::ident("x"), Expr::int(1)),
        ))
        .with_automaton(looping("A"));

    let explorer: Explorer = Explorer::new(&model, ExplorerConfig::default()).unwrap();
    let y = explorer.registry().global("y").unwrap();
    let mut ys: Vec<i64> = explorer
        .initial_nodes()
        .iter()
        .filter_map(|n| n.get(y).as_int())
        .collect();
    ys.sort_unstable();
    assert_eq!(ys, vec![10, 11]);

    let config = ExplorerConfig {
        initial_enumerator: EnumeratorKind::BruteForce,
        ..Default::default()
    };
    let err = Explorer::<f64>::new(&model, config).unwrap_err();
    assert!(matches!(err, ExploreError::UnboundedInitialVariable { variable } if variable == "y"));
}

#[test]
fn initial_locations_cross_local_valuations() {
    let automaton = Automaton::new("A")
        .with_variable(Variable::boolean("b"))
        .with_location(Location::new("l0"))
        .with_location(Location::new("l1"))
        .with_initial_location("l0")
        .with_initial_location("l1")
        .with_edge(Edge::new("l0").with_destination(Destination::new("l1")))
        .with_edge(Edge::new("l1").with_destination(Destination::new("l0")));
    let model = Model::new("locs", ModelType::Dtmc, Composition::automaton("A")).with_automaton(automaton);
    let explorer: Explorer = Explorer::new(&model, ExplorerConfig::default()).unwrap();
    // two locations times an unconstrained boolean
    assert_eq!(explorer.initial_nodes().len(), 4);
}

#[test]
fn transient_values_are_edge_properties() {
    let automaton = Automaton::new("A")
        .with_location(Location::new("l").with_transient_value("r", Expr::int(7)))
        .with_initial_location("l")
        .with_edge(edge(None, vec![increment("x")]).with_guard(Expr::lt(Expr::ident("x"), Expr::int(3))));
    let model = Model::new("reward", ModelType::Dtmc, Composition::automaton("A"))
        .with_variable(Variable::bounded("x", 0, 3).with_initial(Expr::int(0)))
        .with_variable(Variable::new("r", VarType::Int).transient().with_initial(Expr::int(0)))
        .with_automaton(automaton);
    let mut explorer: Explorer = Explorer::new(&model, ExplorerConfig::default()).unwrap();
    let init = explorer.initial_nodes()[0].clone();
    assert_eq!(init.get(explorer.registry().global("r").unwrap()), Value::int(0));

    explorer.query(&init).unwrap();
    assert_eq!(
        explorer
            .edge_property(0, &EdgeProperty::Transient("r".into()))
            .unwrap(),
        PropertyValue::Value(Value::int(7))
    );
    assert_eq!(
        explorer
            .node_property(&NodeProperty::Variable("r".into()))
            .unwrap(),
        PropertyValue::Value(Value::int(7))
    );
    let err = explorer
        .edge_property(0, &EdgeProperty::Transient("x".into()))
        .unwrap_err();
    assert!(matches!(err, ExploreError::InvalidModel(_)));
    let err = explorer
        .node_property(&NodeProperty::Variable("nope".into()))
        .unwrap_err();
    assert!(matches!(err, ExploreError::UnknownVariable(_)));
}

#[test]
fn location_values_of_both_sides_reach_every_successor() {
    let writer = |name: &str, target: &str, v: i64, action: &str| {
        Automaton::new(name)
            .with_location(Location::new("l").with_transient_value(target, Expr::int(v)))
            .with_initial_location("l")
            .with_edge(edge(Some(action), vec![branch(1.0)]))
    };
    let model = Model::new(
        "rewards",
        ModelType::Dtmc,
        Composition::parallel(Composition::automaton("A"), Composition::automaton("B"), &[]),
    )
    .with_action("a")
    .with_action("b")
    .with_variable(Variable::new("r1", VarType::Int).transient().with_initial(Expr::int(0)))
    .with_variable(Variable::new("r2", VarType::Int).transient().with_initial(Expr::int(0)))
    .with_automaton(writer("A", "r1", 1, "a"))
    .with_automaton(writer("B", "r2", 2, "b"));
    let mut explorer: Explorer = Explorer::new(&model, ExplorerConfig::default()).unwrap();
    let init = explorer.initial_nodes()[0].clone();
    explorer.query(&init).unwrap();
    assert_eq!(explorer.num_successors(), 2);
    for i in 0..2 {
        assert_eq!(
            explorer
                .edge_property(i, &EdgeProperty::Transient("r1".into()))
                .unwrap(),
            PropertyValue::Value(Value::int(1))
        );
        assert_eq!(
            explorer
                .edge_property(i, &EdgeProperty::Transient("r2".into()))
                .unwrap(),
            PropertyValue::Value(Value::int(2))
        );
    }
}

#[test]
fn local_variables_are_qualified() {
    let automaton = looping("A")
        .with_variable(Variable::bounded("n", 0, 3).with_initial(Expr::int(2)))
        .with_edge(edge(None, vec![branch(1.0)]));
    let model = Model::new("local", ModelType::Dtmc, Composition::automaton("A")).with_automaton(automaton);
    let mut explorer: Explorer = Explorer::new(&model, ExplorerConfig::default()).unwrap();
    let init = explorer.initial_nodes()[0].clone();
    explorer.query(&init).unwrap();
    assert_eq!(
        explorer
            .node_property(&NodeProperty::Variable("A[0].n".into()))
            .unwrap(),
        PropertyValue::Value(Value::int(2))
    );
}

#[test]
fn out_of_range_assignment_fails() {
    let automaton = looping("A").with_edge(edge(None, vec![increment("x")]));
    let model = Model::new("overflow", ModelType::Dtmc, Composition::automaton("A"))
        .with_variable(Variable::bounded("x", 0, 1).with_initial(Expr::int(1)))
        .with_automaton(automaton);
    let mut explorer: Explorer = Explorer::new(&model, ExplorerConfig::default()).unwrap();
    let init = explorer.initial_nodes()[0].clone();
    let err = explorer.query(&init).unwrap_err();
    assert!(matches!(err, ExploreError::OutOfRange { slot, value } if slot == "x" && value == Value::int(2)));
}

#[test]
fn negative_probability_fails() {
    let automaton = looping("A").with_edge(edge(None, vec![branch(-0.5), branch(1.5)]));
    let model = Model::new("negative", ModelType::Dtmc, Composition::automaton("A")).with_automaton(automaton);
    let mut explorer: Explorer = Explorer::new(&model, ExplorerConfig::default()).unwrap();
    let init = explorer.initial_nodes()[0].clone();
    let err = explorer.query(&init).unwrap_err();
    assert!(matches!(err, ExploreError::NegativeWeight { .. }));
}

#[test]
fn zero_probability_destinations_are_skipped() {
    let automaton = looping("A").with_edge(edge(None, vec![branch(0.0), branch(1.0)]));
    let model = Model::new("zero", ModelType::Dtmc, Composition::automaton("A")).with_automaton(automaton);
    let mut explorer: Explorer = Explorer::new(&model, ExplorerConfig::default()).unwrap();
    let init = explorer.initial_nodes()[0].clone();
    explorer.query(&init).unwrap();
    assert_eq!(explorer.num_successors(), 1);
    assert_eq!(*explorer.weight(0), 1.0);
}

#[test]
fn probability_sum_deviations_are_reported() {
    let automaton = looping("A").with_edge(edge(None, vec![branch(0.5), branch(0.4)]));
    let model = Model::new("leaky", ModelType::Dtmc, Composition::automaton("A")).with_automaton(automaton);
    let mut explorer: Explorer = Explorer::new(&model, ExplorerConfig::default()).unwrap();
    let report = explorer.check_probability_sums();
    let init = explorer.initial_nodes()[0].clone();
    explorer.query(&init).unwrap();
    assert_eq!(explorer.num_successors(), 2);
    assert_eq!(report.checked(), 1);
    let deviations = report.deviations();
    assert_eq!(deviations.len(), 1);
    assert_eq!(deviations[0].automaton, "A");
    assert!((deviations[0].sum - 0.9).abs() < 1e-12);
}

#[test]
fn probability_sums_skip_edge_choices() {
    let mut explorer: Explorer = Explorer::new(&coins(ModelType::Mdp), fixing()).unwrap();
    let report = explorer.check_probability_sums();
    let init = explorer.initial_nodes()[0].clone();
    explorer.query(&init).unwrap();
    assert_eq!(report.checked(), 0);
    let choice = explorer.successor(0).clone();
    explorer.query(&choice).unwrap();
    assert_eq!(report.checked(), 1);
    assert!(report.is_ok());
}

#[test]
fn conflicting_location_values_fail() {
    let writer = |name: &str, v: i64| {
        Automaton::new(name)
            .with_location(Location::new("l").with_transient_value("r", Expr::int(v)))
            .with_initial_location("l")
            .with_edge(edge(None, vec![branch(1.0)]))
    };
    let model = Model::new(
        "rewards",
        ModelType::Dtmc,
        Composition::parallel(Composition::automaton("A"), Composition::automaton("B"), &[]),
    )
    .with_variable(Variable::new("r", VarType::Int).transient().with_initial(Expr::int(0)))
    .with_automaton(writer("A", 1))
    .with_automaton(writer("B", 2));
    let mut explorer: Explorer = Explorer::new(&model, ExplorerConfig::default()).unwrap();
    let init = explorer.initial_nodes()[0].clone();
    let err = explorer.query(&init).unwrap_err();
    assert!(matches!(err, ExploreError::MultipleWrite { slot } if slot == "r"));
}

#[derive(Clone, Default)]
struct Moves(Arc<Mutex<Vec<String>>>);

impl Moves {
    fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.0.lock().unwrap())
    }
}

impl ExplorerExtension<f64> for Moves {
    fn after_query_automaton(&mut self, automaton: &AutomatonExplorer<f64>) {
        self.0.lock().unwrap().push(automaton.name().to_string());
    }
}

#[test]
fn resolving_one_side_leaves_the_other_waiting() {
    let mut explorer: Explorer = Explorer::new(&coins(ModelType::Mdp), fixing()).unwrap();
    let moves = Moves::default();
    explorer.add_extension(moves.clone());
    let init = explorer.initial_nodes()[0].clone();

    explorer.query(&init).unwrap();
    assert_eq!(moves.take(), vec!["A", "B"]);
    let choice = explorer.successor(0).clone();

    explorer.query(&choice).unwrap();
    assert_eq!(moves.take(), vec!["A"]);
    assert!(!explorer.is_state_query());
    assert_eq!(explorer.num_successors(), 2);
    for i in 0..2 {
        assert!(explorer.is_state(explorer.successor(i)));
    }
}

#[test]
fn initial_and_expression_node_properties() {
    let automaton = looping("A").with_edge(
        edge(None, vec![increment("x")]).with_guard(Expr::lt(Expr::ident("x"), Expr::int(3))),
    );
    let model = Model::new("counter", ModelType::Dtmc, Composition::automaton("A"))
        .with_constant("N", Some(Expr::int(3)))
        .with_variable(Variable::bounded("x", 0, 3).with_initial(Expr::int(0)))
        .with_automaton(automaton);
    let mut explorer: Explorer = Explorer::new(&model, ExplorerConfig::default()).unwrap();
    let below = NodeProperty::Expression(Expr::lt(Expr::ident("x"), Expr::ident("N")));
    let next = NodeProperty::Expression(Expr::add(Expr::ident("x"), Expr::int(1)));

    let init = explorer.initial_nodes()[0].clone();
    explorer.query(&init).unwrap();
    assert_eq!(
        explorer.node_property(&NodeProperty::Initial).unwrap(),
        PropertyValue::Bool(true)
    );
    assert_eq!(
        explorer.node_property(&below).unwrap(),
        PropertyValue::Value(Value::bool(true))
    );
    assert_eq!(
        explorer.node_property(&next).unwrap(),
        PropertyValue::Value(Value::int(1))
    );

    let succ = explorer.successor(0).clone();
    explorer.query(&succ).unwrap();
    assert_eq!(
        explorer.node_property(&NodeProperty::Initial).unwrap(),
        PropertyValue::Bool(false)
    );
    assert_eq!(
        explorer.node_property(&next).unwrap(),
        PropertyValue::Value(Value::int(2))
    );

    let err = explorer
        .node_property(&NodeProperty::Expression(Expr::ident("nope")))
        .unwrap_err();
    assert!(matches!(err, ExploreError::UnknownVariable(name) if name == "nope"));
}
