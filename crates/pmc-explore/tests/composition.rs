//! Parallel composition, renaming and synchronisation vectors.

mod common;

use common::{branch, edge, increment, init_tracing, looping, reachable};
use num_rational::BigRational;
use pmc_eval::{Interval, Value};
use pmc_explore::{ExploreError, Explorer, ExplorerConfig, SILENT};
use pmc_model::{Composition, Destination, Expr, Model, ModelType, SyncVector, Variable};
use std::collections::HashSet;

/// A increments `x` on `a`; B splits `a` into 0.3 and 0.7.
fn synchronised_pair(model_type: ModelType) -> Model {
    let a = looping("A").with_edge(
        edge(Some("a"), vec![increment("x")]).with_guard(Expr::lt(Expr::ident("x"), Expr::int(3))),
    );
    let b = looping("B").with_edge(edge(Some("a"), vec![branch(0.3), branch(0.7)]));
    Model::new(
        "pair",
        model_type,
        Composition::parallel(Composition::automaton("A"), Composition::automaton("B"), &["a"]),
    )
    .with_action("a")
    .with_variable(Variable::bounded("x", 0, 3).with_initial(Expr::int(0)))
    .with_automaton(a)
    .with_automaton(b)
}

#[test]
fn synchronised_step_multiplies_weights() {
    init_tracing();
    let model = synchronised_pair(ModelType::Dtmc);
    let mut explorer: Explorer = Explorer::new(&model, ExplorerConfig::default()).unwrap();
    let x = explorer.registry().global("x").unwrap();
    let a = explorer.action_id(Some("a")).unwrap();

    let init = explorer.initial_nodes()[0].clone();
    explorer.query(&init).unwrap();
    assert_eq!(explorer.num_successors(), 2);
    assert_eq!(*explorer.weight(0), 0.3);
    assert_eq!(*explorer.weight(1), 0.7);
    for i in 0..2 {
        assert_eq!(explorer.label(i), a);
        assert_eq!(explorer.successor(i).get(x), Value::int(1));
    }
}

#[test]
fn exact_and_interval_weights() {
    let model = synchronised_pair(ModelType::Dtmc);

    let mut exact: Explorer<BigRational> = Explorer::new(&model, ExplorerConfig::default()).unwrap();
    let init = exact.initial_nodes()[0].clone();
    exact.query(&init).unwrap();
    let three_tenths = BigRational::new(3.into(), 10.into());
    let seven_tenths = BigRational::new(7.into(), 10.into());
    assert_eq!(exact.weight(0), &three_tenths);
    assert_eq!(exact.weight(1), &seven_tenths);

    let mut interval: Explorer<Interval> = Explorer::new(&model, ExplorerConfig::default()).unwrap();
    interval.query(&init).unwrap();
    assert!(interval.weight(0).contains(0.3));
    assert!(interval.weight(1).contains(0.7));
}

#[test]
fn conflicting_writes_fail_the_query() {
    let a = looping("A").with_edge(edge(
        Some("a"),
        vec![Destination::new("l").with_assignment("x", Expr::int(1))],
    ));
    let b = looping("B").with_edge(edge(
        Some("a"),
        vec![Destination::new("l").with_assignment("x", Expr::int(2))],
    ));
    let model = Model::new(
        "conflict",
        ModelType::Dtmc,
        Composition::parallel(Composition::automaton("A"), Composition::automaton("B"), &["a"]),
    )
    .with_action("a")
    .with_variable(Variable::bounded("x", 0, 3).with_initial(Expr::int(0)))
    .with_automaton(a)
    .with_automaton(b);
    let mut explorer: Explorer = Explorer::new(&model, ExplorerConfig::default()).unwrap();
    let init = explorer.initial_nodes()[0].clone();
    let err = explorer.query(&init).unwrap_err();
    assert!(matches!(err, ExploreError::MultipleWrite { slot } if slot == "x"));
}

#[test]
fn equal_writes_merge() {
    let write_one = || {
        edge(
            Some("a"),
            vec![Destination::new("l").with_assignment("x", Expr::int(1))],
        )
    };
    let model = Model::new(
        "agree",
        ModelType::Dtmc,
        Composition::parallel(Composition::automaton("A"), Composition::automaton("B"), &["a"]),
    )
    .with_action("a")
    .with_variable(Variable::bounded("x", 0, 3).with_initial(Expr::int(0)))
    .with_automaton(looping("A").with_edge(write_one()))
    .with_automaton(looping("B").with_edge(write_one()));
    let mut explorer: Explorer = Explorer::new(&model, ExplorerConfig::default()).unwrap();
    let init = explorer.initial_nodes()[0].clone();
    explorer.query(&init).unwrap();
    assert_eq!(explorer.num_successors(), 1);
    let x = explorer.registry().global("x").unwrap();
    assert_eq!(explorer.successor(0).get(x), Value::int(1));
}

#[test]
fn unsynchronised_actions_interleave() {
    let a = looping("A").with_edge(edge(Some("a"), vec![increment("x")]));
    let b = looping("B").with_edge(edge(Some("b"), vec![increment("y")]));
    let model = Model::new(
        "interleave",
        ModelType::Lts,
        Composition::parallel(Composition::automaton("A"), Composition::automaton("B"), &[]),
    )
    .with_action("a")
    .with_action("b")
    .with_variable(Variable::bounded("x", 0, 3).with_initial(Expr::int(0)))
    .with_variable(Variable::bounded("y", 0, 3).with_initial(Expr::int(0)))
    .with_automaton(a)
    .with_automaton(b);
    let mut explorer: Explorer = Explorer::new(&model, ExplorerConfig::default()).unwrap();
    let (x, y) = (
        explorer.registry().global("x").unwrap(),
        explorer.registry().global("y").unwrap(),
    );
    let init = explorer.initial_nodes()[0].clone();
    explorer.query(&init).unwrap();
    assert_eq!(explorer.num_successors(), 2);
    assert_eq!(explorer.label(0), explorer.action_id(Some("a")).unwrap());
    assert_eq!(explorer.successor(0).get(x), Value::int(1));
    assert_eq!(explorer.successor(0).get(y), Value::int(0));
    assert_eq!(explorer.label(1), explorer.action_id(Some("b")).unwrap());
    assert_eq!(explorer.successor(1).get(x), Value::int(0));
    assert_eq!(explorer.successor(1).get(y), Value::int(1));
    assert_eq!(*explorer.weight(1), 1.0);
}

#[test]
fn identity_renaming_changes_nothing() {
    let model = synchronised_pair(ModelType::Mdp);
    let mut renamed_model = model.clone();
    renamed_model.system = Composition::rename(model.system.clone(), Vec::new());
    let config = ExplorerConfig {
        fix_deadlocks: true,
        ..Default::default()
    };

    let mut direct: Explorer = Explorer::new(&model, config.clone()).unwrap();
    let mut renamed: Explorer = Explorer::new(&renamed_model, config).unwrap();
    let direct = reachable(&mut direct).unwrap();
    let renamed = reachable(&mut renamed).unwrap();
    assert_eq!(direct.nodes, renamed.nodes);
    assert_eq!(direct.transitions, renamed.transitions);
}

#[test]
fn renaming_relabels_and_hides() {
    let automaton = looping("A")
        .with_edge(edge(Some("a"), vec![increment("x")]))
        .with_edge(edge(Some("b"), vec![increment("x")]));
    let model = Model::new(
        "rename",
        ModelType::Lts,
        Composition::rename(
            Composition::automaton("A"),
            vec![("a".to_string(), Some("c".to_string())), ("b".to_string(), None)],
        ),
    )
    .with_action("a")
    .with_action("b")
    .with_action("c")
    .with_variable(Variable::bounded("x", 0, 3).with_initial(Expr::int(0)))
    .with_automaton(automaton);
    let mut explorer: Explorer = Explorer::new(&model, ExplorerConfig::default()).unwrap();
    let init = explorer.initial_nodes()[0].clone();
    explorer.query(&init).unwrap();
    let labels: Vec<_> = (0..explorer.num_successors()).map(|i| explorer.label(i)).collect();
    assert_eq!(labels, vec![explorer.action_id(Some("c")).unwrap(), SILENT]);
}

/// A offers `a` two ways, B three ways, C moves alone on `b`.
fn vector_model(model_type: ModelType) -> Model {
    let set = |var: &str, v: i64| Destination::new("l").with_assignment(var, Expr::int(v));
    let a = looping("A")
        .with_edge(edge(Some("a"), vec![set("xa", 1)]))
        .with_edge(edge(Some("a"), vec![set("xa", 2)]));
    let b = looping("B")
        .with_edge(edge(Some("a"), vec![set("xb", 1)]))
        .with_edge(edge(Some("a"), vec![set("xb", 2)]))
        .with_edge(edge(Some("a"), vec![set("xb", 3)]));
    let c = looping("C").with_edge(edge(Some("b"), vec![set("xc", 1)]));
    let syncs = vec![
        SyncVector {
            synchronise: vec![Some("a".to_string()), Some("a".to_string()), None],
            result: Some("c".to_string()),
        },
        SyncVector {
            synchronise: vec![None, None, Some("b".to_string())],
            result: Some("b".to_string()),
        },
    ];
    Model::new(
        "vectors",
        model_type,
        Composition::SyncVectors {
            elements: vec!["A".to_string(), "B".to_string(), "C".to_string()],
            syncs,
        },
    )
    .with_action("a")
    .with_action("b")
    .with_action("c")
    .with_variable(Variable::bounded("xa", 0, 3).with_initial(Expr::int(0)))
    .with_variable(Variable::bounded("xb", 0, 3).with_initial(Expr::int(0)))
    .with_variable(Variable::bounded("xc", 0, 3).with_initial(Expr::int(0)))
    .with_automaton(a)
    .with_automaton(b)
    .with_automaton(c)
}

#[test]
fn sync_vector_yields_product_of_options() {
    let model = vector_model(ModelType::Lts);
    let mut explorer: Explorer = Explorer::new(&model, ExplorerConfig::default()).unwrap();
    let reg = explorer.registry().clone();
    let (xa, xb, xc) = (
        reg.global("xa").unwrap(),
        reg.global("xb").unwrap(),
        reg.global("xc").unwrap(),
    );
    let c = explorer.action_id(Some("c")).unwrap();
    let b = explorer.action_id(Some("b")).unwrap();

    let init = explorer.initial_nodes()[0].clone();
    explorer.query(&init).unwrap();
    assert_eq!(explorer.num_successors(), 7);

    let mut combos = HashSet::new();
    for i in 0..6 {
        assert_eq!(explorer.label(i), c);
        assert_eq!(*explorer.weight(i), 1.0);
        let succ = explorer.successor(i);
        assert_eq!(succ.get(xc), Value::int(0));
        combos.insert((succ.get(xa), succ.get(xb)));
    }
    assert_eq!(combos.len(), 6);

    assert_eq!(explorer.label(6), b);
    assert_eq!(explorer.successor(6).get(xa), Value::int(0));
    assert_eq!(explorer.successor(6).get(xc), Value::int(1));
}

#[test]
fn two_layer_sync_vectors_resolve_jointly() {
    let a = looping("A").with_edge(edge(Some("a"), vec![branch(0.5), branch(0.5)]));
    let b = looping("B").with_edge(edge(Some("a"), vec![branch(0.2), branch(0.8)]));
    let model = Model::new(
        "joint",
        ModelType::Mdp,
        Composition::SyncVectors {
            elements: vec!["A".to_string(), "B".to_string()],
            syncs: vec![SyncVector {
                synchronise: vec![Some("a".to_string()), Some("a".to_string())],
                result: Some("c".to_string()),
            }],
        },
    )
    .with_action("a")
    .with_action("c")
    .with_automaton(a)
    .with_automaton(b);
    let mut explorer: Explorer = Explorer::new(&model, ExplorerConfig::default()).unwrap();

    let init = explorer.initial_nodes()[0].clone();
    explorer.query(&init).unwrap();
    assert!(explorer.is_state_query());
    assert_eq!(explorer.num_successors(), 1);
    assert_eq!(*explorer.weight(0), 0.0);
    assert_eq!(explorer.label(0), explorer.action_id(Some("c")).unwrap());

    let choice = explorer.successor(0).clone();
    assert!(!explorer.is_state(&choice));
    explorer.query(&choice).unwrap();
    assert!(!explorer.is_state_query());
    let weights: Vec<f64> = (0..explorer.num_successors()).map(|i| *explorer.weight(i)).collect();
    assert_eq!(weights, vec![0.1, 0.1, 0.4, 0.4]);
    for i in 0..4 {
        assert_eq!(explorer.label(i), SILENT);
        assert!(explorer.is_state(explorer.successor(i)));
    }
}

#[test]
fn malformed_sync_vectors_are_rejected() {
    let mut model = vector_model(ModelType::Lts);
    model.system = Composition::SyncVectors {
        elements: vec!["A".to_string(), "B".to_string(), "C".to_string()],
        syncs: vec![SyncVector {
            synchronise: vec![Some("a".to_string())],
            result: None,
        }],
    };
    let err = Explorer::<f64>::new(&model, ExplorerConfig::default()).unwrap_err();
    assert!(matches!(err, ExploreError::InvalidModel(_)));

    model.system = Composition::SyncVectors {
        elements: vec!["A".to_string(), "B".to_string(), "C".to_string()],
        syncs: vec![SyncVector {
            synchronise: vec![None, None, None],
            result: None,
        }],
    };
    let err = Explorer::<f64>::new(&model, ExplorerConfig::default()).unwrap_err();
    assert!(matches!(err, ExploreError::InvalidModel(_)));
}
