//! Scenarios S4-S6 from spec.md §8, spanning the program tree, parser, and
//! DAG runner together.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::context::Signal;
use crate::dag::{Graph, Task, TaskMap};
use crate::error::Error;

fn task(id: &str, f: impl Fn() -> crate::error::Result<Signal> + Send + Sync + 'static) -> Arc<Task> {
    let mut map = TaskMap::new();
    map.add(id, Some(Arc::new(move |_ctx, _view, _args| f())))
}

#[test]
fn s4_dag_parallel_respects_dependency_order() {
    // t1 -> {t2, t3}; t2 -> t4; t3 -> t4; t4 -> t5; t6 -> {t2, t8}; t7 -> t5
    let order: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let mut g = Graph::new("s4");

    let ids = ["t1", "t2", "t3", "t4", "t5", "t6", "t7", "t8"];
    for id in ids {
        let order = Arc::clone(&order);
        let id_owned = id.to_string();
        g.add_task(
            task(id, move || {
                order.lock().unwrap().push(id_owned.clone());
                Ok(Signal::Done)
            }),
            0,
        );
    }
    g.task_depends_on("t1", "t2");
    g.task_depends_on("t1", "t3");
    g.task_depends_on("t2", "t4");
    g.task_depends_on("t3", "t4");
    g.task_depends_on("t4", "t5");
    g.task_depends_on("t6", "t2");
    g.task_depends_on("t6", "t8");
    g.task_depends_on("t7", "t5");

    g.run(Arc::new(AtomicBool::new(false))).unwrap();

    let seen = order.lock().unwrap().clone();
    let pos = |id: &str| seen.iter().position(|s| s == id).unwrap();

    assert!(pos("t5") < pos("t4"));
    assert!(pos("t8") < pos("t4"));
    assert!(pos("t5") < pos("t7"));
    assert!(pos("t4") < pos("t2"));
    assert!(pos("t7") < pos("t2"));
    assert!(pos("t4") < pos("t3"));
    assert!(pos("t2") < pos("t1"));
    assert!(pos("t3") < pos("t1"));
    assert!(pos("t2") < pos("t6"));
    assert!(pos("t8") < pos("t6"));
}

#[test]
fn s5_skip_parents_stops_dependents_without_error() {
    let ran: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let mut g = Graph::new("s5");

    let make = |id: &str, ran: Arc<Mutex<Vec<String>>>, signal: Signal| {
        let id_owned = id.to_string();
        task(id, move || {
            ran.lock().unwrap().push(id_owned.clone());
            Ok(signal)
        })
    };

    g.add_task(make("t5", Arc::clone(&ran), Signal::Done), 0);
    g.add_task(make("t8", Arc::clone(&ran), Signal::Done), 0);
    g.add_task(make("t4", Arc::clone(&ran), Signal::SkipParents), 0);
    g.add_task(make("t2", Arc::clone(&ran), Signal::Done), 0);
    g.add_task(make("t3", Arc::clone(&ran), Signal::Done), 0);
    g.add_task(make("t1", Arc::clone(&ran), Signal::Done), 0);
    g.add_task(make("t6", Arc::clone(&ran), Signal::Done), 0);
    g.add_task(make("t7", Arc::clone(&ran), Signal::Done), 0);

    g.task_depends_on("t1", "t2");
    g.task_depends_on("t1", "t3");
    g.task_depends_on("t2", "t4");
    g.task_depends_on("t3", "t4");
    g.task_depends_on("t4", "t5");
    g.task_depends_on("t6", "t2");
    g.task_depends_on("t6", "t8");
    g.task_depends_on("t7", "t5");

    let result = g.run(Arc::new(AtomicBool::new(false)));
    assert!(result.is_ok());

    let mut seen = ran.lock().unwrap().clone();
    seen.sort();
    assert_eq!(seen, vec!["t4".to_string(), "t5".to_string(), "t7".to_string(), "t8".to_string()]);
}

#[test]
fn s6_dot_emission_matches_declaration_order() {
    let mut g = Graph::new("s4");
    let noop = || Ok(Signal::Done);
    for id in ["t1", "t2", "t3", "t4", "t5", "t6", "t7", "t8"] {
        g.add_task(task(id, noop), 0);
    }
    g.task_depends_on("t1", "t2");
    g.task_depends_on("t1", "t3");
    g.task_depends_on("t2", "t4");
    g.task_depends_on("t3", "t4");
    g.task_depends_on("t4", "t5");
    g.task_depends_on("t6", "t2");
    g.task_depends_on("t6", "t8");
    g.task_depends_on("t7", "t5");

    let dot = g.dot();
    let expected = "digraph G {\n  label=\"s4\";\n  rankdir=TB;\n  \"t1\";\n  \"t2\";\n  \"t3\";\n  \"t4\";\n  \"t5\";\n  \"t6\";\n  \"t7\";\n  \"t8\";\n  \"t1\" -> \"t2\";\n  \"t1\" -> \"t3\";\n  \"t2\" -> \"t4\";\n  \"t3\" -> \"t4\";\n  \"t4\" -> \"t5\";\n  \"t6\" -> \"t2\";\n  \"t6\" -> \"t8\";\n  \"t7\" -> \"t5\";\n}\n";
    assert_eq!(dot, expected);
}

#[test]
fn cli_command_builds_and_runs_a_graph() {
    use crate::option::Opt;
    use crate::value::OptionKind;
    use crate::Fli;

    let ran = Arc::new(AtomicUsize::new(0));
    let ran2 = Arc::clone(&ran);

    let mut app = Fli::new("ci", "1.0.0", "ci driver");
    app.add_option(Opt::new("jobs", OptionKind::Int));
    app.set_callback(std::rc::Rc::new(move |ctx, view, _args| {
        let jobs = view.get("jobs").and_then(|v| v.as_int()).unwrap_or(1) as usize;
        let mut g = Graph::new("build");
        g.set_max_parallel(jobs);
        let ran3 = Arc::clone(&ran2);
        g.add_task(task("compile", move || {
            ran3.fetch_add(1, Ordering::SeqCst);
            Ok(Signal::Done)
        }), 0);
        match g.run(ctx.cancel_handle()) {
            Ok(()) => Ok(Signal::Done),
            Err(_) => Err(Error::Internal("build failed".to_string())),
        }
    }));

    let code = app.run(vec!["--jobs".to_string(), "2".to_string()]);
    assert_eq!(code, 0);
    assert_eq!(ran.load(Ordering::SeqCst), 1);
}
