//! A small CI driver demonstrating `taskli`: a command tree with inherited
//! options, dispatching into a DAG of build tasks.

use std::rc::Rc;
use std::sync::Arc;

use colored::Colorize;
use taskli::command::{CommandFn, ProgramNode};
use taskli::context::Signal;
use taskli::dag::{Graph, TaskMap};
use taskli::error::Error;
use taskli::option::Opt;
use taskli::value::OptionKind;
use taskli::Fli;

fn main() {
    let mut app = Fli::new("ci", "0.1.0", "a tiny continuous-integration driver");

    let verbose = Opt::new("verbose", OptionKind::Bool);
    verbose.borrow_mut().add_alias("v").set_description("Print each task as it runs");
    app.add_option(verbose);

    app.with_help("help").unwrap();

    let build = app.command("build", "compile, lint, and package the project");
    let jobs = Opt::new("jobs", OptionKind::Int);
    jobs.borrow_mut()
        .add_alias("j")
        .set_description("Maximum number of tasks to run at once")
        .set_default_string("4");
    ProgramNode::add_option(&build, jobs);

    let dot = Opt::new("dot", OptionKind::Bool);
    dot.borrow_mut().set_description("Print the task graph as GraphViz dot instead of running it");
    ProgramNode::add_option(&build, dot);

    build.borrow_mut().set_callback(build_callback());

    let deploy = app.command("deploy", "build, then publish the package");
    deploy.borrow_mut().set_callback(deploy_callback());

    let code = app.run(std::env::args().skip(1).collect());
    std::process::exit(code);
}

fn build_graph(jobs: i64) -> Graph {
    let mut tasks = TaskMap::new();
    let compile = tasks.add(
        "compile",
        Some(Arc::new(|_ctx, _view, _args| {
            println!("{}", "compiling...".cyan());
            Ok(Signal::Done)
        })),
    );
    let lint = tasks.add(
        "lint",
        Some(Arc::new(|_ctx, _view, _args| {
            println!("{}", "linting...".cyan());
            Ok(Signal::Done)
        })),
    );
    let package = tasks.add(
        "package",
        Some(Arc::new(|_ctx, _view, _args| {
            println!("{}", "packaging...".cyan());
            Ok(Signal::Done)
        })),
    );

    let mut graph = Graph::new("build");
    graph.set_max_parallel(jobs.max(1) as usize);
    graph.add_task(Arc::clone(&compile), 0);
    graph.add_task(Arc::clone(&lint), 0);
    graph.add_task(Arc::clone(&package), 0);
    graph.task_depends_on("package", "compile");
    graph.task_depends_on("package", "lint");
    graph
}

fn build_callback() -> CommandFn {
    Rc::new(|ctx, view, _args| {
        let jobs = view.get("jobs").and_then(|v| v.as_int()).unwrap_or(4);
        let mut graph = build_graph(jobs);

        if view.called("dot") {
            print!("{}", graph.dot());
            return Ok(Signal::Done);
        }

        match graph.run(ctx.cancel_handle()) {
            Ok(()) => {
                println!("{}", "build finished".green());
                Ok(Signal::Done)
            }
            Err(e) => Err(Error::Internal(format!("build failed: {e}"))),
        }
    })
}

fn deploy_callback() -> CommandFn {
    Rc::new(|ctx, view, args| {
        let jobs = view.get("jobs").and_then(|v| v.as_int()).unwrap_or(4);
        let mut graph = build_graph(jobs);
        graph.add_task(
            TaskMap::new().add(
                "publish",
                Some(Arc::new(|_ctx, _view, _args| {
                    println!("{}", "publishing...".green());
                    Ok(Signal::Done)
                })),
            ),
            0,
        );
        graph.task_depends_on("publish", "package");

        let _ = args;
        match graph.run(ctx.cancel_handle()) {
            Ok(()) => {
                println!("{}", "deploy finished".green());
                Ok(Signal::Done)
            }
            Err(e) => Err(Error::Internal(format!("deploy failed: {e}"))),
        }
    })
}
