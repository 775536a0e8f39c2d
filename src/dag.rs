//! The DAG task runner (component C5): a task map and graph abstraction
//! that runs task functions in parallel where dependencies allow.

use std::collections::HashMap;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use indexmap::IndexMap;

use crate::command::OptionView;
use crate::context::{Context, Signal};
use crate::error::{Error, ErrorEnvelope, Result};

/// A task function: see spec.md §6.1, the same `(ctx, option-view, args)`
/// shape the parser uses to invoke command functions.
pub type TaskFn = Arc<dyn Fn(&Context, &OptionView, &[String]) -> Result<Signal> + Send + Sync>;

/// A unit of work, identified by id, guarded by its own mutex so the same
/// `Task` can never run concurrently even if several vertices (possibly in
/// different graphs) reference it.
pub struct Task {
    id: String,
    func: Option<TaskFn>,
    mutex: Arc<Mutex<()>>,
}

impl Task {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn has_function(&self) -> bool {
        self.func.is_some()
    }
}

/// Mapping of task id to `Task`, accumulating definition-time errors rather
/// than failing eagerly (spec.md §3 `TaskMap`).
#[derive(Default)]
pub struct TaskMap {
    tasks: IndexMap<String, Arc<Task>>,
    errors: ErrorEnvelope,
}

impl TaskMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a task. Per the open question in spec.md §9, adding a
    /// duplicate id records an error but still overwrites the prior task.
    pub fn add(&mut self, id: impl Into<String>, func: Option<TaskFn>) -> Arc<Task> {
        let id = id.into();
        if id.is_empty() {
            self.errors.push(Error::TaskIdEmpty);
        }
        if func.is_none() {
            self.errors.push(Error::TaskFunctionMissing(id.clone()));
        }
        if self.tasks.contains_key(&id) {
            self.errors.push(Error::TaskDuplicate(id.clone()));
        }
        let task = Arc::new(Task {
            id: id.clone(),
            func,
            mutex: Arc::new(Mutex::new(())),
        });
        self.tasks.insert(id, Arc::clone(&task));
        task
    }

    /// Looks up a task by id. An unknown id records an error and returns a
    /// placeholder task with no function, so callers can still reference it
    /// for diagnostics (spec.md §3 `TaskMap`).
    pub fn get(&mut self, id: &str) -> Arc<Task> {
        match self.tasks.get(id) {
            Some(t) => Arc::clone(t),
            None => {
                self.errors.push(Error::TaskNotFound(id.to_string()));
                Arc::new(Task {
                    id: id.to_string(),
                    func: None,
                    mutex: Arc::new(Mutex::new(())),
                })
            }
        }
    }

    pub fn errors(&self) -> &ErrorEnvelope {
        &self.errors
    }
}

/// A vertex's scheduling state (spec.md §3 `Vertex.run-status`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Pending,
    InProgress,
    Skip,
    Done,
}

struct Vertex {
    task: Arc<Task>,
    retries: usize,
    /// Dependency ids: edges point from dependent to dependency.
    children: Vec<String>,
    parents: Vec<String>,
    status: RunStatus,
}

struct Completion {
    id: String,
    error: Option<Error>,
    skip_parents: bool,
}

/// A task map plus dependency edges, executed by a bounded-concurrency
/// scheduler (spec.md §3 `Graph`, §4.5).
pub struct Graph {
    name: String,
    tick: Duration,
    vertices: IndexMap<String, Vertex>,
    dot_vertex_lines: Vec<String>,
    dot_edge_lines: Vec<String>,
    errors: ErrorEnvelope,
    serial: bool,
    max_parallel: usize,
    buffer_output: bool,
    writer: Arc<Mutex<dyn Write + Send>>,
    color: bool,
}

impl Graph {
    pub fn new(name: impl Into<String>) -> Self {
        Graph {
            name: name.into(),
            tick: Duration::from_millis(1),
            vertices: IndexMap::new(),
            dot_vertex_lines: Vec::new(),
            dot_edge_lines: Vec::new(),
            errors: ErrorEnvelope::new(),
            serial: false,
            max_parallel: usize::MAX,
            buffer_output: false,
            writer: Arc::new(Mutex::new(std::io::stdout())),
            color: true,
        }
    }

    pub fn set_tick(&mut self, tick: Duration) -> &mut Self {
        self.tick = tick;
        self
    }

    pub fn set_serial(&mut self, serial: bool) -> &mut Self {
        self.serial = serial;
        self
    }

    pub fn set_max_parallel(&mut self, n: usize) -> &mut Self {
        self.max_parallel = n.max(1);
        self
    }

    pub fn set_buffer_output(&mut self, buffer: bool) -> &mut Self {
        self.buffer_output = buffer;
        self
    }

    pub fn set_writer(&mut self, writer: Arc<Mutex<dyn Write + Send>>) -> &mut Self {
        self.writer = writer;
        self
    }

    pub fn set_color(&mut self, color: bool) -> &mut Self {
        self.color = color;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Adds a vertex wrapping `task`. Re-adding the same id is idempotent
    /// and keeps any dependency edges already recorded for it.
    pub fn add_task(&mut self, task: Arc<Task>, retries: usize) {
        let id = task.id().to_string();
        if self.vertices.contains_key(&id) {
            return;
        }
        self.dot_vertex_lines.push(format!("  \"{id}\";"));
        self.vertices.insert(
            id,
            Vertex {
                task,
                retries,
                children: Vec::new(),
                parents: Vec::new(),
                status: RunStatus::Pending,
            },
        );
    }

    /// Records that `dependent` depends on `dependency`: `dependency` must
    /// complete before `dependent` runs. Referencing an unknown task
    /// records an error without throwing (spec.md §3 `Graph` invariants).
    pub fn task_depends_on(&mut self, dependent: &str, dependency: &str) {
        if !self.vertices.contains_key(dependent) {
            self.errors.push(Error::TaskNotFound(dependent.to_string()));
            return;
        }
        if !self.vertices.contains_key(dependency) {
            self.errors.push(Error::TaskNotFound(dependency.to_string()));
            return;
        }
        if self.vertices[dependent].children.iter().any(|c| c == dependency) {
            self.errors
                .push(Error::TaskDependencyDuplicate(dependent.to_string(), dependency.to_string()));
            return;
        }
        self.vertices.get_mut(dependent).unwrap().children.push(dependency.to_string());
        self.vertices.get_mut(dependency).unwrap().parents.push(dependent.to_string());
        self.dot_edge_lines.push(format!("  \"{dependent}\" -> \"{dependency}\";"));
    }

    /// Returns the accumulated construction errors (spec.md §4.5
    /// "Construction errors").
    pub fn validate(&self) -> ErrorEnvelope {
        self.errors.clone()
    }

    fn has_cycle(&self) -> bool {
        #[derive(Clone, Copy, PartialEq)]
        enum Color {
            White,
            Gray,
            Black,
        }
        let mut colors: HashMap<&str, Color> =
            self.vertices.keys().map(|k| (k.as_str(), Color::White)).collect();

        fn visit<'a>(
            id: &'a str,
            vertices: &'a IndexMap<String, Vertex>,
            colors: &mut HashMap<&'a str, Color>,
        ) -> bool {
            match colors.get(id) {
                Some(Color::Black) => return false,
                Some(Color::Gray) => return true,
                _ => {}
            }
            colors.insert(id, Color::Gray);
            if let Some(v) = vertices.get(id) {
                for child in &v.children {
                    if visit(child.as_str(), vertices, colors) {
                        return true;
                    }
                }
            }
            colors.insert(id, Color::Black);
            false
        }

        let ids: Vec<&str> = self.vertices.keys().map(String::as_str).collect();
        for id in ids {
            if visit(id, &self.vertices, &mut colors) {
                return true;
            }
        }
        false
    }

    /// Emits the GraphViz dot representation (spec.md §4.5 "Dot diagram",
    /// §6.4): vertex lines in `AddTask` order, then edge lines in
    /// `TaskDependsOn` declaration order.
    pub fn dot(&self) -> String {
        let mut out = format!("digraph G {{\n  label=\"{}\";\n  rankdir=TB;\n", self.name);
        for line in &self.dot_vertex_lines {
            out.push_str(line);
            out.push('\n');
        }
        for line in &self.dot_edge_lines {
            out.push_str(line);
            out.push('\n');
        }
        out.push_str("}\n");
        out
    }

    /// A convenience rendering alongside `dot`, not part of the original
    /// GraphViz contract: a one-line-per-vertex ASCII listing of each
    /// vertex and what it depends on.
    pub fn to_ascii(&self) -> String {
        let mut out = String::new();
        for (id, v) in &self.vertices {
            if v.children.is_empty() {
                out.push_str(&format!("{id}\n"));
            } else {
                out.push_str(&format!("{id} -> {}\n", v.children.join(", ")));
            }
        }
        out
    }

    fn get_next_vertex(&self) -> Option<String> {
        if self.serial {
            if let Some((id, _)) = self.vertices.iter().find(|(_, v)| v.status == RunStatus::InProgress) {
                return Some(id.clone());
            }
        }
        for (id, v) in self.vertices.iter() {
            if matches!(v.status, RunStatus::Pending | RunStatus::Skip) {
                let ready = v.children.iter().all(|c| {
                    matches!(
                        self.vertices.get(c).map(|cv| cv.status),
                        Some(RunStatus::Done) | Some(RunStatus::Skip)
                    )
                });
                if ready {
                    return Some(id.clone());
                }
            }
        }
        None
    }

    fn mark_parents_skip(&mut self, id: &str) {
        let parents = self.vertices.get(id).map(|v| v.parents.clone()).unwrap_or_default();
        for parent in parents {
            if let Some(v) = self.vertices.get_mut(&parent) {
                if v.status == RunStatus::Pending {
                    v.status = RunStatus::Skip;
                }
            }
            self.mark_parents_skip(&parent);
        }
    }

    /// Validates, checks for cycles, then runs the scheduler to completion
    /// (spec.md §4.5). `cancel` is observed cooperatively: once set, no new
    /// task dispatches occur but in-flight tasks are allowed to finish.
    pub fn run(&mut self, cancel: Arc<AtomicBool>) -> Result<()> {
        let construction_errors = self.validate();
        if !construction_errors.is_empty() {
            return Err(Error::Internal(construction_errors.to_string()));
        }
        if self.has_cycle() {
            return Err(Error::GraphHasCycle);
        }

        let start = Instant::now();
        let total = self.vertices.len();
        if total == 0 {
            return Ok(());
        }

        let (tx, rx): (Sender<Completion>, Receiver<Completion>) = unbounded();
        let permits = if self.max_parallel == usize::MAX {
            total
        } else {
            self.max_parallel
        };
        let (permit_tx, permit_rx): (Sender<()>, Receiver<()>) = bounded(permits);
        for _ in 0..permits {
            permit_tx.send(()).ok();
        }

        let mut run_errors = ErrorEnvelope::new();
        let mut canceled_logged = false;
        let mut done_count = 0usize;
        let mut in_flight = 0usize;

        loop {
            if done_count >= total {
                break;
            }

            let is_canceled = cancel.load(Ordering::SeqCst);
            if is_canceled && !canceled_logged {
                crate::display::dag_log_err(&format!("{}: run canceled", self.name), self.color);
                run_errors.push(Error::Canceled);
                canceled_logged = true;
            }

            if is_canceled && in_flight == 0 {
                for (id, v) in self.vertices.iter() {
                    if v.status != RunStatus::Done {
                        run_errors.push(Error::TaskSkipped(id.clone()));
                    }
                }
                break;
            }

            if !is_canceled {
                if let Some(id) = self.get_next_vertex() {
                    let already_running = self.vertices[&id].status == RunStatus::InProgress;
                    if !already_running {
                        let is_skip = self.vertices[&id].status == RunStatus::Skip;
                        if is_skip {
                            self.vertices.get_mut(&id).unwrap().status = RunStatus::InProgress;
                            crate::display::dag_log(&format!("{id}: Skipped"), self.color);
                            tx.send(Completion {
                                id,
                                error: None,
                                skip_parents: false,
                            })
                            .ok();
                        } else if !run_errors.is_empty() {
                            self.vertices.get_mut(&id).unwrap().status = RunStatus::InProgress;
                            tx.send(Completion {
                                id: id.clone(),
                                error: Some(Error::TaskSkipped(id)),
                                skip_parents: false,
                            })
                            .ok();
                        } else if permit_rx.try_recv().is_ok() {
                            self.vertices.get_mut(&id).unwrap().status = RunStatus::InProgress;
                            in_flight += 1;
                            self.spawn_vertex(&id, Arc::clone(&cancel), tx.clone(), permit_tx.clone(), self.name.clone(), self.color);
                        }
                    }
                }
            }

            match rx.recv_timeout(self.tick) {
                Ok(completion) => {
                    done_count += 1;
                    if in_flight > 0 {
                        in_flight -= 1;
                    }
                    self.vertices.get_mut(&completion.id).unwrap().status = RunStatus::Done;
                    if completion.skip_parents {
                        self.mark_parents_skip(&completion.id);
                    } else if let Some(err) = completion.error {
                        run_errors.push(err);
                    }
                }
                Err(_) => continue,
            }
        }

        let elapsed = start.elapsed();
        crate::display::dag_log(
            &format!("Completed {} Run in {}", self.name, format_mmss(elapsed)),
            self.color,
        );

        if run_errors.is_empty() {
            Ok(())
        } else {
            Err(Error::Internal(run_errors.to_string()))
        }
    }

    fn spawn_vertex(
        &self,
        id: &str,
        cancel: Arc<AtomicBool>,
        tx: Sender<Completion>,
        permit_tx: Sender<()>,
        graph_name: String,
        color: bool,
    ) {
        let vertex = &self.vertices[id];
        let task = Arc::clone(&vertex.task);
        let retries = vertex.retries;
        let buffer_output = self.buffer_output;
        let writer = Arc::clone(&self.writer);
        let id = id.to_string();

        thread::spawn(move || {
            let _guard = task.mutex.lock().unwrap();
            let started = Instant::now();
            crate::display::dag_log(&format!("{id}: Running"), color);

            let (ctx, stdout_buf, stderr_buf) = if buffer_output {
                let out = Arc::new(Mutex::new(Vec::new()));
                let err = Arc::new(Mutex::new(Vec::new()));
                (
                    Context::with_buffers(Arc::clone(&cancel), Arc::clone(&out), Arc::clone(&err)),
                    Some(out),
                    Some(err),
                )
            } else {
                (Context::new(Arc::clone(&cancel)), None, None)
            };

            let view = OptionView::empty();
            let mut last_error: Option<Error> = None;
            let mut signal = Signal::Done;

            let attempts = retries + 1;
            for attempt in 0..attempts {
                last_error = None;
                match &task.func {
                    Some(f) => match f(&ctx, &view, &[]) {
                        Ok(s) => {
                            signal = s;
                            break;
                        }
                        Err(e) => {
                            last_error = Some(e);
                        }
                    },
                    None => {
                        last_error = Some(Error::TaskFunctionMissing(id.clone()));
                        break;
                    }
                }
                if let (Some(out), Some(err)) = (&stdout_buf, &stderr_buf) {
                    let mut w = writer.lock().unwrap();
                    let _ = w.write_all(&out.lock().unwrap());
                    let _ = w.write_all(&err.lock().unwrap());
                }
                if last_error.is_some() && attempt + 1 < attempts {
                    continue;
                }
            }

            if let (Some(out), Some(err)) = (&stdout_buf, &stderr_buf) {
                let mut w = writer.lock().unwrap();
                let _ = w.write_all(&out.lock().unwrap());
                let _ = w.write_all(&err.lock().unwrap());
            }

            let elapsed = started.elapsed();
            match &last_error {
                Some(e) => crate::display::dag_log_err(
                    &format!("Task {graph_name}:{id} error: {e}"),
                    color,
                ),
                None => crate::display::dag_log(
                    &format!("{id}: Completed in {}", format_mmss(elapsed)),
                    color,
                ),
            }

            permit_tx.send(()).ok();
            tx.send(Completion {
                id,
                error: last_error,
                skip_parents: signal == Signal::SkipParents,
            })
            .ok();
        });
    }
}

fn format_mmss(d: Duration) -> String {
    let total_seconds = d.as_secs_f64().round() as u64;
    format!("{:02}:{:02}", total_seconds / 60, total_seconds % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn noop_task(id: &str) -> Arc<Task> {
        Arc::new(Task {
            id: id.to_string(),
            func: Some(Arc::new(|_ctx, _view, _args| Ok(Signal::Done))),
            mutex: Arc::new(Mutex::new(())),
        })
    }

    #[test]
    fn dot_emits_vertices_then_edges_in_order() {
        let mut g = Graph::new("demo");
        g.add_task(noop_task("a"), 0);
        g.add_task(noop_task("b"), 0);
        g.task_depends_on("a", "b");
        let dot = g.dot();
        assert_eq!(
            dot,
            "digraph G {\n  label=\"demo\";\n  rankdir=TB;\n  \"a\";\n  \"b\";\n  \"a\" -> \"b\";\n}\n"
        );
    }

    #[test]
    fn cyclic_graph_fails_validate_at_run_without_calling_tasks() {
        let counter = Arc::new(AtomicUsize::new(0));
        let c1 = Arc::clone(&counter);
        let a = Arc::new(Task {
            id: "a".to_string(),
            func: Some(Arc::new(move |_c, _v, _a| {
                c1.fetch_add(1, Ordering::SeqCst);
                Ok(Signal::Done)
            })),
            mutex: Arc::new(Mutex::new(())),
        });
        let b = noop_task("b");
        let mut g = Graph::new("cyclic");
        g.add_task(a, 0);
        g.add_task(b, 0);
        g.task_depends_on("a", "b");
        g.task_depends_on("b", "a");
        let err = g.run(Arc::new(AtomicBool::new(false))).unwrap_err();
        assert_matches::assert_matches!(err, Error::GraphHasCycle);
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn acyclic_graph_runs_every_task_once() {
        let counts: Arc<Mutex<HashMap<String, usize>>> = Arc::new(Mutex::new(HashMap::new()));
        let make = |id: &str, counts: Arc<Mutex<HashMap<String, usize>>>| {
            let id = id.to_string();
            Arc::new(Task {
                id: id.clone(),
                func: Some(Arc::new(move |_c, _v, _a| {
                    *counts.lock().unwrap().entry(id.clone()).or_insert(0) += 1;
                    Ok(Signal::Done)
                })),
                mutex: Arc::new(Mutex::new(())),
            })
        };
        let mut g = Graph::new("diamond");
        g.add_task(make("t1", Arc::clone(&counts)), 0);
        g.add_task(make("t2", Arc::clone(&counts)), 0);
        g.add_task(make("t3", Arc::clone(&counts)), 0);
        g.add_task(make("t4", Arc::clone(&counts)), 0);
        g.task_depends_on("t1", "t2");
        g.task_depends_on("t1", "t3");
        g.task_depends_on("t2", "t4");
        g.task_depends_on("t3", "t4");

        g.run(Arc::new(AtomicBool::new(false))).unwrap();
        let c = counts.lock().unwrap();
        for id in ["t1", "t2", "t3", "t4"] {
            assert_eq!(c.get(id).copied(), Some(1));
        }
    }

    #[test]
    fn skip_parents_marks_ancestors_skipped_without_error() {
        let results: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let leaf = {
            let results = Arc::clone(&results);
            Arc::new(Task {
                id: "leaf".to_string(),
                func: Some(Arc::new(move |_c, _v, _a| {
                    results.lock().unwrap().push("leaf".to_string());
                    Ok(Signal::SkipParents)
                })),
                mutex: Arc::new(Mutex::new(())),
            })
        };
        let parent = {
            let results = Arc::clone(&results);
            Arc::new(Task {
                id: "parent".to_string(),
                func: Some(Arc::new(move |_c, _v, _a| {
                    results.lock().unwrap().push("parent".to_string());
                    Ok(Signal::Done)
                })),
                mutex: Arc::new(Mutex::new(())),
            })
        };
        let mut g = Graph::new("skip");
        g.add_task(Arc::clone(&leaf), 0);
        g.add_task(Arc::clone(&parent), 0);
        g.task_depends_on("parent", "leaf");

        g.run(Arc::new(AtomicBool::new(false))).unwrap();
        assert_eq!(*results.lock().unwrap(), vec!["leaf".to_string()]);
    }

    #[test]
    fn serial_mode_runs_one_task_at_a_time() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));
        let mut g = Graph::new("serial");
        g.set_serial(true);
        for i in 0..4 {
            let in_flight = Arc::clone(&in_flight);
            let max_seen = Arc::clone(&max_seen);
            let t = Arc::new(Task {
                id: format!("t{i}"),
                func: Some(Arc::new(move |_c: &Context, _v: &OptionView, _a: &[String]| {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    max_seen.fetch_max(now, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(5));
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    Ok(Signal::Done)
                })),
                mutex: Arc::new(Mutex::new(())),
            });
            g.add_task(t, 0);
        }
        g.run(Arc::new(AtomicBool::new(false))).unwrap();
        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
    }
}
