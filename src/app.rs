//! The public entry point: `Fli` wraps a root [`ProgramNode`] and a
//! [`ParserConfig`], giving callers a single struct to declare commands and
//! options on and then run.

use std::rc::Rc;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use signal_hook::consts::{SIGHUP, SIGINT, SIGTERM};

use crate::command::{CommandFn, NodeHandle, ProgramNode};
use crate::context::Context;
use crate::display;
use crate::error::Error;
use crate::help;
use crate::lexer::ShortOptionMode;
use crate::option::OptHandle;
use crate::parser::{self, ParserConfig, UnknownMode};

/// The main application struct for building CLI applications.
///
/// `Fli` wraps a root command node and a parser configuration. Declare
/// options and subcommands on it, then hand it `std::env::args()` via
/// [`Fli::run`].
pub struct Fli {
    pub name: String,
    pub version: String,
    pub description: String,
    root: NodeHandle,
    config: ParserConfig,
    help_alias: Option<String>,
    cancel: Arc<AtomicBool>,
}

impl Fli {
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        let name = name.into();
        let root = ProgramNode::new_root(name.clone(), description.into());
        let description = root.borrow().description().to_string();
        Fli {
            name,
            version: version.into(),
            description,
            root,
            config: ParserConfig::default(),
            help_alias: None,
            cancel: install_cancel_listener(),
        }
    }

    pub fn root(&self) -> NodeHandle {
        Rc::clone(&self.root)
    }

    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Creates (or retrieves) a subcommand of the root node.
    pub fn command(&mut self, name: impl Into<String>, description: impl Into<String>) -> NodeHandle {
        let name = name.into();
        if let Some(existing) = self.root.borrow().get_child(&name) {
            return existing;
        }
        ProgramNode::add_command(&self.root, name, description).expect("Fli: add_command")
    }

    pub fn add_option(&mut self, opt: OptHandle) {
        ProgramNode::add_option(&self.root, opt);
    }

    pub fn set_callback(&mut self, f: CommandFn) {
        self.root.borrow_mut().set_callback(f);
    }

    /// Registers a boolean help option plus a `help` command on every
    /// existing node (spec.md §4.4 "Help subsystem").
    pub fn with_help(&mut self, alias: impl Into<String>) -> crate::error::Result<()> {
        let alias = alias.into();
        help::install_help(&self.root, &alias, &self.name)?;
        self.help_alias = Some(alias);
        Ok(())
    }

    pub fn set_short_option_mode(&mut self, mode: ShortOptionMode) {
        self.config.short_option_mode = mode;
    }

    pub fn set_unknown_mode(&mut self, mode: UnknownMode) {
        self.config.unknown_mode = mode;
    }

    pub fn set_require_order(&mut self, require_order: bool) {
        self.config.require_order = require_order;
    }

    pub fn set_lowercase_map_keys(&mut self, lowercase: bool) {
        self.config.lowercase_map_keys = lowercase;
    }

    /// Parses `args` and dispatches to the resolved command's function.
    /// Returns the exit code the caller should use (spec.md §6.3).
    pub fn run(&self, args: Vec<String>) -> i32 {
        if let Ok(comp_line) = std::env::var("COMP_LINE") {
            if !comp_line.is_empty() {
                for candidate in parser::completions(&self.root, &comp_line, &self.config) {
                    println!("{candidate}");
                }
                return 124;
            }
        }

        match parser::parse(&self.root, &args, &self.config) {
            Ok((node, remaining)) => {
                let ctx = Context::new(Arc::clone(&self.cancel));
                match parser::dispatch(&node, &remaining, &ctx, self.help_alias.as_deref(), &self.name) {
                    Ok(_) => 0,
                    Err(Error::HelpCalled) => 1,
                    Err(e) => {
                        report_error(&e);
                        1
                    }
                }
            }
            Err(Error::HelpCalled) => 1,
            Err(e) => {
                report_error(&e);
                1
            }
        }
    }
}

/// Prints `e` the way [`Fli::run`] surfaces failures to the user: the error
/// message itself, plus a Levenshtein "did you mean" suggestion list for
/// unknown commands (spec.md ambient diagnostics, display.rs "did you mean").
fn report_error(e: &Error) {
    display::print_error(&e.to_string());
    if let Error::UnknownCommand(name, known) = e {
        display::print_did_you_mean(name, known);
    }
}

/// Installs a one-shot cancellation flag for SIGINT/SIGHUP/SIGTERM, flipped
/// by the signal handler itself (spec.md §5 "an OS-signal listener
/// (interrupt/hangup/terminate) that cancels once").
fn install_cancel_listener() -> Arc<AtomicBool> {
    let flag = Arc::new(AtomicBool::new(false));
    for sig in [SIGINT, SIGTERM, SIGHUP] {
        let _ = signal_hook::flag::register(sig, Arc::clone(&flag));
    }
    flag
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Signal;
    use crate::value::OptionKind;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn run_invokes_registered_callback() {
        let mut app = Fli::new("app", "1.0.0", "a test app");
        let called = Rc::new(RefCell::new(false));
        let called2 = Rc::clone(&called);
        app.set_callback(Rc::new(move |_ctx, _view, _args| {
            *called2.borrow_mut() = true;
            Ok(Signal::Done)
        }));
        let code = app.run(vec![]);
        assert_eq!(code, 0);
        assert!(*called.borrow());
    }

    #[test]
    fn help_flag_short_circuits_dispatch() {
        let mut app = Fli::new("app", "1.0.0", "a test app");
        app.with_help("help").unwrap();
        app.set_callback(Rc::new(|_ctx, _view, _args| Ok(Signal::Done)));
        let code = app.run(vec!["--help".to_string()]);
        assert_eq!(code, 1);
    }

    #[test]
    fn unknown_option_returns_nonzero() {
        let app = Fli::new("app", "1.0.0", "a test app");
        let code = app.run(vec!["--nope".to_string()]);
        assert_eq!(code, 1);
    }

    #[test]
    fn option_value_reaches_callback() {
        let mut app = Fli::new("app", "1.0.0", "a test app");
        app.add_option(crate::option::Opt::new("name", OptionKind::String));
        let seen = Rc::new(RefCell::new(String::new()));
        let seen2 = Rc::clone(&seen);
        app.set_callback(Rc::new(move |_ctx, view, _args| {
            if let Some(v) = view.get("name") {
                *seen2.borrow_mut() = v.to_string();
            }
            Ok(Signal::Done)
        }));
        app.run(vec!["--name".to_string(), "bob".to_string()]);
        assert_eq!(*seen.borrow(), "bob");
    }
}
