//! The program tree (component C3): commands nested under a root, each
//! carrying its own options plus whatever its ancestors declared.

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;

use crate::context::{Context, Signal};
use crate::error::{Error, Result};
use crate::option::OptHandle;
use crate::value::Value;

/// A node's command function: invoked with a cancellation [`Context`], a
/// read-only [`OptionView`] over the node's resolved options, and whatever
/// positional arguments were left over after parsing.
pub type CommandFn = Rc<dyn Fn(&Context, &OptionView, &[String]) -> Result<Signal>>;

pub type NodeHandle = Rc<RefCell<ProgramNode>>;

/// Read-only view over a node's options at dispatch time, handed to command
/// functions so they cannot restructure the tree they're running under.
#[derive(Clone)]
pub struct OptionView {
    options: IndexMap<String, OptHandle>,
}

impl OptionView {
    fn new(options: IndexMap<String, OptHandle>) -> Self {
        Self { options }
    }

    /// A view with no options, for task functions invoked outside of a
    /// dispatched command (spec.md §6.1 shares the `(ctx, option-view,
    /// args)` task function contract between C4 dispatch and C5 tasks).
    pub fn empty() -> Self {
        Self {
            options: IndexMap::new(),
        }
    }

    pub fn get(&self, alias: &str) -> Option<Value> {
        self.options.get(alias).map(|h| h.borrow().value().clone())
    }

    pub fn called(&self, alias: &str) -> bool {
        self.options.get(alias).map(|h| h.borrow().called()).unwrap_or(false)
    }

    pub fn called_as(&self, alias: &str) -> Option<String> {
        self.options
            .get(alias)
            .and_then(|h| h.borrow().used_alias().map(str::to_string))
    }

    pub fn contains(&self, alias: &str) -> bool {
        self.options.contains_key(alias)
    }
}

/// A node in the program tree: the root program, or a command nested under
/// it. spec.md §3 `ProgramNode` invariants:
/// (a) every alias on a node is unique against the node and its ancestors;
/// (b) an option added to a node is visible, via the same handle, to every
///     existing and future descendant command except the node's own
///     designated help command.
pub struct ProgramNode {
    name: String,
    description: String,
    positional_args: Vec<(String, String)>,
    is_help_command: bool,
    level: usize,
    parent: Option<Weak<RefCell<ProgramNode>>>,
    self_ref: Weak<RefCell<ProgramNode>>,
    child_commands: IndexMap<String, NodeHandle>,
    /// Options declared directly on or inherited onto this node, keyed by
    /// every alias they're reachable under.
    options: IndexMap<String, OptHandle>,
    /// The distinct option handles owned by this node, in declaration
    /// order, for help rendering and iteration.
    own_options: Vec<OptHandle>,
    child_text: Vec<String>,
    command_function: Option<CommandFn>,
    /// Every alias name reachable at or above this node; used to reject
    /// collisions in O(1) instead of walking ancestors per insert.
    global_option_map: HashSet<String>,
}

impl std::fmt::Debug for ProgramNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgramNode")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("positional_args", &self.positional_args)
            .field("is_help_command", &self.is_help_command)
            .field("level", &self.level)
            .field("child_commands", &self.child_commands)
            .field("options", &self.options)
            .field("own_options", &self.own_options)
            .field("child_text", &self.child_text)
            .field("has_command_function", &self.command_function.is_some())
            .field("global_option_map", &self.global_option_map)
            .finish()
    }
}

impl ProgramNode {
    pub fn new_root(name: impl Into<String>, description: impl Into<String>) -> NodeHandle {
        let name = name.into();
        if name.trim().is_empty() {
            panic!("ProgramNode: root command name must not be empty");
        }
        Rc::new_cyclic(|weak| {
            RefCell::new(ProgramNode {
                name,
                description: description.into(),
                positional_args: Vec::new(),
                is_help_command: false,
                level: 0,
                parent: None,
                self_ref: weak.clone(),
                child_commands: IndexMap::new(),
                options: IndexMap::new(),
                own_options: Vec::new(),
                child_text: Vec::new(),
                command_function: None,
                global_option_map: HashSet::new(),
            })
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = description.into();
    }

    pub fn level(&self) -> usize {
        self.level
    }

    pub fn is_help_command(&self) -> bool {
        self.is_help_command
    }

    pub fn parent(&self) -> Option<NodeHandle> {
        self.parent.as_ref().and_then(Weak::upgrade)
    }

    pub fn positional_args(&self) -> &[(String, String)] {
        &self.positional_args
    }

    pub fn add_positional_arg(&mut self, name: impl Into<String>, description: impl Into<String>) {
        self.positional_args.push((name.into(), description.into()));
    }

    pub fn child_text(&self) -> &[String] {
        &self.child_text
    }

    pub fn push_child_text(&mut self, text: impl Into<String>) {
        self.child_text.push(text.into());
    }

    pub fn command_function(&self) -> Option<CommandFn> {
        self.command_function.clone()
    }

    pub fn set_callback(&mut self, f: CommandFn) {
        self.command_function = Some(f);
    }

    pub fn children(&self) -> &IndexMap<String, NodeHandle> {
        &self.child_commands
    }

    pub fn get_child(&self, name: &str) -> Option<NodeHandle> {
        self.child_commands.get(name).cloned()
    }

    pub fn own_options(&self) -> &[OptHandle] {
        &self.own_options
    }

    /// All options visible at this node (own plus inherited), distinct by
    /// handle identity, in declaration order.
    pub fn visible_options(&self) -> Vec<OptHandle> {
        let mut seen: HashSet<*const RefCell<crate::option::Opt>> = HashSet::new();
        let mut out = Vec::new();
        for h in self.options.values() {
            let ptr = Rc::as_ptr(h);
            if seen.insert(ptr) {
                out.push(Rc::clone(h));
            }
        }
        out
    }

    pub fn option_view(&self) -> OptionView {
        OptionView::new(self.options.clone())
    }

    pub fn find_option(&self, alias: &str) -> Option<OptHandle> {
        self.options.get(alias).cloned()
    }

    /// Adds a new child command under `node`. Existing option handles are
    /// shared (not copied) so mutation through either tree reference is
    /// observed from the other (spec.md §9 "handle").
    pub fn add_command(
        node: &NodeHandle,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Result<NodeHandle> {
        let name = name.into();
        if name.trim().is_empty() {
            panic!("ProgramNode: command name must not be empty");
        }
        {
            let parent = node.borrow();
            if parent.child_commands.contains_key(&name) {
                panic!("ProgramNode: duplicate command name '{name}' under '{}'", parent.name);
            }
        }

        let (level, inherited_options, inherited_aliases, parent_weak) = {
            let parent = node.borrow();
            (
                parent.level + 1,
                parent.options.clone(),
                parent.global_option_map.clone(),
                Rc::downgrade(node),
            )
        };

        let child = Rc::new_cyclic(|weak| {
            RefCell::new(ProgramNode {
                name: name.clone(),
                description: description.into(),
                positional_args: Vec::new(),
                is_help_command: false,
                level,
                parent: Some(parent_weak),
                self_ref: weak.clone(),
                child_commands: IndexMap::new(),
                options: inherited_options,
                own_options: Vec::new(),
                child_text: Vec::new(),
                command_function: None,
                global_option_map: inherited_aliases,
            })
        });

        node.borrow_mut().child_commands.insert(name, Rc::clone(&child));
        Ok(child)
    }

    /// Registers `node` as this tree's help command, excluding it from
    /// retroactive option propagation (spec.md §3 exception).
    pub fn mark_as_help_command(node: &NodeHandle) {
        node.borrow_mut().is_help_command = true;
    }

    /// Declares `opt` on `node`: checked for alias collisions against the
    /// node and its ancestors, then propagated to every descendant command
    /// except designated help commands (spec.md §3 invariant (b)). A
    /// colliding alias is a definition-time fault, not a runtime error, and
    /// panics like the duplicate/empty command name checks in `add_command`.
    pub fn add_option(node: &NodeHandle, opt: OptHandle) {
        let aliases: Vec<String> = opt.borrow().aliases().to_vec();
        {
            let existing = &node.borrow().global_option_map;
            for alias in &aliases {
                if existing.contains(alias) {
                    panic!(
                        "ProgramNode: option alias '{alias}' collides with an option already visible on '{}' or an ancestor",
                        node.borrow().name
                    );
                }
            }
        }

        {
            let mut n = node.borrow_mut();
            for alias in &aliases {
                n.options.insert(alias.clone(), Rc::clone(&opt));
                n.global_option_map.insert(alias.clone());
            }
            n.own_options.push(Rc::clone(&opt));
        }

        propagate_option(node, &opt, &aliases);
    }

    /// Walks from `node` looking up `name` by exact match, then unambiguous
    /// prefix match, per spec.md §5.2.
    pub fn resolve_command_name(
        node: &NodeHandle,
        name: &str,
    ) -> std::result::Result<NodeHandle, Error> {
        if let Some(exact) = node.borrow().child_commands.get(name) {
            return Ok(Rc::clone(exact));
        }
        let candidates: Vec<String> = node
            .borrow()
            .child_commands
            .keys()
            .filter(|k| k.starts_with(name))
            .cloned()
            .collect();
        match candidates.len() {
            0 => {
                let mut known: Vec<String> = node.borrow().child_commands.keys().cloned().collect();
                known.sort();
                Err(Error::UnknownCommand(name.to_string(), known))
            }
            1 => Ok(Rc::clone(node.borrow().child_commands.get(&candidates[0]).unwrap())),
            _ => {
                let mut sorted = candidates;
                sorted.sort();
                Err(Error::AmbiguousArgument(name.to_string(), sorted))
            }
        }
    }

    /// Reports this node's anchored path from the root, e.g. `app sub leaf`.
    pub fn path(node: &NodeHandle) -> String {
        let mut parts = vec![node.borrow().name.clone()];
        let mut cur = node.borrow().parent();
        while let Some(p) = cur {
            parts.push(p.borrow().name.clone());
            cur = p.borrow().parent();
        }
        parts.reverse();
        parts.join(" ")
    }

    pub fn handle(&self) -> NodeHandle {
        self.self_ref.upgrade().expect("ProgramNode: self handle dropped")
    }
}

fn propagate_option(node: &NodeHandle, opt: &OptHandle, aliases: &[String]) {
    let children: Vec<NodeHandle> = node.borrow().child_commands.values().cloned().collect();
    for child in children {
        if child.borrow().is_help_command {
            continue;
        }
        {
            let mut c = child.borrow_mut();
            for alias in aliases {
                c.options.insert(alias.clone(), Rc::clone(opt));
                c.global_option_map.insert(alias.clone());
            }
        }
        propagate_option(&child, opt, aliases);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::OptionKind;

    #[test]
    fn new_root_has_level_zero() {
        let root = ProgramNode::new_root("app", "an app");
        assert_eq!(root.borrow().level(), 0);
        assert!(root.borrow().parent().is_none());
    }

    #[test]
    fn add_command_increments_level_and_links_parent() {
        let root = ProgramNode::new_root("app", "an app");
        let child = ProgramNode::add_command(&root, "sub", "a subcommand").unwrap();
        assert_eq!(child.borrow().level(), 1);
        assert_eq!(child.borrow().parent().unwrap().borrow().name(), "app");
        assert_eq!(ProgramNode::path(&child), "app sub");
    }

    #[test]
    fn option_added_to_parent_is_visible_on_existing_child() {
        let root = ProgramNode::new_root("app", "an app");
        let child = ProgramNode::add_command(&root, "sub", "a subcommand").unwrap();
        let opt = crate::option::Opt::new("verbose", OptionKind::Bool);
        ProgramNode::add_option(&root, opt);
        assert!(child.borrow().find_option("verbose").is_some());
    }

    #[test]
    fn option_added_after_child_creation_still_propagates() {
        let root = ProgramNode::new_root("app", "an app");
        let child = ProgramNode::add_command(&root, "sub", "a subcommand").unwrap();
        let grandchild = ProgramNode::add_command(&child, "leaf", "a leaf").unwrap();
        let opt = crate::option::Opt::new("color", OptionKind::Bool);
        ProgramNode::add_option(&root, opt);
        assert!(grandchild.borrow().find_option("color").is_some());
    }

    #[test]
    fn help_command_is_excluded_from_propagation() {
        let root = ProgramNode::new_root("app", "an app");
        let help = ProgramNode::add_command(&root, "help", "show help").unwrap();
        ProgramNode::mark_as_help_command(&help);
        let opt = crate::option::Opt::new("verbose", OptionKind::Bool);
        ProgramNode::add_option(&root, opt);
        assert!(help.borrow().find_option("verbose").is_none());
    }

    #[test]
    #[should_panic(expected = "option alias")]
    fn duplicate_alias_against_ancestor_is_rejected() {
        let root = ProgramNode::new_root("app", "an app");
        let child = ProgramNode::add_command(&root, "sub", "a subcommand").unwrap();
        ProgramNode::add_option(&root, crate::option::Opt::new("name", OptionKind::String));
        ProgramNode::add_option(&child, crate::option::Opt::new("name", OptionKind::String));
    }

    #[test]
    fn resolve_command_name_prefers_exact_then_prefix() {
        let root = ProgramNode::new_root("app", "an app");
        ProgramNode::add_command(&root, "build", "build it").unwrap();
        ProgramNode::add_command(&root, "bundle", "bundle it").unwrap();
        let err = ProgramNode::resolve_command_name(&root, "bu").unwrap_err();
        assert_matches::assert_matches!(err, Error::AmbiguousArgument(_, _));
        let exact = ProgramNode::resolve_command_name(&root, "build").unwrap();
        assert_eq!(exact.borrow().name(), "build");
    }

    #[test]
    #[should_panic(expected = "duplicate command name")]
    fn duplicate_command_name_panics() {
        let root = ProgramNode::new_root("app", "an app");
        ProgramNode::add_command(&root, "sub", "one").unwrap();
        ProgramNode::add_command(&root, "sub", "two").unwrap();
    }
}
