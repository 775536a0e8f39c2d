//! Help rendering: assembles NAME/SYNOPSIS/ARGUMENTS/REQUIRED
//! PARAMETERS/OPTIONS/COMMANDS sections from program-tree metadata
//! (spec.md §4.4 "Help subsystem", §6.5 "Help output").

use crate::command::{NodeHandle, ProgramNode};
use crate::value::OptionKind;

const WRAP_WIDTH: usize = 80;
const INDENT: &str = "    ";

fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        if current.is_empty() {
            current.push_str(word);
        } else if current.len() + 1 + word.len() > width {
            lines.push(std::mem::take(&mut current));
            current.push_str(word);
        } else {
            current.push(' ');
            current.push_str(word);
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

fn synopsis_for(kind: OptionKind, argname: &str) -> String {
    match kind {
        OptionKind::Bool | OptionKind::Increment => String::new(),
        OptionKind::String | OptionKind::Int | OptionKind::Float => format!("<{argname}>"),
        OptionKind::StringOptional | OptionKind::IntOptional | OptionKind::FloatOptional => {
            format!("[{argname}]")
        }
        OptionKind::StringRepeat | OptionKind::IntRepeat | OptionKind::FloatRepeat => {
            format!("<{argname}>...")
        }
        OptionKind::StringMap => format!("<key=value>..."),
    }
}

/// Renders the full help text for `node`, given the program's script name.
pub fn render(node: &NodeHandle, script_name: &str) -> String {
    let mut out = String::new();
    let n = node.borrow();

    // NAME
    out.push_str("NAME\n");
    for line in wrap(&format!("{script_name} {} - {}", n.name(), n.description()), WRAP_WIDTH) {
        out.push_str(INDENT);
        out.push_str(&line);
        out.push('\n');
    }
    out.push('\n');

    let mut options = n.own_options().to_vec();
    // include inherited options too, since a child's visible options are
    // what a caller of this command actually sees
    for opt in n.visible_options() {
        if !options.iter().any(|o| std::rc::Rc::ptr_eq(o, &opt)) {
            options.push(opt);
        }
    }
    let mut required: Vec<_> = options.iter().filter(|o| o.borrow().is_required()).cloned().collect();
    let mut optional: Vec<_> = options.iter().filter(|o| !o.borrow().is_required()).cloned().collect();
    required.sort_by(|a, b| a.borrow().name().cmp(b.borrow().name()));
    optional.sort_by(|a, b| a.borrow().name().cmp(b.borrow().name()));

    // SYNOPSIS
    out.push_str("SYNOPSIS\n");
    let mut synopsis_line = format!("{script_name} {}", n.name());
    for opt in required.iter().chain(optional.iter()) {
        let b = opt.borrow();
        let syn = synopsis_for(b.kind(), b.help_argname());
        if syn.is_empty() {
            synopsis_line.push_str(&format!(" --{}", b.name()));
        } else {
            synopsis_line.push_str(&format!(" --{} {}", b.name(), syn));
        }
    }
    for (name, _) in n.positional_args() {
        synopsis_line.push_str(&format!(" <{name}>"));
    }
    for line in wrap(&synopsis_line, WRAP_WIDTH) {
        out.push_str(INDENT);
        out.push_str(&line);
        out.push('\n');
    }
    out.push('\n');

    // ARGUMENTS
    if !n.positional_args().is_empty() {
        out.push_str("ARGUMENTS\n");
        for (name, desc) in n.positional_args() {
            out.push_str(&format!("{INDENT}{name}  {desc}\n"));
        }
        out.push('\n');
    }

    // REQUIRED PARAMETERS
    if !required.is_empty() {
        out.push_str("REQUIRED PARAMETERS\n");
        for opt in &required {
            out.push_str(&format!("{INDENT}{}\n", describe_option(opt)));
        }
        out.push('\n');
    }

    // OPTIONS
    if !optional.is_empty() {
        out.push_str("OPTIONS\n");
        for opt in &optional {
            out.push_str(&format!("{INDENT}{}\n", describe_option(opt)));
        }
        out.push('\n');
    }

    // COMMANDS
    let mut commands: Vec<NodeHandle> = n.children().values().cloned().collect();
    commands.sort_by(|a, b| a.borrow().name().cmp(b.borrow().name()));
    if !commands.is_empty() {
        out.push_str("COMMANDS\n");
        let width = commands.iter().map(|c| c.borrow().name().len()).max().unwrap_or(0);
        for c in &commands {
            let cb = c.borrow();
            out.push_str(&format!(
                "{INDENT}{:width$}  {}\n",
                cb.name(),
                cb.description(),
                width = width
            ));
        }
    }

    out
}

fn describe_option(opt: &crate::option::OptHandle) -> String {
    let b = opt.borrow();
    let mut line = format!("--{}", b.name());
    if !b.aliases().is_empty() {
        let extra: Vec<&str> = b.aliases().iter().map(String::as_str).filter(|a| *a != b.name()).collect();
        if !extra.is_empty() {
            line.push_str(&format!(" ({})", extra.join(", ")));
        }
    }
    if let Some(desc) = b.description() {
        line.push_str(&format!("  {desc}"));
    }
    let mut annotations = Vec::new();
    if let Some(default) = b.default_string() {
        annotations.push(format!("default: {default}"));
    }
    if let Some(env) = b.env_var() {
        annotations.push(format!("env: {env}"));
    }
    if !annotations.is_empty() {
        line.push_str(&format!(" [{}]", annotations.join(", ")));
    }
    line
}

/// Registers a help command named `help_name` on `root` and every existing
/// descendant, marking each as the owning node's designated help command so
/// it is exempt from retroactive option propagation (spec.md §4.3).
pub fn install_help(root: &NodeHandle, help_name: &str, script_name: &str) -> crate::error::Result<()> {
    install_help_recursive(root, help_name, script_name)
}

fn install_help_recursive(
    node: &NodeHandle,
    help_name: &str,
    script_name: &str,
) -> crate::error::Result<()> {
    let opt = crate::option::Opt::new(help_name, OptionKind::Bool);
    opt.borrow_mut().set_description("show this help message");
    ProgramNode::add_option(node, opt);

    let parent_for_closure = std::rc::Rc::clone(node);
    let script_name_owned = script_name.to_string();
    let help_node = ProgramNode::add_command(node, help_name, "show this help message")?;
    ProgramNode::mark_as_help_command(&help_node);
    help_node.borrow_mut().set_callback(std::rc::Rc::new(move |_ctx, _view, _args| {
        print!("{}", render(&parent_for_closure, &script_name_owned));
        Ok(crate::context::Signal::Done)
    }));

    let children: Vec<NodeHandle> = node.borrow().children().values().cloned().collect();
    for child in children {
        if child.borrow().is_help_command() {
            continue;
        }
        install_help_recursive(&child, help_name, script_name)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_splits_on_width() {
        let lines = wrap(&"word ".repeat(30), 20);
        assert!(lines.iter().all(|l| l.len() <= 20));
    }

    #[test]
    fn render_includes_sections() {
        let root = ProgramNode::new_root("app", "a test app");
        let opt = crate::option::Opt::new("name", OptionKind::String);
        opt.borrow_mut().set_required(None);
        ProgramNode::add_option(&root, opt);
        ProgramNode::add_command(&root, "build", "build it").unwrap();
        let text = render(&root, "app");
        assert!(text.contains("NAME"));
        assert!(text.contains("SYNOPSIS"));
        assert!(text.contains("REQUIRED PARAMETERS"));
        assert!(text.contains("COMMANDS"));
        assert!(text.contains("build"));
    }
}
