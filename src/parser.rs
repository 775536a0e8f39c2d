//! The parser/dispatcher (component C4): walks the program tree consuming
//! argument tokens, binds option values, resolves the final node, and
//! dispatches to its command function.

use std::rc::Rc;

use crate::command::{CommandFn, NodeHandle, OptionView};
use crate::context::{Context, Signal};
use crate::error::{Error, Result};
use crate::lexer::{self, ArgIterator, ShortOptionMode};
use crate::option::OptHandle;
use crate::value::OptionKind;

/// How an unrecognized token is handled during the parse walk (spec.md
/// §4.4 "Parse walk", step 5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnknownMode {
    Fail,
    Warn,
    Pass,
}

#[derive(Debug, Clone)]
pub struct ParserConfig {
    pub short_option_mode: ShortOptionMode,
    pub unknown_mode: UnknownMode,
    pub require_order: bool,
    pub lowercase_map_keys: bool,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            short_option_mode: ShortOptionMode::Normal,
            unknown_mode: UnknownMode::Fail,
            require_order: false,
            lowercase_map_keys: false,
        }
    }
}

/// Resolves `token` to an option visible at `node` — its own options plus
/// everything inherited from its ancestors (spec.md §4.4 "Alias
/// resolution"): exact match first, then unambiguous prefix match.
pub fn resolve_option_alias(node: &NodeHandle, token: &str) -> Result<OptHandle> {
    let all = node.borrow().visible_options();

    let mut exact: Vec<OptHandle> = Vec::new();
    for h in &all {
        if h.borrow().aliases().iter().any(|a| a == token) && !exact.iter().any(|e| Rc::ptr_eq(e, h)) {
            exact.push(Rc::clone(h));
        }
    }
    match exact.len() {
        1 => return Ok(exact.into_iter().next().unwrap()),
        n if n >= 2 => {
            let mut names: Vec<String> = exact.iter().map(|h| h.borrow().name().to_string()).collect();
            names.sort();
            return Err(Error::AmbiguousArgument(token.to_string(), names));
        }
        _ => {}
    }

    let mut prefix: Vec<(String, OptHandle)> = Vec::new();
    for h in &all {
        if let Some(alias) = h.borrow().aliases().iter().find(|a| a.starts_with(token)) {
            if !prefix.iter().any(|(_, e)| Rc::ptr_eq(e, h)) {
                prefix.push((alias.clone(), Rc::clone(h)));
            }
        }
    }
    match prefix.len() {
        0 => Err(Error::UnknownOption(token.to_string())),
        1 => Ok(prefix.into_iter().next().unwrap().1),
        _ => {
            let mut names: Vec<String> = prefix.iter().map(|(a, _)| a.clone()).collect();
            names.sort();
            Err(Error::AmbiguousArgument(token.to_string(), names))
        }
    }
}

fn consume_and_save(
    opt: &OptHandle,
    mut args: Vec<String>,
    pair_name: &str,
    used_alias: &str,
    it: &mut ArgIterator,
    lowercase_map_keys: bool,
) -> Result<()> {
    let (min_args, max_args, optional_arg) = {
        let b = opt.borrow();
        (b.min_args(), b.max_args(), b.is_optional_arg())
    };

    while args.len() < min_args {
        match it.peek_next_value() {
            None => {
                if optional_arg {
                    break;
                }
                return Err(Error::MissingArgument(pair_name.to_string()));
            }
            Some(next_tok) => {
                if lexer::looks_like_option(next_tok) {
                    if optional_arg {
                        break;
                    }
                    return Err(Error::ArgumentWithDash(pair_name.to_string(), next_tok.to_string()));
                }
                args.push(it.next().unwrap().to_string());
            }
        }
    }
    while args.len() < max_args {
        match it.peek_next_value() {
            Some(next_tok) if !lexer::looks_like_option(next_tok) => {
                args.push(it.next().unwrap().to_string());
            }
            _ => break,
        }
    }

    let refs: Vec<&str> = args.iter().map(String::as_str).collect();
    opt.borrow_mut().save(&refs, used_alias, lowercase_map_keys)
}

/// Runs the env-var binding pass over every option visible at `node`,
/// skipping options already satisfied by the CLI (spec.md §4.4
/// "Environment-variable binding": CLI > env > default).
pub fn bind_env_vars(node: &NodeHandle, lowercase_map_keys: bool) -> Result<()> {
    for opt in node.borrow().visible_options() {
        let (env_name, already_called) = {
            let b = opt.borrow();
            (b.env_var().map(str::to_string), b.called())
        };
        if already_called {
            continue;
        }
        let Some(var) = env_name else { continue };
        let Ok(val) = std::env::var(&var) else { continue };
        if val.is_empty() {
            continue;
        }
        let kind = opt.borrow().kind();
        if kind == OptionKind::Bool {
            let lowered = val.to_ascii_lowercase();
            if lowered != "true" && lowered != "false" {
                continue;
            }
            opt.borrow_mut().save(&[lowered.as_str()], &var, lowercase_map_keys)?;
        } else {
            opt.borrow_mut().save(&[val.as_str()], &var, lowercase_map_keys)?;
        }
    }
    Ok(())
}

fn check_required_all(node: &NodeHandle) -> Result<()> {
    for opt in node.borrow().visible_options() {
        opt.borrow().check_required()?;
    }
    Ok(())
}

/// Walks `args` from `root`, consuming option tokens and descending into
/// child commands, returning the final resolved node plus the leftover
/// positional tokens (spec.md §4.4 "Parse walk").
pub fn parse(
    root: &NodeHandle,
    args: &[String],
    config: &ParserConfig,
) -> Result<(NodeHandle, Vec<String>)> {
    let mut it = ArgIterator::new(args.to_vec());
    let mut current = Rc::clone(root);
    let mut remaining: Vec<String> = Vec::new();

    while let Some(tok) = it.next() {
        let tok = tok.to_string();

        if tok == "--" {
            remaining.extend(it.remaining().iter().cloned());
            break;
        }

        if tok == "-" {
            if let Some(opt) = current.borrow().find_option("-") {
                opt.borrow_mut().save(&[], "-", config.lowercase_map_keys)?;
            } else {
                match config.unknown_mode {
                    UnknownMode::Fail => return Err(Error::UnknownOption(tok)),
                    UnknownMode::Warn => {
                        eprintln!("warning: unknown option '{tok}'");
                        remaining.push(tok);
                    }
                    UnknownMode::Pass => {
                        remaining.push(tok);
                        if config.require_order {
                            remaining.extend(it.remaining().iter().cloned());
                            break;
                        }
                    }
                }
            }
            continue;
        }

        if lexer::looks_like_option(&tok) {
            let dashes = if tok.starts_with("--") { "--" } else { "-" };
            let pairs = lexer::lex_token(&tok, config.short_option_mode).unwrap_or_default();
            let mut unknown_in_token = false;
            for pair in pairs {
                let used_alias = format!("{dashes}{}", pair.name);
                match resolve_option_alias(&current, &pair.name) {
                    Ok(opt) => {
                        consume_and_save(
                            &opt,
                            pair.args,
                            &pair.name,
                            &used_alias,
                            &mut it,
                            config.lowercase_map_keys,
                        )?;
                    }
                    Err(Error::UnknownOption(_)) => match config.unknown_mode {
                        UnknownMode::Fail => return Err(Error::UnknownOption(used_alias)),
                        UnknownMode::Warn => {
                            eprintln!("warning: unknown option '{used_alias}'");
                            unknown_in_token = true;
                        }
                        UnknownMode::Pass => {
                            unknown_in_token = true;
                        }
                    },
                    Err(other) => return Err(other),
                }
            }
            if unknown_in_token {
                remaining.push(tok);
                if config.require_order && config.unknown_mode == UnknownMode::Pass {
                    remaining.extend(it.remaining().iter().cloned());
                    break;
                }
            }
            continue;
        }

        if config.require_order {
            remaining.push(tok);
            remaining.extend(it.remaining().iter().cloned());
            break;
        }

        let child = current.borrow().get_child(&tok);
        if let Some(child) = child {
            current = child;
            continue;
        }

        current.borrow_mut().push_child_text(tok.clone());
        remaining.push(tok);
    }

    bind_env_vars(&current, config.lowercase_map_keys)?;
    check_required_all(&current)?;

    Ok((current, remaining))
}

/// Dispatches on the resolved node (spec.md §4.4 "Dispatch"). `help_alias`
/// is the name under which the help command was registered, if any.
pub fn dispatch(
    node: &NodeHandle,
    remaining: &[String],
    ctx: &Context,
    help_alias: Option<&str>,
    script_name: &str,
) -> Result<Signal> {
    let view: OptionView = node.borrow().option_view();
    if let Some(alias) = help_alias {
        if view.called(alias) {
            print!("{}", crate::help::render(node, script_name));
            return Err(Error::HelpCalled);
        }
    }

    let func: Option<CommandFn> = node.borrow().command_function();
    match func {
        Some(f) => f(ctx, &view, remaining),
        None => {
            if node.borrow().level() == 0 {
                Ok(Signal::Done)
            } else {
                Err(Error::NoCommandFunction(node.borrow().name().to_string()))
            }
        }
    }
}

/// A completion line split into its whitespace-separated tokens plus a flag
/// for whether the line ended in whitespace (spec.md §4.4 "Completion
/// mode"): in that case an empty token is appended representing the word
/// currently being completed.
fn split_comp_line(line: &str) -> Vec<String> {
    let mut tokens: Vec<String> = line.split_whitespace().map(str::to_string).collect();
    if line.ends_with(char::is_whitespace) || tokens.is_empty() {
        tokens.push(String::new());
    }
    tokens
}

/// Produces shell completion candidates for `comp_line`, walking the tree
/// exactly as [`parse`] does until the last token (spec.md §4.4
/// "Completion mode").
pub fn completions(root: &NodeHandle, comp_line: &str, config: &ParserConfig) -> Vec<String> {
    let mut tokens = split_comp_line(comp_line);
    let last = tokens.pop().unwrap_or_default();

    let (node, _) = match parse(root, &tokens, config) {
        Ok(r) => r,
        Err(_) => (Rc::clone(root), Vec::new()),
    };

    if let Some(stripped) = last.strip_prefix('-') {
        let stripped = stripped.strip_prefix('-').unwrap_or(stripped);
        let mut out = Vec::new();
        for opt in node.borrow().visible_options() {
            let b = opt.borrow();
            if let Some(name) = b.aliases().iter().find(|a| a.len() > 1 && a.starts_with(stripped)) {
                if b.kind().expects_value() {
                    if !b.valid_values().is_empty() {
                        for v in b.valid_values() {
                            out.push(format!("--{name}={v}"));
                        }
                    } else {
                        out.push(format!("--{name}=<{}>", b.help_argname()));
                    }
                } else {
                    out.push(format!("--{name}"));
                }
            }
        }
        out
    } else {
        let children = node.borrow().children().clone();
        let mut matches: Vec<String> = children
            .keys()
            .filter(|name| name.starts_with(last.as_str()))
            .cloned()
            .collect();
        matches.sort();
        if matches.len() == 1 {
            matches[0].push(' ');
        }
        matches
    }
}
