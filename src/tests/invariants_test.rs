//! Cross-cutting invariants from spec.md §8 that don't belong to any single
//! module's own unit tests.

use crate::command::ProgramNode;
use crate::error::Error;
use crate::parser::{parse, ParserConfig};
use crate::value::{OptionKind, Value};

#[test]
#[should_panic(expected = "option alias")]
fn alias_uniqueness_is_enforced_across_the_whole_ancestor_chain() {
    let root = ProgramNode::new_root("app", "d");
    let mid = ProgramNode::add_command(&root, "mid", "d").unwrap();
    let leaf = ProgramNode::add_command(&mid, "leaf", "d").unwrap();

    ProgramNode::add_option(&mid, crate::option::Opt::new("tag", OptionKind::String));

    ProgramNode::add_option(&leaf, crate::option::Opt::new("tag", OptionKind::Int));
}

#[test]
fn option_handle_is_shared_not_copied_between_parent_and_child() {
    let root = ProgramNode::new_root("app", "d");
    let child = ProgramNode::add_command(&root, "child", "d").unwrap();
    ProgramNode::add_option(&root, crate::option::Opt::new("count", OptionKind::Int));

    let root_handle = root.borrow().find_option("count").unwrap();
    let child_handle = child.borrow().find_option("count").unwrap();
    root_handle.borrow_mut().save(&["5"], "--count", false).unwrap();

    assert_eq!(child_handle.borrow().value(), &Value::Int(5));
}

#[test]
fn remaining_tokens_are_a_permutation_of_unconsumed_input() {
    let root = ProgramNode::new_root("app", "d");
    ProgramNode::add_option(&root, crate::option::Opt::new("v", OptionKind::Bool));

    let config = ParserConfig::default();
    let args: Vec<String> = vec![
        "foo".to_string(),
        "--v".to_string(),
        "bar".to_string(),
        "baz".to_string(),
    ];
    let (_, remaining) = parse(&root, &args, &config).unwrap();

    let mut sorted_remaining = remaining.clone();
    sorted_remaining.sort();
    let mut expected = vec!["foo".to_string(), "bar".to_string(), "baz".to_string()];
    expected.sort();
    assert_eq!(sorted_remaining, expected);
    assert_eq!(remaining, vec!["foo".to_string(), "bar".to_string(), "baz".to_string()]);
}

#[test]
fn unambiguous_prefix_resolves_to_the_single_matching_command() {
    let root = ProgramNode::new_root("app", "d");
    ProgramNode::add_command(&root, "serve", "d").unwrap();
    let resolved = ProgramNode::resolve_command_name(&root, "serv").unwrap();
    assert_eq!(resolved.borrow().name(), "serve");
}

#[test]
fn required_option_missing_fails_after_the_parse_walk_completes() {
    let root = ProgramNode::new_root("app", "d");
    let opt = crate::option::Opt::new("token", OptionKind::String);
    opt.borrow_mut().set_required(Some("a token is required".to_string()));
    ProgramNode::add_option(&root, opt);

    let config = ParserConfig::default();
    let err = parse(&root, &[], &config).unwrap_err();
    assert_matches::assert_matches!(err, Error::MissingRequiredOption(_, _));
}
