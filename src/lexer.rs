//! The argument iterator and option lexer (component C2): splits a token
//! stream into option-pair records under a chosen short-option mode.

use once_cell::sync::Lazy;
use regex::Regex;

/// How a short-form option token (single leading dash) is split into
/// option name and inline argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShortOptionMode {
    /// `-opt=value` is one option named `opt` with inline argument `value`.
    Normal,
    /// `-opt` is split into one empty-argument pair per rune, the final
    /// rune receiving any `=value` suffix (`-opt=arg` => o, p, t=arg).
    Bundling,
    /// The first rune is the option; the remainder (plus any `=value`
    /// suffix) is its inline argument.
    SingleDash,
}

/// One (option-name, leading-args) pair produced by the lexer for a single
/// input token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pair {
    pub name: String,
    pub args: Vec<String>,
}

static OPTION_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(--?)([^=]+)(=.*)?$").unwrap());

/// Whether `token` looks like an option under the option-token grammar,
/// excluding the two sentinels `--` and `-`.
pub fn looks_like_option(token: &str) -> bool {
    if token == "--" || token == "-" {
        return false;
    }
    OPTION_TOKEN.is_match(token)
}

/// Lexes a single input token into zero or more `(option, args)` pairs,
/// per spec.md §4.2. Returns `None` if the token is not an option token at
/// all (a bare positional argument).
pub fn lex_token(token: &str, mode: ShortOptionMode) -> Option<Vec<Pair>> {
    if token == "--" || token == "-" {
        return None;
    }
    let caps = OPTION_TOKEN.captures(token)?;
    let dashes = caps.get(1).unwrap().as_str();
    let body = caps.get(2).unwrap().as_str();
    let inline = caps
        .get(3)
        .map(|m| m.as_str().strip_prefix('=').unwrap_or("").to_string())
        .unwrap_or_default();

    let is_long = dashes == "--";

    if is_long || mode == ShortOptionMode::Normal {
        let args = if inline.is_empty() { vec![] } else { vec![inline] };
        return Some(vec![Pair {
            name: body.to_string(),
            args,
        }]);
    }

    match mode {
        ShortOptionMode::Bundling => {
            let chars: Vec<char> = body.chars().collect();
            let mut pairs = Vec::with_capacity(chars.len());
            for (i, ch) in chars.iter().enumerate() {
                let is_last = i == chars.len() - 1;
                let args = if is_last && !inline.is_empty() {
                    vec![inline.clone()]
                } else {
                    vec![]
                };
                pairs.push(Pair {
                    name: ch.to_string(),
                    args,
                });
            }
            Some(pairs)
        }
        ShortOptionMode::SingleDash => {
            let mut chars = body.chars();
            let first = chars.next().unwrap_or_default();
            let rest: String = chars.collect();
            let mut arg = rest;
            if !inline.is_empty() {
                arg.push_str(&inline);
            }
            let args = if arg.is_empty() { vec![] } else { vec![arg] };
            Some(vec![Pair {
                name: first.to_string(),
                args,
            }])
        }
        ShortOptionMode::Normal => unreachable!(),
    }
}

/// A cursor over an ordered sequence of input tokens, restartable, with
/// peek/remaining operations (spec.md §3 `ArgIterator`).
#[derive(Debug, Clone)]
pub struct ArgIterator {
    tokens: Vec<String>,
    index: usize,
}

impl ArgIterator {
    pub fn new(tokens: Vec<String>) -> Self {
        Self { tokens, index: 0 }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn is_last(&self) -> bool {
        self.index + 1 >= self.tokens.len()
    }

    pub fn exists_next(&self) -> bool {
        self.index < self.tokens.len()
    }

    pub fn value(&self) -> Option<&str> {
        self.tokens.get(self.index.wrapping_sub(1)).map(String::as_str)
    }

    /// Advances the cursor and returns the token it lands on, if any.
    pub fn next(&mut self) -> Option<&str> {
        if self.index >= self.tokens.len() {
            return None;
        }
        let tok = &self.tokens[self.index];
        self.index += 1;
        Some(tok)
    }

    pub fn peek_next_value(&self) -> Option<&str> {
        self.tokens.get(self.index).map(String::as_str)
    }

    pub fn remaining(&self) -> &[String] {
        &self.tokens[self.index.min(self.tokens.len())..]
    }

    pub fn reset(&mut self) {
        self.index = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normal_mode_splits_inline_value() {
        let pairs = lex_token("-opt=arg", ShortOptionMode::Normal).unwrap();
        assert_eq!(
            pairs,
            vec![Pair {
                name: "opt".to_string(),
                args: vec!["arg".to_string()],
            }]
        );
    }

    #[test]
    fn bundling_mode_splits_runes() {
        let pairs = lex_token("-opt=arg", ShortOptionMode::Bundling).unwrap();
        assert_eq!(pairs.len(), 3);
        assert_eq!(pairs[0].name, "o");
        assert!(pairs[0].args.is_empty());
        assert_eq!(pairs[1].name, "p");
        assert_eq!(pairs[2].name, "t");
        assert_eq!(pairs[2].args, vec!["arg".to_string()]);
    }

    #[test]
    fn single_dash_mode_takes_first_rune() {
        let pairs = lex_token("-oarg", ShortOptionMode::SingleDash).unwrap();
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].name, "o");
        assert_eq!(pairs[0].args, vec!["arg".to_string()]);
    }

    #[test]
    fn long_form_is_unaffected_by_mode() {
        let a = lex_token("--opt=val", ShortOptionMode::Bundling).unwrap();
        let b = lex_token("--opt=val", ShortOptionMode::SingleDash).unwrap();
        assert_eq!(a, b);
        assert_eq!(a[0].name, "opt");
    }

    #[test]
    fn sentinels_are_not_lexed() {
        assert_eq!(lex_token("--", ShortOptionMode::Normal), None);
        assert_eq!(lex_token("-", ShortOptionMode::Normal), None);
        assert!(!looks_like_option("--"));
        assert!(!looks_like_option("-"));
    }

    #[test]
    fn iterator_peek_and_advance() {
        let mut it = ArgIterator::new(vec!["a".into(), "b".into()]);
        assert!(it.exists_next());
        assert_eq!(it.peek_next_value(), Some("a"));
        assert_eq!(it.next(), Some("a"));
        assert!(!it.is_last());
        assert_eq!(it.next(), Some("b"));
        assert!(it.is_last());
        assert_eq!(it.next(), None);
        it.reset();
        assert_eq!(it.peek_next_value(), Some("a"));
    }
}
