use glob::Pattern;

use crate::{PredicateEvaluator, PredicateOutcome, RequesterIdentity};

/// Small targeting language for matching requester identities.
///
/// Terms:
/// - a bare shell glob is matched against the identity id (`web*`, `db0?.example.org`)
/// - `G@key:glob` matches a glob against an identity attribute
/// - `L@a,b,c` matches when the identity id is one of the listed ids
///
/// Terms combine with `and`, `or` and `not` (binding `not` > `and` > `or`).
/// Parentheses are not supported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GlobPredicateEvaluator;

impl PredicateEvaluator for GlobPredicateEvaluator {
    fn evaluate(&self, expression: &str, identity: &RequesterIdentity) -> PredicateOutcome {
        match evaluate_expression(expression, identity) {
            Ok(matched) => PredicateOutcome::from(matched),
            Err(reason) => PredicateOutcome::EvaluationFailed(reason),
        }
    }
}

// Every term is evaluated even once the result is known so a malformed
// expression always fails instead of depending on the identity.
fn evaluate_expression(expression: &str, identity: &RequesterIdentity) -> Result<bool, String> {
    let tokens = expression.split_whitespace().collect::<Vec<_>>();
    if tokens.is_empty() {
        return Err("empty targeting expression".to_string());
    }

    let mut any_clause = false;
    for clause in tokens.split(|token| *token == "or") {
        if clause.is_empty() {
            return Err(format!("dangling 'or' in targeting expression '{expression}'"));
        }
        let mut all_terms = true;
        for conjunct in clause.split(|token| *token == "and") {
            if conjunct.is_empty() {
                return Err(format!(
                    "dangling 'and' in targeting expression '{expression}'"
                ));
            }
            all_terms &= evaluate_negated(conjunct, identity)?;
        }
        any_clause |= all_terms;
    }
    Ok(any_clause)
}

fn evaluate_negated(tokens: &[&str], identity: &RequesterIdentity) -> Result<bool, String> {
    let negations = tokens.iter().take_while(|token| **token == "not").count();
    match &tokens[negations..] {
        [term] => {
            let matched = evaluate_term(term, identity)?;
            Ok(if negations % 2 == 1 { !matched } else { matched })
        }
        [] => Err("'not' must be followed by a term".to_string()),
        [first, second, ..] => Err(format!(
            "missing operator between '{first}' and '{second}'"
        )),
    }
}

fn evaluate_term(term: &str, identity: &RequesterIdentity) -> Result<bool, String> {
    let Some((prefix, body)) = split_matcher_prefix(term) else {
        return Ok(compile_glob(term)?.matches(&identity.id));
    };

    match prefix {
        'G' => {
            let Some((key, pattern)) = body.split_once(':') else {
                return Err(format!("attribute term '{term}' must look like G@key:pattern"));
            };
            if key.is_empty() {
                return Err(format!("attribute term '{term}' has an empty key"));
            }
            let pattern = compile_glob(pattern)?;
            Ok(identity
                .attributes
                .get(key)
                .is_some_and(|value| pattern.matches(value)))
        }
        'L' => {
            if body.is_empty() {
                return Err(format!("list term '{term}' has no entries"));
            }
            Ok(body.split(',').any(|candidate| candidate == identity.id))
        }
        other => Err(format!("unsupported matcher prefix '{other}@' in '{term}'")),
    }
}

fn split_matcher_prefix(term: &str) -> Option<(char, &str)> {
    let bytes = term.as_bytes();
    if bytes.len() >= 2 && bytes[0].is_ascii_uppercase() && bytes[1] == b'@' {
        return Some((bytes[0] as char, &term[2..]));
    }
    None
}

fn compile_glob(pattern: &str) -> Result<Pattern, String> {
    Pattern::new(pattern).map_err(|error| format!("invalid glob '{pattern}': {error}"))
}
