//! Build failure hints and pre-build source checks

/// Known compiler messages and the hint reported for each
const FAILURE_PATTERNS: &[(&str, &str)] = &[
    ("not found in module", "Undefined symbol reference"),
    ("mismatched types", "Type mismatch"),
    ("cannot infer type", "Type inference failure"),
    ("Expected identifier", "Syntax error"),
];

/// Classify a failed build's transcript into a short hint
pub fn classify_failure(transcript: &str) -> Option<&'static str> {
    FAILURE_PATTERNS
        .iter()
        .find(|(pattern, _)| transcript.contains(pattern))
        .map(|(_, hint)| *hint)
}

/// Look for common mistakes in a contract source
///
/// Findings are advisory; they never stop the build.
pub fn lint_source(source: &str) -> Vec<String> {
    let mut warnings = Vec::new();

    if !source.contains("#[starknet::contract]") && !declares(source, "mod", "contract") {
        warnings.push("missing contract definition (#[starknet::contract] or mod contract)".to_owned());
    }
    if !source.contains("#[storage]") && !declares(source, "struct", "Storage") {
        warnings.push("missing storage definition (#[storage] or struct Storage)".to_owned());
    }
    if let Some(warning) = check_balance(source, '{', '}', "braces") {
        warnings.push(warning);
    }
    if let Some(warning) = check_balance(source, '(', ')', "parentheses") {
        warnings.push(warning);
    }

    warnings
}

/// Whether `source` contains `{keyword} {name} {`, with any whitespace between
fn declares(source: &str, keyword: &str, name: &str) -> bool {
    source.match_indices(keyword).any(|(at, _)| {
        let rest = &source[at + keyword.len()..];
        if !rest.starts_with(char::is_whitespace) {
            return false;
        }
        rest.trim_start()
            .strip_prefix(name)
            .is_some_and(|tail| tail.trim_start().starts_with('{'))
    })
}

fn check_balance(source: &str, open: char, close: char, what: &str) -> Option<String> {
    let opened = source.chars().filter(|&c| c == open).count();
    let closed = source.chars().filter(|&c| c == close).count();
    (opened != closed).then(|| format!("unbalanced {what}: {opened} '{open}' vs {closed} '{close}'"))
}
