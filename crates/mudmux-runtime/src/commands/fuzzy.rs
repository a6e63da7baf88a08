//! Fuzzy name resolution for command dispatch.
//!
//! Resolution order: exact match, unique prefix, unique substring.
//! An abbreviation matching several names is ambiguous and resolution
//! fails with the candidate list so the user can disambiguate.

/// Outcome of resolving an abbreviation against a candidate set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FuzzyResult {
    /// Exactly one name matched.
    Match(String),
    /// Several names matched at the same strength.
    Ambiguous(Vec<String>),
    /// Nothing matched.
    None,
}

/// Resolves `input` against `candidates`.
#[must_use]
pub fn resolve<'a, I>(input: &str, candidates: I) -> FuzzyResult
where
    I: IntoIterator<Item = &'a str>,
{
    let names: Vec<&str> = candidates.into_iter().collect();

    if names.iter().any(|name| *name == input) {
        return FuzzyResult::Match(input.to_string());
    }

    let prefixed: Vec<&str> = names
        .iter()
        .filter(|name| name.starts_with(input))
        .copied()
        .collect();
    match prefixed.as_slice() {
        [single] => return FuzzyResult::Match((*single).to_string()),
        [] => {}
        many => {
            return FuzzyResult::Ambiguous(many.iter().map(|s| (*s).to_string()).collect());
        }
    }

    let contained: Vec<&str> = names
        .iter()
        .filter(|name| name.contains(input))
        .copied()
        .collect();
    match contained.as_slice() {
        [single] => FuzzyResult::Match((*single).to_string()),
        [] => FuzzyResult::None,
        many => FuzzyResult::Ambiguous(many.iter().map(|s| (*s).to_string()).collect()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NAMES: [&str; 4] = ["list", "listen", "help", "history"];

    #[test]
    fn exact_beats_prefix() {
        // "list" is a prefix of "listen" but an exact match wins.
        assert_eq!(resolve("list", NAMES), FuzzyResult::Match("list".into()));
    }

    #[test]
    fn unique_prefix() {
        assert_eq!(resolve("he", NAMES), FuzzyResult::Match("help".into()));
    }

    #[test]
    fn ambiguous_prefix_lists_candidates() {
        match resolve("li", NAMES) {
            FuzzyResult::Ambiguous(names) => {
                assert_eq!(names, vec!["list".to_string(), "listen".to_string()]);
            }
            other => panic!("expected ambiguous, got {other:?}"),
        }
    }

    #[test]
    fn substring_fallback() {
        assert_eq!(resolve("stor", NAMES), FuzzyResult::Match("history".into()));
    }

    #[test]
    fn no_match() {
        assert_eq!(resolve("xyz", NAMES), FuzzyResult::None);
    }
}
