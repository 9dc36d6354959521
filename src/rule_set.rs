//! This module contains the scanner description: scanner modes with their rules, and the macros
//! the rules can reference.

use std::collections::{BTreeMap, BTreeSet};

use crate::{Result, ScanForgeError, ScanForgeErrorKind};

/// A rule of a scanner mode: a regex and the line it was defined at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    /// The regex source text. It can contain macro references.
    pub pattern: String,
    /// The line of the rule in the scanner description, if known.
    pub line: Option<usize>,
}

/// A ScannerMode is a named, ordered list of rules.
/// The order of the rules is their priority: the first rule wins for matches of equal length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannerMode {
    /// The name of the mode.
    pub name: String,
    /// The rules of the mode.
    pub rules: Vec<Rule>,
}

impl ScannerMode {
    /// Create an empty scanner mode.
    pub fn new(name: impl Into<String>) -> Self {
        ScannerMode {
            name: name.into(),
            rules: Vec::new(),
        }
    }

    /// Append a rule.
    pub fn add_rule(&mut self, pattern: impl Into<String>) -> &mut Self {
        self.rules.push(Rule {
            pattern: pattern.into(),
            line: None,
        });
        self
    }

    /// Append a rule defined at the given line.
    pub fn add_rule_at(&mut self, pattern: impl Into<String>, line: usize) -> &mut Self {
        self.rules.push(Rule {
            pattern: pattern.into(),
            line: Some(line),
        });
        self
    }
}

/// The complete scanner description.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    modes: Vec<ScannerMode>,
    macros: BTreeMap<String, String>,
}

impl RuleSet {
    /// Create an empty rule set.
    pub fn new() -> Self {
        RuleSet::default()
    }

    /// Define a macro. A later definition with the same name replaces the earlier one.
    pub fn add_macro(&mut self, name: impl Into<String>, pattern: impl Into<String>) -> &mut Self {
        self.macros.insert(name.into(), pattern.into());
        self
    }

    /// Append a scanner mode and return it for adding rules.
    pub fn add_mode(&mut self, name: impl Into<String>) -> &mut ScannerMode {
        self.modes.push(ScannerMode::new(name));
        let last = self.modes.len() - 1;
        &mut self.modes[last]
    }

    /// Get the scanner modes.
    pub fn modes(&self) -> &[ScannerMode] {
        &self.modes
    }

    /// Get the macros.
    pub fn macros(&self) -> &BTreeMap<String, String> {
        &self.macros
    }

    /// Get the index of the scanner mode with the given name.
    pub fn mode_index(&self, name: &str) -> Option<usize> {
        self.modes.iter().position(|m| m.name == name)
    }

    /// Get the number of rules over all scanner modes.
    pub fn rule_count(&self) -> usize {
        self.modes.iter().map(|m| m.rules.len()).sum()
    }
}

/// Replace the macro references `{name}` outside of bracket expressions by `(?:body)`.
/// Macro bodies are expanded recursively.
/// Braces that don't enclose an identifier, like the repetition `{2,3}`, are kept.
/// # Errors
/// `UndefinedMacro` for a reference to an unknown name, `RecursiveMacro` if a macro references
/// itself directly or indirectly.
pub fn expand_macros(pattern: &str, macros: &BTreeMap<String, String>) -> Result<String> {
    expand(pattern, macros, &mut Vec::new(), &mut BTreeSet::new())
}

/// Like [`expand_macros`], and additionally collect the names of all macros the expansion used.
pub(crate) fn expand_macros_tracking(
    pattern: &str,
    macros: &BTreeMap<String, String>,
    used: &mut BTreeSet<String>,
) -> Result<String> {
    expand(pattern, macros, &mut Vec::new(), used)
}

fn expand<'m>(
    pattern: &str,
    macros: &'m BTreeMap<String, String>,
    expanding: &mut Vec<&'m str>,
    used: &mut BTreeSet<String>,
) -> Result<String> {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::with_capacity(pattern.len());
    let mut bracket_depth = 0usize;
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            '\\' => {
                out.push(c);
                if let Some(escaped) = chars.get(i + 1) {
                    out.push(*escaped);
                    i += 1;
                    // Escapes with a braced argument, like `\x{7F}` or `\p{Greek}`
                    if matches!(escaped, 'x' | 'u' | 'U' | 'p' | 'P' | 'b' | 'B')
                        && chars.get(i + 1) == Some(&'{')
                    {
                        while let Some(next) = chars.get(i + 1) {
                            out.push(*next);
                            i += 1;
                            if *next == '}' {
                                break;
                            }
                        }
                    }
                }
            }
            '[' => {
                out.push(c);
                bracket_depth += 1;
                // A `]` right after the opening bracket (or its negation) is a literal
                if chars.get(i + 1) == Some(&'^') {
                    out.push('^');
                    i += 1;
                }
                if chars.get(i + 1) == Some(&']') {
                    out.push(']');
                    i += 1;
                }
            }
            ']' if bracket_depth > 0 => {
                out.push(c);
                bracket_depth -= 1;
            }
            '{' if bracket_depth == 0 => match macro_reference(&chars[i + 1..]) {
                Some(name) => {
                    let (defined_name, body) = macros.get_key_value(&name).ok_or_else(|| {
                        ScanForgeError::new(ScanForgeErrorKind::UndefinedMacro(name.clone()))
                    })?;
                    if expanding.contains(&defined_name.as_str()) {
                        return Err(ScanForgeError::new(ScanForgeErrorKind::RecursiveMacro(
                            name,
                        )));
                    }
                    used.insert(name.clone());
                    expanding.push(defined_name);
                    let expanded = expand(body, macros, expanding, used)?;
                    expanding.pop();
                    out.push_str("(?:");
                    out.push_str(&expanded);
                    out.push(')');
                    i += name.chars().count() + 1;
                }
                None => out.push(c),
            },
            _ => out.push(c),
        }
        i += 1;
    }
    Ok(out)
}

// The identifier of `name}` at the start of the slice.
fn macro_reference(chars: &[char]) -> Option<String> {
    let first = chars.first()?;
    if !(first.is_ascii_alphabetic() || *first == '_') {
        return None;
    }
    let name: String = chars
        .iter()
        .take_while(|c| c.is_ascii_alphanumeric() || **c == '_')
        .collect();
    match chars.get(name.len()) {
        Some('}') => Some(name),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn macros(definitions: &[(&str, &str)]) -> BTreeMap<String, String> {
        definitions
            .iter()
            .map(|(n, p)| (n.to_string(), p.to_string()))
            .collect()
    }

    #[test]
    fn test_rule_set() {
        let mut rule_set = RuleSet::new();
        rule_set.add_macro("digit", "[0-9]");
        rule_set
            .add_mode("INITIAL")
            .add_rule("{digit}+")
            .add_rule_at(r"\s+", 7);
        rule_set.add_mode("STRING").add_rule("[^\"]*");
        assert_eq!(rule_set.rule_count(), 3);
        assert_eq!(rule_set.mode_index("STRING"), Some(1));
        assert_eq!(rule_set.mode_index("COMMENT"), None);
        assert_eq!(rule_set.modes()[0].rules[1].line, Some(7));
    }

    #[test]
    fn test_expand_macros() {
        let macros = macros(&[("digit", "[0-9]"), ("number", "{digit}+(\\.{digit}+)?")]);
        assert_eq!(
            expand_macros("-?{number}", &macros).unwrap(),
            "-?(?:(?:[0-9])+(\\.(?:[0-9])+)?)"
        );
        let mut used = BTreeSet::new();
        expand_macros_tracking("{number}|x", &macros, &mut used).unwrap();
        assert_eq!(
            used.into_iter().collect::<Vec<_>>(),
            vec!["digit".to_string(), "number".to_string()]
        );
    }

    #[test]
    fn test_braces_that_are_no_references() {
        let macros = macros(&[("a", "x")]);
        assert_eq!(expand_macros("a{2,3}", &macros).unwrap(), "a{2,3}");
        assert_eq!(expand_macros(r"\{a}", &macros).unwrap(), r"\{a}");
        assert_eq!(expand_macros(r"\x{61}{a}", &macros).unwrap(), r"\x{61}(?:x)");
        assert_eq!(expand_macros(r"\p{a}", &macros).unwrap(), r"\p{a}");
        assert_eq!(expand_macros("[{a}]", &macros).unwrap(), "[{a}]");
        assert_eq!(expand_macros("[]{a}]{a}", &macros).unwrap(), "[]{a}](?:x)");
        assert_eq!(expand_macros("[^]]{a}", &macros).unwrap(), "[^]](?:x)");
    }

    #[test]
    fn test_undefined_macro() {
        let err = expand_macros("{ident}", &BTreeMap::new()).unwrap_err();
        assert!(matches!(err.kind(), ScanForgeErrorKind::UndefinedMacro(name) if name == "ident"));
    }

    #[test]
    fn test_recursive_macro() {
        let macros = macros(&[("a", "x{b}"), ("b", "y|{a}")]);
        let err = expand_macros("{a}", &macros).unwrap_err();
        assert!(matches!(err.kind(), ScanForgeErrorKind::RecursiveMacro(name) if name == "a"));
        // Using a macro twice side by side is no recursion
        let macros = self::macros(&[("d", "[0-9]"), ("pair", "{d}{d}")]);
        assert_eq!(
            expand_macros("{pair}", &macros).unwrap(),
            "(?:(?:[0-9])(?:[0-9]))"
        );
    }
}
