use std::collections::BTreeMap;

use compact_str::{CompactString, format_compact};
use hashbrown::HashSet;

use crate::error::{SyntaxError, SyntaxErrorKind};

use super::parser::PatternParser;
use super::pattern::Pattern;

/// The default mode; unqualified rule names live here.
pub const MODE_MAIN: &str = "main";

/// Labels reserved for the generated lexer's synthetic tokens.
pub const RESERVED_LABELS: [&str; 2] = ["invalid", "incomplete"];

/// One named pattern rule, bound to a mode.
#[derive(Debug, Clone)]
pub struct Rule {
    /// Bare label, unique within its mode
    pub name: CompactString,
    pub mode: CompactString,
    pub pattern: Pattern,
    /// The fixed byte string this rule matches, iff its pattern is a
    /// plain sequence of single-byte charsets
    pub literal_text: Option<Vec<u8>>,
}

impl Rule {
    /// The globally unique name: bare in `main`, `mode.label` elsewhere.
    #[must_use]
    pub fn qualified_name(&self) -> CompactString {
        qualify(&self.mode, &self.name)
    }

    #[must_use]
    pub const fn is_literal(&self) -> bool {
        self.literal_text.is_some()
    }
}

/// Qualify a label with its mode the way rule files spell it.
#[must_use]
pub fn qualify(mode: &str, label: &str) -> CompactString {
    if mode == MODE_MAIN {
        CompactString::from(label)
    } else {
        format_compact!("{mode}.{label}")
    }
}

/// One side of a mode-transition declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ModeRef {
    pub mode: CompactString,
    /// `None` means the mode's implicit entry point (only valid on the
    /// right-hand side of a declaration).
    pub label: Option<CompactString>,
}

impl ModeRef {
    /// The rule-file spelling of this reference: bare labels in `main`,
    /// `mode.label` elsewhere, or the bare mode name.
    #[must_use]
    pub fn display_name(&self) -> CompactString {
        match &self.label {
            Some(label) if self.mode == MODE_MAIN => label.clone(),
            Some(label) => format_compact!("{}.{label}", self.mode),
            None => self.mode.clone(),
        }
    }
}

/// A `lhs -> rhs` declaration connecting two modes.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ModeTransition {
    pub from: ModeRef,
    pub to: ModeRef,
}

/// A parsed rule file: rules grouped by mode, plus the mode-transition
/// declarations. Read-only once parsed.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    modes: BTreeMap<CompactString, Vec<Rule>>,
    transitions: Vec<ModeTransition>,
}

impl RuleSet {
    /// Parse a whole rule file.
    ///
    /// Each nonblank, non-comment line is a mode transition
    /// (`name -> name`), a named rule (`name: pattern`, optionally
    /// `name \X: pattern` to change the escape character), or a bare
    /// pattern whose name is synthesized from its text.
    ///
    /// # Errors
    ///
    /// Returns the first [`SyntaxError`], positioned by line and
    /// column; rule files with syntax errors produce no partial output.
    pub fn parse(text: &str) -> Result<Self, SyntaxError> {
        let mut set = Self::default();
        let mut seen_rules: HashSet<CompactString, ahash::RandomState> = HashSet::default();
        let mut seen_sources: HashSet<CompactString, ahash::RandomState> = HashSet::default();

        for (idx, line) in text.lines().enumerate() {
            let line_no = idx + 1;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            set.parse_line(line, line_no, &mut seen_rules, &mut seen_sources)?;
        }
        Ok(set)
    }

    /// Modes in deterministic (sorted) order with their rules
    pub fn modes(&self) -> impl Iterator<Item = (&str, &[Rule])> {
        self.modes.iter().map(|(name, rules)| (name.as_str(), rules.as_slice()))
    }

    #[must_use]
    pub fn mode(&self, name: &str) -> Option<&[Rule]> {
        self.modes.get(name).map(Vec::as_slice)
    }

    #[must_use]
    pub fn transitions(&self) -> &[ModeTransition] {
        &self.transitions
    }

    #[must_use]
    pub fn rule_count(&self) -> usize {
        self.modes.values().map(Vec::len).sum()
    }

    /// Every qualified rule name, across all modes, in sorted order
    pub fn qualified_names(&self) -> impl Iterator<Item = CompactString> + '_ {
        self.modes
            .iter()
            .flat_map(|(mode, rules)| rules.iter().map(|r| qualify(mode, &r.name)))
    }

    fn parse_line(
        &mut self,
        line: &str,
        line_no: usize,
        seen_rules: &mut HashSet<CompactString, ahash::RandomState>,
        seen_sources: &mut HashSet<CompactString, ahash::RandomState>,
    ) -> Result<(), SyntaxError> {
        if let Some(colon) = line.find(':')
            && let Some((name_tok, escape)) = named_rule_prefix(&line[..colon])
        {
            return self.parse_named_rule(line, line_no, colon, name_tok, escape, seen_rules);
        }
        if let Some(arrow) = line.find("->")
            && transition_lhs(&line[..arrow])
        {
            return self.parse_transition(line, line_no, arrow, seen_sources);
        }
        self.parse_bare_pattern(line, line_no, seen_rules)
    }

    fn parse_named_rule(
        &mut self,
        line: &str,
        line_no: usize,
        colon: usize,
        name_tok: &str,
        escape: Option<u8>,
        seen_rules: &mut HashSet<CompactString, ahash::RandomState>,
    ) -> Result<(), SyntaxError> {
        let name_col = col_of(line, name_tok);
        if !is_valid_name(name_tok) {
            return Err(SyntaxError::new(
                line_no,
                name_col,
                SyntaxErrorKind::InvalidName {
                    name: name_tok.into(),
                },
            ));
        }
        let (mode, label) = split_name(name_tok);
        if RESERVED_LABELS.contains(&label) {
            return Err(SyntaxError::new(
                line_no,
                name_col,
                SyntaxErrorKind::ReservedRuleName { name: label.into() },
            ));
        }

        let parser = escape.map_or_else(PatternParser::new, PatternParser::with_escape);
        let pattern_text = &line[colon + 1..];
        let pattern = parser
            .parse(pattern_text)
            .map_err(|err| SyntaxError::from_pattern(line_no, colon + 2, err))?;

        self.push_rule(line_no, name_col, mode.into(), label.into(), pattern, seen_rules)
    }

    fn parse_transition(
        &mut self,
        line: &str,
        line_no: usize,
        arrow: usize,
        seen_sources: &mut HashSet<CompactString, ahash::RandomState>,
    ) -> Result<(), SyntaxError> {
        let lhs = line[..arrow].trim();
        if lhs.is_empty() {
            return Err(SyntaxError::new(
                line_no,
                col_of(line, line.trim_start()),
                SyntaxErrorKind::MalformedTransition,
            ));
        }
        let lhs_col = col_of(line, lhs);
        if !is_valid_name(lhs) {
            return Err(SyntaxError::new(
                line_no,
                lhs_col,
                SyntaxErrorKind::InvalidName { name: lhs.into() },
            ));
        }

        let rhs_raw = &line[arrow + 2..];
        let rhs_uncommented = rhs_raw.split('#').next().unwrap_or("");
        let rhs = rhs_uncommented.trim();
        if rhs.is_empty() {
            // Report where the right-hand side was expected.
            return Err(SyntaxError::new(
                line_no,
                arrow + 3,
                SyntaxErrorKind::MalformedTransition,
            ));
        }
        if !is_valid_name(rhs) {
            return Err(SyntaxError::new(
                line_no,
                col_of(line, rhs),
                SyntaxErrorKind::InvalidName { name: rhs.into() },
            ));
        }

        let (from_mode, from_label) = split_name(lhs);
        let from = ModeRef {
            mode: from_mode.into(),
            label: Some(from_label.into()),
        };
        if !seen_sources.insert(from.display_name()) {
            return Err(SyntaxError::new(
                line_no,
                lhs_col,
                SyntaxErrorKind::DuplicateTransitionSource {
                    source_label: from.display_name(),
                },
            ));
        }

        // A bare right-hand side names a target mode with implicit
        // entry; `mode.label` addresses a specific rule.
        let to = match rhs.split_once('.') {
            Some((mode, label)) => ModeRef {
                mode: mode.into(),
                label: Some(label.into()),
            },
            None => ModeRef {
                mode: rhs.into(),
                label: None,
            },
        };

        self.transitions.push(ModeTransition { from, to });
        Ok(())
    }

    fn parse_bare_pattern(
        &mut self,
        line: &str,
        line_no: usize,
        seen_rules: &mut HashSet<CompactString, ahash::RandomState>,
    ) -> Result<(), SyntaxError> {
        let pattern = PatternParser::new()
            .parse(line)
            .map_err(|err| SyntaxError::from_pattern(line_no, 1, err))?;

        let source = line.split('#').next().unwrap_or("").trim();
        let name = synthesize_name(source);
        let col = col_of(line, line.trim_start());
        self.push_rule(line_no, col, MODE_MAIN.into(), name, pattern, seen_rules)
    }

    fn push_rule(
        &mut self,
        line_no: usize,
        col: usize,
        mode: CompactString,
        name: CompactString,
        pattern: Pattern,
        seen_rules: &mut HashSet<CompactString, ahash::RandomState>,
    ) -> Result<(), SyntaxError> {
        if !seen_rules.insert(qualify(&mode, &name)) {
            return Err(SyntaxError::new(
                line_no,
                col,
                SyntaxErrorKind::DuplicateRuleName { name, mode },
            ));
        }
        let literal_text = pattern.literal_text();
        self.modes.entry(mode.clone()).or_default().push(Rule {
            name,
            mode,
            pattern,
            literal_text,
        });
        Ok(())
    }
}

/// 1-based column of `token` (a slice of `line`) within `line`.
fn col_of(line: &str, token: &str) -> usize {
    let offset = token.as_ptr() as usize - line.as_ptr() as usize;
    offset + 1
}

/// Does the text before a `:` spell a named-rule prefix? Returns the
/// name token and the custom escape byte, if one was given.
fn named_rule_prefix(prefix: &str) -> Option<(&str, Option<u8>)> {
    let mut tokens = prefix.split_ascii_whitespace();
    let name = tokens.next()?;
    if !name_shaped(name) {
        return None;
    }
    match tokens.next() {
        None => Some((name, None)),
        Some(esc) if tokens.next().is_none() => {
            let bytes = esc.as_bytes();
            if bytes.len() == 2 && bytes[0] == b'\\' {
                Some((name, Some(bytes[1])))
            } else {
                None
            }
        }
        Some(_) => None,
    }
}

/// Does the text before a `->` commit the line to the transition shape?
fn transition_lhs(prefix: &str) -> bool {
    let lhs = prefix.trim();
    lhs.is_empty() || name_shaped(lhs)
}

/// Loose shape check: only word characters and dots. Lines whose prefix
/// fails this fall through to the bare-pattern form; lines that pass it
/// but fail [`is_valid_name`] are reported as invalid names.
fn name_shaped(s: &str) -> bool {
    !s.is_empty()
        && s.bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'.')
}

/// Strict name syntax: `[a-z]\w*(\.\w+)?`.
fn is_valid_name(s: &str) -> bool {
    let (head, tail) = match s.split_once('.') {
        Some((head, tail)) => (head, Some(tail)),
        None => (s, None),
    };
    let head_ok = head
        .as_bytes()
        .first()
        .is_some_and(u8::is_ascii_lowercase)
        && head[1..]
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_');
    let tail_ok = tail.is_none_or(|t| {
        !t.is_empty()
            && t.bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'_')
    });
    head_ok && tail_ok
}

fn split_name(s: &str) -> (&str, &str) {
    match s.split_once('.') {
        Some((mode, label)) => (mode, label),
        None => (MODE_MAIN, s),
    }
}

/// Derive a rule name from bare pattern text: runs of non-word bytes
/// collapse to `_`, and a leading digit gets a `_` prefix.
fn synthesize_name(source: &str) -> CompactString {
    let mut name = String::new();
    let mut in_run = false;
    for b in source.bytes() {
        if b.is_ascii_alphanumeric() || b == b'_' {
            name.push(b as char);
            in_run = false;
        } else if !in_run {
            name.push('_');
            in_run = true;
        }
    }
    if name.as_bytes().first().is_some_and(u8::is_ascii_digit) {
        name.insert(0, '_');
    }
    name.into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PatternErrorKind;

    #[test]
    fn test_named_rule_default_mode() {
        let set = RuleSet::parse("ident: \\l\\w*").unwrap();
        let rules = set.mode(MODE_MAIN).unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].name, "ident");
        assert_eq!(rules[0].mode, MODE_MAIN);
        assert!(!rules[0].is_literal());
    }

    #[test]
    fn test_named_rule_explicit_mode() {
        let set = RuleSet::parse("str.end: \"").unwrap();
        let rules = set.mode("str").unwrap();
        assert_eq!(rules[0].name, "end");
        assert_eq!(rules[0].qualified_name(), "str.end");
        assert_eq!(rules[0].literal_text.as_deref(), Some(b"\"".as_slice()));
    }

    #[test]
    fn test_custom_escape_rule() {
        let set = RuleSet::parse("num \\%: %d+").unwrap();
        let rules = set.mode(MODE_MAIN).unwrap();
        assert_eq!(rules[0].name, "num");
        assert!(!rules[0].is_literal());
    }

    #[test]
    fn test_bare_pattern_synthesizes_name() {
        let set = RuleSet::parse("foo+\n\\d\n123").unwrap();
        let names: Vec<&str> = set.mode(MODE_MAIN).unwrap().iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["foo_", "_d", "_123"]);
    }

    #[test]
    fn test_blank_lines_and_comments_skipped() {
        let set = RuleSet::parse("\n# a comment\n  \nx: y\n").unwrap();
        assert_eq!(set.rule_count(), 1);
    }

    #[test]
    fn test_mode_transition_bare_sides() {
        let set = RuleSet::parse("str_start: \"\nstr_start -> str").unwrap();
        let t = &set.transitions()[0];
        assert_eq!(t.from.mode, MODE_MAIN);
        assert_eq!(t.from.label.as_deref(), Some("str_start"));
        assert_eq!(t.to.mode, "str");
        assert_eq!(t.to.label, None);
    }

    #[test]
    fn test_mode_transition_qualified_sides() {
        let set = RuleSet::parse("str.end -> main.ws # back out").unwrap();
        let t = &set.transitions()[0];
        assert_eq!(t.from.mode, "str");
        assert_eq!(t.from.label.as_deref(), Some("end"));
        assert_eq!(t.to.mode, "main");
        assert_eq!(t.to.label.as_deref(), Some("ws"));
    }

    #[test]
    fn test_reserved_rule_name() {
        let err = RuleSet::parse("invalid: x").unwrap_err();
        assert!(matches!(
            err.kind,
            SyntaxErrorKind::ReservedRuleName { ref name } if name == "invalid"
        ));
        let err = RuleSet::parse("str.incomplete: x").unwrap_err();
        assert!(matches!(err.kind, SyntaxErrorKind::ReservedRuleName { .. }));
    }

    #[test]
    fn test_duplicate_rule_name_same_mode() {
        let err = RuleSet::parse("a: x\na: y").unwrap_err();
        assert_eq!(err.line, 2);
        assert!(matches!(err.kind, SyntaxErrorKind::DuplicateRuleName { .. }));
    }

    #[test]
    fn test_same_label_in_different_modes_is_fine() {
        let set = RuleSet::parse("end: x\nstr.end: y").unwrap();
        assert_eq!(set.rule_count(), 2);
    }

    #[test]
    fn test_duplicate_transition_source() {
        let err = RuleSet::parse("a -> str\na -> other").unwrap_err();
        assert_eq!(err.line, 2);
        assert!(matches!(
            err.kind,
            SyntaxErrorKind::DuplicateTransitionSource { .. }
        ));
    }

    #[test]
    fn test_invalid_names_rejected() {
        for line in ["Foo: x", "9lives: x", "a.b.c: x", "a -> B!"] {
            let err = RuleSet::parse(line).unwrap_err();
            assert!(
                matches!(err.kind, SyntaxErrorKind::InvalidName { .. }),
                "{line}: {err:?}"
            );
        }
    }

    #[test]
    fn test_malformed_transition_reports_column() {
        // Scenario: missing right-hand side.
        let err = RuleSet::parse("oops ->").unwrap_err();
        assert_eq!(err.line, 1);
        assert_eq!(err.col, 8);
        assert!(matches!(err.kind, SyntaxErrorKind::MalformedTransition));
    }

    #[test]
    fn test_pattern_error_carries_line_and_column() {
        let err = RuleSet::parse("ok: x\nbad: a(b").unwrap_err();
        assert_eq!(err.line, 2);
        // Pattern text " a(b" starts at column 5; the missing ')' is
        // expected at its end, offset 4.
        assert_eq!(err.col, 5 + 4);
        assert!(matches!(
            err.kind,
            SyntaxErrorKind::Pattern(PatternErrorKind::UnterminatedGroup)
        ));
    }

    #[test]
    fn test_literal_text_detection() {
        let set = RuleSet::parse("kw: if\nident: \\l(\\l|\\d|_)*").unwrap();
        let rules = set.mode(MODE_MAIN).unwrap();
        assert_eq!(rules[0].literal_text.as_deref(), Some(b"if".as_slice()));
        assert!(rules[1].literal_text.is_none());
    }

    #[test]
    fn test_colon_in_pattern_is_not_a_rule_name() {
        // Prefix before ':' is not name-shaped, so the line is a bare
        // pattern containing a literal colon.
        let set = RuleSet::parse("(a):x").unwrap();
        let rules = set.mode(MODE_MAIN).unwrap();
        assert_eq!(rules[0].name, "_a_x");
        assert_eq!(rules[0].literal_text.as_deref(), Some(b"a:x".as_slice()));
    }

    #[test]
    fn test_is_valid_name() {
        assert!(is_valid_name("a"));
        assert!(is_valid_name("snake_case2"));
        assert!(is_valid_name("mode.label"));
        assert!(is_valid_name("mode.9label"));
        assert!(!is_valid_name("Upper"));
        assert!(!is_valid_name("9start"));
        assert!(!is_valid_name("a.b.c"));
        assert!(!is_valid_name("a."));
        assert!(!is_valid_name(""));
    }
}
