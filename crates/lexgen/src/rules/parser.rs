use crate::error::{PatternError, PatternErrorKind};

use super::pattern::{ByteSet, Pattern, PatternKind, escape_set};

/// Parser for a single rule's pattern text.
///
/// Whitespace is insignificant outside character classes and `#` starts
/// a trailing comment. The escape character defaults to `\` and can be
/// overridden per rule (`name \X: pattern` in a rule file).
#[derive(Debug, Clone, Copy)]
pub struct PatternParser {
    escape: u8,
}

/// One open group (or the pattern root): the alternatives finished so
/// far and the sequence currently being collected.
struct Frame {
    open_pos: u32,
    alternatives: Vec<Vec<Pattern>>,
    seq: Vec<Pattern>,
}

impl Frame {
    fn new(open_pos: u32) -> Self {
        Self {
            open_pos,
            alternatives: Vec::new(),
            seq: Vec::new(),
        }
    }

    fn end_alternative(&mut self, pos: usize) -> Result<(), PatternError> {
        if self.seq.is_empty() {
            return Err(PatternError::new(pos, PatternErrorKind::EmptyAlternative));
        }
        self.alternatives.push(std::mem::take(&mut self.seq));
        Ok(())
    }

    fn finish(mut self, pos: usize) -> Result<Pattern, PatternError> {
        self.end_alternative(pos)?;
        let mut alts: Vec<Pattern> = self.alternatives.into_iter().map(seq_pattern).collect();
        if alts.len() == 1 {
            Ok(alts.pop().unwrap())
        } else {
            Ok(Pattern::new(self.open_pos, PatternKind::Choice(alts)))
        }
    }
}

fn seq_pattern(mut seq: Vec<Pattern>) -> Pattern {
    if seq.len() == 1 {
        seq.pop().unwrap()
    } else {
        let pos = seq[0].pos;
        Pattern::new(pos, PatternKind::Seq(seq))
    }
}

impl Default for PatternParser {
    fn default() -> Self {
        Self::new()
    }
}

impl PatternParser {
    #[must_use]
    pub const fn new() -> Self {
        Self { escape: b'\\' }
    }

    #[must_use]
    pub const fn with_escape(escape: u8) -> Self {
        Self { escape }
    }

    /// Parse pattern text into a [`Pattern`] tree.
    ///
    /// # Errors
    ///
    /// Returns a [`PatternError`] positioned at the offending byte for
    /// any grammar violation; unbalanced `(` and `[` are reported at
    /// the position where the terminator was expected.
    pub fn parse(&self, text: &str) -> Result<Pattern, PatternError> {
        let bytes = text.as_bytes();
        let mut stack = vec![Frame::new(0)];
        let mut i = 0;

        while i < bytes.len() {
            let b = bytes[i];
            match b {
                b'#' => break,
                _ if b.is_ascii_whitespace() => i += 1,
                b'(' => {
                    stack.push(Frame::new(i as u32));
                    i += 1;
                }
                b')' => {
                    let frame = stack.pop().unwrap();
                    if stack.is_empty() {
                        return Err(PatternError::new(
                            i,
                            PatternErrorKind::StrayTerminator { terminator: ')' },
                        ));
                    }
                    let group = frame.finish(i)?;
                    stack.last_mut().unwrap().seq.push(group);
                    i += 1;
                }
                b'|' => {
                    stack.last_mut().unwrap().end_alternative(i)?;
                    i += 1;
                }
                b'?' | b'*' | b'+' => {
                    let frame = stack.last_mut().unwrap();
                    let Some(atom) = frame.seq.pop() else {
                        return Err(PatternError::new(
                            i,
                            PatternErrorKind::DanglingQuantifier {
                                quantifier: b as char,
                            },
                        ));
                    };
                    let pos = atom.pos;
                    let kind = match b {
                        b'?' => PatternKind::Opt(Box::new(atom)),
                        b'*' => PatternKind::Star(Box::new(atom)),
                        _ => PatternKind::Plus(Box::new(atom)),
                    };
                    frame.seq.push(Pattern::new(pos, kind));
                    i += 1;
                }
                b'[' => {
                    let (set, next) = self.parse_class(bytes, i)?;
                    stack
                        .last_mut()
                        .unwrap()
                        .seq
                        .push(Pattern::new(i as u32, PatternKind::Charset(set)));
                    i = next;
                }
                b']' => {
                    return Err(PatternError::new(
                        i,
                        PatternErrorKind::StrayTerminator { terminator: ']' },
                    ));
                }
                _ if b == self.escape => {
                    let set = self.escape_at(bytes, i)?;
                    stack
                        .last_mut()
                        .unwrap()
                        .seq
                        .push(Pattern::new(i as u32, PatternKind::Charset(set)));
                    i += 2;
                }
                _ => {
                    stack
                        .last_mut()
                        .unwrap()
                        .seq
                        .push(Pattern::new(i as u32, PatternKind::Charset(ByteSet::single(b))));
                    i += 1;
                }
            }
        }

        if stack.len() > 1 {
            return Err(PatternError::new(
                bytes.len(),
                PatternErrorKind::UnterminatedGroup,
            ));
        }
        stack.pop().unwrap().finish(bytes.len())
    }

    /// Resolve the escape starting at `bytes[i]` (the escape character).
    fn escape_at(&self, bytes: &[u8], i: usize) -> Result<ByteSet, PatternError> {
        let Some(&code) = bytes.get(i + 1) else {
            return Err(PatternError::new(i, PatternErrorKind::DanglingEscape));
        };
        escape_set(code, self.escape).ok_or_else(|| {
            PatternError::new(
                i + 1,
                PatternErrorKind::UnknownEscape { code: code as char },
            )
        })
    }

    /// Parse a `[...]` class starting at the `[`; returns the set and
    /// the index just past the closing `]`. Whitespace is significant
    /// here and `#` is a plain byte.
    fn parse_class(&self, bytes: &[u8], open: usize) -> Result<(ByteSet, usize), PatternError> {
        let mut i = open + 1;
        let negate = bytes.get(i) == Some(&b'^');
        if negate {
            i += 1;
        }

        let mut set = ByteSet::new();
        // Only literal repeats are errors; escape classes may overlap.
        let mut literals = ByteSet::new();
        loop {
            let Some(&b) = bytes.get(i) else {
                return Err(PatternError::new(
                    bytes.len(),
                    PatternErrorKind::UnterminatedClass,
                ));
            };
            if b == b']' {
                i += 1;
                break;
            }
            if b == self.escape {
                let sub = self.escape_at(bytes, i)?;
                set.merge(&sub);
                i += 2;
            } else {
                if !literals.insert(b) {
                    return Err(PatternError::new(
                        i,
                        PatternErrorKind::DuplicateClassChar { ch: b as char },
                    ));
                }
                set.insert(b);
                i += 1;
            }
        }

        let set = if negate { set.complement() } else { set };
        if set.is_empty() {
            return Err(PatternError::new(open, PatternErrorKind::EmptyClass));
        }
        Ok((set, i))
    }
}
