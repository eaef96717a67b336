use std::collections::BTreeSet;

/// An ordered set of bytes, the leaf alphabet of every pattern.
///
/// Iteration order is ascending, which downstream automaton numbering
/// relies on for reproducible output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ByteSet {
    bytes: BTreeSet<u8>,
}

impl ByteSet {
    /// Create an empty byte set
    #[must_use]
    pub const fn new() -> Self {
        Self {
            bytes: BTreeSet::new(),
        }
    }

    /// Create a set containing a single byte
    #[must_use]
    pub fn single(byte: u8) -> Self {
        let mut set = Self::new();
        set.bytes.insert(byte);
        set
    }

    /// Create a set from an inclusive byte range
    #[must_use]
    pub fn range(start: u8, end: u8) -> Self {
        Self {
            bytes: (start..=end).collect(),
        }
    }

    /// The decimal digits `0-9`
    #[must_use]
    pub fn digits() -> Self {
        Self::range(b'0', b'9')
    }

    /// ASCII letters `a-z` and `A-Z`
    #[must_use]
    pub fn letters() -> Self {
        let mut set = Self::range(b'a', b'z');
        set.merge(&Self::range(b'A', b'Z'));
        set
    }

    /// Word characters: letters, digits and `_`
    #[must_use]
    pub fn word() -> Self {
        let mut set = Self::letters();
        set.merge(&Self::digits());
        set.insert(b'_');
        set
    }

    /// Hexadecimal digits `0-9`, `a-f`, `A-F`
    #[must_use]
    pub fn hex_digits() -> Self {
        let mut set = Self::digits();
        set.merge(&Self::range(b'a', b'f'));
        set.merge(&Self::range(b'A', b'F'));
        set
    }

    /// Insert a byte; returns `false` if it was already present.
    pub fn insert(&mut self, byte: u8) -> bool {
        self.bytes.insert(byte)
    }

    /// Union another set into this one
    pub fn merge(&mut self, other: &Self) {
        self.bytes.extend(other.bytes.iter().copied());
    }

    #[must_use]
    pub fn contains(&self, byte: u8) -> bool {
        self.bytes.contains(&byte)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// The complement over the full byte alphabet 0-255
    #[must_use]
    pub fn complement(&self) -> Self {
        Self {
            bytes: (0..=u8::MAX).filter(|b| !self.bytes.contains(b)).collect(),
        }
    }

    /// Iterate the bytes in ascending order
    pub fn iter(&self) -> impl Iterator<Item = u8> + '_ {
        self.bytes.iter().copied()
    }

    /// The single byte this set denotes, if it is a singleton
    #[must_use]
    pub fn as_single(&self) -> Option<u8> {
        if self.bytes.len() == 1 {
            self.bytes.first().copied()
        } else {
            None
        }
    }
}

impl FromIterator<u8> for ByteSet {
    fn from_iter<I: IntoIterator<Item = u8>>(iter: I) -> Self {
        Self {
            bytes: iter.into_iter().collect(),
        }
    }
}

/// Resolve an escape code to its byte set.
///
/// The escape table is fixed configuration data: class escapes (`d`,
/// `l`, `w`, `x`), control escapes (`n`, `t`, `_`), the pattern
/// metacharacters, and the active escape character itself. Returns
/// `None` for anything else.
#[must_use]
pub fn escape_set(code: u8, escape: u8) -> Option<ByteSet> {
    let set = match code {
        b'd' => ByteSet::digits(),
        b'l' => ByteSet::letters(),
        b'w' => ByteSet::word(),
        b'x' => ByteSet::hex_digits(),
        b'n' => ByteSet::single(b'\n'),
        b't' => ByteSet::single(b'\t'),
        b'_' => ByteSet::single(b' '),
        b'(' | b')' | b'[' | b']' | b'|' | b'*' | b'+' | b'?' | b'#' => ByteSet::single(code),
        c if c == escape => ByteSet::single(c),
        _ => return None,
    };
    Some(set)
}

/// One node of a parsed pattern, carrying its byte offset into the
/// pattern text for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Pattern {
    pub pos: u32,
    pub kind: PatternKind,
}

/// The pattern tree. Construction passes dispatch on this with
/// exhaustive `match`, so adding a variant is a compile error until
/// every pass handles it.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PatternKind {
    /// One byte out of a set
    Charset(ByteSet),
    /// Subpatterns in order
    Seq(Vec<Pattern>),
    /// Any one of the subpatterns
    Choice(Vec<Pattern>),
    /// Zero or one occurrence
    Opt(Box<Pattern>),
    /// Zero or more occurrences
    Star(Box<Pattern>),
    /// One or more occurrences
    Plus(Box<Pattern>),
}

impl Pattern {
    #[must_use]
    pub const fn new(pos: u32, kind: PatternKind) -> Self {
        Self { pos, kind }
    }

    /// The fixed byte string this pattern denotes, if any.
    ///
    /// A pattern is literal iff it is built purely from sequences of
    /// single-byte charsets: no multi-byte charset, no alternation, no
    /// quantifier.
    #[must_use]
    pub fn literal_text(&self) -> Option<Vec<u8>> {
        let mut out = Vec::new();
        if self.collect_literal(&mut out) { Some(out) } else { None }
    }

    fn collect_literal(&self, out: &mut Vec<u8>) -> bool {
        match &self.kind {
            PatternKind::Charset(set) => match set.as_single() {
                Some(byte) => {
                    out.push(byte);
                    true
                }
                None => false,
            },
            PatternKind::Seq(subs) => subs.iter().all(|sub| sub.collect_literal(out)),
            PatternKind::Choice(_)
            | PatternKind::Opt(_)
            | PatternKind::Star(_)
            | PatternKind::Plus(_) => false,
        }
    }
}
