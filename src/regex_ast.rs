//! This module contains the regular expression AST the automaton builders consume.
//! The constructors validate their input, so a successfully built AST is always compilable.

use crate::{conditional::ConditionalType, Result, ScanForgeError, ScanForgeErrorKind};

/// A set of bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ByteSet {
    bits: [u64; 4],
}

impl ByteSet {
    /// Create an empty set.
    pub fn new() -> Self {
        ByteSet::default()
    }

    /// Create the set of all bytes.
    pub fn full() -> Self {
        ByteSet {
            bits: [u64::MAX; 4],
        }
    }

    /// Create a set containing a single byte.
    pub fn from_byte(byte: u8) -> Self {
        let mut set = ByteSet::new();
        set.insert(byte);
        set
    }

    /// Create a set from an inclusive range.
    pub fn from_range(first: u8, last: u8) -> Result<Self> {
        let mut set = ByteSet::new();
        set.insert_range(first, last)?;
        Ok(set)
    }

    /// Add a byte.
    #[inline]
    pub fn insert(&mut self, byte: u8) {
        self.bits[(byte >> 6) as usize] |= 1 << (byte & 63);
    }

    /// Add an inclusive range of bytes.
    pub fn insert_range(&mut self, first: u8, last: u8) -> Result<()> {
        if first > last {
            return Err(ScanForgeError::new(
                ScanForgeErrorKind::InvalidBracketRange {
                    start: first,
                    end: last,
                },
            ));
        }
        (first..=last).for_each(|b| self.insert(b));
        Ok(())
    }

    /// Add all bytes of a POSIX character class.
    pub fn insert_posix_class(&mut self, class: PosixClass) {
        self.union_with(&class.byte_set());
    }

    /// Returns true if the byte is in the set.
    #[inline]
    pub fn contains(&self, byte: u8) -> bool {
        self.bits[(byte >> 6) as usize] & (1 << (byte & 63)) != 0
    }

    /// Returns true if the set is empty.
    pub fn is_empty(&self) -> bool {
        self.bits.iter().all(|w| *w == 0)
    }

    /// Get the number of bytes in the set.
    pub fn len(&self) -> usize {
        self.bits.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Add all bytes of the other set.
    pub fn union_with(&mut self, other: &ByteSet) {
        self.bits
            .iter_mut()
            .zip(other.bits.iter())
            .for_each(|(a, b)| *a |= b);
    }

    /// Keep only the bytes that are also in the other set.
    pub fn intersect_with(&mut self, other: &ByteSet) {
        self.bits
            .iter_mut()
            .zip(other.bits.iter())
            .for_each(|(a, b)| *a &= b);
    }

    /// Remove all bytes of the other set.
    pub fn difference_with(&mut self, other: &ByteSet) {
        self.bits
            .iter_mut()
            .zip(other.bits.iter())
            .for_each(|(a, b)| *a &= !b);
    }

    /// Keep the bytes that are in exactly one of both sets.
    pub fn symmetric_difference_with(&mut self, other: &ByteSet) {
        self.bits
            .iter_mut()
            .zip(other.bits.iter())
            .for_each(|(a, b)| *a ^= b);
    }

    /// Get the complement of the set.
    pub fn negated(&self) -> ByteSet {
        ByteSet {
            bits: self.bits.map(|w| !w),
        }
    }

    /// Get the set extended by the opposite case of every ASCII letter in it.
    pub fn case_folded(&self) -> ByteSet {
        let mut folded = *self;
        for byte in self.iter() {
            if let Some(other) = opposite_case(byte) {
                folded.insert(other);
            }
        }
        folded
    }

    /// Iterate over the bytes in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = u8> + '_ {
        (0..=255u8).filter(move |b| self.contains(*b))
    }

    /// Get the maximal runs of consecutive bytes as inclusive ranges, in ascending order.
    pub fn ranges(&self) -> Vec<(u8, u8)> {
        let mut ranges: Vec<(u8, u8)> = Vec::new();
        for byte in self.iter() {
            match ranges.last_mut() {
                Some((_, last)) if *last as u16 + 1 == byte as u16 => *last = byte,
                _ => ranges.push((byte, byte)),
            }
        }
        ranges
    }
}

/// The opposite case of an ASCII letter.
pub(crate) fn opposite_case(byte: u8) -> Option<u8> {
    match byte {
        b'a'..=b'z' => Some(byte.to_ascii_uppercase()),
        b'A'..=b'Z' => Some(byte.to_ascii_lowercase()),
        _ => None,
    }
}

/// The POSIX character classes usable in bracket expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PosixClass {
    /// `[:alnum:]`
    Alnum,
    /// `[:alpha:]`
    Alpha,
    /// `[:ascii:]`
    Ascii,
    /// `[:blank:]`
    Blank,
    /// `[:cntrl:]`
    Cntrl,
    /// `[:digit:]`
    Digit,
    /// `[:graph:]`
    Graph,
    /// `[:lower:]`
    Lower,
    /// `[:print:]`
    Print,
    /// `[:punct:]`
    Punct,
    /// `[:space:]`
    Space,
    /// `[:upper:]`
    Upper,
    /// `[:word:]`
    Word,
    /// `[:xdigit:]`
    Xdigit,
}

impl PosixClass {
    /// The bytes of the class.
    pub fn byte_set(self) -> ByteSet {
        let ranges: &[(u8, u8)] = match self {
            PosixClass::Alnum => &[(b'0', b'9'), (b'A', b'Z'), (b'a', b'z')],
            PosixClass::Alpha => &[(b'A', b'Z'), (b'a', b'z')],
            PosixClass::Ascii => &[(0x00, 0x7f)],
            PosixClass::Blank => &[(b'\t', b'\t'), (b' ', b' ')],
            PosixClass::Cntrl => &[(0x00, 0x1f), (0x7f, 0x7f)],
            PosixClass::Digit => &[(b'0', b'9')],
            PosixClass::Graph => &[(b'!', b'~')],
            PosixClass::Lower => &[(b'a', b'z')],
            PosixClass::Print => &[(b' ', b'~')],
            PosixClass::Punct => &[(b'!', b'/'), (b':', b'@'), (b'[', b'`'), (b'{', b'~')],
            PosixClass::Space => &[(b'\t', b'\r'), (b' ', b' ')],
            PosixClass::Upper => &[(b'A', b'Z')],
            PosixClass::Word => &[(b'0', b'9'), (b'A', b'Z'), (b'_', b'_'), (b'a', b'z')],
            PosixClass::Xdigit => &[(b'0', b'9'), (b'A', b'F'), (b'a', b'f')],
        };
        let mut set = ByteSet::new();
        for (first, last) in ranges {
            (*first..=*last).for_each(|b| set.insert(b));
        }
        set
    }
}

/// A bracket expression: a byte set that may be negated.
/// Negation is applied after case folding, see [`BracketCharSet::effective_set`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BracketCharSet {
    set: ByteSet,
    negated: bool,
}

impl BracketCharSet {
    /// Create a bracket expression.
    /// Fails with `EmptyBracketExpression` if it can't match any byte.
    pub fn new(set: ByteSet, negated: bool) -> Result<Self> {
        let bracket = BracketCharSet { set, negated };
        if bracket.effective_set(true).is_empty() {
            return Err(ScanForgeError::new(
                ScanForgeErrorKind::EmptyBracketExpression,
            ));
        }
        Ok(bracket)
    }

    /// The set matched by `.`: every byte except the newline.
    pub fn any_except_newline() -> Self {
        BracketCharSet {
            set: ByteSet::from_byte(b'\n'),
            negated: true,
        }
    }

    /// Get the bytes the expression matches under the given case sensitivity.
    pub fn effective_set(&self, case_sensitive: bool) -> ByteSet {
        let set = if case_sensitive {
            self.set
        } else {
            self.set.case_folded()
        };
        if self.negated {
            set.negated()
        } else {
            set
        }
    }
}

/// A repetition bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Bound {
    lower: i16,
    upper: i16,
}

impl Bound {
    /// The sentinel of `upper` for bounds without upper limit.
    pub const NO_UPPER_BOUND: i16 = -1;
    /// The largest allowed bound.
    pub const MAX: u32 = 255;

    /// Create a bound. `None` as upper bound means "no upper bound".
    pub fn new(lower: u32, upper: Option<u32>) -> Result<Self> {
        if lower > Self::MAX {
            return Err(ScanForgeError::new(ScanForgeErrorKind::OutOfRangeBound(
                lower,
            )));
        }
        match upper {
            Some(upper) if upper > Self::MAX => Err(ScanForgeError::new(
                ScanForgeErrorKind::OutOfRangeBound(upper),
            )),
            Some(upper) if lower > upper || upper == 0 => Err(ScanForgeError::new(
                ScanForgeErrorKind::InvalidBoundCombination { lower, upper },
            )),
            Some(upper) => Ok(Bound {
                lower: lower as i16,
                upper: upper as i16,
            }),
            None => Ok(Bound {
                lower: lower as i16,
                upper: Self::NO_UPPER_BOUND,
            }),
        }
    }

    /// The bound `{1,1}`.
    pub fn once() -> Self {
        Bound { lower: 1, upper: 1 }
    }

    /// Get the lower bound.
    pub fn lower(&self) -> i16 {
        self.lower
    }

    /// Get the upper bound or [`Bound::NO_UPPER_BOUND`].
    pub fn upper(&self) -> i16 {
        self.upper
    }

    /// Returns true if there is no upper bound.
    pub fn is_unbounded(&self) -> bool {
        self.upper == Self::NO_UPPER_BOUND
    }
}

/// Control characters that change how the rest of the enclosing group is compiled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BakedControlChar {
    /// Switch to case-sensitive matching.
    CaseSensitive,
    /// Switch to case-insensitive matching.
    CaseInsensitive,
}

/// The atom of a piece.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Atom {
    /// A literal byte.
    Char(u8),
    /// A zero-width assertion.
    Conditional(ConditionalType),
    /// A bracket expression.
    BracketCharSet(BracketCharSet),
    /// A case-sensitivity switch.
    BakedControlChar(BakedControlChar),
    /// A nested regular expression.
    Group(RegularExpression),
}

/// An atom with its repetition bound.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Piece {
    /// The repeated atom.
    pub atom: Atom,
    /// How often the atom is repeated.
    pub bound: Bound,
}

impl Piece {
    /// Create a piece.
    pub fn new(atom: Atom, bound: Bound) -> Self {
        Piece { atom, bound }
    }

    /// Create a piece that matches the atom exactly once.
    pub fn once(atom: Atom) -> Self {
        Piece::new(atom, Bound::once())
    }
}

/// A sequence of pieces.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Branch {
    /// The pieces in sequence.
    pub pieces: Vec<Piece>,
}

impl Branch {
    /// Create a branch.
    pub fn new(pieces: Vec<Piece>) -> Self {
        Branch { pieces }
    }
}

/// An alternation of branches.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct RegularExpression {
    /// The alternatives.
    pub branches: Vec<Branch>,
}

impl RegularExpression {
    /// Create a regular expression.
    pub fn new(branches: Vec<Branch>) -> Self {
        RegularExpression { branches }
    }
}
