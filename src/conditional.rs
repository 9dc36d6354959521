//! This module contains the conditional algebra used for zero-width assertions.
//! A conditional is a pair of bit sets: the mask selects the assertions that are constrained and
//! the flags give the required value of each constrained assertion.

use crate::{Result, ScanForgeError, ScanForgeErrorKind};

/// Flag bit of the beginning-of-input assertion.
pub const BEGINNING_OF_INPUT: u8 = 1 << 0;
/// Flag bit of the end-of-input assertion.
pub const END_OF_INPUT: u8 = 1 << 1;
/// Flag bit of the beginning-of-line assertion.
pub const BEGINNING_OF_LINE: u8 = 1 << 2;
/// Flag bit of the end-of-line assertion.
pub const END_OF_LINE: u8 = 1 << 3;
/// Flag bit of the word-boundary assertion.
pub const WORD_BOUNDARY: u8 = 1 << 4;
/// All assertion bits.
pub const ALL_CONDITIONAL_BITS: u8 = 0x1F;
/// The number of distinct live flag values, i.e. the size of a conditional lookup table.
pub const CONDITIONAL_FLAG_COMBINATIONS: usize = 1 << 5;

/// A zero-width assertion or a composition of several of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Conditional {
    mask: u8,
    flags: u8,
}

impl Conditional {
    /// The conditional without any constraint.
    pub const EMPTY: Conditional = Conditional { mask: 0, flags: 0 };

    /// Create a new conditional. Flags outside of the mask are dropped.
    pub fn new(mask: u8, flags: u8) -> Self {
        debug_assert_eq!(mask & !ALL_CONDITIONAL_BITS, 0);
        Conditional {
            mask,
            flags: flags & mask,
        }
    }

    /// Get the mask of constrained assertions.
    #[inline]
    pub fn mask(&self) -> u8 {
        self.mask
    }

    /// Get the required values of the constrained assertions.
    #[inline]
    pub fn flags(&self) -> u8 {
        self.flags
    }

    /// Returns true if the conditional doesn't constrain anything.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.mask == 0
    }

    /// Returns true if the observed assertion flags satisfy this conditional.
    #[inline]
    pub fn accepts(&self, observed_flags: u8) -> bool {
        observed_flags & self.mask == self.flags
    }

    /// Returns true if both conditionals constrain a common assertion to different values.
    #[inline]
    pub fn conflicts_with(&self, other: &Conditional) -> bool {
        let common = self.mask & other.mask;
        self.flags & common != other.flags & common
    }

    /// Compose two conditionals that must hold at the same position.
    pub fn compose(&self, other: &Conditional) -> Result<Conditional> {
        if self.conflicts_with(other) {
            return Err(ScanForgeError::new(
                ScanForgeErrorKind::ConflictingConditional {
                    existing: *self,
                    added: *other,
                },
            ));
        }
        Ok(Conditional {
            mask: self.mask | other.mask,
            flags: self.flags | other.flags,
        })
    }

    /// Advance the flags to the next value that is consistent with the mask.
    /// After the last value the flags wrap around to 0.
    #[inline]
    pub fn increment(&mut self) {
        self.flags = (self.flags | !self.mask).wrapping_add(1) & self.mask;
    }

    /// Iterate over all conditionals with the given mask, starting with all flags cleared.
    pub fn combinations(mask: u8) -> Combinations {
        Combinations {
            current: Conditional::new(mask, 0),
            done: false,
        }
    }
}

/// Iterator over all flag values consistent with a mask.
#[derive(Debug, Clone)]
pub struct Combinations {
    current: Conditional,
    done: bool,
}

impl Iterator for Combinations {
    type Item = Conditional;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let conditional = self.current;
        self.current.increment();
        self.done = self.current.flags == 0;
        Some(conditional)
    }
}

/// The primitive zero-width assertions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ConditionalType {
    /// `\A`
    BeginningOfInput,
    /// Negation of `\A`
    NotBeginningOfInput,
    /// `\z`
    EndOfInput,
    /// Negation of `\z`
    NotEndOfInput,
    /// `^`
    BeginningOfLine,
    /// Negation of `^`
    NotBeginningOfLine,
    /// `$`
    EndOfLine,
    /// Negation of `$`
    NotEndOfLine,
    /// `\b`
    WordBoundary,
    /// `\B`
    NotWordBoundary,
}

impl ConditionalType {
    /// The assertion bit this type constrains.
    pub fn bit(self) -> u8 {
        match self {
            ConditionalType::BeginningOfInput | ConditionalType::NotBeginningOfInput => {
                BEGINNING_OF_INPUT
            }
            ConditionalType::EndOfInput | ConditionalType::NotEndOfInput => END_OF_INPUT,
            ConditionalType::BeginningOfLine | ConditionalType::NotBeginningOfLine => {
                BEGINNING_OF_LINE
            }
            ConditionalType::EndOfLine | ConditionalType::NotEndOfLine => END_OF_LINE,
            ConditionalType::WordBoundary | ConditionalType::NotWordBoundary => WORD_BOUNDARY,
        }
    }

    /// Returns true if the type requires the assertion to be false.
    pub fn is_negated(self) -> bool {
        matches!(
            self,
            ConditionalType::NotBeginningOfInput
                | ConditionalType::NotEndOfInput
                | ConditionalType::NotBeginningOfLine
                | ConditionalType::NotEndOfLine
                | ConditionalType::NotWordBoundary
        )
    }

    fn from_bit(bit: u8, negated: bool) -> Self {
        match (bit, negated) {
            (BEGINNING_OF_INPUT, false) => ConditionalType::BeginningOfInput,
            (BEGINNING_OF_INPUT, true) => ConditionalType::NotBeginningOfInput,
            (END_OF_INPUT, false) => ConditionalType::EndOfInput,
            (END_OF_INPUT, true) => ConditionalType::NotEndOfInput,
            (BEGINNING_OF_LINE, false) => ConditionalType::BeginningOfLine,
            (BEGINNING_OF_LINE, true) => ConditionalType::NotBeginningOfLine,
            (END_OF_LINE, false) => ConditionalType::EndOfLine,
            (END_OF_LINE, true) => ConditionalType::NotEndOfLine,
            (WORD_BOUNDARY, false) => ConditionalType::WordBoundary,
            (WORD_BOUNDARY, true) => ConditionalType::NotWordBoundary,
            _ => unreachable!("not a single conditional bit: {bit:#x}"),
        }
    }
}

/// Create the conditional of a primitive assertion.
pub fn conditional_from_type(conditional_type: ConditionalType) -> Conditional {
    let bit = conditional_type.bit();
    let flags = if conditional_type.is_negated() { 0 } else { bit };
    Conditional::new(bit, flags)
}

/// Take the lowest constrained assertion out of the conditional and return its type.
/// Call repeatedly until the mask is empty to decompose a composed conditional.
///
/// # Panics
/// Panics if the conditional is empty.
pub fn type_from_conditional(conditional: &mut Conditional) -> ConditionalType {
    assert!(!conditional.is_empty(), "can't take a type from an empty conditional");
    let bit = conditional.mask & conditional.mask.wrapping_neg();
    let negated = conditional.flags & bit == 0;
    conditional.mask &= !bit;
    conditional.flags &= !bit;
    ConditionalType::from_bit(bit, negated)
}

/// Returns true for the bytes that count as word characters for the word-boundary assertion.
#[inline]
pub fn is_word_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'_'
}

/// Evaluate all assertions at the given position of the input.
/// The position lies between `input[position - 1]` and `input[position]`.
pub fn live_flags(input: &[u8], position: usize) -> u8 {
    debug_assert!(position <= input.len());
    let previous = position.checked_sub(1).map(|p| input[p]);
    let next = input.get(position).copied();
    let mut flags = 0;
    if position == 0 {
        flags |= BEGINNING_OF_INPUT;
    }
    if next.is_none() {
        flags |= END_OF_INPUT;
    }
    if previous.map_or(true, |b| b == b'\n') {
        flags |= BEGINNING_OF_LINE;
    }
    if next.map_or(true, |b| b == b'\n') {
        flags |= END_OF_LINE;
    }
    if previous.is_some_and(is_word_byte) != next.is_some_and(is_word_byte) {
        flags |= WORD_BOUNDARY;
    }
    flags
}
