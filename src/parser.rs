//! This module contains the front end for the regex syntax.
//! We use the `regex_syntax` crate to parse the regex syntax into its AST and lower that AST into
//! our own [`RegularExpression`]. Only a byte oriented subset of the regex syntax is supported.

use log::trace;
use regex_syntax::ast::{
    parse::Parser, Ast, AssertionKind, ClassAsciiKind, ClassPerl, ClassPerlKind, ClassSet,
    ClassSetBinaryOpKind, ClassSetItem, Flag, Flags, FlagsItemKind, GroupKind, Literal,
    LiteralKind, RepetitionKind, RepetitionRange,
};
use std::time::Instant;

use crate::{
    conditional::ConditionalType,
    regex_ast::{
        Atom, BakedControlChar, Bound, BracketCharSet, Branch, ByteSet, Piece, PosixClass,
        RegularExpression,
    },
    unsupported, Result,
};

/// Parse the regex syntax into a [`RegularExpression`].
/// # Arguments
/// * `input` - A string slice that holds the regex syntax.
/// # Errors
/// An error is returned if the regex syntax is invalid or uses an unsupported feature.
pub fn parse_regex_syntax(input: &str) -> Result<RegularExpression> {
    let now = Instant::now();
    let syntax_tree = Parser::new().parse(input)?;
    let elapsed_time = now.elapsed();
    trace!("Parsing took {} milliseconds.", elapsed_time.as_millis());
    lower_ast(&syntax_tree)
}

/// Lower a `regex_syntax` AST into a [`RegularExpression`].
pub fn lower_ast(ast: &Ast) -> Result<RegularExpression> {
    match ast {
        Ast::Alternation(alternation) => Ok(RegularExpression::new(
            alternation
                .asts
                .iter()
                .map(lower_branch)
                .collect::<Result<Vec<_>>>()?,
        )),
        _ => Ok(RegularExpression::new(vec![lower_branch(ast)?])),
    }
}

fn lower_branch(ast: &Ast) -> Result<Branch> {
    let mut pieces = Vec::new();
    match ast {
        Ast::Concat(concat) => {
            for ast in &concat.asts {
                lower_pieces(ast, &mut pieces)?;
            }
        }
        _ => lower_pieces(ast, &mut pieces)?,
    }
    Ok(Branch::new(pieces))
}

fn lower_pieces(ast: &Ast, pieces: &mut Vec<Piece>) -> Result<()> {
    match ast {
        Ast::Empty(_) => {}
        Ast::Flags(set_flags) => pieces.extend(lower_flags(&set_flags.flags)?),
        Ast::Repetition(repetition) => {
            let bound = match &repetition.op.kind {
                RepetitionKind::ZeroOrOne => Bound::new(0, Some(1))?,
                RepetitionKind::ZeroOrMore => Bound::new(0, None)?,
                RepetitionKind::OneOrMore => Bound::new(1, None)?,
                RepetitionKind::Range(RepetitionRange::Exactly(n)) => Bound::new(*n, Some(*n))?,
                RepetitionKind::Range(RepetitionRange::AtLeast(n)) => Bound::new(*n, None)?,
                RepetitionKind::Range(RepetitionRange::Bounded(m, n)) => {
                    Bound::new(*m, Some(*n))?
                }
            };
            // Non-greedy repetitions match the same language, the longest match decides anyway.
            pieces.push(Piece::new(lower_atom(&repetition.ast)?, bound));
        }
        _ => pieces.push(Piece::once(lower_atom(ast)?)),
    }
    Ok(())
}

fn lower_atom(ast: &Ast) -> Result<Atom> {
    match ast {
        Ast::Literal(literal) => Ok(Atom::Char(literal_byte(literal)?)),
        Ast::Dot(_) => Ok(Atom::BracketCharSet(BracketCharSet::any_except_newline())),
        Ast::Assertion(assertion) => {
            let conditional_type = match assertion.kind {
                AssertionKind::StartLine => ConditionalType::BeginningOfLine,
                AssertionKind::EndLine => ConditionalType::EndOfLine,
                AssertionKind::StartText => ConditionalType::BeginningOfInput,
                AssertionKind::EndText => ConditionalType::EndOfInput,
                AssertionKind::WordBoundary => ConditionalType::WordBoundary,
                AssertionKind::NotWordBoundary => ConditionalType::NotWordBoundary,
                _ => return Err(unsupported!(format!("assertion {:?}", assertion.kind))),
            };
            Ok(Atom::Conditional(conditional_type))
        }
        Ast::ClassUnicode(_) => Err(unsupported!("Unicode character classes")),
        Ast::ClassPerl(class) => Ok(Atom::BracketCharSet(BracketCharSet::new(
            perl_class_set(class),
            class.negated,
        )?)),
        Ast::ClassBracketed(class) => Ok(Atom::BracketCharSet(BracketCharSet::new(
            class_set(&class.kind)?,
            class.negated,
        )?)),
        Ast::Group(group) => {
            let inner = lower_ast(&group.ast)?;
            match &group.kind {
                GroupKind::NonCapturing(flags) if !flags.items.is_empty() => {
                    let mut pieces = lower_flags(flags)?;
                    pieces.push(Piece::once(Atom::Group(inner)));
                    Ok(Atom::Group(RegularExpression::new(vec![Branch::new(
                        pieces,
                    )])))
                }
                _ => Ok(Atom::Group(inner)),
            }
        }
        Ast::Empty(_)
        | Ast::Flags(_)
        | Ast::Repetition(_)
        | Ast::Alternation(_)
        | Ast::Concat(_) => Ok(Atom::Group(lower_ast(ast)?)),
    }
}

/// The case-insensitivity flag becomes a baked control char, the flags that don't change the
/// byte automaton are ignored.
fn lower_flags(flags: &Flags) -> Result<Vec<Piece>> {
    let mut pieces = Vec::new();
    let mut negated = false;
    for item in &flags.items {
        match &item.kind {
            FlagsItemKind::Negation => negated = true,
            FlagsItemKind::Flag(Flag::CaseInsensitive) => {
                let control = if negated {
                    BakedControlChar::CaseSensitive
                } else {
                    BakedControlChar::CaseInsensitive
                };
                pieces.push(Piece::once(Atom::BakedControlChar(control)));
            }
            FlagsItemKind::Flag(Flag::MultiLine | Flag::Unicode | Flag::SwapGreed) => {}
            FlagsItemKind::Flag(flag) => return Err(unsupported!(format!("flag {flag:?}"))),
        }
    }
    Ok(pieces)
}

// Escapes like `\xE9` denote a byte. A verbatim non-ASCII char stands for its UTF-8 encoding,
// which a single byte can't hold.
fn literal_byte(literal: &Literal) -> Result<u8> {
    let c = literal.c;
    if literal.kind == LiteralKind::Verbatim && !c.is_ascii() {
        return Err(unsupported!(format!("non-ASCII character {c:?}")));
    }
    u8::try_from(c as u32)
        .map_err(|_| unsupported!(format!("character {c:?} outside of the byte range")))
}

fn perl_class_set(class: &ClassPerl) -> ByteSet {
    let posix = match class.kind {
        ClassPerlKind::Digit => PosixClass::Digit,
        ClassPerlKind::Space => PosixClass::Space,
        ClassPerlKind::Word => PosixClass::Word,
    };
    posix.byte_set()
}

fn posix_class(kind: &ClassAsciiKind) -> PosixClass {
    match kind {
        ClassAsciiKind::Alnum => PosixClass::Alnum,
        ClassAsciiKind::Alpha => PosixClass::Alpha,
        ClassAsciiKind::Ascii => PosixClass::Ascii,
        ClassAsciiKind::Blank => PosixClass::Blank,
        ClassAsciiKind::Cntrl => PosixClass::Cntrl,
        ClassAsciiKind::Digit => PosixClass::Digit,
        ClassAsciiKind::Graph => PosixClass::Graph,
        ClassAsciiKind::Lower => PosixClass::Lower,
        ClassAsciiKind::Print => PosixClass::Print,
        ClassAsciiKind::Punct => PosixClass::Punct,
        ClassAsciiKind::Space => PosixClass::Space,
        ClassAsciiKind::Upper => PosixClass::Upper,
        ClassAsciiKind::Word => PosixClass::Word,
        ClassAsciiKind::Xdigit => PosixClass::Xdigit,
    }
}

fn class_set(set: &ClassSet) -> Result<ByteSet> {
    match set {
        ClassSet::Item(item) => class_set_item(item),
        ClassSet::BinaryOp(op) => {
            let mut lhs = class_set(&op.lhs)?;
            let rhs = class_set(&op.rhs)?;
            match op.kind {
                ClassSetBinaryOpKind::Intersection => lhs.intersect_with(&rhs),
                ClassSetBinaryOpKind::Difference => lhs.difference_with(&rhs),
                ClassSetBinaryOpKind::SymmetricDifference => lhs.symmetric_difference_with(&rhs),
            }
            Ok(lhs)
        }
    }
}

fn class_set_item(item: &ClassSetItem) -> Result<ByteSet> {
    match item {
        ClassSetItem::Empty(_) => Ok(ByteSet::new()),
        ClassSetItem::Literal(literal) => Ok(ByteSet::from_byte(literal_byte(literal)?)),
        ClassSetItem::Range(range) => {
            ByteSet::from_range(literal_byte(&range.start)?, literal_byte(&range.end)?)
        }
        ClassSetItem::Ascii(class) => {
            let set = posix_class(&class.kind).byte_set();
            Ok(if class.negated { set.negated() } else { set })
        }
        ClassSetItem::Unicode(_) => Err(unsupported!("Unicode character classes")),
        ClassSetItem::Perl(class) => {
            let set = perl_class_set(class);
            Ok(if class.negated { set.negated() } else { set })
        }
        ClassSetItem::Bracketed(class) => {
            let set = class_set(&class.kind)?;
            Ok(if class.negated { set.negated() } else { set })
        }
        ClassSetItem::Union(union) => {
            let mut set = ByteSet::new();
            for item in &union.items {
                set.union_with(&class_set_item(item)?);
            }
            Ok(set)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ScanForgeErrorKind;

    fn single_branch(input: &str) -> Vec<Piece> {
        let mut regex = parse_regex_syntax(input).unwrap();
        assert_eq!(regex.branches.len(), 1);
        regex.branches.remove(0).pieces
    }

    #[test]
    fn test_parse_literals() {
        let pieces = single_branch("ab");
        assert_eq!(
            pieces,
            vec![Piece::once(Atom::Char(b'a')), Piece::once(Atom::Char(b'b'))]
        );
        assert_eq!(single_branch(r"\xE9"), vec![Piece::once(Atom::Char(0xe9))]);
    }

    #[test]
    fn test_parse_alternation() {
        let regex = parse_regex_syntax("a|bc|").unwrap();
        assert_eq!(regex.branches.len(), 3);
        assert_eq!(regex.branches[1].pieces.len(), 2);
        assert!(regex.branches[2].pieces.is_empty());
    }

    #[test]
    fn test_parse_empty() {
        let regex = parse_regex_syntax("").unwrap();
        assert_eq!(regex.branches.len(), 1);
        assert!(regex.branches[0].pieces.is_empty());
    }

    #[test]
    fn test_parse_repetitions() {
        let bounds: Vec<(i16, i16)> = single_branch("a?b*c+d{2}e{3,}f{2,4}")
            .iter()
            .map(|p| (p.bound.lower(), p.bound.upper()))
            .collect();
        assert_eq!(
            bounds,
            vec![(0, 1), (0, -1), (1, -1), (2, 2), (3, -1), (2, 4)]
        );
    }

    #[test]
    fn test_parse_classes() {
        let pieces = single_branch(r"\d[^a-c][[:alpha:]&&[^x]].");
        let sets: Vec<ByteSet> = pieces
            .iter()
            .map(|p| match &p.atom {
                Atom::BracketCharSet(bracket) => bracket.effective_set(true),
                other => panic!("unexpected atom {other:?}"),
            })
            .collect();
        assert_eq!(sets[0].ranges(), vec![(b'0', b'9')]);
        assert!(!sets[1].contains(b'b'));
        assert_eq!(sets[1].len(), 253);
        assert_eq!(sets[2].len(), 51);
        assert!(!sets[2].contains(b'x'));
        assert_eq!(sets[3].len(), 255);
        assert!(!sets[3].contains(b'\n'));
    }

    #[test]
    fn test_parse_assertions() {
        let pieces = single_branch(r"^\A\b\B$\z");
        let types: Vec<ConditionalType> = pieces
            .iter()
            .map(|p| match p.atom {
                Atom::Conditional(t) => t,
                _ => panic!("expected a conditional"),
            })
            .collect();
        assert_eq!(
            types,
            vec![
                ConditionalType::BeginningOfLine,
                ConditionalType::BeginningOfInput,
                ConditionalType::WordBoundary,
                ConditionalType::NotWordBoundary,
                ConditionalType::EndOfLine,
                ConditionalType::EndOfInput,
            ]
        );
    }

    #[test]
    fn test_parse_flags() {
        let pieces = single_branch("(?i)a(?-i:b)");
        assert_eq!(
            pieces[0].atom,
            Atom::BakedControlChar(BakedControlChar::CaseInsensitive)
        );
        match &pieces[2].atom {
            Atom::Group(group) => {
                assert_eq!(
                    group.branches[0].pieces[0].atom,
                    Atom::BakedControlChar(BakedControlChar::CaseSensitive)
                );
            }
            other => panic!("unexpected atom {other:?}"),
        }
        // Flags without effect on the byte automaton are accepted
        assert_eq!(single_branch("(?mu)a").len(), 1);
    }

    #[test]
    fn test_parse_unsupported() {
        for input in [r"\pL", "€", "é", "[à-é]", "[xé]", "(?s).", r"\b{start}"] {
            let err = parse_regex_syntax(input).unwrap_err();
            assert!(
                matches!(err.kind(), ScanForgeErrorKind::UnsupportedFeature(_)),
                "{input}: {err}"
            );
        }
    }

    #[test]
    fn test_parse_escaped_bytes() {
        for input in [r"\xE9", r"\x{E9}", r"\u00E9"] {
            let pieces = single_branch(input);
            assert_eq!(pieces[0].atom, Atom::Char(0xE9), "{input}");
        }
        let pieces = single_branch(r"[\xE0-\xE9]");
        match &pieces[0].atom {
            Atom::BracketCharSet(set) => assert_eq!(set.effective_set(true).len(), 10),
            atom => panic!("expected a bracket expression, got {atom:?}"),
        }
    }

    #[test]
    fn test_parse_invalid() {
        let err = parse_regex_syntax(r"^\d{4}-\d{2}-\d{2}$[").unwrap_err();
        assert!(matches!(err.kind(), ScanForgeErrorKind::RegexSyntaxError(_)));
        let err = parse_regex_syntax("a{300}").unwrap_err();
        assert!(matches!(err.kind(), ScanForgeErrorKind::OutOfRangeBound(300)));
        let err = parse_regex_syntax("a{0}").unwrap_err();
        assert!(matches!(
            err.kind(),
            ScanForgeErrorKind::InvalidBoundCombination { lower: 0, upper: 0 }
        ));
    }
}
