//! Source locations and the compiler-wide error type.
//!
//! Every fallible stage of the pipeline (lexer, parser, type resolver)
//! returns `Result<_, Error>`. There is no recovery: the first error a
//! stage produces is the one the caller reports, per the "first error
//! wins" discipline described for this compiler.

use std::fmt;

/// A position in the source text, carried on every token and diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Loc {
    pub offset: usize,
    pub line: usize,
    pub column: usize,
}

impl Loc {
    pub const START: Self = Self {
        offset: 0,
        line: 1,
        column: 1,
    };
}

impl fmt::Display for Loc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Everything that can go wrong while compiling a translation unit.
///
/// Variants are grouped by the taxonomy the compiler reports against:
/// lexical, syntactic, semantic. Each carries the `Loc` it was raised at
/// so the caller can print a short, location-tagged message.
#[derive(Debug, Clone)]
pub enum Error {
    // --- lexical ---
    InvalidChar { loc: Loc, ch: char },
    UnterminatedString { loc: Loc },
    UnterminatedComment { loc: Loc },

    // --- syntactic ---
    ExpectedPunct {
        loc: Loc,
        want: &'static str,
        found: String,
    },
    ExpectedIdent { loc: Loc, found: String },
    ExpectedNumber { loc: Loc, found: String },
    UnexpectedEof { loc: Loc, while_parsing: &'static str },

    // --- semantic ---
    UndefinedIdent { loc: Loc, name: String },
    Redeclared { loc: Loc, name: String },
    NotAPointerOrArray { loc: Loc },
    NotAStruct { loc: Loc },
    NotAnLvalue { loc: Loc },
    UnknownMember { loc: Loc, name: String },
    UnknownFunction { loc: Loc, name: String },
}

impl Error {
    /// The location this diagnostic should be reported at.
    #[must_use]
    pub fn loc(&self) -> Loc {
        match *self {
            Self::InvalidChar { loc, .. }
            | Self::UnterminatedString { loc }
            | Self::UnterminatedComment { loc }
            | Self::ExpectedPunct { loc, .. }
            | Self::ExpectedIdent { loc, .. }
            | Self::ExpectedNumber { loc, .. }
            | Self::UnexpectedEof { loc, .. }
            | Self::UndefinedIdent { loc, .. }
            | Self::Redeclared { loc, .. }
            | Self::NotAPointerOrArray { loc }
            | Self::NotAStruct { loc }
            | Self::NotAnLvalue { loc }
            | Self::UnknownMember { loc, .. }
            | Self::UnknownFunction { loc, .. } => loc,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let loc = self.loc();
        match self {
            Self::InvalidChar { ch, .. } => write!(f, "{loc}: invalid character '{ch}'"),
            Self::UnterminatedString { .. } => write!(f, "{loc}: unterminated string literal"),
            Self::UnterminatedComment { .. } => write!(f, "{loc}: unterminated block comment"),
            Self::ExpectedPunct { want, found, .. } => {
                write!(f, "{loc}: expected '{want}', found '{found}'")
            }
            Self::ExpectedIdent { found, .. } => {
                write!(f, "{loc}: expected an identifier, found '{found}'")
            }
            Self::ExpectedNumber { found, .. } => {
                write!(f, "{loc}: expected a number, found '{found}'")
            }
            Self::UnexpectedEof { while_parsing, .. } => {
                write!(f, "{loc}: unexpected end of input while parsing {while_parsing}")
            }
            Self::UndefinedIdent { name, .. } => write!(f, "{loc}: undefined identifier '{name}'"),
            Self::Redeclared { name, .. } => write!(f, "{loc}: '{name}' is already declared"),
            Self::NotAPointerOrArray { .. } => {
                write!(f, "{loc}: dereferenced expression is not a pointer or array")
            }
            Self::NotAStruct { .. } => write!(f, "{loc}: expression is not a struct"),
            Self::NotAnLvalue { .. } => write!(f, "{loc}: expression is not assignable"),
            Self::UnknownMember { name, .. } => write!(f, "{loc}: no member named '{name}'"),
            Self::UnknownFunction { name, .. } => write!(f, "{loc}: call to undeclared function '{name}'"),
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;
