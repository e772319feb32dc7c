//! Segments source text into a classified token sequence.
//!
//! `tokenize` is a pure function: `&str -> Result<Vec<Token>>`. It never
//! mutates or reads anything outside its argument, and is the only place
//! in the crate that looks at raw bytes instead of typed tokens or AST
//! nodes.

use crate::diagnostics::{Error, Loc, Result};

/// Reserved words recognized as [`TokenKind::Reserved`] rather than
/// [`TokenKind::Ident`]. Checked only after the maximal run of identifier
/// characters has been read, so `return2` can never be mistaken for
/// `return` followed by `2` — the lexeme is compared against this table
/// as a whole word, not as a prefix.
const KEYWORDS: &[&str] = &[
    "return", "if", "else", "while", "for", "int", "char", "sizeof", "struct",
];

const TWO_CHAR_OPS: &[&str] = &["==", "!=", "<=", ">="];

const PUNCT: &[u8] = b"+-*/=(){}[]<>!;:,.&";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Reserved,
    Ident,
    Num,
    Str,
    Eof,
}

/// A single lexeme. `value` is meaningful only for [`TokenKind::Num`],
/// `bytes` only for [`TokenKind::Str`]; both are left at their defaults
/// otherwise rather than wrapped in `Option`, mirroring how the parser
/// only ever inspects the field matching `kind`.
#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub value: i32,
    pub bytes: Vec<u8>,
    pub loc: Loc,
}

impl Token {
    fn reserved(text: &str, loc: Loc) -> Self {
        Self {
            kind: TokenKind::Reserved,
            text: text.to_string(),
            value: 0,
            bytes: Vec::new(),
            loc,
        }
    }

    fn ident(text: &str, loc: Loc) -> Self {
        Self {
            kind: TokenKind::Ident,
            text: text.to_string(),
            value: 0,
            bytes: Vec::new(),
            loc,
        }
    }

    fn num(text: &str, value: i32, loc: Loc) -> Self {
        Self {
            kind: TokenKind::Num,
            text: text.to_string(),
            value,
            bytes: Vec::new(),
            loc,
        }
    }

    fn string(bytes: Vec<u8>, loc: Loc) -> Self {
        Self {
            kind: TokenKind::Str,
            text: String::new(),
            value: 0,
            bytes,
            loc,
        }
    }

    fn eof(loc: Loc) -> Self {
        Self {
            kind: TokenKind::Eof,
            text: String::new(),
            value: 0,
            bytes: Vec::new(),
            loc,
        }
    }

    /// True for `kind == Reserved` and `text == op`. Used by the parser's
    /// `consume`/`expect` helpers.
    #[must_use]
    pub fn is(&self, op: &str) -> bool {
        self.kind == TokenKind::Reserved && self.text == op
    }
}

struct Scanner<'a> {
    src: &'a [u8],
    pos: usize,
    line: usize,
    column: usize,
}

impl<'a> Scanner<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src: src.as_bytes(),
            pos: 0,
            line: 1,
            column: 1,
        }
    }

    fn loc(&self) -> Loc {
        Loc {
            offset: self.pos,
            line: self.line,
            column: self.column,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn peek_at(&self, n: usize) -> Option<u8> {
        self.src.get(self.pos + n).copied()
    }

    fn starts_with(&self, s: &str) -> bool {
        self.src[self.pos..].starts_with(s.as_bytes())
    }

    fn bump(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        if b == b'\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(b)
    }

    fn at_end(&self) -> bool {
        self.pos >= self.src.len()
    }
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_ident_continue(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Decode one backslash escape, returning the byte it represents.
/// `\a \b \t \n \v \f \r \e \0` map to their conventional byte values
/// (`\e` to 27, a GNU-ism carried over from the original tool); any other
/// character following the backslash decodes to itself.
fn decode_escape(c: u8) -> u8 {
    match c {
        b'a' => 7,
        b'b' => 8,
        b't' => 9,
        b'n' => 10,
        b'v' => 11,
        b'f' => 12,
        b'r' => 13,
        b'e' => 27,
        b'0' => 0,
        other => other,
    }
}

fn read_string(sc: &mut Scanner<'_>) -> Result<Vec<u8>> {
    let start = sc.loc();
    sc.bump(); // opening quote
    let mut bytes = Vec::new();
    loop {
        match sc.peek() {
            None => return Err(Error::UnterminatedString { loc: start }),
            Some(b'"') => {
                sc.bump();
                return Ok(bytes);
            }
            Some(b'\\') => {
                sc.bump();
                let Some(esc) = sc.bump() else {
                    return Err(Error::UnterminatedString { loc: start });
                };
                bytes.push(decode_escape(esc));
            }
            Some(b) => {
                sc.bump();
                bytes.push(b);
            }
        }
    }
}

fn skip_block_comment(sc: &mut Scanner<'_>) -> Result<()> {
    let start = sc.loc();
    sc.bump(); // '/'
    sc.bump(); // '*'
    loop {
        if sc.at_end() {
            return Err(Error::UnterminatedComment { loc: start });
        }
        if sc.peek() == Some(b'*') && sc.peek_at(1) == Some(b'/') {
            sc.bump();
            sc.bump();
            return Ok(());
        }
        sc.bump();
    }
}

/// Segment `src` into a token stream terminated by a single `Eof` token.
pub fn tokenize(src: &str) -> Result<Vec<Token>> {
    let mut sc = Scanner::new(src);
    let mut tokens = Vec::new();

    while !sc.at_end() {
        let c = sc.peek().unwrap();

        if c == b' ' || c == b'\t' || c == b'\n' || c == b'\r' {
            sc.bump();
            continue;
        }

        if sc.starts_with("//") {
            while !sc.at_end() && sc.peek() != Some(b'\n') {
                sc.bump();
            }
            continue;
        }

        if sc.starts_with("/*") {
            skip_block_comment(&mut sc)?;
            continue;
        }

        if c == b'"' {
            let loc = sc.loc();
            let bytes = read_string(&mut sc)?;
            tokens.push(Token::string(bytes, loc));
            continue;
        }

        if is_ident_start(c) {
            let loc = sc.loc();
            let start = sc.pos;
            while sc.peek().is_some_and(is_ident_continue) {
                sc.bump();
            }
            let text = std::str::from_utf8(&sc.src[start..sc.pos]).unwrap();
            if KEYWORDS.contains(&text) {
                tokens.push(Token::reserved(text, loc));
            } else {
                tokens.push(Token::ident(text, loc));
            }
            continue;
        }

        if c.is_ascii_digit() {
            let loc = sc.loc();
            let start = sc.pos;
            while sc.peek().is_some_and(|b| b.is_ascii_digit()) {
                sc.bump();
            }
            let text = std::str::from_utf8(&sc.src[start..sc.pos]).unwrap();
            let value = text.parse::<i64>().unwrap_or(i64::MAX) as i32;
            tokens.push(Token::num(text, value, loc));
            continue;
        }

        if let Some(op) = TWO_CHAR_OPS.iter().find(|op| sc.starts_with(op)) {
            let loc = sc.loc();
            sc.bump();
            sc.bump();
            tokens.push(Token::reserved(op, loc));
            continue;
        }

        if PUNCT.contains(&c) {
            let loc = sc.loc();
            sc.bump();
            tokens.push(Token::reserved(std::str::from_utf8(&[c]).unwrap(), loc));
            continue;
        }

        return Err(Error::InvalidChar {
            loc: sc.loc(),
            ch: c as char,
        });
    }

    tokens.push(Token::eof(sc.loc()));
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(toks: &[Token]) -> Vec<TokenKind> {
        toks.iter().map(|t| t.kind).collect()
    }

    #[test]
    fn keyword_boundary() {
        let toks = tokenize("return2 return").unwrap();
        assert_eq!(toks[0].kind, TokenKind::Ident);
        assert_eq!(toks[0].text, "return2");
        assert_eq!(toks[1].kind, TokenKind::Reserved);
        assert_eq!(toks[1].text, "return");
    }

    #[test]
    fn two_char_ops_take_priority() {
        let toks = tokenize("a==b a=b").unwrap();
        assert!(toks[1].is("=="));
        assert!(toks[4].is("="));
    }

    #[test]
    fn numbers() {
        let toks = tokenize("123 0").unwrap();
        assert_eq!(toks[0].value, 123);
        assert_eq!(toks[1].value, 0);
    }

    #[test]
    fn string_escapes() {
        let toks = tokenize(r#""a\nb\0c""#).unwrap();
        assert_eq!(toks[0].kind, TokenKind::Str);
        assert_eq!(toks[0].bytes, vec![b'a', b'\n', b'b', 0, b'c']);
    }

    #[test]
    fn unterminated_string_errors() {
        assert!(tokenize("\"abc").is_err());
    }

    #[test]
    fn unterminated_block_comment_errors() {
        assert!(tokenize("/* abc").is_err());
    }

    #[test]
    fn line_comment_to_newline() {
        let toks = tokenize("1 // two\n2").unwrap();
        assert_eq!(kinds(&toks), vec![TokenKind::Num, TokenKind::Num, TokenKind::Eof]);
    }

    #[test]
    fn invalid_char_is_an_error() {
        assert!(tokenize("$").is_err());
    }

    #[test]
    fn struct_and_sizeof_are_keywords() {
        let toks = tokenize("struct sizeof").unwrap();
        assert_eq!(toks[0].kind, TokenKind::Reserved);
        assert_eq!(toks[1].kind, TokenKind::Reserved);
    }

    #[test]
    fn eof_terminates_stream() {
        let toks = tokenize("").unwrap();
        assert_eq!(toks.len(), 1);
        assert_eq!(toks[0].kind, TokenKind::Eof);
    }
}
