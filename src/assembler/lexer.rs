//! This lexer tokenizes LC-3 assembly.
//!
//! Tokens are produced one at a time by [`Lexer::next_token`]. Besides the
//! usual symbols, words and numbers, the lexer tracks the width of the
//! leading whitespace of every line and emits synthetic `INDENT` and
//! `DEDENT` tokens whenever it changes, so a label followed by a colon can
//! introduce an indented block of statements.
use std::collections::{HashMap, VecDeque};
use std::fmt;

use lazy_static::lazy_static;
use regex::Regex;

/// Number of columns a tab counts for when measuring indentation.
pub const DEFAULT_TAB_WIDTH: usize = 4;

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum TokenKind {
    Eof,
    Illegal,

    // Symbols
    Comma,
    Period,
    Colon,
    Semicolon,
    Hash,

    // Words
    Ident,
    Register,
    Opcode,
    Directive,
    Trap,

    // Literals
    Int,
    Hex,
    Str,
    Comment,

    // Indentation
    Indent,
    Dedent,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use TokenKind::*;
        let name = match self {
            Eof => "EOF",
            Illegal => "ILLEGAL",
            Comma => "COMMA",
            Period => "PERIOD",
            Colon => "COLON",
            Semicolon => "SEMICOLON",
            Hash => "HASH",
            Ident => "IDENT",
            Register => "REGISTER",
            Opcode => "OPCODE",
            Directive => "DIRECTIVE",
            Trap => "TRAP",
            Int => "INT",
            Hex => "HEX",
            Str => "STRING",
            Comment => "COMMENT",
            Indent => "INDENT",
            Dedent => "DEDENT",
        };
        write!(f, "{}", name)
    }
}

/// A token is its kind, the literal text it was read from and the line
/// (starting at 1) it begins on.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Token {
    pub kind: TokenKind,
    pub literal: String,
    pub line: usize,
}

impl Token {
    pub fn new<S: Into<String>>(kind: TokenKind, literal: S, line: usize) -> Self {
        Token { kind, literal: literal.into(), line }
    }
}

lazy_static! {
    static ref KEYWORDS: HashMap<&'static str, TokenKind> = {
        use TokenKind::*;
        let mut m = HashMap::new();
        for op in &[
            "ADD", "AND", "NOT", "LD", "LDI", "LDR", "LEA", "ST", "STI", "STR", "BR", "JMP", "JSR",
            "JSRR", "RET", "RTI",
        ] {
            m.insert(*op, Opcode);
        }
        for dir in &["END", "ORIG", "FILL", "BLKW", "STRINGZ", "BEGIN"] {
            m.insert(*dir, Directive);
        }
        for trap in &["TRAP", "GETC", "OUT", "PUTS", "IN", "PUTSP", "HALT"] {
            m.insert(*trap, Trap);
        }
        m
    };
    static ref REGISTER: Regex = Regex::new(r"^R[0-9]$").unwrap();
    static ref HEX: Regex = Regex::new(r"^x[0-9][0-9A-Fa-f]*$").unwrap();
    static ref BRANCH: Regex = Regex::new(r"^BR[nzp]{1,3}$").unwrap();
}

/// Classifies a word read by the lexer. Anything that is not a register,
/// a hex literal or a reserved word is a label.
pub fn lookup_ident(word: &str) -> TokenKind {
    if REGISTER.is_match(word) {
        TokenKind::Register
    } else if HEX.is_match(word) {
        TokenKind::Hex
    } else if let Some(kind) = KEYWORDS.get(word) {
        *kind
    } else if BRANCH.is_match(word) {
        TokenKind::Opcode
    } else {
        TokenKind::Ident
    }
}

pub struct Lexer<'a> {
    input: &'a str,
    position: usize,
    read_position: usize,
    ch: u8,
    line: usize,
    indentation: usize,
    base: Option<usize>,
    tab_width: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self::with_tab_width(input, DEFAULT_TAB_WIDTH)
    }

    pub fn with_tab_width(input: &'a str, tab_width: usize) -> Self {
        let mut lexer = Lexer {
            input,
            position: 0,
            read_position: 0,
            ch: 0,
            line: 1,
            indentation: 0,
            base: None,
            tab_width,
        };
        lexer.read_char();
        lexer.measure_indentation();
        lexer
    }

    /// Returns the next token of the input. Once the input is exhausted
    /// every call returns an `EOF` token with an empty literal.
    pub fn next_token(&mut self) -> Token {
        loop {
            match self.ch {
                b'\n' => {
                    if let Some(tok) = self.read_indentation() {
                        return tok;
                    }
                }
                b' ' | b'\t' | b'\r' => self.read_char(),
                _ => break,
            }
        }

        let line = self.line;
        let kind = match self.ch {
            b',' => TokenKind::Comma,
            b'.' => TokenKind::Period,
            b':' => TokenKind::Colon,
            b'#' => TokenKind::Hash,
            b';' => return self.read_comment(),
            b'"' => return self.read_string(),
            b'-' if is_digit(self.peek_char()) => {
                return Token::new(TokenKind::Int, self.read_number(), line)
            }
            0 if self.at_end() => {
                // An indented last line still closes its block.
                let base = self.base.unwrap_or(0);
                if self.indentation > base {
                    self.indentation = base;
                    return Token::new(TokenKind::Dedent, "DEDENT", line);
                }
                return Token::new(TokenKind::Eof, "", line);
            }
            c if is_letter(c) => {
                let word = self.read_word();
                return Token::new(lookup_ident(word), word, line);
            }
            c if is_digit(c) => return Token::new(TokenKind::Int, self.read_number(), line),
            _ => return self.read_illegal(),
        };

        let tok = Token::new(kind, &self.input[self.position..self.read_position], line);
        self.read_char();
        tok
    }

    fn at_end(&self) -> bool {
        self.position >= self.input.len()
    }

    fn read_char(&mut self) {
        if self.ch == b'\n' && !self.at_end() {
            self.line += 1;
        }
        match self.input.as_bytes().get(self.read_position) {
            Some(&c) => {
                self.ch = c;
                self.position = self.read_position;
                self.read_position += 1;
            }
            None => {
                self.ch = 0;
                self.position = self.input.len();
            }
        }
    }

    fn peek_char(&self) -> u8 {
        self.input.as_bytes().get(self.read_position).copied().unwrap_or(0)
    }

    /// Consumes a newline and measures the indentation of the line after it.
    fn read_indentation(&mut self) -> Option<Token> {
        self.read_char();
        self.measure_indentation()
    }

    /// Measures the leading whitespace of the line at the cursor. Returns a
    /// token only if the width differs from the current one. The first line
    /// holding a token sets the base width and never emits one.
    fn measure_indentation(&mut self) -> Option<Token> {
        let mut width = 0;
        while self.ch == b'\t' || self.ch == b' ' {
            width += if self.ch == b'\t' { self.tab_width } else { 1 };
            self.read_char();
        }

        // Blank and comment-only lines neither open nor close a block,
        // and the end of input is handled by `next_token`.
        if matches!(self.ch, b'\n' | b'\r' | b';') || self.at_end() {
            return None;
        }

        if self.base.is_none() {
            self.base = Some(width);
            self.indentation = width;
            return None;
        }

        let (kind, literal) = if width < self.indentation {
            (TokenKind::Dedent, "DEDENT")
        } else if width > self.indentation {
            (TokenKind::Indent, "INDENT")
        } else {
            return None;
        };
        self.indentation = width;
        Some(Token::new(kind, literal, self.line))
    }

    fn read_comment(&mut self) -> Token {
        let line = self.line;
        let start = self.position;
        while self.ch != b'\n' && !self.at_end() {
            self.read_char();
        }
        let text = self.input[start..self.position].trim_end_matches('\r');
        if text.len() == 1 {
            Token::new(TokenKind::Semicolon, text, line)
        } else {
            Token::new(TokenKind::Comment, text, line)
        }
    }

    /// Reads a double quoted string. Escapes are kept as written, the
    /// parser decodes them. A string still open at the end of the line
    /// comes back as an `ILLEGAL` token holding the opening quote.
    fn read_string(&mut self) -> Token {
        let line = self.line;
        let quote = self.position;
        self.read_char();
        let start = self.position;
        loop {
            match self.ch {
                b'"' | b'\n' => break,
                _ if self.at_end() => break,
                b'\\' => {
                    self.read_char();
                    if self.ch != b'\n' && !self.at_end() {
                        self.read_char();
                    }
                }
                _ => self.read_char(),
            }
        }
        if self.ch != b'"' {
            return Token::new(TokenKind::Illegal, &self.input[quote..self.position], line);
        }
        let tok = Token::new(TokenKind::Str, &self.input[start..self.position], line);
        self.read_char();
        tok
    }

    fn read_word(&mut self) -> &'a str {
        let start = self.position;
        while is_letter(self.ch) || is_digit(self.ch) {
            self.read_char();
        }
        &self.input[start..self.position]
    }

    fn read_number(&mut self) -> &'a str {
        let start = self.position;
        if self.ch == b'-' {
            self.read_char();
        }
        while is_digit(self.ch) {
            self.read_char();
        }
        &self.input[start..self.position]
    }

    fn read_illegal(&mut self) -> Token {
        let line = self.line;
        let start = self.position;
        let len = self.input[start..].chars().next().map_or(1, char::len_utf8);
        for _ in 0..len {
            self.read_char();
        }
        Token::new(TokenKind::Illegal, &self.input[start..start + len], line)
    }
}

fn is_letter(ch: u8) -> bool {
    ch.is_ascii_alphabetic() || ch == b'_'
}

fn is_digit(ch: u8) -> bool {
    ch.is_ascii_digit()
}

/// Tokenizes the whole input, including the final `EOF` token.
pub fn tokenize(input: &str, tab_width: usize) -> VecDeque<Token> {
    let mut lexer = Lexer::with_tab_width(input, tab_width);
    let mut tokens = VecDeque::with_capacity(256);
    loop {
        let tok = lexer.next_token();
        let done = tok.kind == TokenKind::Eof;
        tokens.push_back(tok);
        if done {
            break;
        }
    }
    debug!("Lexed {} token(s).", tokens.len());
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use super::TokenKind::*;

    fn kinds_and_literals(input: &str) -> Vec<(TokenKind, String)> {
        tokenize(input, DEFAULT_TAB_WIDTH)
            .into_iter()
            .map(|tok| (tok.kind, tok.literal))
            .collect()
    }

    fn expect_tokens(input: &str, expected: &[(TokenKind, &str)]) {
        let expected: Vec<(TokenKind, String)> = expected
            .iter()
            .map(|(kind, lit)| (*kind, lit.to_string()))
            .collect();
        assert_eq!(kinds_and_literals(input), expected);
    }

    #[test]
    fn test_next_token() {
        expect_tokens(
            "ADD R5,R5,R5;\n.END\n#44\nx44\nADD R3,R4,R5\n",
            &[
                (Opcode, "ADD"),
                (Register, "R5"),
                (Comma, ","),
                (Register, "R5"),
                (Comma, ","),
                (Register, "R5"),
                (Semicolon, ";"),
                (Period, "."),
                (Directive, "END"),
                (Hash, "#"),
                (Int, "44"),
                (Hex, "x44"),
                (Opcode, "ADD"),
                (Register, "R3"),
                (Comma, ","),
                (Register, "R4"),
                (Comma, ","),
                (Register, "R5"),
                (Eof, ""),
            ],
        );
    }

    #[test]
    fn test_tab_indentation() {
        expect_tokens(
            "LABEL:\n\tR5,R5,R5;\n\tADD R5,R5,#1\nNOT R1,R1\n",
            &[
                (Ident, "LABEL"),
                (Colon, ":"),
                (Indent, "INDENT"),
                (Register, "R5"),
                (Comma, ","),
                (Register, "R5"),
                (Comma, ","),
                (Register, "R5"),
                (Semicolon, ";"),
                (Opcode, "ADD"),
                (Register, "R5"),
                (Comma, ","),
                (Register, "R5"),
                (Comma, ","),
                (Hash, "#"),
                (Int, "1"),
                (Dedent, "DEDENT"),
                (Opcode, "NOT"),
                (Register, "R1"),
                (Comma, ","),
                (Register, "R1"),
                (Eof, ""),
            ],
        );
    }

    #[test]
    fn test_space_indentation() {
        expect_tokens(
            "LABEL:\n  HALT\n  RET\nNOT R1,R1\n",
            &[
                (Ident, "LABEL"),
                (Colon, ":"),
                (Indent, "INDENT"),
                (Trap, "HALT"),
                (Opcode, "RET"),
                (Dedent, "DEDENT"),
                (Opcode, "NOT"),
                (Register, "R1"),
                (Comma, ","),
                (Register, "R1"),
                (Eof, ""),
            ],
        );
    }

    #[test]
    fn test_blank_and_comment_lines_keep_indentation() {
        expect_tokens(
            "LOOP:\n\tRET\n\n   \n; a comment at column zero\n\tRTI\n",
            &[
                (Ident, "LOOP"),
                (Colon, ":"),
                (Indent, "INDENT"),
                (Opcode, "RET"),
                (Comment, "; a comment at column zero"),
                (Opcode, "RTI"),
                (Dedent, "DEDENT"),
                (Eof, ""),
            ],
        );
    }

    #[test]
    fn test_tab_counts_as_tab_width() {
        // A tab and four spaces measure the same.
        expect_tokens(
            "A:\n\tRET\n    RTI\n",
            &[
                (Ident, "A"),
                (Colon, ":"),
                (Indent, "INDENT"),
                (Opcode, "RET"),
                (Opcode, "RTI"),
                (Dedent, "DEDENT"),
                (Eof, ""),
            ],
        );

        let mut lexer = Lexer::with_tab_width("A:\n\tRET\n  RTI", 2);
        let kinds: Vec<TokenKind> = (0..6).map(|_| lexer.next_token().kind).collect();
        assert_eq!(kinds, vec![Ident, Colon, Indent, Opcode, Opcode, Dedent]);
    }

    #[test]
    fn test_indented_last_line_is_closed() {
        expect_tokens(
            "A:\n  HALT",
            &[
                (Ident, "A"),
                (Colon, ":"),
                (Indent, "INDENT"),
                (Trap, "HALT"),
                (Dedent, "DEDENT"),
                (Eof, ""),
            ],
        );
    }

    #[test]
    fn test_first_line_sets_base_indentation() {
        expect_tokens("  HALT\n  RET\n", &[(Trap, "HALT"), (Opcode, "RET"), (Eof, "")]);

        // A leading blank line does not count as the first line.
        expect_tokens(
            "\n  A:\n      RET\n  HALT",
            &[
                (Ident, "A"),
                (Colon, ":"),
                (Indent, "INDENT"),
                (Opcode, "RET"),
                (Dedent, "DEDENT"),
                (Trap, "HALT"),
                (Eof, ""),
            ],
        );
    }

    #[test]
    fn test_crlf_line_endings() {
        expect_tokens(
            "A:\r\n\tRET ; done\r\nHALT\r\n",
            &[
                (Ident, "A"),
                (Colon, ":"),
                (Indent, "INDENT"),
                (Opcode, "RET"),
                (Comment, "; done"),
                (Dedent, "DEDENT"),
                (Trap, "HALT"),
                (Eof, ""),
            ],
        );
    }

    #[test]
    fn test_numbers() {
        expect_tokens(
            "#-12 #7 - x3000 x1F xABC 12x",
            &[
                (Hash, "#"),
                (Int, "-12"),
                (Hash, "#"),
                (Int, "7"),
                (Illegal, "-"),
                (Hex, "x3000"),
                (Hex, "x1F"),
                (Ident, "xABC"),
                (Int, "12"),
                (Ident, "x"),
                (Eof, ""),
            ],
        );
    }

    #[test]
    fn test_strings() {
        expect_tokens(
            r#".STRINGZ "Hello, \"world\"""#,
            &[
                (Period, "."),
                (Directive, "STRINGZ"),
                (Str, r#"Hello, \"world\""#),
                (Eof, ""),
            ],
        );

        expect_tokens(
            ".STRINGZ \"open\nHALT",
            &[
                (Period, "."),
                (Directive, "STRINGZ"),
                (Illegal, "\"open"),
                (Trap, "HALT"),
                (Eof, ""),
            ],
        );
    }

    #[test]
    fn test_keywords_and_labels() {
        assert_eq!(lookup_ident("ADD"), Opcode);
        assert_eq!(lookup_ident("add"), Ident);
        assert_eq!(lookup_ident("JSRR"), Opcode);
        assert_eq!(lookup_ident("BR"), Opcode);
        assert_eq!(lookup_ident("BRnzp"), Opcode);
        assert_eq!(lookup_ident("BRpn"), Opcode);
        assert_eq!(lookup_ident("BRnzpz"), Ident);
        assert_eq!(lookup_ident("BRx"), Ident);
        assert_eq!(lookup_ident("STRINGZ"), Directive);
        assert_eq!(lookup_ident("BEGIN"), Directive);
        assert_eq!(lookup_ident("PUTSP"), Trap);
        assert_eq!(lookup_ident("R7"), Register);
        assert_eq!(lookup_ident("R9"), Register);
        assert_eq!(lookup_ident("R10"), Ident);
        assert_eq!(lookup_ident("x12"), Hex);
        assert_eq!(lookup_ident("LOOP_2"), Ident);
    }

    #[test]
    fn test_illegal_characters() {
        expect_tokens(
            "ADD @ é\0",
            &[
                (Opcode, "ADD"),
                (Illegal, "@"),
                (Illegal, "é"),
                (Illegal, "\0"),
                (Eof, ""),
            ],
        );
    }

    #[test]
    fn test_lines() {
        let lines: Vec<usize> = tokenize("RET\n\nHALT\n  ; note\nRTI", DEFAULT_TAB_WIDTH)
            .into_iter()
            .map(|tok| tok.line)
            .collect();
        assert_eq!(lines, vec![1, 3, 4, 5, 5]);
    }

    #[test]
    fn test_eof_is_idempotent() {
        let mut lexer = Lexer::new("HALT");
        assert_eq!(lexer.next_token(), Token::new(Trap, "HALT", 1));
        for _ in 0..5 {
            assert_eq!(lexer.next_token(), Token::new(Eof, "", 1));
        }

        let mut lexer = Lexer::new("");
        for _ in 0..5 {
            assert_eq!(lexer.next_token().kind, Eof);
        }
    }

    proptest! {
        #[test]
        fn register_literals_carry_their_digit(digit in 0u8..10) {
            let src = format!("R{}", digit);
            let tok = Lexer::new(&src).next_token();
            prop_assert_eq!(tok.kind, Register);
            prop_assert_eq!(tok.literal.as_bytes()[1] - b'0', digit);
        }

        #[test]
        fn other_r_words_are_labels(word in "R[A-Za-z0-9_]{2,6}") {
            prop_assume!(word != "RET" && word != "RTI");
            let tok = Lexer::new(&word).next_token();
            prop_assert_eq!(tok.kind, Ident);
            prop_assert_eq!(tok.literal, word);
        }

        #[test]
        fn width_changes_emit_one_structural_token(first in 0usize..8, second in 0usize..8) {
            let src = format!("RET\n{}NOT R1,R2\n{}RTI", " ".repeat(first), " ".repeat(second));
            let kinds: Vec<TokenKind> = tokenize(&src, DEFAULT_TAB_WIDTH)
                .into_iter()
                .map(|tok| tok.kind)
                .collect();

            let mut expected = vec![Opcode];
            if first > 0 {
                expected.push(Indent);
            }
            expected.extend(&[Opcode, Register, Comma, Register]);
            if second > first {
                expected.push(Indent);
            } else if second < first {
                expected.push(Dedent);
            }
            expected.push(Opcode);
            if second > 0 {
                expected.push(Dedent);
            }
            expected.push(Eof);
            prop_assert_eq!(kinds, expected);
        }
    }
}
