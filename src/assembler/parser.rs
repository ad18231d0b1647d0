//! The Parser module pulls tokens from the Lexer and converts them into
//! a Program.
//!
//! It keeps a window of two tokens, the current one and the one after it.
//! A statement parser only ever moves forward by confirming the next token
//! has the kind it expects. When that fails a diagnostic is recorded, the
//! statement is dropped and parsing resumes with the offending token.
use std::convert::TryFrom;
use std::mem;
use std::str::FromStr;

use super::ast::*;
use super::diagnostic::Diagnostic;
use super::lexer::{Lexer, Token, TokenKind};

/// Parses a whole source text.
pub fn parse(source: &str, tab_width: usize) -> (Program, Vec<Diagnostic>) {
    Parser::new(Lexer::with_tab_width(source, tab_width)).parse_program()
}

pub struct Parser<'a> {
    lexer: Lexer<'a>,
    cur: Token,
    peek: Token,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> Parser<'a> {
    pub fn new(mut lexer: Lexer<'a>) -> Self {
        let cur = lexer.next_token();
        let peek = lexer.next_token();
        Parser { lexer, cur, peek, diagnostics: Vec::new() }
    }

    /// Run the parser, consuming itself and returning the statements it
    /// could parse along with a diagnostic for everything it could not.
    pub fn parse_program(mut self) -> (Program, Vec<Diagnostic>) {
        let mut program = Program::default();

        while !self.cur_is(TokenKind::Eof) {
            if let Some(statement) = self.statement() {
                program.statements.push(statement);
            }
            self.next_token();
        }

        debug!(
            "Parsed {} statement(s) with {} diagnostic(s).",
            program.statements.len(),
            self.diagnostics.len()
        );
        (program, self.diagnostics)
    }

    /// Parses the statement starting at the current token. Tokens that
    /// cannot start a statement are skipped without a diagnostic.
    fn statement(&mut self) -> Option<Statement> {
        match self.cur.kind {
            TokenKind::Opcode => self.operation(),
            TokenKind::Period => {
                self.expect(TokenKind::Directive)?;
                self.directive()
            }
            TokenKind::Directive => self.directive(),
            TokenKind::Trap => self.trap(),
            TokenKind::Ident => self.labeled(),
            TokenKind::Illegal => {
                let message = if self.cur.literal.starts_with('"') {
                    format!("unterminated string literal `{}`", self.cur.literal)
                } else {
                    format!("illegal character `{}`", self.cur.literal)
                };
                self.error(message);
                None
            }
            _ => None,
        }
    }

    fn operation(&mut self) -> Option<Statement> {
        trace!("operation: {}", self.cur.literal);
        let result = Opcode::try_from(self.cur.literal.as_str());
        let opcode = self.check(result)?;

        use Opcode::*;
        match opcode {
            ADD | AND => self.op_arithmetic(opcode),
            NOT => self.op_dual_reg(opcode),
            LD | LDI | LEA | ST | STI => self.op_reg_label(opcode),
            LDR | STR => self.op_reg_offset(opcode),
            JMP | JSRR => {
                let register = self.register()?;
                Some(Statement::SingleRegister { opcode, register })
            }
            JSR => {
                let label = self.label()?;
                Some(Statement::SingleLabel { opcode, label })
            }
            BR => self.op_branch(),
            RET | RTI => Some(Statement::NoArg { opcode }),
        }
    }

    /// ADD and AND take either a third register or an immediate.
    fn op_arithmetic(&mut self, opcode: Opcode) -> Option<Statement> {
        let destination = self.register()?;
        self.expect(TokenKind::Comma)?;
        let source = self.register()?;
        self.expect(TokenKind::Comma)?;

        self.skip_comment();
        match self.peek.kind {
            TokenKind::Register => {
                let second = self.register()?;
                Some(Statement::ThreeRegister { opcode, destination, sources: [source, second] })
            }
            TokenKind::Hash => {
                let immediate = self.immediate()?;
                Some(Statement::TwoRegisterImmediate { opcode, destination, source, immediate })
            }
            _ => {
                self.peek_error(&[TokenKind::Register, TokenKind::Hash]);
                None
            }
        }
    }

    fn op_dual_reg(&mut self, opcode: Opcode) -> Option<Statement> {
        let destination = self.register()?;
        self.expect(TokenKind::Comma)?;
        let source = self.register()?;
        Some(Statement::TwoRegister { opcode, destination, source })
    }

    fn op_reg_label(&mut self, opcode: Opcode) -> Option<Statement> {
        let register = self.register()?;
        self.expect(TokenKind::Comma)?;
        let label = self.label()?;
        Some(Statement::RegisterLabel { opcode, register, label })
    }

    fn op_reg_offset(&mut self, opcode: Opcode) -> Option<Statement> {
        let left = self.register()?;
        self.expect(TokenKind::Comma)?;
        let right = self.register()?;
        self.expect(TokenKind::Comma)?;
        let offset = self.immediate()?;
        Some(Statement::TwoRegisterOffset { opcode, left, right, offset })
    }

    fn op_branch(&mut self) -> Option<Statement> {
        let result = Condition::from_mnemonic(&self.cur.literal)
            .ok_or_else(|| format!("`{}` is not a branch", self.cur.literal));
        let condition = self.check(result)?;
        let label = self.label()?;
        Some(Statement::Branch { condition, label })
    }

    /// Parses the directive named by the current token. The period in
    /// front of it has already been consumed.
    fn directive(&mut self) -> Option<Statement> {
        trace!("directive: {}", self.cur.literal);
        let result = Directive::try_from(self.cur.literal.as_str());
        let directive = self.check(result)?;

        match directive {
            Directive::BLKW => {
                self.expect(TokenKind::Hash)?;
                self.expect(TokenKind::Int)?;
                let value = self.number::<u64>("block size")?;
                Some(Statement::IntegerDirective { directive, value })
            }
            Directive::ORIG | Directive::FILL => {
                let value = self.hex()?;
                Some(Statement::HexDirective { directive, value })
            }
            Directive::END => Some(Statement::NoArgDirective { directive }),
            Directive::STRINGZ => {
                let value = self.string()?;
                Some(Statement::StringDirective { directive, value })
            }
        }
    }

    fn trap(&mut self) -> Option<Statement> {
        trace!("trap: {}", self.cur.literal);
        let result = Trap::try_from(self.cur.literal.as_str());
        let trap = self.check(result)?;

        match trap {
            Trap::TRAP => {
                let vector = self.hex()?;
                Some(Statement::HexTrap { trap, vector })
            }
            _ => Some(Statement::NoArgTrap { trap }),
        }
    }

    /// A label either introduces an indented block (`LABEL:` followed by a
    /// deeper line) or names the single statement after it.
    fn labeled(&mut self) -> Option<Statement> {
        let label = Label::new(self.cur.literal.clone());
        trace!("label: {}", label);

        if self.peek_is(TokenKind::Colon) {
            self.next_token();
            self.skip_comments();
            if self.peek_is(TokenKind::Indent) {
                self.next_token();
                return self.block(label);
            }
            self.peek_error(&[TokenKind::Indent]);
        }

        self.skip_comments();
        match self.peek.kind {
            TokenKind::Ident => {
                let message = format!(
                    "unexpected identifier `{}` after label `{}`",
                    self.peek.literal, label
                );
                self.error_at(self.peek.line, message);
                return None;
            }
            TokenKind::Eof | TokenKind::Dedent => {
                self.error(format!("label `{}` is not followed by a statement", label));
                return None;
            }
            _ => {}
        }

        let reported = self.diagnostics.len();
        self.next_token();
        match self.statement() {
            Some(statement) => Some(Statement::Labeled { label, statement: Box::new(statement) }),
            None => {
                if self.diagnostics.len() == reported {
                    self.error(format!("label `{}` is not followed by a statement", label));
                }
                None
            }
        }
    }

    /// Parses statements until the `DEDENT` closing the block. The current
    /// token is the `INDENT` opening it.
    fn block(&mut self, label: Label) -> Option<Statement> {
        trace!("block: {}", label);
        let mut body = Vec::new();
        let reported = self.diagnostics.len();

        self.next_token();
        while !self.cur_is(TokenKind::Dedent) {
            if self.cur_is(TokenKind::Eof) {
                let message = format!(
                    "block `{}` is not closed before the end of the input, \
                     a dedent closes only one block at a time",
                    label
                );
                self.error(message);
                return None;
            }
            if let Some(statement) = self.statement() {
                body.push(statement);
            }
            self.next_token();
        }

        if body.is_empty() {
            if self.diagnostics.len() == reported {
                self.error(format!("block `{}` has no statements", label));
            }
            return None;
        }
        Some(Statement::Block { label, body })
    }

    fn register(&mut self) -> Option<Register> {
        self.expect(TokenKind::Register)?;
        let literal = &self.cur.literal;
        let result = match literal.as_bytes().get(1) {
            Some(c) if c.is_ascii_digit() => Register::try_from(c - b'0'),
            _ => Err(format!("could not parse register number from `{}`", literal)),
        };
        self.check(result)
    }

    fn label(&mut self) -> Option<Label> {
        self.expect(TokenKind::Ident)?;
        Some(Label::new(self.cur.literal.clone()))
    }

    /// Parses `#n` with a signed decimal `n`.
    fn immediate(&mut self) -> Option<i64> {
        self.expect(TokenKind::Hash)?;
        self.expect(TokenKind::Int)?;
        self.number::<i64>("immediate")
    }

    fn hex(&mut self) -> Option<i64> {
        self.expect(TokenKind::Hex)?;
        let literal = &self.cur.literal;
        let result = i64::from_str_radix(literal.trim_start_matches('x'), 16)
            .map_err(|_| format!("invalid hexadecimal literal `{}`", literal));
        self.check(result)
    }

    fn string(&mut self) -> Option<String> {
        self.skip_comment();
        if self.peek_is(TokenKind::Illegal) && self.peek.literal.starts_with('"') {
            self.next_token();
            self.error(format!("unterminated string literal `{}`", self.cur.literal));
            return None;
        }
        self.expect(TokenKind::Str)?;
        let result = unescape(&self.cur.literal);
        self.check(result)
    }

    /// Parses the current token's literal as a number.
    fn number<T: FromStr>(&mut self, what: &str) -> Option<T> {
        let literal = &self.cur.literal;
        let result = literal.parse::<T>().map_err(|_| format!("invalid {} `{}`", what, literal));
        self.check(result)
    }

    /// Advances if the next token is of the given kind, skipping one
    /// comment in front of it. Records a diagnostic otherwise.
    fn expect(&mut self, kind: TokenKind) -> Option<()> {
        self.skip_comment();
        if self.peek_is(kind) {
            self.next_token();
            Some(())
        } else {
            self.peek_error(&[kind]);
            None
        }
    }

    fn skip_comment(&mut self) {
        if matches!(self.peek.kind, TokenKind::Comment | TokenKind::Semicolon) {
            self.next_token();
        }
    }

    fn skip_comments(&mut self) {
        while matches!(self.peek.kind, TokenKind::Comment | TokenKind::Semicolon) {
            self.next_token();
        }
    }

    fn check<T>(&mut self, result: Result<T, String>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(message) => {
                self.error(message);
                None
            }
        }
    }

    fn peek_error(&mut self, expected: &[TokenKind]) {
        let expected: Vec<String> = expected.iter().map(|kind| format!("`{}`", kind)).collect();
        let message = format!(
            "expected next token to be {}, got `{}` instead",
            expected.join(" or "),
            self.peek.kind
        );
        self.error_at(self.peek.line, message);
    }

    fn error(&mut self, message: String) {
        self.error_at(self.cur.line, message);
    }

    fn error_at(&mut self, line: usize, message: String) {
        let diag = Diagnostic::new(line, message);
        debug!("{}", diag);
        self.diagnostics.push(diag);
    }

    fn cur_is(&self, kind: TokenKind) -> bool {
        self.cur.kind == kind
    }

    fn peek_is(&self, kind: TokenKind) -> bool {
        self.peek.kind == kind
    }

    fn next_token(&mut self) {
        self.cur = mem::replace(&mut self.peek, self.lexer.next_token());
    }
}

/// Decodes the escapes of a string literal.
fn unescape(raw: &str) -> Result<String, String> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some('\\') => out.push('\\'),
            Some('"') => out.push('"'),
            Some(other) => return Err(format!("unknown escape sequence `\\{}`", other)),
            None => return Err("string literal ends in a lone backslash".to_string()),
        }
    }
    Ok(out)
}
