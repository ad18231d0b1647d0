//! The Assembler module is in charge of taking an
//! LC-3 assembly file and producing a Program from the
//! AST submodule.
//!
//! It does this by implementing an indentation aware
//! tokenizer and a recursive descent parser with one
//! token of lookahead that reports diagnostics instead
//! of stopping at the first error.

pub mod ast;
pub mod diagnostic;
pub mod lexer;
pub mod parser;
