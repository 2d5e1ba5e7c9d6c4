//! Runtime support for parsers generated by `parlr`.
//!
//! The generator crate produces a [`ParserSpec`] — the immutable action/goto
//! tables of an LALR(1) automaton. This crate interprets those tables:
//!
//! - [`parser::Parser`] is the deterministic driver, a stack machine with
//!   `error`-token recovery;
//! - [`glr::GlrParser`] is the generalized driver that forks its stack on
//!   retained conflicts and reports every completed parse.
//!
//! A `ParserSpec` is immutable and may be shared between concurrent parses;
//! each parse owns its stacks.

pub mod glr;
pub mod parser;
pub mod spec;
pub mod token;

pub use crate::{
    glr::{GlrParser, GlrSemanticAction},
    parser::{ParseFailure, Parser, SemanticAction},
    spec::{Action, ParserSpec},
    token::{Lexer, Source, Token},
};
