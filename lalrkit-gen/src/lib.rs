//! Copyright (c) 2005–2025 IKH Software, Inc.
//!
//! Released under the terms of the GNU Lesser General Public License,
//! version 3.0 or (at your option) any later version (LGPL-3.0-or-later).
//!
//! LALR(1) parser and lexer generation for the `lalrkit` runtime.
//!
//! The pipeline: a grammar, parsed from source with [`Grammar::parse`] or
//! assembled through the scoped builders, goes through [`generate`], which
//! classifies and numbers symbols, builds the LALR(1) canonical collection,
//! resolves conflicts by precedence and associativity, compiles every
//! terminal pattern into one minimized DFA (and the `%whitespace` patterns
//! into a second one), and hands back a [`CompiledGrammar`] ready to drive
//! `lalrkit`'s scanner and parser. [`compile`] bundles both steps.
//!
//! ```no_run
//! use lalrkit::StderrSink;
//!
//! # fn main() -> anyhow::Result<()> {
//! let mut sink = StderrSink;
//! let machines = lalrkit_gen::compile(
//!     "calc;
//!      %left '+';
//!      %whitespace \"[ ]*\";
//!      expr : expr '+' expr [add] | \"[0-9]+\" [int];",
//!     &mut sink,
//! )?;
//! # let _ = machines;
//! # Ok(())
//! # }
//! ```

pub mod grammar;

mod describe;
mod first_follow;
mod generate;
mod items;
mod lexer_gen;
mod regex;
mod tables;

pub use crate::describe::{describe, write_first_follow, write_item_sets, write_productions};
pub use crate::generate::{compile, generate, CompiledGrammar};
pub use crate::grammar::{Associativity, Grammar};
