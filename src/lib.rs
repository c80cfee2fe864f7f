//! A minimal shell.
//!
//! Input lines are parsed in full into a syntax tree before anything runs. The
//! tree joins statements with `&&`, `||` and `;`, stores constants with
//! `NAME = value`, and groups sub-expressions in `{ ... }`. Each statement is a
//! pipeline of commands with optional `<`, `>` and `>>` redirections and a
//! trailing `&` for background execution.
//!
//! The main entry point is [`Interpreter`]. The public modules expose the
//! building blocks: [`lexer`] and [`parser`] for the syntax, [`constants`] and
//! [`env`] for session state, [`external`] for locating and starting programs,
//! and [`command`] for the traits built-ins implement.

mod builtin;
pub mod command;
pub mod config;
pub mod constants;
pub mod env;
pub mod external;
mod interpreter;
pub mod lexer;
pub mod logging;
pub mod parser;

/// Just a convenient re-export of the line interpreter.
///
/// See [`Interpreter`] for the high-level API and examples.
pub use interpreter::Interpreter;

pub use config::Config;
