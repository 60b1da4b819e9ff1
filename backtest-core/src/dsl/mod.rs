//! The strategy DSL: AST definitions, the per-bar fold evaluator, and
//! warmup-period extraction.

pub mod ast;
pub mod evaluator;
pub mod warmup;

pub use ast::AstNode;
pub use evaluator::{EvalError, Evaluator};
pub use warmup::warmup_bars;
