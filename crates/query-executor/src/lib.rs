pub mod interpreter;
pub mod operators;

pub use interpreter::{QueryInterpreter, SelectBlockStream, SelectInterpreter};
pub use operators::evaluate_expr;
