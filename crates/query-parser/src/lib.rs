pub mod ast;
pub mod formatter;

pub use ast::*;
pub use formatter::format_statement;
