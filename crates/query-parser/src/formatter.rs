//! Canonical single-line text for syntax trees
//!
//! The text is what gets shipped to remote executors, so it must re-parse to
//! the same tree: identifiers that are not plain words are back-quoted and
//! nested operators are parenthesised where precedence requires it.

use crate::ast::*;
use std::fmt::{self, Display, Formatter, Write};

/// Format a statement as one line of query text
pub fn format_statement(statement: &Statement) -> String {
    statement.to_string()
}

impl Display for Statement {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Statement::Select(select) => select.fmt(f),
            Statement::Insert(insert) => insert.fmt(f),
            Statement::Alter(alter) => alter.fmt(f),
        }
    }
}

impl Display for Identifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write_name(f, &self.name)
    }
}

impl Display for SelectQuery {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("SELECT ")?;
        if self.distinct {
            f.write_str("DISTINCT ")?;
        }
        write_list(f, &self.projection)?;

        if let Some(table) = &self.table {
            f.write_str(" FROM ")?;
            write_qualified(f, self.database.as_ref(), table)?;
        }
        if let Some(selection) = &self.selection {
            write!(f, " WHERE {}", selection)?;
        }
        if !self.group_by.is_empty() {
            f.write_str(" GROUP BY ")?;
            write_list(f, &self.group_by)?;
        }
        if let Some(having) = &self.having {
            write!(f, " HAVING {}", having)?;
        }
        if !self.order_by.is_empty() {
            f.write_str(" ORDER BY ")?;
            write_list(f, &self.order_by)?;
        }
        if let Some(limit) = self.limit {
            write!(f, " LIMIT {}", limit)?;
        }
        if let Some(offset) = self.offset {
            write!(f, " OFFSET {}", offset)?;
        }
        Ok(())
    }
}

impl Display for SelectItem {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            SelectItem::Wildcard => f.write_str("*"),
            SelectItem::UnnamedExpr(expr) => expr.fmt(f),
            SelectItem::ExprWithAlias { expr, alias } => {
                write!(f, "{} AS ", expr)?;
                write_name(f, alias)
            }
        }
    }
}

impl Display for OrderByExpr {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.expr, if self.asc { "ASC" } else { "DESC" })
    }
}

impl Display for Expr {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Identifier(ident) => ident.fmt(f),
            Expr::Literal(literal) => literal.fmt(f),
            Expr::BinaryOp { left, op, right } => {
                write_operand(f, left, op.precedence(), false)?;
                write!(f, " {} ", op)?;
                write_operand(f, right, op.precedence(), true)
            }
            Expr::UnaryOp { op, expr } => {
                let needs_parens = match op {
                    UnaryOperator::Not => {
                        f.write_str("NOT ")?;
                        matches!(**expr, Expr::BinaryOp { .. })
                    }
                    UnaryOperator::Minus => {
                        f.write_char('-')?;
                        // `--` would start a comment
                        match &**expr {
                            Expr::BinaryOp { .. } | Expr::UnaryOp { .. } => true,
                            Expr::Literal(Literal::Number(n)) => n.starts_with('-'),
                            _ => false,
                        }
                    }
                };
                if needs_parens {
                    write!(f, "({})", expr)
                } else {
                    expr.fmt(f)
                }
            }
            Expr::Function { name, args } => {
                write_name(f, name)?;
                f.write_char('(')?;
                write_list(f, args)?;
                f.write_char(')')
            }
        }
    }
}

impl Display for Literal {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Number(n) => f.write_str(n),
            Literal::String(s) => {
                f.write_char('\'')?;
                for c in s.chars() {
                    match c {
                        '\'' => f.write_str("\\'")?,
                        '\\' => f.write_str("\\\\")?,
                        '\n' => f.write_str("\\n")?,
                        c => f.write_char(c)?,
                    }
                }
                f.write_char('\'')
            }
            Literal::Boolean(b) => f.write_str(if *b { "true" } else { "false" }),
            Literal::Null => f.write_str("NULL"),
        }
    }
}

impl Display for BinaryOperator {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let op = match self {
            BinaryOperator::Plus => "+",
            BinaryOperator::Minus => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
            BinaryOperator::Modulo => "%",
            BinaryOperator::Equal => "=",
            BinaryOperator::NotEqual => "!=",
            BinaryOperator::Less => "<",
            BinaryOperator::LessEqual => "<=",
            BinaryOperator::Greater => ">",
            BinaryOperator::GreaterEqual => ">=",
            BinaryOperator::And => "AND",
            BinaryOperator::Or => "OR",
        };
        f.write_str(op)
    }
}

impl Display for InsertQuery {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("INSERT INTO ")?;
        write_qualified(f, self.database.as_ref(), &self.table)?;
        if let Some(columns) = &self.columns {
            f.write_str(" (")?;
            for (i, column) in columns.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write_name(f, column)?;
            }
            f.write_char(')')?;
        }
        f.write_str(" VALUES ")?;
        for (i, row) in self.values.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            f.write_char('(')?;
            write_list(f, row)?;
            f.write_char(')')?;
        }
        Ok(())
    }
}

impl Display for AlterQuery {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("ALTER TABLE ")?;
        write_qualified(f, self.database.as_ref(), &self.table)?;
        f.write_char(' ')?;
        write_list(f, &self.commands)
    }
}

impl Display for AlterCommand {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            AlterCommand::AddColumn { column, after } => {
                write!(f, "ADD COLUMN {}", column)?;
                if let Some(after) = after {
                    f.write_str(" AFTER ")?;
                    write_name(f, after)?;
                }
                Ok(())
            }
            AlterCommand::DropColumn { name } => {
                f.write_str("DROP COLUMN ")?;
                write_name(f, name)
            }
            AlterCommand::ModifyColumn { column } => write!(f, "MODIFY COLUMN {}", column),
        }
    }
}

impl Display for ColumnDef {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write_name(f, &self.name)?;
        if self.nullable {
            write!(f, " Nullable({})", self.data_type)
        } else {
            write!(f, " {}", self.data_type)
        }
    }
}

fn write_list<T: Display>(f: &mut Formatter<'_>, items: &[T]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        item.fmt(f)?;
    }
    Ok(())
}

fn write_qualified(
    f: &mut Formatter<'_>,
    database: Option<&Identifier>,
    table: &Identifier,
) -> fmt::Result {
    if let Some(database) = database {
        write!(f, "{}.", database)?;
    }
    table.fmt(f)
}

/// Operands of equal precedence on the right are parenthesised, since every
/// binary operator here is left-associative. NOT binds looser than any
/// comparison or arithmetic operator.
fn write_operand(f: &mut Formatter<'_>, expr: &Expr, parent: u8, right: bool) -> fmt::Result {
    let needs_parens = match expr {
        Expr::BinaryOp { op, .. } => {
            op.precedence() < parent || (right && op.precedence() == parent)
        }
        Expr::UnaryOp {
            op: UnaryOperator::Not,
            ..
        } => parent > BinaryOperator::And.precedence(),
        _ => false,
    };
    if needs_parens {
        write!(f, "({})", expr)
    } else {
        expr.fmt(f)
    }
}

fn write_name(f: &mut Formatter<'_>, name: &str) -> fmt::Result {
    if is_plain_word(name) {
        f.write_str(name)
    } else {
        f.write_char('`')?;
        for c in name.chars() {
            match c {
                '`' => f.write_str("\\`")?,
                '\\' => f.write_str("\\\\")?,
                c => f.write_char(c)?,
            }
        }
        f.write_char('`')
    }
}

/// Words that cannot appear bare where a name is expected
const KEYWORDS: &[&str] = &[
    "ADD", "AFTER", "ALTER", "AND", "AS", "ASC", "BETWEEN", "BY", "CASE", "COLUMN", "DESC",
    "DISTINCT", "DROP", "ELSE", "END", "FALSE", "FROM", "GROUP", "HAVING", "IN", "INSERT", "INTO",
    "IS", "JOIN", "LIKE", "LIMIT", "MODIFY", "NOT", "NULL", "OFFSET", "ON", "OR", "ORDER",
    "SELECT", "TABLE", "THEN", "TRUE", "UNION", "VALUES", "WHEN", "WHERE", "WITH",
];

fn is_plain_word(name: &str) -> bool {
    let mut chars = name.chars();
    let word = match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };
    word && !KEYWORDS.iter().any(|k| k.eq_ignore_ascii_case(name))
}
