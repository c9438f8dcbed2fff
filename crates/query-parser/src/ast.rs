//! Query syntax tree
//!
//! `Clone` on any node is a deep copy: no node shares children with another
//! tree, so a cloned statement can be modified freely.

use query_core::DataType;

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Select(SelectQuery),
    Insert(InsertQuery),
    Alter(AlterQuery),
}

impl Statement {
    /// Statement kind as a keyword, for error messages
    pub fn kind(&self) -> &'static str {
        match self {
            Statement::Select(_) => "SELECT",
            Statement::Insert(_) => "INSERT",
            Statement::Alter(_) => "ALTER",
        }
    }

    pub fn as_select(&self) -> Option<&SelectQuery> {
        match self {
            Statement::Select(select) => Some(select),
            _ => None,
        }
    }

    pub fn as_select_mut(&mut self) -> Option<&mut SelectQuery> {
        match self {
            Statement::Select(select) => Some(select),
            _ => None,
        }
    }
}

/// What an identifier names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdentifierKind {
    Column,
    Database,
    Table,
    Function,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier {
    pub name: String,
    pub kind: IdentifierKind,
}

impl Identifier {
    pub fn new(name: impl Into<String>, kind: IdentifierKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    pub fn column(name: impl Into<String>) -> Self {
        Self::new(name, IdentifierKind::Column)
    }

    pub fn database(name: impl Into<String>) -> Self {
        Self::new(name, IdentifierKind::Database)
    }

    pub fn table(name: impl Into<String>) -> Self {
        Self::new(name, IdentifierKind::Table)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SelectQuery {
    pub distinct: bool,
    pub projection: Vec<SelectItem>,
    pub database: Option<Identifier>,
    pub table: Option<Identifier>,
    pub selection: Option<Expr>,
    pub group_by: Vec<Expr>,
    pub having: Option<Expr>,
    pub order_by: Vec<OrderByExpr>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl SelectQuery {
    /// `SELECT <projection> FROM [database.]table`
    pub fn from_table(
        projection: Vec<SelectItem>,
        database: Option<&str>,
        table: &str,
    ) -> Self {
        Self {
            projection,
            database: database.map(Identifier::database),
            table: Some(Identifier::table(table)),
            ..Default::default()
        }
    }

    pub fn with_selection(mut self, selection: Expr) -> Self {
        self.selection = Some(selection);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SelectItem {
    Wildcard,
    UnnamedExpr(Expr),
    ExprWithAlias { expr: Expr, alias: String },
}

impl SelectItem {
    pub fn column(name: impl Into<String>) -> Self {
        SelectItem::UnnamedExpr(Expr::column(name))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Identifier(Identifier),
    Literal(Literal),
    BinaryOp {
        left: Box<Expr>,
        op: BinaryOperator,
        right: Box<Expr>,
    },
    UnaryOp {
        op: UnaryOperator,
        expr: Box<Expr>,
    },
    Function {
        name: String,
        args: Vec<Expr>,
    },
}

impl Expr {
    pub fn column(name: impl Into<String>) -> Self {
        Expr::Identifier(Identifier::column(name))
    }

    pub fn number(value: impl ToString) -> Self {
        Expr::Literal(Literal::Number(value.to_string()))
    }

    pub fn string(value: impl Into<String>) -> Self {
        Expr::Literal(Literal::String(value.into()))
    }

    pub fn binary(left: Expr, op: BinaryOperator, right: Expr) -> Self {
        Expr::BinaryOp {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Number(String),
    String(String),
    Boolean(bool),
    Null,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Plus,
    Minus,
    Multiply,
    Divide,
    Modulo,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    And,
    Or,
}

impl BinaryOperator {
    /// Binding strength; higher binds tighter
    pub fn precedence(&self) -> u8 {
        match self {
            BinaryOperator::Or => 1,
            BinaryOperator::And => 2,
            BinaryOperator::Equal
            | BinaryOperator::NotEqual
            | BinaryOperator::Less
            | BinaryOperator::LessEqual
            | BinaryOperator::Greater
            | BinaryOperator::GreaterEqual => 3,
            BinaryOperator::Plus | BinaryOperator::Minus => 4,
            BinaryOperator::Multiply | BinaryOperator::Divide | BinaryOperator::Modulo => 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Not,
    Minus,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderByExpr {
    pub expr: Expr,
    pub asc: bool,
}

/// INSERT INTO [db.]table [(columns)] VALUES (...), ...
#[derive(Debug, Clone, PartialEq)]
pub struct InsertQuery {
    pub database: Option<Identifier>,
    pub table: Identifier,
    pub columns: Option<Vec<String>>,
    pub values: Vec<Vec<Expr>>,
}

/// ALTER TABLE [db.]table command, command, ...
#[derive(Debug, Clone, PartialEq)]
pub struct AlterQuery {
    pub database: Option<Identifier>,
    pub table: Identifier,
    pub commands: Vec<AlterCommand>,
}

/// One column-definition change
#[derive(Debug, Clone, PartialEq)]
pub enum AlterCommand {
    /// ADD COLUMN name type [AFTER column]; appended when `after` is None
    AddColumn {
        column: ColumnDef,
        after: Option<String>,
    },
    /// DROP COLUMN name
    DropColumn { name: String },
    /// MODIFY COLUMN name type
    ModifyColumn { column: ColumnDef },
}

/// Column definition for ALTER
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    pub name: String,
    pub data_type: DataType,
    pub nullable: bool,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, data_type: DataType, nullable: bool) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable,
        }
    }
}
