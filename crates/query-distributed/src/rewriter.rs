//! Query rewriting for remote execution

use crate::error::{DistributedError, Result};
use query_parser::{Identifier, Statement};

/// Retarget a SELECT at the physical table behind a distributed table.
///
/// Returns a deep copy of `query` whose database and table are replaced by
/// `remote_database` and `remote_table`; the input is left untouched.
pub fn rewrite_query(
    query: &Statement,
    remote_database: &str,
    remote_table: &str,
) -> Result<Statement> {
    let mut rewritten = query.clone();
    let select = rewritten
        .as_select_mut()
        .ok_or_else(|| DistributedError::UnsupportedQuery {
            expected: "SELECT".to_string(),
            found: query.kind().to_string(),
        })?;

    select.database = Some(Identifier::database(remote_database));
    select.table = Some(Identifier::table(remote_table));
    Ok(rewritten)
}

#[cfg(test)]
mod tests {
    use super::*;
    use query_parser::{
        AlterQuery, BinaryOperator, Expr, IdentifierKind, InsertQuery, SelectItem, SelectQuery,
    };

    fn create_test_query() -> Statement {
        Statement::Select(
            SelectQuery::from_table(vec![SelectItem::column("x")], None, "dist")
                .with_selection(Expr::binary(Expr::column("x"), BinaryOperator::Greater, Expr::number(5))),
        )
    }

    #[test]
    fn test_rewrite_replaces_database_and_table() {
        let query = create_test_query();
        let rewritten = rewrite_query(&query, "phys_db", "phys_tbl").unwrap();

        assert_eq!(rewritten.to_string(), "SELECT x FROM phys_db.phys_tbl WHERE x > 5");
        let select = rewritten.as_select().unwrap();
        assert_eq!(select.database.as_ref().unwrap().kind, IdentifierKind::Database);
        assert_eq!(select.table.as_ref().unwrap().kind, IdentifierKind::Table);
    }

    #[test]
    fn test_rewrite_leaves_input_untouched() {
        let query = create_test_query();
        let before = query.clone();
        let _ = rewrite_query(&query, "phys_db", "phys_tbl").unwrap();
        assert_eq!(query, before);
        assert_eq!(query.to_string(), "SELECT x FROM dist WHERE x > 5");
    }

    #[test]
    fn test_rewrite_replaces_existing_database() {
        let query = Statement::Select(SelectQuery::from_table(
            vec![SelectItem::Wildcard],
            Some("logical_db"),
            "dist",
        ));
        let rewritten = rewrite_query(&query, "db2", "t2").unwrap();
        assert_eq!(rewritten.to_string(), "SELECT * FROM db2.t2");
    }

    #[test]
    fn test_rewrite_rejects_non_select() {
        let insert = Statement::Insert(InsertQuery {
            database: None,
            table: Identifier::table("dist"),
            columns: None,
            values: vec![vec![Expr::number(1)]],
        });
        match rewrite_query(&insert, "db", "t") {
            Err(DistributedError::UnsupportedQuery { expected, found }) => {
                assert_eq!(expected, "SELECT");
                assert_eq!(found, "INSERT");
            }
            other => panic!("unexpected result: {other:?}"),
        }

        let alter = Statement::Alter(AlterQuery {
            database: None,
            table: Identifier::table("dist"),
            commands: vec![],
        });
        assert!(rewrite_query(&alter, "db", "t").is_err());
    }
}
