//! Column-definition changes on a table schema

use query_core::{Field, QueryError, Result, Schema};
use query_parser::{AlterCommand, ColumnDef};

/// Apply `commands` in order to a copy of `schema`.
///
/// Either every command applies or an error is returned and nothing
/// changes. A table must keep at least one column.
pub fn apply_alter_commands(schema: &Schema, commands: &[AlterCommand]) -> Result<Schema> {
    let mut fields = schema.fields().to_vec();

    for command in commands {
        match command {
            AlterCommand::AddColumn { column, after } => {
                if position(&fields, &column.name).is_some() {
                    return Err(QueryError::ColumnAlreadyExists(column.name.clone()));
                }
                let index = match after {
                    Some(after) => position(&fields, after)
                        .ok_or_else(|| QueryError::ColumnNotFound(after.clone()))?
                        + 1,
                    None => fields.len(),
                };
                fields.insert(index, to_field(column));
            }
            AlterCommand::DropColumn { name } => {
                let index = position(&fields, name)
                    .ok_or_else(|| QueryError::ColumnNotFound(name.clone()))?;
                if fields.len() == 1 {
                    return Err(QueryError::SchemaError(format!(
                        "cannot drop {}: a table must keep at least one column",
                        name
                    )));
                }
                fields.remove(index);
            }
            AlterCommand::ModifyColumn { column } => {
                let index = position(&fields, &column.name)
                    .ok_or_else(|| QueryError::ColumnNotFound(column.name.clone()))?;
                fields[index] = to_field(column);
            }
        }
    }

    Ok(Schema::new(fields))
}

fn position(fields: &[Field], name: &str) -> Option<usize> {
    fields.iter().position(|f| f.name() == name)
}

fn to_field(column: &ColumnDef) -> Field {
    Field::new(column.name.clone(), column.data_type.clone(), column.nullable)
}
