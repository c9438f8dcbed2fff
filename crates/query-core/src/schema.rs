use crate::error::{QueryError, Result};
use crate::types::DataType;
use arrow::datatypes::{Field as ArrowField, Schema as ArrowSchema};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    name: String,
    data_type: DataType,
    nullable: bool,
}

impl Field {
    pub fn new(name: impl Into<String>, data_type: DataType, nullable: bool) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data_type(&self) -> &DataType {
        &self.data_type
    }

    pub fn nullable(&self) -> bool {
        self.nullable
    }

    pub fn to_arrow(&self) -> ArrowField {
        ArrowField::new(self.name.clone(), self.data_type.to_arrow(), self.nullable)
    }
}

/// Column list of a table, in declaration order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    fields: Vec<Field>,
}

impl Schema {
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Result<usize> {
        self.fields
            .iter()
            .position(|f| f.name() == name)
            .ok_or_else(|| QueryError::ColumnNotFound(name.to_string()))
    }

    pub fn to_arrow(&self) -> ArrowSchema {
        let fields: Vec<ArrowField> = self.fields.iter().map(|f| f.to_arrow()).collect();
        ArrowSchema::new(fields)
    }

    pub fn from_arrow(schema: &ArrowSchema) -> Self {
        let fields = schema
            .fields()
            .iter()
            .map(|f| {
                Field::new(
                    f.name(),
                    DataType::from_arrow(f.data_type()),
                    f.is_nullable(),
                )
            })
            .collect();
        Self { fields }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_schema() -> Schema {
        Schema::new(vec![
            Field::new("id", DataType::Int64, false),
            Field::new("name", DataType::Utf8, true),
        ])
    }

    #[test]
    fn test_index_of() {
        let schema = create_test_schema();
        assert_eq!(schema.index_of("name").unwrap(), 1);
        assert!(matches!(
            schema.index_of("missing"),
            Err(QueryError::ColumnNotFound(_))
        ));
    }

    #[test]
    fn test_arrow_conversion() {
        let schema = create_test_schema();
        let arrow_schema = schema.to_arrow();
        assert_eq!(arrow_schema.fields().len(), 2);
        assert_eq!(Schema::from_arrow(&arrow_schema), schema);
    }
}
