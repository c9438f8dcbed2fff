//! In-process query interpreter
//!
//! [`SelectInterpreter`] evaluates a SELECT against tables held in memory by
//! a [`Context`]. The returned stream is lazy: table resolution and all
//! evaluation happen on the first `next_batch` call, and any failure is
//! reported as a stream item.

use crate::operators::{evaluate_expr, expr_name};
use arrow::array::{Array, ArrayRef, BooleanArray};
use arrow::compute::filter_record_batch;
use arrow::datatypes::{Field as ArrowField, Schema as ArrowSchema};
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use async_trait::async_trait;
use query_core::{BlockStream, Context, ProcessingStage, QueryError, Result, TableData};
use query_parser::{SelectItem, SelectQuery, Statement};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::debug;

/// Executes a query inside this process
pub trait QueryInterpreter: Send + Sync {
    /// Build a lazy stream for `query`, evaluated up to `stage`.
    ///
    /// Must not do any work before the stream is first polled.
    fn interpret(
        &self,
        query: Arc<Statement>,
        context: Context,
        stage: ProcessingStage,
    ) -> Box<dyn BlockStream>;
}

/// Interpreter for single-table SELECT queries over in-memory tables
#[derive(Debug, Default, Clone, Copy)]
pub struct SelectInterpreter;

impl SelectInterpreter {
    pub fn new() -> Self {
        Self
    }
}

impl QueryInterpreter for SelectInterpreter {
    fn interpret(
        &self,
        query: Arc<Statement>,
        context: Context,
        stage: ProcessingStage,
    ) -> Box<dyn BlockStream> {
        Box::new(SelectBlockStream::new(query, context, stage))
    }
}

enum StreamState {
    /// Nothing evaluated yet
    Pending,
    Running(Box<Evaluation>),
    Done,
}

/// Evaluation in progress: source batches not yet consumed plus output
/// blocks ready to hand out
struct Evaluation {
    input: VecDeque<RecordBatch>,
    output: VecDeque<RecordBatch>,
    rows_to_skip: usize,
    rows_remaining: Option<usize>,
    rows_read: u64,
    rows_returned: u64,
}

/// Lazy stream produced by [`SelectInterpreter`]
pub struct SelectBlockStream {
    query: Arc<Statement>,
    context: Context,
    stage: ProcessingStage,
    state: StreamState,
    name: String,
}

impl SelectBlockStream {
    pub fn new(query: Arc<Statement>, context: Context, stage: ProcessingStage) -> Self {
        Self {
            query,
            context,
            stage,
            state: StreamState::Pending,
            name: "local".to_string(),
        }
    }

    fn select(&self) -> Result<&SelectQuery> {
        let select = self.query.as_select().ok_or_else(|| {
            QueryError::Unsupported(format!("{} query in a local read", self.query.kind()))
        })?;

        if select.distinct {
            return Err(QueryError::Unsupported("DISTINCT".to_string()));
        }
        if !select.group_by.is_empty() {
            return Err(QueryError::Unsupported("GROUP BY".to_string()));
        }
        if select.having.is_some() {
            return Err(QueryError::Unsupported("HAVING".to_string()));
        }
        if !select.order_by.is_empty() {
            return Err(QueryError::Unsupported("ORDER BY".to_string()));
        }
        Ok(select)
    }

    fn resolve_table(&self, select: &SelectQuery) -> Result<Vec<RecordBatch>> {
        let Some(table) = &select.table else {
            // SELECT without FROM reads a single empty row
            let schema = Arc::new(ArrowSchema::empty());
            let options = RecordBatchOptions::new().with_row_count(Some(1));
            let batch = RecordBatch::try_new_with_options(schema, vec![], &options)?;
            return Ok(vec![batch]);
        };

        let data: Arc<TableData> = match &select.database {
            Some(database) => self.context.get_table(&database.name, &table.name)?,
            None => match self.context.try_get_external_table(&table.name) {
                Some(data) => data,
                None => self
                    .context
                    .get_table(self.context.current_database(), &table.name)?,
            },
        };
        Ok(data.batches().to_vec())
    }

    fn start(&self) -> Result<Evaluation> {
        let select = self.select()?;
        let input = self.resolve_table(select)?;
        debug!(
            query = %self.query,
            stage = %self.stage,
            batches = input.len(),
            "Starting local evaluation"
        );
        Ok(Evaluation {
            input: input.into(),
            output: VecDeque::new(),
            rows_to_skip: select.offset.unwrap_or(0),
            rows_remaining: select.limit,
            rows_read: 0,
            rows_returned: 0,
        })
    }

    /// Run the next source batch through filter, offset/limit and projection.
    /// Returns false once no more output can be produced.
    fn advance(&self, evaluation: &mut Evaluation) -> Result<bool> {
        if evaluation.rows_remaining == Some(0) {
            return Ok(false);
        }
        let Some(batch) = evaluation.input.pop_front() else {
            return Ok(false);
        };

        evaluation.rows_read += batch.num_rows() as u64;
        let max_rows = self.context.settings().limits.max_rows_to_read;
        if max_rows > 0 && evaluation.rows_read > max_rows {
            return Err(QueryError::ExecutionError(format!(
                "Limit for rows to read exceeded: {} rows read, maximum {}",
                evaluation.rows_read, max_rows
            )));
        }

        let select = self.select()?;
        let mut batch = match &select.selection {
            Some(predicate) => {
                let mask = evaluate_expr(predicate, &batch)?;
                let mask = mask
                    .as_any()
                    .downcast_ref::<BooleanArray>()
                    .ok_or_else(|| QueryError::TypeMismatch {
                        expected: "boolean WHERE condition".to_string(),
                        found: mask.data_type().to_string(),
                    })?;
                filter_record_batch(&batch, mask)?
            }
            None => batch,
        };

        if evaluation.rows_to_skip > 0 {
            let skip = evaluation.rows_to_skip.min(batch.num_rows());
            evaluation.rows_to_skip -= skip;
            batch = batch.slice(skip, batch.num_rows() - skip);
        }
        if let Some(remaining) = evaluation.rows_remaining.as_mut() {
            let take = (*remaining).min(batch.num_rows());
            *remaining -= take;
            batch = batch.slice(0, take);
        }
        if batch.num_rows() == 0 {
            return Ok(true);
        }

        evaluation.rows_returned += batch.num_rows() as u64;
        let max_result = self.context.settings().limits.max_result_rows;
        if max_result > 0 && evaluation.rows_returned > max_result {
            return Err(QueryError::ExecutionError(format!(
                "Limit for result rows exceeded: {} rows, maximum {}",
                evaluation.rows_returned, max_result
            )));
        }

        let projected = project(&select.projection, &batch)?;
        let block_size = self.context.settings().max_block_size.max(1);
        let mut offset = 0;
        while offset < projected.num_rows() {
            let len = block_size.min(projected.num_rows() - offset);
            evaluation.output.push_back(projected.slice(offset, len));
            offset += len;
        }
        Ok(true)
    }

    fn poll_evaluation(&self, evaluation: &mut Evaluation) -> Option<Result<RecordBatch>> {
        loop {
            if let Some(batch) = evaluation.output.pop_front() {
                return Some(Ok(batch));
            }
            match self.advance(evaluation) {
                Ok(true) => continue,
                Ok(false) => return None,
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

#[async_trait]
impl BlockStream for SelectBlockStream {
    async fn next_batch(&mut self) -> Option<Result<RecordBatch>> {
        let mut evaluation = match std::mem::replace(&mut self.state, StreamState::Done) {
            StreamState::Pending => match self.start() {
                Ok(evaluation) => Box::new(evaluation),
                Err(e) => return Some(Err(e)),
            },
            StreamState::Running(evaluation) => evaluation,
            StreamState::Done => return None,
        };

        let item = self.poll_evaluation(&mut evaluation);
        if matches!(item, Some(Ok(_))) {
            self.state = StreamState::Running(evaluation);
        }
        item
    }

    fn name(&self) -> &str {
        &self.name
    }
}

fn project(items: &[SelectItem], batch: &RecordBatch) -> Result<RecordBatch> {
    let mut fields = Vec::new();
    let mut columns: Vec<ArrayRef> = Vec::new();

    for item in items {
        match item {
            SelectItem::Wildcard => {
                for (field, column) in batch.schema().fields().iter().zip(batch.columns()) {
                    fields.push(field.as_ref().clone());
                    columns.push(column.clone());
                }
            }
            SelectItem::UnnamedExpr(expr) => {
                let array = evaluate_expr(expr, batch)?;
                fields.push(ArrowField::new(expr_name(expr), array.data_type().clone(), true));
                columns.push(array);
            }
            SelectItem::ExprWithAlias { expr, alias } => {
                let array = evaluate_expr(expr, batch)?;
                fields.push(ArrowField::new(alias, array.data_type().clone(), true));
                columns.push(array);
            }
        }
    }

    let options = RecordBatchOptions::new().with_row_count(Some(batch.num_rows()));
    Ok(RecordBatch::try_new_with_options(
        Arc::new(ArrowSchema::new(fields)),
        columns,
        &options,
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Int64Array, StringArray};
    use arrow::datatypes::DataType as ArrowDataType;
    use query_core::{collect_batches, Settings};
    use query_parser::{BinaryOperator, Expr};

    fn create_test_batch(ids: Vec<i64>, names: Vec<&str>) -> RecordBatch {
        let schema = Arc::new(ArrowSchema::new(vec![
            ArrowField::new("id", ArrowDataType::Int64, false),
            ArrowField::new("name", ArrowDataType::Utf8, false),
        ]));
        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Int64Array::from(ids)),
                Arc::new(StringArray::from(names)),
            ],
        )
        .unwrap()
    }

    fn create_test_context() -> Context {
        let context = Context::default();
        let data = TableData::from_batches(vec![
            create_test_batch(vec![1, 2, 3], vec!["a", "b", "c"]),
            create_test_batch(vec![4, 5], vec!["d", "e"]),
        ])
        .unwrap();
        context.register_table("db", "events", data);
        context
    }

    async fn run(query: SelectQuery, context: Context) -> Result<Vec<RecordBatch>> {
        let mut stream = SelectInterpreter::new().interpret(
            Arc::new(Statement::Select(query)),
            context,
            ProcessingStage::Complete,
        );
        collect_batches(stream.as_mut()).await
    }

    fn ids(batches: &[RecordBatch]) -> Vec<i64> {
        batches
            .iter()
            .flat_map(|b| {
                b.column(0)
                    .as_any()
                    .downcast_ref::<Int64Array>()
                    .unwrap()
                    .values()
                    .to_vec()
            })
            .collect()
    }

    #[tokio::test]
    async fn test_select_all() {
        let query = SelectQuery::from_table(vec![SelectItem::Wildcard], Some("db"), "events");
        let batches = run(query, create_test_context()).await.unwrap();
        assert_eq!(ids(&batches), vec![1, 2, 3, 4, 5]);
        assert_eq!(batches[0].num_columns(), 2);
    }

    #[tokio::test]
    async fn test_filter_offset_limit() {
        let query = SelectQuery::from_table(vec![SelectItem::column("id")], Some("db"), "events")
            .with_selection(Expr::binary(
                Expr::column("id"),
                BinaryOperator::Greater,
                Expr::number(1),
            ))
            .with_offset(1)
            .with_limit(2);
        let batches = run(query, create_test_context()).await.unwrap();
        assert_eq!(ids(&batches), vec![3, 4]);
    }

    #[tokio::test]
    async fn test_projection_with_alias() {
        let query = SelectQuery::from_table(
            vec![SelectItem::ExprWithAlias {
                expr: Expr::binary(Expr::column("id"), BinaryOperator::Multiply, Expr::number(10)),
                alias: "scaled".to_string(),
            }],
            Some("db"),
            "events",
        );
        let batches = run(query, create_test_context()).await.unwrap();
        assert_eq!(batches[0].schema().field(0).name(), "scaled");
        assert_eq!(ids(&batches), vec![10, 20, 30, 40, 50]);
    }

    #[tokio::test]
    async fn test_blocks_split_by_max_block_size() {
        let mut settings = Settings::default();
        settings.max_block_size = 2;
        let context = create_test_context().with_settings(settings);

        let query = SelectQuery::from_table(vec![SelectItem::Wildcard], Some("db"), "events");
        let batches = run(query, context).await.unwrap();
        let sizes: Vec<usize> = batches.iter().map(|b| b.num_rows()).collect();
        assert_eq!(sizes, vec![2, 1, 2]);
    }

    #[tokio::test]
    async fn test_external_table_resolved_first() {
        let mut context = create_test_context().with_database("db");
        let external = TableData::from_batches(vec![create_test_batch(vec![42], vec!["x"])]).unwrap();
        context
            .add_external_table("events", Arc::new(external))
            .unwrap();

        let query = SelectQuery::from_table(vec![SelectItem::column("id")], None, "events");
        let batches = run(query, context.clone()).await.unwrap();
        assert_eq!(ids(&batches), vec![42]);

        // A qualified name always goes to the catalog
        let query = SelectQuery::from_table(vec![SelectItem::column("id")], Some("db"), "events");
        let batches = run(query, context).await.unwrap();
        assert_eq!(ids(&batches), vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn test_select_without_table() {
        let query = SelectQuery {
            projection: vec![SelectItem::UnnamedExpr(Expr::number(1))],
            ..Default::default()
        };
        let batches = run(query, Context::default()).await.unwrap();
        assert_eq!(ids(&batches), vec![1]);
    }

    #[tokio::test]
    async fn test_errors_are_deferred_to_stream() {
        let query = SelectQuery::from_table(vec![SelectItem::Wildcard], Some("db"), "missing");
        let mut stream = SelectInterpreter::new().interpret(
            Arc::new(Statement::Select(query)),
            Context::default(),
            ProcessingStage::Complete,
        );

        let first = stream.next_batch().await;
        assert!(matches!(first, Some(Err(QueryError::TableNotFound(_)))));
        assert!(stream.next_batch().await.is_none());
    }

    #[tokio::test]
    async fn test_unsupported_constructs() {
        let mut query = SelectQuery::from_table(vec![SelectItem::Wildcard], Some("db"), "events");
        query.group_by = vec![Expr::column("id")];
        let result = run(query, create_test_context()).await;
        assert!(matches!(result, Err(QueryError::Unsupported(_))));

        let query = SelectQuery::from_table(
            vec![SelectItem::UnnamedExpr(Expr::Function {
                name: "count".to_string(),
                args: vec![],
            })],
            Some("db"),
            "events",
        );
        let result = run(query, create_test_context()).await;
        assert!(matches!(result, Err(QueryError::Unsupported(_))));
    }

    #[tokio::test]
    async fn test_max_rows_to_read() {
        let mut settings = Settings::default();
        settings.limits.max_rows_to_read = 4;
        let context = create_test_context().with_settings(settings);

        let query = SelectQuery::from_table(vec![SelectItem::Wildcard], Some("db"), "events");
        let result = run(query, context).await;
        assert!(matches!(result, Err(QueryError::ExecutionError(_))));
    }

    #[tokio::test]
    async fn test_max_result_rows() {
        let mut settings = Settings::default();
        settings.limits.max_result_rows = 2;
        let context = create_test_context().with_settings(settings);

        // Filtered down to the limit
        let query = SelectQuery::from_table(vec![SelectItem::Wildcard], Some("db"), "events")
            .with_selection(Expr::binary(
                Expr::column("id"),
                BinaryOperator::Greater,
                Expr::number(3),
            ));
        let batches = run(query, context.clone()).await.unwrap();
        assert_eq!(ids(&batches), vec![4, 5]);

        // The first source batch alone returns three rows
        let query = SelectQuery::from_table(vec![SelectItem::Wildcard], Some("db"), "events");
        let mut stream = SelectInterpreter::new().interpret(
            Arc::new(Statement::Select(query)),
            context,
            ProcessingStage::Complete,
        );
        match stream.next_batch().await {
            Some(Err(QueryError::ExecutionError(msg))) => assert!(msg.contains("result rows")),
            _ => panic!("expected the result limit to trip"),
        }
        assert!(stream.next_batch().await.is_none());
    }
}
