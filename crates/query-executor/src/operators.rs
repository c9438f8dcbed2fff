use arrow::array::*;
use arrow::compute;
use arrow::compute::kernels::cmp::{eq, gt, gt_eq, lt, lt_eq, neq};
use arrow::compute::kernels::numeric::{add, div, mul, neg, rem, sub};
use arrow::datatypes::DataType as ArrowDataType;
use arrow::record_batch::RecordBatch;
use query_core::{QueryError, Result};
use query_parser::{BinaryOperator, Expr, Literal, UnaryOperator};
use std::sync::Arc;

/// Evaluate a row expression against every row of `batch`
pub fn evaluate_expr(expr: &Expr, batch: &RecordBatch) -> Result<ArrayRef> {
    match expr {
        Expr::Identifier(ident) => {
            let index = batch
                .schema()
                .index_of(&ident.name)
                .map_err(|_| QueryError::ColumnNotFound(ident.name.clone()))?;
            Ok(batch.column(index).clone())
        }
        Expr::Literal(literal) => create_literal_array(literal, batch.num_rows()),
        Expr::BinaryOp { left, op, right } => {
            let left_array = evaluate_expr(left, batch)?;
            let right_array = evaluate_expr(right, batch)?;
            evaluate_binary_op(&left_array, *op, &right_array)
        }
        Expr::UnaryOp { op, expr } => {
            let array = evaluate_expr(expr, batch)?;
            evaluate_unary_op(&array, *op)
        }
        Expr::Function { name, .. } => Err(QueryError::Unsupported(format!(
            "function call {}()",
            name
        ))),
    }
}

/// Output column name for an unaliased expression
pub fn expr_name(expr: &Expr) -> String {
    match expr {
        Expr::Identifier(ident) => ident.name.clone(),
        other => other.to_string(),
    }
}

fn create_literal_array(literal: &Literal, size: usize) -> Result<ArrayRef> {
    match literal {
        Literal::Number(n) => {
            if let Ok(v) = n.parse::<i64>() {
                Ok(Arc::new(Int64Array::from(vec![v; size])) as ArrayRef)
            } else if let Ok(v) = n.parse::<f64>() {
                Ok(Arc::new(Float64Array::from(vec![v; size])) as ArrayRef)
            } else {
                Err(QueryError::ExecutionError(format!(
                    "Invalid numeric literal: {}",
                    n
                )))
            }
        }
        Literal::String(s) => Ok(Arc::new(StringArray::from(vec![s.as_str(); size])) as ArrayRef),
        Literal::Boolean(b) => Ok(Arc::new(BooleanArray::from(vec![*b; size])) as ArrayRef),
        Literal::Null => Ok(Arc::new(NullArray::new(size)) as ArrayRef),
    }
}

fn evaluate_unary_op(array: &ArrayRef, op: UnaryOperator) -> Result<ArrayRef> {
    match op {
        UnaryOperator::Not => {
            let bool_array = as_boolean(array, "NOT")?;
            Ok(Arc::new(compute::not(bool_array)?) as ArrayRef)
        }
        UnaryOperator::Minus => {
            if !array.data_type().is_numeric() {
                return Err(QueryError::TypeMismatch {
                    expected: "numeric".to_string(),
                    found: array.data_type().to_string(),
                });
            }
            Ok(neg(array.as_ref())?)
        }
    }
}

fn evaluate_binary_op(left: &ArrayRef, op: BinaryOperator, right: &ArrayRef) -> Result<ArrayRef> {
    if matches!(op, BinaryOperator::And | BinaryOperator::Or) {
        return evaluate_logical_op(left, op, right);
    }

    let (l, r) = coerce_pair(left, right)?;
    let result: ArrayRef = match op {
        BinaryOperator::Plus => add(&l, &r)?,
        BinaryOperator::Minus => sub(&l, &r)?,
        BinaryOperator::Multiply => mul(&l, &r)?,
        BinaryOperator::Divide => div(&l, &r)?,
        BinaryOperator::Modulo => rem(&l, &r)?,
        BinaryOperator::Equal => Arc::new(eq(&l, &r)?),
        BinaryOperator::NotEqual => Arc::new(neq(&l, &r)?),
        BinaryOperator::Less => Arc::new(lt(&l, &r)?),
        BinaryOperator::LessEqual => Arc::new(lt_eq(&l, &r)?),
        BinaryOperator::Greater => Arc::new(gt(&l, &r)?),
        BinaryOperator::GreaterEqual => Arc::new(gt_eq(&l, &r)?),
        BinaryOperator::And | BinaryOperator::Or => return evaluate_logical_op(left, op, right),
    };
    Ok(result)
}

fn evaluate_logical_op(left: &ArrayRef, op: BinaryOperator, right: &ArrayRef) -> Result<ArrayRef> {
    let keyword = if op == BinaryOperator::And { "AND" } else { "OR" };
    let left = coerce_null(left, &ArrowDataType::Boolean)?;
    let right = coerce_null(right, &ArrowDataType::Boolean)?;
    let l = as_boolean(&left, keyword)?;
    let r = as_boolean(&right, keyword)?;
    let result = if op == BinaryOperator::And {
        compute::and(l, r)?
    } else {
        compute::or(l, r)?
    };
    Ok(Arc::new(result) as ArrayRef)
}

fn as_boolean<'a>(array: &'a ArrayRef, keyword: &str) -> Result<&'a BooleanArray> {
    array
        .as_any()
        .downcast_ref::<BooleanArray>()
        .ok_or_else(|| QueryError::TypeMismatch {
            expected: format!("boolean operand for {}", keyword),
            found: array.data_type().to_string(),
        })
}

/// Bring both operands to one type: NULL literals adopt the other side's
/// type, mixed integers widen to Int64 and anything mixed with a float
/// becomes Float64.
fn coerce_pair(left: &ArrayRef, right: &ArrayRef) -> Result<(ArrayRef, ArrayRef)> {
    let (lhs, rhs) = (left.data_type(), right.data_type());
    if lhs == rhs {
        return Ok((left.clone(), right.clone()));
    }
    if lhs == &ArrowDataType::Null {
        return Ok((coerce_null(left, rhs)?, right.clone()));
    }
    if rhs == &ArrowDataType::Null {
        return Ok((left.clone(), coerce_null(right, lhs)?));
    }
    if lhs.is_numeric() && rhs.is_numeric() {
        let target = if lhs.is_floating() || rhs.is_floating() {
            ArrowDataType::Float64
        } else {
            ArrowDataType::Int64
        };
        return Ok((compute::cast(left, &target)?, compute::cast(right, &target)?));
    }
    Err(QueryError::TypeMismatch {
        expected: lhs.to_string(),
        found: rhs.to_string(),
    })
}

fn coerce_null(array: &ArrayRef, target: &ArrowDataType) -> Result<ArrayRef> {
    if array.data_type() == &ArrowDataType::Null {
        Ok(compute::cast(array, target)?)
    } else {
        Ok(array.clone())
    }
}
