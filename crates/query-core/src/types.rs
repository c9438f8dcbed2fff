use arrow::datatypes::DataType as ArrowDataType;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Boolean,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
    Utf8,
    Binary,
    Date32,
    Date64,
    Timestamp,
    Null,
}

impl DataType {
    pub fn to_arrow(&self) -> ArrowDataType {
        match self {
            DataType::Boolean => ArrowDataType::Boolean,
            DataType::Int8 => ArrowDataType::Int8,
            DataType::Int16 => ArrowDataType::Int16,
            DataType::Int32 => ArrowDataType::Int32,
            DataType::Int64 => ArrowDataType::Int64,
            DataType::UInt8 => ArrowDataType::UInt8,
            DataType::UInt16 => ArrowDataType::UInt16,
            DataType::UInt32 => ArrowDataType::UInt32,
            DataType::UInt64 => ArrowDataType::UInt64,
            DataType::Float32 => ArrowDataType::Float32,
            DataType::Float64 => ArrowDataType::Float64,
            DataType::Utf8 => ArrowDataType::Utf8,
            DataType::Binary => ArrowDataType::Binary,
            DataType::Date32 => ArrowDataType::Date32,
            DataType::Date64 => ArrowDataType::Date64,
            DataType::Timestamp => {
                ArrowDataType::Timestamp(arrow::datatypes::TimeUnit::Microsecond, None)
            }
            DataType::Null => ArrowDataType::Null,
        }
    }

    pub fn from_arrow(dt: &ArrowDataType) -> Self {
        match dt {
            ArrowDataType::Boolean => DataType::Boolean,
            ArrowDataType::Int8 => DataType::Int8,
            ArrowDataType::Int16 => DataType::Int16,
            ArrowDataType::Int32 => DataType::Int32,
            ArrowDataType::Int64 => DataType::Int64,
            ArrowDataType::UInt8 => DataType::UInt8,
            ArrowDataType::UInt16 => DataType::UInt16,
            ArrowDataType::UInt32 => DataType::UInt32,
            ArrowDataType::UInt64 => DataType::UInt64,
            ArrowDataType::Float32 => DataType::Float32,
            ArrowDataType::Float64 => DataType::Float64,
            ArrowDataType::Utf8 | ArrowDataType::LargeUtf8 => DataType::Utf8,
            ArrowDataType::Binary | ArrowDataType::LargeBinary => DataType::Binary,
            ArrowDataType::Date32 => DataType::Date32,
            ArrowDataType::Date64 => DataType::Date64,
            ArrowDataType::Timestamp(_, _) => DataType::Timestamp,
            _ => DataType::Null,
        }
    }
}

/// Type names as they appear in formatted DDL
impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::Boolean => "Bool",
            DataType::Int8 => "Int8",
            DataType::Int16 => "Int16",
            DataType::Int32 => "Int32",
            DataType::Int64 => "Int64",
            DataType::UInt8 => "UInt8",
            DataType::UInt16 => "UInt16",
            DataType::UInt32 => "UInt32",
            DataType::UInt64 => "UInt64",
            DataType::Float32 => "Float32",
            DataType::Float64 => "Float64",
            DataType::Utf8 => "String",
            DataType::Binary => "Binary",
            DataType::Date32 => "Date",
            DataType::Date64 => "Date64",
            DataType::Timestamp => "DateTime",
            DataType::Null => "Nothing",
        };
        f.write_str(name)
    }
}

/// How far a participant carries query processing before handing blocks back.
///
/// Ordered: a later stage implies every earlier one has been applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ProcessingStage {
    /// Only the requested columns are read
    FetchColumns,
    /// Partial results that the caller must merge and finalize
    WithMergeableState,
    /// Final results, no merge step needed
    Complete,
}

impl ProcessingStage {
    /// Stage a fan-out over `participants` executors must request.
    ///
    /// Exactly one participant already sees every row, so its result is final.
    pub fn for_participants(participants: usize) -> Self {
        if participants == 1 {
            ProcessingStage::Complete
        } else {
            ProcessingStage::WithMergeableState
        }
    }
}

impl fmt::Display for ProcessingStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessingStage::FetchColumns => write!(f, "FetchColumns"),
            ProcessingStage::WithMergeableState => write!(f, "WithMergeableState"),
            ProcessingStage::Complete => write!(f, "Complete"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_for_participants() {
        assert_eq!(
            ProcessingStage::for_participants(0),
            ProcessingStage::WithMergeableState
        );
        assert_eq!(
            ProcessingStage::for_participants(1),
            ProcessingStage::Complete
        );
        assert_eq!(
            ProcessingStage::for_participants(5),
            ProcessingStage::WithMergeableState
        );
    }

    #[test]
    fn test_stage_ordering() {
        assert!(ProcessingStage::FetchColumns < ProcessingStage::WithMergeableState);
        assert!(ProcessingStage::WithMergeableState < ProcessingStage::Complete);
    }

    #[test]
    fn test_arrow_round_trip_names() {
        assert_eq!(DataType::from_arrow(&DataType::Int64.to_arrow()), DataType::Int64);
        assert_eq!(DataType::Utf8.to_string(), "String");
    }
}
