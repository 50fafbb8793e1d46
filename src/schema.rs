//! Fixed column typing for delimited inputs.
//!
//! A [`TableSchema`] is an ordered list of [`ColumnSpec`]s. It is declared per
//! dataset (see [`crate::config::DatasetKind`]) or loaded from configuration,
//! and converts to an Arrow schema that every batch produced by the reader
//! carries.

use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::error::IngestError;

/// Logical type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Int32,
    Int64,
    Float64,
    Bool,
    Utf8,
}

impl ColumnType {
    #[must_use]
    pub fn data_type(self) -> DataType {
        match self {
            Self::Int32 => DataType::Int32,
            Self::Int64 => DataType::Int64,
            Self::Float64 => DataType::Float64,
            Self::Bool => DataType::Boolean,
            Self::Utf8 => DataType::Utf8,
        }
    }

    /// Name used in parse error messages.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::Float64 => "float64",
            Self::Bool => "bool",
            Self::Utf8 => "utf8",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One declared column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: ColumnType,
    /// Whether an empty field is read as null. Defaults to `false`.
    #[serde(default)]
    pub nullable: bool,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, ty: ColumnType) -> Self {
        Self {
            name: name.into(),
            ty,
            nullable: false,
        }
    }

    #[must_use]
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }
}

/// Ordered column declarations for one input file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TableSchema {
    columns: Vec<ColumnSpec>,
}

impl TableSchema {
    /// Build a schema, rejecting empty and duplicate column lists.
    ///
    /// # Errors
    /// Returns [`IngestError::Schema`] when no columns are given or a name repeats.
    pub fn new(columns: Vec<ColumnSpec>) -> Result<Self, IngestError> {
        let schema = Self { columns };
        schema.validate()?;
        Ok(schema)
    }

    /// Shorthand for non-nullable columns.
    ///
    /// # Errors
    /// See [`TableSchema::new`].
    pub fn of(columns: &[(&str, ColumnType)]) -> Result<Self, IngestError> {
        Self::new(
            columns
                .iter()
                .map(|(name, ty)| ColumnSpec::new(*name, *ty))
                .collect(),
        )
    }

    /// Schemas declared in this crate; the column lists are known to be valid.
    pub(crate) fn builtin(columns: &[(&str, ColumnType)]) -> Self {
        Self {
            columns: columns
                .iter()
                .map(|(name, ty)| ColumnSpec::new(*name, *ty))
                .collect(),
        }
    }

    /// Check the invariants `new` enforces; needed again after deserialization.
    ///
    /// # Errors
    /// Returns [`IngestError::Schema`] when the column list is empty or a name repeats.
    pub fn validate(&self) -> Result<(), IngestError> {
        if self.columns.is_empty() {
            return Err(IngestError::Schema(
                "schema must declare at least one column".into(),
            ));
        }
        for (i, col) in self.columns.iter().enumerate() {
            if self.columns[..i].iter().any(|c| c.name == col.name) {
                return Err(IngestError::Schema(format!(
                    "column `{}` is declared twice",
                    col.name
                )));
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    #[must_use]
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    #[must_use]
    pub fn to_arrow(&self) -> SchemaRef {
        let fields: Vec<Field> = self
            .columns
            .iter()
            .map(|c| Field::new(&c.name, c.ty.data_type(), c.nullable))
            .collect();
        Arc::new(Schema::new(fields))
    }
}
