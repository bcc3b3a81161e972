//! Data model shared by the parser, the query builder and the renderers.

use serde::{Deserialize, Serialize};

/// One column definition from a table sheet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRecord {
    /// Target column alias.
    pub name: String,
    /// Source expression or function call text. May be empty.
    pub logic: String,
    /// Originating table. May be empty.
    pub source_table: String,
}

impl FieldRecord {
    pub fn new(
        name: impl Into<String>,
        logic: impl Into<String>,
        source_table: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            logic: logic.into(),
            source_table: source_table.into(),
        }
    }
}

/// One table definition from a table sheet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRecord {
    pub name: String,
    /// Label of the spreadsheet page the fact details came from.
    pub source_sheet: String,
    pub remark: String,
    /// Column used for incremental filtering. May be empty.
    pub increment_field: String,
    pub fields: Vec<FieldRecord>,
}

impl TableRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Append a field (builder style).
    pub fn field(mut self, field: FieldRecord) -> Self {
        self.fields.push(field);
        self
    }

    /// Set the increment field (builder style).
    pub fn increment_field(mut self, column: impl Into<String>) -> Self {
        self.increment_field = column.into();
        self
    }
}

/// A table reference with optional schema and alias.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub schema: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub alias: String,
}

impl Table {
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
            alias: String::new(),
        }
    }

    pub fn aliased(mut self, alias: impl Into<String>) -> Self {
        self.alias = alias.into();
        self
    }

    /// Schema-qualified name, e.g. `dws.T_MY_TABLE`.
    pub fn full_name(&self) -> String {
        if self.schema.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.schema, self.name)
        }
    }
}

/// A select-list entry: source expression and target alias.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub expression: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub alias: String,
}

impl ColumnMapping {
    pub fn new(expression: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            expression: expression.into(),
            alias: alias.into(),
        }
    }
}

/// Join type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinKind {
    #[default]
    Left,
    /// Never produced by the builder; for hand-edited configs.
    Inner,
}

impl std::fmt::Display for JoinKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JoinKind::Left => write!(f, "left join"),
            JoinKind::Inner => write!(f, "join"),
        }
    }
}

/// A join clause. Inactive joins are rendered commented out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Join {
    pub kind: JoinKind,
    pub target: Table,
    pub condition: String,
    pub active: bool,
}

/// A GROUP BY entry. Inactive entries are rendered commented out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupByColumn {
    pub expression: String,
    pub active: bool,
}

impl GroupByColumn {
    pub fn active(expression: impl Into<String>) -> Self {
        Self {
            expression: expression.into(),
            active: true,
        }
    }

    /// Commented-out entry. The builder only emits active ones; this is for
    /// hand-edited configs.
    pub fn inactive(expression: impl Into<String>) -> Self {
        Self {
            expression: expression.into(),
            active: false,
        }
    }
}

/// Structured description of one `INSERT OVERWRITE ... SELECT` statement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryConfig {
    pub target_table: Table,
    /// Partition spec for the insert, e.g. `dt='${mt1}'`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partition: Option<String>,
    pub select: Vec<ColumnMapping>,
    pub from_table: Table,
    pub joins: Vec<Join>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub where_clause: Option<String>,
    pub group_by: Vec<GroupByColumn>,
}

impl QueryConfig {
    /// True if any select expression would need a GROUP BY.
    pub fn has_group_by(&self) -> bool {
        !self.group_by.is_empty()
    }

    /// Target column names in select order, skipping unaliased expressions.
    pub fn target_columns(&self) -> impl Iterator<Item = &str> {
        self.select
            .iter()
            .filter(|c| !c.alias.is_empty())
            .map(|c| c.alias.as_str())
    }
}
