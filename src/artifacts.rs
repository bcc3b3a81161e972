//! Export and load artifacts of the ETL pipeline.
//!
//! These are plain string templates: a Hive script exporting a table to an
//! HDFS directory, stored-procedure calls on the downstream database, the
//! Sqoop command moving the exported files, and the HDFS cleanup command.

use serde::{Deserialize, Serialize};

use crate::ast::{ColumnMapping, Table};
use crate::transpiler::{ToShell, ToSql};

/// Hive script writing a table to an HDFS directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HdfsExport {
    /// `SET key=value;` lines, in order.
    pub hive_settings: Vec<(String, String)>,
    pub directory: String,
    /// `ROW FORMAT DELIMITED FIELDS TERMINATED BY '<t>'` when set.
    pub field_terminator: Option<String>,
    pub select: Vec<ColumnMapping>,
    pub from_table: Table,
    pub where_clause: Option<String>,
}

impl ToSql for HdfsExport {
    fn to_sql(&self) -> String {
        let mut sql = String::new();

        for (key, value) in &self.hive_settings {
            sql.push_str(&format!("SET {}={};\n", key, value));
        }

        sql.push_str(&format!("INSERT OVERWRITE DIRECTORY '{}'\n", self.directory));

        if let Some(terminator) = &self.field_terminator {
            sql.push_str("ROW FORMAT DELIMITED\n");
            sql.push_str(&format!("FIELDS TERMINATED BY '{}'\n", terminator));
        }

        sql.push_str("SELECT\n");
        let last = self.select.len().saturating_sub(1);
        for (i, col) in self.select.iter().enumerate() {
            let mut line = format!("  {}", col.expression);
            if !col.alias.is_empty() {
                line.push_str(&format!("  AS {}", col.alias));
            }
            if i < last {
                line.push(',');
            }
            sql.push_str(&line);
            sql.push('\n');
        }

        sql.push_str(&format!("FROM {}", self.from_table.full_name()));
        if let Some(where_clause) = &self.where_clause {
            sql.push_str(&format!("\nWHERE {}", where_clause));
        }

        sql
    }
}

/// An argument of a stored-procedure call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcArg {
    /// Quoted string literal.
    Str(String),
    /// Emitted verbatim, e.g. a number.
    Raw(String),
    /// SQL `null`, emitted in the given spelling.
    Null(String),
}

impl ProcArg {
    /// String argument; the text `null` (any case) becomes a bare null.
    pub fn text(value: impl Into<String>) -> Self {
        let value = value.into();
        if value.eq_ignore_ascii_case("null") {
            ProcArg::Null(value)
        } else {
            ProcArg::Str(value)
        }
    }

    pub fn raw(value: impl ToString) -> Self {
        ProcArg::Raw(value.to_string())
    }

    pub fn null() -> Self {
        ProcArg::Null("null".to_string())
    }
}

impl std::fmt::Display for ProcArg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProcArg::Str(s) => write!(f, "'{}'", s),
            ProcArg::Raw(s) | ProcArg::Null(s) => write!(f, "{}", s),
        }
    }
}

/// A stored-procedure call statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcedureCall {
    pub procedure: String,
    pub args: Vec<ProcArg>,
}

impl ProcedureCall {
    pub fn new(procedure: impl Into<String>) -> Self {
        Self {
            procedure: procedure.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: ProcArg) -> Self {
        self.args.push(arg);
        self
    }
}

impl ToSql for ProcedureCall {
    fn to_sql(&self) -> String {
        let args: Vec<String> = self.args.iter().map(|a| a.to_string()).collect();
        format!("{}({});", self.procedure, args.join(","))
    }
}

/// A `sqoop export` command line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqoopExport {
    pub sqoop_path: String,
    pub command: String,
    /// `--key value` arguments, in order.
    pub arguments: Vec<(String, String)>,
    /// `--flag` arguments, emitted after the keyed ones.
    pub flags: Vec<String>,
}

impl SqoopExport {
    pub fn new(sqoop_path: impl Into<String>) -> Self {
        Self {
            sqoop_path: sqoop_path.into(),
            command: "export".to_string(),
            arguments: Vec::new(),
            flags: Vec::new(),
        }
    }

    pub fn arg(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.arguments.push((key.into(), value.to_string()));
        self
    }

    pub fn flag(mut self, flag: impl Into<String>) -> Self {
        self.flags.push(flag.into());
        self
    }
}

impl ToShell for SqoopExport {
    fn to_shell(&self) -> String {
        let mut parts = vec![format!("{} {}", self.sqoop_path, self.command)];
        parts.extend(self.arguments.iter().map(|(k, v)| format!("--{} {}", k, v)));
        parts.extend(self.flags.iter().map(|f| format!("--{}", f)));
        parts.join(" \\\n")
    }
}

/// Recursive removal of an HDFS directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HdfsCleanup {
    pub directory: String,
}

impl ToShell for HdfsCleanup {
    fn to_shell(&self) -> String {
        format!("hdfs dfs -rm -r -f {}", self.directory)
    }
}
