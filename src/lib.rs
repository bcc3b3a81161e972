//! # etlgen: Hive ETL script generator
//!
//! Turns the DWS table sheets of a data warehouse design into Hive SQL and
//! the export/load steps around it.
//!
//! ## Quick Example
//!
//! ```rust,ignore
//! use etlgen::prelude::*;
//!
//! let tables = etlgen::parse(&std::fs::read_to_string("tables.txt")?);
//! let conventions = Conventions::default();
//!
//! for table in &tables {
//!     if let Some(query) = table.to_query_config(&conventions) {
//!         println!("{}", query.to_sql());
//!     }
//! }
//! ```
//!
//! ## Pipeline
//!
//! | Stage                | Module        | Output                         |
//! |----------------------|---------------|--------------------------------|
//! | Table sheet          | `parser`      | `Vec<TableRecord>`             |
//! | Query derivation     | `builder`     | `QueryConfig`                  |
//! | Rendering            | `transpiler`  | Hive `INSERT OVERWRITE` SQL    |
//! | Export and load      | `pipeline`    | ordered `PipelineStep`s        |
//! | Step documents       | `steps`       | `Process`                      |

pub mod artifacts;
pub mod ast;
pub mod builder;
pub mod classify;
pub mod config;
pub mod error;
pub mod parser;
pub mod pipeline;
pub mod steps;
pub mod transpiler;

pub mod prelude {
    pub use crate::artifacts::*;
    pub use crate::ast::*;
    pub use crate::builder::{ToQueryConfig, build};
    pub use crate::config::{Config, Conventions, ExportSettings};
    pub use crate::error::*;
    pub use crate::parser::parse;
    pub use crate::pipeline::{CommandKind, Pipeline, PipelineStep};
    pub use crate::steps::{LoadType, Process, ProcessCollection, Step};
    pub use crate::transpiler::{ToShell, ToSql};
}

/// Parse a table sheet into table records.
///
/// # Example
///
/// ```
/// let tables = etlgen::parse("【DWS表 1】\n表英文名: T_DWS_SALES\n");
/// assert_eq!(tables[0].name, "T_DWS_SALES");
/// ```
pub fn parse(content: &str) -> Vec<ast::TableRecord> {
    parser::parse(content)
}

/// Read and parse a table sheet file.
pub fn load_tables(path: impl AsRef<std::path::Path>) -> error::EtlResult<Vec<ast::TableRecord>> {
    let content = std::fs::read_to_string(path)?;
    Ok(parser::parse(&content))
}
