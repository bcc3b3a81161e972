//! ETL pipeline planner.
//!
//! For one DWS table, lays out the steps that load it and ship it to the
//! downstream database:
//!
//! 1. Hive SQL filling the DWS table
//! 2. export of the DWS table to an HDFS temp directory
//! 3. creation of the mid (staging) table
//! 4. Sqoop export of the temp directory into the mid table
//! 5. replacement of the app table from the mid table
//! 6. removal of the temp directory
//!
//! Every stage exists once for the initialization load and once for the
//! incremental load.

use serde::{Deserialize, Serialize};

use crate::artifacts::{HdfsCleanup, HdfsExport, ProcArg, ProcedureCall, SqoopExport};
use crate::ast::{ColumnMapping, QueryConfig, Table, TableRecord};
use crate::builder::ToQueryConfig;
use crate::config::Config;
use crate::error::{EtlError, EtlResult};
use crate::steps::{LoadType, Process, Step};
use crate::transpiler::{ToShell, ToSql};

/// How a step's script is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    HiveSql,
    Shell,
    DmProc,
}

/// One planned step with its generated script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineStep {
    pub id: u32,
    pub name: String,
    pub load: LoadType,
    pub kind: CommandKind,
    pub script: String,
}

impl From<PipelineStep> for Step {
    fn from(step: PipelineStep) -> Self {
        Step {
            id: step.id,
            name: step.name,
            load: step.load,
            content: step.script,
        }
    }
}

/// Stage names, in execution order.
const STAGES: [&str; 6] = [
    "hive sql",
    "hive intermediate temp file",
    "create dameng intermediate table",
    "data load into dameng temp table",
    "replace dameng target table",
    "delete hive intermediate temp file",
];

/// Plans pipeline steps from a configuration.
#[derive(Debug, Clone, Copy)]
pub struct Pipeline<'a> {
    config: &'a Config,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    /// Steps of one load type, numbered from 1.
    pub fn plan(&self, table: &TableRecord, load: &LoadType) -> EtlResult<Vec<PipelineStep>> {
        let query = self.query(table)?;
        let scripts = self.scripts(table, &query, load)?;
        Ok(scripts
            .into_iter()
            .zip(STAGES)
            .enumerate()
            .map(|(i, ((kind, script), name))| PipelineStep {
                id: i as u32 + 1,
                name: name.to_string(),
                load: load.clone(),
                kind,
                script: script.trim_end().to_string(),
            })
            .collect())
    }

    /// Both load types, each stage's initialization step followed by its
    /// incremental step, numbered from 1.
    pub fn plan_all(&self, table: &TableRecord) -> EtlResult<Vec<PipelineStep>> {
        let init = self.plan(table, &LoadType::Initialization)?;
        let incr = self.plan(table, &LoadType::Incremental)?;
        Ok(init
            .into_iter()
            .zip(incr)
            .flat_map(|(a, b)| [a, b])
            .enumerate()
            .map(|(i, step)| PipelineStep {
                id: i as u32 + 1,
                ..step
            })
            .collect())
    }

    /// The full plan as a [`Process`] named after the table.
    pub fn process(&self, table: &TableRecord) -> EtlResult<Process> {
        Ok(Process {
            name: table.name.clone(),
            steps: self.plan_all(table)?.into_iter().map(Step::from).collect(),
        })
    }

    fn query(&self, table: &TableRecord) -> EtlResult<QueryConfig> {
        table
            .to_query_config(&self.config.conventions)
            .ok_or_else(|| EtlError::no_source_table(&table.name))
    }

    fn scripts(
        &self,
        table: &TableRecord,
        query: &QueryConfig,
        load: &LoadType,
    ) -> EtlResult<Vec<(CommandKind, String)>> {
        let incremental = match load {
            LoadType::Initialization => false,
            LoadType::Incremental => true,
            LoadType::Other(other) => {
                return Err(EtlError::Config(format!("unsupported load type '{}'", other)));
            }
        };

        let export = &self.config.export;
        let app_table = export.app_table(&table.name);
        let export_dir = export.export_dir(&table.name);

        Ok(vec![
            (CommandKind::HiveSql, self.hive_sql(query, incremental).to_sql()),
            (
                CommandKind::HiveSql,
                self.hdfs_export(table, query, incremental).to_sql(),
            ),
            (
                CommandKind::DmProc,
                ProcedureCall::new(&export.create_mid_procedure)
                    .arg(ProcArg::text(&app_table))
                    .arg(ProcArg::null())
                    .to_sql(),
            ),
            (
                CommandKind::Shell,
                SqoopExport::new(&export.sqoop_path)
                    .arg("options-file", &export.sqoop_options_file)
                    .arg("table", format!("{}{}", export.mid_prefix, app_table))
                    .arg("export-dir", &export_dir)
                    .arg("num-mappers", export.num_mappers)
                    .flag("batch")
                    .to_shell(),
            ),
            (CommandKind::DmProc, self.replace_call(&app_table, incremental).to_sql()),
            (
                CommandKind::Shell,
                HdfsCleanup {
                    directory: export_dir,
                }
                .to_shell(),
            ),
        ])
    }

    /// Initialization loads everything; incremental loads write one partition
    /// and keep the builder's recency filter.
    fn hive_sql(&self, query: &QueryConfig, incremental: bool) -> QueryConfig {
        let export = &self.config.export;
        let mut query = query.clone();
        if incremental {
            query.partition = Some(format!(
                "{}='{}'",
                export.partition_column, export.period_var
            ));
        } else {
            query.where_clause = None;
        }
        query
    }

    fn hdfs_export(&self, table: &TableRecord, query: &QueryConfig, incremental: bool) -> HdfsExport {
        let export = &self.config.export;
        let mut select: Vec<ColumnMapping> = query
            .target_columns()
            .map(|c| ColumnMapping::new(c, ""))
            .collect();
        select.push(ColumnMapping::new(
            export.partition_column.clone(),
            export.period_column.clone(),
        ));

        HdfsExport {
            hive_settings: export.hive_settings.clone(),
            directory: export.export_dir(&table.name),
            field_terminator: Some(export.field_terminator.clone()),
            select,
            from_table: Table::new(self.config.conventions.target_schema.clone(), table.name.clone()),
            where_clause: incremental
                .then(|| format!("{} = '{}'", export.partition_column, export.period_var)),
        }
    }

    fn replace_call(&self, app_table: &str, incremental: bool) -> ProcedureCall {
        let export = &self.config.export;
        let call = ProcedureCall::new(&export.replace_procedure)
            .arg(ProcArg::text(app_table));
        if incremental {
            call.arg(ProcArg::text("DI"))
                .arg(ProcArg::text(&export.period_column))
                .arg(ProcArg::text(&export.period_var))
                .arg(ProcArg::raw(1))
                .arg(ProcArg::null())
        } else {
            call.arg(ProcArg::text("DF"))
                .arg(ProcArg::text(&export.period_column))
                .arg(ProcArg::text("NULL"))
                .arg(ProcArg::text("NULL"))
                .arg(ProcArg::null())
        }
    }
}
