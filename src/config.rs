//! Configuration loaded from `etlgen.toml`.
//!
//! Every key is optional; missing keys fall back to the conventions of the
//! warehouse the tool was written for.
//!
//! ```toml
//! [conventions]
//! fact_prefix = "t_dwd"
//! from_alias = "s"
//!
//! [export]
//! tmp_dir = "/tmp/hive/hive"
//! num_mappers = 8
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{EtlError, EtlResult};

/// File name looked up in the working directory and the user config dir.
pub const CONFIG_FILE: &str = "etlgen.toml";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub conventions: Conventions,
    pub export: ExportSettings,
}

/// Table naming conventions used by the query builder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Conventions {
    /// Lower-case name prefix of fact tables.
    pub fact_prefix: String,
    /// Lower-case name prefix of dimension tables.
    pub dim_prefix: String,
    pub fact_schema: String,
    pub dim_schema: String,
    /// Schema for source tables matching neither prefix.
    pub default_schema: String,
    pub target_schema: String,
    pub from_alias: String,
    pub fk_column: String,
    pub pk_column: String,
    /// Days of history kept by the incremental WHERE clause.
    pub recency_days: u32,
}

impl Default for Conventions {
    fn default() -> Self {
        Self {
            fact_prefix: "t_dwd".to_string(),
            dim_prefix: "t_dim".to_string(),
            fact_schema: "dwd".to_string(),
            dim_schema: "dim".to_string(),
            default_schema: "default".to_string(),
            target_schema: "dws".to_string(),
            from_alias: "s".to_string(),
            fk_column: "fk_id".to_string(),
            pk_column: "pk_id".to_string(),
            recency_days: 1,
        }
    }
}

impl Conventions {
    pub fn is_fact_table(&self, table: &str) -> bool {
        table.to_lowercase().starts_with(&self.fact_prefix.to_lowercase())
    }

    pub fn is_dim_table(&self, table: &str) -> bool {
        table.to_lowercase().starts_with(&self.dim_prefix.to_lowercase())
    }

    /// Schema a source table lives in, judged by its name prefix.
    pub fn schema_for(&self, table: &str) -> &str {
        if self.is_fact_table(table) {
            &self.fact_schema
        } else if self.is_dim_table(table) {
            &self.dim_schema
        } else {
            &self.default_schema
        }
    }
}

/// Settings for the export and load steps of the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExportSettings {
    /// `SET key=value;` lines emitted before the HDFS export, in order.
    pub hive_settings: Vec<(String, String)>,
    /// Parent directory of the per-table HDFS temp directories.
    pub tmp_dir: String,
    pub field_terminator: String,
    pub sqoop_path: String,
    pub sqoop_options_file: String,
    pub num_mappers: u32,
    /// Scheduler placeholder for the load period.
    pub period_var: String,
    /// Column of the app table holding the load period.
    pub period_column: String,
    /// Hive partition column written by incremental loads.
    pub partition_column: String,
    pub dws_prefix: String,
    pub app_prefix: String,
    pub mid_prefix: String,
    pub create_mid_procedure: String,
    pub replace_procedure: String,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            hive_settings: vec![
                ("hive.exec.compress.output".to_string(), "true".to_string()),
                (
                    "mapreduce.output.fileoutputformat.compress.codec".to_string(),
                    "org.apache.hadoop.io.compress.SnappyCodec".to_string(),
                ),
                (
                    "mapreduce.output.fileoutputformat.compress.type".to_string(),
                    "BLOCK".to_string(),
                ),
            ],
            tmp_dir: "/tmp/hive/hive".to_string(),
            field_terminator: ",".to_string(),
            sqoop_path: "/usr/bch/3.3.0/sqoop/bin/sqoop".to_string(),
            sqoop_options_file: "/usr/bch/3.3.0/sqoop/conf/dm8_pro.props".to_string(),
            num_mappers: 8,
            period_var: "${mt1}".to_string(),
            period_column: "DATA_MONTH".to_string(),
            partition_column: "dt".to_string(),
            dws_prefix: "T_DWS_".to_string(),
            app_prefix: "T_APP_".to_string(),
            mid_prefix: "MID_".to_string(),
            create_mid_procedure: "p_create_mid_app".to_string(),
            replace_procedure: "p_replace_tgttable".to_string(),
        }
    }
}

impl ExportSettings {
    /// Downstream app table for a DWS table, e.g.
    /// `T_DWS_SALES` -> `T_APP_SALES`.
    pub fn app_table(&self, dws_table: &str) -> String {
        let prefix_len = self.dws_prefix.len();
        let has_prefix = dws_table
            .get(..prefix_len)
            .is_some_and(|p| p.eq_ignore_ascii_case(&self.dws_prefix));
        if has_prefix && !self.dws_prefix.is_empty() {
            format!("{}{}", self.app_prefix, &dws_table[prefix_len..])
        } else {
            format!("{}{}", self.app_prefix, dws_table)
        }
    }

    /// HDFS directory the table is exported to.
    pub fn export_dir(&self, dws_table: &str) -> String {
        format!("{}/{}", self.tmp_dir.trim_end_matches('/'), dws_table)
    }
}

impl Config {
    /// Parse a configuration from TOML text.
    pub fn from_toml(content: &str) -> EtlResult<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load configuration from an explicit path, or from the first
    /// `etlgen.toml` found in the working directory or the user config dir.
    /// Falls back to defaults when no file exists.
    pub fn load(path: Option<&Path>) -> EtlResult<Self> {
        if let Some(path) = path {
            if !path.exists() {
                return Err(EtlError::Config(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
            return Self::read(path);
        }

        match Self::discover() {
            Some(found) => Self::read(&found),
            None => {
                tracing::debug!("no {} found, using defaults", CONFIG_FILE);
                Ok(Self::default())
            }
        }
    }

    fn read(path: &Path) -> EtlResult<Self> {
        tracing::debug!("loading config from {}", path.display());
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    fn discover() -> Option<PathBuf> {
        let local = PathBuf::from(CONFIG_FILE);
        if local.exists() {
            return Some(local);
        }
        dirs::config_dir()
            .map(|dir| dir.join("etlgen").join(CONFIG_FILE))
            .filter(|p| p.exists())
    }
}
