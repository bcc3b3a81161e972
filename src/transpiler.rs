//! SQL transpiler for query configurations.
//!
//! Renders a [`QueryConfig`] as a Hive `INSERT OVERWRITE` statement. Inactive
//! joins and GROUP BY entries are kept in the output as commented-out lines so
//! the generated script can be re-enabled by hand.

use crate::ast::*;

/// Trait for converting generated artifacts to SQL.
pub trait ToSql {
    /// Convert this node to a SQL string.
    fn to_sql(&self) -> String;
}

/// Trait for converting generated artifacts to a shell command.
pub trait ToShell {
    /// Convert this node to a shell command line.
    fn to_shell(&self) -> String;
}

/// Prefix that disables a line in Hive SQL.
pub const COMMENT: &str = "--";

impl ToSql for QueryConfig {
    fn to_sql(&self) -> String {
        let mut sql = String::from("insert overwrite table ");
        sql.push_str(&self.target_table.full_name());
        if let Some(partition) = &self.partition {
            sql.push_str(&format!(" partition({})", partition));
        }
        sql.push_str("\nselect\n");

        // Columns
        let cols: Vec<String> = self.select.iter().map(|c| c.to_sql()).collect();
        sql.push_str(&cols.join(",\n"));
        sql.push('\n');

        // FROM
        sql.push_str(&format!(
            "from {} {}\n",
            self.from_table.full_name(),
            self.from_table.alias
        ));

        // JOINs
        for join in &self.joins {
            sql.push_str(&join.to_sql());
            sql.push('\n');
        }

        // WHERE
        if let Some(where_clause) = &self.where_clause {
            sql.push_str("where ");
            sql.push_str(where_clause);
            sql.push('\n');
        }

        // GROUP BY
        if self.has_group_by() {
            sql.push_str("group by\n");
            let mut first_active = true;
            for col in &self.group_by {
                if !col.active {
                    sql.push_str(&format!("    {}, {}\n", COMMENT, col.expression));
                } else if first_active {
                    sql.push_str(&format!("    {}\n", col.expression));
                    first_active = false;
                } else {
                    sql.push_str(&format!("    , {}\n", col.expression));
                }
            }
        }

        sql
    }
}

impl ToSql for ColumnMapping {
    fn to_sql(&self) -> String {
        if self.alias.is_empty() {
            format!("    {}", self.expression)
        } else {
            format!("    {} as {}", self.expression, self.alias)
        }
    }
}

impl ToSql for Join {
    fn to_sql(&self) -> String {
        let line = format!(
            "{} {} {} on {}",
            self.kind,
            self.target.full_name(),
            self.target.alias,
            self.condition
        );
        if self.active {
            line
        } else {
            format!("{}{}", COMMENT, line)
        }
    }
}
