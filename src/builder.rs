//! Query configuration builder.
//!
//! Turns a [`TableRecord`] into a [`QueryConfig`] in five passes:
//!
//! 1. pick the FROM table (first fact table, else first named source table)
//! 2. join every dimension table, aliased `a`, `b`, ... in first-seen order
//! 3. collect the raw columns that appear as aggregate operands
//! 4. rewrite each field's logic into an aliased select expression and decide
//!    its GROUP BY membership
//! 5. add the incremental WHERE clause

use std::collections::{HashMap, HashSet};

use crate::ast::*;
use crate::classify::{
    aggregate_operand, is_aggregate_call, is_bare_identifier, is_constant, is_quoted_literal,
    split_function_call,
};
use crate::config::Conventions;

/// Conversion of a parsed table into a query configuration.
pub trait ToQueryConfig {
    /// Build the query configuration, or `None` if no FROM table exists.
    fn to_query_config(&self, conventions: &Conventions) -> Option<QueryConfig>;
}

impl ToQueryConfig for TableRecord {
    fn to_query_config(&self, conventions: &Conventions) -> Option<QueryConfig> {
        build(self, conventions)
    }
}

/// Table name -> alias for every table the query reads.
#[derive(Debug, Default)]
struct AliasMap {
    aliases: HashMap<String, String>,
}

impl AliasMap {
    fn insert(&mut self, table: &str, alias: &str) {
        self.aliases.insert(table.to_string(), alias.to_string());
    }

    fn contains(&self, table: &str) -> bool {
        self.aliases.contains_key(table)
    }

    /// Alias for a field's source table, defaulting to the FROM alias.
    fn resolve<'s>(&'s self, table: &str, default: &'s str) -> &'s str {
        self.aliases.get(table).map(String::as_str).unwrap_or(default)
    }
}

/// Build the query configuration for one table.
pub fn build(table: &TableRecord, conventions: &Conventions) -> Option<QueryConfig> {
    let mut aliases = AliasMap::default();
    let from_alias = conventions.from_alias.as_str();

    // Pass 1: FROM table
    let Some(from_table) = find_from_table(table, conventions) else {
        tracing::warn!("no source table for {}, skipping", table.name);
        return None;
    };
    tracing::debug!("{}: from {}", table.name, from_table.full_name());
    aliases.insert(&from_table.name, from_alias);

    // Pass 2: JOINs
    let joins = build_joins(table, conventions, &mut aliases);

    // Pass 3: raw columns consumed by aggregates
    let aggregated = aggregated_raw_columns(&table.fields);

    // Pass 4: select list and GROUP BY
    let has_aggregation = table.fields.iter().any(|f| is_aggregate_call(&f.logic));
    let mut select = Vec::with_capacity(table.fields.len());
    let mut group_by: Vec<GroupByColumn> = Vec::new();

    for field in &table.fields {
        let alias = aliases.resolve(&field.source_table, from_alias);
        let expression = aliased_expression(&field.logic, alias);

        let groupable = has_aggregation
            && !is_aggregate_call(&field.logic)
            && !is_constant(&expression)
            && !aggregated.contains(field.logic.trim());
        if groupable && !group_by.iter().any(|g| g.expression == expression) {
            group_by.push(GroupByColumn::active(expression.clone()));
        }

        select.push(ColumnMapping::new(expression, field.name.clone()));
    }

    // Pass 5: incremental filter
    let where_clause = (!table.increment_field.is_empty()).then(|| {
        format!(
            "{}.{} >= date_sub(current_date, {})",
            from_alias, table.increment_field, conventions.recency_days
        )
    });

    Some(QueryConfig {
        target_table: Table::new(conventions.target_schema.clone(), table.name.clone()),
        partition: None,
        select,
        from_table,
        joins,
        where_clause,
        group_by,
    })
}

/// First fact table, else the first non-empty source table.
fn find_from_table(table: &TableRecord, conventions: &Conventions) -> Option<Table> {
    let sources = || {
        table
            .fields
            .iter()
            .map(|f| f.source_table.as_str())
            .filter(|s| !s.is_empty())
    };

    if let Some(fact) = sources().find(|s| conventions.is_fact_table(s)) {
        return Some(
            Table::new(conventions.fact_schema.clone(), fact).aliased(conventions.from_alias.clone()),
        );
    }

    sources().next().map(|first| {
        Table::new(conventions.schema_for(first), first).aliased(conventions.from_alias.clone())
    })
}

/// One left join per distinct dimension table, in first-seen order.
fn build_joins(table: &TableRecord, conventions: &Conventions, aliases: &mut AliasMap) -> Vec<Join> {
    let mut joins = Vec::new();
    let mut letters = JoinAliases::new(&conventions.from_alias);

    for source in table.fields.iter().map(|f| f.source_table.as_str()) {
        if source.is_empty() || !conventions.is_dim_table(source) || aliases.contains(source) {
            continue;
        }
        let alias = letters.next_alias();
        tracing::debug!("{}: join {} as {}", table.name, source, alias);
        aliases.insert(source, &alias);
        joins.push(Join {
            kind: JoinKind::Left,
            target: Table::new(conventions.dim_schema.clone(), source).aliased(alias.clone()),
            condition: format!(
                "{}.{} = {}.{}",
                conventions.from_alias, conventions.fk_column, alias, conventions.pk_column
            ),
            active: true,
        });
    }

    joins
}

/// Hands out `a`, `b`, `c`, ... skipping the FROM alias. Past `z` it
/// continues with `j1`, `j2`, ...
struct JoinAliases {
    reserved: String,
    next: usize,
}

impl JoinAliases {
    fn new(reserved: &str) -> Self {
        Self {
            reserved: reserved.to_string(),
            next: 0,
        }
    }

    fn next_alias(&mut self) -> String {
        loop {
            let n = self.next;
            self.next += 1;
            let alias = if n < 26 {
                char::from(b'a' + n as u8).to_string()
            } else {
                format!("j{}", n - 25)
            };
            if alias != self.reserved {
                return alias;
            }
        }
    }
}

/// Raw columns used as aggregate operands, e.g. `SEG_PRICE_TPM` for
/// `sum(SEG_PRICE_TPM)`.
pub fn aggregated_raw_columns(fields: &[FieldRecord]) -> HashSet<String> {
    fields
        .iter()
        .filter_map(|f| aggregate_operand(&f.logic))
        .map(str::to_string)
        .collect()
}

/// Rewrite field logic into a select expression qualified with `alias`.
///
/// - empty logic becomes `''`
/// - `f(args)` gets its last argument token qualified: `f(alias.col)`
/// - a bare identifier becomes `alias.identifier`
/// - anything else is passed through
pub fn aliased_expression(logic: &str, alias: &str) -> String {
    let logic = logic.trim();
    if logic.is_empty() {
        return "''".to_string();
    }

    if let Some(call) = split_function_call(logic) {
        let args = call.args.trim();
        let qualified = match call.operand() {
            Some(column) if is_qualifiable(column) => {
                let head = &args[..args.len() - column.len()];
                format!("{head}{alias}.{column}")
            }
            _ => args.to_string(),
        };
        return format!("{}({})", call.name, qualified);
    }

    if is_bare_identifier(logic) {
        return format!("{alias}.{logic}");
    }

    logic.to_string()
}

/// Literals, wildcards, nested calls and already-qualified columns keep
/// their text.
fn is_qualifiable(token: &str) -> bool {
    !is_quoted_literal(token)
        && !token.starts_with('\'')
        && token != "*"
        && !token.chars().all(|c| c.is_ascii_digit())
        && !token.contains(['.', '('])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conventions() -> Conventions {
        Conventions::default()
    }

    fn build_default(table: &TableRecord) -> Option<QueryConfig> {
        table.to_query_config(&conventions())
    }

    #[test]
    fn test_aggregate_field() {
        let table = TableRecord::new("T_DWS_SALES").field(FieldRecord::new(
            "SALE_AMT",
            "sum(SEG_PRICE_TPM)",
            "T_DWD_FACT",
        ));
        let config = build_default(&table).unwrap();
        assert_eq!(config.select, vec![ColumnMapping::new("sum(s.SEG_PRICE_TPM)", "SALE_AMT")]);
        assert!(config.group_by.is_empty());
        assert!(aggregated_raw_columns(&table.fields).contains("SEG_PRICE_TPM"));
    }

    #[test]
    fn test_dimension_field_grouped() {
        let table = TableRecord::new("T_DWS_SALES")
            .field(FieldRecord::new("SALE_AMT", "sum(SEG_PRICE_TPM)", "T_DWD_FACT"))
            .field(FieldRecord::new("REGION", "REGION", "T_DIM_AREA"));
        let config = build_default(&table).unwrap();
        assert_eq!(config.select[1], ColumnMapping::new("a.REGION", "REGION"));
        assert_eq!(config.group_by, vec![GroupByColumn::active("a.REGION")]);
        assert_eq!(config.joins.len(), 1);
        assert_eq!(config.joins[0].target, Table::new("dim", "T_DIM_AREA").aliased("a"));
        assert_eq!(config.joins[0].condition, "s.fk_id = a.pk_id");
        assert!(config.joins[0].active);
    }

    #[test]
    fn test_from_prefers_fact_table() {
        let table = TableRecord::new("T")
            .field(FieldRecord::new("A", "A", "T_DIM_DATE"))
            .field(FieldRecord::new("B", "B", "t_dwd_orders"));
        let config = build_default(&table).unwrap();
        assert_eq!(config.from_table, Table::new("dwd", "t_dwd_orders").aliased("s"));
        assert_eq!(config.target_table.full_name(), "dws.T");
    }

    #[test]
    fn test_from_fallback_schema() {
        let dim_only = TableRecord::new("T").field(FieldRecord::new("A", "A", "T_DIM_DATE"));
        let config = build_default(&dim_only).unwrap();
        assert_eq!(config.from_table, Table::new("dim", "T_DIM_DATE").aliased("s"));
        // The FROM table is never joined to itself.
        assert!(config.joins.is_empty());
        assert_eq!(config.select[0].expression, "s.A");

        let other = TableRecord::new("T").field(FieldRecord::new("A", "A", "ODS_RAW"));
        let config = build_default(&other).unwrap();
        assert_eq!(config.from_table.schema, "default");
    }

    #[test]
    fn test_no_source_table() {
        let table = TableRecord::new("T")
            .field(FieldRecord::new("A", "A", ""))
            .field(FieldRecord::new("B", "''", ""));
        assert_eq!(build_default(&table), None);
        assert_eq!(build_default(&TableRecord::new("EMPTY")), None);
    }

    #[test]
    fn test_join_aliases_first_seen_order() {
        let table = TableRecord::new("T")
            .field(FieldRecord::new("F", "F", "T_DWD_FACT"))
            .field(FieldRecord::new("X", "X", "T_DIM_ZONE"))
            .field(FieldRecord::new("Y", "Y", "T_DIM_AGENT"))
            .field(FieldRecord::new("Z", "Z", "T_DIM_ZONE"));
        let config = build_default(&table).unwrap();
        let joined: Vec<_> = config
            .joins
            .iter()
            .map(|j| (j.target.name.as_str(), j.target.alias.as_str()))
            .collect();
        assert_eq!(joined, vec![("T_DIM_ZONE", "a"), ("T_DIM_AGENT", "b")]);
        assert_eq!(config.select[3].expression, "a.Z");
    }

    #[test]
    fn test_join_aliases_skip_from_alias() {
        let mut letters = JoinAliases::new("b");
        assert_eq!(letters.next_alias(), "a");
        assert_eq!(letters.next_alias(), "c");

        let mut letters = JoinAliases::new("s");
        let all: Vec<String> = (0..27).map(|_| letters.next_alias()).collect();
        assert!(!all.contains(&"s".to_string()));
        assert_eq!(all[24], "z");
        assert_eq!(all[25], "j1");
        assert_eq!(all[26], "j2");
    }

    #[test]
    fn test_empty_source_uses_from_alias() {
        let table = TableRecord::new("T")
            .field(FieldRecord::new("F", "F", "T_DWD_FACT"))
            .field(FieldRecord::new("G", "G", ""));
        let config = build_default(&table).unwrap();
        assert_eq!(config.select[1].expression, "s.G");
    }

    #[test]
    fn test_constants_never_grouped() {
        let table = TableRecord::new("T")
            .field(FieldRecord::new("AMT", "sum(X)", "T_DWD_FACT"))
            .field(FieldRecord::new("BUS_DEP", "''", "T_DWD_FACT"))
            .field(FieldRecord::new("EMPTY", "", "T_DWD_FACT"))
            .field(FieldRecord::new(
                "ETL_TIME",
                "date_format(current_timestamp, 'yyyyMMddHHmmss')",
                "",
            ))
            .field(FieldRecord::new("TODAY", "current_date", ""));
        let config = build_default(&table).unwrap();
        assert!(config.group_by.is_empty(), "{:?}", config.group_by);
        assert_eq!(config.select[2].expression, "''");
    }

    #[test]
    fn test_aggregate_operand_excluded_from_group_by() {
        let table = TableRecord::new("T")
            .field(FieldRecord::new("NUM", "count(distinct TKT_NUM)", "T_DWD_FACT"))
            .field(FieldRecord::new("TKT_NUM", "TKT_NUM", "T_DWD_FACT"))
            .field(FieldRecord::new("VOYAGE", "TKT_VOYAGE", "T_DWD_FACT"));
        let config = build_default(&table).unwrap();
        assert_eq!(config.select[0].expression, "count(distinct s.TKT_NUM)");
        assert_eq!(config.group_by, vec![GroupByColumn::active("s.TKT_VOYAGE")]);
    }

    #[test]
    fn test_no_aggregation_no_group_by() {
        let table = TableRecord::new("T")
            .field(FieldRecord::new("A", "A", "T_DWD_FACT"))
            .field(FieldRecord::new("B", "SUBSTR(B,0,4)", "T_DWD_FACT"));
        let config = build_default(&table).unwrap();
        assert!(config.group_by.is_empty());
        assert_eq!(config.select[1].expression, "SUBSTR(s.B,0,4)");
    }

    #[test]
    fn test_group_by_in_select_order_without_duplicates() {
        let table = TableRecord::new("T")
            .field(FieldRecord::new("D1", "SALE_DATE", "T_DWD_FACT"))
            .field(FieldRecord::new("AMT", "sum(X)", "T_DWD_FACT"))
            .field(FieldRecord::new("M", "SUBSTR(SALE_MONTH,0,4)", "T_DWD_FACT"))
            .field(FieldRecord::new("D2", "SALE_DATE", "T_DWD_FACT"))
            .field(FieldRecord::new(
                "TEAM",
                "CASE WHEN s.GRP='G' then 1 else 0 end",
                "T_DWD_FACT",
            ));
        let config = build_default(&table).unwrap();
        let exprs: Vec<_> = config.group_by.iter().map(|g| g.expression.as_str()).collect();
        assert_eq!(
            exprs,
            vec![
                "s.SALE_DATE",
                "SUBSTR(s.SALE_MONTH,0,4)",
                "CASE WHEN s.GRP='G' then 1 else 0 end"
            ]
        );
        assert!(config.group_by.iter().all(|g| g.active));
    }

    #[test]
    fn test_spaced_aggregate_triggers_group_by() {
        let table = TableRecord::new("T")
            .field(FieldRecord::new("AMT", "sum (X)", "T_DWD_FACT"))
            .field(FieldRecord::new("R", "REGION", "T_DWD_FACT"));
        let config = build_default(&table).unwrap();
        assert_eq!(config.select[0], ColumnMapping::new("sum(s.X)", "AMT"));
        assert_eq!(config.group_by, vec![GroupByColumn::active("s.REGION")]);
        assert!(aggregated_raw_columns(&table.fields).contains("X"));
    }

    #[test]
    fn test_where_clause() {
        let table = TableRecord::new("T")
            .field(FieldRecord::new("A", "A", "T_DWD_FACT"))
            .increment_field("SALE_DATE");
        let config = build_default(&table).unwrap();
        assert_eq!(
            config.where_clause.as_deref(),
            Some("s.SALE_DATE >= date_sub(current_date, 1)")
        );

        let mut c = conventions();
        c.recency_days = 7;
        let config = table.to_query_config(&c).unwrap();
        assert_eq!(
            config.where_clause.as_deref(),
            Some("s.SALE_DATE >= date_sub(current_date, 7)")
        );
    }

    #[test]
    fn test_no_where_without_increment_field() {
        let table = TableRecord::new("T").field(FieldRecord::new("A", "A", "T_DWD_FACT"));
        assert_eq!(build_default(&table).unwrap().where_clause, None);
    }

    #[test]
    fn test_idempotent() {
        let table = TableRecord::new("T")
            .field(FieldRecord::new("F", "sum(F)", "T_DWD_FACT"))
            .field(FieldRecord::new("A", "A", "T_DIM_A"))
            .field(FieldRecord::new("B", "B", "T_DIM_B"))
            .field(FieldRecord::new("C", "C", "T_DIM_C"));
        assert_eq!(build_default(&table), build_default(&table));
    }

    #[test]
    fn test_aliased_expression_shapes() {
        assert_eq!(aliased_expression("", "s"), "''");
        assert_eq!(aliased_expression("now()", "s"), "now()");
        assert_eq!(aliased_expression("count(distinct TKT_NUM)", "s"), "count(distinct s.TKT_NUM)");
        assert_eq!(aliased_expression("sum (X)", "a"), "sum(a.X)");
        assert_eq!(aliased_expression("REGION", "a"), "a.REGION");
        assert_eq!(aliased_expression("s.REGION", "a"), "s.REGION");
        assert_eq!(aliased_expression("'团队'", "a"), "'团队'");
        assert_eq!(
            aliased_expression("date_format(current_timestamp, 'yyyyMMddHHmmss')", "s"),
            "date_format(current_timestamp, 'yyyyMMddHHmmss')"
        );
        assert_eq!(aliased_expression("max(s.X)", "s"), "max(s.X)");
        assert_eq!(aliased_expression("count(*)", "s"), "count(*)");
        assert_eq!(aliased_expression("count(1)", "s"), "count(1)");
    }
}
