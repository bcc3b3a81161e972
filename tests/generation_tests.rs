use etlgen::prelude::*;
use etlgen::steps::{parse_process, parse_process_strict};
use pretty_assertions::assert_eq;

const TABLES: &str = include_str!("fixtures/tables.txt");
const STEPS: &str = include_str!("fixtures/steps.txt");

const FLYR: &str = "T_DWS_INTERNAT_CHN_STRUCT_ANALYSIS_FLYR";

fn flyr() -> TableRecord {
    etlgen::parse(TABLES)
        .into_iter()
        .find(|t| t.name == FLYR)
        .expect("fixture table missing")
}

#[test]
fn test_fixture_tables_parsed() {
    let tables = etlgen::parse(TABLES);
    assert_eq!(tables.len(), 2);

    let flyr = &tables[0];
    assert_eq!(flyr.source_sheet, "国际客票销售事实");
    assert_eq!(flyr.remark, "国际航线渠道结构分析（飞行日）");
    assert_eq!(flyr.increment_field, "SALE_DATE");
    assert_eq!(flyr.fields.len(), 10);
    assert_eq!(flyr.fields[0].source_table, "");
    assert_eq!(flyr.fields[9].logic, "count(distinct TKT_NUM)");

    let placeholder = &tables[1];
    assert_eq!(placeholder.name, "T_DWS_PLACEHOLDER");
    assert_eq!(placeholder.remark, "尚未确定来源");
    assert_eq!(placeholder.fields.len(), 1);
}

#[test]
fn test_golden_hive_sql() {
    let query = flyr().to_query_config(&Conventions::default()).unwrap();
    assert_eq!(
        query.to_sql(),
        "insert overwrite table dws.T_DWS_INTERNAT_CHN_STRUCT_ANALYSIS_FLYR
select
    date_format(current_timestamp, 'yyyyMMddHHmmss') as ETL_TIME,
    s.SALE_DATE as SELL_DATE,
    a.flt_week as SELL_WEEK,
    s.SALE_MONTH as SELL_YM,
    SUBSTR(s.SALE_MONTH,0,4) as SELL_Y,
    s.TKT_VOYAGE as VOYAGE,
    '' as BUS_DEP,
    s.CHN_AREA as CHN_AREA,
    sum(s.INCOME_VOYAGE) as SALE_AMT,
    count(distinct s.TKT_NUM) as SALE_NUM
from dwd.T_DWD_SA_INTERNAT_TICKING_FLYR_FACT s
left join dim.T_DIM_DATE a on s.fk_id = a.pk_id
where s.SALE_DATE >= date_sub(current_date, 1)
group by
    s.SALE_DATE
    , a.flt_week
    , s.SALE_MONTH
    , SUBSTR(s.SALE_MONTH,0,4)
    , s.TKT_VOYAGE
    , s.CHN_AREA
"
    );
}

#[test]
fn test_table_without_source_is_skipped() {
    let conventions = Conventions::default();
    let built: Vec<String> = etlgen::parse(TABLES)
        .iter()
        .filter_map(|t| t.to_query_config(&conventions))
        .map(|q| q.target_table.name)
        .collect();
    assert_eq!(built, vec![FLYR.to_string()]);
}

#[test]
fn test_custom_conventions() {
    let config = Config::from_toml(
        r#"
        [conventions]
        from_alias = "f"
        fact_schema = "ods"
        recency_days = 7
        "#,
    )
    .unwrap();
    let query = flyr().to_query_config(&config.conventions).unwrap();
    assert_eq!(query.from_table.full_name(), "ods.T_DWD_SA_INTERNAT_TICKING_FLYR_FACT");
    assert_eq!(query.from_table.alias, "f");
    assert_eq!(query.joins[0].condition, "f.fk_id = a.pk_id");
    assert_eq!(
        query.where_clause.as_deref(),
        Some("f.SALE_DATE >= date_sub(current_date, 7)")
    );
    assert_eq!(query.select[8].expression, "sum(f.INCOME_VOYAGE)");
}

#[test]
fn test_pipeline_for_fixture() {
    let config = Config::default();
    let steps = Pipeline::new(&config).plan_all(&flyr()).unwrap();
    assert_eq!(steps.len(), 12);

    let names: Vec<&str> = steps.iter().step_by(2).map(|s| s.name.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "hive sql",
            "hive intermediate temp file",
            "create dameng intermediate table",
            "data load into dameng temp table",
            "replace dameng target table",
            "delete hive intermediate temp file",
        ]
    );

    let export_incr = &steps[3];
    assert_eq!(export_incr.kind, CommandKind::HiveSql);
    assert_eq!(
        export_incr.script,
        "SET hive.exec.compress.output=true;
SET mapreduce.output.fileoutputformat.compress.codec=org.apache.hadoop.io.compress.SnappyCodec;
SET mapreduce.output.fileoutputformat.compress.type=BLOCK;
INSERT OVERWRITE DIRECTORY '/tmp/hive/hive/T_DWS_INTERNAT_CHN_STRUCT_ANALYSIS_FLYR'
ROW FORMAT DELIMITED
FIELDS TERMINATED BY ','
SELECT
  ETL_TIME,
  SELL_DATE,
  SELL_WEEK,
  SELL_YM,
  SELL_Y,
  VOYAGE,
  BUS_DEP,
  CHN_AREA,
  SALE_AMT,
  SALE_NUM,
  dt  AS DATA_MONTH
FROM dws.T_DWS_INTERNAT_CHN_STRUCT_ANALYSIS_FLYR
WHERE dt = '${mt1}'"
    );

    let sqoop_init = &steps[6];
    assert_eq!(sqoop_init.kind, CommandKind::Shell);
    assert_eq!(
        sqoop_init.script,
        "/usr/bch/3.3.0/sqoop/bin/sqoop export \\
--options-file /usr/bch/3.3.0/sqoop/conf/dm8_pro.props \\
--table MID_T_APP_INTERNAT_CHN_STRUCT_ANALYSIS_FLYR \\
--export-dir /tmp/hive/hive/T_DWS_INTERNAT_CHN_STRUCT_ANALYSIS_FLYR \\
--num-mappers 8 \\
--batch"
    );

    assert_eq!(
        steps[9].script,
        "p_replace_tgttable('T_APP_INTERNAT_CHN_STRUCT_ANALYSIS_FLYR','DI','DATA_MONTH','${mt1}',1,null);"
    );
}

#[test]
fn test_pipeline_document_parses_back() {
    let config = Config::default();
    let process = Pipeline::new(&config).process(&flyr()).unwrap();
    let parsed = parse_process_strict(&process.to_document(), FLYR).unwrap();
    assert_eq!(parsed, process);
}

#[test]
fn test_steps_fixture() {
    let process = parse_process(STEPS, FLYR);
    let ids: Vec<u32> = process.steps.iter().map(|s| s.id).collect();
    assert_eq!(ids, vec![1, 2, 5, 12]);
    assert_eq!(process.steps[1].load, LoadType::Incremental);
    assert_eq!(process.steps[2].name, "create dameng intermediate table");
    assert_eq!(
        process.steps[3].content,
        "hdfs dfs -rm -r -f /tmp/hive/hive/T_DWS_INTERNAT_CHN_STRUCT_ANALYSIS_FLYR"
    );
    assert_eq!(parse_process_strict(STEPS, FLYR).unwrap(), process);
}

#[test]
fn test_process_collection_json() {
    let collection = ProcessCollection {
        name: "batch".to_string(),
        processes: vec![parse_process(STEPS, FLYR)],
    };
    let json = serde_json::to_value(&collection).unwrap();
    assert_eq!(json["processes"][0]["steps"][0]["load"], "初始化");
    assert_eq!(json["processes"][0]["steps"][1]["id"], 2);

    let back: ProcessCollection = serde_json::from_value(json).unwrap();
    assert_eq!(back, collection);
}
