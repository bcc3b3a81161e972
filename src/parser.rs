//! Table sheet parser using nom.
//!
//! Parses the line-oriented table description exported from the warehouse
//! design sheets into [`TableRecord`]s.
//!
//! # Layout
//!
//! ```text
//! 【DWS表 1】                                   <- table start
//! 表英文名: T_DWS_SALES                          <- key: value metadata
//! 事实表详情Sheet页名: sales
//! 备注: daily sales
//! 增量字段: SALE_DATE
//! 字段详情:                                      <- field section
//! [字段 1]                                       <- field header
//!     字段名: SALE_AMT                           <- indented field lines
//!     字段逻辑: sum(SEG_PRICE_TPM)
//!     来源表: T_DWD_SALES_FACT
//! ```
//!
//! The parser is forgiving: unknown keys and unrecognised lines are skipped,
//! and it never returns an error.

use nom::{
    IResult,
    branch::alt,
    bytes::complete::{tag, take_while1},
    character::complete::{char, digit1, space0, space1},
    combinator::rest,
    sequence::{delimited, pair, preceded, separated_pair, tuple},
};

use crate::ast::{FieldRecord, TableRecord};

/// Line markers of the table sheet format.
pub mod markers {
    pub const TABLE_START: &str = "【DWS表";
    pub const FIELD_SECTION: &str = "字段详情";
    pub const FIELD_HEADER: &str = "字段";
    pub const FIELD_NAME: &str = "字段名";
    pub const FIELD_LOGIC: &str = "字段逻辑";
    pub const SOURCE_TABLE: &str = "来源表";

    pub const KEY_NAME: &str = "表英文名";
    pub const KEY_SOURCE_SHEET: &str = "事实表详情Sheet页名";
    pub const KEY_REMARK: &str = "备注";
    pub const KEY_INCREMENT_FIELD: &str = "增量字段";
}

/// One classified line inside the field section.
#[derive(Debug, PartialEq)]
enum FieldLine<'a> {
    Header,
    Name(&'a str),
    Logic(&'a str),
    Source(&'a str),
}

/// Parse every table in a table sheet.
pub fn parse(content: &str) -> Vec<TableRecord> {
    let mut tables = Vec::new();
    let mut current: Option<TableRecord> = None;
    let mut in_fields = false;

    for line in content.lines() {
        let trimmed = line.trim();

        if parse_table_start(trimmed).is_ok() {
            flush(&mut tables, current.take());
            current = Some(TableRecord::default());
            in_fields = false;
            continue;
        }

        // Anything before the first table marker is preamble.
        let Some(table) = current.as_mut() else {
            continue;
        };

        if parse_field_section(trimmed).is_ok() {
            in_fields = true;
            continue;
        }

        if in_fields {
            apply_field_line(table, line);
        } else if let Ok((_, (key, value))) = parse_key_value(trimmed) {
            apply_metadata(table, key.trim(), value.trim());
        }
    }

    flush(&mut tables, current);
    tracing::debug!("parsed {} table(s)", tables.len());
    tables
}

fn flush(tables: &mut Vec<TableRecord>, table: Option<TableRecord>) {
    match table {
        Some(table) if !table.name.is_empty() => {
            tracing::debug!(
                "table {} with {} field(s)",
                table.name,
                table.fields.len()
            );
            tables.push(table);
        }
        Some(_) => tracing::debug!("dropping table block without a name"),
        None => {}
    }
}

fn apply_metadata(table: &mut TableRecord, key: &str, value: &str) {
    let value = value.to_string();
    match key {
        markers::KEY_NAME => table.name = value,
        markers::KEY_SOURCE_SHEET => table.source_sheet = value,
        markers::KEY_REMARK => table.remark = value,
        markers::KEY_INCREMENT_FIELD => table.increment_field = value,
        _ => {}
    }
}

fn apply_field_line(table: &mut TableRecord, line: &str) {
    let Ok((_, parsed)) = parse_field_line(line) else {
        return;
    };

    if let FieldLine::Header = parsed {
        table.fields.push(FieldRecord::default());
        return;
    }

    // Field lines before the first header have nowhere to go.
    let Some(field) = table.fields.last_mut() else {
        return;
    };
    match parsed {
        FieldLine::Name(v) => field.name = v.trim().to_string(),
        FieldLine::Logic(v) => field.logic = v.trim().to_string(),
        FieldLine::Source(v) => field.source_table = v.trim().to_string(),
        FieldLine::Header => {}
    }
}

/// Parse an ASCII or full-width colon.
fn parse_colon(input: &str) -> IResult<&str, char> {
    alt((char(':'), char('：')))(input)
}

/// Parse the table start marker.
fn parse_table_start(input: &str) -> IResult<&str, &str> {
    tag(markers::TABLE_START)(input)
}

/// Parse the field section marker `字段详情:`.
fn parse_field_section(input: &str) -> IResult<&str, char> {
    preceded(tag(markers::FIELD_SECTION), parse_colon)(input)
}

/// Parse a metadata line `key: value`. Keys are words, CJK text and spaces.
fn parse_key_value(input: &str) -> IResult<&str, (&str, &str)> {
    separated_pair(
        take_while1(|c: char| c.is_alphanumeric() || c == '_' || c == ' ' || c == '\t'),
        parse_colon,
        rest,
    )(input)
}

/// Parse a field header `[字段 N]`, returning the digits of `N`.
fn parse_field_header(input: &str) -> IResult<&str, &str> {
    delimited(
        pair(char('['), tag(markers::FIELD_HEADER)),
        preceded(space0, digit1),
        char(']'),
    )(input)
}

/// Parse an indented `label: value` field line, returning the raw value.
fn parse_labeled<'a>(label: &'static str, input: &'a str) -> IResult<&'a str, &'a str> {
    preceded(tuple((space1, tag(label), space0, parse_colon)), rest)(input)
}

/// Classify a line of the field section. The header is matched on the trimmed
/// line; name, logic and source lines must be indented.
fn parse_field_line(line: &str) -> IResult<&str, FieldLine<'_>> {
    if let Ok((rest, _)) = parse_field_header(line.trim()) {
        return Ok((rest, FieldLine::Header));
    }
    if let Ok((rest, v)) = parse_labeled(markers::FIELD_NAME, line) {
        return Ok((rest, FieldLine::Name(v)));
    }
    if let Ok((rest, v)) = parse_labeled(markers::FIELD_LOGIC, line) {
        return Ok((rest, FieldLine::Logic(v)));
    }
    let (rest, v) = parse_labeled(markers::SOURCE_TABLE, line)?;
    Ok((rest, FieldLine::Source(v)))
}
