//! Step document parser.
//!
//! A step document describes one ETL job by hand: numbered step blocks
//! separated by dashed lines, each with a header naming the step and its load
//! type.
//!
//! ```text
//! 1. hive sql（初始化）：
//! insert overwrite table ...
//! ----------------------------
//! 2. hive sql（增量）：
//! insert overwrite table ... partition(dt='${mt1}')
//! ```

use nom::{
    IResult,
    branch::alt,
    bytes::complete::take_till1,
    character::complete::{char, digit1, space0},
    combinator::map_res,
    sequence::{delimited, terminated, tuple},
};
use serde::{Deserialize, Serialize};

use crate::error::{EtlError, EtlResult};

/// Separator between step blocks.
pub const STEP_SEPARATOR: &str = "----------------------------";

/// Whether a step belongs to the initial full load or to the periodic delta.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum LoadType {
    Initialization,
    Incremental,
    Other(String),
}

impl LoadType {
    pub const INITIALIZATION: &'static str = "初始化";
    pub const INCREMENTAL: &'static str = "增量";
}

impl From<String> for LoadType {
    fn from(s: String) -> Self {
        match s.as_str() {
            Self::INITIALIZATION => LoadType::Initialization,
            Self::INCREMENTAL => LoadType::Incremental,
            _ => LoadType::Other(s),
        }
    }
}

impl From<LoadType> for String {
    fn from(load: LoadType) -> Self {
        load.to_string()
    }
}

impl std::fmt::Display for LoadType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadType::Initialization => write!(f, "{}", Self::INITIALIZATION),
            LoadType::Incremental => write!(f, "{}", Self::INCREMENTAL),
            LoadType::Other(s) => write!(f, "{}", s),
        }
    }
}

/// One step of an ETL job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub id: u32,
    pub name: String,
    pub load: LoadType,
    pub content: String,
}

/// A complete ETL job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Process {
    pub name: String,
    pub steps: Vec<Step>,
}

impl Process {
    /// Render as a step document that [`parse_process`] reads back.
    pub fn to_document(&self) -> String {
        let separator = format!("\n{}\n", STEP_SEPARATOR);
        self.steps
            .iter()
            .map(|step| format!("{}. {}（{}）：\n{}", step.id, step.name, step.load, step.content))
            .collect::<Vec<_>>()
            .join(&separator)
    }
}

/// A group of ETL jobs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessCollection {
    pub name: String,
    pub processes: Vec<Process>,
}

/// Parse a step document. Blocks without a valid header are skipped.
pub fn parse_process(content: &str, name: impl Into<String>) -> Process {
    let steps = content
        .split(STEP_SEPARATOR)
        .map(str::trim)
        .filter(|block| !block.is_empty())
        .filter_map(parse_block)
        .collect();

    Process {
        name: name.into(),
        steps,
    }
}

/// Parse a step document, failing on the first non-empty block whose header
/// is not a valid step header.
pub fn parse_process_strict(content: &str, name: impl Into<String>) -> EtlResult<Process> {
    let mut steps = Vec::new();
    let mut line = 1;
    for block in content.split(STEP_SEPARATOR) {
        let header_line = line + leading_blank_lines(block);
        line += block.matches('\n').count();
        let block = block.trim();
        if block.is_empty() {
            continue;
        }
        let step = parse_block(block)
            .ok_or_else(|| EtlError::parse(header_line, "expected a step header like `1. name（增量）：`"))?;
        steps.push(step);
    }

    Ok(Process {
        name: name.into(),
        steps,
    })
}

fn leading_blank_lines(block: &str) -> usize {
    let trimmed = block.trim_start();
    block[..block.len() - trimmed.len()].matches('\n').count()
}

fn parse_block(block: &str) -> Option<Step> {
    let (header, body) = block.split_once('\n').unwrap_or((block, ""));
    match parse_header(header.trim()) {
        Ok((_, (id, name, load))) => Some(Step {
            id,
            name: name.trim().to_string(),
            load: LoadType::from(load.trim().to_string()),
            content: body.trim().to_string(),
        }),
        Err(_) => {
            tracing::debug!("skipping block with header {:?}", header);
            None
        }
    }
}

fn is_open_paren(c: char) -> bool {
    c == '(' || c == '（'
}

fn is_close_paren(c: char) -> bool {
    c == ')' || c == '）'
}

/// Parse a header `1. hive sql（初始化）：` into id, name and load type.
fn parse_header(input: &str) -> IResult<&str, (u32, &str, &str)> {
    let (input, (id, _, _, name)) = tuple((
        map_res(digit1, str::parse::<u32>),
        char('.'),
        space0,
        take_till1(is_open_paren),
    ))(input)?;
    let (input, load) = terminated(
        delimited(
            alt((char('('), char('（'))),
            take_till1(is_close_paren),
            alt((char(')'), char('）'))),
        ),
        alt((char('：'), char(':'))),
    )(input)?;
    Ok((input, (id, name, load)))
}
