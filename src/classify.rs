//! Text classification of field logic.
//!
//! Field logic is free text taken straight from a table sheet. Instead of
//! parsing it as SQL, the builder asks a handful of questions about its shape:
//!
//! | Predicate             | Matches                                   |
//! |-----------------------|-------------------------------------------|
//! | [`is_aggregate_call`] | `sum(`, `count(`, `avg(`, `min(`, `max(`  |
//! | [`split_function_call`] | `name(args)` spanning the whole text    |
//! | [`is_bare_identifier`] | `[A-Za-z0-9_]+`                          |
//! | [`is_quoted_literal`] | `'...'` or `"..."`                        |
//! | [`is_time_function`]  | mentions `current_timestamp`/`current_date` |
//! | [`is_constant`]       | quoted literal or time function           |

use nom::{
    IResult,
    bytes::complete::take_while1,
    character::complete::{char, multispace0},
    combinator::all_consuming,
    sequence::{pair, terminated},
};

/// Aggregate functions recognised by the builder.
pub const AGGREGATE_FUNCTIONS: [&str; 5] = ["sum", "count", "avg", "min", "max"];

const TIME_FUNCTIONS: [&str; 2] = ["current_timestamp", "current_date"];

/// A `name(args)` call. `args` is everything between the first `(` after the
/// name and the final `)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FunctionCall<'a> {
    pub name: &'a str,
    pub args: &'a str,
}

impl<'a> FunctionCall<'a> {
    /// The column operand of the call: the last whitespace-delimited token of
    /// the trimmed argument list.
    pub fn operand(&self) -> Option<&'a str> {
        last_token(self.args.trim())
    }
}

/// Parse an identifier (`[A-Za-z0-9_]+`).
fn parse_identifier(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_ascii_alphanumeric() || c == '_')(input)
}

/// Parse a function name and its opening parenthesis.
fn parse_function_head(input: &str) -> IResult<&str, &str> {
    terminated(parse_identifier, pair(multispace0, char('(')))(input)
}

/// Split `name(args)` into its parts. The text must end with `)`.
pub fn split_function_call(logic: &str) -> Option<FunctionCall<'_>> {
    let (rest, name) = parse_function_head(logic.trim()).ok()?;
    let args = rest.strip_suffix(')')?;
    Some(FunctionCall { name, args })
}

/// True for `sum(...)`, `count(...)`, `avg(...)`, `min(...)` and `max(...)`,
/// case-insensitively. Whitespace between the name and the parenthesis is
/// allowed, as in [`split_function_call`].
pub fn is_aggregate_call(logic: &str) -> bool {
    match parse_function_head(logic.trim()) {
        Ok((_, name)) => AGGREGATE_FUNCTIONS
            .iter()
            .any(|agg| name.eq_ignore_ascii_case(agg)),
        Err(_) => false,
    }
}

/// True for a plain column reference such as `SALE_DATE`.
pub fn is_bare_identifier(logic: &str) -> bool {
    all_consuming(parse_identifier)(logic.trim()).is_ok()
}

/// True for `'...'` and `"..."`, including the empty literal `''`.
pub fn is_quoted_literal(expression: &str) -> bool {
    let e = expression.trim();
    e.len() >= 2
        && ((e.starts_with('\'') && e.ends_with('\'')) || (e.starts_with('"') && e.ends_with('"')))
}

/// True if the expression references the current time.
pub fn is_time_function(expression: &str) -> bool {
    let lower = expression.to_ascii_lowercase();
    TIME_FUNCTIONS.iter().any(|f| lower.contains(f))
}

/// Constants never belong in a GROUP BY.
pub fn is_constant(expression: &str) -> bool {
    is_quoted_literal(expression) || is_time_function(expression)
}

/// The trailing run of non-whitespace characters, if the text ends with one.
pub fn last_token(text: &str) -> Option<&str> {
    let start = text
        .char_indices()
        .rev()
        .take_while(|(_, c)| !c.is_whitespace())
        .last()
        .map(|(i, _)| i)?;
    Some(&text[start..])
}

/// The raw column an aggregate is applied to, e.g. `TKT_NUM` for
/// `count(distinct TKT_NUM)`. Uses the outermost parentheses.
pub fn aggregate_operand(logic: &str) -> Option<&str> {
    if !is_aggregate_call(logic) {
        return None;
    }
    let open = logic.find('(')?;
    let close = logic.rfind(')')?;
    if close <= open {
        return None;
    }
    last_token(logic[open + 1..close].trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aggregate_calls() {
        assert!(is_aggregate_call("sum(SEG_PRICE_TPM)"));
        assert!(is_aggregate_call("COUNT(distinct TKT_NUM)"));
        assert!(is_aggregate_call("Max(x)"));
        assert!(is_aggregate_call("sum (x)"));
        assert!(is_aggregate_call("count\t(distinct x)"));
        assert!(!is_aggregate_call("summary(x)"));
        assert!(!is_aggregate_call("SALE_DATE"));
        assert!(!is_aggregate_call("SUBSTR(SALE_MONTH,0,4)"));
    }

    #[test]
    fn test_split_function_call() {
        let call = split_function_call("count(distinct TKT_NUM)").unwrap();
        assert_eq!(call.name, "count");
        assert_eq!(call.args, "distinct TKT_NUM");
        assert_eq!(call.operand(), Some("TKT_NUM"));

        let call = split_function_call("SUBSTR (SALE_MONTH,0,4)").unwrap();
        assert_eq!(call.name, "SUBSTR");
        assert_eq!(call.operand(), Some("SALE_MONTH,0,4"));
    }

    #[test]
    fn test_split_function_call_empty_args() {
        let call = split_function_call("now()").unwrap();
        assert_eq!(call.args, "");
        assert_eq!(call.operand(), None);
    }

    #[test]
    fn test_split_function_call_rejects_trailing_text() {
        assert_eq!(split_function_call("sum(a) + 1"), None);
        assert_eq!(split_function_call("CASE WHEN a THEN b END"), None);
        assert_eq!(split_function_call("(a)"), None);
    }

    #[test]
    fn test_bare_identifier() {
        assert!(is_bare_identifier("REGION"));
        assert!(is_bare_identifier("chn_detail1"));
        assert!(!is_bare_identifier("s.REGION"));
        assert!(!is_bare_identifier("a b"));
        assert!(!is_bare_identifier(""));
    }

    #[test]
    fn test_quoted_literal() {
        assert!(is_quoted_literal("''"));
        assert!(is_quoted_literal("'团队'"));
        assert!(is_quoted_literal("\"x\""));
        assert!(!is_quoted_literal("'"));
        assert!(!is_quoted_literal("s.A"));
    }

    #[test]
    fn test_time_function() {
        assert!(is_time_function("date_format(current_timestamp, 'yyyyMMddHHmmss')"));
        assert!(is_time_function("CURRENT_DATE"));
        assert!(!is_time_function("s.SALE_DATE"));
    }

    #[test]
    fn test_constant() {
        assert!(is_constant("''"));
        assert!(is_constant("current_date"));
        assert!(!is_constant("a.REGION"));
    }

    #[test]
    fn test_last_token() {
        assert_eq!(last_token("distinct TKT_NUM"), Some("TKT_NUM"));
        assert_eq!(last_token("TKT_NUM"), Some("TKT_NUM"));
        assert_eq!(last_token("a b "), None);
        assert_eq!(last_token(""), None);
    }

    #[test]
    fn test_aggregate_operand() {
        assert_eq!(aggregate_operand("sum(SEG_PRICE_TPM)"), Some("SEG_PRICE_TPM"));
        assert_eq!(aggregate_operand("count( distinct TKT_NUM )"), Some("TKT_NUM"));
        assert_eq!(aggregate_operand("sum (INCOME_VOYAGE)"), Some("INCOME_VOYAGE"));
        assert_eq!(aggregate_operand("max()"), None);
        assert_eq!(aggregate_operand("REGION"), None);
    }
}
