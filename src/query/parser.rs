use nom::{
    IResult,
    bytes::complete::{tag, take_until, take_till},
    character::complete::one_of,
    combinator::rest,
    sequence::{delimited, separated_pair, preceded},
};
use crate::core::error::{Error, Result};
use crate::query::ast::{BoolQuery, PhraseQuery, Query, RangeQuery, TermQuery};

/// Turns a query string into a [`Query`] tree. This is the free-text parser
/// behind `IndexStore::parse_query` — the only query "language" this crate
/// understands; parsing SPARQL or any other structured query language into
/// an `algebra::TupleExpr` is the host's job, not this parser's.
pub struct QueryParser {
    pub default_field: String,
    pub default_operator: BooleanOperator,
}

#[derive(Debug, Clone, Copy)]
pub enum BooleanOperator {
    And,
    Or,
}

impl QueryParser {
    pub fn new(default_field: impl Into<String>) -> Self {
        QueryParser {
            default_field: default_field.into(),
            default_operator: BooleanOperator::Or,
        }
    }

    /// Examples:
    /// - `rust programming` -> OR query
    /// - `rust AND programming` -> AND query
    /// - `title:rust` -> field-scoped term query
    /// - `"exact phrase"` -> phrase query
    /// - `price:[10 TO 100]` -> range query
    pub fn parse(&self, input: &str) -> Result<Query> {
        let input = input.trim();
        let tokens: Vec<&str> = input.split_whitespace().collect();

        if tokens.is_empty() {
            return Ok(Query::MatchAll);
        }

        if let Ok((_, phrase)) = parse_quoted(input) {
            let terms: Vec<String> = phrase.split_whitespace().map(String::from).collect();
            return Ok(Query::Phrase(PhraseQuery {
                field: self.default_field.clone(),
                phrase: terms,
                slop: 0,
            }));
        }

        if tokens.contains(&"AND") || tokens.contains(&"OR") || tokens.contains(&"NOT") {
            return Ok(self.parse_boolean_query(&tokens));
        }

        if let Some(pos) = input.find(':') {
            let field = &input[..pos];
            let value = &input[pos + 1..];

            if value.starts_with('[') || value.starts_with('{') {
                return self.parse_range_query(field, value);
            }

            return Ok(Query::Term(TermQuery {
                field: field.to_string(),
                value: value.to_string(),
            }));
        }

        Ok(Query::Term(TermQuery {
            field: self.default_field.clone(),
            value: input.to_string(),
        }))
    }

    fn parse_boolean_query(&self, tokens: &[&str]) -> Query {
        let mut bool_query = BoolQuery::new();
        let mut current_op = self.default_operator;

        for token in tokens {
            match *token {
                "AND" => current_op = BooleanOperator::And,
                "OR" => current_op = BooleanOperator::Or,
                "NOT" => current_op = BooleanOperator::And,
                _ => {
                    let term_query = Query::Term(TermQuery {
                        field: self.default_field.clone(),
                        value: token.to_string(),
                    });

                    match current_op {
                        BooleanOperator::And => bool_query.must.push(term_query),
                        BooleanOperator::Or => bool_query.should.push(term_query),
                    }
                }
            }
        }

        Query::Bool(bool_query)
    }

    fn parse_range_query(&self, field: &str, value: &str) -> Result<Query> {
        let inclusive_end = value.trim_end().ends_with(']');
        let (from, to) = parse_range_bounds(value)
            .map(|(_, bounds)| bounds)
            .map_err(|_| Error::InvalidQueryError(format!("malformed range query: {value}")))?;
        let inclusive_start = matches!(value.chars().next(), Some('['));

        // Lexicographic swap: the lower bound is always the textually smaller string.
        let (from, to) = if from <= to { (from, to) } else { (to, from) };

        let mut range = RangeQuery {
            field: field.to_string(),
            gt: None,
            gte: None,
            lt: None,
            lte: None,
        };

        if inclusive_start {
            range.gte = Some(from);
        } else {
            range.gt = Some(from);
        }

        if inclusive_end {
            range.lte = Some(to);
        } else {
            range.lt = Some(to);
        }

        Ok(Query::Range(range))
    }
}

fn parse_quoted(input: &str) -> IResult<&str, &str> {
    delimited(tag("\""), take_until("\""), tag("\""))(input)
}

/// Parses the `from TO to` body of a `[from TO to]` / `{from TO to}` range
/// expression, returning the trimmed `(from, to)` strings.
fn parse_range_bounds(input: &str) -> IResult<&str, (String, String)> {
    let (input, (from, to)) = preceded(
        one_of("[{"),
        separated_pair(take_until(" TO "), tag(" TO "), rest),
    )(input)?;
    let (_, to) = take_till(|c| c == ']' || c == '}')(to)?;
    Ok((input, (from.trim().to_string(), to.trim().to_string())))
}
