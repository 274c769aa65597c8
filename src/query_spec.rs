//! Textual sub-pattern recognition (spec §4.E.1): walks the leaf statement
//! patterns of a structured query, groups the ones drawn from the reserved
//! extension namespace by their shared match variable, and validates each
//! group into a `QuerySpec` ready for evaluation against the Index Store.

use crate::core::config::Config;
use crate::core::error::{Error, Result};
use crate::triplestore::{StatementPattern, Term};

pub mod ns {
    pub const MATCHES: &str = "urn:textualindexsail:matches";
    pub const QUERY: &str = "urn:textualindexsail:query";
    pub const PROPERTY: &str = "urn:textualindexsail:property";
    pub const SCORE: &str = "urn:textualindexsail:score";
    pub const SNIPPET: &str = "urn:textualindexsail:snippet";
    pub const TYPE: &str = "rdf:type";
    pub const LUCENE_QUERY: &str = "urn:textualindexsail:LuceneQuery";
    pub const RANGE_QUERY_FROM: &str = "urn:textualindexsail:rangeQueryFrom";
    pub const RANGE_QUERY_TO: &str = "urn:textualindexsail:rangeQueryTo";
    pub const GEO_LAT: &str = "urn:textualindexsail:geoDegreesLat";
    pub const GEO_LONG: &str = "urn:textualindexsail:geoDegreesLong";
    pub const GEO_TOLERANCE: &str = "urn:textualindexsail:geoDegreesTolerance";

    pub fn is_reserved(predicate: &str) -> bool {
        matches!(
            predicate,
            MATCHES | QUERY | PROPERTY | SCORE | SNIPPET | TYPE | RANGE_QUERY_FROM | RANGE_QUERY_TO | GEO_LAT
                | GEO_LONG | GEO_TOLERANCE
        )
    }
}

/// The extracted configuration of one textual sub-pattern group.
///
/// `subject_resource` is the `matches` pattern's subject if bound to a
/// concrete resource by input bindings, `None` if it is a free variable —
/// only the bound/free distinction matters here (spec §4.E.1 validation);
/// downstream binding only ever produces `match_var`/`score_var`/
/// `snippet_var`, never a subject variable name.
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySpec {
    pub subject_resource: Option<crate::resource::Resource>,
    pub query_string: String,
    pub property_uri: Option<String>,
    pub match_var: String,
    pub score_var: Option<String>,
    pub snippet_var: Option<String>,
}

/// Extracts every textual sub-query group from a flat list of leaf
/// statement patterns. `incomplete_query_fails` (from `Config`) governs
/// whether a validation failure aborts extraction or is logged and skipped.
pub fn extract_specs(patterns: &[StatementPattern], config: &Config) -> Result<Vec<QuerySpec>> {
    let mut by_match_var: std::collections::BTreeMap<String, Vec<&StatementPattern>> = std::collections::BTreeMap::new();

    for pattern in patterns {
        let Some(predicate) = &pattern.predicate else { continue };
        if predicate == ns::MATCHES {
            if let Some(Term::Variable(var)) = &pattern.object {
                by_match_var.entry(var.clone()).or_default().push(pattern);
                continue;
            }
            if let Err(err) = fail_or_log("object of matches must be a free variable", config) {
                return Err(err);
            }
        }
    }

    // A pattern group also needs its non-`matches` members (query, score,
    // snippet, property, type) gathered by the same `matches` subject so
    // they can be folded into the same spec.
    let mut groups: std::collections::BTreeMap<String, Vec<&StatementPattern>> = by_match_var;
    let mut orphans: Vec<&StatementPattern> = Vec::new();
    for pattern in patterns {
        let Some(predicate) = &pattern.predicate else { continue };
        if predicate == ns::MATCHES {
            continue;
        }
        if !ns::is_reserved(predicate) {
            continue;
        }
        // These patterns share the `matches` pattern's subject; attach them
        // to every group whose `matches` subject matches this pattern's.
        let mut attached = false;
        for (_, members) in groups.iter_mut() {
            let shares_subject = members.iter().any(|m| m.subject == pattern.subject);
            if shares_subject {
                members.push(pattern);
                attached = true;
            }
        }
        if !attached {
            orphans.push(pattern);
        }
    }

    // A reserved-namespace pattern that never found a `matches` pattern to
    // join (e.g. a bare `NS.query` with no sibling `NS.matches`) is an
    // incomplete query on its own — validate it the same way a malformed
    // group would be, rather than silently dropping it.
    for orphan in &orphans {
        fail_or_log(
            &format!("reserved predicate {:?} used without a matching NS.matches pattern", orphan.predicate),
            config,
        )?;
    }

    let mut specs = Vec::new();
    for (match_var, members) in groups {
        match build_spec(&match_var, &members, config) {
            Ok(Some(spec)) => specs.push(spec),
            Ok(None) => {}
            Err(err) => return Err(err),
        }
    }
    Ok(specs)
}

fn build_spec(match_var: &str, members: &[&StatementPattern], config: &Config) -> Result<Option<QuerySpec>> {
    let matches_pattern = members.iter().find(|m| m.predicate.as_deref() == Some(ns::MATCHES));
    let Some(matches_pattern) = matches_pattern else {
        return Ok(None);
    };

    let subject_resource = matches_pattern.subject.clone();

    let mut query_literal: Option<String> = None;
    let mut range_from: Option<String> = None;
    let mut range_to: Option<String> = None;
    let mut geo_lat: Option<String> = None;
    let mut geo_long: Option<String> = None;
    let mut geo_tolerance: Option<String> = None;
    let mut property_uri: Option<String> = None;
    let mut score_var: Option<String> = None;
    let mut snippet_var: Option<String> = None;
    let mut saw_type = false;

    for member in members {
        let predicate = member.predicate.as_deref().unwrap_or_default();
        match predicate {
            ns::QUERY => query_literal = literal_of(member),
            ns::RANGE_QUERY_FROM => range_from = literal_of(member),
            ns::RANGE_QUERY_TO => range_to = literal_of(member),
            ns::GEO_LAT => geo_lat = literal_of(member),
            ns::GEO_LONG => geo_long = literal_of(member),
            ns::GEO_TOLERANCE => geo_tolerance = literal_of(member),
            ns::PROPERTY => {
                match &member.object {
                    Some(Term::Resource(r)) => property_uri = Some(r.encode()),
                    Some(_) => return fail_or_log_none("object of property must be a URI", config),
                    None => {}
                }
            }
            ns::SCORE => {
                match &member.object {
                    Some(Term::Variable(v)) => score_var = Some(v.clone()),
                    Some(_) => return fail_or_log_none("score object must be a free variable", config),
                    None => {}
                }
            }
            ns::SNIPPET => {
                match &member.object {
                    Some(Term::Variable(v)) => snippet_var = Some(v.clone()),
                    Some(_) => return fail_or_log_none("snippet object must be a free variable", config),
                    None => {}
                }
            }
            ns::TYPE => saw_type = true,
            _ => {}
        }
    }

    if !saw_type {
        log::debug!("textual query group for ?{match_var} has no rdf:type marker, assuming {}", ns::LUCENE_QUERY);
    }

    let query_string = resolve_query_string(query_literal, range_from, range_to, geo_lat, geo_long, geo_tolerance);
    let Some(query_string) = query_string else {
        return fail_or_log_none("query_string must be non-null after resolution", config);
    };

    Ok(Some(QuerySpec {
        subject_resource,
        query_string,
        property_uri,
        match_var: match_var.to_string(),
        score_var,
        snippet_var,
    }))
}

fn literal_of(pattern: &StatementPattern) -> Option<String> {
    match &pattern.object {
        Some(Term::Literal(s)) => Some(s.clone()),
        _ => None,
    }
}

/// Builds the query string per the priority order in spec §4.E.1: explicit
/// query literal, else a lexicographic range, else a geo bounding box.
fn resolve_query_string(
    query_literal: Option<String>,
    range_from: Option<String>,
    range_to: Option<String>,
    geo_lat: Option<String>,
    geo_long: Option<String>,
    geo_tolerance: Option<String>,
) -> Option<String> {
    if let Some(q) = query_literal {
        return Some(q);
    }
    if let (Some(from), Some(to)) = (range_from, range_to) {
        let (from, to) = if from <= to { (from, to) } else { (to, from) };
        return Some(format!("[{from} TO {to}]"));
    }
    if let (Some(lat), Some(long)) = (geo_lat, geo_long) {
        let tolerance: f64 = geo_tolerance.and_then(|t| t.parse().ok()).unwrap_or(0.0);
        let lat: f64 = lat.parse().ok()?;
        let long: f64 = long.parse().ok()?;
        return Some(format!(
            "geoDegreesLat:[{} TO {}] AND geoDegreesLong:[{} TO {}]",
            lat - tolerance,
            lat + tolerance,
            long - tolerance,
            long + tolerance
        ));
    }
    None
}

fn fail_or_log(message: &str, config: &Config) -> Result<()> {
    if config.incomplete_query_fails {
        Err(Error::InvalidQueryError(message.to_string()))
    } else {
        log::warn!("skipping incomplete textual query: {message}");
        Ok(())
    }
}

fn fail_or_log_none(message: &str, config: &Config) -> Result<Option<QuerySpec>> {
    fail_or_log(message, config).map(|_| None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::Resource;

    fn pattern(predicate: &str, object: Option<Term>) -> StatementPattern {
        StatementPattern { subject: None, predicate: Some(predicate.to_string()), object, context: None }
    }

    #[test]
    fn extracts_one_spec_from_a_matches_query_score_group() {
        let patterns = vec![
            pattern(ns::MATCHES, Some(Term::Variable("m".to_string()))),
            pattern(ns::QUERY, Some(Term::Literal("rust".to_string()))),
            pattern(ns::SCORE, Some(Term::Variable("sc".to_string()))),
        ];
        let config = Config::default();
        let specs = extract_specs(&patterns, &config).unwrap();
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].query_string, "rust");
        assert_eq!(specs[0].score_var.as_deref(), Some("sc"));
    }

    #[test]
    fn a_query_pattern_without_any_matches_pattern_fails_fast_when_configured() {
        let patterns = vec![pattern(ns::QUERY, Some(Term::Literal("rust".to_string())))];
        let config = Config { incomplete_query_fails: true, ..Config::default() };
        let result = extract_specs(&patterns, &config);
        assert!(matches!(result, Err(Error::InvalidQueryError(_))));
    }

    #[test]
    fn a_query_pattern_without_any_matches_pattern_is_skipped_when_not_configured_to_fail() {
        let patterns = vec![pattern(ns::QUERY, Some(Term::Literal("rust".to_string())))];
        let config = Config { incomplete_query_fails: false, ..Config::default() };
        let specs = extract_specs(&patterns, &config).unwrap();
        assert!(specs.is_empty());
    }

    #[test]
    fn range_bounds_are_swapped_into_lexicographic_order() {
        let patterns = vec![
            pattern(ns::MATCHES, Some(Term::Variable("m".to_string()))),
            pattern(ns::RANGE_QUERY_FROM, Some(Term::Literal("z".to_string()))),
            pattern(ns::RANGE_QUERY_TO, Some(Term::Literal("a".to_string()))),
        ];
        let config = Config::default();
        let specs = extract_specs(&patterns, &config).unwrap();
        assert_eq!(specs[0].query_string, "[a TO z]");
    }

    #[test]
    fn property_restricts_default_field() {
        let patterns = vec![
            pattern(ns::MATCHES, Some(Term::Variable("m".to_string()))),
            pattern(ns::QUERY, Some(Term::Literal("x".to_string()))),
            pattern(ns::PROPERTY, Some(Term::Resource(Resource::uri("urn:name")))),
        ];
        let config = Config::default();
        let specs = extract_specs(&patterns, &config).unwrap();
        assert_eq!(specs[0].property_uri.as_deref(), Some("urn:name"));
    }
}
