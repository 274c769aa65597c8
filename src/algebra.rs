//! A minimal structured query algebra (spec §4.E decision, see DESIGN.md):
//! just enough of the host query engine's tuple-expression tree for the
//! iterator to preserve projection/ordering/distinctness/slicing semantics
//! around the textual sub-query it rewrites. Evaluation of anything other
//! than `StatementPattern` is delegated back to the host triple store via
//! `TripleStore::evaluate`; this crate never implements a join algorithm.

use crate::resource::Resource;
use crate::triplestore::StatementPattern;

/// One ordering key: a variable name and its direction.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderElem {
    pub variable: String,
    pub ascending: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TupleExpr {
    /// A leaf triple pattern, matched against the host store directly.
    StatementPattern(StatementPattern),
    /// The textual sub-query this crate rewrote out of the original
    /// pattern, carried as an opaque placeholder so the rest of the tree
    /// can be walked without re-deriving it.
    TextPattern { match_var: String },
    Join(Box<TupleExpr>, Box<TupleExpr>),
    Filter { condition: String, child: Box<TupleExpr> },
    Projection { variables: Vec<String>, child: Box<TupleExpr> },
    MultiProjection { variables: Vec<Vec<String>>, child: Box<TupleExpr> },
    Distinct(Box<TupleExpr>),
    Reduced(Box<TupleExpr>),
    Order { elems: Vec<OrderElem>, child: Box<TupleExpr> },
    Slice { offset: Option<usize>, limit: Option<usize>, child: Box<TupleExpr> },
}

impl TupleExpr {
    /// Replaces the leaf the textual predicate originally occupied with a
    /// tautology stand-in, so the surrounding algebra (joins, projections,
    /// ordering) is preserved while evaluation of the textual part happens
    /// entirely inside this crate's iterator instead of the host engine.
    pub fn substitute_text_pattern(self, match_var: &str) -> TupleExpr {
        match self {
            TupleExpr::StatementPattern(ref pattern) if pattern_binds(pattern, match_var) => {
                TupleExpr::TextPattern { match_var: match_var.to_string() }
            }
            TupleExpr::Join(lhs, rhs) => TupleExpr::Join(
                Box::new(lhs.substitute_text_pattern(match_var)),
                Box::new(rhs.substitute_text_pattern(match_var)),
            ),
            TupleExpr::Filter { condition, child } => TupleExpr::Filter {
                condition,
                child: Box::new(child.substitute_text_pattern(match_var)),
            },
            TupleExpr::Projection { variables, child } => TupleExpr::Projection {
                variables,
                child: Box::new(child.substitute_text_pattern(match_var)),
            },
            TupleExpr::MultiProjection { variables, child } => TupleExpr::MultiProjection {
                variables,
                child: Box::new(child.substitute_text_pattern(match_var)),
            },
            TupleExpr::Distinct(child) => TupleExpr::Distinct(Box::new(child.substitute_text_pattern(match_var))),
            TupleExpr::Reduced(child) => TupleExpr::Reduced(Box::new(child.substitute_text_pattern(match_var))),
            TupleExpr::Order { elems, child } => TupleExpr::Order {
                elems,
                child: Box::new(child.substitute_text_pattern(match_var)),
            },
            TupleExpr::Slice { offset, limit, child } => TupleExpr::Slice {
                offset,
                limit,
                child: Box::new(child.substitute_text_pattern(match_var)),
            },
            other => other,
        }
    }
}

/// Whether `pattern` is one of the reserved-namespace leaves belonging to
/// `match_var`'s textual sub-query group — i.e. either the `matches`
/// pattern itself (object is the variable) or another reserved predicate
/// already known to share its subject. The subject-sharing check is why
/// substitution happens per match_var rather than once for the whole tree:
/// two distinct textual sub-queries over different variables must not
/// collapse into each other's tautology.
fn pattern_binds(pattern: &StatementPattern, match_var: &str) -> bool {
    let Some(predicate) = pattern.predicate.as_deref() else { return false };
    if !crate::query_spec::ns::is_reserved(predicate) {
        return false;
    }
    if predicate == crate::query_spec::ns::MATCHES {
        return matches!(&pattern.object, Some(crate::triplestore::Term::Variable(v)) if v == match_var);
    }
    true
}

pub fn resource_var(name: &str) -> Resource {
    Resource::uri(format!("urn:var:{name}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitution_leaves_joins_and_projections_intact() {
        let tree = TupleExpr::Projection {
            variables: vec!["s".to_string()],
            child: Box::new(TupleExpr::Join(
                Box::new(TupleExpr::StatementPattern(StatementPattern::default())),
                Box::new(TupleExpr::StatementPattern(StatementPattern {
                    subject: Some(Resource::uri("urn:fixed")),
                    ..Default::default()
                })),
            )),
        };
        let substituted = tree.substitute_text_pattern("match");
        match substituted {
            TupleExpr::Projection { child, .. } => match *child {
                TupleExpr::Join(lhs, rhs) => {
                    assert!(matches!(*lhs, TupleExpr::TextPattern { .. }));
                    assert!(matches!(*rhs, TupleExpr::StatementPattern(_)));
                }
                _ => panic!("expected join"),
            },
            _ => panic!("expected projection"),
        }
    }
}
