//! The fact (triple) model consumed from the surrounding triple store
//! (spec §3, §6.1). Only facts whose object is a textual literal participate
//! in the index — everything else is ignored at the boundary.

use crate::resource::{Context, Resource};

/// The object of a triple. Datatypes are not tracked (Non-goal:
/// datatype-aware indexing): a literal is just its lexical form.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Literal(String),
    Resource(Resource),
}

impl Value {
    pub fn as_literal(&self) -> Option<&str> {
        match self {
            Value::Literal(s) => Some(s.as_str()),
            Value::Resource(_) => None,
        }
    }
}

/// A single triple, optionally tagged with a context (named graph).
#[derive(Debug, Clone, PartialEq)]
pub struct Fact {
    pub subject: Resource,
    pub predicate: String,
    pub object: Value,
    pub context: Context,
}

impl Fact {
    pub fn new(subject: Resource, predicate: impl Into<String>, object: Value, context: Context) -> Self {
        Fact { subject, predicate: predicate.into(), object, context }
    }

    /// Whether this fact's object is a textual literal — the only kind that
    /// participates in the full-text index.
    pub fn is_indexable(&self) -> bool {
        matches!(self.object, Value::Literal(_))
    }

    pub fn literal(&self) -> Option<&str> {
        self.object.as_literal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_literal_objects_are_indexable() {
        let literal = Fact::new(
            Resource::uri("urn:s"),
            "urn:p",
            Value::Literal("hello".to_string()),
            Context::Null,
        );
        let resource_object = Fact::new(
            Resource::uri("urn:s"),
            "urn:p",
            Value::Resource(Resource::uri("urn:o")),
            Context::Null,
        );
        assert!(literal.is_indexable());
        assert!(!resource_object.is_indexable());
    }
}
