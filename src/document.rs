//! The Resource Document Mapper (spec §4.B): pure functions translating
//! between facts about one subject and the single document that represents
//! it in the index. Nothing here touches storage or the MVCC layer — this
//! module only knows how to build and query the in-memory `Document` shape.

use crate::core::types::{Document, DocId, CONTEXT_FIELD, ID_FIELD, TEXT_FIELD};
use crate::fact::Fact;
use crate::resource::{Context, Resource};

/// Builds the document for `subject` out of every indexable fact about it.
/// Facts whose object is not a literal are skipped (Non-goal: resource
/// objects are not indexed). Duplicate `(predicate, literal)` pairs and
/// duplicate contexts are collapsed — `Document::add_value` already dedupes
/// per field.
pub fn make_document(id: DocId, subject: &Resource, facts: &[Fact]) -> Document {
    let mut doc = Document::new(id, subject.encode());
    doc.add_value(ID_FIELD, subject.encode());
    for fact in facts {
        if fact.subject != *subject {
            continue;
        }
        add_property(&mut doc, fact);
        add_context_if_absent(&mut doc, &fact.context);
    }
    doc
}

/// Adds one fact's literal value to the document, both under its own
/// predicate field and under the aggregated `text` field used for
/// predicate-agnostic search. No-ops for non-literal facts. `text` gets one
/// occurrence per fact regardless of predicate (§3), so two different
/// predicates contributing the same literal string must both show up there
/// — unlike the predicate field itself, `text` is not deduped by value.
pub fn add_property(doc: &mut Document, fact: &Fact) {
    let Some(literal) = fact.literal() else {
        return;
    };
    doc.add_value(&fact.predicate, literal);
    doc.push_value(TEXT_FIELD, literal);
}

/// Records `context` on the document if it isn't already present.
pub fn add_context_if_absent(doc: &mut Document, context: &Context) {
    let tag = context.encode();
    if !doc.has_value(CONTEXT_FIELD, &tag) {
        doc.add_value(CONTEXT_FIELD, tag);
    }
}

/// Whether the document carries `literal` under `predicate`.
pub fn has(doc: &Document, predicate: &str, literal: &str) -> bool {
    doc.has_value(predicate, literal)
}

/// Number of distinct predicate fields on the document, excluding the
/// reserved `id`/`context`/`text` fields. Delegates to the type's own count
/// so callers only need this module for the RDF-facing API.
pub fn property_field_count(doc: &Document) -> usize {
    doc.property_field_count()
}

/// Decodes the resource a document represents, from its `resource` tag.
pub fn resource_of(doc: &Document) -> Resource {
    Resource::decode(&doc.resource)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fact::Value;

    fn literal_fact(p: &str, v: &str, ctx: Context) -> Fact {
        Fact::new(Resource::uri("urn:s1"), p, Value::Literal(v.to_string()), ctx)
    }

    #[test]
    fn builds_one_document_per_subject_with_aggregated_text() {
        let subject = Resource::uri("urn:s1");
        let facts = vec![
            literal_fact("urn:name", "Alice", Context::Null),
            literal_fact("urn:nick", "Al", Context::Null),
        ];
        let doc = make_document(DocId::new(1), &subject, &facts);

        assert!(has(&doc, "urn:name", "Alice"));
        assert!(has(&doc, "urn:nick", "Al"));
        assert_eq!(doc.get_field(TEXT_FIELD).unwrap().len(), 2);
        assert_eq!(property_field_count(&doc), 2);
        assert_eq!(resource_of(&doc), subject);
    }

    #[test]
    fn collects_distinct_contexts_without_duplicates() {
        let subject = Resource::uri("urn:s1");
        let graph = Context::Named(Resource::uri("urn:g1"));
        let facts = vec![
            literal_fact("urn:name", "Alice", graph.clone()),
            literal_fact("urn:nick", "Al", graph.clone()),
        ];
        let doc = make_document(DocId::new(1), &subject, &facts);

        assert_eq!(doc.get_field(CONTEXT_FIELD).unwrap(), &[graph.encode()]);
    }

    #[test]
    fn resource_valued_facts_are_skipped() {
        let subject = Resource::uri("urn:s1");
        let facts = vec![Fact::new(
            subject.clone(),
            "urn:knows",
            Value::Resource(Resource::uri("urn:s2")),
            Context::Null,
        )];
        let doc = make_document(DocId::new(1), &subject, &facts);

        assert_eq!(property_field_count(&doc), 0);
        assert!(doc.get_field(TEXT_FIELD).is_none());
    }

    #[test]
    fn text_field_gets_one_occurrence_per_fact_even_with_a_repeated_literal() {
        let subject = Resource::uri("urn:s1");
        let facts = vec![
            literal_fact("urn:p1", "x", Context::Null),
            literal_fact("urn:p2", "x", Context::Null),
        ];
        let doc = make_document(DocId::new(1), &subject, &facts);

        assert_eq!(doc.get_field(TEXT_FIELD).unwrap(), &["x".to_string(), "x".to_string()]);
    }
}
