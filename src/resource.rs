//! Resource identifier encoding (spec §3): a URI is tagged by its own
//! lexical form; a blank node is tagged by its identifier prefixed with `!`,
//! a character chosen because no URI scheme can begin with it, so the two
//! namespaces never collide in a single string key.

use crate::core::types::CONTEXT_FIELD;

pub const BLANK_NODE_SENTINEL: char = '!';
pub const NULL_CONTEXT: &str = "null";

/// A resource is a URI or a blank node, represented as the string tag stored
/// in a document's `id`/`context` fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Resource {
    Uri(String),
    BlankNode(String),
}

impl Resource {
    pub fn uri(value: impl Into<String>) -> Self {
        Resource::Uri(value.into())
    }

    pub fn blank_node(id: impl Into<String>) -> Self {
        Resource::BlankNode(id.into())
    }

    /// Encodes this resource as the string tag used in document fields.
    pub fn encode(&self) -> String {
        match self {
            Resource::Uri(uri) => uri.clone(),
            Resource::BlankNode(id) => format!("{BLANK_NODE_SENTINEL}{id}"),
        }
    }

    /// Inverse of [`Resource::encode`] — decodes a document's `id` or
    /// `context` field value back into a `Resource`. This is the Mapper's
    /// `resource_of`.
    pub fn decode(tag: &str) -> Self {
        match tag.strip_prefix(BLANK_NODE_SENTINEL) {
            Some(id) => Resource::BlankNode(id.to_string()),
            None => Resource::Uri(tag.to_string()),
        }
    }
}

/// The context of a fact: either a named graph or the null/default graph.
/// Encoded on a document as either the resource tag or the literal string
/// `"null"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Context {
    Named(Resource),
    Null,
}

impl Context {
    pub fn encode(&self) -> String {
        match self {
            Context::Named(resource) => resource.encode(),
            Context::Null => NULL_CONTEXT.to_string(),
        }
    }

    pub fn decode(tag: &str) -> Self {
        if tag == NULL_CONTEXT {
            Context::Null
        } else {
            Context::Named(Resource::decode(tag))
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Context::Null)
    }
}

/// Reads every encoded context off a document's `context` field.
pub fn document_contexts(doc: &crate::core::types::Document) -> Vec<Context> {
    doc.get_field(CONTEXT_FIELD)
        .unwrap_or(&[])
        .iter()
        .map(|tag| Context::decode(tag))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uri_round_trips() {
        let r = Resource::uri("urn:s1");
        assert_eq!(Resource::decode(&r.encode()), r);
    }

    #[test]
    fn blank_node_round_trips() {
        let r = Resource::blank_node("b0");
        let encoded = r.encode();
        assert_eq!(encoded, "!b0");
        assert_eq!(Resource::decode(&encoded), r);
    }

    #[test]
    fn uri_and_blank_node_tags_are_distinguishable() {
        let uri = Resource::uri("urn:s1");
        let blank = Resource::blank_node("s1");
        assert_ne!(uri.encode(), blank.encode());
    }

    #[test]
    fn null_context_is_the_literal_string() {
        assert_eq!(Context::Null.encode(), "null");
        assert!(Context::decode("null").is_null());
    }
}
