use std::sync::Arc;
use crate::analysis::analyzer::Analyzer;
use crate::core::error::Result;
use crate::core::types::{Document, CONTEXT_FIELD, ID_FIELD, TEXT_FIELD};
use crate::query::ast::{BoolQuery, PhraseQuery, Query, RangeQuery, TermQuery};
use crate::search::results::ScoredDocument;
use crate::storage::segment_reader::SegmentReader;

/// Matches documents against a parsed [`Query`]. Term and phrase matching run
/// through the field's analyzer rather than a raw substring check, so
/// stemming and stop-word filtering apply the same way at query time as they
/// did when the field was indexed.
pub struct DocumentMatcher {
    analyzer: Arc<Analyzer>,
}

impl DocumentMatcher {
    pub fn new(analyzer: Arc<Analyzer>) -> Self {
        DocumentMatcher { analyzer }
    }

    pub fn matches(&self, doc: &Document, query: &Query) -> Result<bool> {
        match query {
            Query::MatchAll => Ok(true),
            Query::Term(term_query) => Ok(self.matches_term(doc, term_query)),
            Query::Phrase(phrase_query) => Ok(self.matches_phrase(doc, phrase_query)),
            Query::Bool(bool_query) => self.matches_bool(doc, bool_query),
            Query::Range(range_query) => Ok(self.matches_range(doc, range_query)),
        }
    }

    fn field_values<'a>(&self, doc: &'a Document, field: &str) -> &'a [String] {
        if field == "_all" {
            doc.get_field(TEXT_FIELD).unwrap_or(&[])
        } else {
            doc.get_field(field).unwrap_or(&[])
        }
    }

    fn tokens_of(&self, text: &str) -> Vec<String> {
        self.analyzer.analyze(text).into_iter().map(|t| t.text).collect()
    }

    fn matches_term(&self, doc: &Document, term_query: &TermQuery) -> bool {
        if is_untokenised(&term_query.field) {
            return self.field_values(doc, &term_query.field)
                .iter()
                .any(|value| value == &term_query.value);
        }

        let query_tokens = self.tokens_of(&term_query.value);
        if query_tokens.is_empty() {
            return false;
        }

        self.field_values(doc, &term_query.field).iter().any(|value| {
            let value_tokens = self.tokens_of(value);
            query_tokens.iter().all(|qt| value_tokens.contains(qt))
        })
    }

    /// A phrase must appear, in order, within a single field value — it
    /// cannot span two separate literals on the same document.
    fn matches_phrase(&self, doc: &Document, phrase_query: &PhraseQuery) -> bool {
        if phrase_query.phrase.is_empty() {
            return true;
        }
        let phrase_tokens: Vec<String> = phrase_query
            .phrase
            .iter()
            .flat_map(|term| self.tokens_of(term))
            .collect();
        if phrase_tokens.is_empty() {
            return false;
        }

        self.field_values(doc, &phrase_query.field).iter().any(|value| {
            let value_tokens = self.tokens_of(value);
            slice_contains_phrase(&value_tokens, &phrase_tokens, phrase_query.slop)
        })
    }

    fn matches_bool(&self, doc: &Document, bool_query: &BoolQuery) -> Result<bool> {
        for must_clause in &bool_query.must {
            if !self.matches(doc, must_clause)? {
                return Ok(false);
            }
        }

        for must_not_clause in &bool_query.must_not {
            if self.matches(doc, must_not_clause)? {
                return Ok(false);
            }
        }

        if !bool_query.should.is_empty() {
            let mut any_match = false;
            for should_clause in &bool_query.should {
                if self.matches(doc, should_clause)? {
                    any_match = true;
                    break;
                }
            }
            if !any_match {
                return Ok(false);
            }
        }

        for filter_clause in &bool_query.filter {
            if !self.matches(doc, filter_clause)? {
                return Ok(false);
            }
        }

        Ok(true)
    }

    /// Every datatype is indexed as text, so ranges compare lexicographically
    /// — this is the property behind `rangeQueryFrom`/`rangeQueryTo`.
    fn matches_range(&self, doc: &Document, range_query: &RangeQuery) -> bool {
        self.field_values(doc, &range_query.field)
            .iter()
            .any(|value| value_in_range(value, range_query))
    }
}

/// `id` and `context` are stored un-tokenised (spec document model, §3):
/// matching them must compare the raw resource tag, not analyzer output,
/// otherwise a URI like `urn:s1` could spuriously match unrelated terms
/// after stemming/tokenisation.
fn is_untokenised(field: &str) -> bool {
    field == ID_FIELD || field == CONTEXT_FIELD
}

fn value_in_range(value: &str, range: &RangeQuery) -> bool {
    if let Some(gt) = &range.gt {
        if value <= gt.as_str() {
            return false;
        }
    }
    if let Some(gte) = &range.gte {
        if value < gte.as_str() {
            return false;
        }
    }
    if let Some(lt) = &range.lt {
        if value >= lt.as_str() {
            return false;
        }
    }
    if let Some(lte) = &range.lte {
        if value > lte.as_str() {
            return false;
        }
    }
    true
}

/// True if `phrase` occurs in `tokens` in order, allowing up to `slop` other
/// tokens between each consecutive pair. `slop == 0` requires every term to
/// sit immediately after the previous one.
fn slice_contains_phrase(tokens: &[String], phrase: &[String], slop: u32) -> bool {
    let Some((first, rest)) = phrase.split_first() else {
        return true;
    };

    for (start, token) in tokens.iter().enumerate() {
        if token != first {
            continue;
        }

        let mut cursor = start;
        let mut matched = true;
        for term in rest {
            let window_end = (cursor + slop as usize + 2).min(tokens.len());
            match tokens[(cursor + 1)..window_end].iter().position(|t| t == term) {
                Some(offset) => cursor = cursor + 1 + offset,
                None => {
                    matched = false;
                    break;
                }
            }
        }

        if matched {
            return true;
        }
    }

    false
}

/// Extension trait giving `SegmentReader` a search operation over a [`Query`].
pub trait SegmentSearch {
    fn search(&mut self, query: &Query, matcher: &DocumentMatcher) -> Result<Vec<ScoredDocument>>;
}

impl SegmentSearch for SegmentReader {
    fn search(&mut self, query: &Query, matcher: &DocumentMatcher) -> Result<Vec<ScoredDocument>> {
        let mut results = Vec::new();
        let docs = self.read_all_documents()?;

        for doc in docs {
            if matcher.matches(&doc, query)? {
                results.push(ScoredDocument {
                    doc_id: doc.id,
                    score: 1.0,
                    document: Some(doc),
                });
            }
        }

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::DocId;

    fn doc_with(field: &str, value: &str) -> Document {
        let mut doc = Document::new(DocId::new(1), "urn:s");
        doc.add_value(field, value);
        doc
    }

    #[test]
    fn term_matches_stemmed_form() {
        let matcher = DocumentMatcher::new(Arc::new(Analyzer::standard_english()));
        let doc = doc_with(TEXT_FIELD, "the cats are running");
        let query = TermQuery { field: TEXT_FIELD.to_string(), value: "cat".to_string() };
        assert!(matcher.matches_term(&doc, &query));
    }

    #[test]
    fn phrase_requires_adjacency() {
        let matcher = DocumentMatcher::new(Arc::new(Analyzer::standard_english()));
        let doc = doc_with(TEXT_FIELD, "black cat sat");
        let hit = PhraseQuery { field: TEXT_FIELD.to_string(), phrase: vec!["black".into(), "cat".into()], slop: 0 };
        let miss = PhraseQuery { field: TEXT_FIELD.to_string(), phrase: vec!["cat".into(), "black".into()], slop: 0 };
        assert!(matcher.matches_phrase(&doc, &hit));
        assert!(!matcher.matches_phrase(&doc, &miss));
    }

    #[test]
    fn id_field_matches_exactly_not_by_token() {
        let matcher = DocumentMatcher::new(Arc::new(Analyzer::standard_english()));
        let doc = doc_with(crate::core::types::ID_FIELD, "urn:subject:running");
        let exact = TermQuery { field: crate::core::types::ID_FIELD.to_string(), value: "urn:subject:running".to_string() };
        let stemmed_prefix_only = TermQuery { field: crate::core::types::ID_FIELD.to_string(), value: "run".to_string() };
        assert!(matcher.matches_term(&doc, &exact));
        assert!(!matcher.matches_term(&doc, &stemmed_prefix_only));
    }

    #[test]
    fn range_compares_lexicographically() {
        let matcher = DocumentMatcher::new(Arc::new(Analyzer::standard_english()));
        let doc = doc_with("rangeQueryFrom", "2020-05-01");
        let range = RangeQuery {
            field: "rangeQueryFrom".to_string(),
            gte: Some("2020-01-01".to_string()),
            lte: Some("2020-12-31".to_string()),
            gt: None,
            lt: None,
        };
        assert!(matcher.matches_range(&doc, &range));
    }
}
