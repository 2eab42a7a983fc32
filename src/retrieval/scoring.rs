//! Scoring models.
//!
//! [`ScoringModel::Bm25`] applies BM25 with caller-supplied `k1` and `b` to
//! the library's postings, document frequencies and field norms.
//! [`ScoringModel::LibraryBm25`] hands the query to the library's own BM25,
//! whose parameters are fixed.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

use serde::{Deserialize, Serialize};
use tantivy::postings::Postings;
use tantivy::query::{BooleanQuery, EnableScoring, Occur, Query, TermQuery, Weight};
use tantivy::schema::{Field, IndexRecordOption};
use tantivy::{DocAddress, DocSet, Searcher, TERMINATED, Term};

use crate::error::{PipelineError, Result};

/// Default BM25 term-frequency saturation.
pub const DEFAULT_K1: f32 = 0.9;
/// Default BM25 length normalization.
pub const DEFAULT_B: f32 = 0.4;

/// Ranking function used by the retrieval stage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScoringModel {
    /// BM25 with tunable parameters.
    Bm25 { k1: f32, b: f32 },
    /// The search library's built-in BM25.
    LibraryBm25,
}

impl Default for ScoringModel {
    fn default() -> Self {
        ScoringModel::Bm25 {
            k1: DEFAULT_K1,
            b: DEFAULT_B,
        }
    }
}

impl ScoringModel {
    pub fn bm25(k1: f32, b: f32) -> Self {
        ScoringModel::Bm25 { k1, b }
    }

    /// Check the model parameters.
    pub fn validate(&self) -> Result<()> {
        if let ScoringModel::Bm25 { k1, b } = *self {
            if !k1.is_finite() || k1 < 0.0 {
                return Err(PipelineError::invalid_config(format!(
                    "BM25 k1 must be a non-negative number, got {k1}"
                )));
            }
            if !(0.0..=1.0).contains(&b) {
                return Err(PipelineError::invalid_config(format!(
                    "BM25 b must be within [0, 1], got {b}"
                )));
            }
        }
        Ok(())
    }

    /// Rank the documents of `field` against the analyzed query `terms`,
    /// best first.
    ///
    /// Keeps the `hits` best documents plus every document tied with the
    /// lowest kept score, so the caller can break those ties by external id
    /// before cutting off.
    pub fn rank(
        &self,
        searcher: &Searcher,
        field: Field,
        terms: &[String],
        hits: usize,
    ) -> Result<Vec<ScoredDoc>> {
        if terms.is_empty() || hits == 0 {
            return Ok(Vec::new());
        }
        match *self {
            ScoringModel::Bm25 { k1, b } => Bm25::new(k1, b).rank(searcher, field, terms, hits),
            ScoringModel::LibraryBm25 => library_rank(searcher, field, terms, hits),
        }
    }
}

/// A document and its score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredDoc {
    pub address: DocAddress,
    pub score: f32,
}

impl Eq for ScoredDoc {}

// Greater means worse, so a `BinaryHeap` exposes the weakest candidate.
impl Ord for ScoredDoc {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .score
            .total_cmp(&self.score)
            .then_with(|| self.address.cmp(&other.address))
    }
}

impl PartialOrd for ScoredDoc {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Collection-wide statistics of one field.
#[derive(Debug, Clone, Copy)]
pub struct FieldStats {
    /// Live documents.
    pub num_docs: u64,
    /// Average field length in tokens.
    pub avg_length: f32,
}

impl FieldStats {
    pub fn collect(searcher: &Searcher, field: Field) -> Result<Self> {
        let num_docs = searcher.num_docs();
        let mut tokens = 0u64;
        for segment in searcher.segment_readers() {
            tokens += segment.inverted_index(field)?.total_num_tokens();
        }
        let avg_length = if num_docs == 0 {
            0.0
        } else {
            tokens as f32 / num_docs as f32
        };
        Ok(FieldStats {
            num_docs,
            avg_length,
        })
    }
}

/// BM25 over library postings.
#[derive(Debug, Clone, Copy)]
pub struct Bm25 {
    k1: f32,
    b: f32,
}

impl Bm25 {
    pub fn new(k1: f32, b: f32) -> Self {
        Bm25 { k1, b }
    }

    /// `ln(1 + (N - df + 0.5) / (df + 0.5))`
    pub fn idf(num_docs: u64, doc_freq: u64) -> f32 {
        let n = num_docs as f32;
        let df = doc_freq as f32;
        (1.0 + (n - df + 0.5) / (df + 0.5)).ln()
    }

    /// Contribution of one term occurrence.
    pub fn weight(&self, idf: f32, tf: f32, length: f32, avg_length: f32) -> f32 {
        let relative = if avg_length > 0.0 {
            length / avg_length
        } else {
            1.0
        };
        idf * tf / (tf + self.k1 * (1.0 - self.b + self.b * relative))
    }

    pub fn rank(
        &self,
        searcher: &Searcher,
        field: Field,
        terms: &[String],
        hits: usize,
    ) -> Result<Vec<ScoredDoc>> {
        let stats = FieldStats::collect(searcher, field)?;
        if stats.num_docs == 0 {
            return Ok(Vec::new());
        }

        let mut query_terms: HashMap<&str, f32> = HashMap::new();
        for term in terms {
            *query_terms.entry(term.as_str()).or_default() += 1.0;
        }

        let mut scores: HashMap<DocAddress, f32> = HashMap::new();
        for (text, query_tf) in query_terms {
            let term = Term::from_field_text(field, text);
            let doc_freq = searcher.doc_freq(&term)?;
            if doc_freq == 0 {
                continue;
            }
            let idf = Self::idf(stats.num_docs, doc_freq);

            for (ord, segment) in searcher.segment_readers().iter().enumerate() {
                let inverted = segment.inverted_index(field)?;
                let Some(mut postings) =
                    inverted.read_postings(&term, IndexRecordOption::WithFreqs)?
                else {
                    continue;
                };
                let norms = segment.get_fieldnorms_reader(field)?;
                let alive = segment.alive_bitset();

                let mut doc = postings.doc();
                while doc != TERMINATED {
                    if !alive.is_some_and(|bits| bits.is_deleted(doc)) {
                        let tf = postings.term_freq() as f32;
                        let length = norms.fieldnorm(doc) as f32;
                        let weight = self.weight(idf, tf, length, stats.avg_length);
                        *scores
                            .entry(DocAddress::new(ord as u32, doc))
                            .or_default() += query_tf * weight;
                    }
                    doc = postings.advance();
                }
            }
        }

        Ok(top_k(&scores, hits))
    }
}

/// The `k` best documents, widened to the whole group tied at the cutoff score.
fn top_k(scores: &HashMap<DocAddress, f32>, k: usize) -> Vec<ScoredDoc> {
    let mut heap = BinaryHeap::with_capacity(k.min(scores.len()) + 1);
    for (&address, &score) in scores {
        heap.push(ScoredDoc { address, score });
        if heap.len() > k {
            heap.pop();
        }
    }
    let mut top = heap.into_sorted_vec();

    if top.len() == k
        && let Some(cutoff) = top.last().map(|doc| doc.score)
    {
        top.retain(|doc| doc.score.total_cmp(&cutoff) == Ordering::Greater);
        top.extend(
            scores
                .iter()
                .filter(|(_, score)| score.total_cmp(&cutoff) == Ordering::Equal)
                .map(|(&address, &score)| ScoredDoc { address, score }),
        );
        top.sort();
    }
    top
}

fn library_rank(
    searcher: &Searcher,
    field: Field,
    terms: &[String],
    hits: usize,
) -> Result<Vec<ScoredDoc>> {
    let clauses: Vec<(Occur, Box<dyn Query>)> = terms
        .iter()
        .map(|text| {
            let query: Box<dyn Query> = Box::new(TermQuery::new(
                Term::from_field_text(field, text),
                IndexRecordOption::WithFreqs,
            ));
            (Occur::Should, query)
        })
        .collect();
    let query = BooleanQuery::new(clauses);
    let weight = query.weight(EnableScoring::enabled_from_searcher(searcher))?;

    let mut scores: HashMap<DocAddress, f32> = HashMap::new();
    for (ord, segment) in searcher.segment_readers().iter().enumerate() {
        let alive = segment.alive_bitset();
        weight.for_each(segment, &mut |doc: u32, score: f32| {
            if !alive.is_some_and(|bits| bits.is_deleted(doc)) {
                scores.insert(DocAddress::new(ord as u32, doc), score);
            }
        })?;
    }

    Ok(top_k(&scores, hits))
}
