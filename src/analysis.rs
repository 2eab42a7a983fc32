//! Text analysis settings shared by indexing and retrieval.
//!
//! The search library tokenizes text through named analyzers registered on
//! each opened index. Every stemming/stop-word combination gets its own
//! name, and the name chosen at indexing time is stored in the schema, so
//! retrieval analyzes topics exactly the way documents were analyzed.
//!
//! # Examples
//!
//! ```
//! use coreir::analysis::{AnalyzerConfig, analyze, build_analyzer};
//!
//! let mut analyzer = build_analyzer(&AnalyzerConfig::default());
//! assert_eq!(analyze(&mut analyzer, "The running dogs"), vec!["run", "dog"]);
//! ```

use serde::{Deserialize, Serialize};
use tantivy::Index;
use tantivy::tokenizer::{
    Language, LowerCaser, RemoveLongFilter, SimpleTokenizer, Stemmer, StopWordFilter,
    TextAnalyzer, TokenStream,
};

/// Tokens longer than this many bytes are dropped.
pub const MAX_TOKEN_LENGTH: usize = 40;

/// Default English stop words (the classic Lucene list).
pub const ENGLISH_STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "if", "in", "into", "is", "it",
    "no", "not", "of", "on", "or", "such", "that", "the", "their", "then", "there", "these",
    "they", "this", "to", "was", "will", "with",
];

/// Analyzer options for the `contents` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Apply the English (Porter family) stemmer.
    pub stemming: bool,

    /// Remove English stop words.
    pub stopwords: bool,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        AnalyzerConfig {
            stemming: true,
            stopwords: true,
        }
    }
}

impl AnalyzerConfig {
    /// All analyzer variants, in registration order.
    pub const VARIANTS: [AnalyzerConfig; 4] = [
        AnalyzerConfig {
            stemming: false,
            stopwords: false,
        },
        AnalyzerConfig {
            stemming: true,
            stopwords: false,
        },
        AnalyzerConfig {
            stemming: false,
            stopwords: true,
        },
        AnalyzerConfig {
            stemming: true,
            stopwords: true,
        },
    ];

    /// Name under which this analyzer is registered on an index.
    pub fn tokenizer_name(&self) -> &'static str {
        match (self.stemming, self.stopwords) {
            (false, false) => "coreir_en",
            (true, false) => "coreir_en_stem",
            (false, true) => "coreir_en_stop",
            (true, true) => "coreir_en_stem_stop",
        }
    }
}

/// Build the analyzer described by `config`.
pub fn build_analyzer(config: &AnalyzerConfig) -> TextAnalyzer {
    let base = TextAnalyzer::builder(SimpleTokenizer::default())
        .filter(RemoveLongFilter::limit(MAX_TOKEN_LENGTH))
        .filter(LowerCaser);

    match (config.stemming, config.stopwords) {
        (true, true) => base
            .filter(english_stop_words())
            .filter(Stemmer::new(Language::English))
            .build(),
        (true, false) => base.filter(Stemmer::new(Language::English)).build(),
        (false, true) => base.filter(english_stop_words()).build(),
        (false, false) => base.build(),
    }
}

/// Register every analyzer variant on `index`.
///
/// Must be called after creating or opening an index, before any document
/// is added or any query text is analyzed.
pub fn register_analyzers(index: &Index) {
    let tokenizers = index.tokenizers();
    for config in AnalyzerConfig::VARIANTS {
        tokenizers.register(config.tokenizer_name(), build_analyzer(&config));
    }
}

/// Run `text` through `analyzer` and collect the resulting terms.
pub fn analyze(analyzer: &mut TextAnalyzer, text: &str) -> Vec<String> {
    let mut terms = Vec::new();
    let mut stream = analyzer.token_stream(text);
    while stream.advance() {
        terms.push(stream.token().text.clone());
    }
    terms
}

fn english_stop_words() -> StopWordFilter {
    StopWordFilter::remove(ENGLISH_STOP_WORDS.iter().map(|word| word.to_string()))
}
