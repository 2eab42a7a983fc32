mod common;

use std::fs;
use std::path::{Path, PathBuf};

use coreir::collection::CollectionFormat;
use coreir::config::SweepGrid;
use coreir::indexing::{IndexingConfig, build_index};
use coreir::pipeline::{Pipeline, sweep_output};
use coreir::retrieval::{ScoringModel, Topic, TopicSearcher};
use tempfile::TempDir;

use common::*;

fn index_tsv(dir: &Path, docs: &str) -> PathBuf {
    let input = dir.join("collection");
    fs::create_dir_all(&input).unwrap();
    fs::write(input.join("docs.tsv"), docs).unwrap();

    let config = IndexingConfig {
        index_path: dir.join("index"),
        collection_format: CollectionFormat::Tsv,
        memory_buffer_mb: 64,
        ..IndexingConfig::default()
    };
    build_index(&input, &config).unwrap();
    config.index_path
}

fn ranking(searcher: &TopicSearcher, query: &str, model: ScoringModel) -> Vec<String> {
    ranking_top(searcher, query, model, 10)
}

fn ranking_top(
    searcher: &TopicSearcher,
    query: &str,
    model: ScoringModel,
    hits: usize,
) -> Vec<String> {
    let topic = Topic {
        id: "1".to_string(),
        query: query.to_string(),
    };
    searcher
        .search(&topic, &model, hits)
        .unwrap()
        .into_iter()
        .map(|entry| entry.doc_id)
        .collect()
}

#[test]
fn test_length_normalization_follows_b() {
    let dir = TempDir::new().unwrap();
    let index = index_tsv(
        dir.path(),
        "short\tapple banana\n\
         long\tapple apple cherry date elder fig grape honey kiwi lemon\n\
         other\tzebra\n",
    );
    let searcher = TopicSearcher::open(&index).unwrap();

    assert_eq!(
        ranking(&searcher, "apple", ScoringModel::bm25(1.2, 0.0)),
        vec!["long", "short"]
    );
    assert_eq!(
        ranking(&searcher, "apple", ScoringModel::bm25(1.2, 1.0)),
        vec!["short", "long"]
    );
}

#[test]
fn test_equal_scores_break_ties_by_doc_id() {
    let dir = TempDir::new().unwrap();
    let index = index_tsv(dir.path(), "d3\tcomet tail\nd1\tcomet tail\nd2\tcomet tail\n");
    let searcher = TopicSearcher::open(&index).unwrap();

    assert_eq!(
        ranking(&searcher, "comet", ScoringModel::default()),
        vec!["d1", "d2", "d3"]
    );
}

#[test]
fn test_tie_group_larger_than_hits_keeps_smallest_ids() {
    let dir = TempDir::new().unwrap();
    let index = index_tsv(
        dir.path(),
        "d3\tcomet tail\nd1\tcomet tail\nd2\tcomet tail\nd0\tcomet comet comet\n",
    );
    let searcher = TopicSearcher::open(&index).unwrap();

    for model in [ScoringModel::default(), ScoringModel::LibraryBm25] {
        assert_eq!(ranking_top(&searcher, "tail", model, 1), vec!["d1"], "{model:?}");
        assert_eq!(
            ranking_top(&searcher, "tail", model, 2),
            vec!["d1", "d2"],
            "{model:?}"
        );
        assert_eq!(
            ranking_top(&searcher, "comet", model, 2),
            vec!["d0", "d1"],
            "{model:?}"
        );
        assert_eq!(ranking_top(&searcher, "comet", model, 10).len(), 4);
    }
}

#[test]
fn test_repeated_query_terms_weigh_more() {
    let dir = TempDir::new().unwrap();
    let index = index_tsv(
        dir.path(),
        "a\tmoon\nb\tsun\nc\tmoon sun eclipse\nd\tnothing here\n",
    );
    let searcher = TopicSearcher::open(&index).unwrap();

    let moon = ranking(&searcher, "moon moon sun", ScoringModel::default());
    assert_eq!(moon[0], "c");
    assert_eq!(moon[1], "a");
    let sun = ranking(&searcher, "sun sun moon", ScoringModel::default());
    assert_eq!(sun[1], "b");
}

#[test]
fn test_sweep_writes_one_run_per_pair() {
    let root = TempDir::new().unwrap();
    write_inputs(root.path());
    let server = TestServer::start(gzipped_collection());

    let pipeline = Pipeline::new(test_config(root.path(), &server.url)).unwrap();
    pipeline.acquire().unwrap();
    pipeline.index().unwrap();

    let grid = SweepGrid {
        k1: vec![0.9, 4.46],
        b: vec![0.4],
    };
    let report = pipeline.sweep(&grid, true).unwrap();
    assert_eq!(report.outcomes.len(), 2);

    let base = &pipeline.config().retrieval.output;
    for outcome in &report.outcomes {
        let expected = sweep_output(base, outcome.k1, outcome.b);
        assert_eq!(outcome.retrieval.output, expected);
        assert!(fs::metadata(&expected).unwrap().len() > 0);
        let evaluation = outcome.evaluation.as_ref().unwrap();
        assert!(evaluation.stdout.contains(&expected.display().to_string()));
    }
    assert!(!base.exists());
}

#[test]
fn test_sweep_requires_index() {
    let root = TempDir::new().unwrap();
    write_inputs(root.path());

    let pipeline = Pipeline::new(test_config(root.path(), UNREACHABLE_URL)).unwrap();
    let grid = SweepGrid {
        k1: vec![1.2],
        b: vec![0.75],
    };
    assert!(pipeline.sweep(&grid, false).is_err());
}
