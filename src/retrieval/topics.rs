//! Topic files.
//!
//! Topics are `id<TAB>query` lines. Several files may be merged; when an id
//! is defined more than once the last definition wins.

use std::collections::BTreeMap;
use std::io::BufRead;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::util::open_compressed;

/// Topic file formats.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopicFormat {
    /// Integer ids, searched in numeric order.
    #[default]
    TsvInt,
    /// Free-form ids, searched in lexical order.
    TsvString,
}

/// One query definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    pub id: String,
    pub query: String,
}

enum TopicMap {
    Int(BTreeMap<i64, String>),
    Text(BTreeMap<String, String>),
}

impl TopicMap {
    fn insert(&mut self, id: &str, query: String, source: &str, line: usize) -> Result<()> {
        match self {
            TopicMap::Int(map) => {
                let key = id.parse::<i64>().map_err(|_| {
                    PipelineError::topics(format!(
                        "{source}: line {line}: topic id {id:?} is not an integer"
                    ))
                })?;
                map.insert(key, query);
            }
            TopicMap::Text(map) => {
                map.insert(id.to_string(), query);
            }
        }
        Ok(())
    }

    fn into_topics(self) -> Vec<Topic> {
        match self {
            TopicMap::Int(map) => map
                .into_iter()
                .map(|(id, query)| Topic {
                    id: id.to_string(),
                    query,
                })
                .collect(),
            TopicMap::Text(map) => map
                .into_iter()
                .map(|(id, query)| Topic { id, query })
                .collect(),
        }
    }
}

/// Read and merge the topics of every file in `paths`, in id order.
pub fn read_topics(paths: &[PathBuf], format: TopicFormat) -> Result<Vec<Topic>> {
    if paths.is_empty() {
        return Err(PipelineError::invalid_config("no topic files given"));
    }

    let mut topics = match format {
        TopicFormat::TsvInt => TopicMap::Int(BTreeMap::new()),
        TopicFormat::TsvString => TopicMap::Text(BTreeMap::new()),
    };
    for path in paths {
        read_file(path, &mut topics)?;
    }
    Ok(topics.into_topics())
}

fn read_file(path: &Path, topics: &mut TopicMap) -> Result<()> {
    if !path.is_file() {
        return Err(PipelineError::missing(path));
    }
    let source = path.display().to_string();
    let input = open_compressed(path)?;

    for (number, line) in input.lines().enumerate() {
        let line = line?;
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }
        let (id, query) = line.split_once('\t').ok_or_else(|| {
            PipelineError::topics(format!(
                "{source}: line {}: expected <id><TAB><query>",
                number + 1
            ))
        })?;
        let id = id.trim();
        if id.is_empty() {
            return Err(PipelineError::topics(format!(
                "{source}: line {}: empty topic id",
                number + 1
            )));
        }
        topics.insert(id, query.trim().to_string(), &source, number + 1)?;
    }
    Ok(())
}
