//! Shared fixtures for integration tests.
#![allow(dead_code)]

use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use flate2::Compression;
use flate2::write::GzEncoder;

use coreir::config::{PipelineConfig, Preset};

pub const COLLECTION: &str = "\
<DOC>
<DOCNO>D1</DOCNO>
<TEXT>
http://example.com/stars
The hot glowing surfaces of stars emit energy as electromagnetic radiation.
</TEXT>
</DOC>
<DOC>
<DOCNO>D2</DOCNO>
<TEXT>
http://example.com/planets
Planets orbit stars and reflect their light.
</TEXT>
</DOC>
<DOC>
<DOCNO>D3</DOCNO>
<TEXT>
http://example.com/ocean
The ocean covers most of the surface of the planet.
</TEXT>
</DOC>
<DOC>
<DOCNO>D4</DOCNO>
<TEXT>
http://example.com/bet
Does xpress bet charge a fee for deposits and withdrawals?
</TEXT>
</DOC>
";

pub const TOPICS: &str = "\
174249\tdoes xpress bet charge to deposit money in your account
320792\thow do stars emit radiation
1090270\tocean surface
";

pub const QRELS: &str = "\
174249 0 D4 1
320792 0 D1 1
1090270 0 D3 1
";

/// Script that echoes its arguments to stdout and a summary line to stderr.
pub const EVAL_SCRIPT: &str = "\
echo \"args: $*\"
echo \"#####################\" >&2
echo \"MRR @100: 0.5\" >&2
";

/// The collection as a gzip stream.
pub fn gzipped_collection() -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(COLLECTION.as_bytes()).unwrap();
    encoder.finish().unwrap()
}

/// A loopback HTTP server answering every GET with the same body.
pub struct TestServer {
    pub url: String,
    requests: Arc<AtomicUsize>,
}

impl TestServer {
    pub fn start(body: Vec<u8>) -> Self {
        Self::failing(body, 0, 200)
    }

    /// Answer the first `failures` requests with `status` and no body.
    pub fn failing(body: Vec<u8>, failures: usize, status: u16) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap();
        let requests = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&requests);

        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(mut stream) = stream else { continue };
                let mut reader = BufReader::new(stream.try_clone().unwrap());
                let mut line = String::new();
                loop {
                    line.clear();
                    match reader.read_line(&mut line) {
                        Ok(0) | Err(_) => break,
                        Ok(_) if line == "\r\n" => break,
                        Ok(_) => {}
                    }
                }
                let served = counter.fetch_add(1, Ordering::SeqCst);

                let (status, payload) = if served < failures {
                    (status, &[][..])
                } else {
                    (200, &body[..])
                };
                let header = format!(
                    "HTTP/1.1 {status} {}\r\nContent-Type: application/gzip\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    if status == 200 { "OK" } else { "Error" },
                    payload.len()
                );
                let _ = stream.write_all(header.as_bytes());
                let _ = stream.write_all(payload);
                let _ = stream.flush();
            }
        });

        TestServer {
            url: format!("http://{address}/msmarco-docs.trec.gz"),
            requests,
        }
    }

    /// Requests served so far.
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

/// A URL nothing listens on.
pub const UNREACHABLE_URL: &str = "http://127.0.0.1:9/msmarco-docs.trec.gz";

/// Write topics, judgments and the evaluation script under `root`.
pub fn write_inputs(root: &Path) {
    let topics = root.join("data/topics-and-qrels");
    fs::create_dir_all(&topics).unwrap();
    fs::write(topics.join("topics.msmarco-doc.dev.txt"), TOPICS).unwrap();
    fs::write(topics.join("qrels.msmarco-doc.dev.txt"), QRELS).unwrap();

    let scripts = root.join("tools");
    fs::create_dir_all(&scripts).unwrap();
    fs::write(scripts.join("eval.sh"), EVAL_SCRIPT).unwrap();
}

/// A leaderboard configuration rooted at `root`, fetching from `url`.
pub fn test_config(root: &Path, url: &str) -> PipelineConfig {
    let mut config = Preset::Leaderboard.config();
    config.root = root.to_path_buf();
    config.acquisition.url = url.to_string();
    config.indexing.memory_buffer_mb = 64;
    config.retrieval.threads = Some(2);
    config.evaluation.interpreter = PathBuf::from("sh");
    config.evaluation.script = PathBuf::from("tools/eval.sh");
    config
}
