//! Collection acquisition.
//!
//! Guarantees that the compressed collection file exists locally, fetching
//! it over HTTP(S) when it does not. An existing file is never re-fetched,
//! so the stage is idempotent and makes no network call on later runs.
//!
//! Downloads stream into `<file>.part` and are renamed into place only after
//! the transfer and the optional size/checksum checks succeed.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use log::{info, warn};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::util::{discard, ensure_dir};

/// Remote location of the MS MARCO document collection in TREC format.
pub const MSMARCO_DOCS_URL: &str =
    "https://rgw.cs.uwaterloo.ca/JIMMYLIN-bucket0/data/msmarco-docs.trec.gz";

/// Suffix of the in-progress download file.
pub const PARTIAL_SUFFIX: &str = "part";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const USER_AGENT: &str = concat!("coreir/", env!("CARGO_PKG_VERSION"));

/// Configuration for the acquisition stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionConfig {
    /// Remote URL of the compressed collection.
    pub url: String,

    /// Directory holding the collection file (also the indexing input).
    pub collection_dir: PathBuf,

    /// File name of the collection inside `collection_dir`.
    pub file_name: String,

    /// Expected size of the collection in bytes.
    pub expected_size: Option<u64>,

    /// Expected CRC32 of the collection bytes.
    pub expected_crc32: Option<u32>,

    /// Apply the size/checksum checks to a file that is already present.
    pub verify_existing: bool,

    /// How many times a failed transfer is retried.
    pub retries: u32,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        AcquisitionConfig {
            url: MSMARCO_DOCS_URL.to_string(),
            collection_dir: PathBuf::from("data/collections/ms-marco-doc"),
            file_name: "msmarco-docs.trec.gz".to_string(),
            expected_size: None,
            expected_crc32: None,
            verify_existing: false,
            retries: 0,
        }
    }
}

impl AcquisitionConfig {
    /// Full path of the local collection file.
    pub fn collection_file(&self) -> PathBuf {
        self.collection_dir.join(&self.file_name)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.url.trim().is_empty() {
            return Err(PipelineError::invalid_config("collection url is empty"));
        }
        if self.file_name.trim().is_empty() {
            return Err(PipelineError::invalid_config("collection file name is empty"));
        }
        Ok(())
    }

    fn has_expectations(&self) -> bool {
        self.expected_size.is_some() || self.expected_crc32.is_some()
    }
}

/// Outcome of the acquisition stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcquisitionReport {
    /// Local collection file.
    pub path: PathBuf,

    /// Whether the file was fetched during this run.
    pub downloaded: bool,

    /// Size of the file in bytes.
    pub bytes: u64,

    /// CRC32 of the file, when it was computed.
    pub crc32: Option<u32>,

    /// Number of transfer attempts (0 when the file was already present).
    pub attempts: u32,

    /// Time spent in the stage.
    pub duration_ms: u64,
}

/// Make sure the collection file described by `config` exists locally.
pub fn acquire(config: &AcquisitionConfig) -> Result<AcquisitionReport> {
    config.validate()?;
    let start = Instant::now();

    ensure_dir(&config.collection_dir)?;

    let target = config.collection_file();
    if target.exists() {
        info!(
            "collection {} already present, skipping download",
            target.display()
        );
        let (bytes, crc32) = if config.verify_existing && config.has_expectations() {
            let (bytes, crc32) = checksum_file(&target)?;
            verify(config, &target, bytes, crc32)?;
            (bytes, Some(crc32))
        } else {
            (fs::metadata(&target)?.len(), None)
        };
        return Ok(AcquisitionReport {
            path: target,
            downloaded: false,
            bytes,
            crc32,
            attempts: 0,
            duration_ms: start.elapsed().as_millis() as u64,
        });
    }

    let mut attempts = 0;
    loop {
        attempts += 1;
        match download(config, &target) {
            Ok((bytes, crc32)) => {
                info!(
                    "downloaded {} ({bytes} bytes) in {:.1}s",
                    target.display(),
                    start.elapsed().as_secs_f64()
                );
                return Ok(AcquisitionReport {
                    path: target,
                    downloaded: true,
                    bytes,
                    crc32: Some(crc32),
                    attempts,
                    duration_ms: start.elapsed().as_millis() as u64,
                });
            }
            Err(e) if e.is_transient() && attempts <= config.retries => {
                warn!("download attempt {attempts} failed: {e}; retrying");
            }
            Err(e) => return Err(e),
        }
    }
}

/// Path of the in-progress download for `target`.
pub fn partial_path(target: &Path) -> PathBuf {
    let mut name = target.file_name().unwrap_or_default().to_os_string();
    name.push(".");
    name.push(PARTIAL_SUFFIX);
    target.with_file_name(name)
}

/// Compute the size and CRC32 of a file.
pub fn checksum_file(path: &Path) -> io::Result<(u64, u32)> {
    let mut file = File::open(path)?;
    let mut writer = ChecksumWriter::new(io::sink());
    io::copy(&mut file, &mut writer)?;
    writer.finish()
}

fn download(config: &AcquisitionConfig, target: &Path) -> Result<(u64, u32)> {
    let url = config.url.as_str();
    let client = Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(Option::<Duration>::None)
        .build()
        .map_err(|e| PipelineError::network(url, e))?;

    info!("downloading {url} to {}", target.display());
    let mut response = client
        .get(url)
        .send()
        .and_then(|response| response.error_for_status())
        .map_err(|e| PipelineError::network(url, e))?;

    let partial = partial_path(target);
    let file = File::create(&partial).map_err(|e| PipelineError::create_file(&partial, e))?;
    let mut writer = ChecksumWriter::new(BufWriter::new(file));

    if let Err(e) = response.copy_to(&mut writer) {
        drop(writer);
        discard(&partial);
        return Err(PipelineError::network(url, e));
    }

    let (bytes, crc32) = match writer.finish() {
        Ok(summary) => summary,
        Err(e) => {
            discard(&partial);
            return Err(e.into());
        }
    };

    if let Err(e) = verify(config, target, bytes, crc32) {
        discard(&partial);
        return Err(e);
    }

    commit_partial(&partial, target)?;
    Ok((bytes, crc32))
}

/// Move a finished download into place, removing it if the move fails.
fn commit_partial(partial: &Path, target: &Path) -> Result<()> {
    if let Err(e) = fs::rename(partial, target) {
        discard(partial);
        return Err(e.into());
    }
    Ok(())
}

fn verify(config: &AcquisitionConfig, path: &Path, bytes: u64, crc32: u32) -> Result<()> {
    if let Some(expected) = config.expected_size
        && expected != bytes
    {
        return Err(PipelineError::integrity(format!(
            "{}: expected {expected} bytes, got {bytes}",
            path.display()
        )));
    }
    if let Some(expected) = config.expected_crc32
        && expected != crc32
    {
        return Err(PipelineError::integrity(format!(
            "{}: expected crc32 {expected:08x}, got {crc32:08x}",
            path.display()
        )));
    }
    Ok(())
}

/// Writer adapter that counts and checksums everything passing through.
pub struct ChecksumWriter<W: Write> {
    inner: W,
    hasher: crc32fast::Hasher,
    bytes: u64,
}

impl<W: Write> ChecksumWriter<W> {
    pub fn new(inner: W) -> Self {
        ChecksumWriter {
            inner,
            hasher: crc32fast::Hasher::new(),
            bytes: 0,
        }
    }

    /// Flush the inner writer and return `(bytes, crc32)`.
    pub fn finish(mut self) -> io::Result<(u64, u32)> {
        self.inner.flush()?;
        Ok((self.bytes, self.hasher.finalize()))
    }
}

impl<W: Write> Write for ChecksumWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = self.inner.write(buf)?;
        self.hasher.update(&buf[..written]);
        self.bytes += written as u64;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
