//! Turn uploaded blobs (sheet files or zip archives, possibly nested) into a
//! flat list of sheet sources.

pub mod walk;

use std::{
    env,
    io::{self, Cursor, Read, Seek},
    path::Path,
};

use anyhow::{anyhow, bail, Context, Result};
use rayon::prelude::*;
use tempfile::{NamedTempFile, TempDir};
use tracing::{debug, info, instrument, warn};
use zip::ZipArchive;

use crate::{config::Config, error::SourceFailure};

pub use walk::collect_blobs;

/// A named input as uploaded.
#[derive(Clone, Debug)]
pub struct Blob {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl Blob {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }
}

/// One sheet file ready to decode.
#[derive(Clone, Debug)]
pub struct SheetSource {
    /// File name, used as the default `SourceFile`.
    pub name: String,
    /// Full archive chain, e.g. `batch.zip!inner.zip!dir/a.xlsx`.
    pub origin: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Default)]
pub struct Extraction {
    pub sources: Vec<SheetSource>,
    pub failures: Vec<SourceFailure>,
}

impl Extraction {
    fn append(&mut self, mut other: Extraction) {
        self.sources.append(&mut other.sources);
        self.failures.append(&mut other.failures);
    }
}

fn looks_like_zip(name: &str, bytes: &[u8]) -> bool {
    bytes.starts_with(b"PK\x03\x04")
        || bytes.starts_with(b"PK\x05\x06")
        || name.to_lowercase().ends_with(".zip")
}

fn file_name(path: &str) -> &str {
    path.trim_end_matches('/').rsplit('/').next().unwrap_or(path)
}

/// macOS resource forks and office lock files.
pub(crate) fn is_junk_entry(path: &str) -> bool {
    path.starts_with("__MACOSX/") || path.contains("/__MACOSX/") || file_name(path).starts_with("~$")
}

/// Expand every blob in parallel. Output order follows input order.
#[instrument(level = "info", skip_all, fields(blobs = blobs.len()))]
pub fn extract_batch(blobs: Vec<Blob>, config: &Config) -> Extraction {
    let parts: Vec<Extraction> = blobs
        .into_par_iter()
        .map(|blob| extract_blob(blob, config))
        .collect();

    let mut out = Extraction::default();
    for part in parts {
        out.append(part);
    }
    info!(
        sources = out.sources.len(),
        failures = out.failures.len(),
        "extraction finished"
    );
    out
}

/// Expand a single blob. Sheet-named blobs pass straight through; zip blobs are
/// walked, with nested archives spilled to a scratch directory that is removed
/// before this returns.
pub fn extract_blob(blob: Blob, config: &Config) -> Extraction {
    extract_blob_in(blob, config, &env::temp_dir())
}

/// [`extract_blob`] with the scratch directory created under `scratch_root`.
pub(crate) fn extract_blob_in(blob: Blob, config: &Config, scratch_root: &Path) -> Extraction {
    let mut out = Extraction::default();

    if config.is_sheet_name(&blob.name) {
        out.sources.push(SheetSource {
            name: file_name(&blob.name).to_string(),
            origin: blob.name.clone(),
            bytes: blob.bytes,
        });
        return out;
    }

    if !looks_like_zip(&blob.name, &blob.bytes) {
        debug!(name = %blob.name, "ignoring blob that is neither sheet nor archive");
        return out;
    }

    let scratch = match TempDir::new_in(scratch_root).context("creating extraction scratch dir") {
        Ok(dir) => dir,
        Err(e) => {
            warn!(archive = %blob.name, error = %e, "skipping archive");
            out.failures.push(SourceFailure::archive(&blob.name, &e));
            return out;
        }
    };

    let mut walker = ArchiveWalker {
        config,
        scratch: scratch.path(),
        out: &mut out,
    };
    walker.walk(Cursor::new(&blob.bytes), &blob.name, 0);
    // every source is in memory by now
    drop(scratch);

    out
}

struct ArchiveWalker<'a> {
    config: &'a Config,
    scratch: &'a Path,
    out: &'a mut Extraction,
}

impl ArchiveWalker<'_> {
    fn walk<R: Read + Seek>(&mut self, reader: R, origin: &str, depth: usize) {
        if let Err(e) = self.walk_inner(reader, origin, depth) {
            warn!(archive = %origin, error = %format!("{e:#}"), "skipping archive");
            self.out.failures.push(SourceFailure::archive(origin, &e));
        }
    }

    fn walk_inner<R: Read + Seek>(&mut self, reader: R, origin: &str, depth: usize) -> Result<()> {
        if depth > self.config.max_archive_depth {
            return Err(anyhow!(
                "archive nesting exceeds {} levels",
                self.config.max_archive_depth
            ));
        }

        let mut archive =
            ZipArchive::new(reader).with_context(|| format!("reading zip archive {}", origin))?;
        debug!(archive = %origin, entries = archive.len(), depth, "walking archive");

        for i in 0..archive.len() {
            let mut entry = match archive.by_index(i) {
                Ok(entry) => entry,
                Err(e) => {
                    let err = anyhow::Error::new(e).context(format!("entry #{i}"));
                    self.out.failures.push(SourceFailure::archive(origin, &err));
                    continue;
                }
            };
            if !entry.is_file() {
                continue;
            }
            let path = entry.name().to_string();
            if is_junk_entry(&path) {
                continue;
            }
            let entry_origin = format!("{origin}!{path}");

            if self.config.is_sheet_name(&path) {
                match read_capped(&mut entry, self.config.max_entry_bytes) {
                    Ok(bytes) => self.out.sources.push(SheetSource {
                        name: file_name(&path).to_string(),
                        origin: entry_origin,
                        bytes,
                    }),
                    Err(err) => {
                        warn!(source = %entry_origin, error = %format!("{err:#}"), "skipping unreadable entry");
                        self.out.failures.push(SourceFailure::sheet(entry_origin, &err));
                    }
                }
            } else if path.to_lowercase().ends_with(".zip") {
                let spilled = self.spill(&mut entry);
                drop(entry);
                match spilled {
                    Ok(tmp) => match tmp.reopen() {
                        Ok(file) => self.walk(file, &entry_origin, depth + 1),
                        Err(e) => {
                            let err = anyhow::Error::new(e).context("reopening spilled archive");
                            self.out.failures.push(SourceFailure::archive(entry_origin, &err));
                        }
                    },
                    Err(e) => self.out.failures.push(SourceFailure::archive(entry_origin, &e)),
                }
            }
        }
        Ok(())
    }

    /// Copy a nested archive into the scratch dir so it can be seeked.
    fn spill<R: Read>(&self, entry: &mut R) -> Result<NamedTempFile> {
        let limit = self.config.max_entry_bytes;
        let mut tmp = NamedTempFile::new_in(self.scratch).context("creating scratch file")?;
        let copied = io::copy(&mut entry.take(limit.saturating_add(1)), &mut tmp)
            .context("spilling nested archive")?;
        if copied > limit {
            bail!("nested archive exceeds {} bytes", limit);
        }
        Ok(tmp)
    }
}

/// Read at most `limit` bytes. The size a zip header declares is ignored, so a
/// forged entry can neither over-allocate nor run past the cap.
fn read_capped<R: Read>(entry: R, limit: u64) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    entry
        .take(limit.saturating_add(1))
        .read_to_end(&mut buf)
        .context("reading entry bytes")?;
    if buf.len() as u64 > limit {
        bail!("entry exceeds {} bytes", limit);
    }
    Ok(buf)
}
