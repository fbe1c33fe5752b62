use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use glob::glob;
use tracing::{debug, info, warn};

use super::{is_junk_entry, Blob};
use crate::{config::Config, error::SourceFailure};

fn wanted(path: &Path, config: &Config) -> bool {
    let Some(name) = path.file_name().map(|n| n.to_string_lossy()) else {
        return false;
    };
    if is_junk_entry(&name) {
        return false;
    }
    config.is_sheet_name(&name) || name.to_lowercase().ends_with(".zip")
}

/// Load the files named on the command line. Directories contribute their
/// sheet and zip files (not recursively), sorted by path. A path that does not
/// exist is an error; a file that cannot be read becomes a failure.
pub fn collect_blobs(paths: &[PathBuf], config: &Config) -> Result<(Vec<Blob>, Vec<SourceFailure>)> {
    let mut files: Vec<PathBuf> = Vec::new();
    for path in paths {
        if path.is_dir() {
            let pattern = format!("{}/*", glob::Pattern::escape(&path.to_string_lossy()));
            let mut found: Vec<PathBuf> = glob(&pattern)
                .with_context(|| format!("listing {}", path.display()))?
                .filter_map(|entry| entry.ok())
                .filter(|p| p.is_file() && wanted(p, config))
                .collect();
            found.sort();
            debug!(dir = %path.display(), files = found.len(), "scanned directory");
            files.extend(found);
        } else if path.is_file() {
            files.push(path.clone());
        } else {
            bail!("input path {} does not exist", path.display());
        }
    }

    let mut blobs = Vec::with_capacity(files.len());
    let mut failures = Vec::new();
    for file in files {
        let name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| file.display().to_string());
        match fs::read(&file).with_context(|| format!("reading {}", file.display())) {
            Ok(bytes) => blobs.push(Blob::new(name, bytes)),
            Err(e) => {
                warn!(path = %file.display(), "skipping unreadable file");
                failures.push(SourceFailure::archive(file.display().to_string(), &e));
            }
        }
    }
    info!(blobs = blobs.len(), "collected input files");
    Ok((blobs, failures))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn directory_scan_picks_sheets_and_zips() -> Result<()> {
        let dir = tempdir()?;
        fs::write(dir.path().join("b.xlsx"), b"b")?;
        fs::write(dir.path().join("a.ZIP"), b"a")?;
        fs::write(dir.path().join("notes.txt"), b"n")?;
        fs::write(dir.path().join("~$b.xlsx"), b"lock")?;
        fs::create_dir(dir.path().join("nested"))?;
        fs::write(dir.path().join("nested").join("c.xlsx"), b"c")?;

        let (blobs, failures) = collect_blobs(&[dir.path().to_path_buf()], &Config::default())?;
        let names: Vec<_> = blobs.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["a.ZIP", "b.xlsx"]);
        assert!(failures.is_empty());
        Ok(())
    }

    #[test]
    fn missing_path_is_an_error() {
        let err = collect_blobs(&[PathBuf::from("/definitely/not/here.xlsx")], &Config::default())
            .unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }
}
