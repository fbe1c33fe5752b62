use std::{
    env,
    path::{Path, PathBuf},
    process::exit,
};

use anyhow::Result;
use serde::Serialize;
use tallysheet::{
    extract::{collect_blobs, extract_batch},
    schema::{reconcile::HeaderRole, AliasTable, ColumnMapping, LogicalColumn},
    sheet::read_sheet,
    Config,
};

/// How one sheet's header row lands on the logical schema.
#[derive(Serialize)]
struct SheetHeaders {
    source: String,
    headers: Vec<(String, HeaderRole)>,
    filled_with_null: Vec<LogicalColumn>,
}

fn main() {
    // Expect one or more paths (sheets, zips, or folders of them), optionally
    // preceded by `--config <yaml>` so config aliases are applied.
    let mut args = env::args().skip(1).peekable();
    let config_path = if args.peek().map(String::as_str) == Some("--config") {
        args.next();
        args.next().map(PathBuf::from)
    } else {
        None
    };
    let paths: Vec<PathBuf> = args.map(PathBuf::from).collect();
    if paths.is_empty() {
        eprintln!("Usage: inspect_headers [--config <CONFIG>] <PATH>...");
        exit(1);
    }
    if let Err(e) = inspect(config_path.as_deref(), &paths) {
        eprintln!("Error: {:#}", e);
        exit(1);
    }
}

fn inspect(config_path: Option<&Path>, paths: &[PathBuf]) -> Result<()> {
    let config = match config_path {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    let aliases = AliasTable::from_config(&config)?;

    let (blobs, mut failures) = collect_blobs(paths, &config)?;
    let extraction = extract_batch(blobs, &config);
    failures.extend(extraction.failures);

    let mut report = Vec::with_capacity(extraction.sources.len());
    for source in extraction.sources {
        let sheet = match read_sheet(&source.name, source.bytes) {
            Ok(sheet) => sheet,
            Err(e) => {
                eprintln!("skipped {}: {:#}", source.origin, e);
                continue;
            }
        };
        let headers: Vec<String> = sheet
            .rows
            .first()
            .map(|row| row.iter().map(|c| c.as_text().unwrap_or_default()).collect())
            .unwrap_or_default();
        let mapping = ColumnMapping::from_headers(&headers, &aliases);
        report.push(SheetHeaders {
            source: source.origin,
            headers: mapping.roles().to_vec(),
            filled_with_null: mapping.missing(),
        });
    }

    print!("{}", serde_yaml::to_string(&report)?);
    for failure in failures {
        eprintln!("skipped {}", failure);
    }
    Ok(())
}
