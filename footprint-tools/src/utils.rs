//! Utilities to open datasets and write results.

use anyhow::Context;
use footprint::Result;
use gdal::Dataset;
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::Path;

pub fn read_dataset(path: &Path) -> Result<Dataset> {
    Ok(Dataset::open(path).with_context(|| format!("reading dataset {}", path.display()))?)
}

pub fn write_json<T: Serialize>(path: &Path, json: &T) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let buf = std::io::BufWriter::with_capacity(0x100000, file);
    serde_json::to_writer_pretty(buf, json)
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

pub fn print_json<T: Serialize>(json: &T) -> Result<()> {
    let mut writer = std::io::BufWriter::new(std::io::stdout());
    serde_json::to_writer_pretty(&mut writer, json).context("writing to stdout")?;
    writeln!(writer).context("writing to stdout")?;
    Ok(())
}
