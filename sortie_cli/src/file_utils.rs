use std::{
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::Path,
};

use anyhow::Context;
use serde::{Serialize, de::DeserializeOwned};

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, anyhow::Error> {
    let file = File::open(path).with_context(|| format!("Cannot open {}", path.display()))?;

    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Invalid JSON in {}", path.display()))
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), anyhow::Error> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.flush()?;

    Ok(())
}
