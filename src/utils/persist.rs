use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use anyhow::Context;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{Result, WrapErr};

/// Serialize `obj` as JSON to `path`, creating parent directories.
///
/// An existing file is overwritten.  The write is not atomic: a crash midway
/// leaves a truncated file behind.
pub fn save_object<T: Serialize + ?Sized>(path: &Path, obj: &T) -> Result<()> {
    write_json(path, obj).wrap_err()
}

/// Read back an object written by [`save_object`].
pub fn load_object<T: DeserializeOwned>(path: &Path) -> Result<T> {
    read_json(path).wrap_err()
}

fn write_json<T: Serialize + ?Sized>(path: &Path, obj: &T) -> anyhow::Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating directory {}", dir.display()))?;
    }
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, obj)
        .with_context(|| format!("serializing object to {}", path.display()))?;
    writer.flush().context("flushing object file")?;
    log::debug!("saved object to {}", path.display());
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let obj = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("deserializing object from {}", path.display()))?;
    Ok(obj)
}
