//! JSON layer document reading/writing

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::crs::CRS;
use crate::error::Result;
use crate::layer::ProviderKind;
use crate::vector::{Feature, Fields};

/// On-disk representation of a layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerDocument {
    pub name: String,
    pub provider: ProviderKind,
    #[serde(default)]
    pub crs: CRS,
    pub fields: Fields,
    #[serde(default)]
    pub features: Vec<Feature>,
}

/// Read a layer document from a file
pub fn read_layer(path: impl AsRef<Path>) -> Result<LayerDocument> {
    let file = File::open(path.as_ref())?;
    let doc = serde_json::from_reader(BufReader::new(file))?;
    Ok(doc)
}

/// Write a layer document to a file.
///
/// The document is written to a temporary file in the same directory and
/// renamed over `path`, so a failed write leaves the old file intact.
pub fn write_layer(path: impl AsRef<Path>, doc: &LayerDocument) -> Result<()> {
    let path = path.as_ref();
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let tmp = NamedTempFile::new_in(dir)?;
    {
        let mut writer = BufWriter::new(tmp.as_file());
        serde_json::to_writer_pretty(&mut writer, doc)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
    }
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
