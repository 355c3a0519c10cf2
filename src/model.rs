//! On-disk format for a trained value table.

use std::{
    fs::{self, File},
    io::{BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::environment::Pos;
use crate::error::{Error, Result};
use crate::policy::{ActionValues, QTable};

/// `<dir>/qtable_<map>_<slippery|no_slippery>.json`
pub fn model_path(dir: &Path, map: &str, slippery: bool) -> PathBuf {
    let surface = if slippery { "slippery" } else { "no_slippery" };
    dir.join(format!("qtable_{}_{}.json", map, surface))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedEntry {
    pub pos: Pos,
    /// Indexed Up, Down, Left, Right.
    pub values: ActionValues,
}

/// A value table plus the settings it was trained under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedModel {
    pub version: u32,
    pub map: String,
    pub slippery: bool,
    pub entries: Vec<SavedEntry>,
}

impl SavedModel {
    pub const VERSION: u32 = 1;

    pub fn from_table(table: &QTable, map: impl Into<String>, slippery: bool) -> Self {
        let entries = table
            .states()
            .into_iter()
            .map(|pos| SavedEntry {
                pos,
                values: table.values(pos),
            })
            .collect();
        Self {
            version: Self::VERSION,
            map: map.into(),
            slippery,
            entries,
        }
    }

    pub fn to_table(&self) -> Result<QTable> {
        if self.version != Self::VERSION {
            return Err(Error::UnsupportedModelVersion {
                found: self.version,
                expected: Self::VERSION,
            });
        }
        Ok(self
            .entries
            .iter()
            .map(|entry| (entry.pos, entry.values))
            .collect())
    }

    /// Write as JSON, creating the parent directory if needed.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| Error::io("create directory", parent, e))?;
        }
        let file = File::create(path).map_err(|e| Error::io("create", path, e))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, self)?;
        writer.flush().map_err(|e| Error::io("write", path, e))?;

        info!(path = %path.display(), states = self.entries.len(), "model saved");
        Ok(())
    }

    /// A missing or corrupt file is an error, never an empty table.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| Error::io("open", path, e))?;
        let model: SavedModel = serde_json::from_reader(BufReader::new(file))?;

        info!(path = %path.display(), states = model.entries.len(), "model loaded");
        Ok(model)
    }

    /// Load a file and convert it straight to a table.
    pub fn load_table(path: &Path) -> Result<QTable> {
        Self::load_from_file(path)?.to_table()
    }
}
