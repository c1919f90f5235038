//! Output file naming. Every artifact of a pass lives under
//! `<output_dir>/<simid>/<kind>/<brick[:3]>/`, so concurrent jobs on the same
//! brick never share a file.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::simid::SimId;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileKind {
    Injected,
    Tractor,
    Log,
}

impl FileKind {
    fn directory(self) -> &'static str {
        match self {
            FileKind::Injected => "sim",
            FileKind::Tractor => "tractor",
            FileKind::Log => "logs",
        }
    }

    fn file_name(self, brickname: &str) -> String {
        match self {
            FileKind::Injected => format!("injected-{brickname}.csv"),
            FileKind::Tractor => format!("tractor-{brickname}.csv"),
            FileKind::Log => format!("log-{brickname}.log"),
        }
    }
}

/// First three characters of a brick name.
pub fn brick_prefix(brickname: &str) -> &str {
    match brickname.char_indices().nth(3) {
        Some((i, _)) => &brickname[..i],
        None => brickname,
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputLayout {
    pub output_dir: PathBuf,
    pub simid: SimId,
}

impl OutputLayout {
    pub fn new(output_dir: &Path, simid: SimId) -> Self {
        Self {
            output_dir: output_dir.to_path_buf(),
            simid,
        }
    }

    /// Same output directory, another pass.
    pub fn with_simid(&self, simid: SimId) -> Self {
        Self::new(&self.output_dir, simid)
    }

    pub fn find_file(&self, kind: FileKind, brickname: &str) -> PathBuf {
        self.output_dir
            .join(self.simid.to_string())
            .join(kind.directory())
            .join(brick_prefix(brickname))
            .join(kind.file_name(brickname))
    }

    pub fn injected(&self, brickname: &str) -> PathBuf {
        self.find_file(FileKind::Injected, brickname)
    }

    pub fn tractor(&self, brickname: &str) -> PathBuf {
        self.find_file(FileKind::Tractor, brickname)
    }

    pub fn log(&self, brickname: &str) -> PathBuf {
        self.find_file(FileKind::Log, brickname)
    }
}

/// Every `(brickname, simid)` with an injected catalog under `output_dir`,
/// sorted.
pub fn scan_injected(output_dir: &Path) -> Result<Vec<(String, SimId)>> {
    let mut found = Vec::new();
    if !output_dir.is_dir() {
        return Ok(found);
    }
    for simdir in fs::read_dir(output_dir)? {
        let simdir = simdir?;
        let Some(simid) = simdir
            .file_name()
            .to_str()
            .and_then(|name| name.parse::<SimId>().ok())
        else {
            continue;
        };
        let sim = simdir.path().join(FileKind::Injected.directory());
        if !sim.is_dir() {
            continue;
        }
        for prefix in fs::read_dir(&sim)? {
            let prefix = prefix?.path();
            if !prefix.is_dir() {
                continue;
            }
            for entry in fs::read_dir(&prefix)? {
                let name = entry?.file_name();
                let Some(brick) = name
                    .to_str()
                    .and_then(|n| n.strip_prefix("injected-"))
                    .and_then(|n| n.strip_suffix(".csv"))
                else {
                    continue;
                };
                found.push((brick.to_string(), simid));
            }
        }
    }
    found.sort();
    Ok(found)
}
