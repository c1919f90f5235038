//! Software versions recorded in output headers, and the environment needed
//! to reproduce a run against them.
//!
//! The reduction pipeline appends one `VER_<short>` card per stage it runs
//! plus `DEPNAMnn` / `DEPVERnn` pairs for its dependencies. The harness adds
//! its own `MBRICKV` card and one `MBV_<short>` card per stage.

pub mod environment;
pub mod images;

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use tracing::debug;

use crate::error::{MonteBrickError, Result};
use crate::header::{read_header, Header, COMMENT_KEY};

pub use environment::{module_search_path, EnvGuard, EnvironmentManager};
pub use images::{match_image, DistributionImage, DISTRIBUTION_IMAGES};

/// Module name of the reduction pipeline in version lookups.
pub const PIPELINE_MODULE: &str = "legacypipe";
/// Module name of this harness in version lookups.
pub const HARNESS_MODULE: &str = "montebrick";
/// Pseudo-module resolving to the packaged distribution image.
pub const IMAGE_MODULE: &str = "image";

pub const HARNESS_VERSION_KEY: &str = "MBRICKV";
pub const PIPELINE_VERSION_KEY: &str = "PIPEVER";
const PIPELINE_STAGE_PREFIX: &str = "VER_";
const HARNESS_STAGE_PREFIX: &str = "MBV_";
const DEPNAM_PREFIX: &str = "DEPNAM";
const DEPVER_PREFIX: &str = "DEPVER";

/// Pipeline stages in execution order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    Tims,
    Refs,
    Outliers,
    Halos,
    Srcs,
    Fitblobs,
    Coadds,
    WiseForced,
    Writecat,
}

impl Stage {
    pub const ALL: [Stage; 9] = [
        Stage::Tims,
        Stage::Refs,
        Stage::Outliers,
        Stage::Halos,
        Stage::Srcs,
        Stage::Fitblobs,
        Stage::Coadds,
        Stage::WiseForced,
        Stage::Writecat,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Stage::Tims => "tims",
            Stage::Refs => "refs",
            Stage::Outliers => "outliers",
            Stage::Halos => "halos",
            Stage::Srcs => "srcs",
            Stage::Fitblobs => "fitblobs",
            Stage::Coadds => "coadds",
            Stage::WiseForced => "wise_forced",
            Stage::Writecat => "writecat",
        }
    }

    /// Four-letter code used in header keys.
    pub fn short(self) -> &'static str {
        match self {
            Stage::Tims => "TIMS",
            Stage::Refs => "REFS",
            Stage::Outliers => "OUTL",
            Stage::Halos => "HALO",
            Stage::Srcs => "SRCS",
            Stage::Fitblobs => "FITB",
            Stage::Coadds => "COAD",
            Stage::WiseForced => "WISE",
            Stage::Writecat => "WCAT",
        }
    }

    pub fn pipeline_key(self) -> String {
        format!("{PIPELINE_STAGE_PREFIX}{}", self.short())
    }

    pub fn harness_key(self) -> String {
        format!("{HARNESS_STAGE_PREFIX}{}", self.short())
    }

    fn from_short(short: &str) -> Option<Stage> {
        Stage::ALL.into_iter().find(|s| s.short() == short)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Stage {
    type Err = MonteBrickError;

    fn from_str(s: &str) -> Result<Self> {
        Stage::ALL
            .into_iter()
            .find(|stage| stage.name() == s)
            .ok_or_else(|| MonteBrickError::UnknownStage(s.to_string()))
    }
}

/// Module name to version.
pub type ModuleVersions = BTreeMap<String, String>;

/// Version information read back from a pipeline output header.
#[derive(Clone, Debug)]
pub struct HeaderVersions {
    header: Header,
}

impl HeaderVersions {
    pub fn from_header(header: &Header) -> Self {
        let mut header = header.clone();
        // Early pipeline releases only recorded the global version.
        if !header.contains(&Stage::Tims.pipeline_key()) {
            if let Some(version) = header.get(PIPELINE_VERSION_KEY).map(str::to_string) {
                header.set(&Stage::Tims.pipeline_key(), &version);
            }
        }
        Self { header }
    }

    pub fn read(path: &Path) -> Result<Self> {
        Ok(Self::from_header(&read_header(path)?))
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Version of a dependency recorded through a `DEPNAMnn` / `DEPVERnn` pair.
    pub fn dependency(&self, name: &str) -> Option<&str> {
        self.header
            .cards()
            .iter()
            .find(|c| c.key.starts_with(DEPNAM_PREFIX) && c.value == name)
            .and_then(|c| {
                let key = c.key.replacen(DEPNAM_PREFIX, DEPVER_PREFIX, 1);
                self.header.get(&key)
            })
    }

    /// Version of `module` at `stage`. The pipeline and harness carry one
    /// version per stage, other dependencies one for the whole run, and
    /// [`IMAGE_MODULE`] resolves to the matching distribution image.
    pub fn module_version(&self, module: &str, stage: Stage) -> Result<String> {
        if module == IMAGE_MODULE {
            return match_image(self, stage).map(str::to_string);
        }
        let value = match module {
            PIPELINE_MODULE => self.header.get(&stage.pipeline_key()),
            HARNESS_MODULE => self.header.get(&stage.harness_key()),
            _ => self.dependency(module),
        };
        value
            .map(str::to_string)
            .ok_or_else(|| MonteBrickError::VersionNotFound {
                module: module.to_string(),
                stage: stage.name().to_string(),
            })
    }

    /// Pipeline version of every stage recorded in the header.
    pub fn read_versions(&self) -> Vec<(Stage, String)> {
        Stage::ALL
            .into_iter()
            .filter_map(|stage| {
                self.header
                    .get(&stage.pipeline_key())
                    .map(|v| (stage, v.to_string()))
            })
            .collect()
    }

    /// Stages at which any of `modules` changes version, walking back from
    /// the last stage. Always holds `writecat`; `wise_forced` is skipped when
    /// the header has no record of it. Returned in execution order.
    pub fn stage_versions(&self, modules: &[&str]) -> Result<Vec<(Stage, ModuleVersions)>> {
        let versions_at = |stage: Stage| -> Result<ModuleVersions> {
            modules
                .iter()
                .map(|&m| Ok((m.to_string(), self.module_version(m, stage)?)))
                .collect()
        };

        let mut stages: Vec<Stage> = Stage::ALL.into_iter().rev().collect();
        if versions_at(Stage::WiseForced).is_err() {
            stages.retain(|&s| s != Stage::WiseForced);
        }

        let mut changes: Vec<(Stage, ModuleVersions)> = Vec::new();
        for stage in stages {
            let versions = versions_at(stage)?;
            if changes.last().map_or(true, |(_, last)| *last != versions) {
                changes.push((stage, versions));
            }
        }
        changes.reverse();
        debug!(nchanges = changes.len(), "Collected stage versions");
        Ok(changes)
    }
}

/// Harness version cards added around the pipeline's own.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HarnessVersions {
    pub version: String,
}

impl Default for HarnessVersions {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl HarnessVersions {
    pub fn new(version: &str) -> Self {
        Self {
            version: version.to_string(),
        }
    }

    /// Add harness cards to a pipeline version header: a comment and the
    /// global version first, a per-stage card before each pipeline stage card
    /// and a dependency pair after the last one. Already decorated headers are
    /// returned unchanged.
    pub fn decorate(&self, header: &Header) -> Header {
        if header.contains(HARNESS_VERSION_KEY) {
            return header.clone();
        }
        let mut out = Header::new();
        let comment = format!("{HARNESS_MODULE} running {PIPELINE_MODULE}");
        out.push(COMMENT_KEY, &comment, Some(&comment));
        out.push(
            HARNESS_VERSION_KEY,
            &self.version,
            Some(&format!("{HARNESS_MODULE} version")),
        );

        let last_depver = header
            .cards()
            .iter()
            .rposition(|c| c.key.starts_with(DEPVER_PREFIX));
        let next_dep = last_depver
            .and_then(|i| header.cards()[i].key[DEPVER_PREFIX.len()..].parse::<u32>().ok())
            .map_or(0, |i| i + 1);

        for (i, card) in header.cards().iter().enumerate() {
            if let Some(stage) = card
                .key
                .strip_prefix(PIPELINE_STAGE_PREFIX)
                .and_then(Stage::from_short)
            {
                out.push(
                    &stage.harness_key(),
                    &self.version,
                    Some(&format!("{HARNESS_MODULE} version for stage_{}", stage.name())),
                );
            }
            out.push(&card.key, &card.value, card.comment.as_deref());
            if Some(i) == last_depver {
                self.push_dependency(&mut out, next_dep);
            }
        }
        if last_depver.is_none() {
            self.push_dependency(&mut out, next_dep);
        }
        out
    }

    fn push_dependency(&self, header: &mut Header, index: u32) {
        header.push(&format!("{DEPNAM_PREFIX}{index:02}"), HARNESS_MODULE, None);
        header.push(&format!("{DEPVER_PREFIX}{index:02}"), &self.version, None);
    }
}
