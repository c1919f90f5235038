use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::{MonteBrickError, Result};

use super::HeaderVersions;

enum PathKind {
    File,
    Dir,
    /// Colon-separated list of directories.
    DirList,
}

impl PathKind {
    fn is_valid(&self, value: &str) -> bool {
        match self {
            PathKind::File => Path::new(value).is_file(),
            PathKind::Dir => Path::new(value).is_dir(),
            PathKind::DirList => value.split(':').all(|p| Path::new(p).is_dir()),
        }
    }
}

/// Environment variable, the dependency name it is recorded under, and what
/// its value must point to.
const TRACKED_VARIABLES: [(&str, &str, PathKind); 8] = [
    ("LARGEGALAXIES_CAT", "LARGEGALAXIES_CAT", PathKind::File),
    ("TYCHO2_KD_DIR", "TYCHO2_KD", PathKind::Dir),
    ("GAIA_CAT_DIR", "GAIA_CAT", PathKind::Dir),
    ("SKY_TEMPLATE_DIR", "SKY_TEMPLATE", PathKind::Dir),
    ("GALEX_DIR", "galex", PathKind::Dir),
    ("UNWISE_COADDS_DIR", "unwise", PathKind::DirList),
    ("UNWISE_COADDS_TIMERESOLVED_DIR", "unwise_tr", PathKind::Dir),
    ("UNWISE_MODEL_SKY_DIR", "unwise_modelsky", PathKind::Dir),
];

/// External data locations of a prior run, recovered from its version
/// header and applied to the process environment for the duration of a
/// guard.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EnvironmentManager {
    environ: Vec<(String, String)>,
}

impl EnvironmentManager {
    pub fn from_header(versions: &HeaderVersions) -> Self {
        let mut environ = Vec::new();
        for (name, dependency, _) in &TRACKED_VARIABLES {
            if let Some(value) = versions.dependency(dependency) {
                info!(name, value, "Setting environment variable");
                environ.push((name.to_string(), value.to_string()));
            }
        }
        Self { environ }
    }

    /// Variables and values this manager applies, in table order.
    pub fn environ(&self) -> &[(String, String)] {
        &self.environ
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.environ
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Replace values that do not point to an existing file or directory by
    /// the current process value. Fails when there is none.
    pub fn check_environ(&mut self) -> Result<()> {
        for (name, value) in &mut self.environ {
            let Some((_, _, kind)) = TRACKED_VARIABLES.iter().find(|(n, _, _)| *n == name.as_str()) else {
                continue;
            };
            if kind.is_valid(value) {
                continue;
            }
            let Ok(current) = env::var(name.as_str()) else {
                return Err(MonteBrickError::InvalidEnvironment {
                    name: name.clone(),
                    value: value.clone(),
                });
            };
            warn!(name = %name, value = %value, "Header value is not valid");
            warn!(name = %name, value = %current, "Falling back to the environment value");
            *value = current;
        }
        Ok(())
    }

    /// Validate, then apply the variables until the returned guard drops.
    pub fn enter(mut self) -> Result<EnvGuard> {
        let saved: Vec<(OsString, OsString)> = env::vars_os().collect();
        self.check_environ()?;
        for (name, value) in &self.environ {
            env::set_var(name, value);
        }
        Ok(EnvGuard { saved })
    }
}

/// Restores the process environment captured by [`EnvironmentManager::enter`]
/// when dropped, including during unwinding.
pub struct EnvGuard {
    saved: Vec<(OsString, OsString)>,
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (name, _) in env::vars_os() {
            if !self.saved.iter().any(|(n, _)| *n == name) {
                env::remove_var(&name);
            }
        }
        for (name, value) in &self.saved {
            env::set_var(name, value);
        }
    }
}

/// Module search path pinning each `(module, version)` to
/// `module_dir/<module>_<version>`, with a `py` subdirectory for Python
/// packages. Later modules come first. Entries of `inherited` (a
/// colon-separated path) not already present are appended.
pub fn module_search_path(
    module_dir: &Path,
    versions: &[(String, String)],
    inherited: Option<&str>,
) -> Result<Vec<PathBuf>> {
    let mut paths: Vec<PathBuf> = Vec::new();
    for (module, version) in versions {
        let mut path = module_dir.join(format!("{module}_{version}"));
        if matches!(module.as_str(), "legacypipe" | "unwise_psf") {
            path.push("py");
        }
        if !path.is_dir() {
            return Err(MonteBrickError::Config(format!(
                "No directory found in {}",
                path.display()
            )));
        }
        paths.insert(0, path);
    }
    if let Some(inherited) = inherited {
        for entry in inherited.split(':').filter(|e| !e.is_empty()) {
            let entry = PathBuf::from(entry);
            if !paths.contains(&entry) {
                paths.push(entry);
            }
        }
    }
    Ok(paths)
}
