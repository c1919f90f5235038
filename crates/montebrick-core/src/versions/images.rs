use std::collections::BTreeSet;

use crate::error::{MonteBrickError, Result};

use super::{HeaderVersions, Stage, PIPELINE_MODULE};

/// A packaged distribution and the module versions it ships.
#[derive(Clone, Copy, Debug)]
pub struct DistributionImage {
    pub name: &'static str,
    pub modules: &'static [(&'static str, &'static str)],
}

/// Known distributions, oldest first. Names may repeat when a distribution
/// was rebuilt with different dependencies.
pub static DISTRIBUTION_IMAGES: &[DistributionImage] = &[
    DistributionImage {
        name: "DR9.6.2",
        modules: &[("astrometry", "0.82"), ("tractor", "dr9.4"), ("legacypipe", "DR9.6.2")],
    },
    DistributionImage {
        name: "DR9.6.4",
        modules: &[("astrometry", "0.80-14-gf7363e4c"), ("tractor", "dr9.3"), ("legacypipe", "DR9.6.4")],
    },
    DistributionImage {
        name: "DR9.6.5",
        modules: &[("astrometry", "0.80-14-gf7363e4c"), ("tractor", "dr9.3"), ("legacypipe", "DR9.6.5")],
    },
    DistributionImage {
        name: "DR9.6.5b",
        modules: &[
            ("astrometry", "0.80-14-gf7363e4c"),
            ("tractor", "dr9.3"),
            ("legacypipe", "DR9.6.5-4-gbb698724"),
        ],
    },
    DistributionImage {
        name: "DR9.6.6",
        modules: &[("astrometry", "0.83"), ("tractor", "dr9.4"), ("legacypipe", "DR9.6.6")],
    },
    DistributionImage {
        name: "DR9.6.7",
        modules: &[("astrometry", "0.83"), ("tractor", "dr9.4"), ("legacypipe", "DR9.6.7")],
    },
    DistributionImage {
        name: "DR9.6.7",
        modules: &[("astrometry", "0.83-1-g4a4c1bfe"), ("tractor", "dr9.4"), ("legacypipe", "DR9.6.7")],
    },
    DistributionImage {
        name: "DR9.6.7b",
        modules: &[("astrometry", "0.84"), ("tractor", "dr9.4"), ("legacypipe", "DR9.6.7")],
    },
    DistributionImage {
        name: "DR9.6.8",
        modules: &[("astrometry", "0.84-15-g48bdcb08"), ("tractor", "dr9.4"), ("legacypipe", "DR9.6.8")],
    },
    DistributionImage {
        name: "DR9.6.9",
        modules: &[("astrometry", "0.84-15-g48bdcb08"), ("tractor", "dr9.5"), ("legacypipe", "DR9.6.9")],
    },
];

/// Most recent distribution matching the versions recorded for `stage`.
///
/// All modules must match when `stage` is `tims` or the pipeline version
/// did not change up to `stage`; otherwise dependency versions (recorded once
/// at the start of the run) are unreliable and only the pipeline is compared.
pub fn match_image(versions: &HeaderVersions, stage: Stage) -> Result<&'static str> {
    let mut check_all = stage == Stage::Tims;
    if !check_all {
        let mut seen = BTreeSet::new();
        for s in Stage::ALL {
            if s == stage {
                seen.insert(versions.module_version(PIPELINE_MODULE, s)?);
                break;
            }
            // Optional stages (wise_forced) may be missing.
            if let Ok(version) = versions.module_version(PIPELINE_MODULE, s) {
                seen.insert(version);
            }
        }
        check_all = seen.len() == 1;
    }

    for image in DISTRIBUTION_IMAGES.iter().rev() {
        let matches = image
            .modules
            .iter()
            .filter(|(module, _)| check_all || *module == PIPELINE_MODULE)
            .all(|(module, version)| {
                versions
                    .module_version(module, stage)
                    .is_ok_and(|v| v == *version)
            });
        if matches {
            return Ok(image.name);
        }
    }

    let modules = if check_all {
        DISTRIBUTION_IMAGES
            .first()
            .map(|image| image.modules.iter().map(|(m, _)| m.to_string()).collect())
            .unwrap_or_default()
    } else {
        vec![PIPELINE_MODULE.to_string()]
    };
    Err(MonteBrickError::NoMatchingImage {
        stage: stage.name().to_string(),
        modules,
    })
}
