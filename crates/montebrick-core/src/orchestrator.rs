//! One injection pass over one brick: choose the sources, resolve their
//! collisions, reduce the brick with them injected and record what came back.

use std::fmt;
use std::path::PathBuf;

use tracing::{debug, error, info, warn};

use crate::catalog::{match_one_to_one, read_catalog, resolve_collisions, write_catalog, SimCatalog};
use crate::config::SimConfig;
use crate::consts::ARCSEC_PER_DEGREE;
use crate::error::{MonteBrickError, Result};
use crate::header::Header;
use crate::inject::SimImageHook;
use crate::layout::OutputLayout;
use crate::pipeline::{BrickRequest, ReductionPipeline};
use crate::simid::SimId;
use crate::versions::{EnvironmentManager, HarnessVersions, HeaderVersions};

const PRODTYPE_KEY: &str = "PRODTYPE";
const PRODTYPE_INJECTED: &str = "injected";

/// How the candidate set of a pass was obtained.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PassKind {
    /// No candidate catalog: plain reduction, empty injected catalog.
    NoInput,
    /// Pass 0 over a window of the candidate catalog.
    Fresh,
    /// Collided rows of the previous pass.
    Followup,
    /// Injected catalog of an earlier run of this very pass.
    Resumed,
}

impl fmt::Display for PassKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PassKind::NoInput => write!(f, "no-input"),
            PassKind::Fresh => write!(f, "fresh"),
            PassKind::Followup => write!(f, "follow-up"),
            PassKind::Resumed => write!(f, "resumed"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct RunSummary {
    pub brickname: String,
    pub simid: SimId,
    pub kind: PassKind,
    pub injected_path: PathBuf,
    pub tractor_path: PathBuf,
    pub n_sources: usize,
    pub n_collided: usize,
    /// Accepted sources matched to a fitted source.
    pub n_recovered: usize,
    pub n_fitted: usize,
}

/// Result of a pass. Finding nothing to do is a clean completion.
#[derive(Clone, Debug, PartialEq)]
pub enum RunOutcome {
    Completed(RunSummary),
    NothingToDo(String),
}

/// Run one pass as configured. When `env_header` is set, the environment of
/// that earlier run is applied for the duration of the pass.
pub fn run_brick(config: &SimConfig, pipeline: &dyn ReductionPipeline) -> Result<RunOutcome> {
    config.validate()?;
    let _guard = match &config.env_header {
        Some(path) => {
            let versions = HeaderVersions::read(path)?;
            Some(EnvironmentManager::from_header(&versions).enter()?)
        }
        None => None,
    };
    run_pass(config, pipeline)
}

fn run_pass(config: &SimConfig, pipeline: &dyn ReductionPipeline) -> Result<RunOutcome> {
    let brick = config.brickname.as_str();
    let layout = config.layout();
    let injected_path = layout.injected(brick);
    info!(
        brick,
        simid = %layout.simid,
        force = config.force,
        sim_blobs = config.sim_blobs,
        "Starting injection pass"
    );

    let (kind, mut catalog) = if config.force || !injected_path.exists() {
        let (kind, mut catalog) = select_sources(config, &layout)?;
        let radius = config.selection.col_radius_arcsec;
        let collided = if radius > 0.0 {
            resolve_collisions(&catalog.sources, radius / ARCSEC_PER_DEGREE)
        } else {
            vec![false; catalog.len()]
        };
        for (source, collided) in catalog.sources.iter_mut().zip(collided) {
            source.collided = collided;
        }
        (kind, catalog)
    } else {
        info!(path = %injected_path.display(), "Reading existing injected catalog");
        (PassKind::Resumed, read_catalog(&injected_path)?)
    };
    let n_collided = catalog.n_collided();
    info!(
        kind = %kind,
        nsources = catalog.len(),
        ncollided = n_collided,
        "Selected sources"
    );

    let accepted: Vec<usize> = (0..catalog.len())
        .filter(|&i| !catalog.sources[i].collided)
        .collect();
    let blob_radec = if config.sim_blobs {
        if accepted.is_empty() {
            catalog.header = Header::new();
            write_catalog(&injected_path, &catalog)?;
            return Ok(RunOutcome::NothingToDo(format!(
                "no sources to inject into brick {brick} for {}",
                layout.simid
            )));
        }
        Some(
            accepted
                .iter()
                .map(|&i| (catalog.sources[i].ra, catalog.sources[i].dec))
                .collect(),
        )
    } else {
        None
    };

    let sources = accepted.iter().map(|&i| catalog.sources[i].clone()).collect();
    let hook = SimImageHook::new(
        sources,
        config.injection.strategy,
        config.injection.stamp_size,
        config.injection.noise,
        config.injection.image_eq_model,
    )
    .with_versions(HarnessVersions::default());
    let request = BrickRequest {
        brickname: brick.to_string(),
        tractor_path: layout.tractor(brick),
        blob_radec,
    };
    let output = pipeline
        .run_brick(&request, &hook)
        .inspect_err(|e| error!(brick, error = %e, "Reduction pipeline failed"))?;

    // Each fitted source is credited to at most one injected row.
    let targets: Vec<(f64, f64)> = accepted
        .iter()
        .map(|&i| (catalog.sources[i].ra, catalog.sources[i].dec))
        .collect();
    let fitted: Vec<(f64, f64)> = output.sources.iter().map(|s| (s.ra, s.dec)).collect();
    let radius = config.match_radius_arcsec / ARCSEC_PER_DEGREE;
    let matches = match_one_to_one(&targets, &fitted, radius);
    let mut n_recovered = 0;
    for (&i, matched) in accepted.iter().zip(matches) {
        let source = &mut catalog.sources[i];
        source.fit = matched.map(|j| output.sources[j].clone());
        match &source.fit {
            Some(_) => n_recovered += 1,
            None => debug!(id = source.id, "Injected source not recovered"),
        }
    }
    if n_recovered < accepted.len() {
        warn!(
            naccepted = accepted.len(),
            nrecovered = n_recovered,
            "Not every injected source was recovered"
        );
    }

    catalog.header = output.version_header;
    catalog.header.set(PRODTYPE_KEY, PRODTYPE_INJECTED);
    write_catalog(&injected_path, &catalog)?;
    info!(path = %injected_path.display(), "Wrote injected catalog");

    Ok(RunOutcome::Completed(RunSummary {
        brickname: brick.to_string(),
        simid: layout.simid,
        kind,
        injected_path,
        tractor_path: request.tractor_path,
        n_sources: catalog.len(),
        n_collided,
        n_recovered,
        n_fitted: output.sources.len(),
    }))
}

fn select_sources(config: &SimConfig, layout: &OutputLayout) -> Result<(PassKind, SimCatalog)> {
    let brick = config.brickname.as_str();
    if let Some(previous) = layout.simid.previous() {
        let path = layout.with_simid(previous).injected(brick);
        if !path.exists() {
            return Err(MonteBrickError::Config(format!(
                "pass {} needs the injected catalog of pass {previous}: {} does not exist",
                layout.simid,
                path.display()
            )));
        }
        info!(path = %path.display(), "Reading collided sources of previous pass");
        let mut catalog = read_catalog(&path)?;
        catalog.retain_collided();
        for source in &mut catalog.sources {
            source.fit = None;
        }
        return Ok((PassKind::Followup, catalog));
    }

    let Some(path) = &config.injected_fn else {
        info!("No candidate catalog given, injecting nothing");
        return Ok((PassKind::NoInput, SimCatalog::new(Vec::new())));
    };
    let mut catalog = read_catalog(path)?;
    catalog.fill_defaults(config.selection.seed);
    catalog.cut_to_brick(brick);
    let in_brick = catalog.len();
    catalog.window(config.selection.rowstart, config.selection.nobj.unwrap_or(usize::MAX));
    debug!(in_brick, selected = catalog.len(), "Windowed candidate catalog");
    Ok((PassKind::Fresh, catalog))
}
