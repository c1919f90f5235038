//! CSV persistence of catalogs.
//!
//! A catalog file is the header block (`# KEY = value` lines) followed by a CSV
//! table with a column-name row. Floats are written in shortest round-trip
//! form so that a write/read cycle reproduces every value exactly.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use tracing::debug;

use crate::error::{MonteBrickError, Result};
use crate::header::Header;

use super::{FittedSource, InjectedSource, SimCatalog};

const FLUX_PREFIX: &str = "flux_";
const FLUX_IVAR_PREFIX: &str = "flux_ivar_";
const FIT_PREFIX: &str = "fit_";
const FIT_FLUX_PREFIX: &str = "fit_flux_";
const FIT_FLUX_IVAR_PREFIX: &str = "fit_flux_ivar_";

const SHAPE_COLUMNS: [&str; 4] = ["sersic", "shape_r", "shape_e1", "shape_e2"];

/// Read a catalog file. Missing `id` values default to the row index, missing
/// `seed` values to zero (and the catalog is marked unseeded).
pub fn read_catalog(path: &Path) -> Result<SimCatalog> {
    let header = Header::read_from(BufReader::new(File::open(path)?))?;
    let mut reader = csv::ReaderBuilder::new()
        .comment(Some(b'#'))
        .flexible(false)
        .from_path(path)?;
    let columns: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

    let mut sources = Vec::new();
    let mut seeded = columns.iter().any(|c| c == "seed");
    for (index, record) in reader.records().enumerate() {
        let record = record?;
        let row: BTreeMap<&str, &str> = columns
            .iter()
            .map(String::as_str)
            .zip(record.iter())
            .filter(|(_, v)| !v.is_empty())
            .collect();
        let source = parse_row(&row, index, path)?;
        if !row.contains_key("seed") {
            seeded = false;
        }
        sources.push(source);
    }
    debug!(path = %path.display(), nrows = sources.len(), "Read catalog");
    Ok(SimCatalog {
        header,
        sources,
        seeded,
    })
}

fn parse_row(row: &BTreeMap<&str, &str>, index: usize, path: &Path) -> Result<InjectedSource> {
    let field = |name: &str| -> Result<Option<f64>> {
        row.get(name)
            .map(|v| parse_value(v, name, index, path))
            .transpose()
    };
    let required = |name: &str| -> Result<f64> {
        field(name)?.ok_or_else(|| {
            MonteBrickError::Catalog(format!(
                "{}: row {index}: missing column {name}",
                path.display()
            ))
        })
    };

    let mut source = InjectedSource::point(
        match row.get("id") {
            Some(v) => parse_value(v, "id", index, path)?,
            None => index as i64,
        },
        required("ra")?,
        required("dec")?,
        row.get("brickname").copied().unwrap_or_default(),
    );
    source.sersic = field("sersic")?.unwrap_or(0.0);
    source.shape_r = field("shape_r")?.unwrap_or(0.0);
    source.shape_e1 = field("shape_e1")?.unwrap_or(0.0);
    source.shape_e2 = field("shape_e2")?.unwrap_or(0.0);
    if let Some(v) = row.get("seed") {
        source.seed = parse_value(v, "seed", index, path)?;
    }
    if let Some(v) = row.get("collided") {
        source.collided = parse_bool(v).ok_or_else(|| {
            MonteBrickError::Catalog(format!(
                "{}: row {index}: invalid collided value {v}",
                path.display()
            ))
        })?;
    }

    for (&name, &value) in row {
        // Flux errors of the input catalog are not fluxes: carried through.
        let band = name
            .strip_prefix(FLUX_PREFIX)
            .filter(|_| !name.starts_with(FLUX_IVAR_PREFIX));
        if let Some(band) = band {
            source
                .flux
                .insert(band.to_string(), parse_value(value, name, index, path)?);
        } else if !name.starts_with(FIT_PREFIX) && !is_core_column(name) {
            source.extra.insert(name.to_string(), value.to_string());
        }
    }

    if row.contains_key("fit_ra") {
        let mut fit = FittedSource {
            ra: required("fit_ra")?,
            dec: required("fit_dec")?,
            ra_ivar: field("fit_ra_ivar")?.unwrap_or(0.0),
            dec_ivar: field("fit_dec_ivar")?.unwrap_or(0.0),
            model_type: row.get("fit_type").copied().unwrap_or_default().to_string(),
            sersic: field("fit_sersic")?.unwrap_or(0.0),
            shape_r: field("fit_shape_r")?.unwrap_or(0.0),
            flux: BTreeMap::new(),
            flux_ivar: BTreeMap::new(),
        };
        for (&name, &value) in row {
            if let Some(band) = name.strip_prefix(FIT_FLUX_IVAR_PREFIX) {
                fit.flux_ivar
                    .insert(band.to_string(), parse_value(value, name, index, path)?);
            } else if let Some(band) = name.strip_prefix(FIT_FLUX_PREFIX) {
                fit.flux
                    .insert(band.to_string(), parse_value(value, name, index, path)?);
            }
        }
        source.fit = Some(fit);
    }
    Ok(source)
}

fn is_core_column(name: &str) -> bool {
    matches!(name, "id" | "ra" | "dec" | "brickname" | "seed" | "collided")
        || SHAPE_COLUMNS.contains(&name)
}

fn parse_value<T: std::str::FromStr>(value: &str, name: &str, index: usize, path: &Path) -> Result<T> {
    value.trim().parse().map_err(|_| {
        MonteBrickError::Catalog(format!(
            "{}: row {index}: invalid {name} value {value}",
            path.display()
        ))
    })
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim() {
        "true" | "True" | "TRUE" | "T" | "1" => Some(true),
        "false" | "False" | "FALSE" | "F" | "0" => Some(false),
        _ => None,
    }
}

/// Write a catalog file, creating parent directories as needed.
pub fn write_catalog(path: &Path, catalog: &SimCatalog) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut out = BufWriter::new(File::create(path)?);
    catalog.header.write_to(&mut out)?;

    let bands = catalog.bands();
    let extra: BTreeSet<&str> = catalog
        .sources
        .iter()
        .flat_map(|s| s.extra.keys().map(String::as_str))
        .collect();
    let fit_bands: BTreeSet<&str> = catalog
        .sources
        .iter()
        .filter_map(|s| s.fit.as_ref())
        .flat_map(|f| f.flux.keys().chain(f.flux_ivar.keys()).map(String::as_str))
        .collect();
    let with_fit = catalog.sources.iter().any(|s| s.fit.is_some());

    let mut columns: Vec<String> = ["id", "ra", "dec", "brickname"]
        .iter()
        .chain(SHAPE_COLUMNS.iter())
        .map(|c| c.to_string())
        .collect();
    columns.extend(bands.iter().map(|b| format!("{FLUX_PREFIX}{b}")));
    columns.push("seed".to_string());
    columns.push("collided".to_string());
    columns.extend(extra.iter().map(|c| c.to_string()));
    if with_fit {
        for c in [
            "fit_type",
            "fit_ra",
            "fit_dec",
            "fit_ra_ivar",
            "fit_dec_ivar",
            "fit_sersic",
            "fit_shape_r",
        ] {
            columns.push(c.to_string());
        }
        columns.extend(fit_bands.iter().map(|b| format!("{FIT_FLUX_PREFIX}{b}")));
        columns.extend(fit_bands.iter().map(|b| format!("{FIT_FLUX_IVAR_PREFIX}{b}")));
    }

    let mut writer = csv::Writer::from_writer(&mut out);
    writer.write_record(&columns)?;
    for source in &catalog.sources {
        let mut record: Vec<String> = vec![
            source.id.to_string(),
            source.ra.to_string(),
            source.dec.to_string(),
            source.brickname.clone(),
            source.sersic.to_string(),
            source.shape_r.to_string(),
            source.shape_e1.to_string(),
            source.shape_e2.to_string(),
        ];
        record.extend(bands.iter().map(|b| optional(source.flux.get(b))));
        record.push(source.seed.to_string());
        record.push(source.collided.to_string());
        record.extend(
            extra
                .iter()
                .map(|c| source.extra.get(*c).cloned().unwrap_or_default()),
        );
        if with_fit {
            match &source.fit {
                Some(fit) => {
                    record.push(fit.model_type.clone());
                    for v in [
                        fit.ra,
                        fit.dec,
                        fit.ra_ivar,
                        fit.dec_ivar,
                        fit.sersic,
                        fit.shape_r,
                    ] {
                        record.push(v.to_string());
                    }
                    record.extend(fit_bands.iter().map(|b| optional(fit.flux.get(*b))));
                    record.extend(fit_bands.iter().map(|b| optional(fit.flux_ivar.get(*b))));
                }
                None => record.resize(record.len() + 7 + 2 * fit_bands.len(), String::new()),
            }
        }
        writer.write_record(&record)?;
    }
    writer.flush()?;
    drop(writer);
    out.flush()?;
    debug!(path = %path.display(), nrows = catalog.len(), "Wrote catalog");
    Ok(())
}

fn optional(value: Option<&f64>) -> String {
    value.map(f64::to_string).unwrap_or_default()
}
