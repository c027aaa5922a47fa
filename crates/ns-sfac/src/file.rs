//! Correction-table documents on disk.
//!
//! A table file is a JSON document holding named objects, each tagged with a
//! `class`:
//! ```text
//! { "objects": {
//!     "NUM_TightID_DEN_genTracks_abseta_pt_ratio": {
//!         "class": "TH2F",
//!         "title": "...",                        (optional)
//!         "x_axis": { "edges": [0.0, 0.9, 1.2, 2.1, 2.4] },
//!         "y_axis": { "n_bins": 3, "min": 20.0, "max": 120.0 },
//!         "content": [[...nx...], ...ny rows...],
//!         "errors":  [[...]]                    (optional, or "sumw2")
//!     },
//!     "muon": { "class": "TDirectory", "objects": { ... } }
//! } }
//! ```
//! Objects inside directories are addressed with `/`-separated paths.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::datasource::DataSource;
use crate::error::{Result, SfError};
use crate::histogram::{Axis, Histogram2D};
use crate::key::KeyInfo;

/// Top-level document layout.
#[derive(Deserialize)]
struct Document {
    objects: Map<String, Value>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StoredAxis {
    Variable { edges: Vec<f64> },
    Uniform { n_bins: usize, min: f64, max: f64 },
}

#[derive(Deserialize)]
struct StoredTh2 {
    #[serde(default)]
    title: String,
    x_axis: StoredAxis,
    y_axis: StoredAxis,
    content: Vec<Vec<f64>>,
    #[serde(default)]
    errors: Option<Vec<Vec<f64>>>,
    #[serde(default)]
    sumw2: Option<Vec<Vec<f64>>>,
}

/// A parsed table file holding 2-D correction tables.
///
/// The document is parsed once when the file is opened; the file mapping is
/// released as soon as parsing finishes.
pub struct TableFile {
    /// Parsed object tree.
    doc: Document,
    /// Path for diagnostics.
    path: PathBuf,
}

impl TableFile {
    /// Open and parse a table file from disk using memory mapping.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let data = DataSource::map(&path)?;
        Self::from_datasource(data, path)
    }

    /// Parse a table file from a byte vector (for testing).
    pub fn from_bytes(data: Vec<u8>, path: PathBuf) -> Result<Self> {
        Self::from_datasource(DataSource::Owned(data), path)
    }

    fn from_datasource(data: DataSource, path: PathBuf) -> Result<Self> {
        let doc: Document = data.parse()?;
        log::debug!(
            "parsed table file {} ({} bytes, mapped={}, {} top-level objects)",
            path.display(),
            data.bytes().len(),
            data.is_mapped(),
            doc.objects.len()
        );
        Ok(Self { doc, path })
    }

    /// Path this file was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// List all objects, descending into directories.
    pub fn list_keys(&self) -> Result<Vec<KeyInfo>> {
        let mut keys = Vec::new();
        collect_keys("", &self.doc.objects, &mut keys)?;
        Ok(keys)
    }

    /// Get a 2-D table by its full path (e.g. `"muon/NUM_..._abseta_pt_ratio"`).
    pub fn get_table(&self, path: &str) -> Result<Histogram2D> {
        let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let Some((&leaf, dirs)) = parts.split_last() else {
            return Err(SfError::ObjectNotFound(path.to_string()));
        };

        let mut current = &self.doc.objects;
        for &part in dirs {
            let obj = current
                .get(part)
                .ok_or_else(|| SfError::ObjectNotFound(format!("{} (in path {})", part, path)))?;
            let class = class_of(part, obj)?;
            if class != "TDirectory" && class != "TDirectoryFile" {
                return Err(SfError::Deserialization(format!(
                    "'{}' is not a directory (class: {})",
                    part, class
                )));
            }
            current = directory_objects(part, obj)?;
        }

        let obj = current.get(leaf).ok_or_else(|| {
            SfError::ObjectNotFound(format!("{} (in file {})", path, self.path.display()))
        })?;
        match class_of(leaf, obj)? {
            "TH2F" | "TH2D" => {
                let stored = StoredTh2::deserialize(obj)?;
                let h = build_histogram(leaf, stored)?;
                log::debug!(
                    "read table '{}' ({}x{} bins) from {}",
                    path,
                    h.x_axis().n_bins(),
                    h.y_axis().n_bins(),
                    self.path.display()
                );
                Ok(h)
            }
            other => Err(SfError::UnsupportedClass(format!("{} ({})", other, path))),
        }
    }
}

fn class_of<'a>(name: &str, obj: &'a Value) -> Result<&'a str> {
    obj.get("class")
        .and_then(Value::as_str)
        .ok_or_else(|| SfError::Deserialization(format!("object '{}' has no class", name)))
}

fn directory_objects<'a>(name: &str, obj: &'a Value) -> Result<&'a Map<String, Value>> {
    obj.get("objects").and_then(Value::as_object).ok_or_else(|| {
        SfError::Deserialization(format!("directory '{}' has no object list", name))
    })
}

fn collect_keys(prefix: &str, objects: &Map<String, Value>, out: &mut Vec<KeyInfo>) -> Result<()> {
    for (name, obj) in objects {
        let key = KeyInfo::new(prefix, name, class_of(name, obj)?);
        let is_dir = key.is_directory();
        let path = key.name.clone();
        out.push(key);
        if is_dir {
            collect_keys(&path, directory_objects(name, obj)?, out)?;
        }
    }
    Ok(())
}

fn build_histogram(name: &str, stored: StoredTh2) -> Result<Histogram2D> {
    let x_axis = build_axis(stored.x_axis)?;
    let y_axis = build_axis(stored.y_axis)?;
    let (nx, ny) = (x_axis.n_bins(), y_axis.n_bins());

    let content = flatten_bins(name, "content", stored.content, nx, ny)?;
    let h = Histogram2D::new(name, x_axis, y_axis, content)?.with_title(stored.title);

    match (stored.errors, stored.sumw2) {
        (Some(_), Some(_)) => Err(SfError::Deserialization(format!(
            "{}: both 'errors' and 'sumw2' given",
            name
        ))),
        (Some(errors), None) => h.with_errors(flatten_bins(name, "errors", errors, nx, ny)?),
        (None, Some(sumw2)) => h.with_sumw2(flatten_bins(name, "sumw2", sumw2, nx, ny)?),
        (None, None) => Ok(h),
    }
}

fn build_axis(stored: StoredAxis) -> Result<Axis> {
    match stored {
        StoredAxis::Variable { edges } => Axis::new(edges),
        StoredAxis::Uniform { n_bins, min, max } => Axis::uniform(n_bins, min, max),
    }
}

/// Flatten `ny` rows of `nx` values into x-fastest order.
fn flatten_bins(
    name: &str,
    field: &str,
    rows: Vec<Vec<f64>>,
    nx: usize,
    ny: usize,
) -> Result<Vec<f64>> {
    if rows.len() != ny {
        return Err(SfError::Deserialization(format!(
            "{}: '{}' has {} rows, expected {} (one per y bin)",
            name,
            field,
            rows.len(),
            ny
        )));
    }
    if let Some((iy, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != nx) {
        return Err(SfError::Deserialization(format!(
            "{}: '{}' row {} has {} values, expected {}",
            name,
            field,
            iy,
            row.len(),
            nx
        )));
    }
    Ok(rows.into_iter().flatten().collect())
}
