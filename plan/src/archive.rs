//! Project archives: a `data.json` manifest plus the raw plan images and
//! marker photos, laid out as a flat path → bytes tree.
//!
//! ```text
//! data.json
//! assets/plans/<plan id>.png
//! assets/markers/<marker id>.jpg
//! ```
//!
//! Turning the tree into an actual file (zip, directory, download) is the
//! job of an [`ArchivePackager`] supplied by the host.

#[cfg(test)]
#[path = "archive_test.rs"]
mod archive_test;

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::decode::{DecodeError, ImageDecoder};
use crate::doc::{FloorPlan, Marker, MarkerStore, PlanId, Project};

/// Archive contents keyed by `/`-separated relative path.
pub type VirtualTree = BTreeMap<String, Vec<u8>>;

/// Manifest format version written by this crate.
pub const ARCHIVE_VERSION: &str = "1.0";

/// Manifest path inside the tree.
pub const DATA_FILE: &str = "data.json";

/// Root folder for binary assets.
const ASSETS_DIR: &str = "assets";

/// Project name used when the user left it blank.
pub const DEFAULT_PROJECT_NAME: &str = "Project";

#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("invalid project file: missing {DATA_FILE}")]
    MissingData,
    #[error("invalid project file: missing asset {0}")]
    MissingAsset(String),
    #[error("unsupported project file version {0}")]
    UnsupportedVersion(String),
    #[error("malformed {DATA_FILE}: {0}")]
    Json(#[from] serde_json::Error),
    #[error("plan image {path} is unreadable: {source}")]
    Decode { path: String, source: DecodeError },
    #[error("packaging failed: {0}")]
    Packager(String),
}

/// Writes a finished tree somewhere durable.
#[async_trait::async_trait]
pub trait ArchivePackager: Send + Sync {
    /// Persist `tree` under `file_name`. Must not leave partial output on failure.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::Packager`] if the output cannot be written.
    async fn pack(&self, file_name: &str, tree: &VirtualTree) -> Result<(), ArchiveError>;
}

/// A named tree ready for packaging.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bundle {
    pub file_name: String,
    pub tree: VirtualTree,
}

/// `data.json` contents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectMeta {
    pub name: String,
    pub floor_plans: Vec<PlanMeta>,
    pub markers: Vec<MarkerMeta>,
    pub version: String,
    /// Highest sequence number ever handed out, so deleted numbers stay retired.
    #[serde(default)]
    pub last_seq: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanMeta {
    pub id: PlanId,
    pub name: String,
    /// Path relative to `assets/`.
    pub file_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkerMeta {
    #[serde(flatten)]
    pub marker: Marker,
    /// Path relative to `assets/`.
    pub image_file_name: String,
}

/// A project restored from an archive.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedProject {
    pub project: Project,
    pub markers: Vec<Marker>,
}

/// Project name, or [`DEFAULT_PROJECT_NAME`] when blank.
#[must_use]
pub fn display_name(name: &str) -> &str {
    if name.trim().is_empty() { DEFAULT_PROJECT_NAME } else { name }
}

/// Replace path separators with `-` so user text stays inside one path component.
#[must_use]
pub fn path_safe(text: &str) -> String {
    text.chars().map(|c| if matches!(c, '/' | '\\') { '-' } else { c }).collect()
}

/// Project name as a single path component. Blank or dots-only names fall
/// back to [`DEFAULT_PROJECT_NAME`].
#[must_use]
pub fn file_stem(name: &str) -> String {
    let stem = path_safe(display_name(name));
    if stem.chars().all(|c| c == '.') { DEFAULT_PROJECT_NAME.to_owned() } else { stem }
}

/// Archive file name for a project: `<name>.siteproj`.
#[must_use]
pub fn project_file_name(name: &str) -> String {
    format!("{}.siteproj", file_stem(name))
}

fn asset_path(relative: &str) -> String {
    format!("{ASSETS_DIR}/{relative}")
}

/// Serialise a project and its markers into an archive bundle.
///
/// # Errors
///
/// Returns [`ArchiveError::Json`] if the manifest cannot be serialised.
pub fn pack_project(project: &Project, markers: &MarkerStore) -> Result<Bundle, ArchiveError> {
    let mut tree = VirtualTree::new();

    let floor_plans = project
        .floor_plans
        .iter()
        .map(|plan| {
            let file_name = format!("plans/{}.png", plan.id);
            tree.insert(asset_path(&file_name), plan.image.to_vec());
            PlanMeta { id: plan.id, name: plan.name.clone(), file_name }
        })
        .collect();

    let markers_meta = markers
        .iter()
        .map(|marker| {
            let image_file_name = format!("markers/{}.jpg", marker.id);
            tree.insert(asset_path(&image_file_name), marker.photo.to_vec());
            MarkerMeta { marker: marker.clone(), image_file_name }
        })
        .collect();

    let meta = ProjectMeta {
        name: project.name.clone(),
        floor_plans,
        markers: markers_meta,
        version: ARCHIVE_VERSION.to_owned(),
        last_seq: markers.seq_high_water().max(project.seq_high_water),
    };
    tree.insert(DATA_FILE.to_owned(), serde_json::to_vec(&meta)?);

    Ok(Bundle { file_name: project_file_name(&project.name), tree })
}

/// Rebuild a project from an archive tree.
///
/// Plan images are re-measured with `decoder`. A missing or unreadable plan
/// image aborts the load. Markers whose photo is missing, or whose plan does
/// not exist, are dropped with a warning.
///
/// # Errors
///
/// Returns an [`ArchiveError`] if the manifest is missing or malformed, the
/// version is unsupported, or a plan image is missing or unreadable.
pub fn unpack_project<D>(tree: &VirtualTree, decoder: &D) -> Result<LoadedProject, ArchiveError>
where
    D: ImageDecoder + ?Sized,
{
    let data = tree.get(DATA_FILE).ok_or(ArchiveError::MissingData)?;
    let meta: ProjectMeta = serde_json::from_slice(data)?;
    if !meta.version.starts_with("1.") {
        return Err(ArchiveError::UnsupportedVersion(meta.version));
    }

    let mut floor_plans = Vec::with_capacity(meta.floor_plans.len());
    for plan in meta.floor_plans {
        let path = asset_path(&plan.file_name);
        let bytes = tree.get(&path).ok_or_else(|| ArchiveError::MissingAsset(path.clone()))?;
        let size = decoder.dimensions(bytes).map_err(|source| ArchiveError::Decode { path, source })?;
        floor_plans.push(FloorPlan { id: plan.id, name: plan.name, image: Arc::from(bytes.as_slice()), size: Some(size) });
    }

    let mut markers = Vec::with_capacity(meta.markers.len());
    for MarkerMeta { mut marker, image_file_name } in meta.markers {
        if marker.plan_index >= floor_plans.len() {
            warn!(marker = marker.id, plan_index = marker.plan_index, "marker references missing plan; skipped");
            continue;
        }
        let Some(photo) = tree.get(&asset_path(&image_file_name)) else {
            warn!(marker = marker.id, file = %image_file_name, "marker photo missing; skipped");
            continue;
        };
        marker.photo = Arc::from(photo.as_slice());
        markers.push(marker);
    }

    let max_seq = markers.iter().map(|m| m.seq).max().unwrap_or(0);
    let project = Project { name: meta.name, floor_plans, seq_high_water: meta.last_seq.max(max_seq) };
    Ok(LoadedProject { project, markers })
}
