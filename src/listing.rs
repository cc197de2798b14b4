use axum::{
    extract::{Query, State},
    Json,
};
use serde::Serialize;
use tokio::fs;
use tracing::{error, warn};

use crate::{
    download::PathQuery, error::ShareError, paths::resolve_within_root, router::SharedState,
};

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Folder,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
}

#[derive(Serialize, Debug)]
pub struct ListingResponse {
    pub message: &'static str,
    pub list: Vec<DirectoryEntry>,
    pub code: u16,
}

/// Lists the immediate children of `path` (the shared root when empty),
/// sorted by name.
pub async fn list_handler(
    State(state): State<SharedState>,
    Query(query): Query<PathQuery>,
) -> Result<Json<ListingResponse>, ShareError> {
    let requested = query.path.unwrap_or_default();
    let dir = resolve_within_root(&state.root_dir, &requested).await?;

    let metadata = fs::metadata(&dir)
        .await
        .map_err(|e| ShareError::io("Error reading directory.", e))?;
    if !metadata.is_dir() {
        return Err(ShareError::BadRequest(
            "Requested path is not a directory.".into(),
        ));
    }

    let mut entries = fs::read_dir(&dir)
        .await
        .map_err(|e| ShareError::io("Error reading directory contents.", e))?;

    let mut list = Vec::new();
    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(e) => {
                error!("Failed while reading {}: {}", dir.display(), e);
                return Err(ShareError::io("Error reading directory contents.", e));
            }
        };

        let Ok(name) = entry.file_name().into_string() else {
            warn!("Skipping entry with non-UTF8 filename in {}", dir.display());
            continue;
        };

        // Follow symlinks so a linked folder is listed as a folder.
        let is_dir = match fs::metadata(entry.path()).await {
            Ok(meta) => meta.is_dir(),
            Err(_) => entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false),
        };
        list.push(DirectoryEntry {
            name,
            kind: if is_dir { EntryKind::Folder } else { EntryKind::File },
        });
    }

    list.sort_by(|a, b| {
        a.name
            .to_lowercase()
            .cmp(&b.name.to_lowercase())
            .then_with(|| a.name.cmp(&b.name))
    });

    Ok(Json(ListingResponse {
        message: "Directory listing",
        list,
        code: 200,
    }))
}
