use std::{
    io,
    path::{Path, PathBuf},
};

use axum::{
    extract::{
        multipart::{Field, MultipartError, MultipartRejection},
        Multipart, State,
    },
    http::StatusCode,
    Json,
};
use humansize::{format_size, BINARY};
use serde::Serialize;
use tokio::{
    fs::{self, File, OpenOptions},
    io::AsyncWriteExt,
};
use tracing::{info, warn};

use crate::{
    error::ShareError,
    history::{UploadRecord, HISTORY_FILE_NAME},
    router::SharedState,
    sanitize::{base_name, sanitize_filename},
};

/// Upper bound on a whole upload request body.
pub const MAX_UPLOAD_BYTES: usize = 32 * 1024 * 1024;

const UPLOAD_FIELD: &str = "file";
const MAX_SUFFIX_ATTEMPTS: u32 = 1000;
/// Longest file name, in bytes, common filesystems accept.
const MAX_NAME_BYTES: usize = 255;

#[derive(Serialize, Debug)]
pub struct UploadResponse {
    pub message: String,
    pub name: String,
    pub size: u64,
    pub uploaded_at: String,
    pub code: u16,
}

/// Accepts the multipart `file` field and stores it in the shared directory.
pub async fn upload_handler(
    State(state): State<SharedState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, ShareError> {
    let mut multipart =
        multipart.map_err(|rejection| ShareError::BadRequest(rejection.body_text()))?;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        return store_field(&state, field).await.map(Json);
    }

    Err(ShareError::BadRequest(format!(
        "Missing multipart field '{}'.",
        UPLOAD_FIELD
    )))
}

async fn store_field(state: &SharedState, mut field: Field<'_>) -> Result<UploadResponse, ShareError> {
    let declared = field
        .file_name()
        .ok_or_else(|| ShareError::BadRequest("Upload is missing a filename.".into()))?;
    let safe_name = sanitize_filename(base_name(declared));
    if safe_name.is_empty() || safe_name == "." {
        return Err(ShareError::BadRequest(format!(
            "Invalid filename '{}'.",
            declared
        )));
    }

    let (mut file, name) = create_unique(&state.root_dir, &safe_name)
        .await
        .map_err(|e| match e.kind() {
            io::ErrorKind::InvalidInput => {
                ShareError::BadRequest(format!("Invalid filename '{}': {}.", declared, e))
            }
            _ => ShareError::io("Could not create file.", e),
        })?;
    let path = state.root_dir.join(&name);

    if let Err(e) = write_field(state, &mut field, &mut file).await {
        drop(file);
        if let Err(remove_err) = fs::remove_file(&path).await {
            warn!(
                "Failed to remove partial upload {}: {}",
                path.display(),
                remove_err
            );
        }
        return Err(e);
    }
    drop(file);

    let size = fs::metadata(&path)
        .await
        .map_err(|e| ShareError::io("Could not read uploaded file information.", e))?
        .len();

    let record = UploadRecord::now(&name, size);
    if let Err(e) = state.history.append(record.clone()).await {
        warn!("Failed to record upload of {} in history: {}", name, e);
    }

    info!("Stored upload {} ({})", path.display(), format_size(size, BINARY));
    Ok(UploadResponse {
        message: format!("Uploaded {} ({}).", name, format_size(size, BINARY)),
        name: record.name,
        size: record.size,
        uploaded_at: record.uploaded_at,
        code: StatusCode::OK.as_u16(),
    })
}

async fn write_field(
    state: &SharedState,
    field: &mut Field<'_>,
    file: &mut File,
) -> Result<(), ShareError> {
    loop {
        let chunk = tokio::select! {
            biased;
            _ = state.shutdown.cancelled() => return Err(ShareError::ShuttingDown),
            chunk = field.chunk() => chunk.map_err(multipart_error)?,
        };
        let Some(chunk) = chunk else { break };
        file.write_all(&chunk)
            .await
            .map_err(|e| ShareError::io("Could not save file.", e))?;
    }
    file.flush()
        .await
        .map_err(|e| ShareError::io("Could not save file.", e))
}

fn multipart_error(e: MultipartError) -> ShareError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ShareError::PayloadTooLarge(MAX_UPLOAD_BYTES)
    } else {
        ShareError::BadRequest(e.body_text())
    }
}

/// Creates `name` inside `root_dir`, or the first free `stem (n).ext`
/// variant if it is taken. Creation is exclusive, so concurrent uploads of the
/// same name never share a file. The history file name is never handed out.
/// Names longer than the filesystem allows fail with `InvalidInput`.
pub async fn create_unique(root_dir: &Path, name: &str) -> io::Result<(File, String)> {
    for attempt in 0..MAX_SUFFIX_ATTEMPTS {
        let candidate = if attempt == 0 {
            name.to_string()
        } else {
            suffixed_name(name, attempt)
        };
        if candidate == HISTORY_FILE_NAME {
            continue;
        }
        if candidate.len() > MAX_NAME_BYTES {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("name is longer than {} bytes", MAX_NAME_BYTES),
            ));
        }

        let path: PathBuf = root_dir.join(&candidate);
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => return Ok((file, candidate)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e),
        }
    }
    Err(io::Error::new(
        io::ErrorKind::AlreadyExists,
        format!("no free name for '{}'", name),
    ))
}

/// `report.pdf` -> `report (2).pdf`, `notes` -> `notes (2)`.
fn suffixed_name(name: &str, n: u32) -> String {
    let path = Path::new(name);
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or(name);
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{} ({}).{}", stem, n, ext),
        None => format!("{} ({})", stem, n),
    }
}
