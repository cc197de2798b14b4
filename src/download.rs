use std::{io, time::Duration};

use axum::{
    body::{Body, Bytes},
    extract::{Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use futures_util::{stream, Stream, StreamExt};
use serde::Deserialize;
use tokio_util::{io::ReaderStream, sync::CancellationToken};
use tracing::{info, warn};

use crate::{error::ShareError, paths::resolve_within_root, router::SharedState};

#[derive(Deserialize, Debug)]
pub struct PathQuery {
    pub path: Option<String>,
}

/// Streams a file under the shared directory as an attachment.
pub async fn download_handler(
    State(state): State<SharedState>,
    Query(query): Query<PathQuery>,
) -> Result<Response, ShareError> {
    let requested = query
        .path
        .filter(|p| !p.is_empty())
        .ok_or_else(|| ShareError::BadRequest("Missing 'path' parameter.".into()))?;

    let path = resolve_within_root(&state.root_dir, &requested).await?;
    let metadata = tokio::fs::metadata(&path)
        .await
        .map_err(|e| ShareError::io("Could not read file information for download.", e))?;
    if !metadata.is_file() {
        return Err(ShareError::NotFound("File not found.".into()));
    }

    let file = tokio::fs::File::open(&path)
        .await
        .map_err(|e| ShareError::io("Could not read file for download.", e))?;

    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "download".to_string());
    let mime_type = mime_guess::from_path(&path).first_or_octet_stream();

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(mime_type.as_ref())
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(metadata.len()));
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_str(&content_disposition(&filename))
            .unwrap_or_else(|_| HeaderValue::from_static("attachment; filename=\"download\"")),
    );

    info!("Serving download {}", path.display());
    let body = Body::from_stream(until_shutdown(
        ReaderStream::new(file),
        state.shutdown.clone(),
        state.shutdown_grace,
    ));
    Ok((StatusCode::OK, headers, body).into_response())
}

/// Passes `body` through until `shutdown` has been cancelled for `grace`, then
/// ends it with an error so the connection is dropped mid-transfer.
pub fn until_shutdown<S>(
    body: S,
    shutdown: CancellationToken,
    grace: Duration,
) -> impl Stream<Item = io::Result<Bytes>>
where
    S: Stream<Item = io::Result<Bytes>> + Unpin,
{
    let deadline = Box::pin(async move {
        shutdown.cancelled().await;
        tokio::time::sleep(grace).await;
    });
    stream::unfold(Some((body, deadline)), move |state| async move {
        let (mut body, mut deadline) = state?;
        tokio::select! {
            biased;
            _ = &mut deadline => {
                warn!("Cutting off download still running {:?} after shutdown", grace);
                let err = io::Error::new(io::ErrorKind::ConnectionAborted, "server is shutting down");
                Some((Err(err), None))
            }
            chunk = body.next() => chunk.map(|chunk| (chunk, Some((body, deadline)))),
        }
    })
}

/// `attachment` disposition with an ASCII fallback name and the exact name in
/// RFC 5987 form.
pub fn content_disposition(filename: &str) -> String {
    let fallback: String = filename
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_ascii() && !c.is_ascii_control() => c,
            _ => '_',
        })
        .collect();
    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback,
        urlencoding::encode(filename)
    )
}
