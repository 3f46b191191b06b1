//! Adding reference faces to the collection.
//!
//! An image is uploaded first and indexed from storage second. Whatever the
//! indexing outcome, the pair stays consistent: either the image ends up
//! with exactly one indexed face, or both are removed again.

use std::path::{Path, PathBuf};

use glob::glob;

use crate::ai::vision::{DetectionAttributes, IndexResponse};
use crate::context::Context;
use crate::error::{IdolError, Result};
use crate::idol::{Idol, ImageLocation};

const MAX_FACES_PER_IMAGE: u32 = 1;

/// Outcome of one file in [`upload_directory`].
#[derive(Debug)]
pub struct DirectoryUpload {
    pub idol_id: String,
    pub path: PathBuf,
    pub result: Result<IndexResponse>,
}

/// Uploads `image` to `location` and indexes it as a face of `idol_id`.
pub async fn upload_reference(
    ctx: &Context,
    image: Vec<u8>,
    idol_id: &str,
    location: ImageLocation,
    content_type: Option<&str>,
) -> Result<IndexResponse> {
    let idol = Idol::new(idol_id, location)?;
    let collection_id = &ctx.config().collection_id;

    ctx.store().put(&idol.image, image, content_type).await?;

    let indexed = ctx
        .faces()
        .index_face(
            &idol.image,
            collection_id,
            &idol.to_external_image_id(),
            MAX_FACES_PER_IMAGE,
            DetectionAttributes::All,
        )
        .await;

    let response = match indexed {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!(idol_id, key = %idol.image.key, error = %e, "indexing failed, removing uploaded image");
            return Err(rollback(ctx, &idol, &[], e).await);
        }
    };

    // Anything indexed from here on changes the roster, even if rolled back.
    ctx.invalidate();

    let found = response.faces_detected();
    if found != 1 {
        tracing::warn!(idol_id, key = %idol.image.key, found, "reference image rejected");
        let indexed: Vec<String> = response
            .face_records
            .iter()
            .map(|r| r.face_id.clone())
            .collect();
        return Err(rollback(ctx, &idol, &indexed, IdolError::Index { found }).await);
    }

    tracing::info!(
        idol_id,
        face_id = response.face_records.first().map(|r| r.face_id.as_str()),
        key = %idol.image.key,
        "idol enrolled"
    );
    Ok(response)
}

/// Undoes a failed enrollment and returns the error to report. Both the
/// faces and the image are attempted; every failure is kept.
async fn rollback(ctx: &Context, idol: &Idol, face_ids: &[String], cause: IdolError) -> IdolError {
    let mut failures = Vec::new();

    if !face_ids.is_empty() {
        if let Err(e) = ctx.delete_faces(face_ids).await {
            tracing::error!(idol_id = %idol.idol_id, error = %e, "rollback left indexed faces behind");
            failures.push(e);
        }
    }

    if let Err(e) = ctx.store().delete(&idol.image).await {
        tracing::error!(key = %idol.image.key, error = %e, "rollback left an orphaned image");
        failures.push(e);
    }

    if failures.is_empty() {
        cause
    } else {
        IdolError::RollbackFailed {
            cause: Box::new(cause),
            rollback: failures,
        }
    }
}

/// Uploads a local file as `<profile_root>/<idol_id>/<file name>`.
pub async fn upload_local(ctx: &Context, path: &Path, idol_id: &str) -> Result<IndexResponse> {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("{} has no usable file name", path.display()),
            )
        })?;
    let location = ctx.config().profile_location(idol_id, file_name);
    let content_type = mime_guess::from_path(path).first_raw();

    let image = tokio::fs::read(path).await?;
    upload_reference(ctx, image, idol_id, location, content_type).await
}

/// Uploads every file under `root/<idol_id>/` as a reference face of that idol.
///
/// Files are processed in sorted order and each gets its own result, so one
/// failure does not stop the rest.
pub async fn upload_directory(ctx: &Context, root: &Path) -> Result<Vec<DirectoryUpload>> {
    let mut files = Vec::new();
    for dir in sorted_entries(root)?.into_iter().filter(|p| p.is_dir()) {
        let Some(idol_id) = dir.file_name().and_then(|n| n.to_str()).map(String::from) else {
            tracing::warn!(path = %dir.display(), "skipping directory with a non utf-8 name");
            continue;
        };
        for file in sorted_entries(&dir)?.into_iter().filter(|p| p.is_file()) {
            files.push((idol_id.clone(), file));
        }
    }

    let total = files.len();
    let mut uploads = Vec::with_capacity(total);
    for (count, (idol_id, path)) in files.into_iter().enumerate() {
        if ctx.config().verbose {
            tracing::info!("{} / {}: {}", count + 1, total, path.display());
        } else {
            tracing::debug!("{} / {}: {}", count + 1, total, path.display());
        }

        let result = upload_local(ctx, &path, &idol_id).await;
        if let Err(e) = &result {
            tracing::warn!(idol_id, path = %path.display(), error = %e, "upload failed");
        }
        uploads.push(DirectoryUpload {
            idol_id,
            path,
            result,
        });
    }
    Ok(uploads)
}

fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("{} is not a directory", dir.display()),
        )
        .into());
    }
    let pattern = glob::Pattern::escape(&dir.to_string_lossy());
    let mut entries: Vec<PathBuf> = glob(&format!("{pattern}/*"))
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?
        .filter_map(|entry| entry.ok())
        .collect();
    entries.sort();
    Ok(entries)
}

/// Deletes and recreates the whole collection. Every indexed face is lost;
/// images in storage are left alone.
pub async fn reset_collection(ctx: &Context) -> Result<()> {
    let collection_id = &ctx.config().collection_id;
    tracing::warn!(collection_id, "resetting collection");
    let result = ctx.faces().reset_collection(collection_id).await;
    ctx.invalidate();
    result
}
