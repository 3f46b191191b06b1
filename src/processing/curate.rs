//! Inspecting and pruning the reference collection.

use std::io::{BufRead, Write};

use async_trait::async_trait;
use regex::Regex;

use crate::context::Context;
use crate::error::{IdolError, Result};
use crate::idol::Idol;

/// Asks the operator before a destructive step.
#[async_trait]
pub trait Confirm: Send + Sync {
    async fn confirm(&self, prompt: &str) -> Result<bool>;
}

/// Prompts on stdout and reads a `y`/`n` answer from stdin.
#[derive(Debug, Default)]
pub struct StdinConfirm {
    /// Skip the prompt and answer yes.
    pub assume_yes: bool,
}

#[async_trait]
impl Confirm for StdinConfirm {
    async fn confirm(&self, prompt: &str) -> Result<bool> {
        if self.assume_yes {
            return Ok(true);
        }
        let prompt = prompt.to_string();
        // Terminal reads block, keep them off the runtime's worker threads.
        tokio::task::spawn_blocking(move || ask(&prompt))
            .await
            .map_err(std::io::Error::other)?
    }
}

fn ask(prompt: &str) -> Result<bool> {
    let mut stdout = std::io::stdout().lock();
    write!(stdout, "{prompt} [y/N]: ")?;
    stdout.flush()?;

    let mut answer = String::new();
    std::io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}

/// Result of removing one idol: the indexed face and the stored image are
/// deleted independently and each outcome is kept.
#[derive(Debug)]
pub struct DeleteReport {
    pub idol: Idol,
    pub face: Result<()>,
    pub image: Result<()>,
}

impl DeleteReport {
    pub fn is_complete(&self) -> bool {
        self.face.is_ok() && self.image.is_ok()
    }

    fn into_result(self) -> Result<Self> {
        match (&self.face, &self.image) {
            (Ok(()), Ok(())) => Ok(self),
            (Err(_), Err(_)) => Err(IdolError::CleanupFailed(Box::new(self))),
            _ => Err(IdolError::PartialCleanup(Box::new(self))),
        }
    }
}

impl std::fmt::Display for DeleteReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fn outcome(result: &Result<()>) -> String {
            match result {
                Ok(()) => "deleted".to_string(),
                Err(e) => format!("failed ({e})"),
            }
        }
        write!(
            f,
            "face {}, image {}",
            outcome(&self.face),
            outcome(&self.image)
        )
    }
}

fn full_match(pattern: &str) -> Result<Regex> {
    Ok(Regex::new(&format!("^(?:{pattern})$"))?)
}

/// Idols whose id fully matches `idol_id_pattern`.
pub async fn list_matching(ctx: &Context, idol_id_pattern: &str, fresh: bool) -> Result<Vec<Idol>> {
    let pattern = full_match(idol_id_pattern)?;
    let idols = ctx.idols(fresh).await?;
    Ok(idols
        .iter()
        .filter(|idol| pattern.is_match(&idol.idol_id))
        .cloned()
        .collect())
}

/// Removes the one idol whose face id fully matches `face_id_pattern`.
///
/// The match must be unique and belong to `idol_id`, and `confirm` must
/// agree, before anything is deleted.
pub async fn delete_matching(
    ctx: &Context,
    face_id_pattern: &str,
    idol_id: &str,
    fresh: bool,
    confirm: &dyn Confirm,
) -> Result<DeleteReport> {
    let pattern = full_match(face_id_pattern)?;
    let idols = ctx.idols(fresh).await?;
    let mut matched: Vec<&Idol> = idols
        .iter()
        .filter(|idol| {
            idol.face_id
                .as_deref()
                .is_some_and(|face_id| pattern.is_match(face_id))
        })
        .collect();

    let idol = match matched.len() {
        0 => {
            return Err(IdolError::NotFound {
                pattern: face_id_pattern.to_string(),
            })
        }
        1 => matched.remove(0).clone(),
        _ => {
            return Err(IdolError::Ambiguous {
                pattern: face_id_pattern.to_string(),
                face_ids: matched.iter().filter_map(|i| i.face_id.clone()).collect(),
            })
        }
    };
    let face_id = idol.face_id.clone().unwrap_or_default();

    if idol.idol_id != idol_id {
        return Err(IdolError::IdentityMismatch {
            face_id,
            expected: idol_id.to_string(),
            actual: idol.idol_id,
        });
    }

    if !confirm.confirm(&format!("Delete {idol}?")).await? {
        return Err(IdolError::Cancelled);
    }

    let face = ctx.delete_faces(std::slice::from_ref(&face_id)).await;
    if let Err(e) = &face {
        tracing::warn!(idol_id, face_id = %face_id, error = %e, "face deletion failed");
    }
    let image = ctx.store().delete(&idol.image).await;
    if let Err(e) = &image {
        tracing::warn!(idol_id, key = %idol.image.key, error = %e, "image deletion failed");
    }
    ctx.invalidate();

    let report = DeleteReport { idol, face, image };
    if report.is_complete() {
        tracing::info!(idol_id, face_id = %face_id, "idol deleted");
    }
    report.into_result()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::idol::ImageLocation;

    fn report(face: Result<()>, image: Result<()>) -> DeleteReport {
        DeleteReport {
            idol: Idol::new("bob", ImageLocation::new("idols", "p/bob/1.jpg")).unwrap(),
            face,
            image,
        }
    }

    #[test]
    fn full_match_anchors_the_pattern() {
        let pattern = full_match("al.*|bo").unwrap();
        assert!(pattern.is_match("alice"));
        assert!(pattern.is_match("bo"));
        assert!(!pattern.is_match("bob"));
        assert!(!pattern.is_match("xalice"));
    }

    #[test]
    fn report_classifies_outcomes() {
        assert!(report(Ok(()), Ok(())).into_result().is_ok());

        let partial = report(
            Ok(()),
            Err(IdolError::service("delete_object", std::io::Error::other("denied"))),
        )
        .into_result();
        match partial {
            Err(IdolError::PartialCleanup(report)) => {
                assert!(report.face.is_ok());
                assert!(report.image.is_err());
                assert!(report.to_string().contains("face deleted, image failed"));
            }
            other => panic!("expected partial cleanup, got {other:?}"),
        }

        let failed = report(
            Err(IdolError::FaceNotDeleted {
                face_id: "f2".to_string(),
            }),
            Err(IdolError::service("delete_object", std::io::Error::other("denied"))),
        )
        .into_result();
        assert!(matches!(failed, Err(IdolError::CleanupFailed(_))));
    }

    #[tokio::test]
    async fn stdin_confirm_can_assume_yes() {
        let confirm = StdinConfirm { assume_yes: true };
        assert!(confirm.confirm("Delete?").await.unwrap());
    }
}
