use crate::context::Context;
use crate::error::Result;
use crate::idol::Idol;

/// What a probe image turned out to show.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchOutcome {
    NoFaceDetected,
    /// A face was found but nothing in the collection is similar enough.
    NoMatch,
    Found {
        idol: Idol,
        /// 0-100.
        similarity: f32,
    },
}

impl MatchOutcome {
    /// Message shown to whoever uploaded the probe.
    pub fn message(&self) -> String {
        match self {
            Self::NoFaceDetected => "No face detected in the photo.".to_string(),
            Self::NoMatch => "Face detected, but cannot identify him/her.".to_string(),
            Self::Found { idol, similarity } => format!(
                "Found. Looks like {}. {:3.0}% similar.",
                idol.idol_id, similarity
            ),
        }
    }
}

/// Looks up the collection face most similar to the face in `probe`.
pub async fn find_best_match(ctx: &Context, probe: &[u8]) -> Result<MatchOutcome> {
    let config = ctx.config();
    config.validate()?;
    let response = ctx
        .faces()
        .search_by_image(
            probe,
            &config.collection_id,
            config.max_matches,
            config.match_threshold,
        )
        .await?;

    if !response.face_detected {
        return Ok(MatchOutcome::NoFaceDetected);
    }

    let best = response
        .matches
        .into_iter()
        .filter(|m| m.similarity >= config.match_threshold)
        .max_by(|a, b| a.similarity.total_cmp(&b.similarity));

    let Some(best) = best else {
        tracing::debug!(threshold = config.match_threshold, "no match above threshold");
        return Ok(MatchOutcome::NoMatch);
    };

    let idol = Idol::from_service_record(&best.face)?;
    tracing::info!(idol_id = %idol.idol_id, similarity = best.similarity, "probe matched");
    Ok(MatchOutcome::Found {
        idol,
        similarity: best.similarity,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::idol::ImageLocation;

    #[test]
    fn messages_render_similarity_as_percentage() {
        let mut idol = Idol::new("alice", ImageLocation::new("idols", "p/alice/1.jpg")).unwrap();
        idol.face_id = Some("f1".to_string());
        let found = MatchOutcome::Found {
            idol,
            similarity: 97.4,
        };
        assert_eq!(found.message(), "Found. Looks like alice.  97% similar.");
        assert!(MatchOutcome::NoMatch.message().starts_with("Face detected"));
    }
}
