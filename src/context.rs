use std::sync::Arc;

use crate::ai::aws;
use crate::ai::storage::{ObjectStore, S3Store};
use crate::ai::vision::{FaceCollection, RekognitionCollection};
use crate::config::Config;
use crate::error::{IdolError, Result};
use crate::idol::Idol;
use crate::roster::Roster;

/// Everything the workflows share: configuration, service adapters and the
/// roster cache. Built once per process and passed by reference.
pub struct Context {
    config: Config,
    faces: Arc<dyn FaceCollection>,
    store: Arc<dyn ObjectStore>,
    roster: Roster,
}

impl Context {
    pub fn new(config: Config, faces: Arc<dyn FaceCollection>, store: Arc<dyn ObjectStore>) -> Self {
        Self {
            config,
            faces,
            store,
            roster: Roster::new(),
        }
    }

    pub async fn connect(config: Config) -> Self {
        let sdk_config = aws::shared_config().await;
        Self::new(
            config,
            Arc::new(RekognitionCollection::new(&sdk_config)),
            Arc::new(S3Store::new(&sdk_config)),
        )
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn faces(&self) -> &dyn FaceCollection {
        self.faces.as_ref()
    }

    pub fn store(&self) -> &dyn ObjectStore {
        self.store.as_ref()
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub async fn idols(&self, fresh: bool) -> Result<Arc<Vec<Idol>>> {
        self.roster
            .idols(self.faces.as_ref(), &self.config.collection_id, fresh)
            .await
    }

    pub fn invalidate(&self) {
        self.roster.invalidate();
    }

    /// Fails unless the service reports every face as deleted.
    pub async fn delete_faces(&self, face_ids: &[String]) -> Result<()> {
        let deleted = self
            .faces
            .delete_faces(face_ids, &self.config.collection_id)
            .await?;
        match face_ids.iter().find(|id| !deleted.contains(id)) {
            Some(face_id) => Err(IdolError::FaceNotDeleted {
                face_id: face_id.clone(),
            }),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("config", &self.config)
            .field("roster", &self.roster)
            .finish_non_exhaustive()
    }
}
