//! Process-local cache of the collection roster.
//!
//! The service is the source of truth. The cache is filled lazily on first
//! read and replaced whenever a caller asks for a fresh copy; it never
//! expires on its own.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::ai::vision::FaceCollection;
use crate::error::Result;
use crate::idol::Idol;

#[derive(Debug, Default)]
pub struct Roster {
    idols: RwLock<Option<Arc<Vec<Idol>>>>,
}

impl Roster {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the roster, fetching it from `faces` when nothing is cached or
    /// `fresh` is set.
    ///
    /// A face whose external image id cannot be decoded fails the fetch and
    /// leaves the previous roster in place.
    pub async fn idols(
        &self,
        faces: &dyn FaceCollection,
        collection_id: &str,
        fresh: bool,
    ) -> Result<Arc<Vec<Idol>>> {
        if !fresh {
            if let Some(idols) = self.cached() {
                return Ok(idols);
            }
        }

        let records = faces.list_faces(collection_id).await?;
        let idols = records
            .iter()
            .map(Idol::from_service_record)
            .collect::<Result<Vec<_>>>()?;
        let idols = Arc::new(idols);

        *self.idols.write() = Some(Arc::clone(&idols));
        tracing::debug!(collection_id, count = idols.len(), "roster refreshed");
        Ok(idols)
    }

    #[must_use]
    pub fn cached(&self) -> Option<Arc<Vec<Idol>>> {
        self.idols.read().clone()
    }

    /// Drops the cached roster so the next read refetches it.
    pub fn invalidate(&self) {
        self.idols.write().take();
    }
}
