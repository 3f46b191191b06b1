//! In-memory stand-ins for Rekognition and S3.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use idolface::ai::storage::ObjectStore;
use idolface::ai::vision::{
    DetectionAttributes, FaceCollection, FaceRecord, IndexResponse, SearchResponse,
};
use idolface::config::Config;
use idolface::error::{IdolError, Result};
use idolface::processing::curate::Confirm;
use idolface::{Context, Idol, ImageLocation};

pub fn failure(operation: &'static str, message: &str) -> IdolError {
    IdolError::service(operation, std::io::Error::other(message.to_string()))
}

#[derive(Default)]
pub struct FakeCollection {
    pub faces: Mutex<Vec<FaceRecord>>,
    /// Returned by the next search.
    pub search: Mutex<SearchResponse>,
    /// `(collection_id, max_matches, similarity_threshold)` of every search.
    pub search_calls: Mutex<Vec<(String, u32, f32)>>,
    /// Faces detected per indexed image; 1 when unset.
    pub faces_per_image: Mutex<Option<usize>>,
    /// Image keys that show two faces regardless of `faces_per_image`.
    pub crowded: Mutex<Vec<String>>,
    pub fail_index: Mutex<Option<String>>,
    pub fail_delete: Mutex<Option<String>>,
    /// Accept delete requests but delete nothing, like a refused deletion.
    pub refuse_delete: Mutex<bool>,
    pub list_calls: AtomicUsize,
    pub delete_calls: AtomicUsize,
    pub resets: AtomicUsize,
    next_id: AtomicUsize,
}

impl FakeCollection {
    pub fn with_idols(idols: &[(&str, &str)]) -> Self {
        let fake = Self::default();
        for (idol_id, face_id) in idols {
            fake.faces.lock().push(record_for(idol_id, face_id));
        }
        fake
    }

    pub fn face_ids(&self) -> Vec<String> {
        self.faces.lock().iter().map(|f| f.face_id.clone()).collect()
    }
}

/// A face record as the service would store it for `idol_id`.
pub fn record_for(idol_id: &str, face_id: &str) -> FaceRecord {
    let location = ImageLocation::new("idols", &format!("profiles/{idol_id}/{face_id}.jpg"));
    let idol = Idol::new(idol_id, location).expect("valid idol");
    FaceRecord {
        face_id: face_id.to_string(),
        external_image_id: Some(idol.to_external_image_id()),
        image_id: None,
        confidence: Some(99.9),
    }
}

#[async_trait]
impl FaceCollection for FakeCollection {
    async fn search_by_image(
        &self,
        _image: &[u8],
        collection_id: &str,
        max_matches: u32,
        similarity_threshold: f32,
    ) -> Result<SearchResponse> {
        self.search_calls.lock().push((
            collection_id.to_string(),
            max_matches,
            similarity_threshold,
        ));
        Ok(self.search.lock().clone())
    }

    async fn index_face(
        &self,
        image: &ImageLocation,
        _collection_id: &str,
        external_image_id: &str,
        max_faces: u32,
        attributes: DetectionAttributes,
    ) -> Result<IndexResponse> {
        assert_eq!(max_faces, 1);
        assert_eq!(attributes, DetectionAttributes::All);
        if let Some(message) = self.fail_index.lock().clone() {
            return Err(failure("index_faces", &message));
        }

        let detected = if self.crowded.lock().contains(&image.key) {
            2
        } else {
            self.faces_per_image.lock().unwrap_or(1)
        };
        let indexed = detected.min(max_faces as usize);
        let mut face_records = Vec::new();
        for _ in 0..indexed {
            let id = self.next_id.fetch_add(1, Ordering::SeqCst);
            let record = FaceRecord {
                face_id: format!("face-{id}"),
                external_image_id: Some(external_image_id.to_string()),
                image_id: None,
                confidence: Some(99.0),
            };
            self.faces.lock().push(record.clone());
            face_records.push(record);
        }
        Ok(IndexResponse {
            face_records,
            unindexed_faces: detected - indexed,
            face_model_version: Some("7.0".to_string()),
        })
    }

    async fn delete_faces(&self, face_ids: &[String], _collection_id: &str) -> Result<Vec<String>> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self.fail_delete.lock().clone() {
            return Err(failure("delete_faces", &message));
        }
        if *self.refuse_delete.lock() {
            return Ok(Vec::new());
        }
        let mut faces = self.faces.lock();
        let before: Vec<String> = faces.iter().map(|f| f.face_id.clone()).collect();
        faces.retain(|f| !face_ids.contains(&f.face_id));
        Ok(before.into_iter().filter(|id| face_ids.contains(id)).collect())
    }

    async fn list_faces(&self, _collection_id: &str) -> Result<Vec<FaceRecord>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.faces.lock().clone())
    }

    async fn reset_collection(&self, _collection_id: &str) -> Result<()> {
        self.resets.fetch_add(1, Ordering::SeqCst);
        self.faces.lock().clear();
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeStore {
    pub objects: Mutex<HashMap<ImageLocation, (Vec<u8>, Option<String>)>>,
    pub fail_delete: Mutex<Option<String>>,
    pub delete_calls: AtomicUsize,
}

impl FakeStore {
    pub fn contains(&self, location: &ImageLocation) -> bool {
        self.objects.lock().contains_key(location)
    }

    pub fn len(&self) -> usize {
        self.objects.lock().len()
    }

    pub fn insert(&self, location: ImageLocation) {
        self.objects.lock().insert(location, (vec![0xff, 0xd8], None));
    }
}

#[async_trait]
impl ObjectStore for FakeStore {
    async fn put(
        &self,
        location: &ImageLocation,
        body: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<()> {
        self.objects
            .lock()
            .insert(location.clone(), (body, content_type.map(String::from)));
        Ok(())
    }

    async fn delete(&self, location: &ImageLocation) -> Result<()> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self.fail_delete.lock().clone() {
            return Err(failure("delete_object", &message));
        }
        self.objects.lock().remove(location);
        Ok(())
    }
}

/// Answers every prompt the same way and remembers what was asked.
pub struct ScriptedConfirm {
    pub answer: bool,
    pub prompts: Mutex<Vec<String>>,
}

impl ScriptedConfirm {
    pub fn new(answer: bool) -> Self {
        Self {
            answer,
            prompts: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Confirm for ScriptedConfirm {
    async fn confirm(&self, prompt: &str) -> Result<bool> {
        self.prompts.lock().push(prompt.to_string());
        Ok(self.answer)
    }
}

pub fn context(faces: &Arc<FakeCollection>, store: &Arc<FakeStore>) -> Context {
    context_with(faces, store, |_| {})
}

/// A test context whose configuration `adjust` may change.
pub fn context_with(
    faces: &Arc<FakeCollection>,
    store: &Arc<FakeStore>,
    adjust: impl FnOnce(&mut Config),
) -> Context {
    let mut config = Config {
        collection_id: "idols-test".to_string(),
        bucket: "idols".to_string(),
        profile_root: "profiles".to_string(),
        ..Config::default()
    };
    adjust(&mut config);
    Context::new(config, faces.clone(), store.clone())
}
