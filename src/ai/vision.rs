//! Face collection access: the adapter trait the workflows call and its
//! Rekognition implementation.

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_rekognition::error::ProvideErrorMetadata;
use aws_sdk_rekognition::primitives::Blob;
use aws_sdk_rekognition::types::{Attribute, Face, Image, S3Object};
use serde::{Deserialize, Serialize};

use crate::error::{IdolError, Result};
use crate::idol::ImageLocation;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceRecord {
    pub face_id: String,
    pub external_image_id: Option<String>,
    pub image_id: Option<String>,
    pub confidence: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceMatch {
    /// 0-100.
    pub similarity: f32,
    pub face: FaceRecord,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    /// False when the service found no face in the probe image.
    pub face_detected: bool,
    pub matches: Vec<FaceMatch>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexResponse {
    pub face_records: Vec<FaceRecord>,
    pub unindexed_faces: usize,
    pub face_model_version: Option<String>,
}

impl IndexResponse {
    #[must_use]
    pub fn faces_detected(&self) -> usize {
        self.face_records.len() + self.unindexed_faces
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionAttributes {
    Default,
    All,
}

/// A named group of indexed faces that is searched as a unit.
#[async_trait]
pub trait FaceCollection: Send + Sync {
    /// Searches the collection for faces similar to the largest face in `image`.
    async fn search_by_image(
        &self,
        image: &[u8],
        collection_id: &str,
        max_matches: u32,
        similarity_threshold: f32,
    ) -> Result<SearchResponse>;

    /// Detects faces in a stored image and adds up to `max_faces` of them.
    async fn index_face(
        &self,
        image: &ImageLocation,
        collection_id: &str,
        external_image_id: &str,
        max_faces: u32,
        attributes: DetectionAttributes,
    ) -> Result<IndexResponse>;

    /// Removes faces, returning the ids the service reports as deleted.
    async fn delete_faces(&self, face_ids: &[String], collection_id: &str)
        -> Result<Vec<String>>;

    async fn list_faces(&self, collection_id: &str) -> Result<Vec<FaceRecord>>;

    /// Drops the collection with all its faces and creates it again empty.
    async fn reset_collection(&self, collection_id: &str) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct RekognitionCollection {
    client: aws_sdk_rekognition::Client,
}

impl RekognitionCollection {
    #[must_use]
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            client: aws_sdk_rekognition::Client::new(config),
        }
    }
}

fn face_record(face: &Face) -> Option<FaceRecord> {
    Some(FaceRecord {
        face_id: face.face_id()?.to_string(),
        external_image_id: face.external_image_id().map(String::from),
        image_id: face.image_id().map(String::from),
        confidence: face.confidence(),
    })
}

/// Matches "There are no faces in the image. Should be at least 1."
fn is_no_face_message(message: &str) -> bool {
    message.to_ascii_lowercase().contains("no faces")
}

fn to_i32(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

#[async_trait]
impl FaceCollection for RekognitionCollection {
    async fn search_by_image(
        &self,
        image: &[u8],
        collection_id: &str,
        max_matches: u32,
        similarity_threshold: f32,
    ) -> Result<SearchResponse> {
        let resp = self
            .client
            .search_faces_by_image()
            .collection_id(collection_id)
            .image(Image::builder().bytes(Blob::new(image)).build())
            .max_faces(to_i32(max_matches))
            .face_match_threshold(similarity_threshold)
            .send()
            .await;

        let output = match resp {
            Ok(output) => output,
            // Rekognition rejects probes without a face as an invalid parameter,
            // the same exception it raises for bad request values.
            Err(e)
                if e.as_service_error().is_some_and(|se| {
                    se.is_invalid_parameter_exception()
                        && se.message().is_some_and(is_no_face_message)
                }) =>
            {
                tracing::debug!(error = %e, "no face detected in probe image");
                return Ok(SearchResponse {
                    face_detected: false,
                    matches: vec![],
                });
            }
            Err(e) => return Err(IdolError::service("search_faces_by_image", e)),
        };

        let matches = output
            .face_matches()
            .iter()
            .filter_map(|m| {
                Some(FaceMatch {
                    similarity: m.similarity()?,
                    face: face_record(m.face()?)?,
                })
            })
            .collect();

        Ok(SearchResponse {
            face_detected: true,
            matches,
        })
    }

    async fn index_face(
        &self,
        image: &ImageLocation,
        collection_id: &str,
        external_image_id: &str,
        max_faces: u32,
        attributes: DetectionAttributes,
    ) -> Result<IndexResponse> {
        let attribute = match attributes {
            DetectionAttributes::Default => Attribute::Default,
            DetectionAttributes::All => Attribute::All,
        };
        let s3_object = S3Object::builder()
            .bucket(&image.bucket)
            .name(&image.key)
            .build();

        let output = self
            .client
            .index_faces()
            .collection_id(collection_id)
            .image(Image::builder().s3_object(s3_object).build())
            .external_image_id(external_image_id)
            .max_faces(to_i32(max_faces))
            .detection_attributes(attribute)
            .send()
            .await
            .map_err(|e| IdolError::service("index_faces", e))?;

        Ok(IndexResponse {
            face_records: output
                .face_records()
                .iter()
                .filter_map(|r| face_record(r.face()?))
                .collect(),
            unindexed_faces: output.unindexed_faces().len(),
            face_model_version: output.face_model_version().map(String::from),
        })
    }

    async fn delete_faces(
        &self,
        face_ids: &[String],
        collection_id: &str,
    ) -> Result<Vec<String>> {
        let output = self
            .client
            .delete_faces()
            .collection_id(collection_id)
            .set_face_ids(Some(face_ids.to_vec()))
            .send()
            .await
            .map_err(|e| IdolError::service("delete_faces", e))?;

        for failure in output.unsuccessful_face_deletions() {
            tracing::warn!(
                face_id = failure.face_id().unwrap_or_default(),
                reasons = ?failure.reasons(),
                "face deletion refused"
            );
        }
        Ok(output.deleted_faces().to_vec())
    }

    async fn list_faces(&self, collection_id: &str) -> Result<Vec<FaceRecord>> {
        let mut faces = Vec::new();
        let mut next_token: Option<String> = None;
        loop {
            let output = self
                .client
                .list_faces()
                .collection_id(collection_id)
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(|e| IdolError::service("list_faces", e))?;

            faces.extend(output.faces().iter().filter_map(face_record));

            match output.next_token() {
                Some(token) if !token.is_empty() => next_token = Some(token.to_string()),
                _ => break,
            }
        }
        tracing::debug!(collection_id, count = faces.len(), "listed faces");
        Ok(faces)
    }

    async fn reset_collection(&self, collection_id: &str) -> Result<()> {
        match self
            .client
            .delete_collection()
            .collection_id(collection_id)
            .send()
            .await
        {
            Ok(_) => {}
            Err(e)
                if e.as_service_error()
                    .is_some_and(|se| se.is_resource_not_found_exception()) =>
            {
                tracing::info!(collection_id, "collection did not exist");
            }
            Err(e) => return Err(IdolError::service("delete_collection", e)),
        }

        self.client
            .create_collection()
            .collection_id(collection_id)
            .send()
            .await
            .map_err(|e| IdolError::service("create_collection", e))?;
        tracing::info!(collection_id, "collection recreated");
        Ok(())
    }
}
