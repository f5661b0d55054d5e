use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use log::warn;
use uuid::Uuid;

use crate::errors::{ServiceError, ServiceResult};
use crate::models::Document;
use crate::services::object_store::ObjectStore;

pub const ALLOWED_EXTENSIONS: &[&str] = &[
    "pdf", "doc", "docx", "txt", "jpg", "jpeg", "png", "gif", "xls", "xlsx", "ppt", "pptx",
];

pub const CATEGORIES: &[&str] = &[
    "reportes", "manuales", "contratos", "facturas", "imagenes", "otros",
];

const MAX_DESCRIPTION_LEN: usize = 200;
const PRESIGNED_URL_EXPIRY_SECS: u32 = 3600;

/// Document metadata records, keyed by document identity.
#[async_trait]
pub trait DocumentIndex: Send + Sync {
    async fn save(&self, document: &Document) -> ServiceResult<()>;
    async fn get(&self, document_id: Uuid) -> ServiceResult<Option<Document>>;
    async fn list_for_owner(&self, owner_id: Uuid) -> ServiceResult<Vec<Document>>;
    async fn list_all(&self) -> ServiceResult<Vec<Document>>;
    async fn delete(&self, document_id: Uuid) -> ServiceResult<bool>;
}

#[derive(Debug, Clone)]
pub struct NewUpload {
    pub original_filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
    pub description: String,
    pub category: String,
}

fn file_extension(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
}

/// Coordinates the object store and the metadata store. The two writes are
/// not atomic; see `upload` and `delete` for which side wins on failure.
pub struct DocumentService {
    objects: Arc<dyn ObjectStore>,
    index: Arc<dyn DocumentIndex>,
}

impl DocumentService {
    pub fn new(objects: Arc<dyn ObjectStore>, index: Arc<dyn DocumentIndex>) -> Self {
        Self { objects, index }
    }

    fn validate(upload: &NewUpload) -> ServiceResult<()> {
        match file_extension(&upload.original_filename) {
            Some(ext) if ALLOWED_EXTENSIONS.contains(&ext.as_str()) => {}
            _ => {
                return Err(ServiceError::Validation(
                    "solo se permiten documentos e imágenes".to_string(),
                ))
            }
        }
        if upload.data.is_empty() {
            return Err(ServiceError::Validation(
                "por favor selecciona un archivo".to_string(),
            ));
        }
        if upload.description.trim().is_empty() {
            return Err(ServiceError::Validation(
                "la descripción es requerida".to_string(),
            ));
        }
        if upload.description.chars().count() > MAX_DESCRIPTION_LEN {
            return Err(ServiceError::Validation(
                "la descripción no puede tener más de 200 caracteres".to_string(),
            ));
        }
        if !CATEGORIES.contains(&upload.category.as_str()) {
            return Err(ServiceError::Validation(
                "la categoría es requerida".to_string(),
            ));
        }
        Ok(())
    }

    fn storage_key(category: &str, owner_id: Uuid, original_filename: &str) -> (String, String) {
        let ext = file_extension(original_filename)
            .map(|e| format!(".{}", e))
            .unwrap_or_default();
        let stored_filename = format!("{}{}", Uuid::new_v4(), ext);
        let key = format!("uploads/{}/{}/{}", category, owner_id, stored_filename);
        (stored_filename, key)
    }

    /// Two-step upload: object first, metadata second. A metadata failure
    /// after a successful object write leaves the object orphaned; that gap
    /// is logged and surfaced, not compensated.
    pub async fn upload(&self, owner_id: Uuid, upload: NewUpload) -> ServiceResult<Document> {
        Self::validate(&upload)?;

        let (stored_filename, key) =
            Self::storage_key(&upload.category, owner_id, &upload.original_filename);

        self.objects
            .put(&key, &upload.data, &upload.content_type)
            .await?;

        let document = Document {
            document_id: Uuid::new_v4(),
            filename: stored_filename,
            original_filename: upload.original_filename,
            storage_key: key.clone(),
            url: self.objects.object_url(&key),
            size: upload.data.len() as i64,
            mime_type: upload.content_type,
            owner_id,
            description: upload.description,
            category: upload.category,
            created_at: Utc::now(),
        };

        if let Err(e) = self.index.save(&document).await {
            warn!("metadata write failed, object {} left orphaned: {}", key, e);
            return Err(e);
        }

        Ok(document)
    }

    /// Fail-fast delete: object first, then metadata. If the object cannot
    /// be deleted (including when it is already missing), the metadata
    /// record is kept and the error is reported.
    pub async fn delete(&self, document_id: Uuid) -> ServiceResult<Document> {
        let document = self
            .index
            .get(document_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound {
                entity: "document",
                id: document_id.to_string(),
            })?;

        self.objects.delete(&document.storage_key).await?;
        self.index.delete(document_id).await?;

        Ok(document)
    }

    pub async fn get(&self, document_id: Uuid) -> ServiceResult<Option<Document>> {
        self.index.get(document_id).await
    }

    pub async fn list_for_owner(&self, owner_id: Uuid) -> ServiceResult<Vec<Document>> {
        self.index.list_for_owner(owner_id).await
    }

    pub async fn list_all(&self) -> ServiceResult<Vec<Document>> {
        self.index.list_all().await
    }

    pub async fn download_url(&self, document_id: Uuid) -> ServiceResult<String> {
        let document = self
            .index
            .get(document_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound {
                entity: "document",
                id: document_id.to_string(),
            })?;
        let url = self
            .objects
            .presigned_url(&document.storage_key, PRESIGNED_URL_EXPIRY_SECS)
            .await?;
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use tokio::sync::RwLock;

    use super::*;
    use crate::services::object_store::memory::MemoryObjectStore;
    use crate::services::object_store::StorageError;

    #[derive(Default)]
    struct MemoryDocumentIndex {
        documents: RwLock<HashMap<Uuid, Document>>,
        fail_saves: bool,
    }

    #[async_trait]
    impl DocumentIndex for MemoryDocumentIndex {
        async fn save(&self, document: &Document) -> ServiceResult<()> {
            if self.fail_saves {
                return Err(ServiceError::Internal("metadata store down".to_string()));
            }
            self.documents
                .write()
                .await
                .insert(document.document_id, document.clone());
            Ok(())
        }

        async fn get(&self, document_id: Uuid) -> ServiceResult<Option<Document>> {
            Ok(self.documents.read().await.get(&document_id).cloned())
        }

        async fn list_for_owner(&self, owner_id: Uuid) -> ServiceResult<Vec<Document>> {
            Ok(self
                .documents
                .read()
                .await
                .values()
                .filter(|d| d.owner_id == owner_id)
                .cloned()
                .collect())
        }

        async fn list_all(&self) -> ServiceResult<Vec<Document>> {
            Ok(self.documents.read().await.values().cloned().collect())
        }

        async fn delete(&self, document_id: Uuid) -> ServiceResult<bool> {
            Ok(self.documents.write().await.remove(&document_id).is_some())
        }
    }

    fn pdf_upload() -> NewUpload {
        NewUpload {
            original_filename: "manual.pdf".to_string(),
            content_type: "application/pdf".to_string(),
            data: b"%PDF-1.4 contenido".to_vec(),
            description: "Manual de usuario".to_string(),
            category: "manuales".to_string(),
        }
    }

    fn service_with(
        index: MemoryDocumentIndex,
    ) -> (DocumentService, Arc<MemoryObjectStore>, Arc<MemoryDocumentIndex>) {
        let objects = Arc::new(MemoryObjectStore::new());
        let index = Arc::new(index);
        let service = DocumentService::new(objects.clone(), index.clone());
        (service, objects, index)
    }

    #[tokio::test]
    async fn upload_stores_object_then_metadata() {
        let (service, objects, index) = service_with(MemoryDocumentIndex::default());
        let owner = Uuid::new_v4();

        let document = service.upload(owner, pdf_upload()).await.unwrap();

        assert_eq!(document.category, "manuales");
        assert_eq!(document.original_filename, "manual.pdf");
        assert!(document.filename.ends_with(".pdf"));
        assert!(document
            .storage_key
            .starts_with(&format!("uploads/manuales/{}/", owner)));
        assert!(objects.exists(&document.storage_key).await.unwrap());
        assert!(index.get(document.document_id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn metadata_failure_leaves_orphaned_object() {
        let (service, objects, index) = service_with(MemoryDocumentIndex {
            fail_saves: true,
            ..Default::default()
        });
        let owner = Uuid::new_v4();

        let result = service.upload(owner, pdf_upload()).await;
        assert!(result.is_err());
        assert!(index.list_all().await.unwrap().is_empty());

        // The object write already happened and is not compensated.
        let keys = objects.keys().await;
        assert_eq!(keys.len(), 1);
        assert!(keys[0].starts_with(&format!("uploads/manuales/{}/", owner)));
    }

    #[tokio::test]
    async fn delete_removes_object_and_metadata() {
        let (service, objects, index) = service_with(MemoryDocumentIndex::default());
        let owner = Uuid::new_v4();
        let document = service.upload(owner, pdf_upload()).await.unwrap();

        service.delete(document.document_id).await.unwrap();

        assert!(!objects.exists(&document.storage_key).await.unwrap());
        assert!(index.get(document.document_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_with_missing_object_keeps_metadata() {
        let (service, objects, index) = service_with(MemoryDocumentIndex::default());
        let owner = Uuid::new_v4();
        let document = service.upload(owner, pdf_upload()).await.unwrap();

        // Simulate the backing object disappearing out-of-band.
        objects.delete(&document.storage_key).await.unwrap();

        let result = service.delete(document.document_id).await;
        assert!(matches!(
            result,
            Err(ServiceError::ObjectStore(StorageError::NotFound(_)))
        ));
        assert!(index.get(document.document_id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn delete_unknown_document_is_not_found() {
        let (service, _objects, _index) = service_with(MemoryDocumentIndex::default());
        let result = service.delete(Uuid::new_v4()).await;
        assert!(matches!(result, Err(ServiceError::NotFound { .. })));
    }

    #[tokio::test]
    async fn upload_rejects_disallowed_extension() {
        let (service, objects, _index) = service_with(MemoryDocumentIndex::default());
        let mut upload = pdf_upload();
        upload.original_filename = "malware.exe".to_string();

        let result = service.upload(Uuid::new_v4(), upload).await;
        assert!(matches!(result, Err(ServiceError::Validation(_))));
        // Nothing was written.
        assert!(objects.keys().await.is_empty());
    }

    #[tokio::test]
    async fn upload_rejects_unknown_category_and_long_description() {
        let (service, _objects, _index) = service_with(MemoryDocumentIndex::default());

        let mut upload = pdf_upload();
        upload.category = "secretos".to_string();
        assert!(matches!(
            service.upload(Uuid::new_v4(), upload).await,
            Err(ServiceError::Validation(_))
        ));

        let mut upload = pdf_upload();
        upload.description = "x".repeat(201);
        assert!(matches!(
            service.upload(Uuid::new_v4(), upload).await,
            Err(ServiceError::Validation(_))
        ));
    }

    #[test]
    fn storage_keys_are_unique_and_keep_the_extension() {
        let owner = Uuid::new_v4();
        let (name_a, key_a) = DocumentService::storage_key("manuales", owner, "Manual.PDF");
        let (name_b, key_b) = DocumentService::storage_key("manuales", owner, "Manual.PDF");

        assert_ne!(key_a, key_b);
        assert!(name_a.ends_with(".pdf"));
        assert!(key_a.starts_with(&format!("uploads/manuales/{}/", owner)));
        assert!(name_b.ends_with(".pdf"));
        assert!(key_b.contains(&owner.to_string()));
    }
}
