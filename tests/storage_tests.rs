mod common;

#[cfg(test)]
mod storage_tests {
    use std::sync::Arc;

    use crate::common::*;
    use request_payment_server::storage::{FileCategory, FileStorage, StorageError, Upload};
    use request_payment_server::{AppConfig, ErrorKind};

    fn upload(len: usize) -> Upload {
        Upload {
            data: png_bytes(len),
            filename: "bankbook.PNG".to_string(),
            content_type: "image/png".to_string(),
        }
    }

    fn mock_storage(mock: MockObjectStorage) -> (Arc<MockObjectStorage>, FileStorage) {
        let mock = Arc::new(mock);
        let storage = FileStorage::new(mock.clone(), &AppConfig::default());
        (mock, storage)
    }

    #[tokio::test]
    async fn test_store_writes_under_images_folder() {
        let (mock, storage) = mock_storage(MockObjectStorage::new());

        let stored = storage
            .store(upload(512), FileCategory::Image, "bankbook")
            .await
            .unwrap();

        assert!(mock.has_file(&format!("images/{}", stored.file_id)).await);
        assert!(stored.file_id.ends_with(".png"));
        assert_eq!(stored.path, format!("memory://images/{}", stored.file_id));
        assert_eq!(stored.original_filename, "bankbook.PNG");
    }

    #[tokio::test]
    async fn test_store_retries_name_collisions() {
        let (mock, storage) = mock_storage(MockObjectStorage::with_collisions(3));

        let stored = storage
            .store(upload(128), FileCategory::Image, "bankbook")
            .await
            .unwrap();

        assert_eq!(mock.file_count().await, 1);
        assert!(storage.read(&stored.file_id).await.is_ok());
    }

    #[tokio::test]
    async fn test_store_gives_up_after_repeated_collisions() {
        let (mock, storage) = mock_storage(MockObjectStorage::with_collisions(5));

        let err = storage
            .store(upload(128), FileCategory::Image, "bankbook")
            .await
            .unwrap_err();

        assert!(matches!(err, StorageError::NameExhausted(5)));
        assert_eq!(err.kind(), ErrorKind::StorageFailed);
        assert_eq!(mock.file_count().await, 0);
    }

    #[tokio::test]
    async fn test_rejected_upload_writes_nothing() {
        let (mock, storage) = mock_storage(MockObjectStorage::new());

        let err = storage
            .store(upload(3 * MB), FileCategory::Image, "bankbook")
            .await
            .unwrap_err();

        assert!(matches!(err, StorageError::FileTooLarge { .. }));
        assert_eq!(mock.file_count().await, 0);
    }

    #[tokio::test]
    async fn test_list_filters_by_category() {
        let (_, storage) = mock_storage(MockObjectStorage::new());

        storage
            .store(upload(64), FileCategory::Image, "bankbook")
            .await
            .unwrap();
        storage
            .store(
                Upload {
                    data: b"%PDF-1.7\n".to_vec(),
                    filename: "receipt.pdf".to_string(),
                    content_type: "application/pdf".to_string(),
                },
                FileCategory::Document,
                "doc",
            )
            .await
            .unwrap();

        let images = storage.list(FileCategory::Image).await.unwrap();
        let documents = storage.list(FileCategory::Document).await.unwrap();
        assert_eq!(images.len(), 1);
        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0].mime_type, "application/pdf");
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let (_, storage) = mock_storage(MockObjectStorage::new());

        let err = storage.read("bankbook_missing.png").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        let err = storage.delete("bankbook_missing.png").await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }
}
