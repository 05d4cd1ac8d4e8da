//! In-memory registry of submitted requests, so they can be listed and their
//! PDFs fetched again until they expire.

use chrono::{DateTime, Utc};
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use super::models::{PaymentRequest, RequestFormResponse};

const MAX_ENTRIES: u64 = 10_000;

#[derive(Debug, Clone)]
pub struct StoredRequest {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub request: PaymentRequest,
}

impl StoredRequest {
    pub fn pdf_url(&self) -> String {
        format!("/api/v1/request-forms/{}/pdf", self.id)
    }

    pub fn to_response(&self) -> RequestFormResponse {
        RequestFormResponse {
            id: self.id,
            created_at: self.created_at,
            total_amount: self.request.total_amount(),
            request: self.request.clone(),
            pdf_url: self.pdf_url(),
        }
    }
}

#[derive(Clone)]
pub struct RequestRegistry {
    cache: Cache<Uuid, Arc<StoredRequest>>,
}

impl RequestRegistry {
    pub fn new(ttl: Duration) -> Self {
        let cache = Cache::builder()
            .time_to_live(ttl)
            .max_capacity(MAX_ENTRIES)
            .build();
        Self { cache }
    }

    /// Register a request under a fresh id.
    pub async fn insert(&self, request: PaymentRequest) -> Arc<StoredRequest> {
        let stored = Arc::new(StoredRequest {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            request,
        });
        self.cache.insert(stored.id, stored.clone()).await;
        log::info!("Registered payment request {}", stored.id);
        stored
    }

    pub async fn get(&self, id: &Uuid) -> Option<Arc<StoredRequest>> {
        self.cache.get(id).await
    }

    /// All live requests, newest first.
    pub async fn list(&self) -> Vec<Arc<StoredRequest>> {
        self.cache.run_pending_tasks().await;
        let mut items: Vec<Arc<StoredRequest>> = self.cache.iter().map(|(_, v)| v).collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        items
    }
}
