use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::order::OrderResult;

// ============================================================================
// Post Catalog - the listing collaborator consulted at order placement
// ============================================================================

/// What order placement needs to know about a listed post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostSummary {
    pub id: Uuid,
    pub owner_id: Uuid,
    /// Minor currency units; `None` for posts that are not for sale.
    pub price: Option<i64>,
    pub active: bool,
}

#[async_trait]
pub trait PostCatalog: Send + Sync {
    async fn find_post(&self, post_id: Uuid) -> OrderResult<Option<PostSummary>>;
}

/// Catalog backed by a map, for local runs and tests.
#[derive(Default)]
pub struct InMemoryPostCatalog {
    posts: RwLock<HashMap<Uuid, PostSummary>>,
}

impl InMemoryPostCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn upsert(&self, post: PostSummary) {
        self.posts.write().await.insert(post.id, post);
    }

    pub async fn set_active(&self, post_id: Uuid, active: bool) {
        if let Some(post) = self.posts.write().await.get_mut(&post_id) {
            post.active = active;
        }
    }
}

#[async_trait]
impl PostCatalog for InMemoryPostCatalog {
    async fn find_post(&self, post_id: Uuid) -> OrderResult<Option<PostSummary>> {
        Ok(self.posts.read().await.get(&post_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_upsert_and_deactivate() {
        let catalog = InMemoryPostCatalog::new();
        let post = PostSummary {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            price: Some(4500),
            active: true,
        };
        catalog.upsert(post.clone()).await;

        assert_eq!(catalog.find_post(post.id).await.unwrap(), Some(post.clone()));

        catalog.set_active(post.id, false).await;
        assert!(!catalog.find_post(post.id).await.unwrap().unwrap().active);
        assert!(catalog.find_post(Uuid::new_v4()).await.unwrap().is_none());
    }
}
