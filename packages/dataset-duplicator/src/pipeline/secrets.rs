//! Reading the download token kept in the origin dataset.

use content_lake_client::ApiToken;
use tracing::debug;

use crate::error::StoreResult;
use crate::traits::store::{DocumentQuery, DocumentStore};

/// Namespace of the secrets document.
pub const SECRET_NAMESPACE: &str = "CrossDatasetDuplicator";

/// Field holding the token.
pub const TOKEN_FIELD: &str = "bearerToken";

/// Id of the secrets document.
pub fn secret_document_id() -> String {
    format!("secrets.{}", SECRET_NAMESPACE)
}

/// Load the asset download token, if one has been saved.
///
/// Blank values count as missing.
pub async fn load_token(store: &dyn DocumentStore) -> StoreResult<Option<ApiToken>> {
    let documents = store
        .fetch(&DocumentQuery::by_ids([secret_document_id()]))
        .await?;

    let token = documents
        .first()
        .and_then(|doc| doc.get(TOKEN_FIELD))
        .and_then(|value| value.as_str())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ApiToken::new);

    debug!(store = store.name(), found = token.is_some(), "Loaded download token");
    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::memory::MemoryStore;
    use crate::testing::document;

    #[tokio::test]
    async fn test_load_token() {
        let store = MemoryStore::new("origin").with_document(
            document("secrets.CrossDatasetDuplicator", "secrets").with_field(TOKEN_FIELD, "sk-123"),
        );
        let token = load_token(&store).await.unwrap().unwrap();
        assert_eq!(token.expose(), "sk-123");
    }

    #[tokio::test]
    async fn test_missing_or_blank_token() {
        let store = MemoryStore::new("origin");
        assert!(load_token(&store).await.unwrap().is_none());

        let store = MemoryStore::new("origin").with_document(
            document("secrets.CrossDatasetDuplicator", "secrets").with_field(TOKEN_FIELD, "  "),
        );
        assert!(load_token(&store).await.unwrap().is_none());
    }
}
