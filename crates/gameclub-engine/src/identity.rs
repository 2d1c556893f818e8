//! Creation-time identifier uniqueness.
//!
//! A registry is a set of ids in the store. Reserving adds the id and reports
//! whether it was new, in one set-add.

use gameclub_store::{Transaction, keys};
use tracing::debug;

use crate::{EngineError, Registry};

impl Registry {
    /// Set key holding every reserved id.
    pub fn key(self) -> &'static str {
        match self {
            Registry::Players => keys::GLOBAL_PLAYERS_IDS,
            Registry::Games => keys::GLOBAL_GAMES_IDS,
        }
    }
}

/// Reserve `id` in `registry`. Returns false when it was already taken.
pub async fn reserve(
    tx: &mut dyn Transaction,
    registry: Registry,
    id: &str,
) -> Result<bool, EngineError> {
    Ok(tx.sadd(registry.key(), &[id]).await? == 1)
}

/// Reserve `id`, failing with `DuplicateIdentifier` when it is taken.
///
/// Must precede every other write for the new record.
pub async fn ensure_new(
    tx: &mut dyn Transaction,
    registry: Registry,
    id: &str,
) -> Result<(), EngineError> {
    if reserve(tx, registry, id).await? {
        Ok(())
    } else {
        debug!(%registry, id, "identifier already reserved");
        Err(EngineError::DuplicateIdentifier {
            registry,
            id: id.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gameclub_store::{MemoryStore, Store};

    #[tokio::test]
    async fn test_second_reservation_fails() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();

        assert!(reserve(tx.as_mut(), Registry::Players, "p1").await.unwrap());
        assert!(!reserve(tx.as_mut(), Registry::Players, "p1").await.unwrap());
        // Registries are independent.
        assert!(reserve(tx.as_mut(), Registry::Games, "p1").await.unwrap());

        let err = ensure_new(tx.as_mut(), Registry::Games, "p1")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::DuplicateIdentifier {
                registry: Registry::Games,
                ..
            }
        ));
        assert_eq!(err.to_string(), "game_id p1 is already taken");
        assert!(tx.sismember(Registry::Players.key(), "p1").await.unwrap());
    }
}
