//! Classifies a working file against its snapshot

use crate::error::Result;
use crate::hasher::ContentHasher;
use crate::snapshot::SnapshotStore;
use crate::state::ChangeState;

/// Stateless comparison of working files with their snapshots.
///
/// Nothing is cached, so calls may race with each other or with a
/// reconciliation; a stale answer is corrected by the next call.
#[derive(Debug, Clone)]
pub struct ChangeDetector {
    store: SnapshotStore,
    hasher: ContentHasher,
}

impl ChangeDetector {
    pub fn new(store: SnapshotStore) -> Self {
        let hasher = ContentHasher::new(store.layout().options().hash_algorithm);
        Self { store, hasher }
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    /// Classify the script `name`
    pub async fn classify(&self, name: &str) -> Result<ChangeState> {
        let working_path = self.store.layout().working_path(name)?;

        let snapshot = self
            .store
            .read(name)
            .await?
            .map(|content| self.hasher.digest(&content));
        let working = self.hasher.digest_file(&working_path).await?;

        Ok(match (snapshot, working) {
            (None, Some(_)) => ChangeState::Created,
            (Some(_), None) => ChangeState::Deleted,
            (Some(snapshot), Some(working)) if snapshot != working => ChangeState::Modified,
            _ => ChangeState::Unmodified,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hasher::HashAlgorithm;
    use crate::layout::{FolderLayout, WorkspaceOptions};
    use rstest::rstest;
    use scriptsync_core::Script;
    use tempfile::TempDir;
    use tokio::fs;

    async fn detector(root: &std::path::Path, algorithm: HashAlgorithm) -> ChangeDetector {
        let options = WorkspaceOptions {
            hash_algorithm: algorithm,
            ..Default::default()
        };
        let store = SnapshotStore::new(FolderLayout::new(root, options).unwrap());
        store
            .rebuild(&[
                Script {
                    id: 1,
                    name: "same".to_string(),
                    content: "same".to_string(),
                    enabled: true,
                },
                Script {
                    id: 2,
                    name: "edited".to_string(),
                    content: "before".to_string(),
                    enabled: true,
                },
                Script {
                    id: 3,
                    name: "removed".to_string(),
                    content: "gone".to_string(),
                    enabled: true,
                },
            ])
            .await
            .unwrap();
        ChangeDetector::new(store)
    }

    #[rstest]
    #[case(HashAlgorithm::Sha256)]
    #[case(HashAlgorithm::Blake3)]
    #[tokio::test]
    async fn test_classify_all_states(#[case] algorithm: HashAlgorithm) {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let detector = detector(root, algorithm).await;

        fs::write(root.join("same.ts"), "same").await.unwrap();
        fs::write(root.join("edited.ts"), "after").await.unwrap();
        fs::write(root.join("fresh.ts"), "new").await.unwrap();

        assert_eq!(detector.classify("same").await.unwrap(), ChangeState::Unmodified);
        assert_eq!(detector.classify("edited").await.unwrap(), ChangeState::Modified);
        assert_eq!(detector.classify("removed").await.unwrap(), ChangeState::Deleted);
        assert_eq!(detector.classify("fresh").await.unwrap(), ChangeState::Created);
        assert_eq!(detector.classify("nowhere").await.unwrap(), ChangeState::Unmodified);
    }

    #[tokio::test]
    async fn test_classify_is_repeatable() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let detector = detector(root, HashAlgorithm::Sha256).await;
        fs::write(root.join("edited.ts"), "after").await.unwrap();

        for _ in 0..3 {
            assert_eq!(detector.classify("edited").await.unwrap(), ChangeState::Modified);
        }

        fs::write(root.join("edited.ts"), "before").await.unwrap();
        assert_eq!(detector.classify("edited").await.unwrap(), ChangeState::Unmodified);
    }
}
