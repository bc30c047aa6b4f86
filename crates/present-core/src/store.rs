//! Sled-backed store for goals and encrypted calendar credentials.
//!
//! | Tree                   | Key                    | Value                         |
//! |------------------------|------------------------|-------------------------------|
//! | `goals`                | `len(user_id) ‖ user_id ‖ goal_id` | JSON [`Goal`]      |
//! | `calendar_credentials` | `{user_id}`            | hex AES-GCM refresh-token blob |
//!
//! Goal keys start with the user id's byte length (u32, big-endian), so no
//! `(user_id, goal_id)` pair can alias another user's key or prefix.

use crate::error::StoreError;
use crate::shared::Goal;
use sled::Db;
use std::path::Path;

const GOALS_TREE: &str = "goals";
const CREDENTIALS_TREE: &str = "calendar_credentials";

/// Read access to user goals. Implementations may block; callers dispatch to a worker thread.
pub trait GoalStore: Send + Sync {
    fn get_goal(&self, user_id: &str, goal_id: &str) -> Result<Option<Goal>, StoreError>;
}

/// Read access to per-user encrypted calendar credentials. May block.
pub trait CredentialStore: Send + Sync {
    fn get_calendar_credential(&self, user_id: &str) -> Result<Option<String>, StoreError>;
}

/// Runs a blocking store call on tokio's blocking pool.
pub async fn run_blocking<T, F>(f: F) -> Result<T, StoreError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, StoreError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|join| StoreError::Worker(join.to_string()))?
}

fn user_prefix(user_id: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(4 + user_id.len());
    key.extend_from_slice(&(user_id.len() as u32).to_be_bytes());
    key.extend_from_slice(user_id.as_bytes());
    key
}

fn goal_key(user_id: &str, goal_id: &str) -> Vec<u8> {
    let mut key = user_prefix(user_id);
    key.extend_from_slice(goal_id.as_bytes());
    key
}

/// Embedded store with one sled tree per record kind.
pub struct SledStore {
    db: Db,
}

impl SledStore {
    /// Opens or creates the store at the given path.
    pub fn open_path<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let db = sled::open(path)?;
        Ok(Self { db })
    }

    /// Inserts or replaces a goal for `user_id`.
    pub fn put_goal(&self, user_id: &str, goal: &Goal) -> Result<(), StoreError> {
        let tree = self.db.open_tree(GOALS_TREE)?;
        let key = goal_key(user_id, &goal.id);
        let prev = tree.insert(key, serde_json::to_vec(goal)?)?;
        tracing::info!(
            target: "present::store",
            user_id = user_id,
            goal_id = %goal.id,
            action = if prev.is_some() { "UPDATE" } else { "INSERT" },
            "Goal '{}' stored",
            goal.name
        );
        Ok(())
    }

    /// Returns all goals of a user, ordered by key.
    pub fn list_goals(&self, user_id: &str) -> Result<Vec<Goal>, StoreError> {
        let tree = self.db.open_tree(GOALS_TREE)?;
        let mut out = Vec::new();
        for item in tree.scan_prefix(user_prefix(user_id)) {
            let (_k, v) = item?;
            out.push(serde_json::from_slice(&v)?);
        }
        Ok(out)
    }

    /// Stores the encrypted refresh-token blob for `user_id`, replacing any previous one.
    pub fn put_calendar_credential(&self, user_id: &str, blob: &str) -> Result<(), StoreError> {
        let tree = self.db.open_tree(CREDENTIALS_TREE)?;
        let prev = tree.insert(user_id.as_bytes(), blob.as_bytes())?;
        tracing::info!(
            target: "present::store",
            user_id = user_id,
            action = if prev.is_some() { "UPDATE" } else { "INSERT" },
            "Calendar credential stored"
        );
        Ok(())
    }

    /// Removes the stored credential. Returns whether one existed.
    pub fn remove_calendar_credential(&self, user_id: &str) -> Result<bool, StoreError> {
        let tree = self.db.open_tree(CREDENTIALS_TREE)?;
        let prev = tree.remove(user_id.as_bytes())?;
        if prev.is_some() {
            tracing::info!(target: "present::store", user_id = user_id, action = "REMOVE", "Calendar credential removed");
        }
        Ok(prev.is_some())
    }

    /// Flushes pending writes; used by the pre-flight check.
    pub fn flush(&self) -> Result<usize, StoreError> {
        Ok(self.db.flush()?)
    }
}

impl GoalStore for SledStore {
    fn get_goal(&self, user_id: &str, goal_id: &str) -> Result<Option<Goal>, StoreError> {
        let tree = self.db.open_tree(GOALS_TREE)?;
        match tree.get(goal_key(user_id, goal_id))? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }
}

impl CredentialStore for SledStore {
    fn get_calendar_credential(&self, user_id: &str) -> Result<Option<String>, StoreError> {
        let tree = self.db.open_tree(CREDENTIALS_TREE)?;
        Ok(tree
            .get(user_id.as_bytes())?
            .and_then(|v| String::from_utf8(v.to_vec()).ok())
            .filter(|s| !s.is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn goal(id: &str, name: &str) -> Goal {
        Goal {
            id: id.into(),
            name: name.into(),
            avatar: Some("Sage".into()),
            description: None,
        }
    }

    #[test]
    fn goals_are_scoped_per_user() {
        let dir = tempfile::tempdir().unwrap();
        let store = SledStore::open_path(dir.path()).unwrap();
        store.put_goal("alice", &goal("g1", "Write a book")).unwrap();
        store.put_goal("alice", &goal("g2", "Learn piano")).unwrap();
        store.put_goal("bob", &goal("g1", "Run")).unwrap();

        assert_eq!(
            store.get_goal("alice", "g1").unwrap(),
            Some(goal("g1", "Write a book"))
        );
        assert_eq!(store.get_goal("bob", "g1").unwrap().unwrap().name, "Run");
        assert_eq!(store.get_goal("carol", "g1").unwrap(), None);
        assert_eq!(store.list_goals("alice").unwrap().len(), 2);
        assert_eq!(store.list_goals("bob").unwrap().len(), 1);
    }

    #[test]
    fn separators_in_ids_cannot_reach_another_users_goals() {
        let dir = tempfile::tempdir().unwrap();
        let store = SledStore::open_path(dir.path()).unwrap();
        store.put_goal("alice/bob", &goal("secret", "Bob private")).unwrap();
        store.put_goal("carol", &goal("x\0y", "Carol")).unwrap();

        assert_eq!(store.get_goal("alice", "bob/secret").unwrap(), None);
        assert!(store.list_goals("alice").unwrap().is_empty());
        assert_eq!(store.get_goal("carol\0x", "y").unwrap(), None);
        assert!(store.list_goals("caro").unwrap().is_empty());
        assert_eq!(
            store.get_goal("alice/bob", "secret").unwrap().unwrap().name,
            "Bob private"
        );
        assert_eq!(store.list_goals("carol").unwrap().len(), 1);
    }

    #[test]
    fn credentials_round_trip_and_remove() {
        let dir = tempfile::tempdir().unwrap();
        let store = SledStore::open_path(dir.path()).unwrap();
        assert_eq!(store.get_calendar_credential("alice").unwrap(), None);

        store.put_calendar_credential("alice", "deadbeef").unwrap();
        assert_eq!(
            store.get_calendar_credential("alice").unwrap().as_deref(),
            Some("deadbeef")
        );
        assert!(store.remove_calendar_credential("alice").unwrap());
        assert!(!store.remove_calendar_credential("alice").unwrap());
        assert_eq!(store.get_calendar_credential("alice").unwrap(), None);
    }

    #[tokio::test]
    async fn run_blocking_returns_results_and_worker_failures() {
        let dir = tempfile::tempdir().unwrap();
        let store = std::sync::Arc::new(SledStore::open_path(dir.path()).unwrap());
        store.put_goal("alice", &goal("g1", "Write a book")).unwrap();

        let s = store.clone();
        let found = run_blocking(move || s.get_goal("alice", "g1")).await.unwrap();
        assert_eq!(found.unwrap().name, "Write a book");

        let err = run_blocking(|| -> Result<(), StoreError> { panic!("worker died") })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Worker(_)));
    }

    #[test]
    fn corrupt_goal_record_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = SledStore::open_path(dir.path()).unwrap();
        store
            .db
            .open_tree(GOALS_TREE)
            .unwrap()
            .insert(goal_key("alice", "bad"), "{not json")
            .unwrap();
        assert!(matches!(
            store.get_goal("alice", "bad"),
            Err(StoreError::Serde(_))
        ));
    }
}
