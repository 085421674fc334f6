//! In-process engine with the same provisioning semantics as the live
//! backend. Backs `--dry-run` and lets tests exercise validators, unique
//! indexes, and role grants without a server.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use mongodb::bson::oid::ObjectId;
use mongodb::bson::{Bson, Document};
use orcatrack_kernel::schema::{Account, CollectionSchema, Credential, IndexSpec, Role, RoleGrant};
use orcatrack_kernel::{ProvisionError, ProvisionResult};

use crate::document::validate;
use crate::store::{Cluster, Database};

const ADMIN_DATABASE: &str = "admin";
const ID_FIELD: &str = "_id";
const ID_INDEX: &str = "_id_";
const ROLE_NOT_FOUND: i32 = 31;
const NAMESPACE_NOT_FOUND: i32 = 26;

/// Operations a session can be authorized for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Find,
    Insert,
    ServerStatus,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Find => "find",
            Action::Insert => "insert",
            Action::ServerStatus => "serverStatus",
        }
    }
}

/// Whether `grant` allows `action` on `database`.
///
/// Cluster-wide roles (`backup`, `restore`, `clusterMonitor`) apply to every
/// database; the others only to the database named in the grant.
pub fn permits(grant: &RoleGrant, action: Action, database: &str) -> bool {
    let same_db = grant.db == database;
    match grant.role {
        Role::Read => same_db && action == Action::Find,
        Role::ReadWrite => same_db && matches!(action, Action::Find | Action::Insert),
        Role::DbAdmin => false,
        Role::ClusterMonitor => action == Action::ServerStatus,
        Role::Backup => action == Action::Find,
        Role::Restore => action == Action::Insert,
    }
}

fn is_cluster_role(role: Role) -> bool {
    matches!(role, Role::Backup | Role::Restore | Role::ClusterMonitor)
}

#[derive(Debug)]
struct StoredAccount {
    credential: Credential,
    roles: Vec<RoleGrant>,
}

#[derive(Debug, Default)]
struct CollectionState {
    validator: Option<CollectionSchema>,
    indexes: Vec<IndexSpec>,
    documents: Vec<Document>,
}

impl CollectionState {
    fn index(&self, name: &str) -> Option<&IndexSpec> {
        self.indexes.iter().find(|index| index.name() == name)
    }

    fn duplicate_for(&self, index: &IndexSpec, value: &Bson) -> bool {
        self.documents
            .iter()
            .any(|existing| existing.get(&index.field).unwrap_or(&Bson::Null) == value)
    }
}

#[derive(Debug, Default)]
struct DatabaseState {
    accounts: BTreeMap<String, StoredAccount>,
    collections: BTreeMap<String, CollectionState>,
}

#[derive(Debug, Default)]
struct State {
    databases: BTreeMap<String, DatabaseState>,
}

/// Shared in-memory deployment; clones see the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryCluster {
    state: Arc<Mutex<State>>,
}

impl MemoryCluster {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        lock_state(&self.state)
    }

    /// Log in as `name` defined in `database`.
    pub fn authenticate(
        &self,
        database: &str,
        name: &str,
        password: &str,
    ) -> ProvisionResult<MemorySession> {
        let state = self.lock();
        let account = state
            .databases
            .get(database)
            .and_then(|db| db.accounts.get(name))
            .filter(|account| account.credential.expose() == password)
            .ok_or_else(|| ProvisionError::AuthenticationFailed {
                database: database.to_string(),
                name: name.to_string(),
            })?;

        Ok(MemorySession {
            cluster: self.clone(),
            principal: format!("{}@{}", name, database),
            roles: account.roles.clone(),
        })
    }

    pub fn document_count(&self, database: &str, collection: &str) -> usize {
        self.lock()
            .databases
            .get(database)
            .and_then(|db| db.collections.get(collection))
            .map_or(0, |collection| collection.documents.len())
    }
}

impl Cluster for MemoryCluster {
    type Database = MemoryDatabase;

    fn database(&self, name: &str) -> MemoryDatabase {
        MemoryDatabase {
            name: name.to_string(),
            state: Arc::clone(&self.state),
        }
    }
}

/// Unauthenticated, fully privileged handle used by the initializer.
#[derive(Debug, Clone)]
pub struct MemoryDatabase {
    name: String,
    state: Arc<Mutex<State>>,
}

#[async_trait]
impl Database for MemoryDatabase {
    fn name(&self) -> &str {
        &self.name
    }

    async fn create_account(&self, account: &Account) -> ProvisionResult<()> {
        if let Some(grant) = account
            .roles
            .iter()
            .find(|grant| is_cluster_role(grant.role) && grant.db != ADMIN_DATABASE)
        {
            return Err(ProvisionError::Command {
                command: "createUser".to_string(),
                code: ROLE_NOT_FOUND,
                message: format!("No role named {}@{}", grant.role, grant.db),
            });
        }

        let mut state = lock_state(&self.state);
        let db = state.databases.entry(self.name.clone()).or_default();
        if db.accounts.contains_key(&account.name) {
            return Err(ProvisionError::DuplicateAccount {
                database: self.name.clone(),
                name: account.name.clone(),
            });
        }

        db.accounts.insert(
            account.name.clone(),
            StoredAccount {
                credential: account.credential.clone(),
                roles: account.roles.clone(),
            },
        );
        Ok(())
    }

    async fn create_collection(&self, schema: &CollectionSchema) -> ProvisionResult<()> {
        let mut state = lock_state(&self.state);
        let db = state.databases.entry(self.name.clone()).or_default();
        if db.collections.contains_key(&schema.collection) {
            return Err(ProvisionError::CollectionExists {
                database: self.name.clone(),
                collection: schema.collection.clone(),
            });
        }

        db.collections.insert(
            schema.collection.clone(),
            CollectionState {
                validator: Some(schema.clone()),
                ..CollectionState::default()
            },
        );
        Ok(())
    }

    async fn create_index(&self, collection: &str, index: &IndexSpec) -> ProvisionResult<()> {
        let mut state = lock_state(&self.state);
        // like the engine, building an index creates a missing collection
        let target = state
            .databases
            .entry(self.name.clone())
            .or_default()
            .collections
            .entry(collection.to_string())
            .or_default();

        let name = index.name();
        let conflict = |message: &str| ProvisionError::IndexConflict {
            collection: collection.to_string(),
            index: name.clone(),
            message: message.to_string(),
        };

        if let Some(existing) = target
            .indexes
            .iter()
            .find(|existing| existing.name() == name || existing.same_keys(index))
        {
            if existing == index {
                return Ok(());
            }
            if existing.same_keys(index) {
                return Err(conflict("an index with the same keys but different options exists"));
            }
            return Err(conflict("an index with the same name but different keys exists"));
        }

        if index.unique {
            let mut seen: Vec<&Bson> = Vec::new();
            for document in &target.documents {
                let value = document.get(&index.field).unwrap_or(&Bson::Null);
                if seen.contains(&value) {
                    return Err(ProvisionError::DuplicateKey {
                        collection: collection.to_string(),
                        index: name,
                    });
                }
                seen.push(value);
            }
        }

        target.indexes.push(index.clone());
        Ok(())
    }

    async fn account_names(&self) -> ProvisionResult<Vec<String>> {
        let state = lock_state(&self.state);
        Ok(state
            .databases
            .get(&self.name)
            .map(|db| db.accounts.keys().cloned().collect())
            .unwrap_or_default())
    }

    async fn collection_names(&self) -> ProvisionResult<Vec<String>> {
        let state = lock_state(&self.state);
        Ok(state
            .databases
            .get(&self.name)
            .map(|db| db.collections.keys().cloned().collect())
            .unwrap_or_default())
    }

    async fn index_names(&self, collection: &str) -> ProvisionResult<Vec<String>> {
        let state = lock_state(&self.state);
        let target = state
            .databases
            .get(&self.name)
            .and_then(|db| db.collections.get(collection))
            .ok_or_else(|| ProvisionError::Command {
                command: "listIndexes".to_string(),
                code: NAMESPACE_NOT_FOUND,
                message: format!("ns does not exist: {}.{}", self.name, collection),
            })?;

        let mut names = vec![ID_INDEX.to_string()];
        names.extend(target.indexes.iter().map(IndexSpec::name));
        Ok(names)
    }
}

/// Authenticated session; every operation is checked against its roles.
#[derive(Debug, Clone)]
pub struct MemorySession {
    cluster: MemoryCluster,
    principal: String,
    roles: Vec<RoleGrant>,
}

impl MemorySession {
    fn authorize(&self, action: Action, database: &str) -> ProvisionResult<()> {
        if self
            .roles
            .iter()
            .any(|grant| permits(grant, action, database))
        {
            Ok(())
        } else {
            Err(ProvisionError::Unauthorized {
                principal: self.principal.clone(),
                action: action.as_str().to_string(),
                database: database.to_string(),
            })
        }
    }

    pub fn server_status(&self) -> ProvisionResult<Document> {
        self.authorize(Action::ServerStatus, ADMIN_DATABASE)?;
        let state = self.cluster.lock();
        let mut status = Document::new();
        status.insert("ok", 1);
        status.insert("databases", state.databases.len() as i64);
        Ok(status)
    }

    /// Insert a document, enforcing the collection validator, `_id`
    /// uniqueness, and every unique index. Assigns an `_id` when missing.
    pub fn insert_one(
        &self,
        database: &str,
        collection: &str,
        mut document: Document,
    ) -> ProvisionResult<Bson> {
        self.authorize(Action::Insert, database)?;

        let mut state = self.cluster.lock();
        let target = state
            .databases
            .entry(database.to_string())
            .or_default()
            .collections
            .entry(collection.to_string())
            .or_default();

        if let Some(schema) = &target.validator {
            validate(schema, &document).map_err(|reason| ProvisionError::DocumentValidation {
                collection: collection.to_string(),
                reason,
            })?;
        }

        let id = match document.get(ID_FIELD) {
            Some(id) => id.clone(),
            None => {
                let id = Bson::ObjectId(ObjectId::new());
                document.insert(ID_FIELD, id.clone());
                id
            }
        };
        if target
            .documents
            .iter()
            .any(|existing| existing.get(ID_FIELD) == Some(&id))
        {
            return Err(ProvisionError::DuplicateKey {
                collection: collection.to_string(),
                index: ID_INDEX.to_string(),
            });
        }

        for index in target.indexes.iter().filter(|index| index.unique) {
            let value = document.get(&index.field).unwrap_or(&Bson::Null);
            if target.duplicate_for(index, value) {
                return Err(ProvisionError::DuplicateKey {
                    collection: collection.to_string(),
                    index: index.name(),
                });
            }
        }

        target.documents.push(document);
        Ok(id)
    }

    /// Find the first document whose `field` equals `value` (collection scan).
    pub fn find_one(
        &self,
        database: &str,
        collection: &str,
        field: &str,
        value: &Bson,
    ) -> ProvisionResult<Option<Document>> {
        self.authorize(Action::Find, database)?;

        let state = self.cluster.lock();
        Ok(state
            .databases
            .get(database)
            .and_then(|db| db.collections.get(collection))
            .and_then(|target| {
                target
                    .documents
                    .iter()
                    .find(|document| document.get(field) == Some(value))
                    .cloned()
            }))
    }

    /// Look a document up through the named index; fails when the index
    /// does not exist, as a hinted query does.
    pub fn find_one_with_hint(
        &self,
        database: &str,
        collection: &str,
        index_name: &str,
        value: &Bson,
    ) -> ProvisionResult<Option<Document>> {
        self.authorize(Action::Find, database)?;

        let state = self.cluster.lock();
        let target = state
            .databases
            .get(database)
            .and_then(|db| db.collections.get(collection));
        let index = target
            .and_then(|target| target.index(index_name))
            .ok_or_else(|| ProvisionError::IndexNotFound {
                collection: collection.to_string(),
                index: index_name.to_string(),
            })?;

        Ok(target.and_then(|target| {
            target
                .documents
                .iter()
                .find(|document| document.get(&index.field) == Some(value))
                .cloned()
        }))
    }
}

fn lock_state(state: &Mutex<State>) -> MutexGuard<'_, State> {
    // a panic while holding the lock leaves plain data behind; keep using it
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::{doc, DateTime};
    use orcatrack_kernel::schema::BsonType;

    fn users_schema() -> CollectionSchema {
        CollectionSchema::new("users")
            .required("email", BsonType::String)
            .required("createdAt", BsonType::Date)
    }

    #[test]
    fn grants_are_scoped_to_their_database() {
        let read_local = RoleGrant::new(Role::Read, "local");
        assert!(permits(&read_local, Action::Find, "local"));
        assert!(!permits(&read_local, Action::Find, "orcatrack"));
        assert!(!permits(&read_local, Action::Insert, "local"));

        let read_write = RoleGrant::new(Role::ReadWrite, "orcatrack");
        assert!(permits(&read_write, Action::Insert, "orcatrack"));
        assert!(!permits(&read_write, Action::Insert, "other"));
        assert!(!permits(&read_write, Action::ServerStatus, "admin"));

        let monitor = RoleGrant::new(Role::ClusterMonitor, "admin");
        assert!(permits(&monitor, Action::ServerStatus, "admin"));
        assert!(!permits(&monitor, Action::Insert, "orcatrack"));
    }

    #[tokio::test]
    async fn cluster_roles_must_be_granted_on_admin() {
        let cluster = MemoryCluster::new();
        let account = Account::new("ops", Credential::new("pw")).grant(Role::Backup, "orcatrack");

        let err = cluster
            .database("orcatrack")
            .create_account(&account)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ProvisionError::Command {
                code: ROLE_NOT_FOUND,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn identical_index_is_accepted_but_conflicting_one_is_not() {
        let cluster = MemoryCluster::new();
        let db = cluster.database("orcatrack");
        db.create_collection(&users_schema()).await.unwrap();

        let email = IndexSpec::ascending("email").unique();
        db.create_index("users", &email).await.unwrap();
        db.create_index("users", &email).await.unwrap();

        let err = db
            .create_index("users", &IndexSpec::ascending("email"))
            .await
            .unwrap_err();
        assert!(matches!(err, ProvisionError::IndexConflict { .. }));

        assert_eq!(
            db.index_names("users").await.unwrap(),
            vec!["_id_".to_string(), "email_1".to_string()]
        );
    }

    #[tokio::test]
    async fn unique_index_build_fails_on_existing_duplicates() {
        let cluster = MemoryCluster::new();
        let admin = cluster.database("admin");
        admin
            .create_account(
                &Account::new("restorer", Credential::new("pw")).grant(Role::Restore, "admin"),
            )
            .await
            .unwrap();
        let session = cluster.authenticate("admin", "restorer", "pw").unwrap();

        for _ in 0..2 {
            session
                .insert_one("orcatrack", "events", doc! { "kind": "login" })
                .unwrap();
        }

        let err = cluster
            .database("orcatrack")
            .create_index("events", &IndexSpec::ascending("kind").unique())
            .await
            .unwrap_err();
        assert!(matches!(err, ProvisionError::DuplicateKey { .. }));
    }

    #[tokio::test]
    async fn repeated_id_is_a_duplicate_key() {
        let cluster = MemoryCluster::new();
        cluster
            .database("admin")
            .create_account(
                &Account::new("restorer", Credential::new("pw")).grant(Role::Restore, "admin"),
            )
            .await
            .unwrap();
        let session = cluster.authenticate("admin", "restorer", "pw").unwrap();

        let id = session
            .insert_one("orcatrack", "events", doc! { "_id": "evt-1", "kind": "login" })
            .unwrap();
        assert_eq!(id, Bson::from("evt-1"));

        let err = session
            .insert_one("orcatrack", "events", doc! { "_id": "evt-1", "kind": "logout" })
            .unwrap_err();
        assert_eq!(
            err,
            ProvisionError::DuplicateKey {
                collection: "events".to_string(),
                index: "_id_".to_string(),
            }
        );
        assert_eq!(cluster.document_count("orcatrack", "events"), 1);

        // generated ids never collide
        let generated = session
            .insert_one("orcatrack", "events", doc! { "kind": "login" })
            .unwrap();
        assert!(matches!(generated, Bson::ObjectId(_)));
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_user_fail_alike() {
        let cluster = MemoryCluster::new();
        cluster
            .database("admin")
            .create_account(&Account::new("ops", Credential::new("right")))
            .await
            .unwrap();

        assert!(matches!(
            cluster.authenticate("admin", "ops", "wrong"),
            Err(ProvisionError::AuthenticationFailed { .. })
        ));
        assert!(matches!(
            cluster.authenticate("admin", "ghost", "right"),
            Err(ProvisionError::AuthenticationFailed { .. })
        ));
        // accounts are scoped to the database they were created in
        assert!(matches!(
            cluster.authenticate("orcatrack", "ops", "right"),
            Err(ProvisionError::AuthenticationFailed { .. })
        ));
    }

    #[tokio::test]
    async fn hinted_lookup_requires_the_index() {
        let cluster = MemoryCluster::new();
        let db = cluster.database("orcatrack");
        db.create_collection(&users_schema()).await.unwrap();
        db.create_account(
            &Account::new("app", Credential::new("pw")).grant(Role::ReadWrite, "orcatrack"),
        )
        .await
        .unwrap();

        let session = cluster.authenticate("orcatrack", "app", "pw").unwrap();
        session
            .insert_one(
                "orcatrack",
                "users",
                doc! { "email": "a@example.com", "createdAt": DateTime::now() },
            )
            .unwrap();

        let err = session
            .find_one_with_hint("orcatrack", "users", "email_1", &Bson::from("a@example.com"))
            .unwrap_err();
        assert!(matches!(err, ProvisionError::IndexNotFound { .. }));

        let found = session
            .find_one("orcatrack", "users", "email", &Bson::from("a@example.com"))
            .unwrap();
        assert!(found.is_some());
    }

    #[test]
    fn unauthenticated_collections_start_empty() {
        let cluster = MemoryCluster::new();
        assert_eq!(cluster.document_count("orcatrack", "users"), 0);
    }
}
