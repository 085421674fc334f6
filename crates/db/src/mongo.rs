//! Live backend over the official MongoDB driver.

use async_trait::async_trait;
use mongodb::bson::{doc, Document};
use mongodb::error::{CommandError, Error as DriverError, ErrorKind};
use mongodb::options::{
    ClientOptions, CreateCollectionOptions, IndexOptions, ValidationAction, ValidationLevel,
};
use mongodb::{Client, IndexModel};
use orcatrack_kernel::schema::{Account, CollectionSchema, IndexSpec};
use orcatrack_kernel::{ProvisionError, ProvisionResult};

use crate::document::{create_user_command, index_keys, validator_document};
use crate::store::{Cluster, Database};

// Server error codes the provisioning steps can run into.
const UNAUTHORIZED: i32 = 13;
const AUTHENTICATION_FAILED: i32 = 18;
const NAMESPACE_EXISTS: i32 = 48;
const INDEX_OPTIONS_CONFLICT: i32 = 85;
const INDEX_KEY_SPECS_CONFLICT: i32 = 86;
const DUPLICATE_KEY: i32 = 11000;
const USER_ALREADY_EXISTS: i32 = 51003;

/// Principal the client authenticates as, for error reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Login {
    user: String,
    source: String,
}

impl Login {
    fn from_options(options: &ClientOptions) -> Self {
        let credential = options.credential.as_ref();
        Self {
            user: credential
                .and_then(|credential| credential.username.clone())
                .unwrap_or_else(|| "anonymous".to_string()),
            source: credential
                .and_then(|credential| credential.source.clone())
                .unwrap_or_else(|| "admin".to_string()),
        }
    }
}

/// Client connected to a MongoDB deployment.
#[derive(Clone)]
pub struct MongoCluster {
    client: Client,
    login: Login,
}

impl MongoCluster {
    /// Parse `uri`, tag the connection with `app_name`, and build a client.
    /// The driver connects lazily; call [`MongoCluster::ping`] to fail fast.
    pub async fn connect(uri: &str, app_name: &str) -> ProvisionResult<Self> {
        let mut options = ClientOptions::parse(uri)
            .await
            .map_err(|err| ProvisionError::Connection(err.to_string()))?;
        options.app_name = Some(app_name.to_string());
        let login = Login::from_options(&options);

        let client =
            Client::with_options(options).map_err(|err| ProvisionError::Connection(err.to_string()))?;

        Ok(Self { client, login })
    }

    /// Round-trip to the server; the handshake (and authentication) happens here.
    pub async fn ping(&self) -> ProvisionResult<()> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 }, None)
            .await
            .map(|_| ())
            .map_err(|err| map_failure(Failure::classify(&err), "ping", "admin", &self.login))
    }
}

impl Cluster for MongoCluster {
    type Database = MongoDatabase;

    fn database(&self, name: &str) -> MongoDatabase {
        MongoDatabase {
            name: name.to_string(),
            inner: self.client.database(name),
            login: self.login.clone(),
        }
    }
}

/// Handle scoped to one MongoDB database.
#[derive(Clone)]
pub struct MongoDatabase {
    name: String,
    inner: mongodb::Database,
    login: Login,
}

impl MongoDatabase {
    fn map_error(&self, err: DriverError, command: &str) -> ProvisionError {
        map_failure(Failure::classify(&err), command, &self.name, &self.login)
    }
}

#[async_trait]
impl Database for MongoDatabase {
    fn name(&self) -> &str {
        &self.name
    }

    async fn create_account(&self, account: &Account) -> ProvisionResult<()> {
        match self.inner.run_command(create_user_command(account), None).await {
            Ok(_) => Ok(()),
            Err(err) => match Failure::classify(&err).code() {
                Some(USER_ALREADY_EXISTS) | Some(DUPLICATE_KEY) => {
                    Err(ProvisionError::DuplicateAccount {
                        database: self.name.clone(),
                        name: account.name.clone(),
                    })
                }
                _ => Err(self.map_error(err, "createUser")),
            },
        }
    }

    async fn create_collection(&self, schema: &CollectionSchema) -> ProvisionResult<()> {
        let options = CreateCollectionOptions::builder()
            .validator(validator_document(schema))
            .validation_level(ValidationLevel::Strict)
            .validation_action(ValidationAction::Error)
            .build();

        match self.inner.create_collection(&schema.collection, options).await {
            Ok(()) => Ok(()),
            Err(err) if Failure::classify(&err).code() == Some(NAMESPACE_EXISTS) => {
                Err(ProvisionError::CollectionExists {
                    database: self.name.clone(),
                    collection: schema.collection.clone(),
                })
            }
            Err(err) => Err(self.map_error(err, "createCollection")),
        }
    }

    async fn create_index(&self, collection: &str, index: &IndexSpec) -> ProvisionResult<()> {
        let options = IndexOptions::builder()
            .name(index.name())
            .unique(index.unique)
            .build();
        let model = IndexModel::builder()
            .keys(index_keys(index))
            .options(options)
            .build();

        let result = self
            .inner
            .collection::<Document>(collection)
            .create_index(model, None)
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(err) => Err(index_failure(
                Failure::classify(&err),
                collection,
                index,
                &self.name,
                &self.login,
            )),
        }
    }

    async fn account_names(&self) -> ProvisionResult<Vec<String>> {
        let reply = self
            .inner
            .run_command(doc! { "usersInfo": 1 }, None)
            .await
            .map_err(|err| self.map_error(err, "usersInfo"))?;

        let users = reply
            .get_array("users")
            .map_err(|err| malformed_reply("usersInfo", err))?;

        users
            .iter()
            .map(|user| {
                user.as_document()
                    .and_then(|user| user.get_str("user").ok())
                    .map(str::to_string)
                    .ok_or_else(|| malformed_reply("usersInfo", "user entry without a name"))
            })
            .collect()
    }

    async fn collection_names(&self) -> ProvisionResult<Vec<String>> {
        self.inner
            .list_collection_names(None)
            .await
            .map_err(|err| self.map_error(err, "listCollections"))
    }

    async fn index_names(&self, collection: &str) -> ProvisionResult<Vec<String>> {
        self.inner
            .collection::<Document>(collection)
            .list_index_names()
            .await
            .map_err(|err| self.map_error(err, "listIndexes"))
    }
}

/// Driver failure reduced to what the mapping below needs.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Failure {
    Command { code: i32, message: String },
    Authentication(String),
    Other(String),
}

impl Failure {
    fn classify(err: &DriverError) -> Self {
        match err.kind.as_ref() {
            ErrorKind::Command(CommandError { code, message, .. }) => Failure::Command {
                code: *code,
                message: message.clone(),
            },
            // handshake failures (SCRAM, x509) never reach a command reply
            ErrorKind::Authentication { .. } => Failure::Authentication(err.to_string()),
            _ => Failure::Other(err.to_string()),
        }
    }

    fn code(&self) -> Option<i32> {
        match self {
            Failure::Command { code, .. } => Some(*code),
            _ => None,
        }
    }
}

/// Translate failures that no step handles specifically.
fn map_failure(failure: Failure, command: &str, database: &str, login: &Login) -> ProvisionError {
    match failure {
        Failure::Command {
            code: UNAUTHORIZED, ..
        } => ProvisionError::Unauthorized {
            principal: format!("{}@{}", login.user, login.source),
            action: command.to_string(),
            database: database.to_string(),
        },
        Failure::Command {
            code: AUTHENTICATION_FAILED,
            ..
        }
        | Failure::Authentication(_) => ProvisionError::AuthenticationFailed {
            database: login.source.clone(),
            name: login.user.clone(),
        },
        Failure::Command { code, message } => ProvisionError::Command {
            command: command.to_string(),
            code,
            message,
        },
        Failure::Other(message) => ProvisionError::Connection(message),
    }
}

/// Index builds add conflicts and duplicate data on top of the general mapping.
fn index_failure(
    failure: Failure,
    collection: &str,
    index: &IndexSpec,
    database: &str,
    login: &Login,
) -> ProvisionError {
    match failure {
        Failure::Command {
            code: INDEX_OPTIONS_CONFLICT | INDEX_KEY_SPECS_CONFLICT,
            message,
        } => ProvisionError::IndexConflict {
            collection: collection.to_string(),
            index: index.name(),
            message,
        },
        Failure::Command {
            code: DUPLICATE_KEY,
            ..
        } => ProvisionError::DuplicateKey {
            collection: collection.to_string(),
            index: index.name(),
        },
        other => map_failure(other, "createIndexes", database, login),
    }
}

fn malformed_reply(command: &str, detail: impl std::fmt::Display) -> ProvisionError {
    ProvisionError::Command {
        command: command.to_string(),
        code: 0,
        message: format!("unexpected reply: {}", detail),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn malformed_uri_is_a_connection_error() {
        let err = MongoCluster::connect("not-a-mongodb-uri", "test")
            .await
            .err()
            .unwrap();
        assert!(matches!(err, ProvisionError::Connection(_)));
    }

    #[tokio::test]
    async fn handles_are_bound_to_their_database() {
        let cluster = MongoCluster::connect("mongodb://127.0.0.1:27017", "test")
            .await
            .unwrap();

        assert_eq!(cluster.database("admin").name(), "admin");
        assert_eq!(cluster.database("orcatrack").name(), "orcatrack");
    }

    fn login() -> Login {
        Login {
            user: "root".to_string(),
            source: "admin".to_string(),
        }
    }

    #[tokio::test]
    async fn login_comes_from_uri_credentials() {
        let options = ClientOptions::parse("mongodb://root:pw@127.0.0.1:27017/?authSource=ops")
            .await
            .unwrap();
        assert_eq!(
            Login::from_options(&options),
            Login {
                user: "root".to_string(),
                source: "ops".to_string(),
            }
        );

        let anonymous = ClientOptions::parse("mongodb://127.0.0.1:27017").await.unwrap();
        assert_eq!(Login::from_options(&anonymous).user, "anonymous");
    }

    #[test]
    fn handshake_authentication_failure_maps_to_authentication_failed() {
        let failure = Failure::Authentication("SCRAM failure: bad auth".to_string());
        assert_eq!(
            map_failure(failure, "ping", "admin", &login()),
            ProvisionError::AuthenticationFailed {
                database: "admin".to_string(),
                name: "root".to_string(),
            }
        );

        let failure = Failure::Command {
            code: AUTHENTICATION_FAILED,
            message: "Authentication failed.".to_string(),
        };
        assert!(matches!(
            map_failure(failure, "ping", "admin", &login()),
            ProvisionError::AuthenticationFailed { .. }
        ));
    }

    #[test]
    fn general_mapping_covers_authorization_commands_and_transport() {
        let unauthorized = Failure::Command {
            code: UNAUTHORIZED,
            message: "not authorized".to_string(),
        };
        assert_eq!(
            map_failure(unauthorized, "createUser", "orcatrack", &login()),
            ProvisionError::Unauthorized {
                principal: "root@admin".to_string(),
                action: "createUser".to_string(),
                database: "orcatrack".to_string(),
            }
        );

        let other = Failure::Command {
            code: 2,
            message: "bad value".to_string(),
        };
        assert!(matches!(
            map_failure(other, "createUser", "orcatrack", &login()),
            ProvisionError::Command { code: 2, .. }
        ));

        let transport = Failure::Other("server selection timeout".to_string());
        assert_eq!(
            map_failure(transport, "ping", "admin", &login()),
            ProvisionError::Connection("server selection timeout".to_string())
        );
    }

    #[test]
    fn index_build_over_duplicate_data_is_a_duplicate_key() {
        let index = IndexSpec::ascending("email").unique();
        let failure = Failure::Command {
            code: DUPLICATE_KEY,
            message: "E11000 duplicate key error".to_string(),
        };
        assert_eq!(
            index_failure(failure, "users", &index, "orcatrack", &login()),
            ProvisionError::DuplicateKey {
                collection: "users".to_string(),
                index: "email_1".to_string(),
            }
        );

        let conflict = Failure::Command {
            code: INDEX_OPTIONS_CONFLICT,
            message: "Index already exists with different options".to_string(),
        };
        assert!(matches!(
            index_failure(conflict, "users", &index, "orcatrack", &login()),
            ProvisionError::IndexConflict { .. }
        ));
    }

    #[test]
    fn malformed_reply_is_a_command_error() {
        let err = malformed_reply("usersInfo", "missing users");
        assert_eq!(
            err.to_string(),
            "command 'usersInfo' failed with code 0: unexpected reply: missing users"
        );
    }
}
