//! Rendering of typed provisioning records into BSON documents.

use mongodb::bson::{doc, Bson, Document};
use orcatrack_kernel::schema::{Account, BsonType, CollectionSchema, IndexSpec};

/// `{ $jsonSchema: { bsonType: "object", required: [...], properties: {...} } }`
///
/// `required` is left out when no field is required; the server rejects an
/// empty array there.
pub fn validator_document(schema: &CollectionSchema) -> Document {
    let required: Vec<Bson> = schema
        .required_fields()
        .map(|field| Bson::String(field.name.clone()))
        .collect();

    let mut properties = Document::new();
    for field in &schema.fields {
        properties.insert(
            field.name.clone(),
            doc! {
                "bsonType": field.bson_type.as_str(),
                "description": field.description.clone(),
            },
        );
    }

    let mut json_schema = doc! { "bsonType": "object" };
    if !required.is_empty() {
        json_schema.insert("required", required);
    }
    json_schema.insert("properties", properties);

    doc! { "$jsonSchema": json_schema }
}

pub fn index_keys(index: &IndexSpec) -> Document {
    let mut keys = Document::new();
    keys.insert(index.field.clone(), index.direction.as_i32());
    keys
}

pub fn role_documents(account: &Account) -> Vec<Bson> {
    account
        .roles
        .iter()
        .map(|grant| {
            Bson::Document(doc! {
                "role": grant.role.as_str(),
                "db": grant.db.clone(),
            })
        })
        .collect()
}

/// `createUser` command body. Carries the clear-text credential.
pub fn create_user_command(account: &Account) -> Document {
    doc! {
        "createUser": account.name.clone(),
        "pwd": account.credential.expose(),
        "roles": role_documents(account),
    }
}

pub fn matches_type(value: &Bson, bson_type: BsonType) -> bool {
    matches!(
        (bson_type, value),
        (BsonType::String, Bson::String(_))
            | (BsonType::Date, Bson::DateTime(_))
            | (BsonType::Int, Bson::Int32(_))
            | (BsonType::Long, Bson::Int64(_))
            | (BsonType::Double, Bson::Double(_))
            | (BsonType::Bool, Bson::Boolean(_))
            | (BsonType::ObjectId, Bson::ObjectId(_))
            | (BsonType::Object, Bson::Document(_))
            | (BsonType::Array, Bson::Array(_))
    )
}

/// Check a document against a schema, describing the first violation.
pub fn validate(schema: &CollectionSchema, document: &Document) -> Result<(), String> {
    for field in &schema.fields {
        match document.get(&field.name) {
            None if field.required => {
                return Err(format!("missing required field '{}'", field.name));
            }
            None => {}
            Some(value) if !matches_type(value, field.bson_type) => {
                return Err(format!(
                    "field '{}' must be of bsonType '{}'",
                    field.name, field.bson_type
                ));
            }
            Some(_) => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::DateTime;
    use orcatrack_kernel::schema::{Credential, Role};

    fn users_schema() -> CollectionSchema {
        CollectionSchema::new("users")
            .required("email", BsonType::String)
            .required("createdAt", BsonType::Date)
    }

    #[test]
    fn validator_document_matches_json_schema_shape() {
        let validator = validator_document(&users_schema());
        let json_schema = validator.get_document("$jsonSchema").unwrap();

        assert_eq!(json_schema.get_str("bsonType").unwrap(), "object");
        let required: Vec<&str> = json_schema
            .get_array("required")
            .unwrap()
            .iter()
            .filter_map(Bson::as_str)
            .collect();
        assert_eq!(required, vec!["email", "createdAt"]);

        let created_at = json_schema
            .get_document("properties")
            .unwrap()
            .get_document("createdAt")
            .unwrap();
        assert_eq!(created_at.get_str("bsonType").unwrap(), "date");
        assert_eq!(
            created_at.get_str("description").unwrap(),
            "must be a date and is required"
        );
    }

    #[test]
    fn validator_without_required_fields_omits_required() {
        let validator = validator_document(&CollectionSchema::new("audit"));
        let json_schema = validator.get_document("$jsonSchema").unwrap();

        assert!(!json_schema.contains_key("required"));
        assert_eq!(json_schema.get_str("bsonType").unwrap(), "object");
        assert!(json_schema.get_document("properties").unwrap().is_empty());
    }

    #[test]
    fn index_keys_carry_direction() {
        assert_eq!(
            index_keys(&IndexSpec::descending("createdAt")),
            doc! { "createdAt": -1 }
        );
        assert_eq!(
            index_keys(&IndexSpec::ascending("email").unique()),
            doc! { "email": 1 }
        );
    }

    #[test]
    fn create_user_command_lists_roles() {
        let account = Account::new("monitoring_user", Credential::new("pw"))
            .grant(Role::ClusterMonitor, "admin")
            .grant(Role::Read, "local");

        let command = create_user_command(&account);
        assert_eq!(command.get_str("createUser").unwrap(), "monitoring_user");
        assert_eq!(command.get_str("pwd").unwrap(), "pw");
        assert_eq!(
            command.get_array("roles").unwrap(),
            &vec![
                Bson::Document(doc! { "role": "clusterMonitor", "db": "admin" }),
                Bson::Document(doc! { "role": "read", "db": "local" }),
            ]
        );
    }

    #[test]
    fn validate_reports_missing_and_mistyped_fields() {
        let schema = users_schema();

        let ok = doc! { "email": "a@example.com", "createdAt": DateTime::now() };
        assert!(validate(&schema, &ok).is_ok());

        let missing = doc! { "email": "a@example.com" };
        assert_eq!(
            validate(&schema, &missing).unwrap_err(),
            "missing required field 'createdAt'"
        );

        let mistyped = doc! { "email": 42, "createdAt": DateTime::now() };
        assert_eq!(
            validate(&schema, &mistyped).unwrap_err(),
            "field 'email' must be of bsonType 'string'"
        );
    }

    #[test]
    fn extra_fields_are_allowed() {
        let doc = doc! {
            "email": "a@example.com",
            "createdAt": DateTime::now(),
            "nickname": "orca",
        };
        assert!(validate(&users_schema(), &doc).is_ok());
    }
}
