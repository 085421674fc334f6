use orcatrack_kernel::schema::{BsonType, CollectionSchema, IndexSpec};
use orcatrack_kernel::{Module, PlanCtx, Step};

pub const COLLECTION: &str = "users";

/// The validated `users` collection and its indexes
pub struct UsersModule;

impl UsersModule {
    pub const fn new() -> Self {
        Self
    }

    pub fn schema() -> CollectionSchema {
        CollectionSchema::new(COLLECTION)
            .required("email", BsonType::String)
            .required("createdAt", BsonType::Date)
    }

    pub fn indexes() -> Vec<IndexSpec> {
        vec![
            IndexSpec::ascending("email").unique(),
            IndexSpec::descending("createdAt"),
        ]
    }
}

impl Default for UsersModule {
    fn default() -> Self {
        Self::new()
    }
}

impl Module for UsersModule {
    fn name(&self) -> &'static str {
        "users"
    }

    fn steps(&self, _ctx: &PlanCtx<'_>) -> Vec<Step> {
        let mut steps = vec![Step::CreateCollection {
            schema: Self::schema(),
        }];
        steps.extend(Self::indexes().into_iter().map(|index| Step::CreateIndex {
            collection: COLLECTION.to_string(),
            index,
        }));
        steps
    }
}
