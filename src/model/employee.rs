use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Directory entry used as a label source for leave entry and filtering.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(example = json!({ "id": 1, "name": "Ayu" }))]
pub struct Employee {
    #[schema(example = 1)]
    pub id: u64,

    #[schema(example = "Ayu")]
    pub name: String,
}
