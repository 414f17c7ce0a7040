//! Recipes and comments, as far as account management and moderation need them.

mod memory;
mod repo;
pub mod repo_types;

use async_trait::async_trait;
use uuid::Uuid;

pub use memory::MemoryContentStore;
pub use repo::PgContentStore;
pub use repo_types::{DeletedContent, RecipeChanges, RecipeListing};

#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Newest first; `None` lists everything.
    async fn list_recipes(&self, limit: Option<i64>) -> anyhow::Result<Vec<RecipeListing>>;

    /// Apply only the fields set in `changes`. `None` if no such recipe.
    async fn update_recipe(
        &self,
        id: Uuid,
        changes: RecipeChanges,
    ) -> anyhow::Result<Option<RecipeListing>>;

    /// Remove a recipe and its comments. Returns the number of comments
    /// removed, or `None` if no such recipe.
    async fn delete_recipe(&self, id: Uuid) -> anyhow::Result<Option<u64>>;

    /// Remove the user together with every recipe and comment they authored,
    /// plus comments left by others on those recipes, as one unit. `None` if
    /// the user does not exist.
    async fn delete_user_cascade(&self, user_id: Uuid) -> anyhow::Result<Option<DeletedContent>>;

    async fn count_recipes(&self) -> anyhow::Result<i64>;
}
