use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::auth::{memory::MemoryUserStore, repo::UserStore};
use crate::content::repo_types::{DeletedContent, Recipe, RecipeChanges, RecipeListing};
use crate::content::ContentStore;

#[derive(Debug, Clone, Copy)]
struct Comment {
    recipe: Uuid,
    author: Uuid,
}

#[derive(Default)]
struct Content {
    recipes: Vec<Recipe>,
    comments: Vec<Comment>,
}

/// In-process counterpart of `PgContentStore`. It shares the user store so an
/// account and its content disappear under one lock.
pub struct MemoryContentStore {
    users: Arc<MemoryUserStore>,
    inner: Mutex<Content>,
}

impl MemoryContentStore {
    pub fn new(users: Arc<MemoryUserStore>) -> Self {
        Self {
            users,
            inner: Mutex::default(),
        }
    }

    async fn with_author(&self, recipe: Recipe) -> anyhow::Result<RecipeListing> {
        let author = self
            .users
            .find_by_id(recipe.author_id)
            .await?
            .ok_or_else(|| anyhow!("recipe {} has no author", recipe.id))?;
        Ok(RecipeListing {
            recipe,
            author_username: author.username,
            author_email: author.email,
        })
    }

    #[cfg(test)]
    pub async fn add_recipe(&self, author: Uuid) -> Uuid {
        use crate::content::repo_types::{Category, Difficulty};
        use time::OffsetDateTime;

        let now = OffsetDateTime::now_utc();
        let id = Uuid::new_v4();
        self.inner.lock().await.recipes.push(Recipe {
            id,
            author_id: author,
            title: "Plain toast".into(),
            description: "Bread, heated until golden.".into(),
            ingredients: vec!["bread".into()],
            instructions: vec!["toast it".into()],
            category: Category::Breakfast,
            difficulty: Difficulty::Easy,
            prep_time: 1,
            cook_time: 3,
            servings: 1,
            created_at: now,
            updated_at: now,
        });
        id
    }

    #[cfg(test)]
    pub async fn add_comment(&self, recipe: Uuid, author: Uuid) {
        self.inner.lock().await.comments.push(Comment { recipe, author });
    }
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    async fn list_recipes(&self, limit: Option<i64>) -> anyhow::Result<Vec<RecipeListing>> {
        let mut recipes = self.inner.lock().await.recipes.clone();
        recipes.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        if let Some(limit) = limit {
            recipes.truncate(limit.max(0) as usize);
        }

        let mut listed = Vec::with_capacity(recipes.len());
        for recipe in recipes {
            listed.push(self.with_author(recipe).await?);
        }
        Ok(listed)
    }

    async fn update_recipe(
        &self,
        id: Uuid,
        changes: RecipeChanges,
    ) -> anyhow::Result<Option<RecipeListing>> {
        let updated = {
            let mut content = self.inner.lock().await;
            let Some(recipe) = content.recipes.iter_mut().find(|r| r.id == id) else {
                return Ok(None);
            };
            changes.apply_to(recipe);
            recipe.updated_at = time::OffsetDateTime::now_utc();
            recipe.clone()
        };
        Ok(Some(self.with_author(updated).await?))
    }

    async fn delete_recipe(&self, id: Uuid) -> anyhow::Result<Option<u64>> {
        let mut content = self.inner.lock().await;
        let before = content.recipes.len();
        content.recipes.retain(|r| r.id != id);
        if content.recipes.len() == before {
            return Ok(None);
        }

        let before = content.comments.len();
        content.comments.retain(|c| c.recipe != id);
        Ok(Some((before - content.comments.len()) as u64))
    }

    async fn delete_user_cascade(&self, user_id: Uuid) -> anyhow::Result<Option<DeletedContent>> {
        let mut content = self.inner.lock().await;
        if !self.users.remove(user_id).await {
            return Ok(None);
        }

        let owned: Vec<Uuid> = content
            .recipes
            .iter()
            .filter(|r| r.author_id == user_id)
            .map(|r| r.id)
            .collect();

        let before = content.comments.len();
        content
            .comments
            .retain(|c| c.author != user_id && !owned.contains(&c.recipe));
        let comments = (before - content.comments.len()) as u64;

        content.recipes.retain(|r| r.author_id != user_id);
        Ok(Some(DeletedContent {
            recipes: owned.len() as u64,
            comments,
        }))
    }

    async fn count_recipes(&self) -> anyhow::Result<i64> {
        Ok(self.inner.lock().await.recipes.len() as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::repo_types::{NewUser, Role};
    use crate::content::repo_types::Difficulty;

    async fn seeded() -> (MemoryContentStore, Uuid, Uuid) {
        let users = Arc::new(MemoryUserStore::new());
        let mut ids = Vec::new();
        for name in ["alice", "bob"] {
            let user = users
                .create(NewUser {
                    username: name.into(),
                    email: format!("{name}@b.com"),
                    password: "secret1".into(),
                    role: Role::User,
                    is_verified: true,
                    verification: None,
                })
                .await
                .unwrap();
            ids.push(user.id);
        }
        (MemoryContentStore::new(users), ids[0], ids[1])
    }

    #[tokio::test]
    async fn cascade_removes_account_authored_content_and_replies() {
        let (store, alice, bob) = seeded().await;
        let a1 = store.add_recipe(alice).await;
        let b1 = store.add_recipe(bob).await;
        store.add_comment(a1, bob).await; // goes with alice's recipe
        store.add_comment(b1, alice).await; // alice's own comment
        store.add_comment(b1, bob).await; // survives

        let deleted = store.delete_user_cascade(alice).await.unwrap();
        assert_eq!(deleted, Some(DeletedContent { recipes: 1, comments: 2 }));
        assert_eq!(store.count_recipes().await.unwrap(), 1);
        assert!(store.users.find_by_id(alice).await.unwrap().is_none());

        assert_eq!(store.delete_user_cascade(alice).await.unwrap(), None);
    }

    #[tokio::test]
    async fn moderation_updates_and_deletes_recipes() {
        let (store, alice, bob) = seeded().await;
        let recipe = store.add_recipe(alice).await;
        store.add_comment(recipe, bob).await;

        let listed = store.list_recipes(None).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].author_username, "alice");

        let updated = store
            .update_recipe(
                recipe,
                RecipeChanges {
                    difficulty: Some(Difficulty::Hard),
                    servings: Some(4),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.recipe.difficulty, Difficulty::Hard);
        assert_eq!(updated.recipe.servings, 4);
        assert_eq!(updated.recipe.title, "Plain toast");

        assert_eq!(store.delete_recipe(recipe).await.unwrap(), Some(1));
        assert_eq!(store.delete_recipe(recipe).await.unwrap(), None);
        assert!(store
            .update_recipe(recipe, RecipeChanges::default())
            .await
            .unwrap()
            .is_none());
    }
}
