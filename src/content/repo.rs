use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::content::repo_types::{DeletedContent, RecipeChanges, RecipeListing};
use crate::content::ContentStore;

pub struct PgContentStore {
    db: PgPool,
}

impl PgContentStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ContentStore for PgContentStore {
    async fn list_recipes(&self, limit: Option<i64>) -> anyhow::Result<Vec<RecipeListing>> {
        sqlx::query_as::<_, RecipeListing>(
            r#"
            SELECT r.id, r.author_id, r.title, r.description, r.ingredients, r.instructions,
                   r.category, r.difficulty, r.prep_time, r.cook_time, r.servings,
                   r.created_at, r.updated_at,
                   u.username AS author_username, u.email AS author_email
            FROM recipes r
            JOIN users u ON u.id = r.author_id
            ORDER BY r.created_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.db)
        .await
        .context("list recipes")
    }

    async fn update_recipe(
        &self,
        id: Uuid,
        changes: RecipeChanges,
    ) -> anyhow::Result<Option<RecipeListing>> {
        sqlx::query_as::<_, RecipeListing>(
            r#"
            WITH updated AS (
                UPDATE recipes
                   SET title = COALESCE($2, title),
                       description = COALESCE($3, description),
                       ingredients = COALESCE($4, ingredients),
                       instructions = COALESCE($5, instructions),
                       category = COALESCE($6, category),
                       difficulty = COALESCE($7, difficulty),
                       prep_time = COALESCE($8, prep_time),
                       cook_time = COALESCE($9, cook_time),
                       servings = COALESCE($10, servings),
                       updated_at = now()
                 WHERE id = $1
                RETURNING *
            )
            SELECT r.id, r.author_id, r.title, r.description, r.ingredients, r.instructions,
                   r.category, r.difficulty, r.prep_time, r.cook_time, r.servings,
                   r.created_at, r.updated_at,
                   u.username AS author_username, u.email AS author_email
            FROM updated r
            JOIN users u ON u.id = r.author_id
            "#,
        )
        .bind(id)
        .bind(changes.title)
        .bind(changes.description)
        .bind(changes.ingredients)
        .bind(changes.instructions)
        .bind(changes.category)
        .bind(changes.difficulty)
        .bind(changes.prep_time)
        .bind(changes.cook_time)
        .bind(changes.servings)
        .fetch_optional(&self.db)
        .await
        .context("update recipe")
    }

    async fn delete_recipe(&self, id: Uuid) -> anyhow::Result<Option<u64>> {
        let mut tx = self.db.begin().await.context("begin tx")?;

        let comments = sqlx::query(r#"DELETE FROM comments WHERE recipe_id = $1"#)
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("delete recipe comments")?
            .rows_affected();

        let removed = sqlx::query(r#"DELETE FROM recipes WHERE id = $1"#)
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("delete recipe")?
            .rows_affected();

        if removed == 0 {
            return Ok(None);
        }
        tx.commit().await.context("commit tx")?;
        Ok(Some(comments))
    }

    async fn delete_user_cascade(&self, user_id: Uuid) -> anyhow::Result<Option<DeletedContent>> {
        let mut tx = self.db.begin().await.context("begin tx")?;

        // Row lock blocks new recipes/comments referencing the user until commit.
        let locked = sqlx::query_scalar::<_, Uuid>(r#"SELECT id FROM users WHERE id = $1 FOR UPDATE"#)
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await
            .context("lock user")?;
        if locked.is_none() {
            return Ok(None);
        }

        let comments = sqlx::query(
            r#"
            DELETE FROM comments
             WHERE user_id = $1
                OR recipe_id IN (SELECT id FROM recipes WHERE author_id = $1)
            "#,
        )
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .context("delete comments")?
        .rows_affected();

        let recipes = sqlx::query(r#"DELETE FROM recipes WHERE author_id = $1"#)
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .context("delete recipes")?
            .rows_affected();

        sqlx::query(r#"DELETE FROM users WHERE id = $1"#)
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .context("delete user")?;

        tx.commit().await.context("commit tx")?;
        Ok(Some(DeletedContent { recipes, comments }))
    }

    async fn count_recipes(&self) -> anyhow::Result<i64> {
        sqlx::query_scalar::<_, i64>(r#"SELECT COUNT(*) FROM recipes"#)
            .fetch_one(&self.db)
            .await
            .context("count recipes")
    }
}

// Run against a scratch database: `DATABASE_URL=postgres://... cargo test -- --ignored`.
#[cfg(test)]
mod pg_tests {
    use super::*;
    use crate::auth::repo::{PgUserStore, UserStore};
    use crate::auth::repo_types::{NewUser, Role};
    use crate::content::repo_types::Category;

    async fn seed_user(db: &PgPool, username: &str) -> Uuid {
        PgUserStore::new(db.clone())
            .create(NewUser {
                username: username.into(),
                email: format!("{username}@b.com"),
                password: "secret1".into(),
                role: Role::User,
                is_verified: true,
                verification: None,
            })
            .await
            .unwrap()
            .id
    }

    async fn seed_recipe(db: &PgPool, author: Uuid, title: &str) -> Uuid {
        sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO recipes (id, author_id, title, description, ingredients, instructions,
                                 category, prep_time, cook_time, servings)
            VALUES ($1, $2, $3, 'A weeknight staple.', ARRAY['salt'], ARRAY['cook it'],
                    'Dinner', 5, 10, 2)
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(author)
        .bind(title)
        .fetch_one(db)
        .await
        .unwrap()
    }

    async fn seed_comment(db: &PgPool, recipe: Uuid, author: Uuid) {
        sqlx::query(r#"INSERT INTO comments (id, recipe_id, user_id, body) VALUES ($1, $2, $3, 'yum')"#)
            .bind(Uuid::new_v4())
            .bind(recipe)
            .bind(author)
            .execute(db)
            .await
            .unwrap();
    }

    #[sqlx::test]
    #[ignore = "needs a Postgres DATABASE_URL"]
    async fn user_cascade_removes_account_and_content_together(db: PgPool) {
        let store = PgContentStore::new(db.clone());
        let (alice, bob) = (seed_user(&db, "alice").await, seed_user(&db, "bob").await);
        let a1 = seed_recipe(&db, alice, "Alice stew").await;
        let b1 = seed_recipe(&db, bob, "Bob soup").await;
        seed_comment(&db, a1, bob).await;
        seed_comment(&db, b1, alice).await;
        seed_comment(&db, b1, bob).await;

        let deleted = store.delete_user_cascade(alice).await.unwrap();
        assert_eq!(deleted, Some(DeletedContent { recipes: 1, comments: 2 }));
        assert_eq!(store.count_recipes().await.unwrap(), 1);
        assert!(PgUserStore::new(db.clone()).find_by_id(alice).await.unwrap().is_none());

        assert_eq!(store.delete_user_cascade(alice).await.unwrap(), None);
    }

    #[sqlx::test]
    #[ignore = "needs a Postgres DATABASE_URL"]
    async fn recipe_moderation_round(db: PgPool) {
        let store = PgContentStore::new(db.clone());
        let author = seed_user(&db, "chef1").await;
        let recipe = seed_recipe(&db, author, "Plain toast").await;
        seed_comment(&db, recipe, author).await;

        let listed = store.list_recipes(None).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].author_username, "chef1");

        let updated = store
            .update_recipe(
                recipe,
                RecipeChanges {
                    title: Some("Better toast".into()),
                    category: Some(Category::Breakfast),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.recipe.title, "Better toast");
        assert_eq!(updated.recipe.category, Category::Breakfast);
        assert_eq!(updated.recipe.servings, 2);

        assert!(store
            .update_recipe(Uuid::new_v4(), RecipeChanges::default())
            .await
            .unwrap()
            .is_none());

        assert_eq!(store.delete_recipe(recipe).await.unwrap(), Some(1));
        assert_eq!(store.delete_recipe(recipe).await.unwrap(), None);
        assert_eq!(store.count_recipes().await.unwrap(), 0);
    }
}
