use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "recipe_category")]
pub enum Category {
    Breakfast,
    Lunch,
    Dinner,
    Dessert,
    Snack,
    Beverage,
    Appetizer,
    #[default]
    Other,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "recipe_difficulty")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

/// Recipe record in the database.
#[derive(Debug, Clone, FromRow)]
pub struct Recipe {
    pub id: Uuid,
    pub author_id: Uuid,
    pub title: String,
    pub description: String,
    pub ingredients: Vec<String>,
    pub instructions: Vec<String>,
    pub category: Category,
    pub difficulty: Difficulty,
    pub prep_time: i32, // minutes
    pub cook_time: i32, // minutes
    pub servings: i32,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// A recipe joined with its author's public identity.
#[derive(Debug, Clone, FromRow)]
pub struct RecipeListing {
    #[sqlx(flatten)]
    pub recipe: Recipe,
    pub author_username: String,
    pub author_email: String,
}

/// Moderator edit; `None` keeps the stored value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipeChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub ingredients: Option<Vec<String>>,
    pub instructions: Option<Vec<String>>,
    pub category: Option<Category>,
    pub difficulty: Option<Difficulty>,
    pub prep_time: Option<i32>,
    pub cook_time: Option<i32>,
    pub servings: Option<i32>,
}

impl RecipeChanges {
    pub(crate) fn apply_to(self, recipe: &mut Recipe) {
        if let Some(v) = self.title {
            recipe.title = v;
        }
        if let Some(v) = self.description {
            recipe.description = v;
        }
        if let Some(v) = self.ingredients {
            recipe.ingredients = v;
        }
        if let Some(v) = self.instructions {
            recipe.instructions = v;
        }
        if let Some(v) = self.category {
            recipe.category = v;
        }
        if let Some(v) = self.difficulty {
            recipe.difficulty = v;
        }
        if let Some(v) = self.prep_time {
            recipe.prep_time = v;
        }
        if let Some(v) = self.cook_time {
            recipe.cook_time = v;
        }
        if let Some(v) = self.servings {
            recipe.servings = v;
        }
    }
}

/// What a cascading account removal took with it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeletedContent {
    pub recipes: u64,
    pub comments: u64,
}
