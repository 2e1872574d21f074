//! Category and author endpoints

use axum::{extract::{Path, State}, http::StatusCode, Json};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use super::error::ApiResult;
use super::{AppState, Caller};
use crate::domain::aggregates::{Author, Category};
use crate::store::CatalogRepository;
use crate::BookstoreError;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCategoryRequest {
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    pub parent_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateAuthorRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(max = 5000))]
    pub bio: Option<String>,
}

pub async fn list_categories(State(s): State<AppState>) -> ApiResult<Json<Vec<Category>>> {
    Ok(Json(s.store.list_categories().await?))
}

pub async fn get_category(State(s): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<Category>> {
    Ok(Json(s.store.get_category(id).await?.ok_or(BookstoreError::CategoryNotFound)?))
}

pub async fn create_category(State(s): State<AppState>, caller: Caller, Json(r): Json<CreateCategoryRequest>) -> ApiResult<(StatusCode, Json<Category>)> {
    caller.require_admin()?;
    r.validate()?;
    if let Some(parent) = r.parent_id {
        s.store.get_category(parent).await?.ok_or(BookstoreError::CategoryNotFound)?;
    }
    let category = Category::new(r.name.trim(), r.description, r.parent_id);
    s.store.insert_category(&category).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

pub async fn list_authors(State(s): State<AppState>) -> ApiResult<Json<Vec<Author>>> {
    Ok(Json(s.store.list_authors().await?))
}

pub async fn get_author(State(s): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<Author>> {
    Ok(Json(s.store.get_author(id).await?.ok_or(BookstoreError::AuthorNotFound)?))
}

pub async fn create_author(State(s): State<AppState>, caller: Caller, Json(r): Json<CreateAuthorRequest>) -> ApiResult<(StatusCode, Json<Author>)> {
    caller.require_admin()?;
    r.validate()?;
    let author = Author::new(r.name.trim(), r.bio);
    s.store.insert_author(&author).await?;
    Ok((StatusCode::CREATED, Json(author)))
}
