//! JSON API handlers.

use super::prelude::*;
use crate::db::entities::wallpapers::{Page, Visibility, WallpaperUpdate, WallpaperView, page_bounds};

#[derive(Debug, Deserialize)]
pub(crate) struct GenerateRequest {
    #[serde(default)]
    description: String,
    #[serde(default)]
    user_email: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerateResponse {
    #[serde(flatten)]
    wallpaper: WallpaperView,
    original_url: String,
    prompt: String,
    modifier: String,
}

pub(crate) async fn gen_wallpaper_handler(
    State(state): State<AppState>,
    session: Session,
    Json(request): Json<GenerateRequest>,
) -> Result<Json<Envelope<GenerateResponse>>, WallpaperError> {
    let owner = match request.user_email {
        Some(email) => Some(email),
        None => current_user(&session).await?.map(|user| user.owner()),
    };
    let generated = state
        .pipeline
        .run(&state.db, &request.description, owner.as_deref())
        .await?;
    Ok(Json(Envelope::ok(
        "生成成功",
        GenerateResponse {
            wallpaper: WallpaperView::from(generated.wallpaper),
            original_url: generated.original_url,
            prompt: generated.parts.prompt,
            modifier: generated.parts.modifier,
        },
    )))
}

#[derive(Debug, Deserialize)]
pub(crate) struct ListQuery {
    user_email: Option<String>,
}

pub(crate) async fn get_wallpaper_handler(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Envelope<Vec<WallpaperView>>>, WallpaperError> {
    let email = query
        .user_email
        .as_deref()
        .map(str::trim)
        .filter(|email| !email.is_empty());
    let rows = wallpapers::list(&state.db, email).await?;
    debug!("Listing {} wallpapers", rows.len());
    Ok(Json(Envelope::ok(
        "success",
        rows.into_iter().map(WallpaperView::from).collect(),
    )))
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct PageQuery {
    page: Option<u64>,
    limit: Option<u64>,
}

pub(crate) async fn public_wallpapers_handler(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Envelope<Page>>, WallpaperError> {
    let (page, limit) = page_bounds(query.page, query.limit);
    let page = wallpapers::page(&state.db, &Visibility::Public, page, limit).await?;
    Ok(Json(Envelope::ok("success", page)))
}

pub(crate) async fn user_wallpapers_handler(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<PageQuery>,
) -> Result<Json<Envelope<Page>>, WallpaperError> {
    let user = current_user(&session)
        .await?
        .ok_or(WallpaperError::Unauthorized)?;
    let (page, limit) = page_bounds(query.page, query.limit);
    let page = wallpapers::page(&state.db, &Visibility::Owner(user.owner()), page, limit).await?;
    Ok(Json(Envelope::ok("success", page)))
}

async fn find_wallpaper(state: &AppState, id: i32) -> Result<wallpapers::Model, WallpaperError> {
    wallpapers::find(&state.db, id)
        .await?
        .ok_or_else(|| WallpaperError::NotFound(format!("wallpaper {id}")))
}

/// Loads a row the session user is allowed to change.
async fn owned_wallpaper(
    state: &AppState,
    session: &Session,
    id: i32,
) -> Result<wallpapers::Model, WallpaperError> {
    let user = current_user(session)
        .await?
        .ok_or(WallpaperError::Unauthorized)?;
    let wallpaper = find_wallpaper(state, id).await?;
    if wallpaper.user_email != user.owner() {
        warn!(
            "{} tried to change wallpaper {} owned by {}",
            user.owner(),
            id,
            wallpaper.user_email
        );
        return Err(WallpaperError::Forbidden);
    }
    Ok(wallpaper)
}

pub(crate) async fn get_wallpaper_by_id_handler(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<Envelope<WallpaperView>>, WallpaperError> {
    let wallpaper = find_wallpaper(&state, id).await?;
    Ok(Json(Envelope::ok("success", WallpaperView::from(wallpaper))))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UpdateRequest {
    is_public: Option<bool>,
    prompt: Option<String>,
    style: Option<String>,
}

pub(crate) async fn update_wallpaper_handler(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<i32>,
    Json(request): Json<UpdateRequest>,
) -> Result<Json<Envelope<WallpaperView>>, WallpaperError> {
    let wallpaper = owned_wallpaper(&state, &session, id).await?;
    let img_description = match request.prompt {
        Some(prompt) => Some(crate::generator::validate_description(&prompt)?.to_string()),
        None => None,
    };
    let updated = wallpapers::update(
        &state.db,
        wallpaper,
        WallpaperUpdate {
            is_public: request.is_public,
            img_description,
            style: request.style,
        },
    )
    .await?;
    info!("Updated wallpaper {}", updated.id);
    Ok(Json(Envelope::ok("更新成功", WallpaperView::from(updated))))
}

pub(crate) async fn delete_wallpaper_handler(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<i32>,
) -> Result<Json<Envelope<()>>, WallpaperError> {
    let wallpaper = owned_wallpaper(&state, &session, id).await?;
    if !wallpapers::delete(&state.db, id).await? {
        return Err(WallpaperError::NotFound(format!("wallpaper {id}")));
    }
    if let (Some(key), Some(store)) = (wallpaper.img_key.as_deref(), state.pipeline.store())
        && let Err(err) = store.delete_object(key).await
    {
        error!("Failed to delete object {} for wallpaper {}: {}", key, id, err);
    }
    info!("Deleted wallpaper {}", id);
    Ok(Json(Envelope {
        code: 0,
        message: "删除成功".to_string(),
        data: None,
    }))
}
