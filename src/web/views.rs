use super::csrf::{csrf_token, validate_csrf};
use super::flash::{
    FLASH_EMPTY_DESCRIPTION, FLASH_GENERATE_FAILED, FLASH_GENERATE_SUCCESS, FlashMessage,
    set_flash, take_flash_message,
};
use super::prelude::*;
use crate::db::entities::wallpapers::{Visibility, page_bounds};

const GALLERY_PAGE_SIZE: u64 = 24;

#[derive(Clone, Debug)]
pub(crate) struct GalleryItem {
    pub(crate) img_url: String,
    pub(crate) img_description: String,
    pub(crate) style: String,
    pub(crate) created_at: String,
}

impl From<wallpapers::WallpaperView> for GalleryItem {
    fn from(view: wallpapers::WallpaperView) -> Self {
        let created_at = chrono::DateTime::parse_from_rfc3339(&view.created_at)
            .map(|time| time.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or(view.created_at);
        Self {
            img_url: view.img_url,
            img_description: view.img_description,
            style: view.style.unwrap_or_default(),
            created_at,
        }
    }
}

#[derive(Template, WebTemplate)]
#[template(path = "home.html")]
pub(crate) struct HomeTemplate {
    pub(crate) user: Option<SessionUser>,
    pub(crate) csrf_token: String,
    pub(crate) flash: Option<FlashMessage>,
    pub(crate) gallery: Vec<GalleryItem>,
    pub(crate) current_page: u64,
    pub(crate) total_pages: u64,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct HomeQuery {
    page: Option<u64>,
}

/// handles the / GET
pub(crate) async fn root_handler(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<HomeQuery>,
) -> Result<Response, WallpaperError> {
    let user = current_user(&session).await?;
    let flash = take_flash_message(&session).await?;
    let csrf_token = csrf_token(&session).await?;

    let (page, limit) = page_bounds(query.page, Some(GALLERY_PAGE_SIZE));
    let gallery = wallpapers::page(&state.db, &Visibility::Public, page, limit).await?;

    Ok(HomeTemplate {
        user,
        csrf_token,
        flash,
        current_page: gallery.current_page,
        total_pages: gallery.total_pages,
        gallery: gallery.items.into_iter().map(GalleryItem::from).collect(),
    }
    .into_response())
}

#[derive(Debug, Deserialize)]
pub(crate) struct GenerateForm {
    #[serde(default)]
    description: String,
    #[serde(default)]
    csrf_token: String,
}

/// handles the /generate POST
pub(crate) async fn generate_form_handler(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<GenerateForm>,
) -> Result<Redirect, WallpaperError> {
    let Some(user) = current_user(&session).await? else {
        return Ok(Redirect::to("/login"));
    };
    validate_csrf(&session, &form.csrf_token).await?;

    if form.description.trim().is_empty() {
        set_flash(&session, FLASH_EMPTY_DESCRIPTION).await?;
        return Ok(Redirect::to("/"));
    }

    match state
        .pipeline
        .run(&state.db, &form.description, Some(&user.owner()))
        .await
    {
        Ok(generated) => {
            info!(
                "{} generated wallpaper {}",
                user.name, generated.wallpaper.id
            );
            set_flash(&session, FLASH_GENERATE_SUCCESS).await?;
        }
        Err(err) => {
            error!("Generating for {} failed: {}", user.name, err);
            set_flash(&session, FLASH_GENERATE_FAILED).await?;
        }
    }
    Ok(Redirect::to("/"))
}
