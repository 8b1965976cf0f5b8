//! DB storage for generated wallpapers
use chrono::Utc;
use sea_orm::{
    ActiveValue::Set, ConnectionTrait, IntoActiveModel, PaginatorTrait, QueryOrder,
    entity::prelude::*,
};
use serde::Serialize;

use crate::constants::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "wallpapers")]
/// A generated cover
pub struct Model {
    #[sea_orm(primary_key)]
    /// db id
    pub id: i32,
    /// who asked for it
    pub user_email: String,
    /// what they typed
    pub img_description: String,
    /// `WIDTHxHEIGHT`
    pub img_size: String,
    /// permanent storage URL
    pub img_url: String,
    /// which model made it
    pub llm_name: String,
    #[sea_orm(column_type = "Text")]
    /// JSON of the prompt and the random words in it
    pub llm_params: String,
    /// when it was made (UTC)
    pub created_at: DateTime,
    /// shown in the public gallery
    pub is_public: bool,
    /// style word used in the prompt
    pub style: Option<String>,
    /// storage object key, used to delete the image
    pub img_key: Option<String>,
}

/// relations for wallpapers
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// JSON shape of a wallpaper row.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct WallpaperView {
    /// db id
    pub id: i32,
    /// owner
    pub user_email: String,
    /// description
    pub img_description: String,
    /// size label
    pub img_size: String,
    /// storage URL
    pub img_url: String,
    /// model name
    pub llm_name: String,
    /// prompt parameters as JSON text
    pub llm_params: String,
    /// RFC 3339 creation time
    pub created_at: String,
    /// public flag
    pub is_public: bool,
    /// style word
    pub style: Option<String>,
}

impl From<Model> for WallpaperView {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            user_email: model.user_email,
            img_description: model.img_description,
            img_size: model.img_size,
            img_url: model.img_url,
            llm_name: model.llm_name,
            llm_params: model.llm_params,
            created_at: model.created_at.and_utc().to_rfc3339(),
            is_public: model.is_public,
            style: model.style,
        }
    }
}

/// Values for a new row; id and timestamps are filled in.
#[derive(Clone, Debug)]
pub struct NewWallpaper {
    /// owner
    pub user_email: String,
    /// description
    pub img_description: String,
    /// size label
    pub img_size: String,
    /// storage URL
    pub img_url: String,
    /// model name
    pub llm_name: String,
    /// prompt parameters as JSON text
    pub llm_params: String,
    /// style word
    pub style: Option<String>,
    /// storage object key
    pub img_key: Option<String>,
}

/// Fields a caller may change on an existing row.
#[derive(Clone, Debug, Default)]
pub struct WallpaperUpdate {
    /// new public flag
    pub is_public: Option<bool>,
    /// new description
    pub img_description: Option<String>,
    /// new style word
    pub style: Option<String>,
}

/// Which rows a paged listing covers.
#[derive(Clone, Debug)]
pub enum Visibility {
    /// Everything marked public
    Public,
    /// Everything owned by this email
    Owner(String),
}

/// One page of a listing.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    /// rows on this page
    pub items: Vec<WallpaperView>,
    /// rows across all pages
    pub total: u64,
    /// 1-based page number
    pub current_page: u64,
    /// number of pages
    pub total_pages: u64,
}

/// Clamps caller supplied paging to sane values, returning `(page, limit)`.
pub fn page_bounds(page: Option<u64>, limit: Option<u64>) -> (u64, u64) {
    let page = page.unwrap_or(1).max(1);
    let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    (page, limit)
}

/// Inserts a row stamped with the current time.
pub async fn insert<C: ConnectionTrait>(db: &C, new: NewWallpaper) -> Result<Model, DbErr> {
    ActiveModel {
        user_email: Set(new.user_email),
        img_description: Set(new.img_description),
        img_size: Set(new.img_size),
        img_url: Set(new.img_url),
        llm_name: Set(new.llm_name),
        llm_params: Set(new.llm_params),
        created_at: Set(Utc::now().naive_utc()),
        is_public: Set(true),
        style: Set(new.style),
        img_key: Set(new.img_key),
        ..Default::default()
    }
    .insert(db)
    .await
}

/// Every row, newest first, optionally only one owner's.
pub async fn list<C: ConnectionTrait>(
    db: &C,
    user_email: Option<&str>,
) -> Result<Vec<Model>, DbErr> {
    let mut query = Entity::find();
    if let Some(email) = user_email {
        query = query.filter(Column::UserEmail.eq(email));
    }
    query
        .order_by_desc(Column::CreatedAt)
        .order_by_desc(Column::Id)
        .all(db)
        .await
}

/// One page of rows, newest first.
pub async fn page<C: ConnectionTrait>(
    db: &C,
    visibility: &Visibility,
    page: u64,
    limit: u64,
) -> Result<Page, DbErr> {
    let query = match visibility {
        Visibility::Public => Entity::find().filter(Column::IsPublic.eq(true)),
        Visibility::Owner(email) => Entity::find().filter(Column::UserEmail.eq(email.as_str())),
    };
    let paginator = query
        .order_by_desc(Column::CreatedAt)
        .order_by_desc(Column::Id)
        .paginate(db, limit);
    let total = paginator.num_items().await?;
    let total_pages = total.div_ceil(limit);
    // past the end there is nothing to fetch, and the offset may not fit
    let items = if page == 0 || page > total_pages {
        Vec::new()
    } else {
        paginator.fetch_page(page - 1).await?
    };
    Ok(Page {
        items: items.into_iter().map(WallpaperView::from).collect(),
        total,
        current_page: page,
        total_pages,
    })
}

/// Looks up one row.
pub async fn find<C: ConnectionTrait>(db: &C, id: i32) -> Result<Option<Model>, DbErr> {
    Entity::find_by_id(id).one(db).await
}

/// Applies `changes` and returns the updated row.
pub async fn update<C: ConnectionTrait>(
    db: &C,
    model: Model,
    changes: WallpaperUpdate,
) -> Result<Model, DbErr> {
    if changes.is_public.is_none()
        && changes.img_description.is_none()
        && changes.style.is_none()
    {
        return Ok(model);
    }
    let mut am = model.into_active_model();
    if let Some(is_public) = changes.is_public {
        am.is_public = Set(is_public);
    }
    if let Some(description) = changes.img_description {
        am.img_description = Set(description);
    }
    if let Some(style) = changes.style {
        am.style = Set(Some(style));
    }
    am.update(db).await
}

/// Removes one row, returning whether it existed.
pub async fn delete<C: ConnectionTrait>(db: &C, id: i32) -> Result<bool, DbErr> {
    let result = Entity::delete_by_id(id).exec(db).await?;
    Ok(result.rows_affected > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use sea_orm::DatabaseConnection;
    use sea_orm_migration::MigratorTrait;

    async fn setup_db() -> DatabaseConnection {
        let db = crate::db::connect_test_db()
            .await
            .expect("connect test db");
        crate::db::migrations::Migrator::up(&db, None)
            .await
            .expect("run migrations");
        db
    }

    fn new_row(email: &str, description: &str) -> NewWallpaper {
        NewWallpaper {
            user_email: email.to_string(),
            img_description: description.to_string(),
            img_size: "957x1278".to_string(),
            img_url: format!("https://covers.example/{description}.png"),
            llm_name: "zhipuai".to_string(),
            llm_params: "{}".to_string(),
            style: Some("复古风格".to_string()),
            img_key: Some(format!("wallpapers/{description}.png")),
        }
    }

    async fn insert_at(db: &DatabaseConnection, email: &str, description: &str, age_minutes: i64) -> Model {
        let model = insert(db, new_row(email, description)).await.expect("insert");
        let mut am = model.into_active_model();
        am.created_at = Set((Utc::now() - Duration::minutes(age_minutes)).naive_utc());
        am.update(db).await.expect("backdate")
    }

    #[tokio::test]
    async fn list_is_newest_first_and_filters_by_owner() {
        let db = setup_db().await;
        insert_at(&db, "a@example.org", "old", 30).await;
        insert_at(&db, "b@example.org", "middle", 20).await;
        insert_at(&db, "a@example.org", "new", 10).await;

        let all = list(&db, None).await.expect("list");
        let names: Vec<_> = all.iter().map(|w| w.img_description.as_str()).collect();
        assert_eq!(names, vec!["new", "middle", "old"]);

        let mine = list(&db, Some("a@example.org")).await.expect("list");
        let names: Vec<_> = mine.iter().map(|w| w.img_description.as_str()).collect();
        assert_eq!(names, vec!["new", "old"]);
    }

    #[tokio::test]
    async fn same_timestamp_falls_back_to_id() {
        let db = setup_db().await;
        let first = insert(&db, new_row("a@example.org", "first")).await.expect("insert");
        let mut am = insert(&db, new_row("a@example.org", "second"))
            .await
            .expect("insert")
            .into_active_model();
        am.created_at = Set(first.created_at);
        am.update(&db).await.expect("align timestamps");

        let all = list(&db, None).await.expect("list");
        assert_eq!(all[0].img_description, "second");
    }

    #[tokio::test]
    async fn public_pages_skip_private_rows() {
        let db = setup_db().await;
        for i in 0..5 {
            insert_at(&db, "a@example.org", &format!("w{i}"), 50 - i).await;
        }
        let hidden = insert_at(&db, "a@example.org", "hidden", 1).await;
        update(
            &db,
            hidden,
            WallpaperUpdate {
                is_public: Some(false),
                ..Default::default()
            },
        )
        .await
        .expect("hide");

        let first = page(&db, &Visibility::Public, 1, 2).await.expect("page");
        assert_eq!(first.total, 5);
        assert_eq!(first.total_pages, 3);
        assert_eq!(first.current_page, 1);
        let names: Vec<_> = first.items.iter().map(|w| w.img_description.as_str()).collect();
        assert_eq!(names, vec!["w4", "w3"]);

        let last = page(&db, &Visibility::Public, 3, 2).await.expect("page");
        assert_eq!(last.items.len(), 1);
        assert_eq!(last.items[0].img_description, "w0");

        let owned = page(&db, &Visibility::Owner("a@example.org".to_string()), 1, 10)
            .await
            .expect("page");
        assert_eq!(owned.total, 6);
    }

    #[tokio::test]
    async fn update_and_delete() {
        let db = setup_db().await;
        let model = insert(&db, new_row("a@example.org", "猫")).await.expect("insert");
        let id = model.id;
        let updated = update(
            &db,
            model,
            WallpaperUpdate {
                is_public: Some(false),
                img_description: Some("狗".to_string()),
                style: Some("写实风格".to_string()),
            },
        )
        .await
        .expect("update");
        assert!(!updated.is_public);
        assert_eq!(updated.img_description, "狗");
        assert_eq!(updated.style.as_deref(), Some("写实风格"));

        assert!(delete(&db, id).await.expect("delete"));
        assert!(!delete(&db, id).await.expect("delete again"));
        assert!(find(&db, id).await.expect("find").is_none());
    }

    #[tokio::test]
    async fn pages_past_the_end_are_empty() {
        let db = setup_db().await;
        insert_at(&db, "a@example.org", "only", 1).await;

        let far = page(&db, &Visibility::Public, u64::MAX, MAX_PAGE_SIZE)
            .await
            .expect("page");
        assert!(far.items.is_empty());
        assert_eq!(far.total, 1);
        assert_eq!(far.total_pages, 1);
        assert_eq!(far.current_page, u64::MAX);

        let empty = page(&db, &Visibility::Owner("nobody@example.org".to_string()), 1, 10)
            .await
            .expect("page");
        assert!(empty.items.is_empty());
        assert_eq!(empty.total_pages, 0);
    }

    #[test]
    fn page_bounds_clamp() {
        assert_eq!(page_bounds(None, None), (1, 10));
        assert_eq!(page_bounds(Some(0), Some(0)), (1, 1));
        assert_eq!(page_bounds(Some(3), Some(500)), (3, 100));
    }

    #[test]
    fn view_formats_created_at() {
        let model = Model {
            id: 1,
            user_email: "a@example.org".to_string(),
            img_description: "猫".to_string(),
            img_size: "957x1278".to_string(),
            img_url: "https://covers.example/a.png".to_string(),
            llm_name: "zhipuai".to_string(),
            llm_params: "{}".to_string(),
            created_at: chrono::NaiveDate::from_ymd_opt(2025, 1, 22)
                .and_then(|d| d.and_hms_opt(11, 43, 6))
                .expect("valid date"),
            is_public: true,
            style: None,
            img_key: None,
        };
        let view = WallpaperView::from(model);
        assert_eq!(view.created_at, "2025-01-22T11:43:06+00:00");
    }
}
