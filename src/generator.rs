//! The generate pipeline: prompt, image API, object storage, database row.
//!
//! Each step is a single attempt. Whatever fails first is returned to the
//! caller as is.

use std::sync::Arc;

use sea_orm::DatabaseConnection;
use tracing::{debug, info};

use crate::constants::{ANONYMOUS_EMAIL, IMAGE_HEIGHT, IMAGE_SIZE_LABEL, IMAGE_WIDTH};
use crate::db::entities::wallpapers::{self, NewWallpaper};
use crate::error::WallpaperError;
use crate::prompt::{PromptParts, new_object_key};

/// Something that turns a prompt into a (temporary) image URL.
#[async_trait::async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Generates one image and returns where to download it from.
    async fn generate(&self, prompt: &str, width: u32, height: u32)
    -> Result<String, WallpaperError>;

    /// Value stored in the `llm_name` column.
    fn name(&self) -> &'static str;
}

/// Somewhere generated images are kept for good.
#[async_trait::async_trait]
pub trait ObjectStore: Send + Sync {
    /// Copies `source_url` to `key` and returns the permanent URL.
    async fn upload_from_url(&self, source_url: &str, key: &str) -> Result<String, WallpaperError>;

    /// Removes `key`.
    async fn delete_object(&self, key: &str) -> Result<(), WallpaperError>;
}

/// Result of a successful generation.
#[derive(Clone, Debug)]
pub struct Generated {
    /// The stored row
    pub wallpaper: wallpapers::Model,
    /// URL the image API handed back
    pub original_url: String,
    /// Prompt and the random words in it
    pub parts: PromptParts,
}

/// Wires an image generator and an object store together.
///
/// Either half may be missing when its credentials aren't configured; the
/// pipeline then refuses to run.
#[derive(Clone, Default)]
pub struct WallpaperPipeline {
    generator: Option<Arc<dyn ImageGenerator>>,
    store: Option<Arc<dyn ObjectStore>>,
}

impl std::fmt::Debug for WallpaperPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WallpaperPipeline")
            .field("generator", &self.generator.as_ref().map(|g| g.name()))
            .field("store", &self.store.is_some())
            .finish()
    }
}

/// Rejects blank descriptions and trims the rest.
pub fn validate_description(description: &str) -> Result<&str, WallpaperError> {
    let description = description.trim();
    if description.is_empty() {
        return Err(WallpaperError::BadRequest("图片描述不能为空".to_string()));
    }
    Ok(description)
}

impl WallpaperPipeline {
    /// Pipeline from its two halves.
    pub fn new(
        generator: Option<Arc<dyn ImageGenerator>>,
        store: Option<Arc<dyn ObjectStore>>,
    ) -> Self {
        Self { generator, store }
    }

    /// The object store, if configured.
    pub fn store(&self) -> Option<&Arc<dyn ObjectStore>> {
        self.store.as_ref()
    }

    /// Generates, uploads and records one cover.
    pub async fn run(
        &self,
        db: &DatabaseConnection,
        description: &str,
        user_email: Option<&str>,
    ) -> Result<Generated, WallpaperError> {
        let description = validate_description(description)?;
        let generator = self
            .generator
            .as_ref()
            .ok_or(WallpaperError::NotConfigured("ZHIPUAI_API_KEY"))?;
        let store = self
            .store
            .as_ref()
            .ok_or(WallpaperError::NotConfigured("COS"))?;

        let parts = PromptParts::random(description);
        debug!("Built prompt: {}", parts.prompt);

        let original_url = generator
            .generate(&parts.prompt, IMAGE_WIDTH, IMAGE_HEIGHT)
            .await?;

        let key = new_object_key(&parts.style);
        let img_url = store.upload_from_url(&original_url, &key).await?;

        let user_email = user_email
            .map(str::trim)
            .filter(|email| !email.is_empty())
            .unwrap_or(ANONYMOUS_EMAIL);
        let wallpaper = wallpapers::insert(
            db,
            NewWallpaper {
                user_email: user_email.to_string(),
                img_description: parts.description.clone(),
                img_size: IMAGE_SIZE_LABEL.to_string(),
                img_url,
                llm_name: generator.name().to_string(),
                llm_params: parts.llm_params(),
                style: Some(parts.style.clone()),
                img_key: Some(key),
            },
        )
        .await?;
        info!(
            "Stored wallpaper {} for {} at {}",
            wallpaper.id, wallpaper.user_email, wallpaper.img_url
        );

        Ok(Generated {
            wallpaper,
            original_url,
            parts,
        })
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{FakeGenerator, FakeStore};
    use super::*;
    use sea_orm::EntityTrait;
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

    #[test]
    fn blank_descriptions_are_rejected() {
        assert!(matches!(
            validate_description("   "),
            Err(WallpaperError::BadRequest(_))
        ));
        assert_eq!(validate_description(" 龙 ").expect("valid"), "龙");
    }

    #[tokio::test]
    async fn run_stores_the_uploaded_image() {
        let db = setup_db().await;
        let generator = Arc::new(FakeGenerator::default());
        let store = Arc::new(FakeStore::default());
        let pipeline = WallpaperPipeline::new(Some(generator.clone()), Some(store.clone()));

        let generated = pipeline
            .run(&db, " 贪吃蛇 ", None)
            .await
            .expect("generate");

        assert_eq!(generated.original_url, "https://aigc-files.example/957x1278.png");
        assert_eq!(generated.wallpaper.user_email, ANONYMOUS_EMAIL);
        assert_eq!(generated.wallpaper.img_description, "贪吃蛇");
        assert_eq!(generated.wallpaper.img_size, "957x1278");
        assert_eq!(generated.wallpaper.llm_name, "zhipuai");
        assert!(generated.wallpaper.img_url.starts_with("https://covers.example/wallpapers/"));
        assert_eq!(generated.wallpaper.style.as_deref(), Some(generated.parts.style.as_str()));

        let uploaded = store.uploaded.lock().expect("lock").clone();
        assert_eq!(uploaded.len(), 1);
        assert_eq!(uploaded[0].0, generated.original_url);
        assert_eq!(Some(uploaded[0].1.clone()), generated.wallpaper.img_key);

        let prompts = generator.prompts.lock().expect("lock").clone();
        assert_eq!(prompts, vec![generated.parts.prompt.clone()]);

        let rows = wallpapers::Entity::find().all(&db).await.expect("rows");
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn generation_failure_writes_nothing() {
        let db = setup_db().await;
        let store = Arc::new(FakeStore::default());
        let pipeline = WallpaperPipeline::new(
            Some(Arc::new(FakeGenerator {
                fail: true,
                ..Default::default()
            })),
            Some(store.clone()),
        );

        let err = pipeline
            .run(&db, "猫", Some("a@example.org"))
            .await
            .expect_err("generator fails");
        assert!(matches!(err, WallpaperError::ImageGeneration(_)));
        assert!(store.uploaded.lock().expect("lock").is_empty());
        let rows = wallpapers::Entity::find().all(&db).await.expect("rows");
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn upload_failure_writes_nothing() {
        let db = setup_db().await;
        let pipeline = WallpaperPipeline::new(
            Some(Arc::new(FakeGenerator::default())),
            Some(Arc::new(FakeStore {
                fail: true,
                ..Default::default()
            })),
        );

        let err = pipeline
            .run(&db, "猫", None)
            .await
            .expect_err("upload fails");
        assert!(matches!(err, WallpaperError::Storage(_)));
        let rows = wallpapers::Entity::find().all(&db).await.expect("rows");
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn unconfigured_pipeline_still_validates_first() {
        let db = setup_db().await;
        let pipeline = WallpaperPipeline::default();
        assert!(matches!(
            pipeline.run(&db, "", None).await,
            Err(WallpaperError::BadRequest(_))
        ));
        assert!(matches!(
            pipeline.run(&db, "猫", None).await,
            Err(WallpaperError::NotConfigured(_))
        ));
    }
}
