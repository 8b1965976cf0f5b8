use aiwallpaper::config::{Settings, setup_logging};
use clap::Parser;
use sea_orm_migration::MigratorTrait;
use tracing::error;

#[tokio::main(flavor = "multi_thread")]
async fn main() {
    let cli = aiwallpaper::cli::CliOptions::parse();

    if setup_logging(cli.debug).is_err() {
        return;
    }

    let settings = Settings::from_cli(&cli);

    let db = match aiwallpaper::db::connect_db(&cli.database_path).await {
        Ok(db) => db,
        Err(err) => {
            error!("Database connection error: {}", err);
            return;
        }
    };

    if let Err(err) = aiwallpaper::db::migrations::Migrator::up(&db, None).await {
        error!("Database migration error: {}", err);
        return;
    }

    if let Err(err) =
        aiwallpaper::web::setup_server(&cli.listen_address, cli.port, settings, db).await
    {
        error!("Application error: {}", err);
    }
}
