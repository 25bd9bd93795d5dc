use log::info;
use schoolhub_core::db::open_db;
use schoolhub_core::init_logging;
use schoolhub_server::{app, AppState, Settings};
use std::error::Error;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let settings = Settings::load()?;
    init_logging(&settings.logging.level, &settings.logging.dir)?;
    let bulk_policy = settings.bulk_policy()?;

    // Apply migrations once before accepting traffic.
    drop(open_db(&settings.database.path)?);

    let address = settings.server.address();
    let listener = tokio::net::TcpListener::bind(&address).await?;
    info!(
        "event=server_start module=server status=ok address={} db_path={} bulk_student_scrub={}",
        address,
        settings.database.path.display(),
        bulk_policy.as_str()
    );

    axum::serve(
        listener,
        app(AppState::new(settings.database.path.clone(), bulk_policy)),
    )
    .await?;
    Ok(())
}
