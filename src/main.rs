use dotenvy::dotenv;
use planshare::{
    config::{database, settings},
    core::{identity::Identity, report},
    entities::{Plan, PlanColumn},
    errors::Result,
};
use sea_orm::{EntityTrait, QueryOrder};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file; env vars can also be set externally
    dotenv().ok();

    // 3. Settings file is optional
    let settings = settings::load_default_settings()
        .inspect_err(|e| error!("Failed to load settings: {}", e))?;

    // 4. Connect and make sure the tables exist
    let db = database::create_connection()
        .await
        .inspect(|_| info!("Connected to {}", database::get_database_url()))
        .inspect_err(|e| error!("Failed to connect to database: {}", e))?;
    database::create_tables(&db).await?;

    // 5. Print every plan's statement from its owner's point of view
    let plans = Plan::find().order_by_asc(PlanColumn::Id).all(&db).await?;
    info!("Found {} plans", plans.len());

    for plan in plans {
        let owner = Identity::new(plan.owner_id.clone());
        match report::plan_statement(&db, &owner, plan.id, &settings).await {
            Ok(statement) => info!("\n{}", report::format_statement(&statement)),
            Err(e) => error!("Failed to build statement for plan {}: {}", plan.id, e),
        }
    }

    Ok(())
}
