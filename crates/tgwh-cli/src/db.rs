//! `db` subcommands.

pub(crate) async fn run_migrate(config: &tgwh_core::AppConfig) -> anyhow::Result<()> {
    let pool = connect(config).await?;
    let applied = tgwh_db::run_migrations(&pool).await;
    pool.close().await;
    println!("applied {} migration(s)", applied?);
    Ok(())
}

pub(crate) async fn run_ping(config: &tgwh_core::AppConfig) -> anyhow::Result<()> {
    let pool = connect(config).await?;
    let pinged = tgwh_db::ping(&pool).await;
    pool.close().await;
    pinged?;
    println!("warehouse reachable");
    Ok(())
}

async fn connect(config: &tgwh_core::AppConfig) -> anyhow::Result<sqlx::PgPool> {
    let pool_config = tgwh_db::PoolConfig::from_app_config(config);
    Ok(tgwh_db::connect_pool(&config.database_url, pool_config).await?)
}
