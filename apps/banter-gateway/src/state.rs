use std::sync::Arc;

use banter_service::BanterService;
use banter_storage::db::Db;

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<BanterService>,
}
impl AppState {
	pub async fn new(config: banter_config::Config) -> color_eyre::Result<Self> {
		let db = Db::connect(&config.storage.postgres).await?;

		db.ensure_schema(config.providers.embedding.dimensions).await?;

		let service = BanterService::new(config, db);

		Ok(Self { service: Arc::new(service) })
	}
}
