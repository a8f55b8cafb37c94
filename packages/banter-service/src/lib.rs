pub mod answer;
pub mod ingest;
pub mod roster_sync;
pub mod router;
pub mod send;
pub mod summary;

mod error;

pub use error::{Error, Result};

use std::{future::Future, pin::Pin, sync::Arc};

use banter_config::{Config, EmbeddingProviderConfig, GenerationProviderConfig, WhatsApp};
use banter_providers::{
	delivery::{self, SendReceipt},
	embedding, generation,
	retry::RetryPolicy,
	roster::{self, RosterGroup},
};
use banter_storage::db::Db;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait GenerationProvider
where
	Self: Send + Sync,
{
	fn generate<'a>(
		&'a self,
		cfg: &'a GenerationProviderConfig,
		system: &'a str,
		user: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<String>>;
}

pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<Vec<f32>>>>;
}

pub trait DeliveryProvider
where
	Self: Send + Sync,
{
	fn send_message<'a>(
		&'a self,
		cfg: &'a WhatsApp,
		to_jid: &'a str,
		text: &'a str,
		reply_to_id: Option<&'a str>,
	) -> BoxFuture<'a, color_eyre::Result<SendReceipt>>;
}

pub trait RosterProvider
where
	Self: Send + Sync,
{
	fn fetch_groups<'a>(&'a self, cfg: &'a WhatsApp)
	-> BoxFuture<'a, color_eyre::Result<Vec<RosterGroup>>>;
}

#[derive(Clone)]
pub struct Providers {
	pub generation: Arc<dyn GenerationProvider>,
	pub embedding: Arc<dyn EmbeddingProvider>,
	pub delivery: Arc<dyn DeliveryProvider>,
	pub roster: Arc<dyn RosterProvider>,
}
impl Providers {
	pub fn new(
		generation: Arc<dyn GenerationProvider>,
		embedding: Arc<dyn EmbeddingProvider>,
		delivery: Arc<dyn DeliveryProvider>,
		roster: Arc<dyn RosterProvider>,
	) -> Self {
		Self { generation, embedding, delivery, roster }
	}
}
impl Default for Providers {
	fn default() -> Self {
		let provider = Arc::new(DefaultProviders);

		Self {
			generation: provider.clone(),
			embedding: provider.clone(),
			delivery: provider.clone(),
			roster: provider,
		}
	}
}

struct DefaultProviders;
impl GenerationProvider for DefaultProviders {
	fn generate<'a>(
		&'a self,
		cfg: &'a GenerationProviderConfig,
		system: &'a str,
		user: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<String>> {
		Box::pin(generation::generate(cfg, system, user))
	}
}
impl EmbeddingProvider for DefaultProviders {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<Vec<f32>>>> {
		Box::pin(embedding::embed(cfg, texts))
	}
}
impl DeliveryProvider for DefaultProviders {
	fn send_message<'a>(
		&'a self,
		cfg: &'a WhatsApp,
		to_jid: &'a str,
		text: &'a str,
		reply_to_id: Option<&'a str>,
	) -> BoxFuture<'a, color_eyre::Result<SendReceipt>> {
		Box::pin(delivery::send_message(cfg, to_jid, text, reply_to_id))
	}
}
impl RosterProvider for DefaultProviders {
	fn fetch_groups<'a>(
		&'a self,
		cfg: &'a WhatsApp,
	) -> BoxFuture<'a, color_eyre::Result<Vec<RosterGroup>>> {
		Box::pin(roster::fetch_groups(cfg))
	}
}

pub struct BanterService {
	pub cfg: Config,
	pub db: Db,
	pub providers: Providers,
	pub retry: RetryPolicy,
}
impl BanterService {
	pub fn new(cfg: Config, db: Db) -> Self {
		let retry = RetryPolicy::from_config(&cfg.retry);

		Self { cfg, db, providers: Providers::default(), retry }
	}

	pub fn with_providers(cfg: Config, db: Db, providers: Providers) -> Self {
		let retry = RetryPolicy::from_config(&cfg.retry);

		Self { cfg, db, providers, retry }
	}

	/// The bot's own canonical address, as recorded on re-ingested outbound
	/// messages and matched against inbound senders.
	pub fn bot_jid(&self) -> Result<String> {
		Ok(banter_domain::jid::normalize_jid(&self.cfg.whatsapp.bot_jid)?)
	}
}
