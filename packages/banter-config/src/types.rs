use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub providers: Providers,
	pub whatsapp: WhatsApp,
	pub retrieval: Retrieval,
	pub retry: Retry,
}

#[derive(Debug, Deserialize)]
pub struct Service {
	pub http_bind: String,
	pub log_level: String,
}

#[derive(Debug, Deserialize)]
pub struct Storage {
	pub postgres: Postgres,
}

#[derive(Debug, Deserialize)]
pub struct Postgres {
	pub dsn: String,
	pub pool_max_conns: u32,
}

#[derive(Debug, Deserialize)]
pub struct Providers {
	pub generation: GenerationProviderConfig,
	pub embedding: EmbeddingProviderConfig,
}

#[derive(Debug, Deserialize)]
pub struct GenerationProviderConfig {
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub temperature: f32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub dimensions: u32,
	/// Inputs per HTTP call; bulk ingestion shares this client.
	pub batch_size: u32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

/// The WhatsApp web gateway used for outbound delivery and roster refresh.
#[derive(Debug, Deserialize)]
pub struct WhatsApp {
	pub api_base: String,
	#[serde(default)]
	pub basic_auth_user: Option<String>,
	#[serde(default)]
	pub basic_auth_password: Option<String>,
	/// The bot's own address, used as sender for re-ingested outbound messages.
	pub bot_jid: String,
	pub timeout_ms: u64,
}

#[derive(Debug, Deserialize)]
pub struct Retrieval {
	pub top_k: u32,
	pub history_limit: u32,
	/// Whether the bot's own re-ingested messages participate in history
	/// context handed to the generation collaborator.
	#[serde(default)]
	pub include_own_messages: bool,
}

#[derive(Debug, Deserialize)]
pub struct Retry {
	pub max_attempts: u32,
	pub base_delay_ms: u64,
	pub max_delay_ms: u64,
}
