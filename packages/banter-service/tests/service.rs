use std::{
	collections::VecDeque,
	sync::{
		Arc, Mutex,
		atomic::{AtomicU32, Ordering},
	},
};

use serde_json::json;
use time::macros::datetime;

use banter_config::{
	Config, EmbeddingProviderConfig, GenerationProviderConfig, Postgres, Retrieval, Retry, Service,
	Storage, WhatsApp,
};
use banter_domain::content::WebhookPayload;
use banter_providers::{delivery::SendReceipt, roster::RosterGroup};
use banter_service::{
	BanterService, BoxFuture, DeliveryProvider, EmbeddingProvider, GenerationProvider, Providers,
	RosterProvider,
};
use banter_storage::{
	db::Db,
	models::{KbTopicInsert, topic_id},
	queries,
};
use banter_testkit::TestDatabase;

const VECTOR_DIM: u32 = 3;
const BOT_JID: &str = "999@s.whatsapp.net";

struct ScriptedGeneration {
	replies: Mutex<VecDeque<String>>,
	calls: AtomicU32,
}
impl ScriptedGeneration {
	fn new(replies: &[&str]) -> Arc<Self> {
		Arc::new(Self {
			replies: Mutex::new(replies.iter().map(|reply| reply.to_string()).collect()),
			calls: AtomicU32::new(0),
		})
	}

	fn calls(&self) -> u32 {
		self.calls.load(Ordering::SeqCst)
	}
}
impl GenerationProvider for ScriptedGeneration {
	fn generate<'a>(
		&'a self,
		_cfg: &'a GenerationProviderConfig,
		_system: &'a str,
		_user: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<String>> {
		self.calls.fetch_add(1, Ordering::SeqCst);

		let next = self.replies.lock().expect("lock poisoned").pop_front();

		Box::pin(async move {
			next.ok_or_else(|| color_eyre::eyre::eyre!("Generation script exhausted."))
		})
	}
}

struct FixedEmbedding {
	vector: Vec<f32>,
}
impl EmbeddingProvider for FixedEmbedding {
	fn embed<'a>(
		&'a self,
		_cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<Vec<f32>>>> {
		let out = vec![self.vector.clone(); texts.len()];

		Box::pin(async move { Ok(out) })
	}
}

#[derive(Default)]
struct RecordingDelivery {
	sent: Mutex<Vec<(String, String, Option<String>)>>,
	counter: AtomicU32,
}
impl RecordingDelivery {
	fn sent(&self) -> Vec<(String, String, Option<String>)> {
		self.sent.lock().expect("lock poisoned").clone()
	}
}
impl DeliveryProvider for RecordingDelivery {
	fn send_message<'a>(
		&'a self,
		_cfg: &'a WhatsApp,
		to_jid: &'a str,
		text: &'a str,
		reply_to_id: Option<&'a str>,
	) -> BoxFuture<'a, color_eyre::Result<SendReceipt>> {
		let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;

		self.sent.lock().expect("lock poisoned").push((
			to_jid.to_string(),
			text.to_string(),
			reply_to_id.map(|id| id.to_string()),
		));

		Box::pin(async move { Ok(SendReceipt { message_id: format!("OUT{n}") }) })
	}
}

struct ScriptedRoster {
	groups: Vec<RosterGroup>,
}
impl RosterProvider for ScriptedRoster {
	fn fetch_groups<'a>(
		&'a self,
		_cfg: &'a WhatsApp,
	) -> BoxFuture<'a, color_eyre::Result<Vec<RosterGroup>>> {
		let groups = self.groups.clone();

		Box::pin(async move { Ok(groups) })
	}
}

fn test_config(dsn: &str) -> Config {
	Config {
		service: Service { http_bind: "127.0.0.1:0".to_string(), log_level: "info".to_string() },
		storage: Storage {
			postgres: Postgres { dsn: dsn.to_string(), pool_max_conns: 4 },
		},
		providers: banter_config::Providers {
			generation: GenerationProviderConfig {
				api_base: "http://localhost".to_string(),
				api_key: "test".to_string(),
				path: "/v1/chat/completions".to_string(),
				model: "test-model".to_string(),
				temperature: 0.0,
				timeout_ms: 1_000,
				default_headers: serde_json::Map::new(),
			},
			embedding: EmbeddingProviderConfig {
				api_base: "http://localhost".to_string(),
				api_key: "test".to_string(),
				path: "/v1/embeddings".to_string(),
				model: "test-embed".to_string(),
				dimensions: VECTOR_DIM,
				batch_size: 128,
				timeout_ms: 1_000,
				default_headers: serde_json::Map::new(),
			},
		},
		whatsapp: WhatsApp {
			api_base: "http://localhost".to_string(),
			basic_auth_user: None,
			basic_auth_password: None,
			bot_jid: BOT_JID.to_string(),
			timeout_ms: 1_000,
		},
		retrieval: Retrieval { top_k: 5, history_limit: 10, include_own_messages: false },
		retry: Retry { max_attempts: 2, base_delay_ms: 1, max_delay_ms: 2 },
	}
}

async fn service_with(
	test_db: &TestDatabase,
	generation: Arc<ScriptedGeneration>,
	delivery: Arc<RecordingDelivery>,
	roster_groups: Vec<RosterGroup>,
) -> BanterService {
	let cfg = test_config(test_db.dsn());
	let db = Db::connect(&cfg.storage.postgres).await.expect("Failed to connect to Postgres.");

	db.ensure_schema(VECTOR_DIM).await.expect("Failed to ensure schema.");

	let providers = Providers::new(
		generation,
		Arc::new(FixedEmbedding { vector: vec![1.0, 0.0, 0.0] }),
		delivery,
		Arc::new(ScriptedRoster { groups: roster_groups }),
	);

	BanterService::with_providers(cfg, db, providers)
}

fn payload(from: &str, id: &str, text: Option<&str>) -> WebhookPayload {
	let mut value = json!({
		"from": from,
		"timestamp": "2025-01-15T10:00:00Z",
		"pushname": "Alice",
		"message": { "id": id },
	});

	if let Some(text) = text {
		value["message"]["text"] = text.into();
	}

	serde_json::from_value(value).expect("payload should deserialize")
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set BANTER_PG_DSN to run."]
async fn ingesting_a_group_message_creates_all_rows_idempotently() {
	let Some(base_dsn) = banter_testkit::env_dsn() else {
		eprintln!("Skipping ingesting_a_group_message_creates_all_rows_idempotently; set BANTER_PG_DSN.");

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let service = service_with(
		&test_db,
		ScriptedGeneration::new(&[]),
		Arc::new(RecordingDelivery::default()),
		Vec::new(),
	)
	.await;
	let payload = payload("123:7@s.whatsapp.net in 1203@g.us", "m1", Some("hello all"));
	let stored = service.ingest(&payload).await.expect("Ingestion failed.");

	assert_eq!(stored.sender_jid, "123@s.whatsapp.net");
	assert_eq!(stored.chat_jid, "1203@g.us");
	assert_eq!(stored.group_jid.as_deref(), Some("1203@g.us"));
	assert_eq!(stored.text.as_deref(), Some("hello all"));

	let sender = queries::fetch_sender(&service.db, "123@s.whatsapp.net")
		.await
		.expect("Fetch failed.")
		.expect("Sender missing.");

	assert_eq!(sender.push_name.as_deref(), Some("Alice"));
	assert!(
		queries::fetch_group(&service.db, "1203@g.us").await.expect("Fetch failed.").is_some()
	);

	// Webhook redelivery changes nothing.
	service.ingest(&payload).await.expect("Redelivered ingestion failed.");

	let count: i64 = sqlx::query_scalar("SELECT count(*) FROM messages")
		.fetch_one(&service.db.pool)
		.await
		.expect("Failed to count messages.");

	assert_eq!(count, 1);

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set BANTER_PG_DSN to run."]
async fn textless_messages_are_stored_but_never_dispatched() {
	let Some(base_dsn) = banter_testkit::env_dsn() else {
		eprintln!("Skipping textless_messages_are_stored_but_never_dispatched; set BANTER_PG_DSN.");

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let generation = ScriptedGeneration::new(&[]);
	let delivery = Arc::new(RecordingDelivery::default());
	let service = service_with(&test_db, generation.clone(), delivery.clone(), Vec::new()).await;
	let stored = service
		.ingest(&payload("123@s.whatsapp.net", "m2", None))
		.await
		.expect("Ingestion failed.");

	assert!(stored.text.is_none());

	service.dispatch(&stored).await.expect("Dispatch failed.");

	assert_eq!(generation.calls(), 0);
	assert!(delivery.sent().is_empty());

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set BANTER_PG_DSN to run."]
async fn a_recognized_question_gets_a_grounded_recorded_reply() {
	let Some(base_dsn) = banter_testkit::env_dsn() else {
		eprintln!("Skipping a_recognized_question_gets_a_grounded_recorded_reply; set BANTER_PG_DSN.");

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let generation = ScriptedGeneration::new(&[
		"ASK_QUESTION",
		"when is the family dinner",
		"Dinner is Friday at eight, @123 booked the table.",
	]);
	let delivery = Arc::new(RecordingDelivery::default());
	let service = service_with(&test_db, generation.clone(), delivery.clone(), Vec::new()).await;

	queries::ensure_group(&service.db, "1203@g.us").await.expect("Ensure failed.");

	let start_time = datetime!(2025-01-14 08:00 UTC);

	queries::bulk_upsert_topics(
		&service.db,
		&[KbTopicInsert {
			id: topic_id(Some("1203@g.us"), start_time, "dinner plans"),
			group_jid: Some("1203@g.us".to_string()),
			start_time,
			speakers: vec!["123".to_string()],
			subject: "dinner plans".to_string(),
			summary: "Dinner is Friday at eight.".to_string(),
			embedding: vec![1.0, 0.0, 0.0],
		}],
	)
	.await
	.expect("Topic upsert failed.");

	let stored = service
		.ingest(&payload("123@s.whatsapp.net in 1203@g.us", "m3", Some("when is dinner?")))
		.await
		.expect("Ingestion failed.");

	service.dispatch(&stored).await.expect("Dispatch failed.");

	let sent = delivery.sent();

	assert_eq!(sent.len(), 1);
	assert_eq!(sent[0].0, "1203@g.us");
	assert_eq!(sent[0].1, "Dinner is Friday at eight, @123 booked the table.");
	assert_eq!(sent[0].2.as_deref(), Some("m3"));
	// classify + rephrase + compose
	assert_eq!(generation.calls(), 3);

	let recorded = queries::fetch_message(&service.db, "OUT1")
		.await
		.expect("Fetch failed.")
		.expect("Outbound message not recorded.");

	assert_eq!(recorded.sender_jid, BOT_JID);
	assert_eq!(recorded.reply_to_id.as_deref(), Some("m3"));

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set BANTER_PG_DSN to run."]
async fn an_exhausted_answer_path_still_sends_a_fallback_reply() {
	let Some(base_dsn) = banter_testkit::env_dsn() else {
		eprintln!("Skipping an_exhausted_answer_path_still_sends_a_fallback_reply; set BANTER_PG_DSN.");

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	// Only the classification reply is scripted; the rephrase call exhausts
	// its retries.
	let generation = ScriptedGeneration::new(&["ASK_QUESTION"]);
	let delivery = Arc::new(RecordingDelivery::default());
	let service = service_with(&test_db, generation.clone(), delivery.clone(), Vec::new()).await;
	let stored = service
		.ingest(&payload("123@s.whatsapp.net", "m4", Some("what happened to the plan?")))
		.await
		.expect("Ingestion failed.");

	service.dispatch(&stored).await.expect("Dispatch failed.");

	let sent = delivery.sent();

	assert_eq!(sent.len(), 1);
	assert!(sent[0].1.starts_with("Sorry"));
	// classify + 2 rephrase attempts
	assert_eq!(generation.calls(), 3);

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set BANTER_PG_DSN to run."]
async fn messages_from_the_bot_itself_are_never_dispatched() {
	let Some(base_dsn) = banter_testkit::env_dsn() else {
		eprintln!("Skipping messages_from_the_bot_itself_are_never_dispatched; set BANTER_PG_DSN.");

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let generation = ScriptedGeneration::new(&["ASK_QUESTION"]);
	let delivery = Arc::new(RecordingDelivery::default());
	let service = service_with(&test_db, generation.clone(), delivery.clone(), Vec::new()).await;
	let stored = service
		.ingest(&payload(&format!("{BOT_JID} in 1203@g.us"), "m5", Some("echo of my own reply")))
		.await
		.expect("Ingestion failed.");

	service.dispatch(&stored).await.expect("Dispatch failed.");

	assert_eq!(generation.calls(), 0);
	assert!(delivery.sent().is_empty());

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set BANTER_PG_DSN to run."]
async fn roster_sync_upserts_groups_and_owners() {
	let Some(base_dsn) = banter_testkit::env_dsn() else {
		eprintln!("Skipping roster_sync_upserts_groups_and_owners; set BANTER_PG_DSN.");

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let roster = vec![
		RosterGroup {
			jid: "1203@g.us".to_string(),
			name: Some("Family".to_string()),
			topic: Some("all things family".to_string()),
			owner_jid: Some("123".to_string()),
		},
		RosterGroup {
			jid: "456@s.whatsapp.net".to_string(),
			name: Some("not a group".to_string()),
			topic: None,
			owner_jid: None,
		},
	];
	let service = service_with(
		&test_db,
		ScriptedGeneration::new(&[]),
		Arc::new(RecordingDelivery::default()),
		roster,
	)
	.await;
	let synced = service.sync_groups().await.expect("Roster sync failed.");

	assert_eq!(synced, 1);

	let group = queries::fetch_group(&service.db, "1203@g.us")
		.await
		.expect("Fetch failed.")
		.expect("Group missing.");

	assert_eq!(group.group_name.as_deref(), Some("Family"));
	assert_eq!(group.owner_jid.as_deref(), Some("123@s.whatsapp.net"));
	assert!(
		queries::fetch_sender(&service.db, "123@s.whatsapp.net")
			.await
			.expect("Fetch failed.")
			.is_some()
	);

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set BANTER_PG_DSN to run."]
async fn group_summaries_fan_out_to_related_groups() {
	let Some(base_dsn) = banter_testkit::env_dsn() else {
		eprintln!("Skipping group_summaries_fan_out_to_related_groups; set BANTER_PG_DSN.");

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let generation = ScriptedGeneration::new(&["Quick recap of the Family group."]);
	let delivery = Arc::new(RecordingDelivery::default());
	let service = service_with(&test_db, generation.clone(), delivery.clone(), Vec::new()).await;

	for jid in ["1203@g.us", "1204@g.us"] {
		queries::ensure_group(&service.db, jid).await.expect("Ensure failed.");
		sqlx::query(
			"\
UPDATE groups
SET community_keys = $2, last_summary_sync = '2025-01-01T00:00:00Z'
WHERE group_jid = $1",
		)
		.bind(jid)
		.bind(vec!["family2024".to_string()])
		.execute(&service.db.pool)
		.await
		.expect("Failed to seed group.");
	}

	sqlx::query("UPDATE groups SET managed = TRUE, group_name = 'Family' WHERE group_jid = $1")
		.bind("1203@g.us")
		.execute(&service.db.pool)
		.await
		.expect("Failed to mark managed.");

	for n in 0..7 {
		service
			.ingest(&payload(
				"123@s.whatsapp.net in 1203@g.us",
				&format!("s{n}"),
				Some(&format!("message {n}")),
			))
			.await
			.expect("Seed ingestion failed.");
	}

	service.sync_group_summaries().await.expect("Summary sync failed.");

	let sent = delivery.sent();

	assert_eq!(sent.len(), 1);
	assert_eq!(sent[0].0, "1204@g.us");
	assert_eq!(sent[0].1, "Quick recap of the Family group.");
	assert_eq!(generation.calls(), 1);

	let synced_at: time::OffsetDateTime =
		sqlx::query_scalar("SELECT last_summary_sync FROM groups WHERE group_jid = $1")
			.bind("1203@g.us")
			.fetch_one(&service.db.pool)
			.await
			.expect("Failed to read last_summary_sync.");

	assert!(synced_at > datetime!(2025-01-01 00:00 UTC));

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}
