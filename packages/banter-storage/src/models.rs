use time::OffsetDateTime;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Sender {
	pub jid: String,
	pub push_name: Option<String>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Group {
	pub group_jid: String,
	pub group_name: Option<String>,
	pub group_topic: Option<String>,
	pub owner_jid: Option<String>,
	pub managed: bool,
	/// Opaque tags linking sibling groups; two groups are related iff their
	/// key sets intersect.
	pub community_keys: Option<Vec<String>>,
	pub last_ingest: OffsetDateTime,
	pub last_summary_sync: OffsetDateTime,
	pub forward_url: Option<String>,
	pub notify_on_spam: bool,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Message {
	pub message_id: String,
	pub timestamp: OffsetDateTime,
	pub text: Option<String>,
	pub media_url: Option<String>,
	pub chat_jid: String,
	pub sender_jid: String,
	pub group_jid: Option<String>,
	pub reply_to_id: Option<String>,
}

/// A knowledge-base topic as read back for retrieval, with its distance to
/// the query vector.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TopicMatch {
	pub id: String,
	pub group_jid: Option<String>,
	pub start_time: OffsetDateTime,
	pub speakers: Vec<String>,
	pub subject: String,
	pub summary: String,
	pub distance: f64,
}

/// A topic row to persist; written only by the bulk-upsert path.
#[derive(Debug, Clone)]
pub struct KbTopicInsert {
	pub id: String,
	pub group_jid: Option<String>,
	pub start_time: OffsetDateTime,
	pub speakers: Vec<String>,
	pub subject: String,
	pub summary: String,
	pub embedding: Vec<f32>,
}

/// Deterministic topic id: re-extracting the same window yields the same row.
pub fn topic_id(group_jid: Option<&str>, start_time: OffsetDateTime, subject: &str) -> String {
	let mut hasher = blake3::Hasher::new();

	hasher.update(group_jid.unwrap_or_default().as_bytes());
	hasher.update(b"/");
	hasher.update(start_time.unix_timestamp().to_le_bytes().as_slice());
	hasher.update(b"/");
	hasher.update(subject.as_bytes());

	hasher.finalize().to_hex().to_string()
}
