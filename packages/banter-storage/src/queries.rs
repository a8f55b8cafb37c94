use sqlx::{Executor, Postgres, QueryBuilder, Transaction};
use time::OffsetDateTime;

use crate::{
	Result,
	db::Db,
	models::{Group, KbTopicInsert, Message, Sender, TopicMatch},
};

const MESSAGE_COLUMNS: &str = "\
message_id, timestamp, text, media_url, chat_jid, sender_jid, group_jid, reply_to_id";

const GROUP_COLUMNS: &str = "\
group_jid, group_name, group_topic, owner_jid, managed, community_keys, last_ingest, \
last_summary_sync, forward_url, notify_on_spam";

pub async fn upsert_sender(db: &Db, sender: &Sender) -> Result<()> {
	upsert_sender_exec(&db.pool, sender).await?;

	Ok(())
}

pub async fn upsert_sender_tx(tx: &mut Transaction<'_, Postgres>, sender: &Sender) -> Result<()> {
	upsert_sender_exec(&mut **tx, sender).await?;

	Ok(())
}

async fn upsert_sender_exec<'e, E>(executor: E, sender: &Sender) -> Result<()>
where
	E: Executor<'e, Database = Postgres>,
{
	// A null hint never clobbers a known display name.
	sqlx::query(
		"\
INSERT INTO senders (jid, push_name)
VALUES ($1, $2)
ON CONFLICT (jid) DO UPDATE
SET push_name = COALESCE(EXCLUDED.push_name, senders.push_name)",
	)
	.bind(&sender.jid)
	.bind(&sender.push_name)
	.execute(executor)
	.await?;

	Ok(())
}

/// Creates a minimal group row on first sight of a group chat. Existing rows
/// are left untouched.
pub async fn ensure_group_tx(tx: &mut Transaction<'_, Postgres>, group_jid: &str) -> Result<()> {
	ensure_group_exec(&mut **tx, group_jid).await?;

	Ok(())
}

pub async fn ensure_group(db: &Db, group_jid: &str) -> Result<()> {
	ensure_group_exec(&db.pool, group_jid).await?;

	Ok(())
}

async fn ensure_group_exec<'e, E>(executor: E, group_jid: &str) -> Result<()>
where
	E: Executor<'e, Database = Postgres>,
{
	sqlx::query("INSERT INTO groups (group_jid) VALUES ($1) ON CONFLICT (group_jid) DO NOTHING")
		.bind(group_jid)
		.execute(executor)
		.await?;

	Ok(())
}

/// Roster refresh: updates the externally-owned columns only. Locally-owned
/// state (managed, community_keys, timestamps, forward_url, notify_on_spam)
/// survives every sync.
pub async fn upsert_group_roster(
	db: &Db,
	group_jid: &str,
	group_name: Option<&str>,
	group_topic: Option<&str>,
	owner_jid: Option<&str>,
) -> Result<()> {
	sqlx::query(
		"\
INSERT INTO groups (group_jid, group_name, group_topic, owner_jid)
VALUES ($1, $2, $3, $4)
ON CONFLICT (group_jid) DO UPDATE
SET
	group_name = EXCLUDED.group_name,
	group_topic = EXCLUDED.group_topic,
	owner_jid = EXCLUDED.owner_jid",
	)
	.bind(group_jid)
	.bind(group_name)
	.bind(group_topic)
	.bind(owner_jid)
	.execute(&db.pool)
	.await?;

	Ok(())
}

pub async fn insert_message_tx(tx: &mut Transaction<'_, Postgres>, message: &Message) -> Result<()> {
	insert_message_exec(&mut **tx, message).await?;

	Ok(())
}

async fn insert_message_exec<'e, E>(executor: E, message: &Message) -> Result<()>
where
	E: Executor<'e, Database = Postgres>,
{
	// Webhook redelivery of the same platform message id is a no-op.
	sqlx::query(
		"\
INSERT INTO messages (
	message_id,
	timestamp,
	text,
	media_url,
	chat_jid,
	sender_jid,
	group_jid,
	reply_to_id
)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
ON CONFLICT (message_id) DO NOTHING",
	)
	.bind(&message.message_id)
	.bind(message.timestamp)
	.bind(&message.text)
	.bind(&message.media_url)
	.bind(&message.chat_jid)
	.bind(&message.sender_jid)
	.bind(&message.group_jid)
	.bind(&message.reply_to_id)
	.execute(executor)
	.await?;

	Ok(())
}

pub async fn fetch_sender(db: &Db, jid: &str) -> Result<Option<Sender>> {
	let sender =
		sqlx::query_as::<_, Sender>("SELECT jid, push_name FROM senders WHERE jid = $1")
			.bind(jid)
			.fetch_optional(&db.pool)
			.await?;

	Ok(sender)
}

pub async fn fetch_group(db: &Db, group_jid: &str) -> Result<Option<Group>> {
	let group = sqlx::query_as::<_, Group>(&format!(
		"SELECT {GROUP_COLUMNS} FROM groups WHERE group_jid = $1"
	))
	.bind(group_jid)
	.fetch_optional(&db.pool)
	.await?;

	Ok(group)
}

pub async fn fetch_message(db: &Db, message_id: &str) -> Result<Option<Message>> {
	let message = sqlx::query_as::<_, Message>(&format!(
		"SELECT {MESSAGE_COLUMNS} FROM messages WHERE message_id = $1"
	))
	.bind(message_id)
	.fetch_optional(&db.pool)
	.await?;

	Ok(message)
}

/// Recent messages for one chat, newest first. `exclude_sender` drops the
/// bot's own re-ingested messages when the history policy excludes them.
pub async fn recent_chat_messages(
	db: &Db,
	chat_jid: &str,
	exclude_sender: Option<&str>,
	limit: i64,
) -> Result<Vec<Message>> {
	let messages = match exclude_sender {
		Some(excluded) => {
			sqlx::query_as::<_, Message>(&format!(
				"\
SELECT {MESSAGE_COLUMNS}
FROM messages
WHERE chat_jid = $1 AND sender_jid <> $2
ORDER BY timestamp DESC
LIMIT $3"
			))
			.bind(chat_jid)
			.bind(excluded)
			.bind(limit)
			.fetch_all(&db.pool)
			.await?
		},
		None => {
			sqlx::query_as::<_, Message>(&format!(
				"\
SELECT {MESSAGE_COLUMNS}
FROM messages
WHERE chat_jid = $1
ORDER BY timestamp DESC
LIMIT $2"
			))
			.bind(chat_jid)
			.bind(limit)
			.fetch_all(&db.pool)
			.await?
		},
	};

	Ok(messages)
}

/// Group messages newer than `since`, newest first, excluding one sender.
pub async fn group_messages_since(
	db: &Db,
	group_jid: &str,
	since: OffsetDateTime,
	exclude_sender: &str,
) -> Result<Vec<Message>> {
	let messages = sqlx::query_as::<_, Message>(&format!(
		"\
SELECT {MESSAGE_COLUMNS}
FROM messages
WHERE group_jid = $1 AND timestamp >= $2 AND sender_jid <> $3
ORDER BY timestamp DESC"
	))
	.bind(group_jid)
	.bind(since)
	.bind(exclude_sender)
	.fetch_all(&db.pool)
	.await?;

	Ok(messages)
}

/// All other groups sharing at least one community key with `group_jid`.
pub async fn related_groups(db: &Db, group_jid: &str, keys: &[String]) -> Result<Vec<Group>> {
	if keys.is_empty() {
		return Ok(Vec::new());
	}

	let groups = sqlx::query_as::<_, Group>(&format!(
		"\
SELECT {GROUP_COLUMNS}
FROM groups
WHERE group_jid <> $1 AND community_keys && $2"
	))
	.bind(group_jid)
	.bind(keys)
	.fetch_all(&db.pool)
	.await?;

	Ok(groups)
}

pub async fn managed_groups(db: &Db) -> Result<Vec<Group>> {
	let groups = sqlx::query_as::<_, Group>(&format!(
		"SELECT {GROUP_COLUMNS} FROM groups WHERE managed = TRUE"
	))
	.fetch_all(&db.pool)
	.await?;

	Ok(groups)
}

/// Cosine-ordered topic search, optionally restricted to a group scope set,
/// truncated to `top_k`. Distances are non-decreasing in the returned order.
pub async fn search_topics(
	db: &Db,
	embedding: &[f32],
	scope_group_jids: Option<&[String]>,
	top_k: i64,
) -> Result<Vec<TopicMatch>> {
	let vec_text = format_vector_text(embedding);
	let matches = match scope_group_jids {
		Some(scope) => {
			sqlx::query_as::<_, TopicMatch>(
				"\
SELECT
	id,
	group_jid,
	start_time,
	speakers,
	subject,
	summary,
	embedding <=> $1::text::vector AS distance
FROM kb_topics
WHERE group_jid = ANY($2)
ORDER BY embedding <=> $1::text::vector
LIMIT $3",
			)
			.bind(&vec_text)
			.bind(scope)
			.bind(top_k)
			.fetch_all(&db.pool)
			.await?
		},
		None => {
			sqlx::query_as::<_, TopicMatch>(
				"\
SELECT
	id,
	group_jid,
	start_time,
	speakers,
	subject,
	summary,
	embedding <=> $1::text::vector AS distance
FROM kb_topics
ORDER BY embedding <=> $1::text::vector
LIMIT $2",
			)
			.bind(&vec_text)
			.bind(top_k)
			.fetch_all(&db.pool)
			.await?
		},
	};

	Ok(matches)
}

/// One multi-row insert-or-update for a batch of extracted topics.
pub async fn bulk_upsert_topics(db: &Db, topics: &[KbTopicInsert]) -> Result<()> {
	if topics.is_empty() {
		return Ok(());
	}

	let mut builder = QueryBuilder::new(
		"\
INSERT INTO kb_topics (
	id,
	group_jid,
	start_time,
	speakers,
	subject,
	summary,
	embedding
) ",
	);
	builder.push_values(topics, |mut b, topic| {
		b.push_bind(&topic.id)
			.push_bind(&topic.group_jid)
			.push_bind(topic.start_time)
			.push_bind(&topic.speakers)
			.push_bind(&topic.subject)
			.push_bind(&topic.summary)
			.push_bind(format_vector_text(&topic.embedding))
			.push_unseparated("::text::vector");
	});
	builder.push(
		"\
 ON CONFLICT (id) DO UPDATE
SET
	group_jid = EXCLUDED.group_jid,
	start_time = EXCLUDED.start_time,
	speakers = EXCLUDED.speakers,
	subject = EXCLUDED.subject,
	summary = EXCLUDED.summary,
	embedding = EXCLUDED.embedding",
	);
	builder.build().execute(&db.pool).await?;

	Ok(())
}

pub async fn touch_last_ingest(db: &Db, group_jid: &str, at: OffsetDateTime) -> Result<()> {
	sqlx::query("UPDATE groups SET last_ingest = $2 WHERE group_jid = $1")
		.bind(group_jid)
		.bind(at)
		.execute(&db.pool)
		.await?;

	Ok(())
}

pub async fn set_last_summary_sync(db: &Db, group_jid: &str, at: OffsetDateTime) -> Result<()> {
	sqlx::query("UPDATE groups SET last_summary_sync = $2 WHERE group_jid = $1")
		.bind(group_jid)
		.bind(at)
		.execute(&db.pool)
		.await?;

	Ok(())
}

pub fn format_vector_text(vec: &[f32]) -> String {
	let mut out = String::from("[");

	for (idx, value) in vec.iter().enumerate() {
		if idx > 0 {
			out.push(',');
		}
		out.push_str(&value.to_string());
	}

	out.push(']');

	out
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn vector_text_is_pgvector_literal() {
		assert_eq!(format_vector_text(&[1.0, -0.5, 0.25]), "[1,-0.5,0.25]");
		assert_eq!(format_vector_text(&[]), "[]");
	}
}
