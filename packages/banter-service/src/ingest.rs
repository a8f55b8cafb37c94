//! Webhook message ingestion: address normalization, text extraction, and one
//! all-or-nothing persistence unit per payload.

use banter_domain::{
	content::WebhookPayload,
	jid::{normalize_jid, parse_jid},
};
use banter_storage::{
	models::{Message, Sender},
	queries,
};

use crate::{BanterService, Error, Result};

impl BanterService {
	/// Persists one inbound payload and returns the stored row. Sender and
	/// group rows are created on first sight; redelivery of an already-stored
	/// message id is a no-op. Messages without extractable text are persisted
	/// too, the router just never dispatches them.
	pub async fn ingest(&self, payload: &WebhookPayload) -> Result<Message> {
		let Some(message_id) = payload.message_id() else {
			return Err(Error::InvalidRequest {
				message: "Webhook payload is missing a message id.".to_string(),
			});
		};
		let (sender_raw, chat_raw) = payload.split_sender_chat();
		let sender_jid = normalize_jid(sender_raw)?;
		let chat_jid = normalize_jid(chat_raw)?;
		let group_jid = parse_jid(chat_raw)?.is_group().then(|| chat_jid.clone());
		let record = Message {
			message_id: message_id.to_string(),
			timestamp: payload.timestamp,
			text: payload.extract_text().map(|extracted| extracted.text),
			media_url: payload.media_path().map(|path| path.to_string()),
			chat_jid,
			sender_jid: sender_jid.clone(),
			group_jid: group_jid.clone(),
			reply_to_id: payload.reply_to_id().map(|id| id.to_string()),
		};
		let sender = Sender { jid: sender_jid, push_name: payload.pushname.clone() };
		let ingested_group = group_jid.clone();

		self.db
			.atomic(move |tx| {
				Box::pin(async move {
					queries::upsert_sender_tx(tx, &sender).await?;

					if let Some(group_jid) = &group_jid {
						queries::ensure_group_tx(tx, group_jid).await?;
					}

					queries::insert_message_tx(tx, &record).await?;

					Ok(())
				})
			})
			.await?;

		if let Some(group_jid) = &ingested_group {
			queries::touch_last_ingest(&self.db, group_jid, payload.timestamp).await?;
		}

		let Some(message) = queries::fetch_message(&self.db, message_id).await? else {
			return Err(Error::NotFound {
				message: format!("Message {message_id} vanished after ingestion."),
			});
		};

		tracing::info!(
			message_id = %message.message_id,
			chat_jid = %message.chat_jid,
			has_text = message.text.is_some(),
			"Ingested a webhook message."
		);

		Ok(message)
	}
}
