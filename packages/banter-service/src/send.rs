//! Outbound delivery: send through the gateway, then record the sent message
//! under the bot's own address so it shows up in chat history.

use time::OffsetDateTime;

use banter_domain::jid::parse_jid;
use banter_providers::{delivery::SendReceipt, retry::call_with_retry};
use banter_storage::{
	models::{Message, Sender},
	queries,
};

use crate::{BanterService, Result};

impl BanterService {
	pub async fn send_and_record(
		&self,
		chat_jid: &str,
		text: &str,
		reply_to_id: Option<&str>,
	) -> Result<SendReceipt> {
		let receipt = call_with_retry(&self.retry, "send-message", || {
			self.providers.delivery.send_message(&self.cfg.whatsapp, chat_jid, text, reply_to_id)
		})
		.await?;
		let bot_jid = self.bot_jid()?;
		let group_jid =
			parse_jid(chat_jid).is_ok_and(|jid| jid.is_group()).then(|| chat_jid.to_string());
		let record = Message {
			message_id: receipt.message_id.clone(),
			timestamp: OffsetDateTime::now_utc(),
			text: Some(text.to_string()),
			media_url: None,
			chat_jid: chat_jid.to_string(),
			sender_jid: bot_jid.clone(),
			group_jid: group_jid.clone(),
			reply_to_id: reply_to_id.map(|id| id.to_string()),
		};
		let sender = Sender { jid: bot_jid, push_name: None };

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

		tracing::info!(
			%chat_jid,
			message_id = %receipt.message_id,
			"Delivered and recorded an outbound message."
		);

		Ok(receipt)
	}
}
