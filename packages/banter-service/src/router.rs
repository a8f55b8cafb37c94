//! Intent classification and dispatch for ingested messages.

use time::{Duration, OffsetDateTime};

use banter_providers::retry::call_with_retry;
use banter_storage::{models::Message, queries};

use crate::{BanterService, Result};

const CLASSIFY_SYSTEM_PROMPT: &str = "\
Classify the intent of a chat message. Answer with exactly one label and no \
other text:
ASK_QUESTION - the message asks for information the group may know.
HEY - the message greets or calls out to the assistant.
SUMMARIZE - the message asks for a recap of the recent conversation.
IGNORE - anything else.";

const SUMMARIZE_SYSTEM_PROMPT: &str = "\
Summarize the following chat messages in a few words. Write in the same \
language as the messages.";

const GREETING_REPLY: &str = "Who is calling my name?";

const NOTHING_TO_SUMMARIZE_REPLY: &str = "Nothing happened here in the last day.";

const FALLBACK_REPLY: &str =
	"Sorry, I could not look that up right now. Please try again in a bit.";

const SUMMARY_WINDOW_HOURS: i64 = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
	AskQuestion,
	Greeting,
	Summarize,
	Ignore,
	/// The classifier answered outside the closed label set.
	Other,
}

/// Maps a classifier reply onto the closed intent set. Anything that is not
/// an exact known label is `Other`, which dispatches as a no-op.
pub fn parse_intent(raw: &str) -> Intent {
	let label = raw
		.trim()
		.split_whitespace()
		.next()
		.unwrap_or_default()
		.trim_matches(|c: char| !c.is_ascii_alphanumeric() && c != '_');

	match label.to_ascii_uppercase().as_str() {
		"ASK_QUESTION" => Intent::AskQuestion,
		"HEY" => Intent::Greeting,
		"SUMMARIZE" => Intent::Summarize,
		"IGNORE" => Intent::Ignore,
		_ => Intent::Other,
	}
}

impl BanterService {
	/// Routes one stored message. Textless messages and the bot's own
	/// re-ingested messages are never dispatched. Once a question is
	/// recognized the chat always gets a reply, falling back to an apology
	/// when the answer path exhausts its retries.
	pub async fn dispatch(&self, message: &Message) -> Result<()> {
		let Some(text) = message.text.as_deref().filter(|text| !text.trim().is_empty()) else {
			return Ok(());
		};

		if message.sender_jid == self.bot_jid()? {
			return Ok(());
		}

		let intent = match call_with_retry(&self.retry, "classify-intent", || {
			self.providers.generation.generate(
				&self.cfg.providers.generation,
				CLASSIFY_SYSTEM_PROMPT,
				text,
			)
		})
		.await
		{
			Ok(raw) => parse_intent(&raw),
			Err(err) => {
				tracing::error!(
					message_id = %message.message_id,
					error = %err,
					"Intent classification failed. Leaving the message unrouted."
				);

				Intent::Other
			},
		};

		tracing::debug!(message_id = %message.message_id, ?intent, "Routed a message.");

		match intent {
			Intent::AskQuestion => {
				let reply = match self.answer_question(text, &message.chat_jid).await {
					Ok(answer) => answer,
					Err(err) => {
						tracing::error!(
							message_id = %message.message_id,
							error = %err,
							"Answer path failed. Sending the fallback reply."
						);

						FALLBACK_REPLY.to_string()
					},
				};

				self.send_and_record(&message.chat_jid, &reply, Some(&message.message_id))
					.await?;
			},
			Intent::Greeting => {
				self.send_and_record(&message.chat_jid, GREETING_REPLY, None).await?;
			},
			Intent::Summarize => self.summarize_chat(&message.chat_jid).await?,
			Intent::Ignore | Intent::Other => {},
		}

		Ok(())
	}

	/// Replies with a short summary of the last 24 hours of the chat.
	pub async fn summarize_chat(&self, chat_jid: &str) -> Result<()> {
		let cutoff = OffsetDateTime::now_utc() - Duration::hours(SUMMARY_WINDOW_HOURS);
		let history = queries::recent_chat_messages(
			&self.db,
			chat_jid,
			None,
			self.cfg.retrieval.history_limit as i64,
		)
		.await?;
		let window: Vec<Message> =
			history.into_iter().filter(|message| message.timestamp >= cutoff).collect();

		if window.is_empty() {
			self.send_and_record(chat_jid, NOTHING_TO_SUMMARIZE_REPLY, None).await?;

			return Ok(());
		}

		let transcript = crate::summary::format_transcript(&window);
		let summary = call_with_retry(&self.retry, "summarize-chat", || {
			self.providers.generation.generate(
				&self.cfg.providers.generation,
				SUMMARIZE_SYSTEM_PROMPT,
				&transcript,
			)
		})
		.await?;

		self.send_and_record(chat_jid, &summary, None).await?;

		Ok(())
	}
}
