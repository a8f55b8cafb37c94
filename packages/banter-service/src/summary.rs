//! Periodic group summaries: for each managed group, summarize what happened
//! since the last sync and fan the summary out to its community-related
//! groups. The scheduler that fires this lives outside the service.

use time::OffsetDateTime;

use banter_domain::jid::parse_jid;
use banter_providers::retry::call_with_retry;
use banter_storage::{
	models::{Group, Message},
	queries,
};

use crate::{BanterService, Result};

/// Below this, a summary would just repeat the chat.
const SUMMARY_MIN_MESSAGES: usize = 7;

fn summary_system_prompt(group_name: &str) -> String {
	format!(
		"\
Write a quick summary of what happened in the chat group since the last summary.
- Start by stating this is a quick summary of what happened in \"{group_name}\" group recently.
- Use a casual conversational writing style.
- Keep it short and sweet.
- Write in the same language as the chat group.
- Tag users when talking about them (e.g., @972536150150)."
	)
}

/// One line per message: `<timestamp>: @<user>: <text>`. Senders whose
/// address fails to parse keep the raw form.
pub(crate) fn format_transcript(messages: &[Message]) -> String {
	messages
		.iter()
		.map(|message| {
			let user = parse_jid(&message.sender_jid)
				.map(|jid| jid.user)
				.unwrap_or_else(|_| message.sender_jid.clone());

			format!("{}: @{}: {}", message.timestamp, user, message.text.as_deref().unwrap_or(""))
		})
		.collect::<Vec<_>>()
		.join("\n")
}

impl BanterService {
	/// Runs one summary pass over every managed group. A failure in one group
	/// is logged and does not stop the others.
	pub async fn sync_group_summaries(&self) -> Result<()> {
		for group in queries::managed_groups(&self.db).await? {
			if let Err(err) = self.sync_one_group_summary(&group).await {
				tracing::error!(
					group_jid = %group.group_jid,
					error = %err,
					"Group summary sync failed."
				);
			}
		}

		Ok(())
	}

	async fn sync_one_group_summary(&self, group: &Group) -> Result<()> {
		let bot_jid = self.bot_jid()?;
		let messages = queries::group_messages_since(
			&self.db,
			&group.group_jid,
			group.last_summary_sync,
			&bot_jid,
		)
		.await?;

		if messages.len() < SUMMARY_MIN_MESSAGES {
			tracing::info!(
				group_jid = %group.group_jid,
				count = messages.len(),
				"Not enough messages to summarize."
			);

			return Ok(());
		}

		let group_name = group.group_name.as_deref().unwrap_or(&group.group_jid);
		let system = summary_system_prompt(group_name);
		let transcript = format_transcript(&messages);
		let summary = call_with_retry(&self.retry, "summarize-group", || {
			self.providers.generation.generate(&self.cfg.providers.generation, &system, &transcript)
		})
		.await?;
		let keys = group.community_keys.clone().unwrap_or_default();

		for related in queries::related_groups(&self.db, &group.group_jid, &keys).await? {
			self.send_and_record(&related.group_jid, &summary, None).await?;
		}

		queries::set_last_summary_sync(&self.db, &group.group_jid, OffsetDateTime::now_utc())
			.await?;

		Ok(())
	}
}
