//! Group roster refresh from the gateway. Externally-owned columns (name,
//! topic, owner) are overwritten; locally-owned state survives every sync.

use banter_domain::jid::{normalize_jid, parse_jid};
use banter_providers::retry::call_with_retry;
use banter_storage::{models::Sender, queries};

use crate::{BanterService, Result};

impl BanterService {
	/// Pulls the bot's current groups and refreshes their rows. Unparseable
	/// and non-group entries are logged and skipped. Returns the number of
	/// groups synced.
	pub async fn sync_groups(&self) -> Result<usize> {
		let entries = call_with_retry(&self.retry, "fetch-roster", || {
			self.providers.roster.fetch_groups(&self.cfg.whatsapp)
		})
		.await?;
		let mut synced = 0;

		for entry in entries {
			let group_jid = match normalize_jid(&entry.jid) {
				Ok(jid) => jid,
				Err(err) => {
					tracing::warn!(jid = %entry.jid, error = %err, "Skipping a roster entry with an unparseable address.");

					continue;
				},
			};

			if !parse_jid(&group_jid).is_ok_and(|jid| jid.is_group()) {
				tracing::warn!(%group_jid, "Skipping a non-group roster entry.");

				continue;
			}

			let owner_jid = entry.owner_jid.as_deref().and_then(|raw| match normalize_jid(raw) {
				Ok(jid) => Some(jid),
				Err(err) => {
					tracing::warn!(%group_jid, owner = %raw, error = %err, "Dropping an unparseable owner address.");

					None
				},
			});

			// Owner rows must exist before the group references them.
			if let Some(owner_jid) = &owner_jid {
				queries::upsert_sender(
					&self.db,
					&Sender { jid: owner_jid.clone(), push_name: None },
				)
				.await?;
			}

			queries::upsert_group_roster(
				&self.db,
				&group_jid,
				entry.name.as_deref(),
				entry.topic.as_deref(),
				owner_jid.as_deref(),
			)
			.await?;

			synced += 1;
		}

		tracing::info!(synced, "Refreshed the group roster.");

		Ok(synced)
	}
}
