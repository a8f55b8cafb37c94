use std::time::Duration;

use color_eyre::{Result, eyre};
use reqwest::Client;
use serde_json::Value;

/// One group as reported by the gateway's roster endpoint.
#[derive(Debug, Clone)]
pub struct RosterGroup {
	pub jid: String,
	pub name: Option<String>,
	pub topic: Option<String>,
	pub owner_jid: Option<String>,
}

/// Fetches the bot's current group roster from the gateway.
pub async fn fetch_groups(cfg: &banter_config::WhatsApp) -> Result<Vec<RosterGroup>> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}/user/my/groups", cfg.api_base.trim_end_matches('/'));
	let res = crate::delivery::with_gateway_auth(client.get(url), cfg).send().await?;
	let json: Value = res.error_for_status()?.json().await?;

	parse_roster_response(json)
}

fn parse_roster_response(json: Value) -> Result<Vec<RosterGroup>> {
	let data = json
		.get("results")
		.and_then(|results| results.get("data"))
		.and_then(|data| data.as_array())
		.ok_or_else(|| eyre::eyre!("Roster response is missing results.data array."))?;

	let mut out = Vec::with_capacity(data.len());
	for item in data {
		let Some(jid) = item.get("JID").and_then(|v| v.as_str()) else {
			tracing::warn!("Roster entry missing JID. Skipping.");

			continue;
		};
		// Owner may come as a phone number or a JID; either parses downstream.
		let owner_jid = item
			.get("OwnerPN")
			.and_then(|v| v.as_str())
			.or_else(|| item.get("OwnerJID").and_then(|v| v.as_str()))
			.filter(|owner| !owner.is_empty())
			.map(|owner| owner.to_string());

		out.push(RosterGroup {
			jid: jid.to_string(),
			name: item.get("Name").and_then(|v| v.as_str()).map(|name| name.to_string()),
			topic: item.get("Topic").and_then(|v| v.as_str()).map(|topic| topic.to_string()),
			owner_jid,
		});
	}

	Ok(out)
}
