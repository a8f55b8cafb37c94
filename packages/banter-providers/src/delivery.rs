use std::time::Duration;

use color_eyre::{Result, eyre};
use reqwest::{Client, RequestBuilder};
use serde_json::Value;

#[derive(Debug, Clone)]
pub struct SendReceipt {
	pub message_id: String,
}

/// Delivers a text message through the WhatsApp web gateway. The gateway
/// speaks JSON over HTTP with optional basic auth.
pub async fn send_message(
	cfg: &banter_config::WhatsApp,
	to_jid: &str,
	text: &str,
	reply_to_id: Option<&str>,
) -> Result<SendReceipt> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}/send/message", cfg.api_base.trim_end_matches('/'));
	let mut body = serde_json::json!({
		"phone": to_jid,
		"message": text,
	});

	if let Some(reply_to_id) = reply_to_id {
		body["reply_message_id"] = Value::from(reply_to_id);
	}

	let res = with_gateway_auth(client.post(url), cfg).json(&body).send().await?;
	let json: Value = res.error_for_status()?.json().await?;

	parse_send_response(json)
}

pub(crate) fn with_gateway_auth(
	request: RequestBuilder,
	cfg: &banter_config::WhatsApp,
) -> RequestBuilder {
	match (&cfg.basic_auth_user, &cfg.basic_auth_password) {
		(Some(user), Some(password)) => request.basic_auth(user, Some(password)),
		_ => request,
	}
}

fn parse_send_response(json: Value) -> Result<SendReceipt> {
	let message_id = json
		.get("results")
		.and_then(|results| results.get("message_id"))
		.and_then(|id| id.as_str())
		.ok_or_else(|| eyre::eyre!("Send response is missing results.message_id."))?;

	Ok(SendReceipt { message_id: message_id.to_string() })
}
