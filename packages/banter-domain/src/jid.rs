//! WhatsApp address (JID) grammar and normalization.
//!
//! Three textual forms denote one logical address: `user@server`,
//! `user:device@server` (legacy device suffix, dropped on parse), and
//! `user.agent:device@server` (the "ad" notation, default user server only).
//! Identity comparisons always go through the normalized canonical form.

use std::fmt;

pub const DEFAULT_USER_SERVER: &str = "s.whatsapp.net";
pub const GROUP_SERVER: &str = "g.us";
pub const LEGACY_USER_SERVER: &str = "c.us";
pub const BROADCAST_SERVER: &str = "broadcast";
pub const HIDDEN_USER_SERVER: &str = "lid";
pub const STATUS_BROADCAST_USER: &str = "status";

pub type Result<T, E = JidParseError> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum JidParseError {
	#[error("Missing separator '@' in {0:?}.")]
	MissingSeparator(String),
	#[error("Missing '.' or ':' separator in ad JID {0:?}.")]
	MissingAdSeparators(String),
	#[error("Invalid agent/device in JID {jid:?}: {value}.")]
	AgentDeviceOutOfRange { jid: String, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Jid {
	pub user: String,
	pub agent: u8,
	pub device: u8,
	pub server: String,
	pub ad: bool,
}
impl Jid {
	pub fn new(user: impl Into<String>, server: impl Into<String>) -> Self {
		Self { user: user.into(), agent: 0, device: 0, server: server.into(), ad: false }
	}

	pub fn new_ad(user: impl Into<String>, agent: u8, device: u8) -> Self {
		Self {
			user: user.into(),
			agent,
			device,
			server: DEFAULT_USER_SERVER.to_string(),
			ad: true,
		}
	}

	/// Canonical form: user+server only; agent/device are a transport detail.
	pub fn to_non_ad(&self) -> Self {
		if self.ad { Self::new(self.user.clone(), DEFAULT_USER_SERVER) } else { self.clone() }
	}

	pub fn is_group(&self) -> bool {
		self.server == GROUP_SERVER
	}

	pub fn is_broadcast_list(&self) -> bool {
		self.server == BROADCAST_SERVER && self.user != STATUS_BROADCAST_USER
	}

	pub fn is_empty(&self) -> bool {
		self.server.is_empty()
	}

	pub fn normalize(&self) -> String {
		self.to_non_ad().to_string()
	}
}
impl fmt::Display for Jid {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		if self.ad {
			write!(f, "{}.{}:{}@{}", self.user, self.agent, self.device, self.server)
		} else if self.user.is_empty() {
			write!(f, "{}", self.server)
		} else {
			write!(f, "{}@{}", self.user, self.server)
		}
	}
}

pub fn parse_jid(raw: &str) -> Result<Jid> {
	let Some((left, server)) = raw.split_once('@') else {
		// Bare numeric strings are shorthand for a default-server user.
		if raw.is_empty() || !raw.chars().all(|c| c.is_ascii_digit()) {
			return Err(JidParseError::MissingSeparator(raw.to_string()));
		}

		return Ok(Jid::new(raw, DEFAULT_USER_SERVER));
	};

	if left.contains(':') && server == DEFAULT_USER_SERVER {
		if left.contains('.') {
			return parse_ad_jid(left);
		}

		let user = left.split(':').next().unwrap_or_default();

		return Ok(Jid::new(user, server));
	}

	Ok(Jid::new(left, server))
}

fn parse_ad_jid(left: &str) -> Result<Jid> {
	let (Some(dot), Some(colon)) = (left.find('.'), left.find(':')) else {
		return Err(JidParseError::MissingAdSeparators(left.to_string()));
	};

	if colon < dot {
		return Err(JidParseError::MissingAdSeparators(left.to_string()));
	}

	let user = &left[..dot];
	let agent = parse_component(left, &left[dot + 1..colon])?;
	let device = parse_component(left, &left[colon + 1..])?;

	Ok(Jid::new_ad(user, agent, device))
}

fn parse_component(jid: &str, value: &str) -> Result<u8> {
	value.parse::<u8>().map_err(|_| JidParseError::AgentDeviceOutOfRange {
		jid: jid.to_string(),
		value: value.to_string(),
	})
}

/// Parses and renders the canonical form. Idempotent over its own output.
pub fn normalize_jid(raw: &str) -> Result<String> {
	Ok(parse_jid(raw)?.normalize())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn legacy_device_suffix_is_dropped() {
		let jid = parse_jid("123:45@s.whatsapp.net").expect("parse failed");

		assert_eq!(jid, Jid::new("123", DEFAULT_USER_SERVER));
	}

	#[test]
	fn colon_outside_default_server_stays_in_user() {
		let jid = parse_jid("123:45@g.us").expect("parse failed");

		assert_eq!(jid.user, "123:45");
		assert!(jid.is_group());
	}

	#[test]
	fn ad_separator_order_is_enforced() {
		assert!(parse_jid("123:1.2@s.whatsapp.net").is_err());
	}

	#[test]
	fn agent_device_range_is_enforced() {
		assert!(parse_jid("123.256:0@s.whatsapp.net").is_err());
		assert!(parse_jid("123.0:999@s.whatsapp.net").is_err());
		assert!(parse_jid("123.x:0@s.whatsapp.net").is_err());
	}

	#[test]
	fn status_broadcast_is_not_a_broadcast_list() {
		assert!(!parse_jid("status@broadcast").expect("parse failed").is_broadcast_list());
		assert!(parse_jid("1234@broadcast").expect("parse failed").is_broadcast_list());
	}
}
