//! Parsed webhook payload shape and message-text extraction.
//!
//! A payload carries at most one rich content block per type. Text extraction
//! prefers native message text, then falls back through the attachment kinds
//! in a fixed priority order, labeling derived text so consumers can tell it
//! apart from what the sender actually typed.

use serde::Deserialize;
use time::OffsetDateTime;

#[derive(Debug, Deserialize)]
pub struct WebhookPayload {
	/// Raw address field; encodes `"<sender> in <chat>"` for group messages.
	#[serde(rename = "from")]
	pub from_raw: String,
	#[serde(with = "time::serde::rfc3339")]
	pub timestamp: OffsetDateTime,
	#[serde(default)]
	pub pushname: Option<String>,
	#[serde(default)]
	pub message: Option<MessageContent>,
	#[serde(default)]
	pub image: Option<MediaContent>,
	#[serde(default)]
	pub video: Option<MediaContent>,
	#[serde(default)]
	pub audio: Option<MediaContent>,
	#[serde(default)]
	pub document: Option<MediaContent>,
	#[serde(default)]
	pub sticker: Option<MediaContent>,
	#[serde(default)]
	pub contact: Option<ContactContent>,
	#[serde(default)]
	pub location: Option<LocationContent>,
	#[serde(default)]
	pub poll: Option<PollContent>,
	#[serde(default)]
	pub list: Option<ListContent>,
	#[serde(default)]
	pub order: Option<OrderContent>,
	#[serde(default)]
	pub forwarded: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct MessageContent {
	#[serde(default)]
	pub id: Option<String>,
	#[serde(default)]
	pub text: Option<String>,
	#[serde(default)]
	pub replied_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MediaContent {
	#[serde(default)]
	pub media_path: Option<String>,
	#[serde(default)]
	pub mime_type: Option<String>,
	#[serde(default)]
	pub caption: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ContactContent {
	#[serde(default)]
	pub display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LocationContent {
	#[serde(default)]
	pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PollContent {
	#[serde(default)]
	pub question: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListContent {
	#[serde(default)]
	pub title: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct OrderContent {
	#[serde(default)]
	pub message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
	Image,
	Video,
	Audio,
	Document,
	Sticker,
	Contact,
	Location,
	Poll,
	List,
	Order,
}
impl ContentKind {
	pub fn label(self) -> &'static str {
		match self {
			Self::Image => "Image",
			Self::Video => "Video",
			Self::Audio => "Audio",
			Self::Document => "Document",
			Self::Sticker => "Sticker",
			Self::Contact => "Contact",
			Self::Location => "Location",
			Self::Poll => "Poll",
			Self::List => "List",
			Self::Order => "Order",
		}
	}
}

/// One rich content block, tagged by its kind.
#[derive(Debug)]
pub enum RichContent<'a> {
	Media(ContentKind, &'a MediaContent),
	Contact(&'a ContactContent),
	Location(&'a LocationContent),
	Poll(&'a PollContent),
	List(&'a ListContent),
	Order(&'a OrderContent),
}
impl RichContent<'_> {
	pub fn kind(&self) -> ContentKind {
		match self {
			Self::Media(kind, _) => *kind,
			Self::Contact(_) => ContentKind::Contact,
			Self::Location(_) => ContentKind::Location,
			Self::Poll(_) => ContentKind::Poll,
			Self::List(_) => ContentKind::List,
			Self::Order(_) => ContentKind::Order,
		}
	}

	/// The human-readable text of this block, when the sender supplied one.
	pub fn derived_text(&self) -> Option<&str> {
		match self {
			Self::Media(_, media) => media.caption.as_deref(),
			Self::Contact(contact) => contact.display_name.as_deref(),
			Self::Location(location) => location.name.as_deref(),
			Self::Poll(poll) => poll.question.as_deref(),
			Self::List(list) => list.title.as_deref(),
			Self::Order(order) => order.message.as_deref(),
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextOrigin {
	Native,
	Attachment(ContentKind),
}

#[derive(Debug)]
pub struct ExtractedText {
	pub text: String,
	pub origin: TextOrigin,
}

impl WebhookPayload {
	/// Splits the raw address field into `(sender, chat)`. Direct chats carry
	/// a single address, so sender and chat coincide.
	pub fn split_sender_chat(&self) -> (&str, &str) {
		match self.from_raw.split_once(" in ") {
			Some((sender, chat)) => (sender, chat),
			None => (self.from_raw.as_str(), self.from_raw.as_str()),
		}
	}

	/// Rich content blocks in extraction priority order.
	pub fn rich_contents(&self) -> Vec<RichContent<'_>> {
		let mut out = Vec::new();

		for (kind, media) in [
			(ContentKind::Image, &self.image),
			(ContentKind::Video, &self.video),
			(ContentKind::Audio, &self.audio),
			(ContentKind::Document, &self.document),
			(ContentKind::Sticker, &self.sticker),
		] {
			if let Some(media) = media {
				out.push(RichContent::Media(kind, media));
			}
		}
		if let Some(contact) = &self.contact {
			out.push(RichContent::Contact(contact));
		}
		if let Some(location) = &self.location {
			out.push(RichContent::Location(location));
		}
		if let Some(poll) = &self.poll {
			out.push(RichContent::Poll(poll));
		}
		if let Some(list) = &self.list {
			out.push(RichContent::List(list));
		}
		if let Some(order) = &self.order {
			out.push(RichContent::Order(order));
		}

		out
	}

	/// Native text wins; otherwise the first rich content block with text, in
	/// priority order, labeled with its kind.
	pub fn extract_text(&self) -> Option<ExtractedText> {
		if let Some(text) = self.message.as_ref().and_then(|m| m.text.as_deref())
			&& !text.is_empty()
		{
			return Some(ExtractedText { text: text.to_string(), origin: TextOrigin::Native });
		}

		for content in self.rich_contents() {
			if let Some(derived) = content.derived_text() {
				let kind = content.kind();

				return Some(ExtractedText {
					text: format!("[[Attached {}]] {derived}", kind.label()),
					origin: TextOrigin::Attachment(kind),
				});
			}
		}

		None
	}

	/// First downloadable attachment path, if any.
	pub fn media_path(&self) -> Option<&str> {
		[&self.image, &self.video, &self.audio, &self.document, &self.sticker]
			.into_iter()
			.flatten()
			.find_map(|media| media.media_path.as_deref())
	}

	pub fn message_id(&self) -> Option<&str> {
		self.message.as_ref().and_then(|m| m.id.as_deref())
	}

	pub fn reply_to_id(&self) -> Option<&str> {
		self.message.as_ref().and_then(|m| m.replied_id.as_deref())
	}
}
