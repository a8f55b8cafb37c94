//! Retrieval-augmented answering: rephrase the question, embed it, search the
//! knowledge base within the chat's community scope, and compose a grounded
//! reply.

use banter_domain::jid::parse_jid;
use banter_providers::retry::call_with_retry;
use banter_storage::{
	models::{Message, TopicMatch},
	queries,
};

use crate::{BanterService, Error, Result};

const REPHRASE_SYSTEM_PROMPT: &str = "\
Phrase the following sentence to retrieve information from the knowledge base. \
ONLY answer with the new phrased query, no other text.";

const COMPOSE_SYSTEM_PROMPT: &str = "\
Based on the topics attached, write a response to the query.
- Write a casual direct response to the query; do not repeat the query.
- Answer in the same language as the query.
- Only answer from the attached topics. If none of them are relevant, say you \
could not find anything on the subject.
- Give a complete answer, but keep it short; this is a chat.
- Tag users when talking about them (e.g., @972536150150).";

impl BanterService {
	/// Answers a question asked in `chat_jid`. An empty retrieval result is a
	/// normal state; the composed reply then says nothing was found, in the
	/// language of the question.
	pub async fn answer_question(&self, question: &str, chat_jid: &str) -> Result<String> {
		let rephrased = call_with_retry(&self.retry, "rephrase", || {
			self.providers.generation.generate(
				&self.cfg.providers.generation,
				REPHRASE_SYSTEM_PROMPT,
				question,
			)
		})
		.await?;
		let inputs = vec![rephrased.clone()];
		let vectors = call_with_retry(&self.retry, "embed-query", || {
			self.providers.embedding.embed(&self.cfg.providers.embedding, &inputs)
		})
		.await?;
		let Some(embedding) = vectors.into_iter().next() else {
			return Err(Error::Collaborator {
				message: "Embedding provider returned no vectors.".to_string(),
			});
		};

		if embedding.len() != self.cfg.providers.embedding.dimensions as usize {
			return Err(Error::Collaborator {
				message: "Embedding vector dimension mismatch.".to_string(),
			});
		}

		let scope = self.retrieval_scope(chat_jid).await?;
		let topics = queries::search_topics(
			&self.db,
			&embedding,
			scope.as_deref(),
			self.cfg.retrieval.top_k as i64,
		)
		.await?;
		let bot_jid = self.bot_jid()?;
		let exclude_sender =
			(!self.cfg.retrieval.include_own_messages).then_some(bot_jid.as_str());
		let history = queries::recent_chat_messages(
			&self.db,
			chat_jid,
			exclude_sender,
			self.cfg.retrieval.history_limit as i64,
		)
		.await?;
		let prompt = compose_user_prompt(&rephrased, &topics, &history);
		let answer = call_with_retry(&self.retry, "compose-answer", || {
			self.providers.generation.generate(
				&self.cfg.providers.generation,
				COMPOSE_SYSTEM_PROMPT,
				&prompt,
			)
		})
		.await?;

		tracing::info!(%chat_jid, retrieved = topics.len(), "Answered a knowledge-base question.");

		Ok(answer)
	}

	/// Group chats search their own knowledge plus every community-related
	/// group's; direct chats search unscoped.
	async fn retrieval_scope(&self, chat_jid: &str) -> Result<Option<Vec<String>>> {
		if !parse_jid(chat_jid)?.is_group() {
			return Ok(None);
		}

		let mut scope = vec![chat_jid.to_string()];

		if let Some(group) = queries::fetch_group(&self.db, chat_jid).await?
			&& let Some(keys) = &group.community_keys
		{
			for related in queries::related_groups(&self.db, chat_jid, keys).await? {
				scope.push(related.group_jid);
			}
		}

		Ok(Some(scope))
	}
}

/// Topics go in most-similar-first; history goes in newest-first, the order
/// the store returns it.
fn compose_user_prompt(question: &str, topics: &[TopicMatch], history: &[Message]) -> String {
	let joined = topics
		.iter()
		.map(|topic| format!("{}\n{}", topic.subject, topic.summary))
		.collect::<Vec<_>>()
		.join("\n---\n");
	let mut prompt = format!("question: {question}\n\ntopics related to the query:\n{joined}");

	if !history.is_empty() {
		prompt.push_str("\n\nrecent conversation, newest first:\n");
		prompt.push_str(&crate::summary::format_transcript(history));
	}

	prompt
}
