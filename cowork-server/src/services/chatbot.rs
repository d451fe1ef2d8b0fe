//! LINE webhook handling against the cached knowledge base

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use shared::chatbot::{FALLBACK_REPLY, KnowledgeBase, KnowledgeEntry, WebhookBody};

use crate::cache::TtlCache;
use crate::error::{BoxError, ServiceResult};
use crate::line::LineMessenger;

#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    async fn active_entries(&self) -> Result<Vec<KnowledgeEntry>, BoxError>;
}

/// The knowledge base is cached as a whole under the unit key
pub type KnowledgeCache = TtlCache<(), Arc<KnowledgeBase>>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReplySummary {
    pub replied: usize,
    pub ignored: usize,
    pub failed: usize,
}

pub async fn load_knowledge_base(
    cache: &KnowledgeCache,
    store: &dyn KnowledgeStore,
) -> ServiceResult<Arc<KnowledgeBase>> {
    let kb = cache
        .get_or_load((), || async {
            let entries = store.active_entries().await?;
            let kb = KnowledgeBase::new(entries);
            tracing::debug!(entries = kb.len(), "Knowledge base loaded");
            Ok::<_, BoxError>(Arc::new(kb))
        })
        .await?;
    Ok(kb)
}

/// Answer every text message in the webhook body. Other events are skipped.
/// A failed reply is logged and does not affect the other events.
pub async fn reply_to_events(
    kb: &KnowledgeBase,
    messenger: &dyn LineMessenger,
    body: &WebhookBody,
) -> ReplySummary {
    let mut summary = ReplySummary::default();
    for event in &body.events {
        let Some((reply_token, text)) = event.text_message() else {
            summary.ignored += 1;
            continue;
        };
        let answer = kb.reply_for(text, FALLBACK_REPLY);
        match messenger.reply_text(reply_token, answer).await {
            Ok(()) => summary.replied += 1,
            Err(e) => {
                summary.failed += 1;
                tracing::warn!(error = %e, "LINE reply failed");
            }
        }
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeLine, MemoryStore};
    use std::time::Duration;

    fn entry(id: i64, question: &str, answer: &str, keywords: &[&str]) -> KnowledgeEntry {
        KnowledgeEntry {
            id,
            question: question.into(),
            answer: answer.into(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            priority: 0,
            is_active: true,
        }
    }

    fn body(json: &str) -> WebhookBody {
        serde_json::from_str(json).unwrap()
    }

    #[tokio::test]
    async fn test_replies_with_best_match_or_fallback() {
        let kb = KnowledgeBase::new(vec![
            entry(1, "What is the Wi-Fi password?", "It is on the card at the desk.", &["wifi", "password"]),
            entry(2, "When are you open?", "Every day from 8:00 to 22:00.", &["open", "hours"]),
        ]);
        let line = FakeLine::default();
        let body = body(
            r#"{"events": [
                {"type": "message", "replyToken": "rt-1", "message": {"type": "text", "text": "ＷＩＦＩ password please"}},
                {"type": "message", "replyToken": "rt-2", "message": {"type": "text", "text": "parking?"}},
                {"type": "message", "replyToken": "rt-3", "message": {"type": "sticker"}},
                {"type": "follow", "replyToken": "rt-4"}
            ]}"#,
        );

        let summary = reply_to_events(&kb, &line, &body).await;
        assert_eq!(summary, ReplySummary { replied: 2, ignored: 2, failed: 0 });

        let sent = line.sent();
        assert_eq!(sent[0], ("rt-1".to_string(), "It is on the card at the desk.".to_string()));
        assert_eq!(sent[1], ("rt-2".to_string(), FALLBACK_REPLY.to_string()));
    }

    #[tokio::test]
    async fn test_failed_reply_is_counted() {
        let kb = KnowledgeBase::new(Vec::new());
        let line = FakeLine::default();
        line.fail_replies();
        let body = body(
            r#"{"events": [{"type": "message", "replyToken": "rt-1", "message": {"type": "text", "text": "hi"}}]}"#,
        );
        let summary = reply_to_events(&kb, &line, &body).await;
        assert_eq!(summary.failed, 1);
    }

    #[tokio::test]
    async fn test_knowledge_base_is_cached() {
        let store = MemoryStore::default();
        store.add_knowledge(entry(1, "Where is the printer?", "Next to the kitchen.", &["printer"]));
        let cache = KnowledgeCache::new(Duration::from_secs(60));

        let kb = load_knowledge_base(&cache, &store).await.unwrap();
        assert_eq!(kb.len(), 1);

        store.add_knowledge(entry(2, "Is there coffee?", "Free for members.", &["coffee"]));
        assert_eq!(load_knowledge_base(&cache, &store).await.unwrap().len(), 1);

        cache.invalidate(&()).await;
        assert_eq!(load_knowledge_base(&cache, &store).await.unwrap().len(), 2);
    }
}
