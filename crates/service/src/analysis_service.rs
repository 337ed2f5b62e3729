use std::sync::Arc;

use analysis_console_core::{
    AnalysisRequest, AnalysisResult, FollowUpMessage, MAX_QUERY_LIMIT, MessageRole,
};
use analysis_console_llm::{FollowUpPrompt, LlmClient, PriorTurn};
use analysis_console_storage::{AnalysisStore, StorageBackend, ThreadStore};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::ServiceError;
use crate::events::{ConsoleEvent, publish};
use crate::thread_sync::{ThreadSynchronizer, ThreadView};

/// An analysis as the end customer sees it.
#[derive(Debug, Clone, Serialize)]
pub struct SharedAnalysis {
    pub analysis: AnalysisResult,
    /// Assistant replies flagged shared, in thread order.
    pub shared_replies: Vec<FollowUpMessage>,
}

/// Result of one follow-up question.
#[derive(Debug, Clone, Serialize)]
pub struct FollowUpOutcome {
    pub reply: String,
    pub thread: ThreadView,
    /// Set when the reply was generated but could not be persisted yet. The
    /// reply stays in the thread and is persisted by the next reconcile.
    pub sync_error: Option<String>,
}

pub struct AnalysisService {
    storage: Arc<StorageBackend>,
    llm: Option<Arc<LlmClient>>,
    threads: Arc<ThreadSynchronizer>,
    event_tx: Option<broadcast::Sender<String>>,
}

impl AnalysisService {
    #[must_use]
    pub fn new(
        storage: Arc<StorageBackend>,
        llm: Option<Arc<LlmClient>>,
        threads: Arc<ThreadSynchronizer>,
    ) -> Self {
        Self { storage, llm, threads, event_tx: None }
    }

    #[must_use]
    pub fn with_events(mut self, event_tx: broadcast::Sender<String>) -> Self {
        self.event_tx = Some(event_tx);
        self
    }

    #[must_use]
    pub fn threads(&self) -> &Arc<ThreadSynchronizer> {
        &self.threads
    }

    #[must_use]
    pub fn generation_configured(&self) -> bool {
        self.llm.is_some()
    }

    fn llm(&self) -> Result<&LlmClient, ServiceError> {
        self.llm.as_deref().ok_or_else(|| {
            ServiceError::NotConfigured("generation endpoint (ANALYSIS_CONSOLE_API_KEY)".to_owned())
        })
    }

    /// Generate and store a new analysis for a client.
    pub async fn generate_analysis(
        &self,
        client_id: &str,
        request: AnalysisRequest,
    ) -> Result<AnalysisResult, ServiceError> {
        if client_id.trim().is_empty() {
            return Err(ServiceError::InvalidInput("client_id is empty".to_owned()));
        }
        if request.instruction.trim().is_empty() {
            return Err(ServiceError::InvalidInput("instruction is empty".to_owned()));
        }
        let body = self.llm()?.generate_analysis(&request).await?;

        let analysis = AnalysisResult::new(
            uuid::Uuid::new_v4().to_string(),
            request.agency_id,
            client_id.to_owned(),
            request.period_id,
            body,
            request.category,
        );
        self.storage.save_analysis(&analysis).await?;
        tracing::info!(analysis_id = %analysis.id, client_id, "analysis generated");
        publish(
            self.event_tx.as_ref(),
            &ConsoleEvent::AnalysisCreated {
                analysis_id: analysis.id.clone(),
                client_id: client_id.to_owned(),
            },
        );
        Ok(analysis)
    }

    pub async fn get_analysis(&self, id: &str) -> Result<AnalysisResult, ServiceError> {
        self.storage
            .get_analysis(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("analysis {id}")))
    }

    pub async fn list_analyses(
        &self,
        client_id: &str,
        limit: usize,
    ) -> Result<Vec<AnalysisResult>, ServiceError> {
        Ok(self.storage.list_analyses(client_id, false, limit.min(MAX_QUERY_LIMIT)).await?)
    }

    /// Show or hide a whole analysis in the client view.
    pub async fn set_visibility(
        &self,
        id: &str,
        shared: bool,
    ) -> Result<AnalysisResult, ServiceError> {
        if !self.storage.set_analysis_shared(id, shared).await? {
            return Err(ServiceError::NotFound(format!("analysis {id}")));
        }
        publish(
            self.event_tx.as_ref(),
            &ConsoleEvent::AnalysisVisibility { analysis_id: id.to_owned(), shared },
        );
        self.get_analysis(id).await
    }

    /// Analyses shared with a client, each with only its shared replies.
    ///
    /// Reads persisted rows, so flags that are still pending locally are not
    /// visible here until reconciled.
    pub async fn client_view(
        &self,
        client_id: &str,
        limit: usize,
    ) -> Result<Vec<SharedAnalysis>, ServiceError> {
        let analyses =
            self.storage.list_analyses(client_id, true, limit.min(MAX_QUERY_LIMIT)).await?;
        let mut view = Vec::with_capacity(analyses.len());
        for analysis in analyses {
            let shared_replies = self
                .storage
                .list_messages(&analysis.id)
                .await?
                .into_iter()
                .filter(|m| m.role == MessageRole::Assistant && m.shared)
                .collect();
            view.push(SharedAnalysis { analysis, shared_replies });
        }
        Ok(view)
    }

    /// Ask a follow-up question on an analysis.
    ///
    /// The question is persisted before the generation call so that a failed
    /// call never leaves an unrecorded question behind. If persisting it fails
    /// the question stays pending, and asking the same question again picks it
    /// up instead of appending a second copy. The reply is appended
    /// verbatim; failure to persist it is reported in
    /// [`FollowUpOutcome::sync_error`] rather than discarding the reply.
    pub async fn ask_follow_up(
        &self,
        analysis_id: &str,
        instruction: &str,
        source_data: Option<serde_json::Value>,
    ) -> Result<FollowUpOutcome, ServiceError> {
        if instruction.trim().is_empty() {
            return Err(ServiceError::InvalidInput("instruction is empty".to_owned()));
        }
        let analysis = self.get_analysis(analysis_id).await?;
        let llm = self.llm()?;

        let loaded = self.threads.ensure_loaded(analysis_id).await;
        // A retried ask reuses its still-pending question.
        let question =
            self.threads.append_local_once(analysis_id, MessageRole::User, instruction)?;
        let history: Vec<PriorTurn> = loaded
            .messages
            .into_iter()
            .take(question)
            .map(|m| PriorTurn { role: m.role, content: m.content })
            .collect();
        self.threads.reconcile(analysis_id).await?;

        let prompt = FollowUpPrompt {
            analysis_body: analysis.body,
            history,
            instruction: instruction.to_owned(),
            source_data,
        };
        let reply = llm.generate_follow_up(&prompt).await?;

        self.threads.append_local(analysis_id, MessageRole::Assistant, &reply)?;
        let sync_error = match self.threads.reconcile(analysis_id).await {
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(analysis_id, error = %e, "follow-up reply not persisted yet");
                Some(e.to_string())
            },
        };
        Ok(FollowUpOutcome { reply, thread: self.threads.view(analysis_id), sync_error })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    use analysis_console_core::NewFollowUpMessage;
    use analysis_console_storage::StorageError;
    use async_trait::async_trait;

    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn completion(text: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "role": "assistant", "content": text } }]
        }))
    }

    fn service(storage: Arc<StorageBackend>, llm: Option<Arc<LlmClient>>) -> AnalysisService {
        let threads = Arc::new(ThreadSynchronizer::new(
            Arc::clone(&storage) as Arc<dyn ThreadStore>,
            Duration::from_secs(5),
        ));
        AnalysisService::new(storage, llm, threads)
    }

    fn llm_for(server: &MockServer) -> Arc<LlmClient> {
        Arc::new(
            LlmClient::new("test-key".to_owned(), server.uri())
                .unwrap()
                .with_retry_unit(Duration::from_millis(1)),
        )
    }

    fn request(instruction: &str) -> AnalysisRequest {
        AnalysisRequest {
            agency_id: "agency-1".to_owned(),
            period_id: Some("2026-08".to_owned()),
            category: "sales".to_owned(),
            instruction: instruction.to_owned(),
            source_data: json!({ "revenue": [100, 92] }),
        }
    }

    async fn seeded(storage: &StorageBackend, id: &str, client_id: &str) {
        let analysis = AnalysisResult::new(
            id.to_owned(),
            "agency-1".to_owned(),
            client_id.to_owned(),
            None,
            "Revenue fell 8% in August.".to_owned(),
            "sales".to_owned(),
        );
        storage.save_analysis(&analysis).await.unwrap();
    }

    #[tokio::test]
    async fn generate_analysis_stores_llm_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(completion("Revenue fell on lower volume."))
            .expect(1)
            .mount(&server)
            .await;
        let storage = Arc::new(StorageBackend::new_memory());
        let svc = service(Arc::clone(&storage), Some(llm_for(&server)));

        let analysis = svc.generate_analysis("client-1", request("Explain")).await.unwrap();

        assert_eq!(analysis.body, "Revenue fell on lower volume.");
        assert!(!analysis.shared_with_client);
        let stored = svc.get_analysis(&analysis.id).await.unwrap();
        assert_eq!(stored, analysis);
    }

    #[tokio::test]
    async fn generation_requires_configured_llm() {
        let svc = service(Arc::new(StorageBackend::new_memory()), None);
        let err = svc.generate_analysis("client-1", request("Explain")).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotConfigured(_)));

        let err = svc.generate_analysis("client-1", request("  ")).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn ask_follow_up_persists_question_and_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(completion("Seasonal mix shift."))
            .mount(&server)
            .await;
        let storage = Arc::new(StorageBackend::new_memory());
        seeded(&storage, "a-1", "client-1").await;
        let svc = service(Arc::clone(&storage), Some(llm_for(&server)));

        let outcome = svc.ask_follow_up("a-1", "What drove the dip?", None).await.unwrap();

        assert_eq!(outcome.reply, "Seasonal mix shift.");
        assert_eq!(outcome.sync_error, None);
        assert_eq!(outcome.thread.synced, 2);
        let rows = storage.list_messages("a-1").await.unwrap();
        let roles: Vec<MessageRole> = rows.iter().map(|r| r.role).collect();
        assert_eq!(roles, [MessageRole::User, MessageRole::Assistant]);
        assert_eq!(rows[1].content, "Seasonal mix shift.");
    }

    #[tokio::test]
    async fn failed_generation_keeps_persisted_question() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad request"))
            .mount(&server)
            .await;
        let storage = Arc::new(StorageBackend::new_memory());
        seeded(&storage, "a-1", "client-1").await;
        let svc = service(Arc::clone(&storage), Some(llm_for(&server)));

        let err = svc.ask_follow_up("a-1", "Will it recover?", None).await.unwrap_err();

        assert!(matches!(err, ServiceError::Llm(_)));
        let rows = storage.list_messages("a-1").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].content, "Will it recover?");
    }

    /// Thread store whose first insert fails.
    struct FirstInsertFails {
        inner: Arc<StorageBackend>,
        failed: AtomicBool,
    }

    #[async_trait]
    impl ThreadStore for FirstInsertFails {
        async fn list_messages(
            &self,
            analysis_id: &str,
        ) -> Result<Vec<FollowUpMessage>, StorageError> {
            self.inner.list_messages(analysis_id).await
        }

        async fn insert_message(
            &self,
            message: &NewFollowUpMessage,
        ) -> Result<FollowUpMessage, StorageError> {
            if !self.failed.swap(true, Ordering::SeqCst) {
                return Err(StorageError::Database(sqlx::Error::PoolTimedOut));
            }
            self.inner.insert_message(message).await
        }

        async fn set_message_shared(&self, id: i64, shared: bool) -> Result<bool, StorageError> {
            self.inner.set_message_shared(id, shared).await
        }

        async fn delete_thread(&self, analysis_id: &str) -> Result<usize, StorageError> {
            self.inner.delete_thread(analysis_id).await
        }
    }

    #[tokio::test]
    async fn retried_ask_reuses_unpersisted_question() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(completion("Fewer repeat orders."))
            .expect(1)
            .mount(&server)
            .await;
        let storage = Arc::new(StorageBackend::new_memory());
        seeded(&storage, "a-1", "client-1").await;
        let store = FirstInsertFails { inner: Arc::clone(&storage), failed: AtomicBool::new(false) };
        let threads = Arc::new(ThreadSynchronizer::new(Arc::new(store), Duration::from_secs(5)));
        let svc = AnalysisService::new(Arc::clone(&storage), Some(llm_for(&server)), threads);

        let err = svc.ask_follow_up("a-1", "Why did orders drop?", None).await.unwrap_err();
        assert!(err.is_transient());
        assert_eq!(svc.threads().view("a-1").pending_messages, 1);

        let outcome = svc.ask_follow_up("a-1", "Why did orders drop?", None).await.unwrap();

        assert_eq!(outcome.sync_error, None);
        assert_eq!(outcome.thread.messages.len(), 2);
        let rows = storage.list_messages("a-1").await.unwrap();
        let contents: Vec<&str> = rows.iter().map(|r| r.content.as_str()).collect();
        assert_eq!(contents, ["Why did orders drop?", "Fewer repeat orders."]);
    }

    #[tokio::test]
    async fn ask_follow_up_on_unknown_analysis_is_not_found() {
        let server = MockServer::start().await;
        let svc = service(Arc::new(StorageBackend::new_memory()), Some(llm_for(&server)));
        let err = svc.ask_follow_up("missing", "Why?", None).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn client_view_shows_only_shared_content() {
        let storage = Arc::new(StorageBackend::new_memory());
        seeded(&storage, "a-shared", "client-1").await;
        seeded(&storage, "a-private", "client-1").await;
        let svc = service(Arc::clone(&storage), None);

        let threads = svc.threads();
        threads.append_local("a-shared", MessageRole::User, "What drove the dip?").unwrap();
        threads.append_local("a-shared", MessageRole::Assistant, "Seasonal mix shift.").unwrap();
        threads.append_local("a-shared", MessageRole::Assistant, "Internal note.").unwrap();
        threads.set_shared("a-shared", 0, true).await.unwrap();
        svc.set_visibility("a-shared", true).await.unwrap();

        let view = svc.client_view("client-1", 10).await.unwrap();

        assert_eq!(view.len(), 1);
        assert_eq!(view[0].analysis.id, "a-shared");
        let replies: Vec<&str> = view[0].shared_replies.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(replies, ["Seasonal mix shift."]);
    }

    #[tokio::test]
    async fn set_visibility_on_unknown_analysis_is_not_found() {
        let svc = service(Arc::new(StorageBackend::new_memory()), None);
        let err = svc.set_visibility("missing", true).await.unwrap_err();
        assert!(err.is_not_found());
    }
}
