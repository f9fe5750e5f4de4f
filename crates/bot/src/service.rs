//! The orchestrator: one chat turn from user text to stored reply.

use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;

use cb_domain::error::Result;
use cb_domain::trace::TraceEvent;
use cb_domain::{ChatAnswer, Platform, User};
use cb_history::{TurnLockMap, UserStore};
use cb_providers::{BackendRegistry, ChatRequest};

pub struct ChatService {
    store: Arc<dyn UserStore>,
    backends: BackendRegistry,
    locks: TurnLockMap,
    temperature: f32,
}

impl ChatService {
    pub fn new(store: Arc<dyn UserStore>, backends: BackendRegistry, temperature: f32) -> Self {
        Self {
            store,
            backends,
            locks: TurnLockMap::new(),
            temperature,
        }
    }

    /// Run one turn and return the reply text.
    pub async fn ask(&self, key: &str, platform: Platform, text: &str) -> Result<String> {
        self.ask_with_cancel(key, platform, text, CancellationToken::new())
            .await
            .map(|answer| answer.text)
    }

    /// Run one turn for `key` on `platform`.
    ///
    /// Turns for the same user are serialized. The user message is stored
    /// before the back end is called; when the back end fails, no reply is
    /// stored and the error is returned.
    pub async fn ask_with_cancel(
        &self,
        key: &str,
        platform: Platform,
        text: &str,
        cancel: CancellationToken,
    ) -> Result<ChatAnswer> {
        let _turn = self.locks.acquire(key).await?;

        // Resolve the back end before touching the store: a platform switch
        // resets history.
        let backend = self.backends.get(platform)?;
        let user = self.store.set_platform(key, platform);
        let history = self.store.append_user(key, text);

        let req = ChatRequest {
            user_id: user.id.clone(),
            messages: history,
            temperature: Some(self.temperature),
            cancel,
        };

        let started = Instant::now();
        let result = backend.chat(req).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(answer) => {
                TraceEvent::BackendRequest {
                    backend: backend.backend_id().to_owned(),
                    platform,
                    streaming: backend.streaming(),
                    duration_ms,
                    total_tokens: answer.usage.map(|u| u.total_tokens),
                    over_token_limit: answer.over_token_limit,
                }
                .emit();
                self.store
                    .append_assistant(key, &answer.text, answer.over_token_limit);
                Ok(answer)
            }
            Err(e) => {
                tracing::warn!(
                    user_key = %key,
                    platform = %platform,
                    backend = backend.backend_id(),
                    duration_ms,
                    error = %e,
                    "chat turn failed"
                );
                Err(e)
            }
        }
    }

    /// Replace the user's system prompt.
    pub fn set_prompt(&self, key: &str, prompt: &str) {
        self.store.set_prompt(key, prompt);
    }

    /// Reset the user's history.
    pub fn clear(&self, key: &str) {
        self.store.clear(key);
    }

    pub fn user(&self, key: &str) -> User {
        self.store.get_or_create(key)
    }

    pub fn list_users(&self) -> Vec<User> {
        self.store.list_all()
    }

    pub fn platforms(&self) -> Vec<Platform> {
        self.backends.platforms()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cb_domain::{Error, Message, Role};
    use cb_history::{HistoryPolicies, InMemoryUserStore};
    use cb_providers::ChatBackend;
    use parking_lot::Mutex;

    /// Replies with a numbered echo and records every request it sees.
    #[derive(Default)]
    struct FakeBackend {
        seen: Mutex<Vec<ChatRequest>>,
        fail: bool,
        over_limit: bool,
    }

    #[async_trait::async_trait]
    impl ChatBackend for FakeBackend {
        async fn chat(&self, req: ChatRequest) -> Result<ChatAnswer> {
            let last = req.messages.last().map(|m| m.content.clone()).unwrap_or_default();
            self.seen.lock().push(req);
            if self.fail {
                return Err(Error::Stream("socket closed".into()));
            }
            Ok(ChatAnswer {
                text: format!("echo: {last}"),
                usage: None,
                over_token_limit: self.over_limit,
            })
        }
        fn backend_id(&self) -> &str {
            "fake"
        }
    }

    fn service(chatgpt: Arc<FakeBackend>, xunfei: Arc<FakeBackend>) -> ChatService {
        let store = Arc::new(InMemoryUserStore::new(HistoryPolicies::default()));
        let backends = BackendRegistry::new()
            .with_backend(Platform::ChatGpt, chatgpt)
            .with_backend(Platform::XunFei, xunfei);
        ChatService::new(store, backends, 0.6)
    }

    #[tokio::test]
    async fn dispatches_to_platform_backend_and_stores_reply() {
        let gpt = Arc::new(FakeBackend::default());
        let spark = Arc::new(FakeBackend::default());
        let svc = service(gpt.clone(), spark.clone());

        let reply = svc.ask("alice", Platform::ChatGpt, "hi").await.unwrap();
        assert_eq!(reply, "echo: hi");
        assert_eq!(gpt.seen.lock().len(), 1);
        assert!(spark.seen.lock().is_empty());

        let seen = gpt.seen.lock();
        let req = &seen[0];
        assert_eq!(req.user_id, svc.user("alice").id);
        assert_eq!(req.temperature, Some(0.6));
        assert_eq!(req.messages[0].role, Role::System);
        assert_eq!(req.messages.last(), Some(&Message::user("hi")));

        let history = svc.user("alice").history;
        assert_eq!(history.len(), 3);
        assert_eq!(history[2], Message::assistant("echo: hi"));
    }

    #[tokio::test]
    async fn history_accumulates_across_turns() {
        let gpt = Arc::new(FakeBackend::default());
        let svc = service(gpt.clone(), Arc::new(FakeBackend::default()));

        svc.ask("bob", Platform::ChatGpt, "one").await.unwrap();
        svc.ask("bob", Platform::ChatGpt, "two").await.unwrap();

        let seen = gpt.seen.lock();
        let second = &seen[1];
        let contents: Vec<&str> = second.messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents[1..], ["one", "echo: one", "two"]);
    }

    #[tokio::test]
    async fn backend_failure_keeps_user_message_only() {
        let failing = Arc::new(FakeBackend {
            fail: true,
            ..Default::default()
        });
        let svc = service(failing, Arc::new(FakeBackend::default()));

        let err = svc.ask("carol", Platform::ChatGpt, "hello?").await.unwrap_err();
        assert!(matches!(err, Error::Stream(_)));

        let history = svc.user("carol").history;
        assert_eq!(history.len(), 2);
        assert_eq!(history.last(), Some(&Message::user("hello?")));
    }

    #[tokio::test]
    async fn switching_platform_resets_history() {
        let svc = service(Arc::new(FakeBackend::default()), Arc::new(FakeBackend::default()));

        svc.ask("dave", Platform::ChatGpt, "first").await.unwrap();
        svc.ask("dave", Platform::XunFei, "second").await.unwrap();

        let user = svc.user("dave");
        assert_eq!(user.platform, Platform::XunFei);
        assert_eq!(
            user.history,
            vec![Message::user("second"), Message::assistant("echo: second")]
        );
    }

    #[tokio::test]
    async fn server_reported_overflow_drops_oldest_pair() {
        let spark = Arc::new(FakeBackend {
            over_limit: true,
            ..Default::default()
        });
        let svc = service(Arc::new(FakeBackend::default()), spark);

        svc.ask("erin", Platform::XunFei, "q1").await.unwrap();
        svc.ask("erin", Platform::XunFei, "q2").await.unwrap();

        let history = svc.user("erin").history;
        assert_eq!(
            history,
            vec![Message::user("q2"), Message::assistant("echo: q2")]
        );
    }

    #[tokio::test]
    async fn missing_backend_is_config_error() {
        let store = Arc::new(InMemoryUserStore::new(HistoryPolicies::default()));
        let backends =
            BackendRegistry::new().with_backend(Platform::ChatGpt, Arc::new(FakeBackend::default()));
        let svc = ChatService::new(store, backends, 0.6);

        let err = svc.ask("frank", Platform::XunFei, "hi").await.unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert_eq!(svc.platforms(), vec![Platform::ChatGpt]);
    }

    #[tokio::test]
    async fn unconfigured_platform_leaves_history_untouched() {
        let store = Arc::new(InMemoryUserStore::new(HistoryPolicies::default()));
        let backends =
            BackendRegistry::new().with_backend(Platform::ChatGpt, Arc::new(FakeBackend::default()));
        let svc = ChatService::new(store, backends, 0.6);

        svc.ask("ivy", Platform::ChatGpt, "remember me").await.unwrap();
        let before = svc.user("ivy");

        let err = svc.ask("ivy", Platform::XunFei, "still there?").await.unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let after = svc.user("ivy");
        assert_eq!(after.platform, Platform::ChatGpt);
        assert_eq!(after.history, before.history);
        assert_eq!(after.history.len(), 3);
    }

    #[tokio::test]
    async fn concurrent_turns_for_one_user_stay_paired() {
        let svc = Arc::new(service(
            Arc::new(FakeBackend::default()),
            Arc::new(FakeBackend::default()),
        ));

        let mut handles = Vec::new();
        for i in 0..8 {
            let svc = svc.clone();
            handles.push(tokio::spawn(async move {
                svc.ask("gina", Platform::ChatGpt, &format!("m{i}")).await.unwrap()
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        let history = svc.user("gina").history;
        for pair in history[1..].chunks(2) {
            assert_eq!(pair[0].role, Role::User);
            assert_eq!(pair[1].content, format!("echo: {}", pair[0].content));
        }
    }

    #[tokio::test]
    async fn prompt_and_clear_pass_through() {
        let svc = service(Arc::new(FakeBackend::default()), Arc::new(FakeBackend::default()));
        svc.set_prompt("hank", "Answer in French.");
        assert_eq!(svc.user("hank").history, vec![Message::system("Answer in French.")]);

        svc.ask("hank", Platform::ChatGpt, "hi").await.unwrap();
        svc.clear("hank");
        assert_eq!(
            svc.user("hank").history,
            vec![Message::system("You are a helpful assistant.")]
        );
        assert_eq!(svc.list_users().len(), 1);
    }
}
