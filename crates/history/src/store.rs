//! The user store.
//!
//! [`UserStore`] is the capability the orchestrator depends on; the
//! in-memory map below is the only implementation and lives for the
//! process lifetime. Each user sits behind its own mutex so mutations for
//! different users never contend.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::{Mutex, RwLock};

use cb_domain::trace::TraceEvent;
use cb_domain::{Message, Platform, User};

use crate::budget::{drop_oldest_turn, enforce_estimate, Budget, TrimOutcome};
use crate::policy::HistoryPolicies;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Capability
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Get-or-create user records and mutate their histories under the
/// platform's budget. Every operation on an unknown key creates the user
/// first; there is no not-found case.
pub trait UserStore: Send + Sync {
    /// Look up a user by external key, creating it with the default
    /// platform's initial history if absent.
    fn get_or_create(&self, key: &str) -> User;

    /// Move a user to `platform`. A change resets the history to the new
    /// platform's initial state.
    fn set_platform(&self, key: &str, platform: Platform) -> User;

    /// Replace the System message content. No-op on platforms without a
    /// system prompt.
    fn set_prompt(&self, key: &str, prompt: &str);

    /// Append a User message and enforce the budget. Returns the resulting
    /// history.
    fn append_user(&self, key: &str, text: &str) -> Vec<Message>;

    /// Append an Assistant message. `over_limit` is the back end's overflow
    /// signal, honoured by platforms with a server-reported budget.
    fn append_assistant(&self, key: &str, text: &str, over_limit: bool) -> Vec<Message>;

    /// Run the platform's client-side budget pass without appending.
    fn trim(&self, key: &str) -> usize;

    /// Reset the history to the platform's initial state.
    fn clear(&self, key: &str);

    /// Snapshot of every user, sorted by key.
    fn list_all(&self) -> Vec<User>;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// In-memory implementation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct InMemoryUserStore {
    policies: HistoryPolicies,
    users: RwLock<HashMap<String, Arc<Mutex<User>>>>,
}

impl InMemoryUserStore {
    pub fn new(policies: HistoryPolicies) -> Self {
        Self {
            policies,
            users: RwLock::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.users.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.read().is_empty()
    }

    /// Resolve the per-user cell, creating the user if needed.
    fn entry(&self, key: &str) -> Arc<Mutex<User>> {
        // Fast path: user already exists.
        if let Some(cell) = self.users.read().get(key) {
            return cell.clone();
        }

        // Slow path: re-check under the write lock.
        let mut users = self.users.write();
        if let Some(cell) = users.get(key) {
            return cell.clone();
        }

        let platform = self.policies.default_platform();
        let user = User::new(key, platform, self.policies.policy(platform).initial_history());

        TraceEvent::UserCreated {
            user_key: key.to_owned(),
            user_id: user.id.clone(),
            platform,
        }
        .emit();

        let cell = Arc::new(Mutex::new(user));
        users.insert(key.to_owned(), cell.clone());
        cell
    }

    fn reset(&self, user: &mut User, reason: &str) {
        user.history = self.policies.policy(user.platform).initial_history();
        user.updated_at = Utc::now();

        TraceEvent::HistoryReset {
            user_key: user.key.clone(),
            platform: user.platform,
            reason: reason.to_owned(),
        }
        .emit();
    }

    fn enforce_budget(&self, user: &mut User) -> TrimOutcome {
        let outcome = match self.policies.policy(user.platform).budget {
            Budget::Estimated { max_tokens } => enforce_estimate(&mut user.history, max_tokens),
            Budget::ServerReported => TrimOutcome::default(),
        };
        report_trim(user, &outcome);
        outcome
    }
}

fn report_trim(user: &User, outcome: &TrimOutcome) {
    if !outcome.changed() {
        return;
    }
    tracing::debug!(
        user_key = %user.key,
        removed = outcome.removed,
        truncated = outcome.truncated,
        "history trimmed"
    );
    TraceEvent::HistoryTrimmed {
        user_key: user.key.clone(),
        removed: outcome.removed,
        remaining: user.history.len(),
        estimated_tokens: outcome.estimated_tokens,
    }
    .emit();
}

impl UserStore for InMemoryUserStore {
    fn get_or_create(&self, key: &str) -> User {
        self.entry(key).lock().clone()
    }

    fn set_platform(&self, key: &str, platform: Platform) -> User {
        let cell = self.entry(key);
        let mut user = cell.lock();
        if user.platform != platform {
            tracing::info!(
                user_key = %key,
                from = %user.platform,
                to = %platform,
                "switching platform"
            );
            user.platform = platform;
            self.reset(&mut user, "platform changed");
        }
        user.clone()
    }

    fn set_prompt(&self, key: &str, prompt: &str) {
        let cell = self.entry(key);
        let mut user = cell.lock();
        let policy = self.policies.policy(user.platform);
        if !policy.uses_system_prompt() {
            tracing::debug!(user_key = %key, platform = %user.platform, "platform has no system prompt");
            return;
        }

        let prompt = policy.fit_prompt(prompt);
        if user.history.first().is_some_and(Message::is_system) {
            user.history[0].content = prompt;
        } else {
            user.history.insert(0, Message::system(prompt));
        }
        user.updated_at = Utc::now();
        self.enforce_budget(&mut user);
    }

    fn append_user(&self, key: &str, text: &str) -> Vec<Message> {
        let cell = self.entry(key);
        let mut user = cell.lock();
        user.history.push(Message::user(text));
        user.updated_at = Utc::now();
        self.enforce_budget(&mut user);
        user.history.clone()
    }

    fn append_assistant(&self, key: &str, text: &str, over_limit: bool) -> Vec<Message> {
        let cell = self.entry(key);
        let mut user = cell.lock();

        if over_limit && self.policies.policy(user.platform).budget == Budget::ServerReported {
            let outcome = drop_oldest_turn(&mut user.history);
            report_trim(&user, &outcome);
        }

        user.history.push(Message::assistant(text));
        user.updated_at = Utc::now();
        self.enforce_budget(&mut user);
        user.history.clone()
    }

    fn trim(&self, key: &str) -> usize {
        let cell = self.entry(key);
        let mut user = cell.lock();
        self.enforce_budget(&mut user).removed
    }

    fn clear(&self, key: &str) {
        let cell = self.entry(key);
        let mut user = cell.lock();
        self.reset(&mut user, "cleared");
    }

    fn list_all(&self) -> Vec<User> {
        let cells: Vec<Arc<Mutex<User>>> = self.users.read().values().cloned().collect();
        let mut users: Vec<User> = cells.iter().map(|c| c.lock().clone()).collect();
        users.sort_by(|a, b| a.key.cmp(&b.key));
        users
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::budget::estimate_history;
    use cb_domain::config::HistoryConfig;
    use cb_domain::Role;

    fn store_with_budget(max_tokens: usize) -> InMemoryUserStore {
        InMemoryUserStore::new(HistoryPolicies::from_config(&HistoryConfig {
            max_context_tokens: max_tokens,
            ..Default::default()
        }))
    }

    #[test]
    fn get_or_create_is_idempotent() {
        let store = store_with_budget(3000);
        let a = store.get_or_create("alice");
        let b = store.get_or_create("alice");
        assert_eq!(a.id, b.id);
        assert_eq!(a.platform, Platform::ChatGpt);
        assert_eq!(a.history, vec![Message::system("You are a helpful assistant.")]);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn empty_key_still_creates_a_user() {
        let store = store_with_budget(3000);
        let user = store.get_or_create("");
        assert_eq!(user.key, "");
        assert!(!store.is_empty());
    }

    #[test]
    fn user_precedes_assistant() {
        let store = store_with_budget(3000);
        store.append_user("alice", "hi");
        let history = store.append_assistant("alice", "hello!", false);
        let roles: Vec<Role> = history.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::System, Role::User, Role::Assistant]);
        assert_eq!(history[1].content, "hi");
        assert_eq!(history[2].content, "hello!");
    }

    #[test]
    fn budget_holds_after_every_append() {
        let store = store_with_budget(150);
        for i in 0..30 {
            let h = store.append_user("bob", &format!("message {i} {}", "q".repeat(50)));
            assert!(estimate_history(&h) <= 150);
            assert!(h[0].is_system());
            let h = store.append_assistant("bob", &format!("reply {i} {}", "a".repeat(50)), false);
            assert!(estimate_history(&h) <= 150);
            assert!(h[0].is_system());
            assert_eq!(h.last().map(|m| m.role), Some(Role::Assistant));
        }
    }

    #[test]
    fn set_prompt_replaces_system_message() {
        let store = store_with_budget(3000);
        store.append_user("alice", "hi");
        store.set_prompt("alice", "Answer in French.");
        let user = store.get_or_create("alice");
        assert_eq!(user.history[0], Message::system("Answer in French."));
        assert_eq!(user.history.len(), 2);
    }

    #[test]
    fn set_prompt_is_noop_without_system_prompt() {
        let store = store_with_budget(3000);
        store.set_platform("carol", Platform::XunFei);
        store.append_user("carol", "hi");
        store.set_prompt("carol", "ignored");
        let user = store.get_or_create("carol");
        assert_eq!(user.history, vec![Message::user("hi")]);
    }

    #[test]
    fn clear_resets_to_platform_initial_state() {
        let store = store_with_budget(3000);
        store.append_user("alice", "hi");
        store.append_assistant("alice", "hello", false);
        store.set_prompt("alice", "custom");
        store.clear("alice");
        assert_eq!(
            store.get_or_create("alice").history,
            vec![Message::system("You are a helpful assistant.")]
        );

        store.set_platform("carol", Platform::XunFei);
        store.append_user("carol", "hi");
        store.clear("carol");
        assert!(store.get_or_create("carol").history.is_empty());
    }

    #[test]
    fn switching_platform_resets_history() {
        let store = store_with_budget(3000);
        let before = store.append_user("dave", "hi");
        assert_eq!(before.len(), 2);
        let user = store.set_platform("dave", Platform::XunFei);
        assert!(user.history.is_empty());
        // Same platform again keeps history.
        store.append_user("dave", "again");
        let user = store.set_platform("dave", Platform::XunFei);
        assert_eq!(user.history.len(), 1);
    }

    #[test]
    fn server_overflow_drops_oldest_turn_before_append() {
        let store = store_with_budget(3000);
        store.set_platform("erin", Platform::XunFei);
        store.append_user("erin", "q1");
        store.append_assistant("erin", "a1", false);
        store.append_user("erin", "q2");
        let history = store.append_assistant("erin", "a2", true);
        assert_eq!(history, vec![Message::user("q2"), Message::assistant("a2")]);
    }

    #[test]
    fn server_overflow_on_first_turn_keeps_the_question() {
        let store = store_with_budget(3000);
        store.set_platform("fay", Platform::XunFei);
        store.append_user("fay", "q1");
        let history = store.append_assistant("fay", "a1", true);
        assert_eq!(history, vec![Message::user("q1"), Message::assistant("a1")]);
    }

    #[test]
    fn server_overflow_after_failed_turn_drops_the_orphan() {
        let store = store_with_budget(3000);
        store.set_platform("gus", Platform::XunFei);
        // q1 never got a reply.
        store.append_user("gus", "q1");
        store.append_user("gus", "q2");
        let history = store.append_assistant("gus", "a2", true);
        assert_eq!(history, vec![Message::user("q2"), Message::assistant("a2")]);
    }

    #[test]
    fn trim_brings_stored_history_back_under_budget() {
        let store = store_with_budget(60);
        let mut history = vec![Message::system("sys")];
        for i in 0..4 {
            history.push(Message::user(format!("q{i} {}", "x".repeat(40))));
            history.push(Message::assistant(format!("a{i} {}", "y".repeat(40))));
        }
        let len = history.len();
        assert!(estimate_history(&history) > 60);
        store.users.write().insert(
            "hank".to_owned(),
            Arc::new(Mutex::new(User::new("hank", Platform::ChatGpt, history))),
        );

        let removed = store.trim("hank");
        let user = store.get_or_create("hank");
        assert!(removed > 0);
        assert_eq!(user.history.len(), len - removed);
        assert!(estimate_history(&user.history) <= 60);
        assert_eq!(user.history[0], Message::system("sys"));
        assert_eq!(user.history[1].role, Role::User);

        // Already within budget: nothing more to do.
        assert_eq!(store.trim("hank"), 0);
    }

    #[test]
    fn server_overflow_signal_ignored_on_estimated_platform() {
        let store = store_with_budget(3000);
        store.append_user("alice", "q1");
        store.append_assistant("alice", "a1", false);
        store.append_user("alice", "q2");
        let history = store.append_assistant("alice", "a2", true);
        assert_eq!(history.len(), 5);
    }

    #[test]
    fn list_all_is_sorted_snapshot() {
        let store = store_with_budget(3000);
        store.get_or_create("zed");
        store.get_or_create("amy");
        let keys: Vec<String> = store.list_all().into_iter().map(|u| u.key).collect();
        assert_eq!(keys, vec!["amy", "zed"]);
    }

    #[test]
    fn concurrent_appends_for_distinct_users() {
        let store = Arc::new(store_with_budget(3000));
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                std::thread::spawn(move || {
                    let key = format!("user-{i}");
                    for n in 0..10 {
                        store.append_user(&key, &format!("q{n}"));
                        store.append_assistant(&key, &format!("a{n}"), false);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        let users = store.list_all();
        assert_eq!(users.len(), 8);
        assert!(users.iter().all(|u| u.history.len() == 21));
    }
}
