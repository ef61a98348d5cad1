//! In-memory implementations of the external collaborators.
//!
//! The real learning platform provides group membership and durable message
//! storage; these stand-ins carry the same contracts for a single-process
//! deployment and for tests. Swapping them for service-backed versions does
//! not touch the broker logic.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{
    AuthError, ChatError, ChatMessage, GroupActivity, GroupDirectory, GroupId, MessageId,
    MessageStore, Role, Timestamp, TokenVerifier, UserId,
};
use crate::domain::collaborators::Identity;

/// Append-only per-group message history.
#[derive(Default)]
pub struct InMemoryMessageStore {
    messages: Mutex<HashMap<GroupId, Vec<ChatMessage>>>,
}

impl InMemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Full history of a group, oldest first. Used by tests.
    pub async fn history(&self, group_id: &GroupId) -> Vec<ChatMessage> {
        let messages = self.messages.lock().await;
        messages.get(group_id).cloned().unwrap_or_default()
    }
}

#[async_trait]
impl MessageStore for InMemoryMessageStore {
    async fn append(&self, message: ChatMessage) -> Result<(), ChatError> {
        let mut messages = self.messages.lock().await;
        messages
            .entry(message.group_id.clone())
            .or_default()
            .push(message);
        Ok(())
    }

    async fn find(
        &self,
        group_id: &GroupId,
        message_id: &MessageId,
    ) -> Result<Option<ChatMessage>, ChatError> {
        let messages = self.messages.lock().await;
        Ok(messages
            .get(group_id)
            .and_then(|history| history.iter().find(|m| &m.id == message_id))
            .cloned())
    }

    async fn update(&self, message: ChatMessage) -> Result<(), ChatError> {
        let mut messages = self.messages.lock().await;
        let history = messages
            .get_mut(&message.group_id)
            .ok_or_else(|| ChatError::NotFound(format!("group '{}'", message.group_id.as_str())))?;
        let slot = history
            .iter_mut()
            .find(|m| m.id == message.id)
            .ok_or_else(|| ChatError::NotFound(format!("message '{}'", message.id.as_str())))?;
        *slot = message;
        Ok(())
    }
}

/// Static `(group, user) -> Role` table.
pub struct InMemoryGroupDirectory {
    roles: Mutex<HashMap<(GroupId, UserId), Role>>,
}

impl InMemoryGroupDirectory {
    pub fn new() -> Self {
        Self {
            roles: Mutex::new(HashMap::new()),
        }
    }

    pub async fn grant(&self, group_id: GroupId, user_id: UserId, role: Role) {
        let mut roles = self.roles.lock().await;
        roles.insert((group_id, user_id), role);
    }

    pub async fn revoke(&self, group_id: &GroupId, user_id: &UserId) {
        let mut roles = self.roles.lock().await;
        roles.remove(&(group_id.clone(), user_id.clone()));
    }
}

impl Default for InMemoryGroupDirectory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GroupDirectory for InMemoryGroupDirectory {
    async fn member_role(
        &self,
        group_id: &GroupId,
        user_id: &UserId,
    ) -> Result<Option<Role>, ChatError> {
        let roles = self.roles.lock().await;
        Ok(roles.get(&(group_id.clone(), user_id.clone())).copied())
    }
}

/// Last-activity map, best effort.
pub struct InMemoryGroupActivity {
    last_activity: Mutex<HashMap<GroupId, Timestamp>>,
    clock: std::sync::Arc<dyn tsudoi_shared::time::Clock>,
}

impl InMemoryGroupActivity {
    pub fn new(clock: std::sync::Arc<dyn tsudoi_shared::time::Clock>) -> Self {
        Self {
            last_activity: Mutex::new(HashMap::new()),
            clock,
        }
    }

    pub async fn last_activity(&self, group_id: &GroupId) -> Option<Timestamp> {
        let last_activity = self.last_activity.lock().await;
        last_activity.get(group_id).copied()
    }
}

#[async_trait]
impl GroupActivity for InMemoryGroupActivity {
    async fn touch(&self, group_id: &GroupId) {
        let mut last_activity = self.last_activity.lock().await;
        last_activity.insert(group_id.clone(), Timestamp::new(self.clock.now_millis()));
    }
}

/// Token verifier backed by a static `token -> user` table, seeded from the
/// command line. A deployment replaces this with the platform's real
/// verifier.
pub struct StaticTokenVerifier {
    tokens: HashMap<String, UserId>,
}

impl StaticTokenVerifier {
    pub fn new(tokens: HashMap<String, UserId>) -> Self {
        Self { tokens }
    }
}

impl TokenVerifier for StaticTokenVerifier {
    fn verify(&self, token: &str) -> Result<Identity, AuthError> {
        if token.is_empty() {
            return Err(AuthError::MissingToken);
        }
        self.tokens
            .get(token)
            .map(|user_id| Identity {
                user_id: user_id.clone(),
            })
            .ok_or(AuthError::InvalidToken)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{MessageContent, MessageKind};

    fn group(id: &str) -> GroupId {
        GroupId::new(id.to_string()).unwrap()
    }

    fn user(id: &str) -> UserId {
        UserId::new(id.to_string()).unwrap()
    }

    fn message(group_id: &str, sender: &str, body: &str) -> ChatMessage {
        ChatMessage::new(
            group(group_id),
            user(sender),
            MessageContent::new(body.to_string()).unwrap(),
            MessageKind::Text,
            Timestamp::new(1000),
            None,
            vec![],
        )
    }

    #[tokio::test]
    async fn test_append_and_find() {
        // given:
        let store = InMemoryMessageStore::new();
        let msg = message("g1", "alice", "hello");

        // when:
        store.append(msg.clone()).await.unwrap();
        let found = store.find(&group("g1"), &msg.id).await.unwrap();

        // then:
        assert_eq!(found, Some(msg));
    }

    #[tokio::test]
    async fn test_find_in_wrong_group_returns_none() {
        // given:
        let store = InMemoryMessageStore::new();
        let msg = message("g1", "alice", "hello");
        store.append(msg.clone()).await.unwrap();

        // when:
        let found = store.find(&group("g2"), &msg.id).await.unwrap();

        // then:
        assert_eq!(found, None);
    }

    #[tokio::test]
    async fn test_update_replaces_stored_message() {
        // given:
        let store = InMemoryMessageStore::new();
        let mut msg = message("g1", "alice", "hello");
        store.append(msg.clone()).await.unwrap();

        // when:
        msg.apply_edit(
            MessageContent::new("edited".to_string()).unwrap(),
            Timestamp::new(2000),
        );
        store.update(msg.clone()).await.unwrap();

        // then:
        let found = store.find(&group("g1"), &msg.id).await.unwrap().unwrap();
        assert_eq!(found.content.as_str(), "edited");
        assert!(found.edited_at.is_some());
    }

    #[tokio::test]
    async fn test_update_unknown_message_errors() {
        // given:
        let store = InMemoryMessageStore::new();
        store.append(message("g1", "alice", "hi")).await.unwrap();

        // when:
        let result = store.update(message("g1", "alice", "ghost")).await;

        // then:
        assert!(matches!(result, Err(ChatError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_directory_grant_and_revoke() {
        // given:
        let directory = InMemoryGroupDirectory::new();
        directory.grant(group("g1"), user("alice"), Role::Member).await;

        // when / then:
        assert_eq!(
            directory.member_role(&group("g1"), &user("alice")).await.unwrap(),
            Some(Role::Member)
        );
        assert_eq!(
            directory.member_role(&group("g1"), &user("bob")).await.unwrap(),
            None
        );

        directory.revoke(&group("g1"), &user("alice")).await;
        assert_eq!(
            directory.member_role(&group("g1"), &user("alice")).await.unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn test_activity_touch_records_clock_time() {
        // given:
        let clock = std::sync::Arc::new(tsudoi_shared::time::FixedClock::new(42_000));
        let activity = InMemoryGroupActivity::new(clock);

        // when:
        activity.touch(&group("g1")).await;

        // then:
        assert_eq!(
            activity.last_activity(&group("g1")).await,
            Some(Timestamp::new(42_000))
        );
    }

    #[test]
    fn test_static_token_verifier() {
        // given:
        let mut tokens = HashMap::new();
        tokens.insert("secret".to_string(), user("alice"));
        let verifier = StaticTokenVerifier::new(tokens);

        // when / then:
        assert_eq!(
            verifier.verify("secret").unwrap().user_id,
            user("alice")
        );
        assert_eq!(verifier.verify("wrong"), Err(AuthError::InvalidToken));
        assert_eq!(verifier.verify(""), Err(AuthError::MissingToken));
    }
}
