//! Integration tests for typing expiry on a paused clock, and the
//! membership seam.

use std::time::Duration;

use chatwire_protocol::{ChannelId, Username};
use chatwire_session::{
    ConversationState, Membership, OpenMembership, SessionConfig, SessionError, TypingTracker,
};
use tokio::time::{self, Instant};

fn alice() -> Username {
    Username::new("alice")
}

/// Sleeps until the tracker's next deadline and collects it, as the
/// connection manager's loop does.
async fn run_expiry(tracker: &mut TypingTracker) -> Vec<Username> {
    match tracker.next_expiry() {
        Some(at) => {
            time::sleep_until(at).await;
            tracker.expire(Instant::now())
        }
        None => Vec::new(),
    }
}

#[tokio::test(start_paused = true)]
async fn test_typing_lapses_exactly_ttl_after_last_mark() {
    let mut tracker = TypingTracker::default();
    let start = Instant::now();

    tracker.mark_typing(alice(), start);
    time::advance(Duration::from_millis(1200)).await;
    tracker.mark_typing(alice(), Instant::now());

    let expired = run_expiry(&mut tracker).await;
    assert_eq!(expired, vec![alice()]);
    assert_eq!(Instant::now() - start, Duration::from_millis(4200));
}

#[tokio::test(start_paused = true)]
async fn test_typing_stopped_before_ttl_never_expires() {
    let mut tracker = TypingTracker::default();
    tracker.mark_typing(alice(), Instant::now());
    time::advance(Duration::from_millis(2999)).await;
    assert!(tracker.mark_stopped(&alice()));

    assert!(run_expiry(&mut tracker).await.is_empty());
    assert!(tracker.snapshot(Instant::now()).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_typing_present_just_before_deadline() {
    let mut tracker = TypingTracker::default();
    let start = Instant::now();
    tracker.mark_typing(alice(), start);

    time::advance(Duration::from_millis(2999)).await;
    assert!(tracker.is_typing(&alice(), Instant::now()));
    time::advance(Duration::from_millis(1)).await;
    assert!(!tracker.is_typing(&alice(), Instant::now()));
}

#[test]
fn test_conversation_config_applies_ttl() {
    let config = SessionConfig {
        typing_ttl: Duration::from_millis(500),
        ..Default::default()
    };
    let state = ConversationState::new(ChannelId::new("general"), &config);
    assert_eq!(state.typing().ttl(), Duration::from_millis(500));
}

struct Roster;

impl Membership for Roster {
    async fn is_member(
        &self,
        _user: &Username,
        conversation: &ChannelId,
    ) -> Result<bool, SessionError> {
        Ok(conversation.as_str() == "general")
    }

    async fn join(&self, _user: &Username, conversation: &ChannelId) -> Result<(), SessionError> {
        Err(SessionError::JoinFailed {
            conversation: conversation.clone(),
            reason: "private".into(),
        })
    }
}

#[tokio::test]
async fn test_membership_join_refusal_reports_conversation() {
    let roster = Roster;
    let target = ChannelId::new("staff");
    assert!(!roster.is_member(&alice(), &target).await.unwrap());

    let err = roster.join(&alice(), &target).await.unwrap_err();
    assert_eq!(err.to_string(), "failed to join #staff: private");
}

#[tokio::test]
async fn test_open_membership_accepts_everything() {
    let target = ChannelId::new("anything");
    assert!(OpenMembership.is_member(&alice(), &target).await.unwrap());
    assert!(OpenMembership.join(&alice(), &target).await.is_ok());
}
