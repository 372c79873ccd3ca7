use super::{SessionToken, SessionUser};
use crate::clock::{age_exceeds, Clock};
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// What a session check found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCheck {
    /// Logged in and within the idle timeout.
    Valid,
    /// Was logged in, went stale. The presentation layer must surface a
    /// "session expired" notice before routing to re-authentication;
    /// silently redirecting is not the same behavior.
    Expired,
    /// Never logged in (or logged out). Routes to authentication with no
    /// notice.
    Anonymous,
}

#[derive(Debug)]
struct ActiveSession {
    user: SessionUser,
    token: SessionToken,
    logged_in_at: DateTime<Utc>,
    last_activity_at: DateTime<Utc>,
}

#[derive(Debug)]
enum SessionState {
    Anonymous,
    Active(ActiveSession),
    /// Session data is already cleared by the time this state is reached;
    /// the variant only preserves the "was logged in" distinction until the
    /// next login.
    Expired,
}

/// Tracks login state and last activity, expiring idle sessions lazily.
///
/// Expiry is detected on the next check, never by a timer. All checks are
/// strict: a session exactly at the timeout is still valid.
pub struct SessionMonitor {
    clock: Arc<dyn Clock>,
    timeout: chrono::Duration,
    state: Mutex<SessionState>,
}

impl SessionMonitor {
    pub fn new(clock: Arc<dyn Clock>, timeout: chrono::Duration) -> Self {
        Self {
            clock,
            timeout,
            state: Mutex::new(SessionState::Anonymous),
        }
    }

    /// Start a session for `user`, returning the token the presentation
    /// layer should carry. A fresh token is generated on every login.
    pub fn login(&self, user: SessionUser) -> SessionToken {
        let now = self.clock.now();
        let token = SessionToken::generate();
        debug!("Session started for user {}", user.user_id);

        let mut state = self.state.lock().unwrap();
        *state = SessionState::Active(ActiveSession {
            user,
            token: token.clone(),
            logged_in_at: now,
            last_activity_at: now,
        });
        token
    }

    /// Clear the session. Safe to call in any state.
    pub fn logout(&self) {
        let mut state = self.state.lock().unwrap();
        if let SessionState::Active(active) = &*state {
            debug!("Session ended for user {}", active.user.user_id);
        }
        *state = SessionState::Anonymous;
    }

    /// Evaluate the session, expiring it if it went stale.
    ///
    /// The `Expired` result is sticky: it keeps being reported until the
    /// next `login` or `logout`, so the notice cannot be lost between the
    /// check and the navigation it triggers.
    pub fn check_session(&self) -> SessionCheck {
        let now = self.clock.now();
        let mut state = self.state.lock().unwrap();
        match &*state {
            SessionState::Anonymous => SessionCheck::Anonymous,
            SessionState::Expired => SessionCheck::Expired,
            SessionState::Active(active) => {
                if age_exceeds(active.last_activity_at, now, self.timeout) {
                    debug!("Session for user {} expired", active.user.user_id);
                    // Clear session data on the way into re-authentication.
                    *state = SessionState::Expired;
                    SessionCheck::Expired
                } else {
                    SessionCheck::Valid
                }
            }
        }
    }

    /// Record a tracked interaction, moving `last_activity_at` forward.
    ///
    /// An interaction arriving after the timeout does not revive the
    /// session; it expires it, exactly as a check would.
    pub fn update_last_activity(&self) {
        let now = self.clock.now();
        let mut state = self.state.lock().unwrap();
        if let SessionState::Active(active) = &mut *state {
            if age_exceeds(active.last_activity_at, now, self.timeout) {
                debug!("Session for user {} expired", active.user.user_id);
                *state = SessionState::Expired;
            } else if now > active.last_activity_at {
                active.last_activity_at = now;
            }
        }
    }

    pub fn is_logged_in(&self) -> bool {
        self.check_session() == SessionCheck::Valid
    }

    pub fn is_session_expired(&self) -> bool {
        self.check_session() == SessionCheck::Expired
    }

    /// The logged-in user, if the session is valid.
    pub fn current_user(&self) -> Option<SessionUser> {
        if self.check_session() != SessionCheck::Valid {
            return None;
        }
        let state = self.state.lock().unwrap();
        match &*state {
            SessionState::Active(active) => Some(active.user.clone()),
            _ => None,
        }
    }

    /// The current session token, if the session is valid.
    pub fn current_token(&self) -> Option<SessionToken> {
        if self.check_session() != SessionCheck::Valid {
            return None;
        }
        let state = self.state.lock().unwrap();
        match &*state {
            SessionState::Active(active) => Some(active.token.clone()),
            _ => None,
        }
    }

    /// When the current session was established, if it is valid.
    pub fn logged_in_at(&self) -> Option<DateTime<Utc>> {
        if self.check_session() != SessionCheck::Valid {
            return None;
        }
        let state = self.state.lock().unwrap();
        match &*state {
            SessionState::Active(active) => Some(active.logged_in_at),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::session::UserRole;

    fn base() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-06-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn make_monitor() -> (SessionMonitor, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(base()));
        let monitor = SessionMonitor::new(
            Arc::clone(&clock) as Arc<dyn Clock>,
            chrono::Duration::minutes(10),
        );
        (monitor, clock)
    }

    fn customer() -> SessionUser {
        SessionUser {
            user_id: "user-1".to_string(),
            role: UserRole::Customer,
        }
    }

    #[test]
    fn test_starts_anonymous() {
        let (monitor, _clock) = make_monitor();

        assert_eq!(monitor.check_session(), SessionCheck::Anonymous);
        assert!(!monitor.is_logged_in());
        assert!(!monitor.is_session_expired());
        assert!(monitor.current_user().is_none());
    }

    #[test]
    fn test_login_makes_session_valid() {
        let (monitor, _clock) = make_monitor();

        monitor.login(customer());

        assert_eq!(monitor.check_session(), SessionCheck::Valid);
        assert!(monitor.is_logged_in());
        assert_eq!(monitor.current_user(), Some(customer()));
        assert_eq!(monitor.logged_in_at(), Some(base()));
    }

    #[test]
    fn test_session_expires_strictly_after_timeout() {
        let (monitor, clock) = make_monitor();
        monitor.login(customer());

        // Exactly at the timeout: still valid.
        clock.advance(chrono::Duration::minutes(10));
        assert_eq!(monitor.check_session(), SessionCheck::Valid);

        // One second past: expired.
        clock.advance(chrono::Duration::seconds(1));
        assert_eq!(monitor.check_session(), SessionCheck::Expired);
    }

    #[test]
    fn test_expired_is_distinct_from_anonymous_and_sticky() {
        let (monitor, clock) = make_monitor();
        monitor.login(customer());
        clock.advance(chrono::Duration::minutes(11));

        assert!(monitor.is_session_expired());
        // Still expired on subsequent checks, not anonymous.
        assert_eq!(monitor.check_session(), SessionCheck::Expired);
        assert!(!monitor.is_logged_in());

        // Logout resolves to anonymous; the notice distinction is gone.
        monitor.logout();
        assert_eq!(monitor.check_session(), SessionCheck::Anonymous);
    }

    #[test]
    fn test_expiry_clears_session_data() {
        let (monitor, clock) = make_monitor();
        monitor.login(customer());
        clock.advance(chrono::Duration::minutes(11));

        assert_eq!(monitor.check_session(), SessionCheck::Expired);
        assert!(monitor.current_user().is_none());
        assert!(monitor.current_token().is_none());
        assert!(monitor.logged_in_at().is_none());
    }

    #[test]
    fn test_activity_keeps_session_alive() {
        let (monitor, clock) = make_monitor();
        monitor.login(customer());

        // Interact every 8 minutes for over half an hour.
        for _ in 0..4 {
            clock.advance(chrono::Duration::minutes(8));
            monitor.update_last_activity();
            assert_eq!(monitor.check_session(), SessionCheck::Valid);
        }
    }

    #[test]
    fn test_late_activity_does_not_revive_session() {
        let (monitor, clock) = make_monitor();
        monitor.login(customer());

        clock.advance(chrono::Duration::minutes(11));
        monitor.update_last_activity();

        assert_eq!(monitor.check_session(), SessionCheck::Expired);
    }

    #[test]
    fn test_update_last_activity_ignored_when_not_logged_in() {
        let (monitor, clock) = make_monitor();

        monitor.update_last_activity();
        assert_eq!(monitor.check_session(), SessionCheck::Anonymous);

        monitor.login(customer());
        clock.advance(chrono::Duration::minutes(11));
        monitor.update_last_activity(); // expires
        monitor.update_last_activity(); // no-op in Expired
        assert_eq!(monitor.check_session(), SessionCheck::Expired);
    }

    #[test]
    fn test_login_after_expiry_starts_fresh_session() {
        let (monitor, clock) = make_monitor();
        let first_token = monitor.login(customer());

        clock.advance(chrono::Duration::minutes(11));
        assert!(monitor.is_session_expired());

        let second_token = monitor.login(customer());
        assert_eq!(monitor.check_session(), SessionCheck::Valid);
        assert_ne!(first_token, second_token);
        assert_eq!(monitor.logged_in_at(), Some(monitor.clock.now()));
    }

    #[test]
    fn test_logout_clears_valid_session() {
        let (monitor, _clock) = make_monitor();
        let token = monitor.login(customer());
        assert_eq!(monitor.current_token(), Some(token));

        monitor.logout();
        assert_eq!(monitor.check_session(), SessionCheck::Anonymous);
        assert!(monitor.current_token().is_none());
    }
}
