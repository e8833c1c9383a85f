//! # Notices
//!
//! Transient, dismissible messages raised by the session. Each notice
//! expires after the configured duration unless dismissed first; a manual
//! dismiss removes the notice and with it its deadline.

use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

/// Bounds on how long a notice stays up
pub const MIN_NOTICE_DURATION: Duration = Duration::from_millis(4000);
pub const MAX_NOTICE_DURATION: Duration = Duration::from_millis(5000);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeKind {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notice {
    pub id: u64,
    pub kind: NoticeKind,
    pub message: String,

    /// Time since session start at which the notice goes away
    #[serde(skip)]
    pub expires_at: Duration,
}

/// Open notices, oldest first
#[derive(Debug)]
pub struct NoticeBoard {
    notices: Vec<Notice>,
    duration: Duration,
    next_id: u64,
}

impl NoticeBoard {
    pub fn new(duration: Duration) -> Self {
        Self {
            notices: Vec::new(),
            duration: duration.clamp(MIN_NOTICE_DURATION, MAX_NOTICE_DURATION),
            next_id: 1,
        }
    }

    /// Raise a notice at `now`; returns its id
    pub fn raise(&mut self, kind: NoticeKind, message: impl Into<String>, now: Duration) -> u64 {
        let id = self.next_id;
        self.next_id += 1;

        let message = message.into();
        match kind {
            NoticeKind::Error | NoticeKind::Warning => warn!(id, "{}", message),
            NoticeKind::Info => debug!(id, "{}", message),
        }

        self.notices.push(Notice {
            id,
            kind,
            message,
            expires_at: now + self.duration,
        });
        id
    }

    /// Dismiss by id. Returns false for an unknown or already expired notice.
    pub fn dismiss(&mut self, id: u64) -> bool {
        let before = self.notices.len();
        self.notices.retain(|notice| notice.id != id);
        before != self.notices.len()
    }

    /// Drop every notice whose deadline has passed; returns how many
    pub fn expire(&mut self, now: Duration) -> usize {
        let before = self.notices.len();
        self.notices.retain(|notice| notice.expires_at > now);
        let expired = before - self.notices.len();
        if expired > 0 {
            debug!(expired, "Notices expired");
        }
        expired
    }

    /// Earliest pending deadline
    pub fn next_deadline(&self) -> Option<Duration> {
        self.notices.iter().map(|notice| notice.expires_at).min()
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(millis: u64) -> Duration {
        Duration::from_millis(millis)
    }

    #[test]
    fn test_duration_is_clamped() {
        assert_eq!(NoticeBoard::new(ms(100)).duration(), ms(4000));
        assert_eq!(NoticeBoard::new(ms(4500)).duration(), ms(4500));
        assert_eq!(NoticeBoard::new(ms(60_000)).duration(), ms(5000));
    }

    #[test]
    fn test_notice_expires_after_duration() {
        let mut board = NoticeBoard::new(ms(4000));
        board.raise(NoticeKind::Warning, "Save before navigating", ms(1000));

        assert_eq!(board.next_deadline(), Some(ms(5000)));
        assert_eq!(board.expire(ms(4999)), 0);
        assert_eq!(board.expire(ms(5000)), 1);
        assert!(board.notices().is_empty());
        assert_eq!(board.next_deadline(), None);
    }

    #[test]
    fn test_dismiss_cancels_deadline() {
        let mut board = NoticeBoard::new(ms(4000));
        let first = board.raise(NoticeKind::Error, "first", ms(0));
        board.raise(NoticeKind::Info, "second", ms(500));

        assert!(board.dismiss(first));
        assert!(!board.dismiss(first));
        assert_eq!(board.next_deadline(), Some(ms(4500)));
        assert_eq!(board.notices()[0].message, "second");
    }
}
