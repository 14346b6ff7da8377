// src/progress.rs
// =============================================================================
// Progress events emitted while a harvest runs.
//
// The crawler and verifier never print anything themselves. They push events
// into an unbounded tokio channel; whoever holds the receiving end (main.rs
// logs them) decides how to show them. Sending never blocks, and if nobody
// is listening the events are simply dropped.
// =============================================================================

use serde::Serialize;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::report::SiteStatus;
use crate::verify::VerificationStatus;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProgressEvent {
    SiteStarted {
        seed: String,
    },
    PageCrawled {
        seed: String,
        url: String,
        depth: usize,
        /// Raw candidates found so far for this site
        emails_found: usize,
        queue_len: usize,
    },
    SiteFinished {
        seed: String,
        status: SiteStatus,
        clean_emails: usize,
        pages_crawled: usize,
    },
    VerificationStarted {
        total: usize,
    },
    EmailVerified {
        email: String,
        status: VerificationStatus,
    },
    Finished {
        unique_emails: usize,
        valid_emails: usize,
    },
}

/// Cheap, cloneable handle for emitting progress events
#[derive(Debug, Clone, Default)]
pub struct Progress {
    sender: Option<UnboundedSender<ProgressEvent>>,
}

impl Progress {
    /// Creates a connected handle plus the receiver to read events from
    pub fn channel() -> (Self, UnboundedReceiver<ProgressEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (
            Self {
                sender: Some(sender),
            },
            receiver,
        )
    }

    /// A handle that discards every event
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn emit(&self, event: ProgressEvent) {
        if let Some(sender) = &self.sender {
            // a closed receiver just means nobody is watching anymore
            let _ = sender.send(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_events_arrive_in_order() {
        let (progress, mut receiver) = Progress::channel();
        progress.emit(ProgressEvent::VerificationStarted { total: 2 });
        progress.emit(ProgressEvent::Finished {
            unique_emails: 2,
            valid_emails: 1,
        });
        drop(progress);

        assert_eq!(
            receiver.recv().await,
            Some(ProgressEvent::VerificationStarted { total: 2 })
        );
        assert!(matches!(
            receiver.recv().await,
            Some(ProgressEvent::Finished { .. })
        ));
        assert_eq!(receiver.recv().await, None);
    }

    #[test]
    fn test_emit_without_listener_is_harmless() {
        Progress::disabled().emit(ProgressEvent::SiteStarted {
            seed: "https://acme.com".to_string(),
        });

        let (progress, receiver) = Progress::channel();
        drop(receiver);
        progress.emit(ProgressEvent::VerificationStarted { total: 0 });
    }
}
