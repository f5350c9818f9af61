//! "Sign in again" notification shared by the gateway and its consumers.

use tokio::sync::watch;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReauthState {
    /// A rejection happened and no new credential has been set since.
    pub required: bool,
    /// Number of rejection episodes observed since startup.
    pub episodes: u64,
}

/// Edge-triggered re-authentication signal.
///
/// Only the transition into `required` notifies subscribers, so any number of
/// simultaneous rejections produce a single event until the next sign-in.
#[derive(Debug)]
pub struct ReauthSignal {
    tx: watch::Sender<ReauthState>,
}

impl ReauthSignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(ReauthState::default());
        Self { tx }
    }

    /// Raise the signal. Returns `true` only for the call that started the
    /// episode.
    pub fn raise(&self) -> bool {
        self.tx.send_if_modified(|state| {
            if state.required {
                return false;
            }
            state.required = true;
            state.episodes += 1;
            true
        })
    }

    /// Re-arm after a new credential was issued
    pub fn reset(&self) {
        self.tx.send_if_modified(|state| {
            let was_required = state.required;
            state.required = false;
            was_required
        });
    }

    pub fn state(&self) -> ReauthState {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ReauthState> {
        self.tx.subscribe()
    }
}

impl Default for ReauthSignal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raise_once_per_episode() {
        let signal = ReauthSignal::new();
        assert!(signal.raise());
        assert!(!signal.raise());
        assert!(!signal.raise());
        assert_eq!(
            signal.state(),
            ReauthState {
                required: true,
                episodes: 1
            }
        );
    }

    #[test]
    fn test_reset_rearms() {
        let signal = ReauthSignal::new();
        signal.raise();
        signal.reset();
        assert!(!signal.state().required);
        assert!(signal.raise());
        assert_eq!(signal.state().episodes, 2);
    }

    #[tokio::test]
    async fn test_subscriber_sees_single_change() {
        let signal = ReauthSignal::new();
        let mut rx = signal.subscribe();

        signal.raise();
        signal.raise();

        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow_and_update().required);
        assert!(!rx.has_changed().unwrap());
    }
}
