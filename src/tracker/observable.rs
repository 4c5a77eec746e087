use tokio::sync::watch;
use tokio::task::JoinSet;

/// State of a one-shot event channel.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Signal<T> {
    #[default]
    Idle,
    Armed(T),
}

impl<T> Signal<T> {
    pub fn is_armed(&self) -> bool {
        matches!(self, Signal::Armed(_))
    }

    pub fn armed(&self) -> Option<&T> {
        match self {
            Signal::Armed(value) => Some(value),
            Signal::Idle => None,
        }
    }
}

/// An event that observers act on once and then acknowledge back to idle.
///
/// Re-observing an armed channel yields the same payload, so the observer
/// must call [`OneShot::acknowledge`] right after performing its side effect.
#[derive(Debug)]
pub struct OneShot<T> {
    sender: watch::Sender<Signal<T>>,
}

impl<T> Clone for OneShot<T> {
    fn clone(&self) -> Self {
        Self { sender: self.sender.clone() }
    }
}

impl<T: Clone> OneShot<T> {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(Signal::Idle);
        Self { sender }
    }

    /// Idle -> Armed. Arming an armed channel replaces its payload.
    pub fn arm(&self, value: T) {
        self.sender.send_replace(Signal::Armed(value));
    }

    /// Armed -> Idle. Does nothing, and wakes nobody, on an idle channel.
    pub fn acknowledge(&self) {
        self.sender.send_if_modified(|signal| {
            if signal.is_armed() {
                *signal = Signal::Idle;
                true
            } else {
                false
            }
        });
    }

    pub fn subscribe(&self) -> watch::Receiver<Signal<T>> {
        self.sender.subscribe()
    }
}

impl<T: Clone> Default for OneShot<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Derives a new observable from `source`, recomputed with `compute` every
/// time the source changes. Observers of the result are only woken when the
/// derived value actually differs.
///
/// The recompute task lives in `tasks` and stops when the source sender is
/// dropped or the task set is aborted.
pub fn computed<T, U, F>(
    tasks: &mut JoinSet<()>,
    mut source: watch::Receiver<T>,
    compute: F,
) -> watch::Receiver<U>
where
    T: Send + Sync + 'static,
    U: PartialEq + Send + Sync + 'static,
    F: Fn(&T) -> U + Send + 'static,
{
    let initial = compute(&*source.borrow_and_update());
    let (sender, receiver) = watch::channel(initial);
    tasks.spawn(async move {
        while source.changed().await.is_ok() {
            let value = compute(&*source.borrow_and_update());
            sender.send_if_modified(|current| {
                if *current != value {
                    *current = value;
                    true
                } else {
                    false
                }
            });
        }
    });
    receiver
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_one_shot_starts_idle() {
        let channel: OneShot<i64> = OneShot::new();
        assert_eq!(*channel.subscribe().borrow(), Signal::Idle);
        assert!(channel.subscribe().borrow().armed().is_none());
    }

    #[test]
    fn test_arm_then_acknowledge() {
        let channel = OneShot::new();
        let mut rx = channel.subscribe();

        channel.arm(42_i64);
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), Signal::Armed(42));

        channel.acknowledge();
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), Signal::Idle);
    }

    #[test]
    fn test_acknowledge_twice_is_safe_and_silent() {
        let channel = OneShot::new();
        let mut rx = channel.subscribe();
        channel.arm("night");
        channel.acknowledge();
        rx.mark_unchanged();

        channel.acknowledge();
        assert!(!rx.has_changed().unwrap(), "acknowledging idle must not re-notify");
        assert_eq!(*channel.subscribe().borrow(), Signal::Idle);
    }

    #[test]
    fn test_re_arming_replaces_payload() {
        let channel = OneShot::new();
        channel.arm(1_i64);
        channel.arm(2_i64);
        assert_eq!(*channel.subscribe().borrow(), Signal::Armed(2));
    }

    #[tokio::test]
    async fn test_computed_follows_source() {
        let mut tasks = JoinSet::new();
        let (tx, rx) = watch::channel(0_u32);
        let mut doubled = computed(&mut tasks, rx, |v| v * 2);
        assert_eq!(*doubled.borrow_and_update(), 0);

        tx.send_replace(21);
        let value = tokio::time::timeout(Duration::from_secs(2), doubled.wait_for(|v| *v == 42))
            .await
            .expect("timed out")
            .expect("sender alive");
        assert_eq!(*value, 42);
    }

    #[tokio::test]
    async fn test_computed_skips_equal_values() {
        let mut tasks = JoinSet::new();
        let (tx, rx) = watch::channel(1_u32);
        let mut is_odd = computed(&mut tasks, rx, |v| v % 2 == 1);
        is_odd.mark_unchanged();

        tx.send_replace(3);
        tx.send_replace(5);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!is_odd.has_changed().unwrap());

        tx.send_replace(4);
        tokio::time::timeout(Duration::from_secs(2), is_odd.changed())
            .await
            .expect("timed out")
            .expect("sender alive");
        assert!(!*is_odd.borrow());
    }
}
