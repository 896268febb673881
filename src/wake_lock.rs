use std::process::Child;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeLockOutcome {
    Acquired,
    Unsupported,
    Denied,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeLockEvent {
    Acquire(WakeLockOutcome),
    Release,
}

/// Best-effort screen/idle inhibitor. Platform wake locks are commonly
/// revoked when the application loses visibility, so the owner re-acquires
/// on focus regain. Absence of support or a denied request is recorded and
/// swallowed; the session proceeds without the lock.
#[derive(Debug, Default)]
pub struct WakeLockManager {
    child: Option<Child>,
    log: Vec<WakeLockEvent>,
}

impl WakeLockManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_held(&self) -> bool {
        self.child.is_some()
    }

    pub fn events(&self) -> &[WakeLockEvent] {
        &self.log
    }

    pub fn acquire(&mut self) -> WakeLockOutcome {
        if self.child.is_some() {
            return WakeLockOutcome::Acquired;
        }
        let outcome = match spawn_inhibitor() {
            Some(Ok(child)) => {
                self.child = Some(child);
                WakeLockOutcome::Acquired
            }
            Some(Err(())) => WakeLockOutcome::Denied,
            None => WakeLockOutcome::Unsupported,
        };
        self.log.push(WakeLockEvent::Acquire(outcome));
        outcome
    }

    /// Idempotent; releasing an unheld lock does nothing.
    pub fn release(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
            self.log.push(WakeLockEvent::Release);
        }
    }

    /// Called when the application regains foreground visibility.
    pub fn reacquire_if_needed(&mut self) {
        if !self.is_held() {
            self.acquire();
        }
    }
}

impl Drop for WakeLockManager {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(target_os = "macos")]
fn spawn_inhibitor() -> Option<Result<Child, ()>> {
    use std::process::{Command, Stdio};

    Some(
        Command::new("caffeinate")
            .arg("-dims")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|_| ()),
    )
}

#[cfg(target_os = "linux")]
fn spawn_inhibitor() -> Option<Result<Child, ()>> {
    use std::process::{Command, Stdio};

    Some(
        Command::new("systemd-inhibit")
            .args([
                "--what=idle:sleep",
                "--who=hevi",
                "--why=active workout session",
                "sleep",
                "infinity",
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|_| ()),
    )
}

#[cfg(not(any(target_os = "macos", target_os = "linux")))]
fn spawn_inhibitor() -> Option<Result<Child, ()>> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn release_without_acquire_is_a_no_op() {
        let mut lock = WakeLockManager::new();
        lock.release();
        lock.release();
        assert!(!lock.is_held());
        assert!(lock.events().is_empty());
    }

    #[test]
    fn acquire_records_an_outcome() {
        let mut lock = WakeLockManager::new();
        let outcome = lock.acquire();
        assert_eq!(lock.events().len(), 1);
        assert_eq!(lock.events()[0], WakeLockEvent::Acquire(outcome));
        // Whatever the environment supports, the session carries on.
        lock.release();
        assert!(!lock.is_held());
    }

    #[test]
    fn reacquire_skips_when_already_held() {
        let mut lock = WakeLockManager::new();
        if lock.acquire() == WakeLockOutcome::Acquired {
            let before = lock.events().len();
            lock.reacquire_if_needed();
            assert_eq!(lock.events().len(), before);
        }
        lock.release();
    }
}
