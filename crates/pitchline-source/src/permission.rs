//! Record permission providers.
//!
//! Capture from a microphone may need the user's consent. The engine asks
//! the provider before starting an input source and continues only once
//! the answer arrives.

use parking_lot::Mutex;
use std::sync::Arc;
use std::thread;

/// Current answer of a permission provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PermissionStatus {
    /// The user has not been asked yet.
    #[default]
    Undetermined,
    Granted,
    Denied,
}

/// Callback receiving `true` when capture is allowed.
pub type PermissionCallback = Box<dyn FnOnce(bool) + Send>;

/// Grants or denies access to audio capture.
pub trait PermissionProvider: Send + Sync {
    fn status(&self) -> PermissionStatus;

    /// Ask for access. `on_result` runs exactly once, on any thread,
    /// possibly before `request` returns.
    fn request(&self, on_result: PermissionCallback);
}

/// Desktop default: capture is always allowed.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysGranted;

impl PermissionProvider for AlwaysGranted {
    fn status(&self) -> PermissionStatus {
        PermissionStatus::Granted
    }

    fn request(&self, on_result: PermissionCallback) {
        on_result(true);
    }
}

struct PromptState {
    status: PermissionStatus,
    prompting: bool,
    waiting: Vec<PermissionCallback>,
}

/// Asks the host once through a blocking prompt closure and remembers the answer.
///
/// The prompt runs on a `pitchline-permission` thread. Requests made while
/// it is showing are answered together when it returns.
pub struct PromptPermission {
    prompt: Arc<dyn Fn() -> bool + Send + Sync>,
    state: Arc<Mutex<PromptState>>,
}

impl PromptPermission {
    pub fn new<F>(prompt: F) -> Self
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        Self {
            prompt: Arc::new(prompt),
            state: Arc::new(Mutex::new(PromptState {
                status: PermissionStatus::Undetermined,
                prompting: false,
                waiting: Vec::new(),
            })),
        }
    }
}

impl std::fmt::Debug for PromptPermission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PromptPermission")
            .field("status", &self.status())
            .finish()
    }
}

impl PermissionProvider for PromptPermission {
    fn status(&self) -> PermissionStatus {
        self.state.lock().status
    }

    fn request(&self, on_result: PermissionCallback) {
        let mut state = self.state.lock();
        match state.status {
            PermissionStatus::Granted => {
                drop(state);
                on_result(true);
                return;
            }
            PermissionStatus::Denied => {
                drop(state);
                on_result(false);
                return;
            }
            PermissionStatus::Undetermined => {}
        }

        state.waiting.push(on_result);
        if state.prompting {
            return;
        }
        state.prompting = true;
        drop(state);

        let prompt = Arc::clone(&self.prompt);
        let shared = Arc::clone(&self.state);
        let spawned = thread::Builder::new()
            .name("pitchline-permission".into())
            .spawn(move || {
                let granted =
                    std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| prompt()))
                        .unwrap_or(false);
                tracing::info!(granted, "record permission answered");
                answer(&shared, granted, true);
            });

        if let Err(e) = spawned {
            tracing::warn!("failed to spawn permission thread: {e}");
            answer(&self.state, false, false);
        }
    }
}

/// Resolve every waiting request. `remember` stores the answer for later calls.
fn answer(state: &Mutex<PromptState>, granted: bool, remember: bool) {
    let waiting = {
        let mut state = state.lock();
        if remember {
            state.status = if granted {
                PermissionStatus::Granted
            } else {
                PermissionStatus::Denied
            };
        }
        state.prompting = false;
        std::mem::take(&mut state.waiting)
    };
    for callback in waiting {
        callback(granted);
    }
}
