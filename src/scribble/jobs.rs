//! Fire-and-forget notification hook for toggle-type setting changes.

use once_cell::sync::Lazy;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsToggle {
    SkipLoaderCache,
    DebugLogging,
}

impl SettingsToggle {
    pub fn as_key(self) -> &'static str {
        match self {
            SettingsToggle::SkipLoaderCache => "skip_loader_cache",
            SettingsToggle::DebugLogging => "debug_logging",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettingsJob {
    pub toggle: SettingsToggle,
    pub enabled: bool,
}

type JobHook = Box<dyn Fn(SettingsJob) + Send + Sync>;
type SharedHook = Arc<dyn Fn(SettingsJob) + Send + Sync>;
static JOB_HOOK: Lazy<Mutex<Option<SharedHook>>> = Lazy::new(|| Mutex::new(None));

pub fn set_job_hook(hook: Option<JobHook>) {
    if let Ok(mut guard) = JOB_HOOK.lock() {
        *guard = hook.map(SharedHook::from);
    }
}

/// Hands `job` to the installed hook. Without a hook the job is dropped.
/// The hook runs outside the registry lock, so it may submit further jobs or
/// replace itself.
pub fn submit(job: SettingsJob) {
    tracing::debug!(key = job.toggle.as_key(), enabled = job.enabled, "settings job");
    let hook = match JOB_HOOK.lock() {
        Ok(guard) => guard.clone(),
        Err(_) => {
            tracing::warn!("job hook lock poisoned");
            return;
        }
    };
    if let Some(hook) = hook {
        hook(job);
    }
}
