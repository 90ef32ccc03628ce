//! Process-wide cleanup registry for running containers.
//!
//! Grounded on `octopus/core/service.py`'s `atexit.register` pattern:
//! the source keeps a class-level set of container ids and an exit
//! hook that stops/removes whatever is still registered. Rewritten per
//! §9 as an explicit registry of `(id, cleanup-fn)` pairs behind a
//! mutex, with a single shutdown hook installed once.

use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};

type CleanupFn = Box<dyn FnMut() + Send>;

struct Registry {
    entries: Mutex<HashMap<String, CleanupFn>>,
}

fn registry() -> &'static Registry {
    static REGISTRY: OnceLock<Registry> = OnceLock::new();
    REGISTRY.get_or_init(|| Registry {
        entries: Mutex::new(HashMap::new()),
    })
}

static HOOK_INSTALLED: OnceLock<()> = OnceLock::new();

/// Installs the SIGINT shutdown hook exactly once: a background task
/// that waits on Ctrl-C and runs whatever cleanups are still
/// registered. Safe to call from multiple engine instances; only the
/// first call spawns the task. Must be called from within a tokio
/// runtime.
pub fn install_shutdown_hook() {
    HOOK_INSTALLED.get_or_init(|| {
        tokio::spawn(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                log::warn!("received interrupt, running cleanup registry");
                run_all();
                std::process::exit(1);
            }
        });
    });
}

/// Registers a cleanup closure under `id`. Re-registering the same id
/// replaces the previous closure.
pub fn add(id: impl Into<String>, cleanup: impl FnMut() + Send + 'static) {
    registry().entries.lock().unwrap().insert(id.into(), Box::new(cleanup));
}

/// Unregisters `id` without running its cleanup. Call this after the
/// caller has already cleaned up the resource itself, so the shutdown
/// hook does not try again. Idempotent: removing an absent id is a no-op.
pub fn remove(id: &str) {
    registry().entries.lock().unwrap().remove(id);
}

/// Runs and removes every still-registered cleanup, in reverse
/// insertion order isn't tracked by a `HashMap`; callers that need
/// reverse-creation-order cleanup (the engine) should call `remove`
/// explicitly as they clean up rather than relying on this for
/// ordering — this exists purely as a last-resort safety net.
fn run_all() {
    let mut entries = registry().entries.lock().unwrap();
    for (id, mut cleanup) in entries.drain() {
        log::info!("running shutdown cleanup for {id:?}");
        cleanup();
    }
}

/// Entry point `main` calls on its own normal-exit path (the
/// Ctrl-C path is handled by the task `install_shutdown_hook` spawns)
/// to run whatever the engine didn't already clean up itself.
pub fn run_shutdown() {
    run_all();
}
