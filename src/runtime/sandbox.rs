//! One QuickJS runtime per mounted plugin.
//!
//! The sandbox owns:
//! - a memory ceiling and a native stack ceiling
//! - a wall-clock budget per host call, enforced by the interrupt handler
//! - the DOM shim, which is the only host API a plugin can reach
//! - a record of promise rejections that no handler picked up
//!
//! Dropping the sandbox frees every closure, listener and timer the plugin
//! registered.

use crate::runtime::dom::{DomEvent, DomNode};
use crate::runtime::error::ConstructionError;
use rquickjs::function::IntoArgs;
use rquickjs::{CatchResultExt, CaughtError, Context, Ctx, Exception, FromJs, Function, Object, Runtime, Value};
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::debug;

const DOM_SHIM: &str = include_str!("dom_shim.js");
const BRIDGE: &str = "__catalyst";
const MAX_JOBS_PER_CALL: usize = 1024;
const MAX_SETTLE_ROUNDS: usize = 25;
// set on a rejected promise so a handler attached later can clear its entry
const REJECTION_TAG: &str = "__catalystRejection";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SandboxLimits {
    pub memory_limit_bytes: usize,
    pub max_stack_bytes: usize,
    /// Wall-clock budget for a single host call into the sandbox.
    pub time_budget: Duration,
}

impl Default for SandboxLimits {
    fn default() -> Self {
        Self {
            memory_limit_bytes: 32 * 1024 * 1024,
            max_stack_bytes: 512 * 1024,
            time_budget: Duration::from_millis(250),
        }
    }
}

/// A script-level failure with the JS stack when one was available.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptFault {
    pub message: String,
    pub stack: Option<String>,
}

impl ScriptFault {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stack: None,
        }
    }
}

#[derive(Debug, Default)]
struct Rejections {
    next_tag: u32,
    unhandled: Vec<(u32, ScriptFault)>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ConsoleLine {
    pub level: String,
    pub text: String,
}

pub struct Sandbox {
    // declared before `runtime`: the context must drop first
    context: Context,
    runtime: Runtime,
    origin: Instant,
    deadline: Arc<AtomicU64>,
    timed_out: Arc<AtomicBool>,
    rejections: Arc<Mutex<Rejections>>,
    limits: SandboxLimits,
}

impl Sandbox {
    pub fn new(limits: SandboxLimits) -> Result<Self, ConstructionError> {
        let runtime = Runtime::new().map_err(|err| sandbox_setup_error(&err))?;
        runtime.set_memory_limit(limits.memory_limit_bytes);
        runtime.set_max_stack_size(limits.max_stack_bytes);

        let origin = Instant::now();
        let deadline = Arc::new(AtomicU64::new(0));
        let timed_out = Arc::new(AtomicBool::new(false));
        {
            let deadline = Arc::clone(&deadline);
            let timed_out = Arc::clone(&timed_out);
            runtime.set_interrupt_handler(Some(Box::new(move || {
                let due = deadline.load(Ordering::Relaxed);
                if due != 0 && millis_since(origin) >= due {
                    timed_out.store(true, Ordering::Relaxed);
                    return true;
                }
                false
            })));
        }

        let rejections = Arc::new(Mutex::new(Rejections::default()));
        {
            let rejections = Arc::clone(&rejections);
            runtime.set_host_promise_rejection_tracker(Some(Box::new(
                move |ctx, promise, reason, is_handled| {
                    let Ok(mut pending) = rejections.lock() else {
                        return;
                    };
                    let Some(promise) = promise.as_object() else {
                        return;
                    };
                    if is_handled {
                        if let Ok(Some(tag)) = promise.get::<_, Option<u32>>(REJECTION_TAG) {
                            pending.unhandled.retain(|(entry, _)| *entry != tag);
                        }
                    } else {
                        pending.next_tag += 1;
                        let tag = pending.next_tag;
                        let _ = promise.set(REJECTION_TAG, tag);
                        pending.unhandled.push((tag, describe_value(&ctx, reason)));
                    }
                },
            )));
        }

        let context = Context::full(&runtime).map_err(|err| sandbox_setup_error(&err))?;
        let sandbox = Self {
            context,
            runtime,
            origin,
            deadline,
            timed_out,
            rejections,
            limits,
        };

        sandbox
            .with(|ctx| {
                ctx.eval::<(), _>(DOM_SHIM)
                    .catch(&ctx)
                    .map_err(|caught| sandbox.fault(&ctx, caught))
            })
            .map_err(|fault| ConstructionError::Evaluation {
                message: format!("Sandbox host environment failed to load: {}", fault.message),
                cause: fault.stack,
            })?;
        debug!(
            memory_limit = limits.memory_limit_bytes,
            stack_limit = limits.max_stack_bytes,
            "plugin sandbox ready"
        );
        Ok(sandbox)
    }

    /// Runs `f` inside the context with the time budget armed.
    pub fn with<F, R>(&self, f: F) -> R
    where
        F: FnOnce(Ctx<'_>) -> R,
    {
        self.arm();
        let result = self.context.with(f);
        self.disarm();
        result
    }

    /// Runs promise jobs and re-renders the components they updated until the
    /// sandbox is quiet.
    ///
    /// A rejection that is still unhandled once its jobs have run fails the call.
    pub fn settle(&self) -> Result<(), ScriptFault> {
        for _ in 0..MAX_SETTLE_ROUNDS {
            self.drain_jobs()?;
            self.check_rejections()?;
            let rendered: bool = self.call_bridge(BridgeCall::Flush, ())?;
            self.check_rejections()?;
            if !rendered && !self.runtime.is_job_pending() {
                return Ok(());
            }
        }
        debug!(rounds = MAX_SETTLE_ROUNDS, "plugin keeps scheduling work, leaving the rest queued");
        Ok(())
    }

    fn drain_jobs(&self) -> Result<(), ScriptFault> {
        self.arm();
        let mut outcome = Ok(());
        for _ in 0..MAX_JOBS_PER_CALL {
            match self.runtime.execute_pending_job() {
                Ok(true) => continue,
                Ok(false) => break,
                Err(_) => {
                    outcome = Err(self.interrupted_or(ScriptFault::new(
                        "An asynchronous plugin task threw an exception",
                    )));
                    break;
                }
            }
        }
        self.disarm();
        outcome
    }

    fn check_rejections(&self) -> Result<(), ScriptFault> {
        let unhandled = match self.rejections.lock() {
            Ok(mut pending) => std::mem::take(&mut pending.unhandled),
            Err(_) => return Ok(()),
        };
        match unhandled.into_iter().next() {
            Some((_, fault)) => Err(fault),
            None => Ok(()),
        }
    }

    /// Converts a caught JS error, preferring the budget message after an interrupt.
    pub fn fault<'js>(&self, ctx: &Ctx<'js>, caught: CaughtError<'js>) -> ScriptFault {
        self.interrupted_or(describe_caught(ctx, caught))
    }

    fn interrupted_or(&self, fault: ScriptFault) -> ScriptFault {
        if self.timed_out.load(Ordering::Relaxed) {
            ScriptFault::new(format!(
                "Plugin exceeded its execution time budget of {} ms",
                self.limits.time_budget.as_millis()
            ))
        } else {
            fault
        }
    }

    fn arm(&self) {
        self.timed_out.store(false, Ordering::Relaxed);
        let budget = u64::try_from(self.limits.time_budget.as_millis()).unwrap_or(u64::MAX);
        self.deadline.store(
            millis_since(self.origin).saturating_add(budget),
            Ordering::Relaxed,
        );
    }

    fn disarm(&self) {
        self.deadline.store(0, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> Result<DomNode, ScriptFault> {
        let json: String = self.call_bridge(BridgeCall::Snapshot, ())?;
        serde_json::from_str(&json)
            .map_err(|err| ScriptFault::new(format!("Mount target snapshot was unreadable: {err}")))
    }

    /// Returns false when the target node no longer exists.
    pub fn dispatch(&self, event: &DomEvent) -> Result<bool, ScriptFault> {
        let (kind, payload) = event.wire();
        let delivered: bool =
            self.call_bridge(BridgeCall::Dispatch, (event.target() as f64, kind, payload))?;
        self.settle()?;
        Ok(delivered)
    }

    /// Fires every due timer and returns how many ran.
    pub fn run_timers(&self) -> Result<u32, ScriptFault> {
        let fired: u32 = self.call_bridge(BridgeCall::RunTimers, ())?;
        self.settle()?;
        Ok(fired)
    }

    pub fn next_timer(&self) -> Result<Option<Duration>, ScriptFault> {
        let millis: f64 = self.call_bridge(BridgeCall::MillisUntilNextTimer, ())?;
        Ok((millis >= 0.0).then(|| Duration::from_millis(millis as u64)))
    }

    pub fn drain_console(&self) -> Vec<ConsoleLine> {
        let json: String = match self.call_bridge(BridgeCall::DrainConsole, ()) {
            Ok(json) => json,
            Err(fault) => {
                debug!(error = %fault.message, "could not drain plugin console");
                return Vec::new();
            }
        };
        serde_json::from_str::<Vec<(String, String)>>(&json)
            .map(|lines| {
                lines
                    .into_iter()
                    .map(|(level, text)| ConsoleLine { level, text })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn call_bridge<A, R>(&self, call: BridgeCall, args: A) -> Result<R, ScriptFault>
    where
        A: for<'js> IntoArgs<'js>,
        R: for<'js> FromJs<'js>,
    {
        self.with(|ctx| {
            let bridge: Object = ctx
                .globals()
                .get(BRIDGE)
                .catch(&ctx)
                .map_err(|caught| self.fault(&ctx, caught))?;
            let function: Function = bridge
                .get(call.name())
                .catch(&ctx)
                .map_err(|caught| self.fault(&ctx, caught))?;
            function
                .call(args)
                .catch(&ctx)
                .map_err(|caught| self.fault(&ctx, caught))
        })
    }
}

#[derive(Debug, Clone, Copy)]
enum BridgeCall {
    Snapshot,
    Dispatch,
    RunTimers,
    MillisUntilNextTimer,
    DrainConsole,
    Flush,
}

impl BridgeCall {
    fn name(self) -> &'static str {
        match self {
            Self::Snapshot => "snapshot",
            Self::Dispatch => "dispatch",
            Self::RunTimers => "runTimers",
            Self::MillisUntilNextTimer => "millisUntilNextTimer",
            Self::DrainConsole => "drainConsole",
            Self::Flush => "flush",
        }
    }
}

fn millis_since(origin: Instant) -> u64 {
    // offset by one so that zero stays free as the "disarmed" marker
    u64::try_from(origin.elapsed().as_millis())
        .unwrap_or(u64::MAX)
        .saturating_add(1)
}

fn sandbox_setup_error(err: &rquickjs::Error) -> ConstructionError {
    ConstructionError::Evaluation {
        message: format!("Could not create the plugin sandbox: {err}"),
        cause: None,
    }
}

fn describe_caught<'js>(ctx: &Ctx<'js>, caught: CaughtError<'js>) -> ScriptFault {
    match caught {
        CaughtError::Exception(exception) => describe_exception(&exception),
        CaughtError::Value(value) => describe_value(ctx, value),
        CaughtError::Error(error) => ScriptFault::new(error.to_string()),
    }
}

fn describe_exception(exception: &Exception<'_>) -> ScriptFault {
    let name: Option<String> = exception.as_object().get("name").ok().flatten();
    let message = exception.message().unwrap_or_default();
    let message = match name {
        Some(name) if !name.is_empty() && !message.starts_with(&name) => {
            if message.is_empty() {
                name
            } else {
                format!("{name}: {message}")
            }
        }
        _ => message,
    };
    ScriptFault {
        message,
        stack: exception.stack().filter(|stack| !stack.trim().is_empty()),
    }
}

/// Describes a thrown or rejected value that may not be an `Error`.
fn describe_value<'js>(ctx: &Ctx<'js>, value: Value<'js>) -> ScriptFault {
    if let Some(exception) = value.as_exception() {
        return describe_exception(exception);
    }
    let rendered = value
        .as_string()
        .and_then(|text| text.to_string().ok())
        .or_else(|| {
            ctx.json_stringify(value.clone())
                .ok()
                .flatten()
                .and_then(|text| text.to_string().ok())
        })
        .unwrap_or_else(|| value.type_name().to_string());
    ScriptFault::new(format!("Uncaught {rendered}"))
}
