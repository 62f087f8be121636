use crate::runtime::construct::{construct, mount};
use crate::runtime::dom::{DomEvent, DomNode};
use crate::runtime::error::{ExecutionFailure, FailurePhase};
use crate::runtime::ingest::{ingest, AuthoringConvention, ConventionPolicy, Ingestion, ValidatedSource};
use crate::runtime::sandbox::{ConsoleLine, Sandbox, SandboxLimits, ScriptFault};
use std::time::Duration;
use tracing::{debug, info, warn};

pub const PLACEHOLDER_TEXT: &str = "No source code available to render.";

/// What the mount target currently shows.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum HostView {
    /// Nothing mounted yet, or torn down.
    #[default]
    Empty,
    Placeholder,
    Rendered(DomNode),
    Diagnostic(ExecutionFailure),
}

/// Something the operator should see in the system log.
#[derive(Debug, Clone, PartialEq)]
pub enum HostNotice {
    Console(ConsoleLine),
    Failure(ExecutionFailure),
}

/// Owns one mount target and the sandbox of whatever unit is mounted in it.
pub struct PluginHost {
    policy: ConventionPolicy,
    limits: SandboxLimits,
    sandbox: Option<Sandbox>,
    convention: Option<AuthoringConvention>,
    view: HostView,
    notices: Vec<HostNotice>,
}

impl PluginHost {
    pub fn new(policy: ConventionPolicy, limits: SandboxLimits) -> Self {
        Self {
            policy,
            limits,
            sandbox: None,
            convention: None,
            view: HostView::Empty,
            notices: Vec::new(),
        }
    }

    pub fn policy(&self) -> ConventionPolicy {
        self.policy
    }

    pub fn view(&self) -> &HostView {
        &self.view
    }

    /// Mutable access for widgets that keep local edit state, such as text fields.
    pub fn view_mut(&mut self) -> &mut HostView {
        &mut self.view
    }

    pub fn is_live(&self) -> bool {
        self.sandbox.is_some()
    }

    /// Validates, constructs and mounts `source`, replacing whatever was shown before.
    pub fn mount(&mut self, source: Option<&str>) -> &HostView {
        self.teardown();
        match ingest(source, self.policy) {
            Ingestion::Placeholder => {
                debug!("no plugin source, showing placeholder");
                self.view = HostView::Placeholder;
            }
            Ingestion::Rejected(failure) => self.fail(failure),
            Ingestion::Ready(validated) => {
                self.convention = Some(validated.convention);
                match self.start(&validated) {
                    Ok((sandbox, root)) => {
                        info!(
                            convention = %validated.convention,
                            nodes = root.descendant_count(),
                            "plugin mounted"
                        );
                        self.sandbox = Some(sandbox);
                        self.view = HostView::Rendered(root);
                    }
                    Err(failure) => self.fail(failure),
                }
            }
        }
        &self.view
    }

    fn start(&mut self, source: &ValidatedSource) -> Result<(Sandbox, DomNode), ExecutionFailure> {
        let sandbox = Sandbox::new(self.limits)?;
        let mounted = sandbox.with(|ctx| -> Result<(), ExecutionFailure> {
            let unit = construct(&sandbox, &ctx, source)?;
            debug!(convention = %unit.convention(), "unit constructed");
            mount(&sandbox, &ctx, &unit)?;
            Ok(())
        });
        // promise work queued by the mount still belongs to the mount
        let settled = mounted.and_then(|()| {
            sandbox
                .settle()
                .and_then(|()| sandbox.snapshot())
                .map_err(|fault| queued_mount_failure(source.convention, fault))
        });
        let lines = sandbox.drain_console();
        self.record_console(lines);
        settled.map(|root| (sandbox, root))
    }

    /// Drops the sandbox and clears the mount target.
    pub fn teardown(&mut self) {
        if let Some(sandbox) = self.sandbox.take() {
            let lines = sandbox.drain_console();
            self.record_console(lines);
            debug!("plugin sandbox released");
        }
        self.convention = None;
        self.view = HostView::Empty;
    }

    /// Delivers a user interaction to the mounted unit.
    pub fn dispatch(&mut self, event: &DomEvent) {
        let Some(sandbox) = self.sandbox.as_ref() else {
            return;
        };
        let result = sandbox.dispatch(event).and_then(|delivered| {
            if delivered {
                sandbox.snapshot().map(Some)
            } else {
                Ok(None)
            }
        });
        let lines = sandbox.drain_console();
        self.record_console(lines);
        match result {
            Ok(Some(root)) => self.view = HostView::Rendered(root),
            Ok(None) => debug!(node = event.target(), "event target is gone, ignoring"),
            Err(fault) => self.fail(post_mount_failure(fault)),
        }
    }

    /// Runs due timers and returns how long until the next one.
    pub fn tick(&mut self) -> Option<Duration> {
        let sandbox = self.sandbox.as_ref()?;
        let result = sandbox.run_timers().and_then(|fired| {
            if fired > 0 {
                sandbox.snapshot().map(Some)
            } else {
                Ok(None)
            }
        });
        let next = match &result {
            Ok(_) => sandbox.next_timer().ok().flatten(),
            Err(_) => None,
        };
        let lines = sandbox.drain_console();
        self.record_console(lines);
        match result {
            Ok(Some(root)) => self.view = HostView::Rendered(root),
            Ok(None) => {}
            Err(fault) => self.fail(post_mount_failure(fault)),
        }
        next
    }

    pub fn take_notices(&mut self) -> Vec<HostNotice> {
        std::mem::take(&mut self.notices)
    }

    /// Visible text of the mount target.
    pub fn text_content(&self) -> String {
        match &self.view {
            HostView::Empty => String::new(),
            HostView::Placeholder => PLACEHOLDER_TEXT.to_string(),
            HostView::Rendered(root) => root.text_content(),
            HostView::Diagnostic(failure) => format!("{}\n{}", failure.header(), failure.message),
        }
    }

    pub fn failure(&self) -> Option<&ExecutionFailure> {
        match &self.view {
            HostView::Diagnostic(failure) => Some(failure),
            _ => None,
        }
    }

    fn fail(&mut self, failure: ExecutionFailure) {
        warn!(
            phase = %failure.phase,
            convention = self.convention.map(AuthoringConvention::as_str).unwrap_or("unknown"),
            error = %failure.message,
            "plugin failed"
        );
        self.sandbox = None;
        self.notices.push(HostNotice::Failure(failure.clone()));
        self.view = HostView::Diagnostic(failure);
    }

    fn record_console(&mut self, lines: Vec<ConsoleLine>) {
        for line in lines {
            match line.level.as_str() {
                "error" | "warn" => warn!(target: "plugin", "{}", line.text),
                _ => info!(target: "plugin", "{}", line.text),
            }
            self.notices.push(HostNotice::Console(line));
        }
    }
}

impl Default for PluginHost {
    fn default() -> Self {
        Self::new(ConventionPolicy::default(), SandboxLimits::default())
    }
}

fn queued_mount_failure(convention: AuthoringConvention, fault: ScriptFault) -> ExecutionFailure {
    let phase = match convention {
        AuthoringConvention::MountFunction => FailurePhase::Execution,
        AuthoringConvention::DeclaredComponent => FailurePhase::Rendering,
    };
    ExecutionFailure::new(phase, fault.message).with_cause(fault.stack)
}

/// Anything thrown after construction finished, from re-renders, handlers or timers.
fn post_mount_failure(fault: ScriptFault) -> ExecutionFailure {
    ExecutionFailure::new(FailurePhase::Rendering, fault.message).with_cause(fault.stack)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HELLO: &str = "(container) => { container.textContent = 'hello'; }";
    const COUNTER: &str = r#"(container) => {
        let count = 0;
        const button = document.createElement('button');
        const draw = () => { button.textContent = 'count ' + count; };
        button.addEventListener('click', () => { count += 1; draw(); });
        draw();
        container.appendChild(button);
    }"#;

    fn host() -> PluginHost {
        PluginHost::default()
    }

    fn component_host() -> PluginHost {
        PluginHost::new(ConventionPolicy::DeclaredComponent, SandboxLimits::default())
    }

    fn rendered(host: &PluginHost) -> &DomNode {
        match host.view() {
            HostView::Rendered(root) => root,
            other => panic!("expected rendered output, got {other:?}"),
        }
    }

    fn first_button(host: &PluginHost) -> u64 {
        rendered(host)
            .find(&|node| node.tag == "button")
            .map(|node| node.id)
            .expect("button")
    }

    #[test]
    fn absent_or_empty_source_shows_placeholder() {
        let mut host = host();
        for source in [None, Some(""), Some("   \n")] {
            assert_eq!(host.mount(source), &HostView::Placeholder);
            assert_eq!(host.text_content(), PLACEHOLDER_TEXT);
            assert!(host.failure().is_none());
        }
        assert!(host
            .take_notices()
            .iter()
            .all(|notice| !matches!(notice, HostNotice::Failure(_))));
    }

    #[test]
    fn syntax_error_yields_diagnostic_without_partial_output() {
        let mut host = host();
        host.mount(Some("(container) => { container.textContent = 'half"));
        let failure = host.failure().expect("diagnostic");
        assert_eq!(failure.phase, FailurePhase::Evaluation);
        assert_eq!(failure.header(), "Plugin Execution Error");
        assert!(!failure.message.trim().is_empty());
        assert!(!host.is_live());
        assert!(matches!(
            host.take_notices().as_slice(),
            [HostNotice::Failure(_)]
        ));
    }

    #[test]
    fn mount_function_sets_text() {
        let mut host = host();
        host.mount(Some(HELLO));
        assert_eq!(host.text_content(), "hello");
    }

    #[test]
    fn non_callable_source_fails_with_fixed_message() {
        let mut host = host();
        host.mount(Some("42"));
        let failure = host.failure().expect("diagnostic");
        assert_eq!(failure.phase, FailurePhase::Type);
        assert_eq!(failure.message, "Generated code did not evaluate to a function.");
    }

    #[test]
    fn component_without_declaration_reports_missing_name() {
        let mut host = component_host();
        host.mount(Some("function widget() { return null; }"));
        let failure = host.failure().expect("diagnostic");
        assert_eq!(failure.header(), "Plugin Compilation Error");
        assert!(failure.message.contains("Could not find a valid component name"));
    }

    #[test]
    fn component_render_throw_is_caught_by_rendering_boundary() {
        let mut host = component_host();
        host.mount(Some("const Foo = () => { throw new Error('boom'); };"));
        let failure = host.failure().expect("diagnostic");
        assert_eq!(failure.phase, FailurePhase::Rendering);
        assert_eq!(failure.header(), "Plugin Runtime Error");
        assert!(failure.message.contains("boom"));
        assert!(host.text_content().contains("boom"));
    }

    #[test]
    fn remounting_same_source_matches_single_mount() {
        let source = "(c) => { const p = document.createElement('p'); p.textContent = 'once'; c.appendChild(p); }";
        let mut host = host();
        host.mount(Some(source));
        let first = rendered(&host).clone();
        host.mount(Some(source));
        let second = rendered(&host).clone();
        assert_eq!(first, second);
        assert_eq!(second.children.len(), 1);
        assert_eq!(second.text_content(), "once");
    }

    #[test]
    fn second_mount_replaces_first_entirely() {
        let mut host = host();
        host.mount(Some(COUNTER));
        let stale_button = first_button(&host);

        host.mount(Some(HELLO));
        let root = rendered(&host).clone();
        assert_eq!(root.text_content(), "hello");
        assert!(root.find(&|node| !node.events.is_empty()).is_none());

        // events aimed at the discarded unit go nowhere
        host.dispatch(&DomEvent::Click { target: stale_button });
        assert_eq!(rendered(&host), &root);
    }

    #[test]
    fn clicks_reach_listeners_and_refresh_the_view() {
        let mut host = host();
        host.mount(Some(COUNTER));
        assert_eq!(host.text_content(), "count 0");
        let button = first_button(&host);
        host.dispatch(&DomEvent::Click { target: button });
        host.dispatch(&DomEvent::Click { target: button });
        assert_eq!(host.text_content(), "count 2");
    }

    #[test]
    fn handler_throw_becomes_runtime_diagnostic() {
        let mut host = host();
        host.mount(Some(
            "(c) => { const b = document.createElement('button'); b.onclick = () => { throw new Error('handler broke'); }; c.appendChild(b); }",
        ));
        let button = first_button(&host);
        host.dispatch(&DomEvent::Click { target: button });
        let failure = host.failure().expect("diagnostic");
        assert_eq!(failure.header(), "Plugin Runtime Error");
        assert!(failure.message.contains("handler broke"));
        assert!(!host.is_live());
    }

    #[test]
    fn component_state_updates_rerender() {
        let mut host = component_host();
        host.mount(Some(
            "const Clicker = () => { const [n, setN] = useState(0); return React.createElement('button', { onClick: () => setN(n + 1) }, 'clicked ', n); };",
        ));
        let button = first_button(&host);
        host.dispatch(&DomEvent::Click { target: button });
        assert_eq!(host.text_content(), "clicked 1");
    }

    #[test]
    fn rerender_throw_after_mount_is_still_caught() {
        let mut host = component_host();
        host.mount(Some(
            "const Fragile = () => { const [n, setN] = useState(0); if (n > 0) { throw new Error('second render'); } return React.createElement('button', { onClick: () => setN(1) }, 'go'); };",
        ));
        let button = first_button(&host);
        host.dispatch(&DomEvent::Click { target: button });
        let failure = host.failure().expect("diagnostic");
        assert_eq!(failure.phase, FailurePhase::Rendering);
        assert!(failure.message.contains("second render"));
    }

    #[test]
    fn async_mount_rejection_replaces_partial_output() {
        let mut host = host();
        host.mount(Some(
            "async (c) => { c.textContent = 'partial'; throw new Error('async boom'); }",
        ));
        let failure = host.failure().expect("diagnostic");
        assert_eq!(failure.phase, FailurePhase::Execution);
        assert_eq!(failure.message, "Error: async boom");
        assert!(!host.text_content().contains("partial"));
        assert!(!host.is_live());
    }

    #[test]
    fn handled_rejection_during_mount_is_not_a_failure() {
        let mut host = host();
        host.mount(Some(
            "(c) => { Promise.reject(new Error('quiet')).catch(() => { c.textContent = 'recovered'; }); }",
        ));
        assert!(host.failure().is_none());
        assert_eq!(host.text_content(), "recovered");
    }

    #[test]
    fn throw_in_effect_promise_is_caught_by_rendering_boundary() {
        let mut host = component_host();
        host.mount(Some(
            "const Late = () => { useEffect(() => { Promise.resolve().then(() => { throw new Error('late boom'); }); }, []); return React.createElement('p', null, 'ok'); };",
        ));
        let failure = host.failure().expect("diagnostic");
        assert_eq!(failure.phase, FailurePhase::Rendering);
        assert!(failure.message.contains("late boom"));
    }

    #[test]
    fn state_set_in_promise_callback_rerenders() {
        let mut host = component_host();
        host.mount(Some(
            "const Status = () => { const [s, setS] = useState('loading'); useEffect(() => { Promise.resolve().then(() => setS('ready')); }, []); return React.createElement('p', null, s); };",
        ));
        assert!(host.failure().is_none());
        assert_eq!(host.text_content(), "ready");
    }

    #[test]
    fn rejection_from_a_click_becomes_runtime_diagnostic() {
        let mut host = host();
        host.mount(Some(
            "(c) => { const b = document.createElement('button'); b.onclick = () => { Promise.resolve().then(() => { throw new Error('click boom'); }); }; c.appendChild(b); }",
        ));
        assert!(host.failure().is_none());
        let button = first_button(&host);
        host.dispatch(&DomEvent::Click { target: button });
        let failure = host.failure().expect("diagnostic");
        assert_eq!(failure.header(), "Plugin Runtime Error");
        assert!(failure.message.contains("click boom"));
    }

    #[test]
    fn timers_update_output_on_tick() {
        let mut host = host();
        host.mount(Some(
            "(c) => { c.textContent = 'waiting'; setTimeout(() => { c.textContent = 'fired'; }, 0); }",
        ));
        assert_eq!(host.text_content(), "waiting");
        assert_eq!(host.tick(), None);
        assert_eq!(host.text_content(), "fired");
    }

    #[test]
    fn runaway_mount_is_stopped_by_time_budget() {
        let mut host = PluginHost::new(
            ConventionPolicy::MountFunction,
            SandboxLimits {
                time_budget: Duration::from_millis(40),
                ..SandboxLimits::default()
            },
        );
        host.mount(Some("(c) => { while (true) {} }"));
        let failure = host.failure().expect("diagnostic");
        assert_eq!(failure.phase, FailurePhase::Execution);
        assert_eq!(
            failure.message,
            "Plugin exceeded its execution time budget of 40 ms"
        );
    }

    #[test]
    fn console_output_becomes_notices() {
        let mut host = host();
        host.mount(Some("(c) => { console.log('mounted'); }"));
        let notices = host.take_notices();
        assert!(notices.iter().any(|notice| matches!(
            notice,
            HostNotice::Console(line) if line.text == "mounted"
        )));
    }

    #[test]
    fn teardown_clears_view() {
        let mut host = host();
        host.mount(Some(HELLO));
        host.teardown();
        assert_eq!(host.view(), &HostView::Empty);
        assert_eq!(host.text_content(), "");
        assert!(!host.is_live());
    }
}
