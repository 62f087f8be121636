use crate::runtime::error::{ConstructionError, FailurePhase, RenderingError};
use crate::runtime::ingest::{AuthoringConvention, ValidatedSource};
use crate::runtime::sandbox::{Sandbox, ScriptFault};
use rquickjs::{CatchResultExt, Ctx, Function, Object, Value};

const NOT_A_FUNCTION: &str = "Generated code did not evaluate to a function.";

/// A constructed plugin, alive only inside the sandbox call that built it.
pub enum RenderableUnit<'js> {
    /// Invoked once with the mount target.
    MountFunction(Function<'js>),
    /// Zero-argument renderable handed to the sandbox's component renderer.
    Component { name: String, render: Function<'js> },
}

impl RenderableUnit<'_> {
    pub fn convention(&self) -> AuthoringConvention {
        match self {
            Self::MountFunction(_) => AuthoringConvention::MountFunction,
            Self::Component { .. } => AuthoringConvention::DeclaredComponent,
        }
    }
}

pub fn construct<'js>(
    sandbox: &Sandbox,
    ctx: &Ctx<'js>,
    source: &ValidatedSource,
) -> Result<RenderableUnit<'js>, ConstructionError> {
    match (source.convention, source.component_name.as_deref()) {
        (AuthoringConvention::MountFunction, _) => {
            let value = evaluate(sandbox, ctx, &source.text)?;
            value
                .into_function()
                .map(RenderableUnit::MountFunction)
                .ok_or_else(|| ConstructionError::type_mismatch(NOT_A_FUNCTION))
        }
        (AuthoringConvention::DeclaredComponent, Some(name)) => {
            construct_component(sandbox, ctx, &source.text, name)
        }
        (AuthoringConvention::DeclaredComponent, None) => Err(ConstructionError::validation(
            "Could not find a valid component name",
        )),
    }
}

fn construct_component<'js>(
    sandbox: &Sandbox,
    ctx: &Ctx<'js>,
    text: &str,
    name: &str,
) -> Result<RenderableUnit<'js>, ConstructionError> {
    let factory = evaluate(sandbox, ctx, &component_factory(text, name))?
        .into_function()
        .ok_or_else(|| ConstructionError::type_mismatch(NOT_A_FUNCTION))?;
    let react: Value = ctx
        .globals()
        .get("React")
        .catch(ctx)
        .map_err(|caught| evaluation_error(sandbox.fault(ctx, caught)))?;
    let produced: Value = factory
        .call((react,))
        .catch(ctx)
        .map_err(|caught| evaluation_error(sandbox.fault(ctx, caught)))?;
    let type_name = produced.type_name();
    let render = produced.into_function().ok_or_else(|| {
        ConstructionError::type_mismatch(format!(
            "Component `{name}` did not evaluate to a renderable function (found {type_name})."
        ))
    })?;
    Ok(RenderableUnit::Component {
        name: name.to_string(),
        render,
    })
}

pub fn mount<'js>(
    sandbox: &Sandbox,
    ctx: &Ctx<'js>,
    unit: &RenderableUnit<'js>,
) -> Result<(), RenderingError> {
    let bridge: Object = ctx
        .globals()
        .get("__catalyst")
        .catch(ctx)
        .map_err(|caught| rendering_error(FailurePhase::Execution, sandbox.fault(ctx, caught)))?;

    match unit {
        RenderableUnit::MountFunction(function) => {
            let container: Value = bridge.get("container").catch(ctx).map_err(|caught| {
                rendering_error(FailurePhase::Execution, sandbox.fault(ctx, caught))
            })?;
            function
                .call::<_, ()>((container,))
                .catch(ctx)
                .map_err(|caught| rendering_error(FailurePhase::Execution, sandbox.fault(ctx, caught)))
        }
        // every later re-render runs through the same bridge and is caught by the host
        RenderableUnit::Component { render, .. } => {
            let mount_component: Function = bridge.get("mountComponent").catch(ctx).map_err(
                |caught| rendering_error(FailurePhase::Rendering, sandbox.fault(ctx, caught)),
            )?;
            mount_component
                .call::<_, ()>((render.clone(),))
                .catch(ctx)
                .map_err(|caught| rendering_error(FailurePhase::Rendering, sandbox.fault(ctx, caught)))
        }
    }
}

fn evaluate<'js>(
    sandbox: &Sandbox,
    ctx: &Ctx<'js>,
    text: &str,
) -> Result<Value<'js>, ConstructionError> {
    ctx.eval::<Value, _>(text)
        .catch(ctx)
        .map_err(|caught| evaluation_error(sandbox.fault(ctx, caught)))
}

/// Wraps component source so it runs with the hooks in scope and yields the named binding.
fn component_factory(text: &str, name: &str) -> String {
    let body = strip_module_syntax(text);
    format!(
        "(function (React) {{\n\
         const {{ useState, useEffect, useRef, useMemo, useCallback, useReducer, createElement, Fragment }} = React;\n\
         {{\n{body}\n;return {name};\n}}\n\
         }})"
    )
}

fn strip_module_syntax(text: &str) -> String {
    text.lines()
        .filter_map(|line| {
            let trimmed = line.trim_start();
            if trimmed.starts_with("import ") || trimmed.starts_with("export default ") {
                None
            } else if let Some(rest) = trimmed.strip_prefix("export ") {
                Some(rest.to_string())
            } else {
                Some(line.to_string())
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn evaluation_error(fault: ScriptFault) -> ConstructionError {
    ConstructionError::Evaluation {
        message: fault.message,
        cause: fault.stack,
    }
}

fn rendering_error(phase: FailurePhase, fault: ScriptFault) -> RenderingError {
    RenderingError {
        phase,
        message: fault.message,
        cause: fault.stack,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::ingest::{ingest, ConventionPolicy, Ingestion};
    use crate::runtime::sandbox::SandboxLimits;

    fn validated(text: &str, policy: ConventionPolicy) -> ValidatedSource {
        match ingest(Some(text), policy) {
            Ingestion::Ready(source) => source,
            other => panic!("expected ready source, got {other:?}"),
        }
    }

    #[test]
    fn mount_function_populates_container() {
        let sandbox = Sandbox::new(SandboxLimits::default()).expect("sandbox");
        let source = validated(
            "(container) => { container.textContent = 'hello'; }",
            ConventionPolicy::MountFunction,
        );
        sandbox
            .with(|ctx| {
                let unit = construct(&sandbox, &ctx, &source).map_err(|err| err.to_string())?;
                assert_eq!(unit.convention(), AuthoringConvention::MountFunction);
                mount(&sandbox, &ctx, &unit).map_err(|err| err.to_string())
            })
            .expect("mount");
        assert_eq!(sandbox.snapshot().expect("snapshot").text_content(), "hello");
    }

    #[test]
    fn non_function_value_is_a_type_error() {
        let sandbox = Sandbox::new(SandboxLimits::default()).expect("sandbox");
        let source = validated("42", ConventionPolicy::MountFunction);
        let error = sandbox
            .with(|ctx| construct(&sandbox, &ctx, &source).map(|_| ()))
            .expect_err("42 is not callable");
        assert_eq!(error, ConstructionError::type_mismatch(NOT_A_FUNCTION));
    }

    #[test]
    fn syntax_errors_are_evaluation_failures() {
        let sandbox = Sandbox::new(SandboxLimits::default()).expect("sandbox");
        let source = validated("(container) => { container.", ConventionPolicy::MountFunction);
        let error = sandbox
            .with(|ctx| construct(&sandbox, &ctx, &source).map(|_| ()))
            .expect_err("syntax error");
        assert_eq!(error.phase(), FailurePhase::Evaluation);
        assert!(!error.to_string().is_empty());
    }

    #[test]
    fn component_factory_strips_module_syntax() {
        let factory = component_factory(
            "import React from 'react';\nexport const Badge = () => null;\nexport default Badge;",
            "Badge",
        );
        assert!(!factory.contains("import"));
        assert!(!factory.contains("export"));
        assert!(factory.contains("const Badge = () => null;"));
        assert!(factory.contains("return Badge;"));
    }

    #[test]
    fn declared_component_renders_through_react_entry_point() {
        let sandbox = Sandbox::new(SandboxLimits::default()).expect("sandbox");
        let source = validated(
            "const Greeting = () => { const [name] = useState('world'); return React.createElement('p', null, 'hi ', name); };",
            ConventionPolicy::DeclaredComponent,
        );
        sandbox
            .with(|ctx| {
                let unit = construct(&sandbox, &ctx, &source).map_err(|err| err.to_string())?;
                mount(&sandbox, &ctx, &unit).map_err(|err| err.to_string())
            })
            .expect("mount");
        let root = sandbox.snapshot().expect("snapshot");
        assert_eq!(root.text_content(), "hi world");
        assert_eq!(root.children[0].tag, "p");
    }

    #[test]
    fn component_bound_to_non_function_is_rejected() {
        let sandbox = Sandbox::new(SandboxLimits::default()).expect("sandbox");
        let source = validated("const Widget = 7;", ConventionPolicy::DeclaredComponent);
        let error = sandbox
            .with(|ctx| construct(&sandbox, &ctx, &source).map(|_| ()))
            .expect_err("not renderable");
        assert_eq!(error.phase(), FailurePhase::Type);
        assert!(error.to_string().contains("Widget"));
    }
}
