//! Text templates: a Go `text/template` subset.
//!
//! Supported actions:
//!
//! | Syntax | Meaning |
//! |--------|---------|
//! | `{{.Name}}` / `{{$.Name}}` | context variable |
//! | `{{.}}` | current element inside `range` |
//! | `{{f a b}}`, `{{a \| f b}}`, `{{(f a)}}` | function calls, pipes, grouping |
//! | `{{if P}}…{{else if P}}…{{else}}…{{end}}` | conditionals |
//! | `{{range P}}…{{else}}…{{end}}` | iteration over lists or `0..N` |
//! | `{{/* … */}}` | comment |
//! | `{{- ` / ` -}}` | trim surrounding whitespace |
//!
//! Callable functions are exactly those in [`functions::FUNCTIONS`].
//! Rendering is pure: the same `(source, context)` always produces the same
//! bytes.

pub mod functions;
mod lexer;
mod parser;
mod render;
mod value;

use std::sync::atomic::AtomicBool;

use thiserror::Error;

pub use functions::{FunctionCategory, FunctionDef, is_allowed};
pub use lexer::{RawAction, raw_actions};
pub use parser::MAX_NESTING;
pub use value::Value;

pub(crate) use lexer::{Token, split_literals, tokenize};

use crate::domain::entities::context::VariableContext;
use crate::domain::security::{ValidationViolation, ViolationKind};
use parser::Node;
use render::Renderer;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum RenderError {
    #[error("{template}:{line}: syntax error: {message}")]
    Syntax {
        template: String,
        line: usize,
        message: String,
    },

    #[error("{template}:{line}: variable '.{name}' is not defined")]
    UndefinedVariable {
        template: String,
        line: usize,
        name: String,
    },

    #[error("{template}:{line}: {message}")]
    Execution {
        template: String,
        line: usize,
        message: String,
    },

    #[error("{template}: rendered output exceeds {limit} bytes")]
    OutputTooLarge { template: String, limit: u64 },

    #[error("{template}: rendering took more than {limit} steps")]
    TooManySteps { template: String, limit: u64 },

    #[error("{template}: rendering was interrupted")]
    Interrupted { template: String },
}

impl RenderError {
    /// Identifier of the template that failed.
    pub fn template(&self) -> &str {
        match self {
            Self::Syntax { template, .. }
            | Self::UndefinedVariable { template, .. }
            | Self::Execution { template, .. }
            | Self::OutputTooLarge { template, .. }
            | Self::TooManySteps { template, .. }
            | Self::Interrupted { template } => template,
        }
    }

    /// Budget overruns are resource findings, reported against `location`.
    /// Any other error is handed back unchanged.
    pub fn into_violation(self, location: &str) -> Result<ValidationViolation, Self> {
        match self {
            Self::OutputTooLarge { limit, .. } => Ok(ValidationViolation::new(
                ViolationKind::SizeLimitExceeded,
                format!("rendered output exceeds the limit of {limit} bytes"),
                location,
            )),
            Self::TooManySteps { limit, .. } => Ok(ValidationViolation::new(
                ViolationKind::CountLimitExceeded,
                format!("rendering needed more than {limit} evaluation steps"),
                location,
            )),
            other => Err(other),
        }
    }
}

/// Evaluation steps one render may take unless told otherwise.
pub const DEFAULT_MAX_STEPS: u64 = 1_000_000;

/// Ceilings for a single render.
#[derive(Debug, Clone, Copy)]
pub struct RenderBudget<'a> {
    /// Output size in bytes.
    pub max_output: usize,
    /// Nodes, pipeline commands and loop iterations, counted together.
    pub max_steps: u64,
    /// Polled while rendering; once set the render stops with
    /// [`RenderError::Interrupted`].
    pub interrupt: Option<&'a AtomicBool>,
}

impl Default for RenderBudget<'_> {
    fn default() -> Self {
        Self {
            max_output: usize::MAX,
            max_steps: DEFAULT_MAX_STEPS,
            interrupt: None,
        }
    }
}

impl<'a> RenderBudget<'a> {
    pub fn output(mut self, max_output: usize) -> Self {
        self.max_output = max_output;
        self
    }

    pub fn steps(mut self, max_steps: u64) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn interrupt(mut self, flag: &'a AtomicBool) -> Self {
        self.interrupt = Some(flag);
        self
    }
}

/// A parsed template, ready to render any number of times.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    id: String,
    nodes: Vec<Node>,
}

impl Template {
    pub fn parse(id: impl Into<String>, source: &str) -> Result<Self, RenderError> {
        let id = id.into();
        let syntax = |line: usize, message: String| RenderError::Syntax {
            template: id.clone(),
            line,
            message,
        };
        let items = lexer::lex(source).map_err(|e| syntax(e.line, e.message))?;
        let nodes = parser::parse(items).map_err(|e| syntax(e.line, e.message))?;
        Ok(Self { id, nodes })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Render with the default budget: unbounded output, [`DEFAULT_MAX_STEPS`].
    pub fn render(&self, ctx: &VariableContext) -> Result<String, RenderError> {
        self.render_with(ctx, RenderBudget::default())
    }

    /// Render, failing as soon as output grows past `limit` bytes.
    pub fn render_limited(&self, ctx: &VariableContext, limit: usize) -> Result<String, RenderError> {
        self.render_with(ctx, RenderBudget::default().output(limit))
    }

    pub fn render_with(&self, ctx: &VariableContext, budget: RenderBudget<'_>) -> Result<String, RenderError> {
        Renderer::new(&self.id, ctx, budget).run(&self.nodes)
    }
}

/// Parse and render in one step.
pub fn render(id: &str, source: &str, ctx: &VariableContext) -> Result<Vec<u8>, RenderError> {
    Ok(Template::parse(id, source)?.render(ctx)?.into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::VariableValue;

    fn ctx() -> VariableContext {
        VariableContext::from_values([
            ("ProjectName", VariableValue::String("order-service".into())),
            ("AuthType", VariableValue::Enum("jwt".into())),
            ("Docker", VariableValue::Bool(false)),
            ("Port", VariableValue::String("8080".into())),
            ("Services", VariableValue::String("users,orders".into())),
        ])
    }

    fn r(src: &str) -> Result<String, RenderError> {
        Template::parse("t", src)?.render(&ctx())
    }

    #[test]
    fn substitutes_variables() {
        assert_eq!(r("module {{.ProjectName}}\n").unwrap(), "module order-service\n");
        assert_eq!(r("{{ $.Port }}").unwrap(), "8080");
    }

    #[test]
    fn pipes_and_functions() {
        assert_eq!(r("{{.ProjectName | pascalCase}}").unwrap(), "OrderService");
        assert_eq!(r(r#"{{printf ":%s" .Port}}"#).unwrap(), ":8080");
        assert_eq!(r(r#"{{ .Missing2 | default "x" }}"#).unwrap_err().template(), "t");
        assert_eq!(r(r#"{{ upper (printf "%s-%s" .AuthType .Port) }}"#).unwrap(), "JWT-8080");
    }

    #[test]
    fn conditionals() {
        let src = r#"{{if eq .AuthType "jwt"}}jwt{{else if .Docker}}docker{{else}}none{{end}}"#;
        assert_eq!(r(src).unwrap(), "jwt");
        assert_eq!(r("{{if .Docker}}yes{{else}}no{{end}}").unwrap(), "no");
        assert_eq!(r("{{if .Unknown}}yes{{else}}no{{end}}").unwrap(), "no");
    }

    #[test]
    fn ranges() {
        let src = r#"{{range split "," .Services}}- {{.}}
{{end}}"#;
        assert_eq!(r(src).unwrap(), "- users\n- orders\n");
        assert_eq!(r(r#"{{range split "," ""}}x{{else}}empty{{end}}"#).unwrap(), "empty");
        assert_eq!(r("{{range 3}}{{.}}{{end}}").unwrap(), "012");
    }

    #[test]
    fn trim_markers() {
        let src = "a\n{{- if .Docker }}\nX\n{{- end }}\nb";
        assert_eq!(r(src).unwrap(), "a\nb");
    }

    #[test]
    fn undefined_variable_in_output_is_an_error() {
        let err = r("line1\n{{.Nope}}").unwrap_err();
        assert_eq!(
            err,
            RenderError::UndefinedVariable {
                template: "t".into(),
                line: 2,
                name: "Nope".into()
            }
        );
    }

    #[test]
    fn syntax_errors_carry_template_id() {
        let err = Template::parse("cmd/main.go.tmpl", "{{if .A}}").unwrap_err();
        assert!(matches!(err, RenderError::Syntax { ref template, .. } if template == "cmd/main.go.tmpl"));
    }

    #[test]
    fn output_limit() {
        let t = Template::parse("big", r#"{{repeat 100 "ab"}}"#).unwrap();
        assert!(matches!(
            t.render_limited(&ctx(), 50),
            Err(RenderError::OutputTooLarge { .. })
        ));
        assert_eq!(t.render_limited(&ctx(), 200).unwrap().len(), 200);
    }

    #[test]
    fn empty_nested_loops_run_out_of_steps() {
        let t = Template::parse(
            "spin",
            "{{range 10000}}{{range 10000}}{{range 10000}}{{end}}{{end}}{{end}}",
        )
        .unwrap();
        let err = t.render(&ctx()).unwrap_err();
        assert_eq!(
            err,
            RenderError::TooManySteps {
                template: "spin".into(),
                limit: DEFAULT_MAX_STEPS
            }
        );
        let v = err.into_violation("spin.txt").unwrap();
        assert_eq!(v.kind, ViolationKind::CountLimitExceeded);
    }

    #[test]
    fn step_budget_is_configurable() {
        let t = Template::parse("t", "{{range 50}}{{.}}{{end}}").unwrap();
        let small = RenderBudget::default().steps(20);
        assert!(matches!(t.render_with(&ctx(), small), Err(RenderError::TooManySteps { .. })));
        assert!(t.render_with(&ctx(), RenderBudget::default().steps(500)).is_ok());
    }

    #[test]
    fn raised_interrupt_stops_a_long_render() {
        let flag = AtomicBool::new(true);
        let t = Template::parse("t", "{{range 10000}}{{range 10000}}{{end}}{{end}}").unwrap();
        let err = t
            .render_with(&ctx(), RenderBudget::default().interrupt(&flag))
            .unwrap_err();
        assert_eq!(err, RenderError::Interrupted { template: "t".into() });
    }

    #[test]
    fn dot_outside_range_fails() {
        assert!(r("{{.}}").is_err());
    }

    #[test]
    fn rendering_is_deterministic() {
        let t = Template::parse("t", "{{range split \",\" .Services}}{{. | upper}};{{end}}").unwrap();
        let c = ctx();
        assert_eq!(t.render(&c).unwrap(), t.render(&c).unwrap());
    }
}
