use std::sync::atomic::{AtomicBool, Ordering};

use tracing::trace;

use super::{RenderBudget, RenderError};
use super::functions;
use super::parser::{Arg, Node, Pipeline};
use super::value::Value;
use crate::domain::entities::context::VariableContext;

/// Upper bound on iterations of a single `{{range N}}`.
const MAX_RANGE_ITEMS: i64 = 10_000;

/// The interrupt flag is read once every this many steps.
const INTERRUPT_POLL: u64 = 1024;

pub(crate) struct Renderer<'a> {
    template: &'a str,
    ctx: &'a VariableContext,
    out: String,
    limit: usize,
    steps: u64,
    max_steps: u64,
    interrupt: Option<&'a AtomicBool>,
}

impl<'a> Renderer<'a> {
    pub(crate) fn new(template: &'a str, ctx: &'a VariableContext, budget: RenderBudget<'a>) -> Self {
        Self {
            template,
            ctx,
            out: String::new(),
            limit: budget.max_output,
            steps: 0,
            max_steps: budget.max_steps,
            interrupt: budget.interrupt,
        }
    }

    pub(crate) fn run(mut self, nodes: &[Node]) -> Result<String, RenderError> {
        self.exec(nodes, None)?;
        trace!(template = self.template, bytes = self.out.len(), "rendered");
        Ok(self.out)
    }

    fn write(&mut self, s: &str) -> Result<(), RenderError> {
        if self.out.len() + s.len() > self.limit {
            return Err(RenderError::OutputTooLarge {
                template: self.template.to_string(),
                limit: self.limit as u64,
            });
        }
        self.out.push_str(s);
        Ok(())
    }

    /// Count one unit of work. Every node, pipeline command and loop
    /// iteration is a step, so empty loop bodies still cost something.
    fn tick(&mut self) -> Result<(), RenderError> {
        self.steps += 1;
        if self.steps > self.max_steps {
            return Err(RenderError::TooManySteps {
                template: self.template.to_string(),
                limit: self.max_steps,
            });
        }
        if self.steps % INTERRUPT_POLL == 0 && self.interrupt.is_some_and(|f| f.load(Ordering::Acquire)) {
            return Err(RenderError::Interrupted {
                template: self.template.to_string(),
            });
        }
        Ok(())
    }

    fn exec(&mut self, nodes: &[Node], dot: Option<&Value>) -> Result<(), RenderError> {
        for node in nodes {
            self.tick()?;
            match node {
                Node::Text(text) => self.write(text)?,
                Node::Output(pipeline) => {
                    let value = self.eval(pipeline, dot, true)?;
                    self.write(&value.text())?;
                }
                Node::If { branches, otherwise } => {
                    let mut taken = false;
                    for (test, body) in branches {
                        if self.eval(test, dot, false)?.is_truthy() {
                            self.exec(body, dot)?;
                            taken = true;
                            break;
                        }
                    }
                    if !taken {
                        self.exec(otherwise, dot)?;
                    }
                }
                Node::Range {
                    pipeline,
                    body,
                    otherwise,
                } => {
                    let items = match self.eval(pipeline, dot, false)? {
                        Value::List(items) => items,
                        Value::Int(n) if (0..=MAX_RANGE_ITEMS).contains(&n) => (0..n).map(Value::Int).collect(),
                        Value::Int(n) => {
                            return Err(self.exec_error(pipeline.line, format!("can't range over {n} items")));
                        }
                        Value::Str(s) if s.is_empty() => Vec::new(),
                        other => {
                            return Err(self.exec_error(
                                pipeline.line,
                                format!("can't range over {}", other.type_name()),
                            ));
                        }
                    };
                    if items.is_empty() {
                        self.exec(otherwise, dot)?;
                    }
                    for item in &items {
                        self.tick()?;
                        self.exec(body, Some(item))?;
                    }
                }
            }
        }
        Ok(())
    }

    fn exec_error(&self, line: usize, message: String) -> RenderError {
        RenderError::Execution {
            template: self.template.to_string(),
            line,
            message,
        }
    }

    /// Evaluate a pipeline. With `strict` unset, unknown variables read as
    /// `""` instead of failing.
    fn eval(&mut self, pipeline: &Pipeline, dot: Option<&Value>, strict: bool) -> Result<Value, RenderError> {
        let mut carried: Option<Value> = None;
        for cmd in &pipeline.commands {
            self.tick()?;
            let value = match cmd.args.first() {
                Some(Arg::Func(name)) => {
                    let mut args = cmd.args[1..]
                        .iter()
                        .map(|a| self.arg(a, dot, strict, pipeline.line))
                        .collect::<Result<Vec<_>, _>>()?;
                    args.extend(carried.take());
                    self.call(name, &args, pipeline.line)?
                }
                Some(arg) => self.arg(arg, dot, strict, pipeline.line)?,
                None => return Err(self.exec_error(pipeline.line, "empty command".into())),
            };
            carried = Some(value);
        }
        carried.ok_or_else(|| self.exec_error(pipeline.line, "empty pipeline".into()))
    }

    fn call(&self, name: &str, args: &[Value], line: usize) -> Result<Value, RenderError> {
        let def = functions::lookup(name)
            .ok_or_else(|| self.exec_error(line, format!("function \"{name}\" not defined")))?;
        def.call(args).map_err(|m| self.exec_error(line, m))
    }

    fn arg(&mut self, arg: &Arg, dot: Option<&Value>, strict: bool, line: usize) -> Result<Value, RenderError> {
        match arg {
            Arg::Func(name) => self.call(name, &[], line),
            Arg::Field(name) => match self.ctx.get(name) {
                Some(v) => Ok(Value::from(v)),
                None if strict => Err(RenderError::UndefinedVariable {
                    template: self.template.to_string(),
                    line,
                    name: name.clone(),
                }),
                None => Ok(Value::Str(String::new())),
            },
            Arg::Dot => dot
                .cloned()
                .ok_or_else(|| self.exec_error(line, "'.' is only defined inside {{range}}".into())),
            Arg::Str(s) => Ok(Value::Str(s.clone())),
            Arg::Int(i) => Ok(Value::Int(*i)),
            Arg::Bool(b) => Ok(Value::Bool(*b)),
            Arg::Sub(p) => self.eval(p, dot, strict),
        }
    }
}
