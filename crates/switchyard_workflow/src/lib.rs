//! SWITCHYARD Workflow
//!
//! Runs named workflow templates, which are DAGs of phases, against a task
//! definition. Each phase routes one task per role through the task router
//! and hands it to a host supplied worker executor. Quality gates and the
//! failure policy decide what happens next.
//!
//! The [`Orchestrator`] ties the router, the backend manager and the
//! coordinator to a single [`OrchestratorConfig`].

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod coordinator;
pub mod error;
pub mod gate;
pub mod graph;
pub mod hooks;
pub mod instance;
pub mod orchestrator;
pub mod template;
pub mod worker;

pub use config::{OrchestratorConfig, builtin_workers};
pub use coordinator::{CoordinatorConfig, WorkflowCoordinator};
pub use error::WorkflowError;
pub use gate::{
    CheckRegistry, CheckResult, CheckSpec, CheckVerdict, QualityCheck, QualityGateResult,
    evaluate_gate,
};
pub use graph::PhaseGraph;
pub use hooks::{DEFAULT_HOOK_TIMEOUT, HOOK_CAPABILITY, HookDispatcher, HookEvent, HookKind, HookSink};
pub use instance::{
    PhaseResult, RoleResult, WorkflowInstance, WorkflowOptions, WorkflowResult, WorkflowStatus,
    WorkflowSummary,
};
pub use orchestrator::{Orchestrator, TaskReport};
pub use template::{PhaseSpec, TemplateLibrary, WorkflowTemplate};
pub use worker::{ChannelWorker, WorkerContext, WorkerError, WorkerExecutor, WorkerOutput};
