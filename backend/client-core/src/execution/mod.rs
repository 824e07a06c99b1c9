//! Job lifecycle: `Idle` and `Executing`, one job at a time.

mod command_line;
mod layout;

pub use command_line::render_command_line;
pub use layout::{LayoutMetrics, OutputLayout};

use crate::error::validation::ValidationError;
use crate::protocol::{ExecutionStarted, ExecutionStopped, JobDescriptor, Rejection};
use crate::session::effect::{Effect, ExecutionMode};

use common::ErrorLocation;

use std::time::Duration;

use log::{debug, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct ActiveJob {
    pub module_name: String,
    /// Set once the server has confirmed the start.
    pub confirmed: bool,
    pub command_line: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum ExecutionState {
    #[default]
    Idle,
    Executing(ActiveJob),
}

pub struct ExecutionMachine {
    state: ExecutionState,
    layout: OutputLayout,
    settle_delay: Duration,
    metrics: Option<LayoutMetrics>,
    debug: bool,
}

impl ExecutionMachine {
    pub fn new(layout: OutputLayout, settle_delay: Duration) -> Self {
        Self {
            state: ExecutionState::Idle,
            layout,
            settle_delay,
            metrics: None,
            debug: false,
        }
    }

    pub fn set_debug(&mut self, debug: bool) {
        self.debug = debug;
    }

    pub fn state(&self) -> &ExecutionState {
        &self.state
    }

    pub fn is_executing(&self) -> bool {
        matches!(self.state, ExecutionState::Executing(_))
    }

    /// Rejects a start while another job is active.
    pub fn ensure_idle(&self) -> Result<(), ValidationError> {
        match &self.state {
            ExecutionState::Idle => Ok(()),
            ExecutionState::Executing(job) => Err(ValidationError::AlreadyExecuting {
                message: format!("{} is still running", job.module_name),
                location: ErrorLocation::here(),
            }),
        }
    }

    /// `Idle --start--> Executing`. The caller has already sent the start command.
    pub fn request_start(&mut self, job: &JobDescriptor) -> Result<Vec<Effect>, ValidationError> {
        self.ensure_idle()?;

        info!("Starting {}", job.module_name);
        let mut effects = vec![Effect::Status(format!("Starting {}...", job.module_name))];
        effects.extend(self.enter_executing(ActiveJob {
            module_name: job.module_name.clone(),
            confirmed: false,
            command_line: None,
        }));
        Ok(effects)
    }

    /// Whether a stop should be sent. Idle stops are dropped unless forced.
    pub fn request_stop(&mut self, force: bool) -> bool {
        if !self.is_executing() && !force {
            debug!("Stop requested while idle, ignoring");
            return false;
        }
        true
    }

    pub fn on_started(&mut self, event: &ExecutionStarted) -> Vec<Effect> {
        let command_line = render_command_line(&event.module_name, &event.args);
        let mut effects = Vec::new();

        match &mut self.state {
            ExecutionState::Executing(job) => {
                job.confirmed = true;
                job.module_name = event.module_name.clone();
                job.command_line = Some(command_line.clone());
            }
            ExecutionState::Idle => {
                // Started by another client, or our own start after a reconnect.
                effects.extend(self.enter_executing(ActiveJob {
                    module_name: event.module_name.clone(),
                    confirmed: true,
                    command_line: Some(command_line.clone()),
                }));
            }
        }

        let initiator = event.initiating_client_id.as_deref().unwrap_or("unknown");
        info!("Execution started: {command_line} (triggered by {initiator})");

        effects.push(Effect::Status(format!("Executing: {command_line}")));
        effects.push(Effect::system(format!(
            "EXECUTION STARTED: {} {} (triggered by {initiator})",
            event.module_name.to_uppercase(),
            serde_json::Value::Object(event.args.clone()),
        )));
        effects
    }

    pub fn on_stopped(&mut self, event: &ExecutionStopped) -> Vec<Effect> {
        info!("Execution stopped");
        let mut effects = self.enter_idle();
        effects.push(Effect::system("EXECUTION STOPPED"));
        if self.debug {
            let client = event.stopping_client_id.as_deref().unwrap_or("unknown");
            effects.push(Effect::system(format!("Client: {client}")));
        }
        effects
    }

    pub fn on_error(&mut self, rejection: &Rejection) -> Vec<Effect> {
        warn!(
            "Execution error: {} - {}",
            rejection.error, rejection.message
        );
        let mut effects = self.enter_idle();
        effects.push(Effect::Error(format!(
            "EXECUTION ERROR: {}: {}",
            rejection.error, rejection.message
        )));
        effects
    }

    pub fn on_resize(&mut self, metrics: LayoutMetrics) -> Vec<Effect> {
        self.metrics = Some(metrics);
        if self.is_executing() {
            self.layout_settled()
        } else {
            Vec::new()
        }
    }

    /// The settle delay after entering `Executing` has passed.
    pub fn layout_settled(&self) -> Vec<Effect> {
        if !self.is_executing() {
            return Vec::new();
        }

        let Some(metrics) = self.metrics else {
            return Vec::new();
        };

        let height = self.layout.compute(&metrics);
        let mut effects = vec![Effect::OutputHeight(height)];
        if self.debug {
            effects.push(Effect::system(format!(
                "VH:{} H:{} S:{} C:{} P:{} -> {height}px",
                metrics.viewport_height,
                metrics.header_height,
                metrics.status_height,
                metrics.control_height,
                metrics.container_padding,
            )));
        }
        effects
    }

    fn enter_executing(&mut self, job: ActiveJob) -> Vec<Effect> {
        self.state = ExecutionState::Executing(job);
        vec![
            Effect::Mode(ExecutionMode::Executing),
            Effect::ScrollToTop,
            Effect::ScheduleLayout(self.settle_delay),
        ]
    }

    fn enter_idle(&mut self) -> Vec<Effect> {
        let was_executing = self.is_executing();
        self.state = ExecutionState::Idle;

        let mut effects = Vec::new();
        if was_executing {
            effects.push(Effect::Mode(ExecutionMode::Idle));
            effects.push(Effect::ResetOutputHeight);
        }
        effects.push(Effect::Status("Idle".to_string()));
        effects
    }
}
