//! Test support utilities shared across unit and integration tests.
//!
//! [`ScriptedRunner`] replays canned command outputs, and [`FakeCloud`] is an
//! in-memory stand-in for both the EC2 API and the stack provisioner so the
//! lifecycle can be exercised without a network.

use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::net::IpAddr;
use std::rc::Rc;

use camino::{Utf8Path, Utf8PathBuf};

use crate::guard::{Confirmer, GuardError};
use crate::instance::{Ec2Api, Instance, InstanceError, InstanceState, Reservation, ServiceTag};
use crate::process::{CommandOutput, CommandRunner, CommandSpec, ProcessError};
use crate::provision::{ProvisionError, Provisioner, StackParameters, StackReport, StackStatus};

/// Scripted command runner that returns pre-seeded outputs in FIFO order.
///
/// Used to drive deterministic command outcomes without spawning processes.
#[derive(Clone, Debug, Default)]
pub struct ScriptedRunner {
    responses: Rc<RefCell<VecDeque<CommandOutput>>>,
    invocations: Rc<RefCell<Vec<CommandInvocation>>>,
}

/// Records a single invocation made through [`ScriptedRunner`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommandInvocation {
    /// Program name as passed to the runner.
    pub program: String,
    /// Arguments passed to the program.
    pub args: Vec<String>,
}

impl CommandInvocation {
    /// Returns a shell-like command string for assertions.
    #[must_use]
    pub fn command_string(&self) -> String {
        let mut parts = Vec::with_capacity(self.args.len() + 1);
        parts.push(self.program.clone());
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

impl ScriptedRunner {
    /// Creates a new runner with no queued responses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of all invocations recorded so far.
    #[must_use]
    pub fn invocations(&self) -> Vec<CommandInvocation> {
        self.invocations.borrow().clone()
    }

    /// Pushes a successful exit status.
    pub fn push_success(&self) {
        self.push_output(Some(0), "", "");
    }

    /// Pushes a failing exit code with stderr text.
    pub fn push_failure(&self, code: i32) {
        self.push_output(Some(code), "", "simulated failure");
    }

    /// Pushes an explicit command output response.
    pub fn push_output(
        &self,
        code: Option<i32>,
        stdout: impl Into<String>,
        stderr: impl Into<String>,
    ) {
        self.responses.borrow_mut().push_back(CommandOutput {
            code,
            stdout: stdout.into(),
            stderr: stderr.into(),
        });
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, command: &CommandSpec) -> Result<CommandOutput, ProcessError> {
        self.invocations.borrow_mut().push(CommandInvocation {
            program: command.program().to_owned(),
            args: command.args().to_vec(),
        });
        self.responses
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| ProcessError::Spawn {
                program: command.program().to_owned(),
                message: String::from("no scripted response available"),
            })
    }
}

/// Confirmer that always gives the same answer.
#[derive(Clone, Copy, Debug)]
pub struct FixedConfirmer(pub bool);

impl Confirmer for FixedConfirmer {
    fn confirm(&self, _prompt: &str) -> Result<bool, GuardError> {
        Ok(self.0)
    }
}

/// Observable calls made against a [`FakeCloud`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum CloudCall {
    /// `create` on the provisioner.
    CreateStack,
    /// `update` on the provisioner.
    UpdateStack,
    /// `delete` on the provisioner.
    DeleteStack,
    /// Start request for the given instance.
    Start(String),
    /// Stop request for the given instance.
    Stop(String),
    /// Termination protection write.
    SetProtection(String, bool),
    /// Key pair deletion.
    DeleteKeyPair(String),
    /// Key pair import from the given public key file.
    ImportKeyPair(String, Utf8PathBuf),
}

#[derive(Debug, Default)]
struct CloudState {
    reservations: Vec<Reservation>,
    protection: BTreeMap<String, bool>,
    calls: Vec<CloudCall>,
    describe_calls: usize,
    stack_failure: Option<String>,
    create_pending_polls: usize,
    transition_polls: usize,
    pending_transition: Option<(usize, InstanceState)>,
    next_id: usize,
}

/// In-memory EC2 + stack provisioner double.
///
/// Created stacks materialise one tagged instance that stays `pending` for a
/// configurable number of describe calls before turning `running`. Start and
/// stop move through `pending`/`stopping` before settling.
#[derive(Clone, Debug, Default)]
pub struct FakeCloud {
    state: Rc<RefCell<CloudState>>,
    public_ip: Option<IpAddr>,
}

impl FakeCloud {
    /// Creates an empty cloud whose instances expose `public_ip` while running.
    #[must_use]
    pub fn new(public_ip: IpAddr) -> Self {
        Self {
            state: Rc::default(),
            public_ip: Some(public_ip),
        }
    }

    /// Number of describe calls a freshly created instance stays `pending`.
    #[must_use]
    pub fn with_boot_polls(self, polls: usize) -> Self {
        self.state.borrow_mut().create_pending_polls = polls;
        self
    }

    /// Number of describe calls a start or stop stays in its transitional state.
    #[must_use]
    pub fn with_transition_polls(self, polls: usize) -> Self {
        self.state.borrow_mut().transition_polls = polls;
        self
    }

    /// Makes every stack operation report `status` instead of completing.
    pub fn fail_stacks_with(&self, status: &str) {
        self.state.borrow_mut().stack_failure = Some(status.to_owned());
    }

    /// Adds a reservation holding one instance in `state`.
    pub fn seed_instance(&self, id: &str, state: InstanceState) {
        let public_ip = self.ip_for(&state);
        self.state.borrow_mut().reservations.push(Reservation {
            instances: vec![Instance {
                id: id.to_owned(),
                state,
                public_ip,
            }],
        });
    }

    /// Adds a raw reservation, for shapes the lifecycle never creates itself.
    pub fn seed_reservation(&self, reservation: Reservation) {
        self.state.borrow_mut().reservations.push(reservation);
    }

    /// Calls recorded so far, excluding describe calls.
    #[must_use]
    pub fn calls(&self) -> Vec<CloudCall> {
        self.state.borrow().calls.clone()
    }

    /// Number of describe calls served so far.
    #[must_use]
    pub fn describe_calls(&self) -> usize {
        self.state.borrow().describe_calls
    }

    fn ip_for(&self, state: &InstanceState) -> Option<IpAddr> {
        if *state == InstanceState::Running {
            self.public_ip
        } else {
            None
        }
    }

    fn set_state(&self, state: InstanceState) {
        let public_ip = self.ip_for(&state);
        let mut guard = self.state.borrow_mut();
        for instance in guard
            .reservations
            .iter_mut()
            .flat_map(|reservation| reservation.instances.iter_mut())
            .filter(|instance| instance.state != InstanceState::Terminated)
        {
            instance.state = state.clone();
            instance.public_ip = public_ip;
        }
    }

    fn schedule(&self, transitional: InstanceState, target: InstanceState, polls: usize) {
        if polls == 0 {
            self.set_state(target);
            return;
        }
        self.set_state(transitional);
        self.state.borrow_mut().pending_transition = Some((polls, target));
    }

    fn advance(&self) {
        let next = {
            let mut guard = self.state.borrow_mut();
            guard.describe_calls += 1;
            match guard.pending_transition.take() {
                Some((remaining, target)) if remaining <= 1 => Some(target),
                Some((remaining, target)) => {
                    guard.pending_transition = Some((remaining - 1, target));
                    None
                }
                None => None,
            }
        };
        if let Some(target) = next {
            self.set_state(target);
        }
    }

    fn record(&self, call: CloudCall) {
        self.state.borrow_mut().calls.push(call);
    }

    fn report(&self, parameters: &StackParameters) -> StackReport {
        let status = self
            .state
            .borrow()
            .stack_failure
            .clone()
            .map_or(StackStatus::Complete, StackStatus::Other);
        StackReport::single(parameters.stack_name(), status)
    }

    fn failing(&self) -> bool {
        self.state.borrow().stack_failure.is_some()
    }
}

impl Ec2Api for FakeCloud {
    fn describe_tagged_instances(
        &self,
        _tag: &ServiceTag,
    ) -> Result<Vec<Reservation>, InstanceError> {
        self.advance();
        Ok(self.state.borrow().reservations.clone())
    }

    fn start_instance(&self, instance_id: &str) -> Result<(), InstanceError> {
        self.record(CloudCall::Start(instance_id.to_owned()));
        let polls = self.state.borrow().transition_polls;
        self.schedule(InstanceState::Pending, InstanceState::Running, polls);
        Ok(())
    }

    fn stop_instance(&self, instance_id: &str) -> Result<(), InstanceError> {
        self.record(CloudCall::Stop(instance_id.to_owned()));
        let polls = self.state.borrow().transition_polls;
        self.schedule(InstanceState::Stopping, InstanceState::Stopped, polls);
        Ok(())
    }

    fn set_termination_protection(
        &self,
        instance_id: &str,
        enabled: bool,
    ) -> Result<(), InstanceError> {
        self.record(CloudCall::SetProtection(instance_id.to_owned(), enabled));
        self.state
            .borrow_mut()
            .protection
            .insert(instance_id.to_owned(), enabled);
        Ok(())
    }

    fn termination_protection(&self, instance_id: &str) -> Result<bool, InstanceError> {
        Ok(self
            .state
            .borrow()
            .protection
            .get(instance_id)
            .copied()
            .unwrap_or(false))
    }

    fn delete_key_pair(&self, name: &str) -> Result<(), InstanceError> {
        self.record(CloudCall::DeleteKeyPair(name.to_owned()));
        Ok(())
    }

    fn import_key_pair(&self, name: &str, public_key: &Utf8Path) -> Result<(), InstanceError> {
        self.record(CloudCall::ImportKeyPair(
            name.to_owned(),
            public_key.to_path_buf(),
        ));
        Ok(())
    }
}

impl Provisioner for FakeCloud {
    fn create(&self, parameters: &StackParameters) -> Result<StackReport, ProvisionError> {
        self.record(CloudCall::CreateStack);
        if !self.failing() {
            let id = {
                let mut guard = self.state.borrow_mut();
                guard.next_id += 1;
                format!("i-{:08}", guard.next_id)
            };
            self.seed_instance(&id, InstanceState::Pending);
            let polls = self.state.borrow().create_pending_polls;
            self.schedule(InstanceState::Pending, InstanceState::Running, polls);
        }
        Ok(self.report(parameters))
    }

    fn update(&self, parameters: &StackParameters) -> Result<StackReport, ProvisionError> {
        self.record(CloudCall::UpdateStack);
        Ok(self.report(parameters))
    }

    fn delete(&self, parameters: &StackParameters) -> Result<StackReport, ProvisionError> {
        self.record(CloudCall::DeleteStack);
        if !self.failing() {
            self.set_state(InstanceState::Terminated);
        }
        Ok(self.report(parameters))
    }
}
