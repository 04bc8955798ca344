//! Orchestration of one deployment script run.
//!
//! A [`ScriptSession`] exchanges a typed input record and a typed output record with a script:
//!
//! 1. allocate an input and an output address,
//! 2. expose the input record read-only at the input address,
//! 3. expose a zeroed output record writable at the output address,
//! 4. load the script,
//! 5. register labels,
//! 6. run the script with both addresses,
//! 7. harvest and validate the output record.
//!
//! Every installed resource is torn down before [`ScriptSession::run`] returns, on success and on
//! failure alike. Deployment labels the script never consumed are dropped with them.

use std::{cell::RefCell, rc::Rc};

use tracing::{debug, warn};

use crate::{
    binding::{install_record_precompile, PrecompileMode},
    host::ScriptHost,
    script::load_script,
    teardown::{Teardown, TeardownAction, TeardownStack},
    CodecError, Record, ScriptError, ScriptRecord,
};

/// A label to register before the script runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelRequest {
    /// The label.
    pub label: String,
    /// The source unit declaring the symbol.
    pub source_unit: String,
    /// The contract symbol whose deployment gets the label.
    pub symbol: String,
}

/// Which script to run and which labels to register for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deployment {
    source_unit: String,
    entry: String,
    labels: Vec<LabelRequest>,
}

impl Deployment {
    /// Creates a deployment of `entry` from `source_unit`.
    pub fn new(source_unit: impl Into<String>, entry: impl Into<String>) -> Self {
        Self { source_unit: source_unit.into(), entry: entry.into(), labels: Vec::new() }
    }

    /// Adds a label for the deployment of `symbol` from `source_unit`.
    pub fn with_label(
        mut self,
        label: impl Into<String>,
        source_unit: impl Into<String>,
        symbol: impl Into<String>,
    ) -> Self {
        self.labels.push(LabelRequest {
            label: label.into(),
            source_unit: source_unit.into(),
            symbol: symbol.into(),
        });
        self
    }

    /// The source unit of the script.
    pub fn source_unit(&self) -> &str {
        &self.source_unit
    }

    /// The script entry.
    pub fn entry(&self) -> &str {
        &self.entry
    }

    /// The label requests, in registration order.
    pub fn labels(&self) -> &[LabelRequest] {
        &self.labels
    }
}

/// Checks run on the input before anything is installed and on the harvested output.
pub trait Validator<I, O> {
    /// Rejects inputs that must not reach the script.
    fn check_input(&self, _input: &I) -> Result<(), CodecError> {
        Ok(())
    }

    /// Rejects outputs the script should not have produced.
    fn check_output(&self, _input: &I, _output: &O) -> Result<(), String> {
        Ok(())
    }
}

/// A [`Validator`] that accepts everything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AcceptAll;

impl<I, O> Validator<I, O> for AcceptAll {}

/// The step of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display)]
pub enum SessionStep {
    /// Allocating the input and output addresses.
    #[display("allocate addresses")]
    AllocateAddresses,
    /// Checking the input and installing its precompile.
    #[display("install input precompile")]
    InstallInputPrecompile,
    /// Installing the output precompile.
    #[display("install output precompile")]
    InstallOutputPrecompile,
    /// Resolving and loading the script.
    #[display("load script")]
    LoadScript,
    /// Registering labels.
    #[display("register labels")]
    RegisterLabels,
    /// Running the script.
    #[display("run script")]
    RunScript,
    /// Converting the output record into the host type.
    #[display("harvest output")]
    HarvestOutput,
    /// Validating the harvested output.
    #[display("validate output")]
    ValidateOutput,
    /// Tearing down installed resources.
    #[display("teardown")]
    Teardown,
}

/// A failed session.
///
/// `source` is the error that stopped the session. Teardown failures that happened while
/// cleaning up are attached in `teardown_failures`.
#[derive(Debug, thiserror::Error)]
#[error("{step} failed: {source}")]
pub struct SessionError {
    /// The step that failed.
    pub step: SessionStep,
    /// The error that stopped the session.
    pub source: ScriptError,
    /// Failures of teardowns run after `source`.
    pub teardown_failures: Vec<ScriptError>,
}

impl SessionError {
    /// Creates an error without teardown failures.
    pub const fn new(step: SessionStep, source: ScriptError) -> Self {
        Self { step, source, teardown_failures: Vec::new() }
    }

    /// The step that failed.
    pub const fn step(&self) -> SessionStep {
        self.step
    }

    /// The error that stopped the session.
    pub const fn error(&self) -> &ScriptError {
        &self.source
    }

    /// Consumes the error and returns the error that stopped the session.
    pub fn into_error(self) -> ScriptError {
        self.source
    }
}

/// Runs deployment scripts on a host.
///
/// The session borrows the host mutably for its whole lifetime. Every run uses fresh addresses
/// and leaves no precompile, script or binding behind.
#[derive(Debug)]
pub struct ScriptSession<'h, H: ScriptHost + ?Sized> {
    host: &'h mut H,
    teardowns: TeardownStack,
}

impl<'h, H: ScriptHost + ?Sized> ScriptSession<'h, H> {
    /// Creates a session on `host`.
    pub fn new(host: &'h mut H) -> Self {
        Self { host, teardowns: TeardownStack::new() }
    }

    /// The host of the session.
    pub fn host(&mut self) -> &mut H {
        &mut *self.host
    }

    /// Runs `deployment` with `input` and returns the harvested output.
    pub fn run<I, O>(&mut self, input: &I, deployment: &Deployment) -> Result<O, SessionError>
    where
        I: ScriptRecord,
        O: ScriptRecord,
    {
        self.run_validated(input, deployment, &AcceptAll)
    }

    /// Same as [`ScriptSession::run`], checking input and output with `validator`.
    pub fn run_validated<I, O, V>(
        &mut self,
        input: &I,
        deployment: &Deployment,
        validator: &V,
    ) -> Result<O, SessionError>
    where
        I: ScriptRecord,
        O: ScriptRecord,
        V: Validator<I, O> + ?Sized,
    {
        let result = self.execute(input, deployment, validator);
        let failures = self.teardowns.unwind(&mut *self.host);

        match result {
            Ok(output) => {
                let mut failures = failures.into_iter();
                match failures.next() {
                    None => {
                        debug!(target: "script_host::session", script = deployment.entry(), "session completed");
                        Ok(output)
                    }
                    Some(source) => Err(SessionError {
                        step: SessionStep::Teardown,
                        source,
                        teardown_failures: failures.collect(),
                    }),
                }
            }
            Err((step, source)) => {
                warn!(target: "script_host::session", %step, err = %source, "session failed");
                Err(SessionError { step, source, teardown_failures: failures })
            }
        }
    }

    fn execute<I, O, V>(
        &mut self,
        input: &I,
        deployment: &Deployment,
        validator: &V,
    ) -> Result<O, (SessionStep, ScriptError)>
    where
        I: ScriptRecord,
        O: ScriptRecord,
        V: Validator<I, O> + ?Sized,
    {
        let at = |step: SessionStep| move |err: ScriptError| (step, err);

        let step = SessionStep::AllocateAddresses;
        let input_address = self.host.new_script_address();
        let output_address = self.host.new_script_address();
        if input_address == output_address {
            return Err((step, ScriptError::AddressCollision { address: input_address }));
        }
        debug!(target: "script_host::session", %step, input = %input_address, output = %output_address);

        let step = SessionStep::InstallInputPrecompile;
        validator
            .check_input(input)
            .map_err(|err| (step, ScriptError::MalformedInputRecord(err)))?;
        let input_record = Rc::new(RefCell::new(input.to_record()));
        let teardown = install_record_precompile(
            &mut *self.host,
            input_address,
            input_record,
            PrecompileMode::DecodeOnly,
        )
        .map_err(at(step))?;
        self.teardowns.push(teardown);

        let step = SessionStep::InstallOutputPrecompile;
        let output_record = Rc::new(RefCell::new(Record::zero(O::layout())));
        let teardown = install_record_precompile(
            &mut *self.host,
            output_address,
            output_record.clone(),
            PrecompileMode::DecodeAndApply,
        )
        .map_err(at(step))?;
        self.teardowns.push(teardown);

        let step = SessionStep::LoadScript;
        let (script, teardown) =
            load_script(&mut *self.host, deployment.source_unit(), deployment.entry())
                .map_err(at(step))?;
        self.teardowns.push(teardown);

        let step = SessionStep::RegisterLabels;
        self.host.label_address(input_address, I::layout().name());
        self.host.label_address(output_address, O::layout().name());
        for request in deployment.labels() {
            self.host
                .remember_on_label(&request.label, &request.source_unit, &request.symbol)
                .map_err(at(step))?;
            self.teardowns.push(Teardown::new(
                format!("forget label {}", request.label),
                TeardownAction::ForgetLabel {
                    label: request.label.clone(),
                    source_unit: request.source_unit.clone(),
                    symbol: request.symbol.clone(),
                },
            ));
            debug!(target: "script_host::session", %step, label = %request.label, symbol = %request.symbol);
        }

        let step = SessionStep::RunScript;
        debug!(target: "script_host::session", %step, script = %script.name());
        script.run(&mut *self.host, input_address, output_address).map_err(at(step))?;

        let step = SessionStep::HarvestOutput;
        let record = output_record
            .try_borrow()
            .map_err(|err| (step, ScriptError::Host(err.to_string())))?
            .clone();
        let output =
            O::from_record(record).map_err(|err| (step, ScriptError::MalformedOutputRecord(err)))?;

        let step = SessionStep::ValidateOutput;
        validator
            .check_output(input, &output)
            .map_err(|reason| (step, ScriptError::OutputValidation(reason)))?;

        Ok(output)
    }
}
