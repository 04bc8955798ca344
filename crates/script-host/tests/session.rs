//! Tests for running deployment scripts through a session.

use alloy_dyn_abi::{DynSolType, DynSolValue};
use alloy_primitives::{address, Address, Bytes, U256};
use revm::precompile::PrecompileOutput;
use rstest::rstest;
use script_host::{
    memory::{decode_run_args, Revert, ScriptContext},
    test_utils::{init_tracing, HostEvent, HostOp, RecordingHost},
    CodecError, Deployment, DynPrecompile, FieldType, MemoryHost, PrecompileInput, RecordPatch,
    ScriptError, ScriptHost, ScriptRecord, ScriptSession, SessionStep, Validator,
};

script_host::script_record! {
    #[derive(Debug, Clone, Default, PartialEq, Eq)]
    pub struct Input as "Input" {
        pub delay: U256 => "delay",
        pub owner: Address => "owner",
        pub use_interop: bool => "useInterop",
    }
}

script_host::script_record! {
    #[derive(Debug, Clone, Default, PartialEq, Eq)]
    pub struct Output as "Output" {
        pub doubled: U256 => "doubled",
        pub thing: Address => "thing",
        pub note: String => "note",
    }
}

const OWNER: Address = address!("0x00000000000000000000000000000000000000aa");

/// Reads `delay`, writes `doubled`, deploys `Thing` and writes its address.
fn deploy_script(ctx: &mut ScriptContext<'_>, calldata: &[u8]) -> Result<Bytes, Revert> {
    let (input, output) = decode_run_args(calldata)?;
    let DynSolValue::Uint(delay, _) = ctx.get(input, "delay", &FieldType::Uint(256))? else {
        return Err(Revert::new("delay is not a uint"));
    };
    ctx.set(output, "doubled", &FieldType::Uint(256), DynSolValue::Uint(delay * U256::from(2), 256))?;
    let thing = ctx.deploy("Thing.sol", "Thing")?;
    ctx.set(output, "thing", &FieldType::Address, DynSolValue::Address(thing))?;
    Ok(Bytes::new())
}

fn host() -> MemoryHost {
    init_tracing();
    let mut host = MemoryHost::default();
    let artifacts = host.artifacts_mut();
    artifacts.add_contract("Thing.sol", "Thing");
    artifacts.add_script("Deploy.s.sol", "Deploy", deploy_script);
    artifacts.add_script_fn("Deploy.s.sol", "WriteInput", |ctx, calldata| {
        let (input, _) = decode_run_args(calldata)?;
        ctx.set(input, "delay", &FieldType::Uint(256), DynSolValue::Uint(U256::from(1), 256))?;
        Ok(Bytes::new())
    });
    artifacts.add_script_fn("Deploy.s.sol", "Setters", |ctx, calldata| {
        let (_, output) = decode_run_args(calldata)?;
        ctx.set(output, "doubled", &FieldType::Uint(256), DynSolValue::Uint(U256::from(7), 256))?;
        ctx.set(output, "note", &FieldType::String, DynSolValue::String("done".into()))?;
        Ok(Bytes::new())
    });
    artifacts.add_script_fn("Deploy.s.sol", "Patch", |ctx, calldata| {
        let (_, output) = decode_run_args(calldata)?;
        let patch = RecordPatch::new(Output::layout())
            .with("doubled", DynSolValue::Uint(U256::from(7), 256))?
            .with("note", DynSolValue::String("done".into()))?;
        ctx.write(output, &patch)?;
        Ok(Bytes::new())
    });
    artifacts.add_script_fn("Deploy.s.sol", "Revert", |_, _| Err(Revert::new("boom")));
    artifacts.add_script_with_params(
        "Deploy.s.sol",
        "ThreeArgs",
        vec![DynSolType::Address, DynSolType::Address, DynSolType::Uint(256)],
        deploy_script,
    );
    host
}

fn deployment(entry: &str) -> Deployment {
    Deployment::new("Deploy.s.sol", entry).with_label("ThingImpl", "Thing.sol", "Thing")
}

fn input() -> Input {
    Input { delay: U256::from(604_800), owner: OWNER, use_interop: false }
}

/// The addresses handed out for the input and output records, in order.
fn record_addresses(events: &[HostEvent]) -> (Address, Address) {
    let mut addresses = events.iter().filter_map(|event| match event {
        HostEvent::NewAddress(address) => Some(*address),
        _ => None,
    });
    (addresses.next().unwrap(), addresses.next().unwrap())
}

/// The cleanup calls observed after the session started tearing down.
fn teardown_events(events: &[HostEvent]) -> Vec<String> {
    let (input, output) = record_addresses(events);
    events
        .iter()
        .filter_map(|event| match event {
            HostEvent::RemovePrecompile(address, _) if *address == input => {
                Some("remove input".to_string())
            }
            HostEvent::RemovePrecompile(address, _) if *address == output => {
                Some("remove output".to_string())
            }
            HostEvent::UnloadScript(_) => Some("unload script".to_string()),
            _ => None,
        })
        .collect()
}

#[test]
fn test_run_harvests_output() {
    let mut host = host();
    let output: Output = ScriptSession::new(&mut host).run(&input(), &deployment("Deploy")).unwrap();

    assert_eq!(output.doubled, U256::from(1_209_600));
    assert_eq!(host.labels().name_of(&output.thing), Some("ThingImpl"));
    // Never written by the script.
    assert_eq!(output.note, "");

    assert!(host.precompiles().is_empty());
    assert_eq!(host.loaded_scripts(), 0);

    let trace = host.render_trace();
    assert!(trace.contains("Input ["), "{trace}");
    assert!(trace.contains("Output ["), "{trace}");
}

#[test]
fn test_partial_writes_accumulate() {
    let mut host = host();
    let mut session = ScriptSession::new(&mut host);
    let setters: Output = session.run(&input(), &deployment("Setters")).unwrap();
    let patch: Output = session.run(&input(), &deployment("Patch")).unwrap();

    assert_eq!(setters, patch);
    assert_eq!(setters.doubled, U256::from(7));
    assert_eq!(setters.note, "done");
    assert_eq!(setters.thing, Address::ZERO);
}

#[test]
fn test_sessions_are_isolated() {
    let mut host = RecordingHost::new(host());

    let first: Output = ScriptSession::new(&mut host).run(&input(), &deployment("Deploy")).unwrap();
    let first_addresses = record_addresses(&host.take_events());
    assert!(host.precompiles().is_empty());

    let second: Output = ScriptSession::new(&mut host).run(&input(), &deployment("Deploy")).unwrap();
    let second_addresses = record_addresses(host.events());

    assert_ne!(first_addresses.0, second_addresses.0);
    assert_ne!(first_addresses.1, second_addresses.1);
    assert_ne!(first.thing, second.thing);
    assert_eq!(first.doubled, second.doubled);
    assert!(!host.has_precompile(&first_addresses.0));
    assert!(!host.has_precompile(&second_addresses.1));
}

#[test]
fn test_input_is_read_only() {
    let mut host = host();
    let err = ScriptSession::new(&mut host)
        .run::<Input, Output>(&input(), &deployment("WriteInput"))
        .unwrap_err();

    assert_eq!(err.step, SessionStep::RunScript);
    assert!(
        matches!(&err.source, ScriptError::ScriptExecutionFailed { reason, .. } if reason.contains("read-only")),
        "{err}"
    );
    assert!(err.teardown_failures.is_empty());
    assert!(host.precompiles().is_empty());
}

/// A failing step tears down everything installed before it, most recent first, and stops the
/// session.
#[rstest]
#[case::install(HostOp::InstallPrecompile, SessionStep::InstallInputPrecompile, &[])]
#[case::load(HostOp::LoadScript, SessionStep::LoadScript, &["remove output", "remove input"])]
#[case::label(
    HostOp::RememberOnLabel,
    SessionStep::RegisterLabels,
    &["unload script", "remove output", "remove input"]
)]
#[case::call(
    HostOp::CallScript,
    SessionStep::RunScript,
    &["unload script", "remove output", "remove input"]
)]
fn test_teardown_on_failure(
    #[case] op: HostOp,
    #[case] step: SessionStep,
    #[case] expected: &[&str],
) {
    let mut host = RecordingHost::new(host()).fail_on(op);
    let err = ScriptSession::new(&mut host)
        .run::<Input, Output>(&input(), &deployment("Deploy"))
        .unwrap_err();

    assert_eq!(err.step, step);
    assert!(matches!(err.source, ScriptError::Host(_)));
    assert_eq!(teardown_events(host.events()), expected);
    assert!(host.precompiles().is_empty());
    assert_eq!(host.loaded_scripts(), 0);
    if step != SessionStep::RunScript {
        assert!(!host.events().iter().any(|event| matches!(event, HostEvent::CallScript(_))));
    }
}

#[test]
fn test_unknown_label_symbol_aborts() {
    let mut host = RecordingHost::new(host());
    let deployment = deployment("Deploy").with_label("Missing", "Thing.sol", "Nope");
    let err = ScriptSession::new(&mut host).run::<Input, Output>(&input(), &deployment).unwrap_err();

    assert_eq!(err.step, SessionStep::RegisterLabels);
    assert!(matches!(err.source, ScriptError::UnresolvedLabelSymbol { .. }));
    assert!(!host.events().iter().any(|event| matches!(event, HostEvent::CallScript(_))));
    // The label registered before the failing one is dropped too.
    assert_eq!(host.labels().pending_for("Thing.sol", "Thing"), None);
}

#[test]
fn test_unused_label_does_not_leak() {
    let mut host = RecordingHost::new(host());
    let _: Output = ScriptSession::new(&mut host).run(&input(), &deployment("Setters")).unwrap();

    assert!(host.events().contains(&HostEvent::ForgetLabel {
        label: "ThingImpl".to_string(),
        source_unit: "Thing.sol".to_string(),
        symbol: "Thing".to_string(),
    }));
    assert_eq!(host.labels().pending_for("Thing.sol", "Thing"), None);

    let unlabelled = Deployment::new("Deploy.s.sol", "Deploy");
    let output: Output = ScriptSession::new(&mut host).run(&input(), &unlabelled).unwrap();
    assert_ne!(output.thing, Address::ZERO);
    assert_eq!(host.labels().name_of(&output.thing), None);
}

#[test]
fn test_unknown_script() {
    let mut host = host();
    let err = ScriptSession::new(&mut host)
        .run::<Input, Output>(&input(), &Deployment::new("Deploy.s.sol", "Missing"))
        .unwrap_err();
    assert_eq!(err.step, SessionStep::LoadScript);
    assert!(matches!(err.source, ScriptError::UnresolvedScript { .. }));
    assert!(host.precompiles().is_empty());
}

#[test]
fn test_collision_leaves_existing_binding() {
    let mut host = RecordingHost::new(host());
    let taken = Address::with_last_byte(0x42);
    let existing = host
        .install_precompile(
            taken,
            DynPrecompile::new(|_: PrecompileInput<'_>| Ok(PrecompileOutput::new(0, Bytes::new()))),
        )
        .unwrap();
    host.force_next_address(taken);

    let err = ScriptSession::new(&mut host)
        .run::<Input, Output>(&input(), &deployment("Deploy"))
        .unwrap_err();

    assert_eq!(err.step, SessionStep::InstallInputPrecompile);
    assert!(matches!(err.source, ScriptError::AddressCollision { address } if address == taken));
    assert_eq!(host.precompiles().binding(&taken), Some(existing));
    assert_eq!(host.precompiles().len(), 1);
}

#[test]
fn test_output_collision_removes_input_only() {
    let mut host = RecordingHost::new(host());
    let taken = Address::with_last_byte(0x42);
    let existing = host
        .install_precompile(
            taken,
            DynPrecompile::new(|_: PrecompileInput<'_>| Ok(PrecompileOutput::new(0, Bytes::new()))),
        )
        .unwrap();
    host.force_next_address(Address::with_last_byte(0x41));
    host.force_next_address(taken);

    let err = ScriptSession::new(&mut host)
        .run::<Input, Output>(&input(), &deployment("Deploy"))
        .unwrap_err();

    assert_eq!(err.step, SessionStep::InstallOutputPrecompile);
    assert!(matches!(err.source, ScriptError::AddressCollision { address } if address == taken));
    assert!(err.teardown_failures.is_empty());
    assert_eq!(teardown_events(host.events()), ["remove input"]);
    assert!(!host.has_precompile(&Address::with_last_byte(0x41)));
    assert_eq!(host.precompiles().binding(&taken), Some(existing));
    assert!(!host.events().iter().any(|event| matches!(event, HostEvent::LoadScript { .. })));
}

#[test]
fn test_same_address_twice_is_a_collision() {
    let mut host = RecordingHost::new(host());
    let address = Address::with_last_byte(0x42);
    host.force_next_address(address);
    host.force_next_address(address);

    let err = ScriptSession::new(&mut host)
        .run::<Input, Output>(&input(), &deployment("Deploy"))
        .unwrap_err();
    assert_eq!(err.step, SessionStep::AllocateAddresses);
    assert!(!host.events().iter().any(|event| matches!(event, HostEvent::InstallPrecompile(_))));
}

#[test]
fn test_teardown_failures_are_attached() {
    let mut host = RecordingHost::new(host()).fail_on(HostOp::RemovePrecompile);
    let err = ScriptSession::new(&mut host)
        .run::<Input, Output>(&input(), &deployment("Revert"))
        .unwrap_err();

    assert_eq!(err.step, SessionStep::RunScript);
    assert!(
        matches!(&err.source, ScriptError::ScriptExecutionFailed { reason, .. } if reason == "boom")
    );
    assert_eq!(err.teardown_failures.len(), 2);
    assert!(err
        .teardown_failures
        .iter()
        .all(|failure| matches!(failure, ScriptError::TeardownFailure { .. })));
    // The script was still unloaded.
    assert_eq!(host.loaded_scripts(), 0);
}

#[test]
fn test_teardown_failure_after_success() {
    let mut host = RecordingHost::new(host()).fail_on(HostOp::UnloadScript);
    let err = ScriptSession::new(&mut host)
        .run::<Input, Output>(&input(), &deployment("Deploy"))
        .unwrap_err();

    assert_eq!(err.step, SessionStep::Teardown);
    assert!(matches!(err.source, ScriptError::TeardownFailure { .. }));
    assert!(err.teardown_failures.is_empty());
    assert!(host.precompiles().is_empty());
}

#[test]
fn test_wrong_arity() {
    let mut host = host();
    let err = ScriptSession::new(&mut host)
        .run::<Input, Output>(&input(), &deployment("ThreeArgs"))
        .unwrap_err();
    assert_eq!(err.step, SessionStep::RunScript);
    assert!(matches!(err.source, ScriptError::WrongArity { expected: 3, actual: 2, .. }));
}

struct RequireOwnerAndNote;

impl Validator<Input, Output> for RequireOwnerAndNote {
    fn check_input(&self, input: &Input) -> Result<(), CodecError> {
        if input.owner.is_zero() {
            return Err(CodecError::InvalidValue {
                field: "owner".to_string(),
                reason: "must be set".to_string(),
            });
        }
        Ok(())
    }

    fn check_output(&self, _input: &Input, output: &Output) -> Result<(), String> {
        if output.note.is_empty() {
            return Err("note was not written".to_string());
        }
        Ok(())
    }
}

#[test]
fn test_input_validation_runs_before_install() {
    let mut host = RecordingHost::new(host());
    let input = Input { owner: Address::ZERO, ..input() };
    let err = ScriptSession::new(&mut host)
        .run_validated::<_, Output, _>(&input, &deployment("Deploy"), &RequireOwnerAndNote)
        .unwrap_err();

    assert_eq!(err.step, SessionStep::InstallInputPrecompile);
    assert!(matches!(err.source, ScriptError::MalformedInputRecord(CodecError::InvalidValue { .. })));
    assert!(!host.events().iter().any(|event| matches!(event, HostEvent::InstallPrecompile(_))));
}

#[test]
fn test_output_validation() {
    let mut host = host();
    let mut session = ScriptSession::new(&mut host);

    let err = session
        .run_validated::<_, Output, _>(&input(), &deployment("Deploy"), &RequireOwnerAndNote)
        .unwrap_err();
    assert_eq!(err.step, SessionStep::ValidateOutput);
    assert!(matches!(err.source, ScriptError::OutputValidation(_)));

    let output: Output = session
        .run_validated(&input(), &deployment("Setters"), &RequireOwnerAndNote)
        .unwrap();
    assert_eq!(output.note, "done");
}
