//! Deployment of the implementation contracts managed by the OP contracts manager.
//!
//! The deployment itself is done by the `DeployImplementations` script. This module hands it a
//! [`DeployImplementationsInput`] and collects the addresses it reports in a
//! [`DeployImplementationsOutput`].

use alloy_primitives::{Address, U256};
use script_host::{
    script_record, AcceptAll, CodecError, Deployment, ScriptHost, ScriptSession, ScriptVariant,
    SessionError, Validator,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::release::check_release;

/// Source unit of the deployment script.
pub const SCRIPT_SOURCE_UNIT: &str = "DeployImplementations.s.sol";
/// Entry of the deployment script, before the variant suffix.
pub const SCRIPT_ENTRY: &str = "DeployImplementations";
/// Contract symbol of the OP contracts manager.
pub const OPCM_CONTRACT: &str = "OPContractsManager";
/// Label of the OP contracts manager deployment.
pub const OPCM_LABEL: &str = "OPContractsManager";
/// Contract symbol of the system config, before the variant suffix.
pub const SYSTEM_CONFIG_CONTRACT: &str = "SystemConfig";
/// Label of the system config implementation deployment.
pub const SYSTEM_CONFIG_LABEL: &str = "SystemConfigImpl";

script_record! {
    /// Parameters of the implementations deployment.
    #[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase", default)]
    pub struct DeployImplementationsInput as "DeployImplementationsInput" {
        /// Delay before a withdrawal from the delayed WETH can be finalized.
        pub withdrawal_delay_seconds: U256 => "withdrawalDelaySeconds",
        /// Minimum size of a preimage proposal.
        pub min_proposal_size_bytes: U256 => "minProposalSizeBytes",
        /// Challenge period of the preimage oracle.
        pub challenge_period_seconds: U256 => "challengePeriodSeconds",
        /// Delay between a proven withdrawal and its finalization.
        pub proof_maturity_delay_seconds: U256 => "proofMaturityDelaySeconds",
        /// Delay before a resolved dispute game is final.
        pub dispute_game_finality_delay_seconds: U256 => "disputeGameFinalityDelaySeconds",
        /// Version of the MIPS VM to deploy.
        pub mips_version: U256 => "mipsVersion",
        /// Release to set the implementations for, `op-contracts/vX.Y.Z` or `dev`.
        pub l1_contracts_release: String => "l1ContractsRelease",
        /// Proxy of the superchain config.
        pub superchain_config_proxy: Address => "superchainConfigProxy",
        /// Proxy of the protocol versions contract.
        pub protocol_versions_proxy: Address => "protocolVersionsProxy",
        /// Proxy admin of the superchain contracts.
        pub superchain_proxy_admin: Address => "superchainProxyAdmin",
        /// Address allowed to upgrade through the contracts manager.
        pub upgrade_controller: Address => "upgradeController",
        /// Deploy the interop flavour of the implementations.
        pub use_interop: bool => "useInterop",
    }
}

script_record! {
    /// Addresses of the deployed implementations.
    #[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase", default)]
    pub struct DeployImplementationsOutput as "DeployImplementationsOutput" {
        /// The OP contracts manager.
        pub opcm: Address => "opcm",
        /// Container holding the blueprints and implementations used by the manager.
        pub opcm_contracts_container: Address => "opcmContractsContainer",
        /// Manager component adding dispute game types.
        pub opcm_game_type_adder: Address => "opcmGameTypeAdder",
        /// Manager component deploying new chains.
        pub opcm_deployer: Address => "opcmDeployer",
        /// Manager component upgrading existing chains.
        pub opcm_upgrader: Address => "opcmUpgrader",
        /// Delayed WETH implementation.
        #[serde(rename = "delayedWETHImpl")]
        pub delayed_weth_impl: Address => "delayedWETHImpl",
        /// Optimism portal implementation.
        pub optimism_portal_impl: Address => "optimismPortalImpl",
        /// Preimage oracle shared by every chain.
        pub preimage_oracle_singleton: Address => "preimageOracleSingleton",
        /// MIPS VM shared by every chain.
        pub mips_singleton: Address => "mipsSingleton",
        /// System config implementation.
        pub system_config_impl: Address => "systemConfigImpl",
        /// L1 cross domain messenger implementation.
        pub l1_cross_domain_messenger_impl: Address => "l1CrossDomainMessengerImpl",
        /// L1 ERC721 bridge implementation.
        #[serde(rename = "l1ERC721BridgeImpl")]
        pub l1_erc721_bridge_impl: Address => "l1ERC721BridgeImpl",
        /// L1 standard bridge implementation.
        pub l1_standard_bridge_impl: Address => "l1StandardBridgeImpl",
        /// Optimism mintable ERC20 factory implementation.
        #[serde(rename = "optimismMintableERC20FactoryImpl")]
        pub optimism_mintable_erc20_factory_impl: Address => "optimismMintableERC20FactoryImpl",
        /// Dispute game factory implementation.
        pub dispute_game_factory_impl: Address => "disputeGameFactoryImpl",
        /// Anchor state registry implementation.
        pub anchor_state_registry_impl: Address => "anchorStateRegistryImpl",
        /// Superchain config implementation.
        pub superchain_config_impl: Address => "superchainConfigImpl",
        /// Protocol versions implementation.
        pub protocol_versions_impl: Address => "protocolVersionsImpl",
    }
}

impl DeployImplementationsInput {
    /// The script variant selected by [`Self::use_interop`].
    pub const fn variant(&self) -> ScriptVariant {
        ScriptVariant::from_flag(self.use_interop)
    }
}

/// The script and labels of the implementations deployment for `variant`.
///
/// The script entry and the system config label always use the same variant.
pub fn deployment(variant: ScriptVariant) -> Deployment {
    let system_config = variant.apply(SYSTEM_CONFIG_CONTRACT);
    Deployment::new(SCRIPT_SOURCE_UNIT, variant.apply(SCRIPT_ENTRY))
        .with_label(OPCM_LABEL, format!("{OPCM_CONTRACT}.sol"), OPCM_CONTRACT)
        .with_label(SYSTEM_CONFIG_LABEL, format!("{system_config}.sol"), system_config)
}

/// Rejects inputs with a malformed contracts release. Opt in through
/// [`deploy_implementations_with`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReleaseCheck;

impl Validator<DeployImplementationsInput, DeployImplementationsOutput> for ReleaseCheck {
    fn check_input(&self, input: &DeployImplementationsInput) -> Result<(), CodecError> {
        check_release("l1ContractsRelease", &input.l1_contracts_release)
    }
}

/// Deploys the implementations by running the `DeployImplementations` script on `host`.
///
/// The input is handed to the script as is. Use [`deploy_implementations_with`] and
/// [`ReleaseCheck`] to reject malformed releases first.
pub fn deploy_implementations<H: ScriptHost + ?Sized>(
    host: &mut H,
    input: &DeployImplementationsInput,
) -> Result<DeployImplementationsOutput, SessionError> {
    deploy_implementations_with(host, input, &AcceptAll)
}

/// Same as [`deploy_implementations`], checking input and output with `validator`.
pub fn deploy_implementations_with<H, V>(
    host: &mut H,
    input: &DeployImplementationsInput,
    validator: &V,
) -> Result<DeployImplementationsOutput, SessionError>
where
    H: ScriptHost + ?Sized,
    V: Validator<DeployImplementationsInput, DeployImplementationsOutput> + ?Sized,
{
    let variant = input.variant();
    let deployment = deployment(variant);
    debug!(target: "opcm_deployer", %variant, entry = deployment.entry(), release = %input.l1_contracts_release, "deploying implementations");
    ScriptSession::new(host).run_validated(input, &deployment, validator)
}
