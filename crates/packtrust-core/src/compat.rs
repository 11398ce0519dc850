use crate::reason::ReasonCode;
use crate::semver::Semver;
use serde::{Deserialize, Serialize};

/// Minimum node versions a pack declares it needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompatibilityRequirement {
    pub min_runtime_semver: String,
    pub min_gateway_semver: String,
}

/// The versions a node actually runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeVersions {
    pub runtime: String,
    pub gateway: String,
}

/// No implicit pass: a missing requirement, a missing version and an
/// unparseable version all block.
pub fn check(
    requirement: Option<&CompatibilityRequirement>,
    runtime_version: &str,
    gateway_version: &str,
) -> Result<(), ReasonCode> {
    let requirement = requirement.ok_or(ReasonCode::CompatMissing)?;

    let parse = |s: &str| Semver::parse_strict(s).ok_or(ReasonCode::CompatSemverInvalid);
    let runtime = parse(runtime_version)?;
    let gateway = parse(gateway_version)?;
    let min_runtime = parse(&requirement.min_runtime_semver)?;
    let min_gateway = parse(&requirement.min_gateway_semver)?;

    if runtime < min_runtime {
        return Err(ReasonCode::CompatRuntimeTooLow);
    }
    if gateway < min_gateway {
        return Err(ReasonCode::CompatGatewayTooLow);
    }
    Ok(())
}
