//! Contracts release identifiers.

use script_host::CodecError;

/// Prefix of tagged contracts releases.
pub const RELEASE_PREFIX: &str = "op-contracts/v";

/// Release name used for contracts built from the working tree.
pub const DEV_RELEASE: &str = "dev";

/// Whether `release` is `dev` or has the form `op-contracts/vX.Y.Z`, optionally followed by a
/// `-suffix` such as `-rc.1`.
pub fn is_valid_release(release: &str) -> bool {
    if release == DEV_RELEASE {
        return true;
    }
    let Some(version) = release.strip_prefix(RELEASE_PREFIX) else {
        return false;
    };
    let core = version.split_once('-').map_or(version, |(core, _)| core);
    let parts: Vec<&str> = core.split('.').collect();
    parts.len() == 3 &&
        parts.iter().all(|part| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit()))
}

/// Checks `release`, reporting it as the value of `field`.
pub fn check_release(field: &str, release: &str) -> Result<(), CodecError> {
    if is_valid_release(release) {
        return Ok(());
    }
    Err(CodecError::InvalidValue {
        field: field.to_string(),
        reason: format!("`{release}` is neither `{DEV_RELEASE}` nor `{RELEASE_PREFIX}X.Y.Z`"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_releases() {
        assert!(is_valid_release("op-contracts/v3.0.0"));
        assert!(is_valid_release("op-contracts/v1.8.0-rc.4"));
        assert!(is_valid_release("dev"));
    }

    #[test]
    fn test_invalid_releases() {
        assert!(!is_valid_release(""));
        assert!(!is_valid_release("v3.0.0"));
        assert!(!is_valid_release("op-contracts/3.0.0"));
        assert!(!is_valid_release("op-contracts/v3.0"));
        assert!(!is_valid_release("op-contracts/v3.x.0"));
        assert!(!is_valid_release("op-contracts/v3..0"));
    }

    #[test]
    fn test_check_release_error() {
        let err = check_release("l1ContractsRelease", "latest").unwrap_err();
        assert!(matches!(err, CodecError::InvalidValue { ref field, .. } if field == "l1ContractsRelease"));
    }
}
