//! Verifier logic shared by the `vision-verify` binary and its integration
//! tests, so the CLI's behavior is exercised by calling a function directly
//! rather than shelling out to the built binary.

use std::path::Path;

use vision_types::VisionError;

use crate::store::scan_for_violations;

/// Outcome of a verification run against one event log.
pub struct VerifyReport {
    pub violations: Vec<String>,
}

impl VerifyReport {
    /// Process exit code a CLI should use for this report: `0` when clean,
    /// `1` when any violation was found.
    pub fn exit_code(&self) -> i32 {
        if self.violations.is_empty() {
            0
        } else {
            1
        }
    }
}

/// Run the append-only violation scan against `path` and package the result.
pub fn run_verifier(path: impl AsRef<Path>) -> Result<VerifyReport, VisionError> {
    let violations = scan_for_violations(path)?;
    Ok(VerifyReport { violations })
}
