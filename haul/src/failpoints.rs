//! Named fault injection points, active only with the `failpoints` feature.

use fail::fail_point;

use crate::bail;
use crate::error::{ErrorKind, HaulResult};

/// Fires after a journal table was fully written to its temporary file and before the rename.
pub const JOURNAL_FLUSH_BEFORE_RENAME: &str = "journal.flush.before_rename";

/// Fires in the consumer before a batch is handed to the store.
pub const MOVER_BEFORE_STORE_WRITE: &str = "mover.before_store_write";

/// Fires after the mirror was staged and before it replaces the published copy.
pub const MIRROR_BEFORE_SWAP: &str = "mirror.before_swap";

/// Evaluates the fail point `name`, returning an error when it is configured to `return`.
///
/// The optional parameter picks the error kind: `no_retry` (default) or `timed_retry`.
pub fn haul_fail_point(name: &str) -> HaulResult<()> {
    fail_point!(name, |parameter| {
        let error_kind = match parameter.as_deref() {
            Some("timed_retry") => ErrorKind::WithTimedRetry,
            _ => ErrorKind::WithNoRetry,
        };

        bail!(
            error_kind,
            "An error occurred in a fail point",
            format!("The failpoint '{name}' returned an error")
        );
    });

    Ok(())
}
