//! Exit-code mapping: 0 success, 1 usage error, 2 runtime failure.

use recs_core::Error;

pub fn exit_code_for(error: &anyhow::Error) -> u8 {
    match error.downcast_ref::<Error>() {
        Some(Error::InvalidInput(_)) => 1,
        _ => 2,
    }
}
