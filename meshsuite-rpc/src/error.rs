//! JSON-RPC error codes used by the test suite server.

use jsonrpsee::types::ErrorObjectOwned;

/// A test hook failed or panicked.
pub const TEST_FAULT_CODE: i32 = -32001;

/// Calls arrived in the wrong order (for instance run before setup).
pub const ORDERING_CODE: i32 = -32002;

/// The caller broke the protocol (unknown test, unknown action).
pub const PROTOCOL_VIOLATION_CODE: i32 = -32003;

/// Invalid configuration.
pub const CONFIGURATION_CODE: i32 = -32004;

/// The API container reported an error while serving the call.
pub const BACKEND_CODE: i32 = -32005;

/// Anything else.
pub const INTERNAL_CODE: i32 = -32000;

/// Build an error object without data.
pub fn error_object(code: i32, message: impl Into<String>) -> ErrorObjectOwned {
    ErrorObjectOwned::owned(code, message.into(), None::<()>)
}
