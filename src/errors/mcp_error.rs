use serde::Serialize;

/// JSON-RPC error codes for protocol-boundary faults. Tool-level failures
/// never surface through these; they are rendered as failure envelopes
/// inside a successful tools/call result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[repr(i32)]
pub enum ErrorCode {
    ParseError = -32700,
    InvalidRequest = -32600,
    MethodNotFound = -32601,
    InvalidParams = -32602,
    InternalError = -32603,
}

impl ErrorCode {
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}
