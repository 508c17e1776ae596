use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable error codes carried by every kernel error.
///
/// The string forms are part of the kernel's external contract and never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    #[serde(rename = "ENOHANDLE")]
    NoHandle,
    #[serde(rename = "EHANDLETYPE")]
    HandleType,
    #[serde(rename = "ETABLEFULL")]
    TableFull,
    #[serde(rename = "ESTREAMCLOSED")]
    StreamClosed,
    #[serde(rename = "ECAPDENIED")]
    CapabilityDenied,
    #[serde(rename = "EALREADY")]
    AlreadyExists,
    #[serde(rename = "ENOTFOUND")]
    NotFound,
    #[serde(rename = "ESIGNAL")]
    Signal,
}

impl ErrorCode {
    pub const ALL: [ErrorCode; 8] = [
        ErrorCode::NoHandle,
        ErrorCode::HandleType,
        ErrorCode::TableFull,
        ErrorCode::StreamClosed,
        ErrorCode::CapabilityDenied,
        ErrorCode::AlreadyExists,
        ErrorCode::NotFound,
        ErrorCode::Signal,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::NoHandle => "ENOHANDLE",
            ErrorCode::HandleType => "EHANDLETYPE",
            ErrorCode::TableFull => "ETABLEFULL",
            ErrorCode::StreamClosed => "ESTREAMCLOSED",
            ErrorCode::CapabilityDenied => "ECAPDENIED",
            ErrorCode::AlreadyExists => "EALREADY",
            ErrorCode::NotFound => "ENOTFOUND",
            ErrorCode::Signal => "ESIGNAL",
        }
    }

    /// Resource-class codes (handle table).
    pub fn is_resource(&self) -> bool {
        matches!(
            self,
            ErrorCode::NoHandle | ErrorCode::HandleType | ErrorCode::TableFull
        )
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
