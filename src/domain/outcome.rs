use serde::{Deserialize, Serialize};
use std::fmt;

/// Vendor response codes, with the vendor's integer values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResponseCode {
    ServiceTimeout,
    FeatureNotSupported,
    ServiceDisconnected,
    #[default]
    Ok,
    UserCanceled,
    ServiceUnavailable,
    BillingUnavailable,
    ItemUnavailable,
    DeveloperError,
    Error,
    ItemAlreadyOwned,
    ItemNotOwned,
    NetworkError,
}

impl ResponseCode {
    pub fn code(self) -> i32 {
        match self {
            ResponseCode::ServiceTimeout => -3,
            ResponseCode::FeatureNotSupported => -2,
            ResponseCode::ServiceDisconnected => -1,
            ResponseCode::Ok => 0,
            ResponseCode::UserCanceled => 1,
            ResponseCode::ServiceUnavailable => 2,
            ResponseCode::BillingUnavailable => 3,
            ResponseCode::ItemUnavailable => 4,
            ResponseCode::DeveloperError => 5,
            ResponseCode::Error => 6,
            ResponseCode::ItemAlreadyOwned => 7,
            ResponseCode::ItemNotOwned => 8,
            ResponseCode::NetworkError => 12,
        }
    }
}

/// Unknown codes collapse to `Error`.
impl From<i32> for ResponseCode {
    fn from(code: i32) -> Self {
        match code {
            -3 => ResponseCode::ServiceTimeout,
            -2 => ResponseCode::FeatureNotSupported,
            -1 => ResponseCode::ServiceDisconnected,
            0 => ResponseCode::Ok,
            1 => ResponseCode::UserCanceled,
            2 => ResponseCode::ServiceUnavailable,
            3 => ResponseCode::BillingUnavailable,
            4 => ResponseCode::ItemUnavailable,
            5 => ResponseCode::DeveloperError,
            7 => ResponseCode::ItemAlreadyOwned,
            8 => ResponseCode::ItemNotOwned,
            12 => ResponseCode::NetworkError,
            _ => ResponseCode::Error,
        }
    }
}

/// Terminal result of a billing operation.
///
/// Every callback receives exactly one `Outcome`. Failures are values, not
/// panics or `Err`s.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Outcome {
    pub code: ResponseCode,
    #[serde(default)]
    pub debug_message: String,
}

impl Outcome {
    pub fn new(code: ResponseCode, debug_message: impl Into<String>) -> Self {
        Self {
            code,
            debug_message: debug_message.into(),
        }
    }

    pub fn ok() -> Self {
        Self::from(ResponseCode::Ok)
    }

    pub fn item_unavailable(debug_message: impl Into<String>) -> Self {
        Self::new(ResponseCode::ItemUnavailable, debug_message)
    }

    pub fn is_ok(&self) -> bool {
        self.code == ResponseCode::Ok
    }
}

impl From<ResponseCode> for Outcome {
    fn from(code: ResponseCode) -> Self {
        Self {
            code,
            debug_message: String::new(),
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.debug_message.is_empty() {
            write!(f, "{:?} ({})", self.code, self.code.code())
        } else {
            write!(
                f,
                "{:?} ({}): {}",
                self.code,
                self.code.code(),
                self.debug_message
            )
        }
    }
}
