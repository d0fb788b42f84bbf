use std::fmt;

/// Raw result code returned by the runtime.
///
/// Non-negative values are successes (zero is an unqualified success),
/// negative values are errors. Codes are kept verbatim so callers can compare
/// them against the values published by the runtime.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct XrCode(pub i32);

macro_rules! result_codes {
    ($($name:ident = $value:literal,)*) => {
        impl XrCode {
            $(pub const $name: Self = Self($value);)*

            /// Symbolic name without the `XR_` prefix, if the code is known.
            pub fn name(self) -> Option<&'static str> {
                match self.0 {
                    $($value => Some(stringify!($name)),)*
                    _ => None,
                }
            }
        }
    };
}

result_codes! {
    SUCCESS = 0,
    TIMEOUT_EXPIRED = 1,
    SESSION_LOSS_PENDING = 3,
    EVENT_UNAVAILABLE = 4,
    SPACE_BOUNDS_UNAVAILABLE = 7,
    SESSION_NOT_FOCUSED = 8,
    FRAME_DISCARDED = 9,
    ERROR_VALIDATION_FAILURE = -1,
    ERROR_RUNTIME_FAILURE = -2,
    ERROR_OUT_OF_MEMORY = -3,
    ERROR_API_VERSION_UNSUPPORTED = -4,
    ERROR_INITIALIZATION_FAILED = -6,
    ERROR_FUNCTION_UNSUPPORTED = -7,
    ERROR_FEATURE_UNSUPPORTED = -8,
    ERROR_EXTENSION_NOT_PRESENT = -9,
    ERROR_LIMIT_REACHED = -10,
    ERROR_SIZE_INSUFFICIENT = -11,
    ERROR_HANDLE_INVALID = -12,
    ERROR_INSTANCE_LOST = -13,
    ERROR_SESSION_RUNNING = -14,
    ERROR_SESSION_NOT_RUNNING = -16,
    ERROR_SESSION_LOST = -17,
    ERROR_SYSTEM_INVALID = -18,
    ERROR_PATH_INVALID = -19,
    ERROR_PATH_COUNT_EXCEEDED = -20,
    ERROR_PATH_FORMAT_INVALID = -21,
    ERROR_PATH_UNSUPPORTED = -22,
    ERROR_LAYER_INVALID = -23,
    ERROR_LAYER_LIMIT_EXCEEDED = -24,
    ERROR_SWAPCHAIN_RECT_INVALID = -25,
    ERROR_SWAPCHAIN_FORMAT_UNSUPPORTED = -26,
    ERROR_ACTION_TYPE_MISMATCH = -27,
    ERROR_SESSION_NOT_READY = -28,
    ERROR_SESSION_NOT_STOPPING = -29,
    ERROR_TIME_INVALID = -30,
    ERROR_REFERENCE_SPACE_UNSUPPORTED = -31,
    ERROR_FILE_ACCESS_ERROR = -32,
    ERROR_FILE_CONTENTS_INVALID = -33,
    ERROR_FORM_FACTOR_UNSUPPORTED = -34,
    ERROR_FORM_FACTOR_UNAVAILABLE = -35,
    ERROR_API_LAYER_NOT_PRESENT = -36,
    ERROR_CALL_ORDER_INVALID = -37,
    ERROR_GRAPHICS_DEVICE_INVALID = -38,
    ERROR_POSE_INVALID = -39,
    ERROR_INDEX_OUT_OF_RANGE = -40,
    ERROR_VIEW_CONFIGURATION_TYPE_UNSUPPORTED = -41,
    ERROR_ENVIRONMENT_BLEND_MODE_UNSUPPORTED = -42,
    ERROR_NAME_DUPLICATED = -44,
    ERROR_NAME_INVALID = -45,
    ERROR_ACTIONSET_NOT_ATTACHED = -46,
    ERROR_ACTIONSETS_ALREADY_ATTACHED = -47,
    ERROR_LOCALIZED_NAME_DUPLICATED = -48,
    ERROR_LOCALIZED_NAME_INVALID = -49,
    ERROR_RUNTIME_UNAVAILABLE = -51,
}

impl XrCode {
    pub fn is_success(self) -> bool {
        self.0 >= 0
    }

    pub fn is_unqualified_success(self) -> bool {
        self.0 == 0
    }

    pub fn is_error(self) -> bool {
        self.0 < 0
    }
}

impl fmt::Display for XrCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "XR_{name}"),
            None => write!(f, "XR_RESULT({})", self.0),
        }
    }
}

impl fmt::Debug for XrCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self} ({})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_code_display() {
        assert_eq!(
            XrCode::ERROR_VALIDATION_FAILURE.to_string(),
            "XR_ERROR_VALIDATION_FAILURE"
        );
        assert_eq!(XrCode::SUCCESS.to_string(), "XR_SUCCESS");
    }

    #[test]
    fn test_unknown_code_display() {
        assert_eq!(XrCode(-1000).to_string(), "XR_RESULT(-1000)");
        assert_eq!(XrCode(-1000).name(), None);
    }

    #[test]
    fn test_success_classes() {
        assert!(XrCode::SUCCESS.is_unqualified_success());
        assert!(XrCode::SESSION_LOSS_PENDING.is_success());
        assert!(!XrCode::SESSION_LOSS_PENDING.is_unqualified_success());
        assert!(XrCode::ERROR_RUNTIME_FAILURE.is_error());
    }
}
