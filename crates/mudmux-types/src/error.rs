//! Unified error interface for mudmux crates.
//!
//! Every error enum in the workspace implements [`ErrorCode`] so the
//! engine can log and surface failures uniformly without knowing the
//! concrete type.

/// Unified error code interface.
///
/// # Code Format
///
/// - **UPPER_SNAKE_CASE**, e.g. `"EVENT_DUPLICATE"`
/// - **Subsystem-prefixed**: `RECORD_`, `EVENT_`, `API_`, `PLUGIN_`,
///   `SETTING_`, `COMMAND_`, `TRIGGER_`, `TIMER_`, `NET_`, `CORE_`
/// - **Stable**: codes do not change once defined
///
/// # Recoverability
///
/// An error is recoverable when the initiator can fix it and retry
/// (bad setting value, unknown command). Contract violations and
/// lifecycle faults are not.
///
/// # Example
///
/// ```
/// use mudmux_types::ErrorCode;
///
/// #[derive(Debug)]
/// enum MyError {
///     NotFound,
///     BadInput,
/// }
///
/// impl ErrorCode for MyError {
///     fn code(&self) -> &'static str {
///         match self {
///             Self::NotFound => "MY_NOT_FOUND",
///             Self::BadInput => "MY_BAD_INPUT",
///         }
///     }
///
///     fn is_recoverable(&self) -> bool {
///         matches!(self, Self::BadInput)
///     }
/// }
///
/// assert_eq!(MyError::NotFound.code(), "MY_NOT_FOUND");
/// ```
pub trait ErrorCode {
    /// Machine-readable error code.
    fn code(&self) -> &'static str;

    /// Whether retrying or correcting the input may succeed.
    fn is_recoverable(&self) -> bool;
}
