//! Error types.
//!
//! Each error is represented by a unique type that implements [`std::error::Error`].
//! However, most APIs can fail in more than one way and so will return one
//! of the higher level [enums](#enums), [`ParseError`] or [`Error`]. The error
//! types are convertible to the higher level enums, allowing them to be used
//! with `?`, and back again with [`TryFrom`]:
//!
//! ```
//! use ellproto::error::{Error, ParseError};
//!
//! fn foo() -> Result<(), ParseError> {
//!     // ...
//! # Ok(())
//! }
//!
//! fn bar() -> Result<(), Error> {
//!     foo()?;
//!     // ...
//! # Ok(())
//! }
//! # bar().unwrap();
//! ```
//!
//! Errors about a received frame keep the offending bytes so the frame can be
//! inspected or replayed without moving the stage again:
//!
//! ```
//! use ellproto::{error::ParseError, frame};
//!
//! let err = frame::parse(b"0XX1234\r\n").unwrap_err();
//! assert!(matches!(err, ParseError::UnknownReply(_)));
//! assert_eq!(err.as_bytes(), b"0XX1234\r\n");
//! ```

use crate::reply::{Reply, ReplyKind};

/// Implement Error and Display traits for the specified type.
///
/// After the type define the format string and any arguments it should
/// reference after `self =>` (to abide by macro hygiene rules).
macro_rules! impl_error_display {
    (
        $name:path,
        $self:ident =>
        $display:literal
        $(,
            $($arg:expr),+
        )?
    ) => {
        impl std::error::Error for $name {}

        impl std::fmt::Display for $name {
            fn fmt(&$self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(
                    f,
                    $display
                    $(,
                        $($arg),+
                    )?
                )
            }
        }
    };
}

/// Implement the `new()` and `as_bytes()` methods for errors storing the bytes of a frame.
macro_rules! impl_for_type_containing_bytes {
    (
        $name:ident
    ) => {
        impl $name {
            /// Create a instance of the error
            pub(crate) fn new<R: AsRef<[u8]>>(bytes: R) -> Self {
                $name(Box::from(bytes.as_ref()))
            }

            /// Get the raw bytes of the offending frame, exactly as received.
            pub fn as_bytes(&self) -> &[u8] {
                &self.0
            }
        }
    };
}

/// Define error enums that contain concrete error types (not other error enums).
///
/// From and TryFrom traits will be implemented for the enum and it's underlying
/// errors. The enum's Display implementation will defer to the underlying errors'
/// Display implementations.
///
/// Simple implementations of From and TryFrom with other error enums can be
/// added by appending a succinct impl block, which assumes that:
///   * it is being implemented for this error enum,
///   * each variant has a single tuple value, and can be converted to the value
///     in this enum with its own From implementation.
///
/// ```compile_fail
/// # // This fails to compile because the macro is not exported.
/// error_enum!{
///     // This defines the enum and From/TryFrom between ThisError and A and B.
///     #[non_exhaustive]
///     pub enum ThisError {
///         VariantA(A),
///         VariantB(B),
///         // ...
///     }
///
///     // This implements a simple From/TryFrom between ThisError and OtherType.
///     impl From<OtherType> {
///         FromVariantA => VariantA,
///         // ...
///     }
/// }
/// ```
macro_rules! error_enum {
    (
        $(#[$attr:meta])*
        pub enum $name:ident {
            $(
                $variant:ident($inner:path)
            ),+
            $(,)?
        }
        // Additional information for From/TryFrom impl blocks.
        $(
            impl From<$from_t:ident>
            {
                $($from_variant:ident => $to_variant:ident),+
                $(,)?
            }
        )*
    ) => {
        // Define the error enum itself
        $(
            #[$attr]
        )*
        #[allow(missing_docs)]
        pub enum $name {
            $(
                $variant($inner)
            ),+
        }

        impl std::error::Error for $name {}

        // Defer the display to the inner error type
        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(
                        $name::$variant(e) => std::fmt::Display::fmt(e, f)
                    ),+
                }
            }
        }

        // Conversions with underlying errors
        $(
            impl From<$inner> for $name {
                fn from(other: $inner) -> Self {
                    $name::$variant(other)
                }
            }

            impl TryFrom<$name> for $inner {
                type Error = $name;
                fn try_from(other: $name) -> Result<Self, Self::Error> {
                    match other {
                        $name::$variant(value) => Ok(value),
                        value => Err(value)
                    }
                }
            }
        )+

        // Conversions from other enum errors
        $(
            impl From<$from_t> for $name {
                fn from(other: $from_t) -> Self {
                    match other {
                        $($from_t::$from_variant(e) => $name::$to_variant(From::from(e))),+
                    }
                }
            }

            impl TryFrom<$name> for $from_t {
                type Error = $name;
                fn try_from(other: $name) -> Result<Self, Self::Error> {
                    match other {
                        $(
                            $name::$to_variant(e) => Ok($from_t::$from_variant(From::from(e)))
                        ),+
                        ,
                        _ => Err(other)
                    }
                }

            }
        )*
    };
}

/// The specified device is either disconnected or already in use by another process.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SerialDeviceInUseOrDisconnectedError(Box<str>);

impl_error_display! {
    SerialDeviceInUseOrDisconnectedError,
    self =>
    "the specified device is either disconnected or already in use by another process: {}", self.0
}

/// A value cannot be encoded in its field, or lies outside the stage's travel.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RangeError(Box<str>);

impl RangeError {
    /// Create a instance of the error
    pub(crate) fn new<S: Into<String>>(description: S) -> Self {
        RangeError(description.into().into_boxed_str())
    }

    /// A description of the offending value and the allowed range.
    pub fn description(&self) -> &str {
        &self.0
    }
}

impl_error_display! { RangeError, self => "value out of range: {}", self.0 }

/// A field that should contain hexadecimal digits does not.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InvalidHexError(Box<str>);

impl InvalidHexError {
    /// Create a instance of the error
    pub(crate) fn new<S: AsRef<str>>(text: S) -> Self {
        InvalidHexError(Box::from(text.as_ref()))
    }

    /// The offending text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl_error_display! { InvalidHexError, self => "invalid hexadecimal field: {:?}", self.0 }

/// A received frame was shorter than the smallest possible reply.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FrameTooShortError(Box<[u8]>);

impl_for_type_containing_bytes! { FrameTooShortError }
impl_error_display! {
    FrameTooShortError,
    self => "frame too short: {:?}",
    String::from_utf8_lossy(&self.0)
}

/// The first byte of a received frame was not a hexadecimal address digit.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MalformedAddressError(Box<[u8]>);

impl_for_type_containing_bytes! { MalformedAddressError }
impl_error_display! {
    MalformedAddressError,
    self => "malformed address in frame: {:?}",
    String::from_utf8_lossy(&self.0)
}

/// A structurally valid frame carried a reply code missing from the catalogue.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UnknownReplyError(Box<[u8]>);

impl_for_type_containing_bytes! { UnknownReplyError }
impl_error_display! {
    UnknownReplyError,
    self => "unknown reply: {:?}",
    String::from_utf8_lossy(&self.0)
}

impl UnknownReplyError {
    /// The unrecognised two byte reply code.
    pub fn code(&self) -> Option<&[u8]> {
        self.0.get(1..3)
    }
}

/// The payload of a received frame could not be decoded.
///
/// Either the bytes are not valid in the configured text encoding or the text
/// is not valid for the reply kind (e.g., a position that isn't hexadecimal).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PayloadDecodeError(Box<[u8]>);

impl_for_type_containing_bytes! { PayloadDecodeError }
impl_error_display! {
    PayloadDecodeError,
    self => "cannot decode payload of frame: {:?}",
    String::from_utf8_lossy(&self.0)
}

/// The expected reply did not arrive within the retry budget.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplyTimeoutError {
    /// The reply kind that was awaited.
    expected: ReplyKind,
    /// The number of lines that were read.
    attempts: usize,
    /// The outcome of the final read, if there was one.
    last: Option<Box<Result<Reply, ParseError>>>,
}

impl ReplyTimeoutError {
    /// Create a instance of the error
    pub(crate) fn new(
        expected: ReplyKind,
        attempts: usize,
        last: Option<Result<Reply, ParseError>>,
    ) -> Self {
        ReplyTimeoutError {
            expected,
            attempts,
            last: last.map(Box::new),
        }
    }

    /// The reply kind that was awaited.
    pub fn expected(&self) -> ReplyKind {
        self.expected
    }

    /// The number of lines that were read before giving up.
    pub fn attempts(&self) -> usize {
        self.attempts
    }

    /// The last reply that was read, if the final line parsed successfully.
    pub fn last_reply(&self) -> Option<&Reply> {
        match self.last.as_deref() {
            Some(Ok(reply)) => Some(reply),
            _ => None,
        }
    }

    /// The last parse failure, if the final line could not be parsed.
    pub fn last_error(&self) -> Option<&ParseError> {
        match self.last.as_deref() {
            Some(Err(e)) => Some(e),
            _ => None,
        }
    }
}

impl std::error::Error for ReplyTimeoutError {}

impl std::fmt::Display for ReplyTimeoutError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "no {} reply after {} attempt(s)",
            self.expected, self.attempts
        )?;
        match self.last.as_deref() {
            Some(Ok(reply)) => write!(f, ", last reply was {reply}"),
            Some(Err(e)) => write!(f, ", last read failed: {e}"),
            None => Ok(()),
        }
    }
}

/// The session has been closed and its backend released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionClosedError;

impl_error_display! { SessionClosedError, self => "the session has been closed" }

error_enum! {
    /// A received frame could not be parsed.
    #[derive(Debug, Clone, PartialEq, Eq, Hash)]
    pub enum ParseError {
        FrameTooShort(FrameTooShortError),
        MalformedAddress(MalformedAddressError),
        UnknownReply(UnknownReplyError),
        PayloadDecode(PayloadDecodeError),
    }
}

impl ParseError {
    /// Get the raw bytes of the offending frame.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            ParseError::FrameTooShort(e) => e.as_bytes(),
            ParseError::MalformedAddress(e) => e.as_bytes(),
            ParseError::UnknownReply(e) => e.as_bytes(),
            ParseError::PayloadDecode(e) => e.as_bytes(),
        }
    }
}

error_enum! {
    /// Any error returned by this crate.
    #[derive(Debug)]
    #[non_exhaustive]
    pub enum Error {
        SerialDeviceInUseOrDisconnected(SerialDeviceInUseOrDisconnectedError),
        Io(std::io::Error),
        Range(RangeError),
        InvalidHex(InvalidHexError),
        FrameTooShort(FrameTooShortError),
        MalformedAddress(MalformedAddressError),
        UnknownReply(UnknownReplyError),
        PayloadDecode(PayloadDecodeError),
        ReplyTimeout(ReplyTimeoutError),
        SessionClosed(SessionClosedError),
    }

    impl From<ParseError> {
        FrameTooShort => FrameTooShort,
        MalformedAddress => MalformedAddress,
        UnknownReply => UnknownReply,
        PayloadDecode => PayloadDecode,
    }
}

impl Error {
    /// A convenience function for determining if the error is due to the
    /// port timing out or the expected reply never arriving.
    pub fn is_timeout(&self) -> bool {
        match self {
            Error::Io(e) => crate::backend::is_timeout(e),
            Error::ReplyTimeout(_) => true,
            _ => false,
        }
    }
}

impl From<serialport::Error> for Error {
    fn from(other: serialport::Error) -> Self {
        use std::io;

        match other.kind() {
            serialport::ErrorKind::NoDevice => Error::SerialDeviceInUseOrDisconnected(
                SerialDeviceInUseOrDisconnectedError(other.description.into_boxed_str()),
            ),
            serialport::ErrorKind::InvalidInput => Error::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                other.description,
            )),
            serialport::ErrorKind::Unknown => Error::Io(io::Error::other(other.description)),
            serialport::ErrorKind::Io(kind) => Error::Io(io::Error::new(kind, other.description)),
        }
    }
}

macro_rules! define_fault_codes {
    // Entry point.
    //
    // Serves to concatenate the parts of the name before defining the constants.
    (
        $(
            $num:literal: $($name_word:ident)+
        ),+
        $(,)?
    ) => {
        paste::paste! {
            define_fault_codes!{@with_concatenated_name
                $(
                    $num: $($name_word)+, [< $($name_word:camel)+ >]
                 ),+
            }
        }
    };
    (@with_concatenated_name
        $(
            $num:literal: $($name_word:ident)+, $name:ident
        ),+
    ) => {
        paste::paste! {
            pub mod fault_code {
                //! Fault codes a device reports in its status (`GS`) reply.
                //!
                //! A code of `0` means no fault. The codes in numerical order are:
                #![doc =
                $( "* `" $num "`: [`" $name:snake:upper "`]\n\n" )+
                ]

                $(
                    #[doc = $(" " $name_word " ")+ "(code `" $num "`)." ]
                    pub const [< $name:snake:upper >] : u8 = $num;
                )+

                /// Get the name of a fault code.
                ///
                /// If the code is not recognized, `None` is returned.
                /// The contents of the returned string may change.
                pub const fn name(code: u8) -> Option<&'static str> {
                    match code {
                        $(
                            $num => Some(stringify!($($name_word)+)),
                        )+
                        _ => None,
                    }
                }
            }
        }
    };
}

define_fault_codes! {
    1: Communication Timeout,
    2: Mechanical Timeout,
    3: Command Error,
    4: Value Out Of Range,
    5: Module Isolated,
    6: Module Out Of Isolation,
    7: Initializing Error,
    8: Thermal Error,
    9: Busy,
    10: Sensor Error,
    11: Motor Error,
    12: Out Of Range,
    13: Over Current Error,
    14: General Error,
}

#[cfg(test)]
mod test {
    use super::fault_code::*;
    use super::*;
    use static_assertions::{assert_impl_all, const_assert};

    const _WORD_SIZE: usize = std::mem::size_of::<&usize>();
    // Keep `Result<T, Error>` small: no variant stores more than a fat pointer
    // and a tag.
    const_assert!(std::mem::size_of::<Error>() <= 4 * _WORD_SIZE);

    assert_impl_all!(Error: From<ParseError>, From<RangeError>, From<std::io::Error>, Send, Sync);
    assert_impl_all!(ParseError: TryFrom<Error>, Clone);
    assert_impl_all!(FrameTooShortError: TryFrom<Error>, TryFrom<ParseError>);

    #[test]
    fn fault_code_names() {
        assert_eq!(name(COMMUNICATION_TIMEOUT), Some("Communication Timeout"));
        assert_eq!(name(MODULE_OUT_OF_ISOLATION), Some("Module Out Of Isolation"));
        assert_eq!(name(BUSY), Some("Busy"));
        assert_eq!(GENERAL_ERROR, 14);
        assert_eq!(name(0), None);
        assert_eq!(name(15), None);
    }

    #[test]
    fn parse_error_round_trips_through_error() {
        let parse: ParseError = UnknownReplyError::new(b"0ZZ00\r\n").into();
        let error: Error = parse.clone().into();
        assert!(matches!(error, Error::UnknownReply(_)));
        let back = ParseError::try_from(error).unwrap();
        assert_eq!(back, parse);

        let error: Error = RangeError::new("-1 mm").into();
        assert!(ParseError::try_from(error).is_err());
    }

    #[test]
    fn unknown_reply_exposes_code() {
        let err = UnknownReplyError::new(b"3ZZ00\r\n");
        assert_eq!(err.code(), Some(&b"ZZ"[..]));
        assert_eq!(err.as_bytes(), b"3ZZ00\r\n");
    }

    #[test]
    fn timeouts() {
        let io = std::io::Error::new(std::io::ErrorKind::TimedOut, "timed out");
        assert!(Error::from(io).is_timeout());
        let reply_timeout = ReplyTimeoutError::new(ReplyKind::Position, 1, None);
        assert!(Error::from(reply_timeout).is_timeout());
        assert!(!Error::from(SessionClosedError).is_timeout());
    }
}
