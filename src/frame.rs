//! Composing command frames and parsing reply frames.
//!
//! A command frame is `<address><code><payload>`: the device address as a
//! single hexadecimal digit, the two character [`HostCommand`] code and an
//! optional payload of hexadecimal digits. No terminator is added.
//!
//! A reply frame has the same shape, with an upper-case [`ReplyKind`] code,
//! and ends in `\r\n`.
//!
//! ```
//! use ellproto::{command::HostCommand, frame::{self, Address}, reply::ReplyKind, units};
//!
//! let address = Address::new(0)?;
//! let frame = frame::compose(HostCommand::MoveAbsolute, &units::position_to_hex(4.0)?, address);
//! assert_eq!(frame, "0ma00002000");
//!
//! let reply = frame::parse(b"0PO00002000\r\n")?;
//! assert_eq!(reply.kind(), ReplyKind::Position);
//! assert_eq!(reply.position(), Some(4.0));
//! assert_eq!(reply.address(), address);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use crate::{
	command::HostCommand,
	error::{
		FrameTooShortError, MalformedAddressError, ParseError, PayloadDecodeError, RangeError,
		UnknownReplyError,
	},
	reply::{Reply, ReplyKind},
	units::Units,
};

/// The fewest bytes a reply can contain, once the terminator is removed.
pub const MIN_REPLY_LEN: usize = 5;

/// The address of a device on the bus.
///
/// Addresses are in the range `0..=15` and are written as one hexadecimal
/// digit, so `10` through `15` appear as `A` through `F`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address(u8);

impl Address {
	/// The largest address.
	pub const MAX: Address = Address(15);

	/// Create an address, failing if `value` is above 15.
	pub fn new(value: u8) -> Result<Self, RangeError> {
		if value <= Address::MAX.0 {
			Ok(Address(value))
		} else {
			Err(RangeError::new(format!(
				"address {value} is not in the range 0 to 15"
			)))
		}
	}

	/// Parse an address from a single hexadecimal digit of either case.
	pub fn from_hex_digit(digit: u8) -> Option<Self> {
		char::from(digit)
			.to_digit(16)
			.map(|value| Address(value as u8))
	}

	/// The address as an upper-case hexadecimal digit.
	pub fn to_hex_char(self) -> char {
		// `self.0` is always a valid digit
		char::from_digit(u32::from(self.0), 16)
			.unwrap_or('0')
			.to_ascii_uppercase()
	}

	/// The numeric value of the address.
	pub const fn get(self) -> u8 {
		self.0
	}
}

impl TryFrom<u8> for Address {
	type Error = RangeError;
	fn try_from(value: u8) -> Result<Self, Self::Error> {
		Address::new(value)
	}
}

impl From<Address> for u8 {
	fn from(address: Address) -> Self {
		address.0
	}
}

impl std::fmt::Display for Address {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.to_hex_char())
	}
}

/// The text encoding expected of reply payloads.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub enum Encoding {
	/// Only 7-bit ASCII is accepted.
	#[default]
	Ascii,
	/// Any valid UTF-8 is accepted.
	Utf8,
}

impl Encoding {
	/// Decode payload bytes into text, returning `None` if they are invalid.
	pub fn decode(self, bytes: &[u8]) -> Option<&str> {
		match self {
			Encoding::Ascii if !bytes.is_ascii() => None,
			Encoding::Ascii | Encoding::Utf8 => std::str::from_utf8(bytes).ok(),
		}
	}
}

/// Composes command frames and parses reply frames.
///
/// The codec holds the pulse scale used to decode positions and the text
/// encoding of payloads. The default is 2048 pulses per millimetre and ASCII.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct Codec {
	/// The unit conversions for positions
	pub units: Units,
	/// The encoding of reply payloads
	pub encoding: Encoding,
}

impl Codec {
	/// Create a codec.
	pub const fn new(units: Units, encoding: Encoding) -> Self {
		Codec { units, encoding }
	}

	/// Compose a command frame for the device at `address`.
	///
	/// The payload is copied as-is. It is up to the caller to encode any
	/// values with the [`units`](crate::units) helpers.
	pub fn compose(&self, command: HostCommand, payload: &str, address: Address) -> String {
		let mut frame = String::with_capacity(3 + payload.len());
		frame.push(address.to_hex_char());
		frame.push_str(command.code());
		frame.push_str(payload);
		frame
	}

	/// Parse a reply frame.
	///
	/// Frames whose code is shared by more than one [`ReplyKind`] are decoded as
	/// the first kind in the catalogue. Use [`Codec::parse_expecting`] to pick
	/// a specific kind.
	pub fn parse(&self, raw: &[u8]) -> Result<Reply, ParseError> {
		self.parse_with(raw, None)
	}

	/// Parse a reply frame, preferring the `expected` kind.
	///
	/// If the frame's code is the expected kind's code, the payload is decoded
	/// as that kind. Otherwise this behaves like [`Codec::parse`].
	pub fn parse_expecting(&self, raw: &[u8], expected: ReplyKind) -> Result<Reply, ParseError> {
		self.parse_with(raw, Some(expected))
	}

	fn parse_with(&self, raw: &[u8], expected: Option<ReplyKind>) -> Result<Reply, ParseError> {
		let frame = strip_terminator(raw);
		if frame.len() < MIN_REPLY_LEN {
			return Err(FrameTooShortError::new(raw).into());
		}

		let address =
			Address::from_hex_digit(frame[0]).ok_or_else(|| MalformedAddressError::new(raw))?;
		let code = &frame[1..3];
		let payload = &frame[3..];

		let kind = match expected {
			Some(kind) if kind.code() == code => kind,
			_ => ReplyKind::from_code(code).ok_or_else(|| UnknownReplyError::new(raw))?,
		};

		let text = self
			.encoding
			.decode(payload)
			.ok_or_else(|| PayloadDecodeError::new(raw))?;
		let value = kind
			.decoder()
			.decode(text, &self.units)
			.map_err(|_| PayloadDecodeError::new(raw))?;

		Ok(Reply::new(kind, value, address))
	}
}

/// Remove any trailing carriage returns and line feeds.
fn strip_terminator(raw: &[u8]) -> &[u8] {
	let end = raw
		.iter()
		.rposition(|&b| !matches!(b, b'\r' | b'\n'))
		.map_or(0, |i| i + 1);
	&raw[..end]
}

/// Compose a command frame using the default [`Codec`].
///
/// See [`Codec::compose`].
pub fn compose(command: HostCommand, payload: &str, address: Address) -> String {
	Codec::default().compose(command, payload, address)
}

/// Parse a reply frame using the default [`Codec`].
///
/// See [`Codec::parse`].
pub fn parse(raw: &[u8]) -> Result<Reply, ParseError> {
	Codec::default().parse(raw)
}
