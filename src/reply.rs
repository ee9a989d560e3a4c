//! Replies received from a device.
//!
//! Every reply starts with the address of the device that sent it and an
//! upper-case, two character code identifying its [kind](ReplyKind). The kind
//! decides how the rest of the frame, the payload, is decoded into a [`Value`].
//!
//! The catalogue of reply kinds is a fixed table of [`Descriptor`]s. Some codes
//! appear more than once: `PO` is listed both as [`ReplyKind::Position`],
//! which decodes the payload into millimetres, and as
//! [`ReplyKind::RawPosition`], which keeps the text. Looking up a code picks
//! the first matching entry; the [`router`](crate::router) resolves the
//! ambiguity with the kind the caller is waiting for.

use crate::{
	error::{fault_code, InvalidHexError},
	frame::Address,
	units::{self, Units},
};

/// The kinds of reply a device can send.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ReplyKind {
	/// `GS`: the device status or fault code.
	Status,
	/// `PO`: the current position, decoded into millimetres.
	Position,
	/// `PO`: the current position as the raw hexadecimal pulse count.
	RawPosition,
	/// `IN`: device information. See [`DeviceInfo`].
	Information,
	/// `I1`: motor 1 information.
	Motor1Info,
	/// `I2`: motor 2 information.
	Motor2Info,
	/// `C1`: motor 1 current curve measurement.
	CurrentCurveMotor1,
	/// `C2`: motor 2 current curve measurement.
	CurrentCurveMotor2,
	/// `HO`: the home offset.
	HomeOffset,
	/// `GJ`: the jog step size.
	JogStepSize,
	/// `GV`: the velocity, as a percentage of maximum.
	Velocity,
	/// `BS`: the button status.
	ButtonStatus,
	/// `BO`: the button position.
	ButtonPosition,
}

/// How a reply's payload is decoded.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Decoder {
	/// A hexadecimal pulse count converted to millimetres.
	Position,
	/// The text is passed through unchanged.
	Text,
}

impl Decoder {
	/// Decode the payload text of a reply.
	pub fn decode(self, text: &str, units: &Units) -> Result<Value, InvalidHexError> {
		match self {
			Decoder::Position => units.hex_to_position(text).map(Value::Position),
			Decoder::Text => Ok(Value::Text(text.to_string())),
		}
	}
}

/// A catalogue entry describing one kind of reply.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Descriptor {
	/// The kind of reply.
	pub kind: ReplyKind,
	/// The two byte code identifying the reply on the wire.
	pub code: [u8; 2],
	/// A human readable name.
	pub name: &'static str,
	/// How the payload is decoded.
	pub decoder: Decoder,
}

macro_rules! descriptor {
	($kind:ident, $code:literal, $name:literal, $decoder:ident) => {
		Descriptor {
			kind: ReplyKind::$kind,
			code: *$code,
			name: $name,
			decoder: Decoder::$decoder,
		}
	};
}

/// The reply catalogue, in [`ReplyKind`] declaration order.
static CATALOGUE: [Descriptor; 13] = [
	descriptor!(Status, b"GS", "Status", Text),
	descriptor!(Position, b"PO", "Position", Position),
	descriptor!(RawPosition, b"PO", "Raw Position", Text),
	descriptor!(Information, b"IN", "Information", Text),
	descriptor!(Motor1Info, b"I1", "Motor 1 Info", Text),
	descriptor!(Motor2Info, b"I2", "Motor 2 Info", Text),
	descriptor!(CurrentCurveMotor1, b"C1", "Current Curve Motor 1", Text),
	descriptor!(CurrentCurveMotor2, b"C2", "Current Curve Motor 2", Text),
	descriptor!(HomeOffset, b"HO", "Home Offset", Text),
	descriptor!(JogStepSize, b"GJ", "Jog Step Size", Text),
	descriptor!(Velocity, b"GV", "Velocity", Text),
	descriptor!(ButtonStatus, b"BS", "Button Status", Text),
	descriptor!(ButtonPosition, b"BO", "Button Position", Text),
];

impl ReplyKind {
	/// Get the full catalogue of reply kinds.
	pub fn catalogue() -> &'static [Descriptor] {
		&CATALOGUE
	}

	/// Find the first kind in the catalogue with the given code.
	///
	/// The match is exact and case sensitive. `None` is returned if no entry matches.
	pub fn from_code(code: &[u8]) -> Option<ReplyKind> {
		CATALOGUE
			.iter()
			.find(|descriptor| descriptor.code == code)
			.map(|descriptor| descriptor.kind)
	}

	/// Get the catalogue entry for this kind.
	pub fn descriptor(self) -> &'static Descriptor {
		&CATALOGUE[self as usize]
	}

	/// Get the two byte code of this kind.
	pub fn code(self) -> [u8; 2] {
		self.descriptor().code
	}

	/// Get the name of this kind.
	pub fn name(self) -> &'static str {
		self.descriptor().name
	}

	/// Get the decoder for this kind's payload.
	pub fn decoder(self) -> Decoder {
		self.descriptor().decoder
	}
}

impl std::fmt::Display for ReplyKind {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let code = self.code();
		write!(
			f,
			"{} ({}{})",
			self.name(),
			char::from(code[0]),
			char::from(code[1])
		)
	}
}

/// The decoded payload of a reply.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
	/// A position in millimetres.
	Position(f64),
	/// The payload text, undecoded.
	Text(String),
}

impl Value {
	/// Get the position, if this is one.
	pub fn as_position(&self) -> Option<f64> {
		match self {
			Value::Position(mm) => Some(*mm),
			Value::Text(_) => None,
		}
	}

	/// Get the text, if the payload was passed through undecoded.
	pub fn as_text(&self) -> Option<&str> {
		match self {
			Value::Position(_) => None,
			Value::Text(text) => Some(text),
		}
	}
}

impl std::fmt::Display for Value {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Value::Position(mm) => write!(f, "{mm} mm"),
			Value::Text(text) => write!(f, "{text:?}"),
		}
	}
}

/// A parsed reply: what kind it is, its decoded payload and who sent it.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
	/// The kind of reply
	kind: ReplyKind,
	/// The decoded payload
	value: Value,
	/// The address of the device that sent the reply
	address: Address,
}

impl Reply {
	/// Create a new reply.
	pub(crate) fn new(kind: ReplyKind, value: Value, address: Address) -> Self {
		Reply {
			kind,
			value,
			address,
		}
	}

	/// Get the kind of reply.
	pub fn kind(&self) -> ReplyKind {
		self.kind
	}

	/// Get the decoded payload.
	pub fn value(&self) -> &Value {
		&self.value
	}

	/// Get the address of the device that sent the reply.
	pub fn address(&self) -> Address {
		self.address
	}

	/// Get the position in millimetres, if this is a [`Position`](ReplyKind::Position) reply.
	pub fn position(&self) -> Option<f64> {
		self.value.as_position()
	}

	/// Decode the device status, if this is a [`Status`](ReplyKind::Status) reply.
	pub fn status(&self) -> Option<Result<DeviceStatus, InvalidHexError>> {
		match (self.kind, &self.value) {
			(ReplyKind::Status, Value::Text(text)) => Some(DeviceStatus::from_payload(text)),
			_ => None,
		}
	}

	/// Consume the reply and return its kind, value and address.
	pub fn into_parts(self) -> (ReplyKind, Value, Address) {
		(self.kind, self.value, self.address)
	}
}

impl std::fmt::Display for Reply {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{} from {}: {}", self.kind, self.address, self.value)
	}
}

/// A fault reported by a device.
///
/// Faults are data the device sends in its status reply, not errors detected
/// by this crate. See [`fault_code`] for the documented codes.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct DeviceFault(u8);

impl DeviceFault {
	/// Get the fault code.
	pub const fn code(self) -> u8 {
		self.0
	}

	/// Get the name of the fault, if the code is documented.
	pub const fn name(self) -> Option<&'static str> {
		fault_code::name(self.0)
	}

	/// Whether the device is busy rather than faulted.
	pub const fn is_busy(self) -> bool {
		self.0 == fault_code::BUSY
	}
}

impl std::fmt::Display for DeviceFault {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(
			f,
			"[{}] {}",
			self.0,
			self.name().unwrap_or("<Unknown fault code>")
		)
	}
}

/// The status a device reports in a `GS` reply.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum DeviceStatus {
	/// No fault.
	Ok,
	/// The device is busy or faulted.
	Fault(DeviceFault),
}

impl DeviceStatus {
	/// Decode the hexadecimal payload of a status reply.
	pub fn from_payload(text: &str) -> Result<DeviceStatus, InvalidHexError> {
		let code = u8::try_from(units::from_hex(text)?).map_err(|_| InvalidHexError::new(text))?;
		Ok(if code == 0 {
			DeviceStatus::Ok
		} else {
			DeviceStatus::Fault(DeviceFault(code))
		})
	}

	/// Whether the device reported no fault.
	pub fn is_ok(&self) -> bool {
		matches!(self, DeviceStatus::Ok)
	}

	/// Whether the device reported that it is busy.
	pub fn is_busy(&self) -> bool {
		matches!(self, DeviceStatus::Fault(fault) if fault.is_busy())
	}

	/// Get the fault, if there is one.
	pub fn fault(&self) -> Option<DeviceFault> {
		match self {
			DeviceStatus::Ok => None,
			DeviceStatus::Fault(fault) => Some(*fault),
		}
	}
}

/// The decoded payload of an [`Information`](ReplyKind::Information) reply.
///
/// ```
/// use ellproto::reply::DeviceInfo;
///
/// let info = DeviceInfo::parse("0E1140051720231701016800023000")?;
/// assert_eq!(info.model, 14);
/// assert_eq!(info.serial, "11400517");
/// assert_eq!(info.travel, 360);
/// # Ok::<(), ellproto::error::InvalidHexError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceInfo {
	/// The model number (e.g., `20` for an ELL20).
	pub model: u8,
	/// The serial number.
	pub serial: String,
	/// The year of manufacture.
	pub year: u16,
	/// The firmware release.
	pub firmware: u8,
	/// The hardware release. The top bit marks an imperial thread.
	pub hardware: u8,
	/// The travel, in millimetres or degrees.
	pub travel: u32,
	/// The number of pulses per millimetre or degree.
	pub pulses_per_unit: u32,
}

impl DeviceInfo {
	/// The number of characters in an information payload.
	const PAYLOAD_LEN: usize = 30;

	/// Decode the payload of an information reply.
	pub fn parse(text: &str) -> Result<DeviceInfo, InvalidHexError> {
		let invalid = || InvalidHexError::new(text);
		if text.len() != Self::PAYLOAD_LEN || !text.is_ascii() {
			return Err(invalid());
		}
		let hex = |range: std::ops::Range<usize>| units::from_hex(&text[range]);
		Ok(DeviceInfo {
			model: u8::try_from(hex(0..2)?).map_err(|_| invalid())?,
			serial: text[2..10].to_string(),
			year: text[10..14].parse().map_err(|_| invalid())?,
			firmware: u8::try_from(hex(14..16)?).map_err(|_| invalid())?,
			hardware: u8::try_from(hex(16..18)?).map_err(|_| invalid())?,
			travel: hex(18..22)?,
			pulses_per_unit: hex(22..30)?,
		})
	}
}
