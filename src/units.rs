//! Conversions between physical positions, device pulse counts, and the
//! fixed-width hexadecimal fields used on the wire.
//!
//! Devices are case sensitive: all hexadecimal fields are written with
//! upper-case digits and zero-padded to their full width.
//!
//! ```
//! use ellproto::units::{self, HexWidth};
//!
//! assert_eq!(units::position_to_hex(4.0)?, "00002000");
//! assert_eq!(units::hex_to_position("00001000")?, 2.0);
//! assert_eq!(units::to_hex(78, HexWidth::Word)?, "004E");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use crate::error::{InvalidHexError, RangeError};
use std::num::NonZeroU32;

/// The number of pulses per millimetre of travel used by default: 2048.
pub const DEFAULT_PULSES_PER_MM: NonZeroU32 = match NonZeroU32::new(2048) {
	Some(value) => value,
	None => unreachable!(),
};

/// The width of a hexadecimal field on the wire.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum HexWidth {
	/// An 8-bit field, 2 digits (e.g., velocity).
	Byte,
	/// A 16-bit field, 4 digits (e.g., motor periods).
	Word,
	/// A 32-bit field, 8 digits (e.g., positions).
	Dword,
}

impl HexWidth {
	/// The number of hexadecimal digits in a field of this width.
	pub const fn digits(self) -> usize {
		match self {
			HexWidth::Byte => 2,
			HexWidth::Word => 4,
			HexWidth::Dword => 8,
		}
	}

	/// The largest value a field of this width can hold.
	pub const fn max(self) -> u32 {
		match self {
			HexWidth::Byte => 0xFF,
			HexWidth::Word => 0xFFFF,
			HexWidth::Dword => u32::MAX,
		}
	}
}

/// Render `value` as an upper-case hexadecimal field of the given width.
///
/// Values outside `[0, width.max()]` are rejected.
pub fn to_hex(value: i64, width: HexWidth) -> Result<String, RangeError> {
	match u32::try_from(value) {
		Ok(v) if v <= width.max() => Ok(format!("{v:0digits$X}", digits = width.digits())),
		_ => Err(RangeError::new(format!(
			"{value} does not fit in a {}-digit hexadecimal field (0 to {})",
			width.digits(),
			width.max()
		))),
	}
}

/// Parse a hexadecimal field of at most 8 digits.
///
/// Only hexadecimal digits are accepted: signs, whitespace, and prefixes are not.
pub fn from_hex(text: &str) -> Result<u32, InvalidHexError> {
	let valid = !text.is_empty()
		&& text.len() <= HexWidth::Dword.digits()
		&& text.bytes().all(|b| b.is_ascii_hexdigit());
	if !valid {
		return Err(InvalidHexError::new(text));
	}
	u32::from_str_radix(text, 16).map_err(|_| InvalidHexError::new(text))
}

/// Converts between millimetres and device pulses at a fixed scale.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Units {
	/// The number of pulses in one millimetre.
	pulses_per_mm: NonZeroU32,
}

impl Units {
	/// Create a converter with a custom scale.
	pub const fn new(pulses_per_mm: NonZeroU32) -> Self {
		Units { pulses_per_mm }
	}

	/// The number of pulses in one millimetre.
	pub const fn pulses_per_mm(&self) -> NonZeroU32 {
		self.pulses_per_mm
	}

	/// Convert a position to the nearest whole number of pulses.
	///
	/// Positions that round to a negative count, or to more pulses than fit in
	/// 32 bits, are rejected.
	pub fn mm_to_pulses(&self, mm: f64) -> Result<u32, RangeError> {
		let pulses = (mm * f64::from(self.pulses_per_mm.get())).round();
		// NaN fails the `contains` check as well.
		if (0.0..=f64::from(u32::MAX)).contains(&pulses) {
			Ok(pulses as u32)
		} else {
			Err(RangeError::new(format!(
				"{mm} mm is not representable as a pulse count (0 to {} mm)",
				self.pulses_to_mm(u32::MAX)
			)))
		}
	}

	/// Convert a pulse count to millimetres.
	pub fn pulses_to_mm(&self, pulses: u32) -> f64 {
		f64::from(pulses) / f64::from(self.pulses_per_mm.get())
	}

	/// Convert a position to the 8-digit hexadecimal field the device expects.
	pub fn position_to_hex(&self, mm: f64) -> Result<String, RangeError> {
		to_hex(i64::from(self.mm_to_pulses(mm)?), HexWidth::Dword)
	}

	/// Convert a hexadecimal pulse count reported by a device to millimetres.
	pub fn hex_to_position(&self, hex: &str) -> Result<f64, InvalidHexError> {
		Ok(self.pulses_to_mm(from_hex(hex)?))
	}
}

impl Default for Units {
	/// 2048 pulses per millimetre.
	fn default() -> Self {
		Units::new(DEFAULT_PULSES_PER_MM)
	}
}

/// Convert a position to an 8-digit hexadecimal field at the default scale.
///
/// See [`Units::position_to_hex`].
pub fn position_to_hex(mm: f64) -> Result<String, RangeError> {
	Units::default().position_to_hex(mm)
}

/// Convert a hexadecimal pulse count to millimetres at the default scale.
///
/// See [`Units::hex_to_position`].
pub fn hex_to_position(hex: &str) -> Result<f64, InvalidHexError> {
	Units::default().hex_to_position(hex)
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn position_to_hex_known_values() {
		assert_eq!(position_to_hex(4.0).unwrap(), "00002000");
		assert_eq!(position_to_hex(0.0).unwrap(), "00000000");
		assert_eq!(position_to_hex(60.0).unwrap(), "0001E000");
		// Rounds to the nearest pulse.
		assert_eq!(position_to_hex(1.0 / 2048.0 * 0.6).unwrap(), "00000001");
		assert_eq!(position_to_hex(1.0 / 2048.0 * 0.4).unwrap(), "00000000");
	}

	#[test]
	fn hex_to_position_known_values() {
		assert_eq!(hex_to_position("00001000").unwrap(), 2.0);
		assert_eq!(hex_to_position("00002000").unwrap(), 4.0);
		assert_eq!(hex_to_position("0001e000").unwrap(), 60.0);
	}

	#[test]
	fn hex_round_trip_is_exact_on_pulse_boundaries() {
		let position = hex_to_position("00001234").unwrap();
		assert_eq!(position_to_hex(position).unwrap(), "00001234");
	}

	#[test]
	fn position_round_trip_is_within_one_pulse() {
		let one_pulse = 1.0 / 2048.0;
		let max = Units::default().pulses_to_mm(u32::MAX);
		let mut mm = 0.0;
		while mm < 100.0 {
			let back = hex_to_position(&position_to_hex(mm).unwrap()).unwrap();
			assert!((back - mm).abs() <= one_pulse, "{mm} came back as {back}");
			mm += 0.0137;
		}
		for mm in [max, max - 0.25, 1_000_000.123, 2.0e6] {
			let back = hex_to_position(&position_to_hex(mm).unwrap()).unwrap();
			assert!((back - mm).abs() <= one_pulse, "{mm} came back as {back}");
		}
	}

	#[test]
	fn position_out_of_range() {
		assert!(position_to_hex(-1.0).is_err());
		assert!(position_to_hex(-0.001).is_err());
		assert!(position_to_hex(3.0e6).is_err());
		assert!(position_to_hex(f64::NAN).is_err());
		assert!(position_to_hex(f64::INFINITY).is_err());
	}

	#[test]
	fn to_hex_widths() {
		assert_eq!(to_hex(78, HexWidth::Word).unwrap(), "004E");
		assert_eq!(to_hex(100, HexWidth::Byte).unwrap(), "64");
		assert_eq!(to_hex(0xFFFF, HexWidth::Word).unwrap(), "FFFF");
		assert_eq!(to_hex(0xFFFF_FFFF, HexWidth::Dword).unwrap(), "FFFFFFFF");
		assert_eq!(to_hex(0xab, HexWidth::Dword).unwrap(), "000000AB");

		assert!(to_hex(-1, HexWidth::Word).is_err());
		assert!(to_hex(0x1_0000, HexWidth::Word).is_err());
		assert!(to_hex(0x100, HexWidth::Byte).is_err());
		assert!(to_hex(0x1_0000_0000, HexWidth::Dword).is_err());
	}

	#[test]
	fn from_hex_rejects_non_digits() {
		assert_eq!(from_hex("004E").unwrap(), 78);
		assert_eq!(from_hex("4e").unwrap(), 78);
		for text in ["", "+1000", "-1", " 12", "0x12", "123456789", "G0"] {
			assert!(from_hex(text).is_err(), "{text:?} was accepted");
		}
	}

	#[test]
	fn custom_scale() {
		let units = Units::new(NonZeroU32::new(1000).unwrap());
		assert_eq!(units.mm_to_pulses(1.5).unwrap(), 1500);
		assert_eq!(units.position_to_hex(1.0).unwrap(), "000003E8");
		assert_eq!(units.hex_to_position("000003E8").unwrap(), 1.0);
	}
}
