//! Types for opening and driving a stage over a serial port.
//!
//! A [`Session`] owns a [`Backend`] and talks to the device at one address.
//! Commands are sent without waiting for an acknowledgement. Devices answer
//! asynchronously, usually with a status reply followed by the data, so
//! callers wait for the reply they need explicitly:
//!
//! ```rust
//! # use ellproto::{error::Error, session::Session};
//! # fn wrapper() -> Result<(), Error> {
//! let mut session = Session::open_serial("/dev/ttyUSB0")?;
//! session.home()?;
//! let position = session.await_position(5)?;
//! session.move_absolute(position + 2.0)?;
//! session.await_position(5)?;
//! # Ok(())
//! # }
//! ```
//!
//! Once [`closed`](Session::close), every operation fails with a
//! [`SessionClosedError`].

mod options;
#[cfg(test)]
mod test;

use crate::backend::{Backend, Serial, UNKNOWN_BACKEND_NAME};
use crate::{
	command::HostCommand,
	error::{Error, RangeError, SessionClosedError},
	frame::{Address, Codec},
	reply::{Reply, ReplyKind},
	router,
	timeout_guard::TimeoutGuard,
	units::{self, HexWidth},
};
pub use options::*;
use std::{io, time::Duration};

/// One of the two motors in a stage.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Motor {
	/// Motor 1.
	One,
	/// Motor 2.
	Two,
}

impl TryFrom<u8> for Motor {
	type Error = RangeError;
	fn try_from(value: u8) -> Result<Self, Self::Error> {
		match value {
			1 => Ok(Motor::One),
			2 => Ok(Motor::Two),
			_ => Err(RangeError::new(format!("motor {value} is not 1 or 2"))),
		}
	}
}

impl Motor {
	/// Pick the command for this motor.
	fn pick(self, one: HostCommand, two: HostCommand) -> HostCommand {
		match self {
			Motor::One => one,
			Motor::Two => two,
		}
	}
}

/// A session with the device at one address.
pub struct Session<B> {
	/// The underlying backend. `None` once the session is closed.
	backend: Option<B>,
	/// The address of the device
	address: Address,
	/// The codec used for frames
	codec: Codec,
	/// The motor and motion parameters
	tuning: Tuning,
	/// If populated, the error that has "poisoned" the session. This error
	/// MUST be reported before the session is used for communication again.
	///
	/// For instance, if a [`TimeoutGuard`] cannot restore the original timeout
	/// in its Drop implementation, rather than panicking it poisons the session.
	poison: Option<io::Error>,
}

impl<B: Backend> std::fmt::Debug for Session<B> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Session")
			.field("name", &self.backend.as_ref().and_then(Backend::name))
			.field("address", &self.address)
			.finish_non_exhaustive()
	}
}

impl Session<Serial> {
	/// Open the serial port at the specified path using the default options.
	///
	/// The device at address 0 is initialized before the session is returned.
	/// Alternatively, use [`Session::open_serial_options`] to customize how
	/// the port is opened.
	///
	/// ## Example
	///
	/// ```rust
	/// # use ellproto::session::Session;
	/// # fn wrapper() -> Result<(), Box<dyn std::error::Error>> {
	/// let mut session = Session::open_serial("/dev/ttyUSB0")?;
	/// // Or equivalently
	/// let mut session = Session::open_serial_options().open("/dev/ttyUSB0")?;
	/// # Ok(())
	/// # }
	/// ```
	pub fn open_serial(path: &str) -> Result<Session<Serial>, Error> {
		OpenSerialOptions::new().open(path)
	}

	/// Get an [`OpenSerialOptions`] to customize how a serial port is opened.
	pub fn open_serial_options() -> OpenSerialOptions {
		OpenSerialOptions::default()
	}
}

impl<B: Backend> Session<B> {
	/// Start a session with the device at `address` over an open backend.
	///
	/// The default codec and tuning are used and nothing is sent. Use
	/// [`OpenSerialOptions::open_backend`] for more control.
	pub fn from_backend(backend: B, address: Address) -> Self {
		Session::with_parts(backend, address, Codec::default(), Tuning::default())
	}

	/// Create a `Session` from all of its parts.
	fn with_parts(backend: B, address: Address, codec: Codec, tuning: Tuning) -> Self {
		Session {
			backend: Some(backend),
			address,
			codec,
			tuning,
			poison: None,
		}
	}

	/// Get the backend, reporting any poison and whether the session is closed.
	fn checked_backend(&mut self) -> Result<&mut B, Error> {
		if let Some(poison) = self.poison.take() {
			return Err(poison.into());
		}
		self.backend.as_mut().ok_or(Error::SessionClosed(SessionClosedError))
	}

	/// Write a raw frame to the device.
	///
	/// No address is added and the frame is not validated.
	pub fn raw_command(&mut self, frame: &str) -> Result<(), Error> {
		let backend = self.checked_backend()?;
		log::debug!(
			"{} TX: {frame}",
			backend.name().as_deref().unwrap_or(UNKNOWN_BACKEND_NAME)
		);
		io::Write::write_all(backend, frame.as_bytes())?;
		io::Write::flush(backend)?;
		Ok(())
	}

	/// Send a command with the given payload to the device.
	///
	/// The reply, if any, is not read. Use [`Session::await_reply`] afterwards.
	pub fn send(&mut self, command: HostCommand, payload: &str) -> Result<(), Error> {
		let frame = self.codec.compose(command, payload, self.address);
		self.raw_command(&frame)
	}

	/// Wait for a reply of the `expected` kind.
	///
	/// See [`router::await_reply`] for how replies are matched and how many
	/// lines are read.
	pub fn await_reply(&mut self, expected: ReplyKind, max_attempts: usize) -> Result<Reply, Error> {
		let codec = self.codec;
		router::await_reply(self.checked_backend()?, &codec, expected, max_attempts)
	}

	/// Wait for a position reply and return the position in millimetres.
	pub fn await_position(&mut self, max_attempts: usize) -> Result<f64, Error> {
		let codec = self.codec;
		router::await_position(self.checked_backend()?, &codec, max_attempts)
	}

	/// Wait for a status reply.
	pub fn await_status(&mut self, max_attempts: usize) -> Result<Reply, Error> {
		let codec = self.codec;
		router::await_status(self.checked_backend()?, &codec, max_attempts)
	}

	/// Push the motor periods and velocity from the session's [`Tuning`].
	///
	/// This is run automatically when a session is opened with
	/// [`OpenSerialOptions`] unless disabled.
	pub fn initialize(&mut self) -> Result<(), Error> {
		let tuning = self.tuning;
		self.set_motor_periods(
			Motor::One,
			tuning.motor1_forward_period,
			tuning.motor1_backward_period,
		)?;
		self.set_motor_periods(
			Motor::Two,
			tuning.motor2_forward_period,
			tuning.motor2_backward_period,
		)?;
		self.set_velocity(tuning.velocity)
	}

	/// Set the forward and backward periods of a motor.
	///
	/// Motor 1 only accepts periods whose most significant hexadecimal digit
	/// is `8`, so that digit is always replaced, e.g., `183` is sent as `80B7`.
	pub fn set_motor_periods(
		&mut self,
		motor: Motor,
		forward: u16,
		backward: u16,
	) -> Result<(), Error> {
		let mut forward_hex = units::to_hex(i64::from(forward), HexWidth::Word)?;
		let mut backward_hex = units::to_hex(i64::from(backward), HexWidth::Word)?;
		if motor == Motor::One {
			forward_hex.replace_range(..1, "8");
			backward_hex.replace_range(..1, "8");
		}
		self.send(
			motor.pick(
				HostCommand::SetForwardPeriodMotor1,
				HostCommand::SetForwardPeriodMotor2,
			),
			&forward_hex,
		)?;
		self.send(
			motor.pick(
				HostCommand::SetBackwardPeriodMotor1,
				HostCommand::SetBackwardPeriodMotor2,
			),
			&backward_hex,
		)
	}

	/// Request the device status (`GS` reply).
	pub fn get_status(&mut self) -> Result<(), Error> {
		self.send(HostCommand::GetStatus, "")
	}

	/// Request the device information (`IN` reply).
	///
	/// Decode the reply's payload with [`DeviceInfo::parse`](crate::reply::DeviceInfo::parse).
	pub fn get_information(&mut self) -> Result<(), Error> {
		self.send(HostCommand::Information, "")
	}

	/// Save the current motor parameters to the device's non-volatile memory.
	pub fn save_user_data(&mut self) -> Result<(), Error> {
		self.send(HostCommand::SaveUserData, "")
	}

	/// Change the device's address.
	///
	/// Once the command is written, the session talks to the new address.
	pub fn change_address(&mut self, address: Address) -> Result<(), Error> {
		self.send(HostCommand::ChangeAddress, &address.to_string())?;
		self.address = address;
		Ok(())
	}

	/// Temporarily group the device with others at `address` so they move together.
	pub fn group_address(&mut self, address: Address) -> Result<(), Error> {
		self.send(HostCommand::GroupAddress, &address.to_string())
	}

	/// Request a motor's information (`I1`/`I2` reply).
	pub fn get_motor_info(&mut self, motor: Motor) -> Result<(), Error> {
		self.send(
			motor.pick(HostCommand::Motor1Info, HostCommand::Motor2Info),
			"",
		)
	}

	/// Search for a motor's optimal frequency.
	pub fn search_frequency(&mut self, motor: Motor) -> Result<(), Error> {
		self.send(
			motor.pick(
				HostCommand::SearchFrequencyMotor1,
				HostCommand::SearchFrequencyMotor2,
			),
			"",
		)
	}

	/// Scan a motor's current curve (`C1`/`C2` reply).
	pub fn scan_current_curve(&mut self, motor: Motor) -> Result<(), Error> {
		self.send(
			motor.pick(
				HostCommand::ScanCurrentCurveMotor1,
				HostCommand::ScanCurrentCurveMotor2,
			),
			"",
		)
	}

	/// Isolate the device from the bus for the given number of minutes.
	pub fn isolate(&mut self, minutes: u8) -> Result<(), Error> {
		let payload = units::to_hex(i64::from(minutes), HexWidth::Byte)?;
		self.send(HostCommand::IsolateMinutes, &payload)
	}

	/// Move to the home position.
	///
	/// The direction is always `0` (clockwise on rotary stages).
	pub fn home(&mut self) -> Result<(), Error> {
		self.send(HostCommand::Home, "0")
	}

	/// Move to an absolute position in millimetres.
	pub fn move_absolute(&mut self, mm: f64) -> Result<(), Error> {
		let payload = self.encode_distance(mm)?;
		self.send(HostCommand::MoveAbsolute, &payload)
	}

	/// Move forward by a distance in millimetres.
	pub fn move_relative(&mut self, mm: f64) -> Result<(), Error> {
		let payload = self.encode_distance(mm)?;
		self.send(HostCommand::MoveRelative, &payload)
	}

	/// Request the home offset (`HO` reply).
	pub fn get_home_offset(&mut self) -> Result<(), Error> {
		self.send(HostCommand::GetHomeOffset, "")
	}

	/// Set the home offset in millimetres.
	pub fn set_home_offset(&mut self, mm: f64) -> Result<(), Error> {
		let payload = self.encode_distance(mm)?;
		self.send(HostCommand::SetHomeOffset, &payload)
	}

	/// Request the jog step size (`GJ` reply).
	pub fn get_jog_step_size(&mut self) -> Result<(), Error> {
		self.send(HostCommand::GetJogStepSize, "")
	}

	/// Set the jog step size in millimetres.
	pub fn set_jog_step_size(&mut self, mm: f64) -> Result<(), Error> {
		let payload = self.encode_distance(mm)?;
		self.send(HostCommand::SetJogStepSize, &payload)
	}

	/// Jog forward by one step.
	pub fn forward(&mut self) -> Result<(), Error> {
		self.send(HostCommand::Forward, "")
	}

	/// Jog backward by one step.
	pub fn backward(&mut self) -> Result<(), Error> {
		self.send(HostCommand::Backward, "")
	}

	/// Stop any motion.
	pub fn stop(&mut self) -> Result<(), Error> {
		self.send(HostCommand::MotionStop, "")
	}

	/// Request the current position (`PO` reply).
	pub fn get_position(&mut self) -> Result<(), Error> {
		self.send(HostCommand::GetPosition, "")
	}

	/// Request the velocity (`GV` reply).
	pub fn get_velocity(&mut self) -> Result<(), Error> {
		self.send(HostCommand::GetVelocity, "")
	}

	/// Set the velocity as a percentage of the maximum.
	pub fn set_velocity(&mut self, percent: u8) -> Result<(), Error> {
		if percent > 100 {
			return Err(RangeError::new(format!("velocity {percent}% is above 100%")).into());
		}
		let payload = units::to_hex(i64::from(percent), HexWidth::Byte)?;
		self.send(HostCommand::SetVelocity, &payload)
	}

	/// Encode a distance, checking it against the stage's travel.
	fn encode_distance(&self, mm: f64) -> Result<String, RangeError> {
		if let Some(travel) = self.tuning.travel {
			if !(0.0..=travel).contains(&mm) {
				return Err(RangeError::new(format!(
					"{mm} mm is outside the travel of the stage (0 to {travel} mm)"
				)));
			}
		}
		self.codec.units.position_to_hex(mm)
	}

	/// Set the read timeout and return a "scope guard" that will reset the timeout when it goes out of scope.
	///
	/// If no timeout is specified, reads can block indefinitely.
	///
	/// While the guard is in scope, the session can only be accessed through the guard.
	/// However, because the guard implements [`Deref`](std::ops::Deref) and [`DerefMut`](std::ops::DerefMut) callers can treat the guard as the session.
	///
	/// ## Example
	/// ```rust
	/// # use ellproto::{error::Error, session::Session, backend::Backend};
	/// # use std::time::Duration;
	/// # fn helper<B: Backend>(mut session: Session<B>) -> Result<f64, Error> {
	/// {
	///     let mut guard = session.timeout_guard(Some(Duration::from_secs(10)))?;
	///     // Homing can take a while, so wait for the position with a longer timeout.
	///     guard.home()?;
	///     guard.await_position(5)?;
	/// }  // The guard is dropped and the timeout is reset.
	///
	/// // This uses the original timeout
	/// session.get_position()?;
	/// session.await_position(5)
	/// # }
	/// ```
	pub fn timeout_guard(
		&mut self,
		timeout: Option<Duration>,
	) -> Result<TimeoutGuard<'_, B, Self>, Error> {
		self.checked_backend()?;
		TimeoutGuard::new(self, timeout)
	}

	/// Set the read timeout and return the old timeout.
	///
	/// If timeout is `None`, reads will block indefinitely.
	pub fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<Option<Duration>, Error> {
		let backend = self.checked_backend()?;
		let old = backend.read_timeout()?;
		backend.set_read_timeout(timeout)?;
		Ok(old)
	}

	/// Get the read timeout.
	///
	/// If it is `None`, reads will block indefinitely.
	pub fn read_timeout(&self) -> Result<Option<Duration>, Error> {
		Ok(self.backend()?.read_timeout()?)
	}

	/// Get the "name" of the session's backend.
	///
	/// Returns `None` if the backend has no name or the session is closed.
	pub fn name(&self) -> Option<String> {
		self.backend.as_ref().and_then(Backend::name)
	}

	/// Get a reference to the backend.
	pub fn backend(&self) -> Result<&B, Error> {
		self.backend
			.as_ref()
			.ok_or(Error::SessionClosed(SessionClosedError))
	}
}

impl<B> Session<B> {
	/// Get the address of the device.
	pub fn address(&self) -> Address {
		self.address
	}

	/// Get the codec used for frames.
	pub fn codec(&self) -> &Codec {
		&self.codec
	}

	/// Get the motor and motion parameters.
	pub fn tuning(&self) -> &Tuning {
		&self.tuning
	}

	/// Set the motor and motion parameters and return the old ones.
	///
	/// Nothing is sent. Call [`Session::initialize`] to push them to the device.
	pub fn set_tuning(&mut self, tuning: Tuning) -> Tuning {
		std::mem::replace(&mut self.tuning, tuning)
	}

	/// Whether the session still owns its backend.
	pub fn is_open(&self) -> bool {
		self.backend.is_some()
	}

	/// Close the session and return the backend.
	///
	/// Returns `None` if the session was already closed. Any pending poison is
	/// discarded.
	pub fn close(&mut self) -> Option<B> {
		self.poison = None;
		self.backend.take()
	}
}

impl<B: Backend> crate::timeout_guard::Port<B> for Session<B> {
	fn backend_mut(&mut self) -> Option<&mut B> {
		self.backend.as_mut()
	}
	fn poison(&mut self, e: io::Error) {
		self.poison = Some(e);
	}
}
