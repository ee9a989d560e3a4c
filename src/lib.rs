//! A library for driving Thorlabs Elliptec piezo stages over their serial protocol.
//!
//! The protocol is line oriented ASCII: the host writes frames such as
//! `0ma00002000` (move the device at address `0` to 4 mm) and the device
//! answers with frames such as `0PO00002000\r\n`.
//!
//! * [`session`]: open a port and drive a stage with one method per command.
//! * [`router`]: wait for a specific kind of reply, discarding the rest.
//! * [`frame`]: compose command frames and parse reply frames.
//! * [`command`] and [`reply`]: the command and reply catalogues.
//! * [`units`]: convert between millimetres, pulses, and hexadecimal fields.
//!
//! ```rust
//! # use ellproto::{error::Error, session::Session};
//! # fn wrapper() -> Result<(), Error> {
//! let mut session = Session::open_serial("/dev/ttyUSB0")?;
//! session.home()?;
//! session.await_position(5)?;
//! session.move_absolute(2.0)?;
//! let position = session.await_position(5)?;
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod command;
pub mod error;
pub mod frame;
pub mod reply;
pub mod router;
pub mod session;
pub mod timeout_guard;
pub mod units;

pub use session::Session;
