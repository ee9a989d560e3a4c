//! Types defining the different options when opening a session.

use super::Session;
use crate::{
    backend::{Backend, Serial},
    error::Error,
    frame::{Address, Codec},
};
use serialport as sp;
use std::time::Duration;

/// Motor and motion parameters pushed to a device by
/// [`Session::initialize`] and used to validate moves.
///
/// The defaults suit an ELL20 linear stage.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Tuning {
    /// Motor 1 forward period.
    pub motor1_forward_period: u16,
    /// Motor 1 backward period.
    pub motor1_backward_period: u16,
    /// Motor 2 forward period.
    pub motor2_forward_period: u16,
    /// Motor 2 backward period.
    pub motor2_backward_period: u16,
    /// The velocity as a percentage of the maximum (0 to 100).
    pub velocity: u8,
    /// The travel of the stage in millimetres.
    ///
    /// Moves beyond it are rejected before anything is sent. `None` disables
    /// the check.
    pub travel: Option<f64>,
}

impl Tuning {
    /// The default tuning.
    pub const DEFAULT: Tuning = Tuning {
        motor1_forward_period: 183,
        motor1_backward_period: 141,
        motor2_forward_period: 179,
        motor2_backward_period: 139,
        velocity: 100,
        travel: Some(60.0),
    };
}

impl Default for Tuning {
    fn default() -> Self {
        Tuning::DEFAULT
    }
}

/// Options for configuring and opening a serial port.
///
/// ## Example
///
/// ```rust
/// # use ellproto::session::OpenSerialOptions;
/// # use ellproto::frame::Address;
/// # use std::time::Duration;
/// # fn wrapper() -> Result<(), Box<dyn std::error::Error>> {
/// let mut session = OpenSerialOptions::new()
///     .timeout(Some(Duration::from_millis(500)))
///     .address(Address::new(2)?)
///     .open("/dev/ttyUSB0")?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct OpenSerialOptions {
    /// The custom baud rate
    baud_rate: u32,
    /// The custom timeout
    timeout: Option<Duration>,
    /// The address of the device to talk to
    address: Address,
    /// The codec used for frames
    codec: Codec,
    /// The motor and motion parameters
    tuning: Tuning,
    /// Whether the device should be initialized once opened
    initialize: bool,
}

impl OpenSerialOptions {
    /// The default baud rate for the Elliptec protocol: 9,600.
    pub const DEFAULT_BAUD_RATE: u32 = 9_600;

    /// Create a blank set of options ready for configuration.
    ///
    /// The default baud rate and read timeout are 9,600 and 200 milliseconds,
    /// respectively. The device at address 0 is used and is initialized when
    /// the port is opened.
    ///
    /// Equivalent to [`default`](OpenSerialOptions::default).
    pub fn new() -> Self {
        OpenSerialOptions {
            baud_rate: OpenSerialOptions::DEFAULT_BAUD_RATE,
            timeout: Some(Duration::from_millis(200)),
            address: Address::default(),
            codec: Codec::default(),
            tuning: Tuning::default(),
            initialize: true,
        }
    }

    /// Set a custom baud rate.
    ///
    /// The default is 9,600.
    pub fn baud_rate(&mut self, baud_rate: u32) -> &mut Self {
        self.baud_rate = baud_rate;
        self
    }

    /// Set a custom read timeout.
    ///
    /// If duration is `None`, reads will block indefinitely. The default is 200 milliseconds.
    pub fn timeout(&mut self, duration: Option<Duration>) -> &mut Self {
        self.timeout = duration;
        self
    }

    /// Set the address of the device the session talks to.
    ///
    /// The default is `0`.
    pub fn address(&mut self, address: Address) -> &mut Self {
        self.address = address;
        self
    }

    /// Set the codec used to compose and parse frames.
    ///
    /// The default is [`Codec::default`].
    pub fn codec(&mut self, codec: Codec) -> &mut Self {
        self.codec = codec;
        self
    }

    /// Set the motor and motion parameters.
    ///
    /// The default is [`Tuning::DEFAULT`].
    pub fn tuning(&mut self, tuning: Tuning) -> &mut Self {
        self.tuning = tuning;
        self
    }

    /// Set whether [`Session::initialize`] is run once the port is opened.
    ///
    /// The default is `true`.
    pub fn initialize(&mut self, initialize: bool) -> &mut Self {
        self.initialize = initialize;
        self
    }

    /// Open a [`Serial`] port configured for the Elliptec protocol at the specified path.
    fn open_serial_port(&self, path: &str) -> Result<Serial, Error> {
        // Due to https://gitlab.com/susurrus/serialport-rs/-/issues/102, the
        // baud rate passed to new is ignored. It must be defined using the
        // baud_rate method below.
        sp::new(path, OpenSerialOptions::DEFAULT_BAUD_RATE)
            .data_bits(sp::DataBits::Eight)
            .parity(sp::Parity::None)
            .flow_control(sp::FlowControl::None)
            .stop_bits(sp::StopBits::One)
            .timeout(self.timeout.unwrap_or(Duration::MAX))
            .baud_rate(self.baud_rate)
            .open_native()
            .map(Serial)
            .map_err(Into::into)
    }

    /// Open the port at the specified path with the custom options.
    pub fn open(&self, path: &str) -> Result<Session<Serial>, Error> {
        self.open_backend(self.open_serial_port(path)?)
    }

    /// Open the port at the specified path with the custom options.
    ///
    /// The type of the underlying backend is erased via dynamic dispatch,
    /// which does have runtime overhead. [`OpenSerialOptions::open`] should
    /// generally be used instead, except when the type of the underlying
    /// backend may not be known at compile time.
    pub fn open_dyn(&self, path: &str) -> Result<Session<Box<dyn Backend>>, Error> {
        self.open_backend(Box::new(self.open_serial_port(path)?) as Box<dyn Backend>)
    }

    /// Start a session over an already open backend with the custom options.
    ///
    /// The baud rate is ignored. The read timeout is applied to the backend.
    pub fn open_backend<B: Backend>(&self, mut backend: B) -> Result<Session<B>, Error> {
        backend.set_read_timeout(self.timeout)?;
        let mut session = Session::with_parts(backend, self.address, self.codec, self.tuning);
        if self.initialize {
            session.initialize()?;
        }
        Ok(session)
    }
}

impl Default for OpenSerialOptions {
    fn default() -> Self {
        OpenSerialOptions::new()
    }
}
