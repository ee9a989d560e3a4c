//! Types that can exchange (read/write) bytes with a connected stage.
//!
//! The [`Backend`] trait represents all such types.

use std::io;
use std::time::Duration;

use serialport as sp;

#[cfg(windows)]
use sp::COMPort as ExternSerial;
use sp::SerialPort;
#[cfg(unix)]
use sp::TTYPort as ExternSerial;

/// The placeholder name for a backend that doesn't have a name.
pub(crate) const UNKNOWN_BACKEND_NAME: &str = "<unknown backend>";

/// The byte terminating every line a device sends.
pub(crate) const LINE_FEED: u8 = b'\n';

/// The most bytes [`Backend::read_line`] returns in one line.
pub const MAX_LINE_LEN: usize = 256;

/// Types that allow reading and writing bytes with a connected device.
pub trait Backend: io::Read + io::Write {
	/// Set the read timeout.
	///
	/// If timeout is `None`, reads will block indefinitely.
	fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<(), io::Error>;

	/// Get the read timeout.
	///
	/// If timeout is `None`, reads will block indefinitely.
	fn read_timeout(&self) -> Result<Option<Duration>, io::Error>;

	/// Get the "name" of the backend.
	///
	/// This can be in any format, but should uniquely identify the backend
	/// instance.
	fn name(&self) -> Option<String>;

	/// Read one line, up to and including the terminating line feed.
	///
	/// If the read timeout elapses before any byte arrives an empty vector is
	/// returned. If it elapses part way through a line, the bytes read so far
	/// are returned. Lines are cut off after [`MAX_LINE_LEN`] bytes.
	///
	/// Reaching the end of the stream before any byte arrives fails with
	/// `UnexpectedEof`. All other I/O errors are forwarded to the caller.
	fn read_line(&mut self) -> Result<Vec<u8>, io::Error> {
		let mut line = Vec::with_capacity(32);
		let mut byte = [0u8; 1];
		while line.len() < MAX_LINE_LEN {
			match self.read(&mut byte) {
				// Bytes already read are returned; the next call reports the end.
				Ok(0) if !line.is_empty() => break,
				Ok(0) => return Err(io::Error::from(io::ErrorKind::UnexpectedEof)),
				Ok(_) => {
					line.push(byte[0]);
					if byte[0] == LINE_FEED {
						break;
					}
				}
				Err(e) if is_timeout(&e) => break,
				Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
				Err(e) => return Err(e),
			}
		}
		Ok(line)
	}
}

/// Whether the I/O error represents a read timing out.
///
/// Depending on the platform, sockets report an elapsed timeout as either
/// `TimedOut` or `WouldBlock`.
pub(crate) fn is_timeout(e: &io::Error) -> bool {
	matches!(
		e.kind(),
		io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
	)
}

impl<C: Backend + ?Sized> Backend for Box<C> {
	fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<(), io::Error> {
		(**self).set_read_timeout(timeout)
	}
	fn read_timeout(&self) -> Result<Option<Duration>, io::Error> {
		(**self).read_timeout()
	}
	fn name(&self) -> Option<String> {
		(**self).name()
	}
	fn read_line(&mut self) -> Result<Vec<u8>, io::Error> {
		(**self).read_line()
	}
}

impl<C: Backend + ?Sized> Backend for &mut C {
	fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<(), io::Error> {
		(**self).set_read_timeout(timeout)
	}
	fn read_timeout(&self) -> Result<Option<Duration>, io::Error> {
		(**self).read_timeout()
	}
	fn name(&self) -> Option<String> {
		(**self).name()
	}
	fn read_line(&mut self) -> Result<Vec<u8>, io::Error> {
		(**self).read_line()
	}
}

impl Backend for std::net::TcpStream {
	fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<(), io::Error> {
		std::net::TcpStream::set_read_timeout(self, timeout)
	}
	fn read_timeout(&self) -> Result<Option<Duration>, io::Error> {
		std::net::TcpStream::read_timeout(self)
	}
	fn name(&self) -> Option<String> {
		self.peer_addr().map(|addr| format!("{addr}")).ok()
	}
}

/// A platform agnostic serial port backend.
//
// `serialport` exposes `COMPort` and `TTYPort` for windows and unix,
// respectively. Wrapping whichever one the platform provides in a newtype
// keeps the rest of the crate free of platform specific types without paying
// for dynamic dispatch.
#[derive(Debug)]
pub struct Serial(pub(crate) ExternSerial);

impl io::Read for Serial {
	fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
		io::Read::read(&mut self.0, buf)
	}
}

impl io::Write for Serial {
	fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
		io::Write::write(&mut self.0, buf)
	}

	fn flush(&mut self) -> io::Result<()> {
		io::Write::flush(&mut self.0)
	}
}

impl Backend for Serial {
	fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<(), io::Error> {
		// The serialport API does not support infinite timeouts, so simply set
		// the timeout to the largest possible duration if `timeout` is `None`.
		Ok(self.0.set_timeout(timeout.unwrap_or(Duration::MAX))?)
	}
	fn read_timeout(&self) -> Result<Option<Duration>, io::Error> {
		Ok(Some(self.0.timeout()))
	}
	fn name(&self) -> Option<String> {
		self.0.name()
	}
}

/// A mock backend for use in testing.
///
/// It has the following features:
///   * It records all data written to it.
///   * It can be filled with data for reading.
///   * Specific errors can be inserted for calls to `read`, `write`, `flush`,
///     and `set_read_timeout`.
///   * Reading from an empty buffer fails with a simulated timeout.
#[cfg(any(test, feature = "mock"))]
#[derive(Debug)]
pub struct Mock {
	/// The buffer data is read from
	buffer: io::Cursor<Vec<u8>>,
	/// Everything written to the mock, in order.
	written: Vec<u8>,
	/// The error to surface on the next read, if any. It is only surfaced once.
	read_error: Option<io::Error>,
	/// The error to surface on the next write, if any. It is only surfaced once.
	write_error: Option<io::Error>,
	/// The error to surface on the next flush, if any. It is only surfaced once.
	flush_error: Option<io::Error>,
	/// The error to surface on the next set_read_timeout, if any. It is only surfaced once.
	set_read_timeout_error: Option<io::Error>,
	/// The read timeout, which is otherwise ignored.
	read_timeout: Option<Duration>,
}

#[cfg(any(test, feature = "mock"))]
impl Mock {
	/// Create a new Mock backend.
	pub fn new() -> Self {
		Mock {
			buffer: io::Cursor::new(Vec::new()),
			written: Vec::new(),
			read_error: None,
			write_error: None,
			flush_error: None,
			set_read_timeout_error: None,
			read_timeout: Some(Duration::ZERO),
		}
	}
	/// Append data to the read buffer.
	///
	/// The data is not validated in any way.
	pub fn append_data<T: AsRef<[u8]>>(&mut self, bytes: T) {
		self.buffer.get_mut().extend_from_slice(bytes.as_ref());
	}
	/// Clear the read buffer.
	pub fn clear_buffer(&mut self) {
		self.buffer.get_mut().clear();
		self.buffer.set_position(0);
	}
	/// Whether the mock has any data available or not
	pub fn is_empty(&self) -> bool {
		self.buffer.position() as usize >= self.buffer.get_ref().len()
	}
	/// The bytes that have not been read yet.
	pub fn remaining(&self) -> &[u8] {
		let start = (self.buffer.position() as usize).min(self.buffer.get_ref().len());
		&self.buffer.get_ref()[start..]
	}
	/// Everything written to the mock so far.
	pub fn written(&self) -> &[u8] {
		&self.written
	}
	/// Take everything written to the mock so far, clearing the record.
	pub fn take_written(&mut self) -> Vec<u8> {
		std::mem::take(&mut self.written)
	}
	/// Set the error for the next `read`, if any.
	pub fn read_error(&mut self, err: Option<io::Error>) {
		self.read_error = err;
	}
	/// Set the error for the next `write`, if any.
	pub fn write_error(&mut self, err: Option<io::Error>) {
		self.write_error = err;
	}
	/// Set the error for the next `flush`, if any.
	pub fn flush_error(&mut self, err: Option<io::Error>) {
		self.flush_error = err;
	}
	/// Set the error for the next `set_read_timeout`, if any.
	pub fn set_read_timeout_error(&mut self, err: Option<io::Error>) {
		self.set_read_timeout_error = err;
	}
}

#[cfg(any(test, feature = "mock"))]
impl Default for Mock {
	fn default() -> Self {
		Self::new()
	}
}

#[cfg(any(test, feature = "mock"))]
impl Backend for Mock {
	fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<(), io::Error> {
		if let Some(err) = self.set_read_timeout_error.take() {
			Err(err)
		} else {
			self.read_timeout = timeout;
			Ok(())
		}
	}

	fn read_timeout(&self) -> Result<Option<Duration>, io::Error> {
		Ok(self.read_timeout)
	}

	fn name(&self) -> Option<String> {
		Some(format!("<mock 0x{:x}>", std::ptr::from_ref(self) as usize))
	}
}

#[cfg(any(test, feature = "mock"))]
impl io::Read for Mock {
	fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
		if let Some(err) = self.read_error.take() {
			Err(err)
		} else if self.is_empty() {
			// A real device with no data ready would block until the read
			// timeout elapses. Our data is in memory, so time out immediately.
			Err(io::Error::new(
				io::ErrorKind::TimedOut,
				"Simulated timeout error",
			))
		} else {
			io::Read::read(&mut self.buffer, buf)
		}
	}
}

#[cfg(any(test, feature = "mock"))]
impl io::Write for Mock {
	fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
		if let Some(err) = self.write_error.take() {
			Err(err)
		} else {
			self.written.extend_from_slice(buf);
			Ok(buf.len())
		}
	}

	fn flush(&mut self) -> io::Result<()> {
		if let Some(err) = self.flush_error.take() {
			Err(err)
		} else {
			Ok(())
		}
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn read_line_stops_at_line_feed() {
		let mut mock = Mock::new();
		mock.append_data(b"0PO00002000\r\n0GS00\r\n");
		assert_eq!(mock.read_line().unwrap(), b"0PO00002000\r\n");
		assert_eq!(mock.read_line().unwrap(), b"0GS00\r\n");
		assert!(mock.is_empty());
	}

	#[test]
	fn read_line_is_empty_on_timeout() {
		let mut mock = Mock::new();
		assert!(mock.read_line().unwrap().is_empty());
	}

	#[test]
	fn read_line_returns_partial_line_on_timeout() {
		let mut mock = Mock::new();
		mock.append_data(b"0PO0000");
		assert_eq!(mock.read_line().unwrap(), b"0PO0000");
	}

	#[test]
	fn read_line_is_capped() {
		let mut mock = Mock::new();
		mock.append_data([b'0'; MAX_LINE_LEN + 44]);
		assert_eq!(mock.read_line().unwrap().len(), MAX_LINE_LEN);
		assert_eq!(mock.read_line().unwrap().len(), 44);
		assert!(mock.read_line().unwrap().is_empty());
	}

	/// A stream that has been closed by the other end.
	struct Closed {
		data: io::Cursor<Vec<u8>>,
	}

	impl io::Read for Closed {
		fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
			io::Read::read(&mut self.data, buf)
		}
	}

	impl io::Write for Closed {
		fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
			Ok(buf.len())
		}
		fn flush(&mut self) -> io::Result<()> {
			Ok(())
		}
	}

	impl Backend for Closed {
		fn set_read_timeout(&mut self, _: Option<Duration>) -> Result<(), io::Error> {
			Ok(())
		}
		fn read_timeout(&self) -> Result<Option<Duration>, io::Error> {
			Ok(None)
		}
		fn name(&self) -> Option<String> {
			None
		}
	}

	#[test]
	fn read_line_fails_at_end_of_stream() {
		let mut closed = Closed {
			data: io::Cursor::new(b"0GS00\r\n0PO".to_vec()),
		};
		assert_eq!(closed.read_line().unwrap(), b"0GS00\r\n");
		// A partial line is returned before the end is reported.
		assert_eq!(closed.read_line().unwrap(), b"0PO");
		let err = closed.read_line().unwrap_err();
		assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
	}

	#[test]
	fn read_line_forwards_other_errors() {
		let mut mock = Mock::new();
		mock.append_data(b"0GS00\r\n");
		mock.read_error(Some(io::Error::new(
			io::ErrorKind::BrokenPipe,
			"closed",
		)));
		let err = mock.read_line().unwrap_err();
		assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
		// The data is still available afterwards.
		assert_eq!(mock.read_line().unwrap(), b"0GS00\r\n");
	}

	#[test]
	fn mock_records_writes() {
		let mut mock = Mock::new();
		io::Write::write_all(&mut mock, b"0ho0").unwrap();
		io::Write::write_all(&mut mock, b"0gp").unwrap();
		assert_eq!(mock.written(), b"0ho00gp");
		assert_eq!(mock.take_written(), b"0ho00gp");
		assert!(mock.written().is_empty());
	}
}
