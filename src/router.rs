//! Waiting for a specific kind of reply.
//!
//! Devices send replies on their own schedule: a move produces a status
//! reply while the motor is busy and a position reply once it stops. The
//! functions here read lines until one of the requested kind arrives,
//! discarding everything else, and give up after a bounded number of reads.

use crate::{
	backend::Backend,
	error::{Error, ParseError, PayloadDecodeError, ReplyTimeoutError},
	frame::Codec,
	reply::{Reply, ReplyKind},
};

/// The number of additional reads performed by default.
pub const DEFAULT_MAX_ATTEMPTS: usize = 5;

/// Read lines from `backend` until a reply of the `expected` kind arrives.
///
/// At most `max_attempts + 1` lines are read, so `0` reads exactly one line.
/// Lines that cannot be parsed, empty reads from a timeout, and replies of
/// other kinds each use up one read. The first matching reply is returned;
/// nothing after it is read.
///
/// If no line matches, a [`ReplyTimeoutError`] is returned carrying the
/// outcome of the final read. I/O errors other than a timeout are returned
/// immediately, as is reaching the end of the stream.
pub fn await_reply<B: Backend>(
	backend: &mut B,
	codec: &Codec,
	expected: ReplyKind,
	max_attempts: usize,
) -> Result<Reply, Error> {
	let reads = max_attempts.saturating_add(1);
	let mut last: Option<Result<Reply, ParseError>> = None;

	for attempt in 1..=reads {
		let line = backend.read_line()?;
		log_line(backend, &line);

		let result = codec.parse_expecting(&line, expected);
		match result {
			Ok(reply) if reply.kind() == expected => return Ok(reply),
			Ok(ref reply) => log::trace!(
				"{} discarding {reply} while waiting for {expected} ({attempt}/{reads})",
				backend.name().as_deref().unwrap_or(crate::backend::UNKNOWN_BACKEND_NAME),
			),
			Err(ref e) => log::trace!(
				"{} discarding line while waiting for {expected} ({attempt}/{reads}): {e}",
				backend.name().as_deref().unwrap_or(crate::backend::UNKNOWN_BACKEND_NAME),
			),
		}
		last = Some(result);
	}

	log::debug!(
		"{} gave up waiting for {expected} after {reads} read(s)",
		backend.name().as_deref().unwrap_or(crate::backend::UNKNOWN_BACKEND_NAME),
	);
	Err(ReplyTimeoutError::new(expected, reads, last).into())
}

/// Wait for a [`Position`](ReplyKind::Position) reply and return the position in millimetres.
pub fn await_position<B: Backend>(
	backend: &mut B,
	codec: &Codec,
	max_attempts: usize,
) -> Result<f64, Error> {
	let reply = await_reply(backend, codec, ReplyKind::Position, max_attempts)?;
	position_of(&reply)
}

/// The position carried by `reply`, failing if it holds no position.
fn position_of(reply: &Reply) -> Result<f64, Error> {
	reply
		.position()
		.ok_or_else(|| PayloadDecodeError::new(reply.to_string()).into())
}

/// Wait for a [`Status`](ReplyKind::Status) reply.
pub fn await_status<B: Backend>(
	backend: &mut B,
	codec: &Codec,
	max_attempts: usize,
) -> Result<Reply, Error> {
	await_reply(backend, codec, ReplyKind::Status, max_attempts)
}

/// Log a received line at the debug level.
fn log_line<B: Backend>(backend: &B, line: &[u8]) {
	if log::log_enabled!(log::Level::Debug) {
		let name = backend.name();
		let name = name.as_deref().unwrap_or(crate::backend::UNKNOWN_BACKEND_NAME);
		if line.is_empty() {
			log::debug!("{name} RX: <timeout>");
		} else {
			log::debug!(
				"{name} RX: {}",
				String::from_utf8_lossy(line).trim_end()
			);
		}
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::{backend::Mock, frame::Address, reply::Value};
	use std::{io, time::Duration};

	/// A backend whose stream has ended. Every read returns zero bytes.
	#[derive(Default)]
	struct Ended {
		reads: usize,
	}

	impl io::Read for Ended {
		fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
			self.reads += 1;
			Ok(0)
		}
	}

	impl io::Write for Ended {
		fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
			Ok(buf.len())
		}
		fn flush(&mut self) -> io::Result<()> {
			Ok(())
		}
	}

	impl Backend for Ended {
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

	fn mock_with(lines: &[&[u8]]) -> Mock {
		let mut mock = Mock::new();
		for line in lines {
			mock.append_data(line);
		}
		mock
	}

	#[test]
	fn returns_first_match() {
		let mut mock = mock_with(&[b"0PO00002000\r\n", b"0PO00004000\r\n"]);
		let reply = await_reply(&mut mock, &Codec::default(), ReplyKind::Position, 5).unwrap();
		assert_eq!(reply.position(), Some(4.0));
		// The second frame is left unread.
		assert_eq!(mock.remaining(), b"0PO00004000\r\n");
	}

	#[test]
	fn discards_other_kinds_and_garbage() {
		let mut mock = mock_with(&[
			b"0GS09\r\n",
			b"garbage\r\n",
			b"0ZZ1234\r\n",
			b"0PO00001000\r\n",
		]);
		let mm = await_position(&mut mock, &Codec::default(), 3).unwrap();
		assert_eq!(mm, 2.0);
		assert!(mock.is_empty());
	}

	#[test]
	fn zero_attempts_reads_exactly_once() {
		let mut mock = mock_with(&[b"0GS09\r\n", b"0PO00002000\r\n"]);
		let err = await_reply(&mut mock, &Codec::default(), ReplyKind::Position, 0).unwrap_err();
		let Error::ReplyTimeout(timeout) = err else {
			panic!("expected a reply timeout");
		};
		assert_eq!(timeout.attempts(), 1);
		assert_eq!(timeout.expected(), ReplyKind::Position);
		assert_eq!(timeout.last_reply().unwrap().kind(), ReplyKind::Status);
		assert_eq!(mock.remaining(), b"0PO00002000\r\n");
	}

	#[test]
	fn budget_exhausted_carries_last_failure() {
		let mut mock = mock_with(&[b"0GS00\r\n", b"0GS00\r\n", b"0QQ\r\n"]);
		let err = await_reply(&mut mock, &Codec::default(), ReplyKind::Position, 2).unwrap_err();
		assert!(err.is_timeout());
		let Error::ReplyTimeout(timeout) = err else {
			panic!("expected a reply timeout");
		};
		assert_eq!(timeout.attempts(), 3);
		assert!(matches!(
			timeout.last_error(),
			Some(ParseError::FrameTooShort(_))
		));
	}

	#[test]
	fn timeouts_use_attempts() {
		// Nothing to read: every attempt times out with an empty line.
		let mut mock = Mock::new();
		let err = await_reply(&mut mock, &Codec::default(), ReplyKind::Status, 4).unwrap_err();
		let Error::ReplyTimeout(timeout) = err else {
			panic!("expected a reply timeout");
		};
		assert_eq!(timeout.attempts(), 5);
		assert_eq!(timeout.last_error().unwrap().as_bytes(), b"");
	}

	#[test]
	fn io_errors_are_returned_immediately() {
		let mut mock = mock_with(&[b"0PO00002000\r\n"]);
		mock.read_error(Some(io::Error::new(io::ErrorKind::BrokenPipe, "gone")));
		let err = await_reply(&mut mock, &Codec::default(), ReplyKind::Position, 5).unwrap_err();
		assert!(matches!(err, Error::Io(ref e) if e.kind() == io::ErrorKind::BrokenPipe));
		assert!(!err.is_timeout());
	}

	#[test]
	fn end_of_stream_is_returned_immediately() {
		let mut ended = Ended::default();
		let err = await_reply(&mut ended, &Codec::default(), ReplyKind::Position, 1000).unwrap_err();
		assert!(matches!(err, Error::Io(ref e) if e.kind() == io::ErrorKind::UnexpectedEof));
		assert!(!err.is_timeout());
		assert_eq!(ended.reads, 1);
	}

	#[test]
	fn position_must_be_decoded() {
		let reply = Reply::new(
			ReplyKind::Position,
			Value::Text("00002000".to_string()),
			Address::default(),
		);
		let err = position_of(&reply).unwrap_err();
		assert!(matches!(err, Error::PayloadDecode(_)));

		let reply = Reply::new(ReplyKind::Position, Value::Position(4.0), Address::default());
		assert_eq!(position_of(&reply).unwrap(), 4.0);
	}

	#[test]
	fn expected_kind_decides_shared_codes() {
		let mut mock = mock_with(&[b"0PO00002000\r\n"]);
		let reply =
			await_reply(&mut mock, &Codec::default(), ReplyKind::RawPosition, 0).unwrap();
		assert_eq!(reply.kind(), ReplyKind::RawPosition);
		assert_eq!(reply.value(), &Value::Text("00002000".to_string()));
	}

	#[test]
	fn status_reply() {
		let mut mock = mock_with(&[b"0PO00002000\r\n", b"0GS00\r\n"]);
		let reply = await_status(&mut mock, &Codec::default(), 1).unwrap();
		assert!(reply.status().unwrap().unwrap().is_ok());
	}
}
