use std::{io, time::Duration};

use crate::{
	backend::{Backend, Mock},
	error::Error,
	frame::Address,
	reply::ReplyKind,
	session::{Motor, OpenSerialOptions, Session, Tuning},
};

fn session() -> Session<Mock> {
	Session::from_backend(Mock::new(), Address::default())
}

fn mock(session: &mut Session<Mock>) -> &mut Mock {
	session.backend.as_mut().unwrap()
}

/// Take everything written so far as a string.
fn written(session: &mut Session<Mock>) -> String {
	String::from_utf8(mock(session).take_written()).unwrap()
}

#[test]
fn initialize_forces_motor1_high_digit() {
	let mut session = session();
	session.initialize().unwrap();
	assert_eq!(
		written(&mut session),
		"0f180B70b1808D0f200B30b2008B0sv64"
	);
}

#[test]
fn open_backend_applies_options() {
	let session = OpenSerialOptions::new()
		.timeout(Some(Duration::from_millis(50)))
		.address(Address::new(3).unwrap())
		.open_backend(Mock::new())
		.unwrap();
	assert_eq!(session.address(), Address::new(3).unwrap());
	assert_eq!(
		session.read_timeout().unwrap(),
		Some(Duration::from_millis(50))
	);
	assert_eq!(
		session.backend().unwrap().written(),
		b"3f180B73b1808D3f200B33b2008B3sv64"
	);

	let session = OpenSerialOptions::new()
		.initialize(false)
		.open_backend(Mock::new())
		.unwrap();
	assert!(session.backend().unwrap().written().is_empty());
}

#[test]
fn custom_tuning() {
	let mut session = session();
	let old = session.set_tuning(Tuning {
		motor1_forward_period: 0x1234,
		velocity: 50,
		..Tuning::DEFAULT
	});
	assert_eq!(old, Tuning::DEFAULT);
	session.initialize().unwrap();
	assert!(written(&mut session).starts_with("0f18234"));
}

#[test]
fn moves() {
	let mut session = session();
	session.move_absolute(4.0).unwrap();
	assert_eq!(written(&mut session), "0ma00002000");
	session.move_relative(0.5).unwrap();
	assert_eq!(written(&mut session), "0mr00000400");
	session.home().unwrap();
	assert_eq!(written(&mut session), "0ho0");
}

#[test]
fn moves_outside_travel_are_rejected() {
	let mut session = session();
	for mm in [-0.1, 60.5, f64::NAN] {
		let err = session.move_absolute(mm).unwrap_err();
		assert!(matches!(err, Error::Range(_)), "{mm}: {err}");
		let err = session.move_relative(mm).unwrap_err();
		assert!(matches!(err, Error::Range(_)), "{mm}: {err}");
	}
	assert!(written(&mut session).is_empty());

	// Without a travel limit only the encoding limits apply.
	session.set_tuning(Tuning {
		travel: None,
		..Tuning::DEFAULT
	});
	session.move_absolute(100.0).unwrap();
	assert_eq!(written(&mut session), "0ma00032000");
	assert!(session.move_absolute(-1.0).is_err());
}

#[test]
fn motor_commands() {
	let mut session = session();
	session.get_motor_info(Motor::One).unwrap();
	session.get_motor_info(Motor::Two).unwrap();
	session.search_frequency(Motor::Two).unwrap();
	session.scan_current_curve(Motor::One).unwrap();
	session.set_motor_periods(Motor::Two, 78, 0xFFFF).unwrap();
	assert_eq!(written(&mut session), "0i10i20s20c10f2004E0b2FFFF");

	assert_eq!(Motor::try_from(1).unwrap(), Motor::One);
	assert!(Motor::try_from(3).is_err());
}

#[test]
fn simple_commands() {
	let mut session = session();
	session.get_status().unwrap();
	assert_eq!(written(&mut session), "0gs");
	session.get_information().unwrap();
	assert_eq!(written(&mut session), "0in");
	session.save_user_data().unwrap();
	assert_eq!(written(&mut session), "0us");
	session.get_home_offset().unwrap();
	assert_eq!(written(&mut session), "0go");
	session.set_home_offset(1.0).unwrap();
	assert_eq!(written(&mut session), "0so00000800");
	session.get_jog_step_size().unwrap();
	assert_eq!(written(&mut session), "0gj");
	session.set_jog_step_size(2.0).unwrap();
	assert_eq!(written(&mut session), "0sj00001000");
	session.forward().unwrap();
	assert_eq!(written(&mut session), "0fw");
	session.backward().unwrap();
	assert_eq!(written(&mut session), "0bw");
	session.stop().unwrap();
	assert_eq!(written(&mut session), "0ms");
	session.get_position().unwrap();
	assert_eq!(written(&mut session), "0gp");
	session.get_velocity().unwrap();
	assert_eq!(written(&mut session), "0gv");
	session.isolate(10).unwrap();
	assert_eq!(written(&mut session), "0is0A");
	session.group_address(Address::new(12).unwrap()).unwrap();
	assert_eq!(written(&mut session), "0gaC");
	session.raw_command("1gs").unwrap();
	assert_eq!(written(&mut session), "1gs");
}

#[test]
fn velocity_is_a_percentage() {
	let mut session = session();
	session.set_velocity(45).unwrap();
	assert_eq!(written(&mut session), "0sv2D");
	assert!(matches!(
		session.set_velocity(101).unwrap_err(),
		Error::Range(_)
	));
	assert!(written(&mut session).is_empty());
}

#[test]
fn change_address() {
	let mut session = session();
	session.change_address(Address::new(10).unwrap()).unwrap();
	assert_eq!(written(&mut session), "0caA");
	assert_eq!(session.address(), Address::new(10).unwrap());
	session.get_position().unwrap();
	assert_eq!(written(&mut session), "Agp");

	// A failed write leaves the address untouched.
	mock(&mut session).write_error(Some(io::Error::new(io::ErrorKind::BrokenPipe, "gone")));
	assert!(session.change_address(Address::new(1).unwrap()).is_err());
	assert_eq!(session.address(), Address::new(10).unwrap());
}

#[test]
fn commands_are_flushed() {
	let mut session = session();
	mock(&mut session).flush_error(Some(io::Error::new(io::ErrorKind::BrokenPipe, "gone")));
	let err = session.home().unwrap_err();
	assert!(matches!(err, Error::Io(ref e) if e.kind() == io::ErrorKind::BrokenPipe));
	// The failure is reported once.
	assert_eq!(written(&mut session), "0ho0");
	session.get_position().unwrap();
	assert_eq!(written(&mut session), "0gp");
}

#[test]
fn awaiting_replies() {
	let mut session = session();
	mock(&mut session).append_data(b"0GS09\r\n0PO00002000\r\n0GS00\r\n0IN141234567820211701003C00000800\r\n");
	assert_eq!(session.await_position(5).unwrap(), 4.0);
	let status = session.await_status(0).unwrap();
	assert!(status.status().unwrap().unwrap().is_ok());
	let info = session.await_reply(ReplyKind::Information, 0).unwrap();
	assert_eq!(info.value().as_text().unwrap().len(), 30);

	let err = session.await_position(2).unwrap_err();
	assert!(err.is_timeout());
}

#[test]
fn closed_session() {
	let mut session = session();
	assert!(session.is_open());
	assert!(session.close().is_some());
	assert!(!session.is_open());
	assert!(session.close().is_none());
	assert_eq!(session.name(), None);

	assert!(matches!(session.home().unwrap_err(), Error::SessionClosed(_)));
	assert!(matches!(
		session.await_position(0).unwrap_err(),
		Error::SessionClosed(_)
	));
	assert!(matches!(
		session.read_timeout().unwrap_err(),
		Error::SessionClosed(_)
	));
	assert!(session.timeout_guard(None).is_err());
}

#[test]
fn timeout_guard_restores_timeout() {
	let mut session = session();
	session
		.set_read_timeout(Some(Duration::from_millis(200)))
		.unwrap();
	{
		let mut guard = session
			.timeout_guard(Some(Duration::from_secs(10)))
			.unwrap();
		assert_eq!(
			guard.read_timeout().unwrap(),
			Some(Duration::from_secs(10))
		);
		guard.home().unwrap();
	}
	assert_eq!(
		session.read_timeout().unwrap(),
		Some(Duration::from_millis(200))
	);
	assert_eq!(written(&mut session), "0ho0");
}

#[test]
fn failed_timeout_restore_poisons_session() {
	let mut session = session();
	{
		let mut guard = session.timeout_guard(None).unwrap();
		mock(&mut guard).set_read_timeout_error(Some(io::Error::new(
			io::ErrorKind::Other,
			"cannot set timeout",
		)));
	}
	// The poison is reported once.
	assert!(matches!(session.home().unwrap_err(), Error::Io(_)));
	session.home().unwrap();
	assert_eq!(written(&mut session), "0ho0");
}

#[test]
fn debug_shows_name_and_address() {
	let session = session();
	let debug = format!("{session:?}");
	assert!(debug.starts_with("Session"));
	assert!(debug.contains("<mock 0x"));
	assert_eq!(
		session.name(),
		session.backend().unwrap().name()
	);
}
