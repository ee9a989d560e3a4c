//! Demo: query, home and move a stage attached to /dev/ttyUSB0.

use ellproto::{reply::DeviceInfo, reply::ReplyKind, session::Session};
use simple_logger::SimpleLogger;
use std::time::Duration;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Enable logging
    SimpleLogger::new().init().unwrap();

    // Open the port. The device at address 0 is initialized on open.
    let mut session = Session::open_serial("/dev/ttyUSB0")?;

    session.get_information()?;
    let info = session.await_reply(ReplyKind::Information, 5)?;
    if let Some(text) = info.value().as_text() {
        let info = DeviceInfo::parse(text)?;
        println!("ELL{} serial {} ({})", info.model, info.serial, info.year);
    }

    // Homing takes longer than the default timeout.
    {
        let mut guard = session.timeout_guard(Some(Duration::from_secs(5)))?;
        guard.home()?;
        guard.await_position(5)?;
    }

    session.move_absolute(2.0)?;
    let position = session.await_position(5)?;
    println!("position: {position} mm");
    Ok(())
}
