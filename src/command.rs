//! Host commands.
//!
//! Every command is identified on the wire by a lower-case, two character
//! code that follows the device address, e.g., `ma` in `0ma00002000`. See the
//! Elliptec communication protocol manual for a detailed description of each.
//!
//! Commands are plain values of [`HostCommand`]. Use
//! [`compose`](crate::frame::compose) to turn one into a frame.

/// Define the [`HostCommand`] enum and its lookup tables.
///
/// Each command is declared as `<code>: <name words>`, where the code is the
/// two character wire code and the name is a list of space-separated idents.
/// The variant name is the name words concatenated in camel case.
macro_rules! define_commands {
	// Main entry case.
	// Concatenates the words in each name before generating the enum.
	(
		$(
			$code:literal: $($name_word:ident)+
		),+
		$(,)?
	) => {
		paste::paste! {
			define_commands!{@main
				$(
					$code, $($name_word)+, [< $($name_word:camel)+ >]
				);+
			}
		}
	};

	(@main
		$(
			$code:literal, $($name_word:ident)+, $variant:ident
		);+
	) => {
		paste::paste! {
			/// A command sent from the host to a device.
			#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
			#[non_exhaustive]
			pub enum HostCommand {
				$(
					#[doc = "`" $code "`:" $(" " $name_word)+ "."]
					$variant,
				)+
			}

			impl HostCommand {
				/// Every command, in catalogue order.
				pub const ALL: &[HostCommand] = &[
					$( HostCommand::$variant, )+
				];

				/// Get the two character wire code.
				pub const fn code(self) -> &'static str {
					match self {
						$( HostCommand::$variant => $code, )+
					}
				}

				/// Get the name of the command.
				///
				/// The contents of the returned string may change.
				pub const fn name(self) -> &'static str {
					match self {
						$( HostCommand::$variant => stringify!($($name_word)+), )+
					}
				}

				/// Find the command with the given wire code.
				///
				/// The match is exact and case sensitive.
				pub fn from_code(code: &str) -> Option<HostCommand> {
					match code {
						$( $code => Some(HostCommand::$variant), )+
						_ => None,
					}
				}
			}
		}
	};
}

define_commands! {
	"gs": Get Status,
	"in": Information,
	"us": Save User Data,
	"ca": Change Address,
	"i1": Motor1 Info,
	"i2": Motor2 Info,
	"f1": Set Forward Period Motor1,
	"f2": Set Forward Period Motor2,
	"b1": Set Backward Period Motor1,
	"b2": Set Backward Period Motor2,
	"s1": Search Frequency Motor1,
	"s2": Search Frequency Motor2,
	"c1": Scan Current Curve Motor1,
	"c2": Scan Current Curve Motor2,
	"is": Isolate Minutes,
	"ho": Home,
	"ma": Move Absolute,
	"mr": Move Relative,
	"go": Get Home Offset,
	"so": Set Home Offset,
	"gj": Get Jog Step Size,
	"sj": Set Jog Step Size,
	"fw": Forward,
	"bw": Backward,
	"ms": Motion Stop,
	"gp": Get Position,
	"gv": Get Velocity,
	"sv": Set Velocity,
	"ga": Group Address,
}

impl std::fmt::Display for HostCommand {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{} ({})", self.name(), self.code())
	}
}
