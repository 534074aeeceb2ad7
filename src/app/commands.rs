//! Inbound commands to the scanner service.
//!
//! These represent actions requested by the outside world (the web UI's
//! websocket, the serial console, the boot sequence) that the
//! [`ScannerService`](super::service::ScannerService) interprets and acts
//! upon.  Network adapters hand over raw JSON; [`CommandRequest::from_json`]
//! turns it into a request.

use core::fmt;
use core::str::FromStr;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::config::ScannerConfig;

use super::ports::Direction;

/// Fixed capacity of a project name, in bytes.
pub const PROJECT_NAME_CAPACITY: usize = 64;

pub type ProjectName = heapless::String<PROJECT_NAME_CAPACITY>;

/// Build a [`ProjectName`], truncating on a char boundary if too long.
pub fn project_name(name: &str) -> ProjectName {
    let out: ProjectName = crate::config::fixed(name);
    if out.len() < name.len() {
        warn!(
            "project name truncated to {} bytes ({} given)",
            out.len(),
            name.len()
        );
    }
    out
}

// ───────────────────────────────────────────────────────────────
// ScanCommand
// ───────────────────────────────────────────────────────────────

/// The eight commands the scan loop understands.  Discriminants are the
/// wire codes used by the web UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ScanCommand {
    #[serde(rename = "stop")]
    Stop = 0,
    #[serde(rename = "home")]
    Home = 1,
    #[serde(rename = "new")]
    NewProject = 2,
    #[serde(rename = "start")]
    Start = 3,
    #[serde(rename = "up")]
    StepUp = 4,
    #[serde(rename = "down")]
    StepDown = 5,
    #[serde(rename = "right")]
    StepRight = 6,
    #[serde(rename = "left")]
    StepLeft = 7,
}

impl ScanCommand {
    pub const ALL: [Self; 8] = [
        Self::Stop,
        Self::Home,
        Self::NewProject,
        Self::Start,
        Self::StepUp,
        Self::StepDown,
        Self::StepRight,
        Self::StepLeft,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Stop => "stop",
            Self::Home => "home",
            Self::NewProject => "new",
            Self::Start => "start",
            Self::StepUp => "up",
            Self::StepDown => "down",
            Self::StepRight => "right",
            Self::StepLeft => "left",
        }
    }

    /// The manual jog this command requests, if it is a directional one.
    pub fn jog(self) -> Option<Jog> {
        match self {
            Self::StepUp => Some(Jog::Up),
            Self::StepDown => Some(Jog::Down),
            Self::StepRight => Some(Jog::Right),
            Self::StepLeft => Some(Jog::Left),
            _ => None,
        }
    }

    /// Whether this command starts a scan session.
    pub fn is_scan(self) -> bool {
        matches!(self, Self::NewProject | Self::Start)
    }
}

impl TryFrom<u8> for ScanCommand {
    type Error = CommandParseError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Self::ALL
            .get(usize::from(code))
            .copied()
            .ok_or(CommandParseError::UnknownCode(code))
    }
}

impl FromStr for ScanCommand {
    type Err = CommandParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.name().eq_ignore_ascii_case(s.trim()))
            .ok_or(CommandParseError::UnknownName)
    }
}

impl fmt::Display for ScanCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ───────────────────────────────────────────────────────────────
// Jog
// ───────────────────────────────────────────────────────────────

/// Axis selector for manual moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Z,
    Xy,
}

/// A manual single-step move on one axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Jog {
    Up,
    Down,
    Right,
    Left,
}

impl Jog {
    pub fn axis(self) -> Axis {
        match self {
            Self::Up | Self::Down => Axis::Z,
            Self::Right | Self::Left => Axis::Xy,
        }
    }

    pub fn direction(self) -> Direction {
        match self {
            Self::Up | Self::Right => Direction::Increase,
            Self::Down | Self::Left => Direction::Decrease,
        }
    }
}

// ───────────────────────────────────────────────────────────────
// CommandRequest
// ───────────────────────────────────────────────────────────────

/// Requests that external adapters can send into the scanner core.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandRequest {
    /// Switch the active command.  `steps` is the repetition count for
    /// directional moves (0 means 1) and ignored otherwise.
    SetCommand { command: ScanCommand, steps: u32 },

    /// Name the scan session and reset its point counter.
    SetProjectName(ProjectName),

    /// Hot-reload configuration (e.g. from the web settings page).
    UpdateConfig(ScannerConfig),

    /// Persist the current config to NVS on the next save check.
    SaveConfig,
}

impl CommandRequest {
    pub fn command(command: ScanCommand) -> Self {
        Self::SetCommand { command, steps: 0 }
    }

    /// Parse one websocket text frame.
    ///
    /// Accepted shapes:
    ///
    /// ```text
    /// {"command": "up", "steps": 400}
    /// {"command": 3}
    /// {"name": "vase"}
    /// {"config": { ...ScannerConfig... }}
    /// {"save": true}
    /// ```
    pub fn from_json(frame: &[u8]) -> Result<Self, CommandParseError> {
        let msg: IngressMessage =
            serde_json::from_slice(frame).map_err(|_| CommandParseError::Malformed)?;
        match msg {
            IngressMessage::Named { command, steps } => Ok(Self::SetCommand { command, steps }),
            IngressMessage::Coded { command, steps } => Ok(Self::SetCommand {
                command: ScanCommand::try_from(command)?,
                steps,
            }),
            IngressMessage::Name { name } => Ok(Self::SetProjectName(project_name(&name))),
            IngressMessage::Config { config } => Ok(Self::UpdateConfig(config)),
            IngressMessage::Save { save: true } => Ok(Self::SaveConfig),
            IngressMessage::Save { save: false } => Err(CommandParseError::Malformed),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum IngressMessage {
    Named {
        command: ScanCommand,
        #[serde(default)]
        steps: u32,
    },
    Coded {
        command: u8,
        #[serde(default)]
        steps: u32,
    },
    Name {
        name: String,
    },
    Config {
        config: ScannerConfig,
    },
    Save {
        save: bool,
    },
}

/// Why an inbound frame could not be turned into a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandParseError {
    /// Not JSON, or none of the accepted shapes.
    Malformed,
    UnknownName,
    UnknownCode(u8),
}

impl fmt::Display for CommandParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed => write!(f, "malformed command frame"),
            Self::UnknownName => write!(f, "unknown command name"),
            Self::UnknownCode(c) => write!(f, "unknown command code {}", c),
        }
    }
}

impl std::error::Error for CommandParseError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_codes_match_discriminants() {
        for (i, cmd) in ScanCommand::ALL.iter().enumerate() {
            assert_eq!(*cmd as usize, i);
            assert_eq!(ScanCommand::try_from(i as u8), Ok(*cmd));
        }
        assert_eq!(
            ScanCommand::try_from(8),
            Err(CommandParseError::UnknownCode(8))
        );
    }

    #[test]
    fn parses_names_case_insensitively() {
        assert_eq!("Home".parse::<ScanCommand>(), Ok(ScanCommand::Home));
        assert_eq!(" left ".parse::<ScanCommand>(), Ok(ScanCommand::StepLeft));
        assert_eq!(
            "sideways".parse::<ScanCommand>(),
            Err(CommandParseError::UnknownName)
        );
    }

    #[test]
    fn jog_maps_axis_and_direction() {
        assert_eq!(ScanCommand::StepUp.jog(), Some(Jog::Up));
        assert_eq!(Jog::Up.axis(), Axis::Z);
        assert_eq!(Jog::Left.axis(), Axis::Xy);
        assert_eq!(Jog::Down.direction(), Direction::Decrease);
        assert_eq!(Jog::Right.direction(), Direction::Increase);
        assert!(ScanCommand::Home.jog().is_none());
    }

    #[test]
    fn json_named_command_with_steps() {
        let req = CommandRequest::from_json(br#"{"command":"up","steps":400}"#).unwrap();
        assert_eq!(
            req,
            CommandRequest::SetCommand {
                command: ScanCommand::StepUp,
                steps: 400
            }
        );
    }

    #[test]
    fn json_coded_command_defaults_steps() {
        let req = CommandRequest::from_json(br#"{"command":3}"#).unwrap();
        assert_eq!(req, CommandRequest::command(ScanCommand::Start));
        assert_eq!(
            CommandRequest::from_json(br#"{"command":42}"#),
            Err(CommandParseError::UnknownCode(42))
        );
    }

    #[test]
    fn json_project_name() {
        let req = CommandRequest::from_json(br#"{"name":"vase"}"#).unwrap();
        assert_eq!(req, CommandRequest::SetProjectName(project_name("vase")));
    }

    #[test]
    fn json_save_and_garbage() {
        assert_eq!(
            CommandRequest::from_json(br#"{"save":true}"#),
            Ok(CommandRequest::SaveConfig)
        );
        assert_eq!(
            CommandRequest::from_json(b"not json"),
            Err(CommandParseError::Malformed)
        );
        assert_eq!(
            CommandRequest::from_json(br#"{"command":"jump"}"#),
            Err(CommandParseError::Malformed)
        );
    }

    #[test]
    fn long_project_name_is_truncated() {
        let long = "x".repeat(PROJECT_NAME_CAPACITY + 10);
        assert_eq!(project_name(&long).len(), PROJECT_NAME_CAPACITY);
    }
}
