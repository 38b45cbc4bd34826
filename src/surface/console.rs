//! A line-oriented terminal front end for the synchronizer.
//!
//! The console prints the display list every time it changes and turns typed
//! commands into brightness input events. Rows are addressed by their
//! 1-based position in the list, the same numbering the listing shows.

use crate::control::{
    display_list::DisplayState,
    display_synchronizer::{SyncOutcome, SynchronizerPort},
};
use anyhow::Result;
use std::fmt::Write as _;
use thiserror::Error;
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt},
    select,
    sync::watch,
};

const HELP: &str = "\
Commands:
  set <row> <value>   set brightness of the display in <row>
  up <row>            raise brightness by one step
  down <row>          lower brightness by one step
  list                show the displays again
  reload              ask the backend for the display list again
  quit                exit
";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleCommand {
    Set { row: usize, value: i32 },
    Up(usize),
    Down(usize),
    List,
    Reload,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandParseError {
    #[error("Unknown command {0}, type help for a list of commands")]
    Unknown(String),
    #[error("Missing {0}")]
    MissingArgument(&'static str),
    #[error("{0} is not a number")]
    InvalidNumber(String),
    #[error("Rows are numbered from 1")]
    ZeroRow,
}

/// Parse one line of input. Blank lines yield `None`.
pub fn parse_command(line: &str) -> Result<Option<ConsoleCommand>, CommandParseError> {
    let mut words = line.split_whitespace();
    let command = match words.next() {
        Some(c) => c.to_lowercase(),
        None => return Ok(None),
    };
    let parsed = match command.as_str() {
        "set" => {
            let row = parse_row(words.next())?;
            let value = words
                .next()
                .ok_or(CommandParseError::MissingArgument("value"))?;
            let value = value
                .parse()
                .map_err(|_| CommandParseError::InvalidNumber(value.to_owned()))?;
            ConsoleCommand::Set { row, value }
        }
        "up" | "+" => ConsoleCommand::Up(parse_row(words.next())?),
        "down" | "-" => ConsoleCommand::Down(parse_row(words.next())?),
        "list" | "ls" => ConsoleCommand::List,
        "reload" => ConsoleCommand::Reload,
        "help" | "?" => ConsoleCommand::Help,
        "quit" | "exit" | "q" => ConsoleCommand::Quit,
        _ => return Err(CommandParseError::Unknown(command)),
    };
    Ok(Some(parsed))
}

fn parse_row(word: Option<&str>) -> Result<usize, CommandParseError> {
    let word = word.ok_or(CommandParseError::MissingArgument("row"))?;
    match word.parse() {
        Ok(0) => Err(CommandParseError::ZeroRow),
        Ok(row) => Ok(row),
        Err(_) => Err(CommandParseError::InvalidNumber(word.to_owned())),
    }
}

/// Format the state the way the console shows it.
pub fn render(state: &DisplayState) -> String {
    let list = match state.displays() {
        None => return "Loading...\n".to_owned(),
        Some(list) if list.is_empty() => return "No controllable displays found\n".to_owned(),
        Some(list) => list,
    };
    let mut out = String::new();
    for (i, display) in list.iter().enumerate() {
        // Writing into a String can't fail
        let _ = writeln!(out, "{}. {}", i + 1, display.name);
        let _ = writeln!(out, "   Brightness: {}%", display.brightness);
    }
    out
}

/// The input range of the brightness control: 0 to 100 in fixed steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slider {
    step: u16,
}

impl Slider {
    pub const MAX: u16 = 100;

    /// `step` has to be in 1..=100, the configuration makes sure of that.
    pub fn new(step: u16) -> Slider {
        Slider {
            step: step.clamp(1, Self::MAX),
        }
    }

    pub fn step(&self) -> u16 {
        self.step
    }

    /// Clamp the value into the slider's range and round it to the nearest
    /// step.
    pub fn snap(&self, value: i32) -> u16 {
        let step = i32::from(self.step);
        let clamped = value.clamp(0, i32::from(Self::MAX));
        let snapped = ((clamped + step / 2) / step) * step;
        snapped.min(i32::from(Self::MAX)) as u16
    }
}

pub struct ConsoleSurface {
    port: SynchronizerPort,
    state: watch::Receiver<DisplayState>,
    slider: Slider,
}

impl ConsoleSurface {
    pub fn new(
        port: SynchronizerPort,
        state: watch::Receiver<DisplayState>,
        slider: Slider,
    ) -> ConsoleSurface {
        ConsoleSurface {
            port,
            state,
            slider,
        }
    }

    /// Run until `quit` or the end of input, then end the synchronizer
    /// session and wait for it to finish.
    pub async fn run<R, W>(mut self, input: R, output: &mut W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = input.lines();
        output.write_all(b"Welcome to Lumon\n").await?;
        self.render_to(output).await?;
        loop {
            select! {
                line = lines.next_line() => {
                    let line = match line? {
                        Some(line) => line,
                        None => break,
                    };
                    let reply = match parse_command(&line) {
                        Ok(None) => None,
                        Ok(Some(ConsoleCommand::Quit)) => break,
                        Ok(Some(command)) => self.execute(command).await?,
                        Err(e) => Some(format!("{}\n", e)),
                    };
                    if let Some(reply) = reply {
                        output.write_all(reply.as_bytes()).await?;
                    }
                    output.flush().await?;
                }
                Ok(()) = self.state.changed() => {
                    self.render_to(output).await?;
                }
            }
        }
        output.flush().await?;
        log::debug!("Console closed, ending session");
        self.port.await_shutdown().await;
        Ok(())
    }

    async fn render_to<W: AsyncWrite + Unpin>(&mut self, output: &mut W) -> Result<()> {
        let text = render(&self.state.borrow_and_update());
        output.write_all(text.as_bytes()).await?;
        output.flush().await?;
        Ok(())
    }

    /// Id and brightness of the display shown in the given 1-based row
    fn display_in_row(&self, row: usize) -> Option<(String, u16)> {
        self.state
            .borrow()
            .displays()
            .and_then(|list| list.at(row - 1))
            .map(|d| (d.id.clone(), d.brightness))
    }

    async fn execute(&mut self, command: ConsoleCommand) -> Result<Option<String>> {
        let (row, requested) = match command {
            ConsoleCommand::Set { row, value } => (row, Some(value)),
            ConsoleCommand::Up(row) | ConsoleCommand::Down(row) => (row, None),
            ConsoleCommand::List => return Ok(Some(render(&self.state.borrow()))),
            ConsoleCommand::Help => return Ok(Some(HELP.to_owned())),
            ConsoleCommand::Reload => {
                self.port.reload().await?;
                return Ok(Some("Reloading displays...\n".to_owned()));
            }
            ConsoleCommand::Quit => return Ok(None),
        };

        let (id, current) = match self.display_in_row(row) {
            Some(display) => display,
            None => return Ok(Some(format!("No display in row {}\n", row))),
        };
        let step = i32::from(self.slider.step());
        let value = match (command, requested) {
            (_, Some(value)) => value,
            (ConsoleCommand::Up(_), None) => i32::from(current) + step,
            _ => i32::from(current) - step,
        };
        match self.port.change_brightness(&id, self.slider.snap(value)).await? {
            SyncOutcome::UnknownIdIgnored => Ok(Some(format!("Display {} is gone\n", id))),
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        control::{display_list::DisplayList, display_synchronizer::DisplaySynchronizer},
        external::backend::{mock::MockDisplayBackend, DisplayDescriptor},
    };

    fn three_displays() -> Vec<DisplayDescriptor> {
        vec![
            DisplayDescriptor::new("d1", "Main", 50),
            DisplayDescriptor::new("d2", "Side", 30),
            DisplayDescriptor::new("d3", "TV", 100),
        ]
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(
            parse_command("set 1 75"),
            Ok(Some(ConsoleCommand::Set { row: 1, value: 75 }))
        );
        assert_eq!(parse_command("  UP 2 "), Ok(Some(ConsoleCommand::Up(2))));
        assert_eq!(parse_command("- 3"), Ok(Some(ConsoleCommand::Down(3))));
        assert_eq!(parse_command("reload"), Ok(Some(ConsoleCommand::Reload)));
        assert_eq!(parse_command("q"), Ok(Some(ConsoleCommand::Quit)));
        assert_eq!(parse_command("   "), Ok(None));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            parse_command("dim 1"),
            Err(CommandParseError::Unknown("dim".to_owned()))
        );
        assert_eq!(
            parse_command("set 1"),
            Err(CommandParseError::MissingArgument("value"))
        );
        assert_eq!(
            parse_command("up"),
            Err(CommandParseError::MissingArgument("row"))
        );
        assert_eq!(
            parse_command("set one 5"),
            Err(CommandParseError::InvalidNumber("one".to_owned()))
        );
        assert_eq!(parse_command("down 0"), Err(CommandParseError::ZeroRow));
    }

    #[test]
    fn test_slider_snapping() {
        let slider = Slider::new(5);
        assert_eq!(slider.snap(73), 75);
        assert_eq!(slider.snap(72), 70);
        assert_eq!(slider.snap(-20), 0);
        assert_eq!(slider.snap(140), 100);
        assert_eq!(Slider::new(1).snap(42), 42);
        assert_eq!(Slider::new(30).snap(100), 90);
        assert_eq!(Slider::new(0).step(), 1);
    }

    #[test]
    fn test_render() {
        assert_eq!(render(&DisplayState::Loading), "Loading...\n");
        assert_eq!(
            render(&DisplayState::Loaded(DisplayList::default())),
            "No controllable displays found\n"
        );
        let state = DisplayState::Loaded(DisplayList::from(vec![
            DisplayDescriptor::new("d1", "Main", 50),
            DisplayDescriptor::new("d2", "Side", 30),
        ]));
        assert_eq!(
            render(&state),
            "1. Main\n   Brightness: 50%\n2. Side\n   Brightness: 30%\n"
        );
    }

    #[tokio::test]
    async fn test_console_session() {
        let backend = MockDisplayBackend::new(three_displays());
        let hardware = backend.clone();
        let (port, state) = DisplaySynchronizer::new(backend).spawn();
        let mut loaded = state.clone();
        while loaded.borrow_and_update().is_loading() {
            loaded.changed().await.unwrap();
        }

        let input: &[u8] = b"set 1 73\nup 2\ndown 3\n\nbogus\nset 9 10\nlist\nquit\nset 1 0\n";
        let mut output = Vec::new();
        ConsoleSurface::new(port, state, Slider::new(5))
            .run(input, &mut output)
            .await
            .unwrap();

        assert_eq!(hardware.get_brightness("d1"), Some(75));
        assert_eq!(hardware.get_brightness("d2"), Some(35));
        assert_eq!(hardware.get_brightness("d3"), Some(95));

        let output = String::from_utf8(output).unwrap();
        assert!(output.starts_with("Welcome to Lumon\n"));
        assert!(output.contains("Unknown command bogus"));
        assert!(output.contains("No display in row 9"));
        assert!(output.contains("1. Main\n   Brightness: 75%\n"));
        assert!(output.contains("3. TV\n   Brightness: 95%\n"));
    }

    #[tokio::test]
    async fn test_console_ends_on_eof() {
        let backend = MockDisplayBackend::new(three_displays());
        backend.set_failure_mode(true);
        let (port, state) = DisplaySynchronizer::new(backend).spawn();
        let input: &[u8] = b"set 1 50\n";
        let mut output = Vec::new();
        ConsoleSurface::new(port, state, Slider::new(5))
            .run(input, &mut output)
            .await
            .unwrap();
        let output = String::from_utf8(output).unwrap();
        assert!(output.contains("Loading..."));
        assert!(output.contains("No display in row 1"));
    }
}
