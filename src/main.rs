use std::error::Error;
use std::fs::File;
use std::path::{Path, PathBuf};

use clap::Parser;

use chip8::config::{Config, KeymapKind};
use chip8::display::{MonoTermDisplay, CHIP8_RESOLUTION};
use chip8::frame::FrameClock;
use chip8::host::{Host, ProgramSource};
use chip8::input::TermInput;
use chip8::lifecycle::SessionController;
use chip8::session::Chip8Factory;
use chip8::sound::{Mute, SimpleBeep, Sound};

#[derive(Parser, Debug)]
#[command(
    name = "chip8-driver",
    version,
    about = "Runs CHIP-8 programs in the terminal. Tab moves to the next program, \
             F5 or Backspace stops the current one, Esc quits."
)]
struct Cli {
    /// CHIP-8 programs to cycle through; the first one starts straight away
    #[arg(required = true, value_name = "PROGRAM")]
    programs: Vec<PathBuf>,

    /// JSON settings file; flags given here override it
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Instructions executed per display frame
    #[arg(long, value_name = "N")]
    cycles_per_frame: Option<u32>,

    /// Display refresh rate, which also drives the timers
    #[arg(long, value_name = "HZ")]
    refresh_hz: Option<u32>,

    /// Frames a key stays down after its last press
    #[arg(long, value_name = "N")]
    key_hold_frames: Option<u32>,

    /// Keyboard layout for the hex keypad
    #[arg(long, value_enum)]
    keymap: Option<KeymapKind>,

    /// Sound the buzzer through the PC speaker
    #[arg(long, default_value_t = false)]
    sound: bool,

    /// Seed for the random number generator
    #[arg(long)]
    seed: Option<u64>,

    /// Write a log here (RUST_LOG picks the level); the terminal belongs to the display
    #[arg(long, value_name = "PATH")]
    log: Option<PathBuf>,
}

impl Cli {
    fn config(&self) -> Result<Config, Box<dyn Error>> {
        let mut config = match &self.config {
            Some(path) => Config::load(path)?,
            None => Config::default(),
        };
        if let Some(n) = self.cycles_per_frame {
            config.cycles_per_frame = n;
        }
        if let Some(hz) = self.refresh_hz {
            config.refresh_hz = hz;
        }
        if let Some(n) = self.key_hold_frames {
            config.key_hold_frames = n;
        }
        if let Some(keymap) = self.keymap {
            config.keymap = keymap;
        }
        config.sound |= self.sound;
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        config.validate()?;
        Ok(config)
    }
}

fn init_logging(path: &Path) -> Result<(), Box<dyn Error>> {
    let file = File::create(path)?;
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Pipe(Box::new(file)))
        .init();
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    if let Some(path) = &cli.log {
        init_logging(path)?;
    }
    let config = cli.config()?;
    log::info!("starting with {:?}", config);

    let sound: Box<dyn Sound> = if config.sound {
        Box::new(SimpleBeep::new())
    } else {
        Box::new(Mute)
    };
    // input first, so raw mode is on before the display takes the screen
    let input = TermInput::new()?;
    let display = MonoTermDisplay::new(CHIP8_RESOLUTION)?;
    let factory = Chip8Factory::new(display, sound, config.cycles_per_frame, config.seed);
    let controller = SessionController::new(factory, config.keymap.keymap());
    let programs = cli.programs.into_iter().map(ProgramSource::Path).collect();

    let mut host = Host::new(
        input,
        FrameClock::new(config.refresh_hz),
        controller,
        programs,
        config.key_hold_frames,
    );
    host.run()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_program_required() {
        assert!(Cli::try_parse_from(["chip8-driver"]).is_err());
    }

    #[test]
    fn test_flags_override_defaults() -> Result<(), Box<dyn Error>> {
        let cli = Cli::try_parse_from([
            "chip8-driver",
            "--cycles-per-frame",
            "20",
            "--keymap",
            "literal",
            "--seed",
            "7",
            "pong.ch8",
            "tetris.ch8",
        ])?;
        assert_eq!(cli.programs.len(), 2);
        let config = cli.config()?;
        assert_eq!(config.cycles_per_frame, 20);
        assert_eq!(config.keymap, KeymapKind::Literal);
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.refresh_hz, Config::default().refresh_hz);
        assert!(!config.sound);
        Ok(())
    }

    #[test]
    fn test_bad_override_rejected() -> Result<(), Box<dyn Error>> {
        let cli = Cli::try_parse_from(["chip8-driver", "--refresh-hz", "0", "pong.ch8"])?;
        assert!(cli.config().is_err());
        Ok(())
    }
}
