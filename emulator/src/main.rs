mod session;

use std::env;
use std::io::{self, BufRead, Write};
use std::process;

use ppm_core::control::ControlBlock;
use ppm_core::generator::GeneratorMode;
use session::{Session, SessionConfig, TranscriptProfile};

const USAGE: &str = "Usage: ppm-emulator [--variant <sequenced|triggered>] [--clock <hz>] \
                     [--rate <hz>] [--min-gap-us <us>]";

fn main() -> io::Result<()> {
    let config = parse_config(env::args().skip(1)).unwrap_or_else(|err| {
        eprintln!("{err}");
        eprintln!("{USAGE}");
        process::exit(2);
    });

    let stdin = io::stdin();
    let mut reader = stdin.lock();
    let stdout = io::stdout();
    let mut writer = stdout.lock();
    let control = ControlBlock::new();
    let mut session = Session::new(config, &control)?;
    let mut line = String::new();

    writeln!(
        writer,
        "PPM emulator ready ({} generator). Type `help` for commands or `exit` to quit.",
        config.mode
    )?;

    loop {
        line.clear();
        write!(writer, "> ")?;
        writer.flush()?;

        let bytes_read = reader.read_line(&mut line)?;
        if bytes_read == 0 {
            writeln!(writer)?;
            break;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if should_terminate(trimmed) {
            writeln!(writer, "Session closed.")?;
            break;
        }

        let responses = session.handle_command(trimmed)?;
        for response in responses {
            writeln!(writer, "{response}")?;
        }
    }

    Ok(())
}

fn should_terminate(input: &str) -> bool {
    input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit")
}

fn parse_config(args: impl IntoIterator<Item = String>) -> Result<SessionConfig, String> {
    let mut config = SessionConfig::default();
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        let (flag, inline) = match arg.split_once('=') {
            Some((flag, value)) => (flag.to_string(), Some(value.to_string())),
            None => (arg, None),
        };
        let mut value = || {
            inline
                .clone()
                .or_else(|| args.next())
                .ok_or_else(|| format!("Expected value after {flag}"))
        };

        match flag.as_str() {
            "--variant" => {
                let tag = value()?;
                config.mode = GeneratorMode::from_tag(&tag)
                    .ok_or_else(|| format!("Unknown generator variant `{tag}`"))?;
                config.profile = TranscriptProfile::for_mode(config.mode);
            }
            "--clock" => config.timing.clock_frequency_hz = parse_number(&flag, &value()?)?,
            "--rate" => config.timing.sample_rate_hz = parse_number(&flag, &value()?)?,
            "--min-gap-us" => config.timing.min_gap_us = parse_number(&flag, &value()?)?,
            other => return Err(format!("Unknown argument `{other}`")),
        }
    }

    Ok(config)
}

fn parse_number(flag: &str, value: &str) -> Result<u32, String> {
    value
        .parse()
        .map_err(|_| format!("Invalid value `{value}` for {flag}"))
}
