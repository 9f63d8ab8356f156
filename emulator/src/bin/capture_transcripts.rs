use std::io;

#[allow(dead_code)]
#[path = "../session.rs"]
mod session;

use ppm_core::control::ControlBlock;
use ppm_core::generator::GeneratorMode;
use session::{Session, SessionConfig, TranscriptProfile};

fn main() -> io::Result<()> {
    record_profile(TranscriptProfile::Sequenced)?;
    record_profile(TranscriptProfile::Triggered)?;
    record_profile(TranscriptProfile::Sweep)?;
    Ok(())
}

fn record_profile(profile: TranscriptProfile) -> io::Result<()> {
    let mode = match profile {
        TranscriptProfile::Triggered => GeneratorMode::Triggered,
        TranscriptProfile::Sequenced | TranscriptProfile::Sweep => GeneratorMode::Sequenced,
    };
    let control = ControlBlock::new();
    let mut session = Session::new(
        SessionConfig {
            mode,
            profile,
            ..SessionConfig::default()
        },
        &control,
    )?;

    match profile {
        TranscriptProfile::Sequenced | TranscriptProfile::Triggered => record_codes(&mut session),
        TranscriptProfile::Sweep => record_sweep(&mut session),
    }
}

fn record_codes(session: &mut Session<'_>) -> io::Result<()> {
    let _ = session.handle_command("status")?;
    let _ = session.handle_command("trace 2")?;
    let _ = session.handle_command("C:500")?;
    let _ = session.handle_command("trace 2")?;
    let _ = session.handle_command("C:5000")?;
    let _ = session.handle_command("run 48000")?;
    let _ = session.handle_command("X")?;
    let _ = session.handle_command("status")?;
    Ok(())
}

fn record_sweep(session: &mut Session<'_>) -> io::Result<()> {
    let _ = session.handle_command("T")?;
    let _ = session.handle_command("trace 4")?;
    let _ = session.handle_command("P:0.005")?;
    let _ = session.handle_command("P:0.02")?;
    let _ = session.handle_command("run 5000")?;
    let _ = session.handle_command("t")?;
    let _ = session.handle_command("run 10")?;
    let _ = session.handle_command("status")?;
    Ok(())
}
