use core::time::Duration;

use ppm_core::control::ControlBlock;
use ppm_core::repl::{CommandError, CommandExecutor, Feed, LineBuffer, write_response};
use ppm_core::timing::Code;

fn respond(executor: &mut CommandExecutor<&ControlBlock>, line: &str) -> String {
    let mut out = String::new();
    let result = executor.execute(line);
    write_response(&mut out, &result).expect("string write");
    out
}

#[test]
fn set_code_acknowledges_value() {
    let control = ControlBlock::new();
    let mut executor = CommandExecutor::new(&control);

    let reply = respond(&mut executor, "C:500");
    assert_eq!(reply, "\r\nPPM code sent: 500\r\n");
    assert_eq!(control.code(), Code::new(500));
}

#[test]
fn toggle_resets_code_and_reports_state() {
    let control = ControlBlock::new();
    control.set_code(Code::new(321));
    let mut executor = CommandExecutor::new(&control);

    assert_eq!(respond(&mut executor, "T"), "\r\nTest mode enabled\r\n");
    assert!(control.test_mode());
    assert_eq!(control.code(), Code::ZERO);

    assert_eq!(respond(&mut executor, "t"), "\r\nTest mode disabled\r\n");
    assert!(!control.test_mode());
}

#[test]
fn rejected_lines_leave_state_unchanged() {
    let control = ControlBlock::new();
    control.set_code(Code::new(77));
    let before = control.snapshot();
    let mut executor = CommandExecutor::new(&control);

    assert_eq!(respond(&mut executor, "X"), "\r\nUnrecognized command: X\r\n");
    assert_eq!(
        respond(&mut executor, "P:0.005"),
        "\r\nPeriod must be greater than 0.010 s\r\n"
    );
    assert!(matches!(
        executor.execute("C:abc"),
        Err(CommandError::Parse(_))
    ));
    assert_eq!(control.snapshot(), before);
}

#[test]
fn period_is_stored_on_the_control_block() {
    let control = ControlBlock::new();
    let mut executor = CommandExecutor::new(&control);

    assert_eq!(
        respond(&mut executor, "P: 0.25"),
        "\r\nTest update period set: 0.250 s\r\n"
    );
    assert_eq!(control.test_update_period(), Duration::from_millis(250));
}

#[test]
fn console_bytes_flow_through_line_buffer() {
    let control = ControlBlock::new();
    let mut executor = CommandExecutor::new(&control);
    let mut buffer: LineBuffer = LineBuffer::new();
    let mut replies = Vec::new();

    for byte in b"C:9\x0812\r\nT\r\n" {
        if let Feed::Line(line) = buffer.push(*byte) {
            replies.push(respond(&mut executor, &line));
        }
    }

    assert_eq!(
        replies,
        ["\r\nPPM code sent: 12\r\n", "\r\nTest mode enabled\r\n"]
    );
}
