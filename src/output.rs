//! User-facing lines for the CLI.
//! Labels are colored only when the target stream is a TTY. Results that scripts
//! consume (`true`, a relative path, ...) go through `print_user` without a label.

use owo_colors::OwoColorize;

#[derive(Clone, Copy)]
enum Stream {
    Out,
    Err,
}

impl Stream {
    fn is_tty(self) -> bool {
        match self {
            Stream::Out => atty::is(atty::Stream::Stdout),
            Stream::Err => atty::is(atty::Stream::Stderr),
        }
    }
}

#[derive(Clone, Copy)]
enum Label {
    Info,
    Warn,
    Error,
    Ok,
}

impl Label {
    fn text(self) -> &'static str {
        match self {
            Label::Info => "info:",
            Label::Warn => "warn:",
            Label::Error => "error:",
            Label::Ok => "ok:",
        }
    }

    fn stream(self) -> Stream {
        match self {
            Label::Info | Label::Ok => Stream::Out,
            Label::Warn | Label::Error => Stream::Err,
        }
    }
}

fn labelled(label: Label, msg: &str, tty: bool) -> String {
    if !tty {
        return format!("{} {}", label.text(), msg);
    }
    let text = label.text();
    let colored = match label {
        Label::Info => text.cyan().bold().to_string(),
        Label::Warn => text.yellow().bold().to_string(),
        Label::Error => text.red().bold().to_string(),
        Label::Ok => text.green().bold().to_string(),
    };
    format!("{colored} {msg}")
}

fn emit(label: Label, msg: &str) {
    let stream = label.stream();
    let line = labelled(label, msg, stream.is_tty());
    match stream {
        Stream::Out => println!("{line}"),
        Stream::Err => eprintln!("{line}"),
    }
}

pub fn print_info(msg: &str) {
    emit(Label::Info, msg);
}

pub fn print_warn(msg: &str) {
    emit(Label::Warn, msg);
}

pub fn print_error(msg: &str) {
    emit(Label::Error, msg);
}

pub fn print_success(msg: &str) {
    emit(Label::Ok, msg);
}

/// Print a plain result line (no prefix, never colored).
pub fn print_user(msg: &str) {
    println!("{msg}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_when_not_a_tty() {
        assert_eq!(labelled(Label::Error, "boom", false), "error: boom");
        assert_eq!(labelled(Label::Ok, "done", false), "ok: done");
    }

    #[test]
    fn colored_when_tty() {
        let line = labelled(Label::Warn, "careful", true);
        assert!(line.contains("warn:"));
        assert!(line.contains('\u{1b}'));
        assert!(line.ends_with(" careful"));
    }
}
