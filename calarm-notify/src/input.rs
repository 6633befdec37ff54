//! Commands typed on stdin while the notifier runs.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input {
    Dismiss,
    /// Minutes; `None` uses the configured default
    Snooze(Option<u32>),
    Refresh,
    Status,
    Quit,
}

pub const HELP: &str = "commands: d(ismiss) | s(nooze) [minutes] | r(efresh) | st(atus) | q(uit)";

pub fn parse(line: &str) -> Result<Option<Input>, String> {
    let mut words = line.split_whitespace();
    let Some(command) = words.next() else {
        return Ok(None);
    };

    let input = match command.to_ascii_lowercase().as_str() {
        "d" | "dismiss" => Input::Dismiss,
        "s" | "snooze" => {
            let minutes = words
                .next()
                .map(|m| m.parse::<u32>().map_err(|_| format!("invalid minutes '{m}'")))
                .transpose()?;
            Input::Snooze(minutes)
        }
        "r" | "refresh" => Input::Refresh,
        "st" | "status" => Input::Status,
        "q" | "quit" => Input::Quit,
        other => return Err(format!("unknown command '{other}'")),
    };

    if let Some(extra) = words.next() {
        return Err(format!("unexpected argument '{extra}'"));
    }
    Ok(Some(input))
}
