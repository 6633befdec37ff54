//! Desktop notification and audible cue for a due alarm.

use std::io::Write;

use calarm_core::monitor::DueAlarm;
use chrono::Local;
use notify_rust::{Notification, Timeout};
use tracing::warn;

const APP_NAME: &str = "calarm";
const SOUND: &str = "alarm-clock-elapsed";

pub fn notification_body(due: &DueAlarm) -> String {
    let start = due.event.start.with_timezone(&Local).format("%H:%M");
    let mut body = match &due.event.location {
        Some(location) => format!("Starts at {start} · {location}"),
        None => format!("Starts at {start}"),
    };
    if let Some(text) = due.alarm.description.as_deref().filter(|d| *d != due.event.summary) {
        body.push('\n');
        body.push_str(text);
    }
    body
}

/// Show the notification on a blocking thread and ring the terminal bell.
pub async fn present(due: &DueAlarm) {
    let summary = due.event.summary.clone();
    let body = notification_body(due);

    let shown = tokio::task::spawn_blocking(move || {
        Notification::new()
            .appname(APP_NAME)
            .summary(&summary)
            .body(&body)
            .sound_name(SOUND)
            .timeout(Timeout::Never)
            .show()
            .map(|_| ())
            .map_err(|e| e.to_string())
    })
    .await;

    match shown {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(error = %e, "could not show desktop notification"),
        Err(e) => warn!(error = %e, "notification task failed"),
    }

    ring_bell();
}

fn ring_bell() {
    let mut stdout = std::io::stdout();
    let _ = stdout.write_all(b"\x07");
    let _ = stdout.flush();
}
