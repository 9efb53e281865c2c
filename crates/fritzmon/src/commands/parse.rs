//! `fritzmon parse`: decode raw call-monitor lines without a router.

use std::io::{self, BufRead, IsTerminal};

use tabled::Tabled;

use fritzmon_core::{CallEvent, parse_line};

use crate::cli::{GlobalOpts, ParseArgs};
use crate::error::CliError;
use crate::output;

#[derive(Tabled)]
struct CallEventRow {
    #[tabled(rename = "Time")]
    time: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Conn")]
    connection: String,
    #[tabled(rename = "Remote")]
    remote: String,
    #[tabled(rename = "Local")]
    local: String,
    #[tabled(rename = "Ext")]
    line: String,
    #[tabled(rename = "Trunk")]
    device: String,
    #[tabled(rename = "Duration")]
    duration: String,
}

fn dash(value: Option<&String>) -> String {
    value.cloned().unwrap_or_else(|| "-".into())
}

impl From<&CallEvent> for CallEventRow {
    fn from(e: &CallEvent) -> Self {
        Self {
            time: e
                .timestamp
                .map_or_else(|| e.raw_timestamp.clone(), |t| t.to_string()),
            kind: e.kind.as_str().to_owned(),
            connection: dash(e.connection_id.as_ref()),
            remote: dash(e.remote_number.as_ref()),
            local: dash(e.local_number.as_ref()),
            line: dash(e.line.as_ref()),
            device: dash(e.device.as_ref()),
            duration: e.duration.as_ref().map_or_else(
                || "-".into(),
                |d| d.seconds().map_or_else(|| "?".into(), |s| format!("{s}s")),
            ),
        }
    }
}

fn read_stdin() -> Result<Vec<String>, CliError> {
    let stdin = io::stdin();
    if stdin.is_terminal() {
        return Err(CliError::Validation {
            field: "lines".into(),
            reason: "pass call-monitor lines as arguments or pipe them on stdin".into(),
        });
    }
    let mut lines = Vec::new();
    for line in stdin.lock().lines() {
        lines.push(line?);
    }
    Ok(lines)
}

pub fn handle(args: &ParseArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let raw = if args.lines.is_empty() {
        read_stdin()?
    } else {
        args.lines.clone()
    };

    let events: Vec<CallEvent> = raw
        .iter()
        .map(|l| l.trim_end_matches(['\r', '\n']))
        .filter(|l| !l.is_empty())
        .map(parse_line)
        .collect();

    let out = output::render_list(
        &global.output,
        &events,
        |e| CallEventRow::from(e),
        |e| e.kind.as_str().to_owned(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}
