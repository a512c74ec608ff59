//! Line-oriented front end: parses typed commands and renders the table.
//!
//! Row numbers shown to the user start at the configured start row; the
//! parser converts them back to zero-based table positions.

use std::{collections::BTreeMap, fmt::Write as _};

use listing_core::{BridgeMode, ChannelMessage, PendingChange, Row, TableSchema};

pub const HELP: &str = "\
commands:
  show                              print the table
  add [field=value ...]             append a new row
  set <row> <field> <value>         edit one cell
  manager <row> [<row> ...] <name>  reassign rows to a manager
  delete <row> [<row> ...]          delete rows (asks for confirmation)
  pending                           list unsaved changes
  save                              send unsaved changes to the server
  reload                            load the listing again
  mode legacy|modular               switch the command path
  start-row <n>                     number the first row as <n>
  connect [path]                    open the live channel
  send <json object>                send a message over the channel
  help                              show this text
  quit                              save settings and exit";

#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleAction {
    Show,
    Add(BTreeMap<String, String>),
    Set {
        position: usize,
        field: String,
        value: String,
    },
    Manager {
        positions: Vec<usize>,
        name: String,
    },
    Delete(Vec<usize>),
    Pending,
    Save,
    Reload,
    Mode(BridgeMode),
    StartRow(u32),
    Connect(Option<String>),
    Send(ChannelMessage),
    Help,
    Quit,
}

pub fn parse_action(line: &str, start_row: u32) -> Result<ConsoleAction, String> {
    let line = line.trim();
    let (command, rest) = match line.split_once(char::is_whitespace) {
        Some((command, rest)) => (command, rest.trim()),
        None => (line, ""),
    };
    let args: Vec<&str> = rest.split_whitespace().collect();

    match command.to_ascii_lowercase().as_str() {
        "show" | "ls" => Ok(ConsoleAction::Show),
        "add" => {
            let mut fields = BTreeMap::new();
            for arg in &args {
                let (field, value) = arg
                    .split_once('=')
                    .ok_or_else(|| format!("expected field=value, got '{arg}'"))?;
                fields.insert(field.to_string(), value.to_string());
            }
            Ok(ConsoleAction::Add(fields))
        }
        "set" => {
            let [row, field, ..] = args.as_slice() else {
                return Err("usage: set <row> <field> <value>".into());
            };
            let position = parse_row(row, start_row)?;
            let value = rest
                .splitn(3, char::is_whitespace)
                .nth(2)
                .map(str::trim)
                .unwrap_or_default();
            Ok(ConsoleAction::Set {
                position,
                field: field.to_string(),
                value: value.to_string(),
            })
        }
        "manager" => {
            let Some((name, rows)) = args.split_last() else {
                return Err("usage: manager <row> [<row> ...] <name>".into());
            };
            if rows.is_empty() {
                return Err("usage: manager <row> [<row> ...] <name>".into());
            }
            Ok(ConsoleAction::Manager {
                positions: parse_rows(rows, start_row)?,
                name: name.to_string(),
            })
        }
        "delete" | "rm" => {
            if args.is_empty() {
                return Err("usage: delete <row> [<row> ...]".into());
            }
            Ok(ConsoleAction::Delete(parse_rows(&args, start_row)?))
        }
        "pending" => Ok(ConsoleAction::Pending),
        "save" => Ok(ConsoleAction::Save),
        "reload" | "load" => Ok(ConsoleAction::Reload),
        "mode" => rest.parse().map(ConsoleAction::Mode),
        "start-row" => rest
            .parse::<u32>()
            .map(ConsoleAction::StartRow)
            .map_err(|_| format!("start row must be a non-negative number, got '{rest}'")),
        "connect" => Ok(ConsoleAction::Connect(
            (!rest.is_empty()).then(|| rest.to_string()),
        )),
        "send" => match serde_json::from_str::<serde_json::Value>(rest) {
            Ok(serde_json::Value::Object(message)) => Ok(ConsoleAction::Send(message)),
            Ok(_) => Err("channel messages must be JSON objects".into()),
            Err(err) => Err(format!("invalid JSON: {err}")),
        },
        "help" | "?" => Ok(ConsoleAction::Help),
        "quit" | "exit" | "q" => Ok(ConsoleAction::Quit),
        "" => Err("empty command".into()),
        other => Err(format!("unknown command '{other}' (try 'help')")),
    }
}

pub fn parse_confirmation(line: &str) -> bool {
    matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

fn parse_row(raw: &str, start_row: u32) -> Result<usize, String> {
    let shown: u32 = raw
        .parse()
        .map_err(|_| format!("row must be a number, got '{raw}'"))?;
    shown
        .checked_sub(start_row)
        .map(|position| position as usize)
        .ok_or_else(|| format!("rows are numbered from {start_row}"))
}

fn parse_rows(raw: &[&str], start_row: u32) -> Result<Vec<usize>, String> {
    raw.iter().map(|row| parse_row(row, start_row)).collect()
}

/// Fixed-width text table: shown row number, id, then the schema columns.
pub fn render_table(rows: &[Row], schema: &TableSchema, start_row: u32) -> String {
    let mut headers = vec!["#".to_string(), "id".to_string()];
    headers.extend(schema.columns().iter().map(|column| column.name.to_string()));

    let body: Vec<Vec<String>> = rows
        .iter()
        .enumerate()
        .map(|(position, row)| {
            let mut cells = vec![
                (start_row as usize + position).to_string(),
                row.identity().to_string(),
            ];
            cells.extend(
                schema
                    .columns()
                    .iter()
                    .map(|column| row.get(column.name).unwrap_or_default().to_string()),
            );
            cells
        })
        .collect();

    let widths: Vec<usize> = headers
        .iter()
        .enumerate()
        .map(|(index, header)| {
            body.iter()
                .map(|cells| cells[index].chars().count())
                .chain(std::iter::once(header.chars().count()))
                .max()
                .unwrap_or_default()
        })
        .collect();

    let mut out = String::new();
    push_line(&mut out, &headers, &widths);
    for cells in &body {
        push_line(&mut out, cells, &widths);
    }
    if rows.is_empty() {
        out.push_str("(no rows)\n");
    }
    out
}

fn push_line(out: &mut String, cells: &[String], widths: &[usize]) {
    let line = cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| format!("{cell:<width$}"))
        .collect::<Vec<_>>()
        .join(" | ");
    let _ = writeln!(out, "{}", line.trim_end());
}

pub fn render_pending(changes: &[PendingChange]) -> String {
    if changes.is_empty() {
        return "no unsaved changes\n".to_string();
    }
    let mut out = String::new();
    for change in changes {
        let _ = match change {
            PendingChange::Add(identity) => writeln!(out, "+ add    {identity}"),
            PendingChange::Update {
                identity,
                field,
                value,
            } => writeln!(out, "~ update {identity} {field} = {value:?}"),
            PendingChange::Delete(identity) => writeln!(out, "- delete {identity}"),
        };
    }
    out
}

#[cfg(test)]
#[path = "tests/console_tests.rs"]
mod tests;
