use crate::{
    engine::{InsertPosition, Operation, RosterEngine, Workflow},
    error::{EngineError, ErrorCode, parse_index},
    persistence::ProjectGateway,
    roster::Costume,
    session::{ProjectSession, SessionError},
};
use rosterforge_protocol::CommandResponse;
use serde::Serialize;
use serde_json::{Value, json};
use std::fs;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    Help,
    Capabilities,
    Roster,
    ListCostumes {
        fighter: String,
    },
    InsertCostume {
        fighter: String,
        name: String,
        file: String,
        at: Option<String>,
        group: Option<String>,
        csp: Option<String>,
        icon: Option<String>,
    },
    RemoveCostume {
        fighter: String,
        index: String,
    },
    ReorderCostume {
        fighter: String,
        from: String,
        to: String,
    },
    Op {
        payload: String,
    },
    Workflow {
        payload: String,
    },
}

#[derive(Debug, Clone)]
pub struct ShellRunResult {
    pub state_changed: bool,
    pub response: CommandResponse,
}

impl ShellCommand {
    pub fn preview(&self) -> String {
        match self {
            Self::Help => "show shell command help".to_string(),
            Self::Capabilities => "inspect engine capabilities".to_string(),
            Self::Roster => "show fighter roster summary".to_string(),
            Self::ListCostumes { fighter } => format!("list costumes of '{fighter}'"),
            Self::InsertCostume {
                fighter, name, at, ..
            } => {
                let at = at.as_deref().unwrap_or("end");
                format!("insert costume '{name}' into '{fighter}' at {at}")
            }
            Self::RemoveCostume { fighter, index } => {
                format!("remove costume {index} from '{fighter}'")
            }
            Self::ReorderCostume { fighter, from, to } => {
                format!("swap costumes {from} and {to} of '{fighter}'")
            }
            Self::Op { .. } => "apply one engine operation from JSON".to_string(),
            Self::Workflow { .. } => "apply engine workflow from JSON".to_string(),
        }
    }
}

pub fn shell_help_text() -> &'static str {
    "rosterforge commands:\n\
help\n\
capabilities\n\
roster\n\
list-costumes FIGHTER\n\
insert-costume FIGHTER NAME FILE [--at INDEX] [--group ID] [--csp REF] [--icon REF]\n\
remove-costume FIGHTER INDEX\n\
reorder-costume FIGHTER FROM TO\n\
op <operation-json-or-@file>\n\
workflow <workflow-json-or-@file>\n\
FIGHTER is a roster index or a fighter name"
}

fn parse_json_payload(raw: &str) -> Result<String, EngineError> {
    if let Some(path) = raw.strip_prefix('@') {
        fs::read_to_string(path).map_err(|e| {
            EngineError::invalid_input(format!("Could not read JSON file '{path}': {e}"))
        })
    } else {
        Ok(raw.to_string())
    }
}

fn token_error(command: &str) -> String {
    format!("Invalid '{command}' usage. Try: help")
}

fn expect_arity(tokens: &[String], n: usize) -> Result<(), String> {
    if tokens.len() == n {
        Ok(())
    } else {
        Err(token_error(&tokens[0]))
    }
}

pub fn parse_shell_tokens(tokens: &[String]) -> Result<ShellCommand, String> {
    if tokens.is_empty() {
        return Err("Missing shell command".to_string());
    }
    let cmd = tokens[0].as_str();
    match cmd {
        "help" | "-h" | "--help" => Ok(ShellCommand::Help),
        "capabilities" => {
            expect_arity(tokens, 1)?;
            Ok(ShellCommand::Capabilities)
        }
        "roster" | "fighters" => {
            expect_arity(tokens, 1)?;
            Ok(ShellCommand::Roster)
        }
        "list-costumes" => {
            expect_arity(tokens, 2)?;
            Ok(ShellCommand::ListCostumes {
                fighter: tokens[1].clone(),
            })
        }
        "insert-costume" => {
            if tokens.len() < 4 {
                return Err(token_error(cmd));
            }
            let (mut at, mut group, mut csp, mut icon) = (None, None, None, None);
            let mut rest = tokens[4..].iter();
            while let Some(flag) = rest.next() {
                let slot = match flag.as_str() {
                    "--at" => &mut at,
                    "--group" => &mut group,
                    "--csp" => &mut csp,
                    "--icon" => &mut icon,
                    other => return Err(format!("Unknown option '{other}' for {cmd}")),
                };
                let value = rest
                    .next()
                    .ok_or_else(|| format!("Missing value after '{flag}'"))?;
                *slot = Some(value.clone());
            }
            Ok(ShellCommand::InsertCostume {
                fighter: tokens[1].clone(),
                name: tokens[2].clone(),
                file: tokens[3].clone(),
                at,
                group,
                csp,
                icon,
            })
        }
        "remove-costume" => {
            expect_arity(tokens, 3)?;
            Ok(ShellCommand::RemoveCostume {
                fighter: tokens[1].clone(),
                index: tokens[2].clone(),
            })
        }
        "reorder-costume" | "swap-costume" => {
            expect_arity(tokens, 4)?;
            Ok(ShellCommand::ReorderCostume {
                fighter: tokens[1].clone(),
                from: tokens[2].clone(),
                to: tokens[3].clone(),
            })
        }
        "op" | "workflow" => {
            if tokens.len() < 2 {
                return Err(token_error(cmd));
            }
            let payload = tokens[1..].join(" ");
            if cmd == "op" {
                Ok(ShellCommand::Op { payload })
            } else {
                Ok(ShellCommand::Workflow { payload })
            }
        }
        other => Err(format!("Unknown shell command '{other}'. Try: help")),
    }
}

pub fn parse_shell_line(line: &str) -> Result<ShellCommand, String> {
    let tokens = split_shell_words(line)?;
    parse_shell_tokens(&tokens)
}

pub fn split_shell_words(line: &str) -> Result<Vec<String>, String> {
    #[derive(Clone, Copy, PartialEq, Eq)]
    enum Mode {
        Normal,
        SingleQuoted,
        DoubleQuoted,
    }

    let mut out = Vec::new();
    let mut current = String::new();
    let mut mode = Mode::Normal;
    let mut chars = line.chars();

    while let Some(ch) = chars.next() {
        match (mode, ch) {
            (Mode::Normal, '\'') => mode = Mode::SingleQuoted,
            (Mode::Normal, '"') => mode = Mode::DoubleQuoted,
            (Mode::Normal | Mode::DoubleQuoted, '\\') => {
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            }
            (Mode::Normal, c) if c.is_whitespace() => {
                if !current.is_empty() {
                    out.push(std::mem::take(&mut current));
                }
            }
            (Mode::SingleQuoted, '\'') | (Mode::DoubleQuoted, '"') => mode = Mode::Normal,
            (_, c) => current.push(c),
        }
    }

    if mode != Mode::Normal {
        return Err("Unterminated quoted string in shell command".to_string());
    }
    if !current.is_empty() {
        out.push(current);
    }
    if out.is_empty() {
        return Err("Empty shell command".to_string());
    }
    Ok(out)
}

fn to_data<T: Serialize>(value: &T) -> Result<Value, EngineError> {
    serde_json::to_value(value)
        .map_err(|e| EngineError::new(ErrorCode::Internal, format!("Could not serialize: {e}")))
}

fn build_costume(
    name: &str,
    file: &str,
    group: Option<&str>,
    csp: Option<&str>,
    icon: Option<&str>,
) -> Result<Costume, EngineError> {
    if name.trim().is_empty() || file.trim().is_empty() {
        return Err(EngineError::invalid_input(
            "Costume name and file must not be empty",
        ));
    }
    let mut costume = Costume::new(name, file);
    costume.color_smash_group = group
        .map(|g| {
            g.trim().parse::<u32>().map_err(|_| {
                EngineError::invalid_input(format!("Invalid color smash group: {g}"))
            })
        })
        .transpose()?;
    costume.csp = csp.map(str::to_string);
    costume.icon = icon.map(str::to_string);
    Ok(costume)
}

/// Commands answered without opening a project.
pub fn execute_without_project(command: &ShellCommand) -> Option<ShellRunResult> {
    let response = match command {
        ShellCommand::Help => CommandResponse::ok().with_message(shell_help_text()),
        ShellCommand::Capabilities => match to_data(&RosterEngine::capabilities()) {
            Ok(data) => CommandResponse::ok().with_data(data),
            Err(e) => CommandResponse::failure(e.code.as_str(), e.message),
        },
        _ => return None,
    };
    Some(ShellRunResult {
        state_changed: false,
        response,
    })
}

/// Narrows a parsed index; negatives are reported against the fighter's
/// costume count like any other out-of-range index.
fn costume_index<G: ProjectGateway>(
    session: &ProjectSession<G>,
    fighter: &str,
    label: &str,
    raw: i64,
) -> Result<usize, SessionError> {
    usize::try_from(raw).map_err(|_| {
        let error = match session.project().resolve_fighter(fighter) {
            Ok(found) => EngineError::out_of_range(label, raw, found.costume_count()),
            Err(not_found) => not_found,
        };
        SessionError::Rejected(error)
    })
}

fn applied<G: ProjectGateway>(
    session: &mut ProjectSession<G>,
    op: Operation,
) -> Result<ShellRunResult, SessionError> {
    let result = session.apply(op)?;
    Ok(ShellRunResult {
        state_changed: result.changed,
        response: result.response(),
    })
}

fn run_command<G: ProjectGateway>(
    session: &mut ProjectSession<G>,
    command: &ShellCommand,
) -> Result<ShellRunResult, SessionError> {
    if let Some(result) = execute_without_project(command) {
        return Ok(result);
    }
    let unchanged = |response| ShellRunResult {
        state_changed: false,
        response,
    };
    match command {
        ShellCommand::Help | ShellCommand::Capabilities => Err(SessionError::Rejected(
            EngineError::new(ErrorCode::Internal, "stateless command reached the session"),
        )),
        ShellCommand::Roster => {
            let summary = session.project().summarize(session.engine().linkage());
            let data = to_data(&summary).map_err(SessionError::Rejected)?;
            Ok(unchanged(CommandResponse::ok().with_data(data)))
        }
        ShellCommand::ListCostumes { fighter } => {
            let project = session.project();
            let id = project
                .resolve_fighter_id(fighter)
                .map_err(SessionError::Rejected)?;
            let found = &project.fighters()[id];
            let mut response = CommandResponse::ok().with_fighter(&found.name, id);
            response.costume_count = Some(found.costume_count());
            response.costumes = Some(found.costume_entries());
            Ok(unchanged(response))
        }
        ShellCommand::InsertCostume {
            fighter,
            name,
            file,
            at,
            group,
            csp,
            icon,
        } => {
            let position = match at {
                Some(token) => {
                    let raw = parse_index("Insert index", token).map_err(SessionError::Rejected)?;
                    InsertPosition::At(costume_index(session, fighter, "Insert index", raw)?)
                }
                None => InsertPosition::End,
            };
            let costume = build_costume(
                name,
                file,
                group.as_deref(),
                csp.as_deref(),
                icon.as_deref(),
            )
            .map_err(SessionError::Rejected)?;
            applied(
                session,
                Operation::InsertCostume {
                    fighter: fighter.clone(),
                    position,
                    costume,
                },
            )
        }
        ShellCommand::RemoveCostume { fighter, index } => {
            let raw = parse_index("Costume index", index).map_err(SessionError::Rejected)?;
            let index = costume_index(session, fighter, "Costume index", raw)?;
            applied(
                session,
                Operation::RemoveCostume {
                    fighter: fighter.clone(),
                    index,
                },
            )
        }
        ShellCommand::ReorderCostume { fighter, from, to } => {
            let from_raw = parse_index("From index", from).map_err(SessionError::Rejected)?;
            let to_raw = parse_index("To index", to).map_err(SessionError::Rejected)?;
            let from_index = costume_index(session, fighter, "From index", from_raw)?;
            let to_index = costume_index(session, fighter, "To index", to_raw)?;
            applied(
                session,
                Operation::ReorderCostume {
                    fighter: fighter.clone(),
                    from_index,
                    to_index,
                },
            )
        }
        ShellCommand::Op { payload } => {
            let json_text = parse_json_payload(payload).map_err(SessionError::Rejected)?;
            let op: Operation = serde_json::from_str(&json_text).map_err(|e| {
                SessionError::Rejected(EngineError::invalid_input(format!(
                    "Invalid operation JSON: {e}"
                )))
            })?;
            applied(session, op)
        }
        ShellCommand::Workflow { payload } => {
            let json_text = parse_json_payload(payload).map_err(SessionError::Rejected)?;
            let workflow: Workflow = serde_json::from_str(&json_text).map_err(|e| {
                SessionError::Rejected(EngineError::invalid_input(format!(
                    "Invalid workflow JSON: {e}"
                )))
            })?;
            let run_id = workflow.run_id.clone();
            let results = session.apply_workflow(workflow)?;
            let responses: Vec<CommandResponse> = results.iter().map(|r| r.response()).collect();
            let data = to_data(&responses).map_err(SessionError::Rejected)?;
            Ok(ShellRunResult {
                state_changed: results.iter().any(|r| r.changed),
                response: CommandResponse::ok()
                    .with_message(format!(
                        "Workflow '{run_id}' applied {} operation(s)",
                        results.len()
                    ))
                    .with_data(json!({ "results": data })),
            })
        }
    }
}

/// Runs one command against the session. Failures come back as a failure
/// payload; `state_changed` is true only when memory differs from before.
pub fn execute_shell_command<G: ProjectGateway>(
    session: &mut ProjectSession<G>,
    command: &ShellCommand,
) -> ShellRunResult {
    match run_command(session, command) {
        Ok(result) => result,
        Err(error) => ShellRunResult {
            state_changed: error.mutation_applied(),
            response: error.response(),
        },
    }
}
