use rosterforge::{
    about,
    config::{self, Settings},
    error::ErrorCode,
    persistence::ProjectFileStore,
    session::ProjectSession,
    shell::{
        ShellCommand, execute_shell_command, execute_without_project, parse_shell_line,
        parse_shell_tokens,
    },
};
use rosterforge_protocol::CommandResponse;
use std::{
    env,
    io::{self, BufRead},
};
use tracing::debug;

fn usage() {
    eprintln!(
        "Usage:\n  \
  rosterforge_cli --version\n  \
  rosterforge_cli [--project PATH] [--linkage PATH] capabilities\n  \
  rosterforge_cli [--project PATH] [--linkage PATH] roster\n  \
  rosterforge_cli [--project PATH] [--linkage PATH] list-costumes FIGHTER\n  \
  rosterforge_cli [--project PATH] [--linkage PATH] insert-costume FIGHTER NAME FILE [--at INDEX] [--group ID] [--csp REF] [--icon REF]\n  \
  rosterforge_cli [--project PATH] [--linkage PATH] remove-costume FIGHTER INDEX\n  \
  rosterforge_cli [--project PATH] [--linkage PATH] reorder-costume FIGHTER FROM TO\n  \
  rosterforge_cli [--project PATH] [--linkage PATH] op '<operation-json>'\n  \
  rosterforge_cli [--project PATH] [--linkage PATH] workflow '<workflow-json>'\n  \
  rosterforge_cli [--project PATH] [--linkage PATH] shell\n\n  \
  Tip: pass @file.json instead of inline JSON"
    );
}

fn print_json(response: &CommandResponse) -> Result<(), String> {
    println!("{}", response.to_pretty_json()?);
    Ok(())
}

/// Prints the payload and reports whether the command succeeded.
fn emit(response: &CommandResponse) -> Result<bool, String> {
    print_json(response)?;
    Ok(response.success)
}

struct GlobalArgs {
    project: Option<String>,
    linkage: Option<String>,
    cmd_idx: usize,
}

fn parse_global_args(args: &[String]) -> Result<GlobalArgs, String> {
    let mut globals = GlobalArgs {
        project: None,
        linkage: None,
        cmd_idx: 1,
    };
    while let Some(flag) = args.get(globals.cmd_idx) {
        let slot = match flag.as_str() {
            "--project" => &mut globals.project,
            "--linkage" => &mut globals.linkage,
            _ => break,
        };
        let value = args
            .get(globals.cmd_idx + 1)
            .ok_or_else(|| format!("Missing value after '{flag}'"))?;
        *slot = Some(value.clone());
        globals.cmd_idx += 2;
    }
    Ok(globals)
}

/// Only the command position counts; `-V` later on is an ordinary argument.
fn is_version_flag(token: &str) -> bool {
    matches!(token, "--version" | "-V")
}

fn open_session(settings: &Settings) -> Result<ProjectSession<ProjectFileStore>, CommandResponse> {
    let linkage = settings.linkage_table().map_err(|e| {
        CommandResponse::failure(
            ErrorCode::InvalidInput.as_str(),
            format!("Could not load linkage table: {e:#}"),
        )
    })?;
    let store = ProjectFileStore::new(&settings.project_path);
    ProjectSession::open(store, linkage)
        .map_err(|e| CommandResponse::failure(e.code.as_str(), e.message))
}

fn run_shell(settings: &Settings) -> Result<bool, String> {
    let mut session = match open_session(settings) {
        Ok(session) => session,
        Err(response) => return emit(&response),
    };
    let mut all_ok = true;
    for line in io::stdin().lock().lines() {
        let line = line.map_err(|e| format!("Could not read stdin: {e}"))?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        if matches!(trimmed, "exit" | "quit") {
            break;
        }
        let response = match parse_shell_line(trimmed) {
            Ok(command) => {
                debug!(command = %command.preview(), "shell command");
                execute_shell_command(&mut session, &command).response
            }
            Err(e) => CommandResponse::failure(ErrorCode::InvalidInput.as_str(), e),
        };
        all_ok &= emit(&response)?;
    }
    Ok(all_ok)
}

fn run() -> Result<bool, String> {
    let args: Vec<String> = env::args().collect();
    if args.len() <= 1 {
        usage();
        return Err("Missing command".to_string());
    }
    let globals = parse_global_args(&args)?;
    if args.len() <= globals.cmd_idx {
        usage();
        return Err("Missing command".to_string());
    }
    if is_version_flag(&args[globals.cmd_idx]) {
        println!("{}", about::version_cli_text());
        return Ok(true);
    }
    let settings = Settings::resolve(globals.project.as_deref(), globals.linkage.as_deref());
    let tokens = &args[globals.cmd_idx..];

    if tokens[0] == "shell" {
        return run_shell(&settings);
    }

    let command: ShellCommand = match parse_shell_tokens(tokens) {
        Ok(command) => command,
        Err(e) => {
            usage();
            return emit(&CommandResponse::failure(
                ErrorCode::InvalidInput.as_str(),
                e,
            ));
        }
    };
    if let Some(result) = execute_without_project(&command) {
        return emit(&result.response);
    }

    let mut session = match open_session(&settings) {
        Ok(session) => session,
        Err(response) => return emit(&response),
    };
    debug!(
        command = %command.preview(),
        project = %settings.project_path.display(),
        "running command"
    );
    let result = execute_shell_command(&mut session, &command);
    emit(&result.response)
}

fn main() {
    config::init_logging();
    match run() {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(items: &[&str]) -> Vec<String> {
        std::iter::once("rosterforge_cli")
            .chain(items.iter().copied())
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn version_flag_only_at_command_position() {
        let args = argv(&["--project", "p.json", "--version"]);
        let globals = parse_global_args(&args).unwrap();
        assert_eq!(globals.project.as_deref(), Some("p.json"));
        assert!(is_version_flag(&args[globals.cmd_idx]));

        let args = argv(&["insert-costume", "Falcon", "-V", "v.dat"]);
        let globals = parse_global_args(&args).unwrap();
        assert!(!is_version_flag(&args[globals.cmd_idx]));
        let command = parse_shell_tokens(&args[globals.cmd_idx..]).unwrap();
        assert!(matches!(
            command,
            ShellCommand::InsertCostume { ref name, .. } if name == "-V"
        ));
    }

    #[test]
    fn global_flag_without_value_is_an_error() {
        assert!(parse_global_args(&argv(&["--linkage"])).is_err());
    }
}
