mod cmd;
mod output;

use std::process::ExitCode;

use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use prebuild_lib::dispatch::Invocation;

/// prebuild - build native Node.js modules, falling back to prebuilt downloads
///
/// Usage: prebuild <COMMAND> [TARGET] [--FLAG ...]
///
/// Commands: build, rebuild, install, upload, load. Every `--name` token is
/// a flag; known flags are --quiet (silence the toolchain), --no-download
/// (never fall back to a download), --verbose (debug logging) and --json.
#[derive(Parser)]
#[command(name = "prebuild")]
#[command(author, version, about, long_about)]
#[command(disable_help_flag = true, disable_version_flag = true)]
struct Cli {
  /// Command, optional build target, and `--flags` in any order
  #[arg(trailing_var_arg = true, allow_hyphen_values = true, value_name = "ARGS")]
  args: Vec<String>,
}

/// What the command line asks for besides dispatching.
enum Request {
  Help,
  Version,
  Run(Invocation),
}

impl Cli {
  fn request(&self) -> Request {
    if self.args.iter().any(|arg| arg == "-h") {
      return Request::Help;
    }
    if self.args.iter().any(|arg| arg == "-V") {
      return Request::Version;
    }

    let invocation = Invocation::parse(&self.args);
    if invocation.options().is_set("help") {
      Request::Help
    } else if invocation.options().is_set("version") {
      Request::Version
    } else {
      Request::Run(invocation)
    }
  }
}

fn log_level(invocation: &Invocation) -> &'static str {
  if invocation.options().verbose() { "debug" } else { "info" }
}

#[tokio::main]
async fn main() -> ExitCode {
  let invocation = match Cli::parse().request() {
    Request::Help => {
      // A closed stdout is not worth an error exit.
      let _ = Cli::command().print_long_help();
      return ExitCode::SUCCESS;
    }
    Request::Version => {
      print!("{}", Cli::command().render_version());
      return ExitCode::SUCCESS;
    }
    Request::Run(invocation) => invocation,
  };

  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level(&invocation)));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  let json = invocation.options().is_set("json");
  match cmd::cmd_run(&invocation, json).await {
    Ok(()) => ExitCode::SUCCESS,
    Err(err) => {
      output::print_error(&format!("{:#}", err));
      ExitCode::FAILURE
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn request(args: &[&str]) -> Request {
    Cli::parse_from(std::iter::once("prebuild").chain(args.iter().copied())).request()
  }

  #[test]
  fn unknown_flags_reach_the_invocation() {
    match request(&["install", "native", "--fast", "--no-download"]) {
      Request::Run(invocation) => {
        assert_eq!(invocation.command_name(), Some("install"));
        assert_eq!(invocation.target(), Some("native"));
        assert!(invocation.options().is_set("fast"));
        assert!(invocation.options().no_download());
      }
      _ => panic!("expected a dispatchable invocation"),
    }
  }

  #[test]
  fn leading_flag_is_not_a_usage_error() {
    match request(&["--fast", "build"]) {
      Request::Run(invocation) => assert_eq!(invocation.command_name(), Some("build")),
      _ => panic!("expected a dispatchable invocation"),
    }
  }

  #[test]
  fn help_and_version_are_intercepted() {
    assert!(matches!(request(&["--help"]), Request::Help));
    assert!(matches!(request(&["build", "-h"]), Request::Help));
    assert!(matches!(request(&["--version"]), Request::Version));
  }

  #[test]
  fn quiet_keeps_step_logging() {
    assert_eq!(log_level(&Invocation::parse(["build", "--quiet"])), "info");
    assert_eq!(log_level(&Invocation::parse(["build", "--verbose"])), "debug");
  }
}
