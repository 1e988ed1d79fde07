use clap::{Arg, ArgAction, Command, value_parser};
use clap_num::maybe_hex;
use exhume_lnk::LnkFile;
use log::{debug, error};
use serde_json::json;
use std::process::ExitCode;

fn main() -> ExitCode {
    let matches = Command::new("exhume_lnk")
        .version("0.1.0")
        .author("ForensicXlab")
        .about("Exhume the artefacts from a Windows Shortcut (.lnk) file.")
        .arg(
            Arg::new("file")
                .short('f')
                .long("file")
                .value_parser(value_parser!(String))
                .required(true)
                .help("The path to the shortcut to parse."),
        )
        .arg(
            Arg::new("offset")
                .short('o')
                .long("offset")
                .value_parser(maybe_hex::<usize>)
                .default_value("0")
                .help("The shortcut starts at this byte offset in the file (decimal or hex)."),
        )
        .arg(
            Arg::new("json")
                .short('j')
                .long("json")
                .action(ArgAction::SetTrue)
                .help("Output the parsed shortcut in JSON format."),
        )
        .arg(
            Arg::new("json_debug")
                .short('d')
                .long("json_debug")
                .action(ArgAction::SetTrue)
                .help("Output the parsed shortcut in JSON format, with raw sizes and offsets."),
        )
        .arg(
            Arg::new("command")
                .short('c')
                .long("command")
                .action(ArgAction::SetTrue)
                .help("Only display the command the shortcut runs."),
        )
        .arg(
            Arg::new("strict")
                .long("strict")
                .action(ArgAction::SetTrue)
                .help("Fail when the shortcut could only be partially decoded."),
        )
        .arg(
            Arg::new("log_level")
                .short('l')
                .long("log-level")
                .value_parser(["error", "warn", "info", "debug", "trace"])
                .default_value("info")
                .help("Set the log verbosity level"),
        )
        .get_matches();

    // Initialize logger.
    let level_filter = match matches.get_one::<String>("log_level").map(String::as_str) {
        Some("error") => log::LevelFilter::Error,
        Some("warn") => log::LevelFilter::Warn,
        Some("debug") => log::LevelFilter::Debug,
        Some("trace") => log::LevelFilter::Trace,
        _ => log::LevelFilter::Info,
    };
    env_logger::Builder::new().filter_level(level_filter).init();

    let Some(file_path) = matches.get_one::<String>("file") else {
        error!("No shortcut given.");
        return ExitCode::FAILURE;
    };
    let offset = matches.get_one::<usize>("offset").copied().unwrap_or(0);
    let verbose = matches.get_flag("json_debug");
    let json_output = matches.get_flag("json") || verbose;
    let command_only = matches.get_flag("command");
    let strict = matches.get_flag("strict");

    let data = match std::fs::read(file_path) {
        Ok(data) => data,
        Err(e) => {
            error!("Could not read '{}': {}", file_path, e);
            return ExitCode::FAILURE;
        }
    };
    debug!("Read {} bytes from '{}'", data.len(), file_path);

    let Some(slice) = data.get(offset..) else {
        error!(
            "Offset 0x{:X} is past the end of '{}' ({} bytes).",
            offset,
            file_path,
            data.len()
        );
        return ExitCode::FAILURE;
    };

    let lnk = match LnkFile::from_bytes(slice) {
        Ok(lnk) => lnk,
        Err(e) => {
            error!("Couldn't parse the shortcut: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let lnk = if strict {
        match lnk.into_complete() {
            Ok(lnk) => lnk,
            Err(e) => {
                error!("{}", e);
                return ExitCode::FAILURE;
            }
        }
    } else {
        lnk
    };

    if command_only {
        if json_output {
            println!("{}", json!({ "command": lnk.command() }));
        } else {
            println!("{}", lnk.command());
        }
    } else if json_output {
        match serde_json::to_string_pretty(&lnk.to_json(verbose)) {
            Ok(s) => println!("{}", s),
            Err(e) => {
                error!("Error serializing the shortcut to JSON: {}", e);
                return ExitCode::FAILURE;
            }
        }
    } else {
        println!("{}", lnk.to_string());
    }
    ExitCode::SUCCESS
}
