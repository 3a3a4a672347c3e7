// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

/// Repeatable option taking a value
fn repeated(name: &'static str, long: &'static str, value: &'static str, help: &'static str) -> Arg {
    Arg::new(name)
        .long(long)
        .value_name(value)
        .action(ArgAction::Append)
        .help(help)
}

/// Boolean flag
fn flag(name: &'static str, long: &'static str, help: &'static str) -> Arg {
    Arg::new(name).long(long).action(ArgAction::SetTrue).help(help)
}

fn build_cli() -> Command {
    Command::new("pessimist")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Test a project against the full range of its dependency versions")
        .arg(Arg::new("path").default_value(".").help("Project directory"))
        .arg(
            Arg::new("command")
                .short('c')
                .long("command")
                .help("Test command, run through the shell in the project directory"),
        )
        .arg(
            Arg::new("parallelism")
                .short('p')
                .long("parallelism")
                .help("Number of workers (each with its own environment)"),
        )
        .arg(flag("fast", "fast", "Only test the oldest and newest versions"))
        .arg(repeated(
            "extend",
            "extend",
            "NAME",
            "Ignore the declared specifier of a package (`*` for all)",
        ))
        .arg(
            repeated("requirements", "requirements", "FILE", "Requirements file to vary")
                .short('r'),
        )
        .arg(repeated(
            "fixed",
            "fixed",
            "FILE",
            "Requirements file to keep pinned at the newest match",
        ))
        .arg(
            Arg::new("python")
                .long("python")
                .value_name("PATH")
                .help("Interpreter used to create environments"),
        )
        .arg(
            Arg::new("python_version")
                .long("python-version")
                .value_name("VERSION")
                .help("Filter as if running this interpreter version instead of probing"),
        )
        .arg(
            Arg::new("index_url")
                .long("index-url")
                .value_name("URL")
                .help("Package index base URL"),
        )
        .arg(
            Arg::new("installer_pin")
                .long("installer-pin")
                .value_name("SPEC")
                .help("Installer requirement pinned in every environment"),
        )
        .arg(flag(
            "no_installer_pin",
            "no-installer-pin",
            "Keep whatever installer the environment comes with",
        ))
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("FILE")
                .help("Configuration file (default: pessimist.toml in the project)"),
        )
        .arg(flag(
            "dry_run",
            "dry-run",
            "Resolve and print the plans without running anything",
        ))
        .arg(flag("verbose", "verbose", "Debug logging").short('v'))
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let manifest_dir = match env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(e) => {
            println!("cargo:warning=CARGO_MANIFEST_DIR not set: {}", e);
            return;
        }
    };
    let man_dir = manifest_dir.join("man");

    if let Err(e) = fs::create_dir_all(&man_dir) {
        println!("cargo:warning=Failed to create man directory: {}", e);
        return;
    }

    let man = Man::new(build_cli());
    let mut buffer = Vec::new();

    if let Err(e) = man.render(&mut buffer) {
        println!("cargo:warning=Failed to render man page: {}", e);
        return;
    }

    let man_path = man_dir.join("pessimist.1");
    if let Err(e) = fs::write(&man_path, buffer) {
        println!("cargo:warning=Failed to write man page: {}", e);
    }
}
