use std::io::Read;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use cfgcheck_engine::{groups_from_json, validate_with_store};
use cfgcheck_rules::{parse_expr, parse_rules_directory, parse_rules_file, RuleStore};

// Exit codes: 0 = pass, 1 = violations found, 2 = configuration or input error.
const EXIT_VIOLATIONS: i32 = 1;
const EXIT_CONFIG: i32 = 2;

#[derive(Parser)]
#[command(name = "cfgcheck")]
#[command(about = "Validate configuration-group sequences against versioned constraint rule sets")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse rule files and print the AST as JSON
    Parse {
        /// Path to a rule file or a directory of versioned rule files
        path: PathBuf,

        /// Pretty-print JSON output
        #[arg(short, long, default_value_t = true)]
        pretty: bool,
    },

    /// List the rule-set versions available at a path
    Versions {
        /// Path to a rule file or a directory of versioned rule files
        path: PathBuf,
    },

    /// Parse a validate expression and print the AST
    Expr {
        /// The expression to parse
        expr: String,
    },

    /// Validate a group sequence and print the report
    ///
    /// Groups are a JSON array of objects, one object per configuration
    /// group, read from a file or from stdin. Exit code is 0 when the
    /// sequence passes, 1 when violations are found.
    Check {
        /// Path to a rule file or a directory of versioned rule files
        #[arg(short, long)]
        rules: PathBuf,

        /// Path to the group JSON (if omitted, reads from stdin)
        #[arg(short, long)]
        groups: Option<PathBuf>,

        /// Rule-set version to apply (defaults to the highest available)
        #[arg(short = 'V', long = "rule-version")]
        rule_version: Option<String>,

        /// Also write the report JSON to this file
        #[arg(long)]
        report: Option<PathBuf>,

        /// Pretty-print JSON output
        #[arg(short, long, default_value_t = true)]
        pretty: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Parse { path, pretty } => cmd_parse(path, pretty),
        Commands::Versions { path } => cmd_versions(path),
        Commands::Expr { expr } => cmd_expr(expr),
        Commands::Check {
            rules,
            groups,
            rule_version,
            report,
            pretty,
        } => cmd_check(rules, groups, rule_version, report, pretty),
    }
}

// ---------------------------------------------------------------------------
// Subcommand implementations
// ---------------------------------------------------------------------------

fn cmd_parse(path: PathBuf, pretty: bool) {
    let store = load_store(&path);
    let rule_sets: Vec<_> = store
        .versions()
        .filter_map(|v| store.get(v))
        .collect();
    print_json(&rule_sets, pretty);
}

fn cmd_versions(path: PathBuf) {
    let store = load_store(&path);
    if store.is_empty() {
        eprintln!("No rule-set versions found at {}", path.display());
        process::exit(EXIT_CONFIG);
    }
    let latest = store.latest().map(|rs| rs.version.clone());
    for version in store.versions() {
        if Some(version) == latest.as_ref() {
            println!("{version} (latest)");
        } else {
            println!("{version}");
        }
    }
}

fn cmd_expr(expr: String) {
    match parse_expr(&expr) {
        Ok(ast) => print_json(&ast, true),
        Err(e) => {
            eprintln!("Expression parse error: {e}");
            process::exit(EXIT_CONFIG);
        }
    }
}

fn cmd_check(
    rules_path: PathBuf,
    groups_path: Option<PathBuf>,
    rule_version: Option<String>,
    report_path: Option<PathBuf>,
    pretty: bool,
) {
    let store = load_store(&rules_path);

    let input = match &groups_path {
        Some(path) => match std::fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("Error reading {}: {e}", path.display());
                process::exit(EXIT_CONFIG);
            }
        },
        None => {
            let mut buf = String::new();
            if let Err(e) = std::io::stdin().read_to_string(&mut buf) {
                eprintln!("Error reading stdin: {e}");
                process::exit(EXIT_CONFIG);
            }
            buf
        }
    };

    let groups = match groups_from_json(&input) {
        Ok(g) => g,
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(EXIT_CONFIG);
        }
    };

    let report = match validate_with_store(&groups, &store, rule_version.as_deref()) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(EXIT_CONFIG);
        }
    };

    print_json(&report, pretty);

    if let Some(path) = &report_path {
        let json = match serde_json::to_string_pretty(&report) {
            Ok(j) => j,
            Err(e) => {
                eprintln!("Error serializing report: {e}");
                process::exit(EXIT_CONFIG);
            }
        };
        if let Err(e) = std::fs::write(path, json) {
            eprintln!("Error writing report to {}: {e}", path.display());
            process::exit(EXIT_CONFIG);
        }
    }

    if !report.passed {
        process::exit(EXIT_VIOLATIONS);
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Load a rule store from a file or a directory of versioned rule files.
fn load_store(path: &Path) -> RuleStore {
    let result = if path.is_dir() {
        parse_rules_directory(path)
    } else {
        parse_rules_file(path)
    };
    match result {
        Ok(store) => store,
        Err(e) => {
            eprintln!("Error loading rules from {}: {e}", path.display());
            process::exit(EXIT_CONFIG);
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T, pretty: bool) {
    let out = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    };
    match out {
        Ok(s) => println!("{s}"),
        Err(e) => {
            eprintln!("Error serializing output: {e}");
            process::exit(EXIT_CONFIG);
        }
    }
}
