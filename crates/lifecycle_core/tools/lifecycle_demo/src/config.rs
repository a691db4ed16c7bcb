use std::env;

use lifecycle_core::lifecycle::Phase;

pub const DEFAULT_CHILDREN: usize = 2;
pub const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Number of child services under the server.
    pub children: usize,
    /// Phase at which the last child fails.
    pub fail: Option<Phase>,
    /// Children are destroyed as soon as they stop.
    pub single_use: bool,
    /// `tracing` filter used when `RUST_LOG` is not set.
    pub log_filter: String,
    pub show_help: bool,
}

impl Config {
    pub fn from_args() -> Self {
        Self::from_args_iter(env::args())
    }

    pub fn from_args_iter<I, S>(iter: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut children = env::var("LIFECYCLE_DEMO_CHILDREN")
            .ok()
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(DEFAULT_CHILDREN);
        let mut fail = env::var("LIFECYCLE_DEMO_FAIL").ok().and_then(|v| parse_phase(&v));
        let mut single_use = env::var("LIFECYCLE_DEMO_SINGLE_USE")
            .ok()
            .and_then(parse_bool)
            .unwrap_or(false);
        let mut log_filter =
            env::var("LIFECYCLE_DEMO_LOG").unwrap_or_else(|_| DEFAULT_LOG_FILTER.to_string());
        let mut show_help = false;

        let mut args = iter.into_iter();
        let _ = args.next();
        while let Some(arg) = args.next() {
            let arg = arg.as_ref();
            match arg {
                "-h" | "--help" => show_help = true,
                "--children" => {
                    if let Some(value) = args.next().and_then(|v| v.as_ref().parse().ok()) {
                        children = value;
                    }
                }
                "--fail" => {
                    if let Some(value) = args.next() {
                        fail = parse_phase(value.as_ref());
                    }
                }
                "--single-use" => single_use = true,
                "--log" => {
                    if let Some(value) = args.next() {
                        log_filter = value.as_ref().to_string();
                    }
                }
                _ if arg.starts_with("--children=") => {
                    if let Ok(value) = arg["--children=".len()..].parse() {
                        children = value;
                    }
                }
                _ if arg.starts_with("--fail=") => {
                    fail = parse_phase(&arg["--fail=".len()..]);
                }
                _ if arg.starts_with("--log=") => {
                    log_filter = arg["--log=".len()..].to_string();
                }
                _ => {}
            }
        }

        Self {
            children,
            fail,
            single_use,
            log_filter,
            show_help,
        }
    }
}

pub fn print_usage() {
    println!(
        "lifecycle_demo [--children N] [--fail init|start|stop|destroy] [--single-use] [--log <filter>]"
    );
}

fn parse_bool(value: String) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_phase(value: &str) -> Option<Phase> {
    match value.trim().to_ascii_lowercase().as_str() {
        "init" => Some(Phase::Init),
        "start" => Some(Phase::Start),
        "stop" => Some(Phase::Stop),
        "destroy" => Some(Phase::Destroy),
        _ => None,
    }
}
