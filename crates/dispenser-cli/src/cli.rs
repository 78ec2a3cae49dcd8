//! Command line surface and how it folds into `DispenserConfig`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use serde::Deserialize;

use dispenser_core::{DispenserConfig, ErrorPolicyKind, StoreSettings};

use crate::logging::LogFormat;

#[derive(Parser, Debug)]
#[command(name = "dispenser")]
#[command(about = "Batching task dispenser over Redis lists")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub common: CommonArgs,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the dispenser until interrupted
    Start(StartArgs),
    /// Push task arguments onto queues
    Add(AddArgs),
}

#[derive(Args, Debug)]
pub struct CommonArgs {
    /// Redis host
    #[arg(short = 'H', long, global = true, env = "DISPENSER_REDIS_HOST")]
    pub redis_host: Option<String>,

    /// Redis port
    #[arg(short = 'P', long, global = true, env = "DISPENSER_REDIS_PORT")]
    pub redis_port: Option<u16>,

    /// Redis password, if authentication is enabled
    #[arg(short = 'p', long, global = true, env = "DISPENSER_REDIS_PASSWORD")]
    pub redis_pass: Option<String>,

    /// Redis database index
    #[arg(long, global = true)]
    pub redis_db: Option<i64>,

    /// Log level or filter directive; RUST_LOG wins when set
    #[arg(short = 'l', long, global = true, default_value = "info")]
    pub log_level: String,

    /// Log record layout
    #[arg(short = 'F', long, global = true, value_enum, default_value_t = LogFormat::Full)]
    pub log_format: LogFormat,

    /// Log to this file instead of stderr
    #[arg(short = 'f', long, global = true)]
    pub log_file: Option<PathBuf>,

    /// TOML configuration file; flags override its values
    #[arg(short = 'c', long, global = true, env = "DISPENSER_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct StartArgs {
    /// Queue and handler pair, repeatable. Example: -t q1 print -t q2 forward:q3
    #[arg(short = 't', long = "task", num_args = 2, value_names = ["QUEUE", "HANDLER"])]
    pub tasks: Vec<String>,

    /// Pending tasks that force a flush
    #[arg(short = 'b', long)]
    pub batch_size: Option<usize>,

    /// Maximum seconds a task waits for its batch to fill
    #[arg(short = 'i', long)]
    pub flush_interval: Option<f64>,

    /// Worker pool size; 0 runs handlers on the main loop
    #[arg(short = 'n', long = "procs-number", alias = "workers")]
    pub workers: Option<usize>,

    /// What a handler failure does: fail | log
    #[arg(short = 'e', long)]
    pub on_error: Option<ErrorPolicyKind>,
}

#[derive(Args, Debug)]
pub struct AddArgs {
    /// Queue and JSON arguments pair, repeatable. Example: -t q1 1 -t q2 '{"a": 2}'
    #[arg(short = 't', long = "task", num_args = 2, value_names = ["QUEUE", "JSON"], required = true)]
    pub tasks: Vec<String>,

    /// Repeat every pair this many times
    #[arg(short = 'n', long, default_value_t = 1)]
    pub num: usize,
}

/// Contents of the `--config` file.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    #[serde(flatten)]
    pub dispenser: DispenserConfig,

    /// queue → handler
    pub queues: BTreeMap<String, String>,
}

impl FileConfig {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read config file {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("invalid config file {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }
}

impl CommonArgs {
    pub fn apply(&self, store: &mut StoreSettings) {
        if let Some(host) = &self.redis_host {
            store.host = host.clone();
        }
        if let Some(port) = self.redis_port {
            store.port = port;
        }
        if let Some(password) = &self.redis_pass {
            store.password = Some(password.clone());
        }
        if let Some(db) = self.redis_db {
            store.db = db;
        }
    }
}

impl StartArgs {
    pub fn apply(&self, config: &mut DispenserConfig) {
        if let Some(batch_size) = self.batch_size {
            config.batch_size = batch_size;
        }
        if let Some(flush_interval) = self.flush_interval {
            config.flush_interval = flush_interval;
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if let Some(on_error) = self.on_error {
            config.on_error = on_error;
        }
    }

    /// `-t` pairs layered over the file's `[queues]` table.
    pub fn queue_handlers(&self, from_file: &BTreeMap<String, String>) -> Result<BTreeMap<String, String>> {
        let mut handlers = from_file.clone();
        for (queue, handler) in pairs(&self.tasks)? {
            handlers.insert(queue.to_string(), handler.to_string());
        }
        if handlers.is_empty() {
            bail!("no queues configured; pass -t QUEUE HANDLER or a [queues] table");
        }
        Ok(handlers)
    }
}

impl AddArgs {
    pub fn payloads(&self) -> Result<Vec<(String, serde_json::Value)>> {
        pairs(&self.tasks)?
            .map(|(queue, raw)| {
                let value = serde_json::from_str(raw)
                    .with_context(|| format!("arguments for queue {queue} are not JSON: {raw}"))?;
                Ok((queue.to_string(), value))
            })
            .collect()
    }
}

fn pairs(values: &[String]) -> Result<impl Iterator<Item = (&str, &str)>> {
    if values.len() % 2 != 0 {
        bail!("-t takes exactly two values");
    }
    Ok(values
        .chunks_exact(2)
        .map(|pair| (pair[0].as_str(), pair[1].as_str())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("dispenser").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn start_flags_override_file() {
        let cli = parse(&[
            "start", "-t", "q1", "print", "-t", "q2", "noop", "-b", "3", "-i", "0.5", "-n", "0",
            "-e", "log", "-H", "redis.local", "-P", "6380",
        ]);
        let Commands::Start(args) = cli.command else {
            panic!("expected start");
        };

        let file = FileConfig::parse("batch_size = 50\nworkers = 4\n[queues]\nq0 = \"log\"\n").unwrap();
        let mut config = file.dispenser;
        args.apply(&mut config);
        cli.common.apply(&mut config.store);

        assert_eq!(config.batch_size, 3);
        assert_eq!(config.flush_interval, 0.5);
        assert_eq!(config.workers, 0);
        assert_eq!(config.on_error, ErrorPolicyKind::Log);
        assert_eq!(config.store.host, "redis.local");
        assert_eq!(config.store.port, 6380);

        let handlers = args.queue_handlers(&file.queues).unwrap();
        let names: Vec<(&str, &str)> = handlers.iter().map(|(q, h)| (q.as_str(), h.as_str())).collect();
        assert_eq!(names, vec![("q0", "log"), ("q1", "print"), ("q2", "noop")]);
    }

    #[test]
    fn defaults_without_file() {
        let file = FileConfig::load(None).unwrap();
        assert_eq!(file.dispenser, DispenserConfig::default());
        assert!(file.queues.is_empty());
    }

    #[test]
    fn start_without_queues_is_rejected() {
        let Commands::Start(args) = parse(&["start"]).command else {
            panic!("expected start");
        };
        assert!(args.queue_handlers(&BTreeMap::new()).is_err());
    }

    #[rstest]
    #[case(&["add", "-t", "q1", "1"], 1, vec![("q1", serde_json::json!(1))])]
    #[case(&["add", "-t", "q1", "[1, 2]", "-t", "q2", "{\"a\": null}", "-n", "3"], 3, vec![
        ("q1", serde_json::json!([1, 2])),
        ("q2", serde_json::json!({"a": null})),
    ])]
    fn add_payloads(#[case] args: &[&str], #[case] num: usize, #[case] expected: Vec<(&str, serde_json::Value)>) {
        let Commands::Add(add) = parse(args).command else {
            panic!("expected add");
        };
        assert_eq!(add.num, num);
        let payloads = add.payloads().unwrap();
        let payloads: Vec<(&str, serde_json::Value)> =
            payloads.iter().map(|(q, v)| (q.as_str(), v.clone())).collect();
        assert_eq!(payloads, expected);
    }

    #[test]
    fn add_rejects_invalid_json() {
        let Commands::Add(add) = parse(&["add", "-t", "q1", "{nope"]).command else {
            panic!("expected add");
        };
        assert!(add.payloads().is_err());
    }

    #[rstest]
    #[case(&["add", "-t", "q1", "1"], LogFormat::Full)]
    #[case(&["add", "-t", "q1", "1", "-F", "compact"], LogFormat::Compact)]
    #[case(&["-F", "pretty", "start", "-t", "q1", "log"], LogFormat::Pretty)]
    fn log_format_flag(#[case] args: &[&str], #[case] expected: LogFormat) {
        assert_eq!(parse(args).common.log_format, expected);
    }

    #[test]
    fn unknown_log_format_is_a_parse_error() {
        let result = Cli::try_parse_from(["dispenser", "add", "-t", "q", "1", "-F", "xml"]);
        assert!(result.is_err());
    }

    #[test]
    fn unknown_policy_is_a_parse_error() {
        let result = Cli::try_parse_from(["dispenser", "start", "-t", "q", "noop", "-e", "retry"]);
        assert!(result.is_err());
    }
}
