use crate::domain::options::Stage;
use crate::utils::logger::LogFormat;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "rec-ingest")]
#[command(about = "Ingest data into and query a recommendation service with retry and polling")]
pub struct CliArgs {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "rec-ingest.toml")]
    pub config: PathBuf,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    #[arg(long, value_enum, default_value_t = LogFormat::Compact)]
    pub log_format: LogFormat,

    /// Override retry.retry_times from config
    #[arg(long)]
    pub retry_times: Option<i32>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Write real-time data (at most 100 records)
    Write(UploadArgs),
    /// Import daily offline data and wait for the import task (at most 10k records)
    Import(UploadArgs),
    /// Mark some days of a topic as completely imported
    Done(DoneArgs),
    /// Request recommendation results
    Predict(PredictArgs),
    /// Report the items actually shown to the user
    Callback(CallbackArgs),
    /// Fetch an import operation by name
    GetOperation(GetOperationArgs),
    /// List import operations matching a filter
    ListOperations(ListOperationsArgs),
}

#[derive(Debug, Args)]
pub struct UploadArgs {
    /// Data topic, e.g. item, user, behavior
    #[arg(long)]
    pub topic: String,

    /// JSON file holding an array of records
    #[arg(long)]
    pub data: PathBuf,

    #[arg(long, value_parser = parse_stage)]
    pub stage: Option<Stage>,

    /// Day the data belongs to (YYYY-MM-DD)
    #[arg(long)]
    pub date: Option<NaiveDate>,

    /// Submit through the worker pool instead of waiting for the result
    #[arg(long)]
    pub concurrent: bool,
}

#[derive(Debug, Args)]
pub struct DoneArgs {
    #[arg(long)]
    pub topic: String,

    #[arg(long = "date", required = true)]
    pub dates: Vec<NaiveDate>,

    #[arg(long, value_parser = parse_stage)]
    pub stage: Option<Stage>,

    #[arg(long)]
    pub concurrent: bool,
}

#[derive(Debug, Args)]
pub struct PredictArgs {
    /// JSON file holding the predict request
    #[arg(long)]
    pub request: PathBuf,

    #[arg(long)]
    pub scene: Option<String>,
}

#[derive(Debug, Args)]
pub struct CallbackArgs {
    /// JSON file holding the callback request
    #[arg(long)]
    pub request: PathBuf,

    #[arg(long)]
    pub concurrent: bool,
}

#[derive(Debug, Args)]
pub struct GetOperationArgs {
    #[arg(long)]
    pub name: String,
}

#[derive(Debug, Args)]
pub struct ListOperationsArgs {
    /// e.g. "date>=2021-06-15 and worksOn=ImportUsers and done=true"
    #[arg(long, default_value = "")]
    pub filter: String,

    #[arg(long, default_value_t = 3)]
    pub page_size: u32,

    #[arg(long, default_value = "")]
    pub page_token: String,
}

fn parse_stage(s: &str) -> Result<Stage, String> {
    s.parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_import_command() {
        let args = CliArgs::parse_from([
            "rec-ingest",
            "--config",
            "conf.toml",
            "import",
            "--topic",
            "user",
            "--data",
            "users.json",
            "--stage",
            "history_sync",
            "--date",
            "2021-11-01",
        ]);

        assert_eq!(args.config, PathBuf::from("conf.toml"));
        match args.command {
            Command::Import(upload) => {
                assert_eq!(upload.topic, "user");
                assert_eq!(upload.stage, Some(Stage::HistorySync));
                assert_eq!(upload.date, NaiveDate::from_ymd_opt(2021, 11, 1));
                assert!(!upload.concurrent);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_done_requires_a_date() {
        let result = CliArgs::try_parse_from(["rec-ingest", "done", "--topic", "user"]);
        assert!(result.is_err());

        let args = CliArgs::parse_from([
            "rec-ingest",
            "done",
            "--topic",
            "user",
            "--date",
            "2021-09-01",
            "--date",
            "2021-09-02",
        ]);
        match args.command {
            Command::Done(done) => assert_eq!(done.dates.len(), 2),
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_stage_is_rejected() {
        let result = CliArgs::try_parse_from([
            "rec-ingest",
            "write",
            "--topic",
            "user",
            "--data",
            "users.json",
            "--stage",
            "weekly",
        ]);
        assert!(result.is_err());
    }
}
