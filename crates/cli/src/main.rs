use chrono::{Datelike, NaiveDate};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;

use greenpass_core::constants::{
    DEFAULT_DATA_DIR, DEFAULT_GATEWAY_UPSTREAM, DEFAULT_ISSUANCE_UPSTREAM, ENV_DATA_DIR,
    ENV_GATEWAY_UPSTREAM, ENV_ISSUANCE_UPSTREAM, ENV_VALIDITY_RULES,
};
use greenpass_core::{Clock, SystemClock, ValidityEngine, ValidityRules};
use greenpass_protocol::{
    IdentitySubmission, IssuanceAck, ReportOutcome, TestReportSubmission, VerificationOutcome,
};
use greenpass_store::{FileRecordStore, RecordStore};
use greenpass_types::{CalendarDate, HealthCardId, PersonName, TestResult};

#[derive(Parser)]
#[command(name = "greenpass")]
#[command(about = "Green pass issuance, verification and test-report client")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Issue a green pass
    Issue {
        /// Holder's name (at most 1023 bytes)
        #[arg(value_parser = PersonName::parse)]
        name: PersonName,
        /// Holder's surname (at most 1023 bytes)
        #[arg(value_parser = PersonName::parse)]
        surname: PersonName,
        /// 16-character health card id
        #[arg(value_parser = HealthCardId::parse)]
        health_card_id: HealthCardId,
        /// Issuance service address (host:port)
        #[arg(long, env = ENV_ISSUANCE_UPSTREAM, default_value = DEFAULT_ISSUANCE_UPSTREAM)]
        issuance: String,
    },
    /// Verify a green pass through the gateway
    Verify {
        /// 16-character health card id
        #[arg(value_parser = HealthCardId::parse)]
        health_card_id: HealthCardId,
        /// Gateway address (host:port)
        #[arg(long, env = ENV_GATEWAY_UPSTREAM, default_value = DEFAULT_GATEWAY_UPSTREAM)]
        gateway: String,
    },
    /// Submit a test report through the gateway
    Report {
        /// 16-character health card id
        #[arg(value_parser = HealthCardId::parse)]
        health_card_id: HealthCardId,
        /// New test result
        #[arg(value_enum)]
        result: ReportResult,
        /// Gateway address (host:port)
        #[arg(long, env = ENV_GATEWAY_UPSTREAM, default_value = DEFAULT_GATEWAY_UPSTREAM)]
        gateway: String,
    },
    /// Show the stored record for a health card id (reads the record store directly)
    Inspect {
        /// 16-character health card id
        #[arg(value_parser = HealthCardId::parse)]
        health_card_id: HealthCardId,
        /// Record store directory
        #[arg(long, env = ENV_DATA_DIR, default_value = DEFAULT_DATA_DIR)]
        data_dir: PathBuf,
        /// Print the record as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the issuance and expiry dates for a pass issued on a given day
    Dates {
        /// Issue date (YYYY-MM-DD); defaults to today
        #[arg(long, value_parser = parse_date)]
        date: Option<CalendarDate>,
        /// Validity rules
        #[arg(long, env = ENV_VALIDITY_RULES, default_value = "legacy", value_parser = parse_rules)]
        rules: ValidityRules,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum ReportResult {
    Valid,
    Invalid,
}

impl From<ReportResult> for TestResult {
    fn from(value: ReportResult) -> Self {
        match value {
            ReportResult::Valid => TestResult::Valid,
            ReportResult::Invalid => TestResult::Invalid,
        }
    }
}

fn parse_date(value: &str) -> Result<CalendarDate, chrono::ParseError> {
    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d")?;
    // day() and month() are at most 31 and 12
    Ok(CalendarDate::new(
        date.day() as i32,
        date.month() as i32,
        date.year(),
    ))
}

fn parse_rules(value: &str) -> Result<ValidityRules, greenpass_core::PassError> {
    value.parse()
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Issue {
            name,
            surname,
            health_card_id,
            issuance,
        }) => {
            let submission = IdentitySubmission {
                name,
                surname,
                health_card_id,
            };
            match issuance::client::issue(&issuance, &submission).await {
                Ok(reply) => {
                    println!("{}", reply.greeting);
                    println!("{}", reply.ack);
                    let issued = IssuanceAck::from_message(&reply.ack).is_some_and(|a| a.is_issued());
                    return Ok(exit_code(issued));
                }
                Err(e) => {
                    eprintln!("Error issuing green pass: {}", e);
                    return Ok(ExitCode::FAILURE);
                }
            }
        }
        Some(Commands::Verify {
            health_card_id,
            gateway,
        }) => match gateway::client::verify(&gateway, &health_card_id).await {
            Ok(reply) => {
                println!("{}", reply.welcome);
                println!("{}", reply.ack);
                println!("{}", reply.outcome);
                let valid = VerificationOutcome::from_message(&reply.outcome)
                    == Some(VerificationOutcome::Valid);
                return Ok(exit_code(valid));
            }
            Err(e) => {
                eprintln!("Error verifying green pass: {}", e);
                return Ok(ExitCode::FAILURE);
            }
        },
        Some(Commands::Report {
            health_card_id,
            result,
            gateway,
        }) => {
            let submission = TestReportSubmission {
                health_card_id,
                test_result: result.into(),
            };
            match gateway::client::report(&gateway, &submission).await {
                Ok(outcome) => {
                    println!("{}", outcome);
                    let applied =
                        ReportOutcome::from_message(&outcome) == Some(ReportOutcome::Applied);
                    return Ok(exit_code(applied));
                }
                Err(e) => {
                    eprintln!("Error submitting test report: {}", e);
                    return Ok(ExitCode::FAILURE);
                }
            }
        }
        Some(Commands::Inspect {
            health_card_id,
            data_dir,
            json,
        }) => {
            let store = FileRecordStore::open(&data_dir)?;
            match store.fetch(&health_card_id)? {
                Some(record) if json => println!("{}", serde_json::to_string_pretty(&record)?),
                Some(record) => {
                    println!(
                        "ID: {}, Test result: {}, Issued: {}, Expires: {}",
                        record.health_card_id,
                        record.test_result,
                        record.issued_on,
                        record.expires_on
                    );
                }
                None => {
                    println!("No record for {}", health_card_id);
                    return Ok(ExitCode::FAILURE);
                }
            }
        }
        Some(Commands::Dates { date, rules }) => {
            let today = date.unwrap_or_else(|| SystemClock.today());
            let engine = ValidityEngine::new(rules);
            println!("Rules: {}", rules);
            println!("Issued: {}", engine.issuance(today));
            println!("Expires: {}", engine.expiry(today));
        }
        None => {
            println!("Use 'greenpass --help' for commands");
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn exit_code(success: bool) -> ExitCode {
    if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_report() {
        let cli = Cli::try_parse_from([
            "greenpass",
            "report",
            "RSSMRA80A01H501U",
            "invalid",
            "--gateway",
            "10.0.0.5:1026",
        ])
        .unwrap();

        match cli.command {
            Some(Commands::Report {
                health_card_id,
                result,
                gateway,
            }) => {
                assert_eq!(health_card_id.as_str(), "RSSMRA80A01H501U");
                assert_eq!(TestResult::from(result), TestResult::Invalid);
                assert_eq!(gateway, "10.0.0.5:1026");
            }
            _ => panic!("expected report command"),
        }
    }

    #[test]
    fn test_rejects_malformed_id() {
        let result = Cli::try_parse_from(["greenpass", "verify", "../../etc/passwd"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_issue_rejects_overlong_name() {
        let name = "M".repeat(1024);
        let result = Cli::try_parse_from(["greenpass", "issue", name.as_str(), "Rossi", "RSSMRA80A01H501U"]);
        assert!(result.is_err());

        let name = "M".repeat(1023);
        let cli =
            Cli::try_parse_from(["greenpass", "issue", name.as_str(), "Rossi", "RSSMRA80A01H501U"]).unwrap();
        match cli.command {
            Some(Commands::Issue { name, surname, .. }) => {
                assert_eq!(name.as_str().len(), 1023);
                assert_eq!(surname.as_str(), "Rossi");
            }
            _ => panic!("expected issue command"),
        }
    }

    #[test]
    fn test_parse_dates() {
        let cli = Cli::try_parse_from([
            "greenpass",
            "dates",
            "--date",
            "2023-09-10",
            "--rules",
            "calendar",
        ])
        .unwrap();

        match cli.command {
            Some(Commands::Dates { date, rules }) => {
                assert_eq!(date, Some(CalendarDate::new(10, 9, 2023)));
                assert_eq!(rules, ValidityRules::Calendar);
            }
            _ => panic!("expected dates command"),
        }
    }

    #[test]
    fn test_parse_date_rejects_garbage() {
        assert!(parse_date("10/09/2023").is_err());
    }
}
