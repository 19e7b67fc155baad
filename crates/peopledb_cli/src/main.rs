//! `peopledb` command-line entry point.
//!
//! # Responsibility
//! - Open a people store (file or in-memory) and run one repository
//!   operation per invocation.
//! - Print results as plain text or JSON so scripts can consume them.

use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset};
use clap::{Args, Parser, Subcommand};
use log::info;
use peopledb_core::db::{open_db, open_db_in_memory};
use peopledb_core::{CrudRepository, EntityId, PeopleRepository, Person};
use rusqlite::Connection;
use rust_decimal::Decimal;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "peopledb", version, about = "Store and query people in a SQLite file")]
struct Cli {
    /// SQLite file to use; an in-memory store when omitted
    #[arg(long, env = "PEOPLEDB_DB", global = true)]
    db: Option<PathBuf>,

    /// trace|debug|info|warn|error
    #[arg(long, env = "PEOPLEDB_LOG_LEVEL", global = true)]
    log_level: Option<String>,

    /// Absolute directory for rolling log files; logging is off when omitted
    #[arg(long, env = "PEOPLEDB_LOG_DIR", global = true)]
    log_dir: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the core crate version
    Version,
    /// Save a new person and print its id
    AddPerson(AddPersonArgs),
    /// Print one person, with addresses and children, as JSON
    Show { id: EntityId },
    /// Print stored people as JSON lines
    List,
    /// Print the number of stored people
    Count,
    /// Delete people by id and print the number of removed rows
    Delete {
        #[arg(required = true)]
        ids: Vec<EntityId>,
    },
}

#[derive(Args, Debug)]
struct AddPersonArgs {
    #[arg(long)]
    first: String,
    #[arg(long)]
    last: String,
    /// Birth instant as RFC 3339, e.g. 1980-11-15T15:15:00-06:00
    #[arg(long, value_parser = parse_dob)]
    dob: DateTime<FixedOffset>,
    #[arg(long)]
    salary: Option<Decimal>,
    #[arg(long)]
    email: Option<String>,
}

fn parse_dob(value: &str) -> Result<DateTime<FixedOffset>, String> {
    DateTime::parse_from_rfc3339(value).map_err(|err| format!("invalid RFC 3339 instant: {err}"))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(log_dir) = cli.log_dir.as_deref() {
        let level = cli
            .log_level
            .as_deref()
            .unwrap_or_else(|| peopledb_core::default_log_level());
        peopledb_core::init_logging(level, log_dir).map_err(anyhow::Error::msg)?;
    }

    if let Command::Version = cli.command {
        println!("peopledb_core version={}", peopledb_core::core_version());
        return Ok(());
    }

    let conn = open_connection(cli.db.as_ref())?;
    let repo = PeopleRepository::new(&conn);
    run(&repo, cli.command)
}

fn open_connection(db: Option<&PathBuf>) -> Result<Connection> {
    match db {
        Some(path) => {
            open_db(path).with_context(|| format!("failed to open database `{}`", path.display()))
        }
        None => open_db_in_memory().context("failed to open in-memory database"),
    }
}

fn run(repo: &PeopleRepository<'_>, command: Command) -> Result<()> {
    match command {
        Command::Version => {}
        Command::AddPerson(args) => {
            let mut person = Person::new(args.first, args.last, args.dob);
            if let Some(salary) = args.salary {
                person.set_salary(salary);
            }
            person.set_email(args.email);
            let id = repo.save(&mut person)?;
            info!("event=cli_add_person module=cli status=ok id={id}");
            println!("{id}");
        }
        Command::Show { id } => match repo.find_by_id(id)? {
            Some(person) => println!("{}", serde_json::to_string_pretty(&person)?),
            None => println!("not found"),
        },
        Command::List => {
            for person in repo.find_all()? {
                println!("{}", serde_json::to_string(&person)?);
            }
        }
        Command::Count => println!("{}", repo.count()?),
        Command::Delete { ids } => {
            let mut found = Vec::with_capacity(ids.len());
            for id in ids {
                match repo.find_by_id(id)? {
                    Some(person) => found.push(person),
                    None => eprintln!("person {id} not found; skipping"),
                }
            }
            let deleted = repo.delete_many(&found)?;
            info!("event=cli_delete module=cli status=ok deleted={deleted}");
            println!("{deleted}");
        }
    }
    Ok(())
}
