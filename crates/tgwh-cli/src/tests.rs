use super::*;

#[test]
fn parses_db_ping_command() {
    let cli = Cli::try_parse_from(["tgwh", "db", "ping"]).expect("expected valid cli args");

    assert!(matches!(
        cli.command,
        Commands::Db {
            command: DbCommands::Ping
        }
    ));
}

#[test]
fn parses_db_migrate_command() {
    let cli = Cli::try_parse_from(["tgwh", "db", "migrate"]).expect("expected valid cli args");

    assert!(matches!(
        cli.command,
        Commands::Db {
            command: DbCommands::Migrate
        }
    ));
}

#[test]
fn command_is_required() {
    assert!(Cli::try_parse_from(["tgwh"]).is_err());
}

#[test]
fn run_defaults_to_configured_limit() {
    let cli = Cli::try_parse_from(["tgwh", "run"]).unwrap();
    assert!(matches!(cli.command, Commands::Run { limit: None }));
}

#[test]
fn collect_accepts_limit() {
    let cli = Cli::try_parse_from(["tgwh", "collect", "--limit", "200"]).unwrap();
    assert!(matches!(cli.command, Commands::Collect { limit: Some(200) }));
}

#[test]
fn load_without_date_uses_today() {
    let cli = Cli::try_parse_from(["tgwh", "load"]).unwrap();
    assert!(matches!(cli.command, Commands::Load { date: None }));
}

#[test]
fn load_with_date() {
    let cli = Cli::try_parse_from(["tgwh", "load", "--date", "2026-03-02"]).unwrap();
    assert!(matches!(
        cli.command,
        Commands::Load { date: Some(d) } if d == NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
    ));
}

#[test]
fn load_rejects_malformed_date() {
    assert!(Cli::try_parse_from(["tgwh", "load", "--date", "02/03/2026"]).is_err());
}

#[test]
fn classify_defaults_to_pending_only() {
    let cli = Cli::try_parse_from(["tgwh", "classify"]).unwrap();
    assert!(matches!(cli.command, Commands::Classify { rescan: false }));
}

#[test]
fn classify_rescan_flag() {
    let cli = Cli::try_parse_from(["tgwh", "classify", "--rescan"]).unwrap();
    assert!(matches!(cli.command, Commands::Classify { rescan: true }));
}

#[test]
fn parses_transform_command() {
    let cli = Cli::try_parse_from(["tgwh", "transform"]).unwrap();
    assert!(matches!(cli.command, Commands::Transform));
}

#[test]
fn parses_schedule_command() {
    let cli = Cli::try_parse_from(["tgwh", "schedule"]).unwrap();
    assert!(matches!(cli.command, Commands::Schedule));
}

#[test]
fn unknown_command_is_rejected() {
    assert!(Cli::try_parse_from(["tgwh", "report"]).is_err());
}
