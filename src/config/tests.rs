use super::*;

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = RawSettings::default();
    raw.server.port = Some(4000);
    raw.logging.level = Some("info".to_string());

    let overrides = ServeOverrides {
        server_port: Some(4321),
        log_level: Some("debug".to_string()),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.server.addr.port(), 4321);
    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
}

#[test]
fn defaults_are_valid() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

    assert_eq!(settings.jobs.stale_after, Duration::from_secs(600));
    assert_eq!(settings.jobs.fan_out.get(), DEFAULT_FAN_OUT);
    assert!(settings.jobs.run_scheduler);
    assert_eq!(settings.storage.directory, PathBuf::from(DEFAULT_STORAGE_DIR));
    assert_eq!(settings.documents.direction, Direction::Rtl);
    assert!(settings.mail.is_none());
    assert!(matches!(
        settings.assets.location,
        AssetLocation::Directory(_)
    ));
    assert_eq!(
        settings.assets.fetch_timeout,
        Duration::from_secs(DEFAULT_ASSET_FETCH_TIMEOUT_SECS)
    );
}

#[test]
fn asset_fetch_timeout_must_be_positive() {
    let mut raw = RawSettings::default();
    raw.assets.fetch_timeout_seconds = Some(0);

    let err = Settings::from_raw(raw).expect_err("invalid timeout");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "assets.fetch_timeout_seconds",
            ..
        }
    ));

    let mut raw = RawSettings::default();
    raw.assets.fetch_timeout_seconds = Some(3);
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(settings.assets.fetch_timeout, Duration::from_secs(3));
}

#[test]
fn cli_json_logging_enforces_format() {
    let mut raw = RawSettings::default();
    let overrides = ServeOverrides {
        log_json: Some(true),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert!(matches!(settings.logging.format, LogFormat::Json));
}

#[test]
fn zero_fan_out_is_rejected() {
    let mut raw = RawSettings::default();
    raw.jobs.fan_out = Some(0);

    let err = Settings::from_raw(raw).expect_err("invalid fan out");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "jobs.fan_out",
            ..
        }
    ));
}

#[test]
fn malformed_cycle_schedule_is_rejected() {
    let mut raw = RawSettings::default();
    raw.jobs.cycle_schedule = Some("whenever".to_string());

    let err = Settings::from_raw(raw).expect_err("invalid schedule");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "jobs.cycle_schedule",
            ..
        }
    ));
}

#[test]
fn enabled_mail_requires_host_and_sender() {
    let mut raw = RawSettings::default();
    raw.mail.enabled = Some(true);
    raw.mail.host = Some("smtp.example.org".to_string());

    let err = Settings::from_raw(raw.clone()).expect_err("missing sender");
    assert!(matches!(err, LoadError::Invalid { key: "mail.from", .. }));

    raw.mail.from = Some("Ligue <orders@example.org>".to_string());
    let mail = Settings::from_raw(raw)
        .expect("valid settings")
        .mail
        .expect("mail enabled");
    assert_eq!(mail.port, DEFAULT_SMTP_PORT);
    assert!(mail.starttls);
}

#[test]
fn asset_base_url_gains_a_trailing_slash() {
    let mut raw = RawSettings::default();
    raw.assets.base_url = Some("https://cdn.example.org/missive".to_string());

    let settings = Settings::from_raw(raw).expect("valid settings");
    match settings.assets.location {
        AssetLocation::Remote(url) => {
            assert_eq!(
                url.join("logo.jpg").expect("join").as_str(),
                "https://cdn.example.org/missive/logo.jpg"
            );
        }
        AssetLocation::Directory(_) => panic!("expected a remote location"),
    }
}

#[test]
fn unknown_direction_is_rejected() {
    let mut raw = RawSettings::default();
    raw.documents.direction = Some("ttb".to_string());

    assert!(Settings::from_raw(raw).is_err());
}

#[test]
fn default_to_serve_command() {
    let args = CliArgs::parse_from(["missive"]);
    let command = args
        .command
        .unwrap_or(Command::Serve(Box::<ServeArgs>::default()));
    assert!(matches!(command, Command::Serve(_)));
}

#[test]
fn parse_run_cycle_arguments() {
    let args = CliArgs::parse_from([
        "missive",
        "run-cycle",
        "--database-url",
        "postgres://example",
        "--max-batches",
        "2",
    ]);

    match args.command.expect("run-cycle command") {
        Command::RunCycle(run) => {
            assert_eq!(
                run.database.database_url.as_deref(),
                Some("postgres://example")
            );
            assert_eq!(run.max_batches, Some(2));
        }
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn run_cycle_overrides_max_batches() {
    let mut raw = RawSettings::default();
    raw.apply_run_cycle_overrides(&RunCycleArgs {
        max_batches: Some(9),
        ..Default::default()
    });

    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(settings.jobs.max_batches.get(), 9);
}

#[test]
fn parse_issue_key_arguments() {
    let args = CliArgs::parse_from([
        "missive",
        "issue-key",
        "--name",
        "dashboard",
        "--scope",
        "jobs_read",
        "--scope",
        "jobs_write",
    ]);

    match args.command.expect("issue-key command") {
        Command::IssueKey(issue) => {
            assert_eq!(issue.name, "dashboard");
            assert_eq!(issue.scopes, vec!["jobs_read", "jobs_write"]);
            assert!(issue.expires_in_days.is_none());
        }
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn parse_revoke_key_arguments() {
    let args = CliArgs::parse_from([
        "missive",
        "revoke-key",
        "--id",
        "7f1d1a52-5c2e-4c47-9a51-3c1f3d2b9e10",
    ]);

    match args.command.expect("revoke-key command") {
        Command::RevokeKey(revoke) => {
            assert_eq!(
                revoke.id.to_string(),
                "7f1d1a52-5c2e-4c47-9a51-3c1f3d2b9e10"
            );
        }
        _ => panic!("wrong command parsed"),
    }
}
