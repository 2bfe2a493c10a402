use super::*;

#[test]
fn parses_login() {
    let cli = Cli::try_parse_from(["userdesk", "login", "--email", "admin@spsgroup.com.br", "--password", "1234"]).unwrap();
    assert!(matches!(
        cli.command,
        Command::Login { ref email, ref password } if email == "admin@spsgroup.com.br" && password == "1234"
    ));
}

#[test]
fn parses_global_flags_before_subcommand() {
    let cli = Cli::try_parse_from([
        "userdesk",
        "--server-url",
        "http://api.local:8080",
        "--session-file",
        "/tmp/s.json",
        "status",
    ])
    .unwrap();
    assert_eq!(cli.server_url, "http://api.local:8080");
    assert_eq!(cli.session_file, Some(PathBuf::from("/tmp/s.json")));
    assert!(matches!(cli.command, Command::Status));
}

#[test]
fn update_fields_are_optional() {
    let cli = Cli::try_parse_from(["userdesk", "users", "update", "3", "--name", "Maria"]).unwrap();
    let Command::Users(UsersCommand { command: UsersSubcommand::Update { id, name, email, password } }) = cli.command
    else {
        panic!("expected users update");
    };
    assert_eq!(id, "3");
    assert_eq!(name.as_deref(), Some("Maria"));
    assert!(email.is_none());
    assert!(password.is_none());
}

#[test]
fn create_requires_name_and_email() {
    assert!(Cli::try_parse_from(["userdesk", "users", "create", "--name", "João"]).is_err());
}

#[test]
fn delete_yes_defaults_to_false() {
    let cli = Cli::try_parse_from(["userdesk", "users", "delete", "1"]).unwrap();
    assert!(matches!(
        cli.command,
        Command::Users(UsersCommand { command: UsersSubcommand::Delete { yes: false, .. } })
    ));
}

#[test]
fn affirmative_answers() {
    for answer in ["s\n", "Sim", " y ", "YES"] {
        assert!(is_affirmative(answer), "{answer:?}");
    }
    for answer in ["", "\n", "n", "não", "talvez"] {
        assert!(!is_affirmative(answer), "{answer:?}");
    }
}
