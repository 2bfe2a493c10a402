#[cfg(test)]
#[path = "main_test.rs"]
mod main_test;

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use serde_json::{Value, json};
use userdesk::config::{self, ConfigError, DEFAULT_SERVER_URL, SERVER_URL_VAR, SESSION_FILE_VAR};
use userdesk::net::transport::TransportError;
use userdesk::state::sign_in::{Credential, SignInForm, SignInOutcome};
use userdesk::state::user_form::{FormMode, SubmitOutcome, UserForm};
use userdesk::state::users::UserListView;
use userdesk::storage::FileStorage;
use userdesk::validation::Field;
use userdesk::{AuthSession, Config, Envelope, HttpTransport, OperationResult, ServiceError, SessionStore, UserDirectory, UserId, use_auth};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("not logged in; run `userdesk login` first")]
    NotAuthenticated,
    #[error("{0}")]
    Config(#[from] ConfigError),
    #[error("{0}")]
    Transport(#[from] TransportError),
    #[error("{0}")]
    Failed(String),
    #[error("delete cancelled")]
    Cancelled,
    #[error("stdin read failed: {0}")]
    Io(#[from] io::Error),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "userdesk", about = "User management client")]
struct Cli {
    #[arg(long, env = SERVER_URL_VAR, default_value = DEFAULT_SERVER_URL)]
    server_url: String,

    #[arg(long, env = SESSION_FILE_VAR)]
    session_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    Logout,
    Status,
    Users(UsersCommand),
}

#[derive(Args, Debug)]
struct UsersCommand {
    #[command(subcommand)]
    command: UsersSubcommand,
}

#[derive(Subcommand, Debug)]
enum UsersSubcommand {
    List,
    Get {
        id: String,
    },
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: Option<String>,
    },
    Update {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        password: Option<String>,
    },
    Delete {
        id: String,
        #[arg(long, default_value_t = false, help = "Skip the confirmation prompt")]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    // A missing .env is normal.
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt().with_writer(io::stderr).init();

    let cli = Cli::parse();
    let config = Config::new(&cli.server_url, cli.session_file.unwrap_or_else(config::default_session_file))?;

    let storage = Arc::new(FileStorage::new(config.session_file.clone()));
    tracing::debug!(path = %storage.path().display(), server_url = %config.server_url, "using session file");
    let store = Arc::new(SessionStore::new(storage));
    let transport = Arc::new(HttpTransport::new(&config.server_url, store.clone())?);
    let auth = Arc::new(AuthSession::new(transport.clone(), store));
    auth.restore();

    let directory = UserDirectory::new(transport);
    auth.scope(run(cli.command, directory)).await
}

async fn run(command: Command, directory: UserDirectory) -> Result<(), CliError> {
    let auth = use_auth();
    match command {
        Command::Login { email, password } => run_login(&auth, email, password).await,
        Command::Logout => {
            auth.logout();
            print_json(&json!({ "success": true }))
        }
        Command::Status => {
            let state = auth.state();
            print_json(&json!({ "authenticated": state.is_authenticated(), "user": state.user }))
        }
        Command::Users(users) => {
            if !auth.state().is_authenticated() {
                return Err(CliError::NotAuthenticated);
            }
            run_users(&directory, users).await
        }
    }
}

async fn run_login(auth: &AuthSession, email: String, password: String) -> Result<(), CliError> {
    let mut form = SignInForm::new();
    form.set_field(auth, Credential::Email, email);
    form.set_field(auth, Credential::Password, password);

    match form.submit(auth).await {
        SignInOutcome::SignedIn => print_envelope(Ok(auth.state().user)),
        SignInOutcome::Invalid(errors) => print_invalid(&serde_json::to_value(errors)?),
        SignInOutcome::Rejected(message) => print_failure(message),
    }
}

async fn run_users(directory: &UserDirectory, users: UsersCommand) -> Result<(), CliError> {
    match users.command {
        UsersSubcommand::List => {
            let mut view = UserListView::new();
            view.load(directory).await;
            match view.error() {
                Some(message) => print_failure(message.to_owned()),
                None => print_envelope(Ok(view.users())),
            }
        }
        UsersSubcommand::Get { id } => print_envelope(directory.get(&UserId::new(id)).await),
        UsersSubcommand::Create { name, email, password } => {
            let mut form = UserForm::new(FormMode::Create);
            form.set_field(Field::Name, name);
            form.set_field(Field::Email, email);
            if let Some(password) = password {
                form.set_field(Field::Password, password);
            }
            submit_form(directory, form).await
        }
        UsersSubcommand::Update { id, name, email, password } => {
            let mut form = UserForm::new(FormMode::Edit(UserId::new(id)));
            form.load(directory).await;
            if let Some(message) = form.submit_error() {
                return print_failure(message.to_owned());
            }
            for (field, value) in [(Field::Name, name), (Field::Email, email), (Field::Password, password)] {
                if let Some(value) = value {
                    form.set_field(field, value);
                }
            }
            submit_form(directory, form).await
        }
        UsersSubcommand::Delete { id, yes } => run_delete(directory, UserId::new(id), yes).await,
    }
}

async fn submit_form(directory: &UserDirectory, mut form: UserForm) -> Result<(), CliError> {
    match form.submit(directory).await {
        SubmitOutcome::Saved { user, message } => {
            tracing::info!(user_id = %user.id, "{message}");
            print_envelope(Ok(user))
        }
        SubmitOutcome::Invalid(errors) => print_invalid(&serde_json::to_value(errors)?),
        SubmitOutcome::Failed(message) => print_failure(message),
    }
}

async fn run_delete(directory: &UserDirectory, id: UserId, yes: bool) -> Result<(), CliError> {
    let user = match directory.get(&id).await {
        Ok(user) => user,
        Err(e) => return print_envelope::<()>(Err(e)),
    };

    if !yes && !confirm(&format!("Tem certeza que deseja excluir o usuário {}? [s/N] ", user.name))? {
        return Err(CliError::Cancelled);
    }

    let mut view = UserListView::new();
    view.request_delete(user);
    match view.confirm_delete(directory).await {
        Some(result) => print_envelope(result),
        None => Err(CliError::Cancelled),
    }
}

fn confirm(prompt: &str) -> Result<bool, CliError> {
    let mut stderr = io::stderr();
    stderr.write_all(prompt.as_bytes())?;
    stderr.flush()?;

    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(is_affirmative(&answer))
}

fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "s" | "sim" | "y" | "yes")
}

/// Print the envelope and turn a failed operation into a non-zero exit.
fn print_envelope<T: serde::Serialize>(result: OperationResult<T>) -> Result<(), CliError> {
    let failure = result.as_ref().err().map(|e| e.message().to_owned());
    print_json(&serde_json::to_value(Envelope::from(result))?)?;
    match failure {
        Some(message) => Err(CliError::Failed(message)),
        None => Ok(()),
    }
}

fn print_failure(message: String) -> Result<(), CliError> {
    print_envelope::<()>(Err(ServiceError::Transport { status: None, message }))
}

fn print_invalid(errors: &Value) -> Result<(), CliError> {
    print_json(&json!({ "success": false, "errors": errors["errors"] }))?;
    Err(CliError::Failed("invalid input".to_owned()))
}

fn print_json(value: &Value) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}
