//! `taskboard`: command-line client for the Taskboard REST backend.
//!
//! Configuration via CLI flags, environment variables, or config file
//! (`~/.config/taskboard/config.toml`). The session credential persists
//! between invocations.
//!
//! ```bash
//! taskboard --base-url http://127.0.0.1:8080/api login ada@example.com --password secret
//! taskboard add "Buy milk" --list 3 --due 2024-05-03
//! taskboard board --order due-date
//! taskboard move 42 done
//! ```

use std::path::Path;
use std::process::ExitCode;

use chrono::Utc;
use clap::Parser;
use tracing_appender::non_blocking::WorkerGuard;

use taskboard::api::ApiError;
use taskboard::app::App;
use taskboard::board::{Board, DragGesture, DropOutcome};
use taskboard::config::{CliArgs, ClientConfig, Command};
use taskboard_proto::list::{ListId, NewList};
use taskboard_proto::task::{CalendarRange, NewTask, Task, TaskFilter, TaskId};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = CliArgs::parse();

    let config = match ClientConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Warning: failed to load config file: {e}");
            ClientConfig::default()
        }
    };

    let _log_guard = init_logging(&cli.log_level, cli.log_file.as_deref());
    tracing::info!(base_url = %config.base_url, "taskboard starting");

    let Some(command) = cli.command else {
        eprintln!("No command given; see `taskboard --help`.");
        return ExitCode::FAILURE;
    };

    let (app, _events) = match App::new(&config) {
        Ok(app) => app,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let result = run(&app, command).await;
    tracing::info!("taskboard exiting");
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Initialize file-based logging.
///
/// Logs are written to a file so stdout carries only command output.
/// Returns a [`WorkerGuard`] that must be held until shutdown to ensure all
/// buffered log entries are flushed.
fn init_logging(level: &str, file_path: Option<&Path>) -> Option<WorkerGuard> {
    let default_path = std::env::temp_dir().join("taskboard.log");
    let log_path = file_path.unwrap_or(&default_path);

    let log_dir = log_path.parent()?;
    let file_name = log_path.file_name()?.to_str()?;

    let file_appender = tracing_appender::rolling::never(log_dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter(env_filter)
        .with_ansi(false)
        .init();

    Some(guard)
}

/// Runs one subcommand.
async fn run(app: &App, command: Command) -> Result<(), ApiError> {
    let signs_in = matches!(
        command,
        Command::Login { .. }
            | Command::Oauth { .. }
            | Command::Register { .. }
            | Command::Verify { .. }
            | Command::ForgotPassword { .. }
            | Command::ResetPassword { .. }
    );
    if !signs_in {
        app.restore_session().await;
    }

    match command {
        Command::Login { email, password } => {
            let session = app.api().sign_in(&email, &password).await?;
            println!("Signed in as {}", session.display_name.as_deref().unwrap_or(&email));
        }
        Command::Oauth { redirect_url } => {
            if !app.session().login_from_redirect(&redirect_url).await {
                return Err(ApiError::InvalidCredential);
            }
            println!("Signed in as {}", app.session().display_name().unwrap_or_default());
        }
        Command::Register { name, email, password } => {
            app.api().register(&name, &email, &password).await?;
            println!("Account created. Check {email} for a verification code.");
        }
        Command::Verify { email, code, resend } => {
            if resend {
                app.api().resend_code(&email).await?;
                println!("A new code was sent to {email}.");
            } else {
                let code = code.ok_or_else(|| ApiError::Invalid("verification code is required".into()))?;
                app.api().verify_email(&email, &code).await?;
                println!("Email verified. You can sign in now.");
            }
        }
        Command::ForgotPassword { email } => {
            app.api().forgot_password(&email).await?;
            println!("If {email} has an account, a reset link is on its way.");
        }
        Command::ResetPassword { token, password } => {
            app.api().reset_password(&token, &password).await?;
            println!("Password updated.");
        }
        Command::Logout => {
            app.api().sign_out().await;
            println!("Signed out.");
        }
        Command::Whoami => match app.session().snapshot() {
            session if session.is_authenticated() => {
                println!("{}", session.display_name.as_deref().unwrap_or("(unnamed)"));
            }
            _ => println!("Not signed in."),
        },
        Command::Tasks { list, status, due } => {
            let filter = TaskFilter {
                list_id: list.map(ListId::new),
                due_date: due,
                status,
            };
            app.tasks().fetch_tasks(Some(&filter)).await?;
            print_tasks(&app.tasks().tasks());
        }
        Command::MyDay => {
            app.tasks().fetch_my_day_tasks().await?;
            print_tasks(&app.tasks().tasks());
        }
        Command::Calendar { from, to } => {
            let range = CalendarRange::days(from, to);
            app.tasks().fetch_calendar_tasks(&range).await?;
            print_tasks(&app.tasks().tasks());
        }
        Command::Add {
            title,
            list,
            status,
            due,
            description,
        } => {
            let task = NewTask {
                title,
                description,
                status,
                due_date: due,
                list_id: list.map(ListId::new),
                moved_to_my_day: None,
            };
            let created = app.tasks().create_task(&task).await?;
            println!("Created task {}", created.id);
        }
        Command::Move { id, status } => {
            let id = TaskId::new(id);
            app.tasks().fetch_tasks(None).await?;
            let source = app
                .tasks()
                .task(&id)
                .map(|task| task.effective_status())
                .ok_or_else(|| ApiError::Invalid(format!("no task with id {id}")))?;
            let board = app.board();
            match board.on_drag_end(&DragGesture::new(id.clone(), source, status, 0)).await? {
                DropOutcome::Moved(task) => println!("Moved {} to {}", task.id, task.effective_status().label()),
                DropOutcome::RolledBack(cause) => return Err(cause),
                DropOutcome::Ignored | DropOutcome::Reordered => println!("{id} is already in {}", status.label()),
            }
        }
        Command::Delete { id } => {
            app.tasks().delete_task(&TaskId::new(id.clone())).await?;
            println!("Deleted task {id}");
        }
        Command::Lists => {
            app.lists().fetch_lists().await?;
            for list in app.lists().lists() {
                println!("{:>6}  {}", list.id, list.name);
            }
        }
        Command::AddList { name, description } => {
            let mut list = NewList::new(name);
            list.description = description;
            let created = app.lists().create_list(&list).await?;
            println!("Created list {} ({})", created.name, created.id);
        }
        Command::Board { order, list } => {
            app.tasks().fetch_tasks(None).await?;
            let board = app.board().with_mode(order).with_list_filter(list.map(ListId::new));
            print_board(&board);
        }
        Command::DeleteAccount => {
            app.api().delete_account().await?;
            println!("Account deleted.");
        }
    }
    Ok(())
}

fn print_tasks(tasks: &[Task]) {
    if tasks.is_empty() {
        println!("No tasks.");
        return;
    }
    let today = Utc::now().date_naive();
    for task in tasks {
        let due = task.due_date.map_or_else(String::new, |due| {
            if due < today {
                format!("  due {due} (overdue)")
            } else {
                format!("  due {due}")
            }
        });
        println!(
            "{:>6}  [{:<11}] {}{due}",
            task.id,
            task.effective_status().label(),
            task.title
        );
    }
}

fn print_board(board: &Board) {
    for (status, tasks) in board.columns().iter() {
        println!("== {} ({}) ==", status.label(), tasks.len());
        for task in tasks {
            let due = task.due_date.map(|d| format!("  ({d})")).unwrap_or_default();
            println!("  {:>6}  {}{due}", task.id, task.title);
        }
    }
}
