use std::sync::Arc;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use clap::{Parser, Subcommand, ValueEnum};
use client_core::{
    case_merge::CaseMergeSelector,
    case_tasks::TaskListDependencies,
    filtering::{Filtering, MemoryContextStore},
    modal::FixedAnswer,
    responders::ConfirmingResponderService,
    settings::{load_settings, ClientSettings},
    CaseSearch, ClientError, ConfirmDialog, ConfirmRequest, InMemoryLayout, ModalOutcome,
    Navigator, RestClient, SearchType, TaskListManager, TracingNotifier,
};
use serde_json::Value;
use shared::{
    domain::{CaseId, ResponderId, Task, TaskId},
    protocol::Route,
    query::{Query, Range},
};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
struct Cli {
    /// Overrides `server_url` from casectl.toml / APP__SERVER_URL.
    #[arg(long, global = true)]
    server_url: Option<String>,
    /// Answer yes to every confirmation.
    #[arg(long, global = true)]
    yes: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SearchBy {
    Title,
    Number,
}

impl From<SearchBy> for SearchType {
    fn from(by: SearchBy) -> Self {
        match by {
            SearchBy::Title => SearchType::Title,
            SearchBy::Number => SearchType::Number,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Looks up merge targets for the case numbered `from`.
    SearchCases {
        #[arg(long)]
        from: i64,
        #[arg(long, value_enum, default_value = "title")]
        by: SearchBy,
        input: String,
        /// Select the n-th result (1-based) and print it.
        #[arg(long)]
        pick: Option<usize>,
    },
    Tasks {
        case_id: String,
        #[arg(long)]
        grouped: bool,
        /// `field=value`; repeat to add more values.
        #[arg(long = "filter")]
        filters: Vec<String>,
        /// 1-based page number.
        #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
        page: u32,
    },
    AddTask {
        case_id: String,
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "")]
        group: String,
        #[arg(long)]
        description: Option<String>,
    },
    Start {
        case_id: String,
        task_id: String,
    },
    Open {
        case_id: String,
        task_id: String,
    },
    Close {
        case_id: String,
        task_id: String,
    },
    Remove {
        case_id: String,
        task_id: String,
    },
    Responders {
        case_id: String,
        task_id: String,
    },
    RunResponder {
        case_id: String,
        task_id: String,
        responder_id: String,
        responder_name: String,
    },
}

struct StdoutNavigator;

impl Navigator for StdoutNavigator {
    fn go(&self, route: Route) {
        match route {
            Route::TaskDetail { case_id, task_id } => {
                println!("-> case {case_id} / task {task_id}");
            }
        }
    }
}

/// Asks on the terminal; anything but `y`/`yes` dismisses.
struct PromptDialog;

#[async_trait]
impl ConfirmDialog for PromptDialog {
    async fn confirm(&self, request: ConfirmRequest) -> ModalOutcome<()> {
        let mut stdout = tokio::io::stdout();
        let prompt = format!("{} [y/N] ", request.prompt());
        if stdout.write_all(prompt.as_bytes()).await.is_err() || stdout.flush().await.is_err() {
            return ModalOutcome::Dismissed;
        }
        let mut line = String::new();
        let mut stdin = BufReader::new(tokio::io::stdin());
        match stdin.read_line(&mut line).await {
            Ok(_) if matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes") => {
                ModalOutcome::Closed(())
            }
            _ => ModalOutcome::Dismissed,
        }
    }
}

struct App {
    settings: ClientSettings,
    client: Arc<RestClient>,
    dialog: Arc<dyn ConfirmDialog>,
}

impl App {
    fn task_list(&self, case_id: &str, grouped: bool) -> TaskListManager {
        let filtering = Filtering::new(
            "case-tasks",
            self.settings.task_filter_defaults(),
            Arc::new(MemoryContextStore::default()),
        );
        let responders = ConfirmingResponderService::new(self.client.clone(), self.dialog.clone());
        TaskListManager::new(
            CaseId::from(case_id),
            TaskListDependencies {
                search: self.client.clone(),
                tasks: self.client.clone(),
                filtering: Arc::new(filtering),
                notifier: Arc::new(TracingNotifier),
                responders: Arc::new(responders),
                dialog: self.dialog.clone(),
                navigator: Arc::new(StdoutNavigator),
                layout: Arc::new(InMemoryLayout::new(self.settings.group_tasks || grouped)),
            },
        )
    }

    async fn loaded_task(&self, case_id: &str, task_id: &str) -> Result<(TaskListManager, Task)> {
        let manager = self.task_list(case_id, false);
        manager.init().await?;
        let task_id = TaskId::from(task_id);
        let task = manager
            .view()
            .await
            .all_tasks
            .into_iter()
            .find(|task| task.id == task_id)
            .ok_or_else(|| anyhow!("task {task_id} is not an active task of case {case_id}"))?;
        Ok((manager, task))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let cli = Cli::parse();

    let mut settings = load_settings()?;
    if let Some(server_url) = cli.server_url {
        settings.server_url = server_url;
        settings.validate()?;
    }
    debug!(server_url = %settings.server_url, "settings loaded");

    let client = Arc::new(RestClient::from_settings(&settings)?);
    let dialog: Arc<dyn ConfirmDialog> = if cli.yes {
        Arc::new(FixedAnswer(true))
    } else {
        Arc::new(PromptDialog)
    };
    let app = App {
        settings,
        client,
        dialog,
    };

    match run(&app, cli.command).await {
        Err(err) if matches!(err.downcast_ref::<ClientError>(), Some(ClientError::Cancelled)) => {
            println!("cancelled");
            Ok(())
        }
        other => other,
    }
}

async fn run(app: &App, command: Command) -> Result<()> {
    match command {
        Command::SearchCases {
            from,
            by,
            input,
            pick,
        } => {
            let source = app
                .client
                .search_cases(&Query::eq("caseId", from), Range::All)
                .await?
                .into_iter()
                .next()
                .ok_or_else(|| anyhow!("case #{from} not found"))?;
            let selector = CaseMergeSelector::new(
                app.client.clone(),
                source,
                "Merge case",
                "Select the case to merge into",
            );
            let search_type = SearchType::from(by);
            selector.on_type_change(search_type).await;
            if !selector.accepts_input(&input).await {
                bail!(
                    "search by {} needs at least {} characters",
                    search_type.as_str(),
                    search_type.min_input_length()
                );
            }
            selector.set_input(input.clone()).await;
            let cases = selector.search(search_type, &input).await?;
            for (index, case) in cases.iter().enumerate() {
                if let Some(line) = CaseMergeSelector::format(Some(case)) {
                    println!("{:>3}. {line}", index + 1);
                }
            }
            if let Some(pick) = pick {
                let case = pick
                    .checked_sub(1)
                    .and_then(|index| cases.get(index))
                    .cloned()
                    .ok_or_else(|| anyhow!("no result number {pick}"))?;
                selector.select_one(case).await;
                if let Some(case) = selector.confirm().await?.into_option() {
                    println!(
                        "merge {} into {}",
                        CaseMergeSelector::format(Some(selector.source())).unwrap_or_default(),
                        CaseMergeSelector::format(Some(&case)).unwrap_or_default()
                    );
                }
            }
        }
        Command::Tasks {
            case_id,
            grouped,
            filters,
            page,
        } => {
            let manager = app.task_list(&case_id, grouped);
            manager.init().await?;
            for raw in &filters {
                let (field, value) = raw
                    .split_once('=')
                    .ok_or_else(|| anyhow!("filter '{raw}' must look like field=value"))?;
                manager
                    .add_filter_value(field, Value::String(value.to_string()))
                    .await?;
            }
            manager.set_page(page as usize - 1).await;
            print_tasks(&manager).await;
        }
        Command::AddTask {
            case_id,
            title,
            group,
            description,
        } => {
            let manager = app.task_list(&case_id, false);
            manager.open_new_task_form().await;
            manager
                .edit_new_task(|form| {
                    form.title = title;
                    form.group = group;
                    form.description = description;
                })
                .await;
            let created = manager.submit_new_task().await?;
            println!("created task {}", created.id);
        }
        Command::Start { case_id, task_id } => {
            let (manager, task) = app.loaded_task(&case_id, &task_id).await?;
            manager.start_task(&task).await?;
        }
        Command::Open { case_id, task_id } => {
            let (manager, task) = app.loaded_task(&case_id, &task_id).await?;
            manager.open_task(&task).await?;
        }
        Command::Close { case_id, task_id } => {
            let (manager, task) = app.loaded_task(&case_id, &task_id).await?;
            manager.close_task(&task).await?;
        }
        Command::Remove { case_id, task_id } => {
            let (manager, task) = app.loaded_task(&case_id, &task_id).await?;
            if !manager.remove_task(&task).await? {
                println!("kept task {}", task.id);
            }
        }
        Command::Responders { case_id, task_id } => {
            let (manager, task) = app.loaded_task(&case_id, &task_id).await?;
            manager.get_responders(&task.id, false).await?;
            for responder in manager.responders().await.unwrap_or_default() {
                println!("{}\t{}", responder.id, responder.name);
            }
        }
        Command::RunResponder {
            case_id,
            task_id,
            responder_id,
            responder_name,
        } => {
            let (manager, task) = app.loaded_task(&case_id, &task_id).await?;
            manager
                .run_responder(ResponderId::from(responder_id.as_str()), &responder_name, &task)
                .await?;
        }
    }
    Ok(())
}

async fn print_tasks(manager: &TaskListManager) {
    let view = manager.view().await;
    println!(
        "{} task(s), page {}/{}",
        view.total,
        view.page + 1,
        view.page_count()
    );
    if view.show_grouped {
        for group in &view.groups {
            println!("[{}]", group.group);
            for task in &group.tasks {
                println!("  {}", task_line(task));
            }
        }
    } else {
        for task in &view.tasks {
            println!("{}", task_line(task));
        }
    }
}

fn task_line(task: &Task) -> String {
    let flag = if task.flag { "!" } else { " " };
    format!("{flag} {:<10} {:<12} {}", task.status, task.id, task.title)
}
