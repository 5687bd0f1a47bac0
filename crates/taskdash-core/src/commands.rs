use std::io::{self, BufRead, Write};

use anyhow::{Context, anyhow, bail};
use tokio::runtime::Runtime;
use tracing::{debug, info, instrument, warn};

use crate::charts::{due_histogram, priority_breakdown};
use crate::cli::{AddArgs, Command, CredentialArgs, EditArgs, ListArgs};
use crate::config::Config;
use crate::dashboard::{Dashboard, DashboardError};
use crate::render::Renderer;
use crate::task::{TaskInput, parse_due_date};
use crate::view::StatusFilter;

/// Everything a command needs: the controller, the runtime its network
/// calls are driven on, and the terminal renderer.
pub struct CommandEnv<'a> {
    pub dashboard: Dashboard,
    pub runtime: Runtime,
    pub renderer: Renderer,
    pub cfg: &'a Config,
}

#[instrument(skip(ctx, command))]
pub fn dispatch(ctx: &mut CommandEnv<'_>, command: Command) -> anyhow::Result<()> {
    debug!(?command, "dispatching command");

    let result = match command {
        Command::Health => cmd_health(ctx),
        Command::Register(args) => cmd_register(ctx, args),
        Command::Login(args) => cmd_login(ctx, args),
        Command::Logout => cmd_logout(ctx),
        Command::Refresh => cmd_refresh(ctx),
        Command::Whoami => cmd_whoami(ctx),
        Command::List(args) => cmd_list(ctx, args),
        Command::Show { id } => cmd_show(ctx, &id),
        Command::Add(args) => cmd_add(ctx, args),
        Command::Edit(args) => cmd_edit(ctx, args),
        Command::Toggle { id } => cmd_toggle(ctx, &id),
        Command::Delete { id, yes } => cmd_delete(ctx, &id, yes),
        Command::Stats => cmd_stats(ctx),
        Command::Charts => cmd_charts(ctx),
        Command::Config => cmd_config(ctx),
        Command::Shell => cmd_shell(ctx),
    };

    let notices = ctx.dashboard.drain_notices();
    ctx.renderer.print_notices(&notices)?;
    result
}

fn cmd_health(ctx: &mut CommandEnv<'_>) -> anyhow::Result<()> {
    info!("command health");
    let api = ctx.dashboard.api();
    let health = ctx.runtime.block_on(api.health());
    match health {
        Ok(health) => ctx.renderer.print_health(api.base_url(), Ok(health.status.as_str())),
        Err(err) => {
            let reason = err.to_string();
            ctx.renderer.print_health(api.base_url(), Err(reason.as_str()))?;
            Err(anyhow!("backend unavailable"))
        }
    }
}

fn cmd_register(ctx: &mut CommandEnv<'_>, args: CredentialArgs) -> anyhow::Result<()> {
    info!("command register");
    let password = resolve_password(args.password)?;
    let response = ctx
        .runtime
        .block_on(ctx.dashboard.register(&args.login, &password))?;
    println!("Registered {} (id {}).", response.login, response.id);
    Ok(())
}

fn cmd_login(ctx: &mut CommandEnv<'_>, args: CredentialArgs) -> anyhow::Result<()> {
    info!("command login");
    let password = resolve_password(args.password)?;
    let session = ctx
        .runtime
        .block_on(ctx.dashboard.login(&args.login, &password))?;
    println!("Logged in as {}.", session.login);
    Ok(())
}

fn cmd_logout(ctx: &mut CommandEnv<'_>) -> anyhow::Result<()> {
    info!("command logout");
    ctx.dashboard.logout()?;
    println!("Logged out.");
    Ok(())
}

fn cmd_refresh(ctx: &mut CommandEnv<'_>) -> anyhow::Result<()> {
    info!("command refresh");
    ctx.runtime.block_on(ctx.dashboard.refresh_token())?;
    Ok(())
}

fn cmd_whoami(ctx: &mut CommandEnv<'_>) -> anyhow::Result<()> {
    info!("command whoami");
    let user = ctx.runtime.block_on(ctx.dashboard.authenticate())?;
    ctx.renderer.print_user(user)
}

fn cmd_list(ctx: &mut CommandEnv<'_>, args: ListArgs) -> anyhow::Result<()> {
    info!("command list");
    load_dashboard(ctx)?;

    ctx.dashboard.set_status_filter(args.filter);
    if let Some(term) = args.search.as_deref() {
        ctx.dashboard.set_search_term(term);
    }
    ctx.dashboard.set_page(args.page);

    if args.json {
        ctx.renderer.print_view_json(ctx.dashboard.view())
    } else {
        let state = ctx.dashboard.view_state();
        ctx.renderer.print_view(state.derived_view(), state.criteria())
    }
}

fn cmd_show(ctx: &mut CommandEnv<'_>, id: &str) -> anyhow::Result<()> {
    info!("command show");
    authenticate(ctx)?;
    match ctx.runtime.block_on(ctx.dashboard.fetch_task(id))? {
        Some(task) => ctx.renderer.print_task_info(&task),
        None => Err(action_failed("show")),
    }
}

fn cmd_add(ctx: &mut CommandEnv<'_>, args: AddArgs) -> anyhow::Result<()> {
    info!("command add");
    let title = args.title.trim().to_string();
    if title.is_empty() {
        bail!("task title cannot be empty");
    }
    let input = TaskInput {
        title,
        description: args.description.unwrap_or_default(),
        priority: args.priority,
        due_date: args.due.as_deref().map(normalize_due).transpose()?,
    };

    authenticate(ctx)?;
    if ctx.runtime.block_on(ctx.dashboard.create_task(&input))? {
        Ok(())
    } else {
        Err(action_failed("add"))
    }
}

fn cmd_edit(ctx: &mut CommandEnv<'_>, args: EditArgs) -> anyhow::Result<()> {
    info!("command edit");
    authenticate(ctx)?;

    let Some(current) = ctx.runtime.block_on(ctx.dashboard.fetch_task(&args.id))? else {
        return Err(action_failed("edit"));
    };

    let mut input = TaskInput::from_task(&current);
    if let Some(title) = args.title {
        let title = title.trim().to_string();
        if title.is_empty() {
            bail!("task title cannot be empty");
        }
        input.title = title;
    }
    if let Some(description) = args.description {
        input.description = description;
    }
    if let Some(priority) = args.priority {
        input.priority = priority;
    }
    if args.no_due {
        input.due_date = None;
    } else if let Some(due) = args.due.as_deref() {
        input.due_date = Some(normalize_due(due)?);
    }

    if ctx.runtime.block_on(ctx.dashboard.update_task(&args.id, &input))? {
        Ok(())
    } else {
        Err(action_failed("edit"))
    }
}

fn cmd_toggle(ctx: &mut CommandEnv<'_>, id: &str) -> anyhow::Result<()> {
    info!("command toggle");
    authenticate(ctx)?;
    if ctx.runtime.block_on(ctx.dashboard.toggle_task(id))? {
        Ok(())
    } else {
        Err(action_failed("toggle"))
    }
}

fn cmd_delete(ctx: &mut CommandEnv<'_>, id: &str, yes: bool) -> anyhow::Result<()> {
    info!("command delete");
    if !yes && !confirm(&format!("Delete task {id}?"))? {
        println!("Cancelled.");
        return Ok(());
    }

    authenticate(ctx)?;
    if ctx.runtime.block_on(ctx.dashboard.delete_task(id))? {
        Ok(())
    } else {
        Err(action_failed("delete"))
    }
}

fn cmd_stats(ctx: &mut CommandEnv<'_>) -> anyhow::Result<()> {
    info!("command stats");
    load_dashboard(ctx)?;
    ctx.renderer.print_stats(&ctx.dashboard.view().stats)
}

fn cmd_charts(ctx: &mut CommandEnv<'_>) -> anyhow::Result<()> {
    info!("command charts");
    load_dashboard(ctx)?;
    print_charts(ctx)
}

fn cmd_config(ctx: &mut CommandEnv<'_>) -> anyhow::Result<()> {
    let mut entries: Vec<_> = ctx.cfg.iter().collect();
    entries.sort();
    for (key, value) in entries {
        println!("{key}={value}");
    }
    for file in &ctx.cfg.loaded_files {
        println!("# loaded {}", file.display());
    }
    Ok(())
}

const SHELL_HELP: &str = "\
commands:
  filter all|active|completed   show tasks by status
  search [TEXT]                 search title/description (empty clears)
  page N | next | prev          move between pages
  reload                        fetch tasks again
  show ID | toggle ID | delete ID
  stats | charts
  help | quit";

#[instrument(skip(ctx))]
fn cmd_shell(ctx: &mut CommandEnv<'_>) -> anyhow::Result<()> {
    info!("command shell");
    load_dashboard(ctx)?;
    print_current_view(ctx)?;

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("taskdash> ");
        io::stdout().flush()?;

        let Some(line) = lines.next() else {
            println!();
            break;
        };
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let (verb, rest) = trimmed
            .split_once(char::is_whitespace)
            .map(|(verb, rest)| (verb, rest.trim()))
            .unwrap_or((trimmed, ""));
        debug!(verb, rest, "shell input");

        match run_shell_line(ctx, verb, rest, &mut lines) {
            Ok(ShellFlow::Continue) => {}
            Ok(ShellFlow::Quit) => break,
            Err(err) => {
                if let Some(DashboardError::SessionExpired) = err.downcast_ref::<DashboardError>() {
                    return Err(err);
                }
                eprintln!("error: {err:#}");
            }
        }

        let notices = ctx.dashboard.drain_notices();
        ctx.renderer.print_notices(&notices)?;
    }

    Ok(())
}

enum ShellFlow {
    Continue,
    Quit,
}

/// Shell input lines; prompts inside a shell command read from the same
/// stream as the command loop.
type InputLines<'a> = dyn Iterator<Item = io::Result<String>> + 'a;

fn run_shell_line(
    ctx: &mut CommandEnv<'_>,
    verb: &str,
    rest: &str,
    input: &mut InputLines<'_>,
) -> anyhow::Result<ShellFlow> {
    match verb {
        "quit" | "exit" | "q" => return Ok(ShellFlow::Quit),
        "help" | "?" => println!("{SHELL_HELP}"),
        "filter" => {
            let filter: StatusFilter = rest.parse()?;
            ctx.dashboard.set_status_filter(filter);
            print_current_view(ctx)?;
        }
        "search" => {
            ctx.dashboard.set_search_term(rest);
            print_current_view(ctx)?;
        }
        "page" => {
            let page = rest
                .parse::<usize>()
                .with_context(|| format!("invalid page number: {rest}"))?;
            ctx.dashboard.set_page(page);
            print_current_view(ctx)?;
        }
        "next" => {
            ctx.dashboard.next_page();
            print_current_view(ctx)?;
        }
        "prev" => {
            ctx.dashboard.prev_page();
            print_current_view(ctx)?;
        }
        "reload" => {
            ctx.runtime.block_on(ctx.dashboard.reload())?;
            print_current_view(ctx)?;
        }
        "show" => {
            let id = require_id(rest)?;
            if let Some(task) = ctx.runtime.block_on(ctx.dashboard.fetch_task(id))? {
                ctx.renderer.print_task_info(&task)?;
            }
        }
        "toggle" => {
            let id = require_id(rest)?;
            if ctx.runtime.block_on(ctx.dashboard.toggle_task(id))? {
                print_current_view(ctx)?;
            }
        }
        "delete" => {
            let id = require_id(rest)?;
            if !ask_yes_no(&format!("Delete task {id}?"), input)? {
                println!("Cancelled.");
                return Ok(ShellFlow::Continue);
            }
            if ctx.runtime.block_on(ctx.dashboard.delete_task(id))? {
                print_current_view(ctx)?;
            }
        }
        "stats" => ctx.renderer.print_stats(&ctx.dashboard.view().stats)?,
        "charts" => print_charts(ctx)?,
        other => {
            warn!(command = other, "unknown shell command");
            println!("unknown command '{other}'; type `help`");
        }
    }
    Ok(ShellFlow::Continue)
}

fn require_id(rest: &str) -> anyhow::Result<&str> {
    if rest.is_empty() {
        bail!("missing task id");
    }
    Ok(rest)
}

fn print_current_view(ctx: &CommandEnv<'_>) -> anyhow::Result<()> {
    let state = ctx.dashboard.view_state();
    ctx.renderer.print_view(state.derived_view(), state.criteria())
}

fn print_charts(ctx: &CommandEnv<'_>) -> anyhow::Result<()> {
    let state = ctx.dashboard.view_state();
    let histogram = due_histogram(state.tasks(), state.today());
    let breakdown = priority_breakdown(state.tasks());
    ctx.renderer.print_charts(&histogram, &breakdown)
}

fn authenticate(ctx: &mut CommandEnv<'_>) -> anyhow::Result<()> {
    ctx.runtime.block_on(ctx.dashboard.authenticate())?;
    Ok(())
}

/// Authenticates and loads the first snapshot; a failed load is fatal here
/// since there is nothing to show yet.
fn load_dashboard(ctx: &mut CommandEnv<'_>) -> anyhow::Result<()> {
    authenticate(ctx)?;
    if ctx.runtime.block_on(ctx.dashboard.reload())? {
        Ok(())
    } else {
        Err(action_failed("load tasks"))
    }
}

fn action_failed(what: &str) -> anyhow::Error {
    anyhow!("{what} failed")
}

fn normalize_due(raw: &str) -> anyhow::Result<String> {
    parse_due_date(raw)
        .map(|date| date.format("%Y-%m-%d").to_string())
        .ok_or_else(|| anyhow!("invalid due date '{raw}' (expected YYYY-MM-DD)"))
}

fn resolve_password(flag: Option<String>) -> anyhow::Result<String> {
    if let Some(password) = flag {
        return Ok(password);
    }
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("failed reading password from stdin")?;
    let password = line.trim_end_matches(['\r', '\n']).to_string();
    if password.is_empty() {
        bail!("password is required (pass --password or pipe it on stdin)");
    }
    Ok(password)
}

fn confirm(prompt: &str) -> anyhow::Result<bool> {
    let mut lines = io::stdin().lock().lines();
    ask_yes_no(prompt, &mut lines)
}

/// End of input counts as "no".
fn ask_yes_no(prompt: &str, input: &mut InputLines<'_>) -> anyhow::Result<bool> {
    print!("{prompt} [y/N] ");
    io::stdout().flush()?;
    let Some(answer) = input.next() else {
        println!();
        return Ok(false);
    };
    let answer = answer.context("failed reading confirmation")?;
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}
