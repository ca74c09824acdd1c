//! CLI command implementations.
//!
//! Provides subcommand handlers for:
//! - `snowdash login` / `logout` / `status`: session management
//! - `snowdash queries` / `stop <id>`: the Queries screen
//! - `snowdash usage`: the Usage screen
//! - `snowdash open <path>`: navigate through the route guard
//! - `snowdash config show|init|set|reset`: configuration management
//! - `snowdash log`: tail of the activity log

use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};
use colored::{ColoredString, Colorize};
use serde_json::json;

use crate::app::Shell;
use crate::config;
use crate::guard::{RenderDecision, Route};
use crate::views::FetchOutcome;
use crate::views::login::{LoginForm, LoginResult, LoginView};
use crate::views::queries::{INTERVAL_CHANGED_NOTICE, Interval, Listing, QueriesView, Tone};
use crate::views::usage::{DayChart, NO_USAGE_MESSAGE, UsageListing, UsageView};

/// Output format for data commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
}

impl OutputFormat {
    pub fn from_str_opt(s: Option<&str>) -> Self {
        match s {
            Some("json") => Self::Json,
            _ => Self::Table,
        }
    }
}

fn load_shell() -> Shell {
    Shell::from_config(config::load())
}

/// Navigate to `route`, failing with the login banner if the guard redirects.
fn enter(shell: &Shell, route: Route) -> Result<()> {
    match shell.navigate(route.path()) {
        RenderDecision::Allow(_) => Ok(()),
        RenderDecision::RedirectTo {
            target: Route::Login,
            from,
        } => not_signed_in(shell, &LoginView::new(from)),
        other => anyhow::bail!("cannot open {}: {}", route, other),
    }
}

/// Render the login screen as a CLI error: its banner, then how to sign in
/// and come back.
fn not_signed_in(shell: &Shell, login: &LoginView) -> Result<()> {
    if let Some(message) = login.banner(shell.session()) {
        println!("{}", message.yellow());
    }
    anyhow::bail!("not signed in; run `{}` first", login_hint(login))
}

fn login_hint(login: &LoginView) -> String {
    let mut hint = "snowdash login --username <user> --account <account>".to_string();
    if let Some(route) = login.from() {
        hint.push_str(&format!(" --return-to {route}"));
    }
    hint
}

/// Turn a controller outcome on `route` into a CLI result.
fn check_outcome(shell: &Shell, route: Route, outcome: FetchOutcome) -> Result<()> {
    match outcome {
        FetchOutcome::RedirectToLogin => not_signed_in(shell, &LoginView::new(Some(route))),
        FetchOutcome::Busy => anyhow::bail!("a request is already in progress"),
        _ => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// snowdash login | logout | status
// ---------------------------------------------------------------------------

/// Sign in and report where the dashboard goes next.
pub fn run_login(
    username: &str,
    account: &str,
    password: Option<String>,
    return_to: Option<&str>,
) -> Result<()> {
    let mut shell = load_shell();

    if let RenderDecision::RedirectTo { target, .. } = shell.navigate(Route::Login.path()) {
        println!(
            "{} Already signed in as {}. Dashboard: {}",
            "✓".green().bold(),
            shell.session().current_user().unwrap_or("?").bold(),
            target
        );
        return Ok(());
    }

    let password = match password.or_else(|| std::env::var("SNOWDASH_PASSWORD").ok()) {
        Some(p) => p,
        None => prompt("Password: ")?,
    };
    let form = LoginForm {
        username: username.to_string(),
        password,
        account: account.to_string(),
    };

    let view = LoginView::new(return_to.and_then(Route::parse));
    let landing = shell.landing();
    let (client, session) = shell.parts();
    match view.submit(client, session, &form, landing)? {
        LoginResult::SignedIn(next) => {
            println!(
                "{} Signed in as {}. Dashboard: {}",
                "✓".green().bold(),
                shell.session().current_user().unwrap_or(username).bold(),
                next
            );
            Ok(())
        }
        LoginResult::Rejected(message) => {
            println!("{}", message.red());
            anyhow::bail!("login failed")
        }
    }
}

fn prompt(label: &str) -> Result<String> {
    print!("{label}");
    io::stdout().flush().context("failed to flush stdout")?;
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("failed to read from stdin")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

/// Sign out locally.
pub fn run_logout() -> Result<()> {
    let mut shell = load_shell();
    shell.logout()?;
    println!("{} Signed out", "✓".green().bold());
    Ok(())
}

/// Show the session and what each route would do.
pub fn run_status() -> Result<()> {
    let shell = load_shell();
    let session = shell.session();

    println!("{}", "Snowflake Helper".bold().cyan());
    println!("{}", "=".repeat(50));
    print_status_item(
        "Session",
        session.is_authenticated(),
        if session.is_authenticated() {
            "signed in"
        } else {
            "signed out"
        },
    );
    print_status_item(
        "User",
        session.current_user().is_some(),
        session.current_user().unwrap_or("-"),
    );
    print_status_item(
        "Token",
        session.token().is_some(),
        if session.token().is_some() {
            "cached"
        } else {
            "none"
        },
    );
    print_status_item("Backend", true, shell.client().base_url());
    if let Some(message) = session.message() {
        println!("  {}", message.yellow());
    }

    println!();
    println!("{}", "Routes".bold().cyan());
    for route in [Route::Login, Route::Queries, Route::Usage] {
        println!("  {:<10} {}", route.path(), shell.navigate(route.path()));
    }

    if session.is_authenticated() {
        let nav: Vec<&str> = Route::nav_entries()
            .iter()
            .map(|r| r.title())
            .chain(std::iter::once("Logout"))
            .collect();
        println!();
        println!("  {} {}", "Nav:".dimmed(), nav.join(" | "));
    }

    Ok(())
}

fn print_status_item(name: &str, ok: bool, detail: &str) {
    let status = if ok {
        "✓".green().bold()
    } else {
        "✗".red().bold()
    };
    println!("  {} {:<10} {}", status, name, detail.dimmed());
}

/// Navigate to an arbitrary path and render it.
pub fn run_open(path: &str) -> Result<()> {
    let shell = load_shell();
    match shell.navigate(path) {
        RenderDecision::Allow(Route::Queries) => run_queries(None, OutputFormat::Table),
        RenderDecision::Allow(Route::Usage) => run_usage(None, None, OutputFormat::Table),
        RenderDecision::Allow(Route::Login) => {
            let login = LoginView::default();
            if let Some(message) = login.banner(shell.session()) {
                println!("{}", message.yellow());
            }
            println!("Sign in with `{}`", login_hint(&login));
            Ok(())
        }
        RenderDecision::RedirectTo {
            target: Route::Login,
            from,
        } => not_signed_in(&shell, &LoginView::new(from)),
        RenderDecision::RedirectTo { target, .. } => run_open(target.path()),
        RenderDecision::NotFound(path) => anyhow::bail!("no such page: {path}"),
    }
}

// ---------------------------------------------------------------------------
// snowdash queries | stop
// ---------------------------------------------------------------------------

fn interval_arg(minutes: Option<u32>) -> Result<Option<Interval>> {
    match minutes {
        None => Ok(None),
        Some(m) => Interval::from_minutes(m).map(Some).with_context(|| {
            let valid: Vec<String> = Interval::all().map(|i| i.minutes().to_string()).collect();
            format!("unsupported interval {m}; choose one of {}", valid.join(", "))
        }),
    }
}

/// List recent queries.
pub fn run_queries(minutes: Option<u32>, format: OutputFormat) -> Result<()> {
    let mut shell = load_shell();
    enter(&shell, Route::Queries)?;

    let mut view = shell.queries_view();
    if let Some(interval) = interval_arg(minutes)? {
        view.select_interval(interval);
    }
    let (client, session) = shell.parts();
    let outcome = view.refresh(client, session);
    check_outcome(&shell, Route::Queries, outcome)?;

    match format {
        OutputFormat::Json => print_queries_json(&view)?,
        OutputFormat::Table => print_queries_table(&view, &shell),
    }
    Ok(())
}

/// Stop a query after checking the user may do so.
pub fn run_stop(id: &str, minutes: Option<u32>) -> Result<()> {
    let mut shell = load_shell();
    enter(&shell, Route::Queries)?;

    let mut view = shell.queries_view();
    if let Some(interval) = interval_arg(minutes)? {
        view.select_interval(interval);
    }
    let (client, session) = shell.parts();
    let outcome = view.refresh(client, session);
    check_outcome(&shell, Route::Queries, outcome)?;
    if let Some(message) = view.state().error() {
        anyhow::bail!("{message}");
    }

    let Some(query) = view.find(id) else {
        anyhow::bail!(
            "query {id} is not in the last {}",
            view.selected_interval().label()
        );
    };
    if !view.can_stop(query, shell.session()) {
        anyhow::bail!(
            "query {id} cannot be stopped by {} (status: {})",
            shell.session().current_user().unwrap_or("?"),
            query.status_description()
        );
    }

    let (client, session) = shell.parts();
    let outcome = view.stop(client, session, id);
    check_outcome(&shell, Route::Queries, outcome)?;
    if let Some(message) = view.state().error() {
        anyhow::bail!("{message}");
    }

    if let Some(query) = view.find(id) {
        println!(
            "{} {} → {}",
            "✓".green().bold(),
            query.id.bold(),
            paint(&query.status_description(), query.status.tone())
        );
    }
    Ok(())
}

fn print_queries_table(view: &QueriesView, shell: &Shell) {
    println!(
        "{}",
        format!("Queries: past {}", view.selected_interval()).bold().cyan()
    );
    println!("{}", "=".repeat(110));

    match view.listing() {
        Listing::Loading => println!("  Loading..."),
        Listing::Error(message) => println!("  {}", message.red()),
        Listing::Empty(message) => println!("  {}", message.yellow()),
        Listing::IntervalChanged => println!("  {}", INTERVAL_CHANGED_NOTICE.yellow()),
        Listing::Rows(rows) => {
            println!(
                "  {:<20} {:<40} {:<12} {:<22} {:<22} {:>9}",
                "Status", "SQL Text", "User", "Start Time", "End Time", "Elapsed"
            );
            println!("  {}", "-".repeat(130));
            for query in rows {
                let status = format!("{:<20}", truncate(query.status.label(), 20));
                let stop = if view.can_stop(query, shell.session()) {
                    format!(" {}", "[stop]".red())
                } else {
                    String::new()
                };
                println!(
                    "  {} {:<40} {:<12} {:<22} {:<22} {:>9}{}",
                    paint(&status, query.status.tone()),
                    truncate(&single_line(&query.sql_text), 40),
                    truncate(&query.username, 12),
                    query.start_time,
                    query.end_time,
                    query.elapsed_time,
                    stop
                );
                if matches!(query.status.tone(), Tone::Red) && query.error_message.is_some() {
                    println!("    {}", query.status_description().dimmed());
                }
                println!("    {}", query.id.dimmed());
            }
        }
    }
}

fn print_queries_json(view: &QueriesView) -> Result<()> {
    let value = match view.listing() {
        Listing::Error(message) => json!({ "error": message }),
        _ => json!({
            "interval_minutes": view.queried_interval().minutes(),
            "queries": view
                .state()
                .ready()
                .map(|rows| rows.iter().map(|q| q.to_json()).collect::<Vec<_>>())
                .unwrap_or_default(),
        }),
    };
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

// ---------------------------------------------------------------------------
// snowdash usage
// ---------------------------------------------------------------------------

/// Show credit usage for a month, and a day's chart when `day` is given.
pub fn run_usage(month: Option<&str>, day: Option<&str>, format: OutputFormat) -> Result<()> {
    let mut shell = load_shell();
    enter(&shell, Route::Usage)?;

    let mut view = shell.usage_view();
    let (client, session) = shell.parts();
    let outcome = view.refresh(client, session);
    check_outcome(&shell, Route::Usage, outcome)?;

    if let Some(month) = month
        && !view.select_month(month)
    {
        anyhow::bail!("no usage data for month '{month}'");
    }
    if let Some(day) = day
        && !view.select_day(day)
    {
        anyhow::bail!("day '{day}' has no usage to chart");
    }

    match format {
        OutputFormat::Json => print_usage_json(&view)?,
        OutputFormat::Table => print_usage_table(&view),
    }
    Ok(())
}

fn print_usage_table(view: &UsageView) {
    println!("{}", "Usage".bold().cyan());
    println!("{}", "=".repeat(50));

    match view.listing() {
        UsageListing::Loading => println!("  Loading..."),
        UsageListing::Error(message) => println!("  {}", message.red()),
        UsageListing::Empty => println!("  {}", NO_USAGE_MESSAGE.yellow()),
        UsageListing::Days(month) => {
            println!(
                "  {} {}   {}",
                "Month:".bold(),
                month.name,
                format!("(available: {})", view.months().join(" | ")).dimmed()
            );
            println!("  {} {:.2}", "Total credits:".bold(), month.total_credits());
            println!();
            let selected = view.selected_day().map(|d| d.date.as_str());
            for day in &month.days {
                let marker = if Some(day.date.as_str()) == selected {
                    "▶"
                } else {
                    " "
                };
                let hints = match (day.is_selectable(), day.has_breakdown()) {
                    (true, true) => "chart, users",
                    (true, false) => "chart",
                    _ => "",
                };
                println!(
                    "  {} {:<16} {:>10} {}",
                    marker,
                    format!("{} {}", month.prefix(), day.date),
                    format!("{}", day.credits),
                    hints.dimmed()
                );
            }
            if let Some(chart) = view.chart() {
                println!();
                print_chart(&chart);
            }
        }
    }
}

/// Horizontal bar chart, one row per point, plus the per-user breakdown.
fn print_chart(chart: &DayChart<'_>) {
    const WIDTH: f64 = 40.0;

    println!("{}", chart.title.bold().cyan());
    let max = chart.points.iter().cloned().fold(0.0_f64, f64::max);
    for (label, value) in chart.labels.iter().zip(chart.points) {
        let len = if max > 0.0 {
            ((value / max) * WIDTH).round() as usize
        } else {
            0
        };
        println!("  {:>4} │{} {}", label, "█".repeat(len).blue(), value);
    }

    if let Some(shares) = chart.shares {
        println!();
        println!("{}", "Usage Time by User".bold().cyan());
        for share in shares {
            println!("  {:<16} {:>6.1}%  {}", share.user, share.share, share.time.dimmed());
        }
    }
}

fn print_usage_json(view: &UsageView) -> Result<()> {
    let value = match view.listing() {
        UsageListing::Error(message) => json!({ "error": message }),
        _ => {
            let month = view.selected_month();
            json!({
                "months": view.months(),
                "selected_month": month.map(|m| m.name.clone()),
                "days": month.map(|m| m.days.iter().map(|d| json!({
                    "date": d.date,
                    "credits": d.credits,
                    "has_breakdown": d.has_breakdown(),
                })).collect::<Vec<_>>()).unwrap_or_default(),
                "chart": view.chart().map(|c| json!({
                    "title": c.title,
                    "labels": c.labels,
                    "points": c.points,
                    "users": c.shares.map(|shares| shares.iter().map(|s| json!({
                        "user": s.user,
                        "share": s.share,
                        "time": s.time,
                    })).collect::<Vec<_>>()),
                })),
            })
        }
    };
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

// ---------------------------------------------------------------------------
// snowdash config show | init | set | reset
// ---------------------------------------------------------------------------

/// Show the effective (merged) configuration as TOML.
pub fn run_config_show() -> Result<()> {
    let toml_str = config::show_effective_config()?;
    println!("{}", "Effective snowdash Configuration".bold().cyan());
    println!("{}", "=".repeat(50));
    println!();
    println!("{toml_str}");

    let global_exists = config::global_config_file()
        .map(|p| p.exists())
        .unwrap_or(false);
    let project_exists = config::project_config_file()
        .map(|p| p.exists())
        .unwrap_or(false);
    println!("{}", "Sources (highest priority last):".dimmed());
    println!("  {} built-in defaults", "·".dimmed());
    print_source("~/.snowdash/config.toml", global_exists);
    print_source(".snowdash.toml", project_exists);
    println!(
        "  {} {}",
        "·".dimmed(),
        "SNOWDASH_* environment variables".dimmed()
    );

    Ok(())
}

fn print_source(name: &str, exists: bool) {
    if exists {
        println!("  {} {}", "✓".green(), name.dimmed());
    } else {
        println!("  {} {}", "·".dimmed(), format!("{name} (not found)").dimmed());
    }
}

/// Initialize a default config file at `~/.snowdash/config.toml`.
pub fn run_config_init(force: bool) -> Result<()> {
    let path = config::init_config(force)?;
    println!("{} Config written to {}", "✓".green().bold(), path.display());
    Ok(())
}

/// Set a single configuration value in the global config file.
pub fn run_config_set(key: &str, value: &str) -> Result<()> {
    config::set_config_value(key, value)?;
    println!("{} Set {} = {}", "✓".green().bold(), key.bold(), value);
    Ok(())
}

/// Reset configuration to defaults.
pub fn run_config_reset() -> Result<()> {
    let path = config::reset_config()?;
    println!(
        "{} Config reset to defaults at {}",
        "✓".green().bold(),
        path.display()
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// snowdash log
// ---------------------------------------------------------------------------

/// Print the last `lines` activity log entries.
pub fn run_log(lines: usize) -> Result<()> {
    let shell = load_shell();
    let log = shell.client().log();
    let Some(path) = log.path() else {
        println!("{}", "Activity logging is disabled.".yellow());
        return Ok(());
    };

    let entries = log.tail(lines);
    if entries.is_empty() {
        println!("{}", format!("No activity in {} yet.", path.display()).yellow());
        return Ok(());
    }
    for entry in entries {
        println!("{entry}");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Formatting helpers
// ---------------------------------------------------------------------------

/// Truncate a string to `max_len` characters, appending "…" if truncated.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(1)).collect();
        format!("{kept}…")
    }
}

/// Collapse whitespace runs (including newlines) to single spaces.
fn single_line(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn paint(text: &str, tone: Tone) -> ColoredString {
    match tone {
        Tone::Red => text.red(),
        Tone::Blue => text.blue(),
        Tone::Green => text.green(),
        Tone::Neutral => text.normal(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
