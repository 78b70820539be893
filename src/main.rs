use std::io::{BufRead, Write};
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use console::{Style, style};
use spellfiles::{QueryReport, Resolver, Settings, TaskOutcome, as_overhead, spell_link};

#[derive(Parser, Debug, Clone)]
#[command(version, about)]
struct Args {
    /// Spell id or exact spell name. Starts an interactive prompt when omitted.
    query: Option<String>,

    /// Maximum number of requests in flight at once.
    #[arg(long)]
    max_in_flight: Option<usize>,

    /// Data version used by the texture lookups.
    #[arg(long)]
    build: Option<String>,

    /// Progress redraw interval in milliseconds.
    #[arg(long)]
    tick_ms: Option<u64>,

    /// Increase log verbosity, repeat for more.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Args {
    fn settings(&self) -> anyhow::Result<Settings> {
        let mut settings = Settings::from_env()?;

        if let Some(max) = self.max_in_flight {
            settings.max_in_flight = max;
        }
        if let Some(build) = &self.build {
            settings.side_build = build.clone();
        }
        if let Some(tick) = self.tick_ms {
            settings.tick = Duration::from_millis(tick);
        }

        settings.validate()?;
        Ok(settings)
    }
}

fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();
    let settings = args.settings()?;

    spellfiles::init_logging(args.verbose)?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let resolver = Resolver::wago(&settings)?;

    match args.query {
        Some(query) => {
            let report = runtime.block_on(resolver.resolve(&query))?;
            Ok(print_report(&report))
        }
        None => {
            interactive(&runtime, &resolver)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn interactive(runtime: &tokio::runtime::Runtime, resolver: &Resolver) -> anyhow::Result<()> {
    print_banner();

    let stdin = std::io::stdin();
    let mut line = String::new();

    loop {
        print!("Enter a SpellID or exact spell name: ");
        std::io::stdout().flush()?;

        line.clear();
        if stdin.lock().read_line(&mut line)? == 0 {
            return Ok(());
        }

        let query = line.trim();
        match query {
            "" => continue,
            "q" | "quit" | "exit" => return Ok(()),
            _ => {}
        }

        match runtime.block_on(resolver.resolve(query)) {
            Ok(report) => {
                print_report(&report);
            }
            Err(err) => eprintln!("{} {err}", style("Error:").red()),
        }
        println!();
    }
}

fn print_banner() {
    const WIDTH: usize = 58;

    let border = style(format!("+{}+", "-".repeat(WIDTH))).cyan();
    let title = format!("spellfiles v{}", env!("CARGO_PKG_VERSION"));

    println!("{border}");
    println!("{}{title:^WIDTH$}{}", style("|").cyan(), style("|").cyan());
    println!("{border}\n");
}

/// Prints the per-spell sections, merged files and failures. Fails the exit
/// code when any spell couldn't be resolved.
fn print_report(report: &QueryReport) -> ExitCode {
    let (query, outcomes, aggregate) = match report {
        QueryReport::NoMatch { query } => {
            println!("{}", style(format!("No spells matching '{query}'")).yellow());
            return ExitCode::SUCCESS;
        }
        QueryReport::Resolved {
            query,
            outcomes,
            aggregate,
        } => (query, outcomes, aggregate),
    };

    let total = outcomes.len() + aggregate.failures.len();
    for (i, outcome) in outcomes.iter().enumerate() {
        println!("{}", style(format!("Result {}/{}:", i + 1, total)).cyan());
        print_outcome(outcome);
        println!();
    }

    for failure in &aggregate.failures {
        println!("{} {failure}", style("Failed:").red());
    }

    if outcomes.len() > 1 {
        println!("{}", style(format!("All files for '{query}':")).cyan());
        print_files("Models", &aggregate.primary);
        print_files("Textures", &aggregate.side);

        if let Some(representative) = &aggregate.representative {
            println!(
                "{} {}",
                style("Link:").yellow(),
                hyperlink(&representative.link(), query)
            );
        }
    }

    if aggregate.failures.is_empty() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn print_outcome(outcome: &TaskOutcome) {
    println!(
        "- ID: {}, Name: {}, Class: {} {}",
        outcome.root,
        outcome.name,
        class_style(&outcome.category).apply_to(&outcome.category),
        as_overhead(outcome.elapsed)
    );

    let models: Vec<_> = outcome.primary.iter().cloned().collect();
    let textures: Vec<_> = outcome.side.iter().cloned().collect();
    print_files("Models", &models);
    print_files("Textures", &textures);

    let link = spell_link(outcome.root, &outcome.name);
    println!("{} {}", style("Link:").yellow(), hyperlink(&link, &outcome.name));
}

fn print_files(kind: &str, files: &[String]) {
    if files.is_empty() {
        println!("{}", style(format!("No {} found", kind.to_lowercase())).yellow());
        return;
    }

    println!("{} ({}):", style(kind).green(), files.len());
    for file in files {
        println!("  {file}");
    }
}

fn class_style(class: &str) -> Style {
    let color = match class {
        "Death Knight" => 160,
        "Demon Hunter" => 128,
        "Druid" => 208,
        "Evoker" => 36,
        "Hunter" => 149,
        "Mage" => 81,
        "Monk" => 48,
        "Paladin" => 218,
        "Priest" => 231,
        "Rogue" => 227,
        "Shaman" => 26,
        "Warlock" => 105,
        "Warrior" => 173,
        _ => return Style::new(),
    };

    Style::new().color256(color)
}

/// OSC 8 terminal hyperlink.
fn hyperlink(url: &str, text: &str) -> String {
    format!("\x1b]8;;{url}\x1b\\{text}\x1b]8;;\x1b\\")
}
