// Entry point and high-level CLI flow.
//
// Two ways to run the reports:
// - `report` loads the export once, applies the filters given on the command
//   line and writes one report.
// - `interactive` keeps the loaded export in a session and lets the user
//   change filters and views from a menu, recomputing everything from the
//   untouched dataset on each generation.
mod error;
mod filter;
mod loader;
mod output;
mod reasons;
mod reports;
mod types;
mod util;

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use filter::Filter;
use loader::Dataset;
use reasons::AltPolicy;
use reports::ReportView;
use std::io::{self, Write};
use std::path::PathBuf;
use tracing::{info, warn};
use types::GroupKey;

const DEFAULT_FILE: &str = "EXPORT_20250604_114410.csv";

#[derive(Parser)]
#[command(name = "descontos-report")]
#[command(about = "Discount and adjustment instruction reports by reason, branch and month", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate one report and exit
    Report {
        #[command(flatten)]
        source: SourceArgs,
        #[command(flatten)]
        filters: FilterArgs,
        #[arg(long, value_enum, default_value_t = ReportView::Discount)]
        view: ReportView,
    },
    /// Load the export once and explore it from a menu
    Interactive {
        #[command(flatten)]
        source: SourceArgs,
    },
}

#[derive(Args)]
struct SourceArgs {
    /// CSV export of the instructions spreadsheet
    #[arg(long, env = "DESCONTOS_FILE")]
    file: Option<PathBuf>,
    #[arg(long, default_value_t = ',')]
    delimiter: char,
    #[arg(long, value_enum, default_value_t = AltPolicy::DualCount)]
    alt_policy: AltPolicy,
    #[arg(long, env = "DESCONTOS_OUT_DIR", default_value = "reports")]
    out_dir: PathBuf,
    #[arg(long, default_value_t = 10)]
    preview_rows: usize,
    /// Dimension of the ranking table
    #[arg(long, value_enum, default_value_t = GroupKey::User)]
    rank_by: GroupKey,
}

#[derive(Args)]
struct FilterArgs {
    #[arg(long = "branch", value_delimiter = ',')]
    branches: Vec<String>,
    #[arg(long = "year", value_delimiter = ',')]
    years: Vec<i32>,
    #[arg(long = "month", value_delimiter = ',', value_parser = clap::value_parser!(u32).range(1..=12))]
    months: Vec<u32>,
    #[arg(long = "status", value_delimiter = ',')]
    statuses: Vec<String>,
    #[arg(long = "reason", value_delimiter = ',')]
    reasons: Vec<String>,
    #[arg(long = "group", value_delimiter = ',')]
    groups: Vec<String>,
    #[arg(long = "situation", value_delimiter = ',')]
    situations: Vec<String>,
}

impl From<FilterArgs> for Filter {
    fn from(a: FilterArgs) -> Self {
        Filter {
            branches: a.branches,
            years: a.years,
            months: a.months,
            statuses: a.statuses,
            reasons: a.reasons,
            groups: a.groups,
            situations: a.situations,
        }
    }
}

struct Session {
    dataset: Dataset,
    filter: Filter,
    view: ReportView,
    alt_policy: AltPolicy,
    out_dir: PathBuf,
    preview_rows: usize,
    rank_by: GroupKey,
}

fn load_dataset(source: &SourceArgs) -> anyhow::Result<Dataset> {
    let path = match &source.file {
        Some(p) => p.clone(),
        None => {
            warn!("no file given, using default export {}", DEFAULT_FILE);
            PathBuf::from(DEFAULT_FILE)
        }
    };
    if !source.delimiter.is_ascii() {
        anyhow::bail!("delimiter must be a single ASCII character");
    }
    let dataset = loader::load_and_clean(&path, source.delimiter as u8)
        .with_context(|| format!("failed to load {}", path.display()))?;
    let report = &dataset.report;
    println!(
        "Processando planilha... ({} linhas lidas, {} carregadas)",
        util::format_int(report.total_rows),
        util::format_int(report.loaded_rows)
    );
    if report.parse_errors > 0 {
        println!(
            "Aviso: {} linhas ignoradas por erro de leitura ou motivo vazio.",
            util::format_int(report.parse_errors)
        );
    }
    if report.undated_rows > 0 {
        println!(
            "Aviso: {} linhas sem data válida ficam fora das visões mensais.",
            util::format_int(report.undated_rows)
        );
    }
    if !report.missing_optional.is_empty() {
        let names: Vec<&str> = report.missing_optional.iter().map(|c| c.header()).collect();
        println!("Colunas opcionais ausentes: {}", names.join(", "));
    }
    println!();
    Ok(dataset)
}

/// Run one full pass: filter, aggregate, print previews, write files.
fn generate(session: &Session) -> anyhow::Result<()> {
    let dataset = &session.dataset;
    dataset.require(&session.filter.required_columns())?;
    dataset.require(&session.view.required_columns())?;

    let filtered = filter::filter(&dataset.records, &session.filter);
    let rank_by = match session.rank_by.column() {
        Some(c) if !dataset.has_column(c) => {
            warn!(column = c.header(), "ranking skipped, column absent");
            None
        }
        _ => Some(session.rank_by),
    };
    let dash = reports::build_dashboard(&filtered, session.view, session.alt_policy, rank_by);
    let field = dash.field;
    let rows = session.preview_rows;

    std::fs::create_dir_all(&session.out_dir)
        .with_context(|| format!("cannot create {}", session.out_dir.display()))?;
    let out = |name: &str| session.out_dir.join(name);

    println!("Dashboard Interativo - {}", session.view.title());
    let criteria = session.filter.describe();
    if !criteria.is_empty() {
        println!("Filtros: {}", criteria.join("; "));
    }
    println!(
        "{} de {} solicitações no escopo (ALT: {}, valor: {})",
        util::format_int(dash.records_in_scope),
        util::format_int(filtered.len()),
        session.alt_policy,
        field.map(|f| f.label()).unwrap_or("contagem")
    );

    let kpis = reports::kpi_rows(&dash.kpis);
    output::write_csv(&out("kpis.csv"), &kpis)?;
    output::preview_table("Indicadores", None, &kpis, kpis.len());

    let by_branch = reports::group_rows(&dash.by_branch, field);
    output::write_csv(&out("by_branch.csv"), &by_branch)?;
    output::preview_table(
        &format!("Total por Filial ({})", GroupKey::Branch.label()),
        None,
        &by_branch,
        rows,
    );

    let monthly = reports::monthly_rows(&dash.monthly, field);
    output::write_csv(&out("monthly.csv"), &monthly)?;
    output::preview_table("Evolução Mensal", Some("Média Móvel 3 meses"), &monthly, monthly.len());

    let by_level1 = reports::group_rows(&dash.by_level1, field);
    output::write_csv(&out("by_level1.csv"), &by_level1)?;
    output::preview_table("Distribuição por Nível 1", None, &by_level1, rows);

    let by_levels = reports::group_rows(&dash.by_levels, field);
    output::write_csv(&out("by_levels.csv"), &by_levels)?;
    output::preview_table("Tabela por Nível 1 + Nível 2", None, &by_levels, rows);

    if let Some((key, entries)) = &dash.ranking {
        let ranking = reports::rank_rows(entries, field);
        output::write_csv(&out("ranking.csv"), &ranking)?;
        output::preview_table(&format!("Ranking por {}", key.label()), None, &ranking, rows);
    } else {
        output::remove_stale(&out("ranking.csv"))?;
    }

    if let Some(pivot) = &dash.pivot {
        output::write_pivot_csv(&out("pivot.csv"), pivot)?;
        output::preview_pivot("Solicitações por Filial e Motivo Agrupado", pivot, rows);
    } else {
        output::remove_stale(&out("pivot.csv"))?;
    }

    let summary = reports::generate_summary(
        &dataset.records,
        &filtered,
        &session.filter,
        session.alt_policy,
        &dash,
    );
    output::write_json(&out("summary.json"), &summary)?;
    info!(out_dir = %session.out_dir.display(), "report files written");
    println!("(Tabelas completas exportadas para {})\n", session.out_dir.display());
    Ok(())
}

/// Read a single line of input after printing `prompt`. `None` on end of
/// input.
fn read_line(prompt: &str) -> Option<String> {
    print!("{prompt}");
    let _ = io::stdout().flush();
    let mut buf = String::new();
    match io::stdin().read_line(&mut buf) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(buf.trim().to_string()),
    }
}

fn run_interactive(mut session: Session) {
    loop {
        let criteria = session.filter.describe();
        let criteria = if criteria.is_empty() {
            "nenhum".to_string()
        } else {
            criteria.join("; ")
        };
        println!("Visão atual: {} | Filtros: {}", session.view, criteria);
        println!("[1] Definir filtros");
        println!("[2] Limpar filtros");
        println!("[3] Escolher visão");
        println!("[4] Gerar relatório");
        println!("[0] Sair\n");
        let Some(choice) = read_line("Escolha: ") else {
            break;
        };
        match choice.as_str() {
            "1" => {
                println!("Formato: branch=A,B; year=2024; month=1,2; status=..; reason=DEC; group=Cancelamento; situation=..");
                match Filter::parse_assignments(&read_line("Filtros: ").unwrap_or_default()) {
                    Ok(f) => session.filter = f,
                    Err(e) => println!("Filtro inválido: {}\n", e),
                }
            }
            "2" => session.filter = Filter::default(),
            "3" => {
                let names: Vec<String> = ReportView::value_variants().iter().map(|v| v.to_string()).collect();
                println!("Visões: {}", names.join(", "));
                match ReportView::from_str(&read_line("Visão: ").unwrap_or_default(), true) {
                    Ok(v) => session.view = v,
                    Err(e) => println!("Visão inválida: {}\n", e),
                }
            }
            "4" => {
                println!();
                if let Err(e) = generate(&session) {
                    eprintln!("Erro: {:#}\n", e);
                }
            }
            "0" => {
                println!("Encerrando.");
                break;
            }
            _ => println!("Opção inválida.\n"),
        }
    }
}

fn session_from(source: &SourceArgs, dataset: Dataset, filter: Filter, view: ReportView) -> Session {
    Session {
        dataset,
        filter,
        view,
        alt_policy: source.alt_policy,
        out_dir: source.out_dir.clone(),
        preview_rows: source.preview_rows,
        rank_by: source.rank_by,
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Report { source, filters, view } => {
            let dataset = load_dataset(&source)?;
            let session = session_from(&source, dataset, filters.into(), view);
            generate(&session)?;
        }
        Commands::Interactive { source } => {
            let dataset = load_dataset(&source)?;
            let session = session_from(&source, dataset, Filter::default(), ReportView::default());
            run_interactive(session);
        }
    }
    Ok(())
}
