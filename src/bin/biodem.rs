use anyhow::{Context, Result, anyhow, bail};
use biodem_rs::aggregate::{ScatterSelection, scatter_points, timeline_rows};
use biodem_rs::download::{DownloadOptions, download};
use biodem_rs::models::{CountryFacetQuery, Indicator, YearFacetQuery, YearWindow};
use biodem_rs::viz::{self, ScatterConfig, TimelineConfig};
use biodem_rs::{Client, StudyConfig, countries, storage};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "biodem",
    version,
    about = "Relate democracy indicators to biodiversity record counts"
)]
struct Cli {
    /// Base URL of the occurrence API.
    #[arg(long, global = true)]
    api_url: Option<String>,
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Download per-country, per-year record counts into a CSV.
    Download(DownloadArgs),
    /// Render the country scatter (medians over a year window).
    Scatter(ScatterArgs),
    /// Render the time series of one country.
    Timeline(TimelineArgs),
}

#[derive(Args, Debug)]
struct WindowArgs {
    /// First year (inclusive).
    #[arg(long)]
    from: Option<i32>,
    /// Last year (inclusive).
    #[arg(long)]
    to: Option<i32>,
}

impl WindowArgs {
    /// Requested years, clipped to the study window.
    fn window(&self, study: YearWindow) -> Result<YearWindow> {
        let w = YearWindow::new(
            self.from.unwrap_or(study.start),
            self.to.unwrap_or(study.end),
        );
        if w.start > w.end {
            bail!("invalid year window {}: --from is after --to", w);
        }
        let clipped = w.intersect(&study);
        if clipped.is_empty() {
            bail!("year window {} lies outside the study period {}", w, study);
        }
        Ok(clipped)
    }
}

#[derive(Args, Debug)]
struct DownloadArgs {
    /// Taxon filters, e.g. `all mammalia aves`. `all` means no taxon filter.
    filters: Vec<String>,
    /// Also download records published by each country itself.
    #[arg(long, default_value_t = false)]
    add_domestic: bool,
    /// Alpha-3 codes separated by comma or semicolon; defaults to every known country.
    #[arg(long)]
    countries: Option<String>,
    /// Output CSV path.
    #[arg(long)]
    out: PathBuf,
    #[command(flatten)]
    window: WindowArgs,
}

#[derive(Args, Debug)]
struct ChartArgs {
    /// Output image (.svg or .png).
    #[arg(long)]
    out: PathBuf,
    #[arg(long, default_value_t = 1000)]
    width: u32,
    #[arg(long, default_value_t = 650)]
    height: u32,
    /// Locale for number labels (en, de, fr, ...).
    #[arg(long, default_value = "en")]
    locale: String,
}

#[derive(Args, Debug)]
struct ScatterArgs {
    /// Democracy time series CSV.
    #[arg(long)]
    democracy: PathBuf,
    /// Country metadata CSV (code, area, region).
    #[arg(long)]
    countries_meta: PathBuf,
    /// Indicator metadata CSV, used for axis labels.
    #[arg(long)]
    indicators_meta: Option<PathBuf>,
    /// Indicator on the X axis.
    #[arg(long, default_value = "v2x_polyarchy")]
    x: Indicator,
    /// Indicator on the Y axis.
    #[arg(long, default_value = "v2x_rule")]
    y: Indicator,
    /// Size marks by records per km².
    #[arg(long, default_value_t = false)]
    normalize_by_area: bool,
    /// Draw the tooltip of this country.
    #[arg(long)]
    hover: Option<String>,
    #[command(flatten)]
    window: WindowArgs,
    #[command(flatten)]
    chart: ChartArgs,
}

#[derive(Args, Debug)]
struct TimelineArgs {
    /// Democracy time series CSV.
    #[arg(long)]
    democracy: PathBuf,
    /// Indicator metadata CSV, used for the axis label.
    #[arg(long)]
    indicators_meta: Option<PathBuf>,
    /// Alpha-3 country code.
    #[arg(long, default_value = "USA")]
    country: String,
    /// Indicator drawn as a line.
    #[arg(long, default_value = "v2x_polyarchy")]
    indicator: Indicator,
    /// Only records published by the country itself.
    #[arg(long, default_value_t = false)]
    only_domestic: bool,
    /// Only records with images.
    #[arg(long, default_value_t = false)]
    only_images: bool,
    /// Restrict to a taxon (first name suggestion is used).
    #[arg(long)]
    taxon: Option<String>,
    #[command(flatten)]
    window: WindowArgs,
    #[command(flatten)]
    chart: ChartArgs,
}

fn parse_list(s: &str) -> Vec<String> {
    s.split([',', ';'])
        .map(|x| x.trim().to_ascii_uppercase())
        .filter(|x| !x.is_empty())
        .collect()
}

fn main() {
    env_logger::init();
    if let Err(e) = run(Cli::parse()) {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let client = match &cli.api_url {
        Some(url) => Client::with_base_url(url.as_str()),
        None => Client::default(),
    };
    let config = StudyConfig::default();
    match cli.cmd {
        Command::Download(args) => cmd_download(&client, &config, args),
        Command::Scatter(args) => cmd_scatter(&client, &config, args),
        Command::Timeline(args) => cmd_timeline(&client, &config, args),
    }
}

fn cmd_download(client: &Client, config: &StudyConfig, args: DownloadArgs) -> Result<()> {
    let countries = match &args.countries {
        Some(list) => parse_list(list),
        None => countries::all_alpha3().map(str::to_string).collect(),
    };
    let window = match (args.window.from, args.window.to) {
        (None, None) => None,
        _ => Some(args.window.window(config.study_window)?),
    };
    let opts = DownloadOptions {
        countries,
        add_domestic: args.add_domestic,
        window,
    };
    let table = download(client, &args.filters, &opts)?;
    if table.is_empty() {
        eprintln!("No records matched; writing header only");
    }
    storage::save_wide_csv(&table, &args.out)?;
    eprintln!(
        "Saved {} rows ({}) to {}",
        table.rows.len(),
        table.columns.join(", "),
        args.out.display()
    );
    Ok(())
}

fn cmd_scatter(client: &Client, config: &StudyConfig, args: ScatterArgs) -> Result<()> {
    let data = storage::load_datasets(
        &args.democracy,
        &args.countries_meta,
        args.indicators_meta.as_ref(),
    )?;
    let window = args.window.window(config.study_window)?;
    let facet = client
        .query_country_facet(&CountryFacetQuery::from(window))
        .into_result()
        .context("fetch records per country")?;
    let selection = ScatterSelection {
        x: args.x,
        y: args.y,
        window,
        normalize_by_area: args.normalize_by_area,
    };
    let points = scatter_points(&data, &facet, &selection, &config.overrides);
    if points.is_empty() {
        eprintln!("No country has complete data for {} and {} in {}", args.x, args.y, window);
    }

    let cfg = ScatterConfig {
        width: args.chart.width,
        height: args.chart.height,
        title: format!("Records by country, {window}"),
        x_desc: data.indicator_label(args.x),
        y_desc: data.indicator_label(args.y),
        x_bounds: to_bounds(args.x.value_range()),
        y_bounds: to_bounds(args.y.value_range()),
        hover: args.hover.map(|h| h.to_ascii_uppercase()),
        legend: viz::regime_legend(),
        ..Default::default()
    };
    let acc = viz::country_accessors(&args.chart.locale);
    viz::plot_scatter(&points, &acc, &cfg, &args.chart.out)?;
    eprintln!(
        "Wrote scatter of {} countries to {}",
        points.len(),
        args.chart.out.display()
    );
    Ok(())
}

fn cmd_timeline(client: &Client, config: &StudyConfig, args: TimelineArgs) -> Result<()> {
    let records = storage::load_democracy(&args.democracy)?;
    let indicators = match &args.indicators_meta {
        Some(p) => storage::load_indicator_metadata(p)?,
        None => Vec::new(),
    };
    let data = storage::Datasets::new(records, indicators, Vec::new());
    let window = args.window.window(config.study_window)?;
    let country = args.country.trim().to_ascii_uppercase();

    let taxon_key = match &args.taxon {
        Some(name) => {
            let hits = client
                .query_taxon_suggestions(name)
                .into_result()
                .with_context(|| format!("look up taxon {name:?}"))?;
            let first = hits
                .into_iter()
                .next()
                .ok_or_else(|| anyhow!("no taxon matches {name:?}"))?;
            eprintln!("Using taxon {} ({})", first.name, first.key);
            Some(first.key)
        }
        None => None,
    };
    let query = YearFacetQuery {
        country: Some(country.clone()),
        only_domestic: args.only_domestic,
        only_with_images: args.only_images,
        taxon_key,
    };
    let facet = client
        .query_year_facet(&query)
        .into_result()
        .with_context(|| format!("fetch records per year for {country}"))?;
    let rows = timeline_rows(&data.democracy, &country, args.indicator, &window, &facet);
    if rows.is_empty() {
        eprintln!("No democracy rows for {country} in {window}");
    }

    let name = countries::country_name(&country).unwrap_or(country.as_str());
    let cfg = TimelineConfig {
        width: args.chart.width,
        height: args.chart.height,
        title: format!("{name}, {window}"),
        indicator_desc: data.indicator_label(args.indicator),
        value_bounds: to_bounds(args.indicator.value_range()),
        locale: args.chart.locale.clone(),
        ..Default::default()
    };
    viz::plot_timeline(&rows, &cfg, &args.chart.out)?;
    eprintln!("Wrote {} years to {}", rows.len(), args.chart.out.display());
    Ok(())
}

fn to_bounds((lo, hi): (f64, f64)) -> (Option<f64>, Option<f64>) {
    (Some(lo), Some(hi))
}
