mod colormap;
mod render;

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum, ValueHint};
use glider_hub::views::{deployment_views, parameter_view};
use glider_hub::{
    load_catalog, DirStore, HubConfig, Parameter, RangeBasis, Selection, SelectionRequest,
    Session, TimeOrder, ViewGroup, ViewOutcome, ViewSynthesizer,
};
use rayon::prelude::*;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use crate::render::{render_chart_guard, ChartKind};

const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("GLIDER_HUB_COMMIT"), ")");
const MANIFEST_FILE: &str = "manifest.json";

#[derive(Parser, Debug)]
#[command(
    author,
    version = VERSION,
    about = "Glider deployment view synthesis CLI",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the deployments named by the roster
    Catalog(CatalogArgs),
    /// Synthesize every view group for one selection as JSON
    Views(ViewsArgs),
    /// Write view JSON for every deployment and parameter
    Export(ExportArgs),
    /// Serve selection changes from JSON lines on stdin
    Session(SessionArgs),
    /// Render one selection's views to PNG/SVG
    Render(RenderArgs),
}

#[derive(Args, Debug)]
struct CommonArgs {
    /// JSON config file; flags below override its fields
    #[arg(long, value_hint = ValueHint::FilePath)]
    config: Option<PathBuf>,

    /// Directory holding `<key>_current_tc.csv` / `<key>_ctd_tc.csv`
    #[arg(long, value_hint = ValueHint::DirPath)]
    data_dir: Option<PathBuf>,

    /// Deployment roster CSV
    #[arg(long, value_hint = ValueHint::FilePath)]
    roster: Option<PathBuf>,

    /// Keep every Nth profile row
    #[arg(long)]
    stride: Option<usize>,

    /// Rows the chlorophyll percentile clip is computed from
    #[arg(long, value_enum)]
    range_basis: Option<RangeBasisOpt>,

    /// Handling of timestamps that go backwards
    #[arg(long, value_enum)]
    time_order: Option<TimeOrderOpt>,

    /// Cache loaded deployments for the life of the process
    #[arg(long, action = ArgAction::SetTrue)]
    cache: bool,

    /// Verbose logging
    #[arg(long, action = ArgAction::SetTrue)]
    verbose: bool,
}

#[derive(Args, Debug)]
struct SelectionArgs {
    /// Deployment key (defaults to the catalog default)
    #[arg(short, long)]
    deployment: Option<String>,

    /// Parameter key: t, s, dens or chl
    #[arg(short, long)]
    parameter: Option<String>,
}

#[derive(Args, Debug)]
struct CatalogArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// Print JSON instead of a table
    #[arg(long, action = ArgAction::SetTrue)]
    json: bool,
}

#[derive(Args, Debug)]
struct ViewsArgs {
    #[command(flatten)]
    common: CommonArgs,

    #[command(flatten)]
    selection: SelectionArgs,

    /// Output JSON path (`-` for stdout)
    #[arg(short, long, default_value = "-", value_hint = ValueHint::FilePath)]
    output: PathBuf,

    /// Pretty-print JSON
    #[arg(long, action = ArgAction::SetTrue)]
    pretty: bool,
}

#[derive(Args, Debug)]
struct ExportArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// Output directory; one subdirectory per deployment
    #[arg(short, long, default_value = "views", value_hint = ValueHint::DirPath)]
    output_dir: PathBuf,

    /// Restrict to these deployment keys (comma separated)
    #[arg(long, value_delimiter = ',')]
    deployments: Vec<String>,

    /// Pretty-print JSON
    #[arg(long, action = ArgAction::SetTrue)]
    pretty: bool,
}

#[derive(Args, Debug)]
struct SessionArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// Skip the initial full render for the default selection
    #[arg(long, action = ArgAction::SetTrue)]
    no_initial: bool,
}

#[derive(Args, Debug)]
struct RenderArgs {
    #[command(flatten)]
    common: CommonArgs,

    #[command(flatten)]
    selection: SelectionArgs,

    /// Output directory for `<view>.<ext>` files
    #[arg(short, long, default_value = "plots", value_hint = ValueHint::DirPath)]
    output_dir: PathBuf,

    /// Image format
    #[arg(long, value_enum, default_value_t = FormatOpt::Png)]
    format: FormatOpt,

    /// Image width in pixels
    #[arg(long, default_value_t = 1200)]
    width: u32,

    /// Image height in pixels
    #[arg(long, default_value_t = 900)]
    height: u32,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum RangeBasisOpt {
    Loaded,
    FullResolution,
}

impl From<RangeBasisOpt> for RangeBasis {
    fn from(value: RangeBasisOpt) -> Self {
        match value {
            RangeBasisOpt::Loaded => RangeBasis::Loaded,
            RangeBasisOpt::FullResolution => RangeBasis::FullResolution,
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum TimeOrderOpt {
    Trust,
    Validate,
    Sort,
}

impl From<TimeOrderOpt> for TimeOrder {
    fn from(value: TimeOrderOpt) -> Self {
        match value {
            TimeOrderOpt::Trust => TimeOrder::Trust,
            TimeOrderOpt::Validate => TimeOrder::Validate,
            TimeOrderOpt::Sort => TimeOrder::Sort,
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum FormatOpt {
    Png,
    Svg,
}

impl From<FormatOpt> for ChartKind {
    fn from(value: FormatOpt) -> Self {
        match value {
            FormatOpt::Png => ChartKind::Png,
            FormatOpt::Svg => ChartKind::Svg,
        }
    }
}

impl Command {
    fn common(&self) -> &CommonArgs {
        match self {
            Command::Catalog(args) => &args.common,
            Command::Views(args) => &args.common,
            Command::Export(args) => &args.common,
            Command::Session(args) => &args.common,
            Command::Render(args) => &args.common,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let default_level = if cli.command.common().verbose {
        "debug"
    } else {
        "info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    match cli.command {
        Command::Catalog(args) => handle_catalog(args),
        Command::Views(args) => handle_views(args),
        Command::Export(args) => handle_export(args),
        Command::Session(args) => handle_session(args),
        Command::Render(args) => handle_render(args),
    }
}

impl CommonArgs {
    fn to_config(&self) -> Result<HubConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let text = fs::read_to_string(path)
                    .with_context(|| format!("failed to read config {}", path.display()))?;
                serde_json::from_str(&text)
                    .with_context(|| format!("invalid config {}", path.display()))?
            }
            None => HubConfig::default(),
        };
        if let Some(dir) = &self.data_dir {
            config.data_dir = dir.clone();
            if self.roster.is_none() && self.config.is_none() {
                config.roster = dir.join("glider_deployments.csv");
            }
        }
        if let Some(roster) = &self.roster {
            config.roster = roster.clone();
        }
        if let Some(stride) = self.stride {
            config.stride = stride;
        }
        if let Some(basis) = self.range_basis {
            config.range_basis = basis.into();
        }
        if let Some(order) = self.time_order {
            config.time_order = order.into();
        }
        if self.cache {
            config.cache_deployments = true;
        }
        config.validate().context("invalid configuration")?;
        Ok(config)
    }

    fn synthesizer(&self) -> Result<ViewSynthesizer> {
        let config = self.to_config()?;
        let catalog = load_catalog(&config.roster)
            .with_context(|| format!("failed to load roster {}", config.roster.display()))?;
        info!(
            "Loaded {} deployments from {}",
            catalog.len(),
            config.roster.display()
        );
        let store = DirStore::new(config.data_dir.clone());
        ViewSynthesizer::new(Arc::new(catalog), Arc::new(store), config)
            .context("failed to start view synthesizer")
    }
}

impl SelectionArgs {
    fn resolve(&self, synth: &ViewSynthesizer) -> Result<Selection> {
        let request = SelectionRequest {
            deployment_key: self.deployment.clone(),
            parameter_key: self.parameter.clone(),
        };
        Ok(request.resolve(None, synth.catalog())?)
    }
}

fn write_json<T: Serialize>(value: &T, path: &Path, pretty: bool) -> Result<()> {
    let text = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    if path.as_os_str() == "-" {
        let mut stdout = io::stdout().lock();
        writeln!(stdout, "{text}")?;
        stdout.flush()?;
    } else {
        fs::write(path, text).with_context(|| format!("failed to write {}", path.display()))?;
    }
    Ok(())
}

fn handle_catalog(args: CatalogArgs) -> Result<()> {
    let config = args.common.to_config()?;
    let catalog = load_catalog(&config.roster)
        .with_context(|| format!("failed to load roster {}", config.roster.display()))?;
    if args.json {
        return write_json(&catalog.deployments(), Path::new("-"), true);
    }
    let default_key = catalog.default_deployment().key.clone();
    let mut stdout = io::stdout().lock();
    for deployment in catalog.deployments() {
        let marker = if deployment.key == default_key { "*" } else { " " };
        writeln!(stdout, "{marker} {:<28} {}", deployment.key, deployment.label)?;
    }
    Ok(())
}

fn handle_views(args: ViewsArgs) -> Result<()> {
    let synth = args.common.synthesizer()?;
    let selection = args.selection.resolve(&synth)?;
    let t_views = Instant::now();
    let views = synth.synthesize(&selection);
    debug!(
        "synthesis: {:.1} ms",
        t_views.elapsed().as_secs_f64() * 1000.0
    );
    for group in views.failed_groups() {
        if let Some(failure) = views.get(group).failure() {
            warn!("{} unavailable: {}", group, failure.message);
        }
    }
    write_json(&views, &args.output, args.pretty)?;
    if args.output.as_os_str() != "-" {
        info!("Wrote views: {}", args.output.display());
    }
    Ok(())
}

#[derive(Serialize)]
struct ExportEntry {
    file: String,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    digest: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl ExportEntry {
    fn from_outcome(file: String, outcome: &ViewOutcome) -> Self {
        match outcome {
            ViewOutcome::Ready { figure } => Self {
                file,
                status: "ready",
                digest: Some(figure.digest()),
                error: None,
            },
            ViewOutcome::Failed { error } => Self {
                file,
                status: "failed",
                digest: None,
                error: Some(error.message.clone()),
            },
        }
    }
}

fn export_deployment(
    synth: &ViewSynthesizer,
    key: &str,
    dir: &Path,
    pretty: bool,
) -> Result<Vec<ExportEntry>> {
    fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
    let data = synth.load(key);
    let views = deployment_views(&data, synth.config());
    let mut outputs: Vec<(String, ViewOutcome)> = vec![
        (ViewGroup::GeographicTrack.element_id().to_string(), views.geographic_track),
        (ViewGroup::TransformedTrack.element_id().to_string(), views.transformed_track),
        (ViewGroup::Velocity.element_id().to_string(), views.velocity),
        (ViewGroup::DepthTime.element_id().to_string(), views.depth_time),
    ];
    for parameter in Parameter::ALL {
        let name = format!("{}_{}", ViewGroup::Scatter3d.element_id(), parameter.key());
        outputs.push((name, parameter_view(&data, parameter, synth.config())));
    }

    let mut entries = Vec::with_capacity(outputs.len());
    for (name, outcome) in outputs {
        let file = format!("{name}.json");
        write_json(&outcome, &dir.join(&file), pretty)?;
        entries.push(ExportEntry::from_outcome(file, &outcome));
    }
    Ok(entries)
}

fn handle_export(args: ExportArgs) -> Result<()> {
    let synth = args.common.synthesizer()?;
    let keys: Vec<String> = if args.deployments.is_empty() {
        synth.catalog().keys().map(str::to_string).collect()
    } else {
        for key in &args.deployments {
            if !synth.catalog().contains(key) {
                return Err(anyhow!("deployment '{}' is not in the roster", key));
            }
        }
        args.deployments.clone()
    };

    let t_export = Instant::now();
    let manifest = export_views(&synth, &keys, &args.output_dir, args.pretty)?;
    let failed_views: usize = manifest
        .values()
        .flatten()
        .filter(|e| e.status == "failed")
        .count();
    let manifest_path = args.output_dir.join(MANIFEST_FILE);

    info!(
        "Exported {} deployments to {} in {:.1} ms",
        manifest.len(),
        args.output_dir.display(),
        t_export.elapsed().as_secs_f64() * 1000.0
    );
    if failed_views > 0 {
        warn!("{} views failed; see {}", failed_views, manifest_path.display());
    }
    Ok(())
}

/// Export every key in parallel and write the manifest beside them.
fn export_views(
    synth: &ViewSynthesizer,
    keys: &[String],
    output_dir: &Path,
    pretty: bool,
) -> Result<BTreeMap<String, Vec<ExportEntry>>> {
    let results: Vec<(String, Result<Vec<ExportEntry>>)> = keys
        .par_iter()
        .map(|key| {
            let dir = output_dir.join(key);
            (key.clone(), export_deployment(synth, key, &dir, pretty))
        })
        .collect();

    let mut manifest = BTreeMap::new();
    for (key, result) in results {
        let entries = result.with_context(|| format!("failed to export {key}"))?;
        manifest.insert(key, entries);
    }
    write_json(&manifest, &output_dir.join(MANIFEST_FILE), true)?;
    Ok(manifest)
}

fn handle_session(args: SessionArgs) -> Result<()> {
    let synth = Arc::new(args.common.synthesizer()?);
    let mut session = Session::new(synth);
    let mut stdout = io::stdout().lock();

    if !args.no_initial {
        let update = session.open();
        writeln!(stdout, "{}", serde_json::to_string(&update)?)?;
        stdout.flush()?;
    }

    serve_session(&mut session, io::stdin().lock(), &mut stdout)
}

/// Answer each JSON request line with one JSON line: a `ViewUpdate`, or
/// `{"error": ...}` for a line that does not parse or resolve. Blank lines
/// are skipped.
fn serve_session<R: BufRead, W: Write>(
    session: &mut Session,
    reader: R,
    mut writer: W,
) -> Result<()> {
    for (lineno, line) in reader.lines().enumerate() {
        let line = line.context("failed to read request")?;
        if line.trim().is_empty() {
            continue;
        }
        let response = match serde_json::from_str::<SelectionRequest>(&line) {
            Ok(request) => match session.apply(&request) {
                Ok(update) => serde_json::to_value(&update)?,
                Err(err) => {
                    warn!("request {} rejected: {}", lineno + 1, err);
                    json!({ "error": err.to_string() })
                }
            },
            Err(err) => {
                warn!("request {} is not valid JSON: {}", lineno + 1, err);
                json!({ "error": format!("invalid request: {err}") })
            }
        };
        writeln!(writer, "{response}")?;
        writer.flush()?;
    }
    Ok(())
}

fn handle_render(args: RenderArgs) -> Result<()> {
    let synth = args.common.synthesizer()?;
    let selection = args.selection.resolve(&synth)?;
    let views = synth.synthesize(&selection);
    fs::create_dir_all(&args.output_dir)
        .with_context(|| format!("failed to create {}", args.output_dir.display()))?;

    let kind: ChartKind = args.format.into();
    let size = (args.width, args.height);
    let mut written = 0usize;
    for group in ViewGroup::ALL {
        let outcome = views.get(group);
        let Some(figure) = outcome.figure() else {
            if let Some(failure) = outcome.failure() {
                warn!("Skipping {} ({})", group, failure.message);
            }
            continue;
        };
        let path = args
            .output_dir
            .join(format!("{}.{}", group.element_id(), kind.extension()));
        let t_plot = Instant::now();
        if let Err(err) = render_chart_guard(figure, &path, kind, size) {
            warn!("Skipping render ({}): {}", path.display(), err);
        } else {
            written += 1;
            info!("Wrote plot: {}", path.display());
            debug!(
                "{} plot stage: {:.1} ms",
                group,
                t_plot.elapsed().as_secs_f64() * 1000.0
            );
        }
    }
    if written == 0 {
        return Err(anyhow!(
            "no views rendered for {} / {}",
            selection.deployment,
            selection.parameter
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use glider_hub::ResourceKind;

    fn common(args: &[&str]) -> CommonArgs {
        let mut argv = vec!["glider-hub", "catalog"];
        argv.extend_from_slice(args);
        match Cli::parse_from(argv).command {
            Command::Catalog(args) => args.common,
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn flags_override_defaults() {
        let config = common(&["--stride", "4", "--range-basis", "full-resolution", "--cache"])
            .to_config()
            .unwrap();
        assert_eq!(config.stride, 4);
        assert_eq!(config.range_basis, RangeBasis::FullResolution);
        assert!(config.cache_deployments);
        assert_eq!(config.time_order, TimeOrder::Sort);
    }

    #[test]
    fn data_dir_moves_default_roster() {
        let config = common(&["--data-dir", "/srv/gliders"]).to_config().unwrap();
        assert_eq!(config.roster, PathBuf::from("/srv/gliders/glider_deployments.csv"));
    }

    #[test]
    fn zero_stride_is_rejected() {
        assert!(common(&["--stride", "0"]).to_config().is_err());
    }

    #[test]
    fn export_deployments_are_comma_separated() {
        let cli = Cli::parse_from([
            "glider-hub",
            "export",
            "--deployments",
            "Ramses_Deployment1,Pelagia_Deployment1",
        ]);
        let Command::Export(args) = cli.command else {
            panic!("expected export");
        };
        assert_eq!(args.deployments.len(), 2);
        assert_eq!(args.output_dir, PathBuf::from("views"));
    }

    const ROSTER: &str = "glider,Deployment #\nRamses,Deployment #1\nPelagia,Deployment #1\n";

    /// Data directory with a roster of two deployments; only Ramses has files.
    fn data_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("glider_deployments.csv"), ROSTER).unwrap();
        let store = DirStore::new(dir.path());
        let mut track = String::from("time,lat,lon,xr,yr,u,v\n");
        let mut profile = String::from(",time,depth,lat,lon,xr,yr,t,s,dens,chl\n");
        for i in 0..12 {
            track.push_str(&format!(
                "2017-05-10 {i:02}:00:00,{},-75.0,{i},0.0,0.1,-0.2\n",
                35.0 + i as f64 * 0.01
            ));
            profile.push_str(&format!(
                "{i},2017-05-10 {i:02}:30:00,{},35.2,-75.3,{i},0.0,18.5,35.5,1025.3,0.{i}\n",
                i * 5
            ));
        }
        let key = "Ramses_Deployment1";
        fs::write(store.resource_path(key, ResourceKind::Track), track).unwrap();
        fs::write(store.resource_path(key, ResourceKind::Profile), profile).unwrap();
        dir
    }

    fn synthesizer_for(dir: &Path) -> ViewSynthesizer {
        common(&["--data-dir", dir.to_str().unwrap()])
            .synthesizer()
            .unwrap()
    }

    fn responses(session: &mut Session, input: &str) -> Vec<serde_json::Value> {
        let mut out = Vec::new();
        serve_session(session, input.as_bytes(), &mut out).unwrap();
        String::from_utf8(out)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[test]
    fn session_answers_each_line_and_survives_bad_input() {
        let dir = data_dir();
        let mut session = Session::new(Arc::new(synthesizer_for(dir.path())));
        session.open();

        let input = "not json\n\n{\"parameter_key\":\"s\"}\n{\"parameter_key\":\"o2\"}\n";
        let lines = responses(&mut session, input);
        assert_eq!(lines.len(), 3);

        let invalid = lines[0]["error"].as_str().unwrap();
        assert!(invalid.starts_with("invalid request"), "{invalid}");

        assert!(lines[1].get("error").is_none());
        assert_eq!(lines[1]["views"].as_object().unwrap().len(), 1);

        assert!(lines[2]["error"].as_str().unwrap().contains("o2"));
        assert_eq!(
            session.current().map(|s| s.parameter),
            Some(Parameter::Salinity)
        );
    }

    #[test]
    fn export_writes_views_and_manifest() {
        let dir = data_dir();
        let out = tempfile::tempdir().unwrap();
        let synth = synthesizer_for(dir.path());
        let keys = vec![
            "Ramses_Deployment1".to_string(),
            "Pelagia_Deployment1".to_string(),
        ];
        let manifest = export_views(&synth, &keys, out.path(), false).unwrap();

        let ramses = &manifest["Ramses_Deployment1"];
        assert_eq!(ramses.len(), 4 + Parameter::ALL.len());
        assert!(ramses.iter().all(|e| e.status == "ready" && e.digest.is_some()));
        assert!(out.path().join("Ramses_Deployment1/3d_map_chl.json").is_file());

        let pelagia = &manifest["Pelagia_Deployment1"];
        assert!(pelagia.iter().all(|e| e.status == "failed" && e.error.is_some()));

        let text = fs::read_to_string(out.path().join(MANIFEST_FILE)).unwrap();
        let written: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(written["Pelagia_Deployment1"][0]["status"], "failed");
        assert_eq!(
            written["Ramses_Deployment1"][0]["digest"].as_str(),
            ramses[0].digest.as_deref()
        );
    }
}
