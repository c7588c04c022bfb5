use clap::{Args, Parser, Subcommand};
use smol::channel::Receiver;
use thallo::{
    geometry::{Point, Ring},
    io::{
        project::{read_draft_json, write_draft_json},
        read_parcel_geojson, read_points_csv, write_ring_geojson,
    },
    model::{
        LeverSet, Project, ProjectId, RecommendationSet, RecommendedLevers, SimulationResult,
        Validate,
    },
    parcel::Parcel,
    recommend::RecommendationState,
    submit_project, ClientConfig, Error, GeometryCapture, HttpBackend, ProjectDraft, Result,
    ResultsSession, ResultsView, SessionHandle, SessionPhase,
};

#[derive(Parser)]
#[command(name = "thallo_cli", version)]
struct Cli {
    /// JSON client configuration
    #[arg(long, global = true)]
    config: Option<String>,
    /// Backend base URL, overrides the configuration and THALLO_API_URL
    #[arg(long, global = true)]
    api_url: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a parcel ring from clicked points (CSV lon,lat or GeoJSON).
    Parcel {
        path: String,
        /// Write the ring as a GeoJSON Feature
        #[arg(long)]
        geojson: Option<String>,
    },
    /// Create a project and start its baseline simulation.
    Submit(SubmitArgs),
    /// Poll a project, explore levers and ask for recommendations.
    Watch(WatchArgs),
}

#[derive(Args)]
struct SubmitArgs {
    /// Draft JSON holding the form and the parcel points
    #[arg(long, conflicts_with_all = ["name", "points"])]
    draft: Option<String>,
    #[arg(long)]
    name: Option<String>,
    #[arg(long, default_value_t = 100)]
    units: u32,
    #[arg(long, default_value_t = 2028)]
    build_year: i32,
    /// Parcel points, CSV or GeoJSON
    #[arg(long)]
    points: Option<String>,
    #[arg(long)]
    greywater: bool,
    #[arg(long)]
    pipeline: bool,
    /// Save the draft before submitting
    #[arg(long)]
    save_draft: Option<String>,
    /// Keep polling until the baseline result is available
    #[arg(long)]
    watch: bool,
}

#[derive(Args, Default)]
struct WatchArgs {
    id: ProjectId,
    /// Fraction of units removed, 0.0 to 1.0
    #[arg(long)]
    reduce: Option<f64>,
    /// Greywater recycling on or off, the submitted setting when omitted
    #[arg(long)]
    greywater: Option<bool>,
    /// Pipeline on or off, the submitted setting when omitted
    #[arg(long)]
    pipeline: Option<bool>,
    /// Years to delay the build
    #[arg(long)]
    delay: Option<u32>,
    #[arg(long)]
    recommend: bool,
    /// Apply the recommendation with this rank
    #[arg(long, requires = "recommend")]
    apply: Option<u32>,
}

impl WatchArgs {
    /// Levers pulled on the command line, overlaid on the session's levers
    /// once the baseline is known. `None` when nothing was pulled.
    fn edit(&self) -> Result<Option<RecommendedLevers>> {
        let edit = RecommendedLevers {
            unit_reduction_pct: self.reduce,
            greywater_recycling: self.greywater,
            pipeline_added: self.pipeline,
            build_delay_years: self.delay,
        };
        if edit == RecommendedLevers::default() {
            return Ok(None);
        }
        edit.apply_to(&LeverSet::default()).validate()?;
        Ok(Some(edit))
    }
}

fn load_config(cli: &Cli) -> Result<ClientConfig> {
    let mut config = match &cli.config {
        Some(path) => ClientConfig::from_json_file(path)?,
        None => ClientConfig::default(),
    }
    .with_env_overrides();
    if let Some(url) = &cli.api_url {
        config.base_url = url.clone();
    }
    config.validate()?;
    Ok(config)
}

fn file_error(path: &str, e: std::io::Error) -> Error {
    Error::InvalidInput(format!("{path}: {e}"))
}

fn load_points(path: &str) -> Result<Vec<Point>> {
    let lower = path.to_ascii_lowercase();
    let points = if lower.ends_with(".geojson") || lower.ends_with(".json") {
        read_parcel_geojson(path)
    } else {
        read_points_csv(path)
    };
    points.map_err(|e| file_error(path, e))
}

fn print_ring(ring: &Ring) {
    println!("Vertices: {}", ring.vertex_count());
    for (i, p) in ring.vertices().iter().enumerate() {
        println!("{:>3}: {:.6}, {:.6}", i + 1, p.lon(), p.lat());
    }
    println!("Area: {:.8} sq deg", ring.area());
    if !ring.is_simple() {
        println!("Warning: boundary crosses itself, redraw the parcel");
    }
}

fn print_result(title: &str, result: &SimulationResult) {
    println!(
        "{title}: {} (P(failure by {}) = {:.1}%)",
        result.verdict,
        result.end_year,
        result.p_failure_by_end_year * 100.0
    );
    if let Some(year) = result.first_failure_year {
        println!("  First failure year: {year}");
    }
    if let Some(deficit) = result.median_deficit {
        println!("  Median deficit: {deficit:.0} acre-feet");
    }
    for (scenario, verdict) in result.scenario_results.iter() {
        println!("  {:<36} {verdict}", scenario.label());
    }
}

fn print_recommendations(set: &RecommendationSet) {
    if set.unfixable {
        println!(
            "No combination of levers passes: {}",
            set.unfixable_reason.as_deref().unwrap_or("no reason given")
        );
    }
    for rec in &set.items {
        println!(
            "#{} {} ({:.1}%): {}",
            rec.rank,
            rec.projected_verdict,
            rec.projected_p_failure * 100.0,
            rec.explanation
        );
    }
}

fn parcel(path: &str, geojson: Option<&str>) -> Result<()> {
    let points = load_points(path)?;
    let parcel = Parcel::from_points(&points)?;
    print_ring(&parcel.boundary);
    if let Some(out) = geojson {
        write_ring_geojson(out, &parcel.boundary).map_err(|e| file_error(out, e))?;
        println!("Wrote {out}");
    }
    Ok(())
}

fn submit(config: &ClientConfig, args: SubmitArgs) -> Result<ProjectId> {
    let draft = match args.draft {
        Some(path) => read_draft_json(&path).map_err(|e| file_error(&path, e))?,
        None => {
            let name = args
                .name
                .ok_or_else(|| Error::InvalidInput("--name or --draft is required".into()))?;
            let mut d = ProjectDraft::new(name, args.units, args.build_year);
            d.greywater_recycling = args.greywater;
            d.pipeline_added = args.pipeline;
            if let Some(path) = args.points {
                d.points = load_points(&path)?;
            }
            d
        }
    };
    if let Some(path) = args.save_draft {
        write_draft_json(&path, &draft).map_err(|e| file_error(&path, e))?;
        println!("Saved draft to {path}");
    }

    let mut capture = GeometryCapture::new().with_max_points(config.max_points);
    for p in &draft.points {
        if capture.add_point(*p).is_none() {
            log::warn!("parcel capped at {} points", capture.len());
            break;
        }
    }
    // everything local is checked before the backend is contacted
    let ring = capture.require_ring()?;
    draft.to_request(ring).validate()?;

    let backend = HttpBackend::new(config)?;
    let project = smol::block_on(submit_project(&backend, &draft, &capture))?;
    println!("Created project {}: {}", project.id, project.summary());
    Ok(project.id)
}

fn next_view(views: &Receiver<ResultsView>) -> Option<ResultsView> {
    smol::block_on(views.recv()).ok()
}

/// Lever set the session treats as "no change" for this view.
fn reference(view: &ResultsView) -> LeverSet {
    view.project
        .as_ref()
        .map(Project::reference_levers)
        .unwrap_or_default()
}

/// Levers the next edit is overlaid on.
fn current_levers(view: &ResultsView) -> LeverSet {
    view.levers.unwrap_or_else(|| reference(view))
}

/// Sends `levers` and waits until the session settled on them.
fn explore(
    views: &Receiver<ResultsView>,
    current: ResultsView,
    levers: LeverSet,
    send: impl FnOnce() -> Result<()>,
) -> Result<ResultsView> {
    let idle = !current.is_pending && !current.is_loading;
    let shown = current.live_levers == Some(levers) || levers == reference(&current);
    if current.levers == Some(levers) && idle && shown {
        println!("Levers unchanged");
        return Ok(current);
    }
    let reverting = levers == reference(&current);
    send()?;
    let mut current = current;
    while let Some(view) = next_view(views) {
        let settled = view.levers == Some(levers)
            && if reverting {
                !view.is_live
            } else {
                !view.is_pending && !view.is_loading
            };
        current = view;
        if settled {
            break;
        }
    }
    if reverting {
        println!("Levers match the submitted project, showing the baseline");
        return Ok(current);
    }
    match (&current.live_levers, &current.displayed_result) {
        (Some(live), Some(result)) if *live == levers => {
            let title = format!("What if [{}]", levers.describe().join(", "));
            print_result(&title, result)
        }
        _ => eprintln!(
            "Recompute failed: {}",
            current.last_error.as_deref().unwrap_or("no result")
        ),
    }
    Ok(current)
}

fn recommend(
    handle: &SessionHandle,
    views: &Receiver<ResultsView>,
    mut current: ResultsView,
    apply: Option<u32>,
) -> Result<ResultsView> {
    if !current.recommendations_offered {
        println!("Project passes; no recommendations needed");
        return Ok(current);
    }
    smol::block_on(handle.fetch_recommendations())?;
    while let Some(view) = next_view(views) {
        let done = !view.recommendations.is_loading();
        current = view;
        if done {
            break;
        }
    }
    let set = match &current.recommendations {
        RecommendationState::Ready(set) => set.clone(),
        RecommendationState::Failed { message, .. } => {
            eprintln!("Recommendations failed: {message}");
            return Ok(current);
        }
        _ => return Ok(current),
    };
    print_recommendations(&set);

    let Some(rank) = apply else {
        return Ok(current);
    };
    let rec = set
        .by_rank(rank)
        .ok_or_else(|| Error::InvalidInput(format!("no recommendation #{rank}")))?;
    let levers = rec.levers.apply_to(&current_levers(&current));
    levers.validate()?;
    explore(views, current, levers, || {
        smol::block_on(handle.apply_recommendation(rank))
    })
}

fn watch(config: &ClientConfig, args: &WatchArgs) -> Result<()> {
    let edit = args.edit()?;
    let backend = HttpBackend::new(config)?;
    let (session, handle, views) = ResultsSession::open(backend, args.id, config);
    let task = smol::spawn(session.run());

    let mut last_status = None;
    let baseline = loop {
        let Some(view) = next_view(&views) else {
            return smol::block_on(task);
        };
        match &view.phase {
            SessionPhase::Ready => break view,
            SessionPhase::Failed(_) | SessionPhase::Closed => return smol::block_on(task),
            SessionPhase::Polling(status) if *status != last_status => {
                if let Some(status) = status {
                    println!("Status: {status}");
                }
                last_status = *status;
            }
            SessionPhase::Polling(_) => {}
        }
    };
    if let Some(project) = &baseline.project {
        println!("{}: {}", project.project_name, project.summary());
    }
    if let Some(result) = &baseline.displayed_result {
        print_result("Baseline", result);
    }

    let mut current = baseline;
    if let Some(edit) = edit {
        let levers = edit.apply_to(&current_levers(&current));
        current = explore(&views, current, levers, || {
            smol::block_on(handle.set_levers(levers))
        })?;
    }
    if args.recommend {
        recommend(&handle, &views, current, args.apply)?;
    }

    smol::block_on(handle.shutdown())?;
    smol::block_on(task)
}

fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;
    match cli.command {
        Commands::Parcel { path, geojson } => parcel(&path, geojson.as_deref()),
        Commands::Submit(args) => {
            let follow = args.watch;
            let id = submit(&config, args)?;
            if follow {
                watch(
                    &config,
                    &WatchArgs {
                        id,
                        ..Default::default()
                    },
                )?;
            }
            Ok(())
        }
        Commands::Watch(args) => watch(&config, &args),
    }
}

fn main() {
    env_logger::Builder::from_default_env().init();
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
