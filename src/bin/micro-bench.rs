use clap::{Parser, ValueEnum};
use ibex_micro::config::*;
use ibex_micro::logging;
use ibex_micro::military::squad::*;
use ibex_micro::scenario::*;
use ibex_micro::unit::*;
use log::*;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Backend {
    AlphaBeta,
    Uct,
    BehaviorTree,
    Harass,
}

impl From<Backend> for SearchBackend {
    fn from(backend: Backend) -> SearchBackend {
        match backend {
            Backend::AlphaBeta => SearchBackend::AlphaBeta,
            Backend::Uct => SearchBackend::Uct,
            Backend::BehaviorTree => SearchBackend::BehaviorTree,
            Backend::Harass => SearchBackend::Harass,
        }
    }
}

#[derive(Parser)]
#[command(name = "micro-bench")]
#[command(about = "Run a squad micro backend against a JSON combat scenario")]
struct Args {
    /// Scenario document (units, weapons, pickups, blocked tiles, order)
    scenario: String,

    /// Micro configuration document; defaults apply when omitted
    #[arg(short, long)]
    config: Option<String>,

    /// Overrides the backend named in the configuration
    #[arg(short, long, value_enum)]
    backend: Option<Backend>,

    /// Number of game ticks to simulate
    #[arg(short, long, default_value_t = 112)]
    ticks: u32,

    /// Log search diagnostics and individual decisions
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<(), String> {
    let args = Args::parse();

    logging::setup_logging(if args.verbose { logging::Debug } else { logging::Info });

    let mut config = match &args.config {
        Some(path) => MicroConfig::from_json_file(path).map_err(|err| format!("Failed to load config {}: {}", path, err))?,
        None => MicroConfig::default(),
    };

    if let Some(backend) = args.backend {
        config.backend = backend.into();
    }

    let mut world = ScenarioWorld::from_json_file(&args.scenario).map_err(|err| format!("Failed to load scenario {}: {}", args.scenario, err))?;

    let order = world
        .order
        .unwrap_or_else(|| Order::new(OrderType::Attack, world_centroid(&world, Alliance::Enemy), 8.0));

    let mut squad = Squad::new("bench", config);
    squad.set_units(&world.tags_of(Alliance::Own));
    squad.set_order(order);

    // The hostile side fights back with the default behavior tree.
    let mut opponent = Squad::new("opponent", MicroConfig::default());
    opponent.set_units(&world.tags_of(Alliance::Enemy));
    opponent.set_order(Order::new(OrderType::Defend, order.position, order.radius));

    info!("{}", squad.describe_state());
    info!("{}", opponent.describe_state());

    info!(
        "Squad power {:.1} vs opponent power {:.1}",
        squad.squad_power(&world),
        squad.targets_power(&world)
    );

    let mut log = CommandLog::new();
    let mut opponent_log = CommandLog::new();
    let mut total_issued = 0;

    for _ in 0..args.ticks {
        let tick = world.tick;

        squad.set_targets(&world.tags_of(Alliance::Enemy));
        opponent.set_targets(&world.tags_of(Alliance::Own));
        log.set_tick(tick);
        opponent_log.set_tick(tick);

        total_issued += squad.execute(&world, &mut log);
        opponent.execute(&world, &mut opponent_log);

        let commands = log.at_tick(tick);

        for command in &commands {
            println!("[{:>4}] {} {}", tick, command.unit, command.action);
        }

        if let Some(stats) = squad.last_search_stats() {
            debug!(
                "Tick {} search: nodes {} depth {} traversals {} elapsed {:?} score {:.3}{}",
                tick,
                stats.nodes,
                stats.depth,
                stats.traversals,
                stats.elapsed,
                stats.score,
                if stats.timed_out { " (timed out)" } else { "" }
            );
        }

        let mut all_commands = commands;
        all_commands.extend(opponent_log.at_tick(tick));

        world.step(&all_commands);

        if world.tags_of(Alliance::Own).is_empty() || world.tags_of(Alliance::Enemy).is_empty() {
            info!("Battle resolved at tick {}", world.tick);
            break;
        }
    }

    println!(
        "Issued {} commands over {} ticks: {} friendly and {} hostile units remain",
        total_issued,
        world.tick,
        world.tags_of(Alliance::Own).len(),
        world.tags_of(Alliance::Enemy).len()
    );

    Ok(())
}

fn world_centroid(world: &ScenarioWorld, alliance: Alliance) -> Point2 {
    let positions: Vec<Point2> = world.units.iter().filter(|entry| entry.unit.alliance == alliance).map(|entry| entry.unit.position).collect();

    if positions.is_empty() {
        return Point2::ZERO;
    }

    positions.iter().fold(Point2::ZERO, |total, position| total + *position) * (1.0 / positions.len() as f32)
}
