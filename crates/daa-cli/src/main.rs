//! `daa` - run the detect-and-avoid kernel on encounters given on the
//! command line and print JSON reports.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use daa_cli::sweep::{run_sweep, SweepSummary};
use daa_cli::{assess, AircraftSpec, AssessOptions, Config, Report, UrgencyChoice};
use daa_core::alerting::{AlertLevels, AlertingMofN};
use daa_core::bands::{BandsReport, KinematicBandsParameters, KinematicMultiBands};
use daa_core::detection::{ConflictData, DetectorRegistry};
use daa_core::params::ParameterData;
use daa_core::polygon::{polygon_detector, MovingPolygon3D, Poly2D, Poly3D, PolygonConflict};
use daa_core::resolution::{CrssResolution, CRSS};
use daa_core::units::{FT, KN, NMI};
use daa_core::vect::{vect2, vect3};

#[derive(Parser, Debug)]
#[command(author, version, about = "Detect-and-avoid kernel driver")]
struct Args {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    /// Lookahead time in seconds (default: DAA_LOOKAHEAD_S or 180)
    #[arg(long, global = true)]
    lookahead: Option<f64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one detector on an ownship/intruder pair
    Detect {
        /// Ownship as x_nmi,y_nmi,alt_ft,trk_deg,gs_kn,vs_fpm
        #[arg(long, allow_hyphen_values = true)]
        ownship: AircraftSpec,

        /// Intruder in the same format
        #[arg(long, allow_hyphen_values = true)]
        intruder: AircraftSpec,

        /// Detector tag (default: DAA_DETECTOR or WCV_TAUMOD)
        #[arg(long)]
        detector: Option<String>,

        /// Detector parameter as `key = value [unit]`, repeatable
        #[arg(long = "param")]
        params: Vec<String>,

        /// Also compute cylinder resolutions
        #[arg(long)]
        resolve: bool,
    },

    /// Compute track, ground speed, vertical speed and altitude bands
    Bands {
        #[arg(long, allow_hyphen_values = true)]
        ownship: AircraftSpec,

        /// Intruder, repeatable
        #[arg(long = "intruder", allow_hyphen_values = true, required = true)]
        intruders: Vec<AircraftSpec>,

        /// Use instantaneous maneuvers instead of kinematic ones
        #[arg(long)]
        instantaneous: bool,
    },

    /// Alert levels, time to violation and contours through the facade
    Assess {
        #[arg(long, allow_hyphen_values = true)]
        ownship: AircraftSpec,

        /// Intruder, repeatable
        #[arg(long = "intruder", allow_hyphen_values = true, required = true)]
        intruders: Vec<AircraftSpec>,

        /// Direction the wind blows toward, deg
        #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
        wind_trk: f64,

        /// Wind speed, kn
        #[arg(long, default_value_t = 0.0)]
        wind_speed: f64,

        /// Most urgent aircraft: none, dcpa or an aircraft id
        #[arg(long, default_value = "none")]
        urgency: UrgencyChoice,

        /// Position accuracy category shared by every aircraft
        #[arg(long, requires = "nacv")]
        nacp: Option<usize>,

        /// Velocity accuracy category shared by every aircraft
        #[arg(long, requires = "nacp")]
        nacv: Option<usize>,

        /// Also compute horizontal contours
        #[arg(long)]
        contours: bool,

        /// Buffered alert levels with kinematic bands
        #[arg(long)]
        buffered: bool,
    },

    /// Filter an alert-level sequence with M-of-N
    Mofn {
        #[arg(long, default_value_t = 2)]
        m: usize,

        #[arg(long, default_value_t = 3)]
        n: usize,

        /// Raw levels, comma separated
        #[arg(long, value_delimiter = ',', required = true)]
        levels: Vec<usize>,
    },

    /// Detect a moving square region with both polygon strategies
    Polygon {
        #[arg(long, allow_hyphen_values = true)]
        ownship: AircraftSpec,

        /// Square center east, nmi
        #[arg(long, default_value_t = 5.0, allow_hyphen_values = true)]
        cx: f64,

        /// Square center north, nmi
        #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
        cy: f64,

        /// Half side, nmi
        #[arg(long, default_value_t = 1.0)]
        half: f64,

        /// Square velocity east, kn
        #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
        vx: f64,

        /// Square velocity north, kn
        #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
        vy: f64,

        /// Floor and ceiling, ft
        #[arg(long, default_value_t = 0.0)]
        bottom: f64,

        #[arg(long, default_value_t = 10000.0)]
        top: f64,
    },

    /// Seeded random encounter sweep comparing the WCV variants
    Sweep {
        #[arg(long, default_value_t = 42)]
        seed: u64,

        #[arg(long, default_value_t = 1000)]
        count: usize,
    },
}

#[derive(Serialize)]
struct DetectReport {
    detector: String,
    parameters: ParameterData,
    violation: bool,
    conflict: bool,
    detection: ConflictData,
    resolution: Option<CrssResolution>,
}

#[derive(Serialize)]
struct MofnReport {
    m: usize,
    n: usize,
    raw: Vec<usize>,
    filtered: Vec<usize>,
}

#[derive(Serialize)]
struct StrategyConflicts {
    detector: &'static str,
    conflicts: Vec<PolygonConflict>,
}

#[derive(Serialize)]
struct PolygonReport {
    strategies: Vec<StrategyConflicts>,
}

fn init_tracing(json: bool) -> Result<()> {
    let filter =
        tracing_subscriber::EnvFilter::from_default_env().add_directive("daa_cli=info".parse()?);
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
    Ok(())
}

fn detect(
    config: &Config,
    lookahead: f64,
    ownship: &AircraftSpec,
    intruder: &AircraftSpec,
    tag: Option<String>,
    params: &[String],
    resolve: bool,
) -> Result<DetectReport> {
    let tag = tag.unwrap_or_else(|| config.detector.clone());
    let mut p = ParameterData::new();
    for line in params {
        p.parse_line(line)?;
    }
    let det = DetectorRegistry::with_defaults()
        .make(&tag, &p)
        .with_context(|| format!("building detector '{tag}'"))?;
    let own = ownship.to_state("ownship");
    let ac = intruder.to_state("intruder");
    let detection = det.conflict_detection(&own.s, &own.v, &ac.s, &ac.v, 0.0, lookahead);
    tracing::info!(detector = %tag, conflict = detection.conflict(), "Detection done");

    let resolution = resolve.then(|| {
        CRSS::default().resolution_coordinated(&(own.s - ac.s), &own.v, &ac.v, &own.id, &ac.id)
    });
    Ok(DetectReport {
        detector: tag,
        parameters: det.parameters(),
        violation: det.violation(&own.s, &own.v, &ac.s, &ac.v),
        conflict: detection.conflict(),
        detection,
        resolution,
    })
}

fn bands(
    lookahead: f64,
    ownship: &AircraftSpec,
    intruders: &[AircraftSpec],
    instantaneous: bool,
) -> BandsReport {
    let parameters = if instantaneous {
        KinematicBandsParameters::instantaneous()
    } else {
        KinematicBandsParameters::default()
    };
    let mut bands = KinematicMultiBands::new(parameters, AlertLevels::do_365());
    bands.set_lookahead_time(lookahead);
    bands.set_ownship(ownship.to_state("ownship"));
    bands.set_traffic(
        intruders.iter().enumerate().map(|(i, spec)| spec.to_state(&format!("intruder{}", i + 1))),
    );
    tracing::info!(traffic = intruders.len(), "Computing bands");
    bands.report()
}

fn mofn(m: usize, n: usize, levels: Vec<usize>) -> Result<MofnReport> {
    let mut filter = AlertingMofN::new(m, n)?;
    let filtered = levels.iter().map(|&l| filter.push(l)).collect();
    Ok(MofnReport {
        m,
        n,
        raw: levels,
        filtered,
    })
}

#[allow(clippy::too_many_arguments)]
fn polygon(
    lookahead: f64,
    ownship: &AircraftSpec,
    cx: f64,
    cy: f64,
    half: f64,
    vx: f64,
    vy: f64,
    bottom: f64,
    top: f64,
) -> Result<PolygonReport> {
    if half <= 0.0 || top <= bottom {
        bail!("square needs a positive half side and top above bottom");
    }
    let (cx, cy, h) = (cx * NMI, cy * NMI, half * NMI);
    let square = Poly2D::new(vec![
        vect2(cx - h, cy - h),
        vect2(cx + h, cy - h),
        vect2(cx + h, cy + h),
        vect2(cx - h, cy + h),
    ]);
    let region = Poly3D::new(square, bottom * FT, top * FT);
    let mp = MovingPolygon3D::translating(&region, &vect3(vx * KN, vy * KN, 0.0));
    let own = ownship.to_state("ownship");

    let mut strategies = Vec::new();
    for tag in ["Polycarp3D", "CDPolyIter"] {
        let det = polygon_detector(tag)?;
        let conflicts = det.conflict_detection(&own.s, &own.v, &mp, 0.0, lookahead);
        tracing::info!(detector = tag, intervals = conflicts.len(), "Polygon detection done");
        strategies.push(StrategyConflicts {
            detector: det.canonical_class(),
            conflicts,
        });
    }
    Ok(PolygonReport { strategies })
}

fn print<T: Serialize>(command: &'static str, body: T) -> Result<()> {
    println!("{}", Report::new(command, body).to_json()?);
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.json_logs)?;

    let config = Config::from_env();
    let lookahead = args.lookahead.unwrap_or(config.lookahead_s);
    if !(lookahead.is_finite() && lookahead > 0.0) {
        bail!("lookahead must be positive, got {lookahead}");
    }

    match args.command {
        Command::Detect {
            ownship,
            intruder,
            detector,
            params,
            resolve,
        } => print(
            "detect",
            detect(&config, lookahead, &ownship, &intruder, detector, &params, resolve)?,
        ),
        Command::Bands {
            ownship,
            intruders,
            instantaneous,
        } => print("bands", bands(lookahead, &ownship, &intruders, instantaneous)),
        Command::Assess {
            ownship,
            intruders,
            wind_trk,
            wind_speed,
            urgency,
            nacp,
            nacv,
            contours,
            buffered,
        } => {
            let own = ownship.to_state("ownship");
            let traffic: Vec<_> = intruders
                .iter()
                .enumerate()
                .map(|(i, spec)| spec.to_state(&format!("intruder{}", i + 1)))
                .collect();
            let opts = AssessOptions {
                wind_trk_deg: wind_trk,
                wind_kn: wind_speed,
                urgency,
                accuracy: nacp.zip(nacv),
                contours,
                buffered,
            };
            print("assess", assess(&own, &traffic, lookahead, &opts)?)
        }
        Command::Mofn { m, n, levels } => print("mofn", mofn(m, n, levels)?),
        Command::Polygon {
            ownship,
            cx,
            cy,
            half,
            vx,
            vy,
            bottom,
            top,
        } => print("polygon", polygon(lookahead, &ownship, cx, cy, half, vx, vy, bottom, top)?),
        Command::Sweep { seed, count } => {
            let summary: SweepSummary = run_sweep(seed, count, lookahead);
            print("sweep", summary)
        }
    }
}
