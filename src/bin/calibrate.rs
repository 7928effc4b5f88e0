//! CLI entry point for fitting a [`skyrotor::geometry::RotatorModel`] to calibration data.
//!
//! Mirrors the original script's argument surface; `--plot` is not reproduced (out of scope).

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use skyrotor::calibration::{measurement, Calibrator, Method};
use skyrotor::geometry::RotatorParams;

/// Fit a rotator geometric model to measured-vs-truth calibration data.
#[derive(Parser, Debug)]
#[command(name = "calibrate", version, about)]
struct Args {
    /// Input CSV file, or a directory of FITS files when built with the `fits` feature.
    #[arg(long)]
    input: PathBuf,

    /// If `input` is a FITS directory, cache the parsed measurements here as CSV.
    #[arg(long)]
    input_cache: Option<PathBuf>,

    /// Write the fitted parameters here.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Initial rotator model parameters; identity if omitted.
    #[arg(long)]
    init: Option<PathBuf>,

    /// Fit the model to the data. Implied by `--output`.
    #[arg(long)]
    fit: bool,

    /// Outlier-rejection iterations to run.
    #[arg(long, default_value_t = 2)]
    iters: usize,

    /// Remove encoder drift estimated from the first/last N points.
    #[arg(long = "rm-drift")]
    rm_drift: Option<usize>,

    /// Print the forward/inverse round-trip residual per point.
    #[arg(long)]
    debug_model: bool,

    /// Optimization method.
    #[arg(long, value_enum, default_value_t = CliMethod::Leastsq)]
    method: CliMethod,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliMethod {
    Leastsq,
    Bfgs,
    NelderMead,
}

impl From<CliMethod> for Method {
    fn from(m: CliMethod) -> Method {
        match m {
            CliMethod::Leastsq => Method::LeastSquares,
            CliMethod::Bfgs => Method::Bfgs,
            CliMethod::NelderMead => Method::NelderMead,
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let mut args = Args::parse();
    args.fit = args.fit || args.output.is_some();

    let params0 = match &args.init {
        Some(path) => RotatorParams::load_file(path)?,
        None => RotatorParams::default(),
    };

    let model0 = skyrotor::geometry::RotatorModel::new(params0);
    let data = load_measurements(&args, &model0)?;
    tracing::info!(count = data.len(), "loaded calibration measurements");

    if args.debug_model {
        for m in &data {
            let real = model0.to_real(m.az_motor, m.el_motor, true);
            let back = model0.to_motor(real.0, real.1, true);
            println!(
                "motor=({:.3},{:.3}) real=({:.3},{:.3}) round_trip=({:.5},{:.5})",
                m.az_motor,
                m.el_motor,
                real.0,
                real.1,
                back.0 - m.az_motor,
                back.1 - m.el_motor,
            );
        }
    }

    if args.fit {
        let mut calibrator = Calibrator::new(params0, args.method.into(), args.iters);
        if let Some(window) = args.rm_drift {
            calibrator = calibrator.with_drift_removal(window);
        }
        let result = calibrator.fit(&data)?;
        tracing::info!(
            loss = result.loss,
            retained = result.retained,
            "calibration complete"
        );
        println!("{}", result.params);

        if let Some(path) = &args.output {
            result.params.save_file(path)?;
        }
    }

    Ok(())
}

/// Loads calibration measurements, applying `model0`'s `to_motor` to convert the real-sky
/// commanded `(az, el)` columns of a fresh CSV/FITS source into motor-encoder frame.
///
/// A `--input-cache` file, once written, already holds motor-frame values (this program wrote
/// them itself in [`write_csv_cache`]) and is read back with the identity model so it is not
/// converted twice.
fn load_measurements(
    args: &Args,
    model0: &skyrotor::geometry::RotatorModel,
) -> anyhow::Result<Vec<measurement::Measurement>> {
    let identity = skyrotor::geometry::RotatorModel::new(RotatorParams::default());
    if args.input.is_file() {
        let reader = std::fs::File::open(&args.input)?;
        Ok(measurement::parse_csv(reader, model0)?)
    } else if let Some(cache) = &args.input_cache {
        if cache.is_file() {
            let reader = std::fs::File::open(cache)?;
            return Ok(measurement::parse_csv(reader, &identity)?);
        }
        let data = parse_fits_input(&args.input, model0)?;
        write_csv_cache(cache, &data)?;
        Ok(data)
    } else {
        parse_fits_input(&args.input, model0)
    }
}

#[cfg(feature = "fits")]
fn parse_fits_input(
    dir: &std::path::Path,
    model0: &skyrotor::geometry::RotatorModel,
) -> anyhow::Result<Vec<measurement::Measurement>> {
    Ok(measurement::parse_fits_dir(dir, model0)?)
}

#[cfg(not(feature = "fits"))]
fn parse_fits_input(
    _dir: &std::path::Path,
    _model0: &skyrotor::geometry::RotatorModel,
) -> anyhow::Result<Vec<measurement::Measurement>> {
    anyhow::bail!("input is not a CSV file and this build was compiled without the `fits` feature")
}

fn write_csv_cache(path: &std::path::Path, data: &[measurement::Measurement]) -> anyhow::Result<()> {
    use std::io::Write;
    let mut file = std::fs::File::create(path)?;
    for m in data {
        writeln!(file, "{}, {}, {}, {}", m.az_motor, m.el_motor, m.az_truth, m.el_truth)?;
    }
    Ok(())
}
