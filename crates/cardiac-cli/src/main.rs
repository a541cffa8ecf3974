//! # Cardiac CLI
//!
//! Command-line driver for the Mitchell-Schaeffer cell model.

use anyhow::{bail, Context};
use cardiac_core::{RunConfig, Trace};
use cardiac_mitchell_schaeffer::{apd, sweep, Parameters, Simulation, State, Stimulus, SweepPoint};
use clap::{Parser, Subcommand};
use colored::Colorize;
use indicatif::ProgressBar;
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "cardiac")]
#[command(version = "0.1.0")]
#[command(about = "Mitchell-Schaeffer cardiac cell simulator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Model parameter flags shared by the simulating subcommands
#[derive(clap::Args)]
struct ParameterArgs {
    /// Inward current time constant
    #[arg(long, default_value_t = 0.3)]
    tau_in: f64,
    /// Outward current time constant
    #[arg(long, default_value_t = 6.0)]
    tau_out: f64,
    /// Gate recovery time constant
    #[arg(long, default_value_t = 120.0)]
    tau_open: f64,
    /// Gate inactivation time constant
    #[arg(long, default_value_t = 150.0)]
    tau_close: f64,
    /// Gate switching threshold
    #[arg(long, default_value_t = 0.13)]
    u_gate: f64,
}

impl ParameterArgs {
    fn build(&self) -> anyhow::Result<Parameters> {
        Ok(Parameters::new(
            self.tau_in,
            self.tau_out,
            self.tau_open,
            self.tau_close,
            self.u_gate,
        )?)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single simulation
    Run {
        /// Time step
        #[arg(long, default_value_t = 0.01)]
        dt: f64,
        /// Total duration
        #[arg(long, default_value_t = 300.0)]
        duration: f64,
        /// Initial potential
        #[arg(long, default_value_t = 0.0)]
        u0: f64,
        /// Initial gating variable
        #[arg(long, default_value_t = 1.0)]
        h0: f64,
        /// Stimulus amplitude
        #[arg(long, default_value_t = 0.2)]
        amplitude: f64,
        /// Stimulus onset time
        #[arg(long, default_value_t = 0.0)]
        stim_start: f64,
        /// Stimulus pulse width
        #[arg(long, default_value_t = 1.0)]
        stim_duration: f64,
        /// Pacing period (repeats the pulse; omit for a single pulse)
        #[arg(long)]
        period: Option<f64>,
        /// Write the trace to a .csv or .json file instead of a summary
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[command(flatten)]
        params: ParameterArgs,
    },

    /// Sweep stimulus amplitude and report which runs excite
    Sweep {
        /// Lowest amplitude
        #[arg(long, default_value_t = 0.0)]
        from: f64,
        /// Highest amplitude
        #[arg(long, default_value_t = 0.3)]
        to: f64,
        /// Number of sweep points
        #[arg(short, long, default_value_t = 16)]
        points: usize,
        /// Time step
        #[arg(long, default_value_t = 0.01)]
        dt: f64,
        /// Total duration per run
        #[arg(long, default_value_t = 300.0)]
        duration: f64,
        /// Stimulus pulse width
        #[arg(long, default_value_t = 1.0)]
        stim_duration: f64,
        #[command(flatten)]
        params: ParameterArgs,
    },

    /// Print the canonical parameter set
    Defaults,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            dt,
            duration,
            u0,
            h0,
            amplitude,
            stim_start,
            stim_duration,
            period,
            output,
            params,
        } => {
            let parameters = params.build()?;
            let config = RunConfig::new(dt, duration)?;
            let stimulus = match period {
                Some(period) => {
                    Stimulus::pulse_train(amplitude, stim_start, stim_duration, period)?
                }
                None => Stimulus::Pulse {
                    amplitude,
                    start: stim_start,
                    duration: stim_duration,
                },
            };

            let sim = Simulation::new(parameters, config).with_initial(State { u: u0, h: h0 });
            let trace = sim.run(&stimulus);

            match output {
                Some(path) => write_trace(&trace, &path)?,
                None => print_summary(&trace, &parameters),
            }
        }

        Commands::Sweep {
            from,
            to,
            points,
            dt,
            duration,
            stim_duration,
            params,
        } => {
            if points < 2 {
                bail!("sweep needs at least 2 points");
            }
            let parameters = params.build()?;
            let config = RunConfig::new(dt, duration)?;

            let sweep_points: Vec<SweepPoint> = (0..points)
                .map(|i| {
                    let amplitude = from + (to - from) * i as f64 / (points - 1) as f64;
                    SweepPoint {
                        parameters,
                        stimulus: Stimulus::Pulse {
                            amplitude,
                            start: 0.0,
                            duration: stim_duration,
                        },
                    }
                })
                .collect();

            let bar = ProgressBar::new_spinner();
            bar.set_message(format!("running {points} simulations"));
            bar.enable_steady_tick(Duration::from_millis(100));
            let traces = sweep(&sweep_points, config, State::resting());
            bar.finish_and_clear();

            println!("{}", "Amplitude sweep:".green().bold());
            for (point, trace) in sweep_points.iter().zip(&traces) {
                let amplitude = point.stimulus.at(0.0);
                let peak = trace.peak_potential().unwrap_or(0.0);
                let excited = peak >= parameters.u_gate;
                let verdict = if excited {
                    format!("action potential (APD {:.1})", apd(trace, parameters.u_gate)).cyan()
                } else {
                    "no response".dimmed()
                };
                println!("  I = {:.4}  peak u = {:.3}  {}", amplitude, peak, verdict);
            }
        }

        Commands::Defaults => {
            let p = Parameters::default();
            println!("{}", "Canonical Mitchell-Schaeffer parameters:".green().bold());
            println!("  {} = {}", "tau_in".cyan(), p.tau_in);
            println!("  {} = {}", "tau_out".cyan(), p.tau_out);
            println!("  {} = {}", "tau_open".cyan(), p.tau_open);
            println!("  {} = {}", "tau_close".cyan(), p.tau_close);
            println!("  {} = {}", "u_gate".cyan(), p.u_gate);
        }
    }

    Ok(())
}

fn write_trace(trace: &Trace, path: &PathBuf) -> anyhow::Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let writer = BufWriter::new(file);

    match path.extension().and_then(|e| e.to_str()) {
        Some("csv") => trace.to_csv(writer)?,
        Some("json") => serde_json::to_writer(writer, trace.samples())?,
        _ => bail!("unsupported output format (use .csv or .json)"),
    }

    println!(
        "{} {} ({} samples)",
        "Wrote".green().bold(),
        path.display(),
        trace.len()
    );
    Ok(())
}

fn print_summary(trace: &Trace, parameters: &Parameters) {
    let peak = trace.peak_potential().unwrap_or(0.0);
    let last = trace.last().expect("trace is never empty");

    println!("{}", "Simulation complete".green().bold());
    println!("  samples: {}", trace.len());
    println!("  peak u:  {:.4}", peak);
    println!("  final:   u = {:.4}, h = {:.4} at t = {}", last.u, last.h, last.t);
    if peak >= parameters.u_gate {
        println!(
            "  {} (above threshold for {:.1} time units)",
            "excited".cyan(),
            apd(trace, parameters.u_gate)
        );
    } else {
        println!("  {}", "sub-threshold".dimmed());
    }
}
