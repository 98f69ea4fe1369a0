use carbody_planner::io;
use carbody_planner::prelude::*;
use carbody_planner::solver::SolverConfig;

pub mod args;

use args::Args;

fn main() {
    let args = match <Args as clap::Parser>::try_parse() {
        Ok(args) => args,
        Err(err) => {
            use clap::error::ErrorKind::*;

            let exit_code = match err.kind() {
                DisplayHelp | DisplayHelpOnMissingArgumentOrSubcommand | DisplayVersion => 0,
                _ => 2,
            };

            err.print().unwrap();
            std::process::exit(exit_code);
        }
    };

    let filter = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .init();

    match run(args) {
        Ok(exit_code) => std::process::exit(exit_code),
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(2);
        }
    };
}

fn run(args: Args) -> Result<i32, PlannerError> {
    let tables = io::load_input(&args.input_dir)?;

    let session = Session {
        orders: tables.orders,
        shifts: tables.shifts,
        raw_tasks: tables.raw_tasks,
        stations: tables.stations,
        solver_config: SolverConfig {
            time_limit: std::time::Duration::from_secs(args.time_limit_secs),
            num_workers: args.workers,
            debug: args.debug_dump,
        },
    };

    let output = session.run()?;

    let output_dir = args.input_dir.join("output");
    io::write_output(&output_dir, &output.solution, &session.stations, &output.outcome, args.debug_dump)?;

    match output.solution.status {
        SolverStatus::Optimal | SolverStatus::Feasible => Ok(0),
        SolverStatus::Infeasible | SolverStatus::Unknown => Ok(2),
    }
}
