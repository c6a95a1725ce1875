// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::{env, error::Error};

use vio_eskf::core::filter::{self, Tracker};
use vio_eskf::core::state::diagonal_covariance;
use vio_eskf::dataset::synthetic::{self, Synthetic};
use vio_eskf::math::se3;
use vio_eskf::misc::blocks::ErrorBlock;

fn main() {
    env_logger::init();
    let args: Vec<String> = env::args().collect();
    if let Err(error) = my_run(&args) {
        eprintln!("{}", error);
    }
}

const USAGE: &str = "Usage: ./vio_simulate [ideal|noisy] nb_windows [seed]";

fn my_run(args: &[String]) -> Result<(), Box<dyn Error>> {
    // Check that the arguments are correct.
    let valid_args = check_args(args)?;

    // Setup the synthetic stream.
    let sim_config = synthetic::Config {
        seed: valid_args.seed,
        ..valid_args.sim_config
    };
    let stream = Synthetic::new(sim_config);

    // Initialize the tracker at the true initial state.
    let covariance = diagonal_covariance(&[
        (ErrorBlock::Gravity, 0.1),
        (ErrorBlock::Velocity, 0.1),
        (ErrorBlock::GyroBias, 1e-3),
        (ErrorBlock::AccelBias, 1e-2),
    ]);
    let config = filter::Config {
        calibration: sim_config.calibration,
        ..filter::Config::default()
    };
    let mut tracker: Tracker = config.init(sim_config.initial_state(), covariance);

    // Track every window and print the pose error.
    println!("# window end_time angle_error position_error");
    for window in stream.take(valid_args.nb_windows) {
        let end_time = window.imu.last().map_or(0.0, |s| s.time);
        tracker.track(&window.imu, &window.measurement)?;
        let (index, pose) = tracker.current_frame();
        let (angle, dist) = se3::distance(&pose, &window.true_pose);
        println!("{} {:.3} {:.6} {:.6}", index, end_time, angle, dist);
    }

    Ok(())
}

struct Args {
    sim_config: synthetic::Config,
    nb_windows: usize,
    seed: u64,
}

/// Verify that command line arguments are correct.
fn check_args(args: &[String]) -> Result<Args, String> {
    let (mode, nb_windows, seed) = match args {
        [_, mode, nb_windows] => (mode, nb_windows, None),
        [_, mode, nb_windows, seed] => (mode, nb_windows, Some(seed)),
        _ => {
            eprintln!("{}", USAGE);
            return Err("Wrong number of arguments".to_string());
        }
    };
    let sim_config = match mode.as_str() {
        "ideal" => synthetic::Config::default(),
        "noisy" => synthetic::Config::default().noisy(),
        _ => {
            eprintln!("{}", USAGE);
            return Err(format!("Unknown mode: {}", mode));
        }
    };
    let nb_windows = nb_windows
        .parse::<usize>()
        .map_err(|_| format!("Invalid number of windows: {}", nb_windows))?;
    let seed = match seed {
        Some(s) => s.parse::<u64>().map_err(|_| format!("Invalid seed: {}", s))?,
        None => 0,
    };
    Ok(Args {
        sim_config,
        nb_windows,
        seed,
    })
}
