/*
 *  bin/marquee-receiver.rs
 *
 *  Marquee - text in lights
 *  (c) 2017-26 David Walker
 *
 *  Node receiver: listens for set/show/off/shutdown and drives the lamps
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use clap::{ArgAction, Parser, ValueHint};
use env_logger::Env;
use log::{error, info};
use tokio::signal::unix::{SignalKind, signal};

use marquee::config::{self, Overrides};
use marquee::lamps::{self, DriverKind};
use marquee::receiver::{self, Receiver};

include!(concat!(env!("OUT_DIR"), "/build_info.rs"));

/// CLI overrides. All fields are Options so we can layer them over YAML.
#[derive(Debug, Parser, Clone)]
#[command(name = "marquee-receiver", version, about = "Marquee node: shows lamp colours sent by the controller")]
struct Cli {
    /// Path to a YAML config file (overrides search)
    #[arg(short, long, value_hint = ValueHint::FilePath)]
    config: Option<PathBuf>,
    /// Enable debug log level
    #[arg(short = 'v', long = "debug", alias = "verbose", action = ArgAction::SetTrue)]
    debug: bool,
    /// dump fully merged config (after overrides) and exit
    #[arg(long, action = ArgAction::SetTrue)]
    dump_config: bool,
    /// Address to listen on, e.g. 0.0.0.0:13000
    #[arg(long)]
    bind: Option<SocketAddr>,
    #[arg(long, value_enum)]
    driver: Option<DriverKind>,
    /// Lamp brightness, 0.0 to 1.0
    #[arg(long)]
    brightness: Option<f32>,
    /// Lamps on this node
    #[arg(long)]
    lamps: Option<usize>,
}

async fn signal_handler() -> Result<(), std::io::Error> {
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sighup = signal(SignalKind::hangup())?;

    tokio::select! {
        _ = sigint.recv() => info!("SIGINT received. Stopping receiver."),
        _ = sigterm.recv() => info!("SIGTERM received. Stopping receiver."),
        _ = sighup.recv() => info!("SIGHUP received. Stopping receiver."),
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let overrides = Overrides {
        log_level: cli.debug.then(|| "debug".to_string()),
        bind: cli.bind,
        driver: cli.driver,
        brightness: cli.brightness,
        lamps: cli.lamps,
        ..Default::default()
    };
    let cfg = config::load(cli.config.as_deref(), &overrides).context("configuration")?;

    if cli.dump_config {
        print!("{}", cfg.to_yaml()?);
        return Ok(());
    }

    env_logger::Builder::from_env(Env::default().default_filter_or(cfg.log_level.as_str()))
        .format_timestamp_secs()
        .init();
    info!("v.{} built {}", env!("CARGO_PKG_VERSION"), BUILD_DATE);

    let lamps = lamps::open(cfg.receiver.driver, cfg.grid.lamps, cfg.receiver.brightness)
        .context("cannot open lamps")?;
    let socket = receiver::bind(cfg.receiver_addr()).context("cannot open the receiver socket")?;
    let mut receiver = Receiver::new(lamps);

    tokio::select! {
        r = signal_handler() => {
            if let Err(e) = r {
                error!("Signal handlers not installed: {}", e);
            }
        }
        _ = receiver.run(&socket) => {}
    }

    if cfg.receiver.driver == DriverKind::Terminal {
        println!();
    }
    Ok(())
}
