/*
 *  main.rs
 *
 *  Marquee - text in lights
 *  (c) 2017-26 David Walker
 *
 *  Interactive controller: reads text and [directives], scrolls them
 *  across the node grid
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

use std::io::{self, BufRead};
use std::net::Ipv4Addr;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Arg, ArgAction, Command, value_parser};
use env_logger::Env;
use log::{error, info, warn};
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::mpsc;

use marquee::config::{self, Overrides};
use marquee::scheduler::ScrollScheduler;
use marquee::session::Session;
use marquee::transport::NodeGrid;

include!(concat!(env!("OUT_DIR"), "/build_info.rs"));

/// Waits for SIGINT, SIGTERM or SIGHUP and logs which one arrived.
async fn signal_handler() -> Result<(), io::Error> {
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sighup = signal(SignalKind::hangup())?;

    tokio::select! {
        _ = sigint.recv() => {
            info!("SIGINT received. Initiating graceful shutdown.");
        }
        _ = sigterm.recv() => {
            info!("SIGTERM received. Initiating graceful shutdown.");
        }
        _ = sighup.recv() => {
            info!("SIGHUP received. Initiating graceful shutdown.");
        }
    }
    Ok(())
}

/// Forward stdin lines to the session.
///
/// A blocking read cannot be cancelled, so this is a plain thread that dies
/// with the process rather than a runtime task the runtime would wait on.
fn spawn_stdin_reader(tx: mpsc::Sender<String>) {
    std::thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            match line {
                Ok(line) => {
                    if tx.blocking_send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!("stdin: {}", e);
                    break;
                }
            }
        }
    });
}

fn cli() -> Command {
    Command::new(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .author(env!("CARGO_PKG_AUTHORS"))
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .arg(Arg::new("config")
        .short('c')
        .long("config")
        .value_parser(value_parser!(PathBuf))
        .help("YAML config file (default: search the usual places)"))
        .arg(Arg::new("debug")
        .action(ArgAction::SetTrue)
        .long("debug")
        .short('v')
        .alias("verbose")
        .help("Enable debug log level"))
        .arg(Arg::new("dump-config")
        .action(ArgAction::SetTrue)
        .long("dump-config")
        .help("Print the effective config as YAML and exit"))
        .arg(Arg::new("preview")
        .action(ArgAction::SetTrue)
        .long("preview")
        .help("Also draw every scroll step on this terminal"))
        .arg(Arg::new("sleep")
        .long("sleep")
        .value_parser(value_parser!(f64))
        .help("Seconds between one-column scroll steps"))
        .arg(Arg::new("fg")
        .long("fg")
        .help("Starting foreground colour (name, r,g,b or random)"))
        .arg(Arg::new("bg")
        .long("bg")
        .help("Starting background colour (name, r,g,b or random)"))
        .arg(Arg::new("port")
        .long("port")
        .value_parser(value_parser!(u16))
        .help("Local UDP port the controller sends from"))
        .arg(Arg::new("node-port")
        .long("node-port")
        .value_parser(value_parser!(u16))
        .help("UDP port the nodes listen on"))
        .arg(Arg::new("broadcast")
        .long("broadcast")
        .value_parser(value_parser!(Ipv4Addr))
        .help("Broadcast address of the node subnet"))
        .arg(Arg::new("message")
        .num_args(1..)
        .help("Text to show before reading from stdin"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = cli().get_matches();

    let debug_enabled = matches.get_flag("debug");
    let overrides = Overrides {
        log_level: debug_enabled.then(|| "debug".to_string()),
        sleep: matches.get_one::<f64>("sleep").copied(),
        foreground: matches.get_one::<String>("fg").cloned(),
        background: matches.get_one::<String>("bg").cloned(),
        preview: matches.get_flag("preview").then_some(true),
        controller_port: matches.get_one::<u16>("port").copied(),
        node_port: matches.get_one::<u16>("node-port").copied(),
        broadcast: matches.get_one::<Ipv4Addr>("broadcast").copied(),
        ..Default::default()
    };
    let config_file = matches.get_one::<PathBuf>("config");
    let cfg = config::load(config_file.map(PathBuf::as_path), &overrides).context("configuration")?;

    if matches.get_flag("dump-config") {
        print!("{}", cfg.to_yaml()?);
        return Ok(());
    }

    env_logger::Builder::from_env(Env::default().default_filter_or(cfg.log_level.as_str()))
        .format_timestamp_secs()
        .init();

    info!("This is {}, text in lights", env!("CARGO_PKG_NAME"));
    info!("v.{} built {}", env!("CARGO_PKG_VERSION"), BUILD_DATE);

    let font = cfg.font_table().context("font")?;
    let state = cfg.initial_state()?;
    let grid = NodeGrid::bind(cfg.node_table()?, cfg.broadcast_addr(), cfg.controller_addr(), cfg.send_timeout())
        .context("cannot open the controller socket")?
        .with_mirror(cfg.network.mirror);
    let scheduler = ScrollScheduler::new(cfg.geometry()).with_preview(cfg.scroll.preview);
    let mut session = Session::new(font, state, scheduler, grid);

    let (tx, rx) = mpsc::channel(16);
    if let Some(words) = matches.get_many::<String>("message") {
        let message = words.cloned().collect::<Vec<_>>().join(" ");
        tx.send(message).await?;
    }
    spawn_stdin_reader(tx);

    println!("Type '[help]' for instructions");
    tokio::select! {
        // Handle Unix signals for graceful shutdown
        r = signal_handler() => {
            if let Err(e) = r {
                error!("Signal handlers not installed: {}", e);
            }
        }
        _ = session.run(rx, true) => {}
    }

    // closes the socket
    drop(session);
    info!("Marquee stopped");
    Ok(())
}
