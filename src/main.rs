// Copyright 2025 Chris Custine
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

mod config;
mod flight_plan;
mod host;
mod notify;
mod refresh;
mod registry;
mod routes;
mod sync;
mod tracks;
mod worker;

use std::error::Error;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use log::{info, warn};

use config::AppConfig;
use host::ReplayHost;
use notify::NotificationLevel;
use refresh::RefreshDriver;
use sync::DataService;

#[derive(Parser, Debug)]
#[command(version, about = "Oceanic track and clearance sync for radar overlays")]
struct Cli {
    /// Use the event track feed instead of the published tracks
    #[arg(long, global = true)]
    event: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch and print the current track publication
    Tracks,
    /// Fetch clearance data for one flight
    Flight { callsign: String },
    /// Drive the refresh loop from a recorded host session
    Replay {
        path: PathBuf,
        /// Stop after this many ticks (default: one per recorded frame)
        #[arg(long)]
        ticks: Option<usize>,
        /// Override the configured tick period
        #[arg(long)]
        interval_ms: Option<u64>,
    },
    /// Show where the configuration file lives and its effective values
    Config,
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let mut config = AppConfig::load()?;
    if cli.event {
        config.use_event_tracks = true;
    }

    match cli.command {
        Command::Tracks => print_tracks(&config),
        Command::Flight { callsign } => print_flight(&config, &callsign),
        Command::Replay {
            path,
            ticks,
            interval_ms,
        } => replay(&config, &path, ticks, interval_ms),
        Command::Config => {
            println!("{}", AppConfig::get_config_path()?.display());
            println!("{config:#?}");
            Ok(())
        }
    }
}

fn print_tracks(config: &AppConfig) -> Result<(), Box<dyn Error>> {
    let service = DataService::from_config(config)?;
    let Some(tracks) = service.load_tracks_now() else {
        service.shutdown();
        return Err("track data unavailable".into());
    };

    println!(
        "TMI {} ({} tracks, {} fixes, loaded {})",
        tracks.tmi().unwrap_or("-"),
        tracks.len(),
        service.fixes().len(),
        tracks
            .loaded_at()
            .map_or_else(|| "-".to_string(), |t| t.format("%H%MZ").to_string())
    );
    for track in tracks.iter() {
        let levels: Vec<String> = track.flight_levels.iter().map(u32::to_string).collect();
        println!(
            "{:<6} {:<8?} {}  FL {}",
            track.identifier,
            track.direction,
            track.route_names().join(" "),
            levels.join(",")
        );
    }
    service.shutdown();
    Ok(())
}

fn print_flight(config: &AppConfig, callsign: &str) -> Result<(), Box<dyn Error>> {
    let service = DataService::from_config(config)?;
    let record = service.fetch_flight_now(callsign);
    service.shutdown();

    let Some(record) = record else {
        return Err("no flight-data API configured (set api_base_url)".into());
    };
    if !record.is_valid {
        println!("{}: no data", record.callsign);
        return Ok(());
    }

    let show = |value: Option<&str>| value.unwrap_or("-").to_string();
    println!("{}", record.callsign);
    println!("  track        {}", show(record.track.as_deref()));
    println!("  route        {}", show(record.route.as_deref()));
    println!("  destination  {}", show(record.destination.as_deref()));
    println!(
        "  level/mach   {} / {}",
        show(record.assigned_level.as_deref()),
        show(record.assigned_mach.as_deref())
    );
    println!("  logged onto  {}", show(record.logged_onto.as_deref()));
    Ok(())
}

fn replay(
    config: &AppConfig,
    path: &std::path::Path,
    ticks: Option<usize>,
    interval_ms: Option<u64>,
) -> Result<(), Box<dyn Error>> {
    let mut host = ReplayHost::load(path)?;
    let service = DataService::from_config(config)?;
    let mut notifications = service.subscribe();

    service.populate_tracks();
    if config.track_refresh_minutes > 0 {
        service.start_track_refresh(Duration::from_secs(config.track_refresh_minutes * 60));
    }

    let driver = RefreshDriver::new(service.registry().clone(), config.inbound_window_minutes);
    let interval = Duration::from_millis(interval_ms.unwrap_or(config.refresh_interval_ms));
    let ticks = ticks.unwrap_or_else(|| host.frame_count());
    if ticks > host.frame_count() {
        warn!("Replay has {} frames, the last one repeats", host.frame_count());
    }

    for tick in 0..ticks {
        while let Ok(note) = notifications.try_recv() {
            match note.level {
                NotificationLevel::Info => println!("{}", note.text),
                NotificationLevel::Error => eprintln!("{}", note.text),
            }
        }

        let snapshot = driver.tick(&host);
        for callsign in &snapshot.new_callsigns {
            service.sync_flight(callsign);
        }

        info!(
            "Tick {}: {} inbound, {} other, {} new, {} removed",
            tick + 1,
            snapshot.inbound.len(),
            snapshot.other.len(),
            snapshot.new_callsigns.len(),
            snapshot.removed_callsigns.len()
        );
        for inbound in &snapshot.inbound {
            println!(
                "  IN  {:?} via {} in {} min  {}",
                inbound.direction, inbound.entry_point, inbound.entry_minutes, inbound.plan
            );
        }
        for plan in &snapshot.other {
            println!("  OTH {plan}");
        }

        host.advance();
        std::thread::sleep(interval);
    }

    println!(
        "Registry at end of replay (TMI {}):",
        service.tracks().current_tmi().as_deref().unwrap_or("-")
    );
    let registry = service.registry();
    let mut callsigns = registry.callsigns();
    callsigns.sort();
    for callsign in callsigns {
        println!("  {}", registry.read_or_invalid(&callsign));
    }

    service.shutdown();
    Ok(())
}
