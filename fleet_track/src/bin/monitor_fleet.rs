/*
 * Copyright © 2025, United States Government, as represented by the Administrator of
 * the National Aeronautics and Space Administration. All rights reserved.
 *
 * The “ODIN” software is licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License. You may obtain a copy
 * of the License at http://www.apache.org/licenses/LICENSE-2.0.
 *
 * Unless required by applicable law or agreed to in writing, software distributed under
 * the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND,
 * either express or implied. See the License for the specific language governing permissions
 * and limitations under the License.
 */

use std::{sync::Arc, time::Duration};
use anyhow::Result;
use clap::Parser;
use lazy_static::lazy_static;
use tokio::{sync::mpsc, time::interval};
use tracing_subscriber::EnvFilter;

use fleet_track::{
    load_fleet_config, TrajectoryEngine,
    history::HttpHistorySource,
    live_connector::WsPushChannel,
    schema::SchemaRegistry,
};

/// monitor live positions of the configured fleet assets
#[derive(Parser)]
#[command(about="fleet position monitoring tool")]
struct CliOpts {
    /// seconds between position reports
    #[arg(long, default_value_t=10)]
    report_interval: u64,

    /// optional pathname of the collection schema (RON)
    #[arg(long)]
    schema: Option<String>,

    /// pathname of the fleet_track config (RON)
    config: String,
}

lazy_static! { static ref ARGS: CliOpts = CliOpts::parse(); }

#[tokio::main]
async fn main()->Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter( EnvFilter::from_default_env()) // use RUST_LOG to set max level
        .init();

    let config = load_fleet_config( &ARGS.config)?;
    let schema = match &ARGS.schema {
        Some(path) => SchemaRegistry::get_or_load( fleet_track::schema::POSITIONS_COLLECTION, path)?,
        None => SchemaRegistry::positions()
    };

    let (deliveries_tx, deliveries_rx) = mpsc::channel(256);
    let channel = Arc::new( WsPushChannel::spawn( &config, deliveries_tx));
    let history = Arc::new( HttpHistorySource::new( &config.base_url, config.access_token.clone()));
    let watched = config.watched.clone();

    let engine = TrajectoryEngine::spawn( config, schema, history, channel, deliveries_rx)?;
    let change = engine.set_watched( watched.clone()).await?;
    println!("joined topics: {:?}", change.joined);

    let mut report = interval( Duration::from_secs( ARGS.report_interval));
    loop {
        tokio::select! {
            _ = report.tick() => {
                for asset in &watched {
                    let pos = engine.current_position( &asset.id_machine).await?;
                    let hdg = engine.current_heading( &asset.id_machine).await?;
                    match pos {
                        Some([lat,lon]) => println!("{}: {:.5},{:.5} heading: {:?}", asset.id_machine, lat, lon, hdg),
                        None => println!("{}: no position", asset.id_machine)
                    }
                }
                let status = engine.status().await?;
                if status.is_stale { println!("stale data: {:?}", status.last_error) }
            }
            _ = tokio::signal::ctrl_c() => {
                println!("shutting down..");
                break
            }
        }
    }

    engine.shutdown().await?;
    Ok(())
}
