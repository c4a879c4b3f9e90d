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

use std::{path::Path, time::Duration};
use serde::{Serialize,Deserialize,de::DeserializeOwned};
use tracing::info;
use fleet_common::{BoundingBox, MAX_DECIMALS, datetime::{deserialize_duration, secs}};

use crate::{
    errors::{FleetTrackError, Result},
    history::DEFAULT_HISTORY_HOURS,
    normalize::{CoordinateNormalizer, CoordinateOrder},
    sample::WatchedAsset,
    store::DEFAULT_ROUTE_CAPACITY,
    subscription::DEFAULT_TOPIC_PREFIX,
};

/// configuration of a trajectory engine instance (one per mounted map view)
#[derive(Debug,Clone,Serialize,Deserialize)]
pub struct FleetTrackConfig {
    pub base_url: String,
    pub ws_url: String,

    #[serde(default)]
    pub access_token: Option<String>,

    #[serde(default="default_topic_prefix")]
    pub topic_prefix: String,

    #[serde(default)]
    pub watched: Vec<WatchedAsset>,

    #[serde(default="default_route_capacity")]
    pub route_capacity: usize,

    #[serde(default)]
    pub coordinate_order: CoordinateOrder,

    #[serde(default)]
    pub decimals: Option<u32>,

    /// visual rotation of the heading icon in degrees
    #[serde(default)]
    pub heading_offset: f64,

    #[serde(default="default_speed")]
    pub default_speed: f64,

    #[serde(default="default_playback_tick", deserialize_with="deserialize_duration", serialize_with="serialize_duration")]
    pub playback_tick: Duration,

    #[serde(default="default_initial_hours")]
    pub initial_hours: u32,

    #[serde(default="default_reconnect_delay", deserialize_with="deserialize_duration", serialize_with="serialize_duration")]
    pub reconnect_delay: Duration,

    /// optional bounds for region playback mode
    #[serde(default)]
    pub region: Option<BoundingBox<f64>>,
}

fn default_topic_prefix()->String { DEFAULT_TOPIC_PREFIX.to_string() }
fn default_route_capacity()->usize { DEFAULT_ROUTE_CAPACITY }
fn default_speed()->f64 { 1.0 }
fn default_playback_tick()->Duration { secs(1) }
fn default_initial_hours()->u32 { DEFAULT_HISTORY_HOURS }
fn default_reconnect_delay()->Duration { secs(5) }

fn serialize_duration<S> (d: &Duration, serializer: S)->std::result::Result<S::Ok,S::Error> where S: serde::Serializer {
    serializer.serialize_str( &format!("{}ms", d.as_millis()))
}

impl Default for FleetTrackConfig {
    fn default()->Self {
        FleetTrackConfig {
            base_url: "http://localhost:8080/api".to_string(),
            ws_url: "ws://localhost:8080/socket".to_string(),
            access_token: None,
            topic_prefix: default_topic_prefix(),
            watched: Vec::new(),
            route_capacity: default_route_capacity(),
            coordinate_order: CoordinateOrder::default(),
            decimals: None,
            heading_offset: 0.0,
            default_speed: default_speed(),
            playback_tick: default_playback_tick(),
            initial_hours: default_initial_hours(),
            reconnect_delay: default_reconnect_delay(),
            region: None,
        }
    }
}

impl FleetTrackConfig {
    pub fn normalizer (&self)->CoordinateNormalizer {
        CoordinateNormalizer::new( self.coordinate_order, self.decimals)
    }

    pub fn validate (&self)->Result<()> {
        if self.route_capacity == 0 {
            return Err( FleetTrackError::Config("route_capacity has to be > 0".to_string()))
        }
        if !(self.default_speed.is_finite() && self.default_speed > 0.0) {
            return Err( FleetTrackError::Config( format!("invalid default_speed {}", self.default_speed)))
        }
        if self.playback_tick.is_zero() {
            return Err( FleetTrackError::Config("playback_tick has to be > 0".to_string()))
        }
        if let Some(decimals) = self.decimals {
            if decimals > MAX_DECIMALS {
                return Err( FleetTrackError::Config( format!("decimals has to be <= {MAX_DECIMALS}, got {decimals}")))
            }
        }
        if !self.heading_offset.is_finite() {
            return Err( FleetTrackError::Config("heading_offset has to be finite".to_string()))
        }
        Ok(())
    }
}

/// generic RON config loader
pub fn load_config<C> (path: impl AsRef<Path>)->Result<C> where C: DeserializeOwned {
    let path = path.as_ref();
    let s = std::fs::read_to_string( path)?;
    let config: C = ron::from_str( &s)?;
    info!("loaded config {path:?}");
    Ok(config)
}

/// load and validate a [`FleetTrackConfig`]
pub fn load_fleet_config (path: impl AsRef<Path>)->Result<FleetTrackConfig> {
    let config: FleetTrackConfig = load_config( path)?;
    config.validate()?;
    Ok(config)
}
