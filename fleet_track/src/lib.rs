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

//! live fleet position/trajectory engine
//!
//! Merges a bulk decoded historical position collection with live per-topic push updates, keeps the
//! latest position and heading per (machine,sensor) and a bounded route, and replays that route
//! with a playback cursor. See [`engine::TrajectoryEngine`] for the entry point.

pub mod errors;
pub mod sample;
pub mod normalize;
pub mod schema;
pub mod decoder;
pub mod reconciler;
pub mod store;
pub mod subscription;
pub mod playback;
pub mod history;
pub mod live_connector;
pub mod config;
pub mod engine;

pub use errors::{FleetTrackError, Result};
pub use sample::{Sample, SampleValue, SensorKind, TrajectoryKey, WatchedAsset, RoutePoint};
pub use engine::{TrajectoryEngine, EngineHandle, EngineStatus};
pub use config::{FleetTrackConfig, load_config, load_fleet_config};
