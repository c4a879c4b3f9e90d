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

//! the time cursor state machine that replays a route
//!
//! ```text
//!   STOPPED --play--> PLAYING <--play/pause--> PAUSED
//!      ^                 |                        |
//!      +--stop/end-------+-----------stop---------+
//! ```

use std::{collections::HashMap, time::Duration};
use serde::{Serialize,Deserialize};
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};
use tracing::{debug,info};
use fleet_common::{BoundingBox, datetime::EpochMillis};

use crate::{errors::{op_failed, Result}, sample::RoutePoint};

#[derive(Debug,Clone,Copy,PartialEq,Eq,Serialize,Deserialize)]
pub enum PlaybackStatus {
    Stopped,
    Playing,
    Paused,
}

/// snapshot of the playback state that is reported to clients
#[derive(Debug,Clone,PartialEq,Serialize,Deserialize)]
pub struct PlaybackState {
    pub status: PlaybackStatus,
    pub cursor: Option<EpochMillis>,
    pub speed: f64,
    pub is_region_mode: bool,
}

/// playback controller of one mounted view. The controller owns its tick timer, which only exists
/// while PLAYING and is dropped on pause, stop and dispose
pub struct PlaybackController {
    status: PlaybackStatus,
    cursor: Option<EpochMillis>,
    speed: f64,
    is_region_mode: bool,
    region: Option<BoundingBox<f64>>,

    tick: Duration,
    ticker: Option<Interval>,
    last_tick: Option<Instant>,
}

impl PlaybackController {
    pub fn new (tick: Duration, speed: f64, region: Option<BoundingBox<f64>>)->Self {
        PlaybackController {
            status: PlaybackStatus::Stopped,
            cursor: None,
            speed,
            is_region_mode: false,
            region,
            tick,
            ticker: None,
            last_tick: None,
        }
    }

    pub fn status (&self)->PlaybackStatus { self.status }
    pub fn cursor (&self)->Option<EpochMillis> { self.cursor }
    pub fn speed (&self)->f64 { self.speed }
    pub fn is_region_mode (&self)->bool { self.is_region_mode }
    pub fn is_playing (&self)->bool { self.status == PlaybackStatus::Playing }

    pub fn state (&self)->PlaybackState {
        PlaybackState { status: self.status, cursor: self.cursor, speed: self.speed, is_region_mode: self.is_region_mode }
    }

    /// STOPPED/PAUSED -> PLAYING. Starting from STOPPED puts the cursor at the begin of the route.
    /// Returns false if there is nothing to play
    pub fn play (&mut self, route: &[RoutePoint])->bool {
        let Some((start,_)) = route_range( route) else {
            info!("ignoring play request for empty route");
            return false
        };

        match self.status {
            PlaybackStatus::Playing => {}
            PlaybackStatus::Stopped => {
                self.cursor = Some(start);
                self.start_ticking();
            }
            PlaybackStatus::Paused => {
                if self.cursor.is_none() { self.cursor = Some(start) }
                self.start_ticking();
            }
        }
        true
    }

    /// PLAYING -> PAUSED, cursor is retained. No-op in any other state
    pub fn pause (&mut self) {
        if self.status == PlaybackStatus::Playing {
            self.status = PlaybackStatus::Paused;
            self.stop_ticking();
            debug!("playback paused at {:?}", self.cursor);
        }
    }

    /// any state -> STOPPED, clears the cursor
    pub fn stop (&mut self) {
        self.status = PlaybackStatus::Stopped;
        self.cursor = None;
        self.stop_ticking();
    }

    /// takes effect with the next tick
    pub fn set_speed (&mut self, multiplier: f64)->Result<()> {
        if multiplier.is_finite() && multiplier > 0.0 {
            self.speed = multiplier;
            Ok(())
        } else {
            Err( op_failed( format!("invalid playback speed {multiplier}")))
        }
    }

    pub fn set_region (&mut self, is_region_mode: bool) { self.is_region_mode = is_region_mode }

    pub fn set_region_bounds (&mut self, region: Option<BoundingBox<f64>>) { self.region = region }

    fn start_ticking (&mut self) {
        self.status = PlaybackStatus::Playing;
        self.ticker = None; // created lazily by next_tick() since we need a runtime for it
        self.last_tick = None;
    }

    fn stop_ticking (&mut self) {
        self.ticker = None;
        self.last_tick = None;
    }

    /// wait for the next tick and return the wall clock time elapsed since the last one. This never
    /// completes if we are not playing, which makes it suitable for a `select!` branch
    pub async fn next_tick (&mut self)->Duration {
        if !self.is_playing() {
            return std::future::pending().await
        }

        let tick = self.tick;
        let ticker = self.ticker.get_or_insert_with( || {
            let mut iv = interval_at( Instant::now() + tick, tick);
            iv.set_missed_tick_behavior( MissedTickBehavior::Delay);
            iv
        });
        let last = *self.last_tick.get_or_insert_with( Instant::now);

        let now = ticker.tick().await;
        self.last_tick = Some(now);
        now.saturating_duration_since( last)
    }

    /// advance the cursor by `elapsed` wall clock time scaled by the speed multiplier. Reaching the end of
    /// the route stops playback with the cursor left at the last route timestamp
    pub fn advance (&mut self, elapsed: Duration, route: &[RoutePoint])->Option<EpochMillis> {
        if !self.is_playing() { return self.cursor }

        let Some((start,end)) = route_range( route) else {
            info!("route became empty, stopping playback");
            self.stop();
            return None
        };

        let step = (elapsed.as_millis() as f64 * self.speed).round() as i64;
        let cursor = self.cursor.unwrap_or(start).millis().saturating_add( step);

        if cursor >= end.millis() {
            self.cursor = Some(end);
            self.status = PlaybackStatus::Stopped;
            self.stop_ticking();
            info!("playback reached end of route at {end}");
        } else {
            self.cursor = Some( EpochMillis::new( cursor.max( start.millis())));
        }
        self.cursor
    }

    /// the most recent route point of `id_machine` at or before the cursor
    pub fn position_at_cursor (&self, id_machine: &str, route: &[RoutePoint])->Option<RoutePoint> {
        let cursor = self.cursor?;
        route.iter()
            .filter( |p| p.id_machine.as_str() == id_machine && p.date() <= cursor && self.in_region(p))
            .max_by( |a,b| a.timestamp_secs.total_cmp( &b.timestamp_secs))
            .cloned()
    }

    /// one entry per machine, ordered by machine id
    pub fn positions_at_cursor (&self, route: &[RoutePoint])->Vec<RoutePoint> {
        let Some(cursor) = self.cursor else { return Vec::new() };

        let mut latest: HashMap<&str,&RoutePoint> = HashMap::new();
        for p in route.iter().filter( |p| p.date() <= cursor && self.in_region(p)) {
            let e = latest.entry( p.id_machine.as_str()).or_insert(p);
            if p.timestamp_secs > e.timestamp_secs { *e = p }
        }

        let mut positions: Vec<RoutePoint> = latest.into_values().cloned().collect();
        positions.sort_by( |a,b| a.id_machine.cmp( &b.id_machine));
        positions
    }

    fn in_region (&self, p: &RoutePoint)->bool {
        match (self.is_region_mode, &self.region) {
            (true, Some(bbox)) => bbox.contains( p.lon, p.lat),
            _ => true
        }
    }

    /// explicit end of life. Stops playback and releases the timer
    pub fn dispose (&mut self) {
        self.stop();
        debug!("playback controller disposed");
    }
}

/// the (min,max) timestamps of a route, which is in arrival order and hence not necessarily sorted
pub fn route_range (route: &[RoutePoint])->Option<(EpochMillis,EpochMillis)> {
    route.iter().fold( None, |acc, p| {
        let d = p.date();
        match acc {
            None => Some((d,d)),
            Some((min,max)) => Some(( min.min(d), max.max(d) ))
        }
    })
}
