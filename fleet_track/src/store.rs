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

use std::collections::VecDeque;
use serde::{Serialize,Deserialize};
use tracing::{debug,trace};
use fleet_common::{collections::RingDeque, angle::normalize_360};

use crate::{
    decoder::DecodedCollection,
    errors::NormalizeError,
    normalize::CoordinateNormalizer,
    reconciler::{Reconciled, SampleReconciler},
    sample::{RoutePoint, Sample, SampleValue},
};

pub const DEFAULT_ROUTE_CAPACITY: usize = 1000;

/// diagnostic counters of a [`TrajectoryStore`]
#[derive(Debug,Clone,Copy,Default,PartialEq,Eq,Serialize,Deserialize)]
pub struct StoreStats {
    pub n_positions: usize,
    pub n_headings: usize,
    pub n_route: usize,
    pub n_dropped_invalid: usize,
    pub n_rejected_stale: usize,
}

/// what we got out of a bulk load
#[derive(Debug,Clone,Copy,Default,PartialEq,Eq)]
pub struct LoadSummary {
    pub n_accepted: usize,
    pub n_stale: usize,
    pub n_dropped: usize,
}

/// the in-memory trajectory state of one mounted map view: current position and heading heads per
/// (machine,sensor) key plus the bounded route buffer.
///
/// All mutation goes through reconciliation or decoded bulk data. The store itself is not synchronized,
/// it is owned by exactly one engine task
#[derive(Debug)]
pub struct TrajectoryStore {
    normalizer: CoordinateNormalizer,
    route_capacity: usize,

    positions: SampleReconciler,
    headings: SampleReconciler,

    route: VecDeque<RoutePoint>,
    historical_route: Vec<RoutePoint>, // bulk decoded fallback until the route buffer gets entries
    live_route: bool, // do accepted live positions extend the route

    n_dropped_invalid: usize,
    n_rejected_stale: usize,
}

impl TrajectoryStore {
    pub fn new (normalizer: CoordinateNormalizer, route_capacity: usize)->Self {
        TrajectoryStore {
            normalizer,
            route_capacity,
            positions: SampleReconciler::new(),
            headings: SampleReconciler::new(),
            route: VecDeque::with_max_len( route_capacity),
            historical_route: Vec::new(),
            live_route: true,
            n_dropped_invalid: 0,
            n_rejected_stale: 0,
        }
    }

    pub fn route_capacity (&self)->usize { self.route_capacity }

    /// when disabled accepted positions still update the heads but don't extend the route. This is used while
    /// the route shows a filtered history range
    pub fn set_live_route (&mut self, enabled: bool) { self.live_route = enabled }

    pub fn is_live_route (&self)->bool { self.live_route }

    /// reconcile a position sample. The sample is stored with its normalized `[lat,lon]` value.
    /// Returns a `NormalizeError` if the sample was dropped, in which case the store is unchanged
    pub fn apply_position (&mut self, sample: Sample)->Result<Reconciled,NormalizeError> {
        self.apply_position_sample( sample, self.live_route)
    }

    fn apply_position_sample (&mut self, sample: Sample, extend_route: bool)->Result<Reconciled,NormalizeError> {
        let [lat,lon] = match self.normalizer.normalize_value( &sample.value) {
            Ok(ll) => ll,
            Err(e) => {
                self.n_dropped_invalid += 1;
                debug!("dropped position sample {sample}: {e}");
                return Err(e)
            }
        };

        let key = sample.key();
        let date = sample.date;
        let id_machine = key.id_machine.clone();
        let normalized = Sample { value: SampleValue::pair(lat,lon), ..sample };

        let res = self.positions.offer( key, normalized);
        if res.is_accepted() {
            if extend_route {
                let rp = RoutePoint { id_machine, timestamp_secs: date.as_secs_f64(), lat, lon };
                self.route.push_to_ringbuffer( rp, self.route_capacity);
            }
        } else {
            self.n_rejected_stale += 1;
            trace!("stale position sample for {}@{}", id_machine, date);
        }
        Ok(res)
    }

    /// reconcile a heading sample, which has to carry a finite scalar value
    pub fn apply_heading (&mut self, sample: Sample)->Result<Reconciled,NormalizeError> {
        match sample.value.as_scalar() {
            Some(v) if v.is_finite() => {}
            Some(_) => { self.n_dropped_invalid += 1; return Err(NormalizeError::NonFinite) }
            None => {
                self.n_dropped_invalid += 1;
                debug!("dropped non-scalar heading sample {sample}");
                return Err(NormalizeError::NotACoordinate)
            }
        }

        let res = self.headings.offer( sample.key(), sample);
        if !res.is_accepted() { self.n_rejected_stale += 1 }
        Ok(res)
    }

    /// bulk load a decoded historical collection. Points and courses are reconciled into the heads like
    /// any other sample, the points also become the fallback route (ordered by time)
    pub fn load_decoded (&mut self, collection: &DecodedCollection)->LoadSummary {
        let mut summary = LoadSummary::default();

        for p in &collection.points {
            summary.add( self.apply_position_sample( p.to_sample(), false));
        }
        for c in &collection.courses {
            summary.add( self.apply_heading( c.to_sample()));
        }

        let mut route: Vec<RoutePoint> = collection.points.iter()
            .filter( |p| self.normalizer.normalize( &[p.lat, p.lon]).is_ok())
            .map( |p| p.to_route_point())
            .collect();
        route.sort_by( |a,b| a.timestamp_secs.total_cmp( &b.timestamp_secs));
        self.historical_route = route;

        debug!("loaded decoded collection: {summary:?}");
        summary
    }

    /// replace the route buffer with externally provided route history, keeping the most recent entries
    pub fn load_route_history (&mut self, points: Vec<RoutePoint>) {
        let mut route: VecDeque<RoutePoint> = points.into();
        let n_dropped = route.retain_most_recent( self.route_capacity);
        if n_dropped > 0 {
            debug!("route history exceeds capacity, dropped {n_dropped} oldest entries");
        }
        self.route = route;
    }

    /// the normalized `[lat,lon]` of the most recent position sample of this machine
    pub fn current_position (&self, id_machine: &str)->Option<[f64;2]> {
        self.positions.latest_for_machine( id_machine).and_then( |s| {
            match &s.value {
                SampleValue::Coordinates(cs) if cs.len() == 2 => Some( [cs[0]?, cs[1]?] ),
                _ => None
            }
        })
    }

    /// heading in degrees [0..360) of the most recent heading sample, rotated by `offset` (the visual
    /// rotation of the icon that gets displayed)
    pub fn current_heading (&self, id_machine: &str, offset: f64)->Option<f64> {
        self.headings.latest_for_machine( id_machine)
            .and_then( |s| s.value.as_scalar())
            .map( |deg| normalize_360( deg + offset))
    }

    pub fn position_sample (&self, id_machine: &str)->Option<&Sample> { self.positions.latest_for_machine( id_machine) }

    /// the route polyline. Falls back to the bulk decoded points if the route buffer is still empty
    pub fn route (&self)->Vec<RoutePoint> {
        if self.route.is_empty() {
            self.historical_route.clone()
        } else {
            self.route.to_vec()
        }
    }

    pub fn route_len (&self)->usize { self.route.len() }

    /// count a sample that was dropped before it reached the store (e.g. delivered on the wrong topic)
    pub fn count_dropped (&mut self) { self.n_dropped_invalid += 1 }

    pub fn stats (&self)->StoreStats {
        StoreStats {
            n_positions: self.positions.len(),
            n_headings: self.headings.len(),
            n_route: self.route.len(),
            n_dropped_invalid: self.n_dropped_invalid,
            n_rejected_stale: self.n_rejected_stale,
        }
    }

    /// drop all trajectory data (e.g. when the watched set changes). Counters are kept
    pub fn clear (&mut self) {
        self.positions.clear();
        self.headings.clear();
        self.route.clear();
        self.historical_route.clear();
    }
}

impl LoadSummary {
    fn add (&mut self, res: Result<Reconciled,NormalizeError>) {
        match res {
            Ok(r) if r.is_accepted() => self.n_accepted += 1,
            Ok(_) => self.n_stale += 1,
            Err(_) => self.n_dropped += 1,
        }
    }
}
