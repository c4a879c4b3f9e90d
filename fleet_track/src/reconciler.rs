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

use std::collections::HashMap;
use crate::sample::{Sample, TrajectoryKey};

/// result of reconciling an incoming sample against the current head of its trajectory
#[derive(Debug,Clone,Copy,PartialEq,Eq)]
pub enum Reconciled {
    /// there was no current sample
    Initial,
    /// incoming sample is strictly after the current one
    Replaced,
    /// incoming sample is not after the current one (duplicate or out-of-order delivery)
    Stale,
}

impl Reconciled {
    pub fn is_accepted (&self)->bool { !matches!( self, Reconciled::Stale) }
}

/// the "latest wins" rule: `incoming` becomes the new head iff there is no current sample or
/// its date is strictly after the current one. Ties keep the current sample
pub fn reconcile (current: Option<&Sample>, incoming: &Sample)->Reconciled {
    match current {
        None => Reconciled::Initial,
        Some(cur) => if incoming.date > cur.date { Reconciled::Replaced } else { Reconciled::Stale }
    }
}

/// a map of trajectory heads. Each key holds at most one sample, which is the one with the
/// max date of all samples ever offered for this key.
///
/// Position and heading heads are kept in separate instances so that they never get compared
#[derive(Debug,Clone,Default)]
pub struct SampleReconciler {
    heads: HashMap<TrajectoryKey,Sample>,
}

impl SampleReconciler {
    pub fn new ()->Self { SampleReconciler { heads: HashMap::new() } }

    /// offer `incoming` for `key`. The store only changes if the result is accepted
    pub fn offer (&mut self, key: TrajectoryKey, incoming: Sample)->Reconciled {
        let res = reconcile( self.heads.get(&key), &incoming);
        if res.is_accepted() {
            self.heads.insert( key, incoming);
        }
        res
    }

    pub fn get (&self, key: &TrajectoryKey)->Option<&Sample> { self.heads.get(key) }

    /// the most recent head of all keys of the given machine. Ties go to the greatest sensor id
    pub fn latest_for_machine (&self, id_machine: &str)->Option<&Sample> {
        self.heads.iter()
            .filter( |(k,_)| k.id_machine() == id_machine)
            .max_by( |(ka,a),(kb,b)| a.date.cmp( &b.date).then_with( || ka.id_sensor.cmp( &kb.id_sensor)))
            .map( |(_,s)| s)
    }

    pub fn len (&self)->usize { self.heads.len() }
    pub fn is_empty (&self)->bool { self.heads.is_empty() }

    pub fn iter (&self)->impl Iterator<Item=(&TrajectoryKey,&Sample)> { self.heads.iter() }

    pub fn clear (&mut self) { self.heads.clear() }
}
