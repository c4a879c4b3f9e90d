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

use std::{collections::{HashMap,HashSet}, sync::Arc};
use async_trait::async_trait;
use serde::{Serialize,Deserialize};
use tracing::{debug,info,warn};

use crate::{
    errors::{Result, subscription_error},
    sample::{Sample, SensorKind, TrajectoryKey, WatchedAsset},
};

pub const DEFAULT_TOPIC_PREFIX: &str = "sensorstate";

/// maps a (sensor,machine) pair to the name of the push channel topic that carries its updates.
/// This is the only coupling to the naming convention of the transport
pub trait TopicNamer: Send + Sync {
    fn topic_name (&self, id_sensor: &str, id_machine: &str)->String;
}

/// the `{prefix}_{idSensor}_{idMachine}` convention of the sensor state push service
#[derive(Debug,Clone)]
pub struct SensorStateTopics {
    prefix: String,
}

impl SensorStateTopics {
    pub fn new (prefix: impl ToString)->Self { SensorStateTopics { prefix: prefix.to_string() } }
}

impl Default for SensorStateTopics {
    fn default()->Self { SensorStateTopics::new( DEFAULT_TOPIC_PREFIX) }
}

impl TopicNamer for SensorStateTopics {
    fn topic_name (&self, id_sensor: &str, id_machine: &str)->String {
        format!("{}_{}_{}", self.prefix, id_sensor, id_machine)
    }
}

/// the realtime transport we join/leave topics on. Both operations are batched, i.e. each call
/// corresponds to a single request regardless of the number of topics
#[async_trait]
pub trait PushChannel: Send + Sync {
    async fn join (&self, topics: &[String])->Result<()>;
    async fn leave (&self, topics: &[String])->Result<()>;
}

/// one event received on a joined topic. Only the first sample is used
#[derive(Debug,Clone,PartialEq,Serialize,Deserialize)]
pub struct TopicDelivery {
    pub topic: String,
    pub samples: Vec<Sample>,
}

impl TopicDelivery {
    pub fn new (topic: impl ToString, samples: Vec<Sample>)->Self {
        TopicDelivery { topic: topic.to_string(), samples }
    }

    pub fn first_sample (self)->Option<Sample> { self.samples.into_iter().next() }
}

/// the key set a list of watched assets translates into
pub fn watched_keys (assets: &[WatchedAsset])->Vec<(TrajectoryKey,SensorKind)> {
    assets.iter().flat_map( |a| a.keys()).collect()
}

/// outcome of a [`SubscriptionManager::set_watched`] call
#[derive(Debug,Clone,Default,PartialEq)]
pub struct SubscriptionChange {
    pub joined: Vec<String>,
    pub left: Vec<String>,
    pub failed_join: Vec<String>,
    pub failed_leave: Vec<String>,
}

impl SubscriptionChange {
    pub fn is_ok (&self)->bool { self.failed_join.is_empty() && self.failed_leave.is_empty() }
    pub fn is_empty (&self)->bool { self.joined.is_empty() && self.left.is_empty() && self.is_ok() }
}

/// the (at most) one leave and one join request that bring the joined topics in line with the watched keys
#[derive(Debug,Clone,Default,PartialEq)]
pub struct SubscriptionPlan {
    pub to_join: Vec<String>,
    pub to_leave: Vec<String>,
}

impl SubscriptionPlan {
    pub fn is_empty (&self)->bool { self.to_join.is_empty() && self.to_leave.is_empty() }

    /// send the requests. This does not touch any [`SubscriptionManager`] state so it can run in its own task
    pub async fn execute (&self, channel: &dyn PushChannel)->SubscriptionChange {
        let mut change = SubscriptionChange::default();

        if !self.to_leave.is_empty() {
            match channel.leave( &self.to_leave).await {
                Ok(()) => {
                    debug!("left topics {:?}", self.to_leave);
                    change.left = self.to_leave.clone();
                }
                Err(e) => {
                    warn!("failed to leave topics {:?}: {e}", self.to_leave);
                    change.failed_leave = self.to_leave.clone();
                }
            }
        }

        if !self.to_join.is_empty() {
            match channel.join( &self.to_join).await {
                Ok(()) => {
                    info!("joined topics {:?}", self.to_join);
                    change.joined = self.to_join.clone();
                }
                Err(e) => {
                    warn!("failed to join topics {:?}: {e}", self.to_join);
                    change.failed_join = self.to_join.clone();
                }
            }
        }

        change
    }

    /// the change if the requests never completed
    pub fn failed (&self)->SubscriptionChange {
        SubscriptionChange { failed_join: self.to_join.clone(), failed_leave: self.to_leave.clone(), ..SubscriptionChange::default() }
    }
}

/// keeps the set of joined push channel topics in sync with the watched (machine,sensor) keys and
/// binds each joined topic to the key and kind its deliveries are reconciled for.
///
/// Syncing is split into [`plan`](Self::plan), which binds topics to join right away so that deliveries
/// arriving before the join reply are not lost, [`SubscriptionPlan::execute`] and [`apply`](Self::apply).
/// Failures are not fatal. Topics we could not join get unbound again and are retried on the next change,
/// topics we could not leave are unbound right away but remembered so that we try to leave them again
pub struct SubscriptionManager {
    channel: Arc<dyn PushChannel>,
    namer: Arc<dyn TopicNamer>,

    watched: HashMap<String,(TrajectoryKey,SensorKind)>, // what we want
    bindings: HashMap<String,(TrajectoryKey,SensorKind)>, // what we have joined or are joining
    pending_leave: HashSet<String>,
}

impl SubscriptionManager {
    pub fn new (channel: Arc<dyn PushChannel>, namer: Arc<dyn TopicNamer>)->Self {
        SubscriptionManager {
            channel,
            namer,
            watched: HashMap::new(),
            bindings: HashMap::new(),
            pending_leave: HashSet::new(),
        }
    }

    pub fn channel (&self)->Arc<dyn PushChannel> { self.channel.clone() }

    pub fn topic_name (&self, key: &TrajectoryKey)->String {
        self.namer.topic_name( key.id_sensor(), key.id_machine())
    }

    /// set the watched keys, diff against what is currently joined and issue at most one join and one leave
    pub async fn set_watched (&mut self, keys: &[(TrajectoryKey,SensorKind)])->SubscriptionChange {
        self.set_watched_keys( keys);
        self.sync().await
    }

    /// retry pending joins and leaves for the current watched set
    pub async fn resync (&mut self)->SubscriptionChange {
        self.sync().await
    }

    /// replace the watched keys without talking to the channel. Use [`plan`](Self::plan) to get the requests
    pub fn set_watched_keys (&mut self, keys: &[(TrajectoryKey,SensorKind)]) {
        self.watched = keys.iter()
            .map( |(k,kind)| (self.topic_name(k), (k.clone(), *kind)))
            .collect();
    }

    async fn sync (&mut self)->SubscriptionChange {
        match self.plan() {
            Some(plan) => {
                let change = plan.execute( self.channel.as_ref()).await;
                self.apply( &change);
                change
            }
            None => SubscriptionChange::default()
        }
    }

    /// compute the requests for the current watched keys. Topics to leave are unbound and topics to join
    /// are bound before the requests are sent. Returns None if we are in sync
    pub fn plan (&mut self)->Option<SubscriptionPlan> {
        // topics we were going to leave but want again are joined anew
        self.pending_leave.retain( |t| !self.watched.contains_key(t));

        let mut to_leave: Vec<String> = self.bindings.keys()
            .filter( |t| !self.watched.contains_key(*t))
            .chain( self.pending_leave.iter())
            .cloned()
            .collect();
        to_leave.sort();
        to_leave.dedup();

        let mut to_join: Vec<String> = self.watched.keys()
            .filter( |t| !self.bindings.contains_key(*t))
            .cloned()
            .collect();
        to_join.sort();

        for t in &to_leave { self.bindings.remove(t); } // unbind regardless of outcome
        for t in &to_join {
            if let Some(binding) = self.watched.get(t) {
                self.bindings.insert( t.clone(), binding.clone());
            }
        }

        let plan = SubscriptionPlan { to_join, to_leave };
        if plan.is_empty() { None } else { Some(plan) }
    }

    /// record the outcome of an executed plan
    pub fn apply (&mut self, change: &SubscriptionChange) {
        for t in &change.left {
            self.pending_leave.remove(t);
        }
        for t in &change.failed_leave {
            if !self.watched.contains_key(t) { self.pending_leave.insert( t.clone()); }
        }
        for t in &change.failed_join {
            self.bindings.remove(t);
        }
    }

    /// the (key,kind) a delivery on `topic` is reconciled for, or None if the topic is not bound
    pub fn binding (&self, topic: &str)->Option<&(TrajectoryKey,SensorKind)> {
        self.bindings.get( topic)
    }

    pub fn joined_topics (&self)->Vec<String> {
        let mut topics: Vec<String> = self.bindings.keys().cloned().collect();
        topics.sort();
        topics
    }

    /// everything a teardown would have to leave
    pub fn bound_topics (&self)->Vec<String> {
        let mut topics: Vec<String> = self.bindings.keys().chain( self.pending_leave.iter()).cloned().collect();
        topics.sort();
        topics.dedup();
        topics
    }

    pub fn has_pending (&self)->bool {
        !self.pending_leave.is_empty() || self.watched.keys().any( |t| !self.bindings.contains_key(t))
    }

    /// leave all joined topics and unbind all callbacks. Bindings are cleared even if the leave fails
    pub async fn teardown (&mut self)->Result<()> {
        self.watched.clear();

        let mut topics: Vec<String> = self.bindings.drain().map( |(t,_)| t).chain( self.pending_leave.drain()).collect();
        topics.sort();
        topics.dedup();

        if topics.is_empty() { return Ok(()) }

        match self.channel.leave( &topics).await {
            Ok(()) => {
                info!("left all topics {topics:?}");
                Ok(())
            }
            Err(e) => {
                warn!("failed to leave topics on teardown {topics:?}: {e}");
                Err( subscription_error( format!("teardown leave failed: {e}")))
            }
        }
    }
}
