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
#![allow(unused)]

// run with "cargo test --test test_subscription -- --nocapture"

use std::sync::{Arc, Mutex, atomic::{AtomicBool, Ordering}};
use async_trait::async_trait;
use fleet_track::{
    errors::{transport_error, Result},
    sample::{SensorKind, TrajectoryKey, WatchedAsset},
    subscription::*,
};

#[derive(Default)]
struct MockChannel {
    calls: Mutex<Vec<(&'static str,Vec<String>)>>,
    fail: AtomicBool,
}

impl MockChannel {
    fn calls (&self)->Vec<(&'static str,Vec<String>)> { self.calls.lock().unwrap().clone() }

    fn record (&self, op: &'static str, topics: &[String])->Result<()> {
        self.calls.lock().unwrap().push( (op, topics.to_vec()));
        if self.fail.load( Ordering::Relaxed) { Err( transport_error("channel down")) } else { Ok(()) }
    }
}

#[async_trait]
impl PushChannel for MockChannel {
    async fn join (&self, topics: &[String])->Result<()> { self.record( "join", topics) }
    async fn leave (&self, topics: &[String])->Result<()> { self.record( "leave", topics) }
}

fn topics (ts: &[&str])->Vec<String> { ts.iter().map( |t| t.to_string()).collect() }

fn assets ()->Vec<WatchedAsset> {
    vec![
        WatchedAsset::new( "A1", "S1", Some("H1")),
        WatchedAsset::new( "A2", "S2", None),
    ]
}

#[test]
fn test_topic_names () {
    let namer = SensorStateTopics::default();
    assert_eq!( "sensorstate_S1_A1", namer.topic_name( "S1", "A1"));
    assert_eq!( "pos_S1_A1", SensorStateTopics::new("pos").topic_name( "S1", "A1"));
}

#[tokio::test]
async fn test_batched_join_leave () {
    let channel = Arc::new( MockChannel::default());
    let mut subs = SubscriptionManager::new( channel.clone(), Arc::new( SensorStateTopics::default()));

    let change = subs.set_watched( &watched_keys( &assets())).await;
    println!("{change:?}");
    assert!( change.is_ok());
    assert_eq!( vec![ ("join", topics( &["sensorstate_H1_A1", "sensorstate_S1_A1", "sensorstate_S2_A2"])) ], channel.calls());

    assert_eq!( Some(&(TrajectoryKey::new("A1","H1"), SensorKind::Heading)), subs.binding( "sensorstate_H1_A1"));
    assert_eq!( Some(&(TrajectoryKey::new("A2","S2"), SensorKind::Position)), subs.binding( "sensorstate_S2_A2"));

    // same set again does not cause any requests
    let change = subs.set_watched( &watched_keys( &assets())).await;
    assert!( change.is_empty());
    assert_eq!( 1, channel.calls().len());

    // drop A2, add A3
    let new_assets = vec![ WatchedAsset::new( "A1", "S1", Some("H1")), WatchedAsset::new( "A3", "S3", None) ];
    let change = subs.set_watched( &watched_keys( &new_assets)).await;
    assert_eq!( topics( &["sensorstate_S2_A2"]), change.left);
    assert_eq!( topics( &["sensorstate_S3_A3"]), change.joined);

    let calls = channel.calls();
    assert_eq!( 3, calls.len());
    assert_eq!( ("leave", topics( &["sensorstate_S2_A2"])), calls[1]);
    assert_eq!( ("join", topics( &["sensorstate_S3_A3"])), calls[2]);
    assert!( subs.binding( "sensorstate_S2_A2").is_none());
}

#[tokio::test]
async fn test_teardown () {
    let channel = Arc::new( MockChannel::default());
    let mut subs = SubscriptionManager::new( channel.clone(), Arc::new( SensorStateTopics::default()));
    subs.set_watched( &watched_keys( &assets())).await;

    subs.teardown().await.unwrap();
    assert!( subs.joined_topics().is_empty());
    assert!( subs.binding( "sensorstate_S1_A1").is_none());
    assert_eq!( ("leave", topics( &["sensorstate_H1_A1", "sensorstate_S1_A1", "sensorstate_S2_A2"])), channel.calls()[1]);

    // nothing left to leave
    subs.teardown().await.unwrap();
    assert_eq!( 2, channel.calls().len());
}

#[tokio::test]
async fn test_teardown_unbinds_on_failure () {
    let channel = Arc::new( MockChannel::default());
    let mut subs = SubscriptionManager::new( channel.clone(), Arc::new( SensorStateTopics::default()));
    subs.set_watched( &watched_keys( &assets())).await;

    channel.fail.store( true, Ordering::Relaxed);
    assert!( subs.teardown().await.is_err());
    assert!( subs.joined_topics().is_empty());
    assert!( subs.binding( "sensorstate_S1_A1").is_none());
}

#[tokio::test]
async fn test_retry () {
    let channel = Arc::new( MockChannel::default());
    let mut subs = SubscriptionManager::new( channel.clone(), Arc::new( SensorStateTopics::default()));

    channel.fail.store( true, Ordering::Relaxed);
    let change = subs.set_watched( &watched_keys( &assets()[..1])).await;
    assert_eq!( topics( &["sensorstate_H1_A1", "sensorstate_S1_A1"]), change.failed_join);
    assert!( subs.joined_topics().is_empty());
    assert!( subs.has_pending());

    channel.fail.store( false, Ordering::Relaxed);
    let change = subs.resync().await;
    assert_eq!( topics( &["sensorstate_H1_A1", "sensorstate_S1_A1"]), change.joined);
    assert!( !subs.has_pending());

    // failed leaves are retried on the next change
    channel.fail.store( true, Ordering::Relaxed);
    let change = subs.set_watched( &watched_keys( &[ WatchedAsset::new( "A1", "S1", None) ])).await;
    assert_eq!( topics( &["sensorstate_H1_A1"]), change.failed_leave);
    assert!( subs.binding( "sensorstate_H1_A1").is_none());

    channel.fail.store( false, Ordering::Relaxed);
    let change = subs.set_watched( &watched_keys( &[ WatchedAsset::new( "A1", "S1", None), WatchedAsset::new( "A2", "S2", None) ])).await;
    assert_eq!( topics( &["sensorstate_H1_A1"]), change.left);
    assert_eq!( topics( &["sensorstate_S2_A2"]), change.joined);
    assert_eq!( topics( &["sensorstate_S1_A1", "sensorstate_S2_A2"]), subs.joined_topics());
}

#[tokio::test]
async fn test_plan_binds_before_join () {
    let channel = Arc::new( MockChannel::default());
    let mut subs = SubscriptionManager::new( channel.clone(), Arc::new( SensorStateTopics::default()));

    subs.set_watched_keys( &watched_keys( &assets()[1..]));
    let plan = subs.plan().unwrap();
    assert_eq!( topics( &["sensorstate_S2_A2"]), plan.to_join);
    assert!( channel.calls().is_empty());
    assert!( subs.binding( "sensorstate_S2_A2").is_some()); // deliveries can arrive before the join reply
    assert!( subs.plan().is_none()); // nothing left to do while the plan is in flight

    channel.fail.store( true, Ordering::Relaxed);
    let change = plan.execute( channel.as_ref()).await;
    subs.apply( &change);
    assert!( subs.binding( "sensorstate_S2_A2").is_none());
    assert!( subs.has_pending());
    assert_eq!( Vec::<String>::new(), subs.bound_topics());
}
