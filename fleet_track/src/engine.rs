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

//! the trajectory engine task
//!
//! All state of a mounted view (store, subscriptions and playback) is owned by a single tokio task that
//! processes its inputs one at a time:
//!   - commands from [`EngineHandle`]s
//!   - topic deliveries from the push channel
//!   - results of join/leave requests and historical fetches, which run as separate tasks
//!   - playback ticks
//!
//! Since each input runs to completion before the next one is processed we don't need any locks. The
//! engine never awaits the push channel or the history source inside its loop, deliveries keep getting
//! reconciled while requests are outstanding. Fetch results carry the generation they were requested
//! for and are ignored if the watched set changed (or the engine was shut down) in the meantime.
//! Join/leave requests are sent one plan at a time; changes that come in while a plan is in flight
//! are synced once its result is applied.

use std::{collections::HashSet, sync::Arc};
use bytes::Bytes;
use serde::{Serialize,Deserialize};
use tokio::{runtime::Handle, sync::{mpsc, oneshot}, task::{JoinError, JoinSet}};
use tracing::{debug,info,warn,error};

use crate::{
    config::FleetTrackConfig,
    decoder::CollectionDecoder,
    errors::{FleetTrackError, Result},
    history::{HistoryRequest, HistorySource},
    playback::{PlaybackController, PlaybackState},
    sample::{RoutePoint, SensorKind, TrajectoryKey, WatchedAsset},
    schema::CollectionSchema,
    store::{StoreStats, TrajectoryStore},
    subscription::{PushChannel, SensorStateTopics, SubscriptionChange, SubscriptionManager, SubscriptionPlan, TopicDelivery, TopicNamer, watched_keys},
};

/// what the UI needs to show a loading or stale indicator
#[derive(Debug,Clone,PartialEq,Serialize,Deserialize)]
pub struct EngineStatus {
    pub generation: u64,
    pub is_loading: bool,
    pub is_stale: bool,
    pub last_error: Option<String>,
    pub joined_topics: usize,
    pub route_filter: bool,
}

enum EngineMsg {
    SetWatched( Vec<WatchedAsset>, oneshot::Sender<SubscriptionChange>),
    CurrentPosition( String, oneshot::Sender<Option<[f64;2]>>),
    CurrentHeading( String, oneshot::Sender<Option<f64>>),
    Route( oneshot::Sender<Vec<RoutePoint>>),
    Status( oneshot::Sender<EngineStatus>),
    Stats( oneshot::Sender<StoreStats>),
    Play( oneshot::Sender<bool>),
    Pause( oneshot::Sender<()>),
    Stop( oneshot::Sender<()>),
    SetSpeed( f64, oneshot::Sender<Result<()>>),
    SetRegion( bool, oneshot::Sender<()>),
    Cursor( oneshot::Sender<PlaybackState>),
    PositionsAtCursor( oneshot::Sender<Vec<RoutePoint>>),
    SetRouteFilter( HistoryRequest, oneshot::Sender<()>),
    ClearRouteFilter( oneshot::Sender<()>),
    Shutdown( oneshot::Sender<()>),
}

enum FetchResult {
    Positions { generation: u64, result: Result<Bytes> },
    Route { generation: u64, seq: u64, result: Result<Vec<RoutePoint>> },
}

pub struct TrajectoryEngine;

impl TrajectoryEngine {
    /// spawn an engine task that uses the configured `sensorstate` topic naming. Fails if the config is not valid
    pub fn spawn (config: FleetTrackConfig, schema: Arc<CollectionSchema>,
                  history: Arc<dyn HistorySource>, channel: Arc<dyn PushChannel>,
                  deliveries_rx: mpsc::Receiver<TopicDelivery>)->Result<EngineHandle>
    {
        let namer = Arc::new( SensorStateTopics::new( &config.topic_prefix));
        Self::spawn_with_namer( config, schema, history, channel, namer, deliveries_rx)
    }

    pub fn spawn_with_namer (config: FleetTrackConfig, schema: Arc<CollectionSchema>,
                             history: Arc<dyn HistorySource>, channel: Arc<dyn PushChannel>, namer: Arc<dyn TopicNamer>,
                             deliveries_rx: mpsc::Receiver<TopicDelivery>)->Result<EngineHandle>
    {
        config.validate()?;
        let (cmd_tx, cmd_rx) = mpsc::channel(64);
        let config = Arc::new(config);

        let task = EngineTask {
            store: TrajectoryStore::new( config.normalizer(), config.route_capacity),
            subscriptions: SubscriptionManager::new( channel, namer),
            playback: PlaybackController::new( config.playback_tick, config.default_speed, config.region),
            decoder: CollectionDecoder::new( schema),
            history,
            watched: Vec::new(),
            watched_keys: HashSet::new(),
            generation: 0,
            route_seq: 0,
            route_filter: None,
            fetches: JoinSet::new(),
            loading: 0,
            sync_task: JoinSet::new(),
            sync_plan: None,
            sync_replies: Vec::new(),
            sync_waiting: Vec::new(),
            sync_dirty: false,
            is_stale: false,
            last_error: None,
            is_torn_down: false,
            config,
        };
        tokio::spawn( task.run( cmd_rx, deliveries_rx));

        Ok( EngineHandle { cmd_tx } )
    }
}

/* #region EngineHandle ****************************************************************************************/

/// cloneable client interface of a running engine. The engine shuts down once all handles are dropped
#[derive(Clone)]
pub struct EngineHandle {
    cmd_tx: mpsc::Sender<EngineMsg>,
}

impl EngineHandle {
    async fn query<T> (&self, msg: impl FnOnce(oneshot::Sender<T>)->EngineMsg)->Result<T> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx.send( msg(tx)).await.map_err( |_| FleetTrackError::EngineTerminated)?;
        rx.await.map_err( |_| FleetTrackError::EngineTerminated)
    }

    /// set the watched assets. If this changes the key set the trajectory state is reset and re-fetched
    pub async fn set_watched (&self, assets: Vec<WatchedAsset>)->Result<SubscriptionChange> {
        self.query( |tx| EngineMsg::SetWatched( assets, tx)).await
    }

    pub async fn current_position (&self, id_machine: impl ToString)->Result<Option<[f64;2]>> {
        self.query( |tx| EngineMsg::CurrentPosition( id_machine.to_string(), tx)).await
    }

    /// heading in degrees, rotated by the configured `heading_offset`
    pub async fn current_heading (&self, id_machine: impl ToString)->Result<Option<f64>> {
        self.query( |tx| EngineMsg::CurrentHeading( id_machine.to_string(), tx)).await
    }

    pub async fn route (&self)->Result<Vec<RoutePoint>> {
        self.query( EngineMsg::Route).await
    }

    pub async fn status (&self)->Result<EngineStatus> {
        self.query( EngineMsg::Status).await
    }

    pub async fn stats (&self)->Result<StoreStats> {
        self.query( EngineMsg::Stats).await
    }

    /// returns false if there is no route to play
    pub async fn play (&self)->Result<bool> {
        self.query( EngineMsg::Play).await
    }

    pub async fn pause (&self)->Result<()> {
        self.query( EngineMsg::Pause).await
    }

    pub async fn stop (&self)->Result<()> {
        self.query( EngineMsg::Stop).await
    }

    pub async fn set_speed (&self, multiplier: f64)->Result<()> {
        self.query( |tx| EngineMsg::SetSpeed( multiplier, tx)).await?
    }

    pub async fn set_region (&self, is_region_mode: bool)->Result<()> {
        self.query( |tx| EngineMsg::SetRegion( is_region_mode, tx)).await
    }

    pub async fn cursor (&self)->Result<PlaybackState> {
        self.query( EngineMsg::Cursor).await
    }

    pub async fn positions_at_cursor (&self)->Result<Vec<RoutePoint>> {
        self.query( EngineMsg::PositionsAtCursor).await
    }

    /// show the route history of the given request. Live positions do not extend the route until
    /// the filter is cleared
    pub async fn set_route_filter (&self, request: HistoryRequest)->Result<()> {
        self.query( |tx| EngineMsg::SetRouteFilter( request, tx)).await
    }

    pub async fn clear_route_filter (&self)->Result<()> {
        self.query( EngineMsg::ClearRouteFilter).await
    }

    /// stop playback, leave all topics and terminate the engine task
    pub async fn shutdown (&self)->Result<()> {
        self.query( EngineMsg::Shutdown).await
    }
}

/* #endregion EngineHandle */

/* #region EngineTask ******************************************************************************************/

struct EngineTask {
    config: Arc<FleetTrackConfig>,
    decoder: CollectionDecoder,
    history: Arc<dyn HistorySource>,

    store: TrajectoryStore,
    subscriptions: SubscriptionManager,
    playback: PlaybackController,

    watched: Vec<WatchedAsset>,
    watched_keys: HashSet<(TrajectoryKey,SensorKind)>,

    generation: u64, // bumped on each reconfiguration and on teardown
    route_seq: u64,  // bumped on each route request so that only the last one is applied
    route_filter: Option<HistoryRequest>,
    fetches: JoinSet<FetchResult>,
    loading: usize, // outstanding fetches of the current generation

    sync_task: JoinSet<SubscriptionChange>, // at most one join/leave plan in flight
    sync_plan: Option<SubscriptionPlan>,
    sync_replies: Vec<oneshot::Sender<SubscriptionChange>>, // answered by the plan in flight
    sync_waiting: Vec<oneshot::Sender<SubscriptionChange>>, // answered by the next plan
    sync_dirty: bool,

    is_stale: bool,
    last_error: Option<String>,
    is_torn_down: bool,
}

impl EngineTask {
    async fn run (mut self, mut cmd_rx: mpsc::Receiver<EngineMsg>, mut deliveries_rx: mpsc::Receiver<TopicDelivery>) {
        let mut deliveries_open = true;
        let mut shutdown_reply: Option<oneshot::Sender<()>> = None;

        loop {
            tokio::select! {
                biased; // process what already arrived before we answer queries

                delivery = deliveries_rx.recv(), if deliveries_open => match delivery {
                    Some(delivery) => self.handle_delivery( delivery),
                    None => {
                        warn!("delivery channel closed, no more live updates");
                        deliveries_open = false;
                    }
                },

                Some(res) = self.sync_task.join_next(), if !self.sync_task.is_empty() => self.handle_sync_result( res),

                Some(res) = self.fetches.join_next(), if !self.fetches.is_empty() => self.handle_fetch_result( res),

                msg = cmd_rx.recv() => match msg {
                    Some(EngineMsg::Shutdown(reply)) => {
                        shutdown_reply = Some(reply);
                        break
                    }
                    Some(msg) => self.handle_msg( msg),
                    None => { // all handles dropped
                        debug!("all engine handles dropped");
                        break
                    }
                },

                elapsed = self.playback.next_tick() => {
                    let route = self.store.route();
                    self.playback.advance( elapsed, &route);
                }
            }
        }

        self.teardown( &mut deliveries_rx).await;
        if let Some(reply) = shutdown_reply { let _ = reply.send(()); }
        info!("trajectory engine terminated");
    }

    fn handle_msg (&mut self, msg: EngineMsg) {
        match msg {
            EngineMsg::SetWatched( assets, reply) => self.set_watched( assets, reply),
            EngineMsg::CurrentPosition( id_machine, reply) => {
                let _ = reply.send( self.store.current_position( &id_machine));
            }
            EngineMsg::CurrentHeading( id_machine, reply) => {
                let _ = reply.send( self.store.current_heading( &id_machine, self.config.heading_offset));
            }
            EngineMsg::Route( reply) => { let _ = reply.send( self.store.route()); }
            EngineMsg::Status( reply) => { let _ = reply.send( self.status()); }
            EngineMsg::Stats( reply) => { let _ = reply.send( self.store.stats()); }
            EngineMsg::Play( reply) => {
                let route = self.store.route();
                let _ = reply.send( self.playback.play( &route));
            }
            EngineMsg::Pause( reply) => { self.playback.pause(); let _ = reply.send(()); }
            EngineMsg::Stop( reply) => { self.playback.stop(); let _ = reply.send(()); }
            EngineMsg::SetSpeed( multiplier, reply) => { let _ = reply.send( self.playback.set_speed( multiplier)); }
            EngineMsg::SetRegion( is_region_mode, reply) => { self.playback.set_region( is_region_mode); let _ = reply.send(()); }
            EngineMsg::Cursor( reply) => { let _ = reply.send( self.playback.state()); }
            EngineMsg::PositionsAtCursor( reply) => {
                let route = self.store.route();
                let _ = reply.send( self.playback.positions_at_cursor( &route));
            }
            EngineMsg::SetRouteFilter( request, reply) => {
                self.store.set_live_route( false);
                self.route_filter = Some( request.clone());
                self.start_route_fetch( request);
                let _ = reply.send(());
            }
            EngineMsg::ClearRouteFilter( reply) => {
                if self.route_filter.take().is_some() {
                    self.store.set_live_route( true);
                    if !self.watched.is_empty() {
                        self.start_route_fetch( self.default_request());
                    }
                }
                let _ = reply.send(());
            }
            EngineMsg::Shutdown(_) => {} // handled by the run loop
        }
    }

    fn set_watched (&mut self, assets: Vec<WatchedAsset>, reply: oneshot::Sender<SubscriptionChange>) {
        let keys = watched_keys( &assets);
        let key_set: HashSet<(TrajectoryKey,SensorKind)> = keys.iter().cloned().collect();

        if key_set == self.watched_keys {
            // nothing changed, but give failed joins/leaves another chance
            self.request_sync( reply);
            return
        }

        self.generation += 1;
        self.loading = 0;
        self.playback.stop();
        self.store.clear();
        self.route_filter = None;
        self.store.set_live_route( true);
        self.is_stale = false; // a failed fetch keeps this set until the next reconfiguration
        self.last_error = None;
        info!("watched set changed (generation {}): {} keys", self.generation, keys.len());

        self.subscriptions.set_watched_keys( &keys);
        self.request_sync( reply);

        self.watched = assets;
        self.watched_keys = key_set;

        if !self.watched.is_empty() {
            let request = self.default_request();
            self.start_positions_fetch( request.clone());
            self.start_route_fetch( request);
        }
    }

    fn request_sync (&mut self, reply: oneshot::Sender<SubscriptionChange>) {
        if self.sync_plan.is_some() {
            self.sync_waiting.push( reply);
            self.sync_dirty = true;
        } else {
            self.sync_replies.push( reply);
            self.start_sync();
        }
    }

    fn start_sync (&mut self) {
        match self.subscriptions.plan() {
            Some(plan) => {
                let channel = self.subscriptions.channel();
                let task_plan = plan.clone();
                self.sync_task.spawn( async move { task_plan.execute( channel.as_ref()).await });
                self.sync_plan = Some(plan);
            }
            None => { // already in sync
                for reply in self.sync_replies.drain(..) { let _ = reply.send( SubscriptionChange::default()); }
            }
        }
    }

    fn handle_sync_result (&mut self, res: std::result::Result<SubscriptionChange,JoinError>) {
        let Some(plan) = self.sync_plan.take() else { return };
        let change = match res {
            Ok(change) => change,
            Err(e) => {
                if !e.is_cancelled() { error!("join/leave task failed: {e}") }
                plan.failed()
            }
        };

        self.subscriptions.apply( &change);
        self.record_subscription_errors( &change);
        for reply in self.sync_replies.drain(..) { let _ = reply.send( change.clone()); }

        if self.sync_dirty {
            self.sync_dirty = false;
            self.sync_replies = std::mem::take( &mut self.sync_waiting);
            self.start_sync();
        }
    }

    fn record_subscription_errors (&mut self, change: &SubscriptionChange) {
        if !change.is_ok() {
            self.last_error = Some( format!("subscription failed (join: {:?}, leave: {:?})", change.failed_join, change.failed_leave));
        }
    }

    fn handle_delivery (&mut self, delivery: TopicDelivery) {
        let Some((key,kind)) = self.subscriptions.binding( &delivery.topic).cloned() else {
            debug!("ignoring delivery for unbound topic {}", delivery.topic);
            return
        };
        let topic = delivery.topic.clone();
        let Some(sample) = delivery.first_sample() else {
            debug!("ignoring empty delivery for topic {topic}");
            return
        };
        if sample.key() != key {
            debug!("dropped sample for {} from topic {topic} bound to {key}", sample.key());
            self.store.count_dropped();
            return
        }

        let res = match kind {
            SensorKind::Position => self.store.apply_position( sample),
            SensorKind::Heading => self.store.apply_heading( sample),
        };
        if let Err(e) = res {
            debug!("dropped sample from {topic}: {e}");
        }
    }

    fn machine_ids (&self)->Vec<String> {
        let mut ids: Vec<String> = self.watched.iter().map( |a| a.id_machine.clone()).collect();
        ids.sort();
        ids.dedup();
        ids
    }

    fn default_request (&self)->HistoryRequest {
        HistoryRequest::recent( self.machine_ids()).with_hours( self.config.initial_hours)
    }

    fn start_positions_fetch (&mut self, request: HistoryRequest) {
        let history = self.history.clone();
        let generation = self.generation;
        self.loading += 1;
        self.fetches.spawn( async move {
            let result = history.fetch_positions( &request).await;
            FetchResult::Positions { generation, result }
        });
    }

    fn start_route_fetch (&mut self, request: HistoryRequest) {
        let history = self.history.clone();
        let generation = self.generation;
        self.route_seq += 1;
        let seq = self.route_seq;
        self.loading += 1;
        self.fetches.spawn( async move {
            let result = history.fetch_route_history( &request).await;
            FetchResult::Route { generation, seq, result }
        });
    }

    fn handle_fetch_result (&mut self, res: std::result::Result<FetchResult,JoinError>) {
        match res {
            Ok(FetchResult::Positions { generation, result }) => {
                if generation != self.generation {
                    debug!("ignoring positions of outdated generation {generation}");
                    return
                }
                self.loading = self.loading.saturating_sub(1);

                match result.and_then( |bytes| self.decoder.decode( &bytes).map_err( |e| e.into())) {
                    Ok(collection) => {
                        let summary = self.store.load_decoded( &collection);
                        info!("loaded {collection}: {} accepted, {} stale, {} dropped", summary.n_accepted, summary.n_stale, summary.n_dropped);
                    }
                    Err(e) => {
                        warn!("no historical positions, continuing with live data only: {e}");
                        self.set_error( e);
                    }
                }
            }
            Ok(FetchResult::Route { generation, seq, result }) => {
                if generation != self.generation {
                    debug!("ignoring route of outdated generation {generation}");
                    return
                }
                self.loading = self.loading.saturating_sub(1);
                if seq != self.route_seq {
                    debug!("ignoring superseded route request {seq}");
                    return
                }

                match result {
                    Ok(points) => {
                        debug!("loaded route history with {} points", points.len());
                        self.store.load_route_history( points);
                    }
                    Err(e) => {
                        warn!("failed to fetch route history: {e}");
                        self.set_error( e);
                    }
                }
            }
            Err(e) => {
                if !e.is_cancelled() { error!("history fetch task failed: {e}") }
            }
        }
    }

    fn set_error (&mut self, e: FleetTrackError) {
        self.is_stale = true;
        self.last_error = Some( e.to_string());
    }

    fn status (&self)->EngineStatus {
        EngineStatus {
            generation: self.generation,
            is_loading: self.loading > 0,
            is_stale: self.is_stale,
            last_error: self.last_error.clone(),
            joined_topics: self.subscriptions.joined_topics().len(),
            route_filter: self.route_filter.is_some(),
        }
    }

    /// runs when the engine loop exits. Deliveries are drained while we wait for the leave so that the
    /// push channel can't block on a full delivery queue. A panic is covered by the `Drop` impl
    async fn teardown (&mut self, deliveries_rx: &mut mpsc::Receiver<TopicDelivery>) {
        if self.is_torn_down { return }
        self.is_torn_down = true;

        self.playback.dispose();
        self.sync_task.abort_all(); // bindings of the plan in flight are left below
        self.sync_plan = None;
        self.fetches.abort_all();
        self.generation += 1; // anything still in flight is outdated now

        let leave = self.subscriptions.teardown();
        tokio::pin!(leave);
        loop {
            tokio::select! {
                res = &mut leave => {
                    if let Err(e) = res { warn!("{e}") }
                    break
                }
                Some(_) = deliveries_rx.recv() => {} // discard
            }
        }

        self.loading = 0;
        self.store.clear();
        self.watched.clear();
        self.watched_keys.clear();
        debug!("engine torn down");
    }
}

impl Drop for EngineTask {
    fn drop (&mut self) {
        if self.is_torn_down { return }

        // the engine task panicked (or the runtime is shutting down), we can't await here
        let topics = self.subscriptions.bound_topics();
        if topics.is_empty() { return }

        match Handle::try_current() {
            Ok(rt) => {
                warn!("engine terminated without teardown, leaving topics {topics:?}");
                let channel = self.subscriptions.channel();
                rt.spawn( async move {
                    if let Err(e) = channel.leave( &topics).await { warn!("failed to leave topics: {e}") }
                });
            }
            Err(_) => error!("no runtime to leave topics {topics:?}")
        }
    }
}

/* #endregion EngineTask */
