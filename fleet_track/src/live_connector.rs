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

use std::{collections::HashSet, time::Duration};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt, stream::SplitSink};
use serde::{Serialize,Deserialize};
use tokio::{net::TcpStream, sync::{mpsc, oneshot}, task::JoinHandle, time::sleep};
use tokio_tungstenite::{
    connect_async, MaybeTlsStream, WebSocketStream,
    tungstenite::{
        protocol::Message,
        http::header::{AUTHORIZATION, HeaderValue},
        client::IntoClientRequest,
    }
};
use tracing::{debug,info,warn,error};

use crate::{
    config::FleetTrackConfig,
    errors::{transport_error, Result},
    sample::Sample,
    subscription::{PushChannel, TopicDelivery},
};

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/* #region websocket messages ***********************************************************************/

// out: {"event":"join","data":{"topics":["sensorstate_S1_A1"]}}
// out: {"event":"leave","data":{"topics":["sensorstate_S1_A1"]}}
// in:  {"event":"data","data":{"topic":"sensorstate_S1_A1","samples":[{"idMachine":"A1","idSensor":"S1","value":[11,21],"date":1000001}]}}

/// the commands we send to the push server
#[derive(Serialize,Deserialize,Debug,Clone,PartialEq)]
#[serde(tag="event", content="data", rename_all="lowercase")]
pub enum WsCmd {
    Join { topics: Vec<String> },
    Leave { topics: Vec<String> },
}

/// the messages we get from the push server
#[derive(Serialize,Deserialize,Debug,Clone,PartialEq)]
#[serde(tag="event", content="data", rename_all="lowercase")]
pub enum WsMsg {
    Data { topic: String, samples: Vec<Sample> },
    Error { message: String },
}

/* #endregion websocket messages */

struct ChannelRequest {
    cmd: WsCmd,
    reply: oneshot::Sender<Result<()>>,
}

/// websocket based [`PushChannel`]. The connection is owned by a background task that reconnects
/// after `reconnect_delay` and then re-joins all topics that are joined at this point. Join/leave
/// requests that come in while we are disconnected are recorded and sent on reconnect
pub struct WsPushChannel {
    request_tx: mpsc::Sender<ChannelRequest>,
    task: JoinHandle<()>,
}

impl WsPushChannel {
    /// spawn the connection task. Deliveries of joined topics are sent to `deliveries_tx`
    pub fn spawn (config: &FleetTrackConfig, deliveries_tx: mpsc::Sender<TopicDelivery>)->Self {
        let (request_tx, request_rx) = mpsc::channel(16);
        let conn = WsConnection {
            url: config.ws_url.clone(),
            access_token: config.access_token.clone(),
            reconnect_delay: config.reconnect_delay,
            joined: HashSet::new(),
        };
        let task = tokio::spawn( conn.run( request_rx, deliveries_tx));
        WsPushChannel { request_tx, task }
    }

    async fn request (&self, cmd: WsCmd)->Result<()> {
        let (reply, reply_rx) = oneshot::channel();
        self.request_tx.send( ChannelRequest { cmd, reply }).await.map_err( |_| transport_error("websocket task terminated"))?;
        reply_rx.await.map_err( |_| transport_error("websocket task dropped request"))?
    }
}

#[async_trait]
impl PushChannel for WsPushChannel {
    async fn join (&self, topics: &[String])->Result<()> {
        self.request( WsCmd::Join { topics: topics.to_vec() }).await
    }

    async fn leave (&self, topics: &[String])->Result<()> {
        self.request( WsCmd::Leave { topics: topics.to_vec() }).await
    }
}

impl Drop for WsPushChannel {
    fn drop (&mut self) {
        self.task.abort();
    }
}

struct WsConnection {
    url: String,
    access_token: Option<String>,
    reconnect_delay: Duration,
    joined: HashSet<String>,
}

impl WsConnection {
    async fn connect (&self)->Result<WsStream> {
        let mut request = self.url.as_str().into_client_request()?;
        if let Some(token) = &self.access_token {
            let auth_val = HeaderValue::from_str( &format!("Bearer {token}")).map_err( |e| transport_error(e))?;
            request.headers_mut().append( AUTHORIZATION, auth_val);
        }
        let (ws, _response) = connect_async( request).await?;
        Ok(ws)
    }

    fn record (&mut self, cmd: &WsCmd) {
        match cmd {
            WsCmd::Join{topics} => self.joined.extend( topics.iter().cloned()),
            WsCmd::Leave{topics} => for t in topics { self.joined.remove(t); }
        }
    }

    async fn run (mut self, mut request_rx: mpsc::Receiver<ChannelRequest>, deliveries_tx: mpsc::Sender<TopicDelivery>) {
        loop {
            match self.connect().await {
                Ok(ws) => {
                    info!("connected to {}", self.url);
                    let (mut ws_write, mut ws_read) = ws.split();

                    if !self.joined.is_empty() {
                        let topics: Vec<String> = self.joined.iter().cloned().collect();
                        debug!("re-joining {} topics", topics.len());
                        if let Err(e) = send_cmd( &mut ws_write, &WsCmd::Join { topics }).await {
                            warn!("failed to re-join topics: {e}");
                        }
                    }

                    loop {
                        tokio::select! {
                            req = request_rx.recv() => match req {
                                Some(ChannelRequest{cmd,reply}) => {
                                    let res = send_cmd( &mut ws_write, &cmd).await;
                                    let is_err = res.is_err();
                                    if !is_err { self.record( &cmd) }
                                    let _ = reply.send(res);
                                    if is_err { break } // reconnect
                                }
                                None => { // channel was dropped
                                    let _ = ws_write.close().await;
                                    return
                                }
                            },
                            msg = ws_read.next() => match msg {
                                Some(Ok(Message::Text(txt))) => {
                                    match serde_json::from_str::<WsMsg>( txt.as_str()) {
                                        Ok(WsMsg::Data{topic,samples}) => {
                                            if deliveries_tx.send( TopicDelivery { topic, samples }).await.is_err() {
                                                debug!("delivery receiver closed, terminating websocket task");
                                                let _ = ws_write.close().await;
                                                return
                                            }
                                        }
                                        Ok(WsMsg::Error{message}) => warn!("push server error: {message}"),
                                        Err(e) => debug!("ignoring websocket message {}: {e}", txt.as_str())
                                    }
                                }
                                Some(Ok(Message::Close(_))) | None => {
                                    warn!("websocket closed by server");
                                    break
                                }
                                Some(Ok(_)) => {} // binary, ping and pong
                                Some(Err(e)) => {
                                    warn!("websocket error: {e}");
                                    break
                                }
                            }
                        }
                    }
                }
                Err(e) => error!("failed to connect to {}: {e}", self.url)
            }

            // wait before reconnecting, but keep recording join/leave requests
            let delay = sleep( self.reconnect_delay);
            tokio::pin!(delay);
            loop {
                tokio::select! {
                    _ = &mut delay => break,
                    req = request_rx.recv() => match req {
                        Some(ChannelRequest{cmd,reply}) => {
                            self.record( &cmd);
                            let _ = reply.send( Ok(()));
                        }
                        None => return
                    }
                }
            }
        }
    }
}

async fn send_cmd (ws_write: &mut SplitSink<WsStream,Message>, cmd: &WsCmd)->Result<()> {
    let json = serde_json::to_string( cmd)?;
    Ok( ws_write.send( Message::text(json)).await? )
}
