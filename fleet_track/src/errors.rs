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

use thiserror::Error;

pub type Result<T> = std::result::Result<T,FleetTrackError>;

/// malformed binary position collections. This is recoverable - callers degrade to live-only operation
#[derive(Error,Debug,Clone,PartialEq)]
pub enum DecodeError {
    #[error("malformed collection: {0}")]
    Malformed(String),
}

/// coordinate payloads we can't turn into a canonical [lat,lon] pair. The respective sample gets dropped
#[derive(Error,Debug,Clone,PartialEq)]
pub enum NormalizeError {
    #[error("missing coordinate value")]
    Missing,

    #[error("expected 2 coordinate components, got {0}")]
    WrongArity(usize),

    #[error("non-finite coordinate component")]
    NonFinite,

    #[error("coordinate out of range: [{0},{1}]")]
    OutOfRange(f64,f64),

    #[error("not a coordinate value")]
    NotACoordinate,
}

#[derive(Error,Debug)]
pub enum FleetTrackError {

    #[error("decode error {0}")]
    Decode( #[from] DecodeError),

    #[error("normalize error {0}")]
    Normalize( #[from] NormalizeError),

    #[error("transport error {0}")]
    Transport(String),

    #[error("subscription error {0}")]
    Subscription(String),

    #[error("config error {0}")]
    Config(String),

    #[error("IO error {0}")]
    IOError( #[from] std::io::Error),

    #[error("RON error {0}")]
    RonError( #[from] ron::error::SpannedError),

    #[error("JSON error {0}")]
    JsonError( #[from] serde_json::Error),

    #[error("http error {0}")]
    HttpError( #[from] reqwest::Error),

    #[error("websocket error {0}")]
    WsError( #[from] tokio_tungstenite::tungstenite::Error),

    #[error("engine terminated")]
    EngineTerminated,

    #[error("operation failed {0}")]
    OpFailedError(String)
}

pub fn op_failed (msg: impl ToString)->FleetTrackError {
    FleetTrackError::OpFailedError(msg.to_string())
}

pub fn transport_error (msg: impl ToString)->FleetTrackError {
    FleetTrackError::Transport(msg.to_string())
}

pub fn subscription_error (msg: impl ToString)->FleetTrackError {
    FleetTrackError::Subscription(msg.to_string())
}

macro_rules! malformed {
    ($fmt:literal $(, $arg:expr )* ) => {
        crate::errors::DecodeError::Malformed( format!( $fmt $(, $arg)* ))
    };
}
pub (crate) use malformed;
