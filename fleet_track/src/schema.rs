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

use std::{collections::HashSet, path::Path, sync::Arc};
use serde::{Serialize,Deserialize};
use lazy_static::lazy_static;
use dashmap::DashMap;
use tracing::{debug,info};

use crate::errors::{FleetTrackError,Result};

macro_rules! config_error {
    ($fmt:literal $(, $arg:expr )* ) => {
        FleetTrackError::Config( format!( $fmt $(, $arg)* ))
    };
}

pub const POSITIONS_COLLECTION: &str = "positions.PositionsCollection";

/// protobuf scalar types we support for collection record fields
#[derive(Debug,Clone,Copy,PartialEq,Eq,Serialize,Deserialize)]
pub enum ScalarKind {
    String,
    Double,
    Float,
    Int32,
    Int64,
    UInt64,
    SInt64,
}

impl ScalarKind {
    pub fn is_numeric (&self)->bool { !matches!(self, ScalarKind::String) }
    pub fn is_integer (&self)->bool { matches!(self, ScalarKind::Int32 | ScalarKind::Int64 | ScalarKind::UInt64 | ScalarKind::SInt64) }
}

#[derive(Debug,Clone,Copy,PartialEq,Eq,Serialize,Deserialize)]
pub struct FieldSpec {
    pub number: u32,
    pub kind: ScalarKind,
}

impl FieldSpec {
    pub const fn new (number: u32, kind: ScalarKind)->Self { FieldSpec { number, kind } }
}

#[derive(Debug,Clone,PartialEq,Serialize,Deserialize)]
pub struct PointSchema {
    pub field: u32, // field number of the repeated point messages within the collection
    pub id_asset: FieldSpec,
    pub id_sensor: FieldSpec,
    pub lat: FieldSpec,
    pub lon: FieldSpec,
    pub timestamp: FieldSpec,
}

#[derive(Debug,Clone,PartialEq,Serialize,Deserialize)]
pub struct CourseSchema {
    pub field: u32,
    pub id_asset: FieldSpec,
    pub id_sensor: FieldSpec,
    pub course: FieldSpec,
    pub timestamp: FieldSpec,
}

/// the description of the binary position/course collection. Expensive to obtain and immutable
/// after load, which is why we hand it out as `Arc` from the process-wide [`SchemaRegistry`]
#[derive(Debug,Clone,PartialEq,Serialize,Deserialize)]
pub struct CollectionSchema {
    pub message: String,
    #[serde(default="default_length_prefixed")]
    pub length_prefixed: bool,
    pub points: PointSchema,
    pub courses: CourseSchema,
}

fn default_length_prefixed()->bool { true }

impl Default for CollectionSchema {
    fn default()->Self {
        use ScalarKind::*;
        CollectionSchema {
            message: POSITIONS_COLLECTION.to_string(),
            length_prefixed: true,
            points: PointSchema {
                field: 1,
                id_asset: FieldSpec::new(1, String),
                id_sensor: FieldSpec::new(2, String),
                lat: FieldSpec::new(3, Double),
                lon: FieldSpec::new(4, Double),
                timestamp: FieldSpec::new(5, Int64),
            },
            courses: CourseSchema {
                field: 2,
                id_asset: FieldSpec::new(1, String),
                id_sensor: FieldSpec::new(2, String),
                course: FieldSpec::new(3, Double),
                timestamp: FieldSpec::new(4, Int64),
            }
        }
    }
}

impl CollectionSchema {
    pub fn from_ron_str (s: &str)->Result<Self> {
        let schema: CollectionSchema = ron::from_str(s)?;
        schema.validate()?;
        Ok(schema)
    }

    pub fn from_file (path: impl AsRef<Path>)->Result<Self> {
        let s = std::fs::read_to_string( path.as_ref())?;
        Self::from_ron_str( &s)
    }

    /// check field numbers are unique per message and kinds fit the semantics of the fields
    pub fn validate (&self)->Result<()> {
        if self.points.field == self.courses.field {
            return Err( config_error!("points and courses share field number {}", self.points.field))
        }

        let p = &self.points;
        check_unique( "point", &[p.id_asset, p.id_sensor, p.lat, p.lon, p.timestamp])?;
        check_numeric( "point.lat", p.lat)?;
        check_numeric( "point.lon", p.lon)?;
        check_integer( "point.timestamp", p.timestamp)?;

        let c = &self.courses;
        check_unique( "course", &[c.id_asset, c.id_sensor, c.course, c.timestamp])?;
        check_numeric( "course.course", c.course)?;
        check_integer( "course.timestamp", c.timestamp)?;

        Ok(())
    }
}

fn check_unique (msg: &str, fields: &[FieldSpec])->Result<()> {
    let mut seen: HashSet<u32> = HashSet::new();
    for f in fields {
        if f.number == 0 { return Err( config_error!("{msg} field number 0 is not valid")) }
        if !seen.insert( f.number) { return Err( config_error!("duplicate {msg} field number {}", f.number)) }
    }
    Ok(())
}

fn check_numeric (name: &str, f: FieldSpec)->Result<()> {
    if f.kind.is_numeric() { Ok(()) } else { Err( config_error!("{name} has to be numeric")) }
}

fn check_integer (name: &str, f: FieldSpec)->Result<()> {
    if f.kind.is_integer() { Ok(()) } else { Err( config_error!("{name} has to be an integer")) }
}

/* #region schema registry ******************************************************************************/

lazy_static! {
    static ref SCHEMAS: DashMap<String,Arc<CollectionSchema>> = DashMap::new();
}

/// process-wide cache of loaded collection schemas, keyed by message name. The first registration
/// of a name wins, subsequent loads return the cached instance
pub struct SchemaRegistry;

impl SchemaRegistry {
    pub fn register (schema: CollectionSchema)->Arc<CollectionSchema> {
        SCHEMAS.entry( schema.message.clone()).or_insert_with( || {
            info!("registered collection schema {}", schema.message);
            Arc::new(schema)
        }).clone()
    }

    pub fn get (message: &str)->Option<Arc<CollectionSchema>> {
        SCHEMAS.get( message).map( |e| e.value().clone())
    }

    /// return the cached schema for `message` or load it from `path`. The file has to define `message`
    pub fn get_or_load (message: &str, path: impl AsRef<Path>)->Result<Arc<CollectionSchema>> {
        if let Some(schema) = Self::get( message) {
            debug!("using cached schema {message}");
            return Ok(schema)
        }

        let schema = CollectionSchema::from_file( path)?;
        if schema.message != message {
            return Err( config_error!("schema file defines '{}', expected '{}'", schema.message, message))
        }
        Ok( Self::register( schema))
    }

    /// the built-in positions collection layout
    pub fn positions ()->Arc<CollectionSchema> {
        Self::get( POSITIONS_COLLECTION).unwrap_or_else( || Self::register( CollectionSchema::default()))
    }
}

/* #endregion schema registry */
