/*
 * Copyright 2022 William Swartzendruber
 *
 * This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0. If a
 * copy of the MPL was not distributed with this file, You can obtain one at
 * https://mozilla.org/MPL/2.0/.
 *
 * SPDX-License-Identifier: MPL-2.0
 */

//! Processes Presentation Graphics Stream (PGS) subtitles.
//!
//! A PGS bitstream is a flat sequence of segments, each carrying a pair of 90 kHz timestamps
//! and a typed payload. This crate provides:
//!
//! - a bit-exact codec for each segment type ([segment]),
//! - timing and geometry transforms applied in place over a whole bitstream buffer
//!   ([transform]),
//! - a parser for cut & merge section lists ([section]),
//! - and a two-pass cut & merge engine that keeps only the display sets overlapping the
//!   configured sections, compacting the removed gaps out of the timeline ([cutmerge]).
//!
//! The whole bitstream is always operated on as a single in-memory buffer owned by the caller.


pub mod cutmerge;
pub mod section;
pub mod segment;
pub mod transform;

use std::fmt;

use thiserror::Error as ThisError;

use crate::segment::{ReadError, WriteError};

/// The number of 90 kHz clock ticks per millisecond.
pub const TICKS_PER_MS: f64 = 90.0;

/// The error type for operations that walk a whole bitstream buffer.
#[derive(ThisError, Debug)]
pub enum ScanError {
    /// A segment could not be decoded at the given buffer offset.
    #[error("could not read segment at offset {offset:#x}")]
    Read {
        offset: usize,
        #[source]
        source: ReadError,
    },
    /// A segment could not be re-encoded at the given buffer offset.
    #[error("could not rewrite segment at offset {offset:#x}")]
    Write {
        offset: usize,
        #[source]
        source: WriteError,
    },
}

/// A PTS value broken out into wall-clock components.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct Timestamp {
    pub hours: u32,
    pub minutes: u32,
    pub seconds: u32,
    pub milliseconds: u32,
}

impl Timestamp {

    /// Converts a 90 kHz tick count into wall-clock components, truncating to whole
    /// milliseconds.
    pub fn from_ticks(ticks: u32) -> Self {

        let total_ms = (f64::from(ticks) / TICKS_PER_MS).floor() as u32;

        Self {
            hours: total_ms / 3_600_000,
            minutes: total_ms / 60_000 % 60,
            seconds: total_ms / 1_000 % 60,
            milliseconds: total_ms % 1_000,
        }
    }
}

impl fmt::Display for Timestamp {

    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02}:{:02}:{:02}.{:03}",
            self.hours, self.minutes, self.seconds, self.milliseconds,
        )
    }
}

/// Renders a 90 kHz tick count as an `hh:mm:ss.mmm` timestamp.
pub fn ts_to_timestamp(ticks: u32) -> String {
    Timestamp::from_ticks(ticks).to_string()
}
