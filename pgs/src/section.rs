/*
 * Copyright 2022 William Swartzendruber
 *
 * This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0. If a
 * copy of the MPL was not distributed with this file, You can obtain one at
 * https://mozilla.org/MPL/2.0/.
 *
 * SPDX-License-Identifier: MPL-2.0
 */

//! Parses cut & merge section lists.
//!
//! A section list is a textual sequence of intervals in one of several compatibility
//! notations, with interval values expressed in one of three time bases. Parsing normalizes
//! everything to 90 kHz ticks, sorts the intervals by their beginning, and precomputes each
//! interval's cumulative output-timeline offset.


use crate::TICKS_PER_MS;
use thiserror::Error as ThisError;

/// The notation a section list is written in.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ListFormat {
    /// `1000-2000 3000-4000`, both ends inclusive.
    Secut,
    /// `[1000:2001] [3000:4001]`, begin inclusive, end exclusive.
    VapourSynth,
    /// `(1000,2000) (3000,4000)`, both ends inclusive.
    AviSynth,
    /// `[1000 2000] [3000 4000]`, both ends inclusive.
    Remap,
}

/// The time base section values are expressed in.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum TimeMode {
    Milliseconds,
    /// Frame numbers at a configured frame rate.
    Frame,
    /// `hh:mm:ss.mmm` timestamps.
    Timestamp,
}

/// Selects how display sets partially overlapping a section are treated.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum FixMode {
    /// Keep partially overlapping display sets, clamping their timestamps to the section
    /// bounds.
    Cut,
    /// Keep only display sets wholly contained in (or doubly overlapping) a section.
    Delete,
}

/// A single keep interval in 90 kHz ticks.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct Section {
    pub begin: u32,
    pub end: u32,
    /// The position on the output timeline where material kept by this section resumes;
    /// subtracting it from a kept PTS compacts all earlier gaps out of the timeline.
    pub delay_until: u32,
}

/// The complete description of a section list to parse.
#[derive(Clone, Debug)]
pub struct SectionSpec {
    pub format: ListFormat,
    pub time_mode: TimeMode,
    /// The frame rate used by [TimeMode::Frame]; ignored otherwise.
    pub fps: f64,
    pub list: String,
}

/// The error type for section-list parsing.
#[derive(ThisError, Clone, Debug, Eq, PartialEq)]
pub enum ParseError {
    /// The list text does not match the configured notation.
    #[error("section list does not match the configured notation near `{0}`")]
    MalformedSection(String),
    /// An interval value is not a valid number.
    #[error("`{0}` is not a valid number")]
    InvalidNumber(String),
    /// A timestamp does not consist of exactly four numeric groups.
    #[error("timestamp `{0}` is invalid")]
    InvalidTimestamp(String),
    /// The end-exclusive notation cannot express timestamps.
    #[error("vapoursynth notation cannot be combined with the timestamp time mode")]
    IncompatibleTimeMode,
}

/// Parses a section list into tick-domain intervals, sorted ascending by beginning, with
/// output-timeline offsets precomputed.
pub fn parse_sections(spec: &SectionSpec) -> Result<Vec<Section>, ParseError> {

    if spec.format == ListFormat::VapourSynth && spec.time_mode == TimeMode::Timestamp {
        return Err(ParseError::IncompatibleTimeMode)
    }

    let mut sections = Vec::new();
    let mut rest = spec.list.trim();

    loop {

        let (begin_text, end_text, remainder) = split_section(rest, spec.format)?;

        sections.push(
            Section {
                begin: to_ticks(begin_text, spec, false)?,
                end: to_ticks(end_text, spec, true)?,
                delay_until: 0,
            }
        );

        rest = remainder.trim_start();

        if rest.is_empty() {
            break
        }
    }

    sections.sort_by_key(|section| section.begin);

    // Each interval keeps end - begin of material; the running offset accumulates the
    // negative of every removed gap so later intervals know how far to shift left.
    let mut running = 0i64;

    for section in sections.iter_mut() {
        section.delay_until = (running + i64::from(section.begin)) as u32;
        running += i64::from(section.begin) - i64::from(section.end);
    }

    Ok(sections)
}

fn split_section(text: &str, format: ListFormat) -> Result<(&str, &str, &str), ParseError> {

    let (prefix, separator, suffix) = match format {
        ListFormat::Secut => ("", '-', ""),
        ListFormat::VapourSynth => ("[", ':', "]"),
        ListFormat::AviSynth => ("(", ',', ")"),
        ListFormat::Remap => ("[", ' ', "]"),
    };

    let malformed = || ParseError::MalformedSection(text.chars().take(24).collect());

    let body = text.strip_prefix(prefix).ok_or_else(malformed)?;
    let (begin_text, body) = take_value(body, format);

    if begin_text.is_empty() {
        return Err(malformed())
    }

    let body = body.strip_prefix(separator).ok_or_else(malformed)?;
    let (end_text, body) = take_value(body, format);

    if end_text.is_empty() {
        return Err(malformed())
    }

    let rest = if suffix.is_empty() {
        body
    } else {
        body.strip_prefix(suffix).ok_or_else(malformed)?
    };

    Ok((begin_text, end_text, rest))
}

fn take_value(text: &str, format: ListFormat) -> (&str, &str) {

    let end = text
        .find(|c: char| !is_value_char(c, format))
        .unwrap_or(text.len());

    text.split_at(end)
}

fn is_value_char(c: char, format: ListFormat) -> bool {
    match format {
        // The colon is the vapoursynth separator, so its values are bare frame numbers.
        ListFormat::VapourSynth => c.is_ascii_digit(),
        _ => c.is_ascii_digit() || c == ':' || c == '.',
    }
}

fn to_ticks(text: &str, spec: &SectionSpec, is_end: bool) -> Result<u32, ParseError> {

    match spec.time_mode {
        TimeMode::Milliseconds => {
            let ms = parse_number(text)?;
            Ok((f64::from(ms) * TICKS_PER_MS).round() as u32)
        }
        TimeMode::Frame => {
            let mut frame = parse_number(text)?;
            // Only the end-exclusive notation counts its end value one past the interval.
            if is_end && spec.format == ListFormat::VapourSynth {
                frame = frame.saturating_sub(1);
            }
            Ok((f64::from(frame) / spec.fps * 1_000.0 * TICKS_PER_MS).round() as u32)
        }
        TimeMode::Timestamp => {
            let ms = timestamp_to_ms(text)?;
            Ok((f64::from(ms) * TICKS_PER_MS).round() as u32)
        }
    }
}

fn parse_number(text: &str) -> Result<u32, ParseError> {
    text.parse::<u32>().map_err(|_| ParseError::InvalidNumber(text.to_owned()))
}

fn timestamp_to_ms(text: &str) -> Result<u32, ParseError> {

    let invalid = || ParseError::InvalidTimestamp(text.to_owned());
    let parts: Vec<&str> = text.splitn(3, ':').collect();

    if parts.len() != 3 {
        return Err(invalid())
    }

    let (seconds_text, ms_text) = parts[2].split_once('.').ok_or_else(invalid)?;
    let hours = parts[0].parse::<u32>().map_err(|_| invalid())?;
    let minutes = parts[1].parse::<u32>().map_err(|_| invalid())?;
    let seconds = seconds_text.parse::<u32>().map_err(|_| invalid())?;
    let milliseconds = ms_text.parse::<u32>().map_err(|_| invalid())?;

    Ok(((hours * 60 + minutes) * 60 + seconds) * 1_000 + milliseconds)
}
