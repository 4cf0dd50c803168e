/*
 * Copyright 2022 William Swartzendruber
 *
 * This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0. If a
 * copy of the MPL was not distributed with this file, You can obtain one at
 * https://mozilla.org/MPL/2.0/.
 *
 * SPDX-License-Identifier: MPL-2.0
 */

//! Cuts and merges a bitstream against a list of keep sections.
//!
//! The engine reasons about display intervals: the first PCS seen since the last closed
//! display set marks the interval's beginning, a second PCS before the closing end segment
//! marks its end, and the end segment that follows closes it. Intervals are matched against
//! the sorted section list, and two passes produce the output:
//!
//! 1. A read-only scan records the composition number and matched section of every interval
//!    that qualifies under the configured [FixMode].
//! 2. A rewrite pass renumbers the kept compositions densely, clamps their timestamps to the
//!    matched section's bounds, shifts them left by the section's accumulated gap offset,
//!    and copies each kept interval's byte range verbatim into a fresh output buffer.
//!
//! Display sets that match no section are dropped; their bytes never reach the output.


use crate::{
    section::{FixMode, Section},
    segment::{
        patch_payload,
        read_header_at,
        read_pcs,
        write_header,
        write_pcs,
        SegmentKind,
        HEADER_SIZE,
    },
    ScanError,
};

/// Carries one kept display interval from the scan pass to the rewrite pass.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
struct SaveRecord {
    composition_number: u16,
    section_index: usize,
}

/// Runs both passes over `buffer`, returning the compacted output bitstream.
///
/// `renumber_from_one` must be set when a synthetic zero-composition display set was
/// prepended upstream, so that the dense output numbering starts after it.
pub fn run(
    buffer: &mut [u8],
    sections: &[Section],
    fix_mode: FixMode,
    renumber_from_one: bool,
) -> Result<Vec<u8>, ScanError> {

    let records = scan(buffer, sections, fix_mode)?;

    rewrite(buffer, sections, &records, renumber_from_one)
}

fn scan(
    buffer: &[u8],
    sections: &[Section],
    fix_mode: FixMode,
) -> Result<Vec<SaveRecord>, ScanError> {

    let mut records = Vec::new();
    let mut begin: Option<(u32, u16)> = None;
    let mut end_pts: Option<u32> = None;
    let mut offset = 0usize;

    while offset < buffer.len() {

        let header = read_header_at(buffer, offset)
            .map_err(|source| ScanError::Read { offset, source })?;

        match header.kind {
            SegmentKind::PresentationComposition => {

                let payload = &buffer[offset + HEADER_SIZE..header.next_offset(offset)];
                let pcs = read_pcs(payload)
                    .map_err(|source| ScanError::Read { offset, source })?;

                if begin.is_none() {
                    begin = Some((header.pts, pcs.composition_number));
                } else if end_pts.is_none() {
                    end_pts = Some(header.pts);
                }
            }
            SegmentKind::End => {
                if let (Some((begin_pts, composition_number)), Some(end)) = (begin, end_pts) {

                    if let Some(section_index) =
                        match_section(sections, begin_pts, end, fix_mode)
                    {
                        records.push(SaveRecord { composition_number, section_index });
                    }

                    begin = None;
                    end_pts = None;
                }
            }
            _ => { }
        }

        offset = header.next_offset(offset);
    }

    Ok(records)
}

/// Matches a display interval against the sections in ascending-begin order; the first
/// section reaching the fix mode's score threshold wins, even when a later section would
/// overlap more fully.
fn match_section(
    sections: &[Section],
    begin_pts: u32,
    end_pts: u32,
    fix_mode: FixMode,
) -> Option<usize> {

    let needed = match fix_mode {
        FixMode::Cut => 1,
        FixMode::Delete => 2,
    };

    for (index, section) in sections.iter().enumerate() {

        let mut score = 0;

        if section.begin <= begin_pts && begin_pts <= section.end {
            score += 1;
        }
        if section.begin <= end_pts && end_pts <= section.end {
            score += 1;
        }
        if section.begin <= begin_pts && end_pts <= section.end {
            score += 2;
        }

        if score >= needed {
            return Some(index)
        }
    }

    None
}

fn rewrite(
    buffer: &mut [u8],
    sections: &[Section],
    records: &[SaveRecord],
    renumber_from_one: bool,
) -> Result<Vec<u8>, ScanError> {

    let mut output = Vec::with_capacity(buffer.len());
    let mut next_record = 0usize;
    let mut new_composition_number: u16 = if renumber_from_one { 1 } else { 0 };
    let mut found_begin = false;
    let mut found_end = false;
    let mut keep = false;
    let mut begin_pts = 0u32;
    let mut end_pts = 0u32;
    let mut section = Section::default();
    let mut copy_from = 0usize;
    let mut offset = 0usize;

    while offset < buffer.len() {

        if next_record >= records.len() {
            break
        }

        let mut header = read_header_at(buffer, offset)
            .map_err(|source| ScanError::Read { offset, source })?;

        if header.kind == SegmentKind::PresentationComposition {

            let payload_range = offset + HEADER_SIZE..header.next_offset(offset);
            let mut pcs = read_pcs(&buffer[payload_range])
                .map_err(|source| ScanError::Read { offset, source })?;

            if !found_begin {

                found_begin = true;
                begin_pts = header.pts;

                if records[next_record].composition_number == pcs.composition_number {

                    keep = true;
                    copy_from = offset;
                    section = sections[records[next_record].section_index];
                    pcs.composition_number = new_composition_number;

                    let payload = write_pcs(&pcs)
                        .map_err(|source| ScanError::Write { offset, source })?;
                    patch_payload(buffer, offset, header.length, &payload)
                        .map_err(|source| ScanError::Write { offset, source })?;
                }
            } else if !found_end {

                found_end = true;
                end_pts = header.pts;

                if keep {

                    pcs.composition_number = new_composition_number;

                    let payload = write_pcs(&pcs)
                        .map_err(|source| ScanError::Write { offset, source })?;
                    patch_payload(buffer, offset, header.length, &payload)
                        .map_err(|source| ScanError::Write { offset, source })?;
                }
            }
        }

        if keep {

            // Until the interval's end is seen, timestamps pull up to the section's begin;
            // afterwards they pull down to its end. Subtracting delay_until then compacts
            // every removed gap out of the timeline.
            if !found_end {
                if begin_pts < section.begin {
                    header.pts = section.begin;
                }
            } else if end_pts > section.end {
                header.pts = section.end;
            }

            header.pts = header.pts.wrapping_sub(section.delay_until);

            write_header(&header, buffer, offset)
                .map_err(|source| ScanError::Write { offset, source })?;
        }

        if header.kind == SegmentKind::End && found_end {

            if keep {
                next_record += 1;
                output.extend_from_slice(&buffer[copy_from..header.next_offset(offset)]);
                new_composition_number += 1;
            }

            found_begin = false;
            found_end = false;
            keep = false;
        }

        offset = header.next_offset(offset);
    }

    Ok(output)
}
