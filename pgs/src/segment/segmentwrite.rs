/*
 * Copyright 2022 William Swartzendruber
 *
 * This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0. If a
 * copy of the MPL was not distributed with this file, You can obtain one at
 * https://mozilla.org/MPL/2.0/.
 *
 * SPDX-License-Identifier: MPL-2.0
 */

use super::{
    CompositionState,
    ObjectDefinition,
    PaletteDefinition,
    PresentationComposition,
    Segment,
    SegmentBody,
    SegmentHeader,
    SegmentKind,
    Sequence,
    Window,
    HEADER_SIZE,
    MAGIC_NUMBER,
};
use std::io::{Cursor, Error as IoError, Write};
use byteorder::{BigEndian, WriteBytesExt};
use thiserror::Error as ThisError;

/// A specialized [`Result`](std::result::Result) type for segment-writing operations.
pub type WriteResult<T> = Result<T, WriteError>;

/// The error type for segment-writing operations.
///
/// Errors are caused by either invalid state or by an underlying I/O error.
#[derive(ThisError, Debug)]
pub enum WriteError {
    /// The segment could not be written because of an underlying I/O error.
    #[error("segment IO error")]
    IoError {
        #[from]
        source: IoError,
    },
    /// The PCS being written has more than 255 composition objects.
    #[error("too many composition objects in presentation composition segment")]
    TooManyCompositionObjects,
    /// The WDS being written has more than 255 window definitions.
    #[error("too many window definitions")]
    TooManyWindowDefinitions,
    /// The PDS being written has more than 255 palette entries.
    #[error("too many palette entries")]
    TooManyPaletteEntries,
    /// The ODS being written cannot fit its data within a single segment.
    #[error("object data is too large")]
    ObjectDataTooLarge,
    /// An in-place rewrite produced a payload of a different size than the span it must
    /// overwrite.
    #[error("payload length changed during in-place rewrite")]
    PayloadLengthChanged,
}

/// Encodes a segment header over the thirteen bytes at `offset`.
pub fn write_header(
    header: &SegmentHeader,
    buffer: &mut [u8],
    offset: usize,
) -> WriteResult<()> {

    let mut output = Cursor::new(
        buffer.get_mut(offset..).ok_or(WriteError::PayloadLengthChanged)?
    );

    output.write_u16::<BigEndian>(MAGIC_NUMBER)?;
    output.write_u32::<BigEndian>(header.pts)?;
    output.write_u32::<BigEndian>(header.dts)?;
    output.write_u8(header.kind.code())?;
    output.write_u16::<BigEndian>(header.length)?;

    Ok(())
}

/// Overwrites the payload span of the segment at `offset` with a re-encoded payload, which
/// must match the declared length exactly.
pub fn patch_payload(
    buffer: &mut [u8],
    offset: usize,
    declared_length: u16,
    payload: &[u8],
) -> WriteResult<()> {

    if payload.len() != declared_length as usize {
        return Err(WriteError::PayloadLengthChanged)
    }

    let start = offset + HEADER_SIZE;

    buffer
        .get_mut(start..start + payload.len())
        .ok_or(WriteError::PayloadLengthChanged)?
        .copy_from_slice(payload);

    Ok(())
}

/// Encodes a presentation composition segment payload.
pub fn write_pcs(pcs: &PresentationComposition) -> WriteResult<Vec<u8>> {

    let mut payload = vec![];

    payload.write_u16::<BigEndian>(pcs.width)?;
    payload.write_u16::<BigEndian>(pcs.height)?;
    payload.write_u8(pcs.frame_rate)?;
    payload.write_u16::<BigEndian>(pcs.composition_number)?;
    payload.write_u8(
        match pcs.composition_state {
            CompositionState::Normal => 0x00,
            CompositionState::AcquisitionPoint => 0x40,
            CompositionState::EpochStart => 0x80,
        }
    )?;
    payload.write_u8(if pcs.palette_update { 0x80 } else { 0x00 })?;
    payload.write_u8(pcs.palette_id)?;

    if pcs.objects.len() <= 255 {
        payload.write_u8(pcs.objects.len() as u8)?;
    } else {
        return Err(WriteError::TooManyCompositionObjects)
    }

    for object in &pcs.objects {

        payload.write_u16::<BigEndian>(object.object_id)?;
        payload.write_u8(object.window_id)?;

        let mut flags = 0x00u8;
        if object.crop.is_some() {
            flags |= 0x80;
        }
        if object.forced {
            flags |= 0x40;
        }

        payload.write_u8(flags)?;
        payload.write_u16::<BigEndian>(object.x)?;
        payload.write_u16::<BigEndian>(object.y)?;

        if let Some(crop) = &object.crop {
            payload.write_u16::<BigEndian>(crop.x)?;
            payload.write_u16::<BigEndian>(crop.y)?;
            payload.write_u16::<BigEndian>(crop.width)?;
            payload.write_u16::<BigEndian>(crop.height)?;
        }
    }

    Ok(payload)
}

/// Encodes a window definition segment payload.
pub fn write_wds(windows: &[Window]) -> WriteResult<Vec<u8>> {

    let mut payload = vec![];

    if windows.len() <= 255 {
        payload.write_u8(windows.len() as u8)?;
    } else {
        return Err(WriteError::TooManyWindowDefinitions)
    }

    for window in windows {
        payload.write_u8(window.id)?;
        payload.write_u16::<BigEndian>(window.x)?;
        payload.write_u16::<BigEndian>(window.y)?;
        payload.write_u16::<BigEndian>(window.width)?;
        payload.write_u16::<BigEndian>(window.height)?;
    }

    Ok(payload)
}

/// Encodes a palette definition segment payload.
pub fn write_pds(pds: &PaletteDefinition) -> WriteResult<Vec<u8>> {

    let mut payload = vec![];

    if pds.entries.len() > 255 {
        return Err(WriteError::TooManyPaletteEntries)
    }

    payload.write_u8(pds.id)?;
    payload.write_u8(pds.version)?;

    for entry in &pds.entries {
        payload.write_u8(entry.id)?;
        payload.write_u8(entry.y)?;
        payload.write_u8(entry.cb)?;
        payload.write_u8(entry.cr)?;
        payload.write_u8(entry.alpha)?;
    }

    Ok(payload)
}

/// Encodes an object definition segment payload, carrying the bitmap data verbatim.
pub fn write_ods(ods: &ObjectDefinition) -> WriteResult<Vec<u8>> {

    let mut payload = vec![];

    payload.write_u16::<BigEndian>(ods.id)?;
    payload.write_u8(ods.version)?;
    payload.write_u8(
        match ods.sequence {
            Sequence::Single => 0xC0,
            Sequence::First => 0x80,
            Sequence::Middle => 0x00,
            Sequence::Last => 0x40,
        }
    )?;

    if ods.data_length > 0xFF_FFFF || ods.data.len() > u16::MAX as usize - 11 {
        return Err(WriteError::ObjectDataTooLarge)
    }

    payload.write_u24::<BigEndian>(ods.data_length)?;
    payload.write_u16::<BigEndian>(ods.width)?;
    payload.write_u16::<BigEndian>(ods.height)?;
    payload.write_all(&ods.data)?;

    Ok(payload)
}

/// Allows writing whole segments to a destination.
pub trait WriteSegmentExt {
    /// Writes a single segment to a destination.
    fn write_segment(&mut self, segment: &Segment) -> WriteResult<()>;
}

impl<T: Write> WriteSegmentExt for T {

    fn write_segment(&mut self, segment: &Segment) -> WriteResult<()> {

        let (kind, payload) = match &segment.body {
            SegmentBody::PresentationComposition(pcs) =>
                (SegmentKind::PresentationComposition, write_pcs(pcs)?),
            SegmentBody::WindowDefinition(windows) =>
                (SegmentKind::WindowDefinition, write_wds(windows)?),
            SegmentBody::PaletteDefinition(pds) =>
                (SegmentKind::PaletteDefinition, write_pds(pds)?),
            SegmentBody::ObjectDefinition(ods) =>
                (SegmentKind::ObjectDefinition, write_ods(ods)?),
            SegmentBody::End =>
                (SegmentKind::End, vec![]),
        };

        self.write_u16::<BigEndian>(MAGIC_NUMBER)?;
        self.write_u32::<BigEndian>(segment.pts)?;
        self.write_u32::<BigEndian>(segment.dts)?;
        self.write_u8(kind.code())?;
        self.write_u16::<BigEndian>(payload.len() as u16)?;
        self.write_all(&payload)?;

        Ok(())
    }
}
