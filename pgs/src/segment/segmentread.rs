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
    CompositionObject,
    CompositionState,
    CropArea,
    ObjectDefinition,
    PaletteDefinition,
    PaletteEntry,
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
use std::io::{Cursor, Error as IoError, Read};
use byteorder::{BigEndian, ReadBytesExt};
use thiserror::Error as ThisError;

/// A specialized [`Result`](std::result::Result) type for segment-reading operations.
pub type ReadResult<T> = Result<T, ReadError>;

/// The error type for segment-reading operations.
#[derive(ThisError, Debug)]
pub enum ReadError {
    /// The segment could not be read because of an underlying I/O error.
    #[error("segment IO error")]
    IoError {
        #[from]
        source: IoError,
    },
    /// The segment header does not start with the magic number.
    #[error("segment has unrecognized magic number")]
    UnrecognizedMagicNumber,
    /// The segment header declares an unrecognized kind.
    #[error("segment has unrecognized kind")]
    UnrecognizedKind,
    /// The buffer ends before the declared payload does.
    #[error("segment payload is truncated")]
    TruncatedPayload,
    /// The PCS declares an unrecognized composition state.
    #[error("presentation composition segment has unrecognized composition state")]
    UnrecognizedCompositionState,
    /// The PCS declares an unrecognized palette update flag.
    #[error("presentation composition segment has unrecognized palette update flag")]
    UnrecognizedPaletteUpdateFlag,
    /// A composition object sets flag bits other than cropped and forced.
    #[error("composition object has unrecognized flags")]
    UnrecognizedCompositionObjectFlags,
    /// The ODS declares an unrecognized sequence flag.
    #[error("object definition segment has unrecognized sequence flag")]
    UnrecognizedSequenceFlag,
}

/// Decodes the segment header at `offset`, validating the magic number and that the declared
/// payload fits within `buffer`.
pub fn read_header_at(buffer: &[u8], offset: usize) -> ReadResult<SegmentHeader> {

    let mut input = Cursor::new(buffer.get(offset..).ok_or(ReadError::TruncatedPayload)?);

    if input.read_u16::<BigEndian>()? != MAGIC_NUMBER {
        return Err(ReadError::UnrecognizedMagicNumber)
    }

    let pts = input.read_u32::<BigEndian>()?;
    let dts = input.read_u32::<BigEndian>()?;
    let kind = SegmentKind::from_code(input.read_u8()?).ok_or(ReadError::UnrecognizedKind)?;
    let length = input.read_u16::<BigEndian>()?;

    if buffer.len() - (offset + HEADER_SIZE) < length as usize {
        return Err(ReadError::TruncatedPayload)
    }

    Ok(SegmentHeader { pts, dts, kind, length })
}

/// Decodes a presentation composition segment payload.
pub fn read_pcs(payload: &[u8]) -> ReadResult<PresentationComposition> {

    let mut input = Cursor::new(payload);
    let width = input.read_u16::<BigEndian>()?;
    let height = input.read_u16::<BigEndian>()?;
    let frame_rate = input.read_u8()?;
    let composition_number = input.read_u16::<BigEndian>()?;
    let composition_state = match input.read_u8()? {
        0x00 => CompositionState::Normal,
        0x40 => CompositionState::AcquisitionPoint,
        0x80 => CompositionState::EpochStart,
        _ => return Err(ReadError::UnrecognizedCompositionState),
    };
    let palette_update = match input.read_u8()? {
        0x00 => false,
        0x80 => true,
        _ => return Err(ReadError::UnrecognizedPaletteUpdateFlag),
    };
    let palette_id = input.read_u8()?;
    let object_count = input.read_u8()? as usize;
    let mut objects = Vec::with_capacity(object_count);

    for _ in 0..object_count {

        let object_id = input.read_u16::<BigEndian>()?;
        let window_id = input.read_u8()?;
        let flags = input.read_u8()?;

        if flags & !0xC0 != 0 {
            return Err(ReadError::UnrecognizedCompositionObjectFlags)
        }

        let forced = flags & 0x40 != 0;
        let x = input.read_u16::<BigEndian>()?;
        let y = input.read_u16::<BigEndian>()?;

        // The four crop fields are present only when this object's own cropped bit is set,
        // making the record variable-length at the object level.
        let crop = if flags & 0x80 != 0 {
            Some(
                CropArea {
                    x: input.read_u16::<BigEndian>()?,
                    y: input.read_u16::<BigEndian>()?,
                    width: input.read_u16::<BigEndian>()?,
                    height: input.read_u16::<BigEndian>()?,
                }
            )
        } else {
            None
        };

        objects.push(
            CompositionObject {
                object_id,
                window_id,
                forced,
                x,
                y,
                crop,
            }
        );
    }

    Ok(
        PresentationComposition {
            width,
            height,
            frame_rate,
            composition_number,
            composition_state,
            palette_update,
            palette_id,
            objects,
        }
    )
}

/// Decodes a window definition segment payload.
pub fn read_wds(payload: &[u8]) -> ReadResult<Vec<Window>> {

    let mut input = Cursor::new(payload);
    let count = input.read_u8()?;
    let mut windows = Vec::with_capacity(count as usize);

    for _ in 0..count {
        windows.push(
            Window {
                id: input.read_u8()?,
                x: input.read_u16::<BigEndian>()?,
                y: input.read_u16::<BigEndian>()?,
                width: input.read_u16::<BigEndian>()?,
                height: input.read_u16::<BigEndian>()?,
            }
        );
    }

    Ok(windows)
}

/// Decodes a palette definition segment payload.
///
/// The entry count is derived from the payload length.
pub fn read_pds(payload: &[u8]) -> ReadResult<PaletteDefinition> {

    let mut input = Cursor::new(payload);
    let count = payload.len().saturating_sub(2) / 5;
    let id = input.read_u8()?;
    let version = input.read_u8()?;
    let mut entries = Vec::with_capacity(count);

    for _ in 0..count {
        entries.push(
            PaletteEntry {
                id: input.read_u8()?,
                y: input.read_u8()?,
                cb: input.read_u8()?,
                cr: input.read_u8()?,
                alpha: input.read_u8()?,
            }
        );
    }

    Ok(PaletteDefinition { id, version, entries })
}

/// Decodes an object definition segment payload, leaving the bitmap data opaque.
pub fn read_ods(payload: &[u8]) -> ReadResult<ObjectDefinition> {

    let mut input = Cursor::new(payload);
    let id = input.read_u16::<BigEndian>()?;
    let version = input.read_u8()?;
    let sequence = match input.read_u8()? {
        0xC0 => Sequence::Single,
        0x80 => Sequence::First,
        0x00 => Sequence::Middle,
        0x40 => Sequence::Last,
        _ => return Err(ReadError::UnrecognizedSequenceFlag),
    };
    let data_length = input.read_u24::<BigEndian>()?;
    let width = input.read_u16::<BigEndian>()?;
    let height = input.read_u16::<BigEndian>()?;
    let mut data = Vec::new();

    input.read_to_end(&mut data)?;

    Ok(
        ObjectDefinition {
            id,
            version,
            sequence,
            data_length,
            width,
            height,
            data,
        }
    )
}

/// Allows reading whole segments from a source.
pub trait ReadSegmentExt {
    /// Reads a single segment from a source.
    fn read_segment(&mut self) -> ReadResult<Segment>;
}

impl<T: Read> ReadSegmentExt for T {

    fn read_segment(&mut self) -> ReadResult<Segment> {

        if self.read_u16::<BigEndian>()? != MAGIC_NUMBER {
            return Err(ReadError::UnrecognizedMagicNumber)
        }

        let pts = self.read_u32::<BigEndian>()?;
        let dts = self.read_u32::<BigEndian>()?;
        let kind = SegmentKind::from_code(self.read_u8()?)
            .ok_or(ReadError::UnrecognizedKind)?;
        let size = self.read_u16::<BigEndian>()? as usize;

        let mut payload = vec![0u8; size];
        self.read_exact(&mut payload)?;

        let body = match kind {
            SegmentKind::PaletteDefinition =>
                SegmentBody::PaletteDefinition(read_pds(&payload)?),
            SegmentKind::ObjectDefinition =>
                SegmentBody::ObjectDefinition(read_ods(&payload)?),
            SegmentKind::PresentationComposition =>
                SegmentBody::PresentationComposition(read_pcs(&payload)?),
            SegmentKind::WindowDefinition =>
                SegmentBody::WindowDefinition(read_wds(&payload)?),
            SegmentKind::End =>
                SegmentBody::End,
        };

        Ok(Segment { pts, dts, body })
    }
}
