/*
 * Copyright 2022 William Swartzendruber
 *
 * This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0. If a
 * copy of the MPL was not distributed with this file, You can obtain one at
 * https://mozilla.org/MPL/2.0/.
 *
 * SPDX-License-Identifier: MPL-2.0
 */

//! Operates on individual segments.
//!
//! A segment is the most fundamental data structure within a PGS bitstream. Each one starts
//! with a fixed thirteen-byte header (magic number, PTS, DTS, kind, payload length) followed
//! by a kind-specific payload. All multi-byte fields are big-endian.
//!
//! There are five segment kinds, typically appearing in this order:
//!
//! 1. Presentation Composition Segment (PCS) — opens a display set and maps objects into
//!    windows.
//! 2. Window Definition Segment (WDS) — defines the screen areas compositions render into.
//! 3. Palette Definition Segment (PDS) — defines YCbCrA palette entries.
//! 4. Object Definition Segment (ODS) — carries run-length compressed bitmap data. The
//!    compressed data itself is treated as an opaque blob here and is copied, never
//!    interpreted.
//! 5. End Segment (END) — closes the current display set; it has no payload.
//!
//! Two layers of access are provided. The slice-level functions ([read_header_at],
//! [read_pcs], [write_pcs], and friends) decode and re-encode payloads over exact byte spans
//! of a caller-owned buffer, which is what the in-place transforms build on. The
//! [ReadSegmentExt] and [WriteSegmentExt] extension traits work over any [std::io::Read] /
//! [std::io::Write] for whole-segment streaming.


mod segmentread;
mod segmentwrite;

pub use segmentread::*;
pub use segmentwrite::*;

/// The magic number that starts every segment header.
pub const MAGIC_NUMBER: u16 = 0x5047;

/// The size of a segment header in bytes.
pub const HEADER_SIZE: usize = 13;

/// Discriminates the five segment kinds by their header type codes.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum SegmentKind {
    PaletteDefinition,
    ObjectDefinition,
    PresentationComposition,
    WindowDefinition,
    End,
}

impl SegmentKind {

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0x14 => Some(Self::PaletteDefinition),
            0x15 => Some(Self::ObjectDefinition),
            0x16 => Some(Self::PresentationComposition),
            0x17 => Some(Self::WindowDefinition),
            0x80 => Some(Self::End),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        match self {
            Self::PaletteDefinition => 0x14,
            Self::ObjectDefinition => 0x15,
            Self::PresentationComposition => 0x16,
            Self::WindowDefinition => 0x17,
            Self::End => 0x80,
        }
    }
}

/// The fixed-layout portion of every segment.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct SegmentHeader {
    /// The presentation timestamp in 90 kHz ticks.
    pub pts: u32,
    /// The decoding timestamp in 90 kHz ticks. In practice this is always zero.
    pub dts: u32,
    pub kind: SegmentKind,
    /// The declared payload length in bytes.
    pub length: u16,
}

impl SegmentHeader {

    /// Returns the buffer offset of the segment following the one at `offset`.
    pub fn next_offset(&self, offset: usize) -> usize {
        offset + HEADER_SIZE + self.length as usize
    }
}

/// Represents a complete segment.
#[derive(Clone, Debug, Hash, PartialEq)]
pub struct Segment {
    pub pts: u32,
    pub dts: u32,
    pub body: SegmentBody,
}

/// The typed payload of a segment.
#[derive(Clone, Debug, Hash, PartialEq)]
pub enum SegmentBody {
    PresentationComposition(PresentationComposition),
    WindowDefinition(Vec<Window>),
    PaletteDefinition(PaletteDefinition),
    ObjectDefinition(ObjectDefinition),
    End,
}

/// Defines the role of a display set within its epoch.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum CompositionState {
    /// Updates the composition currently on screen, typically to clear it.
    Normal,
    /// Redefines the current composition so that players seeking into the middle of an epoch
    /// can still render it.
    AcquisitionPoint,
    /// Starts a new epoch; the display set should be self-contained.
    EpochStart,
}

impl Default for CompositionState {
    fn default() -> Self { Self::EpochStart }
}

/// The payload of a presentation composition segment.
#[derive(Clone, Debug, Default, Hash, PartialEq)]
pub struct PresentationComposition {
    /// The width of the screen in pixels.
    pub width: u16,
    /// The height of the screen in pixels.
    pub height: u16,
    /// This value should be `0x10` and can typically be ignored.
    pub frame_rate: u8,
    /// Monotonically increasing identifier of the display set within the bitstream.
    pub composition_number: u16,
    pub composition_state: CompositionState,
    /// Whether this composition updates only the palette of the one on screen.
    pub palette_update: bool,
    pub palette_id: u8,
    pub objects: Vec<CompositionObject>,
}

/// Maps an object into a window within a presentation composition.
#[derive(Clone, Debug, Default, Hash, PartialEq)]
pub struct CompositionObject {
    pub object_id: u16,
    /// Links this object to a window definition by value; resolved by searching the display
    /// set's windows for a matching ID.
    pub window_id: u8,
    /// Whether the object is a forced subtitle.
    pub forced: bool,
    pub x: u16,
    pub y: u16,
    /// The visible sub-rectangle of the object, present only when the object declares itself
    /// cropped.
    pub crop: Option<CropArea>,
}

/// The visible sub-rectangle of a cropped composition object.
#[derive(Clone, Copy, Debug, Default, Hash, PartialEq)]
pub struct CropArea {
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
}

/// A single window within a window definition segment.
#[derive(Clone, Copy, Debug, Default, Hash, PartialEq)]
pub struct Window {
    pub id: u8,
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
}

/// The payload of a palette definition segment.
///
/// The entry count is not stored in the bitstream; it is derived from the declared segment
/// length.
#[derive(Clone, Debug, Default, Hash, PartialEq)]
pub struct PaletteDefinition {
    pub id: u8,
    pub version: u8,
    pub entries: Vec<PaletteEntry>,
}

/// A single YCbCrA palette entry.
#[derive(Clone, Copy, Debug, Default, Hash, PartialEq)]
pub struct PaletteEntry {
    pub id: u8,
    pub y: u8,
    pub cb: u8,
    pub cr: u8,
    pub alpha: u8,
}

/// Defines an object's role in a possible multi-part object.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Sequence {
    /// The object is discrete and stands alone.
    Single,
    /// The first portion of a multi-part object.
    First,
    /// An intermediate portion of a multi-part object.
    Middle,
    /// The last portion of a multi-part object.
    Last,
}

impl Default for Sequence {
    fn default() -> Self { Self::Single }
}

/// The payload of an object definition segment.
///
/// The compressed bitmap data is opaque: it is carried byte for byte and never decoded. The
/// declared data length is likewise carried verbatim, as for multi-part objects it spans
/// portions held by later segments.
#[derive(Clone, Debug, Default, Hash, PartialEq)]
pub struct ObjectDefinition {
    pub id: u16,
    pub version: u8,
    pub sequence: Sequence,
    /// The declared 24-bit object data length, counting the width and height fields.
    pub data_length: u32,
    pub width: u16,
    pub height: u16,
    /// The opaque run-length compressed bitmap data held by this segment.
    pub data: Vec<u8>,
}
