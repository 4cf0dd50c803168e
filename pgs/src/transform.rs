/*
 * Copyright 2022 William Swartzendruber
 *
 * This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0. If a
 * copy of the MPL was not distributed with this file, You can obtain one at
 * https://mozilla.org/MPL/2.0/.
 *
 * SPDX-License-Identifier: MPL-2.0
 */

//! Applies timing and geometry transforms in place over a whole bitstream buffer.
//!
//! A single forward pass handles every enabled transform: resync and delay rewrite segment
//! headers, tonemap rewrites palette definitions, and crop / move rewrite window definitions
//! together with the presentation composition that maps objects into them. Composition
//! objects are linked to windows by window ID, so any correction applied to a window is
//! propagated to the objects bound to it.
//!
//! Nothing here fails on questionable geometry; such conditions are reported as structured
//! [Warning] values alongside the successful result.

#[cfg(test)]
mod tests;

use crate::{
    segment::{
        patch_payload,
        read_header_at,
        read_pcs,
        read_pds,
        read_wds,
        write_header,
        write_pcs,
        write_pds,
        write_wds,
        CompositionState,
        PresentationComposition,
        Segment,
        SegmentBody,
        SegmentHeader,
        SegmentKind,
        Window,
        WriteResult,
        WriteSegmentExt,
        HEADER_SIZE,
    },
    ScanError,
    Timestamp,
    TICKS_PER_MS,
};
use thiserror::Error as ThisError;

/// A horizontal and vertical offset to move windows by, in pixels.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct MoveDelta {
    pub x: i16,
    pub y: i16,
}

/// The margins to remove from each edge of the screen, in pixels.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct CropMargins {
    pub left: u16,
    pub top: u16,
    pub right: u16,
    pub bottom: u16,
}

/// The complete set of transforms to apply in one pass.
#[derive(Clone, Debug)]
pub struct TransformConfig {
    /// The time shift in milliseconds, signed.
    pub delay: f64,
    pub move_delta: MoveDelta,
    pub crop: CropMargins,
    /// The rational factor every PTS is multiplied by; `1.0` disables resync.
    pub resync: f64,
    /// The luminosity scale factor; `1.0` disables tonemapping.
    pub tonemap: f64,
    /// Whether to synthesize a leading zero-composition display set.
    pub add_zero: bool,
}

impl Default for TransformConfig {

    fn default() -> Self {
        Self {
            delay: 0.0,
            move_delta: MoveDelta::default(),
            crop: CropMargins::default(),
            resync: 1.0,
            tonemap: 1.0,
            add_zero: false,
        }
    }
}

impl TransformConfig {

    /// Whether this configuration leaves the bitstream untouched.
    pub fn is_noop(&self) -> bool {
        self.delay == 0.0
            && self.move_delta == MoveDelta::default()
            && self.crop == CropMargins::default()
            && self.resync == 1.0
            && self.tonemap == 1.0
            && !self.add_zero
    }

    // The delay is pre-multiplied by the resync factor once here, so that delay and resync
    // compose the same way regardless of per-segment rounding.
    fn delay_ticks(&self) -> i64 {
        ((self.delay * TICKS_PER_MS).round() * self.resync).round() as i64
    }
}

/// A non-fatal condition encountered while transforming a bitstream.
#[derive(ThisError, Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Warning {
    /// A negative delay would have driven a PTS below zero; it was clamped to zero instead.
    #[error("pts would fall below zero at {timestamp}; clamping to zero")]
    PtsBelowZero { timestamp: Timestamp },
    /// A display set maps more than one composition object; crop repositioning may need
    /// manual review.
    #[error("multiple composition objects at {timestamp}")]
    MultipleCompositionObjects { timestamp: Timestamp },
    /// A display set defines more than one window; crop repositioning may need manual
    /// review.
    #[error("multiple windows at {timestamp}")]
    MultipleWindows { timestamp: Timestamp },
    /// A composition object carries its own crop sub-rectangle, which the crop transform
    /// does not adjust.
    #[error("composition object carries a crop area at {timestamp}; leaving it unadjusted")]
    CropAreaNotAdjusted { timestamp: Timestamp },
    /// A window is larger than the screen that remains after cropping.
    #[error("window is larger than the cropped screen at {timestamp}")]
    WindowLargerThanScreen { timestamp: Timestamp },
    /// A window extends outside the screen that remains after cropping; it was shifted back
    /// inside.
    #[error("window falls outside the cropped screen at {timestamp}")]
    WindowOutsideScreen { timestamp: Timestamp },
}

/// The result of a successful transform pass.
#[derive(Debug, Default)]
pub struct TransformOutcome {
    pub warnings: Vec<Warning>,
    /// A synthesized leading display set to emit before the transformed buffer, present only
    /// when `add_zero` is configured and the bitstream starts at composition number zero.
    pub prelude: Option<Vec<u8>>,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
struct Rect {
    x: u16,
    y: u16,
    width: u16,
    height: u16,
}

impl Rect {

    // Strict containment; windows touching the screen edge are treated as outside and
    // shifted inward.
    fn contains(&self, other: &Rect) -> bool {
        other.x > self.x
            && other.y > self.y
            && u32::from(other.x) + u32::from(other.width)
                < u32::from(self.x) + u32::from(self.width)
            && u32::from(other.y) + u32::from(other.height)
                < u32::from(self.y) + u32::from(self.height)
    }
}

/// Applies every enabled transform in `config` to the bitstream in `buffer`, rewriting it in
/// place.
pub fn apply(buffer: &mut [u8], config: &TransformConfig) -> Result<TransformOutcome, ScanError> {

    let delay = config.delay_ticks();
    let do_delay = delay != 0;
    let do_resync = config.resync != 1.0;
    let do_tonemap = config.tonemap != 1.0;
    let do_crop = config.crop != CropMargins::default();
    let do_move = config.move_delta != MoveDelta::default();
    let decode_pcs = do_crop || do_move || config.add_zero;

    let mut outcome = TransformOutcome::default();
    let mut screen = Rect::default();
    let mut pcs: Option<PresentationComposition> = None;
    let mut pcs_offset = 0usize;
    let mut pcs_length = 0u16;
    let mut offset = 0usize;

    while offset < buffer.len() {

        let mut header = read_header_at(buffer, offset)
            .map_err(|source| ScanError::Read { offset, source })?;
        let timestamp = Timestamp::from_ticks(header.pts);

        if do_resync {
            header.pts = (f64::from(header.pts) * config.resync).round() as u32;
        }

        if do_delay {
            let shifted = i64::from(header.pts) + delay;
            header.pts = if shifted < 0 {
                outcome.warnings.push(Warning::PtsBelowZero { timestamp });
                0
            } else {
                shifted as u32
            };
        }

        if do_resync || do_delay {
            write_header(&header, buffer, offset)
                .map_err(|source| ScanError::Write { offset, source })?;
        }

        let payload_start = offset + HEADER_SIZE;
        let payload_end = payload_start + header.length as usize;

        match header.kind {
            SegmentKind::PaletteDefinition if do_tonemap => {

                let mut pds = read_pds(&buffer[payload_start..payload_end])
                    .map_err(|source| ScanError::Read { offset, source })?;

                for entry in pds.entries.iter_mut() {
                    entry.y = tonemap_luma(entry.y, config.tonemap);
                }

                let payload = write_pds(&pds)
                    .map_err(|source| ScanError::Write { offset, source })?;

                patch_payload(buffer, offset, header.length, &payload)
                    .map_err(|source| ScanError::Write { offset, source })?;
            }
            SegmentKind::PresentationComposition if decode_pcs => {

                let mut current = read_pcs(&buffer[payload_start..payload_end])
                    .map_err(|source| ScanError::Read { offset, source })?;

                pcs_offset = offset;
                pcs_length = header.length;

                if do_crop {

                    screen = Rect {
                        x: config.crop.left,
                        y: config.crop.top,
                        width: shrink(current.width, config.crop.left, config.crop.right),
                        height: shrink(current.height, config.crop.top, config.crop.bottom),
                    };
                    current.width = screen.width;
                    current.height = screen.height;

                    if current.objects.len() > 1 {
                        outcome
                            .warnings
                            .push(Warning::MultipleCompositionObjects { timestamp });
                    }

                    for object in current.objects.iter_mut() {
                        if object.crop.is_some() {
                            outcome.warnings.push(Warning::CropAreaNotAdjusted { timestamp });
                        }
                        object.x = object.x.saturating_sub(config.crop.left);
                        object.y = object.y.saturating_sub(config.crop.top);
                    }
                }

                if config.add_zero {
                    if current.composition_number == 0 {
                        outcome.prelude = Some(
                            zero_display_set(&header, &current)
                                .map_err(|source| ScanError::Write { offset, source })?
                        );
                    }
                    current.composition_number += 1;
                }

                let payload = write_pcs(&current)
                    .map_err(|source| ScanError::Write { offset, source })?;

                patch_payload(buffer, offset, header.length, &payload)
                    .map_err(|source| ScanError::Write { offset, source })?;

                pcs = Some(current);
            }
            SegmentKind::WindowDefinition if do_crop || do_move => {

                let mut windows = read_wds(&buffer[payload_start..payload_end])
                    .map_err(|source| ScanError::Read { offset, source })?;
                let mut fix_pcs = false;

                if windows.len() > 1 {
                    outcome.warnings.push(Warning::MultipleWindows { timestamp });
                }

                if do_move {
                    if let Some(current) = pcs.as_mut() {
                        for window in windows.iter_mut() {
                            fix_pcs |= move_window(window, current, config.move_delta);
                        }
                    }
                }

                if do_crop {
                    for window in windows.iter_mut() {
                        fix_pcs |= crop_window(
                            window,
                            pcs.as_mut(),
                            &screen,
                            &config.crop,
                            timestamp,
                            &mut outcome.warnings,
                        );
                    }
                }

                if fix_pcs {
                    if let Some(current) = pcs.as_ref() {
                        let payload = write_pcs(current)
                            .map_err(|source| ScanError::Write { offset: pcs_offset, source })?;
                        patch_payload(buffer, pcs_offset, pcs_length, &payload)
                            .map_err(|source| ScanError::Write { offset: pcs_offset, source })?;
                    }
                }

                let payload = write_wds(&windows)
                    .map_err(|source| ScanError::Write { offset, source })?;

                patch_payload(buffer, offset, header.length, &payload)
                    .map_err(|source| ScanError::Write { offset, source })?;
            }
            SegmentKind::End => {
                screen = Rect::default();
                pcs = None;
            }
            _ => { }
        }

        offset = payload_end;
    }

    Ok(outcome)
}

/// Moves a window by the configured delta, clamped so the window stays on screen, and applies
/// the same clamped delta to every composition object bound to the window, including any
/// embedded crop area. Returns whether the composition changed.
fn move_window(
    window: &mut Window,
    pcs: &mut PresentationComposition,
    delta: MoveDelta,
) -> bool {

    let min_dx = -i32::from(window.x);
    let min_dy = -i32::from(window.y);
    let max_dx = i32::from(pcs.width) - i32::from(window.x) - i32::from(window.width);
    let max_dy = i32::from(pcs.height) - i32::from(window.y) - i32::from(window.height);
    let dx = i32::from(delta.x).max(min_dx).min(max_dx);
    let dy = i32::from(delta.y).max(min_dy).min(max_dy);
    let mut changed = false;

    window.x = offset_position(window.x, dx);
    window.y = offset_position(window.y, dy);

    for object in pcs.objects.iter_mut() {

        if object.window_id != window.id {
            continue;
        }

        object.x = offset_position(object.x, dx);
        object.y = offset_position(object.y, dy);

        // Unlike the crop transform, moving does carry into the embedded crop area.
        if let Some(crop) = object.crop.as_mut() {
            crop.x = offset_position(crop.x, dx);
            crop.y = offset_position(crop.y, dy);
        }

        changed = true;
    }

    changed
}

/// Shifts a window according to the crop margins, computing a correction when the window
/// would fall outside the cropped screen and applying that correction to every composition
/// object bound to the window. Returns whether the composition changed.
fn crop_window(
    window: &mut Window,
    pcs: Option<&mut PresentationComposition>,
    screen: &Rect,
    crop: &CropMargins,
    timestamp: Timestamp,
    warnings: &mut Vec<Warning>,
) -> bool {

    let mut corr_x = 0u16;
    let mut corr_y = 0u16;
    let rect = Rect {
        x: window.x,
        y: window.y,
        width: window.width,
        height: window.height,
    };

    if rect.width > screen.width || rect.height > screen.height {
        warnings.push(Warning::WindowLargerThanScreen { timestamp });
    } else if !screen.contains(&rect) {

        warnings.push(Warning::WindowOutsideScreen { timestamp });

        let window_right = u32::from(rect.x) + u32::from(rect.width);
        let screen_right = u32::from(screen.x) + u32::from(screen.width);

        if window_right > screen_right {
            corr_x = (window_right - screen_right) as u16;
        }

        let window_bottom = u32::from(rect.y) + u32::from(rect.height);
        let screen_bottom = u32::from(screen.y) + u32::from(screen.height);

        if window_bottom > screen_bottom {
            corr_y = (window_bottom - screen_bottom) as u16;
        }
    }

    window.x = if crop.left > window.x {
        0
    } else {
        window.x.saturating_sub(crop.left + corr_x)
    };
    window.y = if crop.top > window.y {
        0
    } else {
        window.y.saturating_sub(crop.top + corr_y)
    };

    if corr_x == 0 && corr_y == 0 {
        return false
    }

    match pcs {
        Some(current) => {

            for object in current.objects.iter_mut() {

                if object.window_id != window.id {
                    continue;
                }

                object.x = object.x.saturating_sub(corr_x);
                object.y = object.y.saturating_sub(corr_y);
            }

            true
        }
        None => false,
    }
}

fn shrink(size: u16, near: u16, far: u16) -> u16 {
    u32::from(size)
        .saturating_sub(u32::from(near) + u32::from(far))
        .min(u32::from(u16::MAX)) as u16
}

fn offset_position(position: u16, delta: i32) -> u16 {
    (i32::from(position) + delta).clamp(0, i32::from(u16::MAX)) as u16
}

/// Expands a studio-range luma value to unit range, scales it, clamps, and maps it back.
fn tonemap_luma(y: u8, factor: f64) -> u8 {
    let expanded = (f64::from(y) - 16.0) / (235.0 - 16.0);
    let scaled = (expanded * factor).clamp(0.0, 1.0);
    (scaled * (235.0 - 16.0) + 16.0).round() as u8
}

/// Synthesizes the leading display set emitted ahead of a bitstream whose first composition
/// number is zero: an empty normal-case composition, a single zero-sized window, and an end
/// segment, all at PTS zero.
fn zero_display_set(
    header: &SegmentHeader,
    pcs: &PresentationComposition,
) -> WriteResult<Vec<u8>> {

    let mut prelude = Vec::new();

    prelude.write_segment(
        &Segment {
            pts: 0,
            dts: header.dts,
            body: SegmentBody::PresentationComposition(
                PresentationComposition {
                    width: pcs.width,
                    height: pcs.height,
                    frame_rate: pcs.frame_rate,
                    composition_number: 0,
                    composition_state: CompositionState::Normal,
                    palette_update: false,
                    palette_id: 0,
                    objects: vec![],
                }
            ),
        }
    )?;
    prelude.write_segment(
        &Segment {
            pts: 0,
            dts: header.dts,
            body: SegmentBody::WindowDefinition(vec![Window::default()]),
        }
    )?;
    prelude.write_segment(
        &Segment {
            pts: 0,
            dts: header.dts,
            body: SegmentBody::End,
        }
    )?;

    Ok(prelude)
}
