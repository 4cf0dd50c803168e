/*
 * Copyright 2022 William Swartzendruber
 *
 * To the extent possible under law, the person who associated CC0 with this file has waived
 * all copyright and related or neighboring rights to this file.
 *
 * SPDX-License-Identifier: CC0-1.0
 */

use super::*;
use crate::segment::{
    CompositionObject,
    CropArea,
    PaletteDefinition,
    PaletteEntry,
    ReadSegmentExt,
};
use std::io::Cursor;

#[test]
fn test_noop_config_leaves_buffer_untouched() {

    let mut buffer = build(&full_display_set(4_500));
    let reference = buffer.clone();
    let outcome = apply(&mut buffer, &TransformConfig::default()).unwrap();

    assert_eq!(buffer, reference);
    assert!(outcome.warnings.is_empty());
    assert!(outcome.prelude.is_none());
}

#[test]
fn test_positive_delay() {

    let mut buffer = build(&full_display_set(90_000));
    let config = TransformConfig {
        delay: 1_000.0,
        ..TransformConfig::default()
    };
    let outcome = apply(&mut buffer, &config).unwrap();

    assert!(outcome.warnings.is_empty());

    for segment in read_all(&buffer) {
        assert_eq!(segment.pts, 180_000);
    }
}

#[test]
fn test_negative_delay_clamps_to_zero() {

    let mut buffer = build(&full_display_set(4_500));
    let config = TransformConfig {
        delay: -100.0,
        ..TransformConfig::default()
    };
    let outcome = apply(&mut buffer, &config).unwrap();

    // One warning for each of the three clamped segments, carrying the original timestamp.
    assert_eq!(outcome.warnings.len(), 3);

    for warning in outcome.warnings {
        assert_eq!(
            warning,
            Warning::PtsBelowZero {
                timestamp: Timestamp {
                    hours: 0,
                    minutes: 0,
                    seconds: 0,
                    milliseconds: 50,
                },
            },
        );
    }

    for segment in read_all(&buffer) {
        assert_eq!(segment.pts, 0);
    }
}

#[test]
fn test_resync_scales_pts() {

    let mut buffer = build(&full_display_set(9_000));
    let config = TransformConfig {
        resync: 2.0,
        ..TransformConfig::default()
    };

    apply(&mut buffer, &config).unwrap();

    for segment in read_all(&buffer) {
        assert_eq!(segment.pts, 18_000);
    }
}

#[test]
fn test_delay_composes_with_resync() {

    let mut buffer = build(&full_display_set(9_000));
    let config = TransformConfig {
        delay: 10.0,
        resync: 2.0,
        ..TransformConfig::default()
    };

    apply(&mut buffer, &config).unwrap();

    // The delay itself is scaled by the resync factor.
    for segment in read_all(&buffer) {
        assert_eq!(segment.pts, 19_800);
    }
}

#[test]
fn test_tonemap_identity_leaves_palette_untouched() {

    let mut buffer = build(
        &[
            Segment {
                pts: 0,
                dts: 0,
                body: SegmentBody::PaletteDefinition(
                    PaletteDefinition {
                        id: 0,
                        version: 0,
                        entries: (0..=254)
                            .map(|id| {
                                PaletteEntry { id, y: id, cb: 128, cr: 128, alpha: 255 }
                            })
                            .collect(),
                    }
                ),
            },
        ]
    );
    let reference = buffer.clone();
    let config = TransformConfig {
        tonemap: 1.0,
        ..TransformConfig::default()
    };

    apply(&mut buffer, &config).unwrap();

    assert_eq!(buffer, reference);
}

#[test]
fn test_tonemap_scales_luma_within_studio_range() {

    let mut buffer = build(
        &[
            Segment {
                pts: 0,
                dts: 0,
                body: SegmentBody::PaletteDefinition(
                    PaletteDefinition {
                        id: 0,
                        version: 0,
                        entries: vec![
                            PaletteEntry { id: 0, y: 16, cb: 110, cr: 120, alpha: 130 },
                            PaletteEntry { id: 1, y: 70, cb: 110, cr: 120, alpha: 130 },
                            PaletteEntry { id: 2, y: 235, cb: 110, cr: 120, alpha: 130 },
                        ],
                    }
                ),
            },
        ]
    );
    let config = TransformConfig {
        tonemap: 2.0,
        ..TransformConfig::default()
    };

    apply(&mut buffer, &config).unwrap();

    let segments = read_all(&buffer);

    match &segments[0].body {
        SegmentBody::PaletteDefinition(pds) => {

            // Black stays black, scaled mid-tones scale, white clamps at reference white.
            assert_eq!(pds.entries[0].y, 16);
            assert_eq!(pds.entries[1].y, 124);
            assert_eq!(pds.entries[2].y, 235);

            // Chroma and alpha pass through.
            for entry in pds.entries.iter() {
                assert_eq!((entry.cb, entry.cr, entry.alpha), (110, 120, 130));
            }
        }
        _ => panic!("expected a palette definition"),
    }
}

#[test]
fn test_move_applies_delta_to_window_and_bound_objects() {

    let mut buffer = build(
        &[
            Segment {
                pts: 0,
                dts: 0,
                body: SegmentBody::PresentationComposition(
                    PresentationComposition {
                        width: 1_920,
                        height: 1_080,
                        frame_rate: 0x10,
                        composition_number: 0,
                        composition_state: CompositionState::EpochStart,
                        palette_update: false,
                        palette_id: 0,
                        objects: vec![
                            CompositionObject {
                                object_id: 0,
                                window_id: 3,
                                forced: false,
                                x: 600,
                                y: 900,
                                crop: Some(
                                    CropArea { x: 5, y: 40, width: 100, height: 50 }
                                ),
                            },
                        ],
                    }
                ),
            },
            Segment {
                pts: 0,
                dts: 0,
                body: SegmentBody::WindowDefinition(
                    vec![Window { id: 3, x: 500, y: 880, width: 400, height: 150 }]
                ),
            },
            Segment { pts: 0, dts: 0, body: SegmentBody::End },
        ]
    );
    let config = TransformConfig {
        move_delta: MoveDelta { x: 30, y: -20 },
        ..TransformConfig::default()
    };
    let outcome = apply(&mut buffer, &config).unwrap();

    assert!(outcome.warnings.is_empty());

    let segments = read_all(&buffer);

    match &segments[0].body {
        SegmentBody::PresentationComposition(pcs) => {

            assert_eq!((pcs.objects[0].x, pcs.objects[0].y), (630, 880));

            let crop = pcs.objects[0].crop.unwrap();

            assert_eq!((crop.x, crop.y), (35, 20));
        }
        _ => panic!("expected a presentation composition"),
    }

    match &segments[1].body {
        SegmentBody::WindowDefinition(windows) => {
            assert_eq!((windows[0].x, windows[0].y), (530, 860));
        }
        _ => panic!("expected a window definition"),
    }
}

#[test]
fn test_move_clamps_to_screen_bounds() {

    let mut buffer = build(&simple_display_set(200, 200, 20, 20, 0, 0, 100, 100));
    let config = TransformConfig {
        move_delta: MoveDelta { x: -50, y: 10 },
        ..TransformConfig::default()
    };

    apply(&mut buffer, &config).unwrap();

    let segments = read_all(&buffer);

    // The horizontal delta would push the window off screen and collapses to zero; the
    // vertical delta fits and carries into the bound object.
    match &segments[1].body {
        SegmentBody::WindowDefinition(windows) => {
            assert_eq!((windows[0].x, windows[0].y), (0, 10));
        }
        _ => panic!("expected a window definition"),
    }

    match &segments[0].body {
        SegmentBody::PresentationComposition(pcs) => {
            assert_eq!((pcs.objects[0].x, pcs.objects[0].y), (20, 30));
        }
        _ => panic!("expected a presentation composition"),
    }
}

#[test]
fn test_crop_shifts_geometry_and_shrinks_screen() {

    let mut buffer = build(&simple_display_set(1_920, 1_080, 100, 100, 90, 90, 200, 100));
    let config = TransformConfig {
        crop: CropMargins { left: 10, top: 20, right: 30, bottom: 40 },
        ..TransformConfig::default()
    };
    let outcome = apply(&mut buffer, &config).unwrap();

    assert!(outcome.warnings.is_empty());

    let segments = read_all(&buffer);

    match &segments[0].body {
        SegmentBody::PresentationComposition(pcs) => {
            assert_eq!((pcs.width, pcs.height), (1_880, 1_020));
            assert_eq!((pcs.objects[0].x, pcs.objects[0].y), (90, 80));
        }
        _ => panic!("expected a presentation composition"),
    }

    match &segments[1].body {
        SegmentBody::WindowDefinition(windows) => {
            assert_eq!((windows[0].x, windows[0].y), (80, 70));
        }
        _ => panic!("expected a window definition"),
    }
}

#[test]
fn test_crop_clamps_object_position_at_zero() {

    let mut buffer = build(&simple_display_set(1_920, 1_080, 5, 50, 50, 50, 100, 100));
    let config = TransformConfig {
        crop: CropMargins { left: 10, top: 0, right: 10, bottom: 0 },
        ..TransformConfig::default()
    };

    apply(&mut buffer, &config).unwrap();

    let segments = read_all(&buffer);

    match &segments[0].body {
        SegmentBody::PresentationComposition(pcs) => {
            assert_eq!(pcs.objects[0].x, 0);
        }
        _ => panic!("expected a presentation composition"),
    }
}

#[test]
fn test_crop_corrects_window_fallen_off_screen() {

    let mut buffer = build(&simple_display_set(1_920, 1_080, 1_700, 100, 1_700, 100, 200, 100));
    let config = TransformConfig {
        crop: CropMargins { left: 0, top: 0, right: 100, bottom: 0 },
        ..TransformConfig::default()
    };
    let outcome = apply(&mut buffer, &config).unwrap();

    assert_eq!(
        outcome.warnings,
        vec![Warning::WindowOutsideScreen { timestamp: Timestamp::from_ticks(0) }],
    );

    let segments = read_all(&buffer);

    // The window overshoots the 1820-wide cropped screen by 80 pixels; both it and its
    // bound object are pulled back in.
    match &segments[1].body {
        SegmentBody::WindowDefinition(windows) => {
            assert_eq!(windows[0].x, 1_620);
        }
        _ => panic!("expected a window definition"),
    }

    match &segments[0].body {
        SegmentBody::PresentationComposition(pcs) => {
            assert_eq!(pcs.objects[0].x, 1_620);
        }
        _ => panic!("expected a presentation composition"),
    }
}

#[test]
fn test_crop_warns_on_oversized_window() {

    let mut buffer = build(&simple_display_set(1_920, 1_080, 0, 0, 0, 0, 1_000, 100));
    let config = TransformConfig {
        crop: CropMargins { left: 0, top: 0, right: 1_000, bottom: 0 },
        ..TransformConfig::default()
    };
    let outcome = apply(&mut buffer, &config).unwrap();

    assert!(
        outcome
            .warnings
            .iter()
            .any(|warning| matches!(warning, Warning::WindowLargerThanScreen { .. }))
    );
}

#[test]
fn test_crop_leaves_embedded_crop_area_unadjusted() {

    let mut buffer = build(
        &[
            Segment {
                pts: 0,
                dts: 0,
                body: SegmentBody::PresentationComposition(
                    PresentationComposition {
                        width: 1_920,
                        height: 1_080,
                        frame_rate: 0x10,
                        composition_number: 0,
                        composition_state: CompositionState::EpochStart,
                        palette_update: false,
                        palette_id: 0,
                        objects: vec![
                            CompositionObject {
                                object_id: 0,
                                window_id: 0,
                                forced: false,
                                x: 100,
                                y: 100,
                                crop: Some(
                                    CropArea { x: 30, y: 30, width: 50, height: 50 }
                                ),
                            },
                        ],
                    }
                ),
            },
            Segment {
                pts: 0,
                dts: 0,
                body: SegmentBody::WindowDefinition(
                    vec![Window { id: 0, x: 90, y: 90, width: 200, height: 100 }]
                ),
            },
            Segment { pts: 0, dts: 0, body: SegmentBody::End },
        ]
    );
    let config = TransformConfig {
        crop: CropMargins { left: 10, top: 10, right: 10, bottom: 10 },
        ..TransformConfig::default()
    };
    let outcome = apply(&mut buffer, &config).unwrap();

    assert!(
        outcome
            .warnings
            .iter()
            .any(|warning| matches!(warning, Warning::CropAreaNotAdjusted { .. }))
    );

    let segments = read_all(&buffer);

    match &segments[0].body {
        SegmentBody::PresentationComposition(pcs) => {

            assert_eq!(pcs.objects[0].x, 90);

            // The sub-rectangle is relative to the object's own bitmap and stays put.
            assert_eq!(
                pcs.objects[0].crop,
                Some(CropArea { x: 30, y: 30, width: 50, height: 50 }),
            );
        }
        _ => panic!("expected a presentation composition"),
    }
}

#[test]
fn test_add_zero_synthesizes_prelude_and_renumbers() {

    let mut buffer = build(&full_display_set(900));
    let config = TransformConfig {
        add_zero: true,
        ..TransformConfig::default()
    };
    let outcome = apply(&mut buffer, &config).unwrap();
    let prelude = read_all(&outcome.prelude.unwrap());

    assert_eq!(prelude.len(), 3);
    assert_eq!(prelude[0].pts, 0);

    match &prelude[0].body {
        SegmentBody::PresentationComposition(pcs) => {
            assert_eq!(pcs.composition_number, 0);
            assert_eq!(pcs.composition_state, CompositionState::Normal);
            assert_eq!((pcs.width, pcs.height), (1_920, 1_080));
            assert!(pcs.objects.is_empty());
        }
        _ => panic!("expected a presentation composition"),
    }

    match &prelude[1].body {
        SegmentBody::WindowDefinition(windows) => {
            assert_eq!(windows, &vec![Window::default()]);
        }
        _ => panic!("expected a window definition"),
    }

    assert_eq!(prelude[2].body, SegmentBody::End);

    // The original composition slides up to make room.
    match &read_all(&buffer)[0].body {
        SegmentBody::PresentationComposition(pcs) => {
            assert_eq!(pcs.composition_number, 1);
        }
        _ => panic!("expected a presentation composition"),
    }
}

#[test]
fn test_add_zero_skips_prelude_when_numbering_starts_past_zero() {

    let mut segments = full_display_set(900);

    match &mut segments[0].body {
        SegmentBody::PresentationComposition(pcs) => pcs.composition_number = 5,
        _ => unreachable!(),
    }

    let mut buffer = build(&segments);
    let config = TransformConfig {
        add_zero: true,
        ..TransformConfig::default()
    };
    let outcome = apply(&mut buffer, &config).unwrap();

    assert!(outcome.prelude.is_none());
}

fn build(segments: &[Segment]) -> Vec<u8> {

    let mut buffer = vec![];

    for segment in segments.iter() {
        buffer.write_segment(segment).unwrap();
    }

    buffer
}

fn read_all(buffer: &[u8]) -> Vec<Segment> {

    let mut cursor = Cursor::new(buffer);
    let mut segments = vec![];

    while (cursor.position() as usize) < buffer.len() {
        segments.push(cursor.read_segment().unwrap());
    }

    segments
}

fn full_display_set(pts: u32) -> Vec<Segment> {
    simple_display_set(1_920, 1_080, 100, 900, 90, 890, 400, 150)
        .into_iter()
        .map(|segment| Segment { pts, ..segment })
        .collect()
}

/// A display set with one composition object at (`ox`, `oy`) bound to one window at
/// (`wx`, `wy`, `ww`, `wh`), on a `width` by `height` screen.
#[allow(clippy::too_many_arguments)]
fn simple_display_set(
    width: u16,
    height: u16,
    ox: u16,
    oy: u16,
    wx: u16,
    wy: u16,
    ww: u16,
    wh: u16,
) -> Vec<Segment> {

    vec![
        Segment {
            pts: 0,
            dts: 0,
            body: SegmentBody::PresentationComposition(
                PresentationComposition {
                    width,
                    height,
                    frame_rate: 0x10,
                    composition_number: 0,
                    composition_state: CompositionState::EpochStart,
                    palette_update: false,
                    palette_id: 0,
                    objects: vec![
                        CompositionObject {
                            object_id: 0,
                            window_id: 0,
                            forced: false,
                            x: ox,
                            y: oy,
                            crop: None,
                        },
                    ],
                }
            ),
        },
        Segment {
            pts: 0,
            dts: 0,
            body: SegmentBody::WindowDefinition(
                vec![Window { id: 0, x: wx, y: wy, width: ww, height: wh }]
            ),
        },
        Segment { pts: 0, dts: 0, body: SegmentBody::End },
    ]
}
