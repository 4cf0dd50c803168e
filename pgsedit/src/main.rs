/*
 * Copyright 2022 William Swartzendruber
 *
 * This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0. If a
 * copy of the MPL was not distributed with this file, You can obtain one at
 * https://mozilla.org/MPL/2.0/.
 *
 * SPDX-License-Identifier: MPL-2.0
 */


use pgs::{
    cutmerge,
    section::{parse_sections, FixMode, ListFormat, SectionSpec, TimeMode},
    segment::{CompositionState, ReadSegmentExt, SegmentBody, Sequence},
    transform::{self, CropMargins, MoveDelta, TransformConfig},
    ts_to_timestamp,
};
use std::{
    fmt::Display,
    fs,
    io::Cursor,
    process::exit,
};
use clap::{app_from_crate, crate_authors, crate_description, crate_name, crate_version, Arg};

fn main() {

    let matches = app_from_crate!()
        .arg(Arg::with_name("trace")
            .long("trace")
            .short("t")
            .help("Prints every segment of the input bitstream to standard output")
        )
        .arg(Arg::with_name("delay")
            .long("delay")
            .value_name("MS")
            .help("Shifts all timestamps by the given number of milliseconds")
            .takes_value(true)
            .allow_hyphen_values(true)
            .required(false)
            .validator(|value| {
                if value.parse::<f64>().is_ok() {
                    Ok(())
                } else {
                    Err("must be a number of milliseconds".to_string())
                }
            })
        )
        .arg(Arg::with_name("move")
            .long("move")
            .value_names(&["X", "Y"])
            .help("Moves all subtitles by the given number of pixels")
            .number_of_values(2)
            .allow_hyphen_values(true)
            .required(false)
            .validator(|value| {
                if value.parse::<i16>().is_ok() {
                    Ok(())
                } else {
                    Err("must be a signed pixel count".to_string())
                }
            })
        )
        .arg(Arg::with_name("crop")
            .long("crop")
            .value_names(&["LEFT", "TOP", "RIGHT", "BOTTOM"])
            .help("Removes the given margins from each edge of the screen")
            .number_of_values(4)
            .required(false)
            .validator(|value| {
                if value.parse::<u16>().is_ok() {
                    Ok(())
                } else {
                    Err("must be an unsigned pixel count".to_string())
                }
            })
        )
        .arg(Arg::with_name("resync")
            .long("resync")
            .value_name("FACTOR")
            .help("Multiplies all timestamps by the given factor or NUM/DEN fraction")
            .takes_value(true)
            .required(false)
            .validator(|value| parse_factor(&value).map(|_| ()))
        )
        .arg(Arg::with_name("tonemap")
            .long("tonemap")
            .value_name("FACTOR")
            .help("Scales the luminosity of the subtitles by the given factor")
            .takes_value(true)
            .required(false)
            .validator(|value| parse_factor(&value).map(|_| ()))
        )
        .arg(Arg::with_name("add-zero")
            .long("add-zero")
            .help("Prepends an empty display set at timestamp zero")
        )
        .arg(Arg::with_name("cut-merge")
            .long("cut-merge")
            .help("Keeps only the display sets overlapping the configured sections")
            .requires("list")
        )
        .arg(Arg::with_name("list")
            .long("list")
            .value_name("SECTIONS")
            .help("The list of sections to keep")
            .takes_value(true)
            .required(false)
            .requires("cut-merge")
        )
        .arg(Arg::with_name("format")
            .long("format")
            .value_name("FORMAT")
            .help("The notation the section list is written in")
            .takes_value(true)
            .required(false)
            .default_value("secut")
            .possible_values(&["secut", "vapoursynth", "vs", "avisynth", "avs", "remap"])
        )
        .arg(Arg::with_name("timemode")
            .long("timemode")
            .value_name("MODE")
            .help("The time base section values are expressed in")
            .takes_value(true)
            .required(false)
            .default_value("ms")
            .possible_values(&["ms", "frame", "timestamp"])
        )
        .arg(Arg::with_name("fps")
            .long("fps")
            .value_name("RATE")
            .help("The frame rate or NUM/DEN fraction used by the frame time mode")
            .takes_value(true)
            .required_if("timemode", "frame")
            .validator(|value| parse_factor(&value).map(|_| ()))
        )
        .arg(Arg::with_name("fixmode")
            .long("fixmode")
            .value_name("MODE")
            .help("How display sets partially overlapping a section are treated")
            .takes_value(true)
            .required(false)
            .default_value("cut")
            .possible_values(&["cut", "delete", "del"])
        )
        .arg(Arg::with_name("input")
            .index(1)
            .value_name("INPUT-FILE")
            .help("Input PGS file")
            .required(true)
        )
        .arg(Arg::with_name("output")
            .index(2)
            .value_name("OUTPUT-FILE")
            .help("Output PGS file")
            .required_unless("trace")
        )
        .after_help(format!("This utility will retime, reposition, and cut PGS subtitles \
            found in Blu-ray discs so that they can match edits that have been made to the \
            main video stream.\n\n\
            Copyright © 2022 William Swartzendruber\n\
            Licensed under the Mozilla Public License 2.0\n\
            <{}>", env!("CARGO_PKG_REPOSITORY")).as_str())
        .get_matches();
    let input_value = matches.value_of("input").unwrap();
    let mut buffer = fs::read(input_value).expect("Could not read input file.");

    if matches.is_present("trace") {
        trace(&buffer);
    }

    let config = TransformConfig {
        delay: matches
            .value_of("delay")
            .map_or(0.0, |value| value.parse::<f64>().unwrap()),
        move_delta: match matches.values_of("move") {
            Some(mut values) => MoveDelta {
                x: values.next().unwrap().parse::<i16>().unwrap(),
                y: values.next().unwrap().parse::<i16>().unwrap(),
            },
            None => MoveDelta::default(),
        },
        crop: match matches.values_of("crop") {
            Some(mut values) => CropMargins {
                left: values.next().unwrap().parse::<u16>().unwrap(),
                top: values.next().unwrap().parse::<u16>().unwrap(),
                right: values.next().unwrap().parse::<u16>().unwrap(),
                bottom: values.next().unwrap().parse::<u16>().unwrap(),
            },
            None => CropMargins::default(),
        },
        resync: matches
            .value_of("resync")
            .map_or(1.0, |value| parse_factor(value).unwrap()),
        tonemap: matches
            .value_of("tonemap")
            .map_or(1.0, |value| parse_factor(value).unwrap()),
        add_zero: matches.is_present("add-zero"),
    };
    let mut prelude = None;

    if !config.is_noop() {

        let outcome = transform::apply(&mut buffer, &config)
            .unwrap_or_else(|error| fail(&error));

        for warning in outcome.warnings.iter() {
            eprintln!("warning: {}", warning);
        }

        prelude = outcome.prelude;
    }

    let result = if matches.is_present("cut-merge") {

        let spec = SectionSpec {
            format: match matches.value_of("format").unwrap() {
                "secut" => ListFormat::Secut,
                "vapoursynth" | "vs" => ListFormat::VapourSynth,
                "avisynth" | "avs" => ListFormat::AviSynth,
                "remap" => ListFormat::Remap,
                _ => unreachable!(),
            },
            time_mode: match matches.value_of("timemode").unwrap() {
                "ms" => TimeMode::Milliseconds,
                "frame" => TimeMode::Frame,
                "timestamp" => TimeMode::Timestamp,
                _ => unreachable!(),
            },
            fps: matches
                .value_of("fps")
                .map_or(0.0, |value| parse_factor(value).unwrap()),
            list: matches.value_of("list").unwrap().to_owned(),
        };
        let fix_mode = match matches.value_of("fixmode").unwrap() {
            "cut" => FixMode::Cut,
            "delete" | "del" => FixMode::Delete,
            _ => unreachable!(),
        };
        let sections = parse_sections(&spec).unwrap_or_else(|error| fail(&error));

        cutmerge::run(&mut buffer, &sections, fix_mode, config.add_zero)
            .unwrap_or_else(|error| fail(&error))
    } else {
        buffer
    };

    if let Some(output_value) = matches.value_of("output") {

        let mut output = prelude.unwrap_or_default();

        output.extend_from_slice(&result);
        fs::write(output_value, output).expect("Could not write output file.");
    }
}

fn trace(buffer: &[u8]) {

    let mut cursor = Cursor::new(buffer);

    while (cursor.position() as usize) < buffer.len() {

        let segment = cursor.read_segment().unwrap_or_else(|error| fail(&error));

        match segment.body {
            SegmentBody::PresentationComposition(pcs) => {
                println!("presentation_composition_segment({})", ts_to_timestamp(segment.pts));
                println!("  width = {}", pcs.width);
                println!("  height = {}", pcs.height);
                println!("  composition_number = {}", pcs.composition_number);
                println!("  composition_state = {}", match pcs.composition_state {
                    CompositionState::EpochStart => "EPOCH_START",
                    CompositionState::Normal => "NORMAL_CASE",
                    CompositionState::AcquisitionPoint => "ACQUISITION_POINT",
                });
                if pcs.palette_update {
                    println!("  palette_update_id = {}", pcs.palette_id);
                }
                for comp_obj in pcs.objects.iter() {
                    println!("  composition_object");
                    println!("    object_id = {}", comp_obj.object_id);
                    println!("    window_id = {}", comp_obj.window_id);
                    println!("    object_forced = {}", comp_obj.forced);
                    println!("    object_horizontal_position = {}", comp_obj.x);
                    println!("    object_vertical_position = {}", comp_obj.y);
                    match &comp_obj.crop {
                        Some(crop) => {
                            println!("    object_cropping_horizontal_position = {}", crop.x);
                            println!("    object_cropping_vertical_position = {}", crop.y);
                            println!("    object_cropping_width = {}", crop.width);
                            println!("    object_cropping_height = {}", crop.height);
                        }
                        None => { }
                    }
                }
            }
            SegmentBody::WindowDefinition(windows) => {
                println!("window_definition_segment({})", ts_to_timestamp(segment.pts));
                for window in windows.iter() {
                    println!("  window_id = {}", window.id);
                    println!("  window_horizontal_position = {}", window.x);
                    println!("  window_vertical_position = {}", window.y);
                    println!("  window_width = {}", window.width);
                    println!("  window_height = {}", window.height);
                }
            }
            SegmentBody::PaletteDefinition(pds) => {
                println!("palette_definition_segment({})", ts_to_timestamp(segment.pts));
                println!("  palette_id = {}", pds.id);
                println!("  palette_version = {}", pds.version);
                println!("  palette_entries = [{}]", pds.entries.len());
            }
            SegmentBody::ObjectDefinition(ods) => {
                println!("object_definition_segment({})", ts_to_timestamp(segment.pts));
                println!("  object_id = {}", ods.id);
                println!("  object_version = {}", ods.version);
                println!("  object_sequence = {}", match ods.sequence {
                    Sequence::Single => "SINGLE",
                    Sequence::First => "FIRST",
                    Sequence::Middle => "MIDDLE",
                    Sequence::Last => "LAST",
                });
                println!("  object_data_length = {}", ods.data_length);
                println!("  object_width = {}", ods.width);
                println!("  object_height = {}", ods.height);
                println!("  object_data = [{}]", ods.data.len());
            }
            SegmentBody::End => {
                println!("end_segment({})", ts_to_timestamp(segment.pts));
                println!();
            }
        }
    }
}

/// Parses a factor given either as a plain number or as a `NUM/DEN` fraction.
fn parse_factor(value: &str) -> Result<f64, String> {

    let factor = match value.split_once('/') {
        Some((num_text, den_text)) => {

            let num = num_text.parse::<f64>()
                .map_err(|_| "numerator must be a number".to_string())?;
            let den = den_text.parse::<f64>()
                .map_err(|_| "denominator must be a number".to_string())?;

            num / den
        }
        None => value.parse::<f64>().map_err(|_| "must be a number".to_string())?,
    };

    if !factor.is_normal() {
        return Err("must be a normal number".to_string())
    }
    if !factor.is_sign_positive() {
        return Err("must be a positive number".to_string())
    }

    Ok(factor)
}

fn fail(error: &dyn Display) -> ! {
    eprintln!("{}", error);
    exit(1)
}
