// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::PathBuf;
use std::time::Instant;

use clap::{crate_version, value_parser, Arg, ArgAction, ArgMatches, Command};
use log::info;

use quickastc::dimensions::{Dimensioned, Dimensions};
use quickastc::*;

fn cli() -> Command {
    let verbose = Arg::new("verbose")
        .short('v')
        .long("verbose")
        .action(ArgAction::SetTrue)
        .help("Log debug output");

    Command::new("quickastc")
        .version(crate_version!())
        .about("Compress and decompress ASTC textures")
        .subcommand_required(true)
        .subcommand(
            Command::new("compress")
                .about("Compress a PNG image into an .astc file")
                .arg(Arg::new("input").required(true).value_parser(value_parser!(PathBuf)))
                .arg(Arg::new("output").required(true).value_parser(value_parser!(PathBuf)))
                .arg(
                    Arg::new("block")
                        .short('b')
                        .long("block")
                        .default_value("4x4")
                        .value_parser(value_parser!(Footprint))
                        .help("Block footprint, WxH"),
                )
                .arg(
                    Arg::new("quality")
                        .short('q')
                        .long("quality")
                        .default_value("50")
                        .value_parser(value_parser!(u8).range(0..=100))
                        .help("Search effort from 0 (fastest) to 100 (best)"),
                )
                .arg(
                    Arg::new("threads")
                        .short('j')
                        .long("threads")
                        .value_parser(value_parser!(usize))
                        .help("Worker threads, defaults to every available core"),
                )
                .arg(verbose.clone()),
        )
        .subcommand(
            Command::new("decompress")
                .about("Decompress an .astc file into a PNG image")
                .arg(Arg::new("input").required(true).value_parser(value_parser!(PathBuf)))
                .arg(Arg::new("output").required(true).value_parser(value_parser!(PathBuf)))
                .arg(
                    Arg::new("mode")
                        .short('m')
                        .long("mode")
                        .default_value("ldr")
                        .value_parser(value_parser!(DecodeMode))
                        .help("Decode mode: ldr, srgb or hdr"),
                )
                .arg(verbose),
        )
}

fn path(matches: &ArgMatches, id: &str) -> CodecResult<PathBuf> {
    matches
        .get_one::<PathBuf>(id)
        .cloned()
        .ok_or_else(|| CodecError::Internal(format!("missing argument {id}")))
}

fn run_compress(matches: &ArgMatches) -> CodecResult {
    let input = path(matches, "input")?;
    let output = path(matches, "output")?;
    let footprint = matches.get_one::<Footprint>("block").copied().unwrap_or(Footprint::ASTC_4X4);
    let quality = matches.get_one::<u8>("quality").copied().unwrap_or(50);

    let mut config = EncoderConfig::new(footprint).with_quality(quality as f32 / 100.0);
    if let Some(&threads) = matches.get_one::<usize>("threads") {
        config = config.with_threads(threads);
    }

    let image = image::open(&input)?.into_rgba8();
    let dimensions = Dimensions::new(image.width(), image.height());
    let texture = TextureBuffer::new(BufferFormat::Rgba8, dimensions, image.into_raw())?;

    let start = Instant::now();
    let compressed = compress(&texture, config)?;
    info!(
        "Compressed {} ({dimensions}) with {footprint} blocks in {:.2?}",
        input.display(),
        start.elapsed()
    );

    AstcHeader::write_texture(&mut BufWriter::new(File::create(output)?), &compressed)
}

fn run_decompress(matches: &ArgMatches) -> CodecResult {
    let input = path(matches, "input")?;
    let output = path(matches, "output")?;
    let mode = matches.get_one::<DecodeMode>("mode").copied().unwrap_or_default();

    let compressed = AstcHeader::read_texture(&mut BufReader::new(File::open(&input)?))?;
    let start = Instant::now();
    let texture = decompress(&compressed, BufferFormat::Rgba8, mode)?;
    let dimensions = texture.dimensions();
    info!("Decompressed {} ({dimensions}) in {:.2?}", input.display(), start.elapsed());

    image::save_buffer(
        output,
        texture.data(),
        dimensions.width(),
        dimensions.height(),
        image::ColorType::Rgba8,
    )?;
    Ok(())
}

fn main() -> CodecResult {
    let matches = cli().get_matches();
    let (name, sub) = matches
        .subcommand()
        .ok_or_else(|| CodecError::Internal("no command given".into()))?;

    let level = if sub.get_flag("verbose") { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match name {
        "compress" => run_compress(sub),
        "decompress" => run_decompress(sub),
        other => Err(CodecError::Internal(format!("unknown command {other}"))),
    }
}
