use std::io::{BufReader, BufWriter, Read, Write};
use std::time::Instant;
use std::{env, fs, fs::File, path::PathBuf};

use ppmint::{ArithmeticDecoder, ArithmeticEncoder, Codable, Ppm, UniformBytes};

const MAX_DEPTH: u32 = 3;

#[derive(Clone, Copy)]
enum Action {
    Compress,
    Decompress,
    Test,
}

fn main() -> ppmint::Result<()> {
    let args: Vec<String> = env::args().collect();
    if args.len() != 3 {
        print_usage_and_panic("Invocation doesn't match usage! Provide 2 arguments.");
    }
    let path = PathBuf::from(&args[2]);
    let action = match args[1].as_str() {
        "c" => Action::Compress,
        "d" => Action::Decompress,
        "t" => Action::Test,
        _ => {
            print_usage_and_panic("Unrecognized option -> <action>!");
            unreachable!();
        }
    };

    if !path.is_file() {
        panic!("Path must be a file!");
    }
    run(path, action)
}

fn run(file_path: PathBuf, action: Action) -> ppmint::Result<()> {
    let mut out_path = env::current_dir().map_err(ppmint::Error::Io)?;
    out_path.push(file_path.file_name().expect("Invalid file!"));

    let compress_path = out_path.with_extension("bin");
    let decompress_path = out_path.with_extension("orig");

    let timer = Instant::now();
    match action {
        Action::Compress => {
            compress(&file_path, &compress_path)?;
            println!("Compression took: {:?}", timer.elapsed());
        }
        Action::Decompress => {
            decompress(&file_path, &decompress_path)?;
            println!("Decompression took: {:?}", timer.elapsed());
        }
        Action::Test => {
            compress(&file_path, &compress_path)?;
            println!("Compression took: {:?}", timer.elapsed());
            let timer = Instant::now();
            decompress(&compress_path, &decompress_path)?;
            println!("Decompression took: {:?}", timer.elapsed());
        }
    }

    Ok(())
}

fn init_model() -> Ppm<UniformBytes> {
    // PPMD-style smoothing: alpha = 0, beta = 1/2
    Ppm::with_rationals(MAX_DEPTH, (0, 1), (1, 2), UniformBytes::new())
}

fn compress(input_file: &PathBuf, output_file: &PathBuf) -> ppmint::Result<()> {
    let data = fs::read(input_file)?;
    let mut writer = BufWriter::new(File::create(output_file)?);
    // byte count up front; the coded stream has no terminator of its own
    writer.write_all(&(data.len() as u64).to_be_bytes())?;

    let mut model = init_model();
    let mut enc = ArithmeticEncoder::new(writer);
    for &byte in &data {
        model.encode(byte, &mut enc)?;
        model.learn(byte);
    }

    let mut writer = enc.finish()?;
    writer.flush()?;
    Ok(())
}

fn decompress(input_file: &PathBuf, output_file: &PathBuf) -> ppmint::Result<()> {
    let mut reader = BufReader::new(File::open(input_file)?);
    let mut len_bytes = [0u8; 8];
    reader.read_exact(&mut len_bytes)?;
    let len = u64::from_be_bytes(len_bytes);

    let mut model = init_model();
    let mut dec = ArithmeticDecoder::new(reader)?;
    let mut writer = BufWriter::new(File::create(output_file)?);
    for _ in 0..len {
        let byte = model.decode(&mut dec)?;
        model.learn(byte);
        writer.write_all(&[byte])?;
    }

    writer.flush()?;
    Ok(())
}

fn print_usage_and_panic(panic_msg: &str) {
    println!("Usage: ppmint <Action> <Path>");
    println!("<Action>: c (compress), d (decompress), t (test = c + d)");
    println!("<Path> must be a single file");
    panic!("{panic_msg}");
}
