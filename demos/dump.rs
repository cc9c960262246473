use mpegts_psi::{decode_section, Table};
use pretty_env_logger;
use std::env;
use std::fs::File;
use std::io::Read;

fn main() {
    pretty_env_logger::init();
    let args = env::args();
    if args.len() < 2 {
        panic!("No file argument");
    }
    let file_path = args.skip(1).next().unwrap();

    let mut file = File::open(file_path).expect("unable to open!");
    let mut section = Vec::new();
    file.read_to_end(&mut section).expect("IO Error!");

    match decode_section(&section) {
        Ok(Table::Pat(programs)) => {
            for program in &programs {
                println!("{:x?}", program);
            }
        }
        Ok(Table::Pmt(map)) => {
            println!("{:x?}", map);
            if map.is_audio_only() {
                println!("audio only");
            }
        }
        Err(err) => {
            eprintln!("Parse Error: {}", err);
            std::process::exit(1);
        }
    }
}
