use clap::Parser;
use pivot::{pivoting_rl, Args};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    if let Err(e) = pivoting_rl(&args) {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
