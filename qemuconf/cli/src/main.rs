mod args;

use clap::Parser;

fn main() {
    let args = args::Args::parse();

    env_logger::Builder::new()
        .filter_level(args.verbose.log_level_filter())
        .init();
    log::debug!("CLI ARGS: {:?}", args);

    if let Err(e) = args.run() {
        log::error!("{e:#}");
        std::process::exit(1);
    }
}
