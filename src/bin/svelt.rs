use log::error;
use structopt::StructOpt;

use svelt::cli::{run, Svelt};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let options = Svelt::from_args();
    if let Err(err) = run(options) {
        error!("{:#}", err);
        std::process::exit(1);
    }
}
