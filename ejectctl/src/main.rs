use clap::Parser;

fn main() {
    let cli = ejectctl::Cli::parse();
    if let Err(err) = ejectctl::run(cli) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
