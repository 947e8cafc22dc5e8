use unicfg_cli::{App, Verbosity, exit_code, init_subscriber, parse_cli_args, usage};

fn main() {
    let parsed = match parse_cli_args(std::env::args().skip(1)) {
        Ok(parsed) => parsed,
        Err(e) => {
            eprintln!("unicfg: {e}");
            eprint!("{}", usage("unicfg"));
            std::process::exit(exit_code::USAGE);
        }
    };
    let Some(input) = parsed else {
        eprint!("{}", usage("unicfg"));
        std::process::exit(exit_code::USAGE);
    };

    init_subscriber(Verbosity::from_quiet(input.quiet));

    let mut app = App::new(&input);
    std::process::exit(app.run(&input));
}
