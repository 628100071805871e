use clap::{value_parser, Arg, Command, ValueHint};
use peakgroup_cli::input::Input;
use peakgroup_cli::runner::Runner;
use rayon::ThreadPoolBuilder;

fn main() -> anyhow::Result<()> {
    env_logger::Builder::default()
        .filter_level(log::LevelFilter::Error)
        .parse_env(env_logger::Env::default().filter_or("PEAKGROUP_LOG", "error,peakgroup=info"))
        .init();

    let matches = Command::new("peakgroup")
        .version(clap::crate_version!())
        .about("Charge-resolved isotope envelope detection for mass spectrometry scans")
        .arg(
            Arg::new("parameters")
                .required(true)
                .value_parser(clap::builder::NonEmptyStringValueParser::new())
                .help("Path to configuration parameters (JSON file)")
                .value_hint(ValueHint::FilePath),
        )
        .arg(
            Arg::new("scan_paths")
                .num_args(1..)
                .value_parser(clap::builder::NonEmptyStringValueParser::new())
                .help(
                    "Paths to scan files (JSON arrays of scans) to process. Overrides \
                     scan files listed in the configuration file.",
                )
                .value_hint(ValueHint::FilePath),
        )
        .arg(
            Arg::new("output_directory")
                .short('o')
                .long("output_directory")
                .value_parser(clap::builder::NonEmptyStringValueParser::new())
                .help(
                    "Path where results will be written. Overrides the directory \
                     specified in the configuration file.",
                )
                .value_hint(ValueHint::DirPath),
        )
        .arg(
            Arg::new("threads")
                .long("threads")
                .value_parser(value_parser!(u16).range(1..))
                .help("Number of worker threads (default = # of CPUs)")
                .value_hint(ValueHint::Other),
        )
        .help_template(
            "{usage-heading} {usage}\n\n\
             {about-with-newline}\n\
             Version {version}\n\n\
             {all-args}{after-help}",
        )
        .get_matches();

    let threads = matches
        .get_one::<u16>("threads")
        .copied()
        .map(usize::from)
        .unwrap_or_else(num_cpus::get);

    ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()?;
    log::trace!("using {} worker threads", threads);

    let input = Input::from_arguments(matches)?;
    let parameters = input.build()?;
    Runner::new(parameters).run()?;

    Ok(())
}
