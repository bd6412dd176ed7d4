// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use {
    clap::{Arg, ArgMatches, Command},
    log::{info, LevelFilter},
    std::{path::PathBuf, str::FromStr},
    termux_bootstrap::{
        config::{Architecture, BootstrapConfig},
        error::BootstrapError,
        pipeline::BootstrapBuilder,
        publish::DuctCommandRunner,
        repository::reader_from_str,
    },
    thiserror::Error,
};

const URLS_ABOUT: &str = "\
Repository URLs

The repository packages are fetched from can be given as a URL or as a path.

If a value contains `://`, it will be parsed as a URL. Otherwise it will be
interpreted as a local filesystem path.

The following URL schemes (the part before the `://` in a URL) are recognized:

file://
   A local filesystem path. The path component of the URL is interpreted as
   a filesystem path.

http:// and https://
   A HTTP-based repository. `http_proxy` and `https_proxy` environment
   variables are honored.

In all cases, the URL should point to the base of the repository. This is the
directory containing the `dists` sub-directory.
";

const BUILD_ABOUT: &str = "\
Build bootstrap archives.

For every architecture, the packages making up a bootstrap are downloaded
from the repository and extracted into `<build-dir>/<arch>`. Symlinks are
recorded in `SYMLINKS.txt` and a dpkg database is written so the packages
appear installed. The installation prefix is then archived as
`<build-dir>/<arch>/new-bootstrap-<arch>.zip`.

# Publishing

With `--publish`, each archive is published once built, as follows:

   scp new-bootstrap-<arch>.zip <host>:<directory>
   ssh <host> cp <directory>bootstrap-<arch>.zip <directory>bootstrap-<arch>.zip.bak
   ssh <host> mv <directory>new-bootstrap-<arch>.zip <directory>bootstrap-<arch>.zip
   <purge_command>

Publishing stops at the first failing command. `--publish` requires a
`publish` section in the YAML configuration.

# YAML Configuration

A YAML file given with `--config` can override the defaults. It can have the
following keys:

prefix (optional) (string)
   Installation prefix packages are built for.

repository_url (optional) (string)
   URL of the repository to fetch packages from.

distribution (optional) (string)
   Repository distribution. Defaults to `stable`.

component (optional) (string)
   Repository component. Defaults to `main`.

packages (optional) (list[string])
   Packages to install, in order.

architectures (optional) (list[string])
   Architectures to build bootstraps for.

build_dir (optional) (string)
   Directory bootstraps are assembled in.

publish (optional) (mapping)
   `host` (required), `directory` and `purge_command` (list[string]).

Command line arguments take precedence over the YAML configuration.
";

#[derive(Debug, Error)]
pub enum TbtError {
    #[error("argument parsing error: {0:?}")]
    Clap(#[from] clap::Error),

    #[error("{0:?}")]
    Bootstrap(#[from] BootstrapError),

    #[error("I/O error: {0:?}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0:?}")]
    SerdeYaml(#[from] serde_yaml::Error),

    #[error("unknown architecture: {0}")]
    UnknownArchitecture(String),

    #[error("--publish requires a publish section in the configuration")]
    NoPublishConfig,

    #[error("invalid sub-command: {0}")]
    InvalidSubCommand(String),
}

pub type Result<T> = std::result::Result<T, TbtError>;

fn add_config_arg(command: Command<'static>) -> Command<'static> {
    command.arg(
        Arg::new("config")
            .long("config")
            .takes_value(true)
            .allow_invalid_utf8(true)
            .help("Path to a YAML file defining the bootstrap configuration"),
    )
}

fn load_config(args: &ArgMatches) -> Result<BootstrapConfig> {
    if let Some(path) = args.value_of_os("config") {
        let f = std::fs::File::open(path)?;

        Ok(serde_yaml::from_reader(f)?)
    } else {
        Ok(BootstrapConfig::default())
    }
}

pub fn run_cli() -> Result<()> {
    let app = Command::new("Termux Bootstrap Tool")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Build Termux bootstrap archives")
        .arg_required_else_help(true)
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .global(true)
                .multiple_occurrences(true)
                .help("Increase logging verbosity. Can be specified multiple times."),
        );

    let arch_names = Architecture::bootstrap_targets()
        .into_iter()
        .map(<&'static str>::from)
        .collect::<Vec<_>>();

    let app = app.subcommand(add_config_arg(
        Command::new("build")
            .about("Build bootstrap archives")
            .long_about(BUILD_ABOUT)
            .arg(
                Arg::new("arch")
                    .long("arch")
                    .takes_value(true)
                    .multiple_occurrences(true)
                    .possible_values(arch_names)
                    .help("Architecture to build. Can be specified multiple times."),
            )
            .arg(
                Arg::new("repository-url")
                    .long("repository-url")
                    .takes_value(true)
                    .help("URL or path of the repository to fetch packages from"),
            )
            .arg(
                Arg::new("build-dir")
                    .long("build-dir")
                    .takes_value(true)
                    .allow_invalid_utf8(true)
                    .help("Directory to assemble bootstraps in"),
            )
            .arg(
                Arg::new("publish")
                    .long("publish")
                    .help("Publish archives after building them"),
            )
            .arg(
                Arg::new("keep-going")
                    .long("keep-going")
                    .help("Continue with the next architecture when a build fails"),
            ),
    ));

    let app = app.subcommand(add_config_arg(
        Command::new("list-packages").about("Print the packages a bootstrap is made of"),
    ));

    let app = app.subcommand(add_config_arg(
        Command::new("show-config").about("Print the effective configuration as YAML"),
    ));

    let app =
        app.subcommand(Command::new("urls").about("Print documentation about repository URLs"));

    let matches = app.get_matches();

    let log_level = match matches.occurrences_of("verbose") {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    let mut builder = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(log_level.as_str()),
    );

    // Plain messages unless debugging.
    if log_level <= LevelFilter::Info {
        builder
            .format_timestamp(None)
            .format_level(false)
            .format_target(false);
    }

    // rustls is chatty at the info level.
    if log_level == LevelFilter::Info {
        builder.filter_module("rustls", LevelFilter::Error);
    }

    builder.init();

    match matches.subcommand() {
        Some(("build", args)) => command_build(args),
        Some(("list-packages", args)) => command_list_packages(args),
        Some(("show-config", args)) => command_show_config(args),
        Some(("urls", _)) => {
            println!("{}", URLS_ABOUT);
            Ok(())
        }
        Some((command, _)) => Err(TbtError::InvalidSubCommand(command.to_string())),
        None => Err(TbtError::InvalidSubCommand(String::new())),
    }
}

fn command_build(args: &ArgMatches) -> Result<()> {
    let mut config = load_config(args)?;

    if let Some(values) = args.values_of("arch") {
        config.architectures = values
            .map(|value| {
                Architecture::from_str(value)
                    .map_err(|_| TbtError::UnknownArchitecture(value.to_string()))
            })
            .collect::<Result<Vec<_>>>()?;
    }

    if let Some(path) = args.value_of_os("build-dir") {
        config.build_dir = PathBuf::from(path);
    }

    let repository_url = args
        .value_of("repository-url")
        .map(|s| s.to_string())
        .unwrap_or_else(|| config.repository_url.to_string());
    let repository = reader_from_str(&repository_url)?;

    let runner = DuctCommandRunner;

    let mut builder =
        BootstrapBuilder::new(&config, &*repository).keep_going(args.is_present("keep-going"));

    if args.is_present("publish") {
        let publish = config.publish.as_ref().ok_or(TbtError::NoPublishConfig)?;
        builder = builder.publish_with(&runner, publish);
    }

    info!(
        "building bootstraps for {} from {}",
        config
            .architectures
            .iter()
            .map(|arch| arch.to_string())
            .collect::<Vec<_>>()
            .join(", "),
        repository_url
    );

    for build in builder.build_all()? {
        println!(
            "{}{}",
            build.zip_path.display(),
            if build.published { " (published)" } else { "" }
        );
    }

    Ok(())
}

fn command_list_packages(args: &ArgMatches) -> Result<()> {
    for package in load_config(args)?.packages {
        println!("{}", package);
    }

    Ok(())
}

fn command_show_config(args: &ArgMatches) -> Result<()> {
    print!("{}", serde_yaml::to_string(&load_config(args)?)?);

    Ok(())
}
