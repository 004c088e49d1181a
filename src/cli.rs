extern crate clap;
use clap::{App, Arg, ArgMatches};

use crate::constants::DEFAULT_TICK_RATE;
use crate::output::OutputFormat;

/// Settings for one headless run
#[derive(Debug, Clone, PartialEq)]
pub struct RunOptions {
    pub config: Option<String>,
    pub duration: f64, // s
    pub rate: Option<f64>, // Hz, overrides the scenario's tick rate
    pub every: u64,
    pub format: OutputFormat,
    pub verbose: bool,
}

fn app() -> App<'static, 'static> {
    let config_option = Arg::with_name("config")
        .long("config")
        .short("c")
        .required(false)
        .takes_value(true)
        .help("Scenario file (TOML)");

    let duration_option = Arg::with_name("duration")
        .long("duration")
        .short("d")
        .required(false)
        .takes_value(true)
        .default_value("10")
        .help("Simulated seconds to run");

    let rate_option = Arg::with_name("rate")
        .long("rate")
        .short("r")
        .required(false)
        .takes_value(true)
        .help("Ticks per second");

    let every_option = Arg::with_name("every")
        .long("every")
        .short("e")
        .required(false)
        .takes_value(true)
        .default_value("1")
        .help("Print every n-th tick");

    let format_option = Arg::with_name("format")
        .long("format")
        .short("f")
        .required(false)
        .takes_value(true)
        .possible_values(&["pretty", "csv"])
        .default_value("pretty");

    App::new("trajhub")
        .version("0.1")
        .author("Jeremy T. Hatcher")
        .about("Runs a trajectory scenario headless and prints source positions")
        .arg(config_option)
        .arg(duration_option)
        .arg(rate_option)
        .arg(every_option)
        .arg(format_option)
        .arg(Arg::with_name("verbose").long("verbose").short("v").help("Log every tick"))
}

fn positive(matches: &ArgMatches, name: &str) -> Result<Option<f64>, String> {
    match matches.value_of(name) {
        Some(raw) => match raw.parse::<f64>() {
            Ok(v) if v > 0.0 && v.is_finite() => Ok(Some(v)),
            _ => Err(format!("--{} expects a positive number, got \"{}\"", name, raw)),
        },
        None => Ok(None),
    }
}

pub fn options_from(matches: &ArgMatches) -> Result<RunOptions, String> {
    let every = match matches.value_of("every") {
        Some(raw) => raw.parse::<u64>().ok().filter(|n| *n > 0).ok_or_else(|| format!("--every expects a positive integer, got \"{}\"", raw))?,
        None => 1,
    };
    let format = matches.value_of("format").unwrap_or("pretty").parse::<OutputFormat>()?;

    Ok(RunOptions {
        config: matches.value_of("config").map(str::to_string),
        duration: positive(matches, "duration")?.unwrap_or(10.0),
        rate: positive(matches, "rate")?,
        every,
        format,
        verbose: matches.is_present("verbose"),
    })
}

pub fn parse_command_line() -> Result<RunOptions, String> {
    options_from(&app().get_matches())
}

impl RunOptions {
    pub fn tick_rate(&self, scenario_rate: f64) -> f64 {
        self.rate.unwrap_or(if scenario_rate > 0.0 { scenario_rate } else { DEFAULT_TICK_RATE })
    }
}
