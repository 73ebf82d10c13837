//! Simple command that prints one or '-n count' snowflake ids, or decodes one with '--decode'

use std::{io, io::Write, process::ExitCode};

use snowflake_id::{Config, ConfigError, Generator, Id};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "[-n count] [--node N] [--datacenter N] [--decode ID]";

#[derive(Debug, Default, PartialEq)]
struct Options {
    count: Option<usize>,
    node_id: Option<u32>,
    datacenter_id: Option<u32>,
    decode: Option<Id>,
}

fn main() -> io::Result<ExitCode> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let mut args = std::env::args();
    let program = args.next();
    let opts = match parse_args(args) {
        Ok(opts) => opts,
        Err(message) => {
            eprintln!("Error: {}", message);
            eprintln!(
                "Usage: {} {}",
                program.as_deref().unwrap_or("snowflake"),
                USAGE
            );
            return Ok(ExitCode::FAILURE);
        }
    };

    let config = match Config::from_env().and_then(|env| resolve_config(&opts, env)) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Error: {}", err);
            return Ok(ExitCode::FAILURE);
        }
    };

    let mut buf = io::BufWriter::new(io::stdout());

    if let Some(id) = opts.decode {
        write_decoded(&mut buf, id, config.epoch_ms)?;
        return Ok(ExitCode::SUCCESS);
    }

    let g = match Generator::with_config(config) {
        Ok(g) => g,
        Err(err) => {
            eprintln!("Error: {}", err);
            return Ok(ExitCode::FAILURE);
        }
    };

    for e in g.iter().take(opts.count.unwrap_or(1)) {
        match e {
            Ok(id) => writeln!(buf, "{}", id)?,
            Err(err) => {
                buf.flush()?;
                eprintln!("Error: {}", err);
                return Ok(ExitCode::FAILURE);
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

/// Applies command-line overrides to the configuration read from the environment.
fn resolve_config(opts: &Options, mut config: Config) -> Result<Config, ConfigError> {
    config.node_id = opts.node_id.unwrap_or(config.node_id);
    config.datacenter_id = opts.datacenter_id.unwrap_or(config.datacenter_id);
    config.validate()?;
    Ok(config)
}

/// Writes the fields of `id`, resolving its timestamp against `epoch_ms`.
fn write_decoded(out: &mut impl Write, id: Id, epoch_ms: u64) -> io::Result<()> {
    writeln!(out, "id:               {}", id)?;
    writeln!(out, "hex:              {}", id.encode_hex())?;
    writeln!(out, "timestamp_offset: {}", id.timestamp_offset())?;
    writeln!(out, "unix_ts_ms:       {}", id.unix_ts_ms(epoch_ms))?;
    writeln!(out, "datacenter_id:    {}", id.datacenter_id())?;
    writeln!(out, "node_id:          {}", id.node_id())?;
    writeln!(out, "sequence:         {}", id.sequence())
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Options, String> {
    let mut opts = Options::default();
    while let Some(arg) = args.next() {
        let name = match arg.as_str() {
            "-n" => "n",
            "--node" => "node",
            "--datacenter" => "datacenter",
            "--decode" => "decode",
            _ => return Err(format!("unrecognized argument '{}'", arg)),
        };
        let Some(value) = args.next() else {
            return Err(format!("argument to option '{}' missing", name));
        };
        let invalid = || format!("invalid argument to option '{}': '{}'", name, value);
        let given_twice = match name {
            "n" => opts.count.replace(value.parse().map_err(|_| invalid())?).is_some(),
            "node" => opts.node_id.replace(value.parse().map_err(|_| invalid())?).is_some(),
            "datacenter" => opts
                .datacenter_id
                .replace(value.parse().map_err(|_| invalid())?)
                .is_some(),
            _ => opts.decode.replace(value.parse().map_err(|_| invalid())?).is_some(),
        };
        if given_twice {
            return Err(format!("option '{}' given more than once", name));
        }
    }
    Ok(opts)
}
