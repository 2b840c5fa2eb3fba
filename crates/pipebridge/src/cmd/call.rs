use std::process::{Command, ExitStatus};
use std::time::Duration;

use pipebridge_codec::{decode_str, Value};
use pipebridge_dispatch::{CallerConfig, DispatchError, Worker, WorkerConfig};
use pipebridge_transport::ChannelConfig;
use tracing::{debug, info};

use crate::cmd::CallArgs;
use crate::exit::{dispatch_error, CliError, CliResult, FAILURE, SUCCESS, TIMEOUT, USAGE};
use crate::output::{print_value, OutputFormat};

pub fn run(args: CallArgs, format: OutputFormat, channels: ChannelConfig) -> CliResult<i32> {
    let request = parse_args(&args.json)?;
    let timeout = parse_timeout(&args.timeout)?;
    let command = command_factory(&args.program)?;

    let config = WorkerConfig {
        channels,
        caller: CallerConfig {
            timeout: Some(timeout),
            ..CallerConfig::default()
        },
    };
    let mut worker = Worker::new(command, config);

    let outcome = worker.start().and_then(|pid| {
        info!(pid, function = %args.function, "bridge started");
        worker.call(&args.function, &request)
    });
    // Closing our end of the inbound channel is what stops the bridge.
    let status = worker
        .shutdown()
        .map_err(|err| dispatch_error("stopping bridge failed", err))?;
    debug!(?status, "bridge exited");

    let result = outcome.map_err(|err| call_error(&args.function, status, err))?;
    print_value(&args.function, &result, format)?;

    match status {
        Some(status) if !status.success() => Err(CliError::new(
            FAILURE,
            format!("bridge exited with {status} after answering"),
        )),
        _ => Ok(SUCCESS),
    }
}

fn parse_args(json: &str) -> CliResult<Value> {
    decode_str(json).map_err(|err| CliError::new(USAGE, format!("--json is not valid: {err}")))
}

/// Accepts `10s`, `500ms` or a bare number of seconds.
fn parse_timeout(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    let (number, to_duration): (&str, fn(u64) -> Duration) =
        if let Some(millis) = input.strip_suffix("ms") {
            (millis, Duration::from_millis)
        } else {
            (input.strip_suffix('s').unwrap_or(input), Duration::from_secs)
        };

    match number.parse::<u64>() {
        Ok(0) => Err(CliError::new(USAGE, "--timeout must be greater than zero")),
        Ok(value) => Ok(to_duration(value)),
        Err(_) => Err(CliError::new(
            USAGE,
            format!("--timeout is not a duration: {input:?}"),
        )),
    }
}

/// Builds a fresh command from `program` for every bridge start.
fn command_factory(program: &[String]) -> CliResult<impl Fn() -> Command + Send + Sync + 'static> {
    let (exe, rest) = program
        .split_first()
        .ok_or_else(|| CliError::new(USAGE, "missing bridge program after --"))?;
    let exe = exe.clone();
    let rest = rest.to_vec();
    Ok(move || {
        let mut command = Command::new(&exe);
        command.args(&rest);
        command
    })
}

fn call_error(function: &str, status: Option<ExitStatus>, err: DispatchError) -> CliError {
    let status = status.map_or_else(|| "unknown status".to_string(), |s| s.to_string());
    if err.is_channel_closed() {
        return CliError::new(
            FAILURE,
            format!("bridge exited ({status}) without answering '{function}'"),
        );
    }
    if let DispatchError::Timeout(after) = err {
        return CliError::new(
            TIMEOUT,
            format!("bridge did not answer '{function}' within {after:?}; killed ({status})"),
        );
    }
    dispatch_error("call failed", err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_args_accepts_arrays() {
        let value = parse_args(r#"{"x": {"_elementType": "float32", "_data": "AACAPw=="}}"#)
            .expect("args should parse");
        let array = value.get("x").and_then(Value::as_array).expect("array arg");
        assert_eq!(array.to_f64_vec(), vec![1.0]);
    }

    #[test]
    fn parse_args_rejects_invalid_json() {
        let err = parse_args("{oops").unwrap_err();
        assert_eq!(err.code, USAGE);
    }

    #[test]
    fn timeout_units() {
        assert_eq!(parse_timeout("10s").unwrap(), Duration::from_secs(10));
        assert_eq!(parse_timeout("3").unwrap(), Duration::from_secs(3));
        assert_eq!(parse_timeout("250ms").unwrap(), Duration::from_millis(250));
    }

    #[test]
    fn timeout_rejects_zero_and_garbage() {
        assert_eq!(parse_timeout("0ms").unwrap_err().code, USAGE);
        assert_eq!(parse_timeout("soon").unwrap_err().code, USAGE);
        assert_eq!(parse_timeout("").unwrap_err().code, USAGE);
    }

    #[test]
    fn command_factory_splits_program() {
        let factory = command_factory(&["sh".to_string(), "-c".to_string(), "true".to_string()])
            .expect("command should build");
        let command = factory();
        assert_eq!(command.get_program(), "sh");
        assert_eq!(command.get_args().count(), 2);
    }

    #[test]
    fn command_factory_requires_program() {
        assert!(matches!(command_factory(&[]), Err(err) if err.code == USAGE));
    }

    #[test]
    fn timeout_error_names_function() {
        let err = call_error("add", None, DispatchError::Timeout(Duration::from_millis(500)));
        assert_eq!(err.code, TIMEOUT);
        assert!(err.message.starts_with("bridge did not answer 'add' within 500ms"));
    }
}
