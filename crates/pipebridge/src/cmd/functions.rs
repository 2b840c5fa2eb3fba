use crate::cmd::FunctionsArgs;
use crate::exit::{CliResult, SUCCESS};
use crate::handlers::BUILTINS;
use crate::output::{print_functions, FunctionEntry, OutputFormat};

pub fn run(_args: FunctionsArgs, format: OutputFormat) -> CliResult<i32> {
    let entries: Vec<FunctionEntry> = BUILTINS
        .iter()
        .map(|builtin| FunctionEntry {
            name: builtin.name,
            summary: builtin.summary,
        })
        .collect();
    print_functions(&entries, format);
    Ok(SUCCESS)
}
