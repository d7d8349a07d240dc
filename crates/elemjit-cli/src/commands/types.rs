//! `elemjit types` command - List the supported element types.

use colored::Colorize;
use elemjit::TypeRegistry;

use crate::error::CliResult;

/// Execute the `types` command.
pub fn execute() -> CliResult<()> {
    println!(
        "{:<10} {:<14} {:>6} {:>14}",
        "type".bright_white().bold(),
        "host object".bright_white().bold(),
        "size".bright_white().bold(),
        "value offset".bright_white().bold()
    );

    for ty in TypeRegistry::all() {
        println!(
            "{:<10} {:<14} {:>6} {:>14}",
            ty.name.bright_yellow(),
            ty.host_name,
            ty.element_size,
            ty.value_offset
        );
    }

    Ok(())
}
