use crate::cli::args::Cli;
use crate::utils::errors::Result;
use crate::utils::paths::PROGRAM_NAME;
use clap::CommandFactory;
use clap_complete::{generate, Shell};
use std::io;

/// Values accepted by `status --columns`
pub const STATUS_COLUMNS: &[&str] = &[
    "name",
    "domain",
    "cert",
    "serial",
    "not_before",
    "not_after",
    "issuer",
    "sans",
    "renew",
    "bundle",
];

pub fn handle_completion_command(shell: Shell) -> Result<()> {
    let mut cmd = Cli::command();

    // For bash, complete comma-separated --columns values on top of the generated script
    if matches!(shell, Shell::Bash) {
        println!("# Enhanced completion for {PROGRAM_NAME} status columns");
        print!("{}", bash_columns_override(STATUS_COLUMNS));

        generate(shell, &mut cmd, PROGRAM_NAME, &mut io::stdout());

        println!();
        println!("# Override the completion function");
        println!("complete -F _perseus_tls_override {PROGRAM_NAME}");
    } else {
        generate(shell, &mut cmd, PROGRAM_NAME, &mut io::stdout());
    }

    Ok(())
}

fn bash_columns_override(columns: &[&str]) -> String {
    format!(
        r#"
_perseus_tls_complete_columns() {{
    local columns="{columns}"
    local current_word="${{cur}}"
    local prefix=""

    # Handle + prefix (append to defaults)
    if [[ "$current_word" == +* ]]; then
        prefix="+"
        current_word="${{current_word:1}}"
    fi

    # Complete only the part after the last comma
    if [[ "$current_word" == *,* ]]; then
        prefix="${{prefix}}${{current_word%,*}},"
        current_word="${{current_word##*,}}"
    fi

    local word_list=""
    for col in $columns; do
        if [[ "$col" == "$current_word"* ]]; then
            word_list="$word_list ${{prefix}}${{col}}"
        fi
    done

    COMPREPLY=($(compgen -W "$word_list" -- "${{cur}}"))
}}

_perseus_tls_override() {{
    local cur prev words cword
    _init_completion || return

    case "$prev" in
        "--columns"|"-c")
            _perseus_tls_complete_columns
            return 0
            ;;
    esac

    # Fall back to the generated completion
    _perseus-tls "$@"
}}

"#,
        columns = columns.join(" ")
    )
}
