use clap::builder::styling::Styles;
use commands::command_argument_builder;
use linkscout::handlers::{handle_analyze, print_banner};

mod commands;

pub const CLAP_STYLING: Styles = Styles::styled()
    .header(clap_cargo::style::HEADER)
    .usage(clap_cargo::style::USAGE)
    .literal(clap_cargo::style::LITERAL)
    .placeholder(clap_cargo::style::PLACEHOLDER)
    .error(clap_cargo::style::ERROR)
    .valid(clap_cargo::style::VALID)
    .invalid(clap_cargo::style::INVALID);

#[tokio::main]
async fn main() {
    let cmd = command_argument_builder();
    let chosen_command = cmd.get_matches();
    let quiet = chosen_command.get_flag("quiet");

    // Show banner unless --quiet flag is set
    if !quiet {
        print_banner();
    }

    match chosen_command.subcommand() {
        Some(("analyze", primary_command)) => handle_analyze(primary_command).await,
        None => {
            // No subcommand provided, just show the banner
            if quiet {
                let _ = command_argument_builder().print_help();
            }
        }
        _ => unreachable!("clap should ensure we don't get here"),
    }
}
