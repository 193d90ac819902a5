use crate::CLAP_STYLING;
use clap::{arg, command};

pub(crate) fn command_argument_builder() -> clap::Command {
    clap::Command::new("linkscout")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("linkscout")
        .styles(CLAP_STYLING)
        .arg(arg!(-q --"quiet" "Suppress banner and non-essential output").required(false))
        .arg(
            arg!(-v --"verbose" "Log more (repeat for debug output)")
                .required(false)
                .action(clap::ArgAction::Count)
                .global(true),
        )
        .subcommand_required(false)
        .subcommand(
            command!("analyze")
                .about(
                    "Crawl a single website and analyze the anchor text and redirects of its \
                internal links.",
                )
                .arg(
                    arg!(<URL>)
                        .required(true)
                        .help("The website to analyze. A missing scheme defaults to https://"),
                )
                .arg(
                    arg!(-c --"config" <PATH>)
                        .required(false)
                        .help("JSON file with crawl settings. Flags below override it")
                        .value_parser(clap::value_parser!(std::path::PathBuf)),
                )
                .arg(
                    arg!(-p --"max-pages" <NUM>)
                        .required(false)
                        .help("Maximum number of pages to crawl [default: 100]")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    arg!(-d --"max-depth" <NUM>)
                        .required(false)
                        .help("Maximum link depth from the start page [default: 3]")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    arg!(-t --"threshold" <NUM>)
                        .required(false)
                        .help(
                            "Render pages with fewer plain-HTML links than this in headless \
                        Chrome [default: 5]",
                        )
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    arg!(--"delay" <MILLISECONDS>)
                        .required(false)
                        .help("Pause between page requests [default: 1000]")
                        .value_parser(clap::value_parser!(u64)),
                )
                .arg(
                    arg!(-r --"render")
                        .required(false)
                        .help("Render JavaScript-heavy pages in headless Chrome")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(
                    arg!(--"chrome" <PATH>)
                        .required(false)
                        .help("Chrome/Chromium binary to use for rendering (implies --render)")
                        .value_parser(clap::value_parser!(std::path::PathBuf)),
                )
                .arg(
                    arg!(-O --"output-dir" <PATH>)
                        .required(false)
                        .help("Write the redirect and anchor text CSV reports to this directory")
                        .value_parser(clap::value_parser!(std::path::PathBuf)),
                )
                .arg(
                    arg!(-o --"output" <PATH>)
                        .required(false)
                        .help("Save the summary report to file (default: display to screen)")
                        .value_parser(clap::value_parser!(std::path::PathBuf)),
                )
                .arg(
                    arg!(-f --"format" <FORMAT>)
                        .required(false)
                        .help("Summary format: text, json")
                        .value_parser(["text", "json"])
                        .default_value("text"),
                )
                .arg(
                    arg!(--"report-url" <URL>)
                        .required(false)
                        .help("Print the anchor text report for one destination URL as JSON"),
                )
                .arg(
                    arg!(--"list-urls")
                        .required(false)
                        .help("Print every destination URL that received anchor text")
                        .action(clap::ArgAction::SetTrue),
                ),
        )
}
